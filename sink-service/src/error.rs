use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;

use sink::error::SinkError;

fn should_render_backtrace() -> bool {
    matches!(
        std::env::var("RUST_BACKTRACE").as_deref(),
        Ok("1") | Ok("full")
    )
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Backtrace captured when a service error is created.
pub struct CapturedBacktrace(Backtrace);

impl CapturedBacktrace {
    fn capture() -> Self {
        Self(Backtrace::capture())
    }
}

impl fmt::Debug for CapturedBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type of the sink service.
#[derive(Debug)]
pub enum ServiceError {
    /// A consumer stopped with an error.
    Sink(SinkError),
    Config(Box<dyn Error + Send + Sync>, CapturedBacktrace),
    Io(std::io::Error, CapturedBacktrace),
}

impl ServiceError {
    pub fn category(&self) -> &'static str {
        match self {
            ServiceError::Sink(_) => "sink error",
            ServiceError::Config(_, _) => "configuration error",
            ServiceError::Io(_, _) => "i/o error",
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            ServiceError::Sink(err) => err.backtrace(),
            ServiceError::Config(_, backtrace) => Some(&backtrace.0),
            ServiceError::Io(_, backtrace) => Some(&backtrace.0),
        }
    }

    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        ServiceError::Config(Box::new(err), CapturedBacktrace::capture())
    }

    /// Renders the error with its causes for terminal output.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("sink service failed\n");
        out.push_str(&format!("category: {}\n", self.category()));
        out.push_str(&format!("error: {self}\n"));

        let mut source = Error::source(self);
        let mut idx = 1usize;
        while let Some(err) = source {
            out.push_str(&format!("cause {idx}: {err}\n"));
            source = err.source();
            idx += 1;
        }

        if should_render_backtrace() {
            if let Some(backtrace) = self.backtrace() {
                out.push_str("backtrace:\n");
                out.push_str(&backtrace.to_string());
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
        }

        out
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Sink(err) => write!(f, "{err}"),
            ServiceError::Config(source, _) => write!(f, "configuration error: {source}"),
            ServiceError::Io(source, _) => write!(f, "i/o error: {source}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ServiceError::Sink(err) => err.source(),
            ServiceError::Config(source, _) => Some(source.as_ref()),
            ServiceError::Io(source, _) => Some(source),
        }
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::Io(err, CapturedBacktrace::capture())
    }
}

impl From<SinkError> for ServiceError {
    fn from(err: SinkError) -> Self {
        ServiceError::Sink(err)
    }
}
