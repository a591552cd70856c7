//! Error types and result definitions for the sink.
//!
//! [`SinkError`] carries a classification ([`ErrorKind`]), a static description, optional
//! dynamic detail, the originating error and the callsite where it was raised. Errors of the
//! two consumers can be aggregated into a single value when both fail.
//!
//! The consumers decide what to do with a delivery from the [`ErrorCategory`] of the error
//! raised while processing it.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use lapin::protocol::AMQPErrorKind;

/// Convenient result type using [`SinkError`] as the error type.
pub type SinkResult<T> = Result<T, SinkError>;

/// Detailed payload stored for single [`SinkError`] instances.
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type of the sink.
#[derive(Debug, Clone)]
pub struct SinkError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    /// Single error payload holding rich metadata.
    Single(ErrorPayload),
    /// Multiple aggregated errors, used when more than one worker fails.
    Many {
        errors: Vec<SinkError>,
        location: &'static Location<'static>,
    },
}

/// Coarse classification of an [`ErrorKind`], driving how a delivery is settled.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
pub enum ErrorCategory {
    /// The payload cannot be decoded, retrying can never succeed.
    Decode,
    /// The broker or the store cannot be reached.
    Connection,
    /// The broker refused the declared topology.
    Topology,
    /// A handler could not derive a row from the message.
    Handler,
    /// The store rejected the row or the transaction.
    Persistence,
    /// Everything else.
    Other,
}

/// Specific kinds of errors raised by the sink.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Decode Errors
    InvalidEnvelope,
    DeserializationError,

    // Connection Errors
    BrokerConnectionFailed,
    BrokerAuthenticationFailed,
    BrokerChannelFailed,
    ChannelRecycled,
    StoreConnectionFailed,
    StoreAuthenticationFailed,

    // Topology Errors
    TopologyMismatch,

    // Handler Errors
    HandlerFailed,
    MissingField,
    InvalidField,
    ArityMismatch,
    ConversionError,

    // Persistence Errors
    StoreQueryFailed,
    ConstraintViolation,
    StoreConversionError,
    StoreSchemaError,
    InvalidState,

    // Configuration & IO Errors
    ConfigError,
    IoError,

    // Worker Errors
    WorkerPanic,
    WorkerCancelled,

    // Unknown / Uncategorized
    Unknown,
}

impl ErrorKind {
    /// Returns the [`ErrorCategory`] this kind belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorKind::InvalidEnvelope | ErrorKind::DeserializationError => ErrorCategory::Decode,
            ErrorKind::BrokerConnectionFailed
            | ErrorKind::BrokerAuthenticationFailed
            | ErrorKind::BrokerChannelFailed
            | ErrorKind::ChannelRecycled
            | ErrorKind::StoreConnectionFailed
            | ErrorKind::StoreAuthenticationFailed => ErrorCategory::Connection,
            ErrorKind::TopologyMismatch => ErrorCategory::Topology,
            ErrorKind::HandlerFailed
            | ErrorKind::MissingField
            | ErrorKind::InvalidField
            | ErrorKind::ArityMismatch
            | ErrorKind::ConversionError => ErrorCategory::Handler,
            ErrorKind::StoreQueryFailed
            | ErrorKind::ConstraintViolation
            | ErrorKind::StoreConversionError
            | ErrorKind::StoreSchemaError
            | ErrorKind::InvalidState => ErrorCategory::Persistence,
            ErrorKind::ConfigError
            | ErrorKind::IoError
            | ErrorKind::WorkerPanic
            | ErrorKind::WorkerCancelled
            | ErrorKind::Unknown => ErrorCategory::Other,
        }
    }

    /// Returns `true` when a consumer should reconnect after this error.
    pub fn is_connection_retryable(&self) -> bool {
        self.category() == ErrorCategory::Connection && !self.is_fatal()
    }

    /// Returns `true` when retrying can never succeed without operator intervention.
    ///
    /// Wrong broker credentials and a topology that conflicts with existing broker objects stop
    /// the affected consumer instead of looping forever.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ErrorKind::BrokerAuthenticationFailed | ErrorKind::TopologyMismatch
        )
    }
}

impl SinkError {
    /// Returns the [`ErrorKind`] of this error.
    ///
    /// For multiple errors, returns the kind of the first error or [`ErrorKind::Unknown`]
    /// if the error list is empty.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns all [`ErrorKind`]s present in this error.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => errors
                .iter()
                .flat_map(|err| err.kinds())
                .collect::<Vec<_>>(),
        }
    }

    /// Returns the [`ErrorCategory`] of [`SinkError::kind`].
    pub fn category(&self) -> ErrorCategory {
        self.kind().category()
    }

    /// Returns the static description of this error.
    ///
    /// Aggregated errors return the description of their first error.
    pub fn description(&self) -> &str {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.description.as_ref(),
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.description())
                .unwrap_or("no errors"),
        }
    }

    /// Returns the detailed error information if available.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    /// Returns the captured backtrace for this error.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Attaches an originating [`error::Error`] to this error and returns the modified instance.
    ///
    /// Has no effect on aggregated errors, which forward their first error as source.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }

        self
    }

    /// Wraps `self` as the source of a new error of `kind`.
    #[track_caller]
    pub fn wrap(self, kind: ErrorKind, description: &'static str) -> SinkError {
        let detail = self.description().to_string();
        SinkError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(self)),
        )
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        SinkError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }
}

impl PartialEq for SinkError {
    fn eq(&self, other: &SinkError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (
                ErrorRepr::Many {
                    errors: errors_a, ..
                },
                ErrorRepr::Many {
                    errors: errors_b, ..
                },
            ) => {
                errors_a.len() == errors_b.len()
                    && errors_a.iter().zip(errors_b.iter()).all(|(a, b)| a == b)
            }
            _ => false,
        }
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                let location = payload.location;
                write!(
                    f,
                    "[{:?}] {} @ {}:{}:{}",
                    payload.kind,
                    payload.description,
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                write_detail(payload.detail.as_deref(), f, 1)?;

                Ok(())
            }
            ErrorRepr::Many { errors, location } => {
                let count = errors.len();
                write!(
                    f,
                    "[Many] {} error{} aggregated @ {}:{}:{}",
                    count,
                    if count == 1 { "" } else { "s" },
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                for (index, error) in errors.iter().enumerate() {
                    let rendered = format!("{error}");
                    let mut lines = rendered.lines();
                    if let Some(first_line) = lines.next() {
                        write!(f, "\n  {}. {}", index + 1, first_line)?;
                    }

                    for line in lines {
                        write!(f, "\n     {line}")?;
                    }
                }

                Ok(())
            }
        }
    }
}

impl error::Error for SinkError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source.as_ref() as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

/// Writes the detail block with indentation.
fn write_detail(detail: Option<&str>, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
    if let Some(detail) = detail {
        let indent_str = "  ".repeat(indent);
        if detail.trim().is_empty() {
            write!(f, "\n{indent_str}Detail: <empty>")?;
        } else {
            write!(f, "\n{indent_str}Detail:")?;
            for line in detail.lines() {
                write!(f, "\n{indent_str}  {line}")?;
            }
        }
    }

    Ok(())
}

/// Creates a [`SinkError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for SinkError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> SinkError {
        SinkError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`SinkError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for SinkError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> SinkError {
        SinkError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Aggregates many errors into one.
///
/// A vector holding exactly one error yields that error unchanged.
impl<E> From<Vec<E>> for SinkError
where
    E: Into<SinkError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> SinkError {
        let location = Location::caller();

        let mut errors: Vec<SinkError> = errors.into_iter().map(Into::into).collect();

        if errors.len() == 1 {
            if let Some(error) = errors.pop() {
                return error;
            }
        }

        SinkError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

impl From<std::io::Error> for SinkError {
    #[track_caller]
    fn from(err: std::io::Error) -> SinkError {
        let detail = err.to_string();
        SinkError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`serde_json::Error`] into a decode error.
impl From<serde_json::Error> for SinkError {
    #[track_caller]
    fn from(err: serde_json::Error) -> SinkError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => (
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
            ),
        };

        let detail = err.to_string();
        SinkError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<chrono::ParseError> for SinkError {
    #[track_caller]
    fn from(err: chrono::ParseError) -> SinkError {
        let detail = err.to_string();
        SinkError::from_components(
            ErrorKind::ConversionError,
            Cow::Borrowed("Datetime parsing failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`tokio_postgres::Error`] into a store error classified by SQLSTATE.
impl From<tokio_postgres::Error> for SinkError {
    #[track_caller]
    fn from(err: tokio_postgres::Error) -> SinkError {
        let (kind, description) = match err.code() {
            Some(sqlstate) => {
                use tokio_postgres::error::SqlState;

                match *sqlstate {
                    // Connection errors (08xxx)
                    SqlState::CONNECTION_EXCEPTION
                    | SqlState::CONNECTION_DOES_NOT_EXIST
                    | SqlState::CONNECTION_FAILURE
                    | SqlState::SQLCLIENT_UNABLE_TO_ESTABLISH_SQLCONNECTION
                    | SqlState::SQLSERVER_REJECTED_ESTABLISHMENT_OF_SQLCONNECTION => (
                        ErrorKind::StoreConnectionFailed,
                        "PostgreSQL connection failed",
                    ),

                    // Authentication errors (28xxx)
                    SqlState::INVALID_AUTHORIZATION_SPECIFICATION | SqlState::INVALID_PASSWORD => (
                        ErrorKind::StoreAuthenticationFailed,
                        "PostgreSQL authentication failed",
                    ),

                    // Resource and shutdown errors (53xxx, 57Pxx)
                    SqlState::TOO_MANY_CONNECTIONS
                    | SqlState::ADMIN_SHUTDOWN
                    | SqlState::CRASH_SHUTDOWN
                    | SqlState::CANNOT_CONNECT_NOW
                    | SqlState::IDLE_SESSION_TIMEOUT => (
                        ErrorKind::StoreConnectionFailed,
                        "PostgreSQL unavailable",
                    ),

                    // Data integrity violations (23xxx)
                    SqlState::INTEGRITY_CONSTRAINT_VIOLATION
                    | SqlState::NOT_NULL_VIOLATION
                    | SqlState::FOREIGN_KEY_VIOLATION
                    | SqlState::UNIQUE_VIOLATION
                    | SqlState::CHECK_VIOLATION
                    | SqlState::EXCLUSION_VIOLATION => (
                        ErrorKind::ConstraintViolation,
                        "PostgreSQL constraint violation",
                    ),

                    // Data conversion errors (22xxx)
                    SqlState::DATA_EXCEPTION
                    | SqlState::INVALID_TEXT_REPRESENTATION
                    | SqlState::INVALID_DATETIME_FORMAT
                    | SqlState::DATETIME_FIELD_OVERFLOW
                    | SqlState::NUMERIC_VALUE_OUT_OF_RANGE
                    | SqlState::STRING_DATA_RIGHT_TRUNCATION
                    | SqlState::INVALID_JSON_TEXT
                    | SqlState::DATATYPE_MISMATCH => (
                        ErrorKind::StoreConversionError,
                        "PostgreSQL data conversion failed",
                    ),

                    // Schema/object not found errors (42xxx)
                    SqlState::UNDEFINED_TABLE
                    | SqlState::UNDEFINED_COLUMN
                    | SqlState::UNDEFINED_SCHEMA
                    | SqlState::INSUFFICIENT_PRIVILEGE => (
                        ErrorKind::StoreSchemaError,
                        "PostgreSQL schema object not found or not accessible",
                    ),

                    // Transaction errors (40xxx, 25xxx)
                    SqlState::TRANSACTION_ROLLBACK
                    | SqlState::T_R_SERIALIZATION_FAILURE
                    | SqlState::T_R_DEADLOCK_DETECTED
                    | SqlState::INVALID_TRANSACTION_STATE
                    | SqlState::ACTIVE_SQL_TRANSACTION
                    | SqlState::NO_ACTIVE_SQL_TRANSACTION
                    | SqlState::IN_FAILED_SQL_TRANSACTION
                    | SqlState::IDLE_IN_TRANSACTION_SESSION_TIMEOUT => {
                        (ErrorKind::InvalidState, "PostgreSQL transaction failed")
                    }

                    _ => (ErrorKind::StoreQueryFailed, "PostgreSQL query failed"),
                }
            }
            // No SQL state means the connection itself failed.
            None => (
                ErrorKind::StoreConnectionFailed,
                "PostgreSQL connection failed",
            ),
        };

        let detail = err.to_string();
        SinkError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`lapin::Error`] into a broker error.
///
/// Refused credentials are fatal. A channel closed by the broker, for instance after a
/// delivery acknowledgement timeout, is a channel failure the consumer recovers from by
/// reconnecting. `PRECONDITION_FAILED` only means a topology conflict when raised by a
/// declaration, which the topology module classifies itself; the reply text is matched here
/// for the `inequivalent arg` wording only.
impl From<lapin::Error> for SinkError {
    #[track_caller]
    fn from(err: lapin::Error) -> SinkError {
        let detail = err.to_string();
        let upper = detail.to_uppercase();

        let (kind, description) = if upper.contains("ACCESS_REFUSED")
            || upper.contains("ACCESS-REFUSED")
            || upper.contains("ACCESSREFUSED")
        {
            (
                ErrorKind::BrokerAuthenticationFailed,
                "Broker refused the credentials",
            )
        } else if upper.contains("INEQUIVALENT ARG") {
            (
                ErrorKind::TopologyMismatch,
                "Broker rejected the declared topology",
            )
        } else {
            match &err {
                lapin::Error::ProtocolError(amqp)
                    if matches!(amqp.kind(), AMQPErrorKind::Soft(_)) =>
                {
                    (ErrorKind::BrokerChannelFailed, "Broker closed the channel")
                }
                lapin::Error::InvalidChannelState(_)
                | lapin::Error::InvalidChannel(_)
                | lapin::Error::ChannelsLimitReached => (
                    ErrorKind::BrokerChannelFailed,
                    "Broker channel failed",
                ),
                _ => (
                    ErrorKind::BrokerConnectionFailed,
                    "Broker connection failed",
                ),
            }
        };

        SinkError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`rustls::Error`] into a configuration error.
impl From<rustls::Error> for SinkError {
    #[track_caller]
    fn from(err: rustls::Error) -> SinkError {
        let detail = err.to_string();
        SinkError::from_components(
            ErrorKind::ConfigError,
            Cow::Borrowed("TLS configuration failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts an invalid configured table name into a configuration error.
impl From<sink_postgres::TableNameError> for SinkError {
    #[track_caller]
    fn from(err: sink_postgres::TableNameError) -> SinkError {
        let detail = err.to_string();
        SinkError::from_components(
            ErrorKind::ConfigError,
            Cow::Borrowed("Invalid table name"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use lapin::protocol::{AMQPError, AMQPSoftError};
    use lapin::types::ShortString;

    use super::*;

    #[test]
    fn test_categories_group_kinds() {
        assert_eq!(
            ErrorKind::DeserializationError.category(),
            ErrorCategory::Decode
        );
        assert_eq!(
            ErrorKind::StoreConnectionFailed.category(),
            ErrorCategory::Connection
        );
        assert_eq!(ErrorKind::ArityMismatch.category(), ErrorCategory::Handler);
        assert_eq!(
            ErrorKind::ConstraintViolation.category(),
            ErrorCategory::Persistence
        );
        assert_eq!(
            ErrorKind::TopologyMismatch.category(),
            ErrorCategory::Topology
        );
    }

    #[test]
    fn test_fatal_kinds_are_not_retryable() {
        assert!(ErrorKind::BrokerConnectionFailed.is_connection_retryable());
        assert!(ErrorKind::ChannelRecycled.is_connection_retryable());
        assert!(!ErrorKind::BrokerAuthenticationFailed.is_connection_retryable());
        assert!(!ErrorKind::TopologyMismatch.is_connection_retryable());
        assert!(!ErrorKind::MissingField.is_connection_retryable());
    }

    fn channel_closed(soft: AMQPSoftError, text: &str) -> lapin::Error {
        lapin::Error::ProtocolError(AMQPError::new(
            AMQPErrorKind::Soft(soft),
            ShortString::from(text),
        ))
    }

    #[test]
    fn test_acknowledgement_timeout_is_recoverable() {
        let err = SinkError::from(channel_closed(
            AMQPSoftError::PRECONDITIONFAILED,
            "PRECONDITION_FAILED - delivery acknowledgement on channel 1 timed out. \
             Timeout value used: 1800000 ms",
        ));

        assert_eq!(err.kind(), ErrorKind::BrokerChannelFailed);
        assert!(!err.kind().is_fatal());
        assert!(err.kind().is_connection_retryable());
    }

    #[test]
    fn test_inequivalent_argument_is_topology_mismatch() {
        let err = SinkError::from(channel_closed(
            AMQPSoftError::PRECONDITIONFAILED,
            "PRECONDITION_FAILED - inequivalent arg 'x-message-ttl' for queue 'postgres' in \
             vhost '/': received the value '30000' of type 'signedint' but current is none",
        ));

        assert_eq!(err.kind(), ErrorKind::TopologyMismatch);
        assert!(err.kind().is_fatal());
    }

    #[test]
    fn test_access_refused_is_fatal() {
        let err = SinkError::from(channel_closed(
            AMQPSoftError::ACCESSREFUSED,
            "ACCESS_REFUSED - Login was refused using authentication mechanism PLAIN",
        ));

        assert_eq!(err.kind(), ErrorKind::BrokerAuthenticationFailed);
        assert!(err.kind().is_fatal());
    }

    #[test]
    fn test_display_includes_detail() {
        let err = SinkError::from((
            ErrorKind::MissingField,
            "Required field is missing",
            "field `From` is absent",
        ));

        let rendered = err.to_string();
        assert!(rendered.starts_with("[MissingField] Required field is missing @ "));
        assert!(rendered.contains("Detail:\n    field `From` is absent"));
    }

    #[test]
    fn test_single_error_vector_is_not_wrapped() {
        let err = SinkError::from(vec![SinkError::from((
            ErrorKind::IoError,
            "boom",
        ))]);

        assert_eq!(err.kinds(), vec![ErrorKind::IoError]);
        assert!(!err.to_string().starts_with("[Many]"));
    }

    #[test]
    fn test_many_errors_keep_all_kinds() {
        let err = SinkError::from(vec![
            SinkError::from((ErrorKind::TopologyMismatch, "primary")),
            SinkError::from((ErrorKind::BrokerAuthenticationFailed, "dead letter")),
        ]);

        assert_eq!(err.kind(), ErrorKind::TopologyMismatch);
        assert_eq!(
            err.kinds(),
            vec![
                ErrorKind::TopologyMismatch,
                ErrorKind::BrokerAuthenticationFailed
            ]
        );
        assert!(err.to_string().starts_with("[Many] 2 errors aggregated"));
    }

    #[test]
    fn test_wrap_keeps_original_as_source() {
        let inner = SinkError::from((ErrorKind::InvalidField, "Field has the wrong type"));
        let outer = inner.wrap(ErrorKind::HandlerFailed, "Handler failed");

        assert_eq!(outer.kind(), ErrorKind::HandlerFailed);
        assert_eq!(outer.detail(), Some("Field has the wrong type"));

        let source = outer
            .source()
            .and_then(|source| source.downcast_ref::<SinkError>())
            .unwrap();
        assert_eq!(source.kind(), ErrorKind::InvalidField);
    }

    #[test]
    fn test_json_syntax_error_is_decode_error() {
        let err: SinkError = serde_json::from_slice::<serde_json::Value>(b"{not json")
            .unwrap_err()
            .into();

        assert_eq!(err.category(), ErrorCategory::Decode);
    }
}
