use fail::fail_point;

use crate::bail;
use crate::error::{ErrorKind, SinkResult};

pub const SESSION_COMMIT_FP: &str = "session.commit";
pub const STORE_CONNECT_FP: &str = "store.connect";

/// Raises an error when the fail point `name` is configured to return.
///
/// The fail point parameter selects the error: `connection` raises a store connection error,
/// anything else a failed query.
pub fn sink_fail_point(name: &str) -> SinkResult<()> {
    fail_point!(name, |parameter| {
        let error_kind = match parameter.as_deref() {
            Some("connection") => ErrorKind::StoreConnectionFailed,
            _ => ErrorKind::StoreQueryFailed,
        };

        bail!(
            error_kind,
            "An error occurred in a fail point",
            format!("The failpoint '{name}' returned an error")
        );
    });

    Ok(())
}

