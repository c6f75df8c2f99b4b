//! Small adapter-shared helpers.

use ro_domain::error::Error;

/// Convert a [`reqwest::Error`] into the domain [`Error`] type. Timeouts
/// map to `External` just like every other upstream failure — the
/// distinction the caller cares about is retryability, decided by the
/// component that dispatched the call, not by this conversion.
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    Error::external(format!("provider http error: {e}"))
}
