use thiserror::Error;

/// Error outputs from `openfort-kit`.
#[derive(Debug, Error)]
pub enum OpenfortKitError {
    /// The shared client has not been configured yet.
    #[error(
        "uninitialized_client: configure the kit at application bootstrap by \
         passing a `ClientConfig` to `registry::get_or_init` or by calling \
         `registry::set`"
    )]
    Uninitialized,
    /// Network connection error with details.
    #[error("network_error: {url} (status: {status:?}): {error}")]
    NetworkError {
        /// URL of the failed request.
        url: String,
        /// HTTP status code, when a response was received.
        status: Option<u16>,
        /// Detail on the failure.
        error: String,
    },
    /// HTTP request failure.
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    /// The auth backend rejected an email verification attempt.
    #[error("verification_failed: {0}")]
    VerificationFailed(String),
    /// A URL could not be parsed.
    #[error(transparent)]
    UrlParse(#[from] url::ParseError),
}
