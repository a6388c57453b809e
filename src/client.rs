use serde::Serialize;

use crate::config::ClientConfig;
use crate::error::OpenfortKitError;
use crate::request::Request;

/// Payload for requesting a verification email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequest {
    /// Address the verification email is sent to.
    pub email: String,
    /// URL the verification link redirects back to. Carries the flow's query
    /// parameters so the confirmation phase can resume.
    pub redirect_url: String,
}

/// Payload for confirming a verification link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationConfirm {
    /// Address being verified.
    pub email: String,
    /// Opaque token issued by the backend, proving link authenticity.
    pub state: String,
}

/// Async surface of the embedded-wallet auth backend consumed by the
/// verification flow. [`Client`] is the HTTP-backed implementation; tests
/// substitute their own.
#[allow(async_fn_in_trait)]
pub trait EmailAuth {
    /// Asks the backend to send a verification email.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable or rejects the request.
    async fn request_email_verification(
        &self,
        request: &VerificationRequest,
    ) -> Result<(), OpenfortKitError>;

    /// Confirms an email address with the token from a verification link.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable or the token is not
    /// accepted.
    async fn verify_email(&self, confirm: &VerificationConfirm) -> Result<(), OpenfortKitError>;
}

const REQUEST_VERIFICATION_PATH: &str = "iam/v1/verify-email/request";
const CONFIRM_VERIFICATION_PATH: &str = "iam/v1/verify-email/confirm";

/// A configured Openfort client.
///
/// Construct one directly with [`Client::new`] for explicit dependency
/// injection, or through [`crate::registry`] when a single shared instance is
/// wanted.
#[derive(Debug)]
pub struct Client {
    config: ClientConfig,
    http: Request,
}

impl Client {
    /// Initializes a client from its configuration.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            http: Request::new(),
        }
    }

    /// The configuration this client was built with.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn post_json<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), OpenfortKitError> {
        let url = format!("{}/{path}", self.config.resolved_backend_url());
        let builder = self
            .http
            .post(&url)
            .bearer_auth(&self.config.publishable_key)
            .json(body);
        let response = self.http.handle(builder).await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let detail = response.text().await?;
        Err(OpenfortKitError::VerificationFailed(format!(
            "{url} returned {status}: {detail}"
        )))
    }
}

impl EmailAuth for Client {
    async fn request_email_verification(
        &self,
        request: &VerificationRequest,
    ) -> Result<(), OpenfortKitError> {
        self.post_json(REQUEST_VERIFICATION_PATH, request).await
    }

    async fn verify_email(&self, confirm: &VerificationConfirm) -> Result<(), OpenfortKitError> {
        self.post_json(CONFIRM_VERIFICATION_PATH, confirm).await
    }
}
