//! Two-phase email verification flow.
//!
//! The flow is driven entirely by the URL the user lands on and a single
//! persisted pending-email slot:
//!
//! 1. **Request phase** — the page loads without the verification flag. If an
//!    email is pending, a verification email is requested with a redirect URL
//!    pointing back at the current page, and the UI shows a "check your
//!    email" notice. With nothing pending, the flow exits to the login route.
//! 2. **Confirm phase** — the verification link redirects back with the flag,
//!    the address, and an opaque `state` token. The token is confirmed with
//!    the backend and the verification parameters are stripped from the URL
//!    in place.
//!
//! Each page load evaluates the flow exactly once; which phase runs is
//! decided synchronously from the URL shape at that instant.

use std::sync::Mutex;

use tracing::{debug, error, warn};
use url::Url;

use crate::client::{EmailAuth, VerificationConfirm, VerificationRequest};
use crate::error::OpenfortKitError;

/// Query parameter marking confirmation-phase entry.
pub const VERIFICATION_FLAG_PARAM: &str = "openfortEmailVerificationUI";

/// Query parameter carrying the address being verified.
pub const EMAIL_PARAM: &str = "email";

/// Query parameter carrying the opaque verification token.
pub const STATE_PARAM: &str = "state";

/// Canonical key under which key-value backed [`PendingEmailStore`]
/// implementations persist the pending address.
pub const PENDING_EMAIL_KEY: &str = "openfortPendingEmailVerification";

/// Message shown to the user when confirmation fails. The underlying error is
/// only logged.
pub const GENERIC_FAILURE_MESSAGE: &str =
    "The verification link could not be confirmed. Request a new one and try again.";

/// Single-slot persistence for the email awaiting verification.
///
/// A login flow writes the slot when it defers verification; the request
/// phase reads and clears it. Browser-backed consumers map this onto local
/// storage under [`PENDING_EMAIL_KEY`].
pub trait PendingEmailStore {
    /// The email awaiting verification, if any.
    fn pending_email(&self) -> Option<String>;
    /// Records `email` as awaiting verification.
    fn set_pending_email(&self, email: &str);
    /// Clears the slot.
    fn clear_pending_email(&self);
}

/// In-memory [`PendingEmailStore`], for native consumers and tests.
#[derive(Debug, Default)]
pub struct MemoryPendingEmailStore {
    slot: Mutex<Option<String>>,
}

impl MemoryPendingEmailStore {
    /// Creates an empty store.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }
}

impl PendingEmailStore for MemoryPendingEmailStore {
    fn pending_email(&self) -> Option<String> {
        self.slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn set_pending_email(&self, email: &str) {
        *self
            .slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(email.to_string());
    }

    fn clear_pending_email(&self) {
        *self
            .slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = None;
    }
}

/// Rewrites the malformed redirect some verification providers produce.
///
/// The redirect URL handed to the provider already carries a query string;
/// the provider then appends its own `?state=` pairing instead of `&state=`,
/// yielding a URL with two `?` delimiters. Any `?state=` occurring inside the
/// query string is rewritten to `&state=` so the whole thing parses as one
/// query.
#[must_use]
pub fn normalize_redirect_url(raw: &str) -> String {
    match raw.split_once('?') {
        Some((base, query)) if query.contains("?state=") => {
            format!("{base}?{}", query.replace("?state=", "&state="))
        }
        _ => raw.to_string(),
    }
}

/// Verification-related query parameters recognized on a page URL.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VerificationParams {
    /// Whether [`VERIFICATION_FLAG_PARAM`] is present.
    pub flag_present: bool,
    /// Value of [`EMAIL_PARAM`], when present.
    pub email: Option<String>,
    /// Value of [`STATE_PARAM`], when present.
    pub state: Option<String>,
}

impl VerificationParams {
    /// Extracts the recognized parameters from an already-parsed URL.
    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                VERIFICATION_FLAG_PARAM => params.flag_present = true,
                EMAIL_PARAM => params.email = Some(value.into_owned()),
                STATE_PARAM => params.state = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }
}

/// Result of the confirmation phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationOutcome {
    /// Whether the backend accepted the verification token.
    pub success: bool,
    /// Generic user-facing message on failure; `None` on success.
    pub error: Option<String>,
}

/// Observable states of the verification flow, each mapping to one screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    /// Parameters are being evaluated; render a loading indicator.
    Checking,
    /// The verification email was sent; render a "check your email" notice
    /// showing the address, with a restart action returning to the login
    /// route.
    AwaitingUserCheck {
        /// Address the email was sent to.
        email: String,
    },
    /// A verification token is being confirmed with the backend; render the
    /// same loading indicator as [`FlowState::Checking`].
    Confirming,
    /// Terminal. Render a success confirmation or the failure message, both
    /// with a continue action returning to the login route.
    Done(VerificationOutcome),
    /// The flow cannot run here; route to the external login screen.
    RedirectToLogin,
}

/// Outcome of evaluating the flow once for a page load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowTransition {
    /// State the UI should render next.
    pub state: FlowState,
    /// When set, the URL the page should display instead of the current one.
    /// Replaced in place — no navigation, no history entry.
    pub rewritten_url: Option<Url>,
}

impl FlowTransition {
    const fn state_only(state: FlowState) -> Self {
        Self {
            state,
            rewritten_url: None,
        }
    }
}

/// The email verification flow, wired to an auth backend and a pending-email
/// slot.
pub struct VerificationFlow<'a, A, S> {
    auth: &'a A,
    store: &'a S,
}

impl<'a, A: EmailAuth, S: PendingEmailStore> VerificationFlow<'a, A, S> {
    /// Wires the flow to its collaborators.
    pub const fn new(auth: &'a A, store: &'a S) -> Self {
        Self { auth, store }
    }

    /// Evaluates the flow exactly once for the page at `current_url`.
    ///
    /// Backend failures never propagate out of this method; they are logged
    /// and folded into the returned state. The request phase is optimistic —
    /// a failed send still moves to [`FlowState::AwaitingUserCheck`], the
    /// user simply will not receive the email.
    ///
    /// # Errors
    ///
    /// Returns an error only when `current_url` cannot be parsed as a URL.
    pub async fn evaluate(&self, current_url: &str) -> Result<FlowTransition, OpenfortKitError> {
        let url = Url::parse(&normalize_redirect_url(current_url))?;
        let params = VerificationParams::from_url(&url);

        let transition = if params.flag_present {
            self.confirm(&url, params).await
        } else {
            self.request(&url).await
        };
        Ok(transition)
    }

    /// Request phase: the page was reached without the verification flag.
    async fn request(&self, url: &Url) -> FlowTransition {
        let Some(email) = self.store.pending_email() else {
            debug!("no email pending verification; routing to login");
            return FlowTransition::state_only(FlowState::RedirectToLogin);
        };

        let request = VerificationRequest {
            email: email.clone(),
            redirect_url: request_redirect_url(url, &email),
        };
        if let Err(err) = self.auth.request_email_verification(&request).await {
            // Non-fatal: the user simply will not receive the email.
            warn!(error = %err, "email verification request failed");
        }
        self.store.clear_pending_email();

        FlowTransition::state_only(FlowState::AwaitingUserCheck { email })
    }

    /// Confirm phase: the verification link redirected back with the flag.
    async fn confirm(&self, url: &Url, params: VerificationParams) -> FlowTransition {
        let Some(state) = params.state else {
            // A verification redirect without its token is a defect in the
            // link, not a user error. Routing to login beats stalling.
            error!("verification redirect is missing the `state` token; routing to login");
            return FlowTransition::state_only(FlowState::RedirectToLogin);
        };
        let Some(email) = params.email else {
            debug!("verification redirect is missing the email; routing to login");
            return FlowTransition::state_only(FlowState::RedirectToLogin);
        };

        let confirm = VerificationConfirm { email, state };
        let outcome = match self.auth.verify_email(&confirm).await {
            Ok(()) => VerificationOutcome {
                success: true,
                error: None,
            },
            Err(err) => {
                error!(error = %err, "email verification failed");
                VerificationOutcome {
                    success: false,
                    error: Some(GENERIC_FAILURE_MESSAGE.to_string()),
                }
            }
        };

        FlowTransition {
            state: FlowState::Done(outcome),
            rewritten_url: Some(strip_verification_params(url)),
        }
    }
}

/// Builds the redirect URL for a verification request: the current
/// origin+path carrying only the verification flag and the address.
#[must_use]
fn request_redirect_url(url: &Url, email: &str) -> String {
    let mut redirect = url.clone();
    redirect.set_fragment(None);
    redirect.set_query(None);
    redirect
        .query_pairs_mut()
        .append_pair(VERIFICATION_FLAG_PARAM, "true")
        .append_pair(EMAIL_PARAM, email);
    redirect.into()
}

/// Returns `url` with the three verification parameters removed, preserving
/// everything else.
#[must_use]
pub fn strip_verification_params(url: &Url) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| {
            key != VERIFICATION_FLAG_PARAM && key != EMAIL_PARAM && key != STATE_PARAM
        })
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut stripped = url.clone();
    stripped.set_query(None);
    if !kept.is_empty() {
        stripped.query_pairs_mut().extend_pairs(kept);
    }
    stripped
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use test_case::test_case;

    use super::*;

    /// Scriptable [`EmailAuth`] double recording every call.
    #[derive(Default)]
    struct MockAuth {
        requests: Mutex<Vec<VerificationRequest>>,
        confirms: Mutex<Vec<VerificationConfirm>>,
        fail_requests: bool,
        fail_confirms: bool,
    }

    impl MockAuth {
        fn failing_requests() -> Self {
            Self {
                fail_requests: true,
                ..Self::default()
            }
        }

        fn failing_confirms() -> Self {
            Self {
                fail_confirms: true,
                ..Self::default()
            }
        }

        fn recorded_requests(&self) -> Vec<VerificationRequest> {
            self.requests.lock().unwrap().clone()
        }

        fn recorded_confirms(&self) -> Vec<VerificationConfirm> {
            self.confirms.lock().unwrap().clone()
        }
    }

    impl EmailAuth for MockAuth {
        async fn request_email_verification(
            &self,
            request: &VerificationRequest,
        ) -> Result<(), OpenfortKitError> {
            self.requests.lock().unwrap().push(request.clone());
            if self.fail_requests {
                return Err(OpenfortKitError::VerificationFailed(
                    "backend said no".to_string(),
                ));
            }
            Ok(())
        }

        async fn verify_email(
            &self,
            confirm: &VerificationConfirm,
        ) -> Result<(), OpenfortKitError> {
            self.confirms.lock().unwrap().push(confirm.clone());
            if self.fail_confirms {
                return Err(OpenfortKitError::VerificationFailed(
                    "state token expired".to_string(),
                ));
            }
            Ok(())
        }
    }

    /// Routes the flow's log lines to the test writer. Idempotent.
    fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("openfort_kit=debug")
            .with_test_writer()
            .try_init();
    }

    fn store_with(email: Option<&str>) -> MemoryPendingEmailStore {
        let store = MemoryPendingEmailStore::new();
        if let Some(email) = email {
            store.set_pending_email(email);
        }
        store
    }

    #[tokio::test]
    async fn no_flag_and_no_pending_email_exits_to_login() {
        let auth = MockAuth::default();
        let store = store_with(None);
        let flow = VerificationFlow::new(&auth, &store);

        let transition = flow.evaluate("https://app/callback").await.unwrap();

        assert_eq!(transition.state, FlowState::RedirectToLogin);
        assert!(transition.rewritten_url.is_none());
        assert!(auth.recorded_requests().is_empty());
        assert!(auth.recorded_confirms().is_empty());
    }

    #[tokio::test]
    async fn pending_email_triggers_a_request_and_clears_the_slot() {
        let auth = MockAuth::default();
        let store = store_with(Some("a@b.com"));
        let flow = VerificationFlow::new(&auth, &store);

        let transition = flow.evaluate("https://app/callback").await.unwrap();

        assert_eq!(
            transition.state,
            FlowState::AwaitingUserCheck {
                email: "a@b.com".to_string()
            }
        );
        let requests = auth.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].email, "a@b.com");
        assert_eq!(
            requests[0].redirect_url,
            "https://app/callback?openfortEmailVerificationUI=true&email=a%40b.com"
        );
        assert!(store.pending_email().is_none());
    }

    #[tokio::test]
    async fn request_failure_is_swallowed_and_stays_optimistic() {
        init_test_tracing();
        let auth = MockAuth::failing_requests();
        let store = store_with(Some("a@b.com"));
        let flow = VerificationFlow::new(&auth, &store);

        let transition = flow.evaluate("https://app/callback").await.unwrap();

        assert_eq!(
            transition.state,
            FlowState::AwaitingUserCheck {
                email: "a@b.com".to_string()
            }
        );
        assert!(store.pending_email().is_none());
    }

    #[tokio::test]
    async fn successful_confirmation_strips_the_url() {
        let auth = MockAuth::default();
        let store = store_with(None);
        let flow = VerificationFlow::new(&auth, &store);

        let transition = flow
            .evaluate(
                "https://app/callback?openfortEmailVerificationUI=true&state=XYZ&email=a%40b.com",
            )
            .await
            .unwrap();

        assert_eq!(
            transition.state,
            FlowState::Done(VerificationOutcome {
                success: true,
                error: None
            })
        );
        let confirms = auth.recorded_confirms();
        assert_eq!(confirms.len(), 1);
        assert_eq!(confirms[0].email, "a@b.com");
        assert_eq!(confirms[0].state, "XYZ");

        let rewritten = transition.rewritten_url.unwrap();
        assert_eq!(rewritten.as_str(), "https://app/callback");
    }

    #[tokio::test]
    async fn failed_confirmation_reports_a_generic_error_and_still_strips() {
        init_test_tracing();
        let auth = MockAuth::failing_confirms();
        let store = store_with(None);
        let flow = VerificationFlow::new(&auth, &store);

        let transition = flow
            .evaluate(
                "https://app/callback?openfortEmailVerificationUI=true&state=XYZ&email=a%40b.com",
            )
            .await
            .unwrap();

        let FlowState::Done(outcome) = transition.state else {
            panic!("expected a terminal state");
        };
        assert!(!outcome.success);
        let message = outcome.error.unwrap();
        assert!(!message.is_empty());
        // The backend detail stays in the log, not in the user-facing message.
        assert!(!message.contains("state token expired"));

        let rewritten = transition.rewritten_url.unwrap();
        assert!(rewritten.query().is_none());
    }

    #[tokio::test]
    async fn stripping_preserves_unrelated_parameters() {
        let auth = MockAuth::default();
        let store = store_with(None);
        let flow = VerificationFlow::new(&auth, &store);

        let transition = flow
            .evaluate(
                "https://app/callback?theme=dark&openfortEmailVerificationUI=true&state=XYZ&email=a%40b.com",
            )
            .await
            .unwrap();

        let rewritten = transition.rewritten_url.unwrap();
        assert_eq!(rewritten.as_str(), "https://app/callback?theme=dark");
    }

    #[tokio::test]
    async fn missing_state_token_routes_to_login() {
        let auth = MockAuth::default();
        let store = store_with(None);
        let flow = VerificationFlow::new(&auth, &store);

        let transition = flow
            .evaluate("https://app/callback?openfortEmailVerificationUI=true&email=a%40b.com")
            .await
            .unwrap();

        assert_eq!(transition.state, FlowState::RedirectToLogin);
        assert!(auth.recorded_confirms().is_empty());
    }

    #[tokio::test]
    async fn missing_email_routes_to_login() {
        let auth = MockAuth::default();
        let store = store_with(None);
        let flow = VerificationFlow::new(&auth, &store);

        let transition = flow
            .evaluate("https://app/callback?openfortEmailVerificationUI=true&state=XYZ")
            .await
            .unwrap();

        assert_eq!(transition.state, FlowState::RedirectToLogin);
        assert!(auth.recorded_confirms().is_empty());
    }

    #[tokio::test]
    async fn providers_second_question_mark_is_normalized_before_parsing() {
        let auth = MockAuth::default();
        let store = store_with(None);
        let flow = VerificationFlow::new(&auth, &store);

        let transition = flow
            .evaluate("https://app/callback?openfortEmailVerificationUI=true&email=a%40b.com?state=XYZ")
            .await
            .unwrap();

        assert!(matches!(transition.state, FlowState::Done(_)));
        let confirms = auth.recorded_confirms();
        assert_eq!(confirms[0].state, "XYZ");
        assert_eq!(confirms[0].email, "a@b.com");
    }

    #[test_case(
        "https://app/callback?openfortEmailVerificationUI=true&email=a%40b.com?state=XYZ",
        "https://app/callback?openfortEmailVerificationUI=true&email=a%40b.com&state=XYZ";
        "second question mark becomes an ampersand"
    )]
    #[test_case(
        "https://app/callback?state=XYZ&email=a@b.com&openfortEmailVerificationUI=true",
        "https://app/callback?state=XYZ&email=a@b.com&openfortEmailVerificationUI=true";
        "well formed urls pass through untouched"
    )]
    #[test_case("https://app/callback", "https://app/callback"; "no query passes through")]
    fn normalization_cases(raw: &str, expected: &str) {
        assert_eq!(normalize_redirect_url(raw), expected);
    }

    #[test]
    fn parameter_order_does_not_matter() {
        let reordered = Url::parse(
            &normalize_redirect_url(
                "https://app/callback?state=XYZ&email=a@b.com&openfortEmailVerificationUI=true",
            ),
        )
        .unwrap();
        let canonical = Url::parse(
            "https://app/callback?openfortEmailVerificationUI=true&state=XYZ&email=a@b.com",
        )
        .unwrap();

        assert_eq!(
            VerificationParams::from_url(&reordered),
            VerificationParams::from_url(&canonical)
        );
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryPendingEmailStore::new();
        assert!(store.pending_email().is_none());
        store.set_pending_email("a@b.com");
        assert_eq!(store.pending_email().as_deref(), Some("a@b.com"));
        store.clear_pending_email();
        assert!(store.pending_email().is_none());
    }
}
