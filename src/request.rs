use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::{Method, RequestBuilder, Response};

use crate::error::OpenfortKitError;

/// A thin wrapper on an HTTP client for talking to the Openfort backend.
/// Applies a timeout, a user-agent, enforces HTTPS outside tests, and retries
/// transient failures with exponential backoff.
#[derive(Debug)]
pub(crate) struct Request {
    client: reqwest::Client,
    timeout: Duration,
    max_retries: u32,
}

impl Request {
    pub(crate) fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3, // total attempts = 4
        }
    }

    /// Creates a POST request builder with defaults applied.
    pub(crate) fn post(&self, url: &str) -> RequestBuilder {
        #[cfg(not(test))]
        assert!(url.starts_with("https"));

        self.client
            .request(Method::POST, url)
            .timeout(self.timeout)
            .header(
                "User-Agent",
                format!("openfort-kit/{}", env!("CARGO_PKG_VERSION")),
            )
    }

    /// Sends a request built by `post`, retrying 429/5xx responses and
    /// timeout/connect errors.
    pub(crate) async fn handle(
        &self,
        request_builder: RequestBuilder,
    ) -> Result<Response, OpenfortKitError> {
        let Some(template) = request_builder.try_clone() else {
            // Streaming bodies cannot be retried; send once.
            return execute(request_builder).await.map_err(Into::into);
        };

        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(2))
            .with_max_times(self.max_retries as usize);

        (|| async {
            let request_builder = template.try_clone().ok_or_else(|| {
                TransportError::permanent(
                    "<unknown>".to_string(),
                    None,
                    "request template is no longer cloneable".to_string(),
                )
            })?;
            execute(request_builder).await
        })
        .retry(backoff)
        .when(TransportError::is_retryable)
        .await
        .map_err(Into::into)
    }
}

#[derive(Debug)]
struct TransportError {
    url: String,
    status: Option<u16>,
    error: String,
    retryable: bool,
}

impl TransportError {
    const fn retryable(url: String, status: Option<u16>, error: String) -> Self {
        Self {
            url,
            status,
            error,
            retryable: true,
        }
    }

    const fn permanent(url: String, status: Option<u16>, error: String) -> Self {
        Self {
            url,
            status,
            error,
            retryable: false,
        }
    }

    const fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl From<TransportError> for OpenfortKitError {
    fn from(value: TransportError) -> Self {
        Self::NetworkError {
            url: value.url,
            status: value.status,
            error: value.error,
        }
    }
}

async fn execute(request_builder: RequestBuilder) -> Result<Response, TransportError> {
    let (client, request) = request_builder.build_split();
    let request = request.map_err(|err| {
        TransportError::permanent(
            err.url()
                .map_or_else(|| "<unknown>".to_string(), ToString::to_string),
            None,
            format!("request build failed: {err}"),
        )
    })?;
    let url = request.url().to_string();

    match client.execute(request).await {
        Ok(resp) => {
            let status = resp.status().as_u16();
            if status == 429 || (500..600).contains(&status) {
                return Err(TransportError::retryable(
                    url,
                    Some(status),
                    format!("request error with bad status code {status}"),
                ));
            }
            Ok(resp)
        }
        Err(err) if err.is_timeout() || err.is_connect() => Err(TransportError::retryable(
            url,
            None,
            format!("request timeout/connect error: {err}"),
        )),
        Err(err) => Err(TransportError::permanent(
            url,
            None,
            format!("request failed: {err}"),
        )),
    }
}
