//! HTTP client for the inventory API.

use std::{sync::Arc, time::Duration};

use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use shared::protocol::{AcquiredToken, TokenAcquireRequest};
use tracing::warn;
use url::Url;

use crate::{
    error_handler::ErrorHandler,
    session::CredentialStore,
    transport::{ensure_success, TransportFailure},
};

const REPORT_CONTEXT: &str = "API Request";

/// HTTP client bound to the inventory API base URL. Attaches the stored bearer
/// token and, when configured, reports every failure to the [`ErrorHandler`].
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    credentials: Arc<dyn CredentialStore>,
    reporter: Option<ErrorHandler>,
}

impl ApiClient {
    pub fn new(
        base_url: Url,
        credentials: Arc<dyn CredentialStore>,
        timeout: Duration,
    ) -> Result<Self, TransportFailure> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url,
            credentials,
            reporter: None,
        })
    }

    pub fn with_error_reporting(mut self, handler: ErrorHandler) -> Self {
        self.reporter = Some(handler);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub async fn acquire_token(
        &self,
        request: &TokenAcquireRequest,
    ) -> Result<AcquiredToken, TransportFailure> {
        let builder = self.http.post(self.endpoint("mobile/acquire-token")).json(request);
        let response = self.execute(builder).await?;
        let raw = self.read(response.text().await)?;
        Ok(AcquiredToken::parse(&raw))
    }

    pub async fn wipe_tokens(&self) -> Result<(), TransportFailure> {
        let builder = self.http.get(self.endpoint("mobile/wipe"));
        self.execute(builder).await?;
        Ok(())
    }

    pub async fn version(&self) -> Result<Value, TransportFailure> {
        let builder = self.http.get(self.endpoint("info/version"));
        let response = self.execute(builder).await?;
        self.read(response.json::<Value>().await)
    }

    async fn execute(&self, builder: RequestBuilder) -> Result<Response, TransportFailure> {
        let builder = self.authorize(builder).await;
        let outcome = match builder.send().await {
            Ok(response) => ensure_success(response).await,
            Err(error) => Err(TransportFailure::from(error)),
        };
        outcome.map_err(|failure| self.report(failure))
    }

    fn read<T>(&self, body: reqwest::Result<T>) -> Result<T, TransportFailure> {
        body.map_err(|error| self.report(TransportFailure::from(error)))
    }

    async fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.credentials.load().await {
            Ok(Some(token)) => builder.bearer_auth(token),
            Ok(None) => builder,
            Err(error) => {
                warn!(%error, "could not read stored credential; sending unauthenticated");
                builder
            }
        }
    }

    fn report(&self, failure: TransportFailure) -> TransportFailure {
        if let Some(handler) = &self.reporter {
            handler.handle_error(&failure, Some(REPORT_CONTEXT));
        }
        failure
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
