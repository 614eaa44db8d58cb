//! Reachability probe against the API's version endpoint.

use serde_json::Value;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::api::ApiClient;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiStatus {
    pub is_api_up: bool,
    pub loading: bool,
    pub error: Option<String>,
    pub version: Option<Value>,
}

pub struct ApiStatusMonitor {
    api: ApiClient,
    state: watch::Sender<ApiStatus>,
}

impl ApiStatusMonitor {
    pub fn new(api: ApiClient) -> Self {
        let (state, _) = watch::channel(ApiStatus::default());
        Self { api, state }
    }

    pub async fn check(&self) -> ApiStatus {
        self.state.send_modify(|status| {
            status.loading = true;
            status.error = None;
        });

        let outcome = self.api.version().await;
        self.state.send_modify(|status| {
            status.loading = false;
            match outcome {
                Ok(version) => {
                    info!(base_url = %self.api.base_url(), "api reachable");
                    status.is_api_up = true;
                    status.version = Some(version);
                }
                Err(failure) => {
                    warn!(base_url = %self.api.base_url(), %failure, "api unreachable");
                    status.is_api_up = false;
                    status.error = Some(failure.to_string());
                    status.version = None;
                }
            }
        });
        self.status()
    }

    pub fn status(&self) -> ApiStatus {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ApiStatus> {
        self.state.subscribe()
    }
}
