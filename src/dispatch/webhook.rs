use async_trait::async_trait;
use reqwest::Url;
use serde::Serialize;
use std::time::Duration;

use super::Dispatcher;
use crate::error::DispatchError;

/// Request body sent for every delivery.
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    destination: &'a str,
    html: &'a str,
    text: &'a str,
}

/// Hands messages to an HTTP relay that knows how to reach the destination
/// chat (a bridge, a bot sidecar, ...).  Any non-2xx response is a failed
/// delivery.
pub struct WebhookDispatcher {
    url: Url,
    client: reqwest::Client,
}

impl WebhookDispatcher {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { url, client })
    }
}

#[async_trait]
impl Dispatcher for WebhookDispatcher {
    async fn deliver(
        &self,
        destination: &str,
        rich: &str,
        plain: &str,
    ) -> Result<(), DispatchError> {
        let payload = WebhookPayload {
            destination,
            html: rich,
            text: plain,
        };
        let response = self
            .client
            .post(self.url.clone())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Status(status));
        }
        Ok(())
    }
}
