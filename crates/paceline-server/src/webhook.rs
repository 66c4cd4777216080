//! Push-subscription client for the activity provider.
//!
//! Outside production the service registers its own short-lived callback
//! subscription at boot and releases it at shutdown. Production subscriptions
//! are provisioned out of band and deliberately survive restarts, so the
//! shutdown sequencer never calls [`release`](PushSubscription::release)
//! there.

use anyhow::Context;
use reqwest::Client;
use serde::Serialize;

use paceline_lifecycle::shutdown::Subscription;

#[derive(Clone, Debug)]
pub struct PushSubscription {
    http: Client,
    /// Provider endpoint, e.g. `https://api.provider.example/push_subscriptions`.
    endpoint: String,
    subscription_id: String,
    access_token: String,
    callback_url: String,
}

impl PushSubscription {
    pub fn new(
        endpoint: impl Into<String>,
        subscription_id: impl Into<String>,
        access_token: impl Into<String>,
        callback_url: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into(),
            subscription_id: subscription_id.into(),
            access_token: access_token.into(),
            callback_url: callback_url.into(),
        }
    }

    /// Register the callback with the provider. Invoked from a monitored
    /// background task at boot; failure is logged there, never fatal.
    pub async fn register(&self) -> anyhow::Result<()> {
        #[derive(Serialize)]
        struct RegisterBody<'a> {
            id: &'a str,
            callback_url: &'a str,
        }

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.access_token)
            .json(&RegisterBody {
                id: &self.subscription_id,
                callback_url: &self.callback_url,
            })
            .send()
            .await
            .context("subscription register request failed")?;
        resp.error_for_status()
            .context("provider rejected subscription register")?;

        tracing::info!(subscription = %self.subscription_id, "push subscription registered");
        Ok(())
    }
}

impl Subscription for PushSubscription {
    async fn release(self) -> anyhow::Result<()> {
        let url = format!(
            "{}/{}",
            self.endpoint.trim_end_matches('/'),
            self.subscription_id
        );
        let resp = self
            .http
            .delete(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .context("subscription release request failed")?;
        resp.error_for_status()
            .context("provider rejected subscription release")?;

        tracing::info!(subscription = %self.subscription_id, "push subscription released");
        Ok(())
    }
}
