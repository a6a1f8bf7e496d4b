//! Remote tier: a thin typed wrapper over the backend's user record.
//!
//! The remote is advisory. Any transport error, timeout, rejected auth, or
//! missing token collapses to "unavailable" here, never an error into the
//! synchronizer, which carries on with the local tier or the default. No
//! retry happens at this layer: one attempt per load cycle is the designed
//! behavior, and the caller decides when to try again.

use async_trait::async_trait;

/// Reads and best-effort writes one preference field of the remote user
/// record.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// The value last known by the backend for `identity`, or `None` when
    /// the remote has no value or is unreachable.
    async fn fetch(&self, identity: &str) -> Option<String>;

    /// Write-through of a new value. Returns whether the backend accepted
    /// it; callers never revert local state on `false`.
    async fn push(&self, identity: &str, value: &str) -> bool;
}

/// Gateway for deployments without a preference backend: fetch finds
/// nothing, pushes go nowhere. Also the hermetic gateway for tests.
#[derive(Debug, Default)]
pub struct OfflineRemote;

impl OfflineRemote {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RemoteGateway for OfflineRemote {
    async fn fetch(&self, _identity: &str) -> Option<String> {
        None
    }

    async fn push(&self, _identity: &str, _value: &str) -> bool {
        false
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub mod http {
    use super::RemoteGateway;
    use crate::identity::IdentitySource;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// HTTP gateway against a single authenticated user-record endpoint:
    /// GET `/users/me` returns a JSON record containing all preference
    /// fields, PATCH `/users/me` partially updates it.
    ///
    /// The bearer token comes from the injected [`IdentitySource`]; without
    /// a token the call short-circuits locally instead of issuing an
    /// unauthenticated request.
    pub struct HttpRemoteGateway {
        client: reqwest::Client,
        base_url: String,
        field: String,
        identity: Arc<dyn IdentitySource>,
    }

    impl HttpRemoteGateway {
        pub fn new(
            base_url: impl Into<String>,
            field: impl Into<String>,
            identity: Arc<dyn IdentitySource>,
        ) -> Self {
            let client = reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default();
            Self {
                client,
                base_url: base_url.into().trim_end_matches('/').to_string(),
                field: field.into(),
                identity,
            }
        }

        fn user_url(&self) -> String {
            format!("{}/users/me", self.base_url)
        }

        fn token(&self) -> Option<String> {
            self.identity.current().token
        }
    }

    #[async_trait]
    impl RemoteGateway for HttpRemoteGateway {
        async fn fetch(&self, identity: &str) -> Option<String> {
            let Some(token) = self.token() else {
                tracing::debug!(identity, field = %self.field, "no session token, skipping remote read");
                return None;
            };

            let response = match self
                .client
                .get(self.user_url())
                .bearer_auth(token)
                .send()
                .await
            {
                Ok(response) => response,
                Err(error) => {
                    tracing::debug!(identity, field = %self.field, %error, "remote read failed");
                    return None;
                }
            };

            if !response.status().is_success() {
                tracing::debug!(
                    identity,
                    field = %self.field,
                    status = %response.status(),
                    "remote read rejected"
                );
                return None;
            }

            let record: serde_json::Value = response.json().await.ok()?;
            record
                .get(&self.field)
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        }

        async fn push(&self, identity: &str, value: &str) -> bool {
            let Some(token) = self.token() else {
                tracing::debug!(identity, field = %self.field, "no session token, skipping remote write");
                return false;
            };

            let mut body = serde_json::Map::new();
            body.insert(
                self.field.clone(),
                serde_json::Value::String(value.to_string()),
            );

            match self
                .client
                .patch(self.user_url())
                .bearer_auth(token)
                .json(&serde_json::Value::Object(body))
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => true,
                Ok(response) => {
                    tracing::debug!(
                        identity,
                        field = %self.field,
                        status = %response.status(),
                        "remote write rejected"
                    );
                    false
                }
                Err(error) => {
                    tracing::debug!(identity, field = %self.field, %error, "remote write failed");
                    false
                }
            }
        }
    }
}
