//! HTTP client for the remote authentication gateway.
//!
//! Each handshake step is a JSON `POST` to
//! `{base}/v1/sessions/{identity}/{step}`. The gateway keeps one provider
//! session per identity. Failures come back as a non-2xx status with a body
//! of the form `{"error": "PHONE_CODE_INVALID"}`.

use super::{AuthProtocol, Profile, ProtocolError};
use crate::APP_USER_AGENT;
use anyhow::{Context, anyhow};
use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    base_url: Url,
    token: Option<SecretString>,
    timeout: Duration,
}

impl GatewayConfig {
    /// # Errors
    /// Returns an error if `base_url` is not an absolute http(s) URL.
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid protocol gateway URL: {base_url}"))?;
        match base_url.scheme() {
            "http" | "https" => {}
            scheme => return Err(anyhow!("Unsupported protocol gateway scheme: {scheme}")),
        }
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("Protocol gateway URL cannot be a base: {base_url}"));
        }

        Ok(Self {
            base_url,
            token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        })
    }

    #[must_use]
    pub fn with_token(mut self, token: Option<SecretString>) -> Self {
        self.token = token;
        self
    }

    #[must_use]
    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout = Duration::from_secs(seconds.max(1));
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[derive(Deserialize, Debug)]
struct ErrorBody {
    error: String,
}

#[derive(Debug)]
pub struct GatewayClient {
    client: Client,
    config: GatewayConfig,
}

impl GatewayClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: GatewayConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(config.timeout())
            .build()
            .context("Failed to build protocol gateway client")?;

        Ok(Self { client, config })
    }

    fn step_url(&self, identity: &str, step: &str) -> Result<Url, ProtocolError> {
        let mut url = self.config.base_url().clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("Protocol gateway URL cannot be a base"))?
            .pop_if_empty()
            .extend(["v1", "sessions", identity, step]);
        Ok(url)
    }

    async fn post(&self, identity: &str, step: &str, body: Value) -> Result<Response, ProtocolError> {
        let url = self.step_url(identity, step)?;

        debug!("protocol gateway request: {}", url);

        let mut request = self.client.post(url.clone()).json(&body);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Protocol gateway request failed: {url}"))?;

        if response.status().is_success() {
            return Ok(response);
        }

        Err(classify_failure(response).await)
    }

    async fn post_for_profile(
        &self,
        identity: &str,
        step: &str,
        body: Value,
    ) -> Result<Profile, ProtocolError> {
        let response = self.post(identity, step, body).await?;
        let profile = response
            .json::<Profile>()
            .await
            .context("Invalid profile in protocol gateway response")?;
        Ok(profile)
    }
}

async fn classify_failure(response: Response) -> ProtocolError {
    let status = response.status();
    let body = match response.text().await {
        Ok(body) => body,
        Err(err) => return ProtocolError::Other(anyhow!("{status}: unreadable body: {err}")),
    };

    match serde_json::from_str::<ErrorBody>(&body) {
        Ok(ErrorBody { error }) => ProtocolError::from_rpc_name(&error)
            .unwrap_or_else(|| ProtocolError::Other(anyhow!("{status}: {error}"))),
        Err(_) => ProtocolError::Other(anyhow!("{status}: {body}")),
    }
}

#[async_trait]
impl AuthProtocol for GatewayClient {
    #[instrument(skip(self))]
    async fn submit_phone(&self, identity: &str, phone: &str) -> Result<(), ProtocolError> {
        self.post(identity, "phone", json!({ "phone": phone }))
            .await
            .map(|_| ())
    }

    #[instrument(skip(self, code))]
    async fn submit_code(&self, identity: &str, code: &str) -> Result<Profile, ProtocolError> {
        self.post_for_profile(identity, "code", json!({ "code": code }))
            .await
    }

    #[instrument(skip(self, password))]
    async fn submit_password(
        &self,
        identity: &str,
        password: &SecretString,
    ) -> Result<Profile, ProtocolError> {
        self.post_for_profile(
            identity,
            "password",
            json!({ "password": password.expose_secret() }),
        )
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::{Json, Router, extract::Path, http::StatusCode, routing::post};
    use tokio::net::TcpListener;

    async fn spawn_gateway() -> String {
        let app = Router::new().route(
            "/v1/sessions/:identity/:step",
            post(
                |Path((identity, step)): Path<(String, String)>, Json(body): Json<Value>| async move {
                    match (step.as_str(), body) {
                        ("phone", body) if body["phone"] == "+123" => {
                            (StatusCode::OK, Json(json!({})))
                        }
                        ("phone", _) => (
                            StatusCode::BAD_REQUEST,
                            Json(json!({ "error": "PHONE_NUMBER_INVALID" })),
                        ),
                        ("code", body) if body["code"] == "12345" => (
                            StatusCode::OK,
                            Json(json!({ "id": 42, "username": identity })),
                        ),
                        ("code", _) => (
                            StatusCode::UNAUTHORIZED,
                            Json(json!({ "error": "SESSION_PASSWORD_NEEDED" })),
                        ),
                        _ => (
                            StatusCode::BAD_GATEWAY,
                            Json(json!({ "error": "AUTH_RESTART" })),
                        ),
                    }
                },
            ),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/")
    }

    #[test]
    fn config_rejects_non_http_schemes() {
        assert!(GatewayConfig::new("ftp://gateway.local").is_err());
        assert!(GatewayConfig::new("not a url").is_err());
        assert!(GatewayConfig::new("https://gateway.local/api").is_ok());
    }

    #[test]
    fn config_timeout_is_at_least_one_second() {
        let config = GatewayConfig::new("https://gateway.local")
            .unwrap()
            .with_timeout_seconds(0);
        assert_eq!(config.timeout(), Duration::from_secs(1));
    }

    #[test]
    fn step_url_encodes_identity_segment() {
        let config = GatewayConfig::new("https://gateway.local/api/").unwrap();
        let client = GatewayClient::new(config).unwrap();
        let url = client.step_url("@alice:example.com", "code").unwrap();
        assert_eq!(
            url.as_str(),
            "https://gateway.local/api/v1/sessions/@alice:example.com/code"
        );

        let url = client.step_url("@a/b:example.com", "phone").unwrap();
        assert!(url.path().ends_with("/sessions/@a%2Fb:example.com/phone"));
    }

    #[tokio::test]
    async fn gateway_round_trip_maps_errors() {
        let base = spawn_gateway().await;
        let client = GatewayClient::new(GatewayConfig::new(&base).unwrap()).unwrap();

        assert!(client.submit_phone("@alice:example.com", "+123").await.is_ok());
        assert!(matches!(
            client.submit_phone("@alice:example.com", "nope").await,
            Err(ProtocolError::InvalidPhoneNumber)
        ));

        let profile = client
            .submit_code("@alice:example.com", "12345")
            .await
            .unwrap();
        assert_eq!(profile.id, 42);
        assert_eq!(profile.username.as_deref(), Some("@alice:example.com"));

        assert!(matches!(
            client.submit_code("@alice:example.com", "00000").await,
            Err(ProtocolError::PasswordNeeded)
        ));

        let password = SecretString::from("hunter2".to_string());
        assert!(matches!(
            client.submit_password("@alice:example.com", &password).await,
            Err(ProtocolError::Other(_))
        ));
    }
}
