//! Control-plane REST client
//!
//! Bearer-token authenticated JSON client. Non-2xx responses are mapped onto
//! [`ApiError`] by status code. A 422 only becomes [`ApiError::AlreadyExists`]
//! when it answers a create call sent through `send_create`.

use crate::error::{RemoteError, Result};
use crate::labels::LabelsApi;
use crate::onboarding::OnboardingApi;
use crate::space_roles::SpaceRolesApi;
use converge_core::ApiError;
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub const API_URL_ENV: &str = "CONVERGE_API_URL";
pub const API_TOKEN_ENV: &str = "CONVERGE_API_TOKEN";

/// Per-request timeout unless configured otherwise
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for [`ControlPlaneClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Create ClientConfig from environment variables
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var(API_URL_ENV)
            .map_err(|_| RemoteError::MissingEnvVar(API_URL_ENV.to_string()))?;
        let api_token = std::env::var(API_TOKEN_ENV).ok().filter(|t| !t.is_empty());

        Ok(Self {
            api_token,
            ..Self::new(base_url)
        })
    }
}

/// Control-plane API client
#[derive(Debug, Clone)]
pub struct ControlPlaneClient {
    client: reqwest::Client,
    base_url: Url,
    api_token: Option<String>,
}

impl ControlPlaneClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            RemoteError::InvalidConfig(format!("base_url {}: {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::InvalidConfig(format!(
                "base_url {} cannot be used as a base",
                config.base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RemoteError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            api_token: config.api_token,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Labels attached to one resource
    pub fn labels(&self, resource_id: impl Into<String>) -> LabelsApi<'_> {
        LabelsApi::new(self, resource_id.into())
    }

    /// Space roles granted to one user
    pub fn space_roles(&self, user_id: impl Into<String>) -> SpaceRolesApi<'_> {
        SpaceRolesApi::new(self, user_id.into())
    }

    /// Repository onboarding
    pub fn onboarding(&self) -> OnboardingApi<'_> {
        OnboardingApi::new(self)
    }

    /// Build an endpoint URL; each segment is percent-encoded
    pub(crate) fn endpoint(&self, segments: &[&str]) -> std::result::Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Transport(format!("invalid base URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) fn request(&self, method: Method, url: Url) -> RequestBuilder {
        tracing::debug!("{} {}", method, url);
        let builder = self.client.request(method, url);
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send and decode a JSON body
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        what: &str,
    ) -> std::result::Result<T, ApiError> {
        let response = builder.send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, what, &body));
        }
        response.json::<T>().await.map_err(transport)
    }

    /// Send a create call; 422 means the object already exists
    pub(crate) async fn send_create(
        &self,
        builder: RequestBuilder,
        what: &str,
    ) -> std::result::Result<(), ApiError> {
        match self.send_empty(builder, what).await {
            Err(ApiError::Status { code: 422, message }) => Err(ApiError::AlreadyExists(message)),
            other => other,
        }
    }

    /// Send and discard the body
    pub(crate) async fn send_empty(
        &self,
        builder: RequestBuilder,
        what: &str,
    ) -> std::result::Result<(), ApiError> {
        let response = builder.send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, what, &body));
        }
        Ok(())
    }
}

fn transport(e: reqwest::Error) -> ApiError {
    ApiError::Transport(e.to_string())
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "error")]
    message: String,
}

/// Map a non-2xx status onto the error taxonomy
pub(crate) fn map_status(status: StatusCode, what: &str, body: &str) -> ApiError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| body.trim().to_string());
    let detail = if message.is_empty() {
        what.to_string()
    } else {
        format!("{}: {}", what, message)
    };

    match status {
        StatusCode::NOT_FOUND => ApiError::NotFound(detail),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized(detail),
        _ => ApiError::Status {
            code: status.as_u16(),
            message: detail,
        },
    }
}
