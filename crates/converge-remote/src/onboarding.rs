//! Repository onboarding
//!
//! An onboard request is accepted immediately and returns an operation id;
//! the repository then reports `Syncing` until the backend settles on
//! `Connected` or `Failed`.

use crate::client::ControlPlaneClient;
use async_trait::async_trait;
use converge_core::{ApiError, AsyncOperationApi, TerminalStates};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What to onboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryOnboarding {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,
}

impl RepositoryOnboarding {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_branch: None,
        }
    }

    pub fn with_default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = Some(branch.into());
        self
    }
}

/// Handle of an accepted onboard request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardingHandle {
    pub repository: String,
    pub operation_id: String,
}

/// Repository sync status as reported by the control plane
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum SyncStatus {
    Syncing,
    Connected,
    Failed,
    Unknown(String),
}

impl From<String> for SyncStatus {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "syncing" => SyncStatus::Syncing,
            "connected" => SyncStatus::Connected,
            "failed" => SyncStatus::Failed,
            _ => SyncStatus::Unknown(s),
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Syncing => write!(f, "Syncing"),
            SyncStatus::Connected => write!(f, "Connected"),
            SyncStatus::Failed => write!(f, "Failed"),
            SyncStatus::Unknown(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Serialize)]
struct OnboardRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    default_branch: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct OnboardAccepted {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RepositoryState {
    sync_status: SyncStatus,
}

pub struct OnboardingApi<'a> {
    client: &'a ControlPlaneClient,
}

impl<'a> OnboardingApi<'a> {
    pub(crate) fn new(client: &'a ControlPlaneClient) -> Self {
        Self { client }
    }

    /// Current sync status of a repository
    pub async fn sync_status(&self, repository: &str) -> Result<SyncStatus, ApiError> {
        let url = self.client.endpoint(&["repositories", repository])?;
        let builder = self.client.request(Method::GET, url);
        let state: RepositoryState = self
            .client
            .send_json(builder, &format!("get repository {}", repository))
            .await?;
        Ok(state.sync_status)
    }
}

#[async_trait]
impl<'a> AsyncOperationApi for OnboardingApi<'a> {
    type Spec = RepositoryOnboarding;
    type Handle = OnboardingHandle;
    type Status = SyncStatus;

    fn describe(&self, spec: &RepositoryOnboarding) -> String {
        format!("onboard {}", spec.name)
    }

    fn terminal_states(&self) -> TerminalStates<SyncStatus> {
        TerminalStates::new()
            .succeeded([SyncStatus::Connected])
            .failed([SyncStatus::Failed])
            .in_progress([SyncStatus::Syncing])
    }

    async fn trigger(&self, spec: &RepositoryOnboarding) -> Result<OnboardingHandle, ApiError> {
        let url = self
            .client
            .endpoint(&["repositories", &spec.name, "onboard"])?;
        let builder = self.client.request(Method::POST, url).json(&OnboardRequest {
            default_branch: spec.default_branch.as_deref(),
        });
        let accepted: OnboardAccepted = self
            .client
            .send_json(builder, &format!("onboard repository {}", spec.name))
            .await?;

        tracing::info!("Onboarding {} accepted (operation {})", spec.name, accepted.id);
        Ok(OnboardingHandle {
            repository: spec.name.clone(),
            operation_id: accepted.id,
        })
    }

    async fn status(&self, handle: &OnboardingHandle) -> Result<SyncStatus, ApiError> {
        tracing::debug!(
            repository = %handle.repository,
            operation_id = %handle.operation_id,
            "Checking sync status"
        );
        self.sync_status(&handle.repository).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientConfig;
    use converge_core::{
        CancellationToken, ConvergenceError, Error, PollSettings, run_to_convergence,
    };
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_sync_status_parsing() {
        assert_eq!(SyncStatus::from("Syncing".to_string()), SyncStatus::Syncing);
        assert_eq!(SyncStatus::from("CONNECTED".to_string()), SyncStatus::Connected);
        assert_eq!(
            SyncStatus::from("Archived".to_string()),
            SyncStatus::Unknown("Archived".to_string())
        );
        assert_eq!(SyncStatus::Unknown("Archived".to_string()).to_string(), "Archived");
    }

    async fn mount_trigger(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/repositories/www/onboard"))
            .and(body_json(json!({"default_branch": "main"})))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({"id": "op-42"})))
            .expect(1)
            .mount(server)
            .await;
    }

    fn repository(status: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "sync_status": status }))
    }

    fn fast() -> PollSettings {
        PollSettings::default()
            .with_interval(Duration::from_millis(10))
            .with_timeout(Duration::from_secs(5))
    }

    async fn onboard_www(
        server: &MockServer,
        settings: PollSettings,
    ) -> converge_core::Result<SyncStatus> {
        let client = ControlPlaneClient::new(ClientConfig::new(server.uri())).unwrap();
        let spec = RepositoryOnboarding::new("www").with_default_branch("main");
        run_to_convergence(&client.onboarding(), &spec, settings, &CancellationToken::new()).await
    }

    #[tokio::test]
    async fn test_onboard_waits_until_connected() {
        let server = MockServer::start().await;
        mount_trigger(&server).await;
        // mocks are matched in mount order; the first expires after three hits
        Mock::given(method("GET"))
            .and(path("/repositories/www"))
            .respond_with(repository("Syncing"))
            .up_to_n_times(3)
            .expect(3)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repositories/www"))
            .respond_with(repository("Connected"))
            .expect(1)
            .mount(&server)
            .await;

        let status = onboard_www(&server, fast()).await.unwrap();
        assert_eq!(status, SyncStatus::Connected);
    }

    #[tokio::test]
    async fn test_onboard_reports_failure() {
        let server = MockServer::start().await;
        mount_trigger(&server).await;
        Mock::given(method("GET"))
            .and(path("/repositories/www"))
            .respond_with(repository("Failed"))
            .expect(1)
            .mount(&server)
            .await;

        match onboard_www(&server, fast()).await.unwrap_err() {
            Error::Convergence(ConvergenceError::Failed { status, .. }) => {
                assert_eq!(status, "Failed")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_status_endpoint_stops_early() {
        let server = MockServer::start().await;
        mount_trigger(&server).await;
        Mock::given(method("GET"))
            .and(path("/repositories/www"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let err = onboard_www(&server, fast().with_max_probe_errors(2))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Convergence(ConvergenceError::ProbeUnavailable { attempts: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_rejected_trigger_is_not_polled() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repositories/www/onboard"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = onboard_www(&server, fast()).await.unwrap_err();
        assert!(matches!(err, Error::Api(ApiError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_invalid_onboard_request_is_not_a_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repositories/www/onboard"))
            .respond_with(
                ResponseTemplate::new(422)
                    .set_body_json(json!({"message": "default_branch does not exist"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = onboard_www(&server, fast()).await.unwrap_err();
        match err {
            Error::Api(ApiError::Status { code, message }) => {
                assert_eq!(code, 422);
                assert!(message.contains("default_branch does not exist"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
