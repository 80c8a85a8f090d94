//! REST adapter for the control-plane API
//!
//! Implements the `converge-core` Remote Resource API traits over HTTP:
//!
//! - [`LabelsApi`]: labels of a resource, one call per key
//! - [`SpaceRolesApi`]: space roles of a user, batch add/remove
//! - [`OnboardingApi`]: repository onboarding, polled until `Connected`
//!
//! ```no_run
//! use converge_core::{CancellationToken, PollSettings, run_to_convergence};
//! use converge_remote::{ClientConfig, ControlPlaneClient, RepositoryOnboarding};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ControlPlaneClient::new(ClientConfig::from_env()?)?;
//! let status = run_to_convergence(
//!     &client.onboarding(),
//!     &RepositoryOnboarding::new("www"),
//!     PollSettings::default(),
//!     &CancellationToken::new(),
//! )
//! .await?;
//! println!("{status}");
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod labels;
pub mod onboarding;
pub mod space_roles;

pub use client::{API_TOKEN_ENV, API_URL_ENV, ClientConfig, ControlPlaneClient};
pub use error::{RemoteError, Result};
pub use labels::LabelsApi;
pub use onboarding::{OnboardingApi, OnboardingHandle, RepositoryOnboarding, SyncStatus};
pub use space_roles::SpaceRolesApi;
