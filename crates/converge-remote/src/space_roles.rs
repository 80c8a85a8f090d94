//! Space role assignments of a user
//!
//! Unlike labels, the space-role endpoints accept batches: one call adds
//! a list of pairs, another removes a list of pairs.

use crate::client::ControlPlaneClient;
use async_trait::async_trait;
use converge_core::{ApiError, RemoteCollection, SpaceRole};
use reqwest::Method;
use serde::{Deserialize, Serialize};

pub struct SpaceRolesApi<'a> {
    client: &'a ControlPlaneClient,
    user_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SpaceRoleList<T> {
    #[serde(default)]
    space_roles: T,
}

impl<'a> SpaceRolesApi<'a> {
    pub(crate) fn new(client: &'a ControlPlaneClient, user_id: String) -> Self {
        Self { client, user_id }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    async fn post_batch(
        &self,
        suffix: &[&str],
        roles: &[SpaceRole],
        what: &str,
    ) -> Result<(), ApiError> {
        let mut segments = vec!["users", self.user_id.as_str(), "space-roles"];
        segments.extend_from_slice(suffix);
        let url = self.client.endpoint(&segments)?;
        let builder = self
            .client
            .request(Method::POST, url)
            .json(&SpaceRoleList { space_roles: roles });
        self.client
            .send_empty(builder, &format!("{} for user {}", what, self.user_id))
            .await
    }
}

#[async_trait]
impl<'a> RemoteCollection<SpaceRole> for SpaceRolesApi<'a> {
    async fn observe(&self) -> Result<Vec<SpaceRole>, ApiError> {
        let url = self
            .client
            .endpoint(&["users", &self.user_id, "space-roles"])?;
        let builder = self.client.request(Method::GET, url);
        let list: SpaceRoleList<Vec<SpaceRole>> = self
            .client
            .send_json(builder, &format!("list space roles of user {}", self.user_id))
            .await?;
        Ok(list.space_roles)
    }

    async fn mutate(&self, add: &[SpaceRole], remove: &[SpaceRole]) -> Result<(), ApiError> {
        if !remove.is_empty() {
            tracing::info!("Revoking {} space role(s) from user {}", remove.len(), self.user_id);
            self.post_batch(&["remove"], remove, "remove space roles").await?;
        }
        if !add.is_empty() {
            tracing::info!("Granting {} space role(s) to user {}", add.len(), self.user_id);
            self.post_batch(&[], add, "add space roles").await?;
        }
        Ok(())
    }
}
