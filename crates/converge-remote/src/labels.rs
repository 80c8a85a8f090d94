//! Resource labels
//!
//! The labels endpoint is additive/subtractive: one create, one set-value and
//! one delete call per key, with no whole-collection replace.

use crate::client::ControlPlaneClient;
use async_trait::async_trait;
use converge_core::{ApiError, Label, RemoteCollection, create_or_set};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub struct LabelsApi<'a> {
    client: &'a ControlPlaneClient,
    resource_id: String,
}

#[derive(Debug, Deserialize)]
struct LabelList {
    #[serde(default)]
    labels: Vec<Label>,
}

#[derive(Debug, Serialize)]
struct SetLabelValue<'a> {
    value: &'a str,
}

impl<'a> LabelsApi<'a> {
    pub(crate) fn new(client: &'a ControlPlaneClient, resource_id: String) -> Self {
        Self {
            client,
            resource_id,
        }
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    /// Create a label; fails with `AlreadyExists` if the key is taken
    pub async fn create(&self, label: &Label) -> Result<(), ApiError> {
        let url = self
            .client
            .endpoint(&["resources", &self.resource_id, "labels"])?;
        let builder = self.client.request(Method::POST, url).json(label);
        self.client
            .send_create(builder, &format!("create label {}", label.key))
            .await
    }

    /// Overwrite the value of an existing label
    pub async fn set_value(&self, label: &Label) -> Result<(), ApiError> {
        let url = self
            .client
            .endpoint(&["resources", &self.resource_id, "labels", &label.key])?;
        let builder = self.client.request(Method::PUT, url).json(&SetLabelValue {
            value: &label.value,
        });
        self.client
            .send_empty(builder, &format!("set label {}", label.key))
            .await
    }

    pub async fn delete(&self, key: &str) -> Result<(), ApiError> {
        let url = self
            .client
            .endpoint(&["resources", &self.resource_id, "labels", key])?;
        let builder = self.client.request(Method::DELETE, url);
        match self
            .client
            .send_empty(builder, &format!("delete label {}", key))
            .await
        {
            Err(ApiError::NotFound(_)) => {
                tracing::debug!("Label {} already gone from {}", key, self.resource_id);
                Ok(())
            }
            other => other,
        }
    }

    /// Create, falling back to a set-value call when the key already exists
    pub async fn upsert(&self, label: &Label) -> Result<(), ApiError> {
        create_or_set(
            &format!("label {} on {}", label.key, self.resource_id),
            || self.create(label),
            || self.set_value(label),
        )
        .await
    }
}

#[async_trait]
impl<'a> RemoteCollection<Label> for LabelsApi<'a> {
    async fn observe(&self) -> Result<Vec<Label>, ApiError> {
        let url = self
            .client
            .endpoint(&["resources", &self.resource_id, "labels"])?;
        let builder = self.client.request(Method::GET, url);
        let list: LabelList = self
            .client
            .send_json(builder, &format!("list labels of {}", self.resource_id))
            .await?;
        Ok(list.labels)
    }

    async fn mutate(&self, add: &[Label], remove: &[Label]) -> Result<(), ApiError> {
        // A key on both sides is a value change: one set-value call instead of delete + create
        let added: HashSet<&str> = add.iter().map(|l| l.key.as_str()).collect();
        let changed: HashSet<&str> = remove
            .iter()
            .map(|l| l.key.as_str())
            .filter(|k| added.contains(k))
            .collect();

        for label in remove.iter().filter(|l| !changed.contains(l.key.as_str())) {
            tracing::info!("Removing label {} from {}", label, self.resource_id);
            self.delete(&label.key).await?;
        }

        for label in add {
            if changed.contains(label.key.as_str()) {
                tracing::info!("Changing label {} on {}", label, self.resource_id);
                self.set_value(label).await?;
            } else {
                tracing::info!("Adding label {} to {}", label, self.resource_id);
                self.upsert(label).await?;
            }
        }

        Ok(())
    }
}
