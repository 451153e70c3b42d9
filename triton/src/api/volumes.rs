//! NFS volume operations

use super::client::Client;
use super::error::ApiError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Volume {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub owner_uuid: String,
    #[serde(rename = "type", default)]
    pub type_: String,
    #[serde(default)]
    pub filesystem_path: String,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub networks: Vec<String>,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateVolumeInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ListVolumesInput {
    pub name: Option<String>,
    pub size: Option<i64>,
    pub state: Option<String>,
}

pub struct VolumesApi<'a> {
    client: &'a Client,
}

impl<'a> VolumesApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn volumes_path(&self) -> String {
        format!("/{}/volumes", self.client.account())
    }

    pub async fn create(&self, input: &CreateVolumeInput) -> Result<Volume, ApiError> {
        self.client.post(&self.volumes_path(), input).await
    }

    pub async fn get(&self, id: &str) -> Result<Volume, ApiError> {
        self.client
            .get(&format!("{}/{}", self.volumes_path(), id))
            .await
    }

    pub async fn list(&self, input: &ListVolumesInput) -> Result<Vec<Volume>, ApiError> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(name) = &input.name {
            params.push(("name", name.clone()));
        }
        if let Some(size) = input.size {
            params.push(("size", size.to_string()));
        }
        if let Some(state) = &input.state {
            params.push(("state", state.clone()));
        }

        self.client.get_query(&self.volumes_path(), &params).await
    }

    /// Rename is the only mutable attribute
    pub async fn rename(&self, id: &str, name: &str) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .client
            .post(
                &format!("{}/{}", self.volumes_path(), id),
                &serde_json::json!({ "name": name }),
            )
            .await?;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client
            .delete(&format!("{}/{}", self.volumes_path(), id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_volume_omits_unset_fields() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/demo/volumes")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "name": "data",
                "type": "tritonnfs"
            })))
            .with_status(201)
            .with_body(
                r#"{"id": "vol-1", "name": "data", "type": "tritonnfs",
                    "state": "creating", "size": 10240}"#,
            )
            .create_async()
            .await;

        let client = Client::new(&server.url(), "demo", "aa:bb", false).unwrap();
        let volume = client
            .volumes()
            .create(&CreateVolumeInput {
                name: Some("data".to_string()),
                type_: Some("tritonnfs".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(volume.state, "creating");
        mock.assert_async().await;
    }
}
