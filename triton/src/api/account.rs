//! Account and SSH key operations

use super::client::Client;
use super::error::ApiError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub id: String,
    pub login: String,
    pub email: String,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub triton_cns_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Key {
    pub name: String,
    pub fingerprint: String,
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct CreateKeyInput {
    pub name: String,
    pub key: String,
}

pub struct AccountApi<'a> {
    client: &'a Client,
}

impl<'a> AccountApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get(&self) -> Result<Account, ApiError> {
        self.client
            .get(&format!("/{}", self.client.account()))
            .await
    }

    pub async fn create_key(&self, input: &CreateKeyInput) -> Result<Key, ApiError> {
        self.client
            .post(&format!("/{}/keys", self.client.account()), input)
            .await
    }

    pub async fn get_key(&self, name: &str) -> Result<Key, ApiError> {
        self.client
            .get(&format!("/{}/keys/{}", self.client.account(), name))
            .await
    }

    pub async fn delete_key(&self, name: &str) -> Result<(), ApiError> {
        self.client
            .delete(&format!("/{}/keys/{}", self.client.account(), name))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_account_parses_cns_flag() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/demo")
            .with_status(200)
            .with_body(
                r#"{"id": "b4c9", "login": "demo", "email": "demo@example.com",
                    "triton_cns_enabled": true}"#,
            )
            .create_async()
            .await;

        let client = Client::new(&server.url(), "demo", "aa:bb", false).unwrap();
        let account = client.account_api().get().await.unwrap();

        assert_eq!(account.login, "demo");
        assert!(account.triton_cns_enabled);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn create_key_posts_name_and_material() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/demo/keys")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"name": "deploy"}"#.to_string(),
            ))
            .with_status(201)
            .with_body(
                r#"{"name": "deploy", "fingerprint": "aa:bb:cc", "key": "ssh-rsa AAAA deploy"}"#,
            )
            .create_async()
            .await;

        let client = Client::new(&server.url(), "demo", "aa:bb", false).unwrap();
        let key = client
            .account_api()
            .create_key(&CreateKeyInput {
                name: "deploy".to_string(),
                key: "ssh-rsa AAAA deploy".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(key.fingerprint, "aa:bb:cc");
        mock.assert_async().await;
    }
}
