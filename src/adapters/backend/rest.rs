//! Hosted backend REST client.
//!
//! Talks to the backend's REST gateway: PostgREST for tables, the auth
//! service for session lookup, and the storage API for objects. Table access
//! runs with the service key; session lookup forwards the user's token.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;

use crate::domain::foundation::UserId;
use crate::ports::{
    validate_object_path, AuthError, BackendAuth, BackendStore, FileStorage, Filter, Identity,
    Row, SessionToken, StorageError, StoreError,
};

/// REST client for the hosted backend.
pub struct RestBackendClient {
    base_url: String,
    service_key: SecretString,
    http_client: reqwest::Client,
}

impl RestBackendClient {
    pub fn new(base_url: impl Into<String>, service_key: SecretString) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key,
            http_client: reqwest::Client::new(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn object_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, path)
    }

    /// Attaches the service credentials.
    fn service(&self, request: RequestBuilder) -> RequestBuilder {
        let key = self.service_key.expose_secret();
        request.header("apikey", key).bearer_auth(key)
    }

    async fn rows(response: Response) -> Result<Vec<Row>, StoreError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(store_error(status, message));
        }
        response
            .json::<Vec<Row>>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }
}

/// Renders a filter as PostgREST query parameters (`col=op.value`).
fn filter_query(filter: &Filter) -> Vec<(String, String)> {
    filter
        .conditions()
        .iter()
        .map(|c| {
            let value = match &c.value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (c.column.clone(), format!("{}.{}", c.op.as_str(), value))
        })
        .collect()
}

fn store_error(status: StatusCode, message: String) -> StoreError {
    if status == StatusCode::CONFLICT {
        StoreError::Conflict(message)
    } else {
        StoreError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

fn unavailable(e: reqwest::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

#[async_trait]
impl BackendStore for RestBackendClient {
    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Row>, StoreError> {
        let response = self
            .service(self.http_client.get(self.table_url(table)))
            .query(&[("select", "*")])
            .query(&filter_query(filter))
            .send()
            .await
            .map_err(unavailable)?;
        Self::rows(response).await
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row, StoreError> {
        let response = self
            .service(self.http_client.post(self.table_url(table)))
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await
            .map_err(unavailable)?;

        Self::rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode("insert returned no rows".to_string()))
    }

    async fn update(
        &self,
        table: &str,
        filter: &Filter,
        patch: Row,
    ) -> Result<Vec<Row>, StoreError> {
        let response = self
            .service(self.http_client.patch(self.table_url(table)))
            .header("Prefer", "return=representation")
            .query(&filter_query(filter))
            .json(&patch)
            .send()
            .await
            .map_err(unavailable)?;
        Self::rows(response).await
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<u64, StoreError> {
        let response = self
            .service(self.http_client.delete(self.table_url(table)))
            .header("Prefer", "return=representation")
            .query(&filter_query(filter))
            .send()
            .await
            .map_err(unavailable)?;
        Ok(Self::rows(response).await?.len() as u64)
    }
}

#[derive(Deserialize)]
struct AuthUserResponse {
    id: String,
    email: Option<String>,
}

#[async_trait]
impl BackendAuth for RestBackendClient {
    async fn get_user(&self, token: &SessionToken) -> Result<Identity, AuthError> {
        let response = self
            .http_client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", self.service_key.expose_secret())
            .bearer_auth(token.as_str())
            .send()
            .await
            .map_err(|e| AuthError::ServiceUnavailable(e.to_string()))?;

        match response.status() {
            s if s.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(AuthError::InvalidToken)
            }
            s => {
                tracing::error!(status = %s, "Auth service returned unexpected status");
                return Err(AuthError::ServiceUnavailable(format!("status {s}")));
            }
        }

        let user: AuthUserResponse = response
            .json()
            .await
            .map_err(|e| AuthError::ServiceUnavailable(e.to_string()))?;

        Ok(Identity {
            user_id: UserId::new(user.id).map_err(|_| AuthError::InvalidToken)?,
            email: user.email,
        })
    }
}

#[async_trait]
impl FileStorage for RestBackendClient {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        validate_object_path(path)?;

        let response = self
            .service(self.http_client.post(self.object_url(bucket, path)))
            .header("x-upsert", "true")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| StorageError::Service(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            tracing::error!(%status, bucket, path, "Storage upload failed");
            return Err(StorageError::Service(format!("{status}: {message}")));
        }

        Ok(self.public_url(bucket, path))
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, bucket, path
        )
    }
}
