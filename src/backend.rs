//! Client for the office backend's REST API.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use office_voice_types::inventory::{
    Electronics, ElectronicsDraft, MappingDraft, OfficeLayout, Room, RoomDraft,
    RoomElectronicsMap, StateChange,
};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Backend error: {status} ({method} {path})")]
    Status {
        method: Method,
        path: String,
        status: u16,
    },
    #[error("Backend request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Backend returned malformed JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The backend contract the assistant consumes. Every non-2xx status is a
/// [`BackendError::Status`]; bodies are only checked to be JSON of the
/// expected shape.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Backend: Send + Sync {
    /// `GET /layout`
    async fn layout(&self) -> Result<OfficeLayout, BackendError>;

    /// `PATCH /electronics/state`
    async fn set_state(&self, change: &StateChange) -> Result<(), BackendError>;

    /// `GET /rooms`
    async fn list_rooms(&self) -> Result<Vec<Room>, BackendError>;
    /// `GET /rooms/:id`
    async fn get_room(&self, room_id: &str) -> Result<Room, BackendError>;
    /// `POST /rooms`
    async fn create_room(&self, draft: &RoomDraft) -> Result<Value, BackendError>;
    /// `PUT /rooms/:id`
    async fn update_room(&self, room_id: &str, draft: &RoomDraft) -> Result<Value, BackendError>;
    /// `DELETE /rooms/:id`
    async fn delete_room(&self, room_id: &str) -> Result<(), BackendError>;

    /// `GET /electronics`
    async fn list_electronics(&self) -> Result<Vec<Electronics>, BackendError>;
    /// `GET /electronics/:id`
    async fn get_electronics(&self, electronics_id: &str) -> Result<Electronics, BackendError>;
    /// `POST /electronics`
    async fn create_electronics(&self, draft: &ElectronicsDraft) -> Result<Value, BackendError>;
    /// `PUT /electronics/:id`
    async fn update_electronics(
        &self,
        electronics_id: &str,
        draft: &ElectronicsDraft,
    ) -> Result<Value, BackendError>;
    /// `DELETE /electronics/:id`
    async fn delete_electronics(&self, electronics_id: &str) -> Result<(), BackendError>;

    /// `GET /room-electronics-map`
    async fn list_mappings(&self) -> Result<Vec<RoomElectronicsMap>, BackendError>;
    /// `POST /room-electronics-map`
    async fn create_mapping(&self, draft: &MappingDraft) -> Result<Value, BackendError>;
    /// `DELETE /room-electronics-map/:id`
    async fn delete_mapping(&self, mapping_id: &str) -> Result<(), BackendError>;
}

pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Response, BackendError> {
        let mut request = self.request(method.clone(), path);
        if let Some(body) = body {
            request = request.json(&body);
        }
        tracing::debug!("backend request: {} {}", method, path);
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!("backend rejected {} {}: {}", method, path, status);
            return Err(BackendError::Status {
                method,
                path: path.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let response = self.send(Method::GET, path, None).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Sends a mutation and parses whatever JSON the backend returns (or null).
    async fn mutate(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, BackendError> {
        let response = self.send(method, path, body).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn layout(&self) -> Result<OfficeLayout, BackendError> {
        self.get_json("/layout").await
    }

    async fn set_state(&self, change: &StateChange) -> Result<(), BackendError> {
        self.mutate(Method::PATCH, "/electronics/state", Some(serde_json::to_value(change)?))
            .await
            .map(|_| ())
    }

    async fn list_rooms(&self) -> Result<Vec<Room>, BackendError> {
        self.get_json("/rooms").await
    }

    async fn get_room(&self, room_id: &str) -> Result<Room, BackendError> {
        self.get_json(&format!("/rooms/{room_id}")).await
    }

    async fn create_room(&self, draft: &RoomDraft) -> Result<Value, BackendError> {
        self.mutate(Method::POST, "/rooms", Some(serde_json::to_value(draft)?)).await
    }

    async fn update_room(&self, room_id: &str, draft: &RoomDraft) -> Result<Value, BackendError> {
        self.mutate(Method::PUT, &format!("/rooms/{room_id}"), Some(serde_json::to_value(draft)?))
            .await
    }

    async fn delete_room(&self, room_id: &str) -> Result<(), BackendError> {
        self.mutate(Method::DELETE, &format!("/rooms/{room_id}"), None)
            .await
            .map(|_| ())
    }

    async fn list_electronics(&self) -> Result<Vec<Electronics>, BackendError> {
        self.get_json("/electronics").await
    }

    async fn get_electronics(&self, electronics_id: &str) -> Result<Electronics, BackendError> {
        self.get_json(&format!("/electronics/{electronics_id}")).await
    }

    async fn create_electronics(&self, draft: &ElectronicsDraft) -> Result<Value, BackendError> {
        self.mutate(Method::POST, "/electronics", Some(serde_json::to_value(draft)?)).await
    }

    async fn update_electronics(
        &self,
        electronics_id: &str,
        draft: &ElectronicsDraft,
    ) -> Result<Value, BackendError> {
        self.mutate(
            Method::PUT,
            &format!("/electronics/{electronics_id}"),
            Some(serde_json::to_value(draft)?),
        )
        .await
    }

    async fn delete_electronics(&self, electronics_id: &str) -> Result<(), BackendError> {
        self.mutate(Method::DELETE, &format!("/electronics/{electronics_id}"), None)
            .await
            .map(|_| ())
    }

    async fn list_mappings(&self) -> Result<Vec<RoomElectronicsMap>, BackendError> {
        self.get_json("/room-electronics-map").await
    }

    async fn create_mapping(&self, draft: &MappingDraft) -> Result<Value, BackendError> {
        self.mutate(Method::POST, "/room-electronics-map", Some(serde_json::to_value(draft)?))
            .await
    }

    async fn delete_mapping(&self, mapping_id: &str) -> Result<(), BackendError> {
        self.mutate(
            Method::DELETE,
            &format!("/room-electronics-map/{mapping_id}"),
            None,
        )
        .await
        .map(|_| ())
    }
}
