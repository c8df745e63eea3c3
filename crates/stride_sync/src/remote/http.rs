//! HTTP remote store
//!
//! Endpoints, relative to `remote.base_url`:
//! - GET    /profiles/{id}                     -> ActorProfile (404 = none)
//! - POST   /profiles                          -> ActorProfile
//! - PATCH  /profiles/{id}                     <- ProfileFields
//! - GET    /profiles/{id}/slices/{key}        -> JSON payload (404 = none)
//! - PUT    /profiles/{id}/slices/{key}        <- JSON payload
//! - POST   /profiles/{id}/events/{event_id}   -> {"already_existed": bool}

use super::{RemoteError, RemoteStore};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use stride_common::profile::ProfileFields;
use stride_common::{ActorProfile, RemoteConfig};

#[derive(Debug, Deserialize)]
struct RecordEventResponse {
    already_existed: bool,
}

pub struct HttpRemoteStore {
    client: Client,
    base_url: Url,
}

impl HttpRemoteStore {
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| RemoteError::Unreachable(format!("invalid base url: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::Unreachable(format!(
                "invalid base url: {}",
                config.base_url
            )));
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| RemoteError::Unreachable(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    /// Join escaped path segments onto the base url
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn transport_error(e: reqwest::Error) -> RemoteError {
        if e.is_timeout() {
            RemoteError::Timeout(0)
        } else {
            RemoteError::Unreachable(e.to_string())
        }
    }

    fn check(response: Response) -> Result<Response, RemoteError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            Err(RemoteError::NotFound(response.url().path().to_string()))
        } else if !status.is_success() {
            Err(RemoteError::Status(status.as_u16()))
        } else {
            Ok(response)
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
        response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }

    /// GET that maps 404 to `None`
    async fn get_optional<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, RemoteError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(Self::transport_error)?;

        match Self::check(response) {
            Ok(response) => Ok(Some(Self::decode(response).await?)),
            Err(RemoteError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn fetch_profile(&self, actor_id: &str) -> Result<Option<ActorProfile>, RemoteError> {
        self.get_optional(self.url(&["profiles", actor_id])).await
    }

    async fn create_profile(&self, profile: &ActorProfile) -> Result<ActorProfile, RemoteError> {
        let response = self
            .client
            .post(self.url(&["profiles"]))
            .json(profile)
            .send()
            .await
            .map_err(Self::transport_error)?;
        Self::decode(Self::check(response)?).await
    }

    async fn update_profile(
        &self,
        actor_id: &str,
        fields: &ProfileFields,
    ) -> Result<(), RemoteError> {
        let response = self
            .client
            .patch(self.url(&["profiles", actor_id]))
            .json(fields)
            .send()
            .await
            .map_err(Self::transport_error)?;
        Self::check(response)?;
        Ok(())
    }

    async fn fetch_slice(&self, actor_id: &str, key: &str) -> Result<Option<Value>, RemoteError> {
        self.get_optional(self.url(&["profiles", actor_id, "slices", key]))
            .await
    }

    async fn push_slice(
        &self,
        actor_id: &str,
        key: &str,
        payload: &Value,
    ) -> Result<(), RemoteError> {
        let response = self
            .client
            .put(self.url(&["profiles", actor_id, "slices", key]))
            .json(payload)
            .send()
            .await
            .map_err(Self::transport_error)?;
        Self::check(response)?;
        Ok(())
    }

    async fn record_event(&self, actor_id: &str, event_id: &str) -> Result<bool, RemoteError> {
        let response = self
            .client
            .post(self.url(&["profiles", actor_id, "events", event_id]))
            .send()
            .await
            .map_err(Self::transport_error)?;
        let body: RecordEventResponse = Self::decode(Self::check(response)?).await?;
        Ok(body.already_existed)
    }
}
