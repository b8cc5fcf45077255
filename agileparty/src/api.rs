//! Request/response collaborator for room lifecycle and snapshots.
//!
//! [`RoomApi`] is the seam the session and membership code depend on;
//! [`HttpRoomApi`] talks to the server's REST surface.

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

use agileparty_proto::room::{CreateRoomRequest, CreateRoomResponse, Room, RoomId, RoomState, UserId};

/// Errors returned by the request/response collaborator.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The server answered with a non-success status.
    #[error("request rejected ({status}): {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Server-provided reason.
        message: String,
    },

    /// The request did not complete.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body was not the expected JSON.
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The configured base URL is unusable.
    #[error("invalid api url {0}")]
    InvalidUrl(String),
}

/// Room lifecycle and snapshot operations.
pub trait RoomApi: Send + Sync {
    /// `POST /api/rooms`.
    fn create_room(
        &self,
        request: &CreateRoomRequest,
    ) -> impl Future<Output = Result<CreateRoomResponse, ApiError>> + Send;

    /// `GET /api/rooms/{id}`.
    fn room(&self, room_id: &RoomId) -> impl Future<Output = Result<Room, ApiError>> + Send;

    /// `GET /api/rooms/{id}/state`.
    fn room_state(
        &self,
        room_id: &RoomId,
    ) -> impl Future<Output = Result<RoomState, ApiError>> + Send;

    /// `POST /api/rooms/{id}/users`.
    fn join_room(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        user_name: &str,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// `DELETE /api/rooms/{id}/users/{user}`.
    fn leave_room(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}

/// [`RoomApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRoomApi {
    base: Url,
    client: reqwest::Client,
}

#[derive(serde::Serialize)]
struct JoinRoomBody<'a> {
    user_id: &'a str,
    user_name: &'a str,
}

impl HttpRoomApi {
    /// Creates a client for the API rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] for a URL that is not `http(s)`, or
    /// [`ApiError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base = Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;
        if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base, client })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(["api", "rooms"])
            .extend(segments);
        Ok(url)
    }
}

impl RoomApi for HttpRoomApi {
    async fn create_room(&self, request: &CreateRoomRequest) -> Result<CreateRoomResponse, ApiError> {
        let resp = self.client.post(self.url(&[])?).json(request).send().await?;
        decode(resp).await
    }

    async fn room(&self, room_id: &RoomId) -> Result<Room, ApiError> {
        let resp = self.client.get(self.url(&[room_id.as_str()])?).send().await?;
        decode(resp).await
    }

    async fn room_state(&self, room_id: &RoomId) -> Result<RoomState, ApiError> {
        let url = self.url(&[room_id.as_str(), "state"])?;
        let resp = self.client.get(url).send().await?;
        decode(resp).await
    }

    async fn join_room(&self, room_id: &RoomId, user_id: &UserId, user_name: &str) -> Result<(), ApiError> {
        let body = JoinRoomBody {
            user_id: user_id.as_str(),
            user_name,
        };
        let url = self.url(&[room_id.as_str(), "users"])?;
        let resp = self.client.post(url).json(&body).send().await?;
        check(resp).await.map(drop)
    }

    async fn leave_room(&self, room_id: &RoomId, user_id: &UserId) -> Result<(), ApiError> {
        let url = self.url(&[room_id.as_str(), "users", user_id.as_str()])?;
        let resp = self.client.delete(url).send().await?;
        check(resp).await.map(drop)
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiError> {
    let bytes = check(resp).await?.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = error_message(status, &body);
    tracing::warn!(status = status.as_u16(), message = %message, "api request rejected");
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

/// `error` or `message` from a JSON body, else the body text, else the
/// status line.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body)
        && let Some(message) = ["error", "message"]
            .iter()
            .find_map(|key| value.get(key).and_then(serde_json::Value::as_str))
    {
        return message.to_string();
    }
    let body = body.trim();
    if !body.is_empty() {
        return body.to_string();
    }
    match status.canonical_reason() {
        Some(reason) => format!("HTTP {}: {reason}", status.as_u16()),
        None => format!("HTTP {}", status.as_u16()),
    }
}
