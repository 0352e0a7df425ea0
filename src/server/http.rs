//! Control and query endpoints

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::AuthError;
use crate::registry::{DeviceId, RegistryError};
use crate::session::RecordingStatus;
use crate::stats::RelayStats;
use crate::storage::{DevicePatch, DeviceRecord, SessionData, SessionRecord, StorageError};

use super::extract::{Caller, Operator};
use super::listener::RelayState;

/// Error returned by the HTTP handlers
///
/// Rendered as `{"detail": "<message>"}` with a matching status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    BadRequest(String),
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Internal(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(serde_json::json!({ "detail": self.to_string() }))).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidId(_) | StorageError::NotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            StorageError::Conflict(_) => ApiError::Conflict(err.to_string()),
            StorageError::Backend(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials | AuthError::InvalidCredentials => {
                ApiError::Unauthorized(err.to_string())
            }
            AuthError::Unavailable(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

/// Query string of the recording toggle
#[derive(Debug, Deserialize)]
pub struct ToggleQuery {
    pub enable: bool,
}

/// Recording status plus live connection state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    #[serde(flatten)]
    pub recording: RecordingStatus,
    pub device_connected: bool,
    pub viewers: usize,
    /// Seconds since the live device connected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_secs: Option<u64>,
    pub frames_forwarded: u64,
}

/// Relay counters plus registry occupancy
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    #[serde(flatten)]
    pub relay: RelayStats,
    pub devices_connected: usize,
}

/// Body of `POST /devices`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCreate {
    pub device_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// `POST /readings/save/{device_id}?enable=<bool>`
///
/// Operators only. Enabling an already recording device restarts its session.
pub async fn toggle_recording(
    _operator: Operator,
    State(state): State<RelayState>,
    Path(device_id): Path<String>,
    Query(query): Query<ToggleQuery>,
) -> Result<Json<RecordingStatus>, ApiError> {
    let device_id = DeviceId::parse(&device_id)?;
    let status = if query.enable {
        state.sessions.enable(&device_id).await
    } else {
        state.sessions.disable(&device_id).await
    };

    Ok(Json(status))
}

/// `GET /readings/status/{device_id}`
pub async fn recording_status(
    _caller: Caller,
    State(state): State<RelayState>,
    Path(device_id): Path<String>,
) -> Result<Json<DeviceStatus>, ApiError> {
    let device_id = DeviceId::parse(&device_id)?;
    let recording = state.sessions.status(&device_id).await;
    let registry = state.registry.stats(&device_id).await;

    Ok(Json(DeviceStatus {
        recording,
        device_connected: registry.has_device,
        viewers: registry.viewer_count,
        connected_secs: registry.connected_for.map(|d| d.as_secs()),
        frames_forwarded: registry.frames_forwarded,
    }))
}

/// `GET /devices/{device_id}/sessions`
pub async fn list_sessions(
    _caller: Caller,
    State(state): State<RelayState>,
    Path(device_id): Path<String>,
) -> Result<Json<Vec<SessionRecord>>, ApiError> {
    let device_id = DeviceId::parse(&device_id)?;
    let records = state.sessions.list_sessions(&device_id).await?;
    if records.is_empty() {
        return Err(ApiError::NotFound(format!(
            "Device {} has never saved any data",
            device_id
        )));
    }
    Ok(Json(records))
}

/// `GET /readings/download/{session_id}`
pub async fn download_session(
    _caller: Caller,
    State(state): State<RelayState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionData>, ApiError> {
    let data = state.sessions.load_session(&session_id).await?;
    Ok(Json(data))
}

/// `POST /devices`
pub async fn create_device(
    _operator: Operator,
    State(state): State<RelayState>,
    Json(body): Json<DeviceCreate>,
) -> Result<(StatusCode, Json<DeviceRecord>), ApiError> {
    let device_id = DeviceId::parse(&body.device_id)?;
    let record = state
        .sessions
        .gateway()
        .create_device(device_id.as_str(), body.name)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// `GET /devices`
pub async fn list_devices(
    _caller: Caller,
    State(state): State<RelayState>,
) -> Result<Json<Vec<DeviceRecord>>, ApiError> {
    Ok(Json(state.sessions.gateway().list_devices().await?))
}

/// `GET /devices/{device_id}`
pub async fn get_device(
    _caller: Caller,
    State(state): State<RelayState>,
    Path(device_id): Path<String>,
) -> Result<Json<DeviceRecord>, ApiError> {
    Ok(Json(state.sessions.gateway().get_device(&device_id).await?))
}

/// `PUT /devices/{device_id}`
pub async fn update_device(
    _operator: Operator,
    State(state): State<RelayState>,
    Path(device_id): Path<String>,
    Json(patch): Json<DevicePatch>,
) -> Result<Json<DeviceRecord>, ApiError> {
    let record = state
        .sessions
        .gateway()
        .update_device(&device_id, patch)
        .await?;
    Ok(Json(record))
}

/// `DELETE /devices/{device_id}`
///
/// Removes the registration only; recorded sessions stay downloadable.
pub async fn delete_device(
    _operator: Operator,
    State(state): State<RelayState>,
    Path(device_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.sessions.gateway().delete_device(&device_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /stats`
pub async fn stats(_caller: Caller, State(state): State<RelayState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        relay: state.counters.snapshot(),
        devices_connected: state.registry.device_count().await,
    })
}

/// `GET /health`
pub async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
    use axum::http::{Method, Request};
    use axum::Router;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::auth::StaticTokenAuthorizer;
    use crate::server::{router, ServerConfig};
    use crate::storage::MemoryStore;

    const OPERATOR: Option<&str> = Some("op-token");
    const VIEWER: Option<&str> = Some("viewer-token");

    fn state() -> RelayState {
        let config = ServerConfig::default().flush_threshold(2);
        RelayState::new(
            &config,
            Arc::new(MemoryStore::new()),
            Arc::new(
                StaticTokenAuthorizer::new()
                    .operator("op-token")
                    .viewer("viewer-token"),
            ),
        )
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&json).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let resp = app.clone().oneshot(request).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_reads_require_token() {
        let app = router(state());

        for uri in [
            "/ws/viewer?device_id=ecg-1",
            "/readings/status/ecg-1",
            "/readings/download/s1",
            "/devices/ecg-1/sessions",
            "/devices",
            "/devices/ecg-1",
            "/stats",
        ] {
            let (status, body) = send(&app, Method::GET, uri, None, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
            assert!(body["detail"].is_string());

            let (status, _) = send(&app, Method::GET, uri, Some("unknown"), None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
        }

        let (status, _) = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_viewer_token_in_query() {
        let app = router(state());

        let (status, body) = send(
            &app,
            Method::GET,
            "/readings/status/ecg-1?token=viewer-token",
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deviceId"], "ecg-1");
    }

    #[tokio::test]
    async fn test_toggle_requires_operator() {
        let app = router(state());
        let uri = "/readings/save/ecg-1?enable=true";

        let (status, _) = send(&app, Method::POST, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, Method::POST, uri, Some("unknown"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, Method::POST, uri, VIEWER, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_toggle_enable_disable() {
        let app = router(state());

        let (status, body) = send(
            &app,
            Method::POST,
            "/readings/save/ecg-1?enable=true",
            OPERATOR,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["recording"], true);
        assert!(body["sessionId"].is_string());

        let (_, body) = send(
            &app,
            Method::POST,
            "/readings/save/ecg-1?enable=false",
            OPERATOR,
            None,
        )
        .await;
        assert_eq!(body["recording"], false);
        assert!(body.get("sessionId").map_or(true, Value::is_null));
    }

    #[tokio::test]
    async fn test_status_reports_connections() {
        let state = state();
        let device = DeviceId::parse("ecg-1").unwrap();
        let (conn, _rx) = state.registry.open_connection();
        state.registry.register_device(&device, conn).await;
        let app = router(state);

        let (status, body) = send(&app, Method::GET, "/readings/status/ecg-1", VIEWER, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deviceId"], "ecg-1");
        assert_eq!(body["deviceConnected"], true);
        assert_eq!(body["recording"], false);
        assert_eq!(body["viewers"], 0);
        assert_eq!(body["framesForwarded"], 0);
        assert!(body["connectedSecs"].is_u64());

        let (_, body) = send(&app, Method::GET, "/readings/status/ecg-2", VIEWER, None).await;
        assert_eq!(body["deviceConnected"], false);
        assert!(body.get("connectedSecs").is_none());
    }

    #[tokio::test]
    async fn test_list_sessions_not_found_when_empty() {
        let app = router(state());

        let (status, _) = send(&app, Method::GET, "/devices/ecg-1/sessions", VIEWER, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_download_malformed_id_is_not_found() {
        let app = router(state());

        let (status, _) = send(
            &app,
            Method::GET,
            "/readings/download/not-a-session",
            VIEWER,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_recorded_session_is_listed_and_downloadable() {
        let state = state();
        let device = DeviceId::parse("ecg-1").unwrap();
        let (conn, _rx) = state.registry.open_connection();
        state.registry.register_device(&device, conn).await;
        let app = router(state.clone());

        let (_, started) = send(
            &app,
            Method::POST,
            "/readings/save/ecg-1?enable=true",
            OPERATOR,
            None,
        )
        .await;
        state.pipeline.on_sample(&device, "1.0").await;
        state.pipeline.on_sample(&device, r#"{"value": 2.0}"#).await;

        let (status, records) =
            send(&app, Method::GET, "/devices/ecg-1/sessions", VIEWER, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(records.as_array().unwrap().len(), 1);
        assert_eq!(records[0]["recording"], true);

        let session_id = started["sessionId"].as_str().unwrap();
        let (status, data) = send(
            &app,
            Method::GET,
            &format!("/readings/download/{}", session_id),
            VIEWER,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(data["data"], json!([1.0, 2.0]));
    }

    #[tokio::test]
    async fn test_device_registration_endpoints() {
        let app = router(state());
        let create = json!({ "deviceId": "ecg-1", "name": "Bench" });

        let (status, _) = send(&app, Method::POST, "/devices", VIEWER, Some(create.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) =
            send(&app, Method::POST, "/devices", OPERATOR, Some(create.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["deviceId"], "ecg-1");

        let (status, _) = send(&app, Method::POST, "/devices", OPERATOR, Some(create)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(
            &app,
            Method::POST,
            "/devices",
            OPERATOR,
            Some(json!({ "deviceId": "  " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            Method::PUT,
            "/devices/ecg-1",
            OPERATOR,
            Some(json!({ "name": "Ward 3" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Ward 3");

        let (_, listed) = send(&app, Method::GET, "/devices", VIEWER, None).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let (status, body) = send(&app, Method::GET, "/devices/ecg-1", VIEWER, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Ward 3");

        let (status, _) = send(&app, Method::DELETE, "/devices/ecg-1", VIEWER, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&app, Method::DELETE, "/devices/ecg-1", OPERATOR, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, Method::DELETE, "/devices/ecg-1", OPERATOR, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, Method::GET, "/devices/ecg-1", VIEWER, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stats_counts_devices() {
        let state = state();
        let (conn, _rx) = state.registry.open_connection();
        state
            .registry
            .register_device(&DeviceId::parse("ecg-1").unwrap(), conn)
            .await;
        let app = router(state);

        let (status, body) = send(&app, Method::GET, "/stats", VIEWER, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["devicesConnected"], 1);
    }

    #[test]
    fn test_error_mapping() {
        assert_eq!(
            ApiError::from(StorageError::InvalidId("x".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(StorageError::Conflict("x".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(StorageError::Backend("down".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(RegistryError::MissingDeviceId).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
