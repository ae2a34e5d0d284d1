use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    http::{header, HeaderMap, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use domain::{Identity, Room, RoomName, StoredMessage, Timestamp};

use crate::{error::ApiError, state::AppState, ws_connection};

#[derive(Debug, Deserialize)]
struct CreateRoomPayload {
    name: String,
    description: Option<String>,
    #[serde(default)]
    is_restricted: bool,
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

#[derive(Debug, Serialize)]
struct RoomDto {
    name: String,
    description: Option<String>,
    is_restricted: bool,
}

impl From<Room> for RoomDto {
    fn from(room: Room) -> Self {
        Self {
            name: room.name.to_string(),
            description: room.description,
            is_restricted: room.is_restricted,
        }
    }
}

#[derive(Debug, Serialize)]
struct MessageDto {
    author: String,
    content: String,
    #[serde(with = "time::serde::rfc3339")]
    created_at: Timestamp,
}

impl From<StoredMessage> for MessageDto {
    fn from(message: StoredMessage) -> Self {
        Self {
            author: message.author.to_string(),
            content: message.content,
            created_at: message.created_at,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes())
        .route("/ws/{room}", get(websocket_upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/rooms", post(create_room).get(list_rooms))
        .route("/rooms/{name}", axum::routing::delete(delete_room))
        .route("/rooms/{name}/messages", get(room_history))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

/// 从 Authorization 头中提取并验证 Bearer 令牌。
fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Identity, ApiError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing authorization header"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::unauthorized("Invalid authorization header format"))?;

    state
        .session_deps
        .verifier
        .verify(token)
        .map_err(|err| ApiError::unauthorized(err.to_string()))
}

async fn create_room(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateRoomPayload>,
) -> Result<(StatusCode, Json<RoomDto>), ApiError> {
    let actor = authenticate(&state, &headers)?;
    let name = RoomName::parse(payload.name)
        .map_err(application::ApplicationError::Domain)?;

    let room = state
        .registry
        .create(&actor, name, payload.description, payload.is_restricted)
        .await?;

    Ok((StatusCode::CREATED, Json(room.into())))
}

async fn delete_room(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    let actor = authenticate(&state, &headers)?;
    let name = RoomName::parse(name).map_err(application::ApplicationError::Domain)?;

    state.registry.delete(&actor, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_rooms(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<RoomDto>>, ApiError> {
    authenticate(&state, &headers)?;
    let rooms = state.registry.list().await?;
    Ok(Json(rooms.into_iter().map(RoomDto::from).collect()))
}

/// 房间最近的历史消息，最新在前。受限房间的历史只有管理员可查。
async fn room_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(name): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<MessageDto>>, ApiError> {
    let actor = authenticate(&state, &headers)?;
    let name = RoomName::parse(name).map_err(application::ApplicationError::Domain)?;

    if state.registry.is_restricted(&name).await? && !actor.role.is_admin() {
        return Err(ApiError::forbidden("restricted room"));
    }

    let limit = query.limit.unwrap_or(state.chat.replay_limit);
    let messages = state.registry.recent_messages(&name, limit).await?;
    Ok(Json(messages.into_iter().map(MessageDto::from).collect()))
}

/// WebSocket 升级入口。
///
/// 令牌校验在升级完成之后由会话状态机执行（连接先被接受，再进入
/// AUTHENTICATING），失败以 1008 关闭帧收尾而不是 HTTP 401。
async fn websocket_upgrade(
    State(state): State<AppState>,
    Path(room): Path<String>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| ws_connection::handle_socket(socket, state, room, query.token))
}
