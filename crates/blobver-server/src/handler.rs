use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use blobver_types::LogicalKey;
use blobver_versioned::VersionedError;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::auth::UserRecord;
use crate::error::{ApiError, ApiResult};
use crate::model::{rank, LeaderboardEntry, RunSubmission, Topic};
use crate::state::SharedState;

/// Header naming the requesting account, used for topic ownership.
pub const USER_HEADER: &str = "x-user-id";

fn requester(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn leaderboard_key(topic_id: &str) -> ApiResult<LogicalKey> {
    Ok(LogicalKey::new(topic_id).map_err(VersionedError::from)?)
}

/// Health check handler.
pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Info handler.
pub async fn info_handler(State(state): State<SharedState>) -> Json<Value> {
    Json(json!({
        "name": "blobver-server",
        "version": env!("CARGO_PKG_VERSION"),
        "backend": state.backend_name(),
        "configured": state.topics.is_configured(),
        "retention": state.topics.config().retention,
    }))
}

pub async fn list_topics(State(state): State<SharedState>) -> Json<Vec<Topic>> {
    Json(state.topics.read_latest_or_empty(&state.topics_key).await)
}

pub async fn create_topic(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let mut topic = Topic::from_request(body)?;
    if topic.created_by.is_none() {
        topic.created_by = requester(&headers);
    }

    let added = topic.clone();
    let updated = state
        .topics
        .update(&state.topics_key, move |mut topics: Vec<Topic>| {
            if topics.iter().any(|t| t.id == added.id) {
                return Err(VersionedError::Conflict(format!("topic {} already exists", added.id)));
            }
            topics.push(added);
            Ok(topics)
        })
        .await?;

    info!(topic = %topic.id, total = updated.items.len(), "topic added");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Topic added successfully",
            "topic": topic,
            "persisted": updated.outcome.is_persisted(),
        })),
    ))
}

pub async fn update_topic(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let mut replacement = Topic::from_request(body)?;
    if replacement.id != id {
        return Err(ApiError::bad_request("topic id in body does not match the path"));
    }
    let user = requester(&headers);

    let updated = state
        .topics
        .update(&state.topics_key, move |mut topics: Vec<Topic>| {
            let slot = topics
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or_else(|| VersionedError::NotFound(format!("topic {id}")))?;
            if !slot.editable_by(user.as_deref()) {
                return Err(VersionedError::Conflict(format!("topic {id} belongs to another user")));
            }
            replacement.created_by = slot.created_by.clone().or(replacement.created_by);
            *slot = replacement;
            Ok(topics)
        })
        .await?;

    Ok(Json(json!({
        "message": "Topic updated successfully",
        "persisted": updated.outcome.is_persisted(),
    })))
}

pub async fn delete_topic(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let user = requester(&headers);
    let updated = state
        .topics
        .update(&state.topics_key, move |topics: Vec<Topic>| {
            let Some(topic) = topics.iter().find(|t| t.id == id) else {
                return Err(VersionedError::NotFound(format!("topic {id}")));
            };
            if !topic.editable_by(user.as_deref()) {
                return Err(VersionedError::Conflict(format!("topic {id} belongs to another user")));
            }
            Ok(topics.into_iter().filter(|t| t.id != id).collect())
        })
        .await?;

    Ok(Json(json!({
        "message": "Topic deleted successfully",
        "persisted": updated.outcome.is_persisted(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct CredentialsBody {
    username: Option<String>,
    password: Option<String>,
}

impl CredentialsBody {
    fn require(self) -> ApiResult<(String, String)> {
        match (self.username, self.password) {
            (Some(u), Some(p)) if !u.trim().is_empty() && !p.is_empty() => Ok((u.trim().to_string(), p)),
            _ => Err(ApiError::bad_request("username and password are required")),
        }
    }
}

pub async fn register(
    State(state): State<SharedState>,
    Json(body): Json<CredentialsBody>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let (username, password) = body.require()?;
    let user = UserRecord::register(&state.digest, &username, &password);
    let public = user.public();

    state
        .users
        .update(&state.users_key, move |mut users: Vec<UserRecord>| {
            if users.iter().any(|u| u.username == user.username) {
                return Err(VersionedError::Conflict(format!("username {} is taken", user.username)));
            }
            users.push(user);
            Ok(users)
        })
        .await?;

    info!(user = %public.id, "account registered");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Registered", "user": public })),
    ))
}

pub async fn login(
    State(state): State<SharedState>,
    Json(body): Json<CredentialsBody>,
) -> ApiResult<Json<Value>> {
    let (username, password) = body.require()?;
    // A failed read must not look like an unknown user.
    let users = state.users.read_latest::<UserRecord>(&state.users_key).await?.items;
    let user = users
        .iter()
        .find(|u| u.username == username)
        .filter(|u| state.digest.verify(&username, &password, &u.password_hash))
        .ok_or_else(|| ApiError::Unauthorized("wrong username or password".into()))?;
    Ok(Json(json!({ "message": "Logged in", "user": user.public() })))
}

pub async fn get_leaderboard(
    State(state): State<SharedState>,
    Path(topic_id): Path<String>,
) -> ApiResult<Json<Vec<LeaderboardEntry>>> {
    let key = leaderboard_key(&topic_id)?;
    Ok(Json(state.leaderboards.read_latest_or_empty(&key).await))
}

pub async fn submit_run(
    State(state): State<SharedState>,
    Path(topic_id): Path<String>,
    Json(submission): Json<RunSubmission>,
) -> ApiResult<Json<Value>> {
    let key = leaderboard_key(&topic_id)?;
    let entry = submission.into_entry()?;
    let updated = state
        .leaderboards
        .update(&key, move |rows: Vec<LeaderboardEntry>| Ok(rank(rows, entry)))
        .await?;

    Ok(Json(json!({
        "message": "Score submitted successfully",
        "leaderboard": updated.items,
    })))
}
