//! Records stored in the topic and leaderboard collections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ApiError, ApiResult};

/// Rows kept per leaderboard.
pub const LEADERBOARD_LIMIT: usize = 50;

/// A quiz topic. Fields beyond the checked ones are kept as sent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: String,
    pub title: String,
    /// Each answer is `[display, reading, alternatives...]`.
    pub answers: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Topic {
    /// Shape check of a client-supplied topic.
    pub fn from_request(body: Value) -> ApiResult<Self> {
        let topic: Topic =
            serde_json::from_value(body).map_err(|e| ApiError::bad_request(format!("invalid topic format: {e}")))?;
        if topic.id.trim().is_empty() || topic.title.trim().is_empty() {
            return Err(ApiError::bad_request("invalid topic format: id and title are required"));
        }
        if topic.answers.iter().any(Vec::is_empty) {
            return Err(ApiError::bad_request("invalid topic format: empty answer"));
        }
        Ok(topic)
    }

    /// Whether `user` may change this topic. Topics without an owner are open.
    pub fn editable_by(&self, user: Option<&str>) -> bool {
        match &self.created_by {
            None => true,
            Some(owner) => user == Some(owner.as_str()),
        }
    }
}

/// A run submitted to a topic's leaderboard.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSubmission {
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub clear_time: Option<f64>,
}

/// One leaderboard row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub username: String,
    /// Time to clear the topic; lower is better.
    pub clear_time: f64,
    pub date: DateTime<Utc>,
}

impl RunSubmission {
    pub fn into_entry(self) -> ApiResult<LeaderboardEntry> {
        let missing = || ApiError::bad_request("missing run data: userId, username and clearTime are required");
        let user_id = self.user_id.filter(|s| !s.is_empty()).ok_or_else(missing)?;
        let username = self.username.filter(|s| !s.is_empty()).ok_or_else(missing)?;
        let clear_time = self
            .clear_time
            .filter(|t| t.is_finite() && *t > 0.0)
            .ok_or_else(missing)?;
        Ok(LeaderboardEntry {
            user_id,
            username,
            clear_time,
            date: Utc::now(),
        })
    }
}

/// Insert `entry`, order by clear time and keep the best
/// [`LEADERBOARD_LIMIT`] rows. Equal times keep submission order.
pub fn rank(mut rows: Vec<LeaderboardEntry>, entry: LeaderboardEntry) -> Vec<LeaderboardEntry> {
    rows.push(entry);
    rows.sort_by(|a, b| a.clear_time.total_cmp(&b.clear_time));
    rows.truncate(LEADERBOARD_LIMIT);
    rows
}
