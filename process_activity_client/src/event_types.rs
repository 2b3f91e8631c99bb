use crate::collection::classifier::ActivityCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const ACTIVITY_TYPE_PROCESS_MONITORING: &str = "PROCESS_MONITORING";
pub const WORKSPACE_TYPE_LOCAL: &str = "LOCAL";

/// Reported duration of one observation. The client samples the process list
/// rather than measuring focus time, so every record carries the same
/// synthetic one-minute window.
pub const SYNTHETIC_DURATION_SECS: i64 = 60;

/// One observed process, in the exact shape the tracking server ingests on
/// `POST /api/logs/batch`. Field names on the wire are camelCase and the
/// timestamps serialize as ISO-8601.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub user_id: i64,
    pub process_name: String,
    pub window_title: String,
    pub process_id: String,
    pub application_path: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: u32,
    pub category: ActivityCategory,
    pub is_productive_app: bool,
    pub activity_type: String,
    pub description: String,
    pub workspace_type: String,
    pub application_category: ActivityCategory,
}
