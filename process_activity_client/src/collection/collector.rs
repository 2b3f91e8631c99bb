use crate::collection::classifier;
use crate::collection::process_source::ProcessEntry;
use crate::errors::AppError;
use crate::event_types::{
    ACTIVITY_TYPE_PROCESS_MONITORING, ActivityRecord, SYNTHETIC_DURATION_SECS,
    WORKSPACE_TYPE_LOCAL,
};
use chrono::{DateTime, Utc};

/// Turns process snapshots into activity records for a single user.
///
/// A user id must be set (normally from the login response) before any
/// records can be produced.
#[derive(Debug, Default)]
pub struct ActivityCollector {
    user_id: Option<i64>,
}

impl ActivityCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The login payload's user id is optional, so this takes the `Option`
    /// straight from the session and rejects an absent id.
    pub fn set_user_id(&mut self, user_id: Option<i64>) -> Result<(), AppError> {
        let user_id = user_id.ok_or_else(|| {
            AppError::InvalidState("user id must be provided before collecting".to_string())
        })?;
        self.user_id = Some(user_id);
        tracing::info!("Activity collector user id set to {}", user_id);
        Ok(())
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user_id
    }

    /// Builds one record per snapshot entry, in snapshot order. Entries that
    /// cannot be turned into a record are logged and skipped; they never fail
    /// the whole snapshot.
    pub fn build_records(&self, snapshot: &[ProcessEntry]) -> Result<Vec<ActivityRecord>, AppError> {
        let user_id = self.user_id.ok_or_else(|| {
            AppError::InvalidState("user id is not set; log in first".to_string())
        })?;

        let now = Utc::now();
        let mut records = Vec::with_capacity(snapshot.len());
        for entry in snapshot {
            match build_record(user_id, entry, now) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!("Skipping process entry (pid {}): {}", entry.pid, e);
                }
            }
        }
        Ok(records)
    }
}

fn build_record(
    user_id: i64,
    entry: &ProcessEntry,
    now: DateTime<Utc>,
) -> Result<ActivityRecord, AppError> {
    if entry.name.trim().is_empty() {
        return Err(AppError::InvalidState(
            "process entry has no name".to_string(),
        ));
    }

    let window_title = entry
        .window_title
        .clone()
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| entry.name.clone());
    let application_path = entry
        .executable_path
        .as_ref()
        .map(|path| path.to_string_lossy().into_owned())
        .unwrap_or_default();

    let category = classifier::categorize(&entry.name, &window_title, &application_path);

    Ok(ActivityRecord {
        user_id,
        process_name: entry.name.clone(),
        window_title,
        process_id: entry.pid.to_string(),
        application_path,
        start_time: now,
        end_time: now + chrono::Duration::seconds(SYNTHETIC_DURATION_SECS),
        duration_seconds: SYNTHETIC_DURATION_SECS as u32,
        category,
        is_productive_app: classifier::is_productive(category),
        activity_type: ACTIVITY_TYPE_PROCESS_MONITORING.to_string(),
        description: format!("Process monitoring: {}", entry.name),
        workspace_type: WORKSPACE_TYPE_LOCAL.to_string(),
        application_category: category,
    })
}
