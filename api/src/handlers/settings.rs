use std::collections::BTreeMap;

use axum::{extract::State, Json};
use common::errors::StoreError;
use common::models::{Frequency, OptionKey};
use common::reconcile::ReconcileAction;
use common::schedule::parse_time_of_day;
use serde::Serialize;

use crate::handlers::{ApiResult, ErrorResponse, SuccessResponse};
use crate::state::AppState;

const REDACTED: &str = "********";

/// Result of a settings update
#[derive(Debug, Serialize)]
pub struct SettingsUpdate {
    pub updated: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<ReconcileAction>,
}

/// Current value of every option; secrets are masked
#[tracing::instrument(skip(state))]
pub async fn get_settings(
    State(state): State<AppState>,
) -> ApiResult<BTreeMap<String, Option<String>>> {
    let mut values = BTreeMap::new();
    for key in OptionKey::ALL {
        let value = state.store.get(key).await?;
        let shown = match value {
            Some(_) if key.is_secret() => Some(REDACTED.to_string()),
            other => other,
        };
        values.insert(key.as_str().to_string(), shown);
    }
    Ok(SuccessResponse::new(values))
}

/// Parse and validate a partial update before anything is written
fn parse_update(
    body: BTreeMap<String, Option<String>>,
) -> Result<Vec<(OptionKey, Option<String>)>, ErrorResponse> {
    let mut changes = Vec::with_capacity(body.len());
    for (name, value) in body {
        let key: OptionKey = name
            .parse()
            .map_err(|e: String| ErrorResponse::new("validation_error", e))?;

        let value = value.filter(|v| !v.trim().is_empty());
        if let Some(raw) = &value {
            match key {
                OptionKey::SelectScheduleBuilds => {
                    raw.parse::<Frequency>()
                        .map_err(|e| ErrorResponse::new("validation_error", e))?;
                }
                OptionKey::SelectTimeBuild => {
                    parse_time_of_day(raw)?;
                }
                _ => {}
            }
        }
        changes.push((key, value));
    }
    Ok(changes)
}

/// Write each changed value, recording which keys were written
///
/// Stops at the first store failure; `updated` still lists what was written.
async fn apply_changes(
    state: &AppState,
    changes: Vec<(OptionKey, Option<String>)>,
    updated: &mut Vec<OptionKey>,
) -> Result<(), StoreError> {
    for (key, value) in changes {
        let current = state.store.get(key).await?;
        if current == value {
            continue;
        }

        match value {
            Some(v) => state.store.set(key, v).await?,
            None => state.store.delete(key).await?,
        }
        updated.push(key);
    }
    Ok(())
}

/// Apply a partial settings update
///
/// A `null` or blank value clears the key. The recurring build is reset only
/// when the enable flag, frequency or time of day actually changed value,
/// including when a later write fails after a schedule key was stored.
#[tracing::instrument(skip(state, body))]
pub async fn update_settings(
    State(state): State<AppState>,
    Json(body): Json<BTreeMap<String, Option<String>>>,
) -> ApiResult<SettingsUpdate> {
    let changes = parse_update(body)?;

    let mut written = Vec::new();
    let applied = apply_changes(&state, changes, &mut written).await;
    let schedule_changed = written.iter().any(OptionKey::affects_schedule);

    if let Err(e) = applied {
        if schedule_changed {
            if let Err(reconcile_err) = state.reconciler.on_settings_changed().await {
                tracing::error!(error = %reconcile_err, "Schedule reset after partial update failed");
            }
        }
        tracing::warn!(written = ?written, "Settings update stopped part way");
        return Err(e.into());
    }

    let schedule = if schedule_changed {
        Some(state.reconciler.on_settings_changed().await?)
    } else {
        None
    };

    let updated: Vec<String> = written.iter().map(|k| k.as_str().to_string()).collect();
    tracing::info!(updated = ?updated, schedule = ?schedule, "Settings updated");
    Ok(SuccessResponse::new(SettingsUpdate { updated, schedule }))
}
