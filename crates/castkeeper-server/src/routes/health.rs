use axum::extract::State;
use axum::Json;
use castkeeper_core::heartbeat::{classify_liveness, Liveness, ProcessRole};
use castkeeper_core::status::WorkerView;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub checked_at: DateTime<Utc>,
    pub worker: WorkerView,
    pub dashboard: Liveness,
}

/// GET /api/health: peer health read straight from the heartbeat files.
pub async fn get_health(State(app): State<AppState>) -> Result<Json<HealthReport>, AppError> {
    let report = tokio::task::spawn_blocking(move || {
        let now = Utc::now();
        let threshold = app.config.heartbeat.staleness();
        let worker = app.heartbeats.read(ProcessRole::Worker);
        let dashboard = app.heartbeats.read(ProcessRole::Dashboard);
        HealthReport {
            checked_at: now,
            worker: WorkerView::from_heartbeat(
                worker.as_ref(),
                app.exit_flag.is_set(),
                threshold,
                now,
            ),
            dashboard: classify_liveness(dashboard.as_ref(), threshold, now),
        }
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))?;

    Ok(Json(report))
}
