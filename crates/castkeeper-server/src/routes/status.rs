use axum::extract::State;
use axum::response::Html;
use axum::Json;
use castkeeper_core::status::StatusView;

use crate::render;
use crate::state::AppState;

/// GET /: the status page shown on the operator screen.
pub async fn index(State(app): State<AppState>) -> Html<String> {
    let view = app.current_view();
    Html(render::status_page(&view, app.config.dashboard.refresh_seconds))
}

/// GET /api/status: the same view as JSON. Never waits on external calls;
/// it returns whatever the poller computed last.
pub async fn get_status(State(app): State<AppState>) -> Json<StatusView> {
    Json(app.current_view())
}
