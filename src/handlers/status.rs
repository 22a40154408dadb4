//! Bot status endpoint

use axum::{extract::State, Json};
use std::sync::Arc;

use super::AppState;
use crate::engine::BotStatus;

/// Current position, statistics, cooldown and blacklist size
///
/// GET /api/v1/status
pub async fn bot_status(State(state): State<Arc<AppState>>) -> Json<BotStatus> {
    Json(state.bot.status())
}
