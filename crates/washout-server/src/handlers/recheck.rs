//! POST /recheck: match a user-edited list of names.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;

use crate::error::{CheckError, CheckResult};
use crate::orchestrator::MatchReport;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RecheckRequest {
    pub drugs: Vec<String>,
}

pub async fn recheck(
    State(state): State<AppState>,
    payload: Result<Json<RecheckRequest>, JsonRejection>,
) -> CheckResult<Json<MatchReport>> {
    let Json(request) = payload.map_err(|e| CheckError::input(e.body_text()))?;
    let report = state.orchestrator.recheck_names(&request.drugs)?;
    Ok(Json(report))
}
