//! POST /ocr: analyse uploaded prescription images.

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};

use crate::error::{CheckError, CheckResult};
use crate::orchestrator::AnalysisReport;
use crate::upload::stage_images;
use crate::AppState;

pub async fn ocr(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> CheckResult<Json<AnalysisReport>> {
    let multipart = multipart.map_err(|e| CheckError::input(e.body_text()))?;
    let images = stage_images(multipart, &state.limits).await?;
    let report = state.orchestrator.analyze_images(images).await?;
    Ok(Json(report))
}
