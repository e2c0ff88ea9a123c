use actix_web::{web, HttpResponse, Responder};
use tracing::instrument;

use crate::{
    entities::harvest::NewHarvestRequest,
    errors::AppError,
    use_cases::extractors::UserId,
    AppState,
};

#[instrument(skip(state, data), fields(user_id = %user.as_str()))]
pub async fn create_harvest(
    user: UserId,
    state: web::Data<AppState>,
    data: web::Json<NewHarvestRequest>,
) -> Result<impl Responder, AppError> {
    let harvest = state
        .harvest_handler
        .create_harvest(user.as_str(), data.into_inner())
        .await?;

    Ok(HttpResponse::Created().json(harvest))
}

#[instrument(skip(harvest_id, state), fields(user_id = %user.as_str()))]
pub async fn get_harvest(
    user: UserId,
    harvest_id: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let harvest = state
        .harvest_handler
        .get_harvest(user.as_str(), &harvest_id)
        .await?;
    Ok(HttpResponse::Ok().json(harvest))
}
