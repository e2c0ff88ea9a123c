use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Responder};
use futures_util::StreamExt;
use tracing::instrument;

use crate::{
    constants::{UPLOAD_FILE_FIELD, UPLOAD_ORIGINAL_SIZE_FIELD},
    entities::{pagination::PageQuery, photo::UpdateAnalysisRequest},
    errors::AppError,
    use_cases::{extractors::UserId, upload::UploadRequest},
    AppState,
};

const MAX_TEXT_FIELD_BYTES: usize = 64;

/// Parts of the upload form we care about.
#[derive(Debug, Default)]
struct UploadForm {
    has_file: bool,
    filename: Option<String>,
    bytes: Vec<u8>,
    original_size: Option<u64>,
}

async fn read_upload_form(mut payload: Multipart, max_file_size: usize) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(item) = payload.next().await {
        let mut field = item?;
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            UPLOAD_FILE_FIELD => {
                if form.has_file {
                    return Err(AppError::InvalidInput(format!(
                        "exactly one '{}' field is allowed per upload",
                        UPLOAD_FILE_FIELD
                    )));
                }
                form.has_file = true;
                form.filename = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename())
                    .map(str::to_string);

                while let Some(chunk) = field.next().await {
                    let chunk = chunk?;
                    if form.bytes.len() + chunk.len() > max_file_size {
                        return Err(AppError::InvalidInput(format!(
                            "Image payload exceeds {} bytes",
                            max_file_size
                        )));
                    }
                    form.bytes.extend_from_slice(&chunk);
                }
            }
            UPLOAD_ORIGINAL_SIZE_FIELD => {
                let mut raw = Vec::new();
                while let Some(chunk) = field.next().await {
                    let chunk = chunk?;
                    if raw.len() + chunk.len() > MAX_TEXT_FIELD_BYTES {
                        return Err(AppError::InvalidInput("original_size is too long".into()));
                    }
                    raw.extend_from_slice(&chunk);
                }
                let text = String::from_utf8_lossy(&raw);
                let size = text
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| AppError::InvalidInput("original_size must be a non-negative integer".into()))?;
                form.original_size = Some(size);
            }
            other => {
                tracing::debug!(field = other, "ignoring unknown multipart field");
                while let Some(chunk) = field.next().await {
                    chunk?;
                }
            }
        }
    }

    Ok(form)
}

#[instrument(skip(harvest_id, state, payload), fields(user_id = %user.as_str()))]
pub async fn upload_photo(
    user: UserId,
    harvest_id: web::Path<String>,
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<impl Responder, AppError> {
    let photo_handler = &state.photo_handler;
    let max_file_size = photo_handler.coordinator.limits().max_file_size;

    let form = read_upload_form(payload, max_file_size).await?;
    let filename = form
        .filename
        .ok_or_else(|| AppError::InvalidInput(format!("multipart field '{}' with a filename is required", UPLOAD_FILE_FIELD)))?;

    let accepted = photo_handler
        .upload(UploadRequest {
            user_id: user.0,
            harvest_id: harvest_id.into_inner(),
            filename,
            bytes: form.bytes,
            original_size: form.original_size,
        })
        .await?;

    Ok(HttpResponse::Accepted().json(accepted.photo))
}

#[instrument(skip(harvest_id, state, query), fields(user_id = %user.as_str()))]
pub async fn list_photos(
    user: UserId,
    harvest_id: web::Path<String>,
    query: web::Query<PageQuery>,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let photos = state
        .photo_handler
        .list_photos(user.as_str(), &harvest_id, &query)
        .await?;
    Ok(HttpResponse::Ok().json(photos))
}

#[instrument(skip(photo_id, state), fields(user_id = %user.as_str()))]
pub async fn get_photo(
    user: UserId,
    photo_id: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let photo = state.photo_handler.get_photo(user.as_str(), &photo_id).await?;
    Ok(HttpResponse::Ok().json(photo))
}

#[instrument(skip(photo_id, state), fields(user_id = %user.as_str()))]
pub async fn get_best_photo(
    user: UserId,
    photo_id: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let best = state
        .photo_handler
        .best_available(user.as_str(), &photo_id)
        .await?;
    Ok(HttpResponse::Ok().json(best))
}

#[instrument(skip(photo_id, state, data), fields(user_id = %user.as_str()))]
pub async fn update_analysis_status(
    user: UserId,
    photo_id: web::Path<String>,
    state: web::Data<AppState>,
    data: web::Json<UpdateAnalysisRequest>,
) -> Result<impl Responder, AppError> {
    let photo = state
        .photo_handler
        .update_analysis_status(user.as_str(), &photo_id, data.into_inner().status)
        .await?;
    Ok(HttpResponse::Ok().json(photo))
}
