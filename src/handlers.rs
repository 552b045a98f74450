// src/handlers.rs
use crate::{AppState, errors::RenderError, models::*, services::mask};
use actix_multipart::Multipart;
use actix_web::{Error, HttpResponse, web};
use base64::{Engine as _, engine::general_purpose};
use futures_util::TryStreamExt;

/// Converts uploaded files into data-URI image references for the
/// render pipeline. Nothing is persisted.
pub async fn upload_images(mut payload: Multipart) -> Result<HttpResponse, Error> {
    let mut references = Vec::new();

    while let Some(mut field) = payload.try_next().await? {
        let content_type = field
            .content_type()
            .map(|ct| ct.to_string())
            .unwrap_or_else(|| "image/png".to_string());

        let mut data = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            data.extend_from_slice(&chunk);
        }

        if data.is_empty() {
            return Err(RenderError::Validation("Empty upload".to_string()).into());
        }

        references.push(format!(
            "data:{};base64,{}",
            content_type,
            general_purpose::STANDARD.encode(&data)
        ));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "references": references,
        "count": references.len()
    })))
}

pub async fn generate_render(
    params: web::Json<RenderParams>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let params = params.into_inner();
    if params.base_sketches.is_empty() {
        return Err(RenderError::Validation("No sketches provided".to_string()).into());
    }

    let outcome = data.render_service.generate_batch(&params).await;

    match outcome.error {
        // Nothing completed: surface the failure as-is
        Some(error) if outcome.results.is_empty() => Err(error.into()),
        // Renders completed before the failure are not discarded
        Some(error) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "results": outcome.results,
            "count": outcome.results.len(),
            "error": error.to_string()
        }))),
        None => Ok(HttpResponse::Ok().json(serde_json::json!({
            "results": outcome.results,
            "count": outcome.results.len()
        }))),
    }
}

pub async fn edit_image(
    request: web::Json<EditRequest>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let request = request.into_inner();
    if request.instruction.is_empty() && request.annotations.is_empty() {
        return Err(RenderError::Validation(
            "Edit needs an instruction or at least one annotation".to_string(),
        )
        .into());
    }

    let render_url = data
        .render_service
        .edit_image(&request.base_image, &request.instruction, &request.annotations)
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "render_url": render_url })))
}

pub async fn edit_with_mask(
    request: web::Json<MaskedEditRequest>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let request = request.into_inner();
    if !request.selection.is_significant() {
        return Err(RenderError::Validation(
            "Selection is below the minimum size threshold".to_string(),
        )
        .into());
    }

    // The mask must match the base image's pixel dimensions
    let (width, height) = data
        .render_service
        .decode_reference_dimensions(&request.base_image)
        .await?;
    let mask_uri = mask::rasterize_to_data_uri(&request.selection, width, height)?;

    let render_url = data
        .render_service
        .modify_with_mask(&request.base_image, &mask_uri, &request.instruction)
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "render_url": render_url })))
}

pub async fn upscale_image(
    request: web::Json<UpscaleRequest>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let render_url = data
        .render_service
        .upscale_image(&request.source_image)
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "render_url": render_url })))
}
