use crate::error::Result;
use crate::model::{
    CreateUrlRequest, CreateUrlResponse, MessageResponse, RedirectResponse, UpdateUrlRequest,
    UrlEntry,
};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use shorty_core::ShortenParams;
use tracing::info;

pub async fn create_url_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CreateUrlRequest>, JsonRejection>,
) -> Result<Json<CreateUrlResponse>> {
    let Json(request) = payload?;
    let params = ShortenParams {
        long_url: request.long_url,
        custom_code: request.custom_short_url,
    };

    let code = state.shortener().create(params).await?;
    Ok(Json(CreateUrlResponse {
        short_url: state.short_url(&code),
        short_code: code.to_string(),
    }))
}

pub async fn resolve_url_handler(
    Path(short_code): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<RedirectResponse>> {
    let redirect_url = state.shortener().resolve(&short_code).await?;
    Ok(Json(RedirectResponse { redirect_url }))
}

pub async fn update_url_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<UpdateUrlRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>> {
    let Json(request) = payload?;
    state
        .shortener()
        .update(&request.short_url, &request.new_long_url)
        .await?;

    Ok(Json(MessageResponse {
        message: "URL updated successfully.".to_string(),
    }))
}

pub async fn delete_url_handler(
    Path(short_code): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>> {
    state.shortener().delete(&short_code).await?;
    info!(code = %short_code, "short url deleted via api");

    Ok(Json(MessageResponse {
        message: format!("URL with short URL: {short_code} has been deleted."),
    }))
}

pub async fn list_urls_handler(State(state): State<AppState>) -> Result<Json<Vec<UrlEntry>>> {
    let records = state.shortener().list_all().await?;
    Ok(Json(records.into_iter().map(UrlEntry::from).collect()))
}
