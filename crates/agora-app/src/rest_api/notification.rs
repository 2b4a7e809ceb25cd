use crate::{
    auth::token::current_user_id,
    error::ApiResult,
    repository_from_request,
    rest_api::{Page, Paging},
    state::AppState,
    validate::Garde,
};
use agora_dal::notification::NotificationRepository;
use agora_types::claim::ApiClaim;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json,
};
use serde_json::json;

repository_from_request!(NotificationRepository);

pub async fn list(
    claim: ApiClaim,
    repository: NotificationRepository,
    State(state): State<AppState>,
    Garde(Query(paging)): Garde<Query<Paging>>,
) -> ApiResult<impl IntoResponse> {
    let page_size = paging.page_size(state.config().default_page_size);
    let params = paging.into_listing_params(state.config().default_page_size)?;
    let batch = repository.list(current_user_id(&claim)?, params).await?;
    Ok(Json(Page::from_batch(batch, page_size)))
}

/// Other users' notifications look as missing
pub async fn mark_read(
    Path(id): Path<i64>,
    claim: ApiClaim,
    repository: NotificationRepository,
) -> ApiResult<impl IntoResponse> {
    repository.mark_read(id, current_user_id(&claim)?).await?;
    Ok(Json(json!({ "message": "Notification marked as read" })))
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/notifications/", get(list))
        .route("/notifications/{id}/read/", post(mark_read))
}
