use crate::{
    error::ApiResult,
    repository_from_request,
    rest_api::{Page, Paging},
    state::AppState,
    validate::Garde,
};
use agora_dal::author::{AuthorRepository, CreateAuthor};
use agora_types::claim::ApiClaim;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json,
};
use http::StatusCode;

repository_from_request!(AuthorRepository);

pub async fn list(
    repository: AuthorRepository,
    State(state): State<AppState>,
    Garde(Query(paging)): Garde<Query<Paging>>,
) -> ApiResult<impl IntoResponse> {
    let page_size = paging.page_size(state.config().default_page_size);
    let batch = repository
        .list(paging.into_listing_params(state.config().default_page_size)?)
        .await?;
    Ok(Json(Page::from_batch(batch, page_size)))
}

pub async fn get_author(
    Path(id): Path<i64>,
    repository: AuthorRepository,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(repository.get(id).await?))
}

pub async fn create(
    _claim: ApiClaim,
    repository: AuthorRepository,
    Garde(Json(payload)): Garde<Json<CreateAuthor>>,
) -> ApiResult<impl IntoResponse> {
    let author = repository.create(payload).await?;
    Ok((StatusCode::CREATED, Json(author)))
}

/// Author's books are deleted too
pub async fn delete_author(
    Path(id): Path<i64>,
    _claim: ApiClaim,
    repository: AuthorRepository,
) -> ApiResult<impl IntoResponse> {
    repository.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/authors/", get(list).post(create))
        .route("/authors/{id}/", get(get_author).delete(delete_author))
}
