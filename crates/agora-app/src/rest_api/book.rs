use crate::{
    auth::token::require_permission,
    error::{ApiError, ApiResult},
    repository_from_request,
    rest_api::{Page, Paging},
    state::AppState,
    validate::Garde,
};
use agora_dal::book::{BookFilter, BookRepository, CreateBook, PatchBook};
use agora_types::claim::{ApiClaim, Permission};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json,
};
use garde::Validate as _;
use http::StatusCode;

repository_from_request!(BookRepository);

pub async fn list(
    repository: BookRepository,
    State(state): State<AppState>,
    Garde(Query(filter)): Garde<Query<BookFilter>>,
    Garde(Query(paging)): Garde<Query<Paging>>,
) -> ApiResult<impl IntoResponse> {
    let page_size = paging.page_size(state.config().default_page_size);
    let params = paging.into_listing_params(state.config().default_page_size)?;
    let batch = repository.list(params, &filter).await?;
    Ok(Json(Page::from_batch(batch, page_size)))
}

pub async fn get_book(
    Path(id): Path<i64>,
    repository: BookRepository,
) -> ApiResult<impl IntoResponse> {
    let book = repository.get(id).await?;
    Ok(Json(book))
}

pub async fn create(
    _claim: ApiClaim,
    repository: BookRepository,
    Garde(Json(payload)): Garde<Json<CreateBook>>,
) -> ApiResult<impl IntoResponse> {
    let book = repository.create(payload).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

pub async fn update(
    Path(id): Path<i64>,
    _claim: ApiClaim,
    repository: BookRepository,
    Garde(Json(payload)): Garde<Json<CreateBook>>,
) -> ApiResult<impl IntoResponse> {
    let book = repository.update(id, payload).await?;
    Ok(Json(book))
}

pub async fn patch(
    Path(id): Path<i64>,
    _claim: ApiClaim,
    repository: BookRepository,
    Garde(Json(patch)): Garde<Json<PatchBook>>,
) -> ApiResult<impl IntoResponse> {
    let current = repository.get(id).await?;
    let merged = patch.apply(current);
    merged.validate().map_err(ApiError::Validation)?;
    let book = repository.update(id, merged).await?;
    Ok(Json(book))
}

pub async fn delete_book(
    Path(id): Path<i64>,
    _claim: ApiClaim,
    repository: BookRepository,
) -> ApiResult<impl IntoResponse> {
    repository.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Book management guarded by permissions instead of plain authentication
pub mod guarded {
    use super::*;

    pub async fn add_book(
        claim: ApiClaim,
        repository: BookRepository,
        Garde(Json(payload)): Garde<Json<CreateBook>>,
    ) -> ApiResult<impl IntoResponse> {
        require_permission(&claim, Permission::AddBook)?;
        let book = repository.create(payload).await?;
        Ok((StatusCode::CREATED, Json(book)))
    }

    pub async fn edit_book(
        Path(id): Path<i64>,
        claim: ApiClaim,
        repository: BookRepository,
        Garde(Json(payload)): Garde<Json<CreateBook>>,
    ) -> ApiResult<impl IntoResponse> {
        require_permission(&claim, Permission::ChangeBook)?;
        let book = repository.update(id, payload).await?;
        Ok(Json(book))
    }

    pub async fn delete_book(
        Path(id): Path<i64>,
        claim: ApiClaim,
        repository: BookRepository,
    ) -> ApiResult<impl IntoResponse> {
        require_permission(&claim, Permission::DeleteBook)?;
        repository.delete(id).await?;
        Ok(StatusCode::NO_CONTENT)
    }
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/books/", get(list))
        .route("/books/create/", post(create))
        .route("/books/{id}/", get(get_book))
        .route("/books/update/{id}/", put(update).patch(patch))
        .route("/books/delete/{id}/", delete(delete_book))
}
