use crate::{
    auth::token::current_user_id,
    error::{ApiError, ApiResult},
    repository_from_request,
    rest_api::{Page, Paging},
    state::AppState,
    validate::Garde,
};
use agora_dal::comment::{Comment, CommentFilter, CommentRepository, CreateComment, UpdateComment};
use agora_types::claim::ApiClaim;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json,
};
use http::StatusCode;

repository_from_request!(CommentRepository);

async fn own_comment(
    repository: &CommentRepository,
    id: i64,
    claim: &ApiClaim,
) -> ApiResult<Comment> {
    let comment = repository.get(id).await?;
    if comment.author_id == current_user_id(claim)? {
        Ok(comment)
    } else {
        Err(ApiError::not_permitted())
    }
}

pub async fn list(
    repository: CommentRepository,
    State(state): State<AppState>,
    Garde(Query(filter)): Garde<Query<CommentFilter>>,
    Garde(Query(paging)): Garde<Query<Paging>>,
) -> ApiResult<impl IntoResponse> {
    let page_size = paging.page_size(state.config().default_page_size);
    let params = paging.into_listing_params(state.config().default_page_size)?;
    let batch = repository.list(params, &filter).await?;
    Ok(Json(Page::from_batch(batch, page_size)))
}

pub async fn create(
    claim: ApiClaim,
    repository: CommentRepository,
    Garde(Json(payload)): Garde<Json<CreateComment>>,
) -> ApiResult<impl IntoResponse> {
    let comment = repository.create(current_user_id(&claim)?, payload).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn get_comment(
    Path(id): Path<i64>,
    repository: CommentRepository,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(repository.get(id).await?))
}

/// PUT and PATCH are the same, content is the only editable field
pub async fn update(
    Path(id): Path<i64>,
    claim: ApiClaim,
    repository: CommentRepository,
    Garde(Json(payload)): Garde<Json<UpdateComment>>,
) -> ApiResult<impl IntoResponse> {
    own_comment(&repository, id, &claim).await?;
    Ok(Json(repository.update(id, payload).await?))
}

pub async fn delete_comment(
    Path(id): Path<i64>,
    claim: ApiClaim,
    repository: CommentRepository,
) -> ApiResult<impl IntoResponse> {
    own_comment(&repository, id, &claim).await?;
    repository.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/comments/", get(list).post(create))
        .route(
            "/comments/{id}/",
            get(get_comment)
                .put(update)
                .patch(update)
                .delete(delete_comment),
        )
}
