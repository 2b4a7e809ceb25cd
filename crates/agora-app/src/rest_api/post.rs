use crate::{
    auth::token::current_user_id,
    error::{ApiError, ApiResult},
    repository_from_request,
    rest_api::{Page, Paging},
    state::AppState,
    validate::Garde,
};
use agora_dal::{
    like::LikeRepository,
    post::{CreatePost, PatchPost, Post, PostFilter, PostRepository},
};
use agora_types::claim::ApiClaim;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json,
};
use garde::Validate as _;
use http::StatusCode;
use serde_json::json;
use tracing::debug;

repository_from_request!(PostRepository);
repository_from_request!(LikeRepository);

/// Only author can change or delete the post
async fn own_post(repository: &PostRepository, id: i64, claim: &ApiClaim) -> ApiResult<Post> {
    let post = repository.get(id).await?;
    if post.author_id != current_user_id(claim)? {
        debug!("User {} is not author of post {id}", claim.sub);
        return Err(ApiError::not_permitted());
    }
    Ok(post)
}

pub async fn list(
    repository: PostRepository,
    State(state): State<AppState>,
    Garde(Query(filter)): Garde<Query<PostFilter>>,
    Garde(Query(paging)): Garde<Query<Paging>>,
) -> ApiResult<impl IntoResponse> {
    let page_size = paging.page_size(state.config().default_page_size);
    let params = paging.into_listing_params(state.config().default_page_size)?;
    let batch = repository.list(params, &filter).await?;
    Ok(Json(Page::from_batch(batch, page_size)))
}

pub async fn create(
    claim: ApiClaim,
    repository: PostRepository,
    Garde(Json(payload)): Garde<Json<CreatePost>>,
) -> ApiResult<impl IntoResponse> {
    let post = repository.create(current_user_id(&claim)?, payload).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn get_post(
    Path(id): Path<i64>,
    repository: PostRepository,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(repository.get(id).await?))
}

pub async fn update(
    Path(id): Path<i64>,
    claim: ApiClaim,
    repository: PostRepository,
    Garde(Json(payload)): Garde<Json<CreatePost>>,
) -> ApiResult<impl IntoResponse> {
    own_post(&repository, id, &claim).await?;
    Ok(Json(repository.update(id, payload).await?))
}

pub async fn patch(
    Path(id): Path<i64>,
    claim: ApiClaim,
    repository: PostRepository,
    Garde(Json(patch)): Garde<Json<PatchPost>>,
) -> ApiResult<impl IntoResponse> {
    let current = own_post(&repository, id, &claim).await?;
    let merged = patch.apply(current);
    merged.validate()?;
    Ok(Json(repository.update(id, merged).await?))
}

pub async fn delete_post(
    Path(id): Path<i64>,
    claim: ApiClaim,
    repository: PostRepository,
) -> ApiResult<impl IntoResponse> {
    own_post(&repository, id, &claim).await?;
    repository.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn like(
    Path(id): Path<i64>,
    claim: ApiClaim,
    likes: LikeRepository,
) -> ApiResult<impl IntoResponse> {
    likes.like(current_user_id(&claim)?, id).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Post liked successfully" })),
    ))
}

pub async fn unlike(
    Path(id): Path<i64>,
    claim: ApiClaim,
    likes: LikeRepository,
) -> ApiResult<impl IntoResponse> {
    likes.unlike(current_user_id(&claim)?, id).await?;
    Ok(Json(json!({ "message": "Post unliked successfully" })))
}

/// Posts of followed users, always newest first
pub async fn feed(
    claim: ApiClaim,
    repository: PostRepository,
    State(state): State<AppState>,
    Garde(Query(paging)): Garde<Query<Paging>>,
) -> ApiResult<impl IntoResponse> {
    let page_size = paging.page_size(state.config().default_page_size);
    let params = paging.into_listing_params(state.config().default_page_size)?;
    let batch = repository.feed(current_user_id(&claim)?, params).await?;
    Ok(Json(Page::from_batch(batch, page_size)))
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/posts/", get(list).post(create))
        .route(
            "/posts/{id}/",
            get(get_post).put(update).patch(patch).delete(delete_post),
        )
        .route("/posts/{id}/like/", post(like))
        .route("/posts/{id}/unlike/", post(unlike))
        .route("/feed/", get(feed))
}
