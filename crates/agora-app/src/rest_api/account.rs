use crate::{
    auth::token::current_user_id, error::ApiResult, repository_from_request, state::AppState,
};
use agora_dal::follow::FollowRepository;
use agora_types::claim::ApiClaim;
use axum::{
    extract::Path,
    response::IntoResponse,
    routing::{get, post},
    Json,
};
use http::StatusCode;
use serde_json::json;

repository_from_request!(FollowRepository);

pub async fn follow(
    Path(user_id): Path<i64>,
    claim: ApiClaim,
    repository: FollowRepository,
) -> ApiResult<impl IntoResponse> {
    repository.follow(current_user_id(&claim)?, user_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User followed successfully" })),
    ))
}

pub async fn unfollow(
    Path(user_id): Path<i64>,
    claim: ApiClaim,
    repository: FollowRepository,
) -> ApiResult<impl IntoResponse> {
    repository.unfollow(current_user_id(&claim)?, user_id).await?;
    Ok(Json(json!({ "message": "User unfollowed successfully" })))
}

pub async fn following(
    claim: ApiClaim,
    repository: FollowRepository,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(repository.following(current_user_id(&claim)?).await?))
}

pub async fn followers(
    claim: ApiClaim,
    repository: FollowRepository,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(repository.followers(current_user_id(&claim)?).await?))
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/follow/{user_id}/", post(follow))
        .route("/unfollow/{user_id}/", post(unfollow))
        .route("/following/", get(following))
        .route("/followers/", get(followers))
}
