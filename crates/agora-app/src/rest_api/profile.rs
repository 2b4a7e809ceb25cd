use crate::{
    auth::token::current_user_id, error::ApiResult, repository_from_request, state::AppState,
    validate::Garde,
};
use agora_dal::{
    profile::ProfileRepository,
    user::{UpdateProfile, UserRepository},
};
use agora_types::claim::ApiClaim;
use axum::{extract::Path, response::IntoResponse, routing::{get, post}, Json};

repository_from_request!(ProfileRepository);

pub async fn get_profile(
    claim: ApiClaim,
    repository: ProfileRepository,
) -> ApiResult<impl IntoResponse> {
    let user_id = current_user_id(&claim)?;
    Ok(Json(repository.get(user_id).await?))
}

pub async fn update_profile(
    claim: ApiClaim,
    users: UserRepository,
    repository: ProfileRepository,
    Garde(Json(payload)): Garde<Json<UpdateProfile>>,
) -> ApiResult<impl IntoResponse> {
    let user_id = current_user_id(&claim)?;
    users.update_profile(user_id, payload).await?;
    Ok(Json(repository.get(user_id).await?))
}

pub async fn add_favorite(
    Path(book_id): Path<i64>,
    claim: ApiClaim,
    repository: ProfileRepository,
) -> ApiResult<impl IntoResponse> {
    let user_id = current_user_id(&claim)?;
    Ok(Json(repository.add_favorite(user_id, book_id).await?))
}

pub async fn remove_favorite(
    Path(book_id): Path<i64>,
    claim: ApiClaim,
    repository: ProfileRepository,
) -> ApiResult<impl IntoResponse> {
    let user_id = current_user_id(&claim)?;
    Ok(Json(repository.remove_favorite(user_id, book_id).await?))
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/profile/", get(get_profile).put(update_profile))
        .route(
            "/profile/favorites/{book_id}/",
            post(add_favorite).delete(remove_favorite),
        )
}
