use crate::{
    auth::token::RequiredRolesLayer,
    error::ApiResult,
    repository_from_request,
    rest_api::{Page, Paging},
    validate::Garde,
};
use agora_dal::user::{CreateUser, UpdateRoles, UserRepository};

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{delete, post, put},
    Json,
};
use http::StatusCode;
use agora_types::claim::Role;

use crate::state::AppState;

repository_from_request!(UserRepository);

pub async fn create_user(
    user_registry: UserRepository,
    Garde(Json(payload)): Garde<Json<CreateUser>>,
) -> ApiResult<impl IntoResponse> {
    let user = user_registry.create(payload).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

async fn list_users(
    user_registry: UserRepository,
    State(state): State<AppState>,
    Garde(Query(paging)): Garde<Query<Paging>>,
) -> ApiResult<impl IntoResponse> {
    let page_size = paging.page_size(state.config().default_page_size);
    let users = user_registry
        .list(paging.into_listing_params(state.config().default_page_size)?)
        .await?;
    Ok(Json(Page::from_batch(users, page_size)))
}

async fn delete_user(
    Path(id): Path<i64>,
    user_registry: UserRepository,
) -> ApiResult<impl IntoResponse> {
    user_registry.delete(id).await?;

    Ok((StatusCode::NO_CONTENT, ()))
}

async fn update_roles(
    Path(id): Path<i64>,
    user_registry: UserRepository,
    Garde(Json(payload)): Garde<Json<UpdateRoles>>,
) -> ApiResult<impl IntoResponse> {
    let user = user_registry.set_roles(id, &payload.roles).await?;

    Ok(Json(user))
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", post(create_user).get(list_users))
        .route("/{id}", delete(delete_user))
        .route("/{id}/roles", put(update_roles))
        .layer(RequiredRolesLayer::new([Role::Admin]))
}
