use crate::{
    auth::token::{current_user_id, require_any_role, RequiredRolesLayer},
    error::ApiResult,
    repository_from_request,
    rest_api::{book::guarded, Page, Paging},
    state::AppState,
    validate::Garde,
};
use agora_dal::{
    book::{BookFilter, BookRepository},
    library::{CreateLibrary, LibraryRepository},
};
use agora_types::claim::{ApiClaim, Role};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json,
};
use garde::Validate;
use http::StatusCode;
use serde::Deserialize;
use serde_json::json;

repository_from_request!(LibraryRepository);

#[derive(Debug, Deserialize, Validate)]
pub struct AddBook {
    #[garde(range(min = 1))]
    pub book_id: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AssignLibrarian {
    #[garde(range(min = 1))]
    pub user_id: i64,
}

pub async fn list(
    repository: LibraryRepository,
    State(state): State<AppState>,
    Garde(Query(paging)): Garde<Query<Paging>>,
) -> ApiResult<impl IntoResponse> {
    let page_size = paging.page_size(state.config().default_page_size);
    let batch = repository
        .list(paging.into_listing_params(state.config().default_page_size)?)
        .await?;
    Ok(Json(Page::from_batch(batch, page_size)))
}

pub async fn detail(
    Path(id): Path<i64>,
    repository: LibraryRepository,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(repository.detail(id).await?))
}

/// All books including author names
pub async fn list_books(
    repository: BookRepository,
    State(state): State<AppState>,
    Garde(Query(paging)): Garde<Query<Paging>>,
) -> ApiResult<impl IntoResponse> {
    let page_size = paging.page_size(state.config().default_page_size);
    let batch = repository
        .list_with_authors(
            paging.into_listing_params(state.config().default_page_size)?,
            &BookFilter::default(),
        )
        .await?;
    Ok(Json(Page::from_batch(batch, page_size)))
}

pub async fn create(
    claim: ApiClaim,
    repository: LibraryRepository,
    Garde(Json(payload)): Garde<Json<CreateLibrary>>,
) -> ApiResult<impl IntoResponse> {
    require_any_role(&claim, [Role::Admin])?;
    let library = repository.create(payload).await?;
    Ok((StatusCode::CREATED, Json(library)))
}

pub async fn delete_library(
    Path(id): Path<i64>,
    claim: ApiClaim,
    repository: LibraryRepository,
) -> ApiResult<impl IntoResponse> {
    require_any_role(&claim, [Role::Admin])?;
    repository.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_book(
    Path(id): Path<i64>,
    claim: ApiClaim,
    repository: LibraryRepository,
    Garde(Json(payload)): Garde<Json<AddBook>>,
) -> ApiResult<impl IntoResponse> {
    require_any_role(&claim, [Role::Admin, Role::Librarian])?;
    repository.add_book(id, payload.book_id).await?;
    Ok((StatusCode::CREATED, Json(repository.detail(id).await?)))
}

pub async fn remove_book(
    Path((id, book_id)): Path<(i64, i64)>,
    claim: ApiClaim,
    repository: LibraryRepository,
) -> ApiResult<impl IntoResponse> {
    require_any_role(&claim, [Role::Admin, Role::Librarian])?;
    repository.remove_book(id, book_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn assign_librarian(
    Path(id): Path<i64>,
    claim: ApiClaim,
    repository: LibraryRepository,
    Garde(Json(payload)): Garde<Json<AssignLibrarian>>,
) -> ApiResult<impl IntoResponse> {
    require_any_role(&claim, [Role::Admin])?;
    let librarian = repository.assign_librarian(id, payload.user_id).await?;
    Ok(Json(librarian))
}

async fn role_view(claim: ApiClaim, role: Role) -> ApiResult<impl IntoResponse> {
    let user_id = current_user_id(&claim)?;
    Ok(Json(json!({
        "view": role,
        "user_id": user_id,
        "message": format!("Welcome to the {role} view"),
    })))
}

pub async fn admin_view(claim: ApiClaim) -> ApiResult<impl IntoResponse> {
    role_view(claim, Role::Admin).await
}

pub async fn librarian_view(claim: ApiClaim) -> ApiResult<impl IntoResponse> {
    role_view(claim, Role::Librarian).await
}

pub async fn member_view(claim: ApiClaim) -> ApiResult<impl IntoResponse> {
    role_view(claim, Role::Member).await
}

fn role_router(
    path: &str,
    role: Role,
    handler: axum::routing::MethodRouter<AppState>,
) -> axum::Router<AppState> {
    axum::Router::new()
        .route(path, handler)
        .route_layer(RequiredRolesLayer::new([role]))
}

/// Library routes are absolute, so `/library/` keeps its trailing slash
pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/library/", get(list).post(create))
        .route("/library/books/", get(list_books))
        .route("/library/{id}/", get(detail).delete(delete_library))
        .route("/library/{id}/books/", post(add_book))
        .route("/library/{id}/books/{book_id}/", delete(remove_book))
        .route("/library/{id}/librarian/", put(assign_librarian))
        .route("/library/add_book/", post(guarded::add_book))
        .route("/library/edit_book/{id}/", put(guarded::edit_book))
        .route("/library/delete_book/{id}/", delete(guarded::delete_book))
        .merge(role_router("/library/admin/", Role::Admin, get(admin_view)))
        .merge(role_router(
            "/library/librarian/",
            Role::Librarian,
            get(librarian_view),
        ))
        .merge(role_router("/library/member/", Role::Member, get(member_view)))
}
