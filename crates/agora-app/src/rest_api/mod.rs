pub mod account;
pub mod author;
pub mod book;
pub mod comment;
pub mod library;
pub mod notification;
mod paging;
pub mod post;
pub mod profile;

pub use paging::{Page, Paging};

use crate::state::AppState;

/// Catalog, blog and social endpoints - must be nested on /api path!
pub fn api_router() -> axum::Router<AppState> {
    axum::Router::new()
        .merge(book::router())
        .merge(author::router())
        .merge(post::router())
        .merge(comment::router())
        .nest("/accounts", account::router())
        .merge(notification::router())
}
