use crate::{
    dal::user::{RegisterUser, User, UserRepository},
    error::{ApiError, ApiResult},
    state::AppState,
    validate::Garde,
};
use axum::{
    extract::{FromRequest as _, State},
    response::IntoResponse,
    routing::{get, post},
    Form, Json,
};
use http::{header::CONTENT_TYPE, StatusCode};
use serde_json::json;
use tower_cookies::{Cookie, Cookies};
use tower_sessions::Session;
use tracing::{debug, warn};

use self::token::{claim_for, token_cookie};

pub(crate) const SESSION_COOKIE_NAME: &str = "agora";
pub(crate) const TOKEN_COOKIE_NAME: &str = "agora_token";
const SESSION_USER_KEY: &str = "user";
const SESSION_EXPIRY_SECS: i64 = 3600;

pub mod token;

/// Ends session and drops token cookie
pub async fn logout(session: Session, cookies: Cookies) -> impl IntoResponse {
    session
        .delete()
        .await
        .unwrap_or_else(|e| warn!("Failed to delete session: {e}"));

    cookies.remove(Cookie::build((SESSION_COOKIE_NAME, "")).path("/").build());
    cookies.remove(Cookie::build((TOKEN_COOKIE_NAME, "")).path("/").build());

    StatusCode::NO_CONTENT
}

/// Builds authentication router - must be nested on /auth path!
pub fn auth_router(state: &AppState) -> axum::Router<AppState> {
    let session_store = tower_sessions::MemoryStore::default();
    let session_layer = tower_sessions::SessionManagerLayer::new(session_store)
        .with_name(SESSION_COOKIE_NAME)
        .with_secure(state.config().secure_cookies)
        .with_expiry(tower_sessions::Expiry::OnInactivity(
            time::Duration::seconds(SESSION_EXPIRY_SECS),
        ));
    axum::Router::new()
        .route("/register", post(register))
        .route("/login", post(db_login))
        .route("/logout", get(logout))
        .route("/token", get(token::token))
        .layer(session_layer)
}

#[derive(serde::Deserialize)]
struct LoginCredentials {
    username: String,
    password: String,
}

/// Stores user in session and hands out API token, both in body and cookie
pub async fn after_ok_login(
    state: &AppState,
    session: &Session,
    cookies: &Cookies,
    known_user: User,
) -> ApiResult<Json<serde_json::Value>> {
    let signed_token = state.tokens().issue(claim_for(&known_user))?;
    cookies.add(token_cookie(state, signed_token.clone()));

    session
        .insert(SESSION_USER_KEY, &known_user)
        .await
        .map_err(|e| ApiError::InternalError(format!("Failed to store user in session: {e}")))?;
    debug!("User {} logged in", known_user.username);

    Ok(Json(json!({ "user": known_user, "token": signed_token })))
}

pub async fn register(
    State(state): State<AppState>,
    user_registry: UserRepository,
    session: Session,
    cookies: Cookies,
    Garde(Json(payload)): Garde<Json<RegisterUser>>,
) -> ApiResult<impl IntoResponse> {
    let user = user_registry.create(payload.into()).await?;
    let body = after_ok_login(&state, &session, &cookies, user).await?;
    Ok((StatusCode::CREATED, body))
}

/// Accepts credentials either as JSON or as urlencoded form
pub async fn db_login(
    State(state): State<AppState>,
    user_registry: UserRepository,
    session: Session,
    cookies: Cookies,
    request: axum::extract::Request,
) -> ApiResult<impl IntoResponse> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let credentials = if content_type.starts_with("application/json") {
        let Json(data) = Json::<LoginCredentials>::from_request(request, &())
            .await
            .map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
        data
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(data) = Form::<LoginCredentials>::from_request(request, &())
            .await
            .map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
        data
    } else {
        return Err(ApiError::InvalidRequest(format!(
            "Unsupported content type: {content_type}"
        )));
    };

    let user = user_registry
        .check_password(&credentials.username, &credentials.password)
        .await
        .map_err(|e| {
            debug!("User check error: {e}");
            ApiError::InvalidCredentials
        })?;

    after_ok_login(&state, &session, &cookies, user).await
}
