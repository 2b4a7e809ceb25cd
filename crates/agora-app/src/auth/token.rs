use std::{
    collections::HashSet,
    task::{Context, Poll},
};

use crate::{
    dal::{
        user::{User, UserRepository},
        Error as DalError,
    },
    error::{ApiError, ApiResult, NOT_AUTHENTICATED, NOT_PERMITTED},
    state::AppState,
};
use agora_types::claim::{ApiClaim, Authorization as _, Permission, Role};
use axum::{
    extract::{FromRequestParts, Request, State},
    response::{IntoResponse, Response},
    Json,
};
use cookie::{Cookie, Expiration, SameSite};
use futures::future::BoxFuture;
use headers::{authorization::Bearer, Authorization, HeaderMapExt as _};
use http::{request::Parts, StatusCode};
use serde_json::json;
use time::OffsetDateTime;
use tower::{Layer, Service};
use tower_cookies::Cookies;
use tower_sessions::Session;
use tracing::{debug, error};

use super::{SESSION_USER_KEY, TOKEN_COOKIE_NAME};

/// Claim is placed into request extensions by [`TokenLayer`]
impl FromRequestParts<AppState> for ApiClaim {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ApiClaim>()
            .cloned()
            .ok_or(ApiError::Unauthenticated)
    }
}

pub fn current_user_id(claim: &ApiClaim) -> ApiResult<i64> {
    claim.user_id().ok_or_else(|| {
        error!("Token subject {} is not user id", claim.sub);
        ApiError::Unauthenticated
    })
}

pub fn require_permission(claim: &ApiClaim, permission: Permission) -> ApiResult<()> {
    if claim.has_permission(permission) {
        Ok(())
    } else {
        debug!("User {} is missing permission {permission}", claim.sub);
        Err(ApiError::not_permitted())
    }
}

pub fn require_any_role(
    claim: &ApiClaim,
    roles: impl IntoIterator<Item = Role>,
) -> ApiResult<()> {
    if claim.has_any_role(roles) {
        Ok(())
    } else {
        Err(ApiError::not_permitted())
    }
}

pub(crate) fn claim_for(user: &User) -> ApiClaim {
    ApiClaim::new_expired(user.id, user.roles.iter().copied())
}

pub(crate) fn token_cookie(state: &AppState, token: String) -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE_NAME, token))
        .http_only(true)
        .secure(state.config().secure_cookies)
        .path("/")
        .same_site(SameSite::Lax)
        .expires(Expiration::DateTime(
            OffsetDateTime::now_utc() + state.tokens().default_validity(),
        ))
        .build()
}

/// Issues fresh token for user logged in the session.
///
/// The account is read again from the database, so a deleted user gets no token
/// and changed roles are reflected.
pub async fn token(
    session: Session,
    cookies: Cookies,
    user_registry: UserRepository,
    State(state): State<AppState>,
) -> ApiResult<impl IntoResponse> {
    let user = session.get::<User>(SESSION_USER_KEY).await.map_err(|e| {
        ApiError::InternalError(format!("Failed to get user from session: {e}"))
    })?;

    let session_user = user.ok_or(ApiError::InvalidCredentials)?;
    let known_user = match user_registry.get(session_user.id).await {
        Ok(user) => user,
        Err(DalError::RecordNotFound(_)) => {
            debug!("User {} from session no longer exists", session_user.username);
            return Err(ApiError::InvalidCredentials);
        }
        Err(e) => return Err(e.into()),
    };
    let signed_token = state.tokens().issue(claim_for(&known_user))?;
    cookies.add(token_cookie(&state, signed_token.clone()));

    Ok(signed_token)
}

fn token_from_request(req: &Request) -> Option<String> {
    req.headers()
        .typed_get::<Authorization<Bearer>>()
        .map(|h| h.token().to_string())
        .or_else(|| {
            req.extensions()
                .get::<Cookies>()
                .and_then(|cookies| cookies.get(TOKEN_COOKIE_NAME))
                .map(|c| c.value().to_string())
        })
}

fn reject(status: StatusCode, msg: &str) -> Response {
    (status, Json(json!({ "error": msg }))).into_response()
}

/// Authenticates requests carrying bearer token or token cookie.
///
/// Requests without token pass through anonymous, requests with invalid token are rejected.
/// Must be inside `CookieManagerLayer` to see token cookie.
#[derive(Clone)]
pub struct TokenLayer {
    state: AppState,
}

impl TokenLayer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

impl<S> Layer<S> for TokenLayer {
    type Service = TokenService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TokenService {
            inner,
            state: self.state.clone(),
        }
    }
}

#[derive(Clone)]
pub struct TokenService<S> {
    inner: S,
    state: AppState,
}

impl<S> Service<Request> for TokenService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        if let Some(token) = token_from_request(&req) {
            match self.state.tokens().validate_api_claim(&token) {
                Ok(claim) => {
                    req.extensions_mut().insert(claim);
                }
                Err(e) => {
                    debug!("Rejecting request with invalid token: {e}");
                    let msg = if e.is_expired() {
                        "Token has expired"
                    } else {
                        "Invalid token"
                    };
                    let response = reject(StatusCode::UNAUTHORIZED, msg);
                    return Box::pin(async move { Ok(response) });
                }
            }
        }

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(inner.call(req))
    }
}

/// Lets through only users having at least one of the roles
#[derive(Clone)]
pub struct RequiredRolesLayer {
    roles: HashSet<Role>,
}

impl RequiredRolesLayer {
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            roles: roles.into_iter().collect(),
        }
    }
}

impl<S> Layer<S> for RequiredRolesLayer {
    type Service = RequiredRolesService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequiredRolesService {
            inner,
            roles: self.roles.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RequiredRolesService<S> {
    inner: S,
    roles: HashSet<Role>,
}

impl<S> Service<Request> for RequiredRolesService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let rejection = match req.extensions().get::<ApiClaim>() {
            None => Some(NOT_AUTHENTICATED),
            Some(claim) if !claim.has_any_role(self.roles.iter().copied()) => {
                debug!("User {} lacks any of roles {:?}", claim.sub, self.roles);
                Some(NOT_PERMITTED)
            }
            Some(_) => None,
        };
        if let Some(msg) = rejection {
            let response = reject(StatusCode::FORBIDDEN, msg);
            return Box::pin(async move { Ok(response) });
        }

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(inner.call(req))
    }
}
