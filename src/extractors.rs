use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Redirect, Response};

use crate::auth::session;
use crate::state::AppState;

/// Represents the currently authenticated user.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
    pub is_admin: bool,
}

impl CurrentUser {
    /// Owners can change their own content; admins can change anyone's.
    pub fn can_modify(&self, owner_id: &str) -> bool {
        self.is_admin || self.id == owner_id
    }
}

/// Where a failed guard sends the browser. Guarded pages must never be
/// served to a visitor who fails the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardRedirect {
    Login,
    Home,
}

impl IntoResponse for GuardRedirect {
    fn into_response(self) -> Response {
        match self {
            GuardRedirect::Login => Redirect::to("/login").into_response(),
            GuardRedirect::Home => Redirect::to("/").into_response(),
        }
    }
}

/// Extractor that requires authentication. Unauthenticated (or expired)
/// visitors are redirected to the login page.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = GuardRedirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(parts, &state.config.auth.cookie_name)
            .ok_or(GuardRedirect::Login)?;

        match session::session_user(&state.db, &token) {
            Ok(Some((id, username, is_admin))) => Ok(CurrentUser {
                id,
                username,
                is_admin,
            }),
            _ => Err(GuardRedirect::Login),
        }
    }
}

/// Extractor that requires an admin. Non-admin users are sent home, not
/// shown the admin content.
#[derive(Debug, Clone)]
pub struct AdminUser(pub CurrentUser);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = GuardRedirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(GuardRedirect::Home);
        }
        Ok(AdminUser(user))
    }
}

/// Optional user extractor — None instead of a redirect when not
/// authenticated, so templates can branch on login state.
pub struct MaybeUser(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match CurrentUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(MaybeUser(Some(user))),
            Err(_) => Ok(MaybeUser(None)),
        }
    }
}

/// The raw session token from the request cookie, if any. Carries no
/// validity guarantee.
pub struct SessionToken(pub Option<String>);

impl FromRequestParts<AppState> for SessionToken {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(SessionToken(session_token(
            parts,
            &state.config.auth.cookie_name,
        )))
    }
}

fn session_token(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == name {
                Some(val.to_string())
            } else {
                None
            }
        })
}
