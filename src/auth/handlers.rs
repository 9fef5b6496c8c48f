use askama::Template;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use rusqlite::{params, OptionalExtension};
use serde::Deserialize;

use crate::auth::password::{hash_password, verify_password, MIN_PASSWORD_LEN};
use crate::auth::{flash, session, Flash};
use crate::error::AppResult;
use crate::extractors::{CurrentUser, MaybeUser, SessionToken};
use crate::routes::home::Html;
use crate::state::AppState;

// -- Templates --

#[derive(Template)]
#[template(path = "pages/register.html")]
pub struct RegisterTemplate {
    pub user: Option<CurrentUser>,
    pub flash: Option<Flash>,
}

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub user: Option<CurrentUser>,
    pub flash: Option<Flash>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub password: String,
    pub password_confirm: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

// -- Registration --

/// GET /register — render the registration form
pub async fn register_page(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    SessionToken(token): SessionToken,
) -> AppResult<Response> {
    // Already signed in, nothing to register
    if maybe_user.0.is_some() {
        return Ok(Redirect::to("/").into_response());
    }

    let flash = match &token {
        Some(token) => flash::take_flash(&state.db, token)?,
        None => None,
    };

    Ok(Html(RegisterTemplate { user: None, flash }).into_response())
}

/// POST /register — validate and create the account
pub async fn register_submit(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
    Form(form): Form<RegisterForm>,
) -> AppResult<Response> {
    let token = token.as_deref();
    let username = form.username.trim();

    if username.is_empty() {
        return flash::redirect_with(
            &state,
            token,
            Flash::error("Username is required"),
            "/register",
        );
    }
    if form.password.len() < MIN_PASSWORD_LEN {
        return flash::redirect_with(
            &state,
            token,
            Flash::error(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )),
            "/register",
        );
    }
    if form.password != form.password_confirm {
        return flash::redirect_with(
            &state,
            token,
            Flash::error("Passwords do not match"),
            "/register",
        );
    }

    let taken: bool = {
        let conn = state.conn()?;
        conn.query_row(
            "SELECT COUNT(*) > 0 FROM users WHERE username = ?1",
            params![username],
            |row| row.get(0),
        )?
    };
    if taken {
        return flash::redirect_with(
            &state,
            token,
            Flash::error("That username is already taken"),
            "/register",
        );
    }

    let id = uuid::Uuid::now_v7().to_string();
    let password_hash = hash_password(&form.password)?;
    {
        let conn = state.conn()?;
        // The first account becomes the admin
        let user_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        let is_admin = user_count == 0;
        conn.execute(
            "INSERT INTO users (id, username, password_hash, is_admin) VALUES (?1, ?2, ?3, ?4)",
            params![id, username, password_hash, is_admin],
        )?;
    }

    tracing::info!("Registered user {}", username);

    flash::redirect_with(
        &state,
        token,
        Flash::success("You are registered and can now log in"),
        "/login",
    )
}

// -- Login --

/// GET /login — render the login form
pub async fn login_page(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    SessionToken(token): SessionToken,
) -> AppResult<Response> {
    if maybe_user.0.is_some() {
        return Ok(Redirect::to("/").into_response());
    }

    let flash = match &token {
        Some(token) => flash::take_flash(&state.db, token)?,
        None => None,
    };

    Ok(Html(LoginTemplate { user: None, flash }).into_response())
}

/// POST /login — verify credentials and bind the session to the user
pub async fn login_submit(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let username = form.username.trim();

    let found: Option<(String, String)> = {
        let conn = state.conn()?;
        conn.query_row(
            "SELECT id, password_hash FROM users WHERE username = ?1",
            params![username],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?
    };

    let Some((user_id, hash)) = found else {
        return flash::redirect_with(
            &state,
            token.as_deref(),
            Flash::error("Invalid username or password"),
            "/login",
        );
    };
    if !verify_password(&form.password, &hash)? {
        return flash::redirect_with(
            &state,
            token.as_deref(),
            Flash::error("Invalid username or password"),
            "/login",
        );
    }

    // Issue a fresh session on login; the pre-login token must not keep
    // working for the authenticated user.
    if let Some(old) = &token {
        session::delete_session(&state.db, old)?;
    }
    let new_token = session::create_session(
        &state.db,
        Some(&user_id),
        state.config.auth.session_hours,
    )?;
    flash::set_flash(&state.db, &new_token, &Flash::success("You are now logged in"))?;

    let cookie = session::session_cookie(
        &state.config.auth.cookie_name,
        &new_token,
        state.config.auth.session_hours,
    );
    Ok(([(header::SET_COOKIE, cookie)], Redirect::to("/")).into_response())
}

// -- Logout --

/// GET /logout — detach the user from the session and go home
pub async fn logout(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
) -> AppResult<Response> {
    if let Some(token) = &token {
        session::detach_user(&state.db, token)?;
    }

    flash::redirect_with(
        &state,
        token.as_deref(),
        Flash::success("You are logged out"),
        "/",
    )
}
