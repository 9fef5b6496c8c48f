use askama::Template;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use rusqlite::params;

use crate::auth::{flash, Flash};
use crate::error::AppResult;
use crate::extractors::{AdminUser, CurrentUser, SessionToken};
use crate::routes::home::Html;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/admin_users.html")]
struct AdminUsersTemplate {
    user: Option<CurrentUser>,
    flash: Option<Flash>,
    users: Vec<UserRow>,
}

struct UserRow {
    id: String,
    username: String,
    is_admin: bool,
    created_at: String,
    post_count: i64,
}

/// GET /admin/users — user management page
async fn users_page(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    SessionToken(token): SessionToken,
) -> AppResult<Response> {
    let flash = match &token {
        Some(token) => flash::take_flash(&state.db, token)?,
        None => None,
    };

    let conn = state.conn()?;
    let users: Vec<UserRow> = {
        let mut stmt = conn.prepare(
            "SELECT u.id, u.username, u.is_admin, u.created_at, \
             (SELECT COUNT(*) FROM posts p WHERE p.user_id = u.id) \
             FROM users u ORDER BY u.created_at ASC, u.id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                is_admin: row.get(2)?,
                created_at: row.get(3)?,
                post_count: row.get(4)?,
            })
        })?;
        rows.collect::<Result<_, _>>()?
    };

    Ok(Html(AdminUsersTemplate {
        user: Some(admin),
        flash,
        users,
    })
    .into_response())
}

/// POST /admin/users/{id}/delete — remove a user and, via cascades, all
/// of their content
async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    SessionToken(token): SessionToken,
    Path(id): Path<String>,
) -> AppResult<Response> {
    if id == admin.id {
        return flash::redirect_with(
            &state,
            token.as_deref(),
            Flash::error("You cannot delete your own account"),
            "/admin/users",
        );
    }

    let deleted = {
        let conn = state.conn()?;
        conn.execute("DELETE FROM users WHERE id = ?1", params![id])?
    };
    if deleted == 0 {
        return flash::redirect_with(
            &state,
            token.as_deref(),
            Flash::error("That user no longer exists"),
            "/admin/users",
        );
    }

    flash::redirect_with(
        &state,
        token.as_deref(),
        Flash::success("User deleted"),
        "/admin/users",
    )
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(users_page))
        .route("/admin/users/{id}/delete", post(delete_user))
}
