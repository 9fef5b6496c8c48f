use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::post;
use axum::{Form, Router};
use chrono::NaiveDateTime;
use rusqlite::{params, OptionalExtension};
use serde::Deserialize;

use crate::auth::{flash, Flash};
use crate::error::AppResult;
use crate::extractors::{CurrentUser, SessionToken};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct EventForm {
    pub title: String,
    pub body: String,
    pub scheduled_at: String,
}

/// Parse the form's scheduled time into the canonical stored form,
/// comparable with SQLite's datetime('now'). Browsers submit
/// datetime-local values with or without seconds.
fn parse_schedule(raw: &str) -> Option<String> {
    const FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%d %H:%M:%S",
    ];
    FORMATS.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(raw.trim(), format)
            .ok()
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
    })
}

/// POST /event — create an event
async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    SessionToken(token): SessionToken,
    Form(form): Form<EventForm>,
) -> AppResult<Response> {
    let title = form.title.trim();
    if title.is_empty() {
        return flash::redirect_with(
            &state,
            token.as_deref(),
            Flash::error("An event needs a title"),
            "/",
        );
    }
    let Some(scheduled_at) = parse_schedule(&form.scheduled_at) else {
        return flash::redirect_with(
            &state,
            token.as_deref(),
            Flash::error("Enter a valid date and time"),
            "/",
        );
    };

    let id = uuid::Uuid::now_v7().to_string();
    {
        let conn = state.conn()?;
        conn.execute(
            "INSERT INTO events (id, user_id, title, body, scheduled_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, user.id, title, form.body.trim(), scheduled_at],
        )?;
    }

    flash::redirect_with(
        &state,
        token.as_deref(),
        Flash::success("Event created"),
        "/",
    )
}

/// POST /event/{id}/delete — creator or admin only
async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    SessionToken(token): SessionToken,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let owner_id: Option<String> = {
        let conn = state.conn()?;
        conn.query_row(
            "SELECT user_id FROM events WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?
    };
    let Some(owner_id) = owner_id else {
        return flash::redirect_with(
            &state,
            token.as_deref(),
            Flash::error("That event no longer exists"),
            "/",
        );
    };
    if !user.can_modify(&owner_id) {
        return flash::redirect_with(
            &state,
            token.as_deref(),
            Flash::error("You can only delete your own events"),
            "/",
        );
    }

    {
        let conn = state.conn()?;
        conn.execute("DELETE FROM events WHERE id = ?1", params![id])?;
    }

    flash::redirect_with(
        &state,
        token.as_deref(),
        Flash::success("Event deleted"),
        "/",
    )
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/event", post(create))
        .route("/event/{id}/delete", post(delete))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_datetime_local_without_seconds() {
        assert_eq!(
            parse_schedule("2030-06-15T18:30").as_deref(),
            Some("2030-06-15 18:30:00")
        );
    }

    #[test]
    fn parses_datetime_local_with_seconds() {
        assert_eq!(
            parse_schedule("2030-06-15T18:30:45").as_deref(),
            Some("2030-06-15 18:30:45")
        );
    }

    #[test]
    fn parses_space_separated_form() {
        assert_eq!(
            parse_schedule(" 2030-06-15 18:30 ").as_deref(),
            Some("2030-06-15 18:30:00")
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_schedule("next tuesday"), None);
        assert_eq!(parse_schedule(""), None);
        assert_eq!(parse_schedule("2030-13-40T99:99"), None);
    }
}
