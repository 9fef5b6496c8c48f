pub mod admin;
pub mod assets;
pub mod auth;
pub mod comments;
pub mod events;
pub mod home;
pub mod posts;
pub mod reactions;
pub mod views;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// The full application router. Factored out of main so integration
/// tests can drive it directly.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(home::index))
        .merge(assets::router())
        .merge(auth::router())
        .merge(posts::router())
        .merge(comments::router())
        .merge(events::router())
        .merge(reactions::router())
        .merge(views::router())
        .merge(admin::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
