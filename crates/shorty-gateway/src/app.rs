use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::handlers::{
    create_url_handler, delete_url_handler, health_handler, list_urls_handler,
    resolve_url_handler, update_url_handler,
};
use crate::state::AppState;

pub struct App {}

impl App {
    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/api/health", get(health_handler))
            .nest(
                "/api/url",
                Router::new()
                    .route("/create", post(create_url_handler))
                    .route("/update", put(update_url_handler))
                    .route("/delete/{short_code}", delete(delete_url_handler))
                    .route("/all", get(list_urls_handler)),
            )
            .route("/{short_code}", get(resolve_url_handler))
            .with_state(state)
    }
}
