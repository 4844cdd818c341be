pub mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;

use axum::{middleware, Router};

use crate::{admission, state::AppState};

/// Cover-letter routes behind the admission layer. `route_layer` runs the
/// limiter only for matched routes, where the route template is known.
pub fn router(state: AppState) -> Router<AppState> {
    handlers::coverletter_routes()
        .route_layer(middleware::from_fn_with_state(state, admission::admit))
}
