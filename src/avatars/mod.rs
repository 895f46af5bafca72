use axum::{extract::DefaultBodyLimit, routing::patch, Router};

use crate::state::AppState;

pub mod handlers;
pub mod pipeline;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/avatars", patch(handlers::update_avatar))
        // the authoritative 1 MiB cap is enforced on the file field itself;
        // the body limit just bounds the whole multipart request
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024))
}
