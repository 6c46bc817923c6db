pub mod handlers;

use axum::{extract::FromRef, routing::post, Router};
use handlers::{create_site, delete_site, move_all_sites, move_site, update_site};

use crate::html_state::HtmlState;

pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    HtmlState: FromRef<S>,
{
    Router::new()
        .route("/create", post(create_site))
        .route("/update", post(update_site))
        .route("/delete", post(delete_site))
        .route("/move", post(move_site))
        .route("/move-all", post(move_all_sites))
}
