pub mod handlers;

use axum::{extract::FromRef, routing::post, Router};
use handlers::{create_contact, delete_contact, update_contact};

use crate::html_state::HtmlState;

/// Contact routes, nested under `/contact`.
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    HtmlState: FromRef<S>,
{
    Router::new()
        .route("/create", post(create_contact))
        .route("/update", post(update_contact))
        .route("/delete", post(delete_contact))
}
