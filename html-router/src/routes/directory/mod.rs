pub mod handlers;

use axum::{extract::FromRef, routing::post, Router};
use handlers::reload_directory;

use crate::html_state::HtmlState;

pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    HtmlState: FromRef<S>,
{
    Router::new().route("/directory/reload", post(reload_directory))
}
