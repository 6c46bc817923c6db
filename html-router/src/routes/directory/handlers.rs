use axum::{extract::State, response::IntoResponse};
use tracing::info;

use crate::{
    html_state::HtmlState,
    middlewares::response_middleware::{HtmlError, Notice, TemplateResponse},
};

pub async fn reload_directory(
    State(state): State<HtmlState>,
) -> Result<impl IntoResponse, HtmlError> {
    let directory = state.reload_directory().await?;
    info!(
        departments = directory.departments.len(),
        contacts = directory.contacts.len(),
        "Directory reload requested"
    );

    Ok(TemplateResponse::redirect_with_notice(
        "/",
        &Notice::success(format!(
            "Reloaded {} departments and {} contacts",
            directory.departments.len(),
            directory.contacts.len()
        )),
    ))
}
