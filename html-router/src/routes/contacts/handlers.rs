use axum::{extract::State, response::IntoResponse, Form};
use serde::Deserialize;
use tracing::info;

use common::{
    error::AppError,
    storage::types::contact::{Contact, NewContact},
};

use crate::{
    html_state::HtmlState,
    middlewares::response_middleware::{HtmlError, Notice, TemplateResponse},
};

fn new_contact(
    department: &str,
    name: &str,
    email: &str,
    site: Option<&str>,
) -> Result<NewContact, AppError> {
    let department = department.trim();
    let name = name.trim();
    if department.is_empty() || name.is_empty() {
        return Err(AppError::Validation(
            "A contact needs a department and a name".to_string(),
        ));
    }
    Ok(NewContact::new(department, name, email.trim(), site))
}

#[derive(Deserialize)]
pub struct CreateContactForm {
    department: String,
    name: String,
    #[serde(default)]
    email: String,
    site: Option<String>,
}

pub async fn create_contact(
    State(state): State<HtmlState>,
    Form(form): Form<CreateContactForm>,
) -> Result<impl IntoResponse, HtmlError> {
    let contact = new_contact(
        &form.department,
        &form.name,
        &form.email,
        form.site.as_deref(),
    )?;
    let created = Contact::create(&state.db, contact).await?;
    let department = created.department.as_deref().unwrap_or_default();
    info!(id = created.id, "Contact {} added to {department}", created.name);

    state.reload_directory().await?;

    Ok(TemplateResponse::redirect_with_notice(
        "/",
        &Notice::success(format!(
            "Contact {} added successfully to {department}",
            created.name
        )),
    ))
}

#[derive(Deserialize)]
pub struct UpdateContactForm {
    contact_id: i64,
    department: String,
    name: String,
    #[serde(default)]
    email: String,
    site: Option<String>,
}

pub async fn update_contact(
    State(state): State<HtmlState>,
    Form(form): Form<UpdateContactForm>,
) -> Result<impl IntoResponse, HtmlError> {
    let contact = new_contact(
        &form.department,
        &form.name,
        &form.email,
        form.site.as_deref(),
    )?;
    let updated = Contact::update(form.contact_id, contact, &state.db).await?;
    info!(id = updated.id, "Contact {} updated", updated.name);

    state.reload_directory().await?;

    Ok(TemplateResponse::redirect_with_notice(
        "/",
        &Notice::success(format!("Contact {} updated successfully", updated.name)),
    ))
}

#[derive(Deserialize)]
pub struct DeleteContactForm {
    contact_id: i64,
}

pub async fn delete_contact(
    State(state): State<HtmlState>,
    Form(form): Form<DeleteContactForm>,
) -> Result<impl IntoResponse, HtmlError> {
    let deleted = Contact::delete(form.contact_id, &state.db).await?;
    info!(id = deleted.id, "Contact deleted");

    state.reload_directory().await?;

    Ok(TemplateResponse::redirect_with_notice(
        "/",
        &Notice::success(format!("Contact {} deleted successfully", deleted.name)),
    ))
}
