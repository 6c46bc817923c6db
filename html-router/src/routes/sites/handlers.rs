use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use common::{
    error::AppError,
    storage::types::{
        department::Department,
        site::{form_text, parse_form_bool, parse_form_errors, NewSite, Site, SiteChanges},
    },
};

use crate::{
    html_state::HtmlState,
    middlewares::response_middleware::{HtmlError, Notice, TemplateResponse},
};

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn form_flag(raw: Option<&str>, column: &str, default: bool) -> Result<bool, AppError> {
    match form_text(raw) {
        None => Ok(default),
        Some(value) => parse_form_bool(&value).ok_or_else(|| {
            AppError::Validation(format!("`{value}` is not a valid value for {column}"))
        }),
    }
}

#[derive(Deserialize)]
pub struct CreateSiteForm {
    table_name: String,
    department: Option<String>,
    #[serde(default)]
    title: String,
    environments: Option<String>,
    aliases: Option<String>,
    owners: Option<String>,
    primary_url: Option<String>,
    notes: Option<String>,
    pope_tech: Option<String>,
    errors: Option<String>,
    active: Option<String>,
    cms: Option<String>,
}

impl CreateSiteForm {
    fn into_new_site(self, department: &Department) -> Result<NewSite, AppError> {
        Ok(NewSite {
            title: self.title.trim().to_string(),
            environments: form_text(self.environments.as_deref()),
            aliases: form_text(self.aliases.as_deref()),
            owners: form_text(self.owners.as_deref()),
            primary_url: form_text(self.primary_url.as_deref()),
            department: form_text(self.department.as_deref())
                .or_else(|| Some(department.name.clone())),
            notes: form_text(self.notes.as_deref()),
            pope_tech: form_flag(self.pope_tech.as_deref(), "pope_tech", false)?,
            errors: parse_form_errors(self.errors.as_deref()),
            active: form_flag(self.active.as_deref(), "active", true)?,
            cms: form_text(self.cms.as_deref()),
        })
    }
}

pub async fn create_site(
    State(state): State<HtmlState>,
    Form(form): Form<CreateSiteForm>,
) -> Result<impl IntoResponse, HtmlError> {
    let directory = state.directory().await;
    let department = directory
        .find_department(&form.table_name)
        .ok_or_else(|| AppError::Validation(format!("{} not found", form.table_name)))?;

    let site = Site::create(&state.db, form.into_new_site(department)?).await?;
    info!(id = site.id, title = %site.title, "Created site");

    // A site may name a department that did not exist yet
    state.reload_directory().await?;

    Ok(TemplateResponse::redirect_with_notice(
        "/",
        &Notice::success(format!("Added {} with ID {}", site.title, site.id)),
    ))
}

/// Accepts `table_name`, `id` and any number of editable columns.
pub async fn update_site(
    State(state): State<HtmlState>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<impl IntoResponse, HtmlError> {
    let mut table_name = None;
    let mut id = None;
    let mut columns = Vec::new();
    for (key, value) in &fields {
        match key.as_str() {
            "table_name" => table_name = Some(value.as_str()),
            "id" => id = Some(value.as_str()),
            column => columns.push((column, value.as_str())),
        }
    }

    let table_name =
        table_name.ok_or_else(|| AppError::Validation("Missing table_name".to_string()))?;
    if state.directory().await.find_department(table_name).is_none() {
        return Err(AppError::NotFound(format!("{table_name} not found")).into());
    }
    let id: i64 = id
        .and_then(|raw| raw.trim().parse().ok())
        .ok_or_else(|| AppError::Validation("Missing or invalid id".to_string()))?;

    let changes = SiteChanges::from_form(columns)?;
    let changes_department = changes.get("department").is_some();
    Site::update_fields(id, changes, &state.db).await?;
    info!(id, "Updated site");

    if changes_department {
        state.reload_directory().await?;
    }

    Ok(TemplateResponse::redirect_with_notice(
        "/",
        &Notice::success(format!("Entry with ID {id} updated")),
    ))
}

#[derive(Deserialize)]
pub struct DeleteSiteForm {
    id_value: i64,
}

pub async fn delete_site(
    State(state): State<HtmlState>,
    Form(form): Form<DeleteSiteForm>,
) -> Result<impl IntoResponse, HtmlError> {
    let site = Site::delete(form.id_value, &state.db).await?;
    info!(id = site.id, title = %site.title, "Deleted site");

    state.reload_directory().await?;

    Ok(TemplateResponse::redirect_with_notice(
        "/",
        &Notice::success(format!("Deleted {} (ID {})", site.title, site.id)),
    ))
}

#[derive(Deserialize)]
pub struct MoveSiteForm {
    id_value: i64,
    target_department: String,
}

pub async fn move_site(
    State(state): State<HtmlState>,
    Form(form): Form<MoveSiteForm>,
) -> Result<impl IntoResponse, HtmlError> {
    let target = form.target_department.trim();
    if target.is_empty() {
        return Err(AppError::Validation("Missing target department".to_string()).into());
    }

    let site = Site::move_to(form.id_value, target, today(), &state.db).await?;
    info!(id = site.id, target, "Moved site");

    state.reload_directory().await?;

    Ok(TemplateResponse::redirect_with_notice(
        "/",
        &Notice::success(format!("Moved {} to {target}", site.title)),
    ))
}

#[derive(Deserialize)]
pub struct MoveAllForm {
    source_department: String,
    target_department: String,
}

#[derive(Serialize)]
pub struct MoveAllReply {
    success: bool,
    message: String,
}

fn is_ajax(headers: &HeaderMap) -> bool {
    headers
        .get("x-requested-with")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("XMLHttpRequest"))
}

async fn move_all(state: &HtmlState, form: &MoveAllForm) -> Result<Notice, AppError> {
    let source = form.source_department.trim();
    let target = form.target_department.trim();
    if source.is_empty() || target.is_empty() {
        return Err(AppError::Validation(
            "Source and target departments are required".to_string(),
        ));
    }

    let moved = Site::move_all(source, target, today(), &state.db).await?;
    state.reload_directory().await?;

    if moved == 0 {
        Ok(Notice::warning(format!("No entries found in {source}")))
    } else {
        Ok(Notice::success(format!(
            "Successfully moved {moved} entries from {source} to {target}"
        )))
    }
}

/// Answers scripted requests with JSON and browsers with a redirect.
pub async fn move_all_sites(
    State(state): State<HtmlState>,
    headers: HeaderMap,
    Form(form): Form<MoveAllForm>,
) -> Response {
    let ajax = is_ajax(&headers);

    match move_all(&state, &form).await {
        Ok(notice) => {
            info!(
                source = %form.source_department,
                target = %form.target_department,
                "{}",
                notice.message
            );
            if ajax {
                Json(MoveAllReply {
                    success: true,
                    message: notice.message,
                })
                .into_response()
            } else {
                TemplateResponse::redirect_with_notice("/", &notice).into_response()
            }
        }
        Err(err) if ajax => {
            error!(error = %err, "Moving department failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(MoveAllReply {
                    success: false,
                    message: format!("Error moving data: {err}"),
                }),
            )
                .into_response()
        }
        Err(err) => HtmlError::from(err).into_response(),
    }
}
