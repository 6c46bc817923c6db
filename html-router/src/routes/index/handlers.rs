use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use axum_htmx::HxRequest;
use futures::future::try_join_all;
use serde::Serialize;

use common::storage::types::{contact::Contact, department::Department, site::Site};

use crate::{
    html_state::HtmlState,
    middlewares::response_middleware::{HtmlError, Notice, NoticeQuery, TemplateResponse},
};

#[derive(Serialize)]
pub struct DepartmentTable {
    department: Department,
    sites: Vec<Site>,
}

#[derive(Serialize)]
pub struct IndexPageData {
    tables: Vec<DepartmentTable>,
    contacts: Vec<Contact>,
    notice: Option<Notice>,
}

/// Every department's sites on one page, for client side search. HTMX
/// requests only get the tables back.
pub async fn index_handler(
    State(state): State<HtmlState>,
    HxRequest(is_htmx): HxRequest,
    Query(query): Query<NoticeQuery>,
) -> Result<impl IntoResponse, HtmlError> {
    let directory = state.directory().await;

    let sites = try_join_all(
        directory
            .departments
            .iter()
            .map(|department| Site::list_by_department(&department.name, &state.db)),
    )
    .await?;

    let tables = directory
        .departments
        .iter()
        .cloned()
        .zip(sites)
        .map(|(department, sites)| DepartmentTable { department, sites })
        .collect();

    let data = IndexPageData {
        tables,
        contacts: directory.contacts.clone(),
        notice: query.into_notice(),
    };

    if is_htmx {
        Ok(TemplateResponse::new_partial("index.html", "inventory", data))
    } else {
        Ok(TemplateResponse::new_template("index.html", data))
    }
}
