use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
    Extension,
};
use axum_htmx::{HxRequest, HX_REDIRECT, HX_TRIGGER};
use common::{
    error::AppError,
    utils::template_engine::{ProvidesTemplateEngine, Value},
};
use minijinja::context;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use crate::html_state::HtmlState;

pub trait ProvidesHtmlState {
    fn html_state(&self) -> &HtmlState;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

impl NoticeLevel {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// A one-shot message shown at the top of the next page. Browsers carry it
/// in the redirect's query string, HTMX requests get it as a `notice` event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    /// `path` with `notice` and `level` appended as query parameters.
    fn attach_to(&self, path: &str) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("notice", &self.message)
            .append_pair("level", self.level.as_str())
            .finish();
        let separator = if path.contains('?') { '&' } else { '?' };
        format!("{path}{separator}{query}")
    }
}

/// Query parameters a page reads its notice back from.
#[derive(Debug, Default, Deserialize)]
pub struct NoticeQuery {
    notice: Option<String>,
    level: Option<NoticeLevel>,
}

impl NoticeQuery {
    pub fn into_notice(self) -> Option<Notice> {
        let message = self.notice.filter(|message| !message.trim().is_empty())?;
        Some(Notice {
            level: self.level.unwrap_or(NoticeLevel::Success),
            message,
        })
    }
}

#[derive(Clone, Debug)]
enum Reply {
    /// A whole template, or one block of it.
    Page {
        template: String,
        block: Option<String>,
    },
    Error(StatusCode),
    Redirect(String),
}

/// What a handler wants rendered. Handlers return it as a response
/// extension and [`with_template_response`] turns it into HTML, a redirect
/// or an HTMX event.
#[derive(Clone)]
pub struct TemplateResponse {
    reply: Reply,
    context: Value,
}

impl TemplateResponse {
    pub fn new_template<T: Serialize>(name: impl Into<String>, context: T) -> Self {
        Self {
            reply: Reply::Page {
                template: name.into(),
                block: None,
            },
            context: Value::from_serialize(&context),
        }
    }

    /// Renders one block of a template, for HTMX swaps.
    pub fn new_partial<T: Serialize>(
        template: impl Into<String>,
        block: impl Into<String>,
        context: T,
    ) -> Self {
        Self {
            reply: Reply::Page {
                template: template.into(),
                block: Some(block.into()),
            },
            context: Value::from_serialize(&context),
        }
    }

    pub fn error(status: StatusCode, title: &str, description: &str) -> Self {
        Self {
            reply: Reply::Error(status),
            context: context! {
                status_code => status.as_u16(),
                title => title,
                description => description,
            },
        }
    }

    pub fn not_found(description: &str) -> Self {
        Self::error(StatusCode::NOT_FOUND, "Not Found", description)
    }

    pub fn bad_request(description: &str) -> Self {
        Self::error(StatusCode::BAD_REQUEST, "Bad Request", description)
    }

    pub fn server_error() -> Self {
        Self::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error",
            "The inventory could not be updated. Details are in the server log.",
        )
    }

    pub fn redirect(path: impl Into<String>) -> Self {
        Self {
            reply: Reply::Redirect(path.into()),
            context: Value::from(()),
        }
    }

    pub fn redirect_with_notice(path: &str, notice: &Notice) -> Self {
        Self::redirect(notice.attach_to(path))
    }
}

impl IntoResponse for TemplateResponse {
    fn into_response(self) -> Response {
        Extension(self).into_response()
    }
}

const FALLBACK_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
  <body>
    <main>
      <h1>Error</h1>
      <p>This page could not be displayed.</p>
      <p><a href="/">Back to the inventory</a></p>
    </main>
  </body>
</html>"#;

fn redirect(path: &str, is_htmx: bool) -> Response {
    if is_htmx {
        (StatusCode::OK, [(HX_REDIRECT, path.to_string())], "").into_response()
    } else {
        Redirect::to(path).into_response()
    }
}

/// Builds the `HX-Trigger` value raising a `notice` event on the page.
pub fn notice_trigger(notice: &Notice) -> String {
    serde_json::to_string(&json!({ "notice": notice })).unwrap_or_else(|e| {
        error!(error = %e, "Failed to serialize notice");
        r#"{"notice":{"level":"error","message":"Something went wrong."}}"#.to_string()
    })
}

/// An HTMX request keeps its page, the error shows up as a notice.
fn error_notice(context: &Value) -> Response {
    let description = context
        .get_attr("description")
        .ok()
        .and_then(|value| value.as_str().map(ToString::to_string))
        .unwrap_or_else(|| "Something went wrong.".to_string());

    (
        StatusCode::NO_CONTENT,
        [(HX_TRIGGER, notice_trigger(&Notice::error(description)))],
        "",
    )
        .into_response()
}

pub async fn with_template_response<S>(
    State(state): State<S>,
    HxRequest(is_htmx): HxRequest,
    req: Request,
    next: Next,
) -> Response
where
    S: ProvidesTemplateEngine + ProvidesHtmlState + Clone + Send + Sync + 'static,
{
    let response = next.run(req).await;
    let Some(pending) = response.extensions().get::<TemplateResponse>().cloned() else {
        return response;
    };

    let (status, name, block) = match &pending.reply {
        Reply::Redirect(path) => return redirect(path, is_htmx),
        Reply::Error(_) if is_htmx => return error_notice(&pending.context),
        Reply::Error(status) => (*status, "errors/error.html", None),
        Reply::Page { template, block } => (StatusCode::OK, template.as_str(), block.as_deref()),
    };

    // Every page carries the department navigation
    let directory = state.html_state().directory().await;
    let ctx = context! {
        departments => &directory.departments,
        ..pending.context.clone()
    };
    let engine = state.template_engine();
    let rendered = match block {
        Some(block) => engine.render_block(name, block, &ctx),
        None => engine.render(name, &ctx),
    };

    match rendered {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            error!(template = name, block = ?block, error = ?e, "Failed to render template");
            (StatusCode::INTERNAL_SERVER_ERROR, Html(FALLBACK_PAGE)).into_response()
        }
    }
}

/// Handler error. Missing records and rejected input get their own pages,
/// anything else is logged and shown as a 500.
#[derive(Debug)]
pub struct HtmlError(AppError);

impl From<AppError> for HtmlError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for HtmlError {
    fn into_response(self) -> Response {
        match self.0 {
            AppError::NotFound(msg) => TemplateResponse::not_found(&msg).into_response(),
            AppError::Validation(msg) => TemplateResponse::bad_request(&msg).into_response(),
            err => {
                error!(error = %err, "Request failed");
                TemplateResponse::server_error().into_response()
            }
        }
    }
}
