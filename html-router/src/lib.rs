pub mod html_state;
pub mod middlewares;
pub mod router_factory;
pub mod routes;

use axum::{extract::FromRef, Router};
use html_state::HtmlState;
use router_factory::RouterFactory;

/// Html routes
pub fn html_routes<S>(app_state: &HtmlState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    HtmlState: FromRef<S>,
{
    RouterFactory::new(app_state)
        .add_routes(routes::index::router())
        .add_routes(routes::sites::router())
        .add_routes(routes::directory::router())
        .nest_routes("/contact", routes::contacts::router())
        .with_compression()
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use common::{
        storage::{
            db::SurrealDbClient,
            types::{
                contact::{Contact, NewContact},
                site::{NewSite, Site},
            },
        },
        utils::config::AppConfig,
    };
    use std::sync::Arc;
    use tower::ServiceExt;
    use uuid::Uuid;

    async fn test_state() -> HtmlState {
        let db = SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("Failed to start in-memory surrealdb");
        db.ensure_initialized().await.expect("init");

        Site::create(&db, NewSite::new("Liberal Arts Home", "CLA").with_primary_url("cla.umn.edu"))
            .await
            .expect("create");
        Site::create(&db, NewSite::new("Engineering Home", "CSE"))
            .await
            .expect("create");
        Contact::create(&db, NewContact::new("CLA", "Ana", "ana@umn.edu", None))
            .await
            .expect("create");

        HtmlState::new_with_resources(Arc::new(db), AppConfig::default(), None)
            .await
            .expect("html state")
    }

    fn app(state: &HtmlState) -> Router {
        html_routes(state).with_state(state.clone())
    }

    fn form(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn location(response: &Response) -> Option<&str> {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }

    #[tokio::test]
    async fn test_index_lists_departments_sites_and_contacts() {
        let state = test_state().await;

        let response = app(&state)
            .oneshot(Request::builder().uri("/").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_text(response).await;
        assert!(body.contains("<html"));
        assert!(body.contains("Liberal Arts Home"));
        assert!(body.contains("Engineering Home"));
        assert!(body.contains("CLAView"));
        assert!(body.contains("ana@umn.edu"));
    }

    #[tokio::test]
    async fn test_htmx_index_returns_inventory_block_only() {
        let state = test_state().await;

        let response = app(&state)
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("HX-Request", "true")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_text(response).await;
        assert!(body.contains("Liberal Arts Home"));
        assert!(!body.contains("<html"));
    }

    #[tokio::test]
    async fn test_create_site_redirects_and_stores() {
        let state = test_state().await;

        let response = app(&state)
            .oneshot(form(
                "/create",
                "table_name=CLAView&department=CLA&title=Humanities&primary_url=hum.umn.edu&errors=&pope_tech=false&active=true",
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            location(&response),
            Some("/?notice=Added+Humanities+with+ID+3&level=success")
        );

        let site = Site::get_by_id(3, &state.db).await.expect("created site");
        assert_eq!(site.title, "Humanities");
        assert_eq!(site.department.as_deref(), Some("CLA"));
        assert_eq!(site.errors, None);
        assert!(site.active);
    }

    #[tokio::test]
    async fn test_create_site_requires_known_department() {
        let state = test_state().await;

        let response = app(&state)
            .oneshot(form("/create", "table_name=NopeView&title=Lost"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(Site::get_by_id(3, &state.db).await.is_err());
    }

    #[tokio::test]
    async fn test_update_site() {
        let state = test_state().await;

        let response = app(&state)
            .oneshot(form(
                "/update",
                "table_name=CLAView&id=1&title=CLA+Main&notes=None&active=off",
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let site = Site::get_by_id(1, &state.db).await.expect("site");
        assert_eq!(site.title, "CLA Main");
        assert_eq!(site.notes, None);
        assert!(!site.active);

        let response = app(&state)
            .oneshot(form("/update", "table_name=CLAView&id=1&drop_table=x"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app(&state)
            .oneshot(form("/update", "table_name=CLAView&id=1"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app(&state)
            .oneshot(form("/update", "table_name=CLAView&id=1&pope_tech=None"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!Site::get_by_id(1, &state.db).await.expect("site").pope_tech);

        let response = app(&state)
            .oneshot(form("/update", "table_name=NopeView&id=1&title=x"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_and_move_site() {
        let state = test_state().await;

        let response = app(&state)
            .oneshot(form("/move", "id_value=2&target_department=CLA"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let moved = Site::get_by_id(2, &state.db).await.expect("site");
        assert_eq!(moved.department.as_deref(), Some("CLA"));
        assert!(moved
            .notes
            .as_deref()
            .is_some_and(|n| n.starts_with("Moved from CSE on ")));

        // CSE has no sites left, so the reloaded directory drops it
        assert!(state.directory().await.find_department("CSEView").is_none());

        let response = app(&state)
            .oneshot(form("/delete", "id_value=2"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let response = app(&state)
            .oneshot(form("/delete", "id_value=2"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_move_all_replies_with_json_to_scripts() {
        let state = test_state().await;

        let mut request = form("/move-all", "source_department=CSE&target_department=CFANS");
        request
            .headers_mut()
            .insert("X-Requested-With", header::HeaderValue::from_static("XMLHttpRequest"));
        let response = app(&state).oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let reply: serde_json::Value =
            serde_json::from_str(&body_text(response).await).expect("json reply");
        assert_eq!(reply["success"], serde_json::Value::Bool(true));
        assert_eq!(
            reply["message"],
            serde_json::Value::from("Successfully moved 1 entries from CSE to CFANS")
        );
        assert!(state.directory().await.find_department("CFANSView").is_some());

        let mut request = form("/move-all", "source_department=&target_department=CFANS");
        request
            .headers_mut()
            .insert("X-Requested-With", header::HeaderValue::from_static("XMLHttpRequest"));
        let response = app(&state).oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let reply: serde_json::Value =
            serde_json::from_str(&body_text(response).await).expect("json reply");
        assert_eq!(reply["success"], serde_json::Value::Bool(false));
    }

    #[tokio::test]
    async fn test_move_all_redirects_browsers() {
        let state = test_state().await;

        let response = app(&state)
            .oneshot(form("/move-all", "source_department=CLA&target_department=CSE"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            Site::list_by_department("CSE", &state.db)
                .await
                .expect("list")
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn test_contact_routes_refresh_directory() {
        let state = test_state().await;
        assert_eq!(state.directory().await.contacts.len(), 1);

        let response = app(&state)
            .oneshot(form(
                "/contact/create",
                "department=CSE&name=Bo&email=bo%40umn.edu&site=",
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let directory = state.directory().await;
        assert_eq!(directory.contacts.len(), 2);
        assert!(directory.contacts.iter().any(|c| c.site.is_none() && c.name == "Bo"));

        let response = app(&state)
            .oneshot(form(
                "/contact/update",
                "contact_id=1&department=CLA&name=Ana+B&email=ana%40umn.edu&site=lab.umn.edu",
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let updated = Contact::list_by_department("CLA", &state.db)
            .await
            .expect("list");
        assert_eq!(updated.first().map(|c| c.name.as_str()), Some("Ana B"));

        let response = app(&state)
            .oneshot(form("/contact/delete", "contact_id=1"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(state.directory().await.contacts.len(), 1);

        let response = app(&state)
            .oneshot(form("/contact/delete", "contact_id=1"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_directory_reload_picks_up_external_writes() {
        let state = test_state().await;

        Site::create(&state.db, NewSite::new("Farm", "CFANS"))
            .await
            .expect("create");
        assert!(state.directory().await.find_department("CFANSView").is_none());

        let response = app(&state)
            .oneshot(form("/directory/reload", ""))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(state.directory().await.find_department("CFANSView").is_some());
    }

    #[tokio::test]
    async fn test_htmx_errors_raise_notice_event() {
        let state = test_state().await;

        let mut request = form("/delete", "id_value=99");
        request
            .headers_mut()
            .insert("HX-Request", header::HeaderValue::from_static("true"));
        let response = app(&state).oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let trigger: serde_json::Value = serde_json::from_str(
            response
                .headers()
                .get("HX-Trigger")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default(),
        )
        .expect("trigger json");
        assert_eq!(trigger["notice"]["level"], "error");
        assert_eq!(trigger["notice"]["message"], "Entry with ID 99 not found");
    }

    #[tokio::test]
    async fn test_pages_listen_for_notice_events() {
        let state = test_state().await;

        let response = app(&state)
            .oneshot(Request::builder().uri("/").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let body = body_text(response).await;

        assert!(body.contains(r#"addEventListener("notice""#));
        assert!(!body.contains("class=\"notice notice-"));
    }

    #[tokio::test]
    async fn test_redirect_notice_is_shown_once_loaded() {
        let state = test_state().await;

        let response = app(&state)
            .oneshot(form("/contact/create", "department=CSE&name=Bo&email=&site="))
            .await
            .expect("response");
        let target = location(&response).expect("location").to_string();
        assert_eq!(
            target,
            "/?notice=Contact+Bo+added+successfully+to+CSE&level=success"
        );

        let response = app(&state)
            .oneshot(Request::builder().uri(&target).body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains(
            r#"<p class="notice notice-success">Contact Bo added successfully to CSE</p>"#
        ));
    }

    #[tokio::test]
    async fn test_boosted_success_redirects_with_notice() {
        let state = test_state().await;

        let mut request = form("/move-all", "source_department=Nowhere&target_department=CLA");
        request
            .headers_mut()
            .insert("HX-Request", header::HeaderValue::from_static("true"));
        let response = app(&state).oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get("HX-Redirect")
                .and_then(|v| v.to_str().ok()),
            Some("/?notice=No+entries+found+in+Nowhere&level=warning")
        );
    }
}
