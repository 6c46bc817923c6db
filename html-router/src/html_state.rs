use common::error::AppError;
use common::storage::db::SurrealDbClient;
use common::storage::types::department::DirectorySnapshot;
use common::utils::template_engine::{ProvidesTemplateEngine, TemplateEngine};
use common::{create_template_engine, storage::db::ProvidesDb, utils::config::AppConfig};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::middlewares::response_middleware::ProvidesHtmlState;

#[derive(Clone)]
pub struct HtmlState {
    pub db: Arc<SurrealDbClient>,
    pub templates: Arc<TemplateEngine>,
    pub config: AppConfig,
    directory: Arc<RwLock<Arc<DirectorySnapshot>>>,
}

impl HtmlState {
    pub async fn new_with_resources(
        db: Arc<SurrealDbClient>,
        config: AppConfig,
        template_engine: Option<Arc<TemplateEngine>>,
    ) -> Result<Self, AppError> {
        let templates =
            template_engine.unwrap_or_else(|| Arc::new(create_template_engine!("templates")));
        debug!("Template engine configured for html_router.");

        let directory = DirectorySnapshot::load(&db).await?;
        info!(
            departments = directory.departments.len(),
            contacts = directory.contacts.len(),
            "Directory loaded"
        );

        Ok(Self {
            db,
            templates,
            config,
            directory: Arc::new(RwLock::new(Arc::new(directory))),
        })
    }

    /// The directory as of the last load. Cheap to call; the snapshot is
    /// shared, not copied.
    pub async fn directory(&self) -> Arc<DirectorySnapshot> {
        Arc::clone(&*self.directory.read().await)
    }

    /// Reads departments and contacts from the store again and swaps the
    /// shared snapshot for the new one.
    pub async fn reload_directory(&self) -> Result<Arc<DirectorySnapshot>, AppError> {
        let fresh = Arc::new(DirectorySnapshot::load(&self.db).await?);
        *self.directory.write().await = Arc::clone(&fresh);
        debug!(
            departments = fresh.departments.len(),
            contacts = fresh.contacts.len(),
            "Directory reloaded"
        );
        Ok(fresh)
    }
}

impl ProvidesDb for HtmlState {
    fn db(&self) -> &Arc<SurrealDbClient> {
        &self.db
    }
}

impl ProvidesTemplateEngine for HtmlState {
    fn template_engine(&self) -> &Arc<TemplateEngine> {
        &self.templates
    }
}

impl ProvidesHtmlState for HtmlState {
    fn html_state(&self) -> &HtmlState {
        self
    }
}
