use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    pub surrealdb_address: String,
    pub surrealdb_username: String,
    pub surrealdb_password: String,
    pub surrealdb_namespace: String,
    pub surrealdb_database: String,
    pub http_port: u16,
    /// Directory receiving `inactive_sites.csv` and `active_sites.csv`.
    #[serde(default = "default_export_dir")]
    pub export_dir: String,
    /// Root folder of the per-department report bundles.
    #[serde(default = "default_report_dir")]
    pub report_dir: String,
    #[serde(default = "default_probe_concurrency")]
    pub probe_concurrency: usize,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_db_connect_attempts")]
    pub db_connect_attempts: usize,
}

fn default_export_dir() -> String {
    ".".to_string()
}

fn default_report_dir() -> String {
    "WEDACS".to_string()
}

const fn default_probe_concurrency() -> usize {
    20
}

const fn default_probe_timeout_secs() -> u64 {
    10
}

const fn default_db_connect_attempts() -> usize {
    3
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            surrealdb_address: "mem://".to_string(),
            surrealdb_username: "root".to_string(),
            surrealdb_password: "root".to_string(),
            surrealdb_namespace: "inventory".to_string(),
            surrealdb_database: "inventory".to_string(),
            http_port: 3000,
            export_dir: default_export_dir(),
            report_dir: default_report_dir(),
            probe_concurrency: default_probe_concurrency(),
            probe_timeout_secs: default_probe_timeout_secs(),
            db_connect_attempts: default_db_connect_attempts(),
        }
    }
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}
