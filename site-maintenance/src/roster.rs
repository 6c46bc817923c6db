use std::path::Path;

use common::{
    error::AppError,
    storage::{db::SurrealDbClient, types::site::Site},
};
use tracing::info;

/// Column of the Pope Tech export holding each site's primary URL.
pub const ROSTER_URL_COLUMN: &str = "Primary URL (Site folder name)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterImport {
    /// URLs listed in the roster file.
    pub urls: usize,
    /// Inventory sites flagged as present in the roster.
    pub matched: usize,
}

/// Reads the URL column of a roster export. Blank cells are skipped.
pub fn read_roster_urls(path: &Path) -> Result<Vec<String>, AppError> {
    let mut reader = csv::Reader::from_path(path)?;
    let column = reader
        .headers()?
        .iter()
        .position(|header| header.trim() == ROSTER_URL_COLUMN)
        .ok_or_else(|| {
            AppError::Validation(format!(
                "{} has no `{ROSTER_URL_COLUMN}` column",
                path.display()
            ))
        })?;

    let mut urls = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(url) = record.get(column).map(str::trim).filter(|u| !u.is_empty()) {
            urls.push(url.to_string());
        }
    }
    Ok(urls)
}

/// Flags every inventory site listed in the roster at `path` as scanned.
/// The file is read completely before anything is written.
pub async fn import_roster(db: &SurrealDbClient, path: &Path) -> Result<RosterImport, AppError> {
    let urls = read_roster_urls(path)?;
    let matched = Site::mark_in_roster(&urls, db).await?;

    info!(
        path = %path.display(),
        urls = urls.len(),
        matched,
        "Imported Pope Tech roster"
    );
    Ok(RosterImport {
        urls: urls.len(),
        matched,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::storage::types::site::NewSite;
    use std::io::Write;
    use uuid::Uuid;

    fn roster_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write roster");
        file
    }

    async fn memory_db() -> SurrealDbClient {
        let db = SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("Failed to start in-memory surrealdb");
        db.ensure_initialized().await.expect("init");
        db
    }

    #[test]
    fn test_reads_url_column_and_skips_blanks() {
        let file = roster_file(
            "Name,Primary URL (Site folder name),Owner\n\
             Lab,lab.umn.edu,Ana\n\
             Empty,,Bo\n\
             Farm, farm.umn.edu ,Cy\n",
        );

        let urls = read_roster_urls(file.path()).expect("read");
        assert_eq!(urls, vec!["lab.umn.edu".to_string(), "farm.umn.edu".to_string()]);
    }

    #[test]
    fn test_missing_column_is_rejected() {
        let file = roster_file("Name,URL\nLab,lab.umn.edu\n");
        assert!(matches!(
            read_roster_urls(file.path()),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(read_roster_urls(&dir.path().join("missing.csv")).is_err());
    }

    #[tokio::test]
    async fn test_import_flags_matching_sites() {
        let db = memory_db().await;
        Site::create(&db, NewSite::new("Lab", "CLA").with_primary_url("lab.umn.edu"))
            .await
            .expect("create");
        Site::create(&db, NewSite::new("Other", "CLA").with_primary_url("other.umn.edu"))
            .await
            .expect("create");

        let file = roster_file(
            "Primary URL (Site folder name)\nlab.umn.edu\nunknown.umn.edu\n\n",
        );
        let import = import_roster(&db, file.path()).await.expect("import");

        assert_eq!(import, RosterImport { urls: 2, matched: 1 });
        assert!(Site::get_by_id(1, &db).await.expect("get").pope_tech);
        assert!(!Site::get_by_id(2, &db).await.expect("get").pope_tech);
    }

    #[tokio::test]
    async fn test_malformed_roster_leaves_store_untouched() {
        let db = memory_db().await;
        Site::create(&db, NewSite::new("Lab", "CLA").with_primary_url("lab.umn.edu"))
            .await
            .expect("create");

        // Second row has an extra field
        let file = roster_file("Primary URL (Site folder name),Name\nlab.umn.edu,Lab\nx,y,z\n");
        assert!(import_roster(&db, file.path()).await.is_err());
        assert!(!Site::get_by_id(1, &db).await.expect("get").pope_tech);
    }
}
