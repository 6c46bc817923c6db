use std::{
    io::Write,
    path::{Path, PathBuf},
};

use common::{error::AppError, storage::types::StoredObject};
use tempfile::NamedTempFile;
use tracing::debug;

/// Writes `records` as CSV with the record type's column list as header.
/// The header is written even when there are no rows. The file is built
/// next to its destination and renamed into place, so readers only ever
/// see the old or the new content.
pub fn write_csv<T: StoredObject>(path: &Path, records: &[T]) -> Result<(), AppError> {
    let mut file = temp_file_beside(path)?;
    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file.as_file_mut());
        writer.write_record(T::columns())?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
    }
    file.as_file().sync_all()?;
    file.persist(path)?;

    debug!(path = %path.display(), rows = records.len(), "Wrote CSV");
    Ok(())
}

/// Replaces the file at `path` with `contents`, atomically.
pub fn write_text(path: &Path, contents: &str) -> Result<(), AppError> {
    let mut file = temp_file_beside(path)?;
    file.write_all(contents.as_bytes())?;
    file.as_file().sync_all()?;
    file.persist(path)?;
    Ok(())
}

fn temp_file_beside(path: &Path) -> Result<NamedTempFile, AppError> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok(NamedTempFile::new_in(parent)?)
}
