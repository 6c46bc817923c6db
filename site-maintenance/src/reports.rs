use std::path::{Path, PathBuf};

use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{
            contact::Contact,
            site::{ReportFilter, Site},
        },
    },
};
use tracing::info;

use crate::export::{write_csv, write_text};

pub const CONTACTS_FILE: &str = "wedac_contacts.csv";
pub const POPE_TECH_FILE: &str = "pope_tech_true_sites.csv";
pub const ACTIVE_NOT_POPE_TECH_FILE: &str = "active_not_in_pope_tech_sites.csv";
pub const INACTIVE_NOT_POPE_TECH_FILE: &str = "inactive_not_in_pope_tech_sites.csv";
pub const GOOGLE_SITES_FILE: &str = "google_sites.csv";
pub const SITE_COUNTER_FILE: &str = "site_counter.txt";

/// Site counts written to `site_counter.txt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SiteCounts {
    pub in_pope_tech: usize,
    pub active_not_in_pope_tech: usize,
    pub inactive_not_in_pope_tech: usize,
}

impl SiteCounts {
    pub const fn total(&self) -> usize {
        self.in_pope_tech
            .saturating_add(self.active_not_in_pope_tech)
            .saturating_add(self.inactive_not_in_pope_tech)
    }

    pub fn render(&self, department: &str) -> String {
        format!(
            "{department} Sites\n\
             Total sites: {}\n\
             Sites in Pope Tech: {}\n\
             Active sites not in Pope Tech: {}\n\
             Inactive sites not in Pope Tech: {}\n",
            self.total(),
            self.in_pope_tech,
            self.active_not_in_pope_tech,
            self.inactive_not_in_pope_tech
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepartmentReport {
    pub department: String,
    pub folder: PathBuf,
    pub counts: SiteCounts,
}

/// Folder name of a department bundle: trimmed, with `/` replaced so the
/// name stays a single path segment.
pub fn department_folder_name(department: &str) -> String {
    department.trim().replace('/', "_")
}

/// Writes one report bundle per department that has at least one contact.
pub async fn export_department_reports(
    db: &SurrealDbClient,
    root: &Path,
) -> Result<Vec<DepartmentReport>, AppError> {
    std::fs::create_dir_all(root)?;

    let departments = Contact::distinct_departments(db).await?;
    let mut reports = Vec::with_capacity(departments.len());
    for department in departments {
        reports.push(export_department(db, root, &department).await?);
    }

    info!(
        root = %root.display(),
        departments = reports.len(),
        "Exported department reports"
    );
    Ok(reports)
}

async fn export_department(
    db: &SurrealDbClient,
    root: &Path,
    department: &str,
) -> Result<DepartmentReport, AppError> {
    let folder = root.join(department_folder_name(department));
    std::fs::create_dir_all(&folder)?;

    let contacts = Contact::list_by_department(department, db).await?;
    write_csv(&folder.join(CONTACTS_FILE), &contacts)?;

    let in_pope_tech = Site::list_for_report(department, ReportFilter::InPopeTech, db).await?;
    write_csv(&folder.join(POPE_TECH_FILE), &in_pope_tech)?;

    let active = Site::list_for_report(department, ReportFilter::ActiveNotInPopeTech, db).await?;
    write_csv(&folder.join(ACTIVE_NOT_POPE_TECH_FILE), &active)?;

    let inactive =
        Site::list_for_report(department, ReportFilter::InactiveNotInPopeTech, db).await?;
    write_csv(&folder.join(INACTIVE_NOT_POPE_TECH_FILE), &inactive)?;

    let counts = SiteCounts {
        in_pope_tech: in_pope_tech.len(),
        active_not_in_pope_tech: active.len(),
        inactive_not_in_pope_tech: inactive.len(),
    };
    write_text(&folder.join(SITE_COUNTER_FILE), &counts.render(department))?;

    let google = Site::list_for_report(department, ReportFilter::GoogleSites, db).await?;
    write_csv(&folder.join(GOOGLE_SITES_FILE), &google)?;

    Ok(DepartmentReport {
        department: department.to_string(),
        folder,
        counts,
    })
}
