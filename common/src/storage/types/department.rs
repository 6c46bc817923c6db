use serde::Serialize;

use super::{contact::Contact, site::Site};
use crate::{error::AppError, storage::db::SurrealDbClient};

/// A department as shown by the front end. `id` is the handle forms use to
/// name the department's table.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Department {
    pub id: String,
    pub title: String,
    pub name: String,
}

impl Department {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: Self::view_id(&name),
            title: name.clone(),
            name,
        }
    }

    /// `"College of Liberal Arts"` becomes `"CollegeView"`.
    pub fn view_id(name: &str) -> String {
        let first_word = name.split(' ').next().unwrap_or_default();
        format!("{first_word}View")
    }
}

/// Departments and contacts read from the store at one point in time.
/// Never mutated, a fresh snapshot replaces it on reload.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct DirectorySnapshot {
    pub departments: Vec<Department>,
    pub contacts: Vec<Contact>,
}

impl DirectorySnapshot {
    pub async fn load(db: &SurrealDbClient) -> Result<Self, AppError> {
        let departments = Site::distinct_departments(db)
            .await?
            .into_iter()
            .map(Department::new)
            .collect();
        let contacts = Contact::list_all(db).await?;

        Ok(Self {
            departments,
            contacts,
        })
    }

    pub fn find_department(&self, view_id: &str) -> Option<&Department> {
        self.departments.iter().find(|d| d.id == view_id)
    }
}
