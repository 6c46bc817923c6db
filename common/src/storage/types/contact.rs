use serde::{Deserialize, Serialize};

use super::deserialize_null_as_empty;
use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

stored_object!(Contact, "contact", {
    department: Option<String>,
    #[serde(default, deserialize_with = "deserialize_null_as_empty")]
    name: String,
    #[serde(default, deserialize_with = "deserialize_null_as_empty")]
    email: String,
    site: Option<String>
});

/// A department contact as submitted by a form. A blank site means the
/// contact covers the whole department.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewContact {
    pub department: String,
    pub name: String,
    pub email: String,
    pub site: Option<String>,
}

impl NewContact {
    pub fn new(
        department: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        site: Option<&str>,
    ) -> Self {
        Self {
            department: department.into(),
            name: name.into(),
            email: email.into(),
            site: site
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string),
        }
    }
}

impl Contact {
    pub async fn list_all(db: &SurrealDbClient) -> Result<Vec<Self>, AppError> {
        Ok(db.get_all_stored_items::<Self>().await?)
    }

    pub async fn list_by_department(
        department: &str,
        db: &SurrealDbClient,
    ) -> Result<Vec<Self>, AppError> {
        let contacts: Vec<Self> = db
            .client
            .query("SELECT * FROM type::table($table) WHERE department = $department ORDER BY id")
            .bind(("table", Self::table_name()))
            .bind(("department", department.to_string()))
            .await?
            .take(0)?;

        Ok(contacts)
    }

    pub async fn distinct_departments(db: &SurrealDbClient) -> Result<Vec<String>, AppError> {
        let mut departments: Vec<String> = db
            .client
            .query("SELECT VALUE department FROM type::table($table) WHERE department != NONE AND department != NULL")
            .bind(("table", Self::table_name()))
            .await?
            .take(0)?;

        departments.sort();
        departments.dedup();
        Ok(departments)
    }

    pub async fn create(db: &SurrealDbClient, contact: NewContact) -> Result<Self, AppError> {
        db.create_with_next_id(contact).await
    }

    /// Replaces every field of an existing contact.
    pub async fn update(
        id: i64,
        contact: NewContact,
        db: &SurrealDbClient,
    ) -> Result<Self, AppError> {
        if db.get_item::<Self>(id).await?.is_none() {
            return Err(AppError::NotFound(format!("Contact with ID {id} not found")));
        }

        let updated: Option<Self> = db
            .client
            .query("UPDATE type::thing($table, $id) CONTENT $content RETURN AFTER")
            .bind(("table", Self::table_name()))
            .bind(("id", id))
            .bind(("content", contact))
            .await?
            .take(0)?;

        updated.ok_or_else(|| AppError::NotFound(format!("Contact with ID {id} not found")))
    }

    pub async fn delete(id: i64, db: &SurrealDbClient) -> Result<Self, AppError> {
        db.delete_item::<Self>(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Contact with ID {id} not found")))
    }
}
