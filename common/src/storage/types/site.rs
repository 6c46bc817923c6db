use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::deserialize_null_as_empty;
use crate::{
    error::AppError,
    storage::db::{SurrealDbClient, Transaction},
    stored_object,
};

stored_object!(Site, "site", {
    #[serde(default, deserialize_with = "deserialize_null_as_empty")]
    title: String,
    environments: Option<String>,
    aliases: Option<String>,
    owners: Option<String>,
    primary_url: Option<String>,
    department: Option<String>,
    notes: Option<String>,
    #[serde(default, deserialize_with = "false_when_null")]
    pope_tech: bool,
    errors: Option<i64>,
    #[serde(default = "default_active", deserialize_with = "true_when_null")]
    active: bool,
    cms: Option<String>
});

const fn default_active() -> bool {
    true
}

fn true_when_null<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(true))
}

fn false_when_null<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

/// The content of a site record before it has been given a key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewSite {
    pub title: String,
    pub environments: Option<String>,
    pub aliases: Option<String>,
    pub owners: Option<String>,
    pub primary_url: Option<String>,
    pub department: Option<String>,
    pub notes: Option<String>,
    pub pope_tech: bool,
    pub errors: Option<i64>,
    pub active: bool,
    pub cms: Option<String>,
}

impl NewSite {
    pub fn new(title: impl Into<String>, department: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            environments: None,
            aliases: None,
            owners: None,
            primary_url: None,
            department: Some(department.into()),
            notes: None,
            pope_tech: false,
            errors: None,
            active: true,
            cms: None,
        }
    }

    #[must_use]
    pub fn with_primary_url(mut self, url: impl Into<String>) -> Self {
        self.primary_url = Some(url.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Text,
    Integer,
    Boolean,
}

/// Columns a form may change, and how their raw values are read.
const EDITABLE_COLUMNS: &[(&str, ColumnKind)] = &[
    ("title", ColumnKind::Text),
    ("environments", ColumnKind::Text),
    ("aliases", ColumnKind::Text),
    ("owners", ColumnKind::Text),
    ("primary_url", ColumnKind::Text),
    ("department", ColumnKind::Text),
    ("notes", ColumnKind::Text),
    ("pope_tech", ColumnKind::Boolean),
    ("errors", ColumnKind::Integer),
    ("active", ColumnKind::Boolean),
    ("cms", ColumnKind::Text),
];

/// Empty, `None` and `null` inputs mean "no value".
fn is_null_input(raw: &str) -> bool {
    matches!(raw, "" | "None" | "null")
}

pub fn parse_form_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "on" | "1" => Some(true),
        "false" | "f" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Reads an optional text field of a form, trimmed. Placeholders count as
/// missing.
pub fn form_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !is_null_input(value))
        .map(ToString::to_string)
}

/// Reads the `errors` field of the create form. Anything that is not a
/// plain integer is stored as NULL.
pub fn parse_form_errors(raw: Option<&str>) -> Option<i64> {
    raw.map(str::trim)
        .filter(|value| !is_null_input(value))
        .and_then(|value| value.parse().ok())
}

fn normalize_value(column: &str, kind: ColumnKind, raw: &str) -> Result<Value, AppError> {
    let trimmed = raw.trim();
    // Flags have a defined default, so they never store NULL
    if is_null_input(trimmed) && kind != ColumnKind::Boolean {
        return Ok(Value::Null);
    }

    match kind {
        ColumnKind::Text => Ok(Value::String(trimmed.to_string())),
        ColumnKind::Integer => Ok(trimmed.parse::<i64>().map_or(Value::Null, Value::from)),
        ColumnKind::Boolean => parse_form_bool(trimmed).map(Value::Bool).ok_or_else(|| {
            AppError::Validation(format!("`{trimmed}` is not a valid value for {column}"))
        }),
    }
}

/// A partial update of a site built from submitted form fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteChanges(Map<String, Value>);

impl SiteChanges {
    pub fn from_form<'a, I>(fields: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut changes = Map::new();
        for (column, raw) in fields {
            let (name, kind) = EDITABLE_COLUMNS
                .iter()
                .find(|(name, _)| *name == column)
                .ok_or_else(|| AppError::Validation(format!("Unknown column `{column}`")))?;
            changes.insert((*name).to_string(), normalize_value(name, *kind, raw)?);
        }
        Ok(Self(changes))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }
}

/// The note appended to a site when it changes department.
pub fn move_note(source_department: &str, date: NaiveDate) -> String {
    format!(
        "Moved from {source_department} on {}",
        date.format("%Y-%m-%d")
    )
}

/// Appends `note` to existing notes with a `; ` separator, or replaces
/// notes that are missing or hold a placeholder.
pub fn append_note(existing: Option<&str>, note: &str) -> String {
    match existing {
        None | Some("" | "None") => note.to_string(),
        Some(notes) => format!("{notes}; {note}"),
    }
}

/// Slices of a department used by the report bundles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFilter {
    InPopeTech,
    ActiveNotInPopeTech,
    InactiveNotInPopeTech,
    GoogleSites,
}

impl ReportFilter {
    fn condition(self) -> &'static str {
        match self {
            // Missing flags read as pope_tech = false and active = true
            Self::InPopeTech => "pope_tech = true",
            Self::ActiveNotInPopeTech => "pope_tech != true AND active != false",
            Self::InactiveNotInPopeTech => "pope_tech != true AND active = false",
            Self::GoogleSites => "cms = 'Google Sites'",
        }
    }

    fn order(self) -> &'static str {
        match self {
            Self::GoogleSites => "id",
            _ => "title",
        }
    }
}

impl Site {
    pub async fn create(db: &SurrealDbClient, new_site: NewSite) -> Result<Self, AppError> {
        db.create_with_next_id(new_site).await
    }

    pub async fn get_by_id(id: i64, db: &SurrealDbClient) -> Result<Self, AppError> {
        db.get_item::<Self>(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Entry with ID {id} not found")))
    }

    pub async fn list_by_department(
        department: &str,
        db: &SurrealDbClient,
    ) -> Result<Vec<Self>, AppError> {
        let sites: Vec<Self> = db
            .client
            .query("SELECT * FROM type::table($table) WHERE department = $department ORDER BY id")
            .bind(("table", Self::table_name()))
            .bind(("department", department.to_string()))
            .await?
            .take(0)?;

        Ok(sites)
    }

    /// Distinct non-null department names, sorted.
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

    pub async fn update_fields(
        id: i64,
        changes: SiteChanges,
        db: &SurrealDbClient,
    ) -> Result<Self, AppError> {
        if changes.is_empty() {
            return Err(AppError::Validation("No fields to update".to_string()));
        }

        // Verify the record exists, UPDATE alone would silently match nothing
        Self::get_by_id(id, db).await?;

        let updated: Option<Self> = db
            .client
            .query("UPDATE type::thing($table, $id) MERGE $changes RETURN AFTER")
            .bind(("table", Self::table_name()))
            .bind(("id", id))
            .bind(("changes", changes.0))
            .await?
            .take(0)?;

        updated.ok_or_else(|| AppError::NotFound(format!("Entry with ID {id} not found")))
    }

    pub async fn delete(id: i64, db: &SurrealDbClient) -> Result<Self, AppError> {
        db.delete_item::<Self>(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Entry with ID {id} not found")))
    }

    /// Moves one site to `target` and records the move in its notes.
    pub async fn move_to(
        id: i64,
        target: &str,
        date: NaiveDate,
        db: &SurrealDbClient,
    ) -> Result<Self, AppError> {
        let site = Self::get_by_id(id, db).await?;
        let source = site.department.as_deref().unwrap_or("None");
        let notes = append_note(site.notes.as_deref(), &move_note(source, date));

        let moved: Option<Self> = db
            .client
            .query("UPDATE type::thing($table, $id) SET department = $target, notes = $notes RETURN AFTER")
            .bind(("table", Self::table_name()))
            .bind(("id", id))
            .bind(("target", target.to_string()))
            .bind(("notes", notes))
            .await?
            .take(0)?;

        moved.ok_or_else(|| AppError::NotFound(format!("Entry with ID {id} not found")))
    }

    /// Moves every site of `source` to `target` in one transaction and
    /// returns how many were moved.
    pub async fn move_all(
        source: &str,
        target: &str,
        date: NaiveDate,
        db: &SurrealDbClient,
    ) -> Result<usize, AppError> {
        let sites = Self::list_by_department(source, db).await?;
        if sites.is_empty() {
            return Ok(0);
        }

        let note = move_note(source, date);
        let mut tx = Transaction::new();
        tx.bind("target", target)?;
        for (index, site) in sites.iter().enumerate() {
            tx.push(format!(
                "UPDATE type::thing('site', $id_{index}) SET department = $target, notes = $notes_{index}"
            ));
            tx.bind(format!("id_{index}"), site.id)?;
            tx.bind(
                format!("notes_{index}"),
                append_note(site.notes.as_deref(), &note),
            )?;
        }
        tx.commit(db).await?;

        Ok(sites.len())
    }

    /// Sites not yet known to the accessibility scanner that carry a URL,
    /// ordered by id. This is the liveness sweep's snapshot.
    pub async fn sweep_candidates(db: &SurrealDbClient) -> Result<Vec<Self>, AppError> {
        let sites: Vec<Self> = db
            .client
            .query(
                "SELECT * FROM type::table($table)
                WHERE pope_tech != true AND primary_url != NONE AND primary_url != NULL
                ORDER BY id",
            )
            .bind(("table", Self::table_name()))
            .await?
            .take(0)?;

        Ok(sites)
    }

    /// Flags the given sites inactive, one UPDATE per site, all committed
    /// together.
    pub async fn demote(ids: &[i64], db: &SurrealDbClient) -> Result<(), AppError> {
        Self::set_flag(ids, "active", false, db).await
    }

    /// Flags every site whose primary URL is in `urls` as present in the
    /// scanner roster. Returns the number of sites matched.
    pub async fn mark_in_roster(urls: &[String], db: &SurrealDbClient) -> Result<usize, AppError> {
        if urls.is_empty() {
            return Ok(0);
        }

        let keys: Vec<super::RecordKey> = db
            .client
            .query("SELECT id FROM type::table($table) WHERE primary_url INSIDE $urls")
            .bind(("table", Self::table_name()))
            .bind(("urls", urls.to_vec()))
            .await?
            .take(0)?;

        let ids: Vec<i64> = keys.iter().map(|key| key.id).collect();
        Self::set_flag(&ids, "pope_tech", true, db).await?;
        Ok(ids.len())
    }

    async fn set_flag(
        ids: &[i64],
        column: &'static str,
        value: bool,
        db: &SurrealDbClient,
    ) -> Result<(), AppError> {
        let mut tx = Transaction::new();
        tx.bind("value", value)?;
        for (index, id) in ids.iter().enumerate() {
            tx.push(format!(
                "UPDATE type::thing('site', $id_{index}) SET {column} = $value"
            ));
            tx.bind(format!("id_{index}"), id)?;
        }
        tx.commit(db).await
    }

    pub async fn list_for_report(
        department: &str,
        filter: ReportFilter,
        db: &SurrealDbClient,
    ) -> Result<Vec<Self>, AppError> {
        let query = format!(
            "SELECT * FROM type::table($table) WHERE department = $department AND {} ORDER BY {}",
            filter.condition(),
            filter.order()
        );
        let sites: Vec<Self> = db
            .client
            .query(query)
            .bind(("table", Self::table_name()))
            .bind(("department", department.to_string()))
            .await?
            .take(0)?;

        Ok(sites)
    }
}
