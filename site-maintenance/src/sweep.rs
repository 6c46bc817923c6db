use std::path::PathBuf;

use async_trait::async_trait;
use common::{
    error::AppError,
    storage::{db::SurrealDbClient, types::site::Site},
};
use futures::{stream, StreamExt};
use tracing::info;

use crate::{
    export::write_csv,
    probe::{ProbeTransport, UrlProbe},
};

pub const INACTIVE_SITES_FILE: &str = "inactive_sites.csv";
pub const ACTIVE_SITES_FILE: &str = "active_sites.csv";
pub const DEFAULT_PROBE_CONCURRENCY: usize = 20;

/// What the sweep needs from the inventory store.
#[async_trait]
pub trait SweepStore: Send + Sync {
    /// Sites with a URL that are not yet in the scanner roster, by id.
    async fn sweep_candidates(&self) -> Result<Vec<Site>, AppError>;

    /// Marks the given sites inactive, all or nothing.
    async fn demote(&self, ids: &[i64]) -> Result<(), AppError>;
}

#[async_trait]
impl SweepStore for SurrealDbClient {
    async fn sweep_candidates(&self) -> Result<Vec<Site>, AppError> {
        Site::sweep_candidates(self).await
    }

    async fn demote(&self, ids: &[i64]) -> Result<(), AppError> {
        Site::demote(ids, self).await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SweepOutcome {
    pub active: Vec<Site>,
    pub inactive: Vec<Site>,
    /// Ids whose `active` flag this run switched off.
    pub demoted: Vec<i64>,
    pub checked: usize,
}

impl SweepOutcome {
    pub fn summary_lines(&self) -> [String; 2] {
        [
            format!(
                "Checked {} URLs, found {} inactive",
                self.checked,
                self.inactive.len()
            ),
            format!(
                "Checked {} URLs, found {} active",
                self.checked,
                self.active.len()
            ),
        ]
    }
}

/// One pass over the sweep candidates: probe every URL, demote sites that
/// stopped answering, then export both partitions.
pub struct LivenessSweep<'a, S, T> {
    store: &'a S,
    probe: UrlProbe<T>,
    export_dir: PathBuf,
    concurrency: usize,
}

impl<'a, S, T> LivenessSweep<'a, S, T>
where
    S: SweepStore,
    T: ProbeTransport,
{
    pub fn new(store: &'a S, probe: UrlProbe<T>, export_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            probe,
            export_dir: export_dir.into(),
            concurrency: DEFAULT_PROBE_CONCURRENCY,
        }
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn run(&self) -> Result<SweepOutcome, AppError> {
        let snapshot = self.store.sweep_candidates().await?;
        let checked = snapshot.len();
        info!(checked, concurrency = self.concurrency, "Starting liveness sweep");

        let reachable = self.probe_all(&snapshot).await;

        let mut active = Vec::new();
        let mut inactive = Vec::new();
        for (site, is_reachable) in snapshot.into_iter().zip(reachable) {
            if is_reachable {
                info!(id = site.id, "{} flagged as active", site.title);
                active.push(site);
            } else {
                info!(id = site.id, "{} flagged as inactive", site.title);
                inactive.push(site);
            }
        }

        // Demote only: a reachable site stored inactive keeps its flag
        let demoted: Vec<i64> = inactive
            .iter()
            .filter(|site| site.active)
            .map(|site| site.id)
            .collect();
        if !demoted.is_empty() {
            self.store.demote(&demoted).await?;
            info!(count = demoted.len(), "Committed demotions");
        }

        write_csv(&self.export_dir.join(INACTIVE_SITES_FILE), &inactive)?;
        write_csv(&self.export_dir.join(ACTIVE_SITES_FILE), &active)?;

        Ok(SweepOutcome {
            active,
            inactive,
            demoted,
            checked,
        })
    }

    /// Probes every site with at most `concurrency` requests in flight.
    /// Results come back in completion order and are put back into
    /// snapshot order by index.
    async fn probe_all(&self, snapshot: &[Site]) -> Vec<bool> {
        let mut reachable = vec![false; snapshot.len()];
        let mut results = stream::iter(snapshot.iter().enumerate())
            .map(|(index, site)| async move {
                let url = site.primary_url.as_deref().unwrap_or_default();
                (index, self.probe.is_reachable(url).await)
            })
            .buffer_unordered(self.concurrency);

        while let Some((index, is_reachable)) = results.next().await {
            if let Some(slot) = reachable.get_mut(index) {
                *slot = is_reachable;
            }
        }
        reachable
    }
}
