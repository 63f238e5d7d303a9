//! Drift repair for denormalized counters. The counters on accounts,
//! repositories and teams are caches of aggregates and go stale when a
//! crash lands between an edge write and its counter update. This job
//! detects and corrects each class of drift in bulk, off the hot path.

use crate::cancel::CancelFlag;
use crate::error::{Error, Result};
use crate::store::{Session, SqliteStore};

/// How many rows each repair class had to correct.
#[derive(Debug, Default, Clone, Copy)]
pub struct RepairSummary {
    pub repo_watches: usize,
    pub repo_stars: usize,
    pub account_repos: usize,
    pub account_stars: usize,
    pub team_members: usize,
    pub team_repos: usize,
    pub org_teams: usize,
    pub org_members: usize,
    pub org_user_teams: usize,
    pub orphan_accesses: usize,
}

impl RepairSummary {
    pub fn total(&self) -> usize {
        self.repo_watches
            + self.repo_stars
            + self.account_repos
            + self.account_stars
            + self.team_members
            + self.team_repos
            + self.org_teams
            + self.org_members
            + self.org_user_teams
            + self.orphan_accesses
    }
}

fn repair_class(
    store: &SqliteStore,
    cancel: &CancelFlag,
    name: &str,
    f: impl Fn(&Session<'_>) -> Result<usize>,
) -> Result<usize> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let fixed = store.with_txn(|s| f(s))?;
    if fixed > 0 {
        tracing::warn!(class = name, fixed, "repaired drifted rows");
    }
    Ok(fixed)
}

/// Runs every repair class, one transaction each, checking the cancel
/// flag between classes. Cancelling keeps the classes already repaired
/// and returns [`Error::Cancelled`].
pub fn repair_stats(store: &SqliteStore, cancel: &CancelFlag) -> Result<RepairSummary> {
    let summary = RepairSummary {
        repo_watches: repair_class(store, cancel, "repository watch counts", |s| {
            s.repair_repo_watch_counts()
        })?,
        repo_stars: repair_class(store, cancel, "repository star counts", |s| {
            s.repair_repo_star_counts()
        })?,
        account_repos: repair_class(store, cancel, "account repository counts", |s| {
            s.repair_account_repo_counts()
        })?,
        account_stars: repair_class(store, cancel, "account star counts", |s| {
            s.repair_account_star_counts()
        })?,
        team_members: repair_class(store, cancel, "team member counts", |s| {
            s.repair_team_member_counts()
        })?,
        team_repos: repair_class(store, cancel, "team repository counts", |s| {
            s.repair_team_repo_counts()
        })?,
        org_teams: repair_class(store, cancel, "organization team counts", |s| {
            s.repair_org_team_counts()
        })?,
        org_members: repair_class(store, cancel, "organization member counts", |s| {
            s.repair_org_member_counts()
        })?,
        org_user_teams: repair_class(store, cancel, "membership team counts", |s| {
            s.repair_org_user_team_counts()
        })?,
        orphan_accesses: repair_class(store, cancel, "orphaned access rows", |s| {
            s.delete_orphan_accesses()
        })?,
    };

    Ok(summary)
}
