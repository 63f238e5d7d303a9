//! The access projection: a denormalized table holding the computed
//! best mode each non-owner user has on each repository. Every grant
//! mutation funnels into one of the rebuild functions here; lookups
//! then answer permission checks from a single row instead of walking
//! collaborations and teams per request.

use std::collections::HashMap;

use crate::cancel::CancelFlag;
use crate::error::{Error, Result};
use crate::store::{Session, SqliteStore};
use crate::types::{AccessMode, Repository, User};

/// Returns the effective access mode a user (or anonymous visitor)
/// holds on a repository: Owner for the literal owner, else the cached
/// projection row, else Read for public repositories and None for
/// private ones. Anonymous visitors never match a row and never exceed
/// Read.
pub fn access_level(
    s: &Session<'_>,
    user: Option<&User>,
    repo: &Repository,
) -> Result<AccessMode> {
    match user {
        Some(user) => user_access_mode(s, user.id, repo),
        None => Ok(public_fallback(repo)),
    }
}

/// Returns true if the user's access level satisfies `required`.
pub fn has_access(
    s: &Session<'_>,
    user: Option<&User>,
    repo: &Repository,
    required: AccessMode,
) -> Result<bool> {
    Ok(required <= access_level(s, user, repo)?)
}

fn public_fallback(repo: &Repository) -> AccessMode {
    if repo.is_private {
        AccessMode::None
    } else {
        AccessMode::Read
    }
}

pub(crate) fn user_access_mode(s: &Session<'_>, user_id: i64, repo: &Repository) -> Result<AccessMode> {
    if user_id == repo.owner_id {
        return Ok(AccessMode::Owner);
    }

    if let Some(access) = s.get_access(user_id, repo.id)? {
        return Ok(access.mode);
    }

    Ok(public_fallback(repo))
}

/// Full rebuild of a repository's access rows. Organization-owned
/// repositories derive access from teams and collaborations; personal
/// repositories from collaborations alone.
pub fn recalculate_accesses(s: &Session<'_>, repo: &Repository) -> Result<()> {
    let owner = s
        .get_owner(repo.owner_id)?
        .ok_or(Error::OwnerNotFound(repo.owner_id))?;

    if owner.is_organization() {
        return recalculate_team_accesses(s, repo, None);
    }

    let mut access_map = HashMap::new();
    for collab in s.collaborations_for_repo(repo.id)? {
        access_map.insert(collab.user_id, collab.mode);
    }
    refresh_accesses(s, repo, access_map)
}

/// Rebuilds access for an organization-owned repository from direct
/// collaborations plus every contributing team, skipping `ignore_team`
/// (used while a team's assignment is being withdrawn, to compute what
/// would remain without it).
pub(crate) fn recalculate_team_accesses(
    s: &Session<'_>,
    repo: &Repository,
    ignore_team: Option<i64>,
) -> Result<()> {
    let org = s
        .get_organization(repo.owner_id)?
        .ok_or(Error::OrganizationNotFound(repo.owner_id))?;

    let mut access_map = HashMap::new();
    for collab in s.collaborations_for_repo(repo.id)? {
        access_map.insert(collab.user_id, collab.mode);
    }

    for team in s.teams_of_org(org.id)? {
        if Some(team.id) == ignore_team {
            continue;
        }

        // The Owners team covers every repository of the organization;
        // other teams only contribute when they cover this one.
        let mode = if team.is_owners_team() {
            AccessMode::Owner
        } else {
            if !team.includes_all_repositories && !s.has_team_repo(team.id, repo.id)? {
                continue;
            }
            team.authorize
        };

        for member_id in s.team_member_ids(team.id)? {
            let entry = access_map.entry(member_id).or_insert(AccessMode::None);
            if mode > *entry {
                *entry = mode;
            }
        }
    }

    refresh_accesses(s, repo, access_map)
}

/// Recomputes a single user's access row, leaving the rest of the
/// repository's projection untouched. Used by grant changes that can
/// only affect one user.
pub(crate) fn recalculate_user_access(
    s: &Session<'_>,
    repo: &Repository,
    user_id: i64,
) -> Result<()> {
    let mut best = AccessMode::None;

    if let Some(collab) = s.get_collaboration(repo.id, user_id)? {
        best = collab.mode;
    }

    if let Some(org) = s.get_organization(repo.owner_id)? {
        for team in s.user_org_teams(org.id, user_id)? {
            let mode = if team.is_owners_team() {
                AccessMode::Owner
            } else {
                if !team.includes_all_repositories && !s.has_team_repo(team.id, repo.id)? {
                    continue;
                }
                team.authorize
            };
            if mode > best {
                best = mode;
            }
        }
    }

    s.delete_access(user_id, repo.id)?;
    if user_id != repo.owner_id && best >= access_floor(repo) {
        s.insert_access(user_id, repo.id, best)?;
    }
    Ok(())
}

/// Rows below this mode are not worth persisting: private repositories
/// resolve missing rows to None, public ones already default to Read.
fn access_floor(repo: &Repository) -> AccessMode {
    if repo.is_private {
        AccessMode::Read
    } else {
        AccessMode::Write
    }
}

/// Atomically replaces the repository's access rows with the given
/// user -> mode map, dropping entries below the floor and any entry for
/// the owner. Runs inside the caller's transaction, so readers see the
/// old rows or the new rows, never the gap between.
pub(crate) fn refresh_accesses(
    s: &Session<'_>,
    repo: &Repository,
    access_map: HashMap<i64, AccessMode>,
) -> Result<()> {
    let floor = access_floor(repo);

    let deleted = s.delete_repo_accesses(repo.id)?;
    let mut inserted = 0usize;
    for (user_id, mode) in access_map {
        if user_id == repo.owner_id || mode < floor {
            continue;
        }
        s.insert_access(user_id, repo.id, mode)?;
        inserted += 1;
    }

    tracing::debug!(
        repo_id = repo.id,
        deleted,
        inserted,
        "refreshed access rows"
    );
    Ok(())
}

/// Rebuilds the projection for every repository an organization owns,
/// one transaction per repository. The flag is checked between
/// repositories; cancelling keeps the rebuilds already committed and
/// returns [`Error::Cancelled`]. Repositories whose owner record has
/// gone missing are skipped with a warning rather than aborting the
/// batch.
pub fn rebuild_organization_accesses(
    store: &SqliteStore,
    org_id: i64,
    cancel: &CancelFlag,
) -> Result<usize> {
    let repos = store.with_read(|s| {
        s.get_organization(org_id)?
            .ok_or(Error::OrganizationNotFound(org_id))?;
        s.repositories_of(org_id)
    })?;

    let mut rebuilt = 0usize;
    for repo in repos {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        match store.with_txn(|s| recalculate_accesses(s, &repo)) {
            Ok(()) => rebuilt += 1,
            Err(e) if e.is_not_found() => {
                tracing::warn!(repo_id = repo.id, "skipping access rebuild: {e}");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(rebuilt)
}
