//! Direct collaboration grants: an explicit user <-> repository edge
//! carrying its own access mode, independent of any organization
//! structure. Every mutation here keeps the access projection in step.

use crate::access;
use crate::error::Result;
use crate::store::Session;
use crate::types::{AccessMode, Repository, User};
use crate::watch;

/// Adds a user as a collaborator with the default Write mode. Adding an
/// existing collaborator is a silent no-op, so retries stay cheap.
pub fn add_collaborator(s: &Session<'_>, repo: &Repository, user: &User) -> Result<()> {
    if s.get_collaboration(repo.id, user.id)?.is_some() {
        return Ok(());
    }

    s.insert_collaboration(repo.id, user.id, AccessMode::Write)?;
    access::recalculate_user_access(s, repo, user.id)
}

/// Changes an existing collaboration's mode.
///
/// A None mode is ignored rather than rejected: revocation goes through
/// [`delete_collaboration`], and the callers that feed this from parsed
/// input expect out-of-range values to leave the grant untouched. The
/// matching access row is patched in place instead of rebuilt; the row
/// is known to exist because every collaboration implies one.
pub fn change_collaboration_access_mode(
    s: &Session<'_>,
    repo: &Repository,
    user_id: i64,
    mode: AccessMode,
) -> Result<()> {
    if mode == AccessMode::None {
        tracing::warn!(repo_id = repo.id, user_id, "ignoring collaboration change to none");
        return Ok(());
    }

    let Some(collab) = s.get_collaboration(repo.id, user_id)? else {
        return Ok(());
    };
    if collab.mode == mode {
        return Ok(());
    }

    s.update_collaboration_mode(repo.id, user_id, mode)?;
    if s.update_access_mode(user_id, repo.id, mode)? == 0 {
        // The row can be missing when a public-repo rebuild dropped a
        // Read-level grant; recompute instead of patching nothing.
        access::recalculate_user_access(s, repo, user_id)?;
    }
    Ok(())
}

/// Removes a collaborator. Deleting a collaboration that does not exist
/// is a no-op. A successful delete triggers a full recalculation, since
/// the user may still reach the repository through a team at a lower
/// level, and drops the user's watch and issue subscriptions on the
/// repository.
pub fn delete_collaboration(s: &Session<'_>, repo: &Repository, user_id: i64) -> Result<()> {
    if !s.delete_collaboration_row(repo.id, user_id)? {
        return Ok(());
    }

    access::recalculate_accesses(s, repo)?;
    watch::unwatch_and_unsubscribe(s, user_id, repo)?;
    Ok(())
}

/// Returns the users holding a direct collaboration on the repository.
pub fn collaborators(s: &Session<'_>, repo_id: i64) -> Result<Vec<User>> {
    let mut users = Vec::new();
    for collab in s.collaborations_for_repo(repo_id)? {
        if let Some(user) = s.get_user(collab.user_id)? {
            users.push(user);
        }
    }
    Ok(users)
}
