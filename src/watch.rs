//! Watch, star and follow bookkeeping. These keep the social counters
//! honest alongside their edge tables and give the access paths a hook
//! to drop notification subscriptions when a user loses a repository.

use crate::error::Result;
use crate::store::Session;
use crate::types::Repository;

/// Watches or unwatches a repository for a user, keeping the
/// repository's watcher counter in step. Both directions are
/// idempotent.
pub fn watch_repo(s: &Session<'_>, user_id: i64, repo_id: i64, watch: bool) -> Result<()> {
    if watch {
        if !s.is_watching(user_id, repo_id)? {
            s.insert_watch(user_id, repo_id)?;
            s.incr_repo_watches(repo_id, 1)?;
        }
    } else if s.delete_watch(user_id, repo_id)? {
        s.incr_repo_watches(repo_id, -1)?;
    }
    Ok(())
}

pub fn is_watching(s: &Session<'_>, user_id: i64, repo_id: i64) -> Result<bool> {
    s.is_watching(user_id, repo_id)
}

pub fn watchers(s: &Session<'_>, repo_id: i64) -> Result<Vec<i64>> {
    s.watcher_ids(repo_id)
}

/// Stars or unstars a repository, updating both the repository's and
/// the user's star counters.
pub fn star_repo(s: &Session<'_>, user_id: i64, repo_id: i64, star: bool) -> Result<()> {
    if star {
        if !s.is_starring(user_id, repo_id)? {
            s.insert_star(user_id, repo_id)?;
            s.incr_repo_stars(repo_id, 1)?;
            s.incr_num_stars(user_id, 1)?;
        }
    } else if s.delete_star(user_id, repo_id)? {
        s.incr_repo_stars(repo_id, -1)?;
        s.incr_num_stars(user_id, -1)?;
    }
    Ok(())
}

pub fn is_starring(s: &Session<'_>, user_id: i64, repo_id: i64) -> Result<bool> {
    s.is_starring(user_id, repo_id)
}

/// Follows or unfollows another user. Following yourself is a no-op.
pub fn follow_user(s: &Session<'_>, user_id: i64, follow_id: i64, follow: bool) -> Result<()> {
    if user_id == follow_id {
        return Ok(());
    }

    if follow {
        if !s.is_following(user_id, follow_id)? {
            s.insert_follow(user_id, follow_id)?;
            s.incr_num_followers(follow_id, 1)?;
            s.incr_num_following(user_id, 1)?;
        }
    } else if s.delete_follow(user_id, follow_id)? {
        s.incr_num_followers(follow_id, -1)?;
        s.incr_num_following(user_id, -1)?;
    }
    Ok(())
}

pub fn is_following(s: &Session<'_>, user_id: i64, follow_id: i64) -> Result<bool> {
    s.is_following(user_id, follow_id)
}

/// Records an issue subscription for notification delivery.
pub fn subscribe_issue(
    s: &Session<'_>,
    user_id: i64,
    repo_id: i64,
    issue_index: i64,
) -> Result<()> {
    s.insert_issue_subscription(user_id, repo_id, issue_index)
}

/// Fire-and-forget cleanup when a user loses access to a repository:
/// drop their watch and every issue subscription scoped to it.
pub(crate) fn unwatch_and_unsubscribe(
    s: &Session<'_>,
    user_id: i64,
    repo: &Repository,
) -> Result<()> {
    watch_repo(s, user_id, repo.id, false)?;
    s.delete_repo_issue_subscriptions(user_id, repo.id)?;
    Ok(())
}
