//! Repository lifecycle at the depth the access core needs: creation
//! wires up unit records, owner counters and team coverage; visibility
//! flips rebuild the projection because the persistence floor differs
//! between public and private repositories.

use crate::access;
use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::store::Session;
use crate::types::{Owner, Repository, UnitType};
use crate::watch;

/// Creates a repository for a user or an organization. An empty `units`
/// slice enables every unit type. Organization repositories are
/// assigned to the Owners team and to every all-repositories team, then
/// recalculated; personal repositories are watched by their owner when
/// auto-watch is on.
pub fn create_repository(
    s: &Session<'_>,
    config: &ServiceConfig,
    owner: &Owner,
    name: &str,
    is_private: bool,
    units: &[UnitType],
) -> Result<Repository> {
    let repo = s.insert_repository(owner.id(), name, is_private)?;

    let units = if units.is_empty() { &UnitType::ALL[..] } else { units };
    for &unit in units {
        s.insert_repo_unit(repo.id, unit)?;
    }

    s.incr_num_repos(owner.id(), 1)?;

    match owner {
        Owner::User(user) => {
            if config.auto_watch {
                watch::watch_repo(s, user.id, repo.id, true)?;
            }
        }
        Owner::Organization(org) => {
            for team in s.teams_of_org(org.id)? {
                if !team.is_owners_team() && !team.includes_all_repositories {
                    continue;
                }
                s.insert_team_repo(team.id, org.id, repo.id)?;
                s.incr_team_repos(team.id, 1)?;

                if config.auto_watch {
                    for member_id in s.team_member_ids(team.id)? {
                        watch::watch_repo(s, member_id, repo.id, true)?;
                    }
                }
            }
            access::recalculate_accesses(s, &repo)?;
        }
    }

    s.get_repository(repo.id)?
        .ok_or(Error::RepositoryNotFound(repo.id))
}

/// Changes a repository's visibility and rebuilds its access rows: the
/// set of rows worth persisting depends on whether the repository falls
/// back to public Read.
pub fn change_repository_visibility(
    s: &Session<'_>,
    repo: &Repository,
    is_private: bool,
) -> Result<Repository> {
    if repo.is_private == is_private {
        return Ok(repo.clone());
    }

    s.set_repository_private(repo.id, is_private)?;
    let repo = s
        .get_repository(repo.id)?
        .ok_or(Error::RepositoryNotFound(repo.id))?;
    access::recalculate_accesses(s, &repo)?;
    Ok(repo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::org;
    use crate::store::SqliteStore;
    use crate::types::{AccessMode, Visibility};

    fn setup() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.initialize().unwrap();
        store
    }

    #[test]
    fn test_create_personal_repository() {
        let store = setup();
        let config = ServiceConfig::default();

        store
            .with_txn(|s| {
                let owner = s.create_user("owner")?;
                let repo = create_repository(
                    s,
                    &config,
                    &Owner::User(owner.clone()),
                    "project",
                    false,
                    &[UnitType::Code, UnitType::Issues],
                )?;

                assert_eq!(
                    s.repo_unit_types(repo.id)?,
                    vec![UnitType::Code, UnitType::Issues]
                );
                assert_eq!(s.get_user(owner.id)?.unwrap().num_repos, 1);
                // Owner auto-watches their new repository.
                assert!(s.is_watching(owner.id, repo.id)?);
                assert_eq!(repo.num_watches, 1);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_create_org_repository_covers_owner_team() {
        let store = setup();
        let config = ServiceConfig::default();

        store
            .with_txn(|s| {
                let founder = s.create_user("founder")?;
                let org = org::new_organization(s, "acme", Visibility::Public, &founder)?;
                let repo = create_repository(
                    s,
                    &config,
                    &Owner::Organization(org.clone()),
                    "project",
                    true,
                    &[],
                )?;

                let owners = org::owners_team(s, org.id)?;
                assert!(s.has_team_repo(owners.id, repo.id)?);
                assert_eq!(owners.num_repos, 1);

                // The founder's access is cached at Owner level.
                let row = s.get_access(founder.id, repo.id)?.unwrap();
                assert_eq!(row.mode, AccessMode::Owner);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_visibility_change_rebuilds_floor() {
        let store = setup();
        let config = ServiceConfig::default();

        store
            .with_txn(|s| {
                let owner = s.create_user("owner")?;
                let reader = s.create_user("reader")?;
                let repo = create_repository(
                    s,
                    &config,
                    &Owner::User(owner),
                    "project",
                    true,
                    &[],
                )?;

                crate::collaboration::add_collaborator(s, &repo, &reader)?;
                crate::collaboration::change_collaboration_access_mode(
                    s,
                    &repo,
                    reader.id,
                    AccessMode::Read,
                )?;
                // Private repo keeps the Read row.
                assert!(s.get_access(reader.id, repo.id)?.is_some());

                let repo = change_repository_visibility(s, &repo, false)?;
                assert!(!repo.is_private);
                // Public floor is Write, so the Read row is gone while
                // the effective level stays Read via the fallback.
                assert!(s.get_access(reader.id, repo.id)?.is_none());
                assert_eq!(
                    access::user_access_mode(s, reader.id, &repo)?,
                    AccessMode::Read
                );
                Ok(())
            })
            .unwrap();
    }
}
