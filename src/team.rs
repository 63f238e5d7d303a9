//! Organization teams: membership, repository assignment and the
//! authorization level a team confers. Every mutation that can change
//! someone's effective access ends in a projection recompute for the
//! repositories involved.

use crate::access;
use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::org;
use crate::store::Session;
use crate::types::{AccessMode, Repository, Team, UnitType, User};
use crate::watch;

/// Parameters for creating a team.
pub struct NewTeam<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub authorize: AccessMode,
    pub includes_all_repositories: bool,
    pub units: &'a [UnitType],
}

/// Rejects names that collide with reserved routes.
pub fn is_usable_team_name(name: &str) -> Result<()> {
    match name {
        "new" => Err(Error::NameReserved(name.to_string())),
        _ => Ok(()),
    }
}

/// Creates a team in the organization. Team names are unique per
/// organization, case-insensitively. A team flagged to include all
/// repositories is assigned every current repository right away.
pub fn new_team(
    s: &Session<'_>,
    config: &ServiceConfig,
    org_id: i64,
    opts: &NewTeam<'_>,
) -> Result<Team> {
    if opts.name.is_empty() {
        return Err(Error::EmptyTeamName);
    }
    is_usable_team_name(opts.name)?;

    s.get_organization(org_id)?
        .ok_or(Error::OrganizationNotFound(org_id))?;

    if s.team_name_taken(org_id, opts.name, None)? {
        return Err(Error::TeamAlreadyExists {
            org_id,
            name: opts.name.to_string(),
        });
    }

    let team = s.insert_team(
        org_id,
        opts.name,
        opts.description,
        opts.authorize,
        opts.includes_all_repositories,
    )?;
    s.replace_team_units(team.id, opts.units)?;
    s.incr_num_teams(org_id, 1)?;

    if team.includes_all_repositories {
        assign_all_repositories(s, config, &team)?;
    }

    s.get_team_by_id(team.id)?.ok_or(Error::TeamNotFound)
}

/// Updates a team's name, description, authorization and repository
/// scope. When the authorization level changed, every assigned
/// repository is recomputed, since each member's effective access may
/// have shifted either way. Turning on the all-repositories flag
/// assigns every current repository of the organization.
pub fn update_team(
    s: &Session<'_>,
    config: &ServiceConfig,
    team: &Team,
    auth_changed: bool,
) -> Result<()> {
    if team.name.is_empty() {
        return Err(Error::EmptyTeamName);
    }

    let old = s.get_team_by_id(team.id)?.ok_or(Error::TeamNotFound)?;
    if old.is_owners_team() && (team.name != Team::OWNERS || team.authorize != AccessMode::Owner) {
        return Err(Error::OwnersTeamImmutable);
    }

    if s.team_name_taken(team.org_id, &team.name, Some(team.id))? {
        return Err(Error::TeamAlreadyExists {
            org_id: team.org_id,
            name: team.name.clone(),
        });
    }

    let mut team = team.clone();
    if let Some(desc) = &team.description {
        if desc.chars().count() > 255 {
            team.description = Some(desc.chars().take(255).collect());
        }
    }
    s.update_team_row(&team)?;

    if !old.includes_all_repositories && team.includes_all_repositories {
        assign_all_repositories(s, config, &team)?;
    }

    if auth_changed {
        for repo_id in s.team_repo_ids(team.id)? {
            let repo = s
                .get_repository(repo_id)?
                .ok_or(Error::RepositoryNotFound(repo_id))?;
            access::recalculate_team_accesses(s, &repo, None)?;
        }
    }
    Ok(())
}

/// Replaces the set of units the team can access. Unit grants only
/// shape per-unit resolution, not the cached scalar modes, so no
/// projection rebuild is needed.
pub fn update_team_units(s: &Session<'_>, team: &Team, units: &[UnitType]) -> Result<()> {
    s.replace_team_units(team.id, units)
}

/// Deletes a team: recomputes every assigned repository without the
/// team's contribution, cascades the membership and unit rows, and
/// cleans up watches of members left without access. The Owners team
/// cannot be deleted.
pub fn delete_team(s: &Session<'_>, team: &Team) -> Result<()> {
    let team = s.get_team_by_id(team.id)?.ok_or(Error::TeamNotFound)?;
    if team.is_owners_team() {
        return Err(Error::OwnersTeamImmutable);
    }

    let repo_ids = s.team_repo_ids(team.id)?;
    let member_ids = s.team_member_ids(team.id)?;

    for &repo_id in &repo_ids {
        let repo = s
            .get_repository(repo_id)?
            .ok_or(Error::RepositoryNotFound(repo_id))?;
        access::recalculate_team_accesses(s, &repo, Some(team.id))?;

        for &member_id in &member_ids {
            if access::user_access_mode(s, member_id, &repo)? < AccessMode::Read {
                watch::unwatch_and_unsubscribe(s, member_id, &repo)?;
            }
        }
    }

    s.delete_team_repos(team.id)?;
    s.delete_team_users(team.id)?;
    s.delete_team_units(team.id)?;
    s.delete_team_row(team.id)?;
    s.incr_num_teams(team.org_id, -1)?;

    // Membership bookkeeping for the departed members: leaving the last
    // team of the organization ends the membership itself.
    for &member_id in &member_ids {
        let remaining = s.user_team_count_in_org(team.org_id, member_id)?;
        if remaining == 0 {
            if s.delete_org_user(team.org_id, member_id)? {
                s.incr_num_members(team.org_id, -1)?;
            }
        } else if let Some(mut ou) = s.get_org_user(team.org_id, member_id)? {
            ou.num_teams = remaining;
            s.update_org_user(&ou)?;
        }
    }
    Ok(())
}

/// Adds a user to the team, creating the organization membership if
/// needed and granting at least the team's level on every assigned
/// repository. Adding an existing member is a no-op.
pub fn add_team_member(
    s: &Session<'_>,
    config: &ServiceConfig,
    team: &Team,
    user_id: i64,
) -> Result<()> {
    if s.is_team_member(team.id, user_id)? {
        return Ok(());
    }

    s.get_user(user_id)?.ok_or(Error::UserNotFound(user_id))?;

    org::add_org_user(s, team.org_id, user_id)?;

    s.insert_team_user(team.id, team.org_id, user_id)?;
    s.incr_team_members(team.id, 1)?;

    let mut ou = s
        .get_org_user(team.org_id, user_id)?
        .ok_or(Error::UserNotFound(user_id))?;
    ou.num_teams += 1;
    if team.is_owners_team() {
        ou.is_owner = true;
    }
    s.update_org_user(&ou)?;

    for repo_id in s.team_repo_ids(team.id)? {
        let repo = s
            .get_repository(repo_id)?
            .ok_or(Error::RepositoryNotFound(repo_id))?;
        access::recalculate_user_access(s, &repo, user_id)?;
        if config.auto_watch {
            watch::watch_repo(s, user_id, repo.id, true)?;
        }
    }
    Ok(())
}

/// Removes a user from the team and recomputes their access to every
/// repository the team covered. Removing a non-member is a no-op;
/// removing the last member of the Owners team is rejected.
pub fn remove_team_member(s: &Session<'_>, team: &Team, user_id: i64) -> Result<()> {
    let team = s.get_team_by_id(team.id)?.ok_or(Error::TeamNotFound)?;

    if !s.is_team_member(team.id, user_id)? {
        return Ok(());
    }

    if team.is_owners_team() && team.num_members == 1 {
        return Err(Error::LastOrgOwner(user_id));
    }

    s.delete_team_user(team.id, user_id)?;
    s.incr_team_members(team.id, -1)?;

    for repo_id in s.team_repo_ids(team.id)? {
        let repo = s
            .get_repository(repo_id)?
            .ok_or(Error::RepositoryNotFound(repo_id))?;
        access::recalculate_user_access(s, &repo, user_id)?;
        if access::user_access_mode(s, user_id, &repo)? < AccessMode::Read {
            watch::unwatch_and_unsubscribe(s, user_id, &repo)?;
        }
    }

    let remaining = s.user_team_count_in_org(team.org_id, user_id)?;
    if remaining == 0 {
        if s.delete_org_user(team.org_id, user_id)? {
            s.incr_num_members(team.org_id, -1)?;
        }
    } else if let Some(mut ou) = s.get_org_user(team.org_id, user_id)? {
        ou.num_teams = remaining;
        if team.is_owners_team() {
            ou.is_owner = false;
        }
        s.update_org_user(&ou)?;
    }
    Ok(())
}

/// Returns the members of a team.
pub fn team_members(s: &Session<'_>, team_id: i64) -> Result<Vec<User>> {
    let mut members = Vec::new();
    for user_id in s.team_member_ids(team_id)? {
        members.push(s.get_user(user_id)?.ok_or(Error::UserNotFound(user_id))?);
    }
    Ok(members)
}

/// Assigns a repository to the team. The repository must belong to the
/// team's organization; assigning an already-assigned repository is a
/// no-op. The repository's whole projection is recomputed since a new
/// team now contributes to it.
pub fn add_team_repository(
    s: &Session<'_>,
    config: &ServiceConfig,
    team: &Team,
    repo: &Repository,
) -> Result<()> {
    if repo.owner_id != team.org_id {
        return Err(Error::RepositoryNotInOrganization);
    }
    if s.has_team_repo(team.id, repo.id)? {
        return Ok(());
    }

    s.insert_team_repo(team.id, team.org_id, repo.id)?;
    s.incr_team_repos(team.id, 1)?;
    access::recalculate_team_accesses(s, repo, None)?;

    if config.auto_watch {
        for member_id in s.team_member_ids(team.id)? {
            watch::watch_repo(s, member_id, repo.id, true)?;
        }
    }
    Ok(())
}

/// Withdraws a repository from the team and recomputes access without
/// the team's contribution. Rejected while the team includes all
/// repositories: that coverage is implicit and cannot be revoked
/// per-repository.
pub fn remove_team_repository(s: &Session<'_>, team: &Team, repo: &Repository) -> Result<()> {
    let team = s.get_team_by_id(team.id)?.ok_or(Error::TeamNotFound)?;
    if team.includes_all_repositories {
        return Err(Error::TeamIncludesAllRepositories);
    }

    if !s.delete_team_repo(team.id, repo.id)? {
        return Ok(());
    }
    s.incr_team_repos(team.id, -1)?;

    access::recalculate_team_accesses(s, repo, Some(team.id))?;

    for member_id in s.team_member_ids(team.id)? {
        if access::user_access_mode(s, member_id, repo)? < AccessMode::Read {
            watch::unwatch_and_unsubscribe(s, member_id, repo)?;
        }
    }
    Ok(())
}

/// Materializes the all-repositories coverage: every repository the
/// organization currently owns gets an assignment row and a recompute.
/// Future repositories are wired up at creation time.
fn assign_all_repositories(s: &Session<'_>, config: &ServiceConfig, team: &Team) -> Result<()> {
    for repo in s.repositories_of(team.org_id)? {
        if s.has_team_repo(team.id, repo.id)? {
            continue;
        }
        s.insert_team_repo(team.id, team.org_id, repo.id)?;
        s.incr_team_repos(team.id, 1)?;
        access::recalculate_team_accesses(s, &repo, None)?;

        if config.auto_watch {
            for member_id in s.team_member_ids(team.id)? {
                watch::watch_repo(s, member_id, repo.id, true)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo as repo_mod;
    use crate::store::SqliteStore;
    use crate::types::{Owner, Visibility};

    fn setup() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.initialize().unwrap();
        store
    }

    fn dev_team(authorize: AccessMode) -> NewTeam<'static> {
        NewTeam {
            name: "developers",
            description: None,
            authorize,
            includes_all_repositories: false,
            units: &UnitType::ALL,
        }
    }

    #[test]
    fn test_new_team_validations() {
        let store = setup();
        let config = ServiceConfig::default();

        store
            .with_txn(|s| {
                let founder = s.create_user("founder")?;
                let org = org::new_organization(s, "acme", Visibility::Public, &founder)?;

                let empty = new_team(
                    s,
                    &config,
                    org.id,
                    &NewTeam { name: "", ..dev_team(AccessMode::Write) },
                );
                assert!(matches!(empty.unwrap_err(), Error::EmptyTeamName));

                let reserved = new_team(
                    s,
                    &config,
                    org.id,
                    &NewTeam { name: "new", ..dev_team(AccessMode::Write) },
                );
                assert!(matches!(reserved.unwrap_err(), Error::NameReserved(_)));

                new_team(s, &config, org.id, &dev_team(AccessMode::Write))?;
                let dup = new_team(
                    s,
                    &config,
                    org.id,
                    &NewTeam { name: "Developers", ..dev_team(AccessMode::Write) },
                );
                assert!(matches!(dup.unwrap_err(), Error::TeamAlreadyExists { .. }));

                let org = s.get_organization(org.id)?.unwrap();
                assert_eq!(org.num_teams, 2); // Owners + developers
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_add_and_remove_member_updates_access() {
        let store = setup();
        let config = ServiceConfig::default();

        store
            .with_txn(|s| {
                let founder = s.create_user("founder")?;
                let dev = s.create_user("dev")?;
                let org = org::new_organization(s, "acme", Visibility::Public, &founder)?;
                let repo = repo_mod::create_repository(
                    s,
                    &config,
                    &Owner::Organization(org.clone()),
                    "project",
                    true,
                    &[],
                )?;

                let devs = new_team(s, &config, org.id, &dev_team(AccessMode::Write))?;
                add_team_repository(s, &config, &devs, &repo)?;

                add_team_member(s, &config, &devs, dev.id)?;
                add_team_member(s, &config, &devs, dev.id)?; // no-op

                assert!(org::is_org_member(s, org.id, dev.id)?);
                assert_eq!(s.get_team_by_id(devs.id)?.unwrap().num_members, 1);
                assert_eq!(access::user_access_mode(s, dev.id, &repo)?, AccessMode::Write);
                // auto_watch default subscribes the new member
                assert!(s.is_watching(dev.id, repo.id)?);

                remove_team_member(s, &devs, dev.id)?;

                assert_eq!(access::user_access_mode(s, dev.id, &repo)?, AccessMode::None);
                assert!(!s.is_watching(dev.id, repo.id)?);
                // Last team gone, so the org membership goes with it.
                assert!(!org::is_org_member(s, org.id, dev.id)?);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_last_owner_cannot_leave_via_team() {
        let store = setup();

        store
            .with_txn(|s| {
                let founder = s.create_user("founder")?;
                let org = org::new_organization(s, "acme", Visibility::Public, &founder)?;
                let owners = org::owners_team(s, org.id)?;

                let err = remove_team_member(s, &owners, founder.id).unwrap_err();
                assert!(matches!(err, Error::LastOrgOwner(_)));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_add_repository_rejects_foreign_repo() {
        let store = setup();
        let config = ServiceConfig::default();

        store
            .with_txn(|s| {
                let founder = s.create_user("founder")?;
                let outsider = s.create_user("outsider")?;
                let org = org::new_organization(s, "acme", Visibility::Public, &founder)?;
                let foreign = repo_mod::create_repository(
                    s,
                    &config,
                    &Owner::User(outsider),
                    "personal",
                    true,
                    &[],
                )?;

                let devs = new_team(s, &config, org.id, &dev_team(AccessMode::Write))?;
                let err = add_team_repository(s, &config, &devs, &foreign).unwrap_err();
                assert!(matches!(err, Error::RepositoryNotInOrganization));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_remove_repository_rejected_for_all_repos_team() {
        let store = setup();
        let config = ServiceConfig::default();

        store
            .with_txn(|s| {
                let founder = s.create_user("founder")?;
                let org = org::new_organization(s, "acme", Visibility::Public, &founder)?;
                let repo = repo_mod::create_repository(
                    s,
                    &config,
                    &Owner::Organization(org.clone()),
                    "project",
                    true,
                    &[],
                )?;

                let all = new_team(
                    s,
                    &config,
                    org.id,
                    &NewTeam {
                        name: "everything",
                        includes_all_repositories: true,
                        ..dev_team(AccessMode::Read)
                    },
                )?;
                assert!(s.has_team_repo(all.id, repo.id)?);

                let err = remove_team_repository(s, &all, &repo).unwrap_err();
                assert!(matches!(err, Error::TeamIncludesAllRepositories));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_update_team_authorize_recomputes_access() {
        let store = setup();
        let config = ServiceConfig::default();

        store
            .with_txn(|s| {
                let founder = s.create_user("founder")?;
                let dev = s.create_user("dev")?;
                let org = org::new_organization(s, "acme", Visibility::Public, &founder)?;
                let repo = repo_mod::create_repository(
                    s,
                    &config,
                    &Owner::Organization(org.clone()),
                    "project",
                    true,
                    &[],
                )?;

                let devs = new_team(s, &config, org.id, &dev_team(AccessMode::Read))?;
                add_team_repository(s, &config, &devs, &repo)?;
                add_team_member(s, &config, &devs, dev.id)?;
                assert_eq!(access::user_access_mode(s, dev.id, &repo)?, AccessMode::Read);

                let mut changed = s.get_team_by_id(devs.id)?.unwrap();
                changed.authorize = AccessMode::Admin;
                update_team(s, &config, &changed, true)?;

                assert_eq!(access::user_access_mode(s, dev.id, &repo)?, AccessMode::Admin);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_owners_team_cannot_be_deleted_or_renamed() {
        let store = setup();
        let config = ServiceConfig::default();

        store
            .with_txn(|s| {
                let founder = s.create_user("founder")?;
                let org = org::new_organization(s, "acme", Visibility::Public, &founder)?;
                let owners = org::owners_team(s, org.id)?;

                let err = delete_team(s, &owners).unwrap_err();
                assert!(matches!(err, Error::OwnersTeamImmutable));

                let mut renamed = owners.clone();
                renamed.name = "Bosses".to_string();
                let err = update_team(s, &config, &renamed, false).unwrap_err();
                assert!(matches!(err, Error::OwnersTeamImmutable));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_delete_team_revokes_access_and_watch() {
        let store = setup();
        let config = ServiceConfig::default();

        store
            .with_txn(|s| {
                let founder = s.create_user("founder")?;
                let dev = s.create_user("dev")?;
                let org = org::new_organization(s, "acme", Visibility::Public, &founder)?;
                let repo = repo_mod::create_repository(
                    s,
                    &config,
                    &Owner::Organization(org.clone()),
                    "project",
                    true,
                    &[],
                )?;

                let devs = new_team(s, &config, org.id, &dev_team(AccessMode::Write))?;
                add_team_repository(s, &config, &devs, &repo)?;
                add_team_member(s, &config, &devs, dev.id)?;
                assert!(s.is_watching(dev.id, repo.id)?);

                delete_team(s, &devs)?;

                assert!(s.get_team_by_id(devs.id)?.is_none());
                assert_eq!(access::user_access_mode(s, dev.id, &repo)?, AccessMode::None);
                assert!(!s.is_watching(dev.id, repo.id)?);
                assert!(!org::is_org_member(s, org.id, dev.id)?);

                let org = s.get_organization(org.id)?.unwrap();
                assert_eq!(org.num_teams, 1);
                Ok(())
            })
            .unwrap();
    }
}
