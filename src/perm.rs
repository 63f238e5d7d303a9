//! The permission resolver: turns a (repository, user) pair into a
//! [`Permission`] describing what the user can do, per functional unit.
//! Personal repositories resolve to one uniform mode; organization
//! repositories need the per-unit map because a team can grant the
//! issue tracker without granting the code.

use std::collections::HashMap;

use serde::Serialize;

use crate::access;
use crate::error::{Error, Result};
use crate::org;
use crate::store::Session;
use crate::types::{AccessMode, Owner, Repository, UnitType, User};

/// The resolved access a user holds on one repository. Computed fresh
/// per check and never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct Permission {
    /// The mode guaranteed across the repository as a whole. Per-unit
    /// grants can only raise individual units above this.
    pub access_mode: AccessMode,
    units: Vec<UnitType>,
    unit_modes: Option<HashMap<UnitType, AccessMode>>,
}

impl Permission {
    fn uniform(mode: AccessMode, units: Vec<UnitType>) -> Self {
        Self {
            access_mode: mode,
            units,
            unit_modes: None,
        }
    }

    fn none() -> Self {
        Self::uniform(AccessMode::None, Vec::new())
    }

    /// The resolved mode for one unit. Without a per-unit map the
    /// repository-wide mode applies to every enabled unit; with one,
    /// units nobody granted resolve to None.
    pub fn unit_access_mode(&self, unit: UnitType) -> AccessMode {
        match &self.unit_modes {
            Some(modes) => modes.get(&unit).copied().unwrap_or(AccessMode::None),
            None => {
                if self.units.contains(&unit) {
                    self.access_mode
                } else {
                    AccessMode::None
                }
            }
        }
    }

    #[must_use]
    pub fn can_access(&self, mode: AccessMode, unit: UnitType) -> bool {
        self.unit_access_mode(unit) >= mode
    }

    #[must_use]
    pub fn can_read(&self, unit: UnitType) -> bool {
        self.can_access(AccessMode::Read, unit)
    }

    #[must_use]
    pub fn can_write(&self, unit: UnitType) -> bool {
        self.can_access(AccessMode::Write, unit)
    }

    /// True if any of the listed units clears the bar. Backs checks
    /// like "can this user be assigned to an issue", which accepts
    /// write on code, issues or pull requests.
    #[must_use]
    pub fn can_access_any(&self, mode: AccessMode, units: &[UnitType]) -> bool {
        units.iter().any(|&unit| self.can_access(mode, unit))
    }

    /// Repository-global judgment, deliberately independent of the
    /// per-unit map.
    #[must_use]
    pub fn is_owner(&self) -> bool {
        self.access_mode >= AccessMode::Owner
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.access_mode >= AccessMode::Admin
    }
}

/// Resolves the permission a user (or anonymous visitor) holds on a
/// repository.
pub fn get_user_repo_permission(
    s: &Session<'_>,
    repo: &Repository,
    user: Option<&User>,
) -> Result<Permission> {
    let units = s.repo_unit_types(repo.id)?;

    // Anonymous visitors are done early: private repositories are a
    // hard deny, public ones grant uniform Read further down.
    if user.is_none() && repo.is_private {
        return Ok(Permission::none());
    }

    let owner = s
        .get_owner(repo.owner_id)?
        .ok_or(Error::OwnerNotFound(repo.owner_id))?;

    // Keep strangers from even confirming that a repository of a hidden
    // organization exists. Direct collaborators get through: they were
    // invited to the repository without being organization members.
    if let Owner::Organization(owner_org) = &owner {
        let is_collaborator = match user {
            Some(user) => s.is_collaborator(repo.id, user.id)?,
            None => false,
        };
        if !org::org_visible_to(s, owner_org, user)? && !is_collaborator {
            return Ok(Permission::none());
        }
    }

    let Some(user) = user else {
        return Ok(Permission::uniform(AccessMode::Read, units));
    };

    // Deactivated and login-prohibited accounts hold no permissions.
    if !user.is_active || user.prohibit_login {
        return Ok(Permission::none());
    }

    // Site administrators and the literal owner bypass everything.
    if user.is_admin || user.id == repo.owner_id {
        return Ok(Permission::uniform(AccessMode::Owner, units));
    }

    let access_mode = access::access_level(s, Some(user), repo)?;

    // Personal repository: the scalar mode is the whole answer.
    let Owner::Organization(owner_org) = owner else {
        return Ok(Permission::uniform(access_mode, units));
    };

    // Organization repository: resolve per unit. A direct collaboration
    // seeds every enabled unit at the collaborator's mode.
    let mut unit_modes: HashMap<UnitType, AccessMode> = HashMap::new();
    if let Some(collab) = s.get_collaboration(repo.id, user.id)? {
        for &unit in &units {
            unit_modes.insert(unit, collab.mode);
        }
    }

    let mut teams = Vec::new();
    for team in s.user_org_teams(owner_org.id, user.id)? {
        if team.is_owners_team()
            || team.includes_all_repositories
            || s.has_team_repo(team.id, repo.id)?
        {
            teams.push(team);
        }
    }

    // Membership in any Owner-level team is absolute.
    if teams.iter().any(|t| t.authorize == AccessMode::Owner) {
        return Ok(Permission::uniform(AccessMode::Owner, units));
    }

    for &unit in &units {
        for team in &teams {
            let current = unit_modes.get(&unit).copied().unwrap_or(AccessMode::None);
            if team.authorize > current && s.team_has_unit(team.id, unit)? {
                unit_modes.insert(unit, team.authorize);
            }
        }
    }

    // Public repositories grant at least per-unit Read to everyone but
    // restricted users, even when no team covers the unit.
    if !repo.is_private && !user.is_restricted {
        for &unit in &units {
            let entry = unit_modes.entry(unit).or_insert(AccessMode::None);
            if *entry < AccessMode::Read {
                *entry = AccessMode::Read;
            }
        }
    }

    // Units nobody granted carry no entry; their implicit mode is None.
    unit_modes.retain(|_, mode| *mode > AccessMode::None);

    Ok(Permission {
        access_mode,
        units,
        unit_modes: Some(unit_modes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use crate::store::SqliteStore;
    use crate::team::{self, NewTeam};
    use crate::types::Visibility;
    use crate::{collaboration, repo as repo_mod};

    fn setup() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.initialize().unwrap();
        store
    }

    #[test]
    fn test_anonymous_on_private_repo_is_denied() {
        let store = setup();
        let config = ServiceConfig::default();

        let repo = store
            .with_txn(|s| {
                let owner = s.create_user("owner")?;
                repo_mod::create_repository(s, &config, &Owner::User(owner), "p", true, &[])
            })
            .unwrap();

        let perm = store
            .with_read(|s| get_user_repo_permission(s, &repo, None))
            .unwrap();
        assert_eq!(perm.access_mode, AccessMode::None);
        assert!(!perm.can_read(UnitType::Code));
    }

    #[test]
    fn test_anonymous_on_public_repo_reads_all_units() {
        let store = setup();
        let config = ServiceConfig::default();

        let repo = store
            .with_txn(|s| {
                let owner = s.create_user("owner")?;
                repo_mod::create_repository(s, &config, &Owner::User(owner), "p", false, &[])
            })
            .unwrap();

        let perm = store
            .with_read(|s| get_user_repo_permission(s, &repo, None))
            .unwrap();
        assert_eq!(perm.access_mode, AccessMode::Read);
        assert!(perm.can_read(UnitType::Code));
        assert!(perm.can_read(UnitType::Wiki));
        assert!(!perm.can_write(UnitType::Code));
    }

    #[test]
    fn test_site_admin_and_owner_get_everything() {
        let store = setup();
        let config = ServiceConfig::default();

        let (admin, owner, repo) = store
            .with_txn(|s| {
                let owner = s.create_user("owner")?;
                let mut admin = s.create_user("root")?;
                admin.is_admin = true;
                s.update_user_flags(&admin)?;
                let repo = repo_mod::create_repository(
                    s,
                    &config,
                    &Owner::User(owner.clone()),
                    "p",
                    true,
                    &[],
                )?;
                Ok((admin, owner, repo))
            })
            .unwrap();

        for user in [&admin, &owner] {
            let perm = store
                .with_read(|s| get_user_repo_permission(s, &repo, Some(user)))
                .unwrap();
            assert!(perm.is_owner());
            assert!(perm.can_write(UnitType::Code));
        }
    }

    #[test]
    fn test_prohibited_login_holds_nothing() {
        let store = setup();
        let config = ServiceConfig::default();

        let (blocked, repo) = store
            .with_txn(|s| {
                let owner = s.create_user("owner")?;
                let mut blocked = s.create_user("blocked")?;
                blocked.prohibit_login = true;
                s.update_user_flags(&blocked)?;
                let repo = repo_mod::create_repository(
                    s,
                    &config,
                    &Owner::User(owner),
                    "p",
                    false,
                    &[],
                )?;
                Ok((blocked, repo))
            })
            .unwrap();

        let perm = store
            .with_read(|s| get_user_repo_permission(s, &repo, Some(&blocked)))
            .unwrap();
        assert_eq!(perm.access_mode, AccessMode::None);
        assert!(!perm.can_read(UnitType::Code));
    }

    #[test]
    fn test_hidden_org_denies_strangers_but_not_collaborators() {
        let store = setup();
        let config = ServiceConfig::default();

        let (stranger, collaborator, repo) = store
            .with_txn(|s| {
                let founder = s.create_user("founder")?;
                let stranger = s.create_user("stranger")?;
                let collaborator = s.create_user("collab")?;
                let org = org::new_organization(s, "hidden", Visibility::Private, &founder)?;
                // Nominally public repository of a private organization.
                let repo = repo_mod::create_repository(
                    s,
                    &config,
                    &Owner::Organization(org),
                    "p",
                    false,
                    &[],
                )?;
                collaboration::add_collaborator(s, &repo, &collaborator)?;
                Ok((stranger, collaborator, repo))
            })
            .unwrap();

        let perm = store
            .with_read(|s| get_user_repo_permission(s, &repo, Some(&stranger)))
            .unwrap();
        assert_eq!(perm.access_mode, AccessMode::None);

        let perm = store
            .with_read(|s| get_user_repo_permission(s, &repo, None))
            .unwrap();
        assert_eq!(perm.access_mode, AccessMode::None);

        let perm = store
            .with_read(|s| get_user_repo_permission(s, &repo, Some(&collaborator)))
            .unwrap();
        assert!(perm.can_write(UnitType::Code));
    }

    #[test]
    fn test_per_unit_team_grant_is_independent() {
        let store = setup();
        let config = ServiceConfig::default();

        let (triager, repo) = store
            .with_txn(|s| {
                let founder = s.create_user("founder")?;
                let triager = s.create_user("triager")?;
                let org = org::new_organization(s, "acme", Visibility::Public, &founder)?;
                let repo = repo_mod::create_repository(
                    s,
                    &config,
                    &Owner::Organization(org.clone()),
                    "p",
                    true,
                    &[],
                )?;

                let triage = team::new_team(
                    s,
                    &config,
                    org.id,
                    &NewTeam {
                        name: "triage",
                        description: None,
                        authorize: AccessMode::Write,
                        includes_all_repositories: false,
                        units: &[UnitType::Issues],
                    },
                )?;
                team::add_team_repository(s, &config, &triage, &repo)?;
                team::add_team_member(s, &config, &triage, triager.id)?;
                Ok((triager, repo))
            })
            .unwrap();

        let perm = store
            .with_read(|s| get_user_repo_permission(s, &repo, Some(&triager)))
            .unwrap();
        assert!(perm.can_write(UnitType::Issues));
        assert!(!perm.can_read(UnitType::Code));
        assert!(perm.can_access_any(AccessMode::Write, &[UnitType::Code, UnitType::Issues]));
    }

    #[test]
    fn test_owners_team_membership_is_absolute() {
        let store = setup();
        let config = ServiceConfig::default();

        let (founder, repo) = store
            .with_txn(|s| {
                let founder = s.create_user("founder")?;
                let org = org::new_organization(s, "acme", Visibility::Public, &founder)?;
                let repo = repo_mod::create_repository(
                    s,
                    &config,
                    &Owner::Organization(org),
                    "p",
                    true,
                    &[],
                )?;
                Ok((founder, repo))
            })
            .unwrap();

        let perm = store
            .with_read(|s| get_user_repo_permission(s, &repo, Some(&founder)))
            .unwrap();
        assert!(perm.is_owner());
        assert!(perm.can_write(UnitType::Wiki));
    }

    #[test]
    fn test_restricted_user_gets_no_public_fallback() {
        let store = setup();
        let config = ServiceConfig::default();

        let (restricted, repo) = store
            .with_txn(|s| {
                let founder = s.create_user("founder")?;
                let mut restricted = s.create_user("restricted")?;
                restricted.is_restricted = true;
                s.update_user_flags(&restricted)?;
                let org = org::new_organization(s, "acme", Visibility::Public, &founder)?;
                let repo = repo_mod::create_repository(
                    s,
                    &config,
                    &Owner::Organization(org),
                    "p",
                    false,
                    &[],
                )?;
                Ok((restricted, repo))
            })
            .unwrap();

        let perm = store
            .with_read(|s| get_user_repo_permission(s, &repo, Some(&restricted)))
            .unwrap();
        assert!(!perm.can_read(UnitType::Code));
        assert!(!perm.can_read(UnitType::Issues));
    }

    #[test]
    fn test_public_org_repo_grants_per_unit_read() {
        let store = setup();
        let config = ServiceConfig::default();

        let (visitor, repo) = store
            .with_txn(|s| {
                let founder = s.create_user("founder")?;
                let visitor = s.create_user("visitor")?;
                let org = org::new_organization(s, "acme", Visibility::Public, &founder)?;
                let repo = repo_mod::create_repository(
                    s,
                    &config,
                    &Owner::Organization(org),
                    "p",
                    false,
                    &[],
                )?;
                Ok((visitor, repo))
            })
            .unwrap();

        let perm = store
            .with_read(|s| get_user_repo_permission(s, &repo, Some(&visitor)))
            .unwrap();
        assert!(perm.can_read(UnitType::Code));
        assert!(!perm.can_write(UnitType::Code));
        assert!(!perm.is_admin());
    }
}
