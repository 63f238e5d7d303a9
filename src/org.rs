//! Organization membership and visibility. An organization is an
//! account that owns repositories through teams; its Owners team is
//! created with it, holds Owner authorization over everything, and can
//! never be emptied.

use crate::error::{Error, Result};
use crate::store::Session;
use crate::team;
use crate::types::{Organization, Team, UnitType, User, Visibility};

/// Creates an organization together with its Owners team and seats the
/// creator as the first owner.
pub fn new_organization(
    s: &Session<'_>,
    name: &str,
    visibility: Visibility,
    creator: &User,
) -> Result<Organization> {
    let org = s.create_organization_account(name, visibility)?;

    let owners = s.insert_team(org.id, Team::OWNERS, None, crate::types::AccessMode::Owner, false)?;
    s.replace_team_units(owners.id, &UnitType::ALL)?;
    s.incr_num_teams(org.id, 1)?;

    s.insert_org_user(org.id, creator.id)?;
    s.incr_num_members(org.id, 1)?;

    s.insert_team_user(owners.id, org.id, creator.id)?;
    s.incr_team_members(owners.id, 1)?;

    let mut ou = s
        .get_org_user(org.id, creator.id)?
        .ok_or(Error::UserNotFound(creator.id))?;
    ou.is_owner = true;
    ou.num_teams = 1;
    s.update_org_user(&ou)?;

    s.get_organization(org.id)?
        .ok_or(Error::OrganizationNotFound(org.id))
}

/// Returns the organization's Owners team.
pub fn owners_team(s: &Session<'_>, org_id: i64) -> Result<Team> {
    s.get_team(org_id, Team::OWNERS)?.ok_or(Error::TeamNotFound)
}

/// Adds a user to the organization. Already-members are a no-op.
pub fn add_org_user(s: &Session<'_>, org_id: i64, user_id: i64) -> Result<()> {
    if s.is_org_member(org_id, user_id)? {
        return Ok(());
    }

    s.insert_org_user(org_id, user_id)?;
    s.incr_num_members(org_id, 1)?;
    Ok(())
}

/// Removes a user from the organization and from all of its teams.
///
/// Fails with [`Error::LastOrgOwner`] when the user is the only member
/// of the Owners team, no matter which path the removal came through.
pub fn remove_org_user(s: &Session<'_>, org: &Organization, user_id: i64) -> Result<()> {
    if !s.is_org_member(org.id, user_id)? {
        return Ok(());
    }

    let owners = owners_team(s, org.id)?;
    if s.is_team_member(owners.id, user_id)? && owners.num_members == 1 {
        return Err(Error::LastOrgOwner(user_id));
    }

    // Leaving the last team also removes the org membership row, so
    // re-check before cleaning up a team-less membership.
    for team in s.user_org_teams(org.id, user_id)? {
        team::remove_team_member(s, &team, user_id)?;
    }

    if s.delete_org_user(org.id, user_id)? {
        s.incr_num_members(org.id, -1)?;
    }
    Ok(())
}

pub fn is_org_member(s: &Session<'_>, org_id: i64, user_id: i64) -> Result<bool> {
    s.is_org_member(org_id, user_id)
}

pub fn is_org_owner(s: &Session<'_>, org_id: i64, user_id: i64) -> Result<bool> {
    Ok(s.get_org_user(org_id, user_id)?.is_some_and(|ou| ou.is_owner))
}

/// Whether the requesting user can see that the organization exists.
/// Public organizations are visible to everyone, limited ones to any
/// signed-in user, private ones to members only.
pub fn org_visible_to(s: &Session<'_>, org: &Organization, user: Option<&User>) -> Result<bool> {
    match org.visibility {
        Visibility::Public => Ok(true),
        Visibility::Limited => Ok(user.is_some()),
        Visibility::Private => match user {
            Some(user) => s.is_org_member(org.id, user.id),
            None => Ok(false),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use crate::types::AccessMode;

    fn setup() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.initialize().unwrap();
        store
    }

    #[test]
    fn test_new_organization_seats_creator_as_owner() {
        let store = setup();

        store
            .with_txn(|s| {
                let founder = s.create_user("founder")?;
                let org = new_organization(s, "acme", Visibility::Public, &founder)?;

                assert_eq!(org.num_teams, 1);
                assert_eq!(org.num_members, 1);

                let owners = owners_team(s, org.id)?;
                assert_eq!(owners.authorize, AccessMode::Owner);
                assert_eq!(owners.num_members, 1);
                assert!(s.is_team_member(owners.id, founder.id)?);
                assert!(is_org_owner(s, org.id, founder.id)?);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_add_org_user_is_idempotent() {
        let store = setup();

        store
            .with_txn(|s| {
                let founder = s.create_user("founder")?;
                let user = s.create_user("user")?;
                let org = new_organization(s, "acme", Visibility::Public, &founder)?;

                add_org_user(s, org.id, user.id)?;
                add_org_user(s, org.id, user.id)?;

                let org = s.get_organization(org.id)?.unwrap();
                assert_eq!(org.num_members, 2);
                assert!(is_org_member(s, org.id, user.id)?);
                assert!(!is_org_owner(s, org.id, user.id)?);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_remove_last_owner_is_rejected() {
        let store = setup();

        store
            .with_txn(|s| {
                let founder = s.create_user("founder")?;
                let org = new_organization(s, "acme", Visibility::Public, &founder)?;

                let err = remove_org_user(s, &org, founder.id).unwrap_err();
                assert!(matches!(err, Error::LastOrgOwner(_)));
                assert!(is_org_member(s, org.id, founder.id)?);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_remove_org_user_drops_memberships() {
        let store = setup();

        store
            .with_txn(|s| {
                let founder = s.create_user("founder")?;
                let user = s.create_user("user")?;
                let org = new_organization(s, "acme", Visibility::Public, &founder)?;
                add_org_user(s, org.id, user.id)?;

                remove_org_user(s, &org, user.id)?;

                assert!(!is_org_member(s, org.id, user.id)?);
                let org = s.get_organization(org.id)?.unwrap();
                assert_eq!(org.num_members, 1);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_org_visibility() {
        let store = setup();

        store
            .with_txn(|s| {
                let founder = s.create_user("founder")?;
                let stranger = s.create_user("stranger")?;
                let org = new_organization(s, "secret", Visibility::Private, &founder)?;

                assert!(org_visible_to(s, &org, Some(&founder))?);
                assert!(!org_visible_to(s, &org, Some(&stranger))?);
                assert!(!org_visible_to(s, &org, None)?);

                let limited = new_organization(s, "limited", Visibility::Limited, &founder)?;
                assert!(org_visible_to(s, &limited, Some(&stranger))?);
                assert!(!org_visible_to(s, &limited, None)?);

                let open = new_organization(s, "open", Visibility::Public, &founder)?;
                assert!(org_visible_to(s, &open, None)?);
                Ok(())
            })
            .unwrap();
    }
}
