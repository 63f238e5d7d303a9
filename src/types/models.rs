use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AccessMode;

/// Visibility of an organization: who can see that it exists at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public = 0,
    /// Visible to any signed-in user.
    Limited = 1,
    /// Visible to members only.
    Private = 2,
}

impl From<i64> for Visibility {
    fn from(v: i64) -> Self {
        match v {
            1 => Visibility::Limited,
            2 => Visibility::Private,
            _ => Visibility::Public,
        }
    }
}

impl From<Visibility> for i64 {
    fn from(v: Visibility) -> Self {
        v as i64
    }
}

/// Discriminates rows of the shared accounts table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountKind {
    User = 0,
    Organization = 1,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub is_admin: bool,
    pub is_active: bool,
    pub prohibit_login: bool,
    /// Restricted users only see what they are explicitly granted;
    /// public repositories are not implicitly readable for them.
    pub is_restricted: bool,
    pub num_repos: i64,
    pub num_stars: i64,
    pub num_followers: i64,
    pub num_following: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: i64,
    pub name: String,
    pub visibility: Visibility,
    pub num_repos: i64,
    pub num_teams: i64,
    pub num_members: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The owner of a repository: a person or an organization. Resolution
/// branches on this once, at load time, instead of sprinkling "is this
/// an org" checks through the call paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Owner {
    User(User),
    Organization(Organization),
}

impl Owner {
    pub fn id(&self) -> i64 {
        match self {
            Owner::User(u) => u.id,
            Owner::Organization(o) => o.id,
        }
    }

    #[must_use]
    pub fn is_organization(&self) -> bool {
        matches!(self, Owner::Organization(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub is_private: bool,
    pub num_watches: i64,
    pub num_stars: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub org_id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Default grant level for every unit the team declares.
    pub authorize: AccessMode,
    /// When set, the team covers every repository the organization owns,
    /// current and future, and explicit assignments are irrelevant.
    pub includes_all_repositories: bool,
    pub num_repos: i64,
    pub num_members: i64,
}

impl Team {
    /// Reserved name of the per-organization owner team.
    pub const OWNERS: &'static str = "Owners";

    #[must_use]
    pub fn is_owners_team(&self) -> bool {
        self.name == Self::OWNERS
    }
}

/// A direct, organization-independent grant of a repository to a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collaboration {
    pub repo_id: i64,
    pub user_id: i64,
    pub mode: AccessMode,
    pub created_at: DateTime<Utc>,
}

/// One row of the access projection: the computed best mode a non-owner
/// user holds on a repository. Entirely derived; rebuilt, never edited.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Access {
    pub user_id: i64,
    pub repo_id: i64,
    pub mode: AccessMode,
}

/// Membership edge between an organization and a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgUser {
    pub org_id: i64,
    pub user_id: i64,
    pub is_owner: bool,
    pub num_teams: i64,
}
