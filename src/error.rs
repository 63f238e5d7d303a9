use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("user {0} does not exist")]
    UserNotFound(i64),

    #[error("organization {0} does not exist")]
    OrganizationNotFound(i64),

    #[error("repository {0} does not exist")]
    RepositoryNotFound(i64),

    #[error("owner {0} of repository does not exist")]
    OwnerNotFound(i64),

    #[error("team does not exist")]
    TeamNotFound,

    #[error("user {0} is the last owner of the organization and cannot be removed")]
    LastOrgOwner(i64),

    #[error("repository does not belong to the team's organization")]
    RepositoryNotInOrganization,

    #[error("team grants access to all repositories; disable that before removing one")]
    TeamIncludesAllRepositories,

    #[error("name '{0}' is reserved")]
    NameReserved(String),

    #[error("team '{name}' already exists in organization {org_id}")]
    TeamAlreadyExists { org_id: i64, name: String },

    #[error("team name cannot be empty")]
    EmptyTeamName,

    #[error("the Owners team cannot be modified")]
    OwnersTeamImmutable,

    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Returns true for typed not-found conditions, letting batch jobs
    /// skip a missing record and continue instead of aborting.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::UserNotFound(_)
                | Error::OrganizationNotFound(_)
                | Error::RepositoryNotFound(_)
                | Error::OwnerNotFound(_)
                | Error::TeamNotFound
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
