use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{Error, Result};
use crate::types::*;

/// A scoped view of the database: either a plain read session or a
/// transaction opened by [`super::SqliteStore::with_txn`]. Core
/// functions take this explicitly instead of reaching for a shared
/// engine handle, so every mutation is visibly tied to one unit of work.
pub struct Session<'a> {
    conn: &'a Connection,
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

const USER_COLS: &str = "id, name, is_admin, is_active, prohibit_login, is_restricted, \
     num_repos, num_stars, num_followers, num_following, created_at, updated_at";

const ORG_COLS: &str = "id, name, visibility, num_repos, num_teams, num_members, \
     created_at, updated_at";

const REPO_COLS: &str =
    "id, owner_id, name, is_private, num_watches, num_stars, created_at, updated_at";

const TEAM_COLS: &str =
    "id, org_id, name, description, authorize, includes_all_repositories, num_repos, num_members";

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        is_admin: row.get(2)?,
        is_active: row.get(3)?,
        prohibit_login: row.get(4)?,
        is_restricted: row.get(5)?,
        num_repos: row.get(6)?,
        num_stars: row.get(7)?,
        num_followers: row.get(8)?,
        num_following: row.get(9)?,
        created_at: parse_datetime(&row.get::<_, String>(10)?),
        updated_at: parse_datetime(&row.get::<_, String>(11)?),
    })
}

fn org_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Organization> {
    Ok(Organization {
        id: row.get(0)?,
        name: row.get(1)?,
        visibility: Visibility::from(row.get::<_, i64>(2)?),
        num_repos: row.get(3)?,
        num_teams: row.get(4)?,
        num_members: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        updated_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

fn repo_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Repository> {
    Ok(Repository {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        is_private: row.get(3)?,
        num_watches: row.get(4)?,
        num_stars: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        updated_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

fn team_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Team> {
    Ok(Team {
        id: row.get(0)?,
        org_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        authorize: AccessMode::from(row.get::<_, i64>(4)?),
        includes_all_repositories: row.get(5)?,
        num_repos: row.get(6)?,
        num_members: row.get(7)?,
    })
}

impl<'a> Session<'a> {
    pub(crate) fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    // Account operations

    pub fn create_user(&self, name: &str) -> Result<User> {
        let now = format_datetime(&Utc::now());
        self.conn.execute(
            "INSERT INTO accounts (name, lower_name, kind, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![name, name.to_lowercase(), AccountKind::User as i64, now],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_user(id)?.ok_or(Error::UserNotFound(id))
    }

    pub fn create_organization_account(
        &self,
        name: &str,
        visibility: Visibility,
    ) -> Result<Organization> {
        let now = format_datetime(&Utc::now());
        self.conn.execute(
            "INSERT INTO accounts (name, lower_name, kind, visibility, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                name,
                name.to_lowercase(),
                AccountKind::Organization as i64,
                i64::from(visibility),
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_organization(id)?
            .ok_or(Error::OrganizationNotFound(id))
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        self.conn
            .query_row(
                &format!("SELECT {USER_COLS} FROM accounts WHERE id = ?1 AND kind = 0"),
                params![id],
                user_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    pub fn get_organization(&self, id: i64) -> Result<Option<Organization>> {
        self.conn
            .query_row(
                &format!("SELECT {ORG_COLS} FROM accounts WHERE id = ?1 AND kind = 1"),
                params![id],
                org_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    /// Loads the owner of a repository, dispatching on the account kind.
    pub fn get_owner(&self, id: i64) -> Result<Option<Owner>> {
        let kind: Option<i64> = self
            .conn
            .query_row(
                "SELECT kind FROM accounts WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        match kind {
            Some(0) => Ok(self.get_user(id)?.map(Owner::User)),
            Some(_) => Ok(self.get_organization(id)?.map(Owner::Organization)),
            None => Ok(None),
        }
    }

    pub fn update_user_flags(&self, user: &User) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE accounts
             SET is_admin = ?1, is_active = ?2, prohibit_login = ?3, is_restricted = ?4,
                 updated_at = ?5
             WHERE id = ?6 AND kind = 0",
            params![
                user.is_admin,
                user.is_active,
                user.prohibit_login,
                user.is_restricted,
                format_datetime(&Utc::now()),
                user.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::UserNotFound(user.id));
        }
        Ok(())
    }

    pub fn set_org_visibility(&self, org_id: i64, visibility: Visibility) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE accounts SET visibility = ?1, updated_at = ?2 WHERE id = ?3 AND kind = 1",
            params![
                i64::from(visibility),
                format_datetime(&Utc::now()),
                org_id
            ],
        )?;

        if rows == 0 {
            return Err(Error::OrganizationNotFound(org_id));
        }
        Ok(())
    }

    pub fn account_count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))
            .map_err(Error::from)
    }

    pub(crate) fn incr_num_repos(&self, account_id: i64, delta: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE accounts SET num_repos = num_repos + ?1 WHERE id = ?2",
            params![delta, account_id],
        )?;
        Ok(())
    }

    pub(crate) fn incr_num_teams(&self, org_id: i64, delta: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE accounts SET num_teams = num_teams + ?1 WHERE id = ?2",
            params![delta, org_id],
        )?;
        Ok(())
    }

    pub(crate) fn incr_num_members(&self, org_id: i64, delta: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE accounts SET num_members = num_members + ?1 WHERE id = ?2",
            params![delta, org_id],
        )?;
        Ok(())
    }

    pub(crate) fn incr_num_stars(&self, user_id: i64, delta: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE accounts SET num_stars = num_stars + ?1 WHERE id = ?2",
            params![delta, user_id],
        )?;
        Ok(())
    }

    pub(crate) fn incr_num_followers(&self, user_id: i64, delta: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE accounts SET num_followers = num_followers + ?1 WHERE id = ?2",
            params![delta, user_id],
        )?;
        Ok(())
    }

    pub(crate) fn incr_num_following(&self, user_id: i64, delta: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE accounts SET num_following = num_following + ?1 WHERE id = ?2",
            params![delta, user_id],
        )?;
        Ok(())
    }

    // Repository operations

    pub(crate) fn insert_repository(
        &self,
        owner_id: i64,
        name: &str,
        is_private: bool,
    ) -> Result<Repository> {
        let now = format_datetime(&Utc::now());
        self.conn.execute(
            "INSERT INTO repositories (owner_id, name, lower_name, is_private, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![owner_id, name, name.to_lowercase(), is_private, now],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_repository(id)?.ok_or(Error::RepositoryNotFound(id))
    }

    pub fn get_repository(&self, id: i64) -> Result<Option<Repository>> {
        self.conn
            .query_row(
                &format!("SELECT {REPO_COLS} FROM repositories WHERE id = ?1"),
                params![id],
                repo_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    pub fn repositories_of(&self, owner_id: i64) -> Result<Vec<Repository>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REPO_COLS} FROM repositories WHERE owner_id = ?1 ORDER BY lower_name"
        ))?;

        let rows = stmt.query_map(params![owner_id], repo_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    pub(crate) fn set_repository_private(&self, repo_id: i64, is_private: bool) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE repositories SET is_private = ?1, updated_at = ?2 WHERE id = ?3",
            params![is_private, format_datetime(&Utc::now()), repo_id],
        )?;

        if rows == 0 {
            return Err(Error::RepositoryNotFound(repo_id));
        }
        Ok(())
    }

    pub(crate) fn incr_repo_watches(&self, repo_id: i64, delta: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE repositories SET num_watches = num_watches + ?1 WHERE id = ?2",
            params![delta, repo_id],
        )?;
        Ok(())
    }

    pub(crate) fn incr_repo_stars(&self, repo_id: i64, delta: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE repositories SET num_stars = num_stars + ?1 WHERE id = ?2",
            params![delta, repo_id],
        )?;
        Ok(())
    }

    pub(crate) fn insert_repo_unit(&self, repo_id: i64, unit: UnitType) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO repo_units (repo_id, unit_type) VALUES (?1, ?2)",
            params![repo_id, i64::from(unit)],
        )?;
        Ok(())
    }

    pub fn repo_unit_types(&self, repo_id: i64) -> Result<Vec<UnitType>> {
        let mut stmt = self.conn.prepare(
            "SELECT unit_type FROM repo_units WHERE repo_id = ?1 ORDER BY unit_type",
        )?;

        let rows = stmt.query_map(params![repo_id], |row| row.get::<_, i64>(0))?;
        let mut units = Vec::new();
        for row in rows {
            if let Some(unit) = UnitType::from_i64(row?) {
                units.push(unit);
            }
        }
        Ok(units)
    }

    // Access projection operations.
    // Writes are crate-private: only the rebuild functions in access.rs
    // (and the documented collaboration mode patch) may touch the table.

    pub fn get_access(&self, user_id: i64, repo_id: i64) -> Result<Option<Access>> {
        self.conn
            .query_row(
                "SELECT user_id, repo_id, mode FROM accesses WHERE user_id = ?1 AND repo_id = ?2",
                params![user_id, repo_id],
                |row| {
                    Ok(Access {
                        user_id: row.get(0)?,
                        repo_id: row.get(1)?,
                        mode: AccessMode::from(row.get::<_, i64>(2)?),
                    })
                },
            )
            .optional()
            .map_err(Error::from)
    }

    pub fn repo_accesses(&self, repo_id: i64) -> Result<Vec<Access>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, repo_id, mode FROM accesses WHERE repo_id = ?1 ORDER BY user_id",
        )?;

        let rows = stmt.query_map(params![repo_id], |row| {
            Ok(Access {
                user_id: row.get(0)?,
                repo_id: row.get(1)?,
                mode: AccessMode::from(row.get::<_, i64>(2)?),
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    pub(crate) fn delete_repo_accesses(&self, repo_id: i64) -> Result<usize> {
        self.conn
            .execute("DELETE FROM accesses WHERE repo_id = ?1", params![repo_id])
            .map_err(Error::from)
    }

    pub(crate) fn insert_access(&self, user_id: i64, repo_id: i64, mode: AccessMode) -> Result<()> {
        self.conn.execute(
            "INSERT INTO accesses (user_id, repo_id, mode) VALUES (?1, ?2, ?3)",
            params![user_id, repo_id, i64::from(mode)],
        )?;
        Ok(())
    }

    pub(crate) fn delete_access(&self, user_id: i64, repo_id: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM accesses WHERE user_id = ?1 AND repo_id = ?2",
            params![user_id, repo_id],
        )?;
        Ok(rows > 0)
    }

    pub(crate) fn update_access_mode(
        &self,
        user_id: i64,
        repo_id: i64,
        mode: AccessMode,
    ) -> Result<usize> {
        self.conn
            .execute(
                "UPDATE accesses SET mode = ?1 WHERE user_id = ?2 AND repo_id = ?3",
                params![i64::from(mode), user_id, repo_id],
            )
            .map_err(Error::from)
    }

    // Collaboration operations

    pub fn get_collaboration(&self, repo_id: i64, user_id: i64) -> Result<Option<Collaboration>> {
        self.conn
            .query_row(
                "SELECT repo_id, user_id, mode, created_at
                 FROM collaborations WHERE repo_id = ?1 AND user_id = ?2",
                params![repo_id, user_id],
                |row| {
                    Ok(Collaboration {
                        repo_id: row.get(0)?,
                        user_id: row.get(1)?,
                        mode: AccessMode::from(row.get::<_, i64>(2)?),
                        created_at: parse_datetime(&row.get::<_, String>(3)?),
                    })
                },
            )
            .optional()
            .map_err(Error::from)
    }

    pub fn is_collaborator(&self, repo_id: i64, user_id: i64) -> Result<bool> {
        Ok(self.get_collaboration(repo_id, user_id)?.is_some())
    }

    pub fn collaborations_for_repo(&self, repo_id: i64) -> Result<Vec<Collaboration>> {
        let mut stmt = self.conn.prepare(
            "SELECT repo_id, user_id, mode, created_at
             FROM collaborations WHERE repo_id = ?1 ORDER BY user_id",
        )?;

        let rows = stmt.query_map(params![repo_id], |row| {
            Ok(Collaboration {
                repo_id: row.get(0)?,
                user_id: row.get(1)?,
                mode: AccessMode::from(row.get::<_, i64>(2)?),
                created_at: parse_datetime(&row.get::<_, String>(3)?),
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    pub(crate) fn insert_collaboration(
        &self,
        repo_id: i64,
        user_id: i64,
        mode: AccessMode,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO collaborations (repo_id, user_id, mode, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![repo_id, user_id, i64::from(mode), format_datetime(&Utc::now())],
        )?;
        Ok(())
    }

    pub(crate) fn update_collaboration_mode(
        &self,
        repo_id: i64,
        user_id: i64,
        mode: AccessMode,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE collaborations SET mode = ?1 WHERE repo_id = ?2 AND user_id = ?3",
            params![i64::from(mode), repo_id, user_id],
        )?;
        Ok(())
    }

    pub(crate) fn delete_collaboration_row(&self, repo_id: i64, user_id: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM collaborations WHERE repo_id = ?1 AND user_id = ?2",
            params![repo_id, user_id],
        )?;
        Ok(rows > 0)
    }

    // Team operations

    pub(crate) fn insert_team(
        &self,
        org_id: i64,
        name: &str,
        description: Option<&str>,
        authorize: AccessMode,
        includes_all_repositories: bool,
    ) -> Result<Team> {
        self.conn.execute(
            "INSERT INTO teams (org_id, name, lower_name, description, authorize, includes_all_repositories)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                org_id,
                name,
                name.to_lowercase(),
                description,
                i64::from(authorize),
                includes_all_repositories,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_team_by_id(id)?.ok_or(Error::TeamNotFound)
    }

    pub fn get_team_by_id(&self, team_id: i64) -> Result<Option<Team>> {
        self.conn
            .query_row(
                &format!("SELECT {TEAM_COLS} FROM teams WHERE id = ?1"),
                params![team_id],
                team_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    pub fn get_team(&self, org_id: i64, name: &str) -> Result<Option<Team>> {
        self.conn
            .query_row(
                &format!("SELECT {TEAM_COLS} FROM teams WHERE org_id = ?1 AND lower_name = ?2"),
                params![org_id, name.to_lowercase()],
                team_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    pub(crate) fn team_name_taken(
        &self,
        org_id: i64,
        name: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM teams
             WHERE org_id = ?1 AND lower_name = ?2 AND id != ?3",
            params![org_id, name.to_lowercase(), exclude_id.unwrap_or(0)],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub(crate) fn update_team_row(&self, team: &Team) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE teams
             SET name = ?1, lower_name = ?2, description = ?3, authorize = ?4,
                 includes_all_repositories = ?5
             WHERE id = ?6",
            params![
                team.name,
                team.name.to_lowercase(),
                team.description,
                i64::from(team.authorize),
                team.includes_all_repositories,
                team.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::TeamNotFound);
        }
        Ok(())
    }

    pub(crate) fn delete_team_row(&self, team_id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM teams WHERE id = ?1", params![team_id])?;
        Ok(())
    }

    pub fn teams_of_org(&self, org_id: i64) -> Result<Vec<Team>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TEAM_COLS} FROM teams WHERE org_id = ?1 ORDER BY lower_name"
        ))?;

        let rows = stmt.query_map(params![org_id], team_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    /// Teams of the organization the user is a member of.
    pub fn user_org_teams(&self, org_id: i64, user_id: i64) -> Result<Vec<Team>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.org_id, t.name, t.description, t.authorize,
                    t.includes_all_repositories, t.num_repos, t.num_members
             FROM teams t
             JOIN team_users tu ON tu.team_id = t.id
             WHERE t.org_id = ?1 AND tu.user_id = ?2
             ORDER BY t.lower_name",
        )?;

        let rows = stmt.query_map(params![org_id, user_id], team_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    pub fn team_member_ids(&self, team_id: i64) -> Result<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT user_id FROM team_users WHERE team_id = ?1 ORDER BY user_id")?;

        let rows = stmt.query_map(params![team_id], |row| row.get(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    pub fn is_team_member(&self, team_id: i64, user_id: i64) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM team_users WHERE team_id = ?1 AND user_id = ?2",
            params![team_id, user_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub(crate) fn insert_team_user(&self, team_id: i64, org_id: i64, user_id: i64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO team_users (team_id, org_id, user_id) VALUES (?1, ?2, ?3)",
            params![team_id, org_id, user_id],
        )?;
        Ok(())
    }

    pub(crate) fn delete_team_user(&self, team_id: i64, user_id: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM team_users WHERE team_id = ?1 AND user_id = ?2",
            params![team_id, user_id],
        )?;
        Ok(rows > 0)
    }

    pub(crate) fn delete_team_users(&self, team_id: i64) -> Result<usize> {
        self.conn
            .execute("DELETE FROM team_users WHERE team_id = ?1", params![team_id])
            .map_err(Error::from)
    }

    pub(crate) fn user_team_count_in_org(&self, org_id: i64, user_id: i64) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM team_users WHERE org_id = ?1 AND user_id = ?2",
                params![org_id, user_id],
                |row| row.get(0),
            )
            .map_err(Error::from)
    }

    pub fn has_team_repo(&self, team_id: i64, repo_id: i64) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM team_repos WHERE team_id = ?1 AND repo_id = ?2",
            params![team_id, repo_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub(crate) fn insert_team_repo(&self, team_id: i64, org_id: i64, repo_id: i64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO team_repos (team_id, org_id, repo_id) VALUES (?1, ?2, ?3)",
            params![team_id, org_id, repo_id],
        )?;
        Ok(())
    }

    pub(crate) fn delete_team_repo(&self, team_id: i64, repo_id: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM team_repos WHERE team_id = ?1 AND repo_id = ?2",
            params![team_id, repo_id],
        )?;
        Ok(rows > 0)
    }

    pub(crate) fn delete_team_repos(&self, team_id: i64) -> Result<usize> {
        self.conn
            .execute("DELETE FROM team_repos WHERE team_id = ?1", params![team_id])
            .map_err(Error::from)
    }

    pub fn team_repo_ids(&self, team_id: i64) -> Result<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT repo_id FROM team_repos WHERE team_id = ?1 ORDER BY repo_id")?;

        let rows = stmt.query_map(params![team_id], |row| row.get(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    pub(crate) fn replace_team_units(&self, team_id: i64, units: &[UnitType]) -> Result<()> {
        self.conn
            .execute("DELETE FROM team_units WHERE team_id = ?1", params![team_id])?;

        for unit in units {
            self.conn.execute(
                "INSERT INTO team_units (team_id, unit_type) VALUES (?1, ?2)",
                params![team_id, i64::from(*unit)],
            )?;
        }
        Ok(())
    }

    pub(crate) fn delete_team_units(&self, team_id: i64) -> Result<usize> {
        self.conn
            .execute("DELETE FROM team_units WHERE team_id = ?1", params![team_id])
            .map_err(Error::from)
    }

    pub fn team_unit_types(&self, team_id: i64) -> Result<Vec<UnitType>> {
        let mut stmt = self.conn.prepare(
            "SELECT unit_type FROM team_units WHERE team_id = ?1 ORDER BY unit_type",
        )?;

        let rows = stmt.query_map(params![team_id], |row| row.get::<_, i64>(0))?;
        let mut units = Vec::new();
        for row in rows {
            if let Some(unit) = UnitType::from_i64(row?) {
                units.push(unit);
            }
        }
        Ok(units)
    }

    pub fn team_has_unit(&self, team_id: i64, unit: UnitType) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM team_units WHERE team_id = ?1 AND unit_type = ?2",
            params![team_id, i64::from(unit)],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub(crate) fn incr_team_members(&self, team_id: i64, delta: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE teams SET num_members = num_members + ?1 WHERE id = ?2",
            params![delta, team_id],
        )?;
        Ok(())
    }

    pub(crate) fn incr_team_repos(&self, team_id: i64, delta: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE teams SET num_repos = num_repos + ?1 WHERE id = ?2",
            params![delta, team_id],
        )?;
        Ok(())
    }

    // Organization membership operations

    pub fn get_org_user(&self, org_id: i64, user_id: i64) -> Result<Option<OrgUser>> {
        self.conn
            .query_row(
                "SELECT org_id, user_id, is_owner, num_teams
                 FROM org_users WHERE org_id = ?1 AND user_id = ?2",
                params![org_id, user_id],
                |row| {
                    Ok(OrgUser {
                        org_id: row.get(0)?,
                        user_id: row.get(1)?,
                        is_owner: row.get(2)?,
                        num_teams: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(Error::from)
    }

    pub fn is_org_member(&self, org_id: i64, user_id: i64) -> Result<bool> {
        Ok(self.get_org_user(org_id, user_id)?.is_some())
    }

    pub(crate) fn insert_org_user(&self, org_id: i64, user_id: i64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO org_users (org_id, user_id) VALUES (?1, ?2)",
            params![org_id, user_id],
        )?;
        Ok(())
    }

    pub(crate) fn update_org_user(&self, ou: &OrgUser) -> Result<()> {
        self.conn.execute(
            "UPDATE org_users SET is_owner = ?1, num_teams = ?2
             WHERE org_id = ?3 AND user_id = ?4",
            params![ou.is_owner, ou.num_teams, ou.org_id, ou.user_id],
        )?;
        Ok(())
    }

    pub(crate) fn delete_org_user(&self, org_id: i64, user_id: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM org_users WHERE org_id = ?1 AND user_id = ?2",
            params![org_id, user_id],
        )?;
        Ok(rows > 0)
    }

    // Watch, star, follow and subscription operations

    pub fn is_watching(&self, user_id: i64, repo_id: i64) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM watches WHERE user_id = ?1 AND repo_id = ?2",
            params![user_id, repo_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub(crate) fn insert_watch(&self, user_id: i64, repo_id: i64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO watches (user_id, repo_id) VALUES (?1, ?2)",
            params![user_id, repo_id],
        )?;
        Ok(())
    }

    pub(crate) fn delete_watch(&self, user_id: i64, repo_id: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM watches WHERE user_id = ?1 AND repo_id = ?2",
            params![user_id, repo_id],
        )?;
        Ok(rows > 0)
    }

    pub fn watcher_ids(&self, repo_id: i64) -> Result<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT user_id FROM watches WHERE repo_id = ?1 ORDER BY user_id")?;

        let rows = stmt.query_map(params![repo_id], |row| row.get(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    pub fn is_starring(&self, user_id: i64, repo_id: i64) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM stars WHERE user_id = ?1 AND repo_id = ?2",
            params![user_id, repo_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub(crate) fn insert_star(&self, user_id: i64, repo_id: i64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO stars (user_id, repo_id) VALUES (?1, ?2)",
            params![user_id, repo_id],
        )?;
        Ok(())
    }

    pub(crate) fn delete_star(&self, user_id: i64, repo_id: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM stars WHERE user_id = ?1 AND repo_id = ?2",
            params![user_id, repo_id],
        )?;
        Ok(rows > 0)
    }

    pub fn is_following(&self, user_id: i64, follow_id: i64) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM follows WHERE user_id = ?1 AND follow_id = ?2",
            params![user_id, follow_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub(crate) fn insert_follow(&self, user_id: i64, follow_id: i64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO follows (user_id, follow_id) VALUES (?1, ?2)",
            params![user_id, follow_id],
        )?;
        Ok(())
    }

    pub(crate) fn delete_follow(&self, user_id: i64, follow_id: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM follows WHERE user_id = ?1 AND follow_id = ?2",
            params![user_id, follow_id],
        )?;
        Ok(rows > 0)
    }

    pub(crate) fn insert_issue_subscription(
        &self,
        user_id: i64,
        repo_id: i64,
        issue_index: i64,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO issue_subscriptions (user_id, repo_id, issue_index)
             VALUES (?1, ?2, ?3)",
            params![user_id, repo_id, issue_index],
        )?;
        Ok(())
    }

    pub(crate) fn delete_repo_issue_subscriptions(
        &self,
        user_id: i64,
        repo_id: i64,
    ) -> Result<usize> {
        self.conn
            .execute(
                "DELETE FROM issue_subscriptions WHERE user_id = ?1 AND repo_id = ?2",
                params![user_id, repo_id],
            )
            .map_err(Error::from)
    }

    pub fn issue_subscription_count(&self, user_id: i64, repo_id: i64) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM issue_subscriptions WHERE user_id = ?1 AND repo_id = ?2",
                params![user_id, repo_id],
                |row| row.get(0),
            )
            .map_err(Error::from)
    }

    // Consistency repair: each statement corrects one class of drifted
    // counter in bulk and reports how many rows needed fixing.

    pub(crate) fn repair_repo_watch_counts(&self) -> Result<usize> {
        self.conn
            .execute(
                "UPDATE repositories SET num_watches =
                   (SELECT COUNT(*) FROM watches WHERE watches.repo_id = repositories.id)
                 WHERE num_watches !=
                   (SELECT COUNT(*) FROM watches WHERE watches.repo_id = repositories.id)",
                [],
            )
            .map_err(Error::from)
    }

    pub(crate) fn repair_repo_star_counts(&self) -> Result<usize> {
        self.conn
            .execute(
                "UPDATE repositories SET num_stars =
                   (SELECT COUNT(*) FROM stars WHERE stars.repo_id = repositories.id)
                 WHERE num_stars !=
                   (SELECT COUNT(*) FROM stars WHERE stars.repo_id = repositories.id)",
                [],
            )
            .map_err(Error::from)
    }

    pub(crate) fn repair_account_repo_counts(&self) -> Result<usize> {
        self.conn
            .execute(
                "UPDATE accounts SET num_repos =
                   (SELECT COUNT(*) FROM repositories WHERE repositories.owner_id = accounts.id)
                 WHERE num_repos !=
                   (SELECT COUNT(*) FROM repositories WHERE repositories.owner_id = accounts.id)",
                [],
            )
            .map_err(Error::from)
    }

    pub(crate) fn repair_account_star_counts(&self) -> Result<usize> {
        self.conn
            .execute(
                "UPDATE accounts SET num_stars =
                   (SELECT COUNT(*) FROM stars WHERE stars.user_id = accounts.id)
                 WHERE kind = 0 AND num_stars !=
                   (SELECT COUNT(*) FROM stars WHERE stars.user_id = accounts.id)",
                [],
            )
            .map_err(Error::from)
    }

    pub(crate) fn repair_team_member_counts(&self) -> Result<usize> {
        self.conn
            .execute(
                "UPDATE teams SET num_members =
                   (SELECT COUNT(*) FROM team_users WHERE team_users.team_id = teams.id)
                 WHERE num_members !=
                   (SELECT COUNT(*) FROM team_users WHERE team_users.team_id = teams.id)",
                [],
            )
            .map_err(Error::from)
    }

    pub(crate) fn repair_team_repo_counts(&self) -> Result<usize> {
        self.conn
            .execute(
                "UPDATE teams SET num_repos =
                   (SELECT COUNT(*) FROM team_repos WHERE team_repos.team_id = teams.id)
                 WHERE num_repos !=
                   (SELECT COUNT(*) FROM team_repos WHERE team_repos.team_id = teams.id)",
                [],
            )
            .map_err(Error::from)
    }

    pub(crate) fn repair_org_team_counts(&self) -> Result<usize> {
        self.conn
            .execute(
                "UPDATE accounts SET num_teams =
                   (SELECT COUNT(*) FROM teams WHERE teams.org_id = accounts.id)
                 WHERE kind = 1 AND num_teams !=
                   (SELECT COUNT(*) FROM teams WHERE teams.org_id = accounts.id)",
                [],
            )
            .map_err(Error::from)
    }

    pub(crate) fn repair_org_member_counts(&self) -> Result<usize> {
        self.conn
            .execute(
                "UPDATE accounts SET num_members =
                   (SELECT COUNT(*) FROM org_users WHERE org_users.org_id = accounts.id)
                 WHERE kind = 1 AND num_members !=
                   (SELECT COUNT(*) FROM org_users WHERE org_users.org_id = accounts.id)",
                [],
            )
            .map_err(Error::from)
    }

    pub(crate) fn repair_org_user_team_counts(&self) -> Result<usize> {
        self.conn
            .execute(
                "UPDATE org_users SET num_teams =
                   (SELECT COUNT(*) FROM team_users
                    WHERE team_users.org_id = org_users.org_id
                      AND team_users.user_id = org_users.user_id)
                 WHERE num_teams !=
                   (SELECT COUNT(*) FROM team_users
                    WHERE team_users.org_id = org_users.org_id
                      AND team_users.user_id = org_users.user_id)",
                [],
            )
            .map_err(Error::from)
    }

    pub(crate) fn delete_orphan_accesses(&self) -> Result<usize> {
        self.conn
            .execute(
                "DELETE FROM accesses
                 WHERE repo_id NOT IN (SELECT id FROM repositories)",
                [],
            )
            .map_err(Error::from)
    }
}
