pub const SCHEMA: &str = r#"
-- Users and organizations share one id space; kind discriminates.
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    lower_name TEXT NOT NULL UNIQUE,
    kind INTEGER NOT NULL DEFAULT 0,  -- 0 = user, 1 = organization

    -- User flags
    is_admin INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    prohibit_login INTEGER NOT NULL DEFAULT 0,
    is_restricted INTEGER NOT NULL DEFAULT 0,

    -- Organization visibility: 0 public, 1 limited, 2 private
    visibility INTEGER NOT NULL DEFAULT 0,

    -- Denormalized counters, kept honest by the repair job
    num_repos INTEGER NOT NULL DEFAULT 0,
    num_teams INTEGER NOT NULL DEFAULT 0,
    num_members INTEGER NOT NULL DEFAULT 0,
    num_stars INTEGER NOT NULL DEFAULT 0,
    num_followers INTEGER NOT NULL DEFAULT 0,
    num_following INTEGER NOT NULL DEFAULT 0,

    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS repositories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    lower_name TEXT NOT NULL,
    is_private INTEGER NOT NULL DEFAULT 0,

    num_watches INTEGER NOT NULL DEFAULT 0,
    num_stars INTEGER NOT NULL DEFAULT 0,

    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now')),

    UNIQUE(owner_id, lower_name)
);

-- Functional units a repository has enabled (issues, wiki, ...)
CREATE TABLE IF NOT EXISTS repo_units (
    repo_id INTEGER NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
    unit_type INTEGER NOT NULL,
    PRIMARY KEY (repo_id, unit_type)
);

-- The access projection: computed best mode per non-owner user.
-- Only the rebuild functions in access.rs may write here.
CREATE TABLE IF NOT EXISTS accesses (
    user_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    repo_id INTEGER NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
    mode INTEGER NOT NULL,
    PRIMARY KEY (user_id, repo_id)
);

-- Direct user <-> repository grants, independent of org structure
CREATE TABLE IF NOT EXISTS collaborations (
    repo_id INTEGER NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
    user_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    mode INTEGER NOT NULL DEFAULT 2,  -- write
    created_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (repo_id, user_id)
);

CREATE TABLE IF NOT EXISTS teams (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    org_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    lower_name TEXT NOT NULL,
    description TEXT,
    authorize INTEGER NOT NULL DEFAULT 1,
    includes_all_repositories INTEGER NOT NULL DEFAULT 0,
    num_repos INTEGER NOT NULL DEFAULT 0,
    num_members INTEGER NOT NULL DEFAULT 0,

    UNIQUE(org_id, lower_name)
);

CREATE TABLE IF NOT EXISTS team_users (
    team_id INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
    org_id INTEGER NOT NULL,
    user_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    PRIMARY KEY (team_id, user_id)
);

CREATE TABLE IF NOT EXISTS team_repos (
    team_id INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
    org_id INTEGER NOT NULL,
    repo_id INTEGER NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
    PRIMARY KEY (team_id, repo_id)
);

-- Units a team can access; no row means no access to that unit.
CREATE TABLE IF NOT EXISTS team_units (
    team_id INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
    unit_type INTEGER NOT NULL,
    PRIMARY KEY (team_id, unit_type)
);

CREATE TABLE IF NOT EXISTS org_users (
    org_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    user_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    is_owner INTEGER NOT NULL DEFAULT 0,
    num_teams INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (org_id, user_id)
);

-- Notification subscriptions
CREATE TABLE IF NOT EXISTS watches (
    user_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    repo_id INTEGER NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
    PRIMARY KEY (user_id, repo_id)
);

CREATE TABLE IF NOT EXISTS stars (
    user_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    repo_id INTEGER NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
    PRIMARY KEY (user_id, repo_id)
);

CREATE TABLE IF NOT EXISTS follows (
    user_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    follow_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    PRIMARY KEY (user_id, follow_id)
);

CREATE TABLE IF NOT EXISTS issue_subscriptions (
    user_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    repo_id INTEGER NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
    issue_index INTEGER NOT NULL,
    PRIMARY KEY (user_id, repo_id, issue_index)
);

-- Create indexes
CREATE INDEX IF NOT EXISTS idx_repositories_owner ON repositories(owner_id);
CREATE INDEX IF NOT EXISTS idx_accesses_repo ON accesses(repo_id);
CREATE INDEX IF NOT EXISTS idx_collaborations_user ON collaborations(user_id);
CREATE INDEX IF NOT EXISTS idx_teams_org ON teams(org_id);
CREATE INDEX IF NOT EXISTS idx_team_users_user ON team_users(user_id);
CREATE INDEX IF NOT EXISTS idx_team_users_org ON team_users(org_id);
CREATE INDEX IF NOT EXISTS idx_team_repos_repo ON team_repos(repo_id);
CREATE INDEX IF NOT EXISTS idx_org_users_user ON org_users(user_id);
CREATE INDEX IF NOT EXISTS idx_watches_repo ON watches(repo_id);
CREATE INDEX IF NOT EXISTS idx_stars_repo ON stars(repo_id);
CREATE INDEX IF NOT EXISTS idx_issue_subscriptions_repo ON issue_subscriptions(repo_id);
"#;
