/// SQL DDL for the registry database.
/// WAL mode + foreign keys enabled at connection time.
pub const SCHEMA_VERSION: u32 = 1;

pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS repositories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    phid TEXT NOT NULL UNIQUE,
    callsign TEXT UNIQUE,
    name TEXT NOT NULL,
    vcs TEXT NOT NULL,
    uuid TEXT,
    remote_uris TEXT NOT NULL DEFAULT '[]',
    tracked INTEGER NOT NULL DEFAULT 1,
    hosted INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS repository_summary (
    repository_id INTEGER PRIMARY KEY REFERENCES repositories(id),
    size INTEGER NOT NULL DEFAULT 0,
    last_commit_id INTEGER,
    epoch INTEGER
);

CREATE TABLE IF NOT EXISTS commits (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    repository_id INTEGER NOT NULL REFERENCES repositories(id),
    commit_identifier TEXT NOT NULL,
    epoch INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS repository_projects (
    repository_phid TEXT NOT NULL,
    project_phid TEXT NOT NULL,
    PRIMARY KEY (repository_phid, project_phid)
);

CREATE INDEX IF NOT EXISTS idx_repositories_name ON repositories(name);
CREATE INDEX IF NOT EXISTS idx_repositories_vcs ON repositories(vcs);
CREATE INDEX IF NOT EXISTS idx_commits_repository ON commits(repository_id, epoch);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);
"#;

pub const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
PRAGMA synchronous = NORMAL;
"#;
