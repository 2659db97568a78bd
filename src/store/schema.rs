// src/store/schema.rs

/// Tables used by [`super::SqliteStore`].
///
/// `benchmark_runs.config_id` has no foreign key: a
/// configuration deleted while a run is in flight leaves the run's terminal
/// write pointing at an orphaned id.
pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS benchmark_configs (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id       INTEGER NOT NULL,
    name          TEXT    NOT NULL,
    api_url       TEXT    NOT NULL,
    timeout_secs  INTEGER NOT NULL DEFAULT 120,
    num_samples   INTEGER NOT NULL DEFAULT 50,
    tasks_json    TEXT    NOT NULL,
    created_at    TEXT    NOT NULL,
    updated_at    TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_configs_user ON benchmark_configs(user_id);

CREATE TABLE IF NOT EXISTS benchmark_runs (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    config_id      INTEGER NOT NULL,
    user_id        INTEGER NOT NULL,
    status         TEXT    NOT NULL DEFAULT 'pending'
                   CHECK (status IN ('pending', 'running', 'completed', 'failed')),
    results_json   TEXT,
    error_message  TEXT,
    started_at     TEXT,
    completed_at   TEXT,
    created_at     TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_runs_user ON benchmark_runs(user_id);
CREATE INDEX IF NOT EXISTS idx_runs_config ON benchmark_runs(config_id);

CREATE TABLE IF NOT EXISTS user_roles (
    user_id  INTEGER PRIMARY KEY,
    role     TEXT    NOT NULL CHECK (role IN ('user', 'admin'))
);
"#;
