// src/store/sqlite.rs

use std::error::Error as StdError;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::configuration::{BenchmarkConfiguration, ConfigurationUpdate, NewConfiguration};
use crate::errors::{BenchError, Result};
use crate::store::{schema, ConfigurationStore, RoleStore, RunStore};
use crate::types::{ConfigId, Role, RunId, RunRecord, RunStatus, RunUpdate, UserId};

const RUN_COLUMNS: &str = "id, config_id, user_id, status, results_json, error_message, \
     started_at, completed_at, created_at";

const CONFIG_COLUMNS: &str = "id, user_id, name, api_url, timeout_secs, num_samples, \
     tasks_json, created_at, updated_at";

/// SQLite-backed store.
///
/// One connection behind a mutex; every write is committed before the call
/// returns.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "opening sqlite store");
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(schema::DDL)?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| BenchError::StoreUnavailable("sqlite connection lock poisoned".to_string()))
    }

    fn fetch_configuration(
        conn: &Connection,
        id: ConfigId,
    ) -> Result<Option<BenchmarkConfiguration>> {
        let sql = format!("SELECT {CONFIG_COLUMNS} FROM benchmark_configs WHERE id = ?1");
        let config = conn
            .query_row(&sql, params![id], config_from_row)
            .optional()?;
        Ok(config)
    }

    fn fetch_run(conn: &Connection, id: RunId) -> Result<Option<RunRecord>> {
        let sql = format!("SELECT {RUN_COLUMNS} FROM benchmark_runs WHERE id = ?1");
        let run = conn.query_row(&sql, params![id], run_from_row).optional()?;
        Ok(run)
    }

    fn query_runs(&self, filter_column: &str, value: i64) -> Result<Vec<RunRecord>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {RUN_COLUMNS} FROM benchmark_runs WHERE {filter_column} = ?1 \
             ORDER BY created_at DESC, id DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![value], run_from_row)?;

        let mut runs = Vec::new();
        for run in rows {
            runs.push(run?);
        }
        Ok(runs)
    }
}

impl RunStore for SqliteStore {
    fn create_run(&self, config_id: ConfigId, owner: UserId) -> Result<RunRecord> {
        let conn = self.conn()?;
        let now = to_sql_time(Utc::now());
        conn.execute(
            "INSERT INTO benchmark_runs (config_id, user_id, status, started_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![config_id, owner, RunStatus::Pending.as_str(), now],
        )?;
        let id = conn.last_insert_rowid();

        Self::fetch_run(&conn, id)?.ok_or_else(|| BenchError::run_not_found(id))
    }

    fn update_run(&self, id: RunId, update: RunUpdate) -> Result<()> {
        let results_json = update
            .results
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let completed_at = update.completed_at.map(to_sql_time);

        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE benchmark_runs
             SET status        = ?1,
                 results_json  = COALESCE(?2, results_json),
                 error_message = COALESCE(?3, error_message),
                 completed_at  = COALESCE(?4, completed_at)
             WHERE id = ?5",
            params![
                update.status.as_str(),
                results_json,
                update.error_message,
                completed_at,
                id
            ],
        )?;

        if changed == 0 {
            return Err(BenchError::run_not_found(id));
        }
        Ok(())
    }

    fn get_run(&self, id: RunId) -> Result<Option<RunRecord>> {
        let conn = self.conn()?;
        Self::fetch_run(&conn, id)
    }

    fn list_runs_by_owner(&self, owner: UserId) -> Result<Vec<RunRecord>> {
        self.query_runs("user_id", owner)
    }

    fn list_runs_by_configuration(&self, config_id: ConfigId) -> Result<Vec<RunRecord>> {
        self.query_runs("config_id", config_id)
    }
}

impl ConfigurationStore for SqliteStore {
    fn create_configuration(
        &self,
        owner: UserId,
        config: &NewConfiguration,
    ) -> Result<BenchmarkConfiguration> {
        let tasks_json = serde_json::to_string(&config.tasks)?;
        let now = to_sql_time(Utc::now());

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO benchmark_configs
                 (user_id, name, api_url, timeout_secs, num_samples, tasks_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                owner,
                config.name,
                config.api_url,
                config.timeout_secs,
                config.num_samples,
                tasks_json,
                now
            ],
        )?;
        let id = conn.last_insert_rowid();

        Self::fetch_configuration(&conn, id)?.ok_or_else(|| BenchError::configuration_not_found(id))
    }

    fn get_configuration(&self, id: ConfigId) -> Result<Option<BenchmarkConfiguration>> {
        let conn = self.conn()?;
        Self::fetch_configuration(&conn, id)
    }

    fn list_configurations(&self, owner: UserId) -> Result<Vec<BenchmarkConfiguration>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {CONFIG_COLUMNS} FROM benchmark_configs WHERE user_id = ?1 \
             ORDER BY created_at DESC, id DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![owner], config_from_row)?;

        let mut configs = Vec::new();
        for config in rows {
            configs.push(config?);
        }
        Ok(configs)
    }

    fn update_configuration(&self, id: ConfigId, update: &ConfigurationUpdate) -> Result<()> {
        let conn = self.conn()?;
        let mut config =
            Self::fetch_configuration(&conn, id)?.ok_or_else(|| BenchError::configuration_not_found(id))?;
        update.apply_to(&mut config, Utc::now());

        let tasks_json = serde_json::to_string(&config.tasks)?;
        conn.execute(
            "UPDATE benchmark_configs
             SET name = ?1, api_url = ?2, timeout_secs = ?3, num_samples = ?4,
                 tasks_json = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                config.name,
                config.api_url,
                config.timeout_secs,
                config.num_samples,
                tasks_json,
                to_sql_time(config.updated_at),
                id
            ],
        )?;
        Ok(())
    }

    fn delete_configuration(&self, id: ConfigId) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM benchmark_configs WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(BenchError::configuration_not_found(id));
        }
        Ok(())
    }
}

impl RoleStore for SqliteStore {
    fn assign_role(&self, user: UserId, role: Role) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO user_roles (user_id, role) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET role = excluded.role",
            params![user, role.as_str()],
        )?;
        Ok(())
    }

    fn role_of(&self, user: UserId) -> Result<Option<Role>> {
        let conn = self.conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT role FROM user_roles WHERE user_id = ?1",
                params![user],
                |row| row.get(0),
            )
            .optional()?;

        raw.map(|s| {
            s.parse::<Role>()
                .map_err(|e| conversion_error(0, Type::Text, e.into()))
        })
        .transpose()
        .map_err(BenchError::from)
    }
}

fn to_sql_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(
    idx: usize,
    ty: Type,
    err: Box<dyn StdError + Send + Sync>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, err)
}

fn time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, Type::Text, Box::new(e)))
}

fn optional_time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_error(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    let status_raw: String = row.get(3)?;
    let status = status_raw
        .parse::<RunStatus>()
        .map_err(|e| conversion_error(3, Type::Text, e.into()))?;

    let results_raw: Option<String> = row.get(4)?;
    let results = results_raw
        .map(|s| serde_json::from_str::<serde_json::Value>(&s))
        .transpose()
        .map_err(|e| conversion_error(4, Type::Text, Box::new(e)))?;

    Ok(RunRecord {
        id: row.get(0)?,
        config_id: row.get(1)?,
        user_id: row.get(2)?,
        status,
        results,
        error_message: row.get(5)?,
        started_at: optional_time_column(row, 6)?,
        completed_at: optional_time_column(row, 7)?,
        created_at: time_column(row, 8)?,
    })
}

fn config_from_row(row: &Row<'_>) -> rusqlite::Result<BenchmarkConfiguration> {
    let tasks_raw: String = row.get(6)?;
    let tasks = serde_json::from_str::<Vec<String>>(&tasks_raw)
        .map_err(|e| conversion_error(6, Type::Text, Box::new(e)))?;

    Ok(BenchmarkConfiguration {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        api_url: row.get(3)?,
        timeout_secs: row.get(4)?,
        num_samples: row.get(5)?,
        tasks,
        created_at: time_column(row, 7)?,
        updated_at: time_column(row, 8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> SqliteStore {
        let store = SqliteStore::memory().expect("in-memory sqlite");
        store.init_schema().expect("schema");
        store
    }

    fn new_config() -> NewConfiguration {
        NewConfiguration {
            name: "gpt".to_string(),
            api_url: "https://api.example.com".to_string(),
            timeout_secs: 120,
            num_samples: 10,
            tasks: vec!["hellaswag".to_string(), "arc_easy".to_string()],
        }
    }

    #[test]
    fn created_run_is_pending_with_start_time() {
        let store = store();
        let run = store.create_run(3, 9).unwrap();
        assert_eq!(run.status, RunStatus::Pending);
        assert_eq!(run.config_id, 3);
        assert_eq!(run.user_id, 9);
        assert!(run.started_at.is_some());
        assert!(run.completed_at.is_none());
        assert!(run.results.is_none() && run.error_message.is_none());
    }

    #[test]
    fn partial_update_keeps_untouched_columns() {
        let store = store();
        let run = store.create_run(1, 1).unwrap();

        store.update_run(run.id, RunUpdate::running()).unwrap();
        let at = Utc::now();
        store
            .update_run(run.id, RunUpdate::completed(json!({"hellaswag": {"acc": 0.42}}), at))
            .unwrap();

        let stored = store.get_run(run.id).unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::Completed);
        assert_eq!(stored.results, Some(json!({"hellaswag": {"acc": 0.42}})));
        assert_eq!(stored.error_message, None);
        assert_eq!(stored.started_at, run.started_at);
        assert!(stored.completed_at.is_some());
    }

    #[test]
    fn updating_missing_run_is_not_found() {
        let store = store();
        assert!(matches!(
            store.update_run(42, RunUpdate::running()),
            Err(BenchError::NotFound(_))
        ));
    }

    #[test]
    fn configuration_round_trips_task_order() {
        let store = store();
        let created = store.create_configuration(5, &new_config()).unwrap();
        let fetched = store.get_configuration(created.id).unwrap().unwrap();
        assert_eq!(fetched.tasks, vec!["hellaswag", "arc_easy"]);
        assert_eq!(fetched.user_id, 5);
        assert_eq!(fetched, created);
    }

    #[test]
    fn configuration_update_and_delete() {
        let store = store();
        let created = store.create_configuration(5, &new_config()).unwrap();
        let update = ConfigurationUpdate {
            tasks: Some(vec!["truthfulqa_mc2".to_string()]),
            ..Default::default()
        };
        store.update_configuration(created.id, &update).unwrap();
        let fetched = store.get_configuration(created.id).unwrap().unwrap();
        assert_eq!(fetched.tasks, vec!["truthfulqa_mc2"]);
        assert_eq!(fetched.name, "gpt");

        store.delete_configuration(created.id).unwrap();
        assert!(store.get_configuration(created.id).unwrap().is_none());
        assert!(matches!(
            store.delete_configuration(created.id),
            Err(BenchError::NotFound(_))
        ));
    }

    #[test]
    fn runs_listed_newest_first_per_owner_and_configuration() {
        let store = store();
        let a = store.create_run(1, 10).unwrap();
        let b = store.create_run(2, 10).unwrap();
        let _other = store.create_run(1, 11).unwrap();

        let mine: Vec<_> = store.list_runs_by_owner(10).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(mine, vec![b.id, a.id]);

        let for_config: Vec<_> = store
            .list_runs_by_configuration(1)
            .unwrap()
            .iter()
            .map(|r| r.user_id)
            .collect();
        assert_eq!(for_config.len(), 2);
        assert!(for_config.contains(&10) && for_config.contains(&11));
    }

    #[test]
    fn role_assignment_is_upserted() {
        let store = store();
        assert_eq!(store.role_of(1).unwrap(), None);
        store.assign_role(1, Role::Admin).unwrap();
        assert_eq!(store.role_of(1).unwrap(), Some(Role::Admin));
        store.assign_role(1, Role::User).unwrap();
        assert_eq!(store.role_of(1).unwrap(), Some(Role::User));
    }
}
