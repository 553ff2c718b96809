//! SQLite-backed task store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};

use super::fire_time::fire_time_for;
use super::{AutoBookingTask, CreateTaskRequest, TaskError, TaskFilter, TaskState, TaskStore};

/// SQLite-backed task store.
pub struct SqliteTaskStore {
    conn: Mutex<Connection>,
}

impl SqliteTaskStore {
    /// Create a new SQLite task store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, TaskError> {
        let conn = Connection::open(path).map_err(|e| TaskError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite task store (useful for testing).
    pub fn in_memory() -> Result<Self, TaskError> {
        let conn = Connection::open_in_memory().map_err(|e| TaskError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), TaskError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                venue_id TEXT NOT NULL,
                account_id TEXT NOT NULL,
                target_date TEXT NOT NULL,
                time_slot TEXT NOT NULL,
                fire_time TEXT NOT NULL,
                state TEXT NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                version INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_fire_time ON tasks(fire_time);
            CREATE INDEX IF NOT EXISTS idx_tasks_account_id ON tasks(account_id);
            "#,
        )
        .map_err(|e| TaskError::Database(e.to_string()))?;

        Ok(())
    }

    const COLUMNS: &'static str = "id, venue_id, account_id, target_date, time_slot, fire_time, state, attempts, version, created_at, updated_at";

    fn build_where_clause(filter: &TaskFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref state) = filter.state {
            // The state type lives inside the state JSON blob.
            conditions.push("json_extract(state, '$.type') = ?");
            params.push(Box::new(state.clone()));
        }

        if let Some(ref account_id) = filter.account_id {
            conditions.push("account_id = ?");
            params.push(Box::new(account_id.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<AutoBookingTask> {
        let id: String = row.get(0)?;
        let venue_id: String = row.get(1)?;
        let account_id: String = row.get(2)?;
        let target_date_str: String = row.get(3)?;
        let time_slot: String = row.get(4)?;
        let fire_time_str: String = row.get(5)?;
        let state_json: String = row.get(6)?;
        let attempts: u32 = row.get(7)?;
        let version: i64 = row.get(8)?;
        let created_at_str: String = row.get(9)?;
        let updated_at_str: String = row.get(10)?;

        let target_date = NaiveDate::parse_from_str(&target_date_str, "%Y-%m-%d")
            .unwrap_or_else(|_| Utc::now().date_naive());

        // Timestamps are written by us in RFC 3339; parsing should not
        // fail on valid data.
        let fire_time = parse_timestamp(&fire_time_str);
        let created_at = parse_timestamp(&created_at_str);
        let updated_at = parse_timestamp(&updated_at_str);

        let state: TaskState = serde_json::from_str(&state_json).unwrap_or(TaskState::Pending);

        Ok(AutoBookingTask {
            id,
            venue_id,
            account_id,
            target_date,
            time_slot,
            fire_time,
            state,
            attempts,
            version,
            created_at,
            updated_at,
        })
    }

    fn get_locked(conn: &Connection, id: &str) -> Result<Option<AutoBookingTask>, TaskError> {
        let sql = format!("SELECT {} FROM tasks WHERE id = ?", Self::COLUMNS);
        let result = conn.query_row(&sql, params![id], Self::row_to_task);

        match result {
            Ok(task) => Ok(Some(task)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(TaskError::Database(e.to_string())),
        }
    }

    fn transition_locked(
        conn: &Connection,
        id: &str,
        from: &str,
        to: TaskState,
        operation: &str,
    ) -> Result<AutoBookingTask, TaskError> {
        let now = Utc::now();
        let state_json =
            serde_json::to_string(&to).map_err(|e| TaskError::Database(e.to_string()))?;

        // Single guarded UPDATE: the transition only lands if the stored
        // state type still matches `from`.
        let changed = conn
            .execute(
                "UPDATE tasks SET state = ?, version = version + 1, updated_at = ? \
                 WHERE id = ? AND json_extract(state, '$.type') = ?",
                params![state_json, now.to_rfc3339(), id, from],
            )
            .map_err(|e| TaskError::Database(e.to_string()))?;

        if changed == 0 {
            return match Self::get_locked(conn, id)? {
                Some(task) => Err(TaskError::Conflict {
                    task_id: id.to_string(),
                    current_state: task.state.state_type().to_string(),
                    operation: operation.to_string(),
                }),
                None => Err(TaskError::NotFound(id.to_string())),
            };
        }

        Self::get_locked(conn, id)?.ok_or_else(|| TaskError::NotFound(id.to_string()))
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl TaskStore for SqliteTaskStore {
    fn create(&self, request: CreateTaskRequest) -> Result<AutoBookingTask, TaskError> {
        let conn = self.conn.lock().unwrap();

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let state = TaskState::Pending;
        let fire_time = fire_time_for(request.target_date);

        let state_json =
            serde_json::to_string(&state).map_err(|e| TaskError::Database(e.to_string()))?;

        conn.execute(
            "INSERT INTO tasks (id, venue_id, account_id, target_date, time_slot, fire_time, state, attempts, version, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, 0, 0, ?, ?)",
            params![
                id,
                request.venue_id,
                request.account_id,
                request.target_date.format("%Y-%m-%d").to_string(),
                request.time_slot,
                fire_time.to_rfc3339(),
                state_json,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| TaskError::Database(e.to_string()))?;

        Ok(AutoBookingTask {
            id,
            venue_id: request.venue_id,
            account_id: request.account_id,
            target_date: request.target_date,
            time_slot: request.time_slot,
            fire_time,
            state,
            attempts: 0,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    fn get(&self, id: &str) -> Result<Option<AutoBookingTask>, TaskError> {
        let conn = self.conn.lock().unwrap();
        Self::get_locked(&conn, id)
    }

    fn list(&self, filter: &TaskFilter) -> Result<Vec<AutoBookingTask>, TaskError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!(
            "SELECT {} FROM tasks {} ORDER BY fire_time ASC, created_at ASC LIMIT ? OFFSET ?",
            Self::COLUMNS,
            where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| TaskError::Database(e.to_string()))?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_task)
            .map_err(|e| TaskError::Database(e.to_string()))?;

        let mut tasks = Vec::new();
        for row_result in rows {
            let task = row_result.map_err(|e| TaskError::Database(e.to_string()))?;
            tasks.push(task);
        }

        Ok(tasks)
    }

    fn count(&self, filter: &TaskFilter) -> Result<i64, TaskError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!("SELECT COUNT(*) FROM tasks {}", where_clause);

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let count: i64 = conn
            .query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| TaskError::Database(e.to_string()))?;

        Ok(count)
    }

    fn cancel(&self, id: &str) -> Result<AutoBookingTask, TaskError> {
        let conn = self.conn.lock().unwrap();
        Self::transition_locked(
            &conn,
            id,
            "pending",
            TaskState::Cancelled {
                cancelled_at: Utc::now(),
            },
            "cancel",
        )
    }

    fn transition(
        &self,
        id: &str,
        from: &str,
        to: TaskState,
    ) -> Result<AutoBookingTask, TaskError> {
        let conn = self.conn.lock().unwrap();
        Self::transition_locked(&conn, id, from, to, "transition")
    }

    fn record_attempt(&self, id: &str) -> Result<AutoBookingTask, TaskError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        let changed = conn
            .execute(
                "UPDATE tasks SET attempts = attempts + 1, version = version + 1, updated_at = ? \
                 WHERE id = ?",
                params![now.to_rfc3339(), id],
            )
            .map_err(|e| TaskError::Database(e.to_string()))?;

        if changed == 0 {
            return Err(TaskError::NotFound(id.to_string()));
        }

        Self::get_locked(&conn, id)?.ok_or_else(|| TaskError::NotFound(id.to_string()))
    }
}
