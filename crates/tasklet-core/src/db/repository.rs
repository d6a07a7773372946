//! Task repository implementation

use crate::error::{Error, Result};
use crate::models::{Task, TaskId};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Rows that decode into a [`Task`]; everything else is invisible to reads
const VISIBLE: &str = "name IS NOT NULL AND description IS NOT NULL AND date IS NOT NULL";

/// Trait for task storage operations
pub trait TaskRepository {
    /// Insert a task with its own id; blank names and non-positive ids are rejected
    fn insert(&self, task: &Task) -> Result<()>;

    /// Insert a batch of tasks in one transaction (all or nothing)
    fn insert_many(&self, tasks: &[Task]) -> Result<()>;

    /// Get a task by ID
    fn get(&self, id: TaskId) -> Result<Option<Task>>;

    /// List all readable tasks in ascending id order
    fn list(&self) -> Result<Vec<Task>>;

    /// Ids of the readable tasks in ascending order
    fn ordered_ids(&self) -> Result<Vec<TaskId>>;

    /// Greatest stored id, if any
    fn max_id(&self) -> Result<Option<TaskId>>;

    /// Next assignable id: one past the greatest, or 1 when empty
    fn next_id(&self) -> Result<TaskId> {
        match self.max_id()? {
            None => Ok(TaskId::FIRST),
            Some(max) => max
                .next()
                .ok_or_else(|| Error::InvalidInput("task id space exhausted".into())),
        }
    }

    /// Exact, case-sensitive name lookup
    fn exists_by_name(&self, name: &str) -> Result<bool>;

    /// Replace every field of the task with the same id
    fn update(&self, task: &Task) -> Result<()>;

    /// Remove a task
    fn delete(&self, id: TaskId) -> Result<()>;

    /// Flip the completion flag and return the new value
    fn toggle_status(&self, id: TaskId) -> Result<bool>;

    /// Case-insensitive substring search over name and description
    fn search(&self, query: &str) -> Result<Vec<Task>>;
}

/// `SQLite` implementation of `TaskRepository`
pub struct SqliteTaskRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteTaskRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a task from a database row.
    ///
    /// The outer error is a query failure; the inner one marks a row with a
    /// missing required column.
    fn parse_task(row: &Row<'_>) -> rusqlite::Result<Result<Task>> {
        let id: i64 = row.get(0)?;
        let name: Option<String> = row.get(1)?;
        let description: Option<String> = row.get(2)?;
        let completed: bool = row.get::<_, i64>(3)? != 0;
        let date: Option<i64> = row.get(4)?;

        let decoded = match (name, description, date) {
            (None, _, _) => Err(Error::Decoding { id, column: "name" }),
            (_, None, _) => Err(Error::Decoding {
                id,
                column: "description",
            }),
            (_, _, None) => Err(Error::Decoding { id, column: "date" }),
            (Some(name), Some(description), Some(date)) => Ok(Task {
                id: TaskId::new(id),
                name,
                description,
                completed,
                date,
            }),
        };
        Ok(decoded)
    }

    /// Collect decodable rows, skipping the rest
    fn collect_tasks(rows: Vec<Result<Task>>) -> Vec<Task> {
        rows.into_iter()
            .filter_map(|decoded| match decoded {
                Ok(task) => Some(task),
                Err(error) => {
                    tracing::debug!("Skipping unreadable task row: {}", error);
                    None
                }
            })
            .collect()
    }

    fn validate(task: &Task) -> Result<()> {
        if !task.id.is_valid() {
            tracing::warn!("Rejected task with non-positive id {}", task.id);
            return Err(Error::InvalidInput(format!(
                "task id must be positive, got {}",
                task.id
            )));
        }
        if task.has_blank_name() {
            tracing::warn!("Rejected task {} with a blank name", task.id);
            return Err(Error::InvalidInput("task name cannot be empty".into()));
        }
        Ok(())
    }

    fn insert_row(conn: &Connection, task: &Task) -> Result<()> {
        conn.execute(
            "INSERT INTO tasks (id, name, description, status, date) VALUES (?, ?, ?, ?, ?)",
            params![
                task.id.get(),
                task.name,
                task.description,
                i32::from(task.completed),
                task.date
            ],
        )?;
        Ok(())
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn insert(&self, task: &Task) -> Result<()> {
        Self::validate(task)?;

        // Dropping an uncommitted transaction rolls it back
        let tx = self.conn.unchecked_transaction()?;
        Self::insert_row(&tx, task)?;
        tx.commit()?;
        Ok(())
    }

    fn insert_many(&self, tasks: &[Task]) -> Result<()> {
        tasks.iter().try_for_each(Self::validate)?;

        let tx = self.conn.unchecked_transaction()?;
        for task in tasks {
            Self::insert_row(&tx, task)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get(&self, id: TaskId) -> Result<Option<Task>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, description, status, date FROM tasks WHERE id = ?",
                params![id.get()],
                Self::parse_task,
            )
            .optional()?;

        row.transpose()
    }

    fn list(&self) -> Result<Vec<Task>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, description, status, date FROM tasks ORDER BY id ASC")?;

        let rows = stmt
            .query_map([], Self::parse_task)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Self::collect_tasks(rows))
    }

    fn ordered_ids(&self) -> Result<Vec<TaskId>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT id FROM tasks WHERE {VISIBLE} ORDER BY id ASC"))?;

        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0).map(TaskId::new))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(ids)
    }

    fn max_id(&self) -> Result<Option<TaskId>> {
        let max: Option<i64> = self
            .conn
            .query_row("SELECT MAX(id) FROM tasks", [], |row| row.get(0))?;
        Ok(max.map(TaskId::new))
    }

    fn exists_by_name(&self, name: &str) -> Result<bool> {
        let exists: bool = self.conn.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM tasks WHERE name = ? AND {VISIBLE})"),
            params![name],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn update(&self, task: &Task) -> Result<()> {
        Self::validate(task)?;

        let tx = self.conn.unchecked_transaction()?;
        let rows = tx.execute(
            "UPDATE tasks SET name = ?, description = ?, status = ?, date = ? WHERE id = ?",
            params![
                task.name,
                task.description,
                i32::from(task.completed),
                task.date,
                task.id.get()
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(task.id));
        }

        tx.commit()?;
        Ok(())
    }

    fn delete(&self, id: TaskId) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        let rows = tx.execute(
            &format!("DELETE FROM tasks WHERE id = ? AND {VISIBLE}"),
            params![id.get()],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(id));
        }

        tx.commit()?;
        Ok(())
    }

    fn toggle_status(&self, id: TaskId) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        let rows = tx.execute(
            &format!(
                "UPDATE tasks SET status = CASE status WHEN 0 THEN 1 ELSE 0 END WHERE id = ? AND {VISIBLE}"
            ),
            params![id.get()],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(id));
        }

        let completed: bool = tx.query_row(
            "SELECT status != 0 FROM tasks WHERE id = ?",
            params![id.get()],
            |row| row.get(0),
        )?;

        tx.commit()?;
        Ok(completed)
    }

    fn search(&self, query: &str) -> Result<Vec<Task>> {
        let query = query.trim();
        if query.is_empty() {
            return self.list();
        }

        let pattern = format!(
            "%{}%",
            query
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_")
        );

        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, status, date
             FROM tasks
             WHERE name LIKE ?1 ESCAPE '\\' OR description LIKE ?1 ESCAPE '\\'
             ORDER BY id ASC",
        )?;

        let rows = stmt
            .query_map(params![pattern], Self::parse_task)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Self::collect_tasks(rows))
    }
}
