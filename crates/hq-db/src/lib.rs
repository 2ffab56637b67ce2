//! SQLite fact store for the hq time tracker.
//!
//! Provides persistence for facts, categories and activities using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` can be moved between threads but not shared without external
//! synchronization. The lifecycle manager drives it from a single thread.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are local wall-clock times stored as TEXT in the form
//! `2024-01-15T10:30:10`, so lexicographic ordering matches chronological
//! ordering.
//!
//! ## Open Fact
//!
//! The fact currently being tracked lives in the single-row `open_fact` table
//! rather than in `facts`. Stopping it moves the row into `facts` inside one
//! transaction, which is how the store keeps at most one open fact and never
//! a half-closed one.

use std::path::Path;

use chrono::NaiveDateTime;
use hq_core::{
    Activity, ActivityKey, ActivityName, ActivityRecord, Category, CategoryKey, CategoryName,
    CategoryRecord, Fact, FactKey, FactStore, IntervalRules, Missing, StoreError, ValidationError,
};
use rusqlite::{Connection, OptionalExtension, Row, params};
use thiserror::Error;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const FACT_COLUMNS: &str = "
    SELECT f.id, f.start_time, f.end_time, a.name, c.name, f.description
    FROM facts f
    JOIN activities a ON a.id = f.activity_id
    LEFT JOIN categories c ON c.id = a.category_id
";

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for {record}: {timestamp}")]
    TimestampParse {
        record: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored name no longer passes validation.
    #[error("invalid stored value for {record}")]
    InvalidRecord {
        record: String,
        #[source]
        source: ValidationError,
    },
    /// A store-level outcome such as a missing record or a rejected fact.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Store(err) => err,
            other => Self::Backend(Box::new(other)),
        }
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        Self::Store(StoreError::Invalid(err))
    }
}

/// Database connection wrapper implementing [`FactStore`].
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
    rules: IntervalRules,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn,
            rules: IntervalRules::default(),
        };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn,
            rules: IntervalRules::default(),
        };
        db.init()?;
        Ok(db)
    }

    /// Replaces the interval rules applied to saved facts.
    #[must_use]
    pub fn with_rules(mut self, rules: IntervalRules) -> Self {
        self.rules = rules;
        self
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );

            -- category_id: NULL for uncategorised activities
            CREATE TABLE IF NOT EXISTS activities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                category_id INTEGER,
                FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE RESTRICT
            );

            CREATE INDEX IF NOT EXISTS idx_activities_category ON activities(category_id);

            -- start_time/end_time: local time, e.g. '2024-01-15T10:30:10'
            CREATE TABLE IF NOT EXISTS facts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                activity_id INTEGER NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                description TEXT,
                FOREIGN KEY (activity_id) REFERENCES activities(id) ON DELETE RESTRICT
            );

            CREATE INDEX IF NOT EXISTS idx_facts_start ON facts(start_time);
            CREATE INDEX IF NOT EXISTS idx_facts_activity ON facts(activity_id);

            CREATE TABLE IF NOT EXISTS open_fact (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                activity_id INTEGER NOT NULL,
                start_time TEXT NOT NULL,
                description TEXT,
                FOREIGN KEY (activity_id) REFERENCES activities(id) ON DELETE RESTRICT
            );
            ",
        )?;
        Ok(())
    }
}

impl FactStore for Database {
    fn all_facts(&self) -> Result<Vec<Fact>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("{FACT_COLUMNS} ORDER BY f.start_time ASC, f.id ASC"))
            .map_err(DbError::from)?;
        let rows = stmt
            .query_map([], FactRow::closed)
            .map_err(DbError::from)?;
        let mut facts = Vec::new();
        for row in rows {
            facts.push(row.map_err(DbError::from)?.into_fact()?);
        }
        Ok(facts)
    }

    fn get_fact(&self, key: FactKey) -> Result<Fact, StoreError> {
        Ok(load_fact(&self.conn, key)?)
    }

    fn save_fact(&mut self, fact: &Fact) -> Result<Fact, StoreError> {
        let tx = self.conn.transaction().map_err(DbError::from)?;
        let saved = save_fact_in(&tx, self.rules, fact)?;
        tx.commit().map_err(DbError::from)?;
        tracing::debug!(key = ?saved.key, activity = %saved.activity, "saved fact");
        Ok(saved)
    }

    fn open_fact(&self) -> Result<Fact, StoreError> {
        load_open_fact(&self.conn)?.ok_or(StoreError::NotFound(Missing::OpenFact))
    }

    fn stop_open_fact(&mut self, end: NaiveDateTime) -> Result<Fact, StoreError> {
        let tx = self.conn.transaction().map_err(DbError::from)?;
        let stopped = stop_open_fact_in(&tx, self.rules, end)?;
        tx.commit().map_err(DbError::from)?;
        Ok(stopped)
    }

    fn cancel_open_fact(&mut self) -> Result<(), StoreError> {
        let removed = self
            .conn
            .execute("DELETE FROM open_fact WHERE id = 1", [])
            .map_err(DbError::from)?;
        if removed == 0 {
            return Err(StoreError::NotFound(Missing::OpenFact));
        }
        Ok(())
    }

    fn all_categories(&self) -> Result<Vec<Category>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM categories ORDER BY id ASC")
            .map_err(DbError::from)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))
            .map_err(DbError::from)?;
        let mut categories = Vec::new();
        for row in rows {
            let (id, name) = row.map_err(DbError::from)?;
            categories.push(category(id, name)?);
        }
        Ok(categories)
    }

    fn all_activities(&self) -> Result<Vec<Activity>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, category_id FROM activities ORDER BY id ASC")
            .map_err(DbError::from)?;
        let rows = stmt
            .query_map([], ActivityRow::from_row)
            .map_err(DbError::from)?;
        let mut activities = Vec::new();
        for row in rows {
            activities.push(row.map_err(DbError::from)?.into_activity()?);
        }
        Ok(activities)
    }

    fn get_category(&self, key: CategoryKey) -> Result<Category, StoreError> {
        let name: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM categories WHERE id = ?1",
                params![key.get()],
                |row| row.get(0),
            )
            .optional()
            .map_err(DbError::from)?;
        let name = name.ok_or(StoreError::NotFound(Missing::Category(key)))?;
        Ok(category(key.get(), name)?)
    }

    fn category_by_name(&self, name: &CategoryName) -> Result<CategoryRecord, StoreError> {
        let key = category_key(&self.conn, name)?
            .ok_or_else(|| StoreError::NotFound(Missing::CategoryNamed(name.to_string())))?;
        let activities = keys(
            &self.conn,
            "SELECT id FROM activities WHERE category_id = ?1 ORDER BY id ASC",
            key.get(),
        )?
        .into_iter()
        .map(ActivityKey::new)
        .collect();
        Ok(CategoryRecord {
            category: Category {
                key,
                name: name.clone(),
            },
            activities,
        })
    }

    fn get_activity(&self, key: ActivityKey) -> Result<Activity, StoreError> {
        Ok(load_activity(&self.conn, key)?)
    }

    fn activity_record(&self, key: ActivityKey) -> Result<ActivityRecord, StoreError> {
        let activity = load_activity(&self.conn, key)?;
        let facts = keys(
            &self.conn,
            "SELECT id FROM facts WHERE activity_id = ?1 ORDER BY id ASC",
            key.get(),
        )?
        .into_iter()
        .map(FactKey::new)
        .collect();
        Ok(ActivityRecord { activity, facts })
    }

    fn find_activity(
        &self,
        name: &ActivityName,
        category: Option<&CategoryName>,
    ) -> Result<Activity, StoreError> {
        let missing = || {
            StoreError::NotFound(Missing::ActivityNamed {
                activity: name.to_string(),
                category: category.map(ToString::to_string),
            })
        };
        let category_key = match category {
            Some(category) => Some(category_key(&self.conn, category)?.ok_or_else(missing)?),
            None => None,
        };
        let key = activity_key(&self.conn, name, category_key)?.ok_or_else(missing)?;
        Ok(load_activity(&self.conn, key)?)
    }

    fn save_activity(
        &mut self,
        name: &ActivityName,
        category: Option<&CategoryName>,
    ) -> Result<Activity, StoreError> {
        let tx = self.conn.transaction().map_err(DbError::from)?;
        let key = ensure_activity(&tx, name, category)?;
        let activity = load_activity(&tx, key)?;
        tx.commit().map_err(DbError::from)?;
        Ok(activity)
    }

    fn remove_category(&mut self, category: &Category) -> Result<(), StoreError> {
        let tx = self.conn.transaction().map_err(DbError::from)?;
        let id = category.key.get();
        if count(&tx, "SELECT COUNT(*) FROM categories WHERE id = ?1", id)? == 0 {
            return Err(StoreError::NotFound(Missing::Category(category.key)));
        }
        if count(&tx, "SELECT COUNT(*) FROM activities WHERE category_id = ?1", id)? > 0 {
            return Err(StoreError::DependencyExists(Missing::Category(category.key)));
        }
        tx.execute("DELETE FROM categories WHERE id = ?1", params![id])
            .map_err(DbError::from)?;
        tx.commit().map_err(DbError::from)?;
        tracing::debug!(key = %category.key, "deleted category");
        Ok(())
    }

    fn remove_activity(&mut self, activity: &Activity) -> Result<(), StoreError> {
        let tx = self.conn.transaction().map_err(DbError::from)?;
        let id = activity.key.get();
        if count(&tx, "SELECT COUNT(*) FROM activities WHERE id = ?1", id)? == 0 {
            return Err(StoreError::NotFound(Missing::Activity(activity.key)));
        }
        let dependents = count(&tx, "SELECT COUNT(*) FROM facts WHERE activity_id = ?1", id)?
            + count(&tx, "SELECT COUNT(*) FROM open_fact WHERE activity_id = ?1", id)?;
        if dependents > 0 {
            return Err(StoreError::DependencyExists(Missing::Activity(activity.key)));
        }
        tx.execute("DELETE FROM activities WHERE id = ?1", params![id])
            .map_err(DbError::from)?;
        tx.commit().map_err(DbError::from)?;
        tracing::debug!(key = %activity.key, "deleted activity");
        Ok(())
    }
}

/// A fact row as stored, before validation.
struct FactRow {
    id: Option<i64>,
    start: String,
    end: Option<String>,
    activity: String,
    category: Option<String>,
    description: Option<String>,
}

impl FactRow {
    fn closed(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            start: row.get(1)?,
            end: Some(row.get(2)?),
            activity: row.get(3)?,
            category: row.get(4)?,
            description: row.get(5)?,
        })
    }

    fn open(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: None,
            start: row.get(0)?,
            end: None,
            activity: row.get(1)?,
            category: row.get(2)?,
            description: row.get(3)?,
        })
    }

    fn record(&self) -> String {
        self.id
            .map_or_else(|| "open fact".to_string(), |id| format!("fact {id}"))
    }

    fn into_fact(self) -> Result<Fact, DbError> {
        let record = self.record();
        let start = parse_timestamp(&self.start, &record)?;
        let end = self
            .end
            .as_deref()
            .map(|end| parse_timestamp(end, &record))
            .transpose()?;
        let activity = ActivityName::new(self.activity).map_err(|source| DbError::InvalidRecord {
            record: record.clone(),
            source,
        })?;
        let category = self
            .category
            .map(CategoryName::new)
            .transpose()
            .map_err(|source| DbError::InvalidRecord { record, source })?;
        Ok(Fact {
            key: self.id.map(FactKey::new),
            start,
            end,
            activity,
            category,
            description: self.description,
        })
    }
}

struct ActivityRow {
    id: i64,
    name: String,
    category_id: Option<i64>,
}

impl ActivityRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            category_id: row.get(2)?,
        })
    }

    fn into_activity(self) -> Result<Activity, DbError> {
        let name = ActivityName::new(self.name).map_err(|source| DbError::InvalidRecord {
            record: format!("activity {}", self.id),
            source,
        })?;
        Ok(Activity {
            key: ActivityKey::new(self.id),
            name,
            category: self.category_id.map(CategoryKey::new),
        })
    }
}

fn save_fact_in(conn: &Connection, rules: IntervalRules, fact: &Fact) -> Result<Fact, DbError> {
    let open_start = load_open_fact(conn)?.map(|open| open.start);
    match (fact.key, fact.end) {
        (Some(key), None) => Err(ValidationError::MissingEnd { key }.into()),
        (Some(key), Some(end)) => {
            if count(conn, "SELECT COUNT(*) FROM facts WHERE id = ?1", key.get())? == 0 {
                return Err(StoreError::NotFound(Missing::Fact(key)).into());
            }
            rules.check_placement(fact.start, end, intervals(conn, Some(key))?, open_start)?;
            let activity = ensure_activity(conn, &fact.activity, fact.category.as_ref())?;
            conn.execute(
                "
                UPDATE facts
                SET activity_id = ?1, start_time = ?2, end_time = ?3, description = ?4
                WHERE id = ?5
                ",
                params![
                    activity.get(),
                    format_timestamp(fact.start),
                    format_timestamp(end),
                    fact.description,
                    key.get(),
                ],
            )?;
            Ok(Fact {
                key: Some(key),
                ..fact.clone()
            })
        }
        (None, Some(end)) => {
            rules.check_placement(fact.start, end, intervals(conn, None)?, open_start)?;
            let activity = ensure_activity(conn, &fact.activity, fact.category.as_ref())?;
            conn.execute(
                "
                INSERT INTO facts (activity_id, start_time, end_time, description)
                VALUES (?1, ?2, ?3, ?4)
                ",
                params![
                    activity.get(),
                    format_timestamp(fact.start),
                    format_timestamp(end),
                    fact.description,
                ],
            )?;
            Ok(Fact {
                key: Some(FactKey::new(conn.last_insert_rowid())),
                ..fact.clone()
            })
        }
        (None, None) => {
            if open_start.is_some() {
                return Err(ValidationError::AlreadyOpen.into());
            }
            rules.check_open_start(fact.start, intervals(conn, None)?)?;
            let activity = ensure_activity(conn, &fact.activity, fact.category.as_ref())?;
            conn.execute(
                "
                INSERT INTO open_fact (id, activity_id, start_time, description)
                VALUES (1, ?1, ?2, ?3)
                ",
                params![activity.get(), format_timestamp(fact.start), fact.description],
            )?;
            Ok(fact.clone())
        }
    }
}

fn stop_open_fact_in(
    conn: &Connection,
    rules: IntervalRules,
    end: NaiveDateTime,
) -> Result<Fact, DbError> {
    let open = load_open_fact(conn)?.ok_or(StoreError::NotFound(Missing::OpenFact))?;
    rules.check_placement(open.start, end, intervals(conn, None)?, None)?;
    conn.execute(
        "
        INSERT INTO facts (activity_id, start_time, end_time, description)
        SELECT activity_id, start_time, ?1, description FROM open_fact WHERE id = 1
        ",
        params![format_timestamp(end)],
    )?;
    let key = FactKey::new(conn.last_insert_rowid());
    conn.execute("DELETE FROM open_fact WHERE id = 1", [])?;
    Ok(Fact {
        key: Some(key),
        end: Some(end),
        ..open
    })
}

fn load_fact(conn: &Connection, key: FactKey) -> Result<Fact, DbError> {
    let row = conn
        .query_row(
            &format!("{FACT_COLUMNS} WHERE f.id = ?1"),
            params![key.get()],
            FactRow::closed,
        )
        .optional()?;
    row.ok_or(StoreError::NotFound(Missing::Fact(key)))?
        .into_fact()
}

fn load_open_fact(conn: &Connection) -> Result<Option<Fact>, DbError> {
    let row = conn
        .query_row(
            "
            SELECT o.start_time, a.name, c.name, o.description
            FROM open_fact o
            JOIN activities a ON a.id = o.activity_id
            LEFT JOIN categories c ON c.id = a.category_id
            WHERE o.id = 1
            ",
            [],
            FactRow::open,
        )
        .optional()?;
    row.map(FactRow::into_fact).transpose()
}

fn load_activity(conn: &Connection, key: ActivityKey) -> Result<Activity, DbError> {
    let row = conn
        .query_row(
            "SELECT id, name, category_id FROM activities WHERE id = ?1",
            params![key.get()],
            ActivityRow::from_row,
        )
        .optional()?;
    row.ok_or(StoreError::NotFound(Missing::Activity(key)))?
        .into_activity()
}

/// Every closed fact interval, optionally leaving one fact out.
fn intervals(
    conn: &Connection,
    exclude: Option<FactKey>,
) -> Result<Vec<(FactKey, NaiveDateTime, NaiveDateTime)>, DbError> {
    let mut stmt = conn.prepare("SELECT id, start_time, end_time FROM facts WHERE id IS NOT ?1")?;
    let rows = stmt.query_map(params![exclude.map(FactKey::get)], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;
    let mut intervals = Vec::new();
    for row in rows {
        let (id, start, end) = row?;
        let record = format!("fact {id}");
        intervals.push((
            FactKey::new(id),
            parse_timestamp(&start, &record)?,
            parse_timestamp(&end, &record)?,
        ));
    }
    Ok(intervals)
}

fn category_key(conn: &Connection, name: &CategoryName) -> Result<Option<CategoryKey>, DbError> {
    let id: Option<i64> = conn
        .query_row(
            "SELECT id FROM categories WHERE name = ?1",
            params![name.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id.map(CategoryKey::new))
}

fn activity_key(
    conn: &Connection,
    name: &ActivityName,
    category: Option<CategoryKey>,
) -> Result<Option<ActivityKey>, DbError> {
    let id: Option<i64> = conn
        .query_row(
            "SELECT id FROM activities WHERE name = ?1 AND category_id IS ?2",
            params![name.as_str(), category.map(CategoryKey::get)],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id.map(ActivityKey::new))
}

/// Looks up an activity, creating it and its category when missing.
fn ensure_activity(
    conn: &Connection,
    name: &ActivityName,
    category: Option<&CategoryName>,
) -> Result<ActivityKey, DbError> {
    let category_key = match category {
        Some(category) => Some(match category_key(conn, category)? {
            Some(key) => key,
            None => {
                conn.execute(
                    "INSERT INTO categories (name) VALUES (?1)",
                    params![category.as_str()],
                )?;
                let key = CategoryKey::new(conn.last_insert_rowid());
                tracing::debug!(%key, name = %category, "created category");
                key
            }
        }),
        None => None,
    };
    if let Some(key) = activity_key(conn, name, category_key)? {
        return Ok(key);
    }
    conn.execute(
        "INSERT INTO activities (name, category_id) VALUES (?1, ?2)",
        params![name.as_str(), category_key.map(CategoryKey::get)],
    )?;
    let key = ActivityKey::new(conn.last_insert_rowid());
    tracing::debug!(%key, %name, "created activity");
    Ok(key)
}

fn keys(conn: &Connection, sql: &str, id: i64) -> Result<Vec<i64>, DbError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![id], |row| row.get(0))?;
    let mut keys = Vec::new();
    for row in rows {
        keys.push(row?);
    }
    Ok(keys)
}

fn count(conn: &Connection, sql: &str, id: i64) -> Result<i64, DbError> {
    Ok(conn.query_row(sql, params![id], |row| row.get(0))?)
}

fn category(id: i64, name: String) -> Result<Category, DbError> {
    let name = CategoryName::new(name).map_err(|source| DbError::InvalidRecord {
        record: format!("category {id}"),
        source,
    })?;
    Ok(Category {
        key: CategoryKey::new(id),
        name,
    })
}

fn parse_timestamp(timestamp: &str, record: &str) -> Result<NaiveDateTime, DbError> {
    NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).map_err(|source| {
        DbError::TimestampParse {
            record: record.to_string(),
            timestamp: timestamp.to_string(),
            source,
        }
    })
}

fn format_timestamp(timestamp: NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}
