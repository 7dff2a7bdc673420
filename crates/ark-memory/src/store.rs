//! Memory Store.
//!
//! Durable, append-only SQLite table of [`MemoryEntry`] rows fronted by two
//! cache tiers and mirrored into a [`KnowledgeGraph`].
//!
//! # Storage layout
//!
//! Table `memory_entries`:
//!
//! | column              | type    | description                                |
//! |---------------------|---------|--------------------------------------------|
//! | id                  | INTEGER | auto-increment primary key                 |
//! | timestamp           | TEXT    | RFC-3339 creation time (UTC, microseconds) |
//! | memory_kind         | TEXT    | [`MemoryKind::as_str`]                      |
//! | content             | TEXT    | JSON payload                               |
//! | priority            | INTEGER | `1` (minimal) … `5` (critical)             |
//! | associations        | TEXT    | JSON array of graph node ids               |
//! | emotional_trace     | TEXT    | JSON object emotion → intensity            |
//! | consciousness_state | TEXT    | free label                                 |
//! | attention_level     | REAL    | `[0, 1]`                                   |
//! | reasoning_depth     | INTEGER | ≥ 0                                        |
//! | tags                | TEXT    | JSON array                                 |
//! | access_count        | INTEGER | bumped on [`MemoryStore::get`]             |
//! | last_accessed       | TEXT    | RFC-3339                                   |
//! | decay_rate          | REAL    | default `0.1`                              |
//!
//! Tags are also exploded into `memory_tags(entry_id, tag)` so tag filters
//! use an index instead of scanning JSON.  Secondary indexes exist on kind,
//! timestamp, priority and tag.
//!
//! # Consistency
//!
//! All state (connection, graph, caches) lives behind one mutex.  An insert
//! commits its SQLite transaction before touching the graph or caches, and
//! the lock is held across both, so no reader observes an entry without its
//! graph node and a failed insert leaves every in-memory structure
//! untouched.
//!
//! # Example
//!
//! ```rust
//! use ark_memory::{MemoryKind, MemoryStore, NewMemory};
//! use serde_json::json;
//!
//! let store = MemoryStore::open_in_memory().unwrap();
//! let id = store
//!     .insert(NewMemory::new(MemoryKind::Insight, json!({ "note": "sensors nominal" })).tags(["status"]))
//!     .unwrap();
//!
//! let entry = store.get(id).unwrap().unwrap();
//! assert_eq!(entry.access_count, 1);
//! assert_eq!(store.search(Some("nominal"), None, &[], 10).unwrap().len(), 1);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::entry::{MemoryEntry, MemoryKind, MemoryPriority, NewMemory};
use crate::graph::{Association, GraphPattern, KnowledgeGraph};

/// Default `min_occurrences` for [`MemoryStore::patterns`].
pub const DEFAULT_PATTERN_MIN_OCCURRENCES: usize = 3;

const ASSOCIATED_WEIGHT: f64 = 1.0;
const TAGGED_WEIGHT: f64 = 0.5;

const SELECT_COLUMNS: &str = "id, timestamp, memory_kind, content, priority, associations,
     emotional_trace, consciousness_state, attention_level, reasoning_depth,
     tags, access_count, last_accessed, decay_rate";

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise from memory store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Memory store lock poisoned")]
    LockPoisoned,
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration and statistics
// ─────────────────────────────────────────────────────────────────────────────

/// Cache bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Short-term cache is trimmed to half this size once it is exceeded.
    pub short_term_limit: usize,
    /// Maximum entries held in the long-term lookup cache.
    pub long_term_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            short_term_limit: 100,
            long_term_limit: 10_000,
        }
    }
}

/// Snapshot returned by [`MemoryStore::stats`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_memories: u64,
    pub memories_by_kind: BTreeMap<String, u64>,
    pub average_access_count: f64,
    /// Entries created within the last hour.
    pub recent_memories: u64,
    pub short_term_cache_size: usize,
    pub long_term_cache_size: usize,
    pub graph_nodes: usize,
    pub graph_edges: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// MemoryStore
// ─────────────────────────────────────────────────────────────────────────────

struct Inner {
    conn: Connection,
    graph: KnowledgeGraph,
    short_term: Vec<MemoryEntry>,
    long_term: HashMap<i64, MemoryEntry>,
}

/// SQLite-backed memory store with cache tiers and a knowledge graph.
///
/// Every method takes `&self`; share the store between components with an
/// `Arc<MemoryStore>`.
pub struct MemoryStore {
    inner: Mutex<Inner>,
    config: StoreConfig,
}

impl MemoryStore {
    /// Open (or create) a persistent SQLite database at `path`.
    ///
    /// Entries already present are re-indexed into the knowledge graph.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        info!(path, "opening memory store");
        Self::from_connection(Connection::open(path)?)
    }

    /// Open a temporary in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Replace the default cache bounds.
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        init_schema(&conn)?;
        let mut inner = Inner {
            conn,
            graph: KnowledgeGraph::new(),
            short_term: Vec::new(),
            long_term: HashMap::new(),
        };
        let existing = query_entries(
            &inner.conn,
            &format!("SELECT {SELECT_COLUMNS} FROM memory_entries ORDER BY id ASC"),
            Vec::new(),
        )?;
        if !existing.is_empty() {
            info!(entries = existing.len(), "re-indexing stored memories");
        }
        for entry in &existing {
            index_entry(&mut inner.graph, entry);
        }
        Ok(Self {
            inner: Mutex::new(inner),
            config: StoreConfig::default(),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::LockPoisoned)
    }

    // ── Writes ──────────────────────────────────────────────────────────────

    /// Insert a new entry timestamped now and return its id.
    pub fn insert(&self, new: NewMemory) -> Result<i64, StoreError> {
        self.insert_at(new, Utc::now())
    }

    /// Insert a new entry with an explicit creation time.
    ///
    /// The timestamp is truncated to microseconds, the resolution it is
    /// stored with.
    pub fn insert_at(&self, new: NewMemory, timestamp: DateTime<Utc>) -> Result<i64, StoreError> {
        let timestamp = timestamp.trunc_subsecs(6);
        let content = serde_json::to_string(&new.content)?;
        let associations = serde_json::to_string(&new.associations)?;
        let emotional_trace = serde_json::to_string(&new.emotional_trace)?;
        let tags = serde_json::to_string(&new.tags)?;
        let ts = to_db_time(&timestamp);

        let mut guard = self.lock()?;
        let inner = &mut *guard;

        let tx = inner.conn.transaction()?;
        tx.execute(
            "INSERT INTO memory_entries
                 (timestamp, memory_kind, content, priority, associations, emotional_trace,
                  consciousness_state, attention_level, reasoning_depth, tags,
                  access_count, last_accessed, decay_rate)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, ?11, ?12)",
            params![
                ts,
                new.kind.as_str(),
                content,
                new.priority.as_i64(),
                associations,
                emotional_trace,
                new.consciousness_state,
                new.attention_level,
                new.reasoning_depth,
                tags,
                ts,
                new.decay_rate,
            ],
        )?;
        let id = tx.last_insert_rowid();
        for tag in &new.tags {
            tx.execute(
                "INSERT OR IGNORE INTO memory_tags (entry_id, tag) VALUES (?1, ?2)",
                params![id, tag],
            )?;
        }
        tx.commit()?;

        // ── Committed: mirror into graph and short-term cache ──────────────
        let entry = MemoryEntry {
            id,
            timestamp,
            kind: new.kind,
            content: new.content,
            priority: new.priority,
            associations: new.associations,
            emotional_trace: new.emotional_trace,
            consciousness_state: new.consciousness_state,
            attention_level: new.attention_level,
            reasoning_depth: new.reasoning_depth,
            tags: new.tags,
            access_count: 0,
            last_accessed: timestamp,
            decay_rate: new.decay_rate,
        };
        index_entry(&mut inner.graph, &entry);
        inner.short_term.push(entry);
        if inner.short_term.len() > self.config.short_term_limit {
            trim_short_term(&mut inner.short_term, self.config.short_term_limit / 2);
        }

        debug!(id, kind = new.kind.as_str(), "memory stored");
        Ok(id)
    }

    // ── Reads ───────────────────────────────────────────────────────────────

    /// Fetch an entry by id, bumping its access statistics.
    ///
    /// The bump is written through to the database first and reaches the
    /// cached copy only if that write succeeds, so both always agree.
    pub fn get(&self, id: i64) -> Result<Option<MemoryEntry>, StoreError> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        let now = Utc::now().trunc_subsecs(6);

        if let Some(cached) = inner.long_term.get(&id) {
            let mut bumped = cached.clone();
            bumped.access_count += 1;
            bumped.last_accessed = now;
            write_access(&inner.conn, &bumped)?;
            inner.long_term.insert(id, bumped.clone());
            return Ok(Some(bumped));
        }

        let mut found = query_entries(
            &inner.conn,
            &format!("SELECT {SELECT_COLUMNS} FROM memory_entries WHERE id = ?1"),
            vec![id.into()],
        )?;
        let Some(mut entry) = found.pop() else {
            return Ok(None);
        };
        entry.access_count += 1;
        entry.last_accessed = now;
        write_access(&inner.conn, &entry)?;

        if inner.long_term.len() >= self.config.long_term_limit {
            evict_least_recently_accessed(&mut inner.long_term);
        }
        if self.config.long_term_limit > 0 {
            inner.long_term.insert(id, entry.clone());
        }
        Ok(Some(entry))
    }

    /// Filtered search.  All filters are ANDed.
    ///
    /// * `text` – substring of the serialized JSON content.
    /// * `kind` – exact memory kind.
    /// * `tags` – every listed tag must be present on the entry.
    ///
    /// Ordered by priority, then most recently accessed, capped at `limit`.
    pub fn search(
        &self,
        text: Option<&str>,
        kind: Option<MemoryKind>,
        tags: &[&str],
        limit: usize,
    ) -> Result<Vec<MemoryEntry>, StoreError> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<rusqlite::types::Value> = Vec::new();

        if let Some(text) = text {
            clauses.push("instr(content, ?) > 0");
            values.push(text.to_string().into());
        }
        if let Some(kind) = kind {
            clauses.push("memory_kind = ?");
            values.push(kind.as_str().to_string().into());
        }
        for tag in tags {
            clauses.push(
                "EXISTS (SELECT 1 FROM memory_tags t
                         WHERE t.entry_id = memory_entries.id AND t.tag = ?)",
            );
            values.push(tag.to_string().into());
        }
        values.push(i64::try_from(limit).unwrap_or(i64::MAX).into());

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM memory_entries {where_clause}
             ORDER BY priority DESC, last_accessed DESC, id DESC
             LIMIT ?"
        );
        let inner = self.lock()?;
        query_entries(&inner.conn, &sql, values)
    }

    /// Every entry created within `window` of now, newest first.
    pub fn recent(&self, window: Duration, kind: Option<MemoryKind>) -> Result<Vec<MemoryEntry>, StoreError> {
        let cutoff = to_db_time(&(Utc::now() - window));
        let inner = self.lock()?;
        match kind {
            Some(kind) => query_entries(
                &inner.conn,
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM memory_entries
                     WHERE timestamp >= ?1 AND memory_kind = ?2
                     ORDER BY timestamp DESC, id DESC"
                ),
                vec![cutoff.into(), kind.as_str().to_string().into()],
            ),
            None => query_entries(
                &inner.conn,
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM memory_entries
                     WHERE timestamp >= ?1
                     ORDER BY timestamp DESC, id DESC"
                ),
                vec![cutoff.into()],
            ),
        }
    }

    /// Snapshot of the short-term cache, oldest first.
    pub fn short_term(&self) -> Result<Vec<MemoryEntry>, StoreError> {
        Ok(self.lock()?.short_term.clone())
    }

    /// Aggregate statistics over the store, caches and graph.
    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let inner = self.lock()?;
        let conn = &inner.conn;

        let total: i64 = conn.query_row("SELECT COUNT(*) FROM memory_entries", [], |r| r.get(0))?;
        let average: Option<f64> =
            conn.query_row("SELECT AVG(access_count) FROM memory_entries", [], |r| r.get(0))?;
        let hour_ago = to_db_time(&(Utc::now() - Duration::hours(1)));
        let recent: i64 = conn.query_row(
            "SELECT COUNT(*) FROM memory_entries WHERE timestamp >= ?1",
            params![hour_ago],
            |r| r.get(0),
        )?;

        let mut by_kind = BTreeMap::new();
        let mut stmt = conn.prepare("SELECT memory_kind, COUNT(*) FROM memory_entries GROUP BY memory_kind")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
        for row in rows {
            let (kind, count) = row?;
            by_kind.insert(kind, count as u64);
        }

        Ok(StoreStats {
            total_memories: total as u64,
            memories_by_kind: by_kind,
            average_access_count: average.unwrap_or(0.0),
            recent_memories: recent as u64,
            short_term_cache_size: inner.short_term.len(),
            long_term_cache_size: inner.long_term.len(),
            graph_nodes: inner.graph.node_count(),
            graph_edges: inner.graph.edge_count(),
        })
    }

    // ── Graph queries ───────────────────────────────────────────────────────

    /// Graph associations of the entry with `id` (empty if unknown).
    pub fn associations(&self, id: i64, max_depth: usize) -> Result<Vec<Association>, StoreError> {
        let inner = self.lock()?;
        let kind: Option<String> = inner
            .conn
            .query_row(
                "SELECT memory_kind FROM memory_entries WHERE id = ?1",
                params![id],
                |r| r.get(0),
            )
            .optional()?;
        let Some(kind) = kind.as_deref().and_then(MemoryKind::from_str) else {
            return Ok(Vec::new());
        };
        Ok(inner
            .graph
            .associations(&MemoryEntry::node_id_for(kind, id), max_depth))
    }

    /// Densely connected entries of `kind`, or of every kind (concatenated
    /// in [`MemoryKind::ALL`] order) when `kind` is `None`.
    pub fn patterns(&self, kind: Option<MemoryKind>, min_occurrences: usize) -> Result<Vec<GraphPattern>, StoreError> {
        let inner = self.lock()?;
        let kinds: Vec<MemoryKind> = match kind {
            Some(k) => vec![k],
            None => MemoryKind::ALL.to_vec(),
        };
        Ok(kinds
            .into_iter()
            .flat_map(|k| inner.graph.patterns(k.as_str(), min_occurrences))
            .collect())
    }

    /// `true` when the graph holds a node with this id.
    pub fn has_node(&self, node_id: &str) -> Result<bool, StoreError> {
        Ok(self.lock()?.graph.contains(node_id))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal helpers
// ─────────────────────────────────────────────────────────────────────────────

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS memory_entries (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp           TEXT    NOT NULL,
            memory_kind         TEXT    NOT NULL,
            content             TEXT    NOT NULL,
            priority            INTEGER NOT NULL,
            associations        TEXT    NOT NULL,
            emotional_trace     TEXT    NOT NULL,
            consciousness_state TEXT    NOT NULL,
            attention_level     REAL    NOT NULL,
            reasoning_depth     INTEGER NOT NULL,
            tags                TEXT    NOT NULL,
            access_count        INTEGER NOT NULL DEFAULT 0,
            last_accessed       TEXT    NOT NULL,
            decay_rate          REAL    NOT NULL DEFAULT 0.1
        );
        CREATE TABLE IF NOT EXISTS memory_tags (
            entry_id INTEGER NOT NULL REFERENCES memory_entries(id),
            tag      TEXT    NOT NULL,
            PRIMARY KEY (entry_id, tag)
        );
        CREATE INDEX IF NOT EXISTS idx_memory_kind      ON memory_entries(memory_kind);
        CREATE INDEX IF NOT EXISTS idx_memory_timestamp ON memory_entries(timestamp);
        CREATE INDEX IF NOT EXISTS idx_memory_priority  ON memory_entries(priority);
        CREATE INDEX IF NOT EXISTS idx_memory_tags      ON memory_tags(tag);",
    )?;
    Ok(())
}

/// Fixed-width RFC-3339 so lexical order matches chronological order.
fn to_db_time(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_db_time(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .map_err(|e| rusqlite::Error::InvalidColumnType(idx, e.to_string(), Type::Text))
}

fn parse_json<T: serde::de::DeserializeOwned>(idx: usize, raw: &str) -> rusqlite::Result<T> {
    serde_json::from_str(raw).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemoryEntry> {
    let kind_str: String = row.get(2)?;
    let kind = MemoryKind::from_str(&kind_str)
        .ok_or_else(|| rusqlite::Error::InvalidColumnType(2, kind_str, Type::Text))?;
    let priority_raw: i64 = row.get(4)?;
    let priority = MemoryPriority::from_i64(priority_raw).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(4, priority_raw.to_string(), Type::Integer)
    })?;
    let content: String = row.get(3)?;
    let associations: String = row.get(5)?;
    let emotional_trace: String = row.get(6)?;
    let tags: String = row.get(10)?;
    let access_count: i64 = row.get(11)?;

    Ok(MemoryEntry {
        id: row.get(0)?,
        timestamp: parse_db_time(1, row.get(1)?)?,
        kind,
        content: parse_json(3, &content)?,
        priority,
        associations: parse_json(5, &associations)?,
        emotional_trace: parse_json(6, &emotional_trace)?,
        consciousness_state: row.get(7)?,
        attention_level: row.get(8)?,
        reasoning_depth: row.get(9)?,
        tags: parse_json(10, &tags)?,
        access_count: access_count.max(0) as u64,
        last_accessed: parse_db_time(12, row.get(12)?)?,
        decay_rate: row.get(13)?,
    })
}

fn query_entries(
    conn: &Connection,
    sql: &str,
    values: Vec<rusqlite::types::Value>,
) -> Result<Vec<MemoryEntry>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params_from_iter(values), row_to_entry)?;
    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

fn write_access(conn: &Connection, entry: &MemoryEntry) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE memory_entries SET access_count = ?1, last_accessed = ?2 WHERE id = ?3",
        params![entry.access_count as i64, to_db_time(&entry.last_accessed), entry.id],
    )?;
    Ok(())
}

/// Add the entry's node plus its tag and association edges.
fn index_entry(graph: &mut KnowledgeGraph, entry: &MemoryEntry) {
    let node_id = entry.node_id();
    let mut attributes = Map::new();
    attributes.insert("timestamp".into(), Value::String(to_db_time(&entry.timestamp)));
    attributes.insert("priority".into(), Value::from(entry.priority.as_i64()));
    attributes.insert("consciousness_state".into(), Value::String(entry.consciousness_state.clone()));
    attributes.insert("attention_level".into(), Value::from(entry.attention_level));
    graph.add_node(&node_id, entry.kind.as_str(), attributes);

    for target in &entry.associations {
        if !graph.contains(target) {
            debug!(node = %node_id, target = %target, "skipping association to unknown node");
            continue;
        }
        if let Err(e) = graph.add_edge(&node_id, target, "associated", ASSOCIATED_WEIGHT) {
            warn!(error = %e, "failed to link association");
        }
    }

    for tag in &entry.tags {
        let tag_node = format!("tag_{tag}");
        if !graph.contains(&tag_node) {
            let mut attrs = Map::new();
            attrs.insert("name".into(), Value::String(tag.clone()));
            graph.add_node(&tag_node, "tag", attrs);
        }
        if let Err(e) = graph.add_edge(&node_id, &tag_node, "tagged", TAGGED_WEIGHT) {
            warn!(error = %e, "failed to link tag");
        }
    }
}

fn trim_short_term(cache: &mut Vec<MemoryEntry>, keep: usize) {
    cache.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
    let excess = cache.len().saturating_sub(keep);
    cache.drain(..excess);
}

fn evict_least_recently_accessed(cache: &mut HashMap<i64, MemoryEntry>) {
    let victim = cache
        .values()
        .min_by(|a, b| a.last_accessed.cmp(&b.last_accessed).then(a.id.cmp(&b.id)))
        .map(|e| e.id);
    if let Some(id) = victim {
        cache.remove(&id);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
