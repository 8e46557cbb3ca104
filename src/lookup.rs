//! Read-only key/value tables the resolver and indexer consult.
//!
//! Every table is an exact-match byte-key lookup behind [`KeyValueLookup`].
//! Typed wrappers decode the payload format of one logical table and report
//! decode failures against that table's name.

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use crate::constants::lookup::{
    GEODATA_TABLE, PAGE_EVENTS_TABLE, PAGE_LINKS_TABLE, REDIRECTS_TABLE, SQLITE_KV_TABLE,
};
use crate::data::{GeoEntity, RawEvent};
use crate::errors::IndexerError;
use crate::link_graph::LinkGraph;
use crate::types::PageTitle;

/// Exact-match lookup from byte keys to byte payloads.
pub trait KeyValueLookup: Send + Sync {
    /// Payload stored under `key`, or `None` when absent.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, IndexerError>;

    /// Payloads for several keys, in input order.
    fn get_many(&self, keys: &[&[u8]]) -> Result<Vec<Option<Vec<u8>>>, IndexerError> {
        keys.iter().map(|key| self.get(key)).collect()
    }
}

/// `HashMap`-backed lookup, mostly used for fixtures and small tables.
#[derive(Clone, Debug, Default)]
pub struct InMemoryLookup {
    entries: HashMap<Vec<u8>, Vec<u8>>,
}

impl InMemoryLookup {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace one entry.
    pub fn insert(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<Vec<u8>>, V: Into<Vec<u8>>> FromIterator<(K, V)> for InMemoryLookup {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

impl KeyValueLookup for InMemoryLookup {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, IndexerError> {
        Ok(self.entries.get(key).cloned())
    }
}

/// File-backed lookup stored in a single SQLite table
/// `kv(key BLOB PRIMARY KEY, value BLOB)`.
///
/// Reads go through one connection guarded by a mutex; open one handle per
/// worker thread when reads are hot.
pub struct SqliteLookup {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl fmt::Debug for SqliteLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteLookup")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteLookup {
    /// Open an existing lookup file read-only.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IndexerError> {
        let path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&path, flags)
            .map_err(|err| unavailable(&path, err.to_string()))?;
        debug!(path = %path.display(), "opened sqlite lookup");
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Create (or reopen for writing) a lookup file, creating its table.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, IndexerError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {SQLITE_KV_TABLE} (key BLOB PRIMARY KEY, value BLOB NOT NULL)"
        ))?;
        debug!(path = %path.display(), "created sqlite lookup");
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Insert or replace entries in one transaction. Returns the number written.
    pub fn put_batch<K, V, I>(&self, entries: I) -> Result<usize, IndexerError>
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut written = 0usize;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR REPLACE INTO {SQLITE_KV_TABLE} (key, value) VALUES (?1, ?2)"
            ))?;
            for (key, value) in entries {
                stmt.execute(params![key.as_ref(), value.as_ref()])?;
                written += 1;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, IndexerError> {
        self.conn
            .lock()
            .map_err(|_| unavailable(&self.path, "connection lock poisoned".to_string()))
    }
}

impl KeyValueLookup for SqliteLookup {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, IndexerError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare_cached(&format!(
                "SELECT value FROM {SQLITE_KV_TABLE} WHERE key = ?1"
            ))
            .map_err(|err| unavailable(&self.path, err.to_string()))?;
        stmt.query_row([key], |row| row.get::<_, Vec<u8>>(0))
            .optional()
            .map_err(|err| unavailable(&self.path, err.to_string()))
    }
}

fn unavailable(path: &Path, reason: String) -> IndexerError {
    IndexerError::LookupUnavailable {
        table: path.display().to_string(),
        reason,
    }
}

fn corrupt(table: &str, details: impl ToString) -> IndexerError {
    IndexerError::LookupCorrupt {
        table: table.to_string(),
        details: details.to_string(),
    }
}

fn read_text(
    lookup: &dyn KeyValueLookup,
    table: &str,
    key: &str,
) -> Result<Option<String>, IndexerError> {
    lookup
        .get(key.as_bytes())?
        .map(|bytes| String::from_utf8(bytes).map_err(|err| corrupt(table, err)))
        .transpose()
}

/// Existence set of canonical page titles.
#[derive(Clone)]
pub struct PageIndex {
    lookup: Arc<dyn KeyValueLookup>,
}

impl PageIndex {
    /// Wrap a lookup whose keys are canonical titles.
    pub fn new(lookup: Arc<dyn KeyValueLookup>) -> Self {
        Self { lookup }
    }

    /// True when `title` is a known page. The payload is ignored.
    pub fn contains(&self, title: &str) -> Result<bool, IndexerError> {
        Ok(self.lookup.get(title.as_bytes())?.is_some())
    }
}

/// Title to redirect target mapping (plain UTF-8 payloads).
#[derive(Clone)]
pub struct RedirectIndex {
    lookup: Arc<dyn KeyValueLookup>,
}

impl RedirectIndex {
    /// Wrap a lookup keyed by redirect source title.
    pub fn new(lookup: Arc<dyn KeyValueLookup>) -> Self {
        Self { lookup }
    }

    /// Redirect target of `title`, if it is a redirect.
    pub fn target(&self, title: &str) -> Result<Option<PageTitle>, IndexerError> {
        read_text(self.lookup.as_ref(), REDIRECTS_TABLE, title)
    }
}

/// Title to geocoded entity mapping (JSON payloads).
#[derive(Clone)]
pub struct GeodataStore {
    lookup: Arc<dyn KeyValueLookup>,
}

impl GeodataStore {
    /// Wrap a lookup keyed by place title.
    pub fn new(lookup: Arc<dyn KeyValueLookup>) -> Self {
        Self { lookup }
    }

    /// Geocoded entity for `title`, if the page has coordinates.
    pub fn get(&self, title: &str) -> Result<Option<GeoEntity>, IndexerError> {
        self.lookup
            .get(title.as_bytes())?
            .map(|bytes| serde_json::from_slice(&bytes).map_err(|err| corrupt(GEODATA_TABLE, err)))
            .transpose()
    }
}

/// Page title to zlib-compressed JSON link graph.
#[derive(Clone)]
pub struct LinkGraphStore {
    lookup: Arc<dyn KeyValueLookup>,
}

impl LinkGraphStore {
    /// Wrap a lookup keyed by page title.
    pub fn new(lookup: Arc<dyn KeyValueLookup>) -> Self {
        Self { lookup }
    }

    /// Decoded link graph of `page`, or `None` when none is stored.
    pub fn get(&self, page: &str) -> Result<Option<LinkGraph>, IndexerError> {
        self.lookup
            .get(page.as_bytes())?
            .map(|bytes| decode_link_graph(&bytes))
            .transpose()
    }

    /// Like [`LinkGraphStore::get`], failing with `MissingLinkGraph` when absent.
    pub fn load(&self, page: &str) -> Result<LinkGraph, IndexerError> {
        self.get(page)?
            .ok_or_else(|| IndexerError::MissingLinkGraph(page.to_string()))
    }
}

/// Compress a link graph into its stored form.
pub fn encode_link_graph(graph: &LinkGraph) -> Result<Vec<u8>, IndexerError> {
    let json = graph
        .to_json_vec()
        .map_err(|err| corrupt(PAGE_LINKS_TABLE, err))?;
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

fn decode_link_graph(bytes: &[u8]) -> Result<LinkGraph, IndexerError> {
    let mut json = Vec::new();
    ZlibDecoder::new(bytes)
        .read_to_end(&mut json)
        .map_err(|err| corrupt(PAGE_LINKS_TABLE, format!("zlib: {err}")))?;
    LinkGraph::from_json_slice(&json).map_err(|err| corrupt(PAGE_LINKS_TABLE, err))
}

#[derive(Deserialize, Serialize)]
struct PageEvents {
    events: Vec<RawEvent>,
}

/// Page title to extracted event list (JSON `{"events": [...]}`).
#[derive(Clone)]
pub struct PageEventsStore {
    lookup: Arc<dyn KeyValueLookup>,
}

impl PageEventsStore {
    /// Wrap a lookup keyed by page title.
    pub fn new(lookup: Arc<dyn KeyValueLookup>) -> Self {
        Self { lookup }
    }

    /// Extracted events of `page`, or `None` when the page has no entry.
    pub fn events(&self, page: &str) -> Result<Option<Vec<RawEvent>>, IndexerError> {
        self.lookup
            .get(page.as_bytes())?
            .map(|bytes| {
                serde_json::from_slice::<PageEvents>(&bytes)
                    .map(|stored| stored.events)
                    .map_err(|err| corrupt(PAGE_EVENTS_TABLE, err))
            })
            .transpose()
    }
}

/// Serialize an event list into the stored `{"events": [...]}` form.
pub fn encode_page_events(events: &[RawEvent]) -> Result<Vec<u8>, IndexerError> {
    serde_json::to_vec(&PageEvents {
        events: events.to_vec(),
    })
    .map_err(|err| corrupt(PAGE_EVENTS_TABLE, err))
}
