//! In-Memory Backend Adapter
//!
//! Stands in for the hosted backend during development and tests. One value
//! implements every backend port: tables, session lookup, object storage and
//! change notifications.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock as SyncRwLock};
use tokio::sync::RwLock;

use crate::ports::{
    validate_object_path, AuthError, BackendAuth, BackendStore, ChangeCallback, ChangeEvent,
    ChangeKind, FileStorage, Filter, Identity, Realtime, Row, SessionToken, StorageError,
    StoreError, SubscriptionHandle,
};

/// Default per-object size limit for uploads (5 MiB).
pub const DEFAULT_MAX_OBJECT_BYTES: usize = 5 * 1024 * 1024;

const PRIMARY_KEY: &str = "id";

struct Subscriber {
    table: String,
    filter: Filter,
    on_change: ChangeCallback,
}

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
}

/// In-memory hosted backend.
///
/// Rows are unique on their `id` column when one is present.
#[derive(Clone)]
pub struct InMemoryBackend {
    tables: Arc<RwLock<HashMap<String, Vec<Row>>>>,
    sessions: Arc<SyncRwLock<HashMap<String, Identity>>>,
    objects: Arc<RwLock<HashMap<(String, String), StoredObject>>>,
    subscribers: Arc<SyncRwLock<HashMap<u64, Subscriber>>>,
    next_handle: Arc<AtomicU64>,
    public_base_url: String,
    max_object_bytes: usize,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(HashMap::new())),
            sessions: Arc::new(SyncRwLock::new(HashMap::new())),
            objects: Arc::new(RwLock::new(HashMap::new())),
            subscribers: Arc::new(SyncRwLock::new(HashMap::new())),
            next_handle: Arc::new(AtomicU64::new(1)),
            public_base_url: "http://localhost/storage".to_string(),
            max_object_bytes: DEFAULT_MAX_OBJECT_BYTES,
        }
    }

    /// Registers a session token that resolves to `identity`.
    pub fn with_user(self, token: impl Into<String>, identity: Identity) -> Self {
        self.add_user(token, identity);
        self
    }

    pub fn with_max_object_bytes(mut self, limit: usize) -> Self {
        self.max_object_bytes = limit;
        self
    }

    pub fn add_user(&self, token: impl Into<String>, identity: Identity) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.into(), identity);
    }

    /// Revokes a session token.
    pub fn revoke(&self, token: &str) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(token);
    }

    /// Number of rows in `table`.
    pub async fn row_count(&self, table: &str) -> usize {
        self.tables.read().await.get(table).map_or(0, Vec::len)
    }

    /// Stored object bytes and content type.
    pub async fn object(&self, bucket: &str, path: &str) -> Option<(Vec<u8>, String)> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), path.to_string()))
            .map(|o| (o.bytes.clone(), o.content_type.clone()))
    }

    fn notify(&self, table: &str, kind: ChangeKind, rows: &[Row]) {
        let callbacks: Vec<(ChangeCallback, Filter)> = {
            let subscribers = self
                .subscribers
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            subscribers
                .values()
                .filter(|s| s.table == table)
                .map(|s| (s.on_change.clone(), s.filter.clone()))
                .collect()
        };

        for row in rows {
            let event = ChangeEvent {
                table: table.to_string(),
                kind,
                row: row.clone(),
            };
            for (callback, filter) in &callbacks {
                if filter.matches(row) {
                    callback(&event);
                }
            }
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// BackendStore
// ════════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl BackendStore for InMemoryBackend {
    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Row>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default())
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row, StoreError> {
        {
            let mut tables = self.tables.write().await;
            let rows = tables.entry(table.to_string()).or_default();

            if let Some(key) = row.get(PRIMARY_KEY) {
                if rows.iter().any(|r| r.get(PRIMARY_KEY) == Some(key)) {
                    return Err(StoreError::Conflict(format!("{table}.{PRIMARY_KEY}={key}")));
                }
            }
            rows.push(row.clone());
        }

        self.notify(table, ChangeKind::Insert, std::slice::from_ref(&row));
        Ok(row)
    }

    async fn update(
        &self,
        table: &str,
        filter: &Filter,
        patch: Row,
    ) -> Result<Vec<Row>, StoreError> {
        let updated: Vec<Row> = {
            let mut tables = self.tables.write().await;
            let Some(rows) = tables.get_mut(table) else {
                return Ok(Vec::new());
            };
            rows.iter_mut()
                .filter(|r| filter.matches(r))
                .map(|r| {
                    for (column, value) in &patch {
                        r.insert(column.clone(), value.clone());
                    }
                    r.clone()
                })
                .collect()
        };

        self.notify(table, ChangeKind::Update, &updated);
        Ok(updated)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|r| !filter.matches(r));
        Ok((before - rows.len()) as u64)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// BackendAuth
// ════════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl BackendAuth for InMemoryBackend {
    async fn get_user(&self, token: &SessionToken) -> Result<Identity, AuthError> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(token.as_str())
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// FileStorage
// ════════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl FileStorage for InMemoryBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        validate_object_path(path)?;
        if bytes.len() > self.max_object_bytes {
            return Err(StorageError::TooLarge {
                size: bytes.len(),
                limit: self.max_object_bytes,
            });
        }

        self.objects.write().await.insert(
            (bucket.to_string(), path.to_string()),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(self.public_url(bucket, path))
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, bucket, path)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Realtime
// ════════════════════════════════════════════════════════════════════════════════

impl Realtime for InMemoryBackend {
    fn subscribe(
        &self,
        table: &str,
        filter: Filter,
        on_change: ChangeCallback,
    ) -> SubscriptionHandle {
        let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                id,
                Subscriber {
                    table: table.to_string(),
                    filter,
                    on_change,
                },
            );
        SubscriptionHandle(id)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle.0)
            .is_some()
    }
}
