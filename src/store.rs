use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Mutex;

use crate::expression::UpdateExpression;
use crate::models::{Record, KEY_FIELD};

/// One page of a full-table enumeration.
///
/// `last_evaluated_key` is the store's native cursor for the next page, or
/// `None` once the enumeration is exhausted. Callers pass it back verbatim;
/// its internal structure is not part of the contract.
#[derive(Debug, Clone)]
pub struct ScanPage {
    pub items: Vec<Record>,
    pub count: i64,
    pub scanned_count: i64,
    pub last_evaluated_key: Option<JsonValue>,
}

/// The backing key-value table, injected into each handler at wiring time.
///
/// All writes are unconditional last-writer-wins; there is no optimistic
/// concurrency token and no transaction spanning multiple records.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Write an item unconditionally, overwriting any record with the same
    /// key. The item must carry its own key field.
    async fn put(&self, item: Record) -> Result<()>;

    /// Fetch a record by key.
    async fn get(&self, beaconid: &str) -> Result<Option<Record>>;

    /// Apply a compiled partial update and return the post-update image,
    /// or `None` if no record exists under the key.
    async fn update(&self, beaconid: &str, expr: &UpdateExpression) -> Result<Option<Record>>;

    /// Remove a record. Deleting an absent key is not an error here; the
    /// handler performs its own existence check first.
    async fn delete(&self, beaconid: &str) -> Result<()>;

    /// Enumerate the table in native order, resuming after `start_key`
    /// when given. No filtering.
    async fn scan(&self, limit: Option<i64>, start_key: Option<&JsonValue>) -> Result<ScanPage>;

    /// Reachability probe for the health endpoint.
    async fn health_check(&self) -> Result<()>;
}

/// Native cursor for a page ending at `beaconid`.
pub(crate) fn cursor_for(beaconid: &str) -> JsonValue {
    let mut cursor = Map::new();
    cursor.insert(
        KEY_FIELD.to_string(),
        JsonValue::String(beaconid.to_string()),
    );
    JsonValue::Object(cursor)
}

/// Extract the key a cursor points at.
pub(crate) fn cursor_key(cursor: &JsonValue) -> Result<&str> {
    cursor
        .get(KEY_FIELD)
        .and_then(JsonValue::as_str)
        .context("continuation token does not name a beaconid")
}

/// In-process `ItemStore` over a `BTreeMap`, used by the handler tests.
///
/// Enumeration order is ascending key order, which doubles as this store's
/// native scan order.
#[derive(Default)]
pub struct MemoryStore {
    items: Mutex<BTreeMap<String, Record>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn put(&self, item: Record) -> Result<()> {
        let beaconid = item
            .get(KEY_FIELD)
            .and_then(JsonValue::as_str)
            .context("item is missing its beaconid")?
            .to_string();
        self.items
            .lock()
            .map_err(|_| anyhow!("item table lock poisoned"))?
            .insert(beaconid, item);
        Ok(())
    }

    async fn get(&self, beaconid: &str) -> Result<Option<Record>> {
        let items = self
            .items
            .lock()
            .map_err(|_| anyhow!("item table lock poisoned"))?;
        Ok(items.get(beaconid).cloned())
    }

    async fn update(&self, beaconid: &str, expr: &UpdateExpression) -> Result<Option<Record>> {
        let mut items = self
            .items
            .lock()
            .map_err(|_| anyhow!("item table lock poisoned"))?;
        match items.get_mut(beaconid) {
            Some(record) => {
                expr.apply_to(record);
                Ok(Some(record.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, beaconid: &str) -> Result<()> {
        self.items
            .lock()
            .map_err(|_| anyhow!("item table lock poisoned"))?
            .remove(beaconid);
        Ok(())
    }

    async fn scan(&self, limit: Option<i64>, start_key: Option<&JsonValue>) -> Result<ScanPage> {
        let start_after = start_key.map(cursor_key).transpose()?.map(str::to_owned);
        let items_guard = self
            .items
            .lock()
            .map_err(|_| anyhow!("item table lock poisoned"))?;

        let remaining: Box<dyn Iterator<Item = &Record>> = match &start_after {
            Some(after) => Box::new(
                items_guard
                    .range::<str, _>((Bound::Excluded(after.as_str()), Bound::Unbounded))
                    .map(|(_, record)| record),
            ),
            None => Box::new(items_guard.values()),
        };

        let mut items = Vec::new();
        let mut more = false;
        for record in remaining {
            if let Some(limit) = limit {
                if items.len() as i64 == limit {
                    more = true;
                    break;
                }
            }
            items.push(record.clone());
        }

        let last_evaluated_key = if more {
            items
                .last()
                .and_then(|record| record.get(KEY_FIELD))
                .and_then(JsonValue::as_str)
                .map(cursor_for)
        } else {
            None
        };

        let count = items.len() as i64;
        Ok(ScanPage {
            items,
            count,
            scanned_count: count,
            last_evaluated_key,
        })
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
