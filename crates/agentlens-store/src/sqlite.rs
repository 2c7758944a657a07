//! SQLite-backed Store — the "document DB" backend named in §1/§4.1.
//!
//! One table per artifact kind, a JSON body column, and indexed `element_id`/
//! `root_id` columns for the traversal queries the data-manager issues most.
//! Query predicates beyond `element_id`/`root_id` are applied in memory after
//! a kind-scoped fetch, the same tradeoff the in-memory backend makes — a
//! real document store would push more of `Query` down to SQL, but this
//! keeps one code path for predicate matching across both backends.

use std::path::Path;
use std::sync::Arc;

use rusqlite::{params, Connection};
use tokio::sync::Mutex;

use agentlens_types::{Element, ElementId, ElementKind, Query};

use crate::error::{StoreError, StoreResult};
use crate::store::Store;

const SCHEMA_TEMPLATE: &str = r#"
CREATE TABLE IF NOT EXISTS elements_{kind} (
    element_id TEXT PRIMARY KEY,
    root_id TEXT,
    body TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_{kind}_root ON elements_{kind}(root_id);
"#;

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> StoreResult<()> {
        use strum::IntoEnumIterator;
        for kind in ElementKind::iter() {
            let sql = SCHEMA_TEMPLATE.replace("{kind}", &kind.to_string());
            conn.execute_batch(&sql)?;
        }
        Ok(())
    }

    fn table(kind: ElementKind) -> String {
        format!("elements_{kind}")
    }
}

#[async_trait::async_trait]
impl Store for SqliteStore {
    async fn store(&self, value: Element) -> StoreResult<ElementId> {
        let kind = value.kind();
        let id = value.element_id().clone();
        let root_id = value.root_id().map(|r| r.to_string());
        let body = serde_json::to_string(&value)?;
        let conn = self.conn.lock().await;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {} (element_id, root_id, body) VALUES (?1, ?2, ?3)",
                Self::table(kind)
            ),
            params![id.as_str(), root_id, body],
        )?;
        Ok(id)
    }

    async fn retrieve(&self, kind: ElementKind, element_id: &ElementId) -> StoreResult<Option<Element>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT body FROM {} WHERE element_id = ?1",
            Self::table(kind)
        ))?;
        let mut rows = stmt.query(params![element_id.as_str()])?;
        match rows.next()? {
            Some(row) => {
                let body: String = row.get(0)?;
                Ok(Some(serde_json::from_str(&body)?))
            }
            None => Ok(None),
        }
    }

    async fn search(&self, kind: ElementKind, query: &Query) -> StoreResult<Vec<Element>> {
        let all = self.get_all(kind).await?;
        Ok(all
            .into_iter()
            .filter(|element| {
                let projected = serde_json::to_value(element).unwrap_or_default();
                query.iter().all(|(field, filter)| {
                    projected.get(field).map(|v| filter.matches(v)).unwrap_or(false)
                })
            })
            .collect())
    }

    async fn update(&self, kind: ElementKind, element_id: &ElementId, new_value: Element) -> StoreResult<bool> {
        let existing = self.retrieve(kind, element_id).await?;
        if existing.is_none() {
            return Ok(false);
        }
        self.store(new_value).await?;
        Ok(true)
    }

    async fn delete(&self, kind: ElementKind, element_id: &ElementId) -> StoreResult<bool> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            &format!("DELETE FROM {} WHERE element_id = ?1", Self::table(kind)),
            params![element_id.as_str()],
        )?;
        Ok(changed > 0)
    }

    async fn get_all(&self, kind: ElementKind) -> StoreResult<Vec<Element>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!("SELECT body FROM {}", Self::table(kind)))?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            let body = row.map_err(StoreError::from)?;
            out.push(serde_json::from_str(&body)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentlens_types::{ElementHeader, QueryFilter, Trace};
    use chrono::Utc;

    fn sample_trace(id: &str) -> Element {
        Element::Trace(Trace {
            header: ElementHeader::new(ElementId::from_string(id)),
            service_name: "svc".to_string(),
            start_time: Utc::now(),
            end_time: Utc::now(),
            num_of_spans: 2,
            agent_ids: vec![],
            failures: Default::default(),
        })
    }

    #[tokio::test]
    async fn store_then_retrieve_roundtrips() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.store(sample_trace("T1")).await.unwrap();
        let back = store
            .retrieve(ElementKind::Trace, &ElementId::from_string("T1"))
            .await
            .unwrap();
        assert!(back.is_some());
    }

    #[tokio::test]
    async fn search_filters_in_memory_after_fetch() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.store(sample_trace("T1")).await.unwrap();
        store.store(sample_trace("T2")).await.unwrap();

        let mut query = Query::new();
        query.insert("element_id".to_string(), QueryFilter::eq("T1"));
        let results = store.search(ElementKind::Trace, &query).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn delete_missing_returns_false() {
        let store = SqliteStore::open_in_memory().unwrap();
        let deleted = store
            .delete(ElementKind::Trace, &ElementId::from_string("missing"))
            .await
            .unwrap();
        assert!(!deleted);
    }
}
