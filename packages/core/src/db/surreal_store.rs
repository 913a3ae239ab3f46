//! SurrealStore - DocumentStore Implementation for SurrealDB Backend
//!
//! Stores each list node as one record of a SCHEMALESS table. The record key
//! is the generated UUID and is duplicated into the `_id` field so the
//! `Filter` vocabulary can address it like any other field.
//!
//! # Design Principles
//!
//! 1. **Embedded**: `kv-mem` always; `kv-rocksdb` for on-disk lists behind the
//!    `rocksdb` feature
//! 2. **SCHEMALESS**: Payload fields are stored as-is beside the link fields
//! 3. **Conditional Writes**: `update_one` / `delete_one` re-evaluate the filter
//!    inside the write statement, so a record that changed since it was
//!    selected is left alone and reported as unmatched
//!
//! # Examples
//!
//! ```rust,no_run
//! use linked_collection::db::SurrealStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let _store = SurrealStore::new_in_memory("playlist").await?;
//!     Ok(())
//! }
//! ```

use crate::db::{Document, DocumentStore, Filter, Update, UpdateResult};
use crate::models::{NodeId, ID_FIELD};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
#[cfg(feature = "rocksdb")]
use std::path::PathBuf;
use std::sync::Arc;
use surrealdb::engine::local::{Db, Mem};
#[cfg(feature = "rocksdb")]
use surrealdb::engine::local::RocksDb;
use surrealdb::Surreal;
use uuid::Uuid;

const NAMESPACE: &str = "linked_collection";
const DATABASE: &str = "lists";

/// Projection used when only the written record's id is needed back
#[derive(Debug, Deserialize)]
struct WrittenRecord {
    #[serde(rename = "_id")]
    id: String,
}

/// Compiled WHERE clause plus its bound parameters
struct Condition {
    clause: String,
    params: Vec<(String, Value)>,
}

/// DocumentStore over an embedded SurrealDB table
pub struct SurrealStore {
    db: Arc<Surreal<Db>>,
    table: String,
}

impl SurrealStore {
    /// Open (or create) an on-disk store using the RocksDB engine
    ///
    /// # Errors
    ///
    /// Returns error if the table name is not a plain identifier, or if the
    /// engine or schema fails to initialize.
    #[cfg(feature = "rocksdb")]
    pub async fn new(db_path: PathBuf, table: &str) -> Result<Self> {
        let db = Surreal::new::<RocksDb>(db_path)
            .await
            .context("Failed to initialize SurrealDB with RocksDB backend")?;
        Self::init(db, table).await
    }

    /// Open a throwaway store using the in-memory engine
    pub async fn new_in_memory(table: &str) -> Result<Self> {
        let db = Surreal::new::<Mem>(())
            .await
            .context("Failed to initialize in-memory SurrealDB")?;
        Self::init(db, table).await
    }

    async fn init(db: Surreal<Db>, table: &str) -> Result<Self> {
        ensure_identifier(table)?;

        db.use_ns(NAMESPACE)
            .use_db(DATABASE)
            .await
            .context("Failed to set namespace/database")?;

        let store = Self {
            db: Arc::new(db),
            table: table.to_string(),
        };
        store.initialize_schema().await?;

        tracing::debug!("SurrealStore ready (table '{}')", store.table);
        Ok(store)
    }

    async fn initialize_schema(&self) -> Result<()> {
        let table = &self.table;
        self.db
            .query(format!(
                "
                DEFINE TABLE IF NOT EXISTS {table} SCHEMALESS;
                DEFINE INDEX IF NOT EXISTS {table}_id_idx ON TABLE {table} FIELDS _id UNIQUE;
                DEFINE INDEX IF NOT EXISTS {table}_next_idx ON TABLE {table} FIELDS next;
                "
            ))
            .await
            .context("Failed to create list table")?
            .check()
            .context("List table definition was rejected")?;
        Ok(())
    }

    /// Id of the first record matching `filter`, if any
    async fn first_id(&self, filter: &Filter) -> Result<Option<String>> {
        let doc = self.find(filter, Some(1)).await?.into_iter().next();
        Ok(doc.and_then(|d| d.get(ID_FIELD).and_then(Value::as_str).map(str::to_string)))
    }
}

#[async_trait]
impl DocumentStore for SurrealStore {
    async fn find(&self, filter: &Filter, limit: Option<usize>) -> Result<Vec<Document>> {
        let condition = compile_filter(filter)?;
        let sql = match limit {
            Some(_) => format!(
                "SELECT * OMIT id FROM type::table($table) WHERE {} LIMIT $limit;",
                condition.clause
            ),
            None => format!(
                "SELECT * OMIT id FROM type::table($table) WHERE {};",
                condition.clause
            ),
        };

        let mut query = self.db.query(sql).bind(("table", self.table.clone()));
        if let Some(limit) = limit {
            query = query.bind(("limit", limit));
        }
        for param in condition.params {
            query = query.bind(param);
        }

        let mut response = query
            .await
            .context("Failed to query list records")?
            .check()
            .context("List record query was rejected")?;

        let docs: Vec<Document> = response
            .take(0)
            .context("Failed to extract query results")?;
        Ok(docs)
    }

    async fn insert_one(&self, mut doc: Document) -> Result<NodeId> {
        let id = Uuid::new_v4().to_string();
        doc.insert(ID_FIELD.to_string(), Value::String(id.clone()));

        self.db
            .query("CREATE type::thing($table, $id) CONTENT $doc;")
            .bind(("table", self.table.clone()))
            .bind(("id", id.clone()))
            .bind(("doc", Value::Object(doc)))
            .await
            .context("Failed to create list record")?
            .check()
            .context("List record creation was rejected")?;

        Ok(NodeId::from(id))
    }

    async fn update_one(&self, filter: &Filter, update: &Update) -> Result<UpdateResult> {
        let Some(target) = self.first_id(filter).await? else {
            return Ok(UpdateResult::default());
        };
        if update.is_empty() {
            return Ok(UpdateResult {
                matched: 1,
                modified: 0,
            });
        }

        let condition = compile_filter(filter)?;
        let mut assignments = Vec::new();
        let mut params = condition.params;
        for (i, (field, value)) in update.set.iter().enumerate() {
            ensure_identifier(field)?;
            let name = format!("s{}", i);
            assignments.push(format!("{} = ${}", field, name));
            params.push((name, value.clone()));
        }
        for field in &update.unset {
            ensure_identifier(field)?;
            assignments.push(format!("{} = NONE", field));
        }

        let sql = format!(
            "UPDATE type::thing($table, $target) SET {} WHERE {} RETURN AFTER;",
            assignments.join(", "),
            condition.clause
        );

        let mut query = self
            .db
            .query(sql)
            .bind(("table", self.table.clone()))
            .bind(("target", target));
        for param in params {
            query = query.bind(param);
        }

        let mut response = query
            .await
            .context("Failed to update list record")?
            .check()
            .context("List record update was rejected")?;

        let written: Vec<WrittenRecord> = response
            .take(0)
            .context("Failed to extract update results")?;
        let matched = written.len() as u64;

        Ok(UpdateResult {
            matched,
            modified: matched,
        })
    }

    async fn delete_one(&self, filter: &Filter) -> Result<bool> {
        let Some(target) = self.first_id(filter).await? else {
            return Ok(false);
        };

        let condition = compile_filter(filter)?;
        let sql = format!(
            "DELETE type::thing($table, $target) WHERE {} RETURN BEFORE;",
            condition.clause
        );

        let mut query = self
            .db
            .query(sql)
            .bind(("table", self.table.clone()))
            .bind(("target", target));
        for param in condition.params {
            query = query.bind(param);
        }

        let mut response = query
            .await
            .context("Failed to delete list record")?
            .check()
            .context("List record deletion was rejected")?;

        let removed: Vec<WrittenRecord> = response
            .take(0)
            .context("Failed to extract delete results")?;
        if let Some(record) = removed.first() {
            tracing::debug!("Deleted list record '{}'", record.id);
        }
        Ok(!removed.is_empty())
    }
}

/// Translate a `Filter` into a SurrealQL WHERE clause
///
/// Field names are spliced into the statement, so they must be plain
/// identifiers; values always travel as bound parameters.
fn compile_filter(filter: &Filter) -> Result<Condition> {
    let mut params = Vec::new();
    let clause = compile_into(filter, &mut params)?;
    Ok(Condition { clause, params })
}

fn compile_into(filter: &Filter, params: &mut Vec<(String, Value)>) -> Result<String> {
    Ok(match filter {
        Filter::All => "true".to_string(),
        Filter::IdEq(id) => {
            let name = format!("p{}", params.len());
            params.push((name.clone(), Value::String(id.as_str().to_string())));
            format!("{} = ${}", ID_FIELD, name)
        }
        Filter::FieldEq(field, value) => {
            ensure_identifier(field)?;
            let name = format!("p{}", params.len());
            params.push((name.clone(), value.clone()));
            format!("{} = ${}", field, name)
        }
        Filter::FieldAbsent(field) => {
            ensure_identifier(field)?;
            format!("({field} = NONE OR {field} = NULL)")
        }
        Filter::And(filters) if filters.is_empty() => "true".to_string(),
        Filter::And(filters) => {
            let parts = filters
                .iter()
                .map(|f| compile_into(f, params).map(|c| format!("({})", c)))
                .collect::<Result<Vec<_>>>()?;
            parts.join(" AND ")
        }
    })
}

fn ensure_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        bail!("'{}' is not a valid SurrealDB identifier", name);
    }
    Ok(())
}

impl std::fmt::Debug for SurrealStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurrealStore")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}
