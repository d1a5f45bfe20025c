use std::path::Path;

use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    data TEXT NOT NULL,
    updated_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (collection, id)
);

CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Users,
    Categories,
    Expenses,
    Imports,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Categories => "categories",
            Self::Expenses => "expenses",
            Self::Imports => "imports",
        }
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Filter {
    Eq(String, Value),
    Gte(String, Value),
    Lte(String, Value),
    In(String, Vec<Value>),
}

/// A filter query over one collection. Every filter is handed to SQLite as a
/// `json_extract` predicate; nothing is filtered client-side.
#[derive(Debug, Clone)]
pub struct Query {
    collection: Collection,
    filters: Vec<Filter>,
    limit: Option<usize>,
}

impl Query {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            filters: Vec::new(),
            limit: None,
        }
    }

    /// Equality. `Value::Null` matches documents where the field is null or absent.
    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(field.to_string(), value.into()));
        self
    }

    pub fn where_gte(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Gte(field.to_string(), value.into()));
        self
    }

    pub fn where_lte(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Lte(field.to_string(), value.into()));
        self
    }

    pub fn where_in<V: Into<Value>>(mut self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.filters.push(Filter::In(field.to_string(), values));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    fn to_sql(&self) -> (String, Vec<SqlValue>) {
        let mut params: Vec<SqlValue> = vec![SqlValue::Text(self.collection.name().to_string())];
        let mut clauses = vec!["collection = ?1".to_string()];

        for filter in &self.filters {
            let clause = match filter {
                Filter::Eq(field, Value::Null) => {
                    params.push(json_path(field));
                    format!("json_extract(data, ?{}) IS NULL", params.len())
                }
                Filter::Eq(field, value) => binary(&mut params, field, "=", value),
                Filter::Gte(field, value) => binary(&mut params, field, ">=", value),
                Filter::Lte(field, value) => binary(&mut params, field, "<=", value),
                Filter::In(_, values) if values.is_empty() => "0".to_string(),
                Filter::In(field, values) => {
                    params.push(json_path(field));
                    let path_idx = params.len();
                    let mut placeholders = Vec::with_capacity(values.len());
                    for v in values {
                        params.push(to_sql_value(v));
                        placeholders.push(format!("?{}", params.len()));
                    }
                    format!(
                        "json_extract(data, ?{path_idx}) IN ({})",
                        placeholders.join(", ")
                    )
                }
            };
            clauses.push(clause);
        }

        let mut sql = format!(
            "SELECT data FROM documents WHERE {} ORDER BY id",
            clauses.join(" AND ")
        );
        if let Some(n) = self.limit {
            sql.push_str(&format!(" LIMIT {n}"));
        }
        (sql, params)
    }
}

fn json_path(field: &str) -> SqlValue {
    SqlValue::Text(format!("$.{field}"))
}

fn binary(params: &mut Vec<SqlValue>, field: &str, op: &str, value: &Value) -> String {
    params.push(json_path(field));
    let path_idx = params.len();
    params.push(to_sql_value(value));
    format!("json_extract(data, ?{path_idx}) {op} ?{}", params.len())
}

/// Maps a JSON scalar onto the SQLite type `json_extract` yields for it.
fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(0.0)),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;
        tracing::debug!(path = %db_path.display(), "opened document store");
        Ok(Self { conn })
    }

    pub fn set_doc<T: Serialize>(&self, collection: Collection, id: &str, doc: &T) -> Result<()> {
        let data = serde_json::to_string(doc)?;
        self.conn.execute(
            "INSERT INTO documents (collection, id, data) VALUES (?1, ?2, ?3) \
             ON CONFLICT(collection, id) DO UPDATE SET data = excluded.data, updated_at = datetime('now')",
            rusqlite::params![collection.name(), id, data],
        )?;
        Ok(())
    }

    pub fn get_doc<T: DeserializeOwned>(&self, collection: Collection, id: &str) -> Result<Option<T>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT data FROM documents WHERE collection = ?1 AND id = ?2")?;
        let mut rows = stmt.query(rusqlite::params![collection.name(), id])?;
        match rows.next()? {
            Some(row) => {
                let data: String = row.get(0)?;
                Ok(Some(serde_json::from_str(&data)?))
            }
            None => Ok(None),
        }
    }

    pub fn delete_doc(&self, collection: Collection, id: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            rusqlite::params![collection.name(), id],
        )?;
        Ok(())
    }

    pub fn get_docs<T: DeserializeOwned>(&self, query: &Query) -> Result<Vec<T>> {
        let (sql, params) = query.to_sql();
        let mut stmt = self.conn.prepare(&sql)?;
        let raw: Vec<String> = stmt
            .query_map(rusqlite::params_from_iter(params.iter()), |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let docs = raw
            .iter()
            .map(|data| serde_json::from_str(data))
            .collect::<std::result::Result<Vec<T>, _>>()?;
        Ok(docs)
    }

    pub fn exists(&self, query: &Query) -> Result<bool> {
        let (sql, params) = query.clone().limit(1).to_sql();
        let mut stmt = self.conn.prepare(&sql)?;
        Ok(stmt.exists(rusqlite::params_from_iter(params.iter()))?)
    }

    pub fn count(&self, collection: Collection) -> Result<i64> {
        let n = self.conn.query_row(
            "SELECT count(*) FROM documents WHERE collection = ?1",
            [collection.name()],
            |r| r.get(0),
        )?;
        Ok(n)
    }

    pub fn batch(&self) -> WriteBatch<'_> {
        WriteBatch {
            store: self,
            ops: Vec::new(),
        }
    }

    pub fn backup_to(&self, dest: &Path) -> Result<()> {
        let mut dest_conn = Connection::open(dest)?;
        let backup = rusqlite::backup::Backup::new(&self.conn, &mut dest_conn)?;
        backup.run_to_completion(100, std::time::Duration::from_millis(10), None)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Write batches
// ---------------------------------------------------------------------------

enum BatchOp {
    Set {
        collection: Collection,
        id: String,
        data: String,
    },
    Delete {
        collection: Collection,
        id: String,
    },
}

/// Buffered writes applied atomically by `commit`.
pub struct WriteBatch<'a> {
    store: &'a Store,
    ops: Vec<BatchOp>,
}

impl WriteBatch<'_> {
    pub fn set<T: Serialize>(&mut self, collection: Collection, id: &str, doc: &T) -> Result<()> {
        self.ops.push(BatchOp::Set {
            collection,
            id: id.to_string(),
            data: serde_json::to_string(doc)?,
        });
        Ok(())
    }

    pub fn delete(&mut self, collection: Collection, id: &str) {
        self.ops.push(BatchOp::Delete {
            collection,
            id: id.to_string(),
        });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn commit(self) -> Result<()> {
        let tx = self.store.conn.unchecked_transaction()?;
        for op in &self.ops {
            match op {
                BatchOp::Set {
                    collection,
                    id,
                    data,
                } => {
                    tx.execute(
                        "INSERT INTO documents (collection, id, data) VALUES (?1, ?2, ?3) \
                         ON CONFLICT(collection, id) DO UPDATE SET data = excluded.data, updated_at = datetime('now')",
                        rusqlite::params![collection.name(), id, data],
                    )?;
                }
                BatchOp::Delete { collection, id } => {
                    tx.execute(
                        "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                        rusqlite::params![collection.name(), id],
                    )?;
                }
            }
        }
        tx.commit()?;
        tracing::debug!(writes = self.len(), "committed write batch");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_store() -> (tempfile::TempDir, Store) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&dir.path().join("test.db")).unwrap();
    (dir, store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Doc {
        id: String,
        day: String,
        tag: Option<String>,
        n: i64,
    }

    fn doc(id: &str, day: &str, tag: Option<&str>, n: i64) -> Doc {
        Doc {
            id: id.to_string(),
            day: day.to_string(),
            tag: tag.map(str::to_string),
            n,
        }
    }

    fn seed(store: &Store) {
        for d in [
            doc("a", "2024-01-05", Some("x"), 1),
            doc("b", "2024-02-10", Some("y"), 2),
            doc("c", "2024-03-15", None, 3),
        ] {
            store.set_doc(Collection::Expenses, &d.id, &d).unwrap();
        }
    }

    #[test]
    fn test_open_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        Store::open(&path).unwrap();
        Store::open(&path).unwrap();
    }

    #[test]
    fn test_set_get_overwrite_delete() {
        let (_dir, store) = test_store();
        store.set_doc(Collection::Expenses, "a", &doc("a", "2024-01-01", None, 1)).unwrap();
        store.set_doc(Collection::Expenses, "a", &doc("a", "2024-01-02", None, 9)).unwrap();
        let got: Doc = store.get_doc(Collection::Expenses, "a").unwrap().unwrap();
        assert_eq!(got.n, 9);
        assert_eq!(store.count(Collection::Expenses).unwrap(), 1);

        store.delete_doc(Collection::Expenses, "a").unwrap();
        let gone: Option<Doc> = store.get_doc(Collection::Expenses, "a").unwrap();
        assert!(gone.is_none());
        // Deleting a missing document is a no-op.
        store.delete_doc(Collection::Expenses, "a").unwrap();
    }

    #[test]
    fn test_collections_are_isolated() {
        let (_dir, store) = test_store();
        store.set_doc(Collection::Imports, "a", &doc("a", "2024-01-01", None, 1)).unwrap();
        let got: Option<Doc> = store.get_doc(Collection::Expenses, "a").unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn test_range_query() {
        let (_dir, store) = test_store();
        seed(&store);
        let q = Query::new(Collection::Expenses)
            .where_gte("day", "2024-01-06")
            .where_lte("day", "2024-03-15");
        let docs: Vec<Doc> = store.get_docs(&q).unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_in_and_eq_queries() {
        let (_dir, store) = test_store();
        seed(&store);
        let docs: Vec<Doc> = store
            .get_docs(&Query::new(Collection::Expenses).where_in("tag", ["x", "y"]))
            .unwrap();
        assert_eq!(docs.len(), 2);

        let docs: Vec<Doc> = store
            .get_docs(&Query::new(Collection::Expenses).where_eq("n", 2))
            .unwrap();
        assert_eq!(docs, vec![doc("b", "2024-02-10", Some("y"), 2)]);

        let docs: Vec<Doc> = store
            .get_docs(&Query::new(Collection::Expenses).where_eq("tag", Value::Null))
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "c");
    }

    #[test]
    fn test_empty_in_matches_nothing() {
        let (_dir, store) = test_store();
        seed(&store);
        let docs: Vec<Doc> = store
            .get_docs(&Query::new(Collection::Expenses).where_in::<&str>("tag", []))
            .unwrap();
        assert!(docs.is_empty());
    }

    #[test]
    fn test_exists_and_limit() {
        let (_dir, store) = test_store();
        seed(&store);
        assert!(store.exists(&Query::new(Collection::Expenses).where_eq("tag", "x")).unwrap());
        assert!(!store.exists(&Query::new(Collection::Expenses).where_eq("tag", "z")).unwrap());
        let docs: Vec<Doc> = store.get_docs(&Query::new(Collection::Expenses).limit(2)).unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[test]
    fn test_batch_commits_all_writes() {
        let (_dir, store) = test_store();
        seed(&store);
        let mut batch = store.batch();
        batch.set(Collection::Imports, "i1", &doc("i1", "2024-04-01", None, 0)).unwrap();
        batch.delete(Collection::Expenses, "a");
        batch.delete(Collection::Expenses, "b");
        assert_eq!(batch.len(), 3);
        batch.commit().unwrap();
        assert_eq!(store.count(Collection::Expenses).unwrap(), 1);
        assert_eq!(store.count(Collection::Imports).unwrap(), 1);
    }

    #[test]
    fn test_dropped_batch_writes_nothing() {
        let (_dir, store) = test_store();
        {
            let mut batch = store.batch();
            batch.set(Collection::Imports, "i1", &doc("i1", "2024-04-01", None, 0)).unwrap();
        }
        assert_eq!(store.count(Collection::Imports).unwrap(), 0);
    }

    #[test]
    fn test_backup_copies_documents() {
        let (dir, store) = test_store();
        seed(&store);
        let dest = dir.path().join("backup.db");
        store.backup_to(&dest).unwrap();
        let copy = Store::open(&dest).unwrap();
        assert_eq!(copy.count(Collection::Expenses).unwrap(), 3);
    }
}
