//! SQLite-backed [`DataService`].
//!
//! Queries and transactions run on Tokio's blocking pool against a single
//! shared connection. Each edit runs inside one SQLite transaction; an error
//! from any op rolls back the whole edit.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{Connection, params, params_from_iter};

use horizon_grid_core::logging::targets;

use crate::error::ServiceError;
use crate::query::{FetchQuery, RelationShape, quote_ident};
use crate::relation::Row;
use crate::service::{DataService, TransactionOp};
use crate::value::{RowKey, Value};

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(*b as i64)),
            Value::Int(n) => ToSqlOutput::Owned(SqlValue::Integer(*n)),
            Value::Float(n) => ToSqlOutput::Owned(SqlValue::Real(*n)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

impl ToSql for RowKey {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            RowKey::Int(n) => ToSqlOutput::Owned(SqlValue::Integer(*n)),
            RowKey::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

fn query_error(err: rusqlite::Error) -> ServiceError {
    ServiceError::Query(err.to_string())
}

fn transaction_error(err: rusqlite::Error) -> ServiceError {
    ServiceError::Transaction(err.to_string())
}

fn join_error(err: tokio::task::JoinError) -> ServiceError {
    ServiceError::Unavailable(err.to_string())
}

/// A [`DataService`] over a local SQLite database.
#[derive(Clone)]
pub struct SqliteDataService {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDataService {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ServiceError> {
        let conn = Connection::open(path).map_err(|e| ServiceError::Unavailable(e.to_string()))?;
        Ok(Self::from_connection(conn))
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, ServiceError> {
        let conn =
            Connection::open_in_memory().map_err(|e| ServiceError::Unavailable(e.to_string()))?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap an existing connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run a batch of statements outside any edit, e.g. to create a schema.
    pub fn execute_batch(&self, sql: &str) -> Result<(), ServiceError> {
        self.conn.lock().execute_batch(sql).map_err(query_error)
    }

    /// Borrow the connection synchronously.
    pub fn with_connection<R>(&self, f: impl FnOnce(&Connection) -> R) -> R {
        f(&self.conn.lock())
    }
}

impl std::fmt::Debug for SqliteDataService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDataService").finish_non_exhaustive()
    }
}

impl DataService for SqliteDataService {
    async fn fetch_page(
        &self,
        query: &FetchQuery,
        shape: &RelationShape,
    ) -> Result<Vec<Row>, ServiceError> {
        let conn = Arc::clone(&self.conn);
        let sql = query.to_sql();
        let shape = shape.clone();

        tokio::task::spawn_blocking(move || {
            tracing::debug!(target: targets::SERVICE, %sql, "executing page query");
            let conn = conn.lock();
            read_rows(&conn, &sql, &shape)
        })
        .await
        .map_err(join_error)?
    }

    async fn run_transaction(&self, ops: Vec<TransactionOp>) -> Result<(), ServiceError> {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock();
            let result = apply_ops(&mut conn, &ops);
            match &result {
                Ok(()) => {
                    tracing::debug!(target: targets::SERVICE, ops = ops.len(), "transaction committed")
                }
                Err(err) => {
                    tracing::warn!(target: targets::SERVICE, error = %err, "transaction rolled back")
                }
            }
            result
        })
        .await
        .map_err(join_error)?
    }
}

fn read_value(row: &rusqlite::Row<'_>, index: usize, field: &str) -> Result<Value, ServiceError> {
    Ok(match row.get_ref(index).map_err(query_error)? {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::Int(n),
        ValueRef::Real(n) => Value::Float(n),
        ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => Value::Text(text.to_string()),
            Err(err) => {
                return Err(ServiceError::Decode {
                    field: field.to_string(),
                    message: format!("text is not valid UTF-8: {err}"),
                });
            }
        },
        ValueRef::Blob(_) => {
            return Err(ServiceError::Decode {
                field: field.to_string(),
                message: "blob values are not supported".to_string(),
            });
        }
    })
}

fn read_rows(conn: &Connection, sql: &str, shape: &RelationShape) -> Result<Vec<Row>, ServiceError> {
    let mut stmt = conn.prepare(sql).map_err(query_error)?;
    let mut cursor = stmt.query([]).map_err(query_error)?;
    let mut rows = Vec::new();

    while let Some(sql_row) = cursor.next().map_err(query_error)? {
        let id_value = read_value(sql_row, 0, &shape.row_id_field)?;
        let id = RowKey::from_value(&id_value).ok_or_else(|| ServiceError::Decode {
            field: shape.row_id_field.clone(),
            message: format!("row identity must be integer or text, got {id_value:?}"),
        })?;

        let mut row = Row::new(id);
        for (offset, field) in shape.fields.iter().enumerate() {
            let raw = read_value(sql_row, offset + 1, &field.name)?;
            let value = field
                .result_type
                .coerce(raw)
                .ok_or_else(|| ServiceError::Decode {
                    field: field.name.clone(),
                    message: format!("expected {:?}", field.result_type),
                })?;
            row.set(field.name.clone(), value);
        }
        rows.push(row);
    }

    Ok(rows)
}

fn apply_ops(conn: &mut Connection, ops: &[TransactionOp]) -> Result<(), ServiceError> {
    let tx = conn.transaction().map_err(transaction_error)?;

    for op in ops {
        match op {
            TransactionOp::UpdateField {
                source,
                row_id_field,
                row_id,
                field,
                value,
            } => {
                let sql = format!(
                    "UPDATE {} SET {} = ?1 WHERE {} = ?2",
                    quote_ident(source),
                    quote_ident(field),
                    quote_ident(row_id_field)
                );
                let changed = tx
                    .execute(&sql, params![value, row_id])
                    .map_err(transaction_error)?;
                if changed == 0 {
                    return Err(ServiceError::RowNotFound(row_id.to_string()));
                }
            }
            TransactionOp::Execute { sql, params } => {
                tx.execute(sql, params_from_iter(params.iter()))
                    .map_err(transaction_error)?;
            }
        }
    }

    tx.commit().map_err(transaction_error)
}
