//! The remote data service seam.
//!
//! The grid never talks to a database directly. It hands a [`FetchQuery`] to
//! a [`DataService`] to load a page, and a list of [`TransactionOp`]s to run
//! an edit atomically. [`SqliteDataService`](crate::SqliteDataService) is the
//! bundled implementation; hosts with a remote backend implement the trait
//! over their own client.

use std::future::Future;

use crate::error::ServiceError;
use crate::query::{FetchQuery, RelationShape};
use crate::relation::Row;
use crate::value::{RowKey, Value};

/// One statement of an edit transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionOp {
    /// Write one field of the row identified by `row_id`.
    UpdateField {
        source: String,
        row_id_field: String,
        row_id: RowKey,
        field: String,
        value: Value,
    },
    /// Run an arbitrary statement, typically from an edit hook.
    Execute { sql: String, params: Vec<Value> },
}

impl TransactionOp {
    /// Shorthand for [`TransactionOp::Execute`].
    pub fn execute(sql: impl Into<String>, params: Vec<Value>) -> Self {
        TransactionOp::Execute {
            sql: sql.into(),
            params,
        }
    }
}

/// A backend that loads pages and runs edit transactions.
///
/// Implementations must run `run_transaction` atomically: either every op
/// takes effect or none does.
pub trait DataService: Send + Sync + 'static {
    /// Execute a page query and return rows shaped by `shape`.
    fn fetch_page(
        &self,
        query: &FetchQuery,
        shape: &RelationShape,
    ) -> impl Future<Output = Result<Vec<Row>, ServiceError>> + Send;

    /// Execute `ops` in a single transaction.
    fn run_transaction(
        &self,
        ops: Vec<TransactionOp>,
    ) -> impl Future<Output = Result<(), ServiceError>> + Send;
}
