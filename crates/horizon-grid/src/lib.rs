//! Horizon Grid: a server-backed data grid engine.
//!
//! This crate turns a declarative column model into:
//!
//! - a paginated, sortable page query against a relational data service,
//! - a per-instance interaction state machine (focus, edit mode, sort, page
//!   size, column widths), and
//! - an optimistic single-cell edit protocol that rolls back on failure.
//!
//! Rendering stays with the host: it forwards input through the `on_*` hooks
//! of [`Grid`], listens to the signals on [`GridState`] and [`ResultRelation`],
//! and draws [`GridFrame`] snapshots.
//!
//! # Modules
//!
//! - [`column`]: column descriptors, validators, delegates and handlers
//! - [`query`]: the sort dispatch table and SQL rendering
//! - [`state`]: the interaction state machine
//! - [`editor`]: the inline editor's pending value and validation
//! - [`relation`]: the materialized page of rows
//! - [`edit`]: the optimistic edit protocol
//! - [`service`]: the data service trait
//! - [`grid`]: the facade tying everything together
//!
//! # Logging
//!
//! All logging goes through `tracing` under the targets listed in
//! [`horizon_grid_core::logging::targets`].

pub mod column;
pub mod config;
pub mod edit;
pub mod editor;
mod error;
mod fetch;
pub mod frame;
pub mod grid;
pub mod input;
pub mod prelude;
pub mod query;
pub mod relation;
pub mod service;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod state;
pub mod value;

pub use column::{Column, ColumnModel, QueryGeneration};
pub use config::GridConfig;
pub use edit::{EditContext, EditHooks, EditResult, OptimisticWrite};
pub use editor::{CellEditor, CommitTrigger, EditOutcome};
pub use error::{ConfigError, GridError, QueryError, Result, ServiceError};
pub use fetch::FetchOutcome;
pub use frame::{CellFrame, GridFrame, HeaderFrame, RowFrame};
pub use grid::{CommitOutcome, Grid, KeyOutcome};
pub use input::{CellEvent, CellPosition, HeaderEvent, Key};
pub use query::{FetchQuery, QueryPlan, QueryVariant, RelationShape};
pub use relation::{FetchStatus, ResultRelation, Row};
pub use service::{DataService, TransactionOp};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDataService;
pub use state::{EditingState, ErrorBanner, FocusState, GridSignals, GridState, SortOrder, SortState};
pub use value::{ResultType, RowKey, Value};

pub use horizon_grid_core;
