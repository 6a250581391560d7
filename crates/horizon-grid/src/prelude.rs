//! Prelude module for Horizon Grid.
//!
//! ```ignore
//! use horizon_grid::prelude::*;
//! ```
//!
//! This provides access to:
//! - The grid facade and its configuration (`Grid`, `GridConfig`)
//! - Column model types (`Column`, `ColumnModel`, `ResultType`)
//! - Input and outcome types (`CellPosition`, `Key`, `KeyOutcome`, `CommitOutcome`)
//! - The data service seam (`DataService`, `TransactionOp`)
//! - Signal/slot and runtime types from the core crate

// ============================================================================
// Grid
// ============================================================================

pub use crate::{CommitOutcome, Grid, GridConfig, GridFrame, KeyOutcome};

// ============================================================================
// Columns and Values
// ============================================================================

pub use crate::{Column, ColumnModel, ResultType, RowKey, Value};

// ============================================================================
// Input and Editing
// ============================================================================

pub use crate::{CellPosition, CommitTrigger, EditHooks, EditResult, Key};

// ============================================================================
// Data Service
// ============================================================================

pub use crate::{DataService, FetchOutcome, FetchStatus, Row, ServiceError, TransactionOp};

#[cfg(feature = "sqlite")]
pub use crate::SqliteDataService;

// ============================================================================
// Core
// ============================================================================

pub use horizon_grid_core::{AsyncRuntime, Property, Signal};
