//! The materialized result relation.
//!
//! [`ResultRelation`] holds the page of rows most recently fetched for a grid,
//! keyed by row identity. A fetch replaces the whole page (a model reset); an
//! optimistic edit changes one field of one row (a data change). Both are
//! announced through [`RelationSignals`] so the renderer can diff rows by
//! [`RowKey`] instead of rebuilding everything.

use std::collections::HashMap;

use parking_lot::RwLock;

use horizon_grid_core::logging::targets;
use horizon_grid_core::{Property, Signal};

use crate::query::RelationShape;
use crate::value::{RowKey, Value};

/// One row of the result relation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    id: Option<RowKey>,
    values: HashMap<String, Value>,
}

impl Row {
    /// Create an empty row with the given identity.
    pub fn new(id: impl Into<RowKey>) -> Self {
        Self {
            id: Some(id.into()),
            values: HashMap::new(),
        }
    }

    /// Builder-style field assignment.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(field.into(), value.into());
        self
    }

    /// The row identity. Always set for rows built with [`Row::new`].
    pub fn id(&self) -> Option<&RowKey> {
        self.id.as_ref()
    }

    /// A field's value; missing fields read as `Null`.
    pub fn get(&self, field: &str) -> Value {
        self.values.get(field).cloned().unwrap_or_default()
    }

    /// Set a field, returning the previous value.
    pub fn set(&mut self, field: impl Into<String>, value: Value) -> Value {
        self.values.insert(field.into(), value).unwrap_or_default()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Load state of the result relation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FetchStatus {
    /// Nothing has been requested yet.
    #[default]
    Idle,
    /// A fetch is in flight.
    Loading,
    /// The last fetch succeeded.
    Ready,
    /// The last fetch failed with this message.
    Failed(String),
}

impl FetchStatus {
    pub fn is_loading(&self) -> bool {
        matches!(self, FetchStatus::Loading)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            FetchStatus::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Change notifications for [`ResultRelation`].
#[derive(Debug, Default)]
pub struct RelationSignals {
    /// Emitted just before the rows are replaced.
    pub model_about_to_be_reset: Signal<()>,
    /// Emitted after the rows are replaced, with the new row count.
    pub model_reset: Signal<usize>,
    /// Emitted when one field of one row changes. Args: (row id, field).
    pub data_changed: Signal<(RowKey, String)>,
    /// Emitted with the new fetch status.
    pub status_changed: Signal<FetchStatus>,
}

#[derive(Debug, Default)]
struct RelationData {
    rows: Vec<Row>,
    index: HashMap<RowKey, usize>,
}

/// The current page of rows.
#[derive(Debug)]
pub struct ResultRelation {
    shape: RelationShape,
    data: RwLock<RelationData>,
    status: Property<FetchStatus>,
    signals: RelationSignals,
}

impl ResultRelation {
    /// Create an empty relation with a declared shape.
    pub fn new(shape: RelationShape) -> Self {
        Self {
            shape,
            data: RwLock::new(RelationData::default()),
            status: Property::default(),
            signals: RelationSignals::default(),
        }
    }

    pub fn shape(&self) -> &RelationShape {
        &self.shape
    }

    pub fn signals(&self) -> &RelationSignals {
        &self.signals
    }

    pub fn status(&self) -> FetchStatus {
        self.status.get()
    }

    /// Update the fetch status.
    pub fn set_status(&self, status: FetchStatus) {
        if self.status.set(status.clone()) {
            tracing::trace!(target: targets::FETCH, ?status, "relation status changed");
            self.signals.status_changed.emit(status);
        }
    }

    /// Replace every row. Rows without identity are dropped; a repeated
    /// identity keeps the first row.
    pub fn reset(&self, rows: Vec<Row>) {
        self.signals.model_about_to_be_reset.emit(());

        let count = {
            let mut data = self.data.write();
            data.rows.clear();
            data.index.clear();
            for row in rows {
                let Some(id) = row.id.clone() else {
                    tracing::warn!(target: targets::FETCH, "dropping row without identity");
                    continue;
                };
                if data.index.contains_key(&id) {
                    tracing::warn!(target: targets::FETCH, %id, "dropping duplicate row");
                    continue;
                }
                let position = data.rows.len();
                data.index.insert(id, position);
                data.rows.push(row);
            }
            data.rows.len()
        };

        self.signals.model_reset.emit(count);
    }

    pub fn len(&self) -> usize {
        self.data.read().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().rows.is_empty()
    }

    /// A copy of the row at `row`.
    pub fn row(&self, row: usize) -> Option<Row> {
        self.data.read().rows.get(row).cloned()
    }

    /// Copies of all rows in page order.
    pub fn rows(&self) -> Vec<Row> {
        self.data.read().rows.clone()
    }

    /// Identity of the row at `row`.
    pub fn row_id(&self, row: usize) -> Option<RowKey> {
        self.data.read().rows.get(row).and_then(|r| r.id.clone())
    }

    /// Position of the row with identity `id`.
    pub fn position_of(&self, id: &RowKey) -> Option<usize> {
        self.data.read().index.get(id).copied()
    }

    /// Value at `(row, field)`; `Null` if either is missing.
    pub fn value(&self, row: usize, field: &str) -> Value {
        self.data
            .read()
            .rows
            .get(row)
            .map(|r| r.get(field))
            .unwrap_or_default()
    }

    /// Value of `field` in the row with identity `id`.
    pub fn value_by_id(&self, id: &RowKey, field: &str) -> Option<Value> {
        let data = self.data.read();
        let position = *data.index.get(id)?;
        Some(data.rows[position].get(field))
    }

    /// Overwrite one field of one row, returning the previous value.
    ///
    /// Returns `None` if no row has identity `id`.
    pub fn set_value(&self, id: &RowKey, field: &str, value: Value) -> Option<Value> {
        let previous = {
            let mut data = self.data.write();
            let position = *data.index.get(id)?;
            data.rows[position].set(field, value)
        };
        self.signals.data_changed.emit((id.clone(), field.to_string()));
        Some(previous)
    }
}
