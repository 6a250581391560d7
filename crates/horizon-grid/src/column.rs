//! Column model.
//!
//! A [`Column`] is the static, caller-supplied description of one grid field.
//! Columns with a [`QueryGeneration`] contribute a projected field to the
//! fetch query and may be sorted and edited; columns without one are
//! presentation-only and always receive [`Value::Null`].
//!
//! Rendering is delegated: each column may carry a cell delegate and a header
//! delegate that turn values into display text. Without them the grid falls
//! back to [`Value::display_text`] and the column title.
//!
//! # Example
//!
//! ```
//! use horizon_grid::{Column, ColumnModel, ResultType, Value};
//!
//! let columns = ColumnModel::new(vec![
//!     Column::new(0, "Name")
//!         .with_query("name", "name", ResultType::Text)
//!         .with_validator(|v| match v.as_text() {
//!             Some(s) if !s.trim().is_empty() => Ok(()),
//!             _ => Err("name is required".to_string()),
//!         }),
//!     Column::new(1, "Actions").with_width(64),
//! ])
//! .unwrap();
//!
//! assert!(columns.get(0).unwrap().is_sortable());
//! assert!(!columns.get(1).unwrap().is_sortable());
//! assert!(columns.get(0).unwrap().validate(&Value::from("")).is_err());
//! ```

use std::fmt;
use std::sync::Arc;

use crate::error::{GridError, Result};
use crate::input::{CellEvent, HeaderEvent};
use crate::state::SortOrder;
use crate::value::{ResultType, Value};

/// Default width for columns that do not set one.
pub const DEFAULT_COLUMN_WIDTH: u32 = 120;

/// Validates a pending edit value, returning a field-local message on failure.
pub type Validator = Arc<dyn Fn(&Value) -> std::result::Result<(), String> + Send + Sync>;
/// Turns a cell value into display text.
pub type CellDelegate = Arc<dyn Fn(&Value) -> String + Send + Sync>;
/// Turns a title and sort indicator into header text.
pub type HeaderDelegate = Arc<dyn Fn(&str, Option<SortOrder>) -> String + Send + Sync>;
/// Callback for cell click and keydown events.
pub type CellHandler = Arc<dyn Fn(&CellEvent) + Send + Sync>;
/// Callback for header click and keydown events.
pub type HeaderHandler = Arc<dyn Fn(&HeaderEvent) + Send + Sync>;

/// How a column is projected into the fetch query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryGeneration {
    /// SQL expression evaluated per row.
    pub expr: String,
    /// Alias the expression is projected as. Sorting orders by this field.
    pub generated_field_name: String,
    /// Declared type of the projected values.
    pub result_type: ResultType,
    /// Underlying column written by edits. Defaults to the generated field.
    pub update_field: Option<String>,
}

impl QueryGeneration {
    /// Create a new query generation.
    pub fn new(
        expr: impl Into<String>,
        generated_field_name: impl Into<String>,
        result_type: ResultType,
    ) -> Self {
        Self {
            expr: expr.into(),
            generated_field_name: generated_field_name.into(),
            result_type,
            update_field: None,
        }
    }

    /// The field an edit of this column writes to.
    pub fn update_field(&self) -> &str {
        self.update_field
            .as_deref()
            .unwrap_or(&self.generated_field_name)
    }
}

/// Click and keydown callbacks for one granularity (cell or header).
#[derive(Clone)]
pub struct Handlers<H> {
    /// Invoked on pointer click.
    pub on_click: Option<H>,
    /// Invoked on keydown.
    pub on_keydown: Option<H>,
}

impl<H> Default for Handlers<H> {
    fn default() -> Self {
        Self {
            on_click: None,
            on_keydown: None,
        }
    }
}

/// A static descriptor of one grid column.
#[derive(Clone)]
pub struct Column {
    index: usize,
    title: String,
    query_generation: Option<QueryGeneration>,
    initial_width: u32,
    cell_delegate: Option<CellDelegate>,
    header_delegate: Option<HeaderDelegate>,
    cell_handlers: Handlers<CellHandler>,
    header_handlers: Handlers<HeaderHandler>,
    validator: Option<Validator>,
}

impl Column {
    /// Create a presentation-only column.
    pub fn new(index: usize, title: impl Into<String>) -> Self {
        Self {
            index,
            title: title.into(),
            query_generation: None,
            initial_width: DEFAULT_COLUMN_WIDTH,
            cell_delegate: None,
            header_delegate: None,
            cell_handlers: Handlers::default(),
            header_handlers: Handlers::default(),
            validator: None,
        }
    }

    /// Project this column from `expr` as `field`.
    pub fn with_query(
        mut self,
        expr: impl Into<String>,
        field: impl Into<String>,
        result_type: ResultType,
    ) -> Self {
        self.query_generation = Some(QueryGeneration::new(expr, field, result_type));
        self
    }

    /// Set a fully specified query generation.
    pub fn with_query_generation(mut self, generation: QueryGeneration) -> Self {
        self.query_generation = Some(generation);
        self
    }

    /// Set the initial width in pixels.
    pub fn with_width(mut self, width: u32) -> Self {
        self.initial_width = width;
        self
    }

    /// Set the cell delegate.
    pub fn with_cell_delegate<F>(mut self, delegate: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.cell_delegate = Some(Arc::new(delegate));
        self
    }

    /// Set the header delegate.
    pub fn with_header_delegate<F>(mut self, delegate: F) -> Self
    where
        F: Fn(&str, Option<SortOrder>) -> String + Send + Sync + 'static,
    {
        self.header_delegate = Some(Arc::new(delegate));
        self
    }

    /// Set the edit validator.
    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Set the cell click handler.
    pub fn on_cell_click<F>(mut self, handler: F) -> Self
    where
        F: Fn(&CellEvent) + Send + Sync + 'static,
    {
        self.cell_handlers.on_click = Some(Arc::new(handler));
        self
    }

    /// Set the cell keydown handler.
    pub fn on_cell_keydown<F>(mut self, handler: F) -> Self
    where
        F: Fn(&CellEvent) + Send + Sync + 'static,
    {
        self.cell_handlers.on_keydown = Some(Arc::new(handler));
        self
    }

    /// Set the header click handler.
    pub fn on_header_click<F>(mut self, handler: F) -> Self
    where
        F: Fn(&HeaderEvent) + Send + Sync + 'static,
    {
        self.header_handlers.on_click = Some(Arc::new(handler));
        self
    }

    /// Set the header keydown handler.
    pub fn on_header_keydown<F>(mut self, handler: F) -> Self
    where
        F: Fn(&HeaderEvent) + Send + Sync + 'static,
    {
        self.header_handlers.on_keydown = Some(Arc::new(handler));
        self
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn initial_width(&self) -> u32 {
        self.initial_width
    }

    pub fn query_generation(&self) -> Option<&QueryGeneration> {
        self.query_generation.as_ref()
    }

    /// Whether the column can be the active sort column.
    pub fn is_sortable(&self) -> bool {
        self.query_generation.is_some()
    }

    /// The generated field name, if the column is projected.
    pub fn field_name(&self) -> Option<&str> {
        self.query_generation
            .as_ref()
            .map(|g| g.generated_field_name.as_str())
    }

    /// Run the validator, accepting everything when none is set.
    pub fn validate(&self, value: &Value) -> std::result::Result<(), String> {
        match &self.validator {
            Some(validator) => validator(value),
            None => Ok(()),
        }
    }

    /// Display text for a cell value.
    pub fn render_cell(&self, value: &Value) -> String {
        match &self.cell_delegate {
            Some(delegate) => delegate(value),
            None => value.display_text(),
        }
    }

    /// Display text for the header.
    pub fn render_header(&self, sort: Option<SortOrder>) -> String {
        match &self.header_delegate {
            Some(delegate) => delegate(&self.title, sort),
            None => self.title.clone(),
        }
    }

    pub(crate) fn cell_handlers(&self) -> &Handlers<CellHandler> {
        &self.cell_handlers
    }

    pub(crate) fn header_handlers(&self) -> &Handlers<HeaderHandler> {
        &self.header_handlers
    }
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("index", &self.index)
            .field("title", &self.title)
            .field("query_generation", &self.query_generation)
            .field("initial_width", &self.initial_width)
            .field("has_validator", &self.validator.is_some())
            .finish()
    }
}

/// The ordered, immutable set of columns of one grid.
#[derive(Debug, Clone)]
pub struct ColumnModel {
    columns: Vec<Column>,
}

impl ColumnModel {
    /// Create a column model, checking that each column's index is its position.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        for (position, column) in columns.iter().enumerate() {
            if column.index != position {
                return Err(GridError::ColumnIndexMismatch {
                    index: column.index,
                    position,
                });
            }
        }
        Ok(Self { columns })
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Like [`get`](Self::get) but returns an error for a missing column.
    pub fn column(&self, index: usize) -> Result<&Column> {
        self.columns
            .get(index)
            .ok_or(GridError::ColumnOutOfRange(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    /// Sortable columns in column order.
    pub fn sortable(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.is_sortable())
    }

    /// The column Tab moves to, or `None` on the last column.
    pub fn next_index(&self, index: usize) -> Option<usize> {
        let next = index + 1;
        (next < self.columns.len()).then_some(next)
    }

    /// Initial widths in column order.
    pub fn initial_widths(&self) -> Vec<u32> {
        self.columns.iter().map(|c| c.initial_width).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn model() -> ColumnModel {
        ColumnModel::new(vec![
            Column::new(0, "Name").with_query("name", "name", ResultType::Text),
            Column::new(1, "Total")
                .with_query("price * qty", "total", ResultType::Real)
                .with_width(80),
            Column::new(2, "Actions"),
        ])
        .unwrap()
    }

    #[test]
    fn test_index_mismatch_rejected() {
        let err = ColumnModel::new(vec![Column::new(1, "A")]).unwrap_err();
        assert!(matches!(
            err,
            GridError::ColumnIndexMismatch { index: 1, position: 0 }
        ));
    }

    #[test]
    fn test_sortable_and_fields() {
        let model = model();
        let sortable: Vec<_> = model.sortable().map(|c| c.index()).collect();
        assert_eq!(sortable, vec![0, 1]);
        assert_eq!(model.get(1).unwrap().field_name(), Some("total"));
        assert_eq!(model.get(2).unwrap().field_name(), None);
    }

    #[test]
    fn test_next_index() {
        let model = model();
        assert_eq!(model.next_index(0), Some(1));
        assert_eq!(model.next_index(1), Some(2));
        assert_eq!(model.next_index(2), None);
    }

    #[test]
    fn test_initial_widths() {
        assert_eq!(model().initial_widths(), vec![DEFAULT_COLUMN_WIDTH, 80, DEFAULT_COLUMN_WIDTH]);
    }

    #[test]
    fn test_update_field_defaults_to_generated_field() {
        let mut generation = QueryGeneration::new("upper(name)", "name_upper", ResultType::Text);
        assert_eq!(generation.update_field(), "name_upper");
        generation.update_field = Some("name".into());
        assert_eq!(generation.update_field(), "name");
    }

    #[test]
    fn test_delegates() {
        let column = Column::new(0, "Price")
            .with_cell_delegate(|v| format!("${}", v))
            .with_header_delegate(|title, sort| match sort {
                Some(SortOrder::Ascending) => format!("{title} ^"),
                Some(SortOrder::Descending) => format!("{title} v"),
                None => title.to_string(),
            });
        assert_eq!(column.render_cell(&Value::Int(5)), "$5");
        assert_eq!(column.render_header(Some(SortOrder::Descending)), "Price v");
        assert_eq!(column.render_header(None), "Price");
    }

    #[test]
    fn test_handlers_are_stored() {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        let column = Column::new(0, "A").on_cell_click(move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        let event = CellEvent {
            position: crate::input::CellPosition::new(0, 0),
            row_id: None,
            key: None,
        };
        if let Some(handler) = &column.cell_handlers().on_click {
            handler(&event);
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
