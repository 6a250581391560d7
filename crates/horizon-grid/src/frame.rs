//! Render snapshots.
//!
//! A [`GridFrame`] is everything a host renderer needs to draw the grid once:
//! per-column header content and width, and per-cell value, display text,
//! editing and focus flags, row identity and the Tab target. Widths are read
//! from the state on every build, so a resize shows up in the next frame.

use horizon_grid_core::PerfSpan;
use horizon_grid_core::logging::span_names;

use crate::column::ColumnModel;
use crate::editor::CellEditor;
use crate::input::CellPosition;
use crate::relation::{FetchStatus, ResultRelation};
use crate::state::{GridState, SortOrder};
use crate::value::{RowKey, Value};

/// Render inputs for one column header.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderFrame {
    pub column: usize,
    /// Header text from the column's header delegate.
    pub content: String,
    /// Current width in pixels.
    pub width: u32,
    /// Sort indicator when this is the sort column.
    pub sort: Option<SortOrder>,
    pub sortable: bool,
}

/// Render inputs for one cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CellFrame {
    pub column: usize,
    /// Committed value. Presentation-only columns are always `Null`.
    pub value: Value,
    /// Display text from the column's cell delegate.
    pub text: String,
    /// Whether this cell shows the inline editor.
    pub editing: bool,
    /// Whether this cell holds focus.
    pub focused: bool,
    /// The editor's pending value while editing.
    pub pending: Option<Value>,
    /// Column Tab moves to, `None` on the last column.
    pub next_column: Option<usize>,
}

/// Render inputs for one row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowFrame {
    pub row: usize,
    pub row_id: Option<RowKey>,
    pub cells: Vec<CellFrame>,
}

/// A full render snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct GridFrame {
    pub headers: Vec<HeaderFrame>,
    pub rows: Vec<RowFrame>,
    pub status: FetchStatus,
    pub saving_edit: bool,
    pub error_message: Option<String>,
    /// Validation message of the open editor.
    pub field_error: Option<String>,
    /// Whether the last page was full, so fetch-more may return more rows.
    pub can_fetch_more: bool,
}

impl GridFrame {
    pub fn cell(&self, position: CellPosition) -> Option<&CellFrame> {
        self.rows.get(position.row)?.cells.get(position.column)
    }
}

pub(crate) fn build(
    columns: &ColumnModel,
    state: &GridState,
    relation: &ResultRelation,
    editor: Option<&CellEditor>,
    paginate: bool,
) -> GridFrame {
    let _span = PerfSpan::new(span_names::BUILD_FRAME);
    let sort = state.sort();
    let focus = state.focus();
    let editing = state.editing();

    let headers = columns
        .iter()
        .map(|column| {
            let indicator = sort.indicator_for(column.index());
            HeaderFrame {
                column: column.index(),
                content: column.render_header(indicator),
                width: state
                    .column_width(column.index())
                    .unwrap_or(column.initial_width()),
                sort: indicator,
                sortable: column.is_sortable(),
            }
        })
        .collect();

    let rows: Vec<RowFrame> = relation
        .rows()
        .into_iter()
        .enumerate()
        .map(|(row_index, row)| {
            let cells = columns
                .iter()
                .map(|column| {
                    let position = CellPosition::new(row_index, column.index());
                    let value = column
                        .field_name()
                        .map(|field| row.get(field))
                        .unwrap_or_default();
                    let is_editing = editing.is_at(position);
                    let pending = editor
                        .filter(|e| is_editing && e.position() == position)
                        .map(|e| e.pending().clone());
                    CellFrame {
                        column: column.index(),
                        text: column.render_cell(&value),
                        value,
                        editing: is_editing,
                        focused: focus.is_at(position),
                        pending,
                        next_column: columns.next_index(column.index()),
                    }
                })
                .collect();
            RowFrame {
                row: row_index,
                row_id: row.id().cloned(),
                cells,
            }
        })
        .collect();

    let can_fetch_more = paginate && rows.len() >= state.row_count();

    GridFrame {
        headers,
        rows,
        status: relation.status(),
        saving_edit: state.is_saving_edit(),
        error_message: state.display_error_message(),
        field_error: editor.and_then(|e| e.field_error().map(str::to_string)),
        can_fetch_more,
    }
}
