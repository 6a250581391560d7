//! The grid facade.
//!
//! [`Grid`] owns one mounted grid: its column model, interaction state, result
//! relation, inline editor and background work. The host renderer forwards
//! input through the `on_*` hooks and draws from [`Grid::frame`] whenever a
//! signal fires.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use horizon_grid::{
//!     Column, ColumnModel, Grid, GridConfig, ResultType, SqliteDataService, CellPosition, Key,
//! };
//! use horizon_grid_core::AsyncRuntime;
//!
//! # async fn run() -> horizon_grid::Result<()> {
//! let service = SqliteDataService::open("app.db")?;
//! let columns = ColumnModel::new(vec![
//!     Column::new(0, "Name").with_query("name", "name", ResultType::Text),
//! ])?;
//! let runtime = Arc::new(AsyncRuntime::current()?);
//! let grid = Grid::new(GridConfig::new("people"), columns, service, runtime)?;
//!
//! grid.load()?.wait().await;
//! grid.on_cell_double_click(CellPosition::new(0, 0));
//! grid.set_value("Ada")?;
//! grid.on_cell_keydown(CellPosition::new(0, 0), Key::Enter)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

use horizon_grid_core::logging::targets;
use horizon_grid_core::{AsyncRuntime, AsyncTaskHandle};

use crate::column::ColumnModel;
use crate::config::GridConfig;
use crate::edit::{EditContext, EditHooks, EditProtocol, EditResult};
use crate::editor::{CellEditor, CommitTrigger, EditOutcome};
use crate::error::{GridError, Result};
use crate::fetch::{FetchOutcome, Fetcher};
use crate::frame::{self, GridFrame};
use crate::input::{CellEvent, CellPosition, HeaderEvent, Key};
use crate::query::{FetchQuery, QueryPlan};
use crate::relation::ResultRelation;
use crate::service::DataService;
use crate::state::GridState;
use crate::value::Value;

/// Result of committing the open editor.
#[derive(Debug)]
pub enum CommitOutcome {
    /// Validation failed; the editor stays open with a field error.
    Invalid(String),
    /// The value did not change; edit mode ended without a save.
    Unchanged { next_column: Option<usize> },
    /// A save is in flight.
    Saving {
        next_column: Option<usize>,
        handle: AsyncTaskHandle<EditResult>,
    },
}

impl CommitOutcome {
    /// The column focus moved to, for Tab commits.
    pub fn next_column(&self) -> Option<usize> {
        match self {
            CommitOutcome::Invalid(_) => None,
            CommitOutcome::Unchanged { next_column } | CommitOutcome::Saving { next_column, .. } => {
                *next_column
            }
        }
    }
}

/// What a cell keydown did.
#[derive(Debug)]
pub enum KeyOutcome {
    /// The key had no grid-level effect.
    Ignored,
    /// Focus moved to this cell.
    Navigated(CellPosition),
    /// The cell entered edit mode.
    EditStarted,
    /// The open editor was committed.
    Committed(CommitOutcome),
    /// The open editor was cancelled.
    Cancelled,
}

/// One mounted data grid.
pub struct Grid<S: DataService> {
    config: GridConfig,
    columns: ColumnModel,
    state: Arc<GridState>,
    relation: Arc<ResultRelation>,
    fetcher: Fetcher<S>,
    protocol: EditProtocol<S>,
    editor: Mutex<Option<CellEditor>>,
}

impl<S: DataService> Grid<S> {
    /// Mount a grid. No rows are fetched until [`load`](Self::load).
    pub fn new(
        config: GridConfig,
        columns: ColumnModel,
        service: S,
        runtime: Arc<AsyncRuntime>,
    ) -> Result<Self> {
        config.validate()?;

        let plan = QueryPlan::new(&columns, &config.source, &config.row_id_field, config.paginate);
        let state = Arc::new(GridState::new(
            &columns,
            config.initial_row_count,
            config.min_column_width,
        ));
        let relation = Arc::new(ResultRelation::new(plan.shape().clone()));
        let service = Arc::new(service);

        let fetcher = Fetcher::new(
            plan,
            Arc::clone(&state),
            Arc::clone(&relation),
            Arc::clone(&service),
            Arc::clone(&runtime),
        );
        let protocol = EditProtocol {
            service,
            state: Arc::clone(&state),
            relation: Arc::clone(&relation),
            runtime,
            fetcher: fetcher.clone(),
            hooks: EditHooks::default(),
            source: config.source.clone(),
            row_id_field: config.row_id_field.clone(),
            dismiss_after: config.error_dismiss_duration(),
        };

        tracing::debug!(
            target: targets::STATE,
            source = %config.source,
            columns = columns.len(),
            "grid mounted"
        );

        Ok(Self {
            config,
            columns,
            state,
            relation,
            fetcher,
            protocol,
            editor: Mutex::new(None),
        })
    }

    /// Install edit transaction hooks.
    pub fn with_hooks(mut self, hooks: EditHooks) -> Self {
        self.protocol.hooks = hooks;
        self
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn columns(&self) -> &ColumnModel {
        &self.columns
    }

    pub fn state(&self) -> &GridState {
        &self.state
    }

    pub fn relation(&self) -> &ResultRelation {
        &self.relation
    }

    pub fn service(&self) -> &S {
        &self.protocol.service
    }

    pub fn plan(&self) -> &QueryPlan {
        self.fetcher.plan()
    }

    /// The query for the current sort and page size.
    pub fn query(&self) -> Result<FetchQuery> {
        self.fetcher.current_query()
    }

    /// A copy of the open editor.
    pub fn editor(&self) -> Option<CellEditor> {
        self.editor.lock().clone()
    }

    /// The committed value shown at `position`.
    pub fn cell_value(&self, position: CellPosition) -> Value {
        self.columns
            .get(position.column)
            .and_then(|c| c.field_name())
            .map(|field| self.relation.value(position.row, field))
            .unwrap_or_default()
    }

    /// Build a render snapshot.
    pub fn frame(&self) -> GridFrame {
        let editor = self.editor.lock();
        frame::build(
            &self.columns,
            &self.state,
            &self.relation,
            editor.as_ref(),
            self.config.paginate,
        )
    }

    // =========================================================================
    // Fetching
    // =========================================================================

    /// Fetch the first page.
    pub fn load(&self) -> Result<AsyncTaskHandle<FetchOutcome>> {
        self.fetcher.reload()
    }

    /// Bump the refresh key and re-fetch.
    pub fn refresh(&self) -> Result<AsyncTaskHandle<FetchOutcome>> {
        self.state.bump_refresh();
        self.fetcher.reload()
    }

    /// Grow the page by the configured increment and re-fetch.
    ///
    /// Returns `None` when the increment is zero.
    pub fn on_fetch_more(&self) -> Result<Option<AsyncTaskHandle<FetchOutcome>>> {
        match self.state.fetch_more(self.config.fetch_more_increment) {
            Some(_) => self.fetcher.reload().map(Some),
            None => Ok(None),
        }
    }

    /// Toggle the sort on a header and re-fetch if it changed.
    pub fn on_header_click(&self, column: usize) -> Result<Option<AsyncTaskHandle<FetchOutcome>>> {
        let header = self.columns.column(column)?;
        if let Some(handler) = &header.header_handlers().on_click {
            handler(&HeaderEvent { column, key: None });
        }

        if self.state.toggle_sort(&self.columns, column) {
            self.fetcher.reload().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Forward a header keydown to the column's handler.
    pub fn on_header_keydown(&self, column: usize, key: Key) -> Result<()> {
        let header = self.columns.column(column)?;
        if let Some(handler) = &header.header_handlers().on_keydown {
            handler(&HeaderEvent {
                column,
                key: Some(key),
            });
        }
        Ok(())
    }

    /// Return to natural order and re-fetch if the sort changed.
    pub fn clear_sort(&self) -> Result<Option<AsyncTaskHandle<FetchOutcome>>> {
        if self.state.clear_sort() {
            self.fetcher.reload().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Resize a column. Returns the applied width.
    pub fn set_column_width(&self, column: usize, width: u32) -> Option<u32> {
        self.state.set_column_width(column, width)
    }

    // =========================================================================
    // Pointer and keyboard input
    // =========================================================================

    fn cell_event(&self, position: CellPosition, key: Option<Key>) -> CellEvent {
        CellEvent {
            position,
            row_id: self.relation.row_id(position.row),
            key,
        }
    }

    fn discard_editor(&self) {
        if let Some(editor) = self.editor.lock().take() {
            tracing::debug!(
                target: targets::STATE,
                position = ?editor.position(),
                "discarding unsaved edit"
            );
        }
    }

    /// Pointer click on a cell. Discards any open edit without saving it.
    pub fn on_cell_click(&self, position: CellPosition) {
        if let Some(handler) = self
            .columns
            .get(position.column)
            .and_then(|c| c.cell_handlers().on_click.as_ref())
        {
            handler(&self.cell_event(position, None));
        }
        self.state.click_cell(position);
        self.discard_editor();
    }

    /// Keyboard navigation originating from the grid widget.
    pub fn on_keyboard_navigation(&self, key: Key) -> Option<CellPosition> {
        let target = self
            .state
            .navigate(key, self.relation.len(), self.columns.len())?;
        self.discard_editor();
        Some(target)
    }

    /// Double click on a cell: open the editor there.
    ///
    /// Cells of presentation-only columns and rows that are not loaded are
    /// not editable; the double click then only focuses the cell. Returns
    /// `true` if the editor opened.
    pub fn on_cell_double_click(&self, position: CellPosition) -> bool {
        if self.open_editor(position, None) {
            return true;
        }
        self.state.click_cell(position);
        self.discard_editor();
        false
    }

    fn open_editor(&self, position: CellPosition, seed: Option<char>) -> bool {
        let editable = self
            .columns
            .get(position.column)
            .is_some_and(|c| c.query_generation().is_some());
        let row_id = match self.relation.row_id(position.row) {
            Some(row_id) if editable => row_id,
            _ => {
                tracing::debug!(target: targets::STATE, ?position, "cell is not editable");
                return false;
            }
        };

        self.state.double_click_cell(position);
        let committed = self.cell_value(position);
        let editor = match seed {
            Some(seed) => CellEditor::seeded(position, row_id, committed, seed),
            None => CellEditor::open(position, row_id, committed),
        };
        *self.editor.lock() = Some(editor);
        true
    }

    /// Keydown on a cell.
    ///
    /// While the cell is being edited, Enter and Tab commit and Escape
    /// cancels. Otherwise navigation keys move focus, and Enter or a
    /// printable character opens the editor on an editable cell (the
    /// character seeds it).
    pub fn on_cell_keydown(&self, position: CellPosition, key: Key) -> Result<KeyOutcome> {
        if let Some(handler) = self
            .columns
            .get(position.column)
            .and_then(|c| c.cell_handlers().on_keydown.as_ref())
        {
            handler(&self.cell_event(position, Some(key)));
        }

        let editing_here = self.state.editing().is_at(position)
            && self
                .editor
                .lock()
                .as_ref()
                .is_some_and(|e| e.position() == position);

        if editing_here {
            return Ok(match key {
                Key::Enter => KeyOutcome::Committed(self.commit_edit(CommitTrigger::Enter)?),
                Key::Tab => KeyOutcome::Committed(self.commit_edit(CommitTrigger::Tab)?),
                Key::Escape => {
                    self.cancel_edit()?;
                    KeyOutcome::Cancelled
                }
                _ => KeyOutcome::Ignored,
            });
        }

        if key.is_navigation() {
            return Ok(self
                .on_keyboard_navigation(key)
                .map_or(KeyOutcome::Ignored, KeyOutcome::Navigated));
        }

        let seed = key.printable();
        if (key == Key::Enter || seed.is_some()) && self.open_editor(position, seed) {
            return Ok(KeyOutcome::EditStarted);
        }

        Ok(KeyOutcome::Ignored)
    }

    // =========================================================================
    // Editing
    // =========================================================================

    /// Replace the open editor's pending value.
    pub fn set_value(&self, value: impl Into<Value>) -> Result<()> {
        let mut editor = self.editor.lock();
        let editor = editor.as_mut().ok_or(GridError::NotEditing)?;
        editor.set_value(value);
        Ok(())
    }

    /// Focus left the editor: commit without moving focus.
    pub fn on_editor_blur(&self) -> Result<CommitOutcome> {
        self.commit_edit(CommitTrigger::Blur)
    }

    /// Validate and commit the open editor.
    ///
    /// A changed value is written optimistically before this returns; the
    /// returned handle resolves once the save has settled. The save targets
    /// the row the editor was opened on. If a refetch has dropped that row the
    /// edit is discarded with [`GridError::RowNotLoaded`].
    pub fn commit_edit(&self, trigger: CommitTrigger) -> Result<CommitOutcome> {
        let mut slot = self.editor.lock();
        let editor = slot.as_mut().ok_or(GridError::NotEditing)?;
        let position = editor.position();
        let column = self.columns.column(position.column)?;

        let (previous, value) = match editor.commit(column) {
            EditOutcome::Invalid(message) => {
                tracing::debug!(target: targets::STATE, ?position, %message, "edit rejected");
                return Ok(CommitOutcome::Invalid(message));
            }
            EditOutcome::Unchanged => (None, None),
            EditOutcome::Changed { previous, value } => (Some(previous), Some(value)),
        };

        let next_column = match trigger {
            CommitTrigger::Tab => self.columns.next_index(position.column),
            CommitTrigger::Enter | CommitTrigger::Blur => None,
        };

        let (Some(previous), Some(value)) = (previous, value) else {
            slot.take();
            drop(slot);
            self.state.finish_edit(position, trigger, next_column);
            return Ok(CommitOutcome::Unchanged { next_column });
        };

        let generation = column
            .query_generation()
            .ok_or(GridError::NotEditable(position.column))?;
        let row_id = editor.row_id().clone();

        slot.take();
        drop(slot);

        // Rows may have been reordered or dropped by a refetch since the
        // editor opened.
        let Some(row) = self.relation.position_of(&row_id) else {
            tracing::debug!(target: targets::STATE, %row_id, "edited row is gone");
            self.state.cancel_edit(position);
            return Err(GridError::RowNotLoaded(position.row));
        };
        self.state.finish_edit(position, trigger, next_column);

        let context = EditContext {
            position: CellPosition::new(row, position.column),
            row_id,
            field: generation.generated_field_name.clone(),
            update_field: generation.update_field().to_string(),
            previous,
            value,
        };
        let pending = self.protocol.begin(context)?;

        let protocol = self.protocol.clone();
        let handle = self
            .protocol
            .runtime
            .spawn(async move { protocol.finish(pending).await });

        Ok(CommitOutcome::Saving {
            next_column,
            handle,
        })
    }

    /// Close the open editor without saving.
    pub fn cancel_edit(&self) -> Result<()> {
        let editor = self.editor.lock().take().ok_or(GridError::NotEditing)?;
        self.state.cancel_edit(editor.position());
        Ok(())
    }

    /// Unmount: cancel the in-flight fetch and refuse further reloads.
    ///
    /// A scheduled error dismissal still runs.
    pub fn close(&self) {
        self.fetcher.close();
    }
}

impl<S: DataService> Drop for Grid<S> {
    fn drop(&mut self) {
        self.fetcher.close();
    }
}

impl<S: DataService> std::fmt::Debug for Grid<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grid")
            .field("config", &self.config)
            .field("columns", &self.columns.len())
            .field("rows", &self.relation.len())
            .finish_non_exhaustive()
    }
}
