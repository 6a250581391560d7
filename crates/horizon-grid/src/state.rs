//! Grid interaction state machine.
//!
//! [`GridState`] is the mutable, per-instance state of one mounted grid:
//! focus, edit mode, sort, column widths, the requested page size, the refresh
//! counter, the saving flag and the transient error banner. Every field is a
//! [`Property`] paired with a signal in [`GridSignals`]; a signal fires only
//! when its property actually changed.
//!
//! Focus and editing are independent singletons. Transitions here keep them
//! consistent, but the raw setters do not enforce it.
//!
//! # Transitions
//!
//! | Event              | focus                      | editing                |
//! |--------------------|----------------------------|------------------------|
//! | click / navigation | cell, `should_focus: true`  | `is_editing: false`    |
//! | double click       | cell, `should_focus: false` | cell, `is_editing`     |
//! | commit (Enter)     | `should_focus: true`        | `is_editing: false`    |
//! | commit (Tab)       | next column, `should_focus` | `is_editing: false`    |
//! | commit (Blur)      | unchanged                  | `is_editing: false`    |
//! | cancel (Escape)    | edited cell, `should_focus` | `is_editing: false`    |
//!
//! Sort toggles, fetch-more and refresh bumps never touch focus or editing.

use std::sync::Arc;
use std::time::Duration;

use horizon_grid_core::logging::targets;
use horizon_grid_core::{AsyncRuntime, DetachedTask, Property, Signal};

use crate::column::ColumnModel;
use crate::editor::CommitTrigger;
use crate::input::{CellPosition, Key};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
    /// Ascending order (A-Z, 0-9).
    #[default]
    Ascending,
    /// Descending order (Z-A, 9-0).
    Descending,
}

impl SortOrder {
    pub fn from_ascending(ascending: bool) -> Self {
        if ascending {
            SortOrder::Ascending
        } else {
            SortOrder::Descending
        }
    }

    pub fn is_ascending(self) -> bool {
        self == SortOrder::Ascending
    }
}

/// The focused cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FocusState {
    pub column: Option<usize>,
    pub row: Option<usize>,
    /// `true` when focus was just requested, `false` when merely remembered.
    pub should_focus: bool,
}

impl FocusState {
    /// The focused cell, when both coordinates are set.
    pub fn position(&self) -> Option<CellPosition> {
        Some(CellPosition::new(self.row?, self.column?))
    }

    pub fn is_at(&self, position: CellPosition) -> bool {
        self.position() == Some(position)
    }
}

/// The cell in edit mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EditingState {
    pub column: Option<usize>,
    pub row: Option<usize>,
    pub is_editing: bool,
}

impl EditingState {
    /// The cell being edited, if edit mode is active.
    pub fn position(&self) -> Option<CellPosition> {
        if !self.is_editing {
            return None;
        }
        Some(CellPosition::new(self.row?, self.column?))
    }

    pub fn is_at(&self, position: CellPosition) -> bool {
        self.position() == Some(position)
    }
}

/// The active sort. `column: None` means natural order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortState {
    pub column: Option<usize>,
    pub ascending: bool,
}

impl Default for SortState {
    fn default() -> Self {
        Self {
            column: None,
            ascending: true,
        }
    }
}

impl SortState {
    /// The sort indicator for a column header.
    pub fn indicator_for(&self, column: usize) -> Option<SortOrder> {
        (self.column == Some(column)).then(|| SortOrder::from_ascending(self.ascending))
    }
}

/// Change notifications for [`GridState`].
#[derive(Debug, Default)]
pub struct GridSignals {
    /// Emitted with the new focus.
    pub focus_changed: Signal<FocusState>,
    /// Emitted with the new editing state.
    pub editing_changed: Signal<EditingState>,
    /// Emitted with the new sort.
    pub sort_changed: Signal<SortState>,
    /// Emitted with the new refresh key.
    pub refresh_requested: Signal<u64>,
    /// Emitted with the new requested page size.
    pub row_count_changed: Signal<usize>,
    /// Emitted with `(column, width)` after a resize.
    pub column_resized: Signal<(usize, u32)>,
    /// Emitted when a save starts or finishes.
    pub saving_changed: Signal<bool>,
}

#[derive(Debug, Clone, Default)]
struct BannerState {
    generation: u64,
    message: Option<String>,
}

/// The transient, self-clearing error message.
///
/// Shared through an `Arc` so a scheduled dismissal can outlive the grid.
/// Each message gets a generation number; a dismissal only clears the message
/// it was scheduled for. The generation and the message live under one lock.
#[derive(Debug, Default)]
pub struct ErrorBanner {
    state: Property<BannerState>,
    /// Emitted with the new message, `None` once cleared.
    pub changed: Signal<Option<String>>,
}

impl ErrorBanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// The message currently displayed.
    pub fn message(&self) -> Option<String> {
        self.state.with(|s| s.message.clone())
    }

    /// Display a message, returning its generation.
    pub fn show(&self, message: impl Into<String>) -> u64 {
        let message = Some(message.into());
        let (generation, changed) = self.state.update(|s| {
            s.generation += 1;
            let changed = s.message != message;
            s.message = message.clone();
            (s.generation, changed)
        });
        if changed {
            self.changed.emit(message);
        }
        generation
    }

    /// Display a message and schedule its dismissal after `dismiss_after`.
    ///
    /// The dismissal is a detached task: dropping the grid, or the returned
    /// handle, does not cancel it.
    pub fn show_transient(
        self: &Arc<Self>,
        runtime: &AsyncRuntime,
        message: impl Into<String>,
        dismiss_after: Duration,
    ) -> DetachedTask {
        let generation = self.show(message);
        let banner = Arc::clone(self);
        tracing::debug!(
            target: targets::EDIT,
            generation,
            dismiss_ms = dismiss_after.as_millis() as u64,
            "scheduled error dismissal"
        );
        runtime.spawn_after(dismiss_after, move || {
            banner.dismiss(generation);
        })
    }

    /// Clear the message if it is still the one with `generation`.
    ///
    /// Returns `true` if the message was cleared.
    pub fn dismiss(&self, generation: u64) -> bool {
        let cleared = self
            .state
            .update(|s| s.generation == generation && s.message.take().is_some());
        if cleared {
            self.changed.emit(None);
        }
        cleared
    }

    /// Clear any message. Returns `true` if one was displayed.
    pub fn clear(&self) -> bool {
        let cleared = self.state.update(|s| s.message.take().is_some());
        if cleared {
            self.changed.emit(None);
        }
        cleared
    }
}

/// The interaction state of one grid instance.
#[derive(Debug)]
pub struct GridState {
    focus: Property<FocusState>,
    editing: Property<EditingState>,
    sort: Property<SortState>,
    column_widths: Property<Vec<u32>>,
    row_count: Property<usize>,
    refresh_key: Property<u64>,
    saving_edit: Property<bool>,
    error: Arc<ErrorBanner>,
    min_column_width: u32,
    signals: GridSignals,
}

impl GridState {
    /// Create the state for a freshly mounted grid.
    ///
    /// Widths are seeded from each column's initial width and the sort starts
    /// in natural order.
    pub fn new(columns: &ColumnModel, initial_row_count: usize, min_column_width: u32) -> Self {
        let widths = columns
            .initial_widths()
            .into_iter()
            .map(|w| w.max(min_column_width))
            .collect();

        Self {
            focus: Property::default(),
            editing: Property::default(),
            sort: Property::default(),
            column_widths: Property::new(widths),
            row_count: Property::new(initial_row_count),
            refresh_key: Property::new(0),
            saving_edit: Property::new(false),
            error: Arc::new(ErrorBanner::new()),
            min_column_width,
            signals: GridSignals::default(),
        }
    }

    pub fn signals(&self) -> &GridSignals {
        &self.signals
    }

    pub fn error_banner(&self) -> &Arc<ErrorBanner> {
        &self.error
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn focus(&self) -> FocusState {
        self.focus.get()
    }

    pub fn editing(&self) -> EditingState {
        self.editing.get()
    }

    pub fn sort(&self) -> SortState {
        self.sort.get()
    }

    /// Current width of a column, read fresh on every call.
    pub fn column_width(&self, column: usize) -> Option<u32> {
        self.column_widths.with(|w| w.get(column).copied())
    }

    pub fn column_widths(&self) -> Vec<u32> {
        self.column_widths.get()
    }

    pub fn row_count(&self) -> usize {
        self.row_count.get()
    }

    pub fn refresh_key(&self) -> u64 {
        self.refresh_key.get()
    }

    pub fn is_saving_edit(&self) -> bool {
        self.saving_edit.get()
    }

    pub fn display_error_message(&self) -> Option<String> {
        self.error.message()
    }

    // =========================================================================
    // Raw setters
    // =========================================================================

    /// Replace the focus.
    pub fn set_focus(&self, focus: FocusState) {
        if self.focus.set(focus) {
            tracing::trace!(target: targets::STATE, ?focus, "focus changed");
            self.signals.focus_changed.emit(focus);
        }
    }

    /// Replace the editing state.
    pub fn set_editing(&self, editing: EditingState) {
        if self.editing.set(editing) {
            tracing::trace!(target: targets::STATE, ?editing, "editing changed");
            self.signals.editing_changed.emit(editing);
        }
    }

    /// Set the saving flag.
    pub fn set_saving_edit(&self, saving: bool) {
        if self.saving_edit.set(saving) {
            self.signals.saving_changed.emit(saving);
        }
    }

    fn exit_edit_mode(&self) -> bool {
        let editing = self.editing();
        if editing.is_editing {
            self.set_editing(EditingState {
                is_editing: false,
                ..editing
            });
        }
        editing.is_editing
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Pointer click on a cell.
    ///
    /// Any in-progress edit is discarded without validation. Returns `true`
    /// if an edit was discarded.
    pub fn click_cell(&self, position: CellPosition) -> bool {
        self.set_focus(FocusState {
            column: Some(position.column),
            row: Some(position.row),
            should_focus: true,
        });
        let discarded = self.exit_edit_mode();
        if discarded {
            tracing::debug!(target: targets::STATE, ?position, "click discarded an unsaved edit");
        }
        discarded
    }

    /// Keyboard navigation from the grid widget.
    ///
    /// Computes the target cell from the current focus, clamped to a grid of
    /// `rows` by `columns`, and applies it like a click. Returns the target,
    /// or `None` for a non-navigation key or an empty grid.
    pub fn navigate(&self, key: Key, rows: usize, columns: usize) -> Option<CellPosition> {
        if rows == 0 || columns == 0 || !key.is_navigation() {
            return None;
        }

        let current = self.focus().position().unwrap_or(CellPosition::new(0, 0));
        let row = current.row.min(rows - 1);
        let column = current.column.min(columns - 1);

        let target = match key {
            Key::ArrowUp => CellPosition::new(row.saturating_sub(1), column),
            Key::ArrowDown => CellPosition::new((row + 1).min(rows - 1), column),
            Key::ArrowLeft => CellPosition::new(row, column.saturating_sub(1)),
            Key::ArrowRight => CellPosition::new(row, (column + 1).min(columns - 1)),
            Key::Home => CellPosition::new(row, 0),
            Key::End => CellPosition::new(row, columns - 1),
            _ => return None,
        };

        self.click_cell(target);
        Some(target)
    }

    /// Double click on a cell: enter edit mode there.
    pub fn double_click_cell(&self, position: CellPosition) {
        self.set_focus(FocusState {
            column: Some(position.column),
            row: Some(position.row),
            should_focus: false,
        });
        self.set_editing(EditingState {
            column: Some(position.column),
            row: Some(position.row),
            is_editing: true,
        });
    }

    /// Leave edit mode after a valid commit.
    ///
    /// `next_column` is only consulted for [`CommitTrigger::Tab`]; `None`
    /// keeps focus on the committed cell.
    pub fn finish_edit(
        &self,
        position: CellPosition,
        trigger: CommitTrigger,
        next_column: Option<usize>,
    ) {
        self.exit_edit_mode();
        match trigger {
            CommitTrigger::Enter => self.request_focus(position),
            CommitTrigger::Tab => {
                let column = next_column.unwrap_or(position.column);
                self.request_focus(CellPosition::new(position.row, column));
            }
            CommitTrigger::Blur => {}
        }
    }

    /// Leave edit mode without committing, restoring focus to the cell.
    pub fn cancel_edit(&self, position: CellPosition) {
        self.exit_edit_mode();
        self.request_focus(position);
    }

    fn request_focus(&self, position: CellPosition) {
        self.set_focus(FocusState {
            column: Some(position.column),
            row: Some(position.row),
            should_focus: true,
        });
    }

    /// Toggle the sort on a column header.
    ///
    /// The current sort column flips direction, another sortable column is
    /// selected ascending, and a presentation-only column is ignored. Returns
    /// `true` if the sort changed.
    pub fn toggle_sort(&self, columns: &ColumnModel, column: usize) -> bool {
        if !columns.get(column).is_some_and(|c| c.is_sortable()) {
            tracing::trace!(target: targets::STATE, column, "ignoring sort on unsortable column");
            return false;
        }

        let current = self.sort();
        let next = if current.column == Some(column) {
            SortState {
                column: Some(column),
                ascending: !current.ascending,
            }
        } else {
            SortState {
                column: Some(column),
                ascending: true,
            }
        };
        self.set_sort(next)
    }

    /// Return to natural order. Returns `true` if the sort changed.
    pub fn clear_sort(&self) -> bool {
        self.set_sort(SortState::default())
    }

    fn set_sort(&self, sort: SortState) -> bool {
        if self.sort.set(sort) {
            tracing::debug!(target: targets::STATE, ?sort, "sort changed");
            self.signals.sort_changed.emit(sort);
            true
        } else {
            false
        }
    }

    /// Grow the requested page size. It never shrinks.
    ///
    /// Returns the new row count, or `None` if it did not change.
    pub fn fetch_more(&self, increment: usize) -> Option<usize> {
        let next = self.row_count().saturating_add(increment);
        if self.row_count.set(next) {
            tracing::debug!(target: targets::STATE, row_count = next, "fetch more");
            self.signals.row_count_changed.emit(next);
            Some(next)
        } else {
            None
        }
    }

    /// Resize a column, clamped to the minimum width.
    ///
    /// Returns the applied width, or `None` for an unknown column.
    pub fn set_column_width(&self, column: usize, width: u32) -> Option<u32> {
        let width = width.max(self.min_column_width);
        let changed = self.column_widths.update(|widths| {
            let slot = widths.get_mut(column)?;
            let changed = *slot != width;
            *slot = width;
            Some(changed)
        })?;
        if changed {
            self.signals.column_resized.emit((column, width));
        }
        Some(width)
    }

    /// Invalidate the result relation. Returns the new refresh key.
    pub fn bump_refresh(&self) -> u64 {
        let key = self.refresh_key.update(|key| {
            *key += 1;
            *key
        });
        tracing::debug!(target: targets::STATE, refresh_key = key, "refresh requested");
        self.signals.refresh_requested.emit(key);
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Column;
    use crate::value::ResultType;
    use parking_lot::Mutex;

    fn columns() -> ColumnModel {
        ColumnModel::new(vec![
            Column::new(0, "A").with_query("a", "a", ResultType::Text).with_width(100),
            Column::new(1, "B").with_query("b", "b", ResultType::Integer).with_width(10),
            Column::new(2, "C"),
        ])
        .unwrap()
    }

    fn state() -> GridState {
        GridState::new(&columns(), 50, 24)
    }

    #[test]
    fn test_initial_state() {
        let state = state();
        assert_eq!(state.sort(), SortState::default());
        assert_eq!(state.column_widths(), vec![100, 24, 120]);
        assert_eq!(state.row_count(), 50);
        assert_eq!(state.refresh_key(), 0);
        assert!(!state.is_saving_edit());
        assert_eq!(state.display_error_message(), None);
    }

    #[test]
    fn test_click_exits_edit_mode() {
        let state = state();
        state.double_click_cell(CellPosition::new(3, 1));
        assert!(state.editing().is_editing);
        assert!(!state.focus().should_focus);

        assert!(state.click_cell(CellPosition::new(4, 0)));
        assert_eq!(
            state.focus(),
            FocusState { column: Some(0), row: Some(4), should_focus: true }
        );
        assert!(!state.editing().is_editing);
        assert!(!state.click_cell(CellPosition::new(4, 1)));
    }

    #[test]
    fn test_navigation_clamps() {
        let state = state();
        assert_eq!(state.navigate(Key::ArrowUp, 5, 3), Some(CellPosition::new(0, 0)));
        assert_eq!(state.navigate(Key::End, 5, 3), Some(CellPosition::new(0, 2)));
        assert_eq!(state.navigate(Key::ArrowRight, 5, 3), Some(CellPosition::new(0, 2)));
        for _ in 0..10 {
            state.navigate(Key::ArrowDown, 5, 3);
        }
        assert_eq!(state.focus().position(), Some(CellPosition::new(4, 2)));
        assert_eq!(state.navigate(Key::Home, 5, 3), Some(CellPosition::new(4, 0)));
        assert_eq!(state.navigate(Key::Enter, 5, 3), None);
        assert_eq!(state.navigate(Key::ArrowDown, 0, 3), None);
    }

    #[test]
    fn test_finish_edit_tab_moves_focus() {
        let state = state();
        let cell = CellPosition::new(2, 0);
        state.double_click_cell(cell);
        state.finish_edit(cell, CommitTrigger::Tab, Some(1));
        assert_eq!(state.focus().position(), Some(CellPosition::new(2, 1)));
        assert!(state.focus().should_focus);
        assert!(!state.editing().is_editing);
    }

    #[test]
    fn test_finish_edit_tab_on_last_column_stays() {
        let state = state();
        let cell = CellPosition::new(2, 2);
        state.double_click_cell(cell);
        state.finish_edit(cell, CommitTrigger::Tab, None);
        assert_eq!(state.focus().position(), Some(cell));
    }

    #[test]
    fn test_finish_edit_blur_keeps_focus_passive() {
        let state = state();
        let cell = CellPosition::new(1, 1);
        state.double_click_cell(cell);
        state.finish_edit(cell, CommitTrigger::Blur, None);
        assert!(!state.editing().is_editing);
        assert!(!state.focus().should_focus);
    }

    #[test]
    fn test_cancel_edit_restores_focus() {
        let state = state();
        let cell = CellPosition::new(1, 1);
        state.double_click_cell(cell);
        state.cancel_edit(cell);
        assert!(!state.editing().is_editing);
        assert_eq!(
            state.focus(),
            FocusState { column: Some(1), row: Some(1), should_focus: true }
        );
    }

    #[test]
    fn test_toggle_sort() {
        let state = state();
        let columns = columns();

        assert!(state.toggle_sort(&columns, 1));
        assert_eq!(state.sort(), SortState { column: Some(1), ascending: true });
        assert!(state.toggle_sort(&columns, 1));
        assert_eq!(state.sort(), SortState { column: Some(1), ascending: false });
        assert!(state.toggle_sort(&columns, 0));
        assert_eq!(state.sort(), SortState { column: Some(0), ascending: true });

        assert!(!state.toggle_sort(&columns, 2));
        assert!(!state.toggle_sort(&columns, 7));
        assert_eq!(state.sort().column, Some(0));

        assert!(state.clear_sort());
        assert_eq!(state.sort().column, None);
    }

    #[test]
    fn test_unsortable_column_never_becomes_sort_column() {
        let state = state();
        let columns = columns();
        for column in [0, 2, 1, 2, 1, 1, 0, 2] {
            state.toggle_sort(&columns, column);
            assert_ne!(state.sort().column, Some(2));
        }
    }

    #[test]
    fn test_sort_toggle_keeps_focus_and_editing() {
        let state = state();
        state.double_click_cell(CellPosition::new(0, 0));
        let focus = state.focus();
        let editing = state.editing();

        state.toggle_sort(&columns(), 1);
        state.fetch_more(50);
        state.bump_refresh();

        assert_eq!(state.focus(), focus);
        assert_eq!(state.editing(), editing);
    }

    #[test]
    fn test_fetch_more_is_monotonic() {
        let state = state();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        state.signals().row_count_changed.connect(move |&n| seen_clone.lock().push(n));

        assert_eq!(state.fetch_more(50), Some(100));
        assert_eq!(state.fetch_more(0), None);
        assert_eq!(state.fetch_more(25), Some(125));
        assert_eq!(*seen.lock(), vec![100, 125]);
    }

    #[test]
    fn test_column_width_clamped() {
        let state = state();
        let resized = Arc::new(Mutex::new(Vec::new()));
        let resized_clone = resized.clone();
        state.signals().column_resized.connect(move |&e| resized_clone.lock().push(e));

        assert_eq!(state.set_column_width(0, 5), Some(24));
        assert_eq!(state.set_column_width(0, 24), Some(24));
        assert_eq!(state.set_column_width(9, 100), None);
        assert_eq!(state.column_width(0), Some(24));
        assert_eq!(*resized.lock(), vec![(0, 24)]);
    }

    #[test]
    fn test_bump_refresh_emits() {
        let state = state();
        let keys = Arc::new(Mutex::new(Vec::new()));
        let keys_clone = keys.clone();
        state.signals().refresh_requested.connect(move |&k| keys_clone.lock().push(k));

        assert_eq!(state.bump_refresh(), 1);
        assert_eq!(state.bump_refresh(), 2);
        assert_eq!(*keys.lock(), vec![1, 2]);
    }

    #[test]
    fn test_error_banner_generations() {
        let banner = ErrorBanner::new();
        let first = banner.show("first");
        let second = banner.show("second");

        assert!(!banner.dismiss(first));
        assert_eq!(banner.message().as_deref(), Some("second"));
        assert!(banner.dismiss(second));
        assert_eq!(banner.message(), None);
    }

    #[test]
    fn test_stale_dismissal_racing_show_keeps_new_message() {
        let banner = ErrorBanner::new();
        for _ in 0..500 {
            let stale = banner.show("first");
            std::thread::scope(|scope| {
                scope.spawn(|| banner.dismiss(stale));
                scope.spawn(|| banner.show("second"));
            });
            assert_eq!(banner.message().as_deref(), Some("second"));
            banner.clear();
        }
    }

    #[test]
    fn test_sort_indicator() {
        let sort = SortState { column: Some(1), ascending: false };
        assert_eq!(sort.indicator_for(1), Some(SortOrder::Descending));
        assert_eq!(sort.indicator_for(0), None);
    }
}
