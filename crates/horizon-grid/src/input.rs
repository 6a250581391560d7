//! Input events delivered to the grid by the host renderer.

use crate::value::RowKey;

/// A (row, column) cell coordinate in the current result relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellPosition {
    /// Row index in the result relation.
    pub row: usize,
    /// Column index in the column model.
    pub column: usize,
}

impl CellPosition {
    /// Create a new cell position.
    pub const fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

/// Keys the grid reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Home,
    End,
    Enter,
    Tab,
    Escape,
    /// A printable character.
    Char(char),
}

impl Key {
    /// Returns `true` for keys that move focus between cells.
    pub fn is_navigation(&self) -> bool {
        matches!(
            self,
            Key::ArrowUp | Key::ArrowDown | Key::ArrowLeft | Key::ArrowRight | Key::Home | Key::End
        )
    }

    /// The printable character, if any.
    pub fn printable(&self) -> Option<char> {
        match self {
            Key::Char(c) if !c.is_control() => Some(*c),
            _ => None,
        }
    }
}

/// Payload passed to cell handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct CellEvent {
    /// The cell the event targets.
    pub position: CellPosition,
    /// Identity of the row, when it is loaded.
    pub row_id: Option<RowKey>,
    /// The key pressed, for keydown events.
    pub key: Option<Key>,
}

/// Payload passed to header handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderEvent {
    /// The column whose header was targeted.
    pub column: usize,
    /// The key pressed, for keydown events.
    pub key: Option<Key>,
}
