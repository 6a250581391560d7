//! Inline cell editor.
//!
//! A [`CellEditor`] holds the pending value of the single cell in edit mode.
//! It knows nothing about the network: committing only parses the pending
//! value into the column's declared type, validates it and reports whether it
//! changed. The grid turns a changed outcome into an optimistic edit.
//!
//! The editor remembers the identity of the row it was opened on, so a
//! refetch that reorders rows under an open editor cannot redirect the save.

use crate::column::Column;
use crate::input::CellPosition;
use crate::value::{RowKey, Value};

/// How an edit is being committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommitTrigger {
    /// Enter pressed in the editor.
    Enter,
    /// Tab pressed in the editor; focus moves to the next column.
    Tab,
    /// Focus left the editor.
    Blur,
}

/// Result of validating the pending value.
#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    /// The value does not parse as the column's type or the validator rejected
    /// it; the editor stays open.
    Invalid(String),
    /// The value equals the committed one; nothing to persist.
    Unchanged,
    /// The value differs and should be persisted.
    Changed { previous: Value, value: Value },
}

/// The pending state of the cell in edit mode.
#[derive(Debug, Clone, PartialEq)]
pub struct CellEditor {
    position: CellPosition,
    row_id: RowKey,
    committed: Value,
    pending: Value,
    seed: Option<char>,
    field_error: Option<String>,
}

impl CellEditor {
    /// Open an editor whose pending value starts as the committed one.
    pub fn open(position: CellPosition, row_id: RowKey, committed: Value) -> Self {
        Self {
            position,
            row_id,
            pending: committed.clone(),
            committed,
            seed: None,
            field_error: None,
        }
    }

    /// Open an editor seeded by a typed character, replacing the value.
    pub fn seeded(position: CellPosition, row_id: RowKey, committed: Value, seed: char) -> Self {
        Self {
            position,
            row_id,
            committed,
            pending: Value::Text(seed.to_string()),
            seed: Some(seed),
            field_error: None,
        }
    }

    pub fn position(&self) -> CellPosition {
        self.position
    }

    /// Identity of the row the editor was opened on.
    pub fn row_id(&self) -> &RowKey {
        &self.row_id
    }

    pub fn committed(&self) -> &Value {
        &self.committed
    }

    pub fn pending(&self) -> &Value {
        &self.pending
    }

    /// The character that opened this editor, if any.
    pub fn seed(&self) -> Option<char> {
        self.seed
    }

    /// The message from the last failed validation.
    pub fn field_error(&self) -> Option<&str> {
        self.field_error.as_deref()
    }

    /// Replace the pending value. Clears any field error.
    pub fn set_value(&mut self, value: impl Into<Value>) {
        self.pending = value.into();
        self.field_error = None;
    }

    /// Drop the seed character without touching the pending value.
    pub fn clear_seed(&mut self) {
        self.seed = None;
    }

    /// Parse the pending value as `column`'s result type and validate it.
    ///
    /// On success the pending value is replaced by its parsed form. An
    /// invalid value is remembered as the field error and the editor stays
    /// usable.
    pub fn commit(&mut self, column: &Column) -> EditOutcome {
        let Some(generation) = column.query_generation() else {
            return self.reject(format!("column '{}' is not editable", column.title()));
        };
        let pending = match generation.result_type.parse(self.pending.clone()) {
            Ok(value) => value,
            Err(message) => return self.reject(message),
        };
        if let Err(message) = column.validate(&pending) {
            return self.reject(message);
        }
        self.field_error = None;
        self.pending = pending;

        if self.pending == self.committed {
            EditOutcome::Unchanged
        } else {
            EditOutcome::Changed {
                previous: self.committed.clone(),
                value: self.pending.clone(),
            }
        }
    }

    fn reject(&mut self, message: String) -> EditOutcome {
        self.field_error = Some(message.clone());
        EditOutcome::Invalid(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ResultType;

    fn column() -> Column {
        Column::new(0, "Name")
            .with_query("name", "name", ResultType::Text)
            .with_validator(|v| match v.as_text() {
                Some(s) if !s.is_empty() => Ok(()),
                _ => Err("required".to_string()),
            })
    }

    #[test]
    fn test_unchanged() {
        let mut editor = CellEditor::open(CellPosition::new(0, 0), RowKey::Int(1), Value::from("Old"));
        assert_eq!(editor.commit(&column()), EditOutcome::Unchanged);
    }

    #[test]
    fn test_changed() {
        let mut editor = CellEditor::open(CellPosition::new(0, 0), RowKey::Int(1), Value::from("Old"));
        editor.set_value("New");
        assert_eq!(
            editor.commit(&column()),
            EditOutcome::Changed { previous: Value::from("Old"), value: Value::from("New") }
        );
    }

    #[test]
    fn test_invalid_keeps_error_until_next_value() {
        let mut editor = CellEditor::open(CellPosition::new(0, 0), RowKey::Int(1), Value::from("Old"));
        editor.set_value("");
        assert_eq!(editor.commit(&column()), EditOutcome::Invalid("required".into()));
        assert_eq!(editor.field_error(), Some("required"));

        editor.set_value("x");
        assert_eq!(editor.field_error(), None);
    }

    #[test]
    fn test_seeded() {
        let mut editor = CellEditor::seeded(CellPosition::new(1, 0), RowKey::Int(2), Value::from("Old"), 'N');
        assert_eq!(editor.pending(), &Value::from("N"));
        assert_eq!(editor.seed(), Some('N'));
        editor.clear_seed();
        assert_eq!(editor.seed(), None);
        assert_eq!(editor.pending(), &Value::from("N"));
        assert_eq!(editor.row_id(), &RowKey::Int(2));
    }

    fn quantity() -> Column {
        Column::new(1, "Qty").with_query("qty", "qty", ResultType::Integer)
    }

    #[test]
    fn test_seeded_letter_in_integer_column_is_invalid() {
        let position = CellPosition::new(0, 1);
        let mut editor = CellEditor::seeded(position, RowKey::Int(1), Value::Int(40), 'x');

        assert_eq!(editor.commit(&quantity()), EditOutcome::Invalid("expected an integer".into()));
        assert_eq!(editor.field_error(), Some("expected an integer"));
        assert_eq!(editor.pending(), &Value::from("x"));
    }

    #[test]
    fn test_typed_text_is_parsed_before_comparing() {
        let position = CellPosition::new(0, 1);
        let mut editor = CellEditor::seeded(position, RowKey::Int(1), Value::Int(40), '7');
        assert_eq!(
            editor.commit(&quantity()),
            EditOutcome::Changed { previous: Value::Int(40), value: Value::Int(7) }
        );
        assert_eq!(editor.pending(), &Value::Int(7));

        let mut editor = CellEditor::open(position, RowKey::Int(1), Value::Int(40));
        editor.set_value(" 40 ");
        assert_eq!(editor.commit(&quantity()), EditOutcome::Unchanged);

        let mut editor = CellEditor::open(position, RowKey::Int(1), Value::Int(40));
        editor.set_value("");
        assert_eq!(
            editor.commit(&quantity()),
            EditOutcome::Changed { previous: Value::Int(40), value: Value::Null }
        );
    }

    #[test]
    fn test_presentation_column_rejects_commit() {
        let mut editor = CellEditor::open(CellPosition::new(0, 3), RowKey::Int(1), Value::Null);
        editor.set_value("x");
        let outcome = editor.commit(&Column::new(3, "Actions"));
        assert!(matches!(outcome, EditOutcome::Invalid(_)));
        assert!(editor.field_error().is_some());
    }
}
