//! Optimistic edit protocol.
//!
//! Committing a changed cell runs in two halves:
//!
//! 1. [`EditProtocol::begin`] (synchronous): capture the previous value, write
//!    the new value into the result relation, raise `saving_edit` and clear
//!    the error banner.
//! 2. [`EditProtocol::finish`] (async): run the before hooks, the field update
//!    and the after hooks in one service transaction. On success the post
//!    commit hooks run and the grid refreshes; on failure the previous value
//!    is restored and a transient error is shown.
//!
//! The optimistic write and the saving flag are guards. Whatever way the
//! second half ends, including the task being dropped mid-flight, the write is
//! reverted unless it was committed, and the flag is lowered after that.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;

use horizon_grid_core::logging::{span_names, targets};
use horizon_grid_core::{AsyncRuntime, AsyncTaskHandle};

use crate::error::{GridError, Result, ServiceError};
use crate::fetch::{FetchOutcome, Fetcher};
use crate::input::CellPosition;
use crate::relation::ResultRelation;
use crate::service::{DataService, TransactionOp};
use crate::state::GridState;
use crate::value::{RowKey, Value};

/// Produces extra statements for an edit transaction.
pub type TransactionHook = Arc<dyn Fn(&EditContext) -> Vec<TransactionOp> + Send + Sync>;
/// Runs after an edit transaction commits.
pub type CommitHook = Arc<dyn Fn(&EditContext) + Send + Sync>;

/// Everything known about one committed cell edit.
#[derive(Debug, Clone, PartialEq)]
pub struct EditContext {
    /// The edited cell.
    pub position: CellPosition,
    /// Identity of the edited row.
    pub row_id: RowKey,
    /// Generated field holding the value in the result relation.
    pub field: String,
    /// Underlying field the update writes.
    pub update_field: String,
    /// Value before the edit.
    pub previous: Value,
    /// Value being saved.
    pub value: Value,
}

/// Caller-supplied hooks around the edit transaction.
#[derive(Clone, Default)]
pub struct EditHooks {
    before: Vec<TransactionHook>,
    after: Vec<TransactionHook>,
    post_commit: Vec<CommitHook>,
}

impl EditHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add statements that run before the field update.
    pub fn before<F>(mut self, hook: F) -> Self
    where
        F: Fn(&EditContext) -> Vec<TransactionOp> + Send + Sync + 'static,
    {
        self.before.push(Arc::new(hook));
        self
    }

    /// Add statements that run after the field update, in the same transaction.
    pub fn after<F>(mut self, hook: F) -> Self
    where
        F: Fn(&EditContext) -> Vec<TransactionOp> + Send + Sync + 'static,
    {
        self.after.push(Arc::new(hook));
        self
    }

    /// Add a callback that runs once the transaction has committed.
    pub fn post_commit<F>(mut self, hook: F) -> Self
    where
        F: Fn(&EditContext) + Send + Sync + 'static,
    {
        self.post_commit.push(Arc::new(hook));
        self
    }

    fn transaction_ops(&self, context: &EditContext, update: TransactionOp) -> Vec<TransactionOp> {
        let mut ops: Vec<_> = self.before.iter().flat_map(|hook| hook(context)).collect();
        ops.push(update);
        ops.extend(self.after.iter().flat_map(|hook| hook(context)));
        ops
    }
}

impl fmt::Debug for EditHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditHooks")
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .field("post_commit", &self.post_commit.len())
            .finish()
    }
}

/// A value written to the result relation ahead of confirmation.
///
/// Dropping the guard without [`commit`](Self::commit) restores the captured
/// previous value.
pub struct OptimisticWrite {
    relation: Arc<ResultRelation>,
    row_id: RowKey,
    field: String,
    previous: Value,
    armed: bool,
}

impl OptimisticWrite {
    /// Capture the current value of `(row_id, field)` and overwrite it.
    ///
    /// Returns `None` if the row is not in the relation.
    pub fn apply(
        relation: &Arc<ResultRelation>,
        row_id: &RowKey,
        field: &str,
        value: Value,
    ) -> Option<Self> {
        let previous = relation.set_value(row_id, field, value)?;
        Some(Self {
            relation: Arc::clone(relation),
            row_id: row_id.clone(),
            field: field.to_string(),
            previous,
            armed: true,
        })
    }

    /// The value captured before the write.
    pub fn previous(&self) -> &Value {
        &self.previous
    }

    /// Keep the written value.
    pub fn commit(mut self) {
        self.armed = false;
    }
}

impl Drop for OptimisticWrite {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let previous = std::mem::take(&mut self.previous);
        if self
            .relation
            .set_value(&self.row_id, &self.field, previous)
            .is_none()
        {
            tracing::debug!(
                target: targets::EDIT,
                row_id = %self.row_id,
                "row left the relation before rollback"
            );
        } else {
            tracing::debug!(target: targets::EDIT, row_id = %self.row_id, field = %self.field, "optimistic write rolled back");
        }
    }
}

/// Holds `saving_edit` high until dropped.
struct SavingFlag(Arc<GridState>);

impl SavingFlag {
    fn raise(state: &Arc<GridState>) -> Self {
        state.set_saving_edit(true);
        Self(Arc::clone(state))
    }
}

impl Drop for SavingFlag {
    fn drop(&mut self) {
        self.0.set_saving_edit(false);
    }
}

/// An edit whose optimistic write is applied and whose transaction is pending.
pub struct PendingEdit {
    context: EditContext,
    // Field order matters: the write is reverted before the flag drops.
    write: OptimisticWrite,
    saving: SavingFlag,
}

impl PendingEdit {
    pub fn context(&self) -> &EditContext {
        &self.context
    }
}

impl fmt::Debug for PendingEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingEdit")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// How an edit ended.
#[derive(Debug)]
pub enum EditResult {
    /// The transaction committed and a refresh was requested.
    Committed {
        /// The refresh key after the bump.
        refresh_key: u64,
        /// The reload started by the refresh, if the grid is still open.
        reload: Option<AsyncTaskHandle<FetchOutcome>>,
    },
    /// The transaction failed and the optimistic write was reverted.
    RolledBack { error: ServiceError },
}

impl EditResult {
    pub fn is_committed(&self) -> bool {
        matches!(self, EditResult::Committed { .. })
    }
}

/// Runs optimistic edits for one grid.
pub(crate) struct EditProtocol<S> {
    pub(crate) service: Arc<S>,
    pub(crate) state: Arc<GridState>,
    pub(crate) relation: Arc<ResultRelation>,
    pub(crate) runtime: Arc<AsyncRuntime>,
    pub(crate) fetcher: Fetcher<S>,
    pub(crate) hooks: EditHooks,
    pub(crate) source: String,
    pub(crate) row_id_field: String,
    pub(crate) dismiss_after: Duration,
}

impl<S> Clone for EditProtocol<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            state: Arc::clone(&self.state),
            relation: Arc::clone(&self.relation),
            runtime: Arc::clone(&self.runtime),
            fetcher: self.fetcher.clone(),
            hooks: self.hooks.clone(),
            source: self.source.clone(),
            row_id_field: self.row_id_field.clone(),
            dismiss_after: self.dismiss_after,
        }
    }
}

impl<S: DataService> EditProtocol<S> {
    /// Apply the optimistic write and raise the saving flag.
    pub(crate) fn begin(&self, mut context: EditContext) -> Result<PendingEdit> {
        let write = OptimisticWrite::apply(
            &self.relation,
            &context.row_id,
            &context.field,
            context.value.clone(),
        )
        .ok_or(GridError::RowNotLoaded(context.position.row))?;
        context.previous = write.previous().clone();

        let saving = SavingFlag::raise(&self.state);
        self.state.error_banner().clear();

        tracing::debug!(
            target: targets::EDIT,
            row_id = %context.row_id,
            field = %context.field,
            "optimistic write applied"
        );
        Ok(PendingEdit {
            context,
            write,
            saving,
        })
    }

    /// Run the transaction and settle the pending edit.
    pub(crate) async fn finish(&self, pending: PendingEdit) -> EditResult {
        let PendingEdit {
            context,
            write,
            saving,
        } = pending;

        let update = TransactionOp::UpdateField {
            source: self.source.clone(),
            row_id_field: self.row_id_field.clone(),
            row_id: context.row_id.clone(),
            field: context.update_field.clone(),
            value: context.value.clone(),
        };
        let ops = self.hooks.transaction_ops(&context, update);

        let span = tracing::info_span!(
            target: targets::EDIT,
            span_names::RUN_TRANSACTION,
            row_id = %context.row_id,
            field = %context.update_field,
            ops = ops.len()
        );
        let result = self.service.run_transaction(ops).instrument(span).await;

        match result {
            Ok(()) => {
                write.commit();
                for hook in &self.hooks.post_commit {
                    hook(&context);
                }
                let refresh_key = self.state.bump_refresh();
                let reload = match self.fetcher.reload() {
                    Ok(handle) => Some(handle),
                    Err(err) => {
                        tracing::debug!(target: targets::EDIT, error = %err, "no reload after commit");
                        None
                    }
                };
                drop(saving);
                tracing::info!(target: targets::EDIT, row_id = %context.row_id, refresh_key, "edit committed");
                EditResult::Committed {
                    refresh_key,
                    reload,
                }
            }
            Err(error) => {
                drop(write);
                tracing::warn!(target: targets::EDIT, row_id = %context.row_id, error = %error, "edit failed");
                self.state.error_banner().show_transient(
                    &self.runtime,
                    format!("Could not save {}: {}", context.update_field, error),
                    self.dismiss_after,
                );
                drop(saving);
                EditResult::RolledBack { error }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::RelationShape;
    use crate::relation::Row;

    fn relation() -> Arc<ResultRelation> {
        let relation = Arc::new(ResultRelation::new(RelationShape {
            row_id_field: "id".into(),
            fields: Vec::new(),
        }));
        relation.reset(vec![Row::new(3).with("name", "Old")]);
        relation
    }

    #[test]
    fn test_write_reverts_on_drop() {
        let relation = relation();
        let id = RowKey::Int(3);
        {
            let write = OptimisticWrite::apply(&relation, &id, "name", "New".into()).unwrap();
            assert_eq!(write.previous(), &Value::from("Old"));
            assert_eq!(relation.value(0, "name"), Value::from("New"));
        }
        assert_eq!(relation.value(0, "name"), Value::from("Old"));
    }

    #[test]
    fn test_write_kept_on_commit() {
        let relation = relation();
        let write = OptimisticWrite::apply(&relation, &RowKey::Int(3), "name", "New".into()).unwrap();
        write.commit();
        assert_eq!(relation.value(0, "name"), Value::from("New"));
    }

    #[test]
    fn test_write_on_missing_row() {
        let relation = relation();
        assert!(OptimisticWrite::apply(&relation, &RowKey::Int(4), "name", Value::Null).is_none());
    }

    #[test]
    fn test_hook_ordering() {
        let hooks = EditHooks::new()
            .before(|_| vec![TransactionOp::execute("A", vec![])])
            .after(|ctx| vec![TransactionOp::execute("C", vec![ctx.value.clone()])]);
        let context = EditContext {
            position: CellPosition::new(0, 0),
            row_id: RowKey::Int(1),
            field: "name".into(),
            update_field: "name".into(),
            previous: Value::Null,
            value: "v".into(),
        };

        let ops = hooks.transaction_ops(&context, TransactionOp::execute("B", vec![]));
        let sql: Vec<_> = ops
            .iter()
            .map(|op| match op {
                TransactionOp::Execute { sql, .. } => sql.as_str(),
                _ => "",
            })
            .collect();
        assert_eq!(sql, vec!["A", "B", "C"]);
    }
}
