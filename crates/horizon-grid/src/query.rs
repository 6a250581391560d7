//! Query construction engine.
//!
//! A [`QueryPlan`] is built once per grid from the column model. It holds the
//! base projection shared by every query and an ordered dispatch table of
//! sort branches, one per sortable column. Building a query for a given sort
//! state walks the table in column order and takes the first branch whose
//! predicate matches; an unset sort column selects the base branch.
//!
//! Because every branch is known when the plan is built, the set of queries a
//! grid can issue is enumerable through [`QueryPlan::variants`], and each
//! variant's projected fields and types are fixed ahead of execution.
//!
//! Queries render to deterministic SQL via [`FetchQuery::to_sql`]: the same
//! `(columns, sort, row_count)` always yields the same text.

use std::fmt;

use crate::column::ColumnModel;
use crate::error::QueryError;
use crate::state::{SortOrder, SortState};
use crate::value::ResultType;
use horizon_grid_core::logging::targets;

/// Quote an SQL identifier, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// One projected expression and its alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub expr: String,
    pub alias: String,
}

/// The ordering clause of a sorted query. Nulls always sort last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Generated field the query orders by.
    pub field: String,
    /// Ascending or descending.
    pub ascending: bool,
}

impl OrderBy {
    pub fn order(&self) -> SortOrder {
        SortOrder::from_ascending(self.ascending)
    }
}

/// A fully determined page query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchQuery {
    /// Source relation (table or view) name.
    pub source: String,
    /// Field used as row identity. Always projected first.
    pub row_id_field: String,
    /// Projected column expressions in column order.
    pub projection: Vec<Projection>,
    /// Ordering, or `None` for natural order.
    pub order_by: Option<OrderBy>,
    /// Row limit, or `None` when pagination is disabled.
    pub limit: Option<usize>,
}

impl FetchQuery {
    /// Render the query as SQL.
    pub fn to_sql(&self) -> String {
        let mut sql = format!("SELECT {}", quote_ident(&self.row_id_field));
        for projection in &self.projection {
            sql.push_str(", ");
            sql.push_str(&projection.expr);
            sql.push_str(" AS ");
            sql.push_str(&quote_ident(&projection.alias));
        }
        sql.push_str(" FROM ");
        sql.push_str(&quote_ident(&self.source));
        if let Some(order_by) = &self.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(&quote_ident(&order_by.field));
            sql.push_str(if order_by.ascending { " ASC" } else { " DESC" });
            sql.push_str(" NULLS LAST");
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        sql
    }
}

impl fmt::Display for FetchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

/// A projected field of the result relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldShape {
    pub name: String,
    pub result_type: ResultType,
}

/// The declared shape of the materialized result relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationShape {
    /// Field holding the row identity.
    pub row_id_field: String,
    /// Projected fields in column order.
    pub fields: Vec<FieldShape>,
}

impl RelationShape {
    pub fn field(&self, name: &str) -> Option<&FieldShape> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// One entry of the sort dispatch table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryVariant {
    /// No explicit ordering.
    Natural,
    /// Ordered by one column's generated field.
    Sorted { column: usize, field: String },
}

type SortPredicate = Box<dyn Fn(usize) -> bool + Send + Sync>;

struct SortBranch {
    predicate: SortPredicate,
    variant: QueryVariant,
}

/// The per-grid query plan.
pub struct QueryPlan {
    source: String,
    row_id_field: String,
    paginate: bool,
    projection: Vec<Projection>,
    natural: QueryVariant,
    branches: Vec<SortBranch>,
    column_count: usize,
    shape: RelationShape,
}

impl QueryPlan {
    /// Build the plan for a column model.
    pub fn new(
        columns: &ColumnModel,
        source: impl Into<String>,
        row_id_field: impl Into<String>,
        paginate: bool,
    ) -> Self {
        let row_id_field = row_id_field.into();
        let mut projection = Vec::new();
        let mut fields = Vec::new();
        let mut branches = Vec::new();

        for column in columns.iter() {
            let Some(generation) = column.query_generation() else {
                continue;
            };
            projection.push(Projection {
                expr: generation.expr.clone(),
                alias: generation.generated_field_name.clone(),
            });
            fields.push(FieldShape {
                name: generation.generated_field_name.clone(),
                result_type: generation.result_type,
            });

            let index = column.index();
            branches.push(SortBranch {
                predicate: Box::new(move |selected| selected == index),
                variant: QueryVariant::Sorted {
                    column: index,
                    field: generation.generated_field_name.clone(),
                },
            });
        }

        Self {
            source: source.into(),
            shape: RelationShape {
                row_id_field: row_id_field.clone(),
                fields,
            },
            row_id_field,
            paginate,
            projection,
            natural: QueryVariant::Natural,
            branches,
            column_count: columns.len(),
        }
    }

    /// Every query shape this plan can produce, base branch first.
    pub fn variants(&self) -> impl Iterator<Item = &QueryVariant> {
        std::iter::once(&self.natural).chain(self.branches.iter().map(|b| &b.variant))
    }

    /// The declared shape of the result relation.
    pub fn shape(&self) -> &RelationShape {
        &self.shape
    }

    /// Pick the dispatch branch for a sort state.
    pub fn select(&self, sort: &SortState) -> Result<&QueryVariant, QueryError> {
        let Some(column) = sort.column else {
            return Ok(&self.natural);
        };

        self.branches
            .iter()
            .find(|branch| (branch.predicate)(column))
            .map(|branch| &branch.variant)
            .ok_or(if column >= self.column_count {
                QueryError::ColumnOutOfRange {
                    column,
                    column_count: self.column_count,
                }
            } else {
                QueryError::NotSortable(column)
            })
    }

    /// Build the page query for a sort state and page size.
    #[tracing::instrument(skip(self), target = "horizon_grid::query", level = "trace")]
    pub fn build(&self, sort: &SortState, row_count: usize) -> Result<FetchQuery, QueryError> {
        let order_by = match self.select(sort)? {
            QueryVariant::Natural => None,
            QueryVariant::Sorted { field, .. } => Some(OrderBy {
                field: field.clone(),
                ascending: sort.ascending,
            }),
        };

        let query = FetchQuery {
            source: self.source.clone(),
            row_id_field: self.row_id_field.clone(),
            projection: self.projection.clone(),
            order_by,
            limit: self.paginate.then_some(row_count),
        };
        tracing::debug!(target: targets::QUERY, sql = %query, "built fetch query");
        Ok(query)
    }
}

impl fmt::Debug for QueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryPlan")
            .field("source", &self.source)
            .field("row_id_field", &self.row_id_field)
            .field("paginate", &self.paginate)
            .field("variants", &self.variants().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Column;

    fn columns() -> ColumnModel {
        ColumnModel::new(vec![
            Column::new(0, "Name").with_query("name", "name", ResultType::Text),
            Column::new(1, "Actions"),
            Column::new(2, "Total").with_query("price * qty", "total", ResultType::Real),
        ])
        .unwrap()
    }

    fn plan() -> QueryPlan {
        QueryPlan::new(&columns(), "orders", "id", true)
    }

    fn sort(column: Option<usize>, ascending: bool) -> SortState {
        SortState { column, ascending }
    }

    #[test]
    fn test_natural_order_sql() {
        let query = plan().build(&SortState::default(), 50).unwrap();
        assert_eq!(
            query.to_sql(),
            r#"SELECT "id", name AS "name", price * qty AS "total" FROM "orders" LIMIT 50"#
        );
    }

    #[test]
    fn test_sorted_nulls_last_both_directions() {
        let plan = plan();
        let asc = plan.build(&sort(Some(2), true), 10).unwrap();
        let desc = plan.build(&sort(Some(2), false), 10).unwrap();

        assert!(asc.to_sql().ends_with(r#"ORDER BY "total" ASC NULLS LAST LIMIT 10"#));
        assert!(desc.to_sql().ends_with(r#"ORDER BY "total" DESC NULLS LAST LIMIT 10"#));
        assert_eq!(desc.order_by.unwrap().field, "total");
    }

    #[test]
    fn test_order_by_targets_selected_column_only() {
        let plan = plan();
        for column in columns().sortable() {
            let query = plan.build(&sort(Some(column.index()), true), 5).unwrap();
            let order_by = query.order_by.unwrap();
            assert_eq!(Some(order_by.field.as_str()), column.field_name());
        }
    }

    #[test]
    fn test_idempotent() {
        let plan = plan();
        let state = sort(Some(0), false);
        assert_eq!(
            plan.build(&state, 25).unwrap().to_sql(),
            plan.build(&state, 25).unwrap().to_sql()
        );
    }

    #[test]
    fn test_pagination_disabled() {
        let plan = QueryPlan::new(&columns(), "orders", "id", false);
        let query = plan.build(&SortState::default(), 50).unwrap();
        assert_eq!(query.limit, None);
        assert!(!query.to_sql().contains("LIMIT"));
    }

    #[test]
    fn test_invalid_sort_columns() {
        let plan = plan();
        assert_eq!(
            plan.build(&sort(Some(1), true), 5).unwrap_err(),
            QueryError::NotSortable(1)
        );
        assert_eq!(
            plan.build(&sort(Some(9), true), 5).unwrap_err(),
            QueryError::ColumnOutOfRange { column: 9, column_count: 3 }
        );
    }

    #[test]
    fn test_variants_enumerable() {
        let variants: Vec<_> = plan().variants().cloned().collect();
        assert_eq!(
            variants,
            vec![
                QueryVariant::Natural,
                QueryVariant::Sorted { column: 0, field: "name".into() },
                QueryVariant::Sorted { column: 2, field: "total".into() },
            ]
        );
    }

    #[test]
    fn test_shape_declares_projected_fields() {
        let plan = plan();
        let shape = plan.shape();
        assert_eq!(shape.row_id_field, "id");
        assert_eq!(shape.fields.len(), 2);
        assert_eq!(shape.field("total").unwrap().result_type, ResultType::Real);
    }

    #[test]
    fn test_quote_ident_escapes() {
        assert_eq!(quote_ident(r#"we"ird"#), r#""we""ird""#);
    }
}
