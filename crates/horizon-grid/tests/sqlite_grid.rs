//! Tests for a grid mounted over an in-memory SQLite database.

#![cfg(feature = "sqlite")]

use std::sync::Arc;

use horizon_grid::{
    CellPosition, Column, ColumnModel, CommitOutcome, EditHooks, EditResult, FetchOutcome, Grid,
    GridConfig, Key, KeyOutcome, QueryGeneration, ResultType, SqliteDataService, TransactionOp,
    Value,
};
use horizon_grid_core::AsyncRuntime;

const SCHEMA: &str = "
    CREATE TABLE products (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL CHECK (length(name) <= 12),
        price REAL,
        qty INTEGER
    );
    CREATE TABLE audit (product_id INTEGER, old_name TEXT);
    INSERT INTO products VALUES
        (1, 'bolt', 0.5, 100),
        (2, 'nut', 0.25, NULL),
        (3, 'washer', 0.5, 60),
        (4, 'gear', 12.0, 4);
";

fn service() -> SqliteDataService {
    let service = SqliteDataService::open_in_memory().expect("open database");
    service.execute_batch(SCHEMA).expect("create schema");
    service
}

fn columns() -> ColumnModel {
    let mut label = QueryGeneration::new("upper(name)", "label", ResultType::Text);
    label.update_field = Some("name".to_string());

    ColumnModel::new(vec![
        Column::new(0, "Name").with_query_generation(label),
        Column::new(1, "Total").with_query("price * qty", "total", ResultType::Real),
        Column::new(2, "Qty").with_query("qty", "qty", ResultType::Integer),
        Column::new(3, "Actions"),
    ])
    .expect("valid columns")
}

async fn mount(hooks: EditHooks) -> Grid<SqliteDataService> {
    let runtime = Arc::new(AsyncRuntime::current().expect("inside tokio"));
    let grid = Grid::new(GridConfig::new("products"), columns(), service(), runtime)
        .expect("mount grid")
        .with_hooks(hooks);
    let outcome = grid.load().expect("load").wait().await;
    assert!(matches!(outcome, Some(FetchOutcome::Applied { rows: 4, .. })));
    grid
}

fn audit_hooks() -> EditHooks {
    EditHooks::new().before(|ctx| {
        vec![TransactionOp::execute(
            "INSERT INTO audit (product_id, old_name) VALUES (?1, ?2)",
            vec![ctx.row_id.to_value(), ctx.previous.clone()],
        )]
    })
}

fn audit_count(grid: &Grid<SqliteDataService>) -> i64 {
    grid.service().with_connection(|conn| {
        conn.query_row("SELECT count(*) FROM audit", [], |row| row.get(0))
            .expect("count audit rows")
    })
}

async fn commit(grid: &Grid<SqliteDataService>, position: CellPosition, value: &str) -> EditResult {
    grid.on_cell_double_click(position);
    grid.set_value(value).expect("editor open");
    match grid.on_cell_keydown(position, Key::Enter).expect("commit") {
        KeyOutcome::Committed(CommitOutcome::Saving { handle, .. }) => {
            handle.wait().await.expect("save task finished")
        }
        other => panic!("expected a save, got {other:?}"),
    }
}

#[tokio::test]
async fn test_computed_column_sorts_nulls_last() {
    let grid = mount(EditHooks::new()).await;

    grid.on_header_click(1).unwrap().unwrap().wait().await;
    grid.on_header_click(1).unwrap().unwrap().wait().await;

    let totals: Vec<Value> = (0..4)
        .map(|row| grid.cell_value(CellPosition::new(row, 1)))
        .collect();
    assert_eq!(
        totals,
        vec![Value::Float(50.0), Value::Float(48.0), Value::Float(30.0), Value::Null]
    );
}

#[tokio::test]
async fn test_edit_writes_through_update_field() {
    let grid = mount(audit_hooks()).await;
    let cell = CellPosition::new(0, 0);
    assert_eq!(grid.cell_value(cell), Value::from("BOLT"));

    match commit(&grid, cell, "hex bolt").await {
        EditResult::Committed { reload, .. } => {
            reload.expect("reload started").wait().await;
        }
        other => panic!("expected commit, got {other:?}"),
    }

    // The refreshed row carries the server-derived label.
    assert_eq!(grid.cell_value(cell), Value::from("HEX BOLT"));
    let stored: String = grid.service().with_connection(|conn| {
        conn.query_row("SELECT name FROM products WHERE id = 1", [], |row| row.get(0))
            .expect("read name")
    });
    assert_eq!(stored, "hex bolt");
    assert_eq!(audit_count(&grid), 1);
}

#[tokio::test]
async fn test_constraint_failure_rolls_back_hooks() {
    let grid = mount(audit_hooks()).await;
    let cell = CellPosition::new(1, 0);

    let result = commit(&grid, cell, "a name that is far too long").await;
    assert!(!result.is_committed());

    assert_eq!(grid.cell_value(cell), Value::from("NUT"));
    assert_eq!(audit_count(&grid), 0);
    assert_eq!(grid.state().refresh_key(), 0);
    assert!(grid.state().display_error_message().is_some());
}

#[tokio::test]
async fn test_integer_edit_and_fetch_more() {
    let grid = mount(EditHooks::new()).await;
    let cell = CellPosition::new(1, 2);
    assert_eq!(grid.cell_value(cell), Value::Null);

    grid.on_cell_double_click(cell);
    grid.set_value(40i64).expect("editor open");
    let KeyOutcome::Committed(CommitOutcome::Saving { handle, .. }) =
        grid.on_cell_keydown(cell, Key::Enter).expect("commit")
    else {
        panic!("expected a save");
    };
    let EditResult::Committed { reload, .. } = handle.wait().await.expect("finished") else {
        panic!("expected commit");
    };
    reload.expect("reload").wait().await;

    assert_eq!(grid.cell_value(cell), Value::Int(40));
    assert_eq!(grid.cell_value(CellPosition::new(1, 1)), Value::Float(10.0));

    grid.on_fetch_more().unwrap().unwrap().wait().await;
    assert_eq!(grid.state().row_count(), 100);
    assert_eq!(grid.relation().len(), 4);
    assert!(!grid.frame().can_fetch_more);
}

#[tokio::test]
async fn test_seeded_letter_in_integer_column_is_rejected() {
    let grid = mount(EditHooks::new()).await;
    let cell = CellPosition::new(0, 2);
    assert_eq!(grid.cell_value(cell), Value::Int(100));

    grid.on_cell_click(cell);
    let outcome = grid.on_cell_keydown(cell, Key::Char('x')).expect("keydown");
    assert!(matches!(outcome, KeyOutcome::EditStarted));
    let outcome = grid.on_cell_keydown(cell, Key::Enter).expect("commit");
    assert!(matches!(
        outcome,
        KeyOutcome::Committed(CommitOutcome::Invalid(ref message)) if message == "expected an integer"
    ));
    assert!(grid.state().editing().is_at(cell));
    assert_eq!(
        grid.editor().expect("editor open").field_error(),
        Some("expected an integer")
    );
    assert_eq!(grid.cell_value(cell), Value::Int(100));

    grid.set_value("7").expect("editor open");
    let KeyOutcome::Committed(CommitOutcome::Saving { handle, .. }) =
        grid.on_cell_keydown(cell, Key::Enter).expect("commit")
    else {
        panic!("expected a save");
    };
    let EditResult::Committed { reload, .. } = handle.wait().await.expect("finished") else {
        panic!("expected commit");
    };
    let reloaded = reload.expect("reload").wait().await;
    assert!(matches!(reloaded, Some(FetchOutcome::Applied { .. })));

    assert_eq!(grid.cell_value(cell), Value::Int(7));
    let stored: i64 = grid.service().with_connection(|conn| {
        conn.query_row("SELECT qty FROM products WHERE id = 1", [], |row| row.get(0))
            .expect("read qty")
    });
    assert_eq!(stored, 7);
}
