//! Columnar telemetry for simulation runs.
//!
//! A custom `tracing` subscriber turns events into rows of per-target
//! tables; the schema grows from whatever fields the events carry. Tests
//! drain the tables into polars DataFrames for analysis, optionally
//! persisting them as parquet.
//!
//! # Usage
//!
//! ```ignore
//! // In simulation code:
//! tracing::info!(target: "results", turn, restaurant, served, revenue);
//!
//! // In a test:
//! instrument::install();
//! // ... run simulation ...
//! let tables = instrument::drain();
//! let results = &tables.tables["results"];
//! ```

use std::cell::RefCell;
use std::collections::BTreeMap;

use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Record};
use tracing::{Event, Id, Metadata, Subscriber};

// ============================================================================
// Tables
// ============================================================================

/// A column of values of one type. Unsigned event fields fold into `Int`;
/// anything unrecognized lands in `Text` via its Debug form.
#[derive(Debug, Clone)]
pub enum Column {
    Int(Vec<i64>),
    Float(Vec<f64>),
    Flag(Vec<bool>),
    Text(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Int(v) => v.len(),
            Column::Float(v) => v.len(),
            Column::Flag(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Extend with default values up to `len`. Keeps ragged events (a field
    /// present in some rows only) rectangular.
    fn pad_to(&mut self, len: usize) {
        match self {
            Column::Int(v) => v.resize(len, 0),
            Column::Float(v) => v.resize(len, 0.0),
            Column::Flag(v) => v.resize(len, false),
            Column::Text(v) => v.resize(len, String::new()),
        }
    }
}

/// One event target's accumulated rows. Columns are kept sorted by name so
/// drained output is deterministic.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub columns: BTreeMap<String, Column>,
    pub rows: usize,
}

impl Table {
    fn pad_all(&mut self) {
        for column in self.columns.values_mut() {
            column.pad_to(self.rows);
        }
    }
}

/// All tables recorded so far, keyed by tracing target.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub tables: BTreeMap<String, Table>,
}

thread_local! {
    static RECORDED: RefCell<Tables> = RefCell::default();
}

// ============================================================================
// Subscriber
// ============================================================================

struct RowVisitor<'a> {
    table: &'a mut Table,
}

impl RowVisitor<'_> {
    fn column(&mut self, field: &Field, make: fn(usize) -> Column) -> &mut Column {
        let rows = self.table.rows;
        self.table
            .columns
            .entry(field.name().to_string())
            .or_insert_with(|| make(rows))
    }
}

impl Visit for RowVisitor<'_> {
    fn record_i64(&mut self, field: &Field, value: i64) {
        if let Column::Int(v) = self.column(field, |rows| Column::Int(vec![0; rows])) {
            v.push(value);
        }
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record_i64(field, value as i64);
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let Column::Float(v) = self.column(field, |rows| Column::Float(vec![0.0; rows])) {
            v.push(value);
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if let Column::Flag(v) = self.column(field, |rows| Column::Flag(vec![false; rows])) {
            v.push(value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if let Column::Text(v) =
            self.column(field, |rows| Column::Text(vec![String::new(); rows]))
        {
            v.push(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.record_str(field, &format!("{value:?}"));
    }
}

/// Collects info-level events into per-target tables. Spans are ignored.
pub struct TableSubscriber;

impl Subscriber for TableSubscriber {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.is_event() && *metadata.level() <= tracing::Level::INFO
    }

    fn new_span(&self, _span: &Attributes<'_>) -> Id {
        Id::from_u64(1)
    }

    fn record(&self, _span: &Id, _values: &Record<'_>) {}

    fn record_follows_from(&self, _span: &Id, _follows: &Id) {}

    fn event(&self, event: &Event<'_>) {
        let target = event.metadata().target().to_string();
        RECORDED.with(|r| {
            let mut recorded = r.borrow_mut();
            let table = recorded.tables.entry(target).or_default();

            table.pad_all();
            event.record(&mut RowVisitor { table });
            table.rows += 1;
            table.pad_all();
        });
    }

    fn enter(&self, _span: &Id) {}

    fn exit(&self, _span: &Id) {}
}

/// Install the table subscriber as the global default. Safe to call more
/// than once; later calls are no-ops.
pub fn install() {
    let _ = tracing::subscriber::set_global_default(TableSubscriber);
}

/// Take everything recorded on this thread so far.
pub fn drain() -> Tables {
    RECORDED.with(|r| std::mem::take(&mut *r.borrow_mut()))
}

/// Discard everything recorded on this thread so far.
pub fn clear() {
    RECORDED.with(|r| *r.borrow_mut() = Tables::default());
}

// ============================================================================
// Polars Integration
// ============================================================================

use polars::prelude::*;

impl Table {
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let columns: Vec<polars::prelude::Column> = self
            .columns
            .iter()
            .map(|(name, column)| match column {
                Column::Int(v) => polars::prelude::Column::new(name.into(), v),
                Column::Float(v) => polars::prelude::Column::new(name.into(), v),
                Column::Flag(v) => polars::prelude::Column::new(name.into(), v),
                Column::Text(v) => polars::prelude::Column::new(name.into(), v),
            })
            .collect();
        DataFrame::new(columns)
    }
}

impl Tables {
    pub fn to_dataframes(&self) -> BTreeMap<String, DataFrame> {
        self.tables
            .iter()
            .filter_map(|(name, table)| table.to_dataframe().ok().map(|df| (name.clone(), df)))
            .collect()
    }
}

/// Drain and convert in one step.
pub fn drain_to_dataframes() -> BTreeMap<String, DataFrame> {
    drain().to_dataframes()
}

/// Write each DataFrame as `{dir}/{name}.parquet`.
pub fn save_parquet(
    dfs: &mut BTreeMap<String, DataFrame>,
    dir: &std::path::Path,
) -> PolarsResult<()> {
    std::fs::create_dir_all(dir).map_err(|e| PolarsError::IO {
        error: e.into(),
        msg: None,
    })?;
    for (name, df) in dfs.iter_mut() {
        let path = dir.join(format!("{name}.parquet"));
        let file = std::fs::File::create(&path).map_err(|e| PolarsError::IO {
            error: e.into(),
            msg: None,
        })?;
        ParquetWriter::new(file).finish(df)?;
    }
    Ok(())
}

/// RAII guard for an instrumented run: clears recorded data on creation,
/// writes parquet under `{parent}/{name}/` on drop. `get()` drains once and
/// caches, so analysis and persistence see the same frames.
pub struct ScopedRecorder {
    run_dir: std::path::PathBuf,
    dfs: Option<BTreeMap<String, DataFrame>>,
}

impl ScopedRecorder {
    pub fn new(parent: impl Into<std::path::PathBuf>, name: &str) -> Self {
        clear();
        install();
        Self {
            run_dir: parent.into().join(name),
            dfs: None,
        }
    }

    pub fn get(&mut self) -> &BTreeMap<String, DataFrame> {
        self.dfs.get_or_insert_with(drain_to_dataframes)
    }

    pub fn run_dir(&self) -> &std::path::Path {
        &self.run_dir
    }
}

impl Drop for ScopedRecorder {
    fn drop(&mut self) {
        let mut dfs = self.dfs.take().unwrap_or_else(drain_to_dataframes);
        if dfs.is_empty() {
            return;
        }
        if let Err(e) = save_parquet(&mut dfs, &self.run_dir) {
            eprintln!(
                "ScopedRecorder({}): failed to write parquet: {e}",
                self.run_dir.display()
            );
        }
    }
}
