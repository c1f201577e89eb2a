//! Collects market events into column-oriented tables.
//!
//! A `tracing` subscriber turns each info-level event into one row of the
//! table named after the event's target (`price`, `trade`, `membership`,
//! `trade_rejected`, ...). Columns appear the first time a field is seen, so
//! the schema follows whatever the market code records.
//!
//! # Usage
//!
//! ```ignore
//! instrument::install_subscriber();
//! instrument::clear();
//! // ... run trades ...
//! let log = instrument::drain();
//! let trades = log.table("trade").unwrap();
//! let prices = trades.f64s("price_each").unwrap();
//! ```
//!
//! Recording is per thread, so tests running in parallel do not see each
//! other's rows.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use polars::prelude::*;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Record};
use tracing::{Event, Id, Metadata, Subscriber};

/// One typed column. Rows that lacked the field hold the type's zero value.
#[derive(Debug, Clone, PartialEq)]
pub enum EventColumn {
    U64(Vec<u64>),
    I64(Vec<i64>),
    F64(Vec<f64>),
    Bool(Vec<bool>),
    Str(Vec<String>),
}

/// A single recorded field value
#[derive(Debug, Clone, PartialEq)]
enum Cell {
    U64(u64),
    I64(i64),
    F64(f64),
    Bool(bool),
    Str(String),
}

impl EventColumn {
    fn empty_like(cell: &Cell, rows: usize) -> Self {
        match cell {
            Cell::U64(_) => EventColumn::U64(vec![0; rows]),
            Cell::I64(_) => EventColumn::I64(vec![0; rows]),
            Cell::F64(_) => EventColumn::F64(vec![0.0; rows]),
            Cell::Bool(_) => EventColumn::Bool(vec![false; rows]),
            Cell::Str(_) => EventColumn::Str(vec![String::new(); rows]),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            EventColumn::U64(v) => v.len(),
            EventColumn::I64(v) => v.len(),
            EventColumn::F64(v) => v.len(),
            EventColumn::Bool(v) => v.len(),
            EventColumn::Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a value; a value of the wrong type is stored as the default.
    fn push(&mut self, cell: Option<Cell>) {
        match (self, cell) {
            (EventColumn::U64(v), Some(Cell::U64(x))) => v.push(x),
            (EventColumn::I64(v), Some(Cell::I64(x))) => v.push(x),
            (EventColumn::F64(v), Some(Cell::F64(x))) => v.push(x),
            (EventColumn::Bool(v), Some(Cell::Bool(x))) => v.push(x),
            (EventColumn::Str(v), Some(Cell::Str(x))) => v.push(x),
            (EventColumn::U64(v), _) => v.push(0),
            (EventColumn::I64(v), _) => v.push(0),
            (EventColumn::F64(v), _) => v.push(0.0),
            (EventColumn::Bool(v), _) => v.push(false),
            (EventColumn::Str(v), _) => v.push(String::new()),
        }
    }
}

/// All rows recorded under one target.
#[derive(Debug, Clone, Default)]
pub struct EventTable {
    columns: BTreeMap<String, EventColumn>,
    rows: usize,
}

impl EventTable {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn column(&self, name: &str) -> Option<&EventColumn> {
        self.columns.get(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn f64s(&self, name: &str) -> Option<&[f64]> {
        match self.columns.get(name)? {
            EventColumn::F64(v) => Some(v),
            _ => None,
        }
    }

    pub fn i64s(&self, name: &str) -> Option<&[i64]> {
        match self.columns.get(name)? {
            EventColumn::I64(v) => Some(v),
            _ => None,
        }
    }

    pub fn u64s(&self, name: &str) -> Option<&[u64]> {
        match self.columns.get(name)? {
            EventColumn::U64(v) => Some(v),
            _ => None,
        }
    }

    pub fn strs(&self, name: &str) -> Option<&[String]> {
        match self.columns.get(name)? {
            EventColumn::Str(v) => Some(v),
            _ => None,
        }
    }

    /// Append one row. Columns missing from `row` get a default value and
    /// new columns are back-filled for earlier rows.
    fn append(&mut self, mut row: HashMap<String, Cell>) {
        for (name, cell) in &row {
            if !self.columns.contains_key(name) {
                let column = EventColumn::empty_like(cell, self.rows);
                self.columns.insert(name.clone(), column);
            }
        }
        for (name, column) in self.columns.iter_mut() {
            column.push(row.remove(name));
        }
        self.rows += 1;
    }

    /// Convert to a polars DataFrame, one series per column.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let columns: Vec<Column> = self
            .columns
            .iter()
            .map(|(name, col)| match col {
                EventColumn::U64(v) => Column::new(name.into(), v),
                EventColumn::I64(v) => Column::new(name.into(), v),
                EventColumn::F64(v) => Column::new(name.into(), v),
                EventColumn::Bool(v) => Column::new(name.into(), v),
                EventColumn::Str(v) => Column::new(name.into(), v),
            })
            .collect();
        DataFrame::new(columns)
    }
}

/// Every table recorded on this thread, keyed by event target.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    tables: HashMap<String, EventTable>,
}

impl EventLog {
    pub fn table(&self, target: &str) -> Option<&EventTable> {
        self.tables.get(target)
    }

    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn to_dataframes(&self) -> HashMap<String, DataFrame> {
        self.tables
            .iter()
            .filter_map(|(name, table)| table.to_dataframe().ok().map(|df| (name.clone(), df)))
            .collect()
    }
}

thread_local! {
    static LOG: RefCell<EventLog> = RefCell::default();
}

/// Gathers one event's fields into a row
#[derive(Default)]
struct RowVisitor {
    row: HashMap<String, Cell>,
}

impl RowVisitor {
    fn put(&mut self, field: &Field, cell: Cell) {
        self.row.insert(field.name().to_string(), cell);
    }
}

impl Visit for RowVisitor {
    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, Cell::U64(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, Cell::I64(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field, Cell::F64(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, Cell::Bool(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Cell::Str(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, Cell::Str(format!("{:?}", value)));
    }
}

/// Tracing subscriber that appends info-level events to the thread's log.
/// Spans are ignored.
pub struct EventLogSubscriber;

impl Subscriber for EventLogSubscriber {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.is_event() && *metadata.level() <= tracing::Level::INFO
    }

    fn new_span(&self, _span: &Attributes<'_>) -> Id {
        Id::from_u64(1)
    }

    fn record(&self, _span: &Id, _values: &Record<'_>) {}

    fn record_follows_from(&self, _span: &Id, _follows: &Id) {}

    fn event(&self, event: &Event<'_>) {
        let mut visitor = RowVisitor::default();
        event.record(&mut visitor);
        let target = event.metadata().target().to_string();
        LOG.with(|log| {
            log.borrow_mut()
                .tables
                .entry(target)
                .or_default()
                .append(visitor.row);
        });
    }

    fn enter(&self, _span: &Id) {}

    fn exit(&self, _span: &Id) {}
}

/// Install [`EventLogSubscriber`] as the global default. Later calls are
/// harmless no-ops.
pub fn install_subscriber() {
    let _ = tracing::subscriber::set_global_default(EventLogSubscriber);
}

/// Take everything recorded on this thread, leaving the log empty.
pub fn drain() -> EventLog {
    LOG.with(|log| std::mem::take(&mut *log.borrow_mut()))
}

pub fn clear() {
    LOG.with(|log| *log.borrow_mut() = EventLog::default());
}

pub fn drain_to_dataframes() -> HashMap<String, DataFrame> {
    drain().to_dataframes()
}

/// Write each table as `{dir}/{target}.parquet`.
pub fn save_parquet(dfs: &mut HashMap<String, DataFrame>, dir: &Path) -> PolarsResult<()> {
    std::fs::create_dir_all(dir).map_err(|e| PolarsError::IO {
        error: e.into(),
        msg: None,
    })?;
    for (name, df) in dfs.iter_mut() {
        let path = dir.join(format!("{}.parquet", name));
        let file = std::fs::File::create(&path).map_err(|e| PolarsError::IO {
            error: e.into(),
            msg: None,
        })?;
        ParquetWriter::new(file).finish(df)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[(&str, Cell)]) -> HashMap<String, Cell> {
        cells
            .iter()
            .map(|(name, cell)| (name.to_string(), cell.clone()))
            .collect()
    }

    #[test]
    fn test_append_backfills_and_pads() {
        let mut table = EventTable::default();
        table.append(row(&[("new_price", Cell::F64(10.0))]));
        table.append(row(&[
            ("new_price", Cell::F64(9.5)),
            ("cause", Cell::Str("supply_added".into())),
        ]));
        table.append(row(&[("cause", Cell::Str("set".into()))]));

        assert_eq!(table.rows(), 3);
        assert_eq!(table.f64s("new_price").unwrap(), &[10.0, 9.5, 0.0]);
        assert_eq!(
            table.strs("cause").unwrap(),
            &["".to_string(), "supply_added".to_string(), "set".to_string()]
        );
        for name in table.column_names() {
            assert_eq!(table.column(name).unwrap().len(), 3, "column {name}");
        }
    }

    #[test]
    fn test_mismatched_type_stores_default() {
        let mut table = EventTable::default();
        table.append(row(&[("quantity", Cell::I64(4))]));
        table.append(row(&[("quantity", Cell::Str("four".into()))]));
        assert_eq!(table.i64s("quantity").unwrap(), &[4, 0]);
        assert_eq!(table.f64s("quantity"), None);
    }

    #[test]
    fn test_subscriber_records_events() {
        install_subscriber();
        clear();

        tracing::info!(target: "trade", quantity = 4i64, price_each = 1.0f64, buyer = 7u64);
        tracing::debug!(target: "trade", quantity = 99i64);

        let log = drain();
        let trades = log.table("trade").expect("trade table");
        assert_eq!(trades.rows(), 1);
        assert_eq!(trades.i64s("quantity").unwrap(), &[4]);
        assert_eq!(trades.f64s("price_each").unwrap(), &[1.0]);
        assert_eq!(trades.u64s("buyer").unwrap(), &[7]);
        assert!(drain().is_empty());
    }

    #[test]
    fn test_save_parquet_round_trip() {
        let mut table = EventTable::default();
        table.append(row(&[
            ("new_price", Cell::F64(9.5)),
            ("cause", Cell::Str("set".into())),
        ]));
        table.append(row(&[("new_price", Cell::F64(4.0))]));
        let mut log = EventLog::default();
        log.tables.insert("price".to_string(), table);
        assert_eq!(log.targets().collect::<Vec<_>>(), vec!["price"]);

        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("run");
        let mut dfs = log.to_dataframes();
        save_parquet(&mut dfs, &out).unwrap();

        let file = std::fs::File::open(out.join("price.parquet")).unwrap();
        let df = ParquetReader::new(file).finish().unwrap();
        assert_eq!(df.height(), 2);
        let prices: Vec<Option<f64>> = df
            .column("new_price")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(prices, vec![Some(9.5), Some(4.0)]);
        assert_eq!(df.column("cause").unwrap().str().unwrap().get(1), Some(""));
    }

    #[test]
    fn test_to_dataframe() {
        let mut table = EventTable::default();
        table.append(row(&[("tick", Cell::U64(1)), ("ok", Cell::Bool(true))]));
        table.append(row(&[("tick", Cell::U64(2))]));

        let df = table.to_dataframe().unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 2);
    }
}
