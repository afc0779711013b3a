//! Warehouse reader backed by DuckDB

use super::PrimarySource;
use crate::config::WarehouseConfig;
use crate::error::{ReconError, Result};
use crate::model::SourceKind;
use crate::value::{Record, Value};
use chrono::{NaiveTime, TimeZone, Utc};
use duckdb::types::Value as DuckValue;
use duckdb::Connection;
use std::path::Path;

/// Pages through a table, view or file relation with `LIMIT`/`OFFSET`
pub struct DuckDbWarehouse {
    connection: Connection,
    name: String,
    relation: String,
    columns: Vec<String>,
    order_by: Vec<String>,
}

impl DuckDbWarehouse {
    /// Open the configured database and discover the relation's columns.
    ///
    /// Relative file paths inside `relation` resolve against `search_path`.
    pub fn open(config: &WarehouseConfig, order_by: Vec<String>, search_path: Option<&Path>) -> Result<Self> {
        let connection = match &config.database {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };

        connection.execute("SET enable_progress_bar=false", [])?;
        if let Some(limit) = &config.memory_limit {
            connection.execute(&format!("SET memory_limit='{}'", limit.replace('\'', "''")), [])?;
        }
        if let Some(dir) = search_path {
            let dir = dir.to_string_lossy().replace('\'', "''");
            connection.execute(&format!("SET file_search_path='{}'", dir), [])?;
        }

        Self::from_connection(connection, &config.relation, order_by)
    }

    /// Wrap an existing connection
    pub fn from_connection(connection: Connection, relation: &str, order_by: Vec<String>) -> Result<Self> {
        let mut warehouse = Self {
            connection,
            name: format!("duckdb:{}", relation),
            relation: relation.to_string(),
            columns: Vec::new(),
            order_by,
        };
        warehouse.columns = warehouse.describe()?;

        if let Some(unknown) = warehouse
            .order_by
            .iter()
            .find(|col| !warehouse.columns.contains(col))
        {
            return Err(ReconError::config(format!(
                "Cannot order {} by '{}': no such column (available: {})",
                warehouse.relation,
                unknown,
                warehouse.columns.join(", ")
            )));
        }

        log::info!(
            "Opened warehouse relation {} with {} columns",
            warehouse.relation,
            warehouse.columns.len()
        );
        Ok(warehouse)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Column names in relation order
    fn describe(&self) -> Result<Vec<String>> {
        let sql = format!("DESCRIBE SELECT * FROM {}", self.relation);
        let mut stmt = self.connection.prepare(&sql).map_err(|e| {
            ReconError::invalid_input(format!("Cannot read relation {}: {}", self.relation, e))
        })?;

        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| ReconError::invalid_input(format!("Failed to describe {}: {}", self.relation, e)))?;

        let mut columns = Vec::new();
        for row in rows {
            columns.push(row?);
        }
        Ok(columns)
    }

    /// The remaining columns break ties, so repeated keys still page in a total order
    fn page_sql(&self, offset: u64, limit: usize) -> String {
        let mut sql = format!("SELECT * FROM {}", self.relation);
        if !self.order_by.is_empty() {
            let tiebreak = self.columns.iter().filter(|c| !self.order_by.contains(c));
            let order: Vec<String> = self
                .order_by
                .iter()
                .chain(tiebreak)
                .map(|c| quote_identifier(c))
                .collect();
            sql.push_str(&format!(" ORDER BY {}", order.join(", ")));
        }
        sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));
        sql
    }

    fn page_error(&self, offset: u64, e: duckdb::Error) -> ReconError {
        ReconError::source_unavailable(
            SourceKind::Primary,
            format!("query on {} at offset {} failed: {}", self.relation, offset, e),
        )
    }
}

impl PrimarySource for DuckDbWarehouse {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch_page(&mut self, offset: u64, limit: usize) -> Result<Vec<Record>> {
        let sql = self.page_sql(offset, limit);
        log::debug!("Warehouse query: {}", sql);

        let column_count = self.columns.len();
        let mut stmt = self.connection.prepare(&sql).map_err(|e| self.page_error(offset, e))?;
        let rows = stmt
            .query_map([], |row| {
                let mut values = Vec::with_capacity(column_count);
                for i in 0..column_count {
                    values.push(row.get::<_, DuckValue>(i)?);
                }
                Ok(values)
            })
            .map_err(|e| self.page_error(offset, e))?;

        let mut records = Vec::new();
        for row in rows {
            let values = row.map_err(|e| self.page_error(offset, e))?;
            let record: Record = self
                .columns
                .iter()
                .cloned()
                .zip(values.into_iter().map(convert_value))
                .collect();
            records.push(record);
        }
        Ok(records)
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Map a DuckDB value onto the record value model
pub fn convert_value(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(b) => Value::Bool(b),
        DuckValue::TinyInt(i) => Value::Int(i.into()),
        DuckValue::SmallInt(i) => Value::Int(i.into()),
        DuckValue::Int(i) => Value::Int(i.into()),
        DuckValue::BigInt(i) => Value::Int(i),
        DuckValue::HugeInt(i) => i64::try_from(i)
            .map(Value::Int)
            .unwrap_or(Value::Float(i as f64)),
        DuckValue::UTinyInt(i) => Value::Int(i.into()),
        DuckValue::USmallInt(i) => Value::Int(i.into()),
        DuckValue::UInt(i) => Value::Int(i.into()),
        DuckValue::UBigInt(i) => i64::try_from(i)
            .map(Value::Int)
            .unwrap_or(Value::Float(i as f64)),
        DuckValue::Float(f) => Value::Float(f.into()),
        DuckValue::Double(f) => Value::Float(f),
        DuckValue::Decimal(d) => {
            let text = d.to_string();
            text.parse::<f64>().map(Value::Float).unwrap_or(Value::String(text))
        }
        DuckValue::Text(s) => Value::String(s),
        DuckValue::Blob(b) => Value::String(format!("<blob:{} bytes>", b.len())),
        DuckValue::Timestamp(unit, t) => timestamp_from_micros(unit.to_micros(t)),
        DuckValue::Date32(days) => Utc
            .timestamp_opt(i64::from(days) * 86_400, 0)
            .single()
            .map(Value::Timestamp)
            .unwrap_or(Value::Null),
        DuckValue::Time64(unit, t) => {
            let micros = unit.to_micros(t);
            let secs = u32::try_from(micros.div_euclid(1_000_000)).unwrap_or(0);
            let nanos = u32::try_from(micros.rem_euclid(1_000_000) * 1_000).unwrap_or(0);
            NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
                .map(|time| Value::String(time.to_string()))
                .unwrap_or(Value::Null)
        }
        DuckValue::List(items) | DuckValue::Array(items) => {
            Value::Array(items.into_iter().map(convert_value).collect())
        }
        DuckValue::Enum(s) => Value::String(s),
        DuckValue::Struct(fields) => Value::Object(
            fields
                .iter()
                .map(|(name, value)| (name.clone(), convert_value(value.clone())))
                .collect(),
        ),
        DuckValue::Map(entries) => Value::Object(
            entries
                .iter()
                .map(|(key, value)| (map_key(key), convert_value(value.clone())))
                .collect(),
        ),
        DuckValue::Union(inner) => convert_value(*inner),
        DuckValue::UHugeInt(i) => i64::try_from(i)
            .map(Value::Int)
            .unwrap_or(Value::Float(i as f64)),
        DuckValue::Interval { months, days, nanos } => {
            Value::String(format!("{} months {} days {} ns", months, days, nanos))
        }
        DuckValue::Geometry(b) => Value::String(format!("<geometry:{} bytes>", b.len())),
        other => {
            log::warn!("Unsupported DuckDB value {:?}; reading it as null", other);
            Value::Null
        }
    }
}

/// Map keys become field names; non-text keys use their JSON rendering
fn map_key(key: &DuckValue) -> String {
    match convert_value(key.clone()) {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn timestamp_from_micros(micros: i64) -> Value {
    let secs = micros.div_euclid(1_000_000);
    let nanos = u32::try_from(micros.rem_euclid(1_000_000) * 1_000).unwrap_or(0);
    Utc.timestamp_opt(secs, nanos)
        .single()
        .map(Value::Timestamp)
        .unwrap_or(Value::Null)
}
