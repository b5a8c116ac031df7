use crate::error::LoadError;
use arrow_array::cast::AsArray;
use arrow_array::types::{
    Date32Type, Float32Type, Float64Type, Int8Type, Int16Type, Int32Type, Int64Type,
    TimestampMicrosecondType, UInt8Type, UInt16Type, UInt32Type,
};
use arrow_array::{Array, ArrayRef, RecordBatch};
use arrow_cast::cast;
use arrow_schema::{DataType, Field, TimeUnit};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use std::collections::HashSet;
use std::path::Path;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Appends cleaned chunks to a target table.
pub trait ChunkSink {
    /// Appends every row of `chunk`, returning the number of rows written.
    fn load(&mut self, chunk: &RecordBatch) -> Result<usize, LoadError>;

    /// Name of the table rows are appended to.
    fn table(&self) -> &str;
}

/// Append-only loader into a SQLite table.
///
/// The table is created from the first chunk's schema when absent. Each
/// chunk is written in its own transaction, so chunks committed before a
/// failure stay committed.
pub struct SqliteLoader {
    connection: Connection,
    table: String,
    columns: Option<HashSet<String>>,
}

impl SqliteLoader {
    /// Opens the store named by `database_url`.
    ///
    /// Accepts a file path, a `sqlite://` prefixed path, or `:memory:`.
    pub fn open(database_url: &str, table: &str) -> Result<Self, LoadError> {
        let path = database_url
            .strip_prefix("sqlite://")
            .unwrap_or(database_url);
        let connection = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(Path::new(path))?
        };
        debug!("Opened SQLite store at {}", path);
        Ok(Self::from_connection(connection, table))
    }

    fn from_connection(connection: Connection, table: &str) -> Self {
        Self {
            connection,
            table: table.to_string(),
            columns: None,
        }
    }

    #[cfg(test)]
    fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Creates the table from `fields` if it does not exist, otherwise checks
    /// that every field has a matching column.
    fn ensure_table(&mut self, fields: &[&Field]) -> Result<(), LoadError> {
        if self.columns.is_none() {
            let existing = self.existing_columns()?;
            if existing.is_empty() {
                self.create_table(fields)?;
                self.columns = Some(fields.iter().map(|f| f.name().clone()).collect());
            } else {
                self.columns = Some(existing);
            }
        }

        if let Some(columns) = &self.columns {
            if let Some(field) = fields.iter().find(|f| !columns.contains(f.name())) {
                return Err(LoadError::MissingColumn {
                    table: self.table.clone(),
                    column: field.name().clone(),
                });
            }
        }
        Ok(())
    }

    fn existing_columns(&self) -> Result<HashSet<String>, LoadError> {
        let mut statement = self
            .connection
            .prepare(&format!("PRAGMA table_info({})", quote(&self.table)))?;
        let names = statement
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(names)
    }

    fn create_table(&self, fields: &[&Field]) -> Result<(), LoadError> {
        let columns = fields
            .iter()
            .map(|field| Ok(format!("{} {}", quote(field.name()), sql_type(field)?)))
            .collect::<Result<Vec<_>, LoadError>>()?;
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote(&self.table),
            columns.join(", ")
        );
        debug!("{}", ddl);
        self.connection.execute(&ddl, [])?;
        Ok(())
    }
}

impl ChunkSink for SqliteLoader {
    fn load(&mut self, chunk: &RecordBatch) -> Result<usize, LoadError> {
        let schema = chunk.schema();
        let fields: Vec<&Field> = schema.fields().iter().map(|f| f.as_ref()).collect();
        self.ensure_table(&fields)?;

        let columns = chunk
            .columns()
            .iter()
            .zip(&fields)
            .map(|(column, field)| storable(column, field))
            .collect::<Result<Vec<_>, _>>()?;
        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(&self.table),
            fields
                .iter()
                .map(|f| quote(f.name()))
                .collect::<Vec<_>>()
                .join(", "),
            (1..=fields.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ")
        );

        let transaction = self.connection.transaction()?;
        {
            let mut statement = transaction.prepare(&insert)?;
            for row in 0..chunk.num_rows() {
                let values = columns
                    .iter()
                    .zip(&fields)
                    .map(|(column, field)| cell(column, field, row))
                    .collect::<Result<Vec<_>, _>>()?;
                statement.execute(params_from_iter(values))?;
            }
        }
        transaction.commit()?;
        Ok(chunk.num_rows())
    }

    fn table(&self) -> &str {
        &self.table
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn unsupported(field: &Field) -> LoadError {
    LoadError::UnsupportedType {
        column: field.name().clone(),
        data_type: field.data_type().clone(),
    }
}

fn sql_type(field: &Field) -> Result<&'static str, LoadError> {
    Ok(match field.data_type() {
        DataType::Boolean
        | DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32 => "INTEGER",
        DataType::Float32 | DataType::Float64 => "REAL",
        DataType::Null | DataType::Utf8 | DataType::LargeUtf8 => "TEXT",
        DataType::Date32 | DataType::Date64 => "DATE",
        DataType::Timestamp(_, _) => "TIMESTAMP",
        _ => return Err(unsupported(field)),
    })
}

/// Casts columns whose native representation has no direct SQLite mapping.
fn storable(column: &ArrayRef, field: &Field) -> Result<ArrayRef, LoadError> {
    sql_type(field)?;
    Ok(match column.data_type() {
        DataType::LargeUtf8 => cast(column, &DataType::Utf8)?,
        DataType::Date64 => cast(column, &DataType::Date32)?,
        DataType::Timestamp(TimeUnit::Microsecond, None) => column.clone(),
        DataType::Timestamp(_, _) => {
            cast(column, &DataType::Timestamp(TimeUnit::Microsecond, None))?
        }
        _ => column.clone(),
    })
}

fn cell(column: &ArrayRef, field: &Field, row: usize) -> Result<Value, LoadError> {
    if column.is_null(row) || column.data_type() == &DataType::Null {
        return Ok(Value::Null);
    }
    Ok(match column.data_type() {
        DataType::Boolean => Value::Integer(i64::from(column.as_boolean().value(row))),
        DataType::Int8 => Value::Integer(column.as_primitive::<Int8Type>().value(row).into()),
        DataType::Int16 => Value::Integer(column.as_primitive::<Int16Type>().value(row).into()),
        DataType::Int32 => Value::Integer(column.as_primitive::<Int32Type>().value(row).into()),
        DataType::Int64 => Value::Integer(column.as_primitive::<Int64Type>().value(row)),
        DataType::UInt8 => Value::Integer(column.as_primitive::<UInt8Type>().value(row).into()),
        DataType::UInt16 => Value::Integer(column.as_primitive::<UInt16Type>().value(row).into()),
        DataType::UInt32 => Value::Integer(column.as_primitive::<UInt32Type>().value(row).into()),
        DataType::Float32 => Value::Real(column.as_primitive::<Float32Type>().value(row).into()),
        DataType::Float64 => Value::Real(column.as_primitive::<Float64Type>().value(row)),
        DataType::Utf8 => Value::Text(column.as_string::<i32>().value(row).to_string()),
        DataType::Date32 => column
            .as_primitive::<Date32Type>()
            .value_as_date(row)
            .map_or(Value::Null, |d| Value::Text(d.format(DATE_FORMAT).to_string())),
        DataType::Timestamp(TimeUnit::Microsecond, None) => column
            .as_primitive::<TimestampMicrosecondType>()
            .value_as_datetime(row)
            .map_or(Value::Null, |dt| {
                Value::Text(dt.format(TIMESTAMP_FORMAT).to_string())
            }),
        _ => return Err(unsupported(field)),
    })
}
