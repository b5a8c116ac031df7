//! Streaming decode of the gzip-compressed CSV artifact into bounded chunks.

use arrow_array::RecordBatch;
use arrow_csv::reader::{Format, Reader, ReaderBuilder};
use arrow_schema::{ArrowError, DataType, Field, Schema, SchemaRef};
use flate2::read::GzDecoder;
use log::debug;
use regex::Regex;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

/// Cell values read as missing regardless of column type.
const MISSING_TOKENS: &str = r"^(|NA|N/A|n/a|NaN|nan|-NaN|-nan|NULL|null|None|<NA>|#N/A|#N/A N/A|#NA|-1\.#IND|-1\.#QNAN|1\.#IND|1\.#QNAN)$";

fn missing_regex() -> Result<Regex, ArrowError> {
    Regex::new(MISSING_TOKENS).map_err(|e| ArrowError::ExternalError(Box::new(e)))
}

fn open_gzip(path: &Path) -> Result<GzDecoder<File>, ArrowError> {
    Ok(GzDecoder::new(File::open(path)?))
}

/// Infers one typed schema for the whole artifact.
///
/// Every record is scanned so that a type seen late in the file still widens
/// the column type. Date-like columns are kept as text: inference only checks
/// the shape of a value, so `2024-02-30` would pass it and then fail to
/// decode. Dates are parsed later, where bad values become null. The decoder
/// is dropped before returning.
pub fn infer_schema(path: &Path) -> Result<SchemaRef, ArrowError> {
    let format = Format::default()
        .with_header(true)
        .with_null_regex(missing_regex()?);
    let (schema, records) = format.infer_schema(open_gzip(path)?, None)?;
    debug!(
        "Inferred {} columns from {} records in {}",
        schema.fields().len(),
        records,
        path.display()
    );
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .map(|field| match field.data_type() {
            DataType::Date32 | DataType::Date64 | DataType::Timestamp(_, _) => {
                Field::new(field.name(), DataType::Utf8, true)
            }
            _ => field.as_ref().clone(),
        })
        .collect();
    Ok(Arc::new(Schema::new(fields)))
}

/// Iterator of chunks holding at most `chunk_size` rows each.
pub struct ChunkReader {
    inner: Reader<GzDecoder<File>>,
}

impl ChunkReader {
    /// Opens `path` for chunked decoding against a previously inferred schema.
    pub fn open(path: &Path, schema: SchemaRef, chunk_size: usize) -> Result<Self, ArrowError> {
        let inner = ReaderBuilder::new(schema)
            .with_header(true)
            .with_null_regex(missing_regex()?)
            .with_batch_size(chunk_size)
            .build(open_gzip(path)?)?;
        Ok(Self { inner })
    }
}

impl Iterator for ChunkReader {
    type Item = Result<RecordBatch, ArrowError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}
