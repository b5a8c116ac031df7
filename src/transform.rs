use crate::error::ChunkProcessingError;
use arrow_array::cast::AsArray;
use arrow_array::{Array, ArrayRef, BooleanArray, RecordBatch, TimestampMillisecondArray};
use arrow_cast::cast;
use arrow_schema::{DataType, Field, Schema, TimeUnit};
use arrow_select::filter::filter_record_batch;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::debug;
use std::collections::HashSet;
use std::sync::Arc;

/// Column that is parsed into timestamps after renaming.
pub const DATE_COLUMN: &str = "date";

/// Type of a parsed `date` column.
pub const DATE_TYPE: DataType = DataType::Timestamp(TimeUnit::Millisecond, None);

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%Y%m%d", "%d-%b-%Y", "%d %B %Y", "%B %d, %Y",
];

/// Normalizes one chunk.
///
/// Steps, in order:
/// 1. drop every row with a missing value in any column
/// 2. trim, lowercase and underscore every column name
/// 3. parse a `date` column into millisecond timestamps; unparseable values
///    become null instead of failing
///
/// # Errors
///
/// Returns `ChunkProcessingError` if two columns normalize to the same name
/// or an Arrow kernel fails.
pub fn transform(chunk: &RecordBatch) -> Result<RecordBatch, ChunkProcessingError> {
    let complete = drop_incomplete_rows(chunk)?;
    let renamed = normalize_column_names(&complete)?;
    let Some(date_idx) = renamed.schema().index_of(DATE_COLUMN).ok() else {
        return Ok(renamed);
    };

    let (dates, coerced) = parse_dates(renamed.column(date_idx))?;
    if coerced > 0 {
        debug!("{} date values could not be parsed and were set to null", coerced);
    }

    let schema = renamed.schema();
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .enumerate()
        .map(|(i, field)| {
            if i == date_idx {
                Field::new(DATE_COLUMN, DATE_TYPE, true)
            } else {
                field.as_ref().clone()
            }
        })
        .collect();
    let mut columns = renamed.columns().to_vec();
    columns[date_idx] = dates;

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// Normalized form of a column name: trimmed, lowercased, spaces replaced by `_`.
pub fn normalize_column_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

fn drop_incomplete_rows(chunk: &RecordBatch) -> Result<RecordBatch, ChunkProcessingError> {
    // A column inferred as Null has no validity buffer but is missing everywhere.
    if chunk.columns().iter().any(|c| c.data_type() == &DataType::Null) {
        return Ok(chunk.slice(0, 0));
    }
    if chunk.columns().iter().all(|c| c.null_count() == 0) {
        return Ok(chunk.clone());
    }
    let keep: BooleanArray = (0..chunk.num_rows())
        .map(|row| Some(chunk.columns().iter().all(|c| c.is_valid(row))))
        .collect();
    let filtered = filter_record_batch(chunk, &keep)?;
    debug!(
        "Dropped {} rows with missing values",
        chunk.num_rows() - filtered.num_rows()
    );
    Ok(filtered)
}

fn normalize_column_names(chunk: &RecordBatch) -> Result<RecordBatch, ChunkProcessingError> {
    let mut seen = HashSet::new();
    let mut fields = Vec::with_capacity(chunk.num_columns());
    for field in chunk.schema().fields() {
        let name = normalize_column_name(field.name());
        if !seen.insert(name.clone()) {
            return Err(ChunkProcessingError::DuplicateColumn(name));
        }
        // Rows with nulls are gone, but coerced dates may reintroduce them.
        fields.push(
            Field::new(name, field.data_type().clone(), true)
                .with_metadata(field.metadata().clone()),
        );
    }
    Ok(RecordBatch::try_new(
        Arc::new(Schema::new(fields)),
        chunk.columns().to_vec(),
    )?)
}

/// Converts a column into millisecond timestamps, returning how many
/// non-null inputs failed to parse.
fn parse_dates(column: &ArrayRef) -> Result<(ArrayRef, usize), ChunkProcessingError> {
    match column.data_type() {
        DataType::Date32 | DataType::Date64 | DataType::Timestamp(_, _) => {
            return Ok((cast(column, &DATE_TYPE)?, 0));
        }
        _ => {}
    }

    let text = if column.data_type() == &DataType::Utf8 {
        Arc::clone(column)
    } else {
        cast(column, &DataType::Utf8)?
    };
    let values = text.as_string::<i32>();

    let mut coerced = 0;
    let parsed: TimestampMillisecondArray = values
        .iter()
        .map(|value| {
            let value = value?;
            let millis = parse_datetime(value).map(|dt| dt.and_utc().timestamp_millis());
            if millis.is_none() {
                coerced += 1;
            }
            millis
        })
        .collect();
    Ok((Arc::new(parsed), coerced))
}

/// Parses a date or date-time string in any of the accepted layouts.
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::{Float64Array, Int64Array, StringArray};
    use arrow_array::types::TimestampMillisecondType;
    use rstest::rstest;

    fn batch(columns: Vec<(&str, ArrayRef)>) -> RecordBatch {
        RecordBatch::try_from_iter(columns).unwrap()
    }

    fn assert_clean(chunk: &RecordBatch) {
        for field in chunk.schema().fields() {
            let name = field.name();
            assert_eq!(name, &name.trim().to_lowercase());
            assert!(!name.contains(' '));
        }
    }

    fn timestamp(date: &str) -> Option<i64> {
        parse_datetime(date).map(|dt| dt.and_utc().timestamp_millis())
    }

    #[test]
    fn drops_missing_rows_renames_and_parses_dates() {
        let chunk = batch(vec![
            (
                "Date ",
                Arc::new(StringArray::from(vec![Some("2024-01-01"), None])) as ArrayRef,
            ),
            ("Value", Arc::new(Int64Array::from(vec![5, 6])) as ArrayRef),
        ]);

        let cleaned = transform(&chunk).unwrap();

        assert_eq!(cleaned.num_rows(), 1);
        let schema = cleaned.schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["date", "value"]);
        assert_eq!(schema.field(0).data_type(), &DATE_TYPE);
        let dates = cleaned.column(0).as_primitive::<TimestampMillisecondType>();
        assert_eq!(
            dates.value_as_datetime(0),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(
            cleaned.column(1).as_primitive::<arrow_array::types::Int64Type>().value(0),
            5
        );
    }

    #[test]
    fn unparseable_dates_become_null() {
        let chunk = batch(vec![(
            "DATE",
            Arc::new(StringArray::from(vec!["2024-02-03", "not a date", "03/04/2024"])) as ArrayRef,
        )]);

        let cleaned = transform(&chunk).unwrap();

        assert_eq!(cleaned.num_rows(), 3);
        let dates = cleaned.column(0).as_primitive::<TimestampMillisecondType>();
        assert_eq!(dates.null_count(), 1);
        assert!(dates.is_null(1));
        assert_eq!(Some(dates.value(0)), timestamp("2024-02-03"));
        assert_eq!(Some(dates.value(2)), timestamp("2024-03-04"));
    }

    #[test]
    fn temporal_date_columns_are_cast() {
        let chunk = batch(vec![(
            "date",
            Arc::new(arrow_array::Date32Array::from(vec![19723])) as ArrayRef,
        )]);

        let cleaned = transform(&chunk).unwrap();

        let dates = cleaned.column(0).as_primitive::<TimestampMillisecondType>();
        assert_eq!(Some(dates.value(0)), timestamp("2024-01-01"));
    }

    #[test]
    fn numeric_date_columns_are_parsed_as_text() {
        let chunk = batch(vec![(
            "date",
            Arc::new(Int64Array::from(vec![20240101, 7])) as ArrayRef,
        )]);

        let cleaned = transform(&chunk).unwrap();

        let dates = cleaned.column(0).as_primitive::<TimestampMillisecondType>();
        assert_eq!(Some(dates.value(0)), timestamp("2024-01-01"));
        assert!(dates.is_null(1));
    }

    #[test]
    fn all_null_columns_drop_every_row() {
        let chunk = batch(vec![
            ("Clicks", Arc::new(Int64Array::from(vec![1, 2])) as ArrayRef),
            ("Notes", Arc::new(arrow_array::NullArray::new(2)) as ArrayRef),
        ]);

        let cleaned = transform(&chunk).unwrap();

        assert_eq!(cleaned.num_rows(), 0);
        assert_clean(&cleaned);
    }

    #[test]
    fn duplicate_normalized_names_fail() {
        let chunk = batch(vec![
            ("Total Cost", Arc::new(Int64Array::from(vec![1])) as ArrayRef),
            ("total_cost", Arc::new(Int64Array::from(vec![2])) as ArrayRef),
        ]);

        let err = transform(&chunk).unwrap_err();
        assert!(matches!(err, ChunkProcessingError::DuplicateColumn(name) if name == "total_cost"));
    }

    #[test]
    fn missing_values_in_any_column_drop_the_row() {
        let chunk = batch(vec![
            (
                "a",
                Arc::new(Int64Array::from(vec![Some(1), Some(2), None, Some(4)])) as ArrayRef,
            ),
            (
                "b",
                Arc::new(Float64Array::from(vec![Some(1.0), None, Some(3.0), Some(4.0)]))
                    as ArrayRef,
            ),
        ]);

        let cleaned = transform(&chunk).unwrap();

        assert_eq!(cleaned.num_rows(), 2);
        assert!(cleaned.columns().iter().all(|c| c.null_count() == 0));
        assert_clean(&cleaned);
    }

    #[test]
    fn transform_is_idempotent_on_parseable_input() {
        let chunk = batch(vec![
            (
                " Event Date ",
                Arc::new(StringArray::from(vec![Some("2024-01-01"), Some("2024-01-02")]))
                    as ArrayRef,
            ),
            (
                "Date",
                Arc::new(StringArray::from(vec![
                    Some("2024-01-01 10:30:00"),
                    Some("2024-01-02T08:00:00Z"),
                ])) as ArrayRef,
            ),
            (
                "Clicks",
                Arc::new(Int64Array::from(vec![Some(3), None])) as ArrayRef,
            ),
        ]);

        let once = transform(&chunk).unwrap();
        let twice = transform(&once).unwrap();

        assert_eq!(once, twice);
        assert_clean(&twice);
    }

    #[rstest]
    #[case("Date ", "date")]
    #[case("  Campaign Name", "campaign_name")]
    #[case("CLICK THROUGH RATE", "click_through_rate")]
    #[case("already_clean", "already_clean")]
    fn column_names_are_normalized(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_column_name(raw), expected);
    }

    #[rstest]
    #[case("2024-01-01")]
    #[case(" 2024-01-01 ")]
    #[case("2024/01/01")]
    #[case("01/01/2024")]
    #[case("20240101")]
    #[case("01-Jan-2024")]
    #[case("1 January 2024")]
    #[case("January 1, 2024")]
    #[case("2024-01-01 00:00:00")]
    #[case("2024-01-01T00:00:00")]
    #[case("2024-01-01T00:00:00+00:00")]
    fn accepted_layouts_parse_to_midnight(#[case] raw: &str) {
        assert_eq!(
            parse_datetime(raw),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0)
        );
    }

    #[rstest]
    #[case("")]
    #[case("yesterday")]
    #[case("2024-13-01")]
    fn garbage_does_not_parse(#[case] raw: &str) {
        assert_eq!(parse_datetime(raw), None);
    }
}
