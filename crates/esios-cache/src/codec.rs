//! On-disk encoding of a [`WideFrame`] as Arrow IPC (the "Feather" file
//! format). Chosen over a full Parquet writer: Arrow IPC is a much smaller
//! surface to get right for a single-process, single-file cache entry, and
//! `arrow` is already the columnar library the wider Rust data-tooling
//! ecosystem reaches for.

use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;

use arrow::array::{Array, Float64Array, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::ipc::reader::FileReader;
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, TimeZone, Utc};
use esios_types::WideFrame;

const INDEX_COLUMN: &str = "__index";

fn to_io_error(err: arrow::error::ArrowError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}

/// Encode `frame` as an Arrow IPC file, in memory.
pub fn encode(frame: &WideFrame) -> io::Result<Vec<u8>> {
    let index = frame.index();
    let mut fields = vec![Field::new(
        INDEX_COLUMN,
        DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
        false,
    )];
    let mut arrays: Vec<Arc<dyn arrow::array::Array>> = vec![Arc::new(
        TimestampMicrosecondArray::from_iter_values(index.iter().map(DateTime::timestamp_micros))
            .with_timezone("UTC"),
    )];

    let mut column_names: Vec<&str> = frame.columns().collect();
    column_names.sort_unstable();

    // Cloning into a temporary frame keeps this function free of any
    // dependency on WideFrame's internal column storage beyond `get`.
    for name in &column_names {
        fields.push(Field::new(*name, DataType::Float64, true));
        let values: Vec<Option<f64>> = (0..index.len()).map(|row| frame.get(row, name)).collect();
        arrays.push(Arc::new(Float64Array::from(values)));
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), arrays).map_err(to_io_error)?;

    let mut buf = Vec::new();
    {
        let mut writer = FileWriter::try_new(&mut buf, &schema).map_err(to_io_error)?;
        writer.write(&batch).map_err(to_io_error)?;
        writer.finish().map_err(to_io_error)?;
    }
    Ok(buf)
}

/// Decode an Arrow IPC file previously produced by [`encode`].
pub fn decode(bytes: &[u8]) -> io::Result<WideFrame> {
    let cursor = io::Cursor::new(bytes);
    let mut reader = FileReader::try_new(cursor, None).map_err(to_io_error)?;

    let mut index: Vec<DateTime<Utc>> = Vec::new();
    let mut columns: BTreeMap<String, Vec<Option<f64>>> = BTreeMap::new();

    for batch in &mut reader {
        let batch = batch.map_err(to_io_error)?;
        let schema = batch.schema();

        let index_col = batch
            .column_by_name(INDEX_COLUMN)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing index column"))?
            .as_any()
            .downcast_ref::<TimestampMicrosecondArray>()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "index column has wrong type"))?;
        for i in 0..index_col.len() {
            let micros = index_col.value(i);
            index.push(
                Utc.timestamp_micros(micros)
                    .single()
                    .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "invalid timestamp"))?,
            );
        }

        for field in schema.fields() {
            if field.name() == INDEX_COLUMN {
                continue;
            }
            let array = batch
                .column_by_name(field.name())
                .and_then(|c| c.as_any().downcast_ref::<Float64Array>())
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "column has wrong type"))?;
            let entry = columns.entry(field.name().clone()).or_default();
            for i in 0..array.len() {
                entry.push(if array.is_null(i) { None } else { Some(array.value(i)) });
            }
        }
    }

    Ok(WideFrame::from_columns(index, columns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn roundtrip_preserves_holes() {
        let frame = WideFrame::from_observations([
            (Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(), "8".to_string(), 10.0),
            (Utc.with_ymd_and_hms(2025, 1, 1, 1, 0, 0).unwrap(), "9".to_string(), 20.0),
        ]);
        let bytes = encode(&frame).unwrap();
        let decoded = decode(&bytes).unwrap();

        assert_eq!(decoded.index().len(), 2);
        assert_eq!(decoded.get(0, "8"), Some(10.0));
        assert_eq!(decoded.get(0, "9"), None);
        assert_eq!(decoded.get(1, "9"), Some(20.0));
    }
}
