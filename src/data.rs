//! Purchase record schema, CSV loading and writing.

use crate::error::{PipelineError, Result};
use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter, Trim, WriterBuilder};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

/// A single customer purchase row.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseRecord {
    pub customer_id: String,
    pub age_count: f64,
    pub gender_type: String,
    pub prepurchase_amount: f64,
    pub purchase_again: bool,
}

impl PurchaseRecord {
    /// A record with no known outcome, for scoring. The label is set to `false`.
    pub fn unlabeled(
        customer_id: &str,
        age_count: f64,
        gender_type: &str,
        prepurchase_amount: f64,
    ) -> Self {
        PurchaseRecord {
            customer_id: customer_id.to_string(),
            age_count,
            gender_type: gender_type.to_string(),
            prepurchase_amount,
            purchase_again: false,
        }
    }

    fn from_row(row: &StringRecord, row_no: usize) -> Result<Self> {
        if row.len() != COLUMNS.len() {
            return Err(PipelineError::DataFormat {
                row: row_no,
                message: format!("expected {} fields, found {}", COLUMNS.len(), row.len()),
            });
        }

        let values = COLUMNS
            .iter()
            .map(|column| {
                column
                    .parse(&row[column.index])
                    .map_err(|message| PipelineError::DataFormat { row: row_no, message })
            })
            .collect::<Result<Vec<_>>>()?;

        match <[Value; 5]>::try_from(values) {
            Ok(
                [
                    Value::Text(customer_id),
                    Value::Number(age_count),
                    Value::Text(gender_type),
                    Value::Number(prepurchase_amount),
                    Value::Boolean(purchase_again),
                ],
            ) => Ok(PurchaseRecord {
                customer_id,
                age_count,
                gender_type,
                prepurchase_amount,
                purchase_again,
            }),
            _ => Err(PipelineError::DataFormat {
                row: row_no,
                message: "row does not match the purchase schema".to_string(),
            }),
        }
    }

    fn to_row(&self) -> [String; 5] {
        [
            self.customer_id.clone(),
            self.age_count.to_string(),
            self.gender_type.clone(),
            self.prepurchase_amount.to_string(),
            self.purchase_again.to_string(),
        ]
    }
}

/// Type of a schema column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Number,
    Boolean,
}

/// A parsed cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    Boolean(bool),
}

/// Position, header name and type of one input column.
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub index: usize,
    pub name: &'static str,
    pub kind: ColumnKind,
}

impl Column {
    /// Parses a raw cell according to the column kind.
    pub fn parse(&self, raw: &str) -> std::result::Result<Value, String> {
        let raw = raw.trim();
        match self.kind {
            ColumnKind::Text => Ok(Value::Text(raw.to_string())),
            ColumnKind::Number => match raw.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(Value::Number(v)),
                _ => Err(format!("column {} expects a finite number, found {:?}", self.name, raw)),
            },
            ColumnKind::Boolean => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(Value::Boolean(true)),
                "false" | "0" | "no" => Ok(Value::Boolean(false)),
                _ => Err(format!("column {} expects a boolean, found {:?}", self.name, raw)),
            },
        }
    }
}

/// Input columns in file order.
pub const COLUMNS: [Column; 5] = [
    Column { index: 0, name: "CustomerID", kind: ColumnKind::Text },
    Column { index: 1, name: "AgeCount", kind: ColumnKind::Number },
    Column { index: 2, name: "GenderType", kind: ColumnKind::Text },
    Column { index: 3, name: "PrepurchaseAmount", kind: ColumnKind::Number },
    Column { index: 4, name: "PurchaseAgain", kind: ColumnKind::Boolean },
];

/// How a delimited file is read and written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub has_header: bool,
    pub delimiter: u8,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            has_header: true,
            delimiter: b',',
        }
    }
}

/// Lazy reader over the rows of a purchase file.
///
/// The file handle lives as long as the reader and is closed when it is dropped,
/// including after a malformed row.
pub struct RecordReader {
    rows: StringRecordsIntoIter<File>,
    row_no: usize,
}

impl RecordReader {
    pub fn open(path: &Path, options: LoadOptions) -> Result<Self> {
        let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
        let rows = ReaderBuilder::new()
            .has_headers(options.has_header)
            .delimiter(options.delimiter)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(file)
            .into_records();
        debug!(path = %path.display(), "Opened purchase file");
        Ok(RecordReader { rows, row_no: 0 })
    }
}

impl Iterator for RecordReader {
    type Item = Result<PurchaseRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        self.row_no += 1;
        Some(match row {
            Ok(row) => PurchaseRecord::from_row(&row, self.row_no),
            Err(e) => Err(PipelineError::DataFormat {
                row: self.row_no,
                message: e.to_string(),
            }),
        })
    }
}

/// Reads every record of a purchase file, stopping at the first malformed row.
pub fn load_records(path: &Path, options: LoadOptions) -> Result<Vec<PurchaseRecord>> {
    let records = RecordReader::open(path, options)?.collect::<Result<Vec<_>>>()?;
    info!(path = %path.display(), rows = records.len(), "Loaded purchase records");
    Ok(records)
}

/// Writes records in schema order. A header line is written when `options.has_header` is set.
pub fn write_records(path: &Path, records: &[PurchaseRecord], options: LoadOptions) -> Result<()> {
    let to_err = |e: csv::Error| PipelineError::io(path, e.into());

    let mut writer = WriterBuilder::new()
        .delimiter(options.delimiter)
        .from_path(path)
        .map_err(to_err)?;

    if options.has_header {
        writer
            .write_record(COLUMNS.iter().map(|c| c.name))
            .map_err(to_err)?;
    }
    for record in records {
        writer.write_record(record.to_row()).map_err(to_err)?;
    }
    writer.flush().map_err(|e| PipelineError::io(path, e))?;
    Ok(())
}

/// A helper type for holding train/test splits.
#[derive(Debug)]
pub struct DatasetSplit {
    pub train: Vec<PurchaseRecord>,
    pub test: Vec<PurchaseRecord>,
}

/// Shuffles with a fixed seed and splits off `test_ratio` of the records for evaluation.
pub fn train_test_split(data: &[PurchaseRecord], test_ratio: f64, seed: u64) -> DatasetSplit {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = data.to_vec();
    data.shuffle(&mut rng);

    let test_size = ((data.len() as f64) * test_ratio.clamp(0.0, 1.0)).round() as usize;
    let train = data.split_off(test_size);

    DatasetSplit { train, test: data }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv(rows: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "CustomerID,AgeCount,GenderType,PrepurchaseAmount,PurchaseAgain").unwrap();
        for row in rows {
            writeln!(file, "{}", row).unwrap();
        }
        file
    }

    #[test]
    fn test_load_records() {
        let file = create_test_csv(&["1,34,Female,5,true", "2, 52 ,Male,3,False"]);
        let records = load_records(file.path(), LoadOptions::default()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].customer_id, "1");
        assert_eq!(records[0].gender_type, "Female");
        assert!(records[0].purchase_again);
        assert_eq!(records[1].age_count, 52.0);
        assert!(!records[1].purchase_again);
    }

    #[test]
    fn test_wrong_field_count_names_row() {
        let file = create_test_csv(&["1,34,Female,5,true", "2,52,Male,3"]);
        let err = load_records(file.path(), LoadOptions::default()).unwrap_err();
        match err {
            PipelineError::DataFormat { row, message } => {
                assert_eq!(row, 2);
                assert!(message.contains("found 4"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_numeric_and_non_boolean_cells() {
        let file = create_test_csv(&["1,old,Female,5,true"]);
        let err = load_records(file.path(), LoadOptions::default()).unwrap_err();
        assert!(err.to_string().contains("AgeCount"));

        let file = create_test_csv(&["1,30,Female,5,maybe"]);
        let err = load_records(file.path(), LoadOptions::default()).unwrap_err();
        assert!(err.to_string().contains("PurchaseAgain"));
    }

    #[test]
    fn test_non_finite_numbers_are_rejected() {
        let file = create_test_csv(&["1,NaN,Male,3,true"]);
        match load_records(file.path(), LoadOptions::default()) {
            Err(PipelineError::DataFormat { row, message }) => {
                assert_eq!(row, 1);
                assert!(message.contains("AgeCount"), "{message}");
            }
            other => panic!("expected a data format error, got {other:?}"),
        }

        let file = create_test_csv(&["1,25,Male,4.5,true", "2,30,Female,inf,false"]);
        match load_records(file.path(), LoadOptions::default()) {
            Err(PipelineError::DataFormat { row, message }) => {
                assert_eq!(row, 2);
                assert!(message.contains("PrepurchaseAmount"), "{message}");
            }
            other => panic!("expected a data format error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err =
            load_records(Path::new("does/not/exist.csv"), LoadOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
    }

    #[test]
    fn test_reader_is_lazy() {
        let file = create_test_csv(&["1,34,Female,5,true", "broken", "3,20,Male,1,false"]);
        let mut reader = RecordReader::open(file.path(), LoadOptions::default()).unwrap();
        assert!(reader.next().unwrap().is_ok());
        assert!(reader.next().unwrap().is_err());
        assert!(reader.next().unwrap().is_ok());
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_headerless_semicolon_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "7;41.5;Male;2.25;1").unwrap();
        let options = LoadOptions {
            has_header: false,
            delimiter: b';',
        };
        let records = load_records(file.path(), options).unwrap();
        assert_eq!(records, vec![PurchaseRecord {
            customer_id: "7".into(),
            age_count: 41.5,
            gender_type: "Male".into(),
            prepurchase_amount: 2.25,
            purchase_again: true,
        }]);
    }

    #[test]
    fn test_write_then_read_preserves_fields() {
        let records = vec![
            PurchaseRecord {
                customer_id: "a-1".into(),
                age_count: 0.1 + 0.2,
                gender_type: "Female".into(),
                prepurchase_amount: 1e-7,
                purchase_again: true,
            },
            PurchaseRecord::unlabeled("499", 52.0, "Male", 3.0),
        ];
        let file = NamedTempFile::new().unwrap();
        write_records(file.path(), &records, LoadOptions::default()).unwrap();

        let loaded = load_records(file.path(), LoadOptions::default()).unwrap();
        assert_eq!(loaded, records);
    }

    #[test]
    fn test_train_test_split_is_seeded() {
        let records: Vec<_> = (0..10)
            .map(|i| PurchaseRecord::unlabeled(&i.to_string(), i as f64, "Male", 1.0))
            .collect();

        let a = train_test_split(&records, 0.2, 0);
        let b = train_test_split(&records, 0.2, 0);
        assert_eq!(a.test.len(), 2);
        assert_eq!(a.train.len(), 8);
        assert_eq!(a.test, b.test);
    }
}
