use std::io::Cursor;

use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter};

use super::{to_row_index, ParseError, RawRow, SheetRows};
use crate::domain::entity::raw_values::RawValues;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// CSV を開く。先頭の UTF-8 BOM は取り除く。
pub fn open(mut bytes: Vec<u8>) -> Result<SheetRows, ParseError> {
    if bytes.starts_with(UTF8_BOM) {
        bytes.drain(..UTF8_BOM.len());
    }
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(Cursor::new(bytes));

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| classify(e, 0))?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(ParseError::MissingHeader);
    }

    let rows = CsvRows {
        headers: headers.clone(),
        records: reader.into_records(),
        position: 0,
    };
    Ok(SheetRows::new(headers, Box::new(rows)))
}

struct CsvRows {
    headers: Vec<String>,
    records: StringRecordsIntoIter<Cursor<Vec<u8>>>,
    position: usize,
}

impl CsvRows {
    fn to_values(&self, record: &StringRecord) -> RawValues {
        let mut values = RawValues::new();
        for (i, header) in self.headers.iter().enumerate() {
            if header.trim().is_empty() {
                continue;
            }
            values.push(header.clone(), record.get(i).unwrap_or_default());
        }
        values
    }
}

impl Iterator for CsvRows {
    type Item = Result<RawRow, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = self.records.next()?;
            self.position += 1;
            let row_index = to_row_index(self.position);
            let record = match record {
                Ok(record) => record,
                Err(e) => return Some(Err(classify(e, row_index))),
            };
            let values = self.to_values(&record);
            if values.is_blank() {
                continue;
            }
            return Some(Ok(RawRow { row_index, values }));
        }
    }
}

fn classify(err: csv::Error, row: i64) -> ParseError {
    match err.kind() {
        csv::ErrorKind::Utf8 { .. } => ParseError::Encoding { row },
        _ => ParseError::Malformed {
            row,
            message: err.to_string(),
        },
    }
}
