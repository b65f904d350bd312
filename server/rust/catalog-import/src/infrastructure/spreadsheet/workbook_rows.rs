use std::io::{Cursor, Read, Seek};

use calamine::{open_workbook_from_rs, Data, Range, Reader, Xls, XlsError, Xlsx, XlsxError};
use chrono::{Duration, NaiveDate};

use super::{to_row_index, ParseError, RawRow, SheetRows};
use crate::domain::entity::raw_values::RawValues;
use crate::domain::value_object::SpreadsheetFormat;

/// XLS / XLSX を開き、先頭ワークシートのみを読む。
pub fn open(format: SpreadsheetFormat, bytes: Vec<u8>) -> Result<SheetRows, ParseError> {
    let cursor = Cursor::new(bytes);
    let range = match format {
        SpreadsheetFormat::Xlsx => {
            let workbook: Xlsx<_> = open_workbook_from_rs(cursor)
                .map_err(|e: XlsxError| ParseError::Workbook(e.to_string()))?;
            first_sheet::<Cursor<Vec<u8>>, _>(workbook)?
        }
        SpreadsheetFormat::Xls => {
            let workbook: Xls<_> = open_workbook_from_rs(cursor)
                .map_err(|e: XlsError| ParseError::Workbook(e.to_string()))?;
            first_sheet::<Cursor<Vec<u8>>, _>(workbook)?
        }
        SpreadsheetFormat::Csv => {
            return Err(ParseError::UnsupportedFormat(format.to_string()));
        }
    };
    from_range(range)
}

fn first_sheet<RS, R>(mut workbook: R) -> Result<Range<Data>, ParseError>
where
    RS: Read + Seek,
    R: Reader<RS>,
    R::Error: std::fmt::Display,
{
    match workbook.worksheet_range_at(0) {
        None => Err(ParseError::EmptyWorkbook),
        Some(Err(e)) => Err(ParseError::Workbook(e.to_string())),
        Some(Ok(range)) => Ok(range),
    }
}

/// ワークシートの範囲から行シーケンスを作る。範囲の先頭行をヘッダとする。
pub(crate) fn from_range(range: Range<Data>) -> Result<SheetRows, ParseError> {
    let (height, width) = range.get_size();
    if height == 0 {
        return Err(ParseError::MissingHeader);
    }
    let columns: Vec<(usize, String)> = (0..width)
        .filter_map(|c| {
            let name = range.get((0, c)).map(cell_text).unwrap_or_default();
            (!name.trim().is_empty()).then_some((c, name))
        })
        .collect();
    if columns.is_empty() {
        return Err(ParseError::MissingHeader);
    }
    let headers = columns.iter().map(|(_, h)| h.clone()).collect();
    let rows = WorkbookRows {
        range,
        columns,
        next_row: 1,
        height,
    };
    Ok(SheetRows::new(headers, Box::new(rows)))
}

struct WorkbookRows {
    range: Range<Data>,
    columns: Vec<(usize, String)>,
    next_row: usize,
    height: usize,
}

impl Iterator for WorkbookRows {
    type Item = Result<RawRow, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next_row < self.height {
            let r = self.next_row;
            self.next_row += 1;
            let mut values = RawValues::new();
            for (c, header) in &self.columns {
                let text = self.range.get((r, *c)).map(cell_text).unwrap_or_default();
                values.push(header.clone(), text);
            }
            if values.is_blank() {
                continue;
            }
            return Some(Ok(RawRow {
                row_index: to_row_index(r),
                values,
            }));
        }
        None
    }
}

/// セル値を文字列化する。整数値の浮動小数点は小数部なしで出力する。
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => format_float(*f),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => excel_serial_to_text(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("#{e:?}"),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        (f as i64).to_string()
    } else {
        f.to_string()
    }
}

/// Excel のシリアル値（1899-12-30 起点）を `YYYY-MM-DD` 形式に変換する。
#[allow(clippy::cast_possible_truncation)]
fn excel_serial_to_text(serial: f64) -> String {
    let Some(epoch) = NaiveDate::from_ymd_opt(1899, 12, 30) else {
        return format_float(serial);
    };
    let days = serial.floor() as i64;
    let seconds = ((serial - serial.floor()) * 86_400.0).round() as i64;
    let Some(date) = epoch.checked_add_signed(Duration::days(days)) else {
        return format_float(serial);
    };
    if seconds == 0 {
        date.format("%Y-%m-%d").to_string()
    } else {
        let datetime = date.and_hms_opt(0, 0, 0).map(|d| d + Duration::seconds(seconds));
        match datetime {
            Some(dt) => dt.format("%Y-%m-%dT%H:%M:%S").to_string(),
            None => date.format("%Y-%m-%d").to_string(),
        }
    }
}
