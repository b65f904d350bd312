use anyhow::Context;
use rust_xlsxwriter::{Format, Workbook};

use crate::domain::entity::raw_values::RawValues;

/// エラー理由を出力する追加カラム名。
pub const ERROR_REASONS_COLUMN: &str = "error_reasons";

/// FailedRow はエクスポート対象の1行。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRow {
    pub row_index: i64,
    pub values: RawValues,
    pub reasons: Vec<String>,
}

/// FailedRowSheet は元ファイルと同じカラム構成の失敗行一覧。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailedRowSheet {
    pub headers: Vec<String>,
    pub rows: Vec<FailedRow>,
}

impl FailedRowSheet {
    fn header_record(&self) -> Vec<&str> {
        self.headers
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(ERROR_REASONS_COLUMN))
            .collect()
    }

    fn value_record(&self, row: &FailedRow) -> Vec<String> {
        self.headers
            .iter()
            .map(|h| row.values.get_exact(h).unwrap_or_default().to_string())
            .chain(std::iter::once(row.reasons.join("; ")))
            .collect()
    }
}

pub fn write_csv(sheet: &FailedRowSheet) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(sheet.header_record())?;
    for row in &sheet.rows {
        writer.write_record(sheet.value_record(row))?;
    }
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("failed to flush csv export: {}", e.error()))
}

pub fn write_xlsx(sheet: &FailedRowSheet) -> anyhow::Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("failed_rows")?;

    for (col, header) in sheet.header_record().into_iter().enumerate() {
        let col = u16::try_from(col).context("too many columns for xlsx export")?;
        worksheet.write_string_with_format(0, col, header, &header_format)?;
    }
    for (i, row) in sheet.rows.iter().enumerate() {
        let r = u32::try_from(i + 1).context("too many rows for xlsx export")?;
        for (col, value) in sheet.value_record(row).into_iter().enumerate() {
            let col = u16::try_from(col).context("too many columns for xlsx export")?;
            worksheet.write_string(r, col, value)?;
        }
    }
    Ok(workbook.save_to_buffer()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet() -> FailedRowSheet {
        FailedRowSheet {
            headers: vec!["product_name".to_string(), "sku".to_string()],
            rows: vec![FailedRow {
                row_index: 2,
                values: RawValues::from_pairs(vec![
                    ("product_name".to_string(), "Coat, Wool".to_string()),
                    ("sku".to_string(), "S-2".to_string()),
                ]),
                reasons: vec!["sku: duplicate".to_string(), "color_hex: invalid".to_string()],
            }],
        }
    }

    #[test]
    fn test_write_csv() {
        let bytes = write_csv(&sheet()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text,
            "product_name,sku,error_reasons\n\"Coat, Wool\",S-2,sku: duplicate; color_hex: invalid\n"
        );
    }

    #[test]
    fn test_write_xlsx_produces_zip() {
        let bytes = write_xlsx(&sheet()).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn test_written_csv_can_be_read_back() {
        let bytes = write_csv(&sheet()).unwrap();
        let rows: Vec<_> = crate::infrastructure::spreadsheet::csv_rows::open(bytes)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rows[0].values.get("sku"), Some("S-2"));
        assert_eq!(
            rows[0].values.get(ERROR_REASONS_COLUMN),
            Some("sku: duplicate; color_hex: invalid")
        );
    }
}
