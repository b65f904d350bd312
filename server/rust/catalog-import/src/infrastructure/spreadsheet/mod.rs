//! アップロードされたスプレッドシート（CSV / XLS / XLSX）の読み込みと、失敗行の書き出し。

pub mod csv_rows;
pub mod failed_row_writer;
pub mod workbook_rows;

use crate::domain::entity::raw_values::RawValues;
use crate::domain::value_object::SpreadsheetFormat;

/// ParseError はスプレッドシート解析の致命的エラー。発生したジョブは FAILED となる。
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("file has no header row")]
    MissingHeader,

    #[error("invalid text encoding at row {row}")]
    Encoding { row: i64 },

    #[error("malformed row {row}: {message}")]
    Malformed { row: i64, message: String },

    #[error("unreadable workbook: {0}")]
    Workbook(String),

    #[error("workbook has no worksheets")]
    EmptyWorkbook,
}

/// RawRow はヘッダを除いた1データ行。row_index はヘッダ直後の行を 1 とする元ファイル上の位置。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub row_index: i64,
    pub values: RawValues,
}

type RowIter = Box<dyn Iterator<Item = Result<RawRow, ParseError>> + Send>;

/// SheetRows はデータ行の遅延シーケンス。一度しか走査できない。
pub struct SheetRows {
    headers: Vec<String>,
    rows: RowIter,
}

impl SheetRows {
    pub(crate) fn new(headers: Vec<String>, rows: RowIter) -> Self {
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }
}

impl Iterator for SheetRows {
    type Item = Result<RawRow, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }
}

impl std::fmt::Debug for SheetRows {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetRows")
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// 宣言された形式でファイルを開き、ヘッダ行を読み込む。
pub fn open(format: SpreadsheetFormat, bytes: Vec<u8>) -> Result<SheetRows, ParseError> {
    match format {
        SpreadsheetFormat::Csv => csv_rows::open(bytes),
        SpreadsheetFormat::Xls | SpreadsheetFormat::Xlsx => workbook_rows::open(format, bytes),
    }
}

/// 行数の usize を row_index に変換する。
fn to_row_index(position: usize) -> i64 {
    i64::try_from(position).unwrap_or(i64::MAX)
}
