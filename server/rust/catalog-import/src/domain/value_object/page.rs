use serde::Serialize;

pub const DEFAULT_PAGE_LIMIT: u32 = 100;
pub const MAX_PAGE_LIMIT: u32 = 1000;

/// PageError はページングパラメータの検証エラー。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageError {
    #[error("limit must be between 1 and {MAX_PAGE_LIMIT}, got {0}")]
    LimitOutOfRange(i64),
    #[error("offset must be >= 0, got {0}")]
    NegativeOffset(i64),
}

/// PageRequest は limit/offset 形式のページング要求。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: u32,
    pub offset: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

impl PageRequest {
    /// 未指定の値にはデフォルト（100/0）を適用して検証する。
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Result<Self, PageError> {
        let limit = limit.unwrap_or(i64::from(DEFAULT_PAGE_LIMIT));
        if !(1..=i64::from(MAX_PAGE_LIMIT)).contains(&limit) {
            return Err(PageError::LimitOutOfRange(limit));
        }
        let offset = offset.unwrap_or(0);
        let offset = u64::try_from(offset).map_err(|_| PageError::NegativeOffset(offset))?;
        let limit = u32::try_from(limit).map_err(|_| PageError::LimitOutOfRange(limit))?;
        Ok(Self { limit, offset })
    }

    pub fn limit_usize(&self) -> usize {
        self.limit as usize
    }

    pub fn offset_usize(&self) -> usize {
        usize::try_from(self.offset).unwrap_or(usize::MAX)
    }
}

/// Page はページング済みのレスポンス。
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub limit: u32,
    pub offset: u64,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: &PageRequest) -> Self {
        let has_more = request.offset + (items.len() as u64) < total;
        Self {
            items,
            total,
            limit: request.limit,
            offset: request.offset,
            has_more,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            offset: self.offset,
            has_more: self.has_more,
        }
    }
}
