use async_trait::async_trait;
use uuid::Uuid;

/// FileStore はアップロード済みファイルの取得元。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FileStore: Send + Sync {
    /// ファイルサイズ（バイト）を返す。存在しなければ None。
    async fn size(&self, brand_id: Uuid, file_id: &str) -> anyhow::Result<Option<u64>>;

    /// ファイル内容を返す。存在しなければ None。
    async fn fetch(&self, brand_id: Uuid, file_id: &str) -> anyhow::Result<Option<Vec<u8>>>;
}
