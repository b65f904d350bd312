use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::entity::product_command::ProductCommand;
use crate::domain::repository::{BatchWriteError, ProductCatalogWriter, RowWriteOutcome, WriteKind};

#[derive(Clone, Default)]
struct CatalogState {
    /// (brand_id, product_key) -> 最後に書き込まれた命令
    products: HashMap<(Uuid, String), ProductCommand>,
    /// (brand_id, sku) -> 所有する product_key
    skus: HashMap<(Uuid, String), String>,
}

/// InMemoryProductCatalog は商品カタログのインメモリ実装。
/// SKU は同一ブランド内で1つの商品にのみ属する。
pub struct InMemoryProductCatalog {
    state: RwLock<CatalogState>,
    unavailable: AtomicBool,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(CatalogState::default()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// 既存商品の SKU を登録する。
    pub async fn seed_variant(&self, brand_id: Uuid, product_key: &str, sku: &str) {
        self.state
            .write()
            .await
            .skus
            .insert((brand_id, sku.to_string()), product_key.to_string());
    }

    /// true の間はすべての書き込みを接続障害として失敗させる。
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn find_product(&self, brand_id: Uuid, product_key: &str) -> Option<ProductCommand> {
        self.state
            .read()
            .await
            .products
            .get(&(brand_id, product_key.to_string()))
            .cloned()
    }

    pub async fn product_count(&self, brand_id: Uuid) -> usize {
        self.state
            .read()
            .await
            .products
            .keys()
            .filter(|(b, _)| *b == brand_id)
            .count()
    }
}

impl Default for InMemoryProductCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProductCatalogWriter for InMemoryProductCatalog {
    async fn apply_batch(
        &self,
        brand_id: Uuid,
        commands: &[ProductCommand],
    ) -> Result<Vec<RowWriteOutcome>, BatchWriteError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BatchWriteError::Systemic(anyhow::anyhow!(
                "product catalog is unavailable"
            )));
        }

        let mut state = self.state.write().await;
        // 作業用コピーへ適用し、全行成功したときだけ差し替える
        let mut working = state.clone();
        let mut outcomes = Vec::with_capacity(commands.len());
        for command in commands {
            let product = (brand_id, command.product_key.clone());
            if let Some(sku) = &command.sku {
                let sku_key = (brand_id, sku.clone());
                match working.skus.get(&sku_key) {
                    Some(owner) if *owner != command.product_key => {
                        return Err(BatchWriteError::RowRejected {
                            row_index: command.row_index,
                            message: format!("sku {sku} already belongs to product {owner}"),
                        });
                    }
                    _ => {
                        working.skus.insert(sku_key, command.product_key.clone());
                    }
                }
            }
            let kind = if working.products.contains_key(&product) {
                WriteKind::Updated
            } else {
                WriteKind::Created
            };
            working.products.insert(product, command.clone());
            outcomes.push(RowWriteOutcome {
                row_index: command.row_index,
                kind,
            });
        }
        *state = working;
        Ok(outcomes)
    }
}
