use std::collections::{BTreeMap, HashMap, HashSet};

use uuid::Uuid;

use super::row_validator::RawReference;
use crate::domain::entity::catalog_entity::CatalogEntity;
use crate::domain::entity::staging_row::EntityReference;
use crate::domain::entity::unmapped_value::{UnmappedKey, UnmappedValue};
use crate::domain::value_object::EntityType;

/// EntityResolver は生の文字列参照をカタログエンティティ ID に解決する。
///
/// 照合順序:
/// 1. ブランド所有エンティティとの大文字小文字を無視した完全一致
/// 2. 共有タクソノミーとの完全一致
/// 3. 一致なし → 未解決値として記録
///
/// カタログのスナップショットはジョブ開始時に1度だけ読み込む。
pub struct EntityResolver {
    brand: HashMap<(EntityType, String), Uuid>,
    taxonomy: HashMap<(EntityType, String), Uuid>,
    pending: BTreeMap<UnmappedKey, i64>,
}

impl EntityResolver {
    pub fn new(brand_entities: &[CatalogEntity], taxonomy: &[CatalogEntity]) -> Self {
        let mut brand = HashMap::with_capacity(brand_entities.len());
        for entity in brand_entities {
            brand
                .entry((entity.entity_type, entity.name.trim().to_lowercase()))
                .or_insert(entity.id);
        }
        let mut tax = HashMap::with_capacity(taxonomy.len());
        for entity in taxonomy {
            tax.entry((entity.entity_type, entity.name.clone()))
                .or_insert(entity.id);
        }
        Self {
            brand,
            taxonomy: tax,
            pending: BTreeMap::new(),
        }
    }

    pub fn resolve(&self, entity_type: EntityType, raw_value: &str) -> Option<Uuid> {
        let trimmed = raw_value.trim();
        self.brand
            .get(&(entity_type, trimmed.to_lowercase()))
            .or_else(|| self.taxonomy.get(&(entity_type, trimmed.to_string())))
            .copied()
    }

    /// 1行分の参照を解決する。未解決の参照は行単位で重複排除して集計する。
    pub fn resolve_row(&mut self, references: Vec<RawReference>) -> Vec<EntityReference> {
        let mut counted: HashSet<UnmappedKey> = HashSet::new();
        references
            .into_iter()
            .map(|r| {
                let entity_id = self.resolve(r.entity_type, &r.raw_value);
                if entity_id.is_none() {
                    let key = UnmappedKey::new(r.entity_type, &r.source_column, &r.raw_value);
                    if counted.insert(key.clone()) {
                        *self.pending.entry(key).or_insert(0) += 1;
                    }
                }
                EntityReference {
                    entity_type: r.entity_type,
                    source_column: r.source_column,
                    raw_value: r.raw_value,
                    entity_id,
                }
            })
            .collect()
    }

    /// 前回の取り出し以降に集計した未解決値を取り出す（チャンク単位のマージ用）。
    pub fn drain_unmapped(&mut self, job_id: Uuid) -> Vec<UnmappedValue> {
        std::mem::take(&mut self.pending)
            .into_iter()
            .map(|(key, count)| UnmappedValue::new(job_id, key, count))
            .collect()
    }
}
