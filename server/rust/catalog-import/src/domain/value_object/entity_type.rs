use serde::{Deserialize, Serialize};

/// EntityType はスプレッドシートの値が参照するカタログエンティティの種別を表す。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Material,
    Color,
    Size,
    EcoClaim,
    Facility,
    Operator,
    ShowcaseBrand,
    Certification,
    Season,
    Category,
    Tag,
}

impl EntityType {
    pub const ALL: [EntityType; 11] = [
        Self::Material,
        Self::Color,
        Self::Size,
        Self::EcoClaim,
        Self::Facility,
        Self::Operator,
        Self::ShowcaseBrand,
        Self::Certification,
        Self::Season,
        Self::Category,
        Self::Tag,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Material => "MATERIAL",
            Self::Color => "COLOR",
            Self::Size => "SIZE",
            Self::EcoClaim => "ECO_CLAIM",
            Self::Facility => "FACILITY",
            Self::Operator => "OPERATOR",
            Self::ShowcaseBrand => "SHOWCASE_BRAND",
            Self::Certification => "CERTIFICATION",
            Self::Season => "SEASON",
            Self::Category => "CATEGORY",
            Self::Tag => "TAG",
        }
    }

    pub fn from_str_value(s: &str) -> anyhow::Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("invalid entity type: {}", s))
    }

    /// カテゴリは事前投入済みの閉じた集合であり、インポート経由では新規作成できない。
    pub fn is_definable(self) -> bool {
        !matches!(self, Self::Category)
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_all_variants() {
        for t in EntityType::ALL {
            assert_eq!(EntityType::from_str_value(t.as_str()).unwrap(), t);
        }
    }

    #[test]
    fn test_serde_uses_screaming_snake_case() {
        let json = serde_json::to_string(&EntityType::ShowcaseBrand).unwrap();
        assert_eq!(json, "\"SHOWCASE_BRAND\"");
        let parsed: EntityType = serde_json::from_str("\"ECO_CLAIM\"").unwrap();
        assert_eq!(parsed, EntityType::EcoClaim);
    }

    #[test]
    fn test_category_is_not_definable() {
        assert!(!EntityType::Category.is_definable());
        assert!(EntityType::Color.is_definable());
    }

    #[test]
    fn test_invalid_value() {
        assert!(EntityType::from_str_value("COLOUR").is_err());
    }
}
