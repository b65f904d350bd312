use serde::{Deserialize, Serialize};

/// CareCode は洗濯表示コード。値の集合は固定されている。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CareCode {
    MachineWash,
    HandWash,
    DryClean,
    TumbleDry,
    DoNotBleach,
    IronLowHeat,
    DoNotIron,
}

impl CareCode {
    pub const ALL: [CareCode; 7] = [
        Self::MachineWash,
        Self::HandWash,
        Self::DryClean,
        Self::TumbleDry,
        Self::DoNotBleach,
        Self::IronLowHeat,
        Self::DoNotIron,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MachineWash => "MACHINE_WASH",
            Self::HandWash => "HAND_WASH",
            Self::DryClean => "DRY_CLEAN",
            Self::TumbleDry => "TUMBLE_DRY",
            Self::DoNotBleach => "DO_NOT_BLEACH",
            Self::IronLowHeat => "IRON_LOW_HEAT",
            Self::DoNotIron => "DO_NOT_IRON",
        }
    }

    /// 大文字小文字と前後の空白を無視して解釈する。
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_uppercase();
        Self::ALL.into_iter().find(|c| c.as_str() == normalized)
    }
}
