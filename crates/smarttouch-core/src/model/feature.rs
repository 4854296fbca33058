use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// A controllable capability, named by the vendor command that drives it.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
pub enum Feature {
    #[serde(rename = "turn")]
    #[strum(serialize = "turn")]
    Power,
    #[serde(rename = "brightness")]
    #[strum(serialize = "brightness")]
    Brightness,
    #[serde(rename = "color")]
    #[strum(serialize = "color")]
    Color,
    #[serde(rename = "colorTem")]
    #[strum(serialize = "colorTem")]
    ColorTemperature,
}

impl Feature {
    /// Human label for notices.
    pub fn label(self) -> &'static str {
        match self {
            Self::Power => "power",
            Self::Brightness => "brightness",
            Self::Color => "color",
            Self::ColorTemperature => "color temperature",
        }
    }
}
