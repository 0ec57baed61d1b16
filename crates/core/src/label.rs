//! The closed set of conditions the classifier can report.

use std::fmt;
use std::str::FromStr;

/// One disease category, or the healthy sentinel.
///
/// The display strings are part of the external contract: they key the treatment table, they
/// appear in the classifier prompts, and they are what the API returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiseaseLabel {
    EarlyBlight,
    LateBlight,
    LeafMold,
    BacterialSpot,
    LeafCurl,
    Healthy,
}

/// Returned when a string does not name a known label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown disease label: {0}")]
pub struct UnknownLabel(pub String);

impl DiseaseLabel {
    /// Every label, in the order used for classifier prompts.
    pub const ALL: [DiseaseLabel; 6] = [
        DiseaseLabel::EarlyBlight,
        DiseaseLabel::LateBlight,
        DiseaseLabel::LeafMold,
        DiseaseLabel::BacterialSpot,
        DiseaseLabel::LeafCurl,
        DiseaseLabel::Healthy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DiseaseLabel::EarlyBlight => "Early Blight leaf disease",
            DiseaseLabel::LateBlight => "Late Blight leaf disease",
            DiseaseLabel::LeafMold => "Leaf Mold disease",
            DiseaseLabel::BacterialSpot => "Bacterial Spot leaf disease",
            DiseaseLabel::LeafCurl => "Leaf Curl disease",
            DiseaseLabel::Healthy => "Healthy leaf",
        }
    }
}

impl fmt::Display for DiseaseLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiseaseLabel {
    type Err = UnknownLabel;

    /// Exact match against the display strings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiseaseLabel::ALL
            .into_iter()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| UnknownLabel(s.to_string()))
    }
}

impl serde::Serialize for DiseaseLabel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for DiseaseLabel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
