//! Query intents
//!
//! Intents route knowledge lookups and select the specialized generation
//! model. Their declaration order is the classification priority order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The classified purpose of a user query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentClass {
    PestManagement,
    PestIdentification,
    CropPests,
    IndigenousKnowledge,
    SoilAnalysis,
    GeneralQuery,
}

impl IntentClass {
    /// Every intent, in declaration order
    pub const ALL: [IntentClass; 6] = [
        IntentClass::PestManagement,
        IntentClass::PestIdentification,
        IntentClass::CropPests,
        IntentClass::IndigenousKnowledge,
        IntentClass::SoilAnalysis,
        IntentClass::GeneralQuery,
    ];

    /// Intents tested by the classifier, highest priority first.
    /// `GeneralQuery` is the default and never matched by keyword.
    pub const PRIORITY: [IntentClass; 5] = [
        IntentClass::PestManagement,
        IntentClass::PestIdentification,
        IntentClass::CropPests,
        IntentClass::IndigenousKnowledge,
        IntentClass::SoilAnalysis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentClass::PestManagement => "pest_management",
            IntentClass::PestIdentification => "pest_identification",
            IntentClass::CropPests => "crop_pests",
            IntentClass::IndigenousKnowledge => "indigenous_knowledge",
            IntentClass::SoilAnalysis => "soil_analysis",
            IntentClass::GeneralQuery => "general_query",
        }
    }

    /// Human readable label used in prompts and fallbacks
    pub fn label(&self) -> &'static str {
        match self {
            IntentClass::PestManagement => "pest management",
            IntentClass::PestIdentification => "pest identification",
            IntentClass::CropPests => "crop pests",
            IntentClass::IndigenousKnowledge => "indigenous farming knowledge",
            IntentClass::SoilAnalysis => "soil analysis",
            IntentClass::GeneralQuery => "general agriculture",
        }
    }
}

impl fmt::Display for IntentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for IntentClass {
    fn default() -> Self {
        IntentClass::GeneralQuery
    }
}

impl FromStr for IntentClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace(['-', ' '], "_");
        IntentClass::ALL
            .into_iter()
            .find(|intent| intent.as_str() == key)
            .ok_or_else(|| format!("unknown intent '{}'", s))
    }
}
