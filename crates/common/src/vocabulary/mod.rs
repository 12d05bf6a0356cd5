//! Synonym and keyword tables
//!
//! Static term-normalization data shared by the classifier and the frame
//! store. Both query tokens and frame values pass through the same
//! [`SynonymMap`] before any comparison.

use crate::errors::{AppError, Result};
use crate::intent::IntentClass;
use crate::text;
use std::collections::HashMap;

/// Many-to-one mapping from surface term to canonical term
#[derive(Debug, Clone)]
pub struct SynonymMap {
    entries: HashMap<String, String>,
    /// Longest surface term, in tokens
    max_words: usize,
}

impl SynonymMap {
    /// Empty map: every term is its own canonical form
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
            max_words: 1,
        }
    }

    /// Build from `(surface, canonical)` pairs
    pub fn from_pairs<I, S, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let mut map = Self::empty();
        map.extend(pairs);
        map
    }

    /// Add or replace entries
    pub fn extend<I, S, T>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (S, T)>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        for (surface, canonical) in pairs {
            let tokens = text::tokenize(surface.as_ref());
            if tokens.is_empty() {
                continue;
            }
            self.max_words = self.max_words.max(tokens.len());
            self.entries
                .insert(tokens.join(" "), canonical.as_ref().trim().to_lowercase());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Canonical form of a single term, or the lower-cased term itself
    pub fn canonical(&self, term: &str) -> String {
        let surface = text::tokenize(term).join(" ");
        self.entries.get(&surface).cloned().unwrap_or(surface)
    }

    /// Replace surface terms in a token stream with their canonical form.
    /// Multi-word surface terms are matched greedily, longest first.
    pub fn normalize_tokens(&self, tokens: &[String]) -> Vec<String> {
        let mut out = Vec::with_capacity(tokens.len());
        let mut i = 0;
        while i < tokens.len() {
            let longest = self.max_words.min(tokens.len() - i);
            let matched = (1..=longest).rev().find_map(|width| {
                let surface = tokens[i..i + width].join(" ");
                self.entries.get(&surface).map(|canonical| (width, canonical.clone()))
            });
            match matched {
                Some((width, canonical)) => {
                    out.push(canonical);
                    i += width;
                }
                None => {
                    out.push(tokens[i].clone());
                    i += 1;
                }
            }
        }
        out
    }

    /// Normalized token stream for free text
    pub fn normalize_phrase(&self, input: &str) -> Vec<String> {
        self.normalize_tokens(&text::tokenize(input))
    }

    /// Comparison key for names and attribute values:
    /// canonical tokens joined with `_` (`"Neem Oil"` -> `"neem_oil"`)
    pub fn key(&self, value: &str) -> String {
        self.normalize_phrase(value).join("_")
    }
}

impl Default for SynonymMap {
    fn default() -> Self {
        Self::from_pairs(DEFAULT_SYNONYMS.iter().copied())
    }
}

/// Built-in domain synonyms
const DEFAULT_SYNONYMS: &[(&str, &str)] = &[
    // Pests
    ("aphids", "aphid"),
    ("plant lice", "aphid"),
    ("plant louse", "aphid"),
    ("greenfly", "aphid"),
    ("blackfly", "aphid"),
    ("whiteflies", "whitefly"),
    ("white fly", "whitefly"),
    ("white flies", "whitefly"),
    ("caterpillars", "caterpillar"),
    ("armyworms", "fall_armyworm"),
    ("armyworm", "fall_armyworm"),
    ("fall armyworm", "fall_armyworm"),
    ("fall armyworms", "fall_armyworm"),
    ("spider mites", "spider_mite"),
    ("spider mite", "spider_mite"),
    ("red spider", "spider_mite"),
    ("locusts", "locust"),
    ("grasshoppers", "locust"),
    ("cutworms", "cutworm"),
    ("thrips", "thrips"),
    ("stem borer", "stem_borer"),
    ("stem borers", "stem_borer"),
    ("stalk borer", "stem_borer"),
    ("weevils", "weevil"),
    ("mealybugs", "mealybug"),
    ("mealy bug", "mealybug"),
    ("nematodes", "nematode"),
    ("eelworms", "nematode"),
    // Natural enemies
    ("ladybugs", "ladybug"),
    ("ladybirds", "ladybug"),
    ("ladybird", "ladybug"),
    ("lady beetle", "ladybug"),
    ("lady beetles", "ladybug"),
    ("lacewings", "lacewing"),
    ("parasitic wasps", "parasitic_wasp"),
    ("parasitic wasp", "parasitic_wasp"),
    // Controls
    ("neem", "neem_oil"),
    ("neem oil", "neem_oil"),
    ("neem extract", "neem_oil"),
    ("insecticidal soap", "insecticidal_soap"),
    ("soap spray", "insecticidal_soap"),
    ("bt", "bacillus_thuringiensis"),
    ("bacillus thuringiensis", "bacillus_thuringiensis"),
    ("wood ash", "wood_ash"),
    ("ash", "wood_ash"),
    ("crop rotation", "crop_rotation"),
    ("push pull", "push_pull"),
    ("intercropping", "intercropping"),
    // Crops
    ("tomatoes", "tomato"),
    ("maize", "maize"),
    ("corn", "maize"),
    ("potatoes", "potato"),
    ("beans", "bean"),
    ("cabbages", "cabbage"),
    ("kale", "kale"),
    ("sukuma wiki", "kale"),
    ("cassava", "cassava"),
    ("sorghum", "sorghum"),
    // Soil
    ("acidity", "ph"),
    ("soil ph", "soil_ph"),
];

/// Ordered keyword lists per intent, iterated in classification priority
#[derive(Debug, Clone)]
pub struct IntentKeywords {
    lists: Vec<(IntentClass, Vec<String>)>,
}

impl IntentKeywords {
    /// Keyword list bound to an intent. Empty for `GeneralQuery`.
    pub fn keywords(&self, intent: IntentClass) -> &[String] {
        self.lists
            .iter()
            .find(|(i, _)| *i == intent)
            .map(|(_, k)| k.as_slice())
            .unwrap_or(&[])
    }

    /// `(intent, keywords)` in fixed priority order
    pub fn iter(&self) -> impl Iterator<Item = (IntentClass, &[String])> {
        self.lists.iter().map(|(i, k)| (*i, k.as_slice()))
    }

    /// Replace the lists of the intents named in `overrides`.
    /// Unknown intent names and `general_query` are configuration errors.
    pub fn with_overrides(mut self, overrides: &HashMap<String, Vec<String>>) -> Result<Self> {
        for (name, words) in overrides {
            let intent: IntentClass = name.parse().map_err(|e: String| AppError::Configuration {
                message: format!("classifier keywords: {}", e),
            })?;
            if intent == IntentClass::GeneralQuery {
                return Err(AppError::Configuration {
                    message: "classifier keywords: general_query cannot have keywords".to_string(),
                });
            }
            let normalized: Vec<String> = words
                .iter()
                .map(|w| text::normalize(w))
                .filter(|w| !w.is_empty())
                .collect();
            if let Some(slot) = self.lists.iter_mut().find(|(i, _)| *i == intent) {
                slot.1 = normalized;
            }
        }
        Ok(self)
    }
}

impl Default for IntentKeywords {
    fn default() -> Self {
        let table: [(IntentClass, &[&str]); 5] = [
            (
                IntentClass::PestManagement,
                &[
                    "control", "manage", "get rid of", "eliminate", "kill", "spray",
                    "treat", "prevent", "protect", "repel", "predator", "biological",
                    "insecticide", "pesticide", "neem_oil", "insecticidal_soap",
                ],
            ),
            (
                IntentClass::PestIdentification,
                &[
                    "identify", "what is this", "what pest is", "which pest is",
                    "what insect is", "which insect is", "what bug", "looks like",
                    "symptom", "signs of",
                    "holes in", "damage", "spots on", "recognize",
                ],
            ),
            (
                IntentClass::CropPests,
                &[
                    "pests of", "pests on", "pests in", "pests affect", "pests attack",
                    "common pests", "what pests", "which pests", "attack", "infest",
                ],
            ),
            (
                IntentClass::IndigenousKnowledge,
                &[
                    "indigenous", "traditional", "ancestral", "local knowledge", "folk",
                    "elders", "grandparents", "old method", "cultural", "wood_ash",
                ],
            ),
            (
                IntentClass::SoilAnalysis,
                &[
                    "soil", "ph level", "soil_ph", "nutrient", "fertility", "nitrogen",
                    "phosphorus", "potassium", "compost", "fertilizer", "manure",
                    "organic matter", "acidic", "alkaline",
                ],
            ),
        ];

        Self {
            lists: table
                .iter()
                .map(|(intent, words)| (*intent, words.iter().map(|w| w.to_string()).collect()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_single_and_multi_word() {
        let synonyms = SynonymMap::default();
        assert_eq!(synonyms.canonical("Aphids"), "aphid");
        assert_eq!(synonyms.canonical("plant lice"), "aphid");
        assert_eq!(synonyms.canonical("unknownterm"), "unknownterm");
    }

    #[test]
    fn test_normalize_tokens_prefers_longest_match() {
        let synonyms = SynonymMap::default();
        let tokens = synonyms.normalize_phrase("Spray neem oil on fall armyworms");
        assert_eq!(tokens, vec!["spray", "neem_oil", "on", "fall_armyworm"]);
    }

    #[test]
    fn test_key_is_stable_for_identifiers() {
        let synonyms = SynonymMap::default();
        assert_eq!(synonyms.key("Neem Oil"), "neem_oil");
        assert_eq!(synonyms.key("neem_oil"), "neem_oil");
        assert_eq!(synonyms.key("Ladybirds"), "ladybug");
    }

    #[test]
    fn test_keywords_follow_priority_order() {
        let keywords = IntentKeywords::default();
        let order: Vec<IntentClass> = keywords.iter().map(|(i, _)| i).collect();
        assert_eq!(order, IntentClass::PRIORITY.to_vec());
        assert!(keywords.keywords(IntentClass::GeneralQuery).is_empty());
    }

    #[test]
    fn test_keyword_overrides() {
        let mut overrides = HashMap::new();
        overrides.insert("soil_analysis".to_string(), vec!["Loam".to_string()]);
        let keywords = IntentKeywords::default().with_overrides(&overrides).unwrap();
        assert_eq!(keywords.keywords(IntentClass::SoilAnalysis), ["loam".to_string()]);

        let mut bad = HashMap::new();
        bad.insert("weather".to_string(), vec!["rain".to_string()]);
        assert!(IntentKeywords::default().with_overrides(&bad).is_err());
    }
}
