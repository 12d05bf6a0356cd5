//! Query classifier
//!
//! Maps a raw query to an [`IntentClass`]. Keyword lists are tested in a
//! fixed priority order and the first substring hit wins, so pest-related
//! intents always take precedence over soil questions.

use pestwise_common::config::ClassifierConfig;
use pestwise_common::errors::Result;
use pestwise_common::text;
use pestwise_common::vocabulary::{IntentKeywords, SynonymMap};
use pestwise_common::IntentClass;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Intent plus the keyword that selected it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub intent: IntentClass,
    pub matched_keyword: Option<String>,
}

/// Keyword-priority intent classifier
#[derive(Debug, Clone)]
pub struct QueryClassifier {
    keywords: IntentKeywords,
    synonyms: Arc<SynonymMap>,
    min_query_chars: usize,
}

impl QueryClassifier {
    pub fn new(keywords: IntentKeywords, synonyms: Arc<SynonymMap>, min_query_chars: usize) -> Self {
        Self {
            keywords,
            synonyms,
            min_query_chars,
        }
    }

    /// Built-in keyword lists with configured overrides applied
    pub fn from_config(config: &ClassifierConfig, synonyms: Arc<SynonymMap>) -> Result<Self> {
        let keywords = IntentKeywords::default().with_overrides(&config.keywords)?;
        Ok(Self::new(keywords, synonyms, config.min_query_chars))
    }

    pub fn classify(&self, query: &str) -> IntentClass {
        self.classify_detailed(query).intent
    }

    pub fn classify_detailed(&self, query: &str) -> Classification {
        let normalized = text::normalize(query);
        if normalized.chars().count() < self.min_query_chars {
            return Classification {
                intent: IntentClass::GeneralQuery,
                matched_keyword: None,
            };
        }

        // Match against both the surface tokens and their canonical forms
        let tokens = text::tokenize(&normalized);
        let canonical = self.synonyms.normalize_tokens(&tokens);
        let haystack = format!(" {} | {} ", tokens.join(" "), canonical.join(" "));

        for (intent, keywords) in self.keywords.iter() {
            if let Some(keyword) = keywords.iter().find(|k| haystack.contains(k.as_str())) {
                debug!(intent = %intent, keyword = %keyword, "Query classified");
                return Classification {
                    intent,
                    matched_keyword: Some(keyword.clone()),
                };
            }
        }

        debug!(intent = %IntentClass::GeneralQuery, "No intent keyword matched");
        Classification {
            intent: IntentClass::GeneralQuery,
            matched_keyword: None,
        }
    }
}

impl Default for QueryClassifier {
    fn default() -> Self {
        Self::new(IntentKeywords::default(), Arc::new(SynonymMap::default()), 3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_predators_resolve_to_pest_management() {
        let classifier = QueryClassifier::default();
        assert_eq!(
            classifier.classify("What are natural predators for aphids?"),
            IntentClass::PestManagement
        );
    }

    #[test]
    fn test_soil_ph_question() {
        let classifier = QueryClassifier::default();
        assert_eq!(
            classifier.classify("What is the optimal soil pH for tomatoes?"),
            IntentClass::SoilAnalysis
        );
    }

    #[test]
    fn test_control_question() {
        let classifier = QueryClassifier::default();
        let result = classifier.classify_detailed("How do I control aphids on my tomato plants?");
        assert_eq!(result.intent, IntentClass::PestManagement);
        assert_eq!(result.matched_keyword.as_deref(), Some("control"));
    }

    #[test]
    fn test_other_intents() {
        let classifier = QueryClassifier::default();
        assert_eq!(classifier.classify("What pests attack maize?"), IntentClass::CropPests);
        assert_eq!(
            classifier.classify("There are holes in my cabbage leaves"),
            IntentClass::PestIdentification
        );
        assert_eq!(
            classifier.classify("Traditional ways our elders kept weevils out of stored grain"),
            IntentClass::IndigenousKnowledge
        );
    }

    #[test]
    fn test_synonyms_reach_keywords() {
        let classifier = QueryClassifier::default();
        // "neem" canonicalizes to neem_oil, a pest management keyword
        assert_eq!(classifier.classify("Is neem safe for kale?"), IntentClass::PestManagement);
    }

    #[test]
    fn test_short_or_empty_is_general() {
        let classifier = QueryClassifier::default();
        assert_eq!(classifier.classify(""), IntentClass::GeneralQuery);
        assert_eq!(classifier.classify("  a "), IntentClass::GeneralQuery);
        assert_eq!(classifier.classify("When does the rainy season start?"), IntentClass::GeneralQuery);
    }

    #[test]
    fn test_config_overrides() {
        let mut keywords = HashMap::new();
        keywords.insert("soil_analysis".to_string(), vec!["loam".to_string()]);
        let config = ClassifierConfig {
            keywords,
            ..ClassifierConfig::default()
        };
        let classifier =
            QueryClassifier::from_config(&config, Arc::new(SynonymMap::default())).unwrap();
        assert_eq!(classifier.classify("Is loam good for beans?"), IntentClass::SoilAnalysis);
        assert_eq!(classifier.classify("Is my soil too wet?"), IntentClass::GeneralQuery);
    }
}
