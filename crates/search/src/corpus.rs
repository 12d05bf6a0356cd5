//! Retrieval corpus
//!
//! A static in-memory document list. The built-in documents can be
//! replaced by a JSON file of `[{title, content, keywords?}]`.

use pestwise_common::errors::{AppError, Result};
use pestwise_common::text;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Corpus document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub content: String,
    /// Curated terms; the title keywords when not given
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Document {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        let title = title.into();
        let keywords = text::extract_keywords(&title);
        Self {
            title,
            content: content.into(),
            keywords,
        }
    }

    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        for keyword in keywords {
            let keyword = keyword.trim().to_lowercase();
            if !keyword.is_empty() && !self.keywords.contains(&keyword) {
                self.keywords.push(keyword);
            }
        }
        self
    }
}

/// Load a JSON corpus. Documents without a title or content are rejected.
pub fn load_corpus(path: &Path) -> Result<Vec<Document>> {
    let raw = std::fs::read_to_string(path).map_err(|e| AppError::Configuration {
        message: format!("cannot read corpus {}: {}", path.display(), e),
    })?;
    let documents = parse_corpus(&raw)?;
    info!(path = %path.display(), documents = documents.len(), "Corpus loaded");
    Ok(documents)
}

pub fn parse_corpus(raw: &str) -> Result<Vec<Document>> {
    let mut documents: Vec<Document> =
        serde_json::from_str(raw).map_err(|e| AppError::Configuration {
            message: format!("corpus is not a JSON document list: {}", e),
        })?;

    for (i, doc) in documents.iter_mut().enumerate() {
        if doc.title.trim().is_empty() || doc.content.trim().is_empty() {
            return Err(AppError::Configuration {
                message: format!("corpus document {} has an empty title or content", i),
            });
        }
        if doc.keywords.is_empty() {
            doc.keywords = text::extract_keywords(&doc.title);
        }
    }
    Ok(documents)
}

/// Built-in curated documents
pub fn builtin_corpus() -> Vec<Document> {
    vec![
        Document::new(
            "Aphid Control on Tomatoes",
            "Aphids cluster on the undersides of tomato leaves and on new shoots, \
             sucking sap and spreading viruses. Control them early: spray plants with \
             insecticidal soap or neem oil every five to seven days, knock colonies off \
             with a strong jet of water, and encourage ladybugs and lacewings, which feed \
             on aphids. Remove heavily infested leaves and avoid excess nitrogen, which \
             favours the soft growth aphids prefer.",
        )
        .with_keywords(&["aphid", "tomato", "insecticidal_soap", "neem_oil"]),
        Document::new(
            "Fall Armyworm Management in Maize",
            "Fall armyworm larvae feed inside the maize whorl, leaving ragged holes and \
             sawdust-like frass. Scout fields twice a week from emergence. Early \
             infestations can be managed by hand-picking egg masses and larvae, applying \
             wood ash or sand into the whorl, and spraying Bacillus thuringiensis or \
             neem-based products in the evening when larvae are active.\n\n\
             Intercropping maize with beans or desmodium and planting early in the season \
             reduce damage. Conserve natural enemies such as earwigs and parasitic wasps \
             by avoiding broad-spectrum insecticides.",
        )
        .with_keywords(&["fall_armyworm", "maize", "whorl"]),
        Document::new(
            "Push-Pull Technology for Stemborer Control",
            "Push-pull intercrops maize with desmodium, which repels stemborer moths, and \
             surrounds the plot with napier or brachiaria grass, which attracts them away \
             from the crop. Desmodium also suppresses striga weed and fixes nitrogen, so \
             yields improve even in seasons with low pest pressure.",
        )
        .with_keywords(&["push_pull", "stemborer", "desmodium"]),
        Document::new(
            "Recognizing Whitefly Damage",
            "Whiteflies are tiny white insects that rise in a cloud when leaves are \
             disturbed. Leaves turn yellow, become sticky with honeydew and develop black \
             sooty mould. Yellow sticky traps help confirm an infestation and monitor \
             numbers. Whiteflies also transmit leaf curl viruses in tomato and cassava.",
        )
        .with_keywords(&["whitefly", "identify", "symptom"]),
        Document::new(
            "Traditional Pest Repellents: Wood Ash and Chili",
            "Farmers have long dusted wood ash on leaves and around stems to deter \
             crawling insects and cutworms. A chili and garlic extract, soaked overnight, \
             strained and mixed with a little soap, repels aphids and caterpillars. Tephrosia \
             and Mexican marigold leaves are also steeped in water as traditional sprays.",
        )
        .with_keywords(&["indigenous", "traditional", "wood_ash"]),
        Document::new(
            "Soil pH and Nutrient Management for Vegetables",
            "Most vegetables grow best at a soil pH between 6.0 and 7.0; tomatoes prefer \
             6.2 to 6.8. Acidic soils can be corrected with agricultural lime applied a few \
             weeks before planting. Well-rotted manure and compost add organic matter and \
             nutrients, and a soil test every two or three seasons guides nitrogen, \
             phosphorus and potassium applications.",
        )
        .with_keywords(&["soil", "soil_ph", "ph", "nutrient", "compost"]),
        Document::new(
            "Integrated Pest Management Principles",
            "Integrated pest management combines prevention, monitoring and control. \
             Use resistant varieties, crop rotation and field hygiene first; scout \
             regularly and act only when pest numbers reach an action threshold; prefer \
             biological and cultural controls, and use selective pesticides as a last \
             resort.",
        )
        .with_keywords(&["ipm", "prevention", "monitoring"]),
        Document::new(
            "Tomato Leafminer (Tuta absoluta)",
            "Tuta absoluta larvae mine tomato leaves, stems and fruit, leaving translucent \
             blotches and small exit holes. Pheromone traps catch adult moths for \
             monitoring and mass trapping. Remove and destroy infested plant parts and \
             rotate away from tomato, potato and other solanaceous crops.",
        )
        .with_keywords(&["tuta_absoluta", "leafminer"]),
        Document::new(
            "Natural Predators and Beneficial Insects",
            "Ladybugs, lacewings, hoverflies and parasitic wasps keep many soft-bodied pests \
             in check. Flowering borders of coriander, dill or marigold give them nectar and \
             shelter. Broad-spectrum sprays kill these allies, so spot-treat only where \
             pests are concentrated.",
        )
        .with_keywords(&["predator", "ladybug", "beneficial", "biological"]),
    ]
}
