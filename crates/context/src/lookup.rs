//! Intent-scoped knowledge lookup
//!
//! Each intent searches a fixed set of frame types and names the
//! attributes that make a frame a complete answer on its own. A complete
//! match is rendered directly; partial matches become prompt facts.

use pestwise_common::IntentClass;
use pestwise_knowledge::frame::humanize;
use pestwise_knowledge::{Frame, FrameStore, FrameType};

/// Frame types searched for an intent. Empty means every type.
pub fn intent_scope(intent: IntentClass) -> Vec<FrameType> {
    match intent {
        IntentClass::PestManagement => vec![FrameType::Pest, FrameType::Practice],
        IntentClass::PestIdentification => vec![FrameType::Pest, FrameType::Disease],
        IntentClass::CropPests => vec![FrameType::Crop, FrameType::Pest],
        IntentClass::IndigenousKnowledge => vec![FrameType::Practice],
        IntentClass::SoilAnalysis => vec![FrameType::Soil, FrameType::Crop],
        IntentClass::GeneralQuery => Vec::new(),
    }
}

/// `(frame type, attribute)` pairs, any one of which completes an answer
fn requirements(intent: IntentClass) -> Vec<(FrameType, &'static str)> {
    match intent {
        IntentClass::PestManagement => vec![(FrameType::Pest, "controls")],
        IntentClass::PestIdentification => vec![
            (FrameType::Pest, "symptoms"),
            (FrameType::Disease, "symptoms"),
        ],
        IntentClass::CropPests => vec![(FrameType::Crop, "pests")],
        IntentClass::IndigenousKnowledge => vec![(FrameType::Practice, "description")],
        IntentClass::SoilAnalysis => vec![
            (FrameType::Crop, "soil_ph"),
            (FrameType::Soil, "description"),
        ],
        IntentClass::GeneralQuery => Vec::new(),
    }
}

/// Outcome of a scoped lookup
#[derive(Debug, Clone, Default)]
pub struct KnowledgeMatch {
    /// Every in-scope frame mentioned by the query, in mention order
    pub frames: Vec<Frame>,
    /// First frame that answers the intent on its own, with the attribute
    /// that qualified it
    pub complete: Option<(Frame, &'static str)>,
}

impl KnowledgeMatch {
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

pub fn lookup(store: &FrameStore, query: &str, intent: IntentClass) -> KnowledgeMatch {
    let scope = intent_scope(intent);
    let frames: Vec<Frame> = store
        .mentioned_in(query, &scope)
        .into_iter()
        .cloned()
        .collect();

    let rules = requirements(intent);
    let complete = frames.iter().find_map(|frame| {
        rules
            .iter()
            .find(|(frame_type, attribute)| {
                frame.frame_type == *frame_type && frame.has_value(attribute)
            })
            .map(|(_, attribute)| (frame.clone(), *attribute))
    });

    KnowledgeMatch { frames, complete }
}

/// Answer text for a complete frame: an intent headline, then the other
/// attributes in source order
pub fn render(frame: &Frame, attribute: &str, intent: IntentClass) -> String {
    let name = frame.display_name();
    let value = frame.get(attribute).map(|v| v.display()).unwrap_or_default();

    let mut answer = match (intent, attribute) {
        (IntentClass::PestManagement, _) => format!("To manage {}, use: {}.", name, value),
        (IntentClass::PestIdentification, _) => format!("Signs of {}: {}.", name, value),
        (IntentClass::CropPests, _) => format!("Common pests of {}: {}.", name, value),
        (IntentClass::SoilAnalysis, "soil_ph") => {
            format!("{} grows best at soil pH {}.", capitalize(&name), value)
        }
        _ => format!("{}: {}", capitalize(&name), value),
    };

    for attr in &frame.attributes {
        if attr.name.eq_ignore_ascii_case(attribute) || attr.value.is_empty() {
            continue;
        }
        answer.push_str(&format!("\n- {}: {}", humanize(&attr.name), attr.value.display()));
    }
    answer
}

/// One line per frame for the generation prompt
pub fn facts(frames: &[Frame], limit: usize) -> Vec<String> {
    frames
        .iter()
        .take(limit)
        .map(|frame| {
            let attributes = frame
                .attributes
                .iter()
                .filter(|a| !a.value.is_empty())
                .map(|a| format!("{}: {}", humanize(&a.name), a.value.display()))
                .collect::<Vec<_>>()
                .join("; ");
            if attributes.is_empty() {
                format!("{} {}", frame.frame_type, frame.display_name())
            } else {
                format!("{} {}: {}", frame.frame_type, frame.display_name(), attributes)
            }
        })
        .collect()
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pestwise_common::SynonymMap;
    use pestwise_knowledge::KnowledgeSource;
    use std::sync::Arc;

    const KB: &str = r#"
pest(aphid, [type: insect, controls: [neem_oil, ladybugs], symptoms: [curled_leaves, sticky_honeydew]]).
pest(fall_armyworm, [type: insect, hosts: [maize]]).
crop(tomato, [family: solanaceae, pests: [aphid, whitefly, tuta_absoluta], soil_ph: "6.0-6.8"]).
practice(wood_ash, [description: "Dust wood ash on leaves to deter soft-bodied pests", origin: traditional]).
"#;

    fn store() -> FrameStore {
        let (store, _) = FrameStore::from_sources(
            &[KnowledgeSource::new("test.kb", KB)],
            Arc::new(SynonymMap::default()),
        )
        .unwrap();
        store
    }

    #[test]
    fn test_complete_match_for_management() {
        let store = store();
        let found = lookup(&store, "How do I control aphids on my tomato plants?", IntentClass::PestManagement);
        let (frame, attribute) = found.complete.unwrap();
        assert_eq!(frame.id, "pest:aphid");
        assert_eq!(attribute, "controls");
        // tomato is a crop, outside the management scope
        assert_eq!(found.frames.len(), 1);
    }

    #[test]
    fn test_partial_match_is_not_complete() {
        let store = store();
        let found = lookup(&store, "How do I get rid of fall armyworm?", IntentClass::PestManagement);
        assert!(found.complete.is_none());
        assert_eq!(found.frames[0].id, "pest:fall_armyworm");
    }

    #[test]
    fn test_render_management_answer() {
        let store = store();
        let frame = store.get(&FrameType::Pest, "aphids").found().unwrap().clone();
        let text = render(&frame, "controls", IntentClass::PestManagement);
        assert_eq!(
            text,
            "To manage aphid, use: neem oil, ladybugs.\n\
             - type: insect\n\
             - symptoms: curled leaves, sticky honeydew"
        );
    }

    #[test]
    fn test_render_soil_answer() {
        let store = store();
        let found = lookup(&store, "What is the optimal soil pH for tomatoes?", IntentClass::SoilAnalysis);
        let (frame, attribute) = found.complete.unwrap();
        let text = render(&frame, attribute, IntentClass::SoilAnalysis);
        assert!(text.starts_with("Tomato grows best at soil pH 6.0-6.8."));
        assert!(text.contains("\n- pests: aphid, whitefly, tuta absoluta"));
    }

    #[test]
    fn test_general_query_never_completes() {
        let store = store();
        let found = lookup(&store, "Tell me about wood ash and aphids", IntentClass::GeneralQuery);
        assert_eq!(found.frames.len(), 2);
        assert!(found.complete.is_none());
    }

    #[test]
    fn test_facts() {
        let store = store();
        let frame = store.get(&FrameType::Pest, "fall armyworm").found().unwrap().clone();
        assert_eq!(
            facts(&[frame], 3),
            vec!["pest fall armyworm: type: insect; hosts: maize".to_string()]
        );
    }
}
