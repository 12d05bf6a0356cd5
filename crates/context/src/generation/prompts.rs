//! Intent-specific system preambles, prompts and canned fallbacks

use pestwise_common::IntentClass;

/// System preamble sent with every generation request
pub fn system_preamble(intent: IntentClass) -> &'static str {
    match intent {
        IntentClass::PestManagement => {
            "You are an agricultural extension officer advising smallholder farmers. \
             Recommend practical pest control measures, preferring cultural, biological \
             and low-toxicity options before synthetic pesticides. Be concise and specific."
        }
        IntentClass::PestIdentification => {
            "You are an entomologist helping farmers identify crop pests from the symptoms \
             they describe. Name the most likely pests, the signs that distinguish them, \
             and how to confirm the diagnosis in the field."
        }
        IntentClass::CropPests => {
            "You are a crop protection specialist. List the pests that commonly attack \
             the crop in question, when in the season they appear, and which ones cause \
             the most damage."
        }
        IntentClass::IndigenousKnowledge => {
            "You are a researcher documenting traditional and indigenous farming practices. \
             Describe the practice respectfully, explain how farmers apply it, and note \
             any known scientific basis."
        }
        IntentClass::SoilAnalysis => {
            "You are a soil scientist. Give practical guidance on soil pH, fertility and \
             nutrient management that a small farm can apply without a laboratory."
        }
        IntentClass::GeneralQuery => {
            "You are a helpful agricultural assistant. Answer clearly and briefly, and say \
             so when a question is outside farming."
        }
    }
}

/// Safe answer used whenever generation fails
pub fn fallback_response(intent: IntentClass) -> &'static str {
    match intent {
        IntentClass::PestManagement => {
            "I can't reach the advisory model right now. In the meantime, inspect plants \
             regularly, remove badly affected leaves, encourage natural predators such as \
             ladybugs, and consider a neem-based or insecticidal soap spray before stronger \
             chemicals. Your local extension officer can confirm the best option."
        }
        IntentClass::PestIdentification => {
            "I can't identify the pest right now. Note where the damage is (leaves, stems, \
             fruit or roots), look for insects on the undersides of leaves early in the \
             morning, and take a sample or photo to your local extension officer."
        }
        IntentClass::CropPests => {
            "I can't list the pests for that crop right now. Scout the crop weekly, \
             especially at seedling and flowering stages, and ask your local extension \
             office which pests are active in your area this season."
        }
        IntentClass::IndigenousKnowledge => {
            "I can't look up traditional practices right now. Elders and farmer groups in \
             your area are the best source for local methods, and many, such as wood ash \
             and intercropping, are worth trying on a small plot first."
        }
        IntentClass::SoilAnalysis => {
            "I can't give soil advice right now. Most crops do well at a soil pH between \
             6.0 and 7.0; a simple soil test and regular additions of compost or manure \
             are a good start."
        }
        IntentClass::GeneralQuery => {
            "I'm unable to answer that right now. Please try again shortly, or contact your \
             local agricultural extension office for help."
        }
    }
}

/// User prompt with optional knowledge facts and caller context
pub fn build_prompt(query: &str, facts: &[String], context: Option<&str>) -> String {
    let mut prompt = String::new();

    if !facts.is_empty() {
        prompt.push_str("Known facts from the knowledge base:\n");
        for fact in facts {
            prompt.push_str("- ");
            prompt.push_str(fact);
            prompt.push('\n');
        }
        prompt.push('\n');
    }

    if let Some(context) = context.map(str::trim).filter(|c| !c.is_empty()) {
        prompt.push_str("Farmer's situation: ");
        prompt.push_str(context);
        prompt.push_str("\n\n");
    }

    prompt.push_str("Question: ");
    prompt.push_str(query.trim());
    prompt.push_str("\n\nAnswer in a few sentences.");
    prompt
}
