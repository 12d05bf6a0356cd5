//! Per-intent model selection

use pestwise_common::config::GenerationConfig;
use pestwise_common::errors::Result;
use pestwise_common::IntentClass;
use std::collections::HashMap;
use tracing::debug;

/// Chooses the backend model for an intent
#[derive(Debug, Clone)]
pub struct ModelRouter {
    default_model: String,
    intent_models: HashMap<IntentClass, String>,
}

impl ModelRouter {
    pub fn new(default_model: impl Into<String>, intent_models: HashMap<IntentClass, String>) -> Self {
        Self {
            default_model: default_model.into(),
            intent_models,
        }
    }

    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        Ok(Self::new(config.default_model.clone(), config.intent_model_map()?))
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Specialized model if one is configured and the backend lists it,
    /// otherwise the default model. With no model list nothing can be
    /// confirmed, so the default is used.
    pub fn select(&self, intent: IntentClass, available: Option<&[String]>) -> String {
        let Some(configured) = self.intent_models.get(&intent) else {
            return self.default_model.clone();
        };

        match available {
            Some(models) if is_listed(configured, models) => configured.clone(),
            _ => {
                debug!(
                    intent = %intent,
                    model = %configured,
                    default_model = %self.default_model,
                    "Specialized model not available, using default"
                );
                self.default_model.clone()
            }
        }
    }
}

/// `llama3.2` matches `llama3.2:latest`; a tagged id must match exactly
fn is_listed(model: &str, available: &[String]) -> bool {
    available.iter().any(|name| {
        name == model
            || name
                .strip_prefix(model)
                .is_some_and(|rest| rest.starts_with(':'))
    })
}
