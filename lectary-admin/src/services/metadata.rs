//! AI-assisted metadata generation
//!
//! Generates entity descriptions through the completion service. There is
//! no safe default text to substitute, so upstream failures surface to the
//! caller with the raw error message.

use std::sync::Arc;

use lectary_common::{Error, Result};
use tracing::info;

use crate::ai::CompletionClient;
use crate::models::EntityKind;

/// Generates descriptions for catalog entities
#[derive(Clone)]
pub struct MetadataGenerator {
    client: Arc<CompletionClient>,
}

impl MetadataGenerator {
    pub fn new(client: Arc<CompletionClient>) -> Self {
        Self { client }
    }

    /// Generate a short catalog description for an entity
    pub async fn generate_description(
        &self,
        kind: EntityKind,
        display_name: &str,
        hebrew_name: Option<&str>,
    ) -> Result<String> {
        if display_name.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Entity name is required for description generation".to_string(),
            ));
        }

        let mut prompt = format!(
            "Write a concise two-sentence encyclopedic description of the {} \"{}\" \
             for a lecture catalog. Plain text only, no markup.",
            kind,
            display_name.trim()
        );
        if let Some(hebrew) = hebrew_name {
            if !hebrew.trim().is_empty() {
                prompt.push_str(&format!(" The Hebrew name is \"{}\".", hebrew.trim()));
            }
        }

        let text = self.client.complete(&prompt).await?;
        let description = text.trim().to_string();

        info!(kind = %kind, name = %display_name, chars = description.len(), "Generated description");

        Ok(description)
    }
}
