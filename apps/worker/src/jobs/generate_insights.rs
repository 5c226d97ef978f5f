//! AI insight generation job
//!
//! Asks the Ollama LLM for a strict-JSON summary/tags/tone analysis of an
//! entity's content and merges the result into its metadata. Skips entities
//! that already carry insights unless forced.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::timeout;

use folio_entity_store::{Entity, EntityStore};
use folio_ollama_client::{ChatMessage, ContentInsights, GenerateOptions, OllamaClient};

use crate::error::{WorkerError, WorkerResult};
use crate::events::{EntityEvent, EventBus};
use crate::registry::{JobContext, JobHandler};

pub const JOB_TYPE: &str = "generate_insights";

/// Job-level timeout (3 minutes)
const JOB_TIMEOUT_SECS: u64 = 180;

/// Content is truncated to this many characters before prompting
const MAX_PROMPT_CONTENT_CHARS: usize = 4000;

/// Insight generation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateInsightsJob {
    pub entity_id: String,
    pub entity_type: String,
    /// Regenerate even if insights already exist
    #[serde(default)]
    pub force: bool,
}

/// Result payload for an insight generation job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightsOutcome {
    pub entity_id: String,
    /// False when existing insights were kept
    pub generated: bool,
}

pub struct GenerateInsightsHandler {
    store: Arc<dyn EntityStore>,
    ollama: Arc<OllamaClient>,
    events: EventBus,
}

impl GenerateInsightsHandler {
    pub fn new(store: Arc<dyn EntityStore>, ollama: Arc<OllamaClient>, events: EventBus) -> Self {
        Self {
            store,
            ollama,
            events,
        }
    }

    async fn execute(
        &self,
        job: &GenerateInsightsJob,
        ctx: &JobContext,
    ) -> WorkerResult<InsightsOutcome> {
        ctx.report(0, 3, "loading entity");

        let mut entity = self
            .store
            .get(&job.entity_type, &job.entity_id)
            .await?
            .ok_or_else(|| {
                WorkerError::NotFound(format!(
                    "entity {}/{} not found",
                    job.entity_type, job.entity_id
                ))
            })?;

        if !job.force && entity.metadata_str("summary").is_some() {
            tracing::debug!(
                entity_id = %job.entity_id,
                "Insights already exist, skipping"
            );
            return Ok(InsightsOutcome {
                entity_id: job.entity_id.clone(),
                generated: false,
            });
        }

        ctx.report(1, 3, "generating insights");
        let prompt = build_insights_prompt(&entity);
        let messages = vec![
            ChatMessage::system(INSIGHTS_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ];
        let options = Some(GenerateOptions {
            temperature: Some(0.3), // Lower temperature for more consistent output
            num_predict: Some(500), // Enough for JSON response
            ..Default::default()
        });

        let response = self.ollama.chat_with_options(messages, options).await?;
        let insights = parse_insights_response(&response)?;

        tracing::debug!(
            entity_id = %job.entity_id,
            tags = ?insights.tags,
            tone = ?insights.tone,
            "Insight analysis complete"
        );

        ctx.report(2, 3, "saving insights");
        apply_insights(&mut entity, &insights);
        self.store.update(&entity).await?;
        self.events.publish(EntityEvent::Updated {
            entity_type: job.entity_type.clone(),
            id: job.entity_id.clone(),
        });

        ctx.report(3, 3, "done");
        Ok(InsightsOutcome {
            entity_id: job.entity_id.clone(),
            generated: true,
        })
    }
}

#[async_trait]
impl JobHandler for GenerateInsightsHandler {
    type Payload = GenerateInsightsJob;
    type Output = InsightsOutcome;

    fn job_type(&self) -> &'static str {
        JOB_TYPE
    }

    async fn process(
        &self,
        payload: GenerateInsightsJob,
        ctx: &JobContext,
    ) -> WorkerResult<InsightsOutcome> {
        // Wrap in timeout to prevent runaway jobs
        match timeout(
            Duration::from_secs(JOB_TIMEOUT_SECS),
            self.execute(&payload, ctx),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(
                    entity_id = %payload.entity_id,
                    timeout_secs = JOB_TIMEOUT_SECS,
                    "Insight generation timed out"
                );
                Err(WorkerError::Timeout {
                    seconds: JOB_TIMEOUT_SECS,
                })
            }
        }
    }
}

const INSIGHTS_SYSTEM_PROMPT: &str = r#"You are an editorial assistant. Analyze a markdown document and produce a short summary, topic tags, and a tone classification.

Always respond with valid JSON in exactly this format:
{
    "summary": "1-2 sentence summary of the document",
    "tags": ["tag1", "tag2", "tag3"],
    "tone": "informal" | "neutral" | "formal"
}

Tags should be lowercase, single words or short hyphenated phrases, at most five.

Respond ONLY with the JSON, no additional text."#;

/// Build the user prompt from the entity's metadata and (truncated) content
fn build_insights_prompt(entity: &Entity) -> String {
    let mut parts = Vec::new();

    if let Some(title) = entity.metadata_str("title") {
        parts.push(format!("Title: \"{}\"", title));
    }
    if let Some(series) = entity.metadata_str("series") {
        parts.push(format!("Series: \"{}\"", series));
    }

    let content: String = entity.content.chars().take(MAX_PROMPT_CONTENT_CHARS).collect();
    parts.push(format!("Document:\n{}", content));

    parts.push("Analyze this document and respond with the JSON.".to_string());
    parts.join("\n\n")
}

/// Parse and validate the LLM's JSON response
fn parse_insights_response(response: &str) -> WorkerResult<ContentInsights> {
    // Try to extract JSON from response (LLM might add extra text)
    let json_str = extract_json(response);

    let insights: ContentInsights = serde_json::from_str(&json_str).map_err(|e| {
        tracing::warn!(
            response = %response,
            error = %e,
            "Failed to parse insights response"
        );
        WorkerError::InsightsGeneration(format!("Failed to parse insights: {}", e))
    })?;

    if insights.summary.trim().is_empty() {
        return Err(WorkerError::InsightsGeneration(
            "LLM returned empty summary".to_string(),
        ));
    }

    Ok(insights)
}

/// Extract JSON object from response text
fn extract_json(text: &str) -> String {
    // Find the first { and last }
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            return text[start..=end].to_string();
        }
    }
    text.to_string()
}

/// Merge insights into entity metadata, deduplicating tags
fn apply_insights(entity: &mut Entity, insights: &ContentInsights) {
    entity.metadata.insert(
        "summary".to_string(),
        Value::String(insights.summary.clone()),
    );
    if let Ok(tone) = serde_json::to_value(insights.tone) {
        entity.metadata.insert("tone".to_string(), tone);
    }

    let mut tags: Vec<String> = entity
        .metadata
        .get("tags")
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    for tag in &insights.tags {
        if !tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            tags.push(tag.clone());
        }
    }

    entity
        .metadata
        .insert("tags".to_string(), Value::from(tags));
    entity.updated = chrono::Utc::now();
}
