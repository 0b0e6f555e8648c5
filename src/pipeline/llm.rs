//! Provider plumbing shared by the model-backed stages.
//!
//! The structuring and skeleton stages both need "call the model, force one
//! function call, parse its arguments into a typed struct". That round trip
//! lives in [`call_tool`] so the stage modules only own their prompt and
//! schema. There are no retries: a transport error or an off-schema answer is
//! reported once as a [`StageError`] and becomes a `failed` record.

use crate::config::ExtractionConfig;
use crate::error::{Stage, StageError, TableExtractError};
use edgequake_llm::{
    ChatMessage, CompletionOptions, LLMProvider, ProviderFactory, ToolChoice, ToolDefinition,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// A function tool the model is forced to call.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: serde_json::Value,
}

pub fn build_options(temperature: f32, max_tokens: usize) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(temperature),
        max_tokens: Some(max_tokens),
        ..Default::default()
    }
}

/// Send `messages`, force a call to `tool`, and deserialize its arguments.
///
/// A provider error maps to [`StageError::Transport`]. A response without the
/// forced call, a call to some other function, or arguments that do not
/// deserialize into `T` map to [`StageError::SchemaViolation`].
pub async fn call_tool<T: DeserializeOwned>(
    provider: &Arc<dyn LLMProvider>,
    messages: &[ChatMessage],
    tool: &ToolSpec,
    options: &CompletionOptions,
    stage: Stage,
) -> Result<T, StageError> {
    let start = Instant::now();
    let tools = [ToolDefinition::function(
        tool.name,
        tool.description,
        tool.parameters.clone(),
    )];

    let response = provider
        .chat_with_tools(
            messages,
            &tools,
            Some(ToolChoice::function(tool.name)),
            Some(options),
        )
        .await
        .map_err(|e| StageError::Transport {
            stage,
            detail: e.to_string(),
        })?;

    debug!(
        "{} call: {} input tokens, {} output tokens, {:?}",
        stage,
        response.prompt_tokens,
        response.completion_tokens,
        start.elapsed()
    );

    let call = response
        .tool_calls
        .iter()
        .find(|c| c.function.name == tool.name)
        .ok_or_else(|| {
            let called: Vec<&str> = response
                .tool_calls
                .iter()
                .map(|c| c.function.name.as_str())
                .collect();
            StageError::SchemaViolation {
                stage,
                detail: if called.is_empty() {
                    format!("model did not call `{}`", tool.name)
                } else {
                    format!("model called {:?} instead of `{}`", called, tool.name)
                },
            }
        })?;

    parse_arguments(&call.function.arguments, stage)
}

/// Deserialize tool-call arguments into the stage's output type.
pub(crate) fn parse_arguments<T: DeserializeOwned>(
    arguments: &str,
    stage: Stage,
) -> Result<T, StageError> {
    serde_json::from_str(arguments).map_err(|e| {
        warn!("{} arguments rejected: {}", stage, e);
        StageError::SchemaViolation {
            stage,
            detail: e.to_string(),
        }
    })
}

fn create_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, TableExtractError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        TableExtractError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the provider that will serve `model`.
///
/// Each stage names its own model, so this is called once per stage:
///
/// 1. `config.provider`, used as-is for every stage;
/// 2. `config.provider_name`, built for `model`;
/// 3. `EDGEQUAKE_LLM_PROVIDER` from the environment, built for `model`;
/// 4. `OPENAI_API_KEY` present: OpenAI, built for `model`;
/// 5. [`ProviderFactory::from_env`] auto-detection.
pub fn resolve_provider(
    config: &ExtractionConfig,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, TableExtractError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_provider(name, model);
    }

    if let Ok(prov) = std::env::var("EDGEQUAKE_LLM_PROVIDER") {
        if !prov.is_empty() {
            return create_provider(&prov, model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| TableExtractError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}


#[cfg(test)]
mod tests {
    use super::testing::{tool_call, UnreachableProvider};
    use super::*;
    use edgequake_llm::providers::MockAgentProvider;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct CountArgs {
        count: u32,
    }

    fn count_tool() -> ToolSpec {
        ToolSpec {
            name: "report_count",
            description: "Report a count.",
            parameters: json!({
                "type": "object",
                "properties": {"count": {"type": "integer"}},
                "required": ["count"]
            }),
        }
    }

    async fn call_count_tool(provider: Arc<dyn LLMProvider>) -> Result<CountArgs, StageError> {
        call_tool(
            &provider,
            &[ChatMessage::user("how many?")],
            &count_tool(),
            &build_options(0.0, 256),
            Stage::Skeleton,
        )
        .await
    }

    #[test]
    fn build_options_sets_limits() {
        let opts = build_options(0.0, 4096);
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.max_tokens, Some(4096));
    }

    #[test]
    fn parse_arguments_accepts_schema_shape() {
        let p: CountArgs = parse_arguments(r#"{"count": 3}"#, Stage::Skeleton).unwrap();
        assert_eq!(p.count, 3);
    }

    #[test]
    fn parse_arguments_flags_schema_violation() {
        let err = parse_arguments::<CountArgs>(r#"{"count": "three"}"#, Stage::Skeleton).unwrap_err();
        assert!(matches!(
            err,
            StageError::SchemaViolation {
                stage: Stage::Skeleton,
                ..
            }
        ));

        let err = parse_arguments::<CountArgs>("not json", Stage::Structure).unwrap_err();
        assert_eq!(err.stage(), Stage::Structure);
    }

    #[tokio::test]
    async fn call_tool_returns_forced_call_arguments() {
        let provider = MockAgentProvider::new();
        provider
            .add_tool_response("", vec![tool_call("report_count", r#"{"count": 7}"#)])
            .await;

        let p = call_count_tool(Arc::new(provider)).await.unwrap();
        assert_eq!(p.count, 7);
    }

    #[tokio::test]
    async fn call_tool_picks_the_forced_call_among_several() {
        let provider = MockAgentProvider::new();
        provider
            .add_tool_response(
                "",
                vec![
                    tool_call("think", r#"{"note": "x"}"#),
                    tool_call("report_count", r#"{"count": 2}"#),
                ],
            )
            .await;

        let p = call_count_tool(Arc::new(provider)).await.unwrap();
        assert_eq!(p.count, 2);
    }

    #[tokio::test]
    async fn transport_failure_is_reported_as_transport() {
        let err = call_count_tool(Arc::new(UnreachableProvider))
            .await
            .unwrap_err();
        match err {
            StageError::Transport { stage, detail } => {
                assert_eq!(stage, Stage::Skeleton);
                assert!(detail.contains("connection refused"), "got {detail}");
            }
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn plain_text_answer_is_schema_violation() {
        let provider = MockAgentProvider::new();
        provider.add_response("There are 7.").await;

        let err = call_count_tool(Arc::new(provider)).await.unwrap_err();
        match err {
            StageError::SchemaViolation { detail, .. } => {
                assert!(detail.contains("did not call `report_count`"), "got {detail}");
            }
            other => panic!("expected schema violation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn call_to_other_function_is_schema_violation() {
        let provider = MockAgentProvider::new();
        provider
            .add_tool_response("", vec![tool_call("task_complete", r#"{"count": 7}"#)])
            .await;

        let err = call_count_tool(Arc::new(provider)).await.unwrap_err();
        match err {
            StageError::SchemaViolation { detail, .. } => {
                assert!(detail.contains("task_complete"), "got {detail}");
            }
            other => panic!("expected schema violation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn off_schema_arguments_are_schema_violation() {
        let provider = MockAgentProvider::new();
        provider
            .add_tool_response("", vec![tool_call("report_count", r#"{"count": "seven"}"#)])
            .await;

        let err = call_count_tool(Arc::new(provider)).await.unwrap_err();
        assert!(matches!(
            err,
            StageError::SchemaViolation {
                stage: Stage::Skeleton,
                ..
            }
        ));
    }
}
