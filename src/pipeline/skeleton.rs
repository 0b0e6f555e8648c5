//! Table skeleton analysis: one markdown table in, [`TableSkeleton`] out.
//!
//! Two engines implement [`SkeletonEngine`]:
//!
//! * [`LlmSkeletonEngine`] forces a call to `extract_table_skeleton` with a
//!   closed schema (`additionalProperties: false`);
//! * [`MarkdownSkeletonEngine`] reads the same structure straight from the
//!   pipe-table syntax, with no model call.
//!
//! Both apply the same reading rules: conjoined tables count as one, header
//! rows are not data rows, and row headers are the unique non-empty
//! first-column labels. The orchestrator truncates the markdown to the
//! configured budget before either engine sees it.

use crate::error::{Stage, StageError};
use crate::output::TableSkeleton;
use crate::pipeline::llm::{self, ToolSpec};
use crate::pipeline::markdown::MarkdownTable;
use crate::prompts::{skeleton_system_prompt, SKELETON_TOOL_NAME};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, LLMProvider};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[async_trait]
pub trait SkeletonEngine: Send + Sync {
    async fn extract_skeleton(&self, markdown: &str) -> Result<TableSkeleton, StageError>;
}

/// Tool-call arguments. `deny_unknown_fields` enforces the closed schema on
/// our side as well.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SkeletonArgs {
    #[serde(default)]
    caption: Option<String>,
    column_count: u32,
    row_count: u32,
    column_headers: Vec<String>,
    row_headers: Vec<String>,
}

impl From<SkeletonArgs> for TableSkeleton {
    fn from(a: SkeletonArgs) -> Self {
        Self {
            caption: a.caption.filter(|c| !c.trim().is_empty()),
            column_count: a.column_count,
            row_count: a.row_count,
            column_headers: a.column_headers,
            row_headers: a.row_headers,
            merged_from: None,
        }
    }
}

pub fn skeleton_tool() -> ToolSpec {
    ToolSpec {
        name: SKELETON_TOOL_NAME,
        description: "Return structural metadata (no data cells) for ONE markdown table block.",
        parameters: json!({
            "type": "object",
            "properties": {
                "caption": {"type": ["string", "null"]},
                "column_count": {"type": "integer"},
                "row_count": {"type": "integer"},
                "column_headers": {"type": "array", "items": {"type": "string"}},
                "row_headers": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["column_count", "row_count", "column_headers", "row_headers"],
            "additionalProperties": false
        }),
    }
}

/// [`SkeletonEngine`] backed by a tool-calling chat model.
pub struct LlmSkeletonEngine {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
}

impl LlmSkeletonEngine {
    pub fn new(provider: Arc<dyn LLMProvider>, temperature: f32, max_tokens: usize) -> Self {
        Self {
            provider,
            temperature,
            max_tokens,
        }
    }
}

#[async_trait]
impl SkeletonEngine for LlmSkeletonEngine {
    async fn extract_skeleton(&self, markdown: &str) -> Result<TableSkeleton, StageError> {
        let messages = vec![
            ChatMessage::system(skeleton_system_prompt()),
            ChatMessage::user(markdown),
        ];
        let options = llm::build_options(self.temperature, self.max_tokens);
        let args: SkeletonArgs = llm::call_tool(
            &self.provider,
            &messages,
            &skeleton_tool(),
            &options,
            Stage::Skeleton,
        )
        .await?;
        Ok(args.into())
    }
}

/// Model-free [`SkeletonEngine`] that reads the pipe table directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownSkeletonEngine;

impl MarkdownSkeletonEngine {
    pub fn analyze(markdown: &str) -> Result<TableSkeleton, StageError> {
        let table = MarkdownTable::parse(markdown).ok_or_else(|| StageError::SchemaViolation {
            stage: Stage::Skeleton,
            detail: "no pipe-table row in block".to_string(),
        })?;

        Ok(TableSkeleton {
            caption: table.caption.clone(),
            column_count: table.header.len() as u32,
            row_count: table.data_rows as u32,
            row_headers: table.row_labels(),
            column_headers: table.header,
            merged_from: None,
        })
    }
}

#[async_trait]
impl SkeletonEngine for MarkdownSkeletonEngine {
    async fn extract_skeleton(&self, markdown: &str) -> Result<TableSkeleton, StageError> {
        Self::analyze(markdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::testing::{tool_call, UnreachableProvider};
    use edgequake_llm::providers::MockAgentProvider;

    #[test]
    fn tool_schema_is_closed() {
        let tool = skeleton_tool();
        assert_eq!(tool.name, "extract_table_skeleton");
        assert_eq!(tool.parameters["additionalProperties"], json!(false));
        assert_eq!(
            tool.parameters["properties"]["caption"]["type"],
            json!(["string", "null"])
        );
    }

    #[test]
    fn args_without_caption_parse() {
        let args: SkeletonArgs = llm::parse_arguments(
            r#"{"column_count": 2, "row_count": 2, "column_headers": ["Year", "Revenue"], "row_headers": ["2023", "2024"]}"#,
            Stage::Skeleton,
        )
        .unwrap();
        let skeleton = TableSkeleton::from(args);
        assert_eq!(skeleton.caption, None);
        assert_eq!(skeleton.column_headers, vec!["Year", "Revenue"]);
    }

    #[test]
    fn extra_fields_are_rejected() {
        let err = llm::parse_arguments::<SkeletonArgs>(
            r#"{"column_count": 1, "row_count": 1, "column_headers": ["A"], "row_headers": [], "cells": [["1"]]}"#,
            Stage::Skeleton,
        )
        .unwrap_err();
        assert!(matches!(err, StageError::SchemaViolation { .. }));
    }

    #[tokio::test]
    async fn markdown_engine_reads_revenue_table() {
        let md = "| Year | Revenue |\n|---|---|\n| 2023 | 10 |\n| 2024 | 12 |";
        let s = MarkdownSkeletonEngine.extract_skeleton(md).await.unwrap();
        assert_eq!(s.column_count, 2);
        assert_eq!(s.row_count, 2);
        assert_eq!(s.column_headers, vec!["Year", "Revenue"]);
        assert_eq!(s.row_headers, vec!["2023", "2024"]);
        assert_eq!(s.merged_from, None);
    }

    #[tokio::test]
    async fn markdown_engine_fails_on_prose() {
        let err = MarkdownSkeletonEngine
            .extract_skeleton("Revenue grew 12% year on year.")
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Stage::Skeleton);
    }

    #[tokio::test]
    async fn llm_engine_returns_called_skeleton() {
        let provider = MockAgentProvider::new();
        provider
            .add_tool_response(
                "",
                vec![tool_call(
                    SKELETON_TOOL_NAME,
                    r#"{"caption": " ", "column_count": 2, "row_count": 1,
                        "column_headers": ["Year", "Revenue"], "row_headers": ["2024"]}"#,
                )],
            )
            .await;
        let engine = LlmSkeletonEngine::new(Arc::new(provider), 0.0, 1024);

        let s = engine
            .extract_skeleton("| Year | Revenue |\n|---|---|\n| 2024 | 12 |")
            .await
            .unwrap();
        assert_eq!(s.caption, None);
        assert_eq!(s.column_headers, vec!["Year", "Revenue"]);
        assert_eq!(s.row_count, 1);
    }

    #[tokio::test]
    async fn llm_engine_reports_unreachable_provider() {
        let engine = LlmSkeletonEngine::new(Arc::new(UnreachableProvider), 0.0, 1024);
        let err = engine.extract_skeleton("| A |\n|---|").await.unwrap_err();
        assert!(matches!(
            err,
            StageError::Transport {
                stage: Stage::Skeleton,
                ..
            }
        ));
    }
}
