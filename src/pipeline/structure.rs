//! Page structuring: raw OCR text in, typed [`StructuredPage`] out.
//!
//! The model must call `format_structured_page_json`; its arguments are the
//! page. Nothing in message content is ever parsed.

use crate::error::{Stage, StageError};
use crate::output::StructuredPage;
use crate::pipeline::llm::{self, ToolSpec};
use crate::prompts::{structure_system_prompt, STRUCTURE_TOOL_NAME};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, LLMProvider};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// Segments raw page text into typed sections.
#[async_trait]
pub trait PageStructurer: Send + Sync {
    /// `page` only stamps the output; it does not change behaviour.
    async fn structure(&self, text: &str, page: u32) -> Result<StructuredPage, StageError>;
}

/// [`PageStructurer`] backed by a tool-calling chat model.
pub struct LlmPageStructurer {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
}

impl LlmPageStructurer {
    pub fn new(provider: Arc<dyn LLMProvider>, temperature: f32, max_tokens: usize) -> Self {
        Self {
            provider,
            temperature,
            max_tokens,
        }
    }
}

/// The `format_structured_page_json` tool. Mirrors [`StructuredPage`] field
/// for field, enum values included.
pub fn structure_tool(page: u32) -> ToolSpec {
    ToolSpec {
        name: STRUCTURE_TOOL_NAME,
        description: "Formats the analyzed page content into a complete JSON object.",
        parameters: json!({
            "type": "object",
            "properties": {
                "page_number": {
                    "type": "integer",
                    "description": format!("The page number for this text, which is {page}.")
                },
                "has_tables": {
                    "type": "boolean",
                    "description": "True if any tables are found in the text, otherwise false."
                },
                "table_count": {
                    "type": "integer",
                    "description": "The total count of distinct tables found."
                },
                "formatted_text": {
                    "type": "string",
                    "description": "The full text of the page with markdown formatting, including `##` for headers and `[TABLE START]` / `[TABLE END]` markers."
                },
                "sections": {
                    "type": "array",
                    "description": "Logical blocks of content in reading order.",
                    "items": {
                        "type": "object",
                        "properties": {
                            "type": {
                                "type": "string",
                                "description": "The classification of the content block.",
                                "enum": ["header", "paragraph", "list", "table", "TOC", "footnote", "caption"]
                            },
                            "content": {
                                "type": "string",
                                "description": "The text content of this block. For tables, the complete markdown table."
                            },
                            "position": {
                                "type": "string",
                                "description": "The vertical location of the block on the page.",
                                "enum": ["top", "middle", "bottom"]
                            }
                        },
                        "required": ["type", "content", "position"]
                    }
                }
            },
            "required": ["page_number", "has_tables", "table_count", "formatted_text", "sections"]
        }),
    }
}

#[async_trait]
impl PageStructurer for LlmPageStructurer {
    async fn structure(&self, text: &str, page: u32) -> Result<StructuredPage, StageError> {
        if text.trim().is_empty() {
            debug!("Page {}: no text, structuring as an empty page", page);
            return Ok(blank_page(page));
        }

        let messages = vec![
            ChatMessage::system(structure_system_prompt(page)),
            ChatMessage::user(text),
        ];
        let options = llm::build_options(self.temperature, self.max_tokens);

        let structured: StructuredPage = llm::call_tool(
            &self.provider,
            &messages,
            &structure_tool(page),
            &options,
            Stage::Structure,
        )
        .await?;

        let structured = stamp_page(structured, page);
        debug!(
            "Page {}: {} sections, {} table blocks",
            page,
            structured.sections.len(),
            structured.table_blocks().count()
        );
        Ok(structured)
    }
}

/// A page whose OCR came back empty: no sections, no tables.
fn blank_page(page: u32) -> StructuredPage {
    StructuredPage {
        page_number: page,
        has_tables: false,
        table_count: 0,
        formatted_text: String::new(),
        sections: Vec::new(),
    }
}

fn stamp_page(mut structured: StructuredPage, page: u32) -> StructuredPage {
    if structured.page_number != page {
        debug!(
            "Page {}: model reported page_number {}, overriding",
            page, structured.page_number
        );
        structured.page_number = page;
    }
    structured
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::SectionType;
    use crate::pipeline::llm::testing::tool_call;
    use edgequake_llm::providers::MockAgentProvider;

    #[test]
    fn tool_schema_requires_every_page_field() {
        let tool = structure_tool(4);
        assert_eq!(tool.name, "format_structured_page_json");
        let required = tool.parameters["required"].as_array().unwrap();
        for field in ["page_number", "has_tables", "table_count", "formatted_text", "sections"] {
            assert!(required.iter().any(|r| r == field), "missing {field}");
        }
        let kinds = &tool.parameters["properties"]["sections"]["items"]["properties"]["type"]["enum"];
        assert_eq!(kinds.as_array().unwrap().len(), 7);
        assert!(tool.parameters["properties"]["page_number"]["description"]
            .as_str()
            .unwrap()
            .contains("which is 4"));
    }

    #[test]
    fn tool_arguments_deserialize_into_page() {
        let args = r#"{
            "page_number": 9,
            "has_tables": true,
            "table_count": 1,
            "formatted_text": "[TABLE START]\n| A | B |\n|---|---|\n| 1 | 2 |\n[TABLE END]",
            "sections": [
                {"type": "table", "content": "| A | B |\n|---|---|\n| 1 | 2 |", "position": "middle"}
            ]
        }"#;
        let page: StructuredPage = llm::parse_arguments(args, Stage::Structure).unwrap();
        let page = stamp_page(page, 2);
        assert_eq!(page.page_number, 2);
        assert_eq!(page.sections[0].kind, SectionType::Table);
    }

    #[test]
    fn unknown_section_type_is_schema_violation() {
        let args = r#"{"page_number": 1, "has_tables": false, "table_count": 0,
            "formatted_text": "", "sections": [{"type": "chart", "content": "x", "position": "top"}]}"#;
        let err = llm::parse_arguments::<StructuredPage>(args, Stage::Structure).unwrap_err();
        assert!(matches!(err, StageError::SchemaViolation { .. }));
    }

    #[tokio::test]
    async fn blank_text_structures_without_a_model_call() {
        let provider = Arc::new(MockAgentProvider::new());
        let structurer = LlmPageStructurer::new(provider.clone(), 0.0, 1024);

        let page = structurer.structure("  \n", 6).await.unwrap();
        assert_eq!(page.page_number, 6);
        assert!(page.sections.is_empty());
        assert_eq!(page.table_blocks().count(), 0);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn model_page_is_stamped_with_requested_number() {
        let provider = MockAgentProvider::new();
        provider
            .add_tool_response(
                "",
                vec![tool_call(
                    STRUCTURE_TOOL_NAME,
                    r#"{"page_number": 1, "has_tables": true, "table_count": 1,
                        "formatted_text": "[TABLE START]\n| A |\n|---|\n| 1 |\n[TABLE END]",
                        "sections": [{"type": "table", "content": "| A |\n|---|\n| 1 |", "position": "middle"}]}"#,
                )],
            )
            .await;
        let structurer = LlmPageStructurer::new(Arc::new(provider), 0.0, 1024);

        let page = structurer.structure("A\n1", 3).await.unwrap();
        assert_eq!(page.page_number, 3);
        assert_eq!(page.table_blocks().count(), 1);
    }

    #[tokio::test]
    async fn prose_answer_fails_the_structure_stage() {
        let provider = MockAgentProvider::new();
        provider.add_response("Here is your page.").await;
        let structurer = LlmPageStructurer::new(Arc::new(provider), 0.0, 1024);

        let err = structurer.structure("some text", 2).await.unwrap_err();
        assert!(matches!(
            err,
            StageError::SchemaViolation {
                stage: Stage::Structure,
                ..
            }
        ));
    }
}
