//! Google Gemini backend over the Generative Language REST API.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{ChatResponse, LlmProvider, Message, Role, ToolDefinition, ToolUseRequest};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const PROVIDER: &str = "gemini";

/// Finish reasons that mean the candidate was withheld rather than completed.
const BLOCKING_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "RECITATION",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "SPII",
    "IMAGE_SAFETY",
];

/// Schema keywords the function-declaration validator rejects.
const UNSUPPORTED_SCHEMA_KEYS: &[&str] = &[
    "$schema",
    "$defs",
    "definitions",
    "title",
    "additionalProperties",
];

#[derive(Clone)]
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    embedding_model: Option<String>,
    max_output_tokens: u32,
}

impl fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish()
    }
}

impl GeminiProvider {
    #[must_use]
    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        embedding_model: Option<String>,
        max_output_tokens: u32,
    ) -> Self {
        Self {
            client: crate::http::default_client(),
            api_key,
            base_url: crate::http::trim_base_url(base_url),
            model: strip_model_prefix(&model).to_owned(),
            embedding_model: embedding_model.map(|m| strip_model_prefix(&m).to_owned()),
            max_output_tokens,
        }
    }

    async fn generate(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        json_mode: bool,
    ) -> Result<ChatResponse, LlmError> {
        let (system_instruction, contents) = convert_messages(messages);
        let function_declarations: Vec<FunctionDeclaration> = tools
            .iter()
            .map(|t| FunctionDeclaration {
                name: &t.name,
                description: &t.description,
                parameters: sanitize_schema(&t.parameters),
            })
            .collect();

        let body = GenerateContentRequest {
            contents,
            system_instruction,
            tools: if function_declarations.is_empty() {
                Vec::new()
            } else {
                vec![ToolSet {
                    function_declarations,
                }]
            },
            generation_config: GenerationConfig {
                max_output_tokens: self.max_output_tokens,
                response_mime_type: json_mode.then_some("application/json"),
            },
        };

        let response = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }

        if !status.is_success() {
            tracing::error!("Gemini API error {status}: {text}");
            return Err(LlmError::Other(format!(
                "Gemini API request failed (status {status})"
            )));
        }

        let resp: GenerateContentResponse = serde_json::from_str(&text)?;
        interpret_response(resp)
    }

    async fn generate_text(&self, messages: &[Message], json_mode: bool) -> Result<String, LlmError> {
        match self.generate(messages, &[], json_mode).await? {
            ChatResponse::Text(text) => Ok(text),
            ChatResponse::ToolUse { text, .. } => text.ok_or(LlmError::EmptyResponse {
                provider: PROVIDER.into(),
            }),
        }
    }
}

impl LlmProvider for GeminiProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.generate_text(messages, false).await
    }

    async fn chat_json(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.generate_text(messages, true).await
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let model = self
            .embedding_model
            .as_deref()
            .ok_or(LlmError::EmbedUnsupported {
                provider: PROVIDER.into(),
            })?;

        let body = EmbedContentRequest {
            content: Content {
                role: None,
                parts: vec![Part::text(text)],
            },
        };

        let response = self
            .client
            .post(format!("{}/models/{model}:embedContent", self.base_url))
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }

        if !status.is_success() {
            tracing::error!("Gemini embedding API error {status}: {text}");
            return Err(LlmError::Other(format!(
                "Gemini embedding request failed (status {status})"
            )));
        }

        let resp: EmbedContentResponse = serde_json::from_str(&text)?;
        if resp.embedding.values.is_empty() {
            return Err(LlmError::EmptyResponse {
                provider: PROVIDER.into(),
            });
        }
        Ok(resp.embedding.values)
    }

    fn supports_embeddings(&self) -> bool {
        self.embedding_model.is_some()
    }

    fn supports_tool_use(&self) -> bool {
        true
    }

    async fn chat_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse, LlmError> {
        self.generate(messages, tools, false).await
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        PROVIDER
    }
}

fn strip_model_prefix(model: &str) -> &str {
    model.strip_prefix("models/").unwrap_or(model)
}

fn interpret_response(resp: GenerateContentResponse) -> Result<ChatResponse, LlmError> {
    let Some(candidate) = resp.candidates.into_iter().next() else {
        if let Some(reason) = resp.prompt_feedback.and_then(|f| f.block_reason) {
            tracing::error!("Gemini prompt was blocked: {reason}");
            return Err(LlmError::Blocked {
                provider: PROVIDER.into(),
                reason,
            });
        }
        return Err(LlmError::EmptyResponse {
            provider: PROVIDER.into(),
        });
    };

    if let Some(reason) = candidate
        .finish_reason
        .as_deref()
        .filter(|r| BLOCKING_FINISH_REASONS.contains(r))
    {
        tracing::error!("Gemini response finished with reason: {reason}");
        return Err(LlmError::Blocked {
            provider: PROVIDER.into(),
            reason: reason.to_owned(),
        });
    }

    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for part in parts {
        if let Some(t) = part.text {
            text.push_str(&t);
        }
        if let Some(call) = part.function_call {
            let id = call
                .id
                .unwrap_or_else(|| format!("{}_{}", call.name, tool_calls.len()));
            tool_calls.push(ToolUseRequest {
                id,
                name: call.name,
                input: call.args,
            });
        }
    }

    if !tool_calls.is_empty() {
        return Ok(ChatResponse::ToolUse {
            text: (!text.is_empty()).then_some(text),
            tool_calls,
        });
    }

    if text.is_empty() {
        return Err(LlmError::EmptyResponse {
            provider: PROVIDER.into(),
        });
    }

    Ok(ChatResponse::Text(text))
}

/// Split out system messages into `systemInstruction` and map the rest onto
/// Gemini's `user`/`model` turns.
fn convert_messages(messages: &[Message]) -> (Option<Content>, Vec<Content>) {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    let system_instruction = (!system.is_empty()).then(|| Content {
        role: None,
        parts: vec![Part::text(system.join("\n\n"))],
    });

    let contents = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|msg| {
            let mut parts = Vec::new();
            if !msg.content.is_empty() {
                parts.push(Part::text(&msg.content));
            }
            for (_, name, input) in msg.tool_uses() {
                parts.push(Part {
                    function_call: Some(FunctionCall {
                        id: None,
                        name: name.to_owned(),
                        args: input.clone(),
                    }),
                    ..Part::default()
                });
            }
            for (_, name, content) in msg.tool_results() {
                let response = serde_json::from_str::<serde_json::Value>(content)
                    .unwrap_or_else(|_| serde_json::Value::String(content.to_owned()));
                parts.push(Part {
                    function_response: Some(FunctionResponse {
                        name: name.to_owned(),
                        response: serde_json::json!({ "content": response }),
                    }),
                    ..Part::default()
                });
            }
            Content {
                role: Some(if msg.role == Role::Assistant {
                    "model"
                } else {
                    "user"
                }),
                parts,
            }
        })
        .collect();

    (system_instruction, contents)
}

/// Drop JSON-schema keywords that function declarations do not accept.
fn sanitize_schema(schema: &serde_json::Value) -> serde_json::Value {
    match schema {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .filter(|(k, _)| !UNSUPPORTED_SCHEMA_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), sanitize_schema(v)))
                .collect(),
        ),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(sanitize_schema).collect())
        }
        other => other.clone(),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolSet<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolSet<'a> {
    function_declarations: Vec<FunctionDeclaration<'a>>,
}

#[derive(Serialize)]
struct FunctionDeclaration<'a> {
    name: &'a str,
    description: &'a str,
    parameters: serde_json::Value,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none", skip_deserializing)]
    role: Option<&'static str>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

#[derive(Serialize, Deserialize)]
struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Serialize)]
struct EmbedContentRequest {
    content: Content,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    #[serde(default)]
    values: Vec<f32>,
}
