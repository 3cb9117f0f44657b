use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{ChatResponse, LlmProvider, Message, Role, ToolDefinition, ToolUseRequest};

const PROVIDER: &str = "openai";

#[derive(Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    embedding_model: Option<String>,
}

impl fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("embedding_model", &self.embedding_model)
            .finish()
    }
}

impl OpenAiProvider {
    #[must_use]
    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        max_tokens: u32,
        embedding_model: Option<String>,
    ) -> Self {
        Self {
            client: crate::http::default_client(),
            api_key,
            base_url: crate::http::trim_base_url(base_url),
            model,
            max_tokens,
            embedding_model,
        }
    }

    /// POST `body` to `{base_url}/{endpoint}` and return the raw success body.
    async fn post(&self, endpoint: &str, body: &impl Serialize) -> Result<String, LlmError> {
        let response = self
            .client
            .post(format!("{}/{endpoint}", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            tracing::error!(endpoint, "OpenAI API error {status}: {text}");
            return Err(LlmError::Other(format!(
                "OpenAI {endpoint} request failed (status {status})"
            )));
        }
        Ok(text)
    }

    async fn send_request(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        json_mode: bool,
    ) -> Result<ChatResponse, LlmError> {
        let api_messages = convert_messages(messages);
        let api_tools: Vec<OpenAiTool<'_>> = tools
            .iter()
            .map(|t| OpenAiTool {
                r#type: "function",
                function: OpenAiFunction {
                    name: &t.name,
                    description: &t.description,
                    parameters: &t.parameters,
                },
            })
            .collect();

        let body = ChatRequest {
            model: &self.model,
            messages: &api_messages,
            max_tokens: self.max_tokens,
            tools: api_tools,
            response_format: json_mode.then_some(ResponseFormat {
                r#type: "json_object",
            }),
        };

        let text = self.post("chat/completions", &body).await?;
        let resp: OpenAiChatResponse = serde_json::from_str(&text)?;
        interpret_response(resp)
    }

    async fn send_text(&self, messages: &[Message], json_mode: bool) -> Result<String, LlmError> {
        match self.send_request(messages, &[], json_mode).await? {
            ChatResponse::Text(text) => Ok(text),
            ChatResponse::ToolUse { text, .. } => text.ok_or(LlmError::EmptyResponse {
                provider: PROVIDER.into(),
            }),
        }
    }
}

impl LlmProvider for OpenAiProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.send_text(messages, false).await
    }

    async fn chat_json(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.send_text(messages, true).await
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let model = self
            .embedding_model
            .as_deref()
            .ok_or(LlmError::EmbedUnsupported {
                provider: PROVIDER.into(),
            })?;

        let body = EmbeddingRequest { input: text, model };

        let text = self.post("embeddings", &body).await?;
        let resp: EmbeddingResponse = serde_json::from_str(&text)?;

        resp.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or(LlmError::EmptyResponse {
                provider: PROVIDER.into(),
            })
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
        self.send_request(messages, tools, false).await
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        PROVIDER
    }
}

fn interpret_response(resp: OpenAiChatResponse) -> Result<ChatResponse, LlmError> {
    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or(LlmError::EmptyResponse {
            provider: PROVIDER.into(),
        })?;

    if let Some(refusal) = choice.message.refusal {
        tracing::error!("OpenAI refused the request: {refusal}");
        return Err(LlmError::Blocked {
            provider: PROVIDER.into(),
            reason: refusal,
        });
    }

    if choice.finish_reason.as_deref() == Some("content_filter") {
        tracing::error!("OpenAI response was cut by the content filter");
        return Err(LlmError::Blocked {
            provider: PROVIDER.into(),
            reason: "content_filter".into(),
        });
    }

    let content = choice.message.content.unwrap_or_default();

    if let Some(tool_calls) = choice.message.tool_calls
        && !tool_calls.is_empty()
    {
        let calls = tool_calls
            .into_iter()
            .map(|tc| {
                let input = serde_json::from_str(&tc.function.arguments)
                    .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));
                ToolUseRequest {
                    id: tc.id,
                    name: tc.function.name,
                    input,
                }
            })
            .collect();
        return Ok(ChatResponse::ToolUse {
            text: (!content.is_empty()).then_some(content),
            tool_calls: calls,
        });
    }

    if content.is_empty() {
        return Err(LlmError::EmptyResponse {
            provider: PROVIDER.into(),
        });
    }

    Ok(ChatResponse::Text(content))
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// Assistant tool calls ride on the assistant message; tool results become
/// one `role: "tool"` message each.
fn convert_messages(messages: &[Message]) -> Vec<ApiMessage> {
    let mut result = Vec::with_capacity(messages.len());

    for msg in messages {
        let tool_calls: Vec<OpenAiToolCallOut> = msg
            .tool_uses()
            .map(|(id, name, input)| OpenAiToolCallOut {
                id: id.to_owned(),
                r#type: "function",
                function: OpenAiFunctionCall {
                    name: name.to_owned(),
                    arguments: serde_json::to_string(input).unwrap_or_default(),
                },
            })
            .collect();

        let mut results = msg.tool_results().peekable();
        if results.peek().is_some() {
            for (tool_use_id, _, content) in results {
                result.push(ApiMessage {
                    role: "tool",
                    content: content.to_owned(),
                    tool_calls: None,
                    tool_call_id: Some(tool_use_id.to_owned()),
                });
            }
            continue;
        }

        result.push(ApiMessage {
            role: role_str(msg.role),
            content: msg.content.clone(),
            tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            tool_call_id: None,
        });
    }

    result
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ApiMessage],
    max_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OpenAiTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    r#type: &'static str,
}

#[derive(Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAiToolCallOut>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize)]
struct OpenAiTool<'a> {
    r#type: &'static str,
    function: OpenAiFunction<'a>,
}

#[derive(Serialize)]
struct OpenAiFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Serialize)]
struct OpenAiToolCallOut {
    id: String,
    r#type: &'static str,
    function: OpenAiFunctionCall,
}

#[derive(Serialize)]
struct OpenAiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Deserialize)]
struct OpenAiToolCall {
    id: String,
    function: OpenAiToolCallFunction,
}

#[derive(Deserialize)]
struct OpenAiToolCallFunction {
    name: String,
    arguments: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::provider::MessagePart;

    fn test_provider(base_url: &str) -> OpenAiProvider {
        OpenAiProvider::new(
            "sk-test".into(),
            base_url.into(),
            "gpt-4o-mini".into(),
            1024,
            Some("text-embedding-3-small".into()),
        )
    }

    fn test_provider_no_embed() -> OpenAiProvider {
        OpenAiProvider::new(
            "sk-test".into(),
            "https://api.openai.com/v1".into(),
            "gpt-4o-mini".into(),
            1024,
            None,
        )
    }

    fn completion(content: &str) -> serde_json::Value {
        json!({
            "choices": [{
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }]
        })
    }

    #[test]
    fn debug_redacts_api_key() {
        let dbg = format!("{:?}", test_provider("http://localhost"));
        assert!(dbg.contains("<redacted>"));
        assert!(!dbg.contains("sk-test"));
    }

    #[test]
    fn convert_messages_maps_tool_round() {
        let messages = vec![
            Message::system("sys"),
            Message::new(Role::Assistant, "").with_parts(vec![MessagePart::ToolUse {
                id: "call_1".into(),
                name: "google_search".into(),
                input: json!({"query": "serde"}),
            }]),
            Message::user("").with_parts(vec![MessagePart::ToolResult {
                tool_use_id: "call_1".into(),
                name: "google_search".into(),
                content: "[]".into(),
            }]),
        ];
        let converted = convert_messages(&messages);
        assert_eq!(converted.len(), 3);
        assert_eq!(converted[0].role, "system");
        let calls = converted[1].tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.arguments, r#"{"query":"serde"}"#);
        assert_eq!(converted[2].role, "tool");
        assert_eq!(converted[2].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn interpret_content_filter_is_blocked() {
        let resp: OpenAiChatResponse = serde_json::from_value(json!({
            "choices": [{"message": {"content": null}, "finish_reason": "content_filter"}]
        }))
        .unwrap();
        assert!(interpret_response(resp).unwrap_err().is_blocked());
    }

    #[test]
    fn interpret_refusal_is_blocked() {
        let resp: OpenAiChatResponse = serde_json::from_value(json!({
            "choices": [{"message": {"content": null, "refusal": "no"}, "finish_reason": "stop"}]
        }))
        .unwrap();
        let err = interpret_response(resp).unwrap_err();
        assert!(matches!(err, LlmError::Blocked { ref reason, .. } if reason == "no"));
    }

    #[test]
    fn interpret_no_choices_is_empty() {
        let resp: OpenAiChatResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(matches!(
            interpret_response(resp),
            Err(LlmError::EmptyResponse { .. })
        ));
    }

    #[test]
    fn interpret_tool_calls_with_bad_arguments_default_to_object() {
        let resp: OpenAiChatResponse = serde_json::from_value(json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{"id": "c1", "type": "function", "function": {"name": "google_search", "arguments": "not json"}}]
                },
                "finish_reason": "tool_calls"
            }]
        }))
        .unwrap();
        let ChatResponse::ToolUse { tool_calls, text } = interpret_response(resp).unwrap() else {
            panic!("expected tool use");
        };
        assert!(text.is_none());
        assert_eq!(tool_calls[0].id, "c1");
        assert!(tool_calls[0].input.as_object().unwrap().is_empty());
    }

    #[tokio::test]
    async fn chat_sends_bearer_and_returns_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("hello")))
            .expect(1)
            .mount(&server)
            .await;

        let out = test_provider(&server.uri())
            .chat(&[Message::user("hi")])
            .await
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn chat_json_sets_response_format() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(
                json!({"response_format": {"type": "json_object"}}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(r#"{"a":1}"#)))
            .expect(1)
            .mount(&server)
            .await;

        let out = test_provider(&server.uri())
            .chat_json(&[Message::user("plan")])
            .await
            .unwrap();
        assert_eq!(out, r#"{"a":1}"#);
    }

    #[tokio::test]
    async fn chat_error_status_maps_to_other() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = test_provider(&server.uri())
            .chat(&[Message::user("hi")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("chat/completions request failed (status 401"));
    }

    #[tokio::test]
    async fn chat_rate_limit_surfaces_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("late")))
            .expect(0)
            .mount(&server)
            .await;

        let err = test_provider(&server.uri())
            .chat(&[Message::user("hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::RateLimited));
    }

    #[tokio::test]
    async fn embed_returns_first_vector() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(json!({"model": "text-embedding-3-small"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": [{"embedding": [0.5, 0.25]}]})),
            )
            .mount(&server)
            .await;

        let v = test_provider(&server.uri()).embed("text").await.unwrap();
        assert_eq!(v, vec![0.5, 0.25]);
    }

    #[tokio::test]
    async fn embed_without_model_returns_error() {
        let p = test_provider_no_embed();
        assert!(!p.supports_embeddings());
        let result = p.embed("test").await;
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("embedding not supported")
        );
    }
}
