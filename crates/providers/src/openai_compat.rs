//! OpenAI-compatible chat-completions adapter.
//!
//! Targets any provider that speaks the `/v1/chat/completions` wire format
//! (OpenAI itself, and the many self-hosted/local servers that mirror it):
//! a flat `messages` array with `role`/`content`, `tools`/`tool_calls`
//! function-calling, and SSE streaming via `choices[0].delta`.

use crate::traits::{
    ChatRequest, ChatResponse, EmbeddingsRequest, EmbeddingsResponse, LlmProvider,
};
use crate::util::{from_reqwest, resolve_api_key};
use beto_domain::capability::LlmCapabilities;
use beto_domain::config::ProviderConfig;
use beto_domain::error::{Error, Result};
use beto_domain::stream::{BoxStream, StreamEvent, Usage};
use beto_domain::tool::{ContentPart, Message, MessageContent, Role, ToolCall, ToolDefinition};
use serde_json::Value;

/// An LLM provider adapter for OpenAI-compatible chat-completions APIs.
pub struct OpenAiCompatProvider {
    id: String,
    base_url: String,
    api_key: String,
    auth_header: String,
    auth_prefix: String,
    default_model: String,
    capabilities: LlmCapabilities,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        let api_key = resolve_api_key(&cfg.auth)?;
        let auth_header = cfg.auth.header.clone().unwrap_or_else(|| "Authorization".into());
        let auth_prefix = cfg.auth.prefix.clone().unwrap_or_else(|| "Bearer ".into());
        let default_model = cfg.default_model.clone().unwrap_or_else(|| "gpt-4o-mini".into());

        let capabilities = LlmCapabilities {
            supports_tools: beto_domain::capability::ToolSupport::Basic,
            supports_streaming: true,
            supports_json_mode: true,
            supports_vision: true,
            context_window_tokens: Some(128_000),
            max_output_tokens: Some(4_096),
        };

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: cfg.id.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            auth_header,
            auth_prefix,
            default_model,
            capabilities,
            client,
        })
    }

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header(self.auth_header.as_str(), format!("{}{}", self.auth_prefix, self.api_key))
            .header("Content-Type", "application/json")
    }

    fn build_chat_body(&self, req: &ChatRequest, stream: bool) -> Value {
        let model = req.model.clone().unwrap_or_else(|| self.default_model.clone());

        let messages: Vec<Value> = req.messages.iter().map(msg_to_openai).collect();

        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "stream": stream,
        });

        if !req.tools.is_empty() {
            let tools: Vec<Value> = req.tools.iter().map(tool_to_openai).collect();
            body["tools"] = Value::Array(tools);
        }
        if let Some(temp) = req.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        if let Some(max_tokens) = req.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if req.json_mode {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }
        if stream {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }

        body
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message serialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn msg_to_openai(msg: &Message) -> Value {
    let role = match msg.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };

    match msg.role {
        Role::Tool => tool_result_to_openai(msg),
        Role::Assistant => assistant_msg_to_openai(msg),
        _ => serde_json::json!({
            "role": role,
            "content": msg.content.extract_all_text(),
        }),
    }
}

fn assistant_msg_to_openai(msg: &Message) -> Value {
    match &msg.content {
        MessageContent::Text(t) => serde_json::json!({
            "role": "assistant",
            "content": t,
        }),
        MessageContent::Parts(parts) => {
            let text = msg.content.extract_all_text();
            let tool_calls: Vec<Value> = parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::ToolUse { id, name, input } => Some(serde_json::json!({
                        "id": id,
                        "type": "function",
                        "function": {
                            "name": name,
                            "arguments": input.to_string(),
                        }
                    })),
                    _ => None,
                })
                .collect();

            let mut body = serde_json::json!({
                "role": "assistant",
                "content": if text.is_empty() { Value::Null } else { Value::String(text) },
            });
            if !tool_calls.is_empty() {
                body["tool_calls"] = Value::Array(tool_calls);
            }
            body
        }
    }
}

fn tool_result_to_openai(msg: &Message) -> Value {
    match &msg.content {
        MessageContent::Parts(parts) => {
            let part = parts.iter().find_map(|p| match p {
                ContentPart::ToolResult { tool_use_id, content, .. } => {
                    Some((tool_use_id.clone(), content.clone()))
                }
                _ => None,
            });
            match part {
                Some((tool_call_id, content)) => serde_json::json!({
                    "role": "tool",
                    "tool_call_id": tool_call_id,
                    "content": content,
                }),
                None => serde_json::json!({
                    "role": "tool",
                    "tool_call_id": "",
                    "content": msg.content.extract_all_text(),
                }),
            }
        }
        MessageContent::Text(t) => serde_json::json!({
            "role": "tool",
            "tool_call_id": "",
            "content": t,
        }),
    }
}

fn tool_to_openai(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response deserialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_openai_response(body: &Value) -> Result<ChatResponse> {
    let choice = body
        .get("choices")
        .and_then(|v| v.as_array())
        .and_then(|a| a.first())
        .ok_or_else(|| Error::Provider {
            provider: "openai_compat".into(),
            message: "response had no choices".into(),
        })?;

    let message = choice.get("message").cloned().unwrap_or(Value::Null);

    let content = message
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let tool_calls: Vec<ToolCall> = message
        .get("tool_calls")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(parse_openai_tool_call).collect())
        .unwrap_or_default();

    let model = body
        .get("model")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();

    let finish_reason = choice
        .get("finish_reason")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let usage = body.get("usage").and_then(parse_openai_usage);

    Ok(ChatResponse {
        content,
        tool_calls,
        usage,
        model,
        finish_reason,
    })
}

fn parse_openai_tool_call(v: &Value) -> Option<ToolCall> {
    let call_id = v.get("id")?.as_str()?.to_string();
    let function = v.get("function")?;
    let tool_name = function.get("name")?.as_str()?.to_string();
    let args_str = function.get("arguments").and_then(|v| v.as_str()).unwrap_or("{}");
    let arguments: Value = serde_json::from_str(args_str).unwrap_or(Value::Object(Default::default()));
    Some(ToolCall { call_id, tool_name, arguments })
}

fn parse_openai_usage(v: &Value) -> Option<Usage> {
    let prompt = v.get("prompt_tokens")?.as_u64()? as u32;
    let completion = v.get("completion_tokens")?.as_u64()? as u32;
    let total = v
        .get("total_tokens")
        .and_then(|v| v.as_u64())
        .map(|t| t as u32)
        .unwrap_or(prompt + completion);
    Some(Usage {
        prompt_tokens: prompt,
        completion_tokens: completion,
        total_tokens: total,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Streaming SSE helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Internal state for assembling tool calls from streamed deltas, keyed by
/// the `tool_calls[].index` field the API uses to address each call.
struct StreamState {
    active_tool_calls: std::collections::HashMap<u64, (String, String, String)>,
    usage: Option<Usage>,
    done_emitted: bool,
}

impl StreamState {
    fn new() -> Self {
        Self {
            active_tool_calls: std::collections::HashMap::new(),
            usage: None,
            done_emitted: false,
        }
    }
}

fn parse_openai_sse(data: &str, state: &mut StreamState) -> Vec<Result<StreamEvent>> {
    let mut events = Vec::new();

    if data == "[DONE]" {
        if !state.done_emitted {
            state.done_emitted = true;
            events.push(Ok(StreamEvent::Done {
                usage: state.usage.clone(),
                finish_reason: Some("stop".into()),
            }));
        }
        return events;
    }

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            events.push(Err(Error::Json(e)));
            return events;
        }
    };

    if let Some(usage) = v.get("usage").and_then(parse_openai_usage) {
        state.usage = Some(usage);
    }

    let Some(choice) = v.get("choices").and_then(|c| c.as_array()).and_then(|a| a.first()) else {
        return events;
    };

    if let Some(delta) = choice.get("delta") {
        if let Some(text) = delta.get("content").and_then(|v| v.as_str()) {
            if !text.is_empty() {
                events.push(Ok(StreamEvent::Token { text: text.to_string() }));
            }
        }

        if let Some(tool_calls) = delta.get("tool_calls").and_then(|v| v.as_array()) {
            for tc in tool_calls {
                let idx = tc.get("index").and_then(|v| v.as_u64()).unwrap_or(0);
                let id = tc.get("id").and_then(|v| v.as_str());
                let function = tc.get("function");
                let name = function.and_then(|f| f.get("name")).and_then(|v| v.as_str());
                let arg_chunk = function
                    .and_then(|f| f.get("arguments"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("");

                if let (Some(id), Some(name)) = (id, name) {
                    events.push(Ok(StreamEvent::ToolCallStarted {
                        call_id: id.to_string(),
                        tool_name: name.to_string(),
                    }));
                    state
                        .active_tool_calls
                        .insert(idx, (id.to_string(), name.to_string(), String::new()));
                }

                if !arg_chunk.is_empty() {
                    if let Some(entry) = state.active_tool_calls.get_mut(&idx) {
                        entry.2.push_str(arg_chunk);
                        events.push(Ok(StreamEvent::ToolCallDelta {
                            call_id: entry.0.clone(),
                            delta: arg_chunk.to_string(),
                        }));
                    }
                }
            }
        }
    }

    if let Some(finish_reason) = choice.get("finish_reason").and_then(|v| v.as_str()) {
        for (_, (call_id, tool_name, args_str)) in state.active_tool_calls.drain() {
            let arguments: Value =
                serde_json::from_str(&args_str).unwrap_or(Value::Object(Default::default()));
            events.push(Ok(StreamEvent::ToolCallFinished { call_id, tool_name, arguments }));
        }
        state.done_emitted = true;
        events.push(Ok(StreamEvent::Done {
            usage: state.usage.clone(),
            finish_reason: Some(finish_reason.to_string()),
        }));
    }

    events
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_chat_body(&req, false);

        tracing::debug!(provider = %self.id, url = %url, "openai-compat chat request");

        let resp = self.authed_post(&url).json(&body).send().await.map_err(from_reqwest)?;
        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(Error::Provider {
                provider: self.id.clone(),
                message: format!("HTTP {} - {}", status.as_u16(), resp_text),
            });
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        parse_openai_response(&resp_json)
    }

    async fn chat_stream(&self, req: ChatRequest) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_chat_body(&req, true);
        let provider_id = self.id.clone();

        tracing::debug!(provider = %self.id, url = %url, "openai-compat stream request");

        let resp = self.authed_post(&url).json(&body).send().await.map_err(from_reqwest)?;
        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().await.map_err(from_reqwest)?;
            return Err(Error::Provider {
                provider: provider_id,
                message: format!("HTTP {} - {}", status.as_u16(), err_text),
            });
        }

        let mut state = StreamState::new();
        Ok(crate::sse::sse_response_stream(resp, move |data| parse_openai_sse(data, &mut state)))
    }

    async fn embeddings(&self, req: EmbeddingsRequest) -> Result<EmbeddingsResponse> {
        let url = format!("{}/embeddings", self.base_url);
        let model = req.model.unwrap_or_else(|| "text-embedding-3-small".into());
        let body = serde_json::json!({ "model": model, "input": req.input });

        let resp = self.authed_post(&url).json(&body).send().await.map_err(from_reqwest)?;
        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(Error::Provider {
                provider: self.id.clone(),
                message: format!("HTTP {} - {}", status.as_u16(), resp_text),
            });
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        let embeddings: Vec<Vec<f32>> = resp_json
            .get("data")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|item| item.get("embedding"))
                    .filter_map(|e| e.as_array())
                    .map(|vals| vals.iter().filter_map(|v| v.as_f64()).map(|f| f as f32).collect())
                    .collect()
            })
            .unwrap_or_default();

        Ok(EmbeddingsResponse { embeddings })
    }

    fn capabilities(&self) -> &LlmCapabilities {
        &self.capabilities
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
