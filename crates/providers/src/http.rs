//! `HttpProviderClient`: a single OpenAI-compatible chat-completions
//! adapter. The upstream LLM endpoint is an external collaborator (§1) —
//! this adapter's only job is translating to and from its wire shape.

use std::time::Duration;

use futures_core::stream::BoxStream;
use ro_domain::error::{Error, Result};
use ro_domain::model::{Content, ItemRole, ToolDefinition, Usage};
use serde_json::Value;

use crate::sse::sse_response_stream;
use crate::traits::{ChatMessage, ChatRequest, ChatResponse, LlmProvider, StreamEvent, ToolCallRequest};
use crate::util::from_reqwest;

pub struct HttpProviderClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpProviderClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(from_reqwest)?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.post(url).header("content-type", "application/json");
        if let Some(key) = &self.api_key {
            builder = builder.header("authorization", format!("Bearer {key}"));
        }
        builder
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_body(&self, req: &ChatRequest, stream: bool) -> Value {
        let messages: Vec<Value> = req.messages.iter().map(msg_to_openai).collect();
        let mut body = serde_json::json!({
            "model": req.model,
            "messages": messages,
            "stream": stream,
        });
        if !req.tools.is_empty() {
            body["tools"] = Value::Array(req.tools.iter().map(tool_to_openai).collect());
        }
        if let Some(choice) = &req.tool_choice {
            body["tool_choice"] = Value::String(choice.clone());
        }
        if let Some(t) = req.temperature {
            body["temperature"] = serde_json::json!(t);
        }
        if let Some(p) = req.top_p {
            body["top_p"] = serde_json::json!(p);
        }
        if let Some(m) = req.max_output_tokens {
            body["max_tokens"] = serde_json::json!(m);
        }
        if !req.stop.is_empty() {
            body["stop"] = serde_json::json!(req.stop);
        }
        if stream {
            body["stream_options"] = serde_json::json!({"include_usage": true});
        }
        body
    }
}

fn role_to_str(role: ItemRole) -> &'static str {
    match role {
        ItemRole::System => "system",
        ItemRole::User => "user",
        ItemRole::Assistant => "assistant",
        ItemRole::Tool => "tool",
    }
}

fn extract_text(content: &[Content]) -> Option<String> {
    let joined: Vec<&str> = content
        .iter()
        .filter_map(|c| match c {
            Content::Text { text } | Content::InputText { text } | Content::OutputText { text } => {
                Some(text.as_str())
            }
            _ => None,
        })
        .collect();
    if joined.is_empty() {
        None
    } else {
        Some(joined.join("\n"))
    }
}

fn msg_to_openai(msg: &ChatMessage) -> Value {
    if let Some(Content::FunctionCallOutput { call_id, output, error }) =
        msg.content.iter().find(|c| matches!(c, Content::FunctionCallOutput { .. }))
    {
        let content = error.clone().unwrap_or_else(|| output.to_string());
        return serde_json::json!({
            "role": "tool",
            "tool_call_id": call_id,
            "content": content,
        });
    }

    let tool_calls: Vec<Value> = msg
        .content
        .iter()
        .filter_map(|c| match c {
            Content::FunctionCall { call_id, name, arguments } => Some(serde_json::json!({
                "id": call_id,
                "type": "function",
                "function": { "name": name, "arguments": arguments.to_string() },
            })),
            _ => None,
        })
        .collect();

    let role = msg.role.map(role_to_str).unwrap_or("user");
    let mut obj = serde_json::json!({ "role": role });
    match extract_text(&msg.content) {
        Some(text) => obj["content"] = Value::String(text),
        None if tool_calls.is_empty() => obj["content"] = Value::String(String::new()),
        None => obj["content"] = Value::Null,
    }
    if !tool_calls.is_empty() {
        obj["tool_calls"] = Value::Array(tool_calls);
    }
    obj
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

fn parse_usage(v: &Value) -> Option<Usage> {
    Some(Usage {
        input_tokens: v.get("prompt_tokens")?.as_u64()? as u32,
        output_tokens: v.get("completion_tokens")?.as_u64()? as u32,
        total_tokens: v.get("total_tokens")?.as_u64()? as u32,
    })
}

fn parse_tool_calls(message: &Value) -> Vec<ToolCallRequest> {
    let Some(arr) = message.get("tool_calls").and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    arr.iter()
        .filter_map(|tc| {
            let call_id = tc.get("id")?.as_str()?.to_string();
            let func = tc.get("function")?;
            let name = func.get("name")?.as_str()?.to_string();
            let args_str = func.get("arguments")?.as_str().unwrap_or("{}");
            let arguments: Value = serde_json::from_str(args_str).unwrap_or_else(|_| serde_json::json!({"raw": args_str}));
            Some(ToolCallRequest { call_id, name, arguments })
        })
        .collect()
}

fn parse_chat_response(body: &Value) -> Result<ChatResponse> {
    let choice = body
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .ok_or_else(|| Error::external("provider response had no choices"))?;
    let message = choice
        .get("message")
        .ok_or_else(|| Error::external("provider choice had no message"))?;

    let text = message.get("content").and_then(|v| v.as_str()).unwrap_or("");
    let content = if text.is_empty() {
        Vec::new()
    } else {
        vec![Content::text(text)]
    };

    let finish_reason = choice
        .get("finish_reason")
        .and_then(|v| v.as_str())
        .unwrap_or("stop")
        .to_string();

    Ok(ChatResponse {
        content,
        tool_calls: parse_tool_calls(message),
        usage: body.get("usage").and_then(parse_usage),
        finish_reason,
    })
}

fn parse_sse_data_vec(data: &str) -> Vec<Result<StreamEvent>> {
    if data.trim() == "[DONE]" {
        return vec![Ok(StreamEvent::Done { usage: None, finish_reason: "stop".into() })];
    }
    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return vec![Err(Error::external(format!("bad SSE payload: {e}")))],
    };

    let choice = v.get("choices").and_then(|c| c.as_array()).and_then(|a| a.first());
    let Some(choice) = choice else {
        return match v.get("usage").and_then(parse_usage) {
            Some(usage) => vec![Ok(StreamEvent::Done { usage: Some(usage), finish_reason: "stop".into() })],
            None => Vec::new(),
        };
    };

    let delta = choice.get("delta").unwrap_or(&Value::Null);

    if let Some(fr) = choice.get("finish_reason").and_then(|f| f.as_str()) {
        let usage = v.get("usage").and_then(parse_usage);
        return vec![Ok(StreamEvent::Done { usage, finish_reason: fr.to_string() })];
    }

    if let Some(tc_arr) = delta.get("tool_calls").and_then(|v| v.as_array()) {
        let mut out = Vec::new();
        for tc in tc_arr {
            let idx = tc.get("index").and_then(|v| v.as_u64()).unwrap_or(0).to_string();
            if let Some(id) = tc.get("id").and_then(|v| v.as_str()) {
                let name = tc
                    .get("function")
                    .and_then(|f| f.get("name"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string();
                out.push(Ok(StreamEvent::ToolCallStarted { call_id: id.to_string(), name }));
            }
            if let Some(args) = tc.get("function").and_then(|f| f.get("arguments")).and_then(|v| v.as_str()) {
                out.push(Ok(StreamEvent::ToolCallDelta { call_id: idx, delta: args.to_string() }));
            }
        }
        return out;
    }

    if let Some(text) = delta.get("content").and_then(|v| v.as_str()) {
        if !text.is_empty() {
            return vec![Ok(StreamEvent::Token { text: text.to_string() })];
        }
    }

    Vec::new()
}

#[async_trait::async_trait]
impl LlmProvider for HttpProviderClient {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse> {
        let body = self.build_body(&req, false);
        let resp = self.authed_post(&self.chat_url()).json(&body).send().await.map_err(from_reqwest)?;
        let status = resp.status();
        let text = resp.text().await.map_err(from_reqwest)?;
        if !status.is_success() {
            return Err(Error::external(format!("provider HTTP {} - {text}", status.as_u16())));
        }
        let json: Value = serde_json::from_str(&text)?;
        parse_chat_response(&json)
    }

    async fn chat_stream(&self, req: ChatRequest) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let body = self.build_body(&req, true);
        let resp = self.authed_post(&self.chat_url()).json(&body).send().await.map_err(from_reqwest)?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.map_err(from_reqwest)?;
            return Err(Error::external(format!("provider HTTP {} - {text}", status.as_u16())));
        }
        Ok(sse_response_stream(resp, parse_sse_data_vec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_plain_text_completion() {
        let body = serde_json::json!({
            "choices": [{"message": {"content": "hi there"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12},
        });
        let resp = parse_chat_response(&body).unwrap();
        assert_eq!(resp.finish_reason, "stop");
        assert!(matches!(&resp.content[0], Content::Text { text } if text == "hi there"));
        assert_eq!(resp.usage.unwrap().total_tokens, 12);
    }

    #[test]
    fn parses_tool_calls_from_completion() {
        let body = serde_json::json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{"id": "call_1", "type": "function", "function": {"name": "search", "arguments": "{\"q\":\"rust\"}"}}],
                },
                "finish_reason": "tool_calls",
            }],
        });
        let resp = parse_chat_response(&body).unwrap();
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].name, "search");
    }

    #[test]
    fn tool_result_message_is_encoded_by_call_id() {
        let msg = ChatMessage::new(
            Some(ItemRole::Tool),
            vec![Content::FunctionCallOutput {
                call_id: "call_1".into(),
                output: serde_json::json!({"ok": true}),
                error: None,
            }],
        );
        let v = msg_to_openai(&msg);
        assert_eq!(v["role"], "tool");
        assert_eq!(v["tool_call_id"], "call_1");
    }

    #[test]
    fn done_sentinel_is_recognised() {
        let events = parse_sse_data_vec("[DONE]");
        assert!(matches!(events[0], Ok(StreamEvent::Done { .. })));
    }
}
