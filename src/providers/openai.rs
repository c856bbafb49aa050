//! OpenAI-compatible chat completions, shared by OpenAI, Groq and Gemini.

use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{ConfigError, ModelError};
use crate::model::{ChatRequest, ChatResponse, Message, ToolCall, ToolSpec};
use crate::providers::http_errors::{Upstream, describe_request_error, truncate_body};

/// Resolved connection settings for one model provider.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Endpoint {
    pub fn from_config(cfg: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: cfg.model_base_url.trim_end_matches('/').to_string(),
            api_key: cfg.model_api_key()?.to_string(),
            model: cfg.model.clone(),
            timeout_secs: cfg.model_timeout_secs,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(self.timeout_secs))
    }
}

#[derive(Debug, Serialize)]
struct WireChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: WireFunctionSpec<'a>,
}

#[derive(Debug, Serialize)]
struct WireFunctionSpec<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Deserialize)]
struct WireChatResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireModelList {
    data: Vec<WireModelEntry>,
}

#[derive(Debug, Deserialize)]
struct WireModelEntry {
    id: String,
}

fn to_wire_messages(messages: &[Message]) -> Vec<WireMessage<'_>> {
    messages
        .iter()
        .map(|msg| WireMessage {
            role: msg.role.as_str(),
            content: msg.content.as_deref(),
            tool_calls: msg
                .tool_calls
                .iter()
                .map(|call| WireToolCall {
                    id: call.id.clone(),
                    call_type: function_type(),
                    function: WireFunctionCall {
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    },
                })
                .collect(),
            tool_call_id: msg.tool_call_id.as_deref(),
        })
        .collect()
}

fn to_wire_tools(tools: &[ToolSpec]) -> Vec<WireTool<'_>> {
    tools
        .iter()
        .map(|tool| WireTool {
            tool_type: "function",
            function: WireFunctionSpec {
                name: tool.name,
                description: tool.description,
                parameters: &tool.parameters,
            },
        })
        .collect()
}

fn from_wire_response(parsed: WireChatResponse) -> Result<ChatResponse, ModelError> {
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or(ModelError::EmptyResponse)?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| ToolCall {
            id: call.id,
            name: call.function.name,
            arguments: call.function.arguments,
        })
        .collect();

    Ok(ChatResponse {
        content: choice.message.content,
        tool_calls,
    })
}

async fn send(
    builder: RequestBuilder,
    endpoint: &Endpoint,
    api_url: &str,
) -> Result<String, ModelError> {
    let response = endpoint.authorized(builder).send().await.map_err(|err| {
        warn!(
            api_url = %api_url,
            model = %endpoint.model,
            error = %err,
            "model request failed"
        );
        ModelError::Request(describe_request_error(
            &err,
            Upstream::Model,
            api_url,
            endpoint.timeout_secs,
        ))
    })?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| ModelError::Request(format!("Failed to read model response body: {err}")))?;

    if !status.is_success() {
        warn!(
            api_url = %api_url,
            model = %endpoint.model,
            status = %status,
            response_body_len = body.len(),
            "model API returned non-success status"
        );
        return Err(ModelError::Status {
            status: status.as_u16(),
            body: truncate_body(&body),
        });
    }

    Ok(body)
}

pub async fn chat(
    client: &Client,
    endpoint: &Endpoint,
    request: &ChatRequest,
) -> Result<ChatResponse, ModelError> {
    let api_url = endpoint.url("chat/completions");
    let body = WireChatRequest {
        model: &endpoint.model,
        messages: to_wire_messages(&request.messages),
        tools: to_wire_tools(&request.tools),
        tool_choice: (!request.tools.is_empty()).then(|| request.tool_choice.as_str()),
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        stream: false,
    };
    debug!(
        api_url = %api_url,
        model = %endpoint.model,
        message_count = request.messages.len(),
        tool_count = request.tools.len(),
        "sending chat completion request"
    );

    let raw = send(client.post(&api_url).json(&body), endpoint, &api_url).await?;
    let parsed: WireChatResponse = serde_json::from_str(&raw)
        .map_err(|err| ModelError::InvalidResponse(err.to_string()))?;
    let response = from_wire_response(parsed)?;
    debug!(
        model = %endpoint.model,
        response_len = response.content.as_deref().map_or(0, str::len),
        tool_call_count = response.tool_calls.len(),
        "received chat completion response"
    );
    Ok(response)
}

pub async fn list_models(client: &Client, endpoint: &Endpoint) -> Result<Vec<String>, ModelError> {
    let api_url = endpoint.url("models");
    debug!(api_url = %api_url, "listing models");

    let raw = send(client.get(&api_url), endpoint, &api_url).await?;
    let parsed: WireModelList = serde_json::from_str(&raw)
        .map_err(|err| ModelError::InvalidResponse(err.to_string()))?;
    let mut ids: Vec<String> = parsed.data.into_iter().map(|entry| entry.id).collect();
    ids.sort();
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use reqwest::Client;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{Endpoint, chat, list_models};
    use crate::config::test_config;
    use crate::error::{ConfigError, ModelError};
    use crate::model::{ChatRequest, Message, ToolCall, ToolChoice, ToolSpec};

    fn endpoint_for(server: &MockServer) -> Endpoint {
        Endpoint::from_config(&test_config(&format!("{}/v1/", server.uri())))
            .expect("endpoint should resolve")
    }

    #[test]
    fn from_config_requires_model_api_key() {
        let mut cfg = test_config("http://localhost");
        cfg.model_api_key = None;
        let err = Endpoint::from_config(&cfg).expect_err("key is missing");
        assert!(matches!(err, ConfigError::MissingCredential { .. }));
    }

    #[test]
    fn from_config_trims_trailing_slash() {
        let endpoint = Endpoint::from_config(&test_config("http://localhost:8080/v1/"))
            .expect("endpoint should resolve");
        assert_eq!(
            endpoint.url("chat/completions"),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[tokio::test]
    async fn chat_sends_model_messages_and_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer model-key"))
            .and(body_partial_json(json!({
                "model": "test-model",
                "stream": false,
                "messages": [
                    { "role": "system", "content": "sys" },
                    { "role": "user", "content": "Is it raining in Oslo?" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [
                    { "message": { "role": "assistant", "content": "It is dry in Oslo." } }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request = ChatRequest::new(vec![
            Message::system("sys"),
            Message::user("Is it raining in Oslo?"),
        ]);
        let response = chat(&Client::new(), &endpoint_for(&server), &request)
            .await
            .expect("chat should succeed");

        assert_eq!(response.text(), Some("It is dry in Oslo."));
        assert!(response.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn chat_serializes_tools_and_parses_tool_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({
                "tool_choice": "auto",
                "tools": [
                    { "type": "function", "function": { "name": "get_current_weather" } }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_abc",
                            "type": "function",
                            "function": {
                                "name": "get_current_weather",
                                "arguments": "{\"location\":\"Paris\"}"
                            }
                        }]
                    }
                }]
            })))
            .mount(&server)
            .await;

        let request = ChatRequest::new(vec![Message::user("weather in Paris?")]).with_tools(vec![
            ToolSpec {
                name: "get_current_weather",
                description: "Get the current weather",
                parameters: json!({ "type": "object" }),
            },
        ], ToolChoice::Auto);
        let response = chat(&Client::new(), &endpoint_for(&server), &request)
            .await
            .expect("chat should succeed");

        assert_eq!(response.content, None);
        assert_eq!(
            response.tool_calls,
            vec![ToolCall {
                id: "call_abc".to_string(),
                name: "get_current_weather".to_string(),
                arguments: "{\"location\":\"Paris\"}".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn chat_echoes_tool_results_on_the_wire() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "messages": [
                    { "role": "user", "content": "q" },
                    {
                        "role": "assistant",
                        "tool_calls": [{ "id": "call_1", "type": "function" }]
                    },
                    { "role": "tool", "tool_call_id": "call_1", "content": "{}" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content": "done" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let call = ToolCall {
            id: "call_1".to_string(),
            name: "get_current_weather".to_string(),
            arguments: "{}".to_string(),
        };
        let request = ChatRequest::new(vec![
            Message::user("q"),
            Message::assistant_tool_calls(None, vec![call]),
            Message::tool_result("call_1", "{}"),
        ]);
        let response = chat(&Client::new(), &endpoint_for(&server), &request)
            .await
            .expect("chat should succeed");
        assert_eq!(response.text(), Some("done"));
    }

    #[tokio::test]
    async fn chat_maps_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let err = chat(
            &Client::new(),
            &endpoint_for(&server),
            &ChatRequest::new(vec![Message::user("hi")]),
        )
        .await
        .expect_err("chat should fail");

        assert!(
            matches!(&err, ModelError::Status { status: 429, body } if body == "rate limited"),
            "unexpected error: {err:?}"
        );
    }

    #[tokio::test]
    async fn chat_without_choices_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let err = chat(
            &Client::new(),
            &endpoint_for(&server),
            &ChatRequest::new(vec![Message::user("")]),
        )
        .await
        .expect_err("chat should fail");
        assert!(matches!(err, ModelError::EmptyResponse));
    }

    #[tokio::test]
    async fn chat_with_malformed_json_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = chat(
            &Client::new(),
            &endpoint_for(&server),
            &ChatRequest::new(vec![Message::user("hi")]),
        )
        .await
        .expect_err("chat should fail");
        assert!(matches!(err, ModelError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn list_models_returns_sorted_ids() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .and(header("Authorization", "Bearer model-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "data": [
                    { "id": "mixtral-8x7b-32768", "object": "model" },
                    { "id": "llama-3.3-70b-versatile", "object": "model" }
                ]
            })))
            .mount(&server)
            .await;

        let ids = list_models(&Client::new(), &endpoint_for(&server))
            .await
            .expect("listing should succeed");
        assert_eq!(ids, vec!["llama-3.3-70b-versatile", "mixtral-8x7b-32768"]);
    }
}
