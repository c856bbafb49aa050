//! The weather chatbot: one independent model exchange per question.

mod pipeline;
mod tools;

use tracing::{debug, info};

use crate::config::{AgentMode, Config};
use crate::error::ModelError;
use crate::model::{ChatRequest, ChatResponse, Message, ToolChoice};
use crate::model_gateway::ModelGateway;
use crate::weather::WeatherLookup;

pub use tools::{WEATHER_TOOL_NAME, weather_tool};

/// Tool calls executed per question; extra calls in the same response are
/// answered with a refusal.
const MAX_TOOL_CALLS_PER_TURN: usize = 1;

const TOOL_LIMIT_RESULT: &str =
    "ERROR: tool call limit reached for this question; answer with the data you already have";

pub struct Agent<'a, G: ?Sized, W: ?Sized> {
    gateway: &'a G,
    weather: &'a W,
    system_prompt: String,
    mode: AgentMode,
}

impl<'a, G, W> Agent<'a, G, W>
where
    G: ModelGateway + ?Sized,
    W: WeatherLookup + ?Sized,
{
    pub fn new(gateway: &'a G, weather: &'a W, cfg: &Config) -> Self {
        Self {
            gateway,
            weather,
            system_prompt: cfg.system_prompt.clone(),
            mode: cfg.agent_mode,
        }
    }

    /// Answers one question. No state is carried over between calls.
    pub async fn ask(&self, question: &str) -> Result<String, ModelError> {
        debug!(mode = self.mode.as_str(), question_len = question.len(), "answering question");
        match self.mode {
            AgentMode::Plain => self.ask_plain(question).await,
            AgentMode::Tools => self.ask_with_tools(question).await,
            AgentMode::Pipeline => self.ask_pipeline(question).await,
        }
    }

    fn opening_messages(&self, question: &str) -> Vec<Message> {
        let mut messages = Vec::with_capacity(2);
        if !self.system_prompt.trim().is_empty() {
            messages.push(Message::system(self.system_prompt.clone()));
        }
        messages.push(Message::user(question));
        messages
    }

    async fn ask_plain(&self, question: &str) -> Result<String, ModelError> {
        let response = self
            .gateway
            .chat(ChatRequest::new(self.opening_messages(question)))
            .await?;
        into_answer(response)
    }

    /// First call with the weather tool offered, at most one lookup, then a
    /// final call where the model must answer in text.
    async fn ask_with_tools(&self, question: &str) -> Result<String, ModelError> {
        let mut messages = self.opening_messages(question);

        let first = self
            .gateway
            .chat(
                ChatRequest::new(messages.clone()).with_tools(vec![weather_tool()], ToolChoice::Auto),
            )
            .await?;
        if first.tool_calls.is_empty() {
            return into_answer(first);
        }

        info!(
            tool_call_count = first.tool_calls.len(),
            "model requested weather lookup"
        );
        let calls = first.tool_calls;
        messages.push(Message::assistant_tool_calls(first.content, calls.clone()));

        for (index, call) in calls.iter().enumerate() {
            let result = if index < MAX_TOOL_CALLS_PER_TURN {
                match tools::execute(self.weather, call).await {
                    Ok(output) => output,
                    Err(err) => format!("ERROR: {err}"),
                }
            } else {
                TOOL_LIMIT_RESULT.to_string()
            };
            messages.push(Message::tool_result(call.id.clone(), result));
        }

        let last = self
            .gateway
            .chat(ChatRequest::new(messages).with_tools(vec![weather_tool()], ToolChoice::None))
            .await?;
        if !last.tool_calls.is_empty() && last.text().is_none() {
            return Err(ModelError::ToolLimitExceeded(MAX_TOOL_CALLS_PER_TURN));
        }
        into_answer(last)
    }
}

/// Returns the model text unchanged, refusing to pass on blank output.
fn into_answer(response: ChatResponse) -> Result<String, ModelError> {
    match response.content {
        Some(content) if !content.trim().is_empty() => Ok(content),
        _ => Err(ModelError::EmptyResponse),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use crate::error::{ModelError, WeatherError};
    use crate::model::{ChatRequest, ChatResponse, ToolCall};
    use crate::model_gateway::{ModelGateway, ModelGatewayFuture};
    use crate::weather::fixtures::paris_record;
    use crate::weather::{LocationQuery, WeatherFuture, WeatherLookup, WeatherRecord};

    /// Replays scripted responses and records every request it receives.
    #[derive(Default)]
    pub struct StubGateway {
        responses: RefCell<VecDeque<Result<ChatResponse, ModelError>>>,
        requests: RefCell<Vec<ChatRequest>>,
    }

    impl StubGateway {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reply(self, content: &str) -> Self {
            self.push(Ok(ChatResponse {
                content: Some(content.to_string()),
                tool_calls: Vec::new(),
            }))
        }

        pub fn call_tools(self, calls: &[(&str, &str)]) -> Self {
            let tool_calls = calls
                .iter()
                .map(|(id, arguments)| ToolCall {
                    id: (*id).to_string(),
                    name: "get_current_weather".to_string(),
                    arguments: (*arguments).to_string(),
                })
                .collect();
            self.push(Ok(ChatResponse {
                content: None,
                tool_calls,
            }))
        }

        pub fn fail(self, err: ModelError) -> Self {
            self.push(Err(err))
        }

        fn push(self, response: Result<ChatResponse, ModelError>) -> Self {
            self.responses.borrow_mut().push_back(response);
            self
        }

        pub fn requests(&self) -> Vec<ChatRequest> {
            self.requests.borrow().clone()
        }
    }

    impl ModelGateway for StubGateway {
        fn chat<'a>(&'a self, request: ChatRequest) -> ModelGatewayFuture<'a> {
            self.requests.borrow_mut().push(request);
            let next = self
                .responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(ModelError::Request("no scripted response".to_string())));
            Box::pin(async move { next })
        }
    }

    pub enum StubOutcome {
        Found(WeatherRecord),
        NotFound,
        ProviderDown,
    }

    pub struct StubWeather {
        outcome: StubOutcome,
        queries: RefCell<Vec<LocationQuery>>,
    }

    impl StubWeather {
        fn with(outcome: StubOutcome) -> Self {
            Self {
                outcome,
                queries: RefCell::new(Vec::new()),
            }
        }

        pub fn paris() -> Self {
            Self::with(StubOutcome::Found(paris_record()))
        }

        pub fn not_found() -> Self {
            Self::with(StubOutcome::NotFound)
        }

        pub fn provider_down() -> Self {
            Self::with(StubOutcome::ProviderDown)
        }

        pub fn queries(&self) -> Vec<LocationQuery> {
            self.queries.borrow().clone()
        }
    }

    impl WeatherLookup for StubWeather {
        fn lookup<'a>(&'a self, query: &'a LocationQuery) -> WeatherFuture<'a> {
            self.queries.borrow_mut().push(query.clone());
            let result = match &self.outcome {
                StubOutcome::Found(record) => Ok(record.clone()),
                StubOutcome::NotFound => Err(WeatherError::NotFound {
                    query: query.as_query_param(),
                }),
                StubOutcome::ProviderDown => {
                    Err(WeatherError::provider("Weather API request failed with status 503"))
                }
            };
            Box::pin(async move { result })
        }
    }
}
