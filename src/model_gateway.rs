use reqwest::Client;
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

use crate::config::{Config, ModelProvider};
use crate::error::{ConfigError, ModelError};
use crate::model::{ChatRequest, ChatResponse};
use crate::providers::openai::{self, Endpoint};

pub type ModelGatewayFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ChatResponse, ModelError>> + 'a>>;

/// One chat-completion round trip to a hosted model.
pub trait ModelGateway {
    fn chat<'a>(&'a self, request: ChatRequest) -> ModelGatewayFuture<'a>;
}

/// Gateway backed by the configured hosted provider.
#[derive(Debug, Clone)]
pub struct HostModelGateway {
    client: Client,
    provider: ModelProvider,
    endpoint: Endpoint,
}

impl HostModelGateway {
    pub fn new(client: Client, cfg: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            client,
            provider: cfg.model_provider,
            endpoint: Endpoint::from_config(cfg)?,
        })
    }

    pub fn model(&self) -> &str {
        &self.endpoint.model
    }

    pub async fn list_models(&self) -> Result<Vec<String>, ModelError> {
        openai::list_models(&self.client, &self.endpoint).await
    }
}

impl ModelGateway for HostModelGateway {
    fn chat<'a>(&'a self, request: ChatRequest) -> ModelGatewayFuture<'a> {
        Box::pin(async move {
            debug!(
                provider = self.provider.as_str(),
                model = %self.endpoint.model,
                message_count = request.messages.len(),
                "dispatching model chat request"
            );
            // Every supported provider speaks the OpenAI wire format.
            match self.provider {
                ModelProvider::OpenAi | ModelProvider::Groq | ModelProvider::Gemini => {
                    openai::chat(&self.client, &self.endpoint, &request).await
                }
            }
        })
    }
}
