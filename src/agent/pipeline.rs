//! Guided mode: classify the question, extract a place, look it up, then let
//! the model phrase the answer from the fetched data.

use tracing::{debug, warn};

use super::{Agent, into_answer};
use crate::error::ModelError;
use crate::model::{ChatRequest, Message};
use crate::model_gateway::ModelGateway;
use crate::weather::{LocationQuery, WeatherLookup, WeatherRecord, render};

const CLASSIFY_PROMPT: &str = "Determine if a query is asking about weather or meteorological \
conditions. Answer with ONLY 'YES' or 'NO', nothing else.";

const EXTRACT_PROMPT: &str = "You extract location names from weather-related queries. Return \
ONLY the location name, nothing else. If no location is mentioned or you're unsure, return only \
the word 'UNKNOWN'.";

const UNKNOWN_LOCATION: &str = "UNKNOWN";

pub(super) const NOT_WEATHER_REPLY: &str =
    "I'm a weather assistant. Please ask me about the weather in a specific location.";

pub(super) const NO_LOCATION_REPLY: &str = "I couldn't determine which location you're asking \
about. Could you please specify a city or place?";

impl<G, W> Agent<'_, G, W>
where
    G: ModelGateway + ?Sized,
    W: WeatherLookup + ?Sized,
{
    pub(super) async fn ask_pipeline(&self, question: &str) -> Result<String, ModelError> {
        if !self.is_weather_question(question).await? {
            debug!("question classified as not weather related");
            return Ok(NOT_WEATHER_REPLY.to_string());
        }

        let Some(location) = self.extract_location(question).await? else {
            return Ok(NO_LOCATION_REPLY.to_string());
        };

        let query = LocationQuery::parse(&location);
        let record = match self.weather.lookup(&query).await {
            Ok(record) => record,
            Err(err) if err.is_not_found() => {
                return Ok(format!(
                    "I couldn't find weather information for '{location}'. \
                     Please check the spelling or try a different location."
                ));
            }
            Err(err) => {
                warn!(query = %query, error = %err, "weather lookup failed in pipeline mode");
                return Ok(format!(
                    "I couldn't retrieve weather information for '{location}' right now. \
                     Please try again later."
                ));
            }
        };

        self.describe(question, &record).await
    }

    async fn is_weather_question(&self, question: &str) -> Result<bool, ModelError> {
        let response = self
            .gateway
            .chat(
                ChatRequest::new(vec![Message::system(CLASSIFY_PROMPT), Message::user(question)])
                    .with_sampling(5, 0.1),
            )
            .await?;
        let verdict = into_answer(response)?;
        Ok(verdict.trim().to_ascii_uppercase().starts_with("YES"))
    }

    async fn extract_location(&self, question: &str) -> Result<Option<String>, ModelError> {
        let response = self
            .gateway
            .chat(
                ChatRequest::new(vec![Message::system(EXTRACT_PROMPT), Message::user(question)])
                    .with_sampling(20, 0.1),
            )
            .await?;
        let location = into_answer(response)?;
        let location = location.trim().trim_end_matches('.').trim();

        if location.eq_ignore_ascii_case(UNKNOWN_LOCATION) {
            return Ok(None);
        }
        debug!(location = %location, "extracted location from question");
        Ok(Some(location.to_string()))
    }

    async fn describe(&self, question: &str, record: &WeatherRecord) -> Result<String, ModelError> {
        let mut messages = Vec::with_capacity(2);
        if !self.system_prompt.trim().is_empty() {
            messages.push(Message::system(self.system_prompt.clone()));
        }
        messages.push(Message::user(format!(
            "User question: {question}\n\nWeather data:\n{}",
            render(record)
        )));

        let response = self
            .gateway
            .chat(ChatRequest::new(messages).with_sampling(150, 0.7))
            .await?;
        into_answer(response)
    }
}
