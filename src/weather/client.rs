use chrono::NaiveDateTime;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{Coordinates, LocationQuery, WeatherFuture, WeatherLookup, WeatherRecord};
use crate::config::Config;
use crate::error::{ConfigError, WeatherError};
use crate::providers::http_errors::{Upstream, describe_request_error, truncate_body};

/// Provider error code for "No matching location found."
const NO_MATCHING_LOCATION: i64 = 1006;

const LOCAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Client for the WeatherAPI.com `current.json` endpoint. Free-text
/// locations are geocoded by the provider in the same call.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    http: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct WaResponse {
    location: WaLocation,
    current: WaCurrent,
}

#[derive(Debug, Deserialize)]
struct WaLocation {
    name: String,
    region: String,
    country: String,
    lat: f64,
    lon: f64,
    localtime: String,
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: String,
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    temp_c: f64,
    humidity: i64,
    cloud: i64,
    wind_kph: f64,
    condition: WaCondition,
    feelslike_c: f64,
    #[serde(default)]
    uv: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WaErrorEnvelope {
    error: WaErrorBody,
}

#[derive(Debug, Deserialize)]
struct WaErrorBody {
    code: i64,
    message: String,
}

impl WeatherClient {
    pub fn new(http: Client, cfg: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            http,
            api_key: cfg.weather_api_key()?.to_string(),
            base_url: cfg.weather_base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(cfg.weather_timeout_secs),
        })
    }

    fn current_url(&self) -> String {
        format!("{}/current.json", self.base_url)
    }

    pub async fn fetch(&self, query: &LocationQuery) -> Result<WeatherRecord, WeatherError> {
        let api_url = self.current_url();
        let q = query.as_query_param();
        debug!(api_url = %api_url, query = %q, "requesting current weather");

        let response = self
            .http
            .get(&api_url)
            .query(&[("key", self.api_key.as_str()), ("q", q.as_str()), ("aqi", "no")])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| {
                warn!(api_url = %api_url, error = %err, "weather request failed");
                WeatherError::provider(describe_request_error(
                    &err,
                    Upstream::Weather,
                    &api_url,
                    self.timeout.as_secs(),
                ))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|err| {
            WeatherError::provider(format!("Failed to read weather API response body: {err}"))
        })?;

        if !status.is_success() {
            warn!(
                api_url = %api_url,
                status = %status,
                response_body_len = body.len(),
                "weather API returned non-success status"
            );
            return Err(classify_failure(status, &body, &q));
        }

        let record = parse_current(&body)?;
        debug!(
            place = %record.resolved_place_name,
            country = %record.country,
            "received current weather"
        );
        Ok(record)
    }
}

impl WeatherLookup for WeatherClient {
    fn lookup<'a>(&'a self, query: &'a LocationQuery) -> WeatherFuture<'a> {
        Box::pin(self.fetch(query))
    }
}

fn classify_failure(status: StatusCode, body: &str, query: &str) -> WeatherError {
    let upstream_error = serde_json::from_str::<WaErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error);

    match status {
        StatusCode::BAD_REQUEST => match upstream_error {
            Some(err) if err.code != NO_MATCHING_LOCATION => WeatherError::provider(format!(
                "Weather API rejected the request ({}): {}",
                err.code, err.message
            )),
            _ => WeatherError::NotFound {
                query: query.to_string(),
            },
        },
        StatusCode::UNAUTHORIZED => WeatherError::provider(
            "Weather API returned 401 Unauthorized. Your WEATHER_API_KEY might be invalid or expired.",
        ),
        StatusCode::FORBIDDEN => WeatherError::provider(
            "Weather API returned 403 Forbidden. You might have exceeded your API call limits.",
        ),
        _ => WeatherError::provider(format!(
            "Weather API request failed with status {}: {}",
            status,
            truncate_body(body)
        )),
    }
}

fn parse_current(body: &str) -> Result<WeatherRecord, WeatherError> {
    let parsed: WaResponse = serde_json::from_str(body).map_err(|err| {
        WeatherError::provider(format!("Failed to parse weather API response: {err}"))
    })?;
    let WaResponse { location, current } = parsed;

    let humidity_pct = percentage("humidity", current.humidity)?;
    let cloud_pct = percentage("cloud", current.cloud)?;
    let coordinates = Coordinates::new(location.lat, location.lon)
        .map_err(|err| WeatherError::provider(format!("Weather API returned {err}")))?;
    let local_time = NaiveDateTime::parse_from_str(location.localtime.trim(), LOCAL_TIME_FORMAT)
        .map_err(|err| {
            WeatherError::provider(format!(
                "Weather API returned unreadable local time '{}': {err}",
                location.localtime
            ))
        })?;

    Ok(WeatherRecord {
        temperature_celsius: current.temp_c,
        humidity_pct,
        cloud_pct,
        wind_kph: current.wind_kph,
        condition_text: current.condition.text,
        feels_like_celsius: current.feelslike_c,
        uv_index: current.uv,
        resolved_place_name: location.name,
        region: location.region,
        country: location.country,
        coordinates,
        local_time,
    })
}

fn percentage(field: &str, value: i64) -> Result<u8, WeatherError> {
    u8::try_from(value)
        .ok()
        .filter(|pct| *pct <= 100)
        .ok_or_else(|| {
            WeatherError::provider(format!(
                "Weather API returned {field}={value}, expected a percentage between 0 and 100"
            ))
        })
}
