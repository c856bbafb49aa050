use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{CoordinateError, WeatherError};
use crate::model::{ToolCall, ToolSpec};
use crate::weather::{Coordinates, LocationQuery, WeatherLookup};

pub const WEATHER_TOOL_NAME: &str = "get_current_weather";

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool '{0}'")]
    Unknown(String),

    #[error("invalid arguments for get_current_weather: {0}")]
    InvalidArguments(String),

    #[error(transparent)]
    Coordinates(#[from] CoordinateError),

    #[error(transparent)]
    Weather(#[from] WeatherError),

    #[error("failed to encode weather record: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WeatherToolArgs {
    Place { location: String },
    Position { latitude: f64, longitude: f64 },
}

pub fn weather_tool() -> ToolSpec {
    ToolSpec {
        name: WEATHER_TOOL_NAME,
        description: "Get the current weather for a place. Pass either a location name \
                      (city, address or \"lat,lon\") or explicit latitude and longitude.",
        parameters: json!({
            "type": "object",
            "properties": {
                "location": {
                    "type": "string",
                    "description": "Place name such as \"Paris\" or \"New York\", or \"lat,lon\""
                },
                "latitude": { "type": "number", "minimum": -90, "maximum": 90 },
                "longitude": { "type": "number", "minimum": -180, "maximum": 180 }
            }
        }),
    }
}

pub fn parse_weather_call(call: &ToolCall) -> Result<LocationQuery, ToolError> {
    if call.name != WEATHER_TOOL_NAME {
        return Err(ToolError::Unknown(call.name.clone()));
    }

    let raw = if call.arguments.trim().is_empty() {
        "{}"
    } else {
        call.arguments.as_str()
    };
    let args: WeatherToolArgs = serde_json::from_str(raw)
        .map_err(|_| ToolError::InvalidArguments(format!("expected a location, got {raw}")))?;

    match args {
        WeatherToolArgs::Place { location } if location.trim().is_empty() => Err(
            ToolError::InvalidArguments("location must not be empty".to_string()),
        ),
        WeatherToolArgs::Place { location } => Ok(LocationQuery::parse(&location)),
        WeatherToolArgs::Position {
            latitude,
            longitude,
        } => Ok(Coordinates::new(latitude, longitude)?.into()),
    }
}

/// Runs one weather tool call and returns the JSON record to feed back to
/// the model.
pub async fn execute<W>(weather: &W, call: &ToolCall) -> Result<String, ToolError>
where
    W: WeatherLookup + ?Sized,
{
    let query = parse_weather_call(call)?;
    debug!(tool_name = %call.name, query = %query, "running weather tool");

    let record = weather.lookup(&query).await.map_err(|err| {
        warn!(tool_name = %call.name, query = %query, error = %err, "weather tool failed");
        err
    })?;
    Ok(serde_json::to_string(&record)?)
}

#[cfg(test)]
mod tests {
    use super::{ToolError, WEATHER_TOOL_NAME, execute, parse_weather_call, weather_tool};
    use crate::agent::test_support::StubWeather;
    use crate::model::ToolCall;
    use crate::weather::{Coordinates, LocationQuery};

    fn call(arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            name: WEATHER_TOOL_NAME.to_string(),
            arguments: arguments.to_string(),
        }
    }

    #[test]
    fn weather_tool_describes_location_parameter() {
        let spec = weather_tool();
        assert_eq!(spec.name, "get_current_weather");
        assert_eq!(spec.parameters["properties"]["location"]["type"], "string");
    }

    #[test]
    fn parses_location_name() {
        let query = parse_weather_call(&call(r#"{"location":"Sao Paulo"}"#))
            .expect("arguments should parse");
        assert_eq!(query, LocationQuery::Name("Sao Paulo".to_string()));
    }

    #[test]
    fn parses_location_string_with_coordinates() {
        let query = parse_weather_call(&call(r#"{"location":"48.85,2.35"}"#))
            .expect("arguments should parse");
        let coords = Coordinates::new(48.85, 2.35).expect("valid coordinates");
        assert_eq!(query, LocationQuery::Coordinates(coords));
    }

    #[test]
    fn parses_explicit_latitude_and_longitude() {
        let query = parse_weather_call(&call(r#"{"latitude":-33.87,"longitude":151.21}"#))
            .expect("arguments should parse");
        let coords = Coordinates::new(-33.87, 151.21).expect("valid coordinates");
        assert_eq!(query, LocationQuery::Coordinates(coords));
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        let err = parse_weather_call(&call(r#"{"latitude":123,"longitude":0}"#))
            .expect_err("latitude is out of range");
        assert!(matches!(err, ToolError::Coordinates(_)));
    }

    #[test]
    fn rejects_empty_or_missing_location() {
        assert!(matches!(
            parse_weather_call(&call(r#"{"location":"  "}"#)),
            Err(ToolError::InvalidArguments(_))
        ));
        assert!(matches!(
            parse_weather_call(&call("")),
            Err(ToolError::InvalidArguments(_))
        ));
        assert!(matches!(
            parse_weather_call(&call("not json")),
            Err(ToolError::InvalidArguments(_))
        ));
    }

    #[test]
    fn rejects_unknown_tool() {
        let mut unknown = call("{}");
        unknown.name = "time.now".to_string();
        assert!(matches!(
            parse_weather_call(&unknown),
            Err(ToolError::Unknown(name)) if name == "time.now"
        ));
    }

    #[tokio::test]
    async fn execute_returns_record_json() {
        let weather = StubWeather::paris();
        let output = execute(&weather, &call(r#"{"location":"Paris"}"#))
            .await
            .expect("tool should succeed");

        let value: serde_json::Value =
            serde_json::from_str(&output).expect("output should be JSON");
        assert_eq!(value["resolved_place_name"], "Paris");
        assert_eq!(value["humidity_pct"], 64);
        assert_eq!(
            weather.queries(),
            vec![LocationQuery::Name("Paris".to_string())]
        );
    }

    #[tokio::test]
    async fn execute_surfaces_not_found() {
        let weather = StubWeather::not_found();
        let err = execute(&weather, &call(r#"{"location":"Atlantis"}"#))
            .await
            .expect_err("tool should fail");
        assert!(err.to_string().contains("Could not find location 'Atlantis'"));
    }
}
