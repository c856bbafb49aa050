//! Current-weather lookups: query types, the normalized record, the
//! provider client and the text renderer.

mod client;
pub mod format;

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::error::{CoordinateError, WeatherError};

pub use client::WeatherClient;
pub use format::render;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    latitude: f64,
    longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordinateError::LatitudeOutOfRange(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinateError::LongitudeOutOfRange(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Parses the two halves of user input such as `"48.85"` and `"2.35"`.
    pub fn parse(latitude: &str, longitude: &str) -> Result<Self, CoordinateError> {
        Self::new(parse_latitude(latitude)?, parse_longitude(longitude)?)
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

/// Reads one latitude value and checks it lies in [-90, 90].
pub fn parse_latitude(raw: &str) -> Result<f64, CoordinateError> {
    let value = parse_axis("latitude", raw)?;
    if !(-90.0..=90.0).contains(&value) {
        return Err(CoordinateError::LatitudeOutOfRange(value));
    }
    Ok(value)
}

/// Reads one longitude value and checks it lies in [-180, 180].
pub fn parse_longitude(raw: &str) -> Result<f64, CoordinateError> {
    let value = parse_axis("longitude", raw)?;
    if !(-180.0..=180.0).contains(&value) {
        return Err(CoordinateError::LongitudeOutOfRange(value));
    }
    Ok(value)
}

fn parse_axis(axis: &'static str, raw: &str) -> Result<f64, CoordinateError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| CoordinateError::InvalidNumber {
            axis,
            raw: raw.trim().to_string(),
        })
}

#[derive(Debug, Clone, PartialEq)]
pub enum LocationQuery {
    Coordinates(Coordinates),
    Name(String),
}

impl LocationQuery {
    /// Treats `"lat,lon"` with two in-range numbers as coordinates and
    /// anything else as a place name for the provider to resolve.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if let Some((lat, lon)) = text.split_once(',')
            && let Ok(coords) = Coordinates::parse(lat, lon)
        {
            return Self::Coordinates(coords);
        }
        Self::Name(text.to_string())
    }

    /// Value of the provider's `q` parameter.
    pub fn as_query_param(&self) -> String {
        match self {
            Self::Coordinates(coords) => coords.to_string(),
            Self::Name(name) => name.clone(),
        }
    }
}

impl From<Coordinates> for LocationQuery {
    fn from(coords: Coordinates) -> Self {
        Self::Coordinates(coords)
    }
}

impl fmt::Display for LocationQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_query_param())
    }
}

/// Current conditions for one resolved place, normalized from the
/// provider's response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherRecord {
    pub temperature_celsius: f64,
    pub humidity_pct: u8,
    pub cloud_pct: u8,
    pub wind_kph: f64,
    pub condition_text: String,
    pub feels_like_celsius: f64,
    pub uv_index: Option<f64>,
    pub resolved_place_name: String,
    pub region: String,
    pub country: String,
    pub coordinates: Coordinates,
    pub local_time: NaiveDateTime,
}

pub type WeatherFuture<'a> =
    Pin<Box<dyn Future<Output = Result<WeatherRecord, WeatherError>> + 'a>>;

pub trait WeatherLookup {
    fn lookup<'a>(&'a self, query: &'a LocationQuery) -> WeatherFuture<'a>;
}
