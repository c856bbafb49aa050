use std::fmt::Write;

use super::WeatherRecord;

const MISSING: &str = "n/a";

/// Renders a record as the multi-line report printed by the lookup commands.
pub fn render(record: &WeatherRecord) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_report(&mut out, record);
    out
}

fn write_report(out: &mut String, record: &WeatherRecord) -> std::fmt::Result {
    writeln!(out, "The current weather in {} is:", heading_place(record))?;
    writeln!(out, "- temperature(C): {}", record.temperature_celsius)?;
    writeln!(out, "- humidity: {}%", record.humidity_pct)?;
    writeln!(out, "- cloud: {}%", record.cloud_pct)?;
    writeln!(out, "- wind: {}km/h", record.wind_kph)?;
    writeln!(out, "- condition: {}", or_missing(&record.condition_text))?;
    writeln!(out, "- feels like: {}°C", record.feels_like_celsius)?;
    match record.uv_index {
        Some(uv) => writeln!(out, "- UV index: {uv}")?,
        None => writeln!(out, "- UV index: {MISSING}")?,
    }
    writeln!(out)?;
    writeln!(out, "Location: {}", full_place(record))?;
    writeln!(
        out,
        "Coordinates: {}, {}",
        record.coordinates.latitude(),
        record.coordinates.longitude()
    )?;
    write!(out, "Local time: {}", record.local_time.format("%Y-%m-%d %H:%M"))
}

fn heading_place(record: &WeatherRecord) -> String {
    let name = or_missing(&record.resolved_place_name);
    let region = record.region.trim();
    if region.is_empty() || region == record.resolved_place_name.trim() {
        name.to_string()
    } else {
        format!("{name}, {region}")
    }
}

fn full_place(record: &WeatherRecord) -> String {
    let parts: Vec<&str> = [
        record.resolved_place_name.as_str(),
        record.region.as_str(),
        record.country.as_str(),
    ]
    .into_iter()
    .map(str::trim)
    .filter(|part| !part.is_empty())
    .collect();

    if parts.is_empty() {
        MISSING.to_string()
    } else {
        parts.join(", ")
    }
}

fn or_missing(value: &str) -> &str {
    let trimmed = value.trim();
    if trimmed.is_empty() { MISSING } else { trimmed }
}
