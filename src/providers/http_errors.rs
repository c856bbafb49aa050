use std::error::Error as StdError;
use std::io::ErrorKind;

/// Which upstream a failed request was aimed at; selects the wording and
/// the configuration variables named in the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Upstream {
    Weather,
    Model,
}

impl Upstream {
    fn label(&self) -> &'static str {
        match self {
            Self::Weather => "weather API",
            Self::Model => "model API",
        }
    }

    fn timeout_var(&self) -> &'static str {
        match self {
            Self::Weather => "WEATHER_TIMEOUT_SECS",
            Self::Model => "MODEL_TIMEOUT_SECS",
        }
    }

    fn base_url_var(&self) -> &'static str {
        match self {
            Self::Weather => "WEATHER_BASE_URL",
            Self::Model => "MODEL_BASE_URL",
        }
    }
}

fn error_chain_any(
    err: &(dyn StdError + 'static),
    kind: ErrorKind,
    needle: &str,
) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(source) = current {
        if let Some(io_err) = source.downcast_ref::<std::io::Error>()
            && io_err.kind() == kind
        {
            return true;
        }

        if source.to_string().to_ascii_lowercase().contains(needle) {
            return true;
        }

        current = source.source();
    }

    false
}

fn error_chain_has_connection_refused(err: &(dyn StdError + 'static)) -> bool {
    error_chain_any(err, ErrorKind::ConnectionRefused, "connection refused")
}

fn error_chain_has_timeout(err: &(dyn StdError + 'static)) -> bool {
    error_chain_any(err, ErrorKind::TimedOut, "timed out")
}

/// Turns a transport-level reqwest failure into a message that tells the
/// user which setting to look at.
pub(crate) fn describe_request_error(
    err: &reqwest::Error,
    upstream: Upstream,
    api_url: &str,
    timeout_secs: u64,
) -> String {
    if err.is_timeout() || error_chain_has_timeout(err) {
        return format!(
            "Request to the {} timed out after {}s while calling '{}'. \
             Increase {} or try again later.",
            upstream.label(),
            timeout_secs,
            api_url,
            upstream.timeout_var()
        );
    }

    if err.is_connect() {
        if error_chain_has_connection_refused(err) {
            return format!(
                "Connection refused by the {} at '{}'. Check {}.",
                upstream.label(),
                api_url,
                upstream.base_url_var()
            );
        }

        return format!(
            "Failed to connect to the {} at '{}'. Check {} and network connectivity.",
            upstream.label(),
            api_url,
            upstream.base_url_var()
        );
    }

    format!("Failed to call the {} at '{}': {}", upstream.label(), api_url, err)
}

/// Keeps upstream error bodies short enough to show to a user.
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}
