use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reqwest::Client;
use std::io::{self, BufRead, Write};
use tracing::info;

use crate::agent::Agent;
use crate::config::Config;
use crate::error::CoordinateError;
use crate::model_gateway::{HostModelGateway, ModelGateway};
use crate::repl::{TurnFuture, TurnHandler, run_repl};
use crate::weather::{
    Coordinates, LocationQuery, WeatherClient, WeatherLookup, parse_latitude, parse_longitude,
    render,
};

#[derive(Debug, Parser)]
#[command(name = "weatherbot", version, about = "Current weather lookups and a weather chatbot")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Chat with the weather assistant (default)
    Chat,
    /// Ask a single question and print the answer
    Ask {
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Print the current weather for a place, or start a lookup prompt
    Lookup {
        #[arg(allow_hyphen_values = true)]
        location: Vec<String>,
    },
    /// Print the current weather at a latitude and longitude, asking for
    /// them when they are not given
    Coords {
        #[arg(allow_negative_numbers = true, requires = "longitude")]
        latitude: Option<f64>,
        #[arg(allow_negative_numbers = true)]
        longitude: Option<f64>,
    },
    /// List the models the configured provider offers
    Models,
}

struct ChatHandler<'a, G: ?Sized, W: ?Sized> {
    agent: Agent<'a, G, W>,
}

impl<G, W> TurnHandler for ChatHandler<'_, G, W>
where
    G: ModelGateway + ?Sized,
    W: WeatherLookup + ?Sized,
{
    fn prompt(&self) -> &str {
        "Ask?: "
    }

    fn empty_hint(&self) -> &str {
        "Please ask a question about the weather, or type 'quit' to exit."
    }

    fn handle<'a>(&'a self, input: &'a str) -> TurnFuture<'a> {
        Box::pin(async move { Ok(self.agent.ask(input).await?) })
    }
}

struct LookupHandler<'a, W: ?Sized> {
    weather: &'a W,
}

impl<W> TurnHandler for LookupHandler<'_, W>
where
    W: WeatherLookup + ?Sized,
{
    fn prompt(&self) -> &str {
        "Location?: "
    }

    fn empty_hint(&self) -> &str {
        "Please enter a place name or 'lat,lon', or type 'quit' to exit."
    }

    fn handle<'a>(&'a self, input: &'a str) -> TurnFuture<'a> {
        Box::pin(async move {
            let query = LocationQuery::parse(input);
            let record = self.weather.lookup(&query).await?;
            Ok(render(&record))
        })
    }
}

/// Runs one subcommand. Credentials are checked here, before any prompt is
/// shown.
pub async fn dispatch(cli: Cli, cfg: &Config, client: Client) -> Result<()> {
    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => {
            let gateway = HostModelGateway::new(client.clone(), cfg)?;
            let weather = WeatherClient::new(client, cfg)?;
            info!(
                provider = cfg.model_provider.as_str(),
                model = gateway.model(),
                mode = cfg.agent_mode.as_str(),
                "starting chat session"
            );
            println!("Weather assistant ready. Ask about the weather anywhere, or type 'quit' to exit.");
            let handler = ChatHandler {
                agent: Agent::new(&gateway, &weather, cfg),
            };
            run_repl(&handler, io::stdin().lock(), io::stdout().lock()).await
        }
        Command::Ask { question } => {
            let gateway = HostModelGateway::new(client.clone(), cfg)?;
            let weather = WeatherClient::new(client, cfg)?;
            let agent = Agent::new(&gateway, &weather, cfg);
            let answer = agent
                .ask(&question.join(" "))
                .await
                .context("Failed to answer question")?;
            println!("{}", answer.trim());
            Ok(())
        }
        Command::Lookup { location } => {
            let weather = WeatherClient::new(client, cfg)?;
            let location = location.join(" ");
            if location.trim().is_empty() {
                let handler = LookupHandler { weather: &weather };
                return run_repl(&handler, io::stdin().lock(), io::stdout().lock()).await;
            }
            let record = weather
                .fetch(&LocationQuery::parse(&location))
                .await
                .context("Weather lookup failed")?;
            println!("{}", render(&record));
            Ok(())
        }
        Command::Coords {
            latitude,
            longitude,
        } => {
            let given = match (latitude, longitude) {
                (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)?),
                _ => None,
            };
            let weather = WeatherClient::new(client, cfg)?;
            let coords = match given {
                Some(coords) => coords,
                None => match read_coordinates(io::stdin().lock(), io::stdout().lock())? {
                    Some(coords) => coords,
                    None => return Ok(()),
                },
            };
            let record = weather
                .fetch(&coords.into())
                .await
                .context("Weather lookup failed")?;
            println!("{}", render(&record));
            Ok(())
        }
        Command::Models => {
            let gateway = HostModelGateway::new(client, cfg)?;
            let models = gateway
                .list_models()
                .await
                .context("Failed to list models")?;
            print_models(io::stdout().lock(), cfg, &models)
        }
    }
}

/// Asks for each axis in turn and repeats a prompt until its value is
/// valid. Returns `None` if input ends first.
fn read_coordinates(mut input: impl BufRead, mut output: impl Write) -> Result<Option<Coordinates>> {
    let Some(latitude) = read_axis(&mut input, &mut output, "Latitude?: ", parse_latitude)? else {
        return Ok(None);
    };
    let Some(longitude) = read_axis(&mut input, &mut output, "Longitude?: ", parse_longitude)?
    else {
        return Ok(None);
    };
    Ok(Some(Coordinates::new(latitude, longitude)?))
}

fn read_axis<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    prompt: &str,
    parse: fn(&str) -> Result<f64, CoordinateError>,
) -> Result<Option<f64>> {
    loop {
        write!(output, "{prompt}").context("Failed to write prompt")?;
        output.flush().context("Failed to flush stdout")?;

        let mut line = String::new();
        if input.read_line(&mut line).context("Failed to read stdin")? == 0 {
            writeln!(output).context("Failed to write output")?;
            return Ok(None);
        }
        match parse(&line) {
            Ok(value) => return Ok(Some(value)),
            Err(err) => writeln!(output, "Error: {err}").context("Failed to write output")?,
        }
    }
}

fn print_models(mut out: impl Write, cfg: &Config, models: &[String]) -> Result<()> {
    writeln!(out, "Models available from {}:", cfg.model_provider.as_str())
        .context("Failed to write output")?;
    for model in models {
        writeln!(out, "- {model}").context("Failed to write output")?;
    }
    Ok(())
}
