use anyhow::{Context, Result};
use std::future::Future;
use std::io::{BufRead, Write};
use std::pin::Pin;
use tracing::{info, warn};

pub const FAREWELL: &str = "Goodbye! Have a great day!";

pub type TurnFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + 'a>>;

/// What one REPL session does with each line of input.
pub trait TurnHandler {
    fn prompt(&self) -> &str;
    fn empty_hint(&self) -> &str;
    fn handle<'a>(&'a self, input: &'a str) -> TurnFuture<'a>;
}

#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Exit,
    Empty,
    Query(&'a str),
}

fn classify(raw: &str) -> Line<'_> {
    let line = raw.trim();
    if line.is_empty() {
        Line::Empty
    } else if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
        Line::Exit
    } else {
        Line::Query(line)
    }
}

/// Reads lines until `exit`/`quit` or end of input. Turn failures are
/// printed and the loop continues.
pub async fn run_repl<H, R, W>(handler: &H, mut input: R, mut output: W) -> Result<()>
where
    H: TurnHandler + ?Sized,
    R: BufRead,
    W: Write,
{
    let mut turns = 0usize;
    loop {
        write!(output, "{}", handler.prompt()).context("Failed to write prompt")?;
        output.flush().context("Failed to flush stdout")?;

        let mut line = String::new();
        let read = input
            .read_line(&mut line)
            .context("Failed to read stdin")?;
        if read == 0 {
            writeln!(output).context("Failed to write output")?;
            break;
        }

        match classify(&line) {
            Line::Exit => break,
            Line::Empty => {
                writeln!(output, "{}", handler.empty_hint()).context("Failed to write output")?;
            }
            Line::Query(query) => {
                turns += 1;
                match handler.handle(query).await {
                    Ok(answer) => writeln!(output, "{}\n", answer.trim()),
                    Err(err) => {
                        warn!(error = %format!("{err:#}"), "turn failed");
                        writeln!(output, "Error: {err:#}\nPlease try again.\n")
                    }
                }
                .context("Failed to write output")?;
            }
        }
    }

    info!(turns, "session ended");
    writeln!(output, "{FAREWELL}").context("Failed to write output")?;
    Ok(())
}
