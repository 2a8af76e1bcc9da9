//! Line-oriented terminal front end.
//!
//! Lines starting with `:` are commands; anything else is a query for the
//! current mode.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::dispatcher::QueryDispatcher;
use crate::error::Result;
use crate::modes::Mode;
use crate::session::Session;

const HELP: &str = "\
Commands:
  :mode <name>   switch mode (admission | clinical)
  :modes         list modes
  :examples      show example inputs for the current mode
  :history       show answered queries
  :clear         clear chat
  :help          show this help
  :quit          exit";

#[derive(Debug, PartialEq)]
enum Command<'a> {
    Mode(&'a str),
    Modes,
    Examples,
    History,
    Clear,
    Help,
    Quit,
    Unknown(&'a str),
    Query(&'a str),
}

fn parse_line(line: &str) -> Command<'_> {
    let Some(rest) = line.strip_prefix(':') else {
        return Command::Query(line);
    };
    let (name, arg) = rest
        .split_once(char::is_whitespace)
        .map(|(n, a)| (n, a.trim()))
        .unwrap_or((rest, ""));
    match name {
        "mode" => Command::Mode(arg),
        "modes" => Command::Modes,
        "examples" => Command::Examples,
        "history" => Command::History,
        "clear" => Command::Clear,
        "help" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => Command::Unknown(other),
    }
}

pub struct Repl<'a> {
    dispatcher: &'a QueryDispatcher,
    session: Session,
    mode: Mode,
}

impl<'a> Repl<'a> {
    pub fn new(dispatcher: &'a QueryDispatcher, mode: Mode) -> Self {
        Self {
            dispatcher,
            session: Session::new(),
            mode,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Run until EOF or `:quit`
    pub async fn run<R, W>(&mut self, input: R, mut output: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        output.write_all(b"Nurse Assistant Chatbot\n").await?;
        self.write_intro(&mut output).await?;

        let mut lines = input.lines();
        loop {
            output
                .write_all(format!("[{}] > ", self.mode).as_bytes())
                .await?;
            output.flush().await?;

            let Some(line) = lines.next_line().await? else {
                break;
            };

            match parse_line(line.trim_end_matches(['\r', '\n'])) {
                Command::Quit => break,
                Command::Help => writeln_str(&mut output, HELP).await?,
                Command::Modes => {
                    for mode in Mode::ALL {
                        let marker = if mode == self.mode { "*" } else { " " };
                        writeln_str(&mut output, &format!("{marker} {mode}")).await?;
                    }
                }
                Command::Mode(name) => match name.parse::<Mode>() {
                    Ok(mode) => {
                        self.mode = mode;
                        self.write_intro(&mut output).await?;
                    }
                    Err(e) => writeln_str(&mut output, &format!("Error: {e}")).await?,
                },
                Command::Examples => self.write_examples(&mut output).await?,
                Command::History => {
                    if self.session.transcript().is_empty() {
                        writeln_str(&mut output, "No history.").await?;
                    }
                    for exchange in self.session.transcript() {
                        let text = format!(
                            "[{}] {}: {}\n{}\n",
                            exchange.answered_at.format("%H:%M:%S"),
                            exchange.mode,
                            exchange.query,
                            exchange.response
                        );
                        writeln_str(&mut output, &text).await?;
                    }
                }
                Command::Clear => {
                    self.session.clear();
                    writeln_str(&mut output, "Chat cleared.").await?;
                }
                Command::Unknown(name) => {
                    writeln_str(&mut output, &format!("Unknown command ':{name}'. Try :help"))
                        .await?
                }
                Command::Query(query) => {
                    match self
                        .dispatcher
                        .dispatch(&mut self.session, self.mode, query)
                        .await
                    {
                        Ok(Some(answer)) => {
                            writeln_str(&mut output, "Assistant Response:").await?;
                            writeln_str(&mut output, &answer).await?;
                        }
                        Ok(None) => {}
                        Err(e) => {
                            tracing::error!("Query failed: {}", e);
                            writeln_str(&mut output, &format!("Error: {e}")).await?;
                        }
                    }
                }
            }
        }

        output.flush().await?;
        Ok(())
    }

    async fn write_intro<W: AsyncWrite + Unpin>(&self, output: &mut W) -> Result<()> {
        let profile = self.mode.profile();
        writeln_str(output, &format!("\n== {} ==", profile.heading)).await?;
        self.write_examples(output).await?;
        writeln_str(
            output,
            &format!("{} ({})", profile.input_label, profile.placeholder),
        )
        .await
    }

    async fn write_examples<W: AsyncWrite + Unpin>(&self, output: &mut W) -> Result<()> {
        writeln_str(output, "Try it using some of the following:").await?;
        for example in self.mode.profile().examples {
            writeln_str(output, &format!("  - {example}")).await?;
        }
        Ok(())
    }
}

async fn writeln_str<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> Result<()> {
    output.write_all(text.as_bytes()).await?;
    output.write_all(b"\n").await?;
    Ok(())
}
