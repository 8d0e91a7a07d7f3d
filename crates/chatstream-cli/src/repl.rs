//! Interactive loop
//!
//! Reads lines from stdin and renders session events as they arrive. The
//! transcript is only ever touched through the session.

use std::io::Write;

use anyhow::Result;
use chatstream_core::session::ERROR_PREFIX;
use chatstream_core::{
    AssistantClient, ChatConfig, ChatSession, RequestMode, Sender, SessionEvent,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::commands::{Command, HELP};

pub async fn run(config: &ChatConfig) -> Result<()> {
    let client = AssistantClient::new(config)?;
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let session = ChatSession::from_config(config)?.with_events(events_tx);

    println!("Assistente AI ({}). /help per i comandi.", config.api_url);

    let input = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    drive(&session, &client, input, events_rx, &mut stdout).await
}

/// Run the loop until `/quit`, or until input ends and every reply that was
/// already requested has finished rendering.
async fn drive<R, W>(
    session: &ChatSession,
    client: &AssistantClient,
    input: R,
    mut events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    out: &mut W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut mode = RequestMode::Plain;
    let mut lines = input.lines();
    let mut input_open = true;
    // Exchanges sent from here whose terminal event has not been rendered
    let mut pending = 0usize;

    while input_open || pending > 0 {
        tokio::select! {
            line = lines.next_line(), if input_open => {
                let Some(line) = line? else {
                    debug!(pending, "Input closed");
                    input_open = false;
                    continue;
                };
                let Some(command) = Command::parse(&line) else {
                    continue;
                };
                match command {
                    Command::Send(text) => {
                        // One exchange at a time from the terminal's point of view
                        if session.is_awaiting() {
                            eprintln!("(attendi la risposta in corso)");
                            continue;
                        }
                        if session.send(&text, mode.clone()).is_some() {
                            pending += 1;
                        }
                    }
                    Command::Clear => session.clear(),
                    Command::History => print_history(session, out)?,
                    Command::Upload(path) => match client.upload_document(&path).await {
                        Ok(document) => {
                            info!(file = %document.file_name, "Document attached as context");
                            writeln!(
                                out,
                                "Documento caricato: {} ({} pagine). Usato come contesto.",
                                document.file_name, document.total_pages
                            )?;
                            mode = document.as_context();
                        }
                        Err(e) => {
                            warn!(error = %e, "Upload failed");
                            writeln!(out, "{ERROR_PREFIX}{e}")?;
                        }
                    },
                    Command::Rag(source) => {
                        writeln!(
                            out,
                            "Modalità documenti{}",
                            source.as_deref().map(|s| format!(": {s}")).unwrap_or_default()
                        )?;
                        mode = RequestMode::RetrievalAugmented(source);
                    }
                    Command::Plain => {
                        writeln!(out, "Modalità semplice")?;
                        mode = RequestMode::Plain;
                    }
                    Command::Help => writeln!(out, "{HELP}")?,
                    Command::Quit => break,
                    Command::Unknown(input) => eprintln!("Comando sconosciuto: {input}"),
                }
            }
            Some(event) = events_rx.recv() => {
                if matches!(event, SessionEvent::Completed { .. } | SessionEvent::Failed { .. }) {
                    pending = pending.saturating_sub(1);
                }
                render(event, out)?;
            }
            else => break,
        }
    }

    Ok(())
}

fn render<W: Write>(event: SessionEvent, out: &mut W) -> Result<()> {
    match event {
        SessionEvent::ExchangeStarted { .. } => write!(out, "assistente> ")?,
        SessionEvent::Fragment { text, .. } => write!(out, "{text}")?,
        SessionEvent::Completed { .. } => writeln!(out)?,
        SessionEvent::Failed { error, .. } => writeln!(out, "{ERROR_PREFIX}{error}")?,
        SessionEvent::Cleared => writeln!(out, "(chat pulita)")?,
    }
    out.flush()?;
    Ok(())
}

fn print_history<W: Write>(session: &ChatSession, out: &mut W) -> Result<()> {
    session.with_transcript(|transcript| -> Result<()> {
        for message in transcript.messages() {
            let who = match message.sender() {
                Sender::User => "tu",
                Sender::Assistant => "assistente",
                Sender::System => "sistema",
            };
            writeln!(out, "[{}] {}> {}", message.display_time(), who, message.text())?;
        }
        Ok(())
    })
}
