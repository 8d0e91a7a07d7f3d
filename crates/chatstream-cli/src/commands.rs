//! Input line parsing

use std::path::PathBuf;

/// What one input line asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text to send to the assistant
    Send(String),
    Clear,
    History,
    /// Upload a document and attach its text to later messages
    Upload(PathBuf),
    /// Retrieval mode, optionally restricted to one uploaded file
    Rag(Option<String>),
    Plain,
    Help,
    Quit,
    Unknown(String),
}

pub const HELP: &str = "\
/clear            pulisce la chat
/history          mostra i messaggi
/upload <file>    carica un PDF/XLSX/XLS e lo usa come contesto
/rag [file]       risponde usando i documenti caricati
/plain            torna ai messaggi semplici
/quit             esce";

impl Command {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        let Some(rest) = trimmed.strip_prefix('/') else {
            // Sent as typed; only the line terminator is gone
            return Some(Self::Send(line.to_string()));
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, Some(arg.trim()).filter(|a| !a.is_empty())),
            None => (rest, None),
        };

        Some(match (name, arg) {
            ("clear", _) => Self::Clear,
            ("history", _) => Self::History,
            ("upload", Some(path)) => Self::Upload(PathBuf::from(path)),
            ("rag", source) => Self::Rag(source.map(str::to_string)),
            ("plain", _) => Self::Plain,
            ("help", _) => Self::Help,
            ("quit" | "exit", _) => Self::Quit,
            _ => Self::Unknown(trimmed.to_string()),
        })
    }
}
