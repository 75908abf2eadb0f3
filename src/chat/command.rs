//! Classification of input lines: blank, prompt, or slash command.

use crate::error::ChatError;
use std::path::PathBuf;

pub const HELP: &str = "\
Available commands:
  /model [name]   Show or switch the active model
  /models         List models installed on the server
  /new            Start a new chat (clears the transcript)
  /save [path]    Save the transcript to a text file
  /open <file>    Load a saved chat (a path, or a name from /history)
  /history        List saved chats
  /delete <file>  Delete a saved chat
  /help           Show this help
  /exit, /quit, /bye
                  Leave the chat (Ctrl-D works too)";

/// A slash command typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Exit,
    Help,
    Model(Option<String>),
    Models,
    New,
    Save(Option<PathBuf>),
    Open(PathBuf),
    History,
    Delete(PathBuf),
}

/// What a line of input turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Nothing but whitespace.
    Empty,
    /// Text to send to the model, already trimmed.
    Prompt(String),
    Command(Command),
}

/// Parse one line read from the terminal.
pub fn parse_line(line: &str) -> Result<Input, ChatError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Input::Empty);
    }
    if !line.starts_with('/') {
        return Ok(Input::Prompt(line.to_string()));
    }

    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (line, ""),
    };
    let arg = (!rest.is_empty()).then(|| rest.to_string());

    let command = match name {
        "/exit" | "/quit" | "/bye" => Command::Exit,
        "/help" | "/?" => Command::Help,
        "/model" => Command::Model(arg),
        "/models" => Command::Models,
        "/new" | "/clear" => Command::New,
        "/save" => Command::Save(arg.map(PathBuf::from)),
        "/open" | "/load" => Command::Open(required(name, arg)?),
        "/history" | "/chats" => Command::History,
        "/delete" => Command::Delete(required(name, arg)?),
        _ => {
            return Err(ChatError::Input(format!(
                "unknown command: {} (type /help for a list)",
                name
            )))
        }
    };
    Ok(Input::Command(command))
}

fn required(name: &str, arg: Option<String>) -> Result<PathBuf, ChatError> {
    arg.map(PathBuf::from)
        .ok_or_else(|| ChatError::Input(format!("usage: {} <file>", name)))
}
