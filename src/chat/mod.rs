//! The interactive chat loop.
//!
//! A session alternates between two states: waiting for a line from the
//! terminal and waiting for the server's reply. Exactly one request is in
//! flight at a time, and the next line is not read until the current reply
//! (or its error) has been written out.

pub mod command;

use crate::error::ChatError;
use crate::protocol::{format_size, ModelInfo};
use crate::provider::CompletionProvider;
use crate::transcript::{self, Transcript};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use command::{parse_line, Command, Input, HELP};
use std::future::Future;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info};

const PROMPT: &str = ">>> ";

/// One prompt/response exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub prompt: String,
    pub response: String,
}

impl ChatTurn {
    pub fn new(prompt: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            response: response.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    AwaitingInput,
    AwaitingServerResponse,
    Exited,
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Exit command or end of input.
    Finished,
    /// The interrupt future fired first.
    Interrupted,
}

enum Flow {
    Continue,
    Exit,
}

/// Per-session settings resolved from config and CLI.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub model: String,
    /// Print the `>>>` prompt (only when stdin is a terminal).
    pub interactive: bool,
    pub autosave: bool,
    pub chats_dir: PathBuf,
}

/// A chat session bound to a completion provider.
pub struct ChatSession<'a, P: CompletionProvider + ?Sized> {
    provider: &'a P,
    model: String,
    transcript: Transcript,
    state: ChatState,
    interactive: bool,
    autosave: bool,
    chats_dir: PathBuf,
    /// False once a turn completes that has not been written to disk.
    saved: bool,
    /// A `/new` or `/open` that was refused because of unsaved turns.
    /// Repeating it on the very next line goes through.
    pending_discard: Option<Command>,
}

impl<'a, P: CompletionProvider + ?Sized> ChatSession<'a, P> {
    pub fn new(provider: &'a P, options: SessionOptions) -> Self {
        Self {
            provider,
            model: options.model,
            transcript: Transcript::new(),
            state: ChatState::AwaitingInput,
            interactive: options.interactive,
            autosave: options.autosave,
            chats_dir: options.chats_dir,
            saved: true,
            pending_discard: None,
        }
    }

    pub fn state(&self) -> ChatState {
        self.state
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Run until an exit command or end of input.
    ///
    /// Replies go to `out`, error reports to `err`. Only failures to read the
    /// input or write the terminal end the loop early.
    pub async fn run<R, W, E>(&mut self, input: R, out: &mut W, err: &mut E) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
        E: Write,
    {
        let mut lines = input.lines();
        self.state = ChatState::AwaitingInput;

        loop {
            if self.interactive {
                write!(out, "{}", PROMPT)?;
                out.flush()?;
            }

            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    if self.interactive {
                        writeln!(out)?;
                    }
                    break;
                }
                // The reader has already consumed the offending line.
                Err(e) if e.kind() == ErrorKind::InvalidData => {
                    report(err, &ChatError::Input("input is not valid UTF-8".to_string()))?;
                    continue;
                }
                Err(e) => return Err(e).context("Failed to read input"),
            };

            let armed = self.pending_discard.take();
            let flow = match parse_line(&line) {
                Ok(Input::Empty) => {
                    self.pending_discard = armed;
                    Flow::Continue
                }
                Ok(Input::Prompt(prompt)) => {
                    self.submit(prompt, out, err).await?;
                    Flow::Continue
                }
                Ok(Input::Command(command)) => self.execute(command, armed, out, err).await?,
                Err(e) => {
                    report(err, &e)?;
                    Flow::Continue
                }
            };
            if let Flow::Exit = flow {
                break;
            }
        }

        self.save_on_exit(out, err)
    }

    /// Like [`run`](Self::run), but stop early when `interrupt` completes.
    /// Unsaved turns are still autosaved on that path.
    pub async fn run_interruptible<R, W, E, F>(
        &mut self,
        input: R,
        out: &mut W,
        err: &mut E,
        interrupt: F,
    ) -> Result<SessionEnd>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
        E: Write,
        F: Future,
    {
        let interrupted = tokio::select! {
            result = self.run(input, &mut *out, &mut *err) => {
                result?;
                false
            }
            _ = interrupt => true,
        };

        if !interrupted {
            return Ok(SessionEnd::Finished);
        }
        writeln!(err, "\nInterrupted")?;
        self.save_on_exit(out, err)?;
        Ok(SessionEnd::Interrupted)
    }

    /// Send one prompt and write the reply or the error.
    async fn submit<W: Write, E: Write>(
        &mut self,
        prompt: String,
        out: &mut W,
        err: &mut E,
    ) -> Result<()> {
        self.state = ChatState::AwaitingServerResponse;
        debug!(model = %self.model, "awaiting server response");
        let result = self.provider.complete(&self.model, &prompt).await;
        self.state = ChatState::AwaitingInput;

        match result {
            Ok(response) => {
                writeln!(out, "{}", response)?;
                out.flush()?;
                self.transcript.push(ChatTurn::new(prompt, response));
                self.saved = false;
            }
            Err(e) => {
                debug!(error = %e, "turn failed");
                report(err, &e)?;
            }
        }
        Ok(())
    }

    async fn execute<W: Write, E: Write>(
        &mut self,
        command: Command,
        armed: Option<Command>,
        out: &mut W,
        err: &mut E,
    ) -> Result<Flow> {
        match command {
            Command::Exit => return Ok(Flow::Exit),
            Command::Help => writeln!(out, "{}", HELP)?,
            Command::Model(None) => writeln!(out, "Current model: {}", self.model)?,
            Command::Model(Some(name)) => self.switch_model(name, out, err).await?,
            Command::Models => match self.provider.list_models().await {
                Ok(models) => write_models(out, &models, Some(&self.model))?,
                Err(e) => report(err, &e)?,
            },
            Command::New => {
                if self.confirm_discard(Command::New, armed, err)? {
                    self.transcript.clear();
                    self.saved = true;
                    writeln!(out, "Started a new chat.")?;
                }
            }
            Command::Save(path) => {
                if self.transcript.is_empty() {
                    report(err, &ChatError::Input("nothing to save yet".to_string()))?;
                } else {
                    let path = path.unwrap_or_else(|| {
                        transcript::default_path(&self.chats_dir, Local::now())
                    });
                    self.save_to(&path, out, err)?;
                }
            }
            Command::Open(name) => {
                if self.confirm_discard(Command::Open(name.clone()), armed, err)? {
                    self.open(&name, out, err).await?;
                }
            }
            Command::History => self.history(out, err)?,
            Command::Delete(name) => {
                let path = transcript::resolve(&self.chats_dir, &name);
                match std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to delete {}", path.display()))
                {
                    Ok(()) => writeln!(out, "Deleted {}", path.display())?,
                    Err(e) => writeln!(err, "Error: {:#}", e)?,
                }
            }
        }
        Ok(Flow::Continue)
    }

    /// Whether `command` may throw away the current transcript. The first
    /// attempt with unsaved turns is refused with a warning; repeating the
    /// same command right away confirms it.
    fn confirm_discard<E: Write>(
        &mut self,
        command: Command,
        armed: Option<Command>,
        err: &mut E,
    ) -> Result<bool> {
        if self.saved || self.transcript.is_empty() || armed.as_ref() == Some(&command) {
            return Ok(true);
        }
        report(
            err,
            &ChatError::Input(format!(
                "current chat has {} unsaved turn(s); /save it first, or repeat the command to discard it",
                self.transcript.len()
            )),
        )?;
        self.pending_discard = Some(command);
        Ok(false)
    }

    /// Switch models, refusing names the server says it does not have. If
    /// the server cannot be asked, switch anyway and let the next turn tell.
    async fn switch_model<W: Write, E: Write>(
        &mut self,
        name: String,
        out: &mut W,
        err: &mut E,
    ) -> Result<()> {
        if self.is_installed(&name).await == Some(false) {
            let e = ChatError::Input(format!("model '{}' is not installed (see /models)", name));
            report(err, &e)?;
            return Ok(());
        }
        info!(from = %self.model, to = %name, "switching model");
        writeln!(out, "Switched to model {}", name)?;
        self.model = name;
        Ok(())
    }

    /// `None` when the server cannot be asked.
    async fn is_installed(&self, name: &str) -> Option<bool> {
        match self.provider.list_models().await {
            Ok(models) => Some(models.iter().any(|m| m.matches(name))),
            Err(e) => {
                debug!(error = %e, "could not verify model");
                None
            }
        }
    }

    /// Replace the transcript with a saved chat and replay it.
    async fn open<W: Write, E: Write>(&mut self, name: &Path, out: &mut W, err: &mut E) -> Result<()> {
        let path = transcript::resolve(&self.chats_dir, name);
        let chat = match Transcript::load(&path) {
            Ok(chat) => chat,
            Err(e) => {
                writeln!(err, "Error: {:#}", e)?;
                return Ok(());
            }
        };
        if chat.transcript.is_empty() {
            let e = ChatError::Input(format!("no messages found in {}", path.display()));
            report(err, &e)?;
            return Ok(());
        }

        for turn in chat.transcript.turns() {
            writeln!(out, "You: {}\n{}\n", turn.prompt, turn.response)?;
        }
        if let Some(model) = chat.model.filter(|m| *m != self.model) {
            if self.is_installed(&model).await == Some(false) {
                writeln!(
                    err,
                    "Warning: model '{}' from the saved chat is not installed; staying on {}",
                    model, self.model
                )?;
            } else {
                writeln!(out, "Switched to model {}", model)?;
                self.model = model;
            }
        }
        writeln!(
            out,
            "Opened {} ({} turns)",
            path.display(),
            chat.transcript.len()
        )?;
        self.transcript = chat.transcript;
        self.saved = true;
        Ok(())
    }

    fn history<W: Write, E: Write>(&self, out: &mut W, err: &mut E) -> Result<()> {
        match transcript::list_saved(&self.chats_dir) {
            Ok(chats) if chats.is_empty() => {
                writeln!(out, "No saved chats in {}", self.chats_dir.display())?
            }
            Ok(chats) => {
                for chat in chats {
                    let modified: DateTime<Local> = chat.modified.into();
                    writeln!(out, "  {}  ({})", chat.name(), modified.format("%Y-%m-%d %H:%M"))?;
                }
            }
            Err(e) => writeln!(err, "Error: {:#}", e)?,
        }
        Ok(())
    }

    fn save_to<W: Write, E: Write>(&mut self, path: &Path, out: &mut W, err: &mut E) -> Result<()> {
        match self.transcript.save(path, &self.model) {
            Ok(()) => {
                self.saved = true;
                writeln!(out, "Saved chat to {}", path.display())?;
            }
            Err(e) => writeln!(err, "Error: {:#}", e)?,
        }
        Ok(())
    }

    /// Mark the session finished, autosaving unsaved turns if enabled.
    pub fn save_on_exit<W: Write, E: Write>(&mut self, out: &mut W, err: &mut E) -> Result<()> {
        if self.autosave && !self.saved && !self.transcript.is_empty() {
            let path = transcript::default_path(&self.chats_dir, Local::now());
            self.save_to(&path, out, err)?;
        }
        self.state = ChatState::Exited;
        Ok(())
    }
}

/// Outcome of probing the server before the loop starts.
#[derive(Debug, PartialEq, Eq)]
pub enum ModelCheck {
    Installed,
    /// The model is missing; these are the ones that exist.
    Missing(Vec<String>),
    /// The server is up but would not list its models.
    Unknown,
}

/// Verify the server is reachable and see whether `model` is installed.
/// An error here means the session should not start.
pub async fn preflight<P: CompletionProvider + ?Sized>(
    provider: &P,
    model: &str,
) -> Result<ModelCheck, ChatError> {
    provider.health_check().await?;
    info!(backend = provider.name(), endpoint = provider.endpoint(), "server reachable");

    match provider.list_models().await {
        Ok(models) if models.iter().any(|m| m.matches(model)) => Ok(ModelCheck::Installed),
        Ok(models) => Ok(ModelCheck::Missing(
            models.into_iter().map(|m| m.name).collect(),
        )),
        Err(e) => {
            debug!(error = %e, "could not list models");
            Ok(ModelCheck::Unknown)
        }
    }
}

/// Message printed when the session cannot start.
pub fn fatal_message(err: &ChatError) -> String {
    if err.is_connection() {
        format!("Error: {}\nIs `ollama serve` running?", err)
    } else {
        format!("Error: {}", err)
    }
}

/// Print a model list, marking the active one.
pub fn write_models<W: Write>(out: &mut W, models: &[ModelInfo], active: Option<&str>) -> Result<()> {
    if models.is_empty() {
        writeln!(out, "No models installed. Pull one with: ollama pull <model>")?;
        return Ok(());
    }
    for model in models {
        let marker = match active {
            Some(active) if model.matches(active) => "*",
            _ => " ",
        };
        writeln!(
            out,
            "{} {} ({}) - {}",
            marker,
            model.name,
            format_size(model.size),
            model.modified_date()
        )?;
    }
    Ok(())
}

fn report<E: Write>(err: &mut E, e: &ChatError) -> std::io::Result<()> {
    if e.is_connection() {
        writeln!(err, "Error: {} (is `ollama serve` running?)", e)?;
    } else {
        writeln!(err, "Error: {}", e)?;
    }
    err.flush()
}
