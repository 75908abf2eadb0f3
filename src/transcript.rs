//! In-memory transcript of a chat session and its plain-text export.
//!
//! The transcript is never sent back to the server; it exists so a session
//! can be saved with `/save`, autosaved on exit, and reopened with `/open`.

use crate::chat::ChatTurn;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const RULE_WIDTH: usize = 50;
const CHAT_EXTENSION: &str = "txt";

/// Completed turns of the current session.
#[derive(Debug, Default)]
pub struct Transcript {
    turns: Vec<ChatTurn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// Render the transcript as text.
    pub fn render(&self, model: &str, at: DateTime<Local>) -> String {
        let rule = "-".repeat(RULE_WIDTH);
        let mut out = String::new();
        let _ = writeln!(out, "=== Ollama Chat ===");
        let _ = writeln!(out, "Model: {}", model);
        let _ = writeln!(out, "Date: {}", at.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(out, "{}\n", "=".repeat(RULE_WIDTH));

        for turn in &self.turns {
            for (role, content) in [("USER", &turn.prompt), ("ASSISTANT", &turn.response)] {
                let _ = writeln!(out, "[{}]\n{}\n", role, content);
                let _ = writeln!(out, "{}\n", rule);
            }
        }
        out
    }

    /// Write the transcript to `path`, creating parent directories.
    pub fn save(&self, path: &Path, model: &str) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        std::fs::write(path, self.render(model, Local::now()))
            .with_context(|| format!("Failed to write transcript: {}", path.display()))
    }

    /// Parse text written by [`Transcript::render`].
    ///
    /// A message runs from its `[USER]`/`[ASSISTANT]` marker to the next
    /// marker or rule. A user message without a following assistant reply
    /// is dropped, since a turn needs both halves.
    pub fn parse(text: &str) -> SavedChat {
        let rule = "-".repeat(RULE_WIDTH);
        let mut model = None;
        let mut messages: Vec<(Role, String)> = Vec::new();
        let mut role: Option<Role> = None;
        let mut content: Vec<&str> = Vec::new();

        for line in text.lines() {
            let marker = if line.starts_with("[USER]") {
                Some(Some(Role::User))
            } else if line.starts_with("[ASSISTANT]") {
                Some(Some(Role::Assistant))
            } else if line.starts_with(&rule) {
                Some(None)
            } else {
                None
            };

            match marker {
                Some(next) => {
                    flush_message(&mut messages, role, &mut content);
                    role = next;
                }
                None if role.is_some() => content.push(line),
                None => {
                    if let Some(name) = line.strip_prefix("Model: ") {
                        if messages.is_empty() {
                            model = Some(name.trim().to_string());
                        }
                    }
                }
            }
        }
        flush_message(&mut messages, role, &mut content);

        let mut transcript = Transcript::new();
        let mut pending_prompt = None;
        for (role, text) in messages {
            match role {
                Role::User => pending_prompt = Some(text),
                Role::Assistant => {
                    if let Some(prompt) = pending_prompt.take() {
                        transcript.push(ChatTurn::new(prompt, text));
                    }
                }
            }
        }

        SavedChat {
            model: model.filter(|m| !m.is_empty()),
            transcript,
        }
    }

    /// Read and parse a saved chat file.
    pub fn load(path: &Path) -> Result<SavedChat> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read chat file: {}", path.display()))?;
        Ok(Self::parse(&text))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    User,
    Assistant,
}

fn flush_message(messages: &mut Vec<(Role, String)>, role: Option<Role>, content: &mut Vec<&str>) {
    if let Some(role) = role {
        if !content.is_empty() {
            messages.push((role, content.join("\n").trim().to_string()));
        }
    }
    content.clear();
}

/// A chat read back from disk.
#[derive(Debug)]
pub struct SavedChat {
    /// From the `Model:` header, if present.
    pub model: Option<String>,
    pub transcript: Transcript,
}

/// A chat file in the chats directory.
#[derive(Debug, Clone)]
pub struct ChatFile {
    pub path: PathBuf,
    pub modified: SystemTime,
}

impl ChatFile {
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Saved chats in `dir`, newest first. A missing directory has none.
pub fn list_saved(dir: &Path) -> Result<Vec<ChatFile>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read chats directory: {}", dir.display()))?;

    let mut chats = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() || path.extension().map_or(true, |ext| ext != CHAT_EXTENSION) {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        chats.push(ChatFile { path, modified });
    }
    chats.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.path.cmp(&a.path)));
    Ok(chats)
}

/// Resolve a name typed by the user to a chat file. Paths that exist are
/// used as given; otherwise the name is looked up in `dir`, with `.txt`
/// appended when it has no extension.
pub fn resolve(dir: &Path, name: &Path) -> PathBuf {
    if name.exists() {
        return name.to_path_buf();
    }
    let candidate = dir.join(name);
    if candidate.extension().is_none() {
        candidate.with_extension(CHAT_EXTENSION)
    } else {
        candidate
    }
}

/// `chat_20240501_101500.txt` inside `dir`.
pub fn default_path(dir: &Path, at: DateTime<Local>) -> PathBuf {
    dir.join(format!("chat_{}.txt", at.format("%Y%m%d_%H%M%S")))
}
