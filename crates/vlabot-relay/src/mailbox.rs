//! [`CommandMailbox`] – the command side of the relay.
//!
//! One JSON document, `{"commands": <string-or-list>}`, at a well-known
//! path.  Every write replaces the whole batch.  A reader remembers the
//! modification time of the last file it consumed and only reports a batch
//! when a strictly later time is observed.
//!
//! Nothing ties a batch to the frame it was generated from.  By the time a
//! batch is read the image channel may already hold newer frames, so the
//! executed commands need not match what the camera currently sees.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vlabot_types::VlaError;

use crate::atomic::write_atomic;

/// Body of the `commands` key: raw model text or an already split list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandPayload {
    Text(String),
    List(Vec<String>),
}

impl CommandPayload {
    /// Text handed to the interpreter.  A list is rendered as a JSON array
    /// so the bracketed-list extraction path sees it unchanged.
    pub fn source_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::List(items) => serde_json::to_string(items).unwrap_or_default(),
        }
    }
}

impl From<String> for CommandPayload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for CommandPayload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// On-disk document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDocument {
    pub commands: CommandPayload,
}

/// Reader state for the command file.
#[derive(Debug)]
pub struct CommandMailbox {
    path: PathBuf,
    last_observed: Option<SystemTime>,
}

impl CommandMailbox {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_observed: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Modification time of the last file consumed.
    pub fn last_observed(&self) -> Option<SystemTime> {
        self.last_observed
    }

    /// Check for a new batch.
    ///
    /// Returns `Ok(None)` if the file is absent or has not been modified
    /// since the last successful read.  The modification time is recorded
    /// as soon as the bytes are read, so a malformed file is reported once
    /// and then ignored until it is rewritten.
    ///
    /// # Errors
    ///
    /// - [`VlaError::Io`] if the file exists but cannot be read; the
    ///   modification time is not recorded and the read is retried next
    ///   poll.
    /// - [`VlaError::MalformedBatch`] if the content is not a JSON object
    ///   with a `commands` string or string list.
    pub fn poll(&mut self) -> Result<Option<CommandPayload>, VlaError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(VlaError::io(&self.path, e)),
        };
        self.consume(file)
    }

    /// Stat and read through one handle so the recorded time belongs to the
    /// bytes read, even if a writer renames a new file in meanwhile.
    fn consume(&mut self, mut file: File) -> Result<Option<CommandPayload>, VlaError> {
        let modified = file
            .metadata()
            .and_then(|m| m.modified())
            .map_err(|e| VlaError::io(&self.path, e))?;
        if self.last_observed.is_some_and(|seen| modified <= seen) {
            return Ok(None);
        }

        let mut raw = String::new();
        file.read_to_string(&mut raw)
            .map_err(|e| VlaError::io(&self.path, e))?;
        self.last_observed = Some(modified);

        match serde_json::from_str::<CommandDocument>(&raw) {
            Ok(doc) => {
                debug!(path = %self.path.display(), "new command batch");
                Ok(Some(doc.commands))
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "unreadable command file");
                Err(VlaError::MalformedBatch { raw })
            }
        }
    }
}

/// Atomically replace the batch at `path`.
///
/// # Errors
///
/// Returns [`VlaError::Serialization`] or [`VlaError::Io`].
pub fn write_batch(path: &Path, commands: impl Into<CommandPayload>) -> Result<(), VlaError> {
    let doc = CommandDocument {
        commands: commands.into(),
    };
    let json = serde_json::to_vec(&doc).map_err(|e| VlaError::Serialization(e.to_string()))?;
    write_atomic(path, &json)
}
