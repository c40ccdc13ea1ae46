//! Interaction log

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::Result;

/// Who said it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person speaking to the assistant
    User,
    /// The assistant
    Assistant,
}

/// One line of the transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// Speaker
    pub role: Role,
    /// What was said
    pub text: String,
    /// When it was appended
    pub at: DateTime<Utc>,
}

/// Append-only, chronological log of the session
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    entries: Vec<LogEntry>,
}

impl Transcript {
    /// Create an empty transcript
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and return it
    pub fn push(&mut self, role: Role, text: impl Into<String>) -> &LogEntry {
        self.entries.push(LogEntry {
            role,
            text: text.into(),
            at: Utc::now(),
        });
        &self.entries[self.entries.len() - 1]
    }

    /// All entries, oldest first
    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Most recent entry
    #[must_use]
    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was logged yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// JSON array of entries with lowercase roles and RFC 3339 timestamps
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the transcript as JSON to `path`
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        tracing::info!(path = %path.display(), entries = self.len(), "transcript saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_keep_insertion_order() {
        let mut transcript = Transcript::new();
        transcript.push(Role::Assistant, "привет");
        transcript.push(Role::User, "расскажи сказку");
        transcript.push(Role::Assistant, "Жил кот.");

        let texts: Vec<&str> = transcript.entries().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, ["привет", "расскажи сказку", "Жил кот."]);
        assert_eq!(transcript.last().map(|e| e.role), Some(Role::Assistant));
        assert!(transcript.entries()[0].at <= transcript.entries()[2].at);
    }

    #[test]
    fn test_serializes_roles_lowercase() {
        let mut transcript = Transcript::new();
        transcript.push(Role::User, "пауза");

        let json: serde_json::Value = serde_json::from_str(&transcript.to_json().unwrap()).unwrap();
        assert_eq!(json[0]["role"], "user");
        assert_eq!(json[0]["text"], "пауза");
        assert!(json[0]["at"].is_string());
    }

    #[test]
    fn test_save_writes_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.json");

        let mut transcript = Transcript::new();
        transcript.push(Role::Assistant, "Пока-пока!");
        transcript.save(&path).unwrap();

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved.as_array().map(Vec::len), Some(1));
        assert_eq!(saved[0]["role"], "assistant");
    }

    #[test]
    fn test_save_to_missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("transcript.json");

        let err = Transcript::new().save(&path).unwrap_err();
        assert!(matches!(err, crate::Error::Io(_)));
    }
}
