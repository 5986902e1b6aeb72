//! G-code job model
//!
//! A job is the raw program text split into lines. It is never rewritten
//! after loading; the executor only keeps a cursor into it.

use crate::error::{PrinterError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An immutable, loaded G-code program
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcodeJob {
    lines: Arc<[String]>,
    source: Option<PathBuf>,
}

impl GcodeJob {
    /// Create a job from raw lines
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            source: None,
        }
    }

    /// Create a job from program text, one command per line
    pub fn from_content(content: &str) -> Self {
        Self::from_lines(content.lines())
    }

    /// Read a job from a file on disk
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| PrinterError::Job {
            reason: format!("{}: {}", path.display(), e),
        })?;

        let mut job = Self::from_content(&content);
        job.source = Some(path.to_path_buf());
        tracing::info!("Loaded {} ({} lines)", path.display(), job.len());
        Ok(job)
    }

    /// Number of raw lines, including blanks and comments
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Raw text of a line
    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    /// The executable command at `index`
    ///
    /// Returns `None` for blank and comment-only lines (and past the end).
    pub fn command_at(&self, index: usize) -> Option<&str> {
        self.line(index).and_then(strip_comment)
    }

    /// Count lines that carry a command
    pub fn command_count(&self) -> usize {
        (0..self.len()).filter(|&i| self.command_at(i).is_some()).count()
    }

    /// File the job was read from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

/// Strip a trailing `;` comment and surrounding whitespace
pub fn strip_comment(line: &str) -> Option<&str> {
    let command = match line.find(';') {
        Some(pos) => &line[..pos],
        None => line,
    }
    .trim();

    if command.is_empty() {
        None
    } else {
        Some(command)
    }
}
