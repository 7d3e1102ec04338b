/*!
 * Core segment types.
 *
 * A segment is the smallest translatable unit of a document, roughly a
 * paragraph or a table cell. Formulas have already been replaced by
 * `{{MATH_N}}` placeholders that must survive translation untouched.
 */

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::errors::AppError;

/// A unit of translatable content.
///
/// Immutable once created; the pipeline only ever reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Stable identifier assigned by the document collaborator
    pub id: String,

    /// Original text
    pub text: String,

    /// Protected placeholders present in the text (e.g. `{{MATH_0}}`)
    #[serde(default)]
    pub placeholders: Vec<String>,
}

impl Segment {
    /// Create a segment without placeholders
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            placeholders: Vec::new(),
        }
    }

    /// Attach protected placeholders
    pub fn with_placeholders(mut self, placeholders: Vec<String>) -> Self {
        self.placeholders = placeholders;
        self
    }
}

/// Wire form of a segment file: either a bare array or a named document
#[derive(Deserialize)]
#[serde(untagged)]
enum SegmentFile {
    Named {
        #[serde(default)]
        name: Option<String>,
        segments: Vec<Segment>,
    },
    Bare(Vec<Segment>),
}

/// An ordered collection of segments from one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentDocument {
    /// Base name used for output files
    pub name: String,

    /// Segments in document order
    pub segments: Vec<Segment>,
}

impl SegmentDocument {
    /// Create a document, rejecting duplicate segment IDs
    pub fn new(name: impl Into<String>, segments: Vec<Segment>) -> Result<Self, AppError> {
        let mut seen = HashSet::with_capacity(segments.len());
        for segment in &segments {
            if !seen.insert(segment.id.as_str()) {
                return Err(AppError::Document(format!(
                    "Duplicate segment id: {}",
                    segment.id
                )));
            }
        }

        Ok(Self {
            name: name.into(),
            segments,
        })
    }

    /// Parse a JSON segment file
    pub fn from_json(default_name: &str, json: &str) -> Result<Self, AppError> {
        let parsed: SegmentFile = serde_json::from_str(json)
            .map_err(|e| AppError::Document(format!("Invalid segment file: {}", e)))?;

        match parsed {
            SegmentFile::Named { name, segments } => {
                Self::new(name.unwrap_or_else(|| default_name.to_string()), segments)
            }
            SegmentFile::Bare(segments) => Self::new(default_name, segments),
        }
    }

    /// Split plain text into paragraph segments separated by blank lines
    pub fn from_plain_text(name: &str, text: &str) -> Self {
        let mut segments = Vec::new();
        let mut current: Vec<&str> = Vec::new();

        for line in text.lines() {
            if line.trim().is_empty() {
                if !current.is_empty() {
                    segments.push(Segment::new(format!("p{}", segments.len() + 1), current.join("\n")));
                    current.clear();
                }
            } else {
                current.push(line);
            }
        }
        if !current.is_empty() {
            segments.push(Segment::new(format!("p{}", segments.len() + 1), current.join("\n")));
        }

        Self {
            name: name.to_string(),
            segments,
        }
    }

    /// Load a document from a `.json` segment file or a plain-text file
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Document(format!("Cannot read {}: {}", path.display(), e)))?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document")
            .to_string();

        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json(&name, &content)
        } else {
            Ok(Self::from_plain_text(&name, &content))
        }
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the document has no segments
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}
