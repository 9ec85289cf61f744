//! Keyword extractors: `text` → `words[*]`.

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use super::parse_options;
use crate::errors::{EmbeddingsError, Result};
use crate::pipeline::artifacts::Value;
use crate::pipeline::errors::ShapeViolation;
use crate::pipeline::shape::{Extent, ShapeDescriptor};
use crate::pipeline::traits::Step;

fn text_input<'a>(step: &dyn Step, input: &'a Value) -> std::result::Result<&'a str, ShapeViolation> {
    input.as_text().ok_or_else(|| {
        ShapeViolation::new(step.input_shape(), input.describe())
            .with_detail("keyword extraction needs a sentence")
    })
}

// ─── DummyKeywordExtractor ──────────────────────────────────────────────────

/// Options for [`DummyKeywordExtractor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DummyKeywordExtractorOptions {
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_separator() -> String {
    " ".to_string()
}

impl Default for DummyKeywordExtractorOptions {
    fn default() -> Self {
        Self {
            separator: default_separator(),
        }
    }
}

/// Splits the sentence on a fixed separator. Empty pieces are dropped, so
/// repeated or trailing separators never produce empty words.
#[derive(Debug, Clone)]
pub struct DummyKeywordExtractor {
    separator: String,
}

impl DummyKeywordExtractor {
    pub fn new(separator: impl Into<String>) -> Result<Self> {
        let separator = separator.into();
        if separator.is_empty() {
            return Err(EmbeddingsError::invalid_config(
                "separator must not be empty",
            ));
        }
        Ok(Self { separator })
    }

    pub fn from_options(options: &serde_json::Value) -> Result<Self> {
        let opts: DummyKeywordExtractorOptions = parse_options(options)?;
        Self::new(opts.separator)
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }
}

impl Step for DummyKeywordExtractor {
    fn name(&self) -> &str {
        "dummy_keyword_extractor"
    }

    fn input_shape(&self) -> ShapeDescriptor {
        ShapeDescriptor::Text
    }

    fn output_shape(&self) -> ShapeDescriptor {
        ShapeDescriptor::words(Extent::Any)
    }

    fn transform(&self, input: &Value) -> std::result::Result<Value, ShapeViolation> {
        let text = text_input(self, input)?;
        let words = text
            .split(self.separator.as_str())
            .filter(|piece| !piece.is_empty())
            .map(str::to_string)
            .collect();
        Ok(Value::Words(words))
    }
}

// ─── UnicodeKeywordExtractor ────────────────────────────────────────────────

/// Options for [`UnicodeKeywordExtractor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnicodeKeywordExtractorOptions {
    #[serde(default = "default_min_length")]
    pub min_length: usize,
    #[serde(default)]
    pub lowercase: bool,
}

fn default_min_length() -> usize {
    1
}

impl Default for UnicodeKeywordExtractorOptions {
    fn default() -> Self {
        Self {
            min_length: default_min_length(),
            lowercase: false,
        }
    }
}

/// UAX #29 word segmentation. Handles CJK, emoji, and contractions;
/// pure punctuation and words shorter than `min_length` characters are
/// skipped.
#[derive(Debug, Clone)]
pub struct UnicodeKeywordExtractor {
    min_length: usize,
    lowercase: bool,
}

impl UnicodeKeywordExtractor {
    pub fn new() -> Self {
        Self {
            min_length: default_min_length(),
            lowercase: false,
        }
    }

    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = min_length;
        self
    }

    pub fn with_lowercase(mut self, lowercase: bool) -> Self {
        self.lowercase = lowercase;
        self
    }

    pub fn from_options(options: &serde_json::Value) -> Result<Self> {
        let opts: UnicodeKeywordExtractorOptions = parse_options(options)?;
        Ok(Self::new()
            .with_min_length(opts.min_length)
            .with_lowercase(opts.lowercase))
    }

    /// Segment `text` into words.
    pub fn extract(&self, text: &str) -> Vec<String> {
        text.unicode_words()
            .filter(|word| word.chars().count() >= self.min_length)
            .filter(|word| word.chars().any(char::is_alphanumeric))
            .map(|word| {
                if self.lowercase {
                    word.to_lowercase()
                } else {
                    word.to_string()
                }
            })
            .collect()
    }
}

impl Default for UnicodeKeywordExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Step for UnicodeKeywordExtractor {
    fn name(&self) -> &str {
        "unicode_keyword_extractor"
    }

    fn input_shape(&self) -> ShapeDescriptor {
        ShapeDescriptor::Text
    }

    fn output_shape(&self) -> ShapeDescriptor {
        ShapeDescriptor::words(Extent::Any)
    }

    fn transform(&self, input: &Value) -> std::result::Result<Value, ShapeViolation> {
        let text = text_input(self, input)?;
        Ok(Value::Words(self.extract(text)))
    }
}
