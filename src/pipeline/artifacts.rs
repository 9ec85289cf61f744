//! Values flowing between pipeline steps.
//!
//! A [`Value`] is the runtime counterpart of a
//! [`ShapeDescriptor`](super::shape::ShapeDescriptor): every step receives one
//! by reference and returns a fresh one. Fan-out stages hand the same borrowed
//! value to every branch; fan-in collects branch outputs into
//! [`Value::Merged`] in branch order.

use serde::{Deserialize, Serialize};

use super::shape::ShapeKind;

/// A typed intermediate result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Value {
    /// A raw input sentence.
    Text(String),
    /// An ordered sequence of words.
    Words(Vec<String>),
    /// One vector per item, all of the same dimensionality.
    VectorBatch(Vec<Vec<f32>>),
    /// A single vector.
    Vector(Vec<f32>),
    /// Outputs of parallel branches, in branch order.
    Merged(Vec<Value>),
}

impl Value {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Self::Text(_) => ShapeKind::Text,
            Self::Words(_) => ShapeKind::Words,
            Self::VectorBatch(_) => ShapeKind::VectorBatch,
            Self::Vector(_) => ShapeKind::Vector,
            Self::Merged(_) => ShapeKind::Merged,
        }
    }

    /// Describe the actual shape of this value, in the same notation used by
    /// [`ShapeDescriptor`](super::shape::ShapeDescriptor)'s `Display`.
    ///
    /// A batch whose vectors disagree on length is shown as `ragged`.
    pub fn describe(&self) -> String {
        match self {
            Self::Text(_) => "text".to_string(),
            Self::Words(words) => format!("words[{}]", words.len()),
            Self::VectorBatch(batch) => match batch.first() {
                None => "vectors[0; *]".to_string(),
                Some(first) if batch.iter().all(|v| v.len() == first.len()) => {
                    format!("vectors[{}; {}]", batch.len(), first.len())
                }
                Some(_) => format!("vectors[{}; ragged]", batch.len()),
            },
            Self::Vector(values) => format!("vector[{}]", values.len()),
            Self::Merged(branches) => {
                let inner: Vec<String> = branches.iter().map(Value::describe).collect();
                format!("merged[{}]", inner.join(", "))
            }
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_words(&self) -> Option<&[String]> {
        match self {
            Self::Words(words) => Some(words),
            _ => None,
        }
    }

    pub fn as_vector_batch(&self) -> Option<&[Vec<f32>]> {
        match self {
            Self::VectorBatch(batch) => Some(batch),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&[f32]> {
        match self {
            Self::Vector(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_merged(&self) -> Option<&[Value]> {
        match self {
            Self::Merged(branches) => Some(branches),
            _ => None,
        }
    }

    /// Consume the value, returning the vector if this is a [`Value::Vector`].
    pub fn into_vector(self) -> Option<Vec<f32>> {
        match self {
            Self::Vector(values) => Some(values),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}
