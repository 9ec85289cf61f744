//! Shape descriptors: the declared contract on every pipeline edge.
//!
//! A [`ShapeDescriptor`] is a kind tag plus the numeric parameters (item
//! count, vector dimensionality, branch count) that must agree between a
//! producing step and the step consuming its output. Each parameter is an
//! [`Extent`]: either a fixed number or `any`.
//!
//! Two checks are defined here:
//!
//! - [`ShapeDescriptor::accepts`] compares two *declared* shapes (build time).
//! - [`ShapeDescriptor::conform`] compares a declared shape with an actual
//!   [`Value`] (run time).

use std::fmt;

use serde::{Deserialize, Serialize};

use super::artifacts::Value;
use super::error_code::ErrorCode;
use super::errors::ShapeViolation;

// ─── Extent ─────────────────────────────────────────────────────────────────

/// A numeric shape parameter: exact, bounded below, or declared as
/// accepting any value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Extent {
    Any,
    Fixed(usize),
    /// `n` or more.
    AtLeast(usize),
}

impl Extent {
    /// Whether a consumer declaring `self` accepts a producer declaring
    /// `produced`. A bounded consumer never accepts a variable producer.
    #[inline]
    pub fn accepts(self, produced: Extent) -> bool {
        match (self, produced) {
            (Extent::Any, _) => true,
            (Extent::Fixed(want), Extent::Fixed(got)) => want == got,
            (Extent::AtLeast(min), Extent::Fixed(got) | Extent::AtLeast(got)) => got >= min,
            (Extent::Fixed(_), Extent::AtLeast(_))
            | (Extent::Fixed(_) | Extent::AtLeast(_), Extent::Any) => false,
        }
    }

    /// Whether an actual runtime quantity satisfies this extent.
    #[inline]
    pub fn admits(self, actual: usize) -> bool {
        match self {
            Extent::Any => true,
            Extent::Fixed(n) => n == actual,
            Extent::AtLeast(min) => actual >= min,
        }
    }

    /// The exact value, when there is one.
    pub fn fixed(self) -> Option<usize> {
        match self {
            Extent::Fixed(n) => Some(n),
            Extent::Any | Extent::AtLeast(_) => None,
        }
    }

    pub fn is_any(self) -> bool {
        matches!(self, Extent::Any)
    }
}

impl From<usize> for Extent {
    fn from(n: usize) -> Self {
        Extent::Fixed(n)
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Extent::Any => f.write_str("*"),
            Extent::Fixed(n) => write!(f, "{n}"),
            Extent::AtLeast(n) => write!(f, ">={n}"),
        }
    }
}

// ─── ShapeKind ──────────────────────────────────────────────────────────────

/// The kind tag of a [`ShapeDescriptor`], without its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Text,
    Words,
    VectorBatch,
    Vector,
    Merged,
}

impl ShapeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Words => "words",
            Self::VectorBatch => "vectors",
            Self::Vector => "vector",
            Self::Merged => "merged",
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── ShapeDescriptor ────────────────────────────────────────────────────────

/// Semantic description of a value flowing between steps.
///
/// | Variant | Meaning | Display |
/// |---------|---------|---------|
/// | `Text` | a raw sentence | `text` |
/// | `Words` | a sequence of N words | `words[N]` |
/// | `VectorBatch` | N vectors of dimension D | `vectors[N; D]` |
/// | `Vector` | one vector of dimension D | `vector[D]` |
/// | `Merged` | N parallel branch outputs, each shaped like `item` | `merged[N x item]` |
///
/// `Merged` only appears as the declared *input* of a merge step; the
/// checker synthesizes the producing side from the parallel stage's branches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShapeDescriptor {
    Text,
    Words {
        count: Extent,
    },
    VectorBatch {
        count: Extent,
        dim: Extent,
    },
    Vector {
        dim: Extent,
    },
    Merged {
        branches: Extent,
        item: Box<ShapeDescriptor>,
    },
}

impl ShapeDescriptor {
    pub fn words(count: Extent) -> Self {
        Self::Words { count }
    }

    pub fn vector_batch(count: Extent, dim: Extent) -> Self {
        Self::VectorBatch { count, dim }
    }

    pub fn vector(dim: usize) -> Self {
        Self::Vector {
            dim: Extent::Fixed(dim),
        }
    }

    pub fn merged(branches: Extent, item: ShapeDescriptor) -> Self {
        Self::Merged {
            branches,
            item: Box::new(item),
        }
    }

    pub fn kind(&self) -> ShapeKind {
        match self {
            Self::Text => ShapeKind::Text,
            Self::Words { .. } => ShapeKind::Words,
            Self::VectorBatch { .. } => ShapeKind::VectorBatch,
            Self::Vector { .. } => ShapeKind::Vector,
            Self::Merged { .. } => ShapeKind::Merged,
        }
    }

    /// The declared vector dimensionality, if this shape carries one.
    pub fn dim(&self) -> Option<Extent> {
        match self {
            Self::VectorBatch { dim, .. } | Self::Vector { dim } => Some(*dim),
            _ => None,
        }
    }

    /// Check that a consumer declaring `self` accepts a producer declaring
    /// `produced`.
    ///
    /// The kind tag is compared first, then dimensionality (always fatal),
    /// then counts (fatal unless `self` declares `any`).
    pub fn accepts(&self, produced: &ShapeDescriptor) -> Result<(), Mismatch> {
        use ShapeDescriptor as S;

        match (self, produced) {
            (S::Text, S::Text) => Ok(()),
            (S::Words { count }, S::Words { count: got }) => check_count(*count, *got),
            (
                S::VectorBatch { count, dim },
                S::VectorBatch {
                    count: got_count,
                    dim: got_dim,
                },
            ) => {
                check_dim(*dim, *got_dim)?;
                check_count(*count, *got_count)
            }
            (S::Vector { dim }, S::Vector { dim: got }) => check_dim(*dim, *got),
            (
                S::Merged { branches, item },
                S::Merged {
                    branches: got_branches,
                    item: got_item,
                },
            ) => {
                if !branches.accepts(*got_branches) {
                    return Err(Mismatch::BranchCount {
                        expected: *branches,
                        found: *got_branches,
                    });
                }
                item.accepts(got_item)
            }
            _ => Err(Mismatch::Kind {
                expected: self.kind(),
                found: produced.kind(),
            }),
        }
    }

    /// Check an actual value against this declared shape.
    pub fn conform(&self, value: &Value) -> Result<(), ShapeViolation> {
        use ShapeDescriptor as S;

        let violation = |detail: String| {
            ShapeViolation::new(self.clone(), value.describe()).with_detail(detail)
        };

        match (self, value) {
            (S::Text, Value::Text(_)) => Ok(()),
            (S::Words { count }, Value::Words(words)) => {
                if count.admits(words.len()) {
                    Ok(())
                } else {
                    Err(violation(format!(
                        "expected {count} words, got {}",
                        words.len()
                    )))
                }
            }
            (S::VectorBatch { count, dim }, Value::VectorBatch(batch)) => {
                if !count.admits(batch.len()) {
                    return Err(violation(format!(
                        "expected {count} vectors, got {}",
                        batch.len()
                    )));
                }
                match uniform_dim(batch) {
                    Err(()) => Err(violation("batch mixes vector dimensionalities".into())),
                    Ok(Some(actual)) if !dim.admits(actual) => Err(violation(format!(
                        "expected dimensionality {dim}, got {actual}"
                    ))),
                    Ok(_) => Ok(()),
                }
            }
            (S::Vector { dim }, Value::Vector(values)) => {
                if dim.admits(values.len()) {
                    Ok(())
                } else {
                    Err(violation(format!(
                        "expected dimensionality {dim}, got {}",
                        values.len()
                    )))
                }
            }
            (S::Merged { branches, item }, Value::Merged(values)) => {
                if !branches.admits(values.len()) {
                    return Err(violation(format!(
                        "expected {branches} branches, got {}",
                        values.len()
                    )));
                }
                for (i, branch) in values.iter().enumerate() {
                    if let Err(inner) = item.conform(branch) {
                        return Err(violation(format!("branch {i}: {inner}")));
                    }
                }
                Ok(())
            }
            _ => Err(violation(format!(
                "expected a {} value, got {}",
                self.kind(),
                value.kind()
            ))),
        }
    }
}

impl fmt::Display for ShapeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Words { count } => write!(f, "words[{count}]"),
            Self::VectorBatch { count, dim } => write!(f, "vectors[{count}; {dim}]"),
            Self::Vector { dim } => write!(f, "vector[{dim}]"),
            Self::Merged { branches, item } => write!(f, "merged[{branches} x {item}]"),
        }
    }
}

fn check_dim(expected: Extent, found: Extent) -> Result<(), Mismatch> {
    if expected.accepts(found) {
        Ok(())
    } else {
        Err(Mismatch::Dimension { expected, found })
    }
}

fn check_count(expected: Extent, found: Extent) -> Result<(), Mismatch> {
    if expected.accepts(found) {
        Ok(())
    } else {
        Err(Mismatch::Count { expected, found })
    }
}

/// `Ok(None)` for an empty batch, `Err(())` when dimensionalities differ.
fn uniform_dim(batch: &[Vec<f32>]) -> Result<Option<usize>, ()> {
    let Some(first) = batch.first() else {
        return Ok(None);
    };
    if batch.iter().all(|v| v.len() == first.len()) {
        Ok(Some(first.len()))
    } else {
        Err(())
    }
}

// ─── Mismatch ───────────────────────────────────────────────────────────────

/// Why a consumer rejected a producer's declared shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Mismatch {
    Kind { expected: ShapeKind, found: ShapeKind },
    Dimension { expected: Extent, found: Extent },
    Count { expected: Extent, found: Extent },
    BranchCount { expected: Extent, found: Extent },
}

impl Mismatch {
    /// The build error code reported for this mismatch.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Kind { .. } => ErrorCode::KindMismatch,
            Self::Dimension { .. } => ErrorCode::DimensionMismatch,
            Self::Count { .. } => ErrorCode::CountMismatch,
            Self::BranchCount { .. } => ErrorCode::BranchCountMismatch,
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kind { expected, found } => {
                write!(f, "kind mismatch: expected {expected}, found {found}")
            }
            Self::Dimension {
                expected,
                found: Extent::Any,
            } => write!(
                f,
                "dimensionality mismatch: consumer requires {expected} but producer declares a variable dimensionality"
            ),
            Self::Dimension { expected, found } => write!(
                f,
                "dimensionality mismatch: consumer requires {expected}, producer declares {found}"
            ),
            Self::Count {
                expected,
                found: Extent::Any,
            } => write!(
                f,
                "count mismatch: consumer requires {expected} items but producer emits a variable count"
            ),
            Self::Count { expected, found } => write!(
                f,
                "count mismatch: consumer requires {expected} items, producer declares {found}"
            ),
            Self::BranchCount { expected, found } => write!(
                f,
                "branch count mismatch: merge step accepts {expected} branches, {found} incoming"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(count: Extent, dim: Extent) -> ShapeDescriptor {
        ShapeDescriptor::vector_batch(count, dim)
    }

    #[test]
    fn test_extent_accepts() {
        assert!(Extent::Any.accepts(Extent::Fixed(3)));
        assert!(Extent::Any.accepts(Extent::Any));
        assert!(Extent::Fixed(3).accepts(Extent::Fixed(3)));
        assert!(!Extent::Fixed(3).accepts(Extent::Fixed(4)));
        assert!(!Extent::Fixed(3).accepts(Extent::Any));
    }

    #[test]
    fn test_lower_bound_extent() {
        assert!(Extent::AtLeast(16).accepts(Extent::Fixed(16)));
        assert!(Extent::AtLeast(16).accepts(Extent::Fixed(256)));
        assert!(!Extent::AtLeast(16).accepts(Extent::Fixed(8)));
        assert!(!Extent::AtLeast(16).accepts(Extent::Any));
        assert!(Extent::AtLeast(4).accepts(Extent::AtLeast(8)));
        assert!(!Extent::AtLeast(8).accepts(Extent::AtLeast(4)));
        assert!(!Extent::Fixed(8).accepts(Extent::AtLeast(8)));
        assert!(Extent::AtLeast(2).admits(3));
        assert!(!Extent::AtLeast(2).admits(1));
        assert_eq!(Extent::AtLeast(2).fixed(), None);
    }

    #[test]
    fn test_too_narrow_producer_is_dimension_mismatch() {
        let consumer = batch(Extent::Any, Extent::AtLeast(16));
        assert_eq!(consumer.to_string(), "vectors[*; >=16]");
        let err = consumer
            .accepts(&batch(Extent::Any, Extent::Fixed(8)))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::DimensionMismatch);
        assert!(consumer.accepts(&batch(Extent::Any, Extent::Fixed(16))).is_ok());
    }

    #[test]
    fn test_display() {
        assert_eq!(ShapeDescriptor::Text.to_string(), "text");
        assert_eq!(ShapeDescriptor::words(Extent::Any).to_string(), "words[*]");
        assert_eq!(
            batch(Extent::Any, Extent::Fixed(256)).to_string(),
            "vectors[*; 256]"
        );
        assert_eq!(ShapeDescriptor::vector(16).to_string(), "vector[16]");
        assert_eq!(
            ShapeDescriptor::merged(Extent::Fixed(2), batch(Extent::Any, Extent::Fixed(8)))
                .to_string(),
            "merged[2 x vectors[*; 8]]"
        );
    }

    #[test]
    fn test_same_shapes_accept() {
        let s = batch(Extent::Any, Extent::Fixed(256));
        assert!(s.accepts(&s).is_ok());
        assert!(ShapeDescriptor::Text.accepts(&ShapeDescriptor::Text).is_ok());
    }

    #[test]
    fn test_kind_mismatch() {
        let err = ShapeDescriptor::vector(16)
            .accepts(&ShapeDescriptor::words(Extent::Any))
            .unwrap_err();
        assert_eq!(
            err,
            Mismatch::Kind {
                expected: ShapeKind::Vector,
                found: ShapeKind::Words
            }
        );
        assert_eq!(err.code(), ErrorCode::KindMismatch);
    }

    #[test]
    fn test_dimension_mismatch_is_fatal_even_with_any_count() {
        let consumer = batch(Extent::Any, Extent::Fixed(256));
        let err = consumer
            .accepts(&batch(Extent::Any, Extent::Fixed(128)))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::DimensionMismatch);
    }

    #[test]
    fn test_variable_dimension_into_fixed_consumer_fails() {
        let consumer = batch(Extent::Any, Extent::Fixed(256));
        let err = consumer.accepts(&batch(Extent::Any, Extent::Any)).unwrap_err();
        assert!(err.to_string().contains("variable dimensionality"));
    }

    #[test]
    fn test_count_mismatch_unless_consumer_is_any() {
        let fixed = batch(Extent::Fixed(4), Extent::Fixed(8));
        let err = fixed.accepts(&batch(Extent::Any, Extent::Fixed(8))).unwrap_err();
        assert_eq!(err.code(), ErrorCode::CountMismatch);
        assert!(err.to_string().contains("variable count"));

        let any = batch(Extent::Any, Extent::Fixed(8));
        assert!(any.accepts(&batch(Extent::Fixed(4), Extent::Fixed(8))).is_ok());
    }

    #[test]
    fn test_dimension_checked_before_count() {
        let consumer = batch(Extent::Fixed(4), Extent::Fixed(8));
        let err = consumer
            .accepts(&batch(Extent::Fixed(5), Extent::Fixed(9)))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::DimensionMismatch);
    }

    #[test]
    fn test_merged_branch_count() {
        let item = batch(Extent::Any, Extent::Fixed(8));
        let consumer = ShapeDescriptor::merged(Extent::Fixed(2), item.clone());
        let err = consumer
            .accepts(&ShapeDescriptor::merged(Extent::Fixed(3), item.clone()))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::BranchCountMismatch);

        let variable = ShapeDescriptor::merged(Extent::Any, item.clone());
        assert!(variable
            .accepts(&ShapeDescriptor::merged(Extent::Fixed(3), item))
            .is_ok());
    }

    #[test]
    fn test_conform_words() {
        let shape = ShapeDescriptor::words(Extent::Any);
        assert!(shape.conform(&Value::Words(vec!["a".into()])).is_ok());
        assert!(shape.conform(&Value::Text("a".into())).is_err());

        let fixed = ShapeDescriptor::words(Extent::Fixed(2));
        let err = fixed.conform(&Value::Words(vec!["a".into()])).unwrap_err();
        assert!(err.to_string().contains("expected 2 words, got 1"));
    }

    #[test]
    fn test_conform_batch_dimensions() {
        let shape = batch(Extent::Any, Extent::Fixed(3));
        assert!(shape
            .conform(&Value::VectorBatch(vec![vec![0.0; 3], vec![1.0; 3]]))
            .is_ok());
        assert!(shape.conform(&Value::VectorBatch(vec![])).is_ok());
        assert!(shape.conform(&Value::VectorBatch(vec![vec![0.0; 4]])).is_err());

        let ragged = Value::VectorBatch(vec![vec![0.0; 3], vec![0.0; 2]]);
        let err = batch(Extent::Any, Extent::Any).conform(&ragged).unwrap_err();
        assert!(err.to_string().contains("mixes"));
    }

    #[test]
    fn test_conform_merged_reports_branch() {
        let shape = ShapeDescriptor::merged(Extent::Any, batch(Extent::Any, Extent::Fixed(2)));
        let value = Value::Merged(vec![
            Value::VectorBatch(vec![vec![0.0; 2]]),
            Value::VectorBatch(vec![vec![0.0; 5]]),
        ]);
        let err = shape.conform(&value).unwrap_err();
        assert!(err.to_string().contains("branch 1"));
    }

    #[test]
    fn test_shape_serde_shape() {
        let json = serde_json::to_value(ShapeDescriptor::vector(16)).unwrap();
        assert_eq!(json["kind"], "vector");
        assert_eq!(json["dim"]["fixed"], 16);

        let any = serde_json::to_value(ShapeDescriptor::words(Extent::Any)).unwrap();
        assert_eq!(any["count"], "any");
    }
}
