//! Error taxonomy for validation.
//!
//! [`ValidationError`] is the one carrier of data failures: a message plus a
//! non-empty [`Differences`] container, rendered deterministically and
//! optionally truncated. Every other failure mode (malformed deviation
//! arguments, a predicate returning garbage, bad tolerance bounds) is a
//! programming error and gets its own [`VeridiffError`] variant.

use std::fmt;
use std::sync::Arc;

use veridiff_types::{Difference, Differences, DiffGroup, Value};

/// Decides when rendering stops: called with the running line count and
/// character count before each entry is committed to the output.
pub type TruncationPredicate = Arc<dyn Fn(usize, usize) -> bool + Send + Sync>;

/// Raised when data validation fails.
///
/// Carries the failed requirement's description and the differences found.
/// The `Display` form lists every difference, sorted, one per line; a
/// truncation policy can cap the output for very large failures.
#[derive(Clone)]
pub struct ValidationError {
    message: String,
    differences: Differences,
    should_truncate: Option<TruncationPredicate>,
    truncation_notice: Option<String>,
}

impl ValidationError {
    /// Build a validation error from a message and its differences.
    ///
    /// An empty differences container is rejected: an error with nothing
    /// wrong in it is a bug at the call site.
    pub fn new(
        message: impl Into<String>,
        differences: impl Into<Differences>,
    ) -> Result<Self, VeridiffError> {
        let differences = differences.into();
        if differences.is_empty() {
            return Err(VeridiffError::EmptyDifferences);
        }
        Ok(Self {
            message: message.into(),
            differences,
            should_truncate: None,
            truncation_notice: None,
        })
    }

    /// A brief description of the failed requirement.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The differences found in the data under test.
    pub fn differences(&self) -> &Differences {
        &self.differences
    }

    /// Consume the error, keeping only its differences.
    pub fn into_differences(self) -> Differences {
        self.differences
    }

    /// Install or clear the output truncation policy.
    ///
    /// A filtered error re-raised by an allowance inherits the policy of
    /// the error it was built from.
    pub fn set_truncation(
        &mut self,
        should_truncate: Option<TruncationPredicate>,
        notice: Option<String>,
    ) {
        self.should_truncate = should_truncate;
        self.truncation_notice = notice;
    }

    /// The installed truncation predicate, if any.
    pub fn truncation_predicate(&self) -> Option<TruncationPredicate> {
        self.should_truncate.clone()
    }

    /// The notice appended to truncated output, if any.
    pub fn truncation_notice(&self) -> Option<&str> {
        self.truncation_notice.as_deref()
    }

    fn render_lines(&self) -> (char, &'static str, Vec<String>) {
        fn args_key(diff: &Difference) -> Vec<veridiff_types::Canon> {
            diff.args().iter().map(Value::canon).collect()
        }

        match &self.differences {
            Differences::List(items) => {
                let mut sorted: Vec<&Difference> = items.iter().collect();
                sorted.sort_by_cached_key(|d| args_key(d));
                let lines = sorted.iter().map(|d| format!("    {d},")).collect();
                ('[', "]", lines)
            }
            Differences::Map(groups) => {
                let mut sorted: Vec<&(Value, DiffGroup)> = groups.iter().collect();
                sorted.sort_by_cached_key(|(key, _)| key.canon());
                let lines = sorted
                    .iter()
                    .map(|(key, group)| match group {
                        DiffGroup::One(diff) => format!("    {key}: {diff},"),
                        DiffGroup::Many(items) => {
                            let mut inner: Vec<&Difference> = items.iter().collect();
                            inner.sort_by_cached_key(|d| args_key(d));
                            let joined = inner
                                .iter()
                                .map(ToString::to_string)
                                .collect::<Vec<_>>()
                                .join(", ");
                            format!("    {key}: [{joined}],")
                        }
                    })
                    .collect();
                ('{', "}", lines)
            }
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (begin, close, lines) = self.render_lines();

        let mut kept: Vec<String> = Vec::with_capacity(lines.len());
        let mut line_count = 0usize;
        let mut end = close.to_owned();

        if let Some(should_truncate) = &self.should_truncate {
            let mut char_count = 0usize;
            let mut iter = lines.into_iter();
            for line in iter.by_ref() {
                line_count += 1;
                char_count += line.chars().count();
                if should_truncate(line_count, char_count) {
                    // The triggering entry and everything after it are
                    // counted but not shown.
                    line_count += iter.count();
                    end = "    ...".to_owned();
                    if let Some(notice) = &self.truncation_notice {
                        end.push_str("\n\n");
                        end.push_str(notice);
                    }
                    break;
                }
                kept.push(line);
            }
        } else {
            line_count = lines.len();
            kept = lines;
        }

        let plural = if line_count == 1 { "" } else { "s" };
        write!(
            f,
            "{} ({} difference{}): {}\n{}\n{}",
            self.message,
            line_count,
            plural,
            begin,
            kept.join("\n"),
            end,
        )
    }
}

impl fmt::Debug for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationError")
            .field("message", &self.message)
            .field("differences", &self.differences)
            .finish_non_exhaustive()
    }
}

impl std::error::Error for ValidationError {}

/// Top-level error type for validation and allowance operations.
#[derive(Debug, thiserror::Error)]
pub enum VeridiffError {
    /// Data failed its requirement.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A predicate returned something other than a pass/fail answer or a
    /// difference.
    #[error("'{callable}' returned {reply}, should return true, false or a difference")]
    PredicateReturn { callable: String, reply: String },

    /// Allowance filtering produced a container shape incompatible with
    /// the shape it received.
    #[error("allowance produced {returned} differences for {received} input")]
    ShapeMismatch {
        received: &'static str,
        returned: &'static str,
    },

    /// Sequence requirements need list-shaped data.
    #[error("data type '{data_shape}' can not be checked for sequence order")]
    SequenceShape { data_shape: &'static str },

    /// Mapping requirements need a mapping or key/value pairs.
    #[error("data must be a mapping or an iterable of key-value items, got '{data_shape}'")]
    MappingShape { data_shape: &'static str },

    /// A validation error may not be constructed without differences.
    #[error("differences container must not be empty")]
    EmptyDifferences,

    /// Deviation arguments outside the acceptance matrix.
    #[error(transparent)]
    Difference(#[from] veridiff_types::DeviationArgsError),

    /// Malformed tolerance bounds for a deviation allowance.
    #[error("invalid tolerance: {detail}")]
    Tolerance { detail: String },
}
