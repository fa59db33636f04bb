use std::error::Error;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::slice;

use crate::canon::Canon;
use crate::value::Value;

/// A typed record of one mismatch between observed data and a requirement.
///
/// Differences are immutable values: equal fields make interchangeable
/// differences, matching is canonical (NaN fields match NaN fields, `1`
/// matches `1.0`), and every variant renders constructor-style so a failure
/// message reads back as the code that would rebuild it.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum Difference {
    /// A required value absent from the data.
    Missing(Value),
    /// An observed value the requirement does not ask for.
    Extra(Value),
    /// An observed value that fails a predicate, equality, or regex check.
    Invalid {
        value: Value,
        expected: Option<Value>,
    },
    /// An observed numeric value off from its expected baseline.
    Deviation { delta: Value, expected: Value },
    /// An entry of an allowed-difference list that nothing consumed.
    AllowedNotFound(Box<Difference>),
}

/// Error for deviation arguments outside the acceptance matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviationArgsError {
    delta: String,
    expected: String,
}

impl fmt::Display for DeviationArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid deviation arguments, got delta={}, expected={}",
            self.delta, self.expected
        )
    }
}

impl Error for DeviationArgsError {}

impl Difference {
    /// A required value that the data does not contain.
    pub fn missing(value: impl Into<Value>) -> Self {
        Self::Missing(value.into())
    }

    /// An observed value that the requirement does not contain.
    pub fn extra(value: impl Into<Value>) -> Self {
        Self::Extra(value.into())
    }

    /// A failed check with no expected counterpart recorded.
    pub fn invalid(value: impl Into<Value>) -> Self {
        Self::Invalid {
            value: value.into(),
            expected: None,
        }
    }

    /// A failed check recording what was expected.
    ///
    /// A `Null` expected value collapses to the bare form, so
    /// `invalid_expected(v, Value::Null)` and `invalid(v)` are the same
    /// difference.
    pub fn invalid_expected(value: impl Into<Value>, expected: impl Into<Value>) -> Self {
        let expected = expected.into();
        Self::Invalid {
            value: value.into(),
            expected: if expected.is_null() {
                None
            } else {
                Some(expected)
            },
        }
    }

    /// A numeric mismatch as a signed delta from an expected baseline.
    ///
    /// The acceptance matrix:
    /// - expected is numeric zero: delta must be non-zero, and numeric or
    ///   vacant;
    /// - expected is vacant (`Null`, `""`): delta must be numeric (zero and
    ///   NaN included);
    /// - expected is any other non-NaN number: delta must be numeric and
    ///   non-zero;
    /// - anything else (NaN expected, non-numeric expected) is rejected.
    pub fn deviation(
        delta: impl Into<Value>,
        expected: impl Into<Value>,
    ) -> Result<Self, DeviationArgsError> {
        let delta = delta.into();
        let expected = expected.into();

        let is_zero = |v: &Value| v.as_number().is_some_and(|n| n == 0.0);
        let acceptable = if is_zero(&expected) {
            !is_zero(&delta) && (delta.is_number() || delta.is_vacant())
        } else if expected.is_vacant() {
            delta.is_number()
        } else if expected.is_number() {
            !expected.is_nan() && delta.is_number() && !is_zero(&delta)
        } else {
            false
        };

        if !acceptable {
            return Err(DeviationArgsError {
                delta: delta.to_string(),
                expected: expected.to_string(),
            });
        }
        Ok(Self::Deviation { delta, expected })
    }

    /// The constructor arguments of this difference, in order.
    ///
    /// The residual variant reports its inner difference's arguments.
    pub fn args(&self) -> Vec<Value> {
        match self {
            Self::Missing(v) | Self::Extra(v) => vec![v.clone()],
            Self::Invalid { value, expected } => match expected {
                Some(e) => vec![value.clone(), e.clone()],
                None => vec![value.clone()],
            },
            Self::Deviation { delta, expected } => vec![delta.clone(), expected.clone()],
            Self::AllowedNotFound(inner) => inner.args(),
        }
    }

    /// The signed delta of a deviation.
    pub fn delta(&self) -> Option<&Value> {
        match self {
            Self::Deviation { delta, .. } => Some(delta),
            _ => None,
        }
    }

    /// The expected baseline of a deviation.
    pub fn expected(&self) -> Option<&Value> {
        match self {
            Self::Deviation { expected, .. } => Some(expected),
            _ => None,
        }
    }

    /// Delta over expected, for percent-tolerance checks.
    ///
    /// Zero whenever the expected baseline is vacant or zero; NaN
    /// propagates from a NaN delta.
    pub fn percent_deviation(&self) -> Option<f64> {
        let Self::Deviation { delta, expected } = self else {
            return None;
        };
        let baseline = match expected.as_number() {
            Some(n) if n != 0.0 => n,
            _ => return Some(0.0),
        };
        Some(delta.as_number().unwrap_or(0.0) / baseline)
    }

    fn canon_key(&self) -> (Vec<u8>, Vec<Canon>) {
        // Variant tags down the (possibly wrapped) chain, then the
        // innermost difference's canonical arguments.
        let canon_args = |d: &Self| d.args().iter().map(Value::canon).collect();
        match self {
            Self::Missing(_) => (vec![0], canon_args(self)),
            Self::Extra(_) => (vec![1], canon_args(self)),
            Self::Invalid { .. } => (vec![2], canon_args(self)),
            Self::Deviation { .. } => (vec![3], canon_args(self)),
            Self::AllowedNotFound(inner) => {
                let (mut tags, args) = inner.canon_key();
                tags.insert(0, 4);
                (tags, args)
            }
        }
    }
}

impl PartialEq for Difference {
    fn eq(&self, other: &Self) -> bool {
        self.canon_key() == other.canon_key()
    }
}

impl Eq for Difference {}

impl Hash for Difference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canon_key().hash(state);
    }
}

/// Format a delta with an explicit sign, the way deviations read.
fn format_signed(v: &Value) -> String {
    match v {
        Value::Bool(b) => format!("{:+}", i64::from(*b)),
        Value::Int(i) => format!("{i:+}"),
        Value::Float(f) if f.is_nan() => "NaN".to_owned(),
        Value::Float(f) if f.is_sign_negative() => v.to_string(),
        Value::Float(_) => format!("+{v}"),
        other => other.to_string(),
    }
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(v) => write!(f, "Missing({v})"),
            Self::Extra(v) => write!(f, "Extra({v})"),
            Self::Invalid { value, expected } => match expected {
                Some(e) => write!(f, "Invalid({value}, expected={e})"),
                None => write!(f, "Invalid({value})"),
            },
            Self::Deviation { delta, expected } => {
                write!(f, "Deviation({}, {expected})", format_signed(delta))
            }
            Self::AllowedNotFound(inner) => write!(f, "AllowedNotFound({inner})"),
        }
    }
}

/// The sentinel for a value absent from one side of a comparison:
/// `None` stands for "not found".
pub type Lookup<'a> = Option<&'a Value>;

/// Build the appropriate difference for two values known to be unequal.
///
/// With `show_expected` false, an `Invalid` omits its expected field
/// (used when a whole collection is checked against one requirement and
/// repeating it per element would be noise).
///
/// Numeric pairs become deviations; a numeric value against a vacant or
/// absent counterpart becomes a deviation against that counterpart; an
/// absent side otherwise yields `Extra`/`Missing`; everything else is
/// `Invalid`. NaN never counts as numeric here. Argument pairs the
/// deviation matrix rejects (an empty container standing where a number
/// belongs) degrade to `Invalid` instead.
pub fn make_difference(actual: Lookup<'_>, expected: Lookup<'_>, show_expected: bool) -> Difference {
    let fallback_invalid = |actual: &Value, expected: &Value| {
        if show_expected {
            Difference::invalid_expected(actual.clone(), expected.clone())
        } else {
            Difference::invalid(actual.clone())
        }
    };
    let vacant_or_absent = |side: Lookup<'_>| side.map_or(true, Value::is_empty_like);

    match (actual, expected) {
        // Numeric vs numeric.
        (Some(a), Some(e)) if a.is_usable_number() && e.is_usable_number() => {
            let delta = a.numeric_sub(e).unwrap_or(Value::Float(f64::NAN));
            match Difference::deviation(delta, e.clone()) {
                Ok(diff) => diff,
                // Precision can collapse a real difference to a zero delta.
                Err(_) => fallback_invalid(a, e),
            }
        }
        // Numeric vs vacant-or-absent.
        (Some(a), e) if a.is_usable_number() && vacant_or_absent(e) => {
            let recorded = e.cloned().unwrap_or(Value::Null);
            match Difference::deviation(a.clone(), recorded) {
                Ok(diff) => diff,
                Err(_) => fallback_invalid(a, e.unwrap_or(&Value::Null)),
            }
        }
        // Vacant-or-absent vs numeric.
        (a, Some(e)) if e.is_usable_number() && vacant_or_absent(a) => {
            let recorded_actual = a.cloned().unwrap_or(Value::Null);
            let delta = if e.as_number() == Some(0.0) {
                recorded_actual.clone()
            } else {
                Value::Int(0).numeric_sub(e).unwrap_or(Value::Float(f64::NAN))
            };
            match Difference::deviation(delta, e.clone()) {
                Ok(diff) => diff,
                Err(_) => fallback_invalid(&recorded_actual, e),
            }
        }
        // Observed value with no expected counterpart.
        (Some(a), None) => Difference::extra(a.clone()),
        // Expected value with no observed counterpart.
        (None, Some(e)) => Difference::missing(e.clone()),
        (Some(a), Some(e)) => fallback_invalid(a, e),
        (None, None) => Difference::invalid(Value::Null),
    }
}

/// The differences recorded under one key: a lone difference from a
/// single-element entry, or the list a collection entry produced.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum DiffGroup {
    One(Difference),
    Many(Vec<Difference>),
}

impl DiffGroup {
    /// Number of differences in the group.
    pub fn len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Many(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The group's differences in order.
    pub fn iter(&self) -> slice::Iter<'_, Difference> {
        match self {
            Self::One(diff) => slice::from_ref(diff).iter(),
            Self::Many(items) => items.iter(),
        }
    }
}

impl<'a> IntoIterator for &'a DiffGroup {
    type Item = &'a Difference;
    type IntoIter = slice::Iter<'a, Difference>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A validation failure's payload: an ordered list of differences for
/// non-mapping data, or insertion-ordered key/group pairs for keyed data.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Differences {
    List(Vec<Difference>),
    Map(Vec<(Value, DiffGroup)>),
}

impl Differences {
    /// Total number of differences across the container.
    pub fn len(&self) -> usize {
        match self {
            Self::List(items) => items.len(),
            Self::Map(groups) => groups.iter().map(|(_, g)| g.len()).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate every difference, ignoring keys and grouping.
    pub fn iter_flat(&self) -> Box<dyn Iterator<Item = &Difference> + '_> {
        match self {
            Self::List(items) => Box::new(items.iter()),
            Self::Map(groups) => Box::new(groups.iter().flat_map(|(_, g)| g.iter())),
        }
    }
}

impl From<Vec<Difference>> for Differences {
    fn from(items: Vec<Difference>) -> Self {
        Self::List(items)
    }
}

impl From<Difference> for Differences {
    fn from(diff: Difference) -> Self {
        Self::List(vec![diff])
    }
}
