use std::cmp::Ordering;
use std::fmt;
use std::slice;

use crate::canon::Canon;

/// A dynamically-typed element of a dataset under validation.
///
/// Observed elements, requirement scalars, and container keys all share this
/// one vocabulary. Scalars (`Null` through `Bytes`) are atomic; `List` and
/// `Tuple` are ordered composites whose fields unpack into multiple predicate
/// arguments; `Set` and `Map` are unordered containers compared by canonical
/// content.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum Value {
    /// The absent value.
    Null,
    /// A boolean. Participates in numeric comparison as 0 or 1.
    Bool(bool),
    /// A 64-bit signed integer.
    Int(i64),
    /// A 64-bit IEEE 754 floating-point number.
    Float(f64),
    /// A UTF-8 text string.
    Text(String),
    /// A binary string.
    Bytes(Vec<u8>),
    /// An ordered sequence of values.
    List(Vec<Value>),
    /// An ordered, fixed-arity composite (a row or a compound key).
    Tuple(Vec<Value>),
    /// An unordered collection; duplicates are not significant.
    Set(Vec<Value>),
    /// An unordered collection of key/value pairs.
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Returns true if this is the `Null` value.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true for `Null` and the empty text string.
    ///
    /// Vacant values stand for "no usable quantity" in the numeric
    /// special cases of deviation construction.
    pub fn is_vacant(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Returns true for vacant values and empty containers.
    pub fn is_empty_like(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.is_empty(),
            Self::Bytes(b) => b.is_empty(),
            Self::List(v) | Self::Tuple(v) | Self::Set(v) => v.is_empty(),
            Self::Map(m) => m.is_empty(),
            _ => false,
        }
    }

    /// Returns true for `Bool`, `Int`, and `Float` (NaN included).
    pub const fn is_number(&self) -> bool {
        matches!(self, Self::Bool(_) | Self::Int(_) | Self::Float(_))
    }

    /// Returns true for a numeric value that is not NaN.
    pub fn is_usable_number(&self) -> bool {
        match self {
            Self::Bool(_) | Self::Int(_) => true,
            Self::Float(f) => !f.is_nan(),
            _ => false,
        }
    }

    /// Returns true only for `Float(NaN)`.
    pub fn is_nan(&self) -> bool {
        matches!(self, Self::Float(f) if f.is_nan())
    }

    /// Numeric reading of this value, if it has one.
    ///
    /// Booleans read as 0.0 / 1.0. Large integers lose precision beyond
    /// 2^53; exact comparisons go through [`Value::sort_cmp`] instead.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Bool(b) => Some(f64::from(u8::from(*b))),
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Try to extract a text reference.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The fields of this value as predicate arguments.
    ///
    /// Ordered composites (`Tuple`, `List`) spread into one argument per
    /// element; every other value is a single argument.
    pub fn fields(&self) -> &[Value] {
        match self {
            Self::Tuple(v) | Self::List(v) => v,
            other => slice::from_ref(other),
        }
    }

    /// Returns true when the value spreads into multiple predicate arguments.
    pub const fn is_composite(&self) -> bool {
        matches!(self, Self::Tuple(_) | Self::List(_))
    }

    /// The value's shape name, for error messages.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
        }
    }

    /// Semantic equality, distinct from [`Value::sort_cmp`].
    ///
    /// Numbers compare across `Bool`/`Int`/`Float` exactly; NaN is equal to
    /// nothing, itself included. `Set` and `Map` compare as unordered
    /// canonical content; `List` and `Tuple` compare element-wise and never
    /// equal each other.
    pub fn semantic_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (a, b) if a.is_number() && b.is_number() => match (a, b) {
                (Self::Float(x), _) if x.is_nan() => false,
                (_, Self::Float(y)) if y.is_nan() => false,
                _ => numeric_cmp(a, b) == Ordering::Equal,
            },
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::List(a), Self::List(b)) | (Self::Tuple(a), Self::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.semantic_eq(y))
            }
            (Self::Set(_), Self::Set(_)) | (Self::Map(_), Self::Map(_)) => {
                self.canon() == other.canon()
            }
            _ => false,
        }
    }

    /// Total ordering for deterministic rendering and sorted canonical forms.
    ///
    /// Values order by class (`Null` < numbers < `Text` < `Bytes` < `List` <
    /// `Tuple` < `Set` < `Map`), then by content. NaN sorts below every
    /// other number and equal to itself, so sorting mixed collections is
    /// stable and total.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        self.canon().cmp(&other.canon())
    }

    /// Numeric subtraction for deviation deltas.
    ///
    /// Integer pairs stay integral when the difference fits; everything else
    /// falls back to floating point.
    #[allow(clippy::cast_precision_loss)]
    pub fn numeric_sub(&self, other: &Value) -> Option<Value> {
        let a = self.as_number()?;
        let b = other.as_number()?;
        if let (Some(x), Some(y)) = (self.as_integral(), other.as_integral()) {
            if let Some(d) = x.checked_sub(y) {
                return Some(Value::Int(d));
            }
        }
        Some(Value::Float(a - b))
    }

    fn as_integral(&self) -> Option<i64> {
        match self {
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }
}

/// Exact comparison of two numeric values.
///
/// Callers exclude NaN first; mixed integer/float pairs go through
/// [`int_float_cmp`] so magnitudes beyond 2^53 stay exact.
fn numeric_cmp(a: &Value, b: &Value) -> Ordering {
    let ia = a.as_integral();
    let ib = b.as_integral();
    match (ia, ib) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(x), None) => match b {
            Value::Float(y) => int_float_cmp(x, *y),
            _ => Ordering::Equal,
        },
        (None, Some(y)) => match a {
            Value::Float(x) => int_float_cmp(y, *x).reverse(),
            _ => Ordering::Equal,
        },
        (None, None) => match (a, b) {
            (Value::Float(x), Value::Float(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
    }
}

/// Compare an integer with a float, preserving precision for large i64
/// values. A naive `(i as f64).partial_cmp(&r)` loses precision for
/// |i| > 2^53.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub(crate) fn int_float_cmp(i: i64, r: f64) -> Ordering {
    if r.is_nan() {
        // NaN sorts below every integer.
        return Ordering::Greater;
    }
    // If r is out of i64 range, the answer is obvious.
    if r < -9_223_372_036_854_775_808.0 {
        return Ordering::Greater;
    }
    if r >= 9_223_372_036_854_775_808.0 {
        return Ordering::Less;
    }
    // Truncate float to integer and compare integer parts.
    let y = r as i64;
    match i.cmp(&y) {
        Ordering::Less => Ordering::Less,
        Ordering::Greater => Ordering::Greater,
        // Integer parts equal; use float comparison as tiebreaker.
        Ordering::Equal => {
            let s = i as f64;
            s.partial_cmp(&r).unwrap_or(Ordering::Equal)
        }
    }
}

/// Format a float the way it reads in a difference: always distinguishable
/// from an integer (`3.0`, not `3`).
fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "NaN".to_owned();
    }
    if f.is_infinite() {
        return if f.is_sign_positive() {
            "inf".to_owned()
        } else {
            "-inf".to_owned()
        };
    }
    if f == f.trunc() && f.abs() < 1e16 {
        return format!("{f:.1}");
    }
    format!("{f}")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => f.write_str(&format_float(*v)),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Bytes(b) => {
                f.write_str("b\"")?;
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                f.write_str("\"")
            }
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Self::Set(items) => {
                f.write_str("{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("}")
            }
            Self::Map(pairs) => {
                f.write_str("{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.semantic_eq(other)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Self::Int(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

/// Build a `Vec<Value>` from mixed literals.
///
/// ```
/// use veridiff_types::{vals, Value};
///
/// let row = vals!["north", 15, 2.5];
/// assert_eq!(row[0], Value::Text("north".to_owned()));
/// ```
#[macro_export]
macro_rules! vals {
    () => { Vec::<$crate::Value>::new() };
    ($($v:expr),+ $(,)?) => { vec![$($crate::Value::from($v)),+] };
}
