use std::cmp::Ordering;

use crate::value::{int_float_cmp, Value};

/// Canonical projection of a [`Value`]: hashable, totally ordered, and
/// identical for values that compare semantically equal.
///
/// This is what difference matching, set membership, and sequence alignment
/// hash and compare. Two properties drive the design:
///
/// - numbers unify across representations (`Int(1)`, `Float(1.0)`, and
///   `Bool(true)` share one canon), and
/// - NaN projects to a token equal to itself, so differences that carry NaN
///   can still be matched, counted, and removed from allowed lists.
///
/// Variant declaration order is the class rank used by [`Value::sort_cmp`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Canon {
    Null,
    Num(NumCanon),
    Text(String),
    Bytes(Vec<u8>),
    List(Vec<Canon>),
    Tuple(Vec<Canon>),
    /// Sorted, deduplicated member canons.
    Set(Vec<Canon>),
    /// Pairs sorted by key canon, then value canon.
    Map(Vec<(Canon, Canon)>),
}

/// Canonical form of a number.
///
/// Every value with an exact `i64` reading normalizes to `Int` (this folds
/// booleans, negative zero, and integral floats together); remaining floats
/// keep their bit pattern. The two variants therefore never compare equal,
/// which keeps the manual `Ord` consistent with the derived `Eq`/`Hash`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum NumCanon {
    Nan,
    Int(i64),
    Float(u64),
}

impl NumCanon {
    #[allow(clippy::cast_possible_truncation)]
    fn from_f64(f: f64) -> Self {
        if f.is_nan() {
            return Self::Nan;
        }
        if (-9_223_372_036_854_775_808.0..9_223_372_036_854_775_808.0).contains(&f) {
            let i = f as i64;
            #[allow(clippy::cast_precision_loss, clippy::float_cmp)]
            if (i as f64) == f {
                return Self::Int(i);
            }
        }
        Self::Float(f.to_bits())
    }

    fn as_parts(&self) -> (bool, Option<i64>, Option<f64>) {
        match self {
            Self::Nan => (true, None, None),
            Self::Int(i) => (false, Some(*i), None),
            Self::Float(bits) => (false, None, Some(f64::from_bits(*bits))),
        }
    }
}

impl Ord for NumCanon {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.as_parts(), other.as_parts()) {
            ((true, _, _), (true, _, _)) => Ordering::Equal,
            ((true, _, _), _) => Ordering::Less,
            (_, (true, _, _)) => Ordering::Greater,
            ((_, Some(a), _), (_, Some(b), _)) => a.cmp(&b),
            ((_, Some(a), _), (_, _, Some(b))) => int_float_cmp(a, b),
            ((_, _, Some(a)), (_, Some(b), _)) => int_float_cmp(b, a).reverse(),
            ((_, _, Some(a)), (_, _, Some(b))) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        }
    }
}

impl PartialOrd for NumCanon {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Value {
    /// The canonical projection of this value.
    pub fn canon(&self) -> Canon {
        match self {
            Self::Null => Canon::Null,
            Self::Bool(b) => Canon::Num(NumCanon::Int(i64::from(*b))),
            Self::Int(i) => Canon::Num(NumCanon::Int(*i)),
            Self::Float(f) => Canon::Num(NumCanon::from_f64(*f)),
            Self::Text(s) => Canon::Text(s.clone()),
            Self::Bytes(b) => Canon::Bytes(b.clone()),
            Self::List(items) => Canon::List(items.iter().map(Value::canon).collect()),
            Self::Tuple(items) => Canon::Tuple(items.iter().map(Value::canon).collect()),
            Self::Set(items) => {
                let mut canons: Vec<Canon> = items.iter().map(Value::canon).collect();
                canons.sort();
                canons.dedup();
                Canon::Set(canons)
            }
            Self::Map(pairs) => {
                let mut canons: Vec<(Canon, Canon)> = pairs
                    .iter()
                    .map(|(k, v)| (k.canon(), v.canon()))
                    .collect();
                canons.sort();
                canons.dedup();
                Canon::Map(canons)
            }
        }
    }
}
