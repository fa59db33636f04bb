use std::error::Error;
use std::fmt;

use regex::Regex;
use veridiff_types::{Difference, Value};

/// What a predicate callable may answer for one element.
#[derive(Debug, Clone, PartialEq)]
pub enum PredicateReply {
    /// The element satisfies the condition.
    Pass,
    /// The element fails the condition; an `Invalid` is recorded for it.
    Fail,
    /// A difference to record verbatim instead of the default `Invalid`.
    Diff(Difference),
    /// Anything else. Reported as a programming error, not a data failure.
    Other(Value),
}

impl From<bool> for PredicateReply {
    fn from(pass: bool) -> Self {
        if pass {
            Self::Pass
        } else {
            Self::Fail
        }
    }
}

impl From<Difference> for PredicateReply {
    fn from(diff: Difference) -> Self {
        Self::Diff(diff)
    }
}

pub type PredicateError = Box<dyn Error + Send + Sync>;

type PredicateFn = Box<dyn Fn(&[Value]) -> Result<PredicateReply, PredicateError>>;

/// A named condition applied to each element under test.
///
/// Composite elements (`Tuple`, `List`) spread into one argument per
/// field; other elements arrive as a single argument. A predicate that
/// returns `Err` counts as a failed check for that element, not a crash.
pub struct Predicate {
    name: String,
    func: PredicateFn,
}

impl Predicate {
    /// An infallible condition. The closure may return `bool`, a
    /// [`PredicateReply`], or a [`Difference`].
    pub fn new<R>(name: impl Into<String>, func: impl Fn(&[Value]) -> R + 'static) -> Self
    where
        R: Into<PredicateReply>,
    {
        Self {
            name: name.into(),
            func: Box::new(move |args| Ok(func(args).into())),
        }
    }

    /// A condition whose evaluation can fail; failure counts as a
    /// non-match for the element being checked.
    pub fn fallible(
        name: impl Into<String>,
        func: impl Fn(&[Value]) -> Result<PredicateReply, PredicateError> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn eval(&self, args: &[Value]) -> Result<PredicateReply, PredicateError> {
        (self.func)(args)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// What the data is required to satisfy.
///
/// The variant picks the comparison strategy: ordered comparison for
/// `Sequence`, membership for `Set`, per-key sub-requirements for `Map`,
/// a callable for `Predicate`, pattern search for `Regex`, and semantic
/// equality for everything else.
#[derive(Debug)]
pub enum Requirement {
    Sequence(Vec<Value>),
    Set(Vec<Value>),
    Map(Vec<(Value, Requirement)>),
    Predicate(Predicate),
    Regex(Regex),
    Equal(Value),
}

impl Requirement {
    pub fn equal(value: impl Into<Value>) -> Self {
        Self::Equal(value.into())
    }

    pub fn sequence(items: Vec<Value>) -> Self {
        Self::Sequence(items)
    }

    pub fn set(items: Vec<Value>) -> Self {
        Self::Set(items)
    }

    pub fn map(pairs: Vec<(Value, Requirement)>) -> Self {
        Self::Map(pairs)
    }

    pub fn predicate<R>(name: impl Into<String>, func: impl Fn(&[Value]) -> R + 'static) -> Self
    where
        R: Into<PredicateReply>,
    {
        Self::Predicate(Predicate::new(name, func))
    }

    pub fn regex(pattern: Regex) -> Self {
        Self::Regex(pattern)
    }

    /// Derive a requirement from a plain value by its shape: lists and
    /// tuples require sequence order, sets require membership, maps apply
    /// per-key sub-requirements, and scalars require equality. A map
    /// nested inside a map is required as an equal value, not re-entered.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::List(items) | Value::Tuple(items) => Self::Sequence(items),
            Value::Set(items) => Self::Set(items),
            Value::Map(pairs) => Self::Map(
                pairs
                    .into_iter()
                    .map(|(k, v)| (k, Self::from_sub_value(v)))
                    .collect(),
            ),
            other => Self::Equal(other),
        }
    }

    fn from_sub_value(value: Value) -> Self {
        match value {
            Value::List(items) | Value::Tuple(items) => Self::Sequence(items),
            Value::Set(items) => Self::Set(items),
            other => Self::Equal(other),
        }
    }

    /// The default failure message for this requirement.
    ///
    /// Equality reads differently for single-element data ("does not
    /// satisfy equality comparison") and collections ("does not equal
    /// {requirement}"); mappings count as single elements.
    pub(crate) fn default_message(&self, data_is_element: bool) -> String {
        match self {
            Self::Sequence(_) => "does not match sequence order".to_owned(),
            Self::Set(_) => "does not satisfy set membership".to_owned(),
            Self::Map(_) => "does not satisfy mapping requirement".to_owned(),
            Self::Predicate(p) => format!("does not satisfy '{}' condition", p.name()),
            Self::Regex(r) => format!("does not satisfy '{}' regex", r.as_str()),
            Self::Equal(v) => {
                if data_is_element {
                    "does not satisfy equality comparison".to_owned()
                } else {
                    format!("does not equal {v}")
                }
            }
        }
    }

    /// The plain value this requirement is equivalent to, when every part
    /// of it is a value (no predicates or patterns).
    pub(crate) fn value_image(&self) -> Option<Value> {
        match self {
            Self::Equal(v) => Some(v.clone()),
            Self::Sequence(items) => Some(Value::List(items.clone())),
            Self::Set(items) => Some(Value::Set(items.clone())),
            Self::Map(pairs) => {
                let mut out = Vec::with_capacity(pairs.len());
                for (k, sub) in pairs {
                    out.push((k.clone(), sub.value_image()?));
                }
                Some(Value::Map(out))
            }
            Self::Predicate(_) | Self::Regex(_) => None,
        }
    }
}

impl From<Value> for Requirement {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

impl From<Regex> for Requirement {
    fn from(pattern: Regex) -> Self {
        Self::Regex(pattern)
    }
}

impl From<Predicate> for Requirement {
    fn from(predicate: Predicate) -> Self {
        Self::Predicate(predicate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veridiff_types::vals;

    #[test]
    fn from_value_follows_shape() {
        assert!(matches!(
            Requirement::from_value(Value::List(vals![1, 2])),
            Requirement::Sequence(_)
        ));
        assert!(matches!(
            Requirement::from_value(Value::Set(vals![1])),
            Requirement::Set(_)
        ));
        assert!(matches!(
            Requirement::from_value(Value::from("abc")),
            Requirement::Equal(_)
        ));
    }

    #[test]
    fn nested_map_becomes_equality() {
        let inner = Value::Map(vec![(Value::from("x"), Value::from(1))]);
        let req = Requirement::from_value(Value::Map(vec![(Value::from("a"), inner)]));
        let Requirement::Map(pairs) = req else {
            panic!("expected mapping requirement");
        };
        assert!(matches!(pairs[0].1, Requirement::Equal(Value::Map(_))));
    }

    #[test]
    fn default_messages_name_the_requirement() {
        let req = Requirement::predicate("is_even", |args: &[Value]| {
            args[0].as_number().map_or(false, |n| n % 2.0 == 0.0)
        });
        assert_eq!(
            req.default_message(false),
            "does not satisfy 'is_even' condition"
        );

        let req = Requirement::equal(9);
        assert_eq!(req.default_message(false), "does not equal 9");
        assert_eq!(
            req.default_message(true),
            "does not satisfy equality comparison"
        );
    }

    #[test]
    fn value_image_requires_plain_values() {
        let req = Requirement::map(vec![
            (Value::from("a"), Requirement::equal(1)),
            (Value::from("b"), Requirement::sequence(vals![1, 2])),
        ]);
        let image = req.value_image().expect("plain values only");
        assert_eq!(
            image,
            Value::Map(vec![
                (Value::from("a"), Value::from(1)),
                (Value::from("b"), Value::List(vals![1, 2])),
            ])
        );

        let req = Requirement::map(vec![(
            Value::from("a"),
            Requirement::predicate("p", |_: &[Value]| true),
        )]);
        assert!(req.value_image().is_none());
    }

    #[test]
    fn predicate_replies_convert_from_bool_and_difference() {
        assert_eq!(PredicateReply::from(true), PredicateReply::Pass);
        assert_eq!(PredicateReply::from(false), PredicateReply::Fail);
        assert!(matches!(
            PredicateReply::from(Difference::missing(1)),
            PredicateReply::Diff(_)
        ));
    }
}
