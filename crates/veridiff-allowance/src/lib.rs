//! Difference filters that acknowledge expected discrepancies.
//!
//! An [`Allowance`] consumes the outcome of a validation pass. Differences
//! accepted by the allowance are dropped; whatever remains is re-raised as a
//! fresh [`ValidationError`]. Allowances compose with `&` (both must accept)
//! and `|` (either may accept), and each one operates at a declared
//! [`Scope`]: per element, per group of same-keyed differences, or over the
//! whole collection.
//!
//! The driver flattens the error's differences into a `(key, difference)`
//! stream, walks it group by group while invoking the [`AllowanceFilter`]
//! hooks, then rebuilds a container of the same shape from the retained
//! entries. An empty remainder suppresses the error entirely.

use std::fmt;
use std::ops::{BitAnd, BitOr};

use tracing::debug;

use veridiff_error::{ValidationError, VeridiffError};
use veridiff_types::{Canon, DiffGroup, Difference, Differences, Value};

pub mod filters;

pub use filters::{
    allowed_args, allowed_deviation, allowed_deviation_range, allowed_extra, allowed_invalid,
    allowed_key, allowed_limit, allowed_missing, allowed_percent_deviation,
    allowed_percent_deviation_range, allowed_specific, SpecificAllowed,
};

/// How much of the difference stream a filter needs to see at once.
///
/// Variant order is the widening order, so the derived `Ord` ranks
/// `Element < Group < Collection`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Scope {
    /// Decides each difference on its own.
    Element,
    /// Needs the run of differences sharing one key.
    Group,
    /// Needs the entire stream before committing.
    Collection,
}

/// Final word from a filter once the whole stream has been walked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Keep the per-element decisions as made.
    Confirm,
    /// Void every acceptance; the original differences all surface.
    RejectAll,
}

/// Hook set implemented by every concrete filter.
///
/// The driver calls the hooks in a fixed order: `start_collection`, then for
/// each run of equal keys `start_group`, `call_predicate` per entry,
/// `end_group`, and finally `end_collection`. Only `call_predicate` has no
/// default; the rest are no-ops so element-scoped filters stay one-liners.
pub trait AllowanceFilter {
    /// Widest stream portion this filter reasons about.
    fn scope(&self) -> Scope {
        Scope::Element
    }

    /// Called once before any group is walked.
    fn start_collection(&mut self) {}

    /// Called at the start of each run of equal keys.
    fn start_group(&mut self, _key: &Value) {}

    /// Returns `true` to accept (drop) the difference, `false` to keep it.
    fn call_predicate(&mut self, key: &Value, diff: &Difference) -> bool;

    /// Called after the group's entries; returned differences are retained
    /// under the group's key in addition to the rejected entries.
    fn end_group(&mut self, _key: &Value) -> Vec<Difference> {
        Vec::new()
    }

    /// Called once after the last group.
    fn end_collection(&mut self) -> Verdict {
        Verdict::Confirm
    }
}

enum AllowanceKind {
    Filter(Box<dyn AllowanceFilter>),
    And(Box<Allowance>, Box<Allowance>),
    Or(Box<Allowance>, Box<Allowance>),
}

/// A filter, or a `&`/`|` composition of filters, ready to apply once.
///
/// Applying an allowance consumes it. Compose first, then hand the final
/// tree either a closure via [`Allowance::scope`] or a ready outcome via
/// [`Allowance::apply`].
pub struct Allowance {
    msg: Option<String>,
    kind: AllowanceKind,
}

impl fmt::Debug for Allowance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            AllowanceKind::Filter(_) => "filter",
            AllowanceKind::And(_, _) => "and",
            AllowanceKind::Or(_, _) => "or",
        };
        f.debug_struct("Allowance")
            .field("msg", &self.msg)
            .field("kind", &kind)
            .finish()
    }
}

impl Allowance {
    /// Wraps a concrete filter.
    pub fn from_filter(filter: impl AllowanceFilter + 'static) -> Self {
        Self {
            msg: None,
            kind: AllowanceKind::Filter(Box::new(filter)),
        }
    }

    /// Sets the message prefixed onto the re-raised error.
    #[must_use]
    pub fn with_msg(mut self, msg: impl Into<String>) -> Self {
        self.msg = Some(msg.into());
        self
    }

    /// Runs `body` and filters its outcome.
    pub fn scope(
        self,
        body: impl FnOnce() -> Result<(), VeridiffError>,
    ) -> Result<(), VeridiffError> {
        self.apply(body())
    }

    /// Filters a validation outcome.
    ///
    /// Only [`VeridiffError::Validation`] is filtered; any other error and
    /// the `Ok` outcome pass through, though the collection hooks still run
    /// over an empty stream on success so stateful filters observe every
    /// application.
    pub fn apply(mut self, outcome: Result<(), VeridiffError>) -> Result<(), VeridiffError> {
        match outcome {
            Ok(()) => {
                self.start_collection();
                self.end_collection();
                Ok(())
            }
            Err(VeridiffError::Validation(err)) => self.filter_validation(err),
            Err(other) => Err(other),
        }
    }

    fn filter_validation(mut self, err: ValidationError) -> Result<(), VeridiffError> {
        let message = err.message().to_owned();
        let predicate = err.truncation_predicate();
        let notice = err.truncation_notice().map(str::to_owned);
        let was_mapping = matches!(err.differences(), Differences::Map(_));

        let stream = serialize(err.into_differences());
        let original = stream.clone();
        let canons: Vec<Canon> = stream.iter().map(|(key, _)| key.canon()).collect();

        self.start_collection();
        let mut retained: Vec<(Value, Difference)> = Vec::new();
        let last = stream.len().saturating_sub(1);
        for (i, (key, diff)) in stream.into_iter().enumerate() {
            if i == 0 || canons[i] != canons[i - 1] {
                self.start_group(&key);
            }
            if !self.call_predicate(&key, &diff) {
                retained.push((key.clone(), diff));
            }
            if i == last || canons[i + 1] != canons[i] {
                for residual in self.end_group(&key) {
                    retained.push((key.clone(), residual));
                }
            }
        }
        let verdict = self.end_collection();

        let remaining = match verdict {
            Verdict::Confirm => retained,
            Verdict::RejectAll => original,
        };
        if remaining.is_empty() {
            debug!(message = %message, "all differences allowed");
            return Ok(());
        }
        debug!(
            remaining = remaining.len(),
            message = %message,
            "differences remain after allowance"
        );

        let differences = deserialize(remaining, was_mapping)?;
        let message = match self.msg {
            Some(msg) => format!("{msg}: {message}"),
            None => message,
        };
        let mut rebuilt = ValidationError::new(message, differences)?;
        rebuilt.set_truncation(predicate, notice);
        Err(rebuilt.into())
    }

    fn rank(&self) -> Scope {
        match &self.kind {
            AllowanceKind::Filter(filter) => filter.scope(),
            AllowanceKind::And(left, right) | AllowanceKind::Or(left, right) => {
                left.rank().max(right.rank())
            }
        }
    }

    fn start_collection(&mut self) {
        match &mut self.kind {
            AllowanceKind::Filter(filter) => filter.start_collection(),
            AllowanceKind::And(left, right) | AllowanceKind::Or(left, right) => {
                left.start_collection();
                right.start_collection();
            }
        }
    }

    fn start_group(&mut self, key: &Value) {
        match &mut self.kind {
            AllowanceKind::Filter(filter) => filter.start_group(key),
            AllowanceKind::And(left, right) | AllowanceKind::Or(left, right) => {
                left.start_group(key);
                right.start_group(key);
            }
        }
    }

    fn call_predicate(&mut self, key: &Value, diff: &Difference) -> bool {
        match &mut self.kind {
            AllowanceKind::Filter(filter) => filter.call_predicate(key, diff),
            AllowanceKind::And(left, right) => {
                left.call_predicate(key, diff) && right.call_predicate(key, diff)
            }
            AllowanceKind::Or(left, right) => {
                left.call_predicate(key, diff) || right.call_predicate(key, diff)
            }
        }
    }

    fn end_group(&mut self, key: &Value) -> Vec<Difference> {
        match &mut self.kind {
            AllowanceKind::Filter(filter) => filter.end_group(key),
            AllowanceKind::And(left, right) | AllowanceKind::Or(left, right) => {
                let mut residuals = left.end_group(key);
                residuals.extend(right.end_group(key));
                residuals
            }
        }
    }

    fn end_collection(&mut self) -> Verdict {
        match &mut self.kind {
            AllowanceKind::Filter(filter) => filter.end_collection(),
            AllowanceKind::And(left, right) | AllowanceKind::Or(left, right) => {
                let left = left.end_collection();
                let right = right.end_collection();
                if left == Verdict::RejectAll || right == Verdict::RejectAll {
                    Verdict::RejectAll
                } else {
                    Verdict::Confirm
                }
            }
        }
    }

    // Narrower operand goes on the left so the short-circuit in
    // call_predicate can skip the wider (often stateful) side.
    fn compose(and: bool, a: Self, b: Self) -> Self {
        let (left, right) = if a.rank() > b.rank() { (b, a) } else { (a, b) };
        let kind = if and {
            AllowanceKind::And(Box::new(left), Box::new(right))
        } else {
            AllowanceKind::Or(Box::new(left), Box::new(right))
        };
        Self { msg: None, kind }
    }
}

impl BitAnd for Allowance {
    type Output = Allowance;

    fn bitand(self, rhs: Allowance) -> Allowance {
        Allowance::compose(true, self, rhs)
    }
}

impl BitOr for Allowance {
    type Output = Allowance;

    fn bitor(self, rhs: Allowance) -> Allowance {
        Allowance::compose(false, self, rhs)
    }
}

/// Flattens a differences container into `(key, difference)` pairs.
///
/// Flat lists get a `Null` key for every entry. Mapping containers emit one
/// pair per difference, repeating the key for multi-difference groups, in
/// container order.
fn serialize(differences: Differences) -> Vec<(Value, Difference)> {
    match differences {
        Differences::List(items) => items
            .into_iter()
            .map(|diff| (Value::Null, diff))
            .collect(),
        Differences::Map(groups) => {
            let mut pairs = Vec::new();
            for (key, group) in groups {
                match group {
                    DiffGroup::One(diff) => pairs.push((key, diff)),
                    DiffGroup::Many(items) => {
                        for diff in items {
                            pairs.push((key.clone(), diff));
                        }
                    }
                }
            }
            pairs
        }
    }
}

/// Rebuilds a container of the original shape from retained pairs.
///
/// Mapping output regroups consecutive equal keys and collapses singleton
/// groups back to a single difference. Flat output requires every retained
/// key to still be `Null`; a filter that smuggled keyed entries into a flat
/// stream is a programming error.
fn deserialize(
    pairs: Vec<(Value, Difference)>,
    was_mapping: bool,
) -> Result<Differences, VeridiffError> {
    if !was_mapping {
        let mut items = Vec::with_capacity(pairs.len());
        for (key, diff) in pairs {
            if !key.is_null() {
                return Err(VeridiffError::ShapeMismatch {
                    received: "list",
                    returned: "map",
                });
            }
            items.push(diff);
        }
        return Ok(Differences::List(items));
    }

    let mut groups: Vec<(Value, Canon, Vec<Difference>)> = Vec::new();
    for (key, diff) in pairs {
        let canon = key.canon();
        match groups.last_mut() {
            Some((_, last_canon, items)) if *last_canon == canon => items.push(diff),
            _ => groups.push((key, canon, vec![diff])),
        }
    }
    let groups = groups
        .into_iter()
        .map(|(key, _, mut items)| {
            let group = if items.len() == 1 {
                match items.pop() {
                    Some(diff) => DiffGroup::One(diff),
                    None => DiffGroup::Many(items),
                }
            } else {
                DiffGroup::Many(items)
            };
            (key, group)
        })
        .collect();
    Ok(Differences::Map(groups))
}
