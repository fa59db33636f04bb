//! Ready-made allowance constructors.

use veridiff_error::VeridiffError;
use veridiff_types::{Difference, Value};

use crate::{Allowance, AllowanceFilter, Scope, Verdict};

/// Element filter driven by a plain predicate closure.
struct ElementFilter<F: Fn(&Value, &Difference) -> bool> {
    func: F,
}

impl<F: Fn(&Value, &Difference) -> bool> AllowanceFilter for ElementFilter<F> {
    fn call_predicate(&mut self, key: &Value, diff: &Difference) -> bool {
        (self.func)(key, diff)
    }
}

fn element(func: impl Fn(&Value, &Difference) -> bool + 'static) -> Allowance {
    Allowance::from_filter(ElementFilter { func })
}

/// Accepts every `Missing` difference.
pub fn allowed_missing() -> Allowance {
    element(|_, diff| matches!(diff, Difference::Missing(_)))
}

/// Accepts every `Extra` difference.
pub fn allowed_extra() -> Allowance {
    element(|_, diff| matches!(diff, Difference::Extra(_)))
}

/// Accepts every `Invalid` difference.
///
/// Deviations are a distinct variant and are not accepted; use one of the
/// deviation allowances for those.
pub fn allowed_invalid() -> Allowance {
    element(|_, diff| matches!(diff, Difference::Invalid { .. }))
}

/// Accepts differences whose key satisfies `func`.
///
/// Composite keys are unpacked, so a `("north", 2024)` key reaches the
/// closure as two slice entries.
pub fn allowed_key(func: impl Fn(&[Value]) -> bool + 'static) -> Allowance {
    element(move |key, _| func(key.fields()))
}

/// Accepts differences whose own arguments satisfy `func`.
pub fn allowed_args(func: impl Fn(&[Value]) -> bool + 'static) -> Allowance {
    element(move |_, diff| {
        let args = diff.args();
        func(&args)
    })
}

fn deviation_bounds(lower: f64, upper: f64) -> Result<(f64, f64), VeridiffError> {
    if lower.is_nan() || upper.is_nan() {
        return Err(VeridiffError::Tolerance {
            detail: "bounds must be numbers, got NaN".to_owned(),
        });
    }
    if lower > upper {
        return Err(VeridiffError::Tolerance {
            detail: format!("lower bound {lower} must not exceed upper bound {upper}"),
        });
    }
    Ok((lower, upper))
}

fn symmetric_bounds(tolerance: f64) -> Result<(f64, f64), VeridiffError> {
    if tolerance.is_nan() || tolerance < 0.0 {
        return Err(VeridiffError::Tolerance {
            detail: "tolerance should not be negative, use the lower, upper form for full \
                     control of both bounds"
                .to_owned(),
        });
    }
    Ok((-tolerance, tolerance))
}

fn deviation_in(lower: f64, upper: f64) -> Allowance {
    element(move |_, diff| {
        let Some(delta) = diff.delta() else {
            return false;
        };
        let span = delta.as_number().unwrap_or(0.0);
        if span.is_nan() {
            return false;
        }
        lower <= span && span <= upper
    })
}

fn percent_deviation_in(lower: f64, upper: f64) -> Allowance {
    element(move |_, diff| {
        let Some(ratio) = diff.percent_deviation() else {
            return false;
        };
        if ratio.is_nan() {
            return false;
        }
        lower <= ratio && ratio <= upper
    })
}

/// Accepts deviations within `tolerance` of the expected value.
///
/// The bounds are inclusive; a vacant delta reads as zero. Anything other
/// than a `Deviation` is never accepted.
pub fn allowed_deviation(tolerance: f64) -> Result<Allowance, VeridiffError> {
    let (lower, upper) = symmetric_bounds(tolerance)?;
    Ok(deviation_in(lower, upper))
}

/// Accepts deviations with a delta inside `[lower, upper]`.
pub fn allowed_deviation_range(lower: f64, upper: f64) -> Result<Allowance, VeridiffError> {
    let (lower, upper) = deviation_bounds(lower, upper)?;
    Ok(deviation_in(lower, upper))
}

/// Accepts deviations whose delta is within `tolerance` of the expected
/// value, measured as a fraction of that value.
///
/// A zero or vacant expected value yields a zero ratio, so such deviations
/// are accepted exactly when the bounds include zero.
pub fn allowed_percent_deviation(tolerance: f64) -> Result<Allowance, VeridiffError> {
    let (lower, upper) = symmetric_bounds(tolerance)?;
    Ok(percent_deviation_in(lower, upper))
}

/// Accepts deviations whose delta-to-expected ratio is inside
/// `[lower, upper]`.
pub fn allowed_percent_deviation_range(
    lower: f64,
    upper: f64,
) -> Result<Allowance, VeridiffError> {
    let (lower, upper) = deviation_bounds(lower, upper)?;
    Ok(percent_deviation_in(lower, upper))
}

/// The budget handed to [`allowed_specific`].
#[derive(Clone, Debug)]
pub enum SpecificAllowed {
    /// One difference, allowed once per group.
    One(Difference),
    /// A list of differences, each allowed once per group.
    Many(Vec<Difference>),
    /// Per-key budgets; keys with no entry allow nothing.
    PerKey(Vec<(Value, Vec<Difference>)>),
}

impl From<Difference> for SpecificAllowed {
    fn from(diff: Difference) -> Self {
        Self::One(diff)
    }
}

impl From<Vec<Difference>> for SpecificAllowed {
    fn from(diffs: Vec<Difference>) -> Self {
        Self::Many(diffs)
    }
}

impl From<Vec<(Value, Vec<Difference>)>> for SpecificAllowed {
    fn from(groups: Vec<(Value, Vec<Difference>)>) -> Self {
        Self::PerKey(groups)
    }
}

struct SpecificFilter {
    allowed: SpecificAllowed,
    active: Vec<Difference>,
}

impl AllowanceFilter for SpecificFilter {
    fn scope(&self) -> Scope {
        Scope::Group
    }

    fn start_group(&mut self, key: &Value) {
        // Each group works against a fresh copy of its budget.
        self.active = match &self.allowed {
            SpecificAllowed::One(diff) => vec![diff.clone()],
            SpecificAllowed::Many(diffs) => diffs.clone(),
            SpecificAllowed::PerKey(groups) => {
                let canon = key.canon();
                groups
                    .iter()
                    .find(|(candidate, _)| candidate.canon() == canon)
                    .map(|(_, diffs)| diffs.clone())
                    .unwrap_or_default()
            }
        };
    }

    fn call_predicate(&mut self, _key: &Value, diff: &Difference) -> bool {
        if let Some(pos) = self.active.iter().position(|allowed| allowed == diff) {
            self.active.remove(pos);
            return true;
        }
        false
    }

    fn end_group(&mut self, _key: &Value) -> Vec<Difference> {
        std::mem::take(&mut self.active)
            .into_iter()
            .map(|diff| Difference::AllowedNotFound(Box::new(diff)))
            .collect()
    }
}

/// Accepts the exact differences named in `allowed`, one acceptance per
/// occurrence.
///
/// Two equal differences in the data need two entries in the budget. Any
/// budgeted difference that never occurs is surfaced as an
/// [`Difference::AllowedNotFound`] entry in the re-raised error.
pub fn allowed_specific(allowed: impl Into<SpecificAllowed>) -> Allowance {
    Allowance::from_filter(SpecificFilter {
        allowed: allowed.into(),
        active: Vec::new(),
    })
}

struct LimitFilter {
    number: usize,
    count: usize,
}

impl AllowanceFilter for LimitFilter {
    fn scope(&self) -> Scope {
        Scope::Collection
    }

    fn start_collection(&mut self) {
        self.count = 0;
    }

    fn call_predicate(&mut self, _key: &Value, _diff: &Difference) -> bool {
        self.count += 1;
        self.count <= self.number
    }

    fn end_collection(&mut self) -> Verdict {
        if self.count > self.number {
            Verdict::RejectAll
        } else {
            Verdict::Confirm
        }
    }
}

/// Accepts at most `number` differences.
///
/// Going over budget voids the whole allowance: every difference in the
/// collection surfaces, including the ones inside the budget.
pub fn allowed_limit(number: usize) -> Allowance {
    Allowance::from_filter(LimitFilter { number, count: 0 })
}

#[cfg(test)]
mod tests {
    use veridiff_error::ValidationError;
    use veridiff_types::{vals, DiffGroup, Differences};

    use super::*;

    fn list_error(diffs: Vec<Difference>) -> VeridiffError {
        match ValidationError::new("invalid data", Differences::List(diffs)) {
            Ok(err) => err.into(),
            Err(err) => err,
        }
    }

    fn map_error(groups: Vec<(Value, DiffGroup)>) -> VeridiffError {
        match ValidationError::new("invalid data", Differences::Map(groups)) {
            Ok(err) => err.into(),
            Err(err) => err,
        }
    }

    fn remaining(outcome: Result<(), VeridiffError>) -> Vec<Difference> {
        match outcome {
            Ok(()) => Vec::new(),
            Err(VeridiffError::Validation(err)) => {
                err.differences().iter_flat().cloned().collect()
            }
            Err(other) => panic!("expected a validation outcome, got {other}"),
        }
    }

    fn dev(delta: impl Into<Value>, expected: impl Into<Value>) -> Difference {
        Difference::deviation(delta, expected).expect("valid deviation arguments")
    }

    // ==== variant filters ====

    #[test]
    fn variant_filters_match_their_variant_only() {
        let diffs = vec![
            Difference::missing(1),
            Difference::extra(2),
            Difference::invalid(3),
        ];

        let left = remaining(allowed_missing().apply(Err(list_error(diffs.clone()))));
        assert_eq!(
            left,
            vec![Difference::extra(2), Difference::invalid(3)]
        );

        let left = remaining(allowed_extra().apply(Err(list_error(diffs.clone()))));
        assert_eq!(
            left,
            vec![Difference::missing(1), Difference::invalid(3)]
        );

        let left = remaining(allowed_invalid().apply(Err(list_error(diffs))));
        assert_eq!(
            left,
            vec![Difference::missing(1), Difference::extra(2)]
        );
    }

    #[test]
    fn allowed_invalid_does_not_cover_deviations() {
        let left = remaining(allowed_invalid().apply(Err(list_error(vec![dev(1, 100)]))));
        assert_eq!(left, vec![dev(1, 100)]);
    }

    // ==== key and args filters ====

    #[test]
    fn allowed_key_unpacks_composite_keys() {
        let allowance = allowed_key(|fields| {
            fields.len() == 2
                && fields[0] == Value::from("north")
                && fields[1] == Value::from(2024)
        });
        let outcome = allowance.apply(Err(map_error(vec![
            (
                Value::Tuple(vals!["north", 2024]),
                DiffGroup::One(Difference::missing(1)),
            ),
            (
                Value::Tuple(vals!["south", 2024]),
                DiffGroup::One(Difference::missing(2)),
            ),
        ])));
        assert_eq!(remaining(outcome), vec![Difference::missing(2)]);
    }

    #[test]
    fn allowed_key_passes_scalar_keys_whole() {
        let allowance =
            allowed_key(|fields| fields.len() == 1 && fields[0] == Value::from("a"));
        let outcome = allowance.apply(Err(map_error(vec![
            (Value::from("a"), DiffGroup::One(Difference::missing(1))),
            (Value::from("b"), DiffGroup::One(Difference::missing(2))),
        ])));
        assert_eq!(remaining(outcome), vec![Difference::missing(2)]);
    }

    #[test]
    fn allowed_args_sees_the_difference_arguments() {
        let allowance = allowed_args(|args| args.len() == 2 && args[1] == Value::from(10));
        let outcome = allowance.apply(Err(list_error(vec![
            Difference::invalid_expected(9, 10),
            Difference::invalid_expected(9, 20),
        ])));
        assert_eq!(
            remaining(outcome),
            vec![Difference::invalid_expected(9, 20)]
        );
    }

    // ==== deviation filters ====

    #[test]
    fn deviation_tolerance_is_inclusive() {
        let allowance = match allowed_deviation(3.0) {
            Ok(allowance) => allowance,
            Err(err) => panic!("tolerance rejected: {err}"),
        };
        let outcome = allowance.apply(Err(list_error(vec![
            dev(-3, 100),
            dev(3, 100),
            dev(4, 100),
        ])));
        assert_eq!(remaining(outcome), vec![dev(4, 100)]);
    }

    #[test]
    fn deviation_range_is_asymmetric() {
        let allowance = match allowed_deviation_range(0.0, 5.0) {
            Ok(allowance) => allowance,
            Err(err) => panic!("bounds rejected: {err}"),
        };
        let outcome = allowance.apply(Err(list_error(vec![dev(-1, 100), dev(5, 100)])));
        assert_eq!(remaining(outcome), vec![dev(-1, 100)]);
    }

    #[test]
    fn negative_tolerance_is_rejected_up_front() {
        assert!(matches!(
            allowed_deviation(-2.0),
            Err(VeridiffError::Tolerance { .. })
        ));
        assert!(matches!(
            allowed_deviation_range(5.0, 1.0),
            Err(VeridiffError::Tolerance { .. })
        ));
        assert!(matches!(
            allowed_percent_deviation(f64::NAN),
            Err(VeridiffError::Tolerance { .. })
        ));
    }

    #[test]
    fn nan_delta_is_never_allowed() {
        let allowance = match allowed_deviation(1000.0) {
            Ok(allowance) => allowance,
            Err(err) => panic!("tolerance rejected: {err}"),
        };
        let nan_dev = dev(f64::NAN, Value::Null);
        let outcome = allowance.apply(Err(list_error(vec![nan_dev.clone()])));
        assert_eq!(remaining(outcome), vec![nan_dev]);
    }

    #[test]
    fn vacant_delta_reads_as_zero() {
        let allowance = match allowed_deviation(0.0) {
            Ok(allowance) => allowance,
            Err(err) => panic!("tolerance rejected: {err}"),
        };
        let outcome = allowance.apply(Err(list_error(vec![dev(Value::Null, 0)])));
        assert!(outcome.is_ok());
    }

    #[test]
    fn non_deviations_never_match_a_deviation_filter() {
        let allowance = match allowed_deviation(1000.0) {
            Ok(allowance) => allowance,
            Err(err) => panic!("tolerance rejected: {err}"),
        };
        let outcome = allowance.apply(Err(list_error(vec![Difference::missing(1)])));
        assert_eq!(remaining(outcome), vec![Difference::missing(1)]);
    }

    #[test]
    fn percent_deviation_measures_the_ratio() {
        let allowance = match allowed_percent_deviation(0.1) {
            Ok(allowance) => allowance,
            Err(err) => panic!("tolerance rejected: {err}"),
        };
        let outcome = allowance.apply(Err(list_error(vec![
            dev(5, 100),
            dev(-10, 100),
            dev(11, 100),
        ])));
        assert_eq!(remaining(outcome), vec![dev(11, 100)]);
    }

    #[test]
    fn percent_deviation_treats_zero_baseline_as_zero_ratio() {
        let allowance = match allowed_percent_deviation(0.1) {
            Ok(allowance) => allowance,
            Err(err) => panic!("tolerance rejected: {err}"),
        };
        let outcome = allowance.apply(Err(list_error(vec![dev(7, Value::Null)])));
        assert!(outcome.is_ok());
    }

    // ==== specific filter ====

    #[test]
    fn specific_consumes_one_acceptance_per_entry() {
        let allowance = allowed_specific(vec![Difference::missing(1)]);
        let outcome = allowance.apply(Err(list_error(vec![
            Difference::missing(1),
            Difference::missing(1),
        ])));
        let left = remaining(outcome);
        assert_eq!(left, vec![Difference::missing(1)]);
    }

    #[test]
    fn specific_duplicates_need_duplicate_entries() {
        let allowance = allowed_specific(vec![
            Difference::missing(1),
            Difference::missing(1),
        ]);
        let outcome = allowance.apply(Err(list_error(vec![
            Difference::missing(1),
            Difference::missing(1),
        ])));
        assert!(outcome.is_ok());
    }

    #[test]
    fn specific_surfaces_unmatched_entries() {
        let allowance = allowed_specific(vec![
            Difference::missing(1),
            Difference::extra(9),
        ]);
        let outcome = allowance.apply(Err(list_error(vec![Difference::missing(1)])));
        assert_eq!(
            remaining(outcome),
            vec![Difference::AllowedNotFound(Box::new(Difference::extra(9)))]
        );
    }

    #[test]
    fn specific_per_key_budgets_follow_their_key() {
        let allowance = allowed_specific(vec![
            (Value::from("a"), vec![Difference::missing(1)]),
            (Value::from("b"), vec![Difference::extra(2)]),
        ]);
        let outcome = allowance.apply(Err(map_error(vec![
            (Value::from("a"), DiffGroup::One(Difference::missing(1))),
            (Value::from("b"), DiffGroup::One(Difference::missing(1))),
        ])));
        let err = match outcome {
            Err(VeridiffError::Validation(err)) => err,
            other => panic!("expected a validation error, got {other:?}"),
        };
        match err.differences() {
            Differences::Map(groups) => {
                assert_eq!(groups.len(), 1);
                assert_eq!(groups[0].0, Value::from("b"));
                match &groups[0].1 {
                    DiffGroup::Many(items) => {
                        assert_eq!(
                            items,
                            &vec![
                                Difference::missing(1),
                                Difference::AllowedNotFound(Box::new(Difference::extra(2))),
                            ]
                        );
                    }
                    other => panic!("expected a multi-difference group, got {other:?}"),
                }
            }
            other => panic!("expected mapping differences, got {other:?}"),
        }
    }

    #[test]
    fn specific_keys_without_a_budget_allow_nothing() {
        let allowance = allowed_specific(vec![(
            Value::from("a"),
            vec![Difference::missing(1)],
        )]);
        let outcome = allowance.apply(Err(map_error(vec![(
            Value::from("b"),
            DiffGroup::One(Difference::missing(1)),
        )])));
        let left = remaining(outcome);
        assert_eq!(left, vec![Difference::missing(1)]);
    }

    #[test]
    fn specific_single_difference_budget_renews_per_group() {
        let allowance = allowed_specific(Difference::missing(1));
        let outcome = allowance.apply(Err(map_error(vec![
            (Value::from("a"), DiffGroup::One(Difference::missing(1))),
            (Value::from("b"), DiffGroup::One(Difference::missing(1))),
        ])));
        assert!(outcome.is_ok());
    }

    // ==== limit filter ====

    #[test]
    fn limit_within_budget_suppresses() {
        let outcome = allowed_limit(2).apply(Err(list_error(vec![
            Difference::missing(1),
            Difference::extra(2),
        ])));
        assert!(outcome.is_ok());
    }

    #[test]
    fn limit_over_budget_surfaces_everything() {
        let outcome = allowed_limit(2).apply(Err(list_error(vec![
            Difference::missing(1),
            Difference::extra(2),
            Difference::invalid(3),
        ])));
        let left = remaining(outcome);
        assert_eq!(
            left,
            vec![
                Difference::missing(1),
                Difference::extra(2),
                Difference::invalid(3),
            ]
        );
    }

    #[test]
    fn limit_counts_only_what_it_is_asked_about() {
        // Composed with a variant filter, rejected differences never reach
        // the counter thanks to the short-circuit.
        let allowance = allowed_missing() & allowed_limit(1);
        let outcome = allowance.apply(Err(list_error(vec![
            Difference::extra(1),
            Difference::extra(2),
            Difference::missing(3),
        ])));
        assert_eq!(
            remaining(outcome),
            vec![Difference::extra(1), Difference::extra(2)]
        );
    }
}
