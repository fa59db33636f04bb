//! Integration tests for allowances applied to validation outcomes.
//!
//! The unit tests in veridiff-allowance drive the hook protocol directly;
//! these go through the public API, validating real data and filtering the
//! resulting errors.

use proptest::prelude::*;

use veridiff::{
    allowed_args, allowed_deviation, allowed_extra, allowed_limit, allowed_missing,
    allowed_percent_deviation, allowed_specific, vals, DiffGroup, Difference, Differences,
    ValidationError, Value, VeridiffError,
};

fn unwrap_validation(outcome: Result<(), VeridiffError>) -> ValidationError {
    match outcome {
        Err(VeridiffError::Validation(err)) => err,
        other => panic!("expected a validation error, got {other:?}"),
    }
}

fn dev(delta: impl Into<Value>, expected: impl Into<Value>) -> Difference {
    Difference::deviation(delta, expected).expect("valid deviation arguments")
}

fn map_value(pairs: Vec<(&str, Value)>) -> Value {
    Value::Map(
        pairs
            .into_iter()
            .map(|(k, v)| (Value::from(k), v))
            .collect(),
    )
}

// ===========================================================================
// 1. ACKNOWLEDGING DIFFERENCE VARIANTS
// ===========================================================================

#[test]
fn allowed_missing_suppresses_known_gaps() {
    let outcome = allowed_missing().scope(|| {
        veridiff::validate(Value::List(vals!["a", "b"]), Value::Set(vals!["a", "b", "c"]))
    });
    assert!(outcome.is_ok());
}

#[test]
fn unacknowledged_differences_survive_with_their_message() {
    let outcome = allowed_missing().scope(|| {
        veridiff::validate(
            Value::List(vals!["a", "b", "x"]),
            Value::Set(vals!["a", "b", "c"]),
        )
    });
    let err = unwrap_validation(outcome);
    assert_eq!(err.message(), "does not satisfy set membership");
    assert_eq!(
        err.differences(),
        &Differences::List(vec![Difference::extra("x")])
    );
}

#[test]
fn either_side_of_an_or_may_acknowledge() {
    let outcome = (allowed_missing() | allowed_extra()).scope(|| {
        veridiff::validate(
            Value::List(vals!["a", "b", "x"]),
            Value::Set(vals!["a", "b", "c"]),
        )
    });
    assert!(outcome.is_ok());
}

// ===========================================================================
// 2. TOLERATED DEVIATIONS
// ===========================================================================

#[test]
fn deviations_within_tolerance_are_acknowledged() {
    let data = map_value(vec![("a", Value::from(95)), ("b", Value::from(103))]);
    let requirement = map_value(vec![("a", Value::from(100)), ("b", Value::from(100))]);
    let allowance = allowed_deviation(5.0).expect("non-negative tolerance");
    assert!(allowance.scope(|| veridiff::validate(data, requirement)).is_ok());
}

#[test]
fn deviations_past_tolerance_survive() {
    let data = map_value(vec![("a", Value::from(95)), ("c", Value::from(110))]);
    let requirement = map_value(vec![("a", Value::from(100)), ("c", Value::from(100))]);
    let allowance = allowed_deviation(5.0).expect("non-negative tolerance");
    let err = unwrap_validation(allowance.scope(|| veridiff::validate(data, requirement)));
    assert_eq!(
        err.differences(),
        &Differences::Map(vec![(Value::from("c"), DiffGroup::One(dev(10, 100)))])
    );
}

#[test]
fn percent_tolerance_measures_against_the_expected_value() {
    let data = map_value(vec![("a", Value::from(108))]);
    let requirement = map_value(vec![("a", Value::from(100))]);
    let allowance = allowed_percent_deviation(0.1).expect("non-negative tolerance");
    assert!(allowance.scope(|| veridiff::validate(data, requirement)).is_ok());
}

// ===========================================================================
// 3. SPECIFIC ACKNOWLEDGEMENTS
// ===========================================================================

#[test]
fn specific_budgets_surface_what_never_occurred() {
    let allowance = allowed_specific(vec![
        Difference::missing("c"),
        Difference::missing("d"),
    ]);
    let outcome = allowance.scope(|| {
        veridiff::validate(Value::List(vals!["a", "b"]), Value::Set(vals!["a", "b", "c"]))
    });
    let err = unwrap_validation(outcome);
    assert_eq!(
        err.differences(),
        &Differences::List(vec![Difference::AllowedNotFound(Box::new(
            Difference::missing("d")
        ))])
    );
}

// ===========================================================================
// 4. DIFFERENCE BUDGETS
// ===========================================================================

#[test]
fn limits_inside_the_budget_acknowledge_everything() {
    let outcome = allowed_limit(2).scope(|| {
        veridiff::validate(Value::List(vals![1, 2]), Value::Set(vals![1, 2, 3, 4]))
    });
    assert!(outcome.is_ok());
}

#[test]
fn exceeding_the_budget_voids_the_whole_allowance() {
    let outcome = allowed_limit(2).scope(|| {
        veridiff::validate(Value::List(vals![1]), Value::Set(vals![1, 2, 3, 4]))
    });
    let err = unwrap_validation(outcome);
    assert_eq!(
        err.differences(),
        &Differences::List(vec![
            Difference::missing(2),
            Difference::missing(3),
            Difference::missing(4),
        ])
    );
}

// ===========================================================================
// 5. COMPOSITION AND MESSAGES
// ===========================================================================

#[test]
fn composed_allowances_follow_boolean_logic() {
    // Both sides must accept under `&`: missing differences inside the
    // budget pass, anything else survives.
    let allowance = allowed_missing() & allowed_limit(1);
    let outcome = allowance.scope(|| {
        veridiff::validate(
            Value::List(vals!["a", "x"]),
            Value::Set(vals!["a", "b"]),
        )
    });
    let err = unwrap_validation(outcome);
    assert_eq!(
        err.differences(),
        &Differences::List(vec![Difference::extra("x")])
    );
}

#[test]
fn allowance_messages_prefix_the_original() {
    let allowance = allowed_missing().with_msg("lagging regions");
    let outcome = allowance.scope(|| {
        veridiff::validate(
            Value::List(vals!["a", "x"]),
            Value::Set(vals!["a", "b"]),
        )
    });
    let err = unwrap_validation(outcome);
    assert_eq!(
        err.message(),
        "lagging regions: does not satisfy set membership"
    );
}

// ===========================================================================
// 6. PROPERTIES
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn sequence_identity_always_validates(items in prop::collection::vec(-1000_i64..1000, 0..30)) {
        let values: Vec<Value> = items.iter().copied().map(Value::from).collect();
        prop_assert!(
            veridiff::validate(Value::List(values.clone()), Value::List(values)).is_ok()
        );
    }

    #[test]
    fn membership_in_own_elements_always_validates(
        items in prop::collection::vec(-1000_i64..1000, 1..30),
    ) {
        let values: Vec<Value> = items.iter().copied().map(Value::from).collect();
        prop_assert!(
            veridiff::validate(Value::List(values.clone()), Value::Set(values)).is_ok()
        );
    }

    #[test]
    fn integers_equal_their_float_image(i in -1_000_000_i64..1_000_000) {
        #[allow(clippy::cast_precision_loss)]
        let as_float = i as f64;
        prop_assert!(matches!(
            veridiff::is_valid(Value::from(i), Value::from(as_float)),
            Ok(true)
        ));
    }

    #[test]
    fn deviation_tolerance_is_a_closed_interval(
        magnitude in 1_i64..=10,
        negative in any::<bool>(),
    ) {
        let delta = if negative { -magnitude } else { magnitude };
        let err = ValidationError::new(
            "invalid data",
            Differences::List(vec![dev(delta, 100)]),
        )
        .expect("non-empty differences");

        let allowance = allowed_deviation(5.0).expect("non-negative tolerance");
        let outcome = allowance.apply(Err(err.into()));
        prop_assert_eq!(outcome.is_ok(), delta.abs() <= 5);
    }

    #[test]
    fn limit_threshold_is_exact(number in 0_usize..6, count in 1_usize..8) {
        let diffs: Vec<Difference> = (0..count)
            .map(|i| Difference::missing(i64::try_from(i).unwrap_or(0)))
            .collect();
        let err = ValidationError::new("invalid data", Differences::List(diffs))
            .expect("non-empty differences");

        let outcome = allowed_limit(number).apply(Err(err.into()));
        match outcome {
            Ok(()) => prop_assert!(count <= number),
            Err(VeridiffError::Validation(err)) => {
                prop_assert!(count > number);
                prop_assert_eq!(err.differences().len(), count);
            }
            Err(other) => prop_assert!(false, "unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn rendered_count_matches_flat_length(count in 1_usize..12) {
        let diffs: Vec<Difference> = (0..count)
            .map(|i| Difference::missing(i64::try_from(i).unwrap_or(0)))
            .collect();
        let err = ValidationError::new("invalid data", Differences::List(diffs))
            .expect("non-empty differences");
        let header = format!("({count} difference");
        prop_assert!(err.to_string().contains(&header));
    }

    #[test]
    fn unfiltered_streams_restore_shape_and_contents(
        keyed in any::<bool>(),
        entries in prop::collection::vec((0_usize..4, -50_i64..50), 1..12),
    ) {
        let diffs: Vec<Difference> = entries
            .iter()
            .map(|&(variant, n)| match variant {
                0 => Difference::missing(n),
                1 => Difference::extra(n),
                2 => Difference::invalid(n),
                _ => Difference::invalid_expected(n, n + 1),
            })
            .collect();
        let differences = if keyed {
            Differences::Map(
                diffs
                    .chunks(2)
                    .enumerate()
                    .map(|(i, chunk)| {
                        let group = match chunk {
                            [one] => DiffGroup::One(one.clone()),
                            many => DiffGroup::Many(many.to_vec()),
                        };
                        (Value::from(format!("k{i}")), group)
                    })
                    .collect(),
            )
        } else {
            Differences::List(diffs)
        };
        let err = ValidationError::new("invalid data", differences.clone())
            .expect("non-empty differences");

        // An allowance that acknowledges nothing must hand back the exact
        // container it was given.
        match allowed_args(|_| false).apply(Err(err.into())) {
            Err(VeridiffError::Validation(filtered)) => {
                prop_assert_eq!(filtered.message(), "invalid data");
                prop_assert_eq!(filtered.differences(), &differences);
            }
            other => prop_assert!(false, "expected a validation error, got {:?}", other),
        }
    }
}
