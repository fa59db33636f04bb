//! Public API facade for veridiff.
//!
//! Validation compares data against a requirement and reports what differs
//! as typed [`Difference`] values inside a [`ValidationError`]. Allowances
//! then acknowledge the differences you expected, so only the surprises
//! remain. The requirement's shape selects the comparison: scalars require
//! equality, lists require order, sets require membership, maps apply
//! sub-requirements per key, and closures or regular expressions act as
//! per-element conditions.

pub use veridiff_allowance::{
    allowed_args, allowed_deviation, allowed_deviation_range, allowed_extra, allowed_invalid,
    allowed_key, allowed_limit, allowed_missing, allowed_percent_deviation,
    allowed_percent_deviation_range, allowed_specific, Allowance, AllowanceFilter, Scope,
    SpecificAllowed, Verdict,
};
pub use veridiff_core::{
    compare, is_valid, validate, validate_with, Data, DataEntry, DataInput, Predicate,
    PredicateError, PredicateReply, Query, QueryResult, Requirement, RequirementInput,
    ValueStream,
};
pub use veridiff_error::{TruncationPredicate, ValidationError, VeridiffError};
pub use veridiff_types::{
    make_difference, vals, Canon, DeviationArgsError, DiffGroup, Difference, Differences, Lookup,
    NumCanon, Value,
};
