use tracing::debug;
use veridiff_error::{ValidationError, VeridiffError};
use veridiff_types::Value;

use crate::compare::compare;
use crate::data::{Data, ValueStream};
use crate::requirement::{Predicate, Requirement};

/// A lazy collaborator that can produce data on demand.
///
/// Used as *data*, a query is consumed lazily in a single pass; used as a
/// *requirement*, it is fetched eagerly once and the fetched value is
/// reused for every element under test.
pub trait Query {
    /// Realize the whole result eagerly.
    fn fetch(self: Box<Self>) -> Value;

    /// Consume the result lazily. The default materializes `fetch` and
    /// streams it.
    fn stream(self: Box<Self>) -> ValueStream {
        match self.fetch() {
            Value::List(items) | Value::Tuple(items) | Value::Set(items) => {
                ValueStream::from_values(items)
            }
            other => ValueStream::from_values(vec![other]),
        }
    }
}

/// An already-evaluated collaborator result.
pub trait QueryResult {
    fn fetch(self: Box<Self>) -> Value;
}

/// Anything accepted as the data side of a validation.
pub enum DataInput {
    Data(Data),
    Query(Box<dyn Query>),
    Result(Box<dyn QueryResult>),
}

impl From<Data> for DataInput {
    fn from(data: Data) -> Self {
        Self::Data(data)
    }
}

impl From<Value> for DataInput {
    fn from(value: Value) -> Self {
        Self::Data(Data::from(value))
    }
}

impl From<Vec<Value>> for DataInput {
    fn from(items: Vec<Value>) -> Self {
        Self::Data(Data::from(items))
    }
}

impl From<ValueStream> for DataInput {
    fn from(stream: ValueStream) -> Self {
        Self::Data(Data::Stream(stream))
    }
}

impl From<Box<dyn Query>> for DataInput {
    fn from(query: Box<dyn Query>) -> Self {
        Self::Query(query)
    }
}

impl From<Box<dyn QueryResult>> for DataInput {
    fn from(result: Box<dyn QueryResult>) -> Self {
        Self::Result(result)
    }
}

/// Anything accepted as the requirement side of a validation.
pub enum RequirementInput {
    Requirement(Requirement),
    Query(Box<dyn Query>),
    Result(Box<dyn QueryResult>),
}

impl From<Requirement> for RequirementInput {
    fn from(requirement: Requirement) -> Self {
        Self::Requirement(requirement)
    }
}

impl From<Value> for RequirementInput {
    fn from(value: Value) -> Self {
        Self::Requirement(Requirement::from_value(value))
    }
}

impl From<regex::Regex> for RequirementInput {
    fn from(pattern: regex::Regex) -> Self {
        Self::Requirement(Requirement::Regex(pattern))
    }
}

impl From<Predicate> for RequirementInput {
    fn from(predicate: Predicate) -> Self {
        Self::Requirement(Requirement::Predicate(predicate))
    }
}

impl From<Box<dyn Query>> for RequirementInput {
    fn from(query: Box<dyn Query>) -> Self {
        Self::Query(query)
    }
}

impl From<Box<dyn QueryResult>> for RequirementInput {
    fn from(result: Box<dyn QueryResult>) -> Self {
        Self::Result(result)
    }
}

fn resolve_data(input: DataInput) -> Data {
    match input {
        DataInput::Data(data) => data,
        // Lazy: stream the query, consuming it in one pass.
        DataInput::Query(query) => Data::Stream(query.stream()),
        DataInput::Result(result) => Data::from(result.fetch()),
    }
}

fn resolve_requirement(input: RequirementInput) -> Requirement {
    match input {
        RequirementInput::Requirement(requirement) => requirement,
        // Eager: a requirement is realized once and reused.
        RequirementInput::Query(query) => Requirement::from_value(query.fetch()),
        RequirementInput::Result(result) => Requirement::from_value(result.fetch()),
    }
}

/// Validate data against a requirement.
///
/// Returns `Ok(())` when the data satisfies the requirement. Differences
/// surface as [`VeridiffError::Validation`] carrying the strategy's
/// default message; shape and predicate programming errors surface as
/// their own variants.
pub fn validate(
    data: impl Into<DataInput>,
    requirement: impl Into<RequirementInput>,
) -> Result<(), VeridiffError> {
    run_validation(None, data.into(), requirement.into())
}

/// Validate with a caller-supplied failure message in place of the
/// strategy default.
pub fn validate_with(
    message: impl Into<String>,
    data: impl Into<DataInput>,
    requirement: impl Into<RequirementInput>,
) -> Result<(), VeridiffError> {
    run_validation(Some(message.into()), data.into(), requirement.into())
}

/// Check data against a requirement, folding validation failures into a
/// boolean. Programming errors still surface as `Err`.
pub fn is_valid(
    data: impl Into<DataInput>,
    requirement: impl Into<RequirementInput>,
) -> Result<bool, VeridiffError> {
    match run_validation(None, data.into(), requirement.into()) {
        Ok(()) => Ok(true),
        Err(VeridiffError::Validation(_)) => Ok(false),
        Err(other) => Err(other),
    }
}

fn run_validation(
    message: Option<String>,
    data: DataInput,
    requirement: RequirementInput,
) -> Result<(), VeridiffError> {
    let data = resolve_data(data);
    let requirement = resolve_requirement(requirement);

    match compare(data, &requirement)? {
        None => Ok(()),
        Some((default_message, differences)) => {
            debug!(
                count = differences.len(),
                message = default_message.as_str(),
                "validation failed"
            );
            let message = message.unwrap_or(default_message);
            Err(ValidationError::new(message, differences)?.into())
        }
    }
}
