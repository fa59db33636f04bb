pub mod compare;
pub mod data;
pub mod requirement;
pub mod validate;

pub use compare::compare;
pub use data::{Data, DataEntry, ValueStream};
pub use requirement::{Predicate, PredicateError, PredicateReply, Requirement};
pub use validate::{
    is_valid, validate, validate_with, DataInput, Query, QueryResult, RequirementInput,
};
