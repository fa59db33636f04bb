pub mod canon;
pub mod difference;
pub mod value;

pub use canon::{Canon, NumCanon};
pub use difference::{
    make_difference, DeviationArgsError, DiffGroup, Difference, Differences, Lookup,
};
pub use value::Value;
