pub mod predicate;
pub mod runtime;

pub use predicate::{evaluate as evaluate_condition, PredicateContext};
pub use runtime::{AssessmentState, Contribution, Evaluation};
