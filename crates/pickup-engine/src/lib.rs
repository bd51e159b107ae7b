//! Search cascade, ranking, cross-road intersection lookup, result
//! formatting, and the deadline-bounded resolution pipeline.

mod error;

pub mod cascade;
pub mod context;
pub mod format;
pub mod intersection;
pub mod outcome;
pub mod pipeline;
pub mod rank;

#[cfg(test)]
mod fixtures;

pub use cascade::Resolver;
pub use context::{ResolverContext, SharedContext};
pub use error::ResolveError;
pub use format::dispatch_line;
pub use intersection::Intersection;
pub use outcome::{AddrType, Failure, FailureReason, Outcome};
pub use pipeline::Pipeline;
