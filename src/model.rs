//! Rate definition model.
//!
//! Value types describing the rules registered with the remote service:
//! - [`RateRule`]: an identified group of one or more [`RateLimit`]s, optionally linked to a
//!   parent rule and combined with an [`Operator`].
//! - [`RateTree`]: a rule hierarchy posted in one request, children keyed by id.
//! - [`RateLimit`]: a single quota, given either as a textual [`RateExpr`] (`"5/m"`) or as an
//!   explicit permits/duration pair.
//!
//! All types serialize to the JSON shape the service expects (`camelCase` fields, durations as
//! ISO-8601 strings). Validation is local and runs before anything is sent.

pub mod duration;
mod expr;
mod limit;
mod rule;
mod tree;

pub use expr::{RateExpr, RateUnit};
pub use limit::RateLimit;
pub use rule::{Operator, RateRule};
pub use tree::RateTree;
