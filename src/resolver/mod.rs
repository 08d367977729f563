//! Resolver module.
//!
//! Turns alias names and raw source/destination specs into concrete
//! networks and port lists.

mod alias;
mod direction;

pub use alias::AliasResolver;
pub use direction::DirectionResolver;
