//! Link handling: from captured URI identifiers to scoped query plans.

mod handler;
mod resolver;

pub use handler::{LinkContext, LinksHandler};
pub use resolver::{IdentifierChain, LinkResolver, expected_identifier_count};
