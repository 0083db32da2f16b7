//! URL helpers for routing targets and resolving links found on pages

mod domain;
mod matcher;
mod resolve;

pub use domain::extract_domain;
pub use matcher::matches_wildcard;
pub use resolve::{resolve_href, with_query_param};
