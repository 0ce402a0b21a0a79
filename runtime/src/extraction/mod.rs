//! Content extraction: strip boilerplate from fetched HTML and render the
//! remaining content as markdown for scoring and token estimates.

pub mod markdown;
pub mod sanitizer;
