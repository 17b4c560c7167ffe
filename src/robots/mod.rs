//! Robots.txt handling module
//!
//! Fetches, parses and caches robots.txt per origin so the crawl loop can
//! skip disallowed URLs when compliance is enabled.

mod cache;
mod parser;

pub use cache::{CachedRobots, RobotsCache};
pub use parser::{product_token, ParsedRobots};
