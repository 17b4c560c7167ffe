//! State module for tracking crawl progress
//!
//! - `FrontierStatus`: lifecycle of a discovered URL (pending, in progress, success, error)

mod frontier_status;

pub use frontier_status::FrontierStatus;
