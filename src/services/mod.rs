//! Capture services.
//!
//! Services wire the activity source and the query log together:
//! [`Poller`] reads, [`SeenSet`] filters, [`Collector`] loops.

mod collector;
mod dedup;
mod poller;

pub use collector::{Collector, RunSummary, TickReport};
pub use dedup::SeenSet;
pub use poller::Poller;
