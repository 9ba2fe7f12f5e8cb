//! Storage backend traits.

mod activity;

pub use activity::{ActivityRow, ActivitySource};
