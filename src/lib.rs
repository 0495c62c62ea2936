//! Alcohol intake tracking: standard-drink estimation, calendar-bucketed
//! totals, and the stores drink entries live in.

pub mod aggregate;
pub mod commands;
pub mod config;
pub mod error;
pub mod estimate;
pub mod http;
pub mod logging;
pub mod remote;
pub mod storage;
pub mod store;
pub mod structs;

pub use aggregate::{aggregate, aggregate_at, bucket_spans, daily_total};
pub use error::{Error, Result};
pub use estimate::{estimate, normalize_from_guess};
pub use store::{EntryStore, ListQuery};
pub use structs::{
    bucket::{AggregateBucket, Range},
    drink_entry::{DrinkEntry, DrinkPatch, DrinkType, Unit},
};
