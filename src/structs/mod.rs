pub mod bucket;
pub mod catalog;
pub mod drink_entry;
