use std::time::Duration;

use crate::error::Result;

pub const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible; alcohol_intake_tracker/",
    env!("CARGO_PKG_VERSION"),
    ")"
);

pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()?)
}
