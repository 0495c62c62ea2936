use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Aggregation granularity of a chart.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Range {
    /// Last 7 calendar days
    Day,
    /// Last 4 calendar weeks
    Week,
    /// Last 6 calendar months
    Month,
    /// Last 12 calendar months, one bucket per month
    Year,
}

impl Range {
    pub fn bucket_count(self) -> u32 {
        match self {
            Range::Day => 7,
            Range::Week => 4,
            Range::Month => 6,
            Range::Year => 12,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Range::Day => "day",
            Range::Week => "week",
            Range::Month => "month",
            Range::Year => "year",
        }
    }
}

impl FromStr for Range {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Range::Day),
            "week" => Ok(Range::Week),
            "month" => Ok(Range::Month),
            "year" => Ok(Range::Year),
            other => Err(format!("unknown range `{other}`, expected day, week, month or year")),
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One point of a consumption chart.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AggregateBucket {
    /// `YYYY-MM-DD` for day and week buckets, `YYYY-MM` for month buckets
    pub label: String,

    /// Standard drinks logged inside the bucket
    pub total: f64,
}
