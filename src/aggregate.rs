//! Calendar-aligned consumption totals for the dashboard charts.
//!
//! Buckets are computed in the caller's time zone and each one is fetched from
//! the store on its own, oldest first. The first failed fetch aborts the whole
//! aggregate.

use chrono::{
    DateTime, Datelike, Days, Duration, Local, Months, NaiveDate, NaiveDateTime, Offset,
    TimeZone, Utc, Weekday,
};
use tracing::{debug, instrument, trace};

use crate::{
    error::Result,
    store::EntryStore,
    structs::{bucket::AggregateBucket, bucket::Range, drink_entry::DrinkEntry},
};

pub const DEFAULT_WEEK_START: Weekday = Weekday::Sun;

/// Inclusive time span of one bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSpan {
    pub label: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Sums the standard drinks of every bucket of `range`, ending now.
pub async fn aggregate<S>(range: Range, store: &S) -> Result<Vec<AggregateBucket>>
where
    S: EntryStore + ?Sized,
{
    aggregate_at(range, &Local::now(), DEFAULT_WEEK_START, store).await
}

#[instrument(skip(now, store), fields(now = %now))]
pub async fn aggregate_at<Tz, S>(
    range: Range,
    now: &DateTime<Tz>,
    week_start: Weekday,
    store: &S,
) -> Result<Vec<AggregateBucket>>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
    S: EntryStore + ?Sized,
{
    let spans = bucket_spans(range, now, week_start);
    let mut buckets = Vec::with_capacity(spans.len());

    for span in spans {
        let entries = store.fetch_entries(span.start, span.end).await?;
        let total = sum_standard_drinks(&entries);
        trace!(label = %span.label, entries = entries.len(), total, "bucket filled");

        buckets.push(AggregateBucket {
            label: span.label,
            total,
        });
    }

    debug!(buckets = buckets.len(), "aggregate computed");
    Ok(buckets)
}

/// Total standard drinks consumed on one local calendar day.
#[instrument(skip(tz, store))]
pub async fn daily_total<Tz, S>(date: NaiveDate, tz: &Tz, store: &S) -> Result<f64>
where
    Tz: TimeZone,
    S: EntryStore + ?Sized,
{
    let entries = store
        .fetch_entries(start_of_day(tz, date), end_of_day(tz, date))
        .await?;
    Ok(sum_standard_drinks(&entries))
}

pub fn sum_standard_drinks(entries: &[DrinkEntry]) -> f64 {
    entries.iter().map(|entry| entry.standard_drinks).sum()
}

/// Spans and labels of every bucket of `range` ending at `now`, oldest first.
pub fn bucket_spans<Tz: TimeZone>(
    range: Range,
    now: &DateTime<Tz>,
    week_start: Weekday,
) -> Vec<BucketSpan> {
    let tz = now.timezone();
    let today = now.date_naive();
    let count = u64::from(range.bucket_count());

    match range {
        Range::Day => (0..count)
            .rev()
            .filter_map(|back| today.checked_sub_days(Days::new(back)))
            .map(|day| BucketSpan {
                label: day.format("%Y-%m-%d").to_string(),
                start: start_of_day(&tz, day),
                end: end_of_day(&tz, day),
            })
            .collect(),

        Range::Week => {
            let into_week = u64::from(days_since(today.weekday(), week_start));

            (0..count)
                .rev()
                .filter_map(|back| {
                    let first = today.checked_sub_days(Days::new(into_week + 7 * back))?;
                    let last = first.checked_add_days(Days::new(6))?;
                    Some(BucketSpan {
                        label: first.format("%Y-%m-%d").to_string(),
                        start: start_of_day(&tz, first),
                        end: end_of_day(&tz, last),
                    })
                })
                .collect()
        }

        // A year is twelve monthly buckets, not a single yearly rollup.
        Range::Month | Range::Year => {
            let Some(this_month) = today.with_day(1) else {
                return Vec::new();
            };

            (0..count)
                .rev()
                .filter_map(|back| {
                    let first = this_month.checked_sub_months(Months::new(back as u32))?;
                    let last = first
                        .checked_add_months(Months::new(1))?
                        .checked_sub_days(Days::new(1))?;
                    Some(BucketSpan {
                        label: first.format("%Y-%m").to_string(),
                        start: start_of_day(&tz, first),
                        end: end_of_day(&tz, last),
                    })
                })
                .collect()
        }
    }
}

fn days_since(day: Weekday, week_start: Weekday) -> u32 {
    (7 + day.num_days_from_monday() - week_start.num_days_from_monday()) % 7
}

/// First instant of `date` in `tz`.
pub fn start_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    resolve_local(tz, date.and_time(chrono::NaiveTime::MIN), false)
}

/// Last millisecond of `date` in `tz`.
pub fn end_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    match date.and_hms_milli_opt(23, 59, 59, 999) {
        Some(naive) => resolve_local(tz, naive, true),
        None => start_of_day(tz, date),
    }
}

/// Maps a wall-clock time to an instant. Ambiguous times take the earlier or
/// later mapping as asked; times skipped by a DST jump land on the jump itself.
fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime, latest: bool) -> DateTime<Utc> {
    let local = tz.from_local_datetime(&naive);
    let resolved = if latest {
        local.latest()
    } else {
        local.earliest()
    };

    match resolved {
        Some(at) => at.with_timezone(&Utc),
        None => {
            // offset in force before the jump
            let offset = tz
                .from_local_datetime(&(naive - Duration::hours(3)))
                .earliest()
                .map_or(0, |before| before.offset().fix().local_minus_utc());
            (naive - Duration::seconds(i64::from(offset))).and_utc()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::FixedOffset;

    use super::*;
    use crate::{
        error::Error,
        storage::LocalStore,
        store::ListQuery,
        structs::drink_entry::{DrinkPatch, DrinkType, Unit},
    };

    fn tz() -> FixedOffset {
        FixedOffset::east_opt(2 * 3600).unwrap()
    }

    /// Thursday 2024-03-14 15:00 at UTC+2
    fn now() -> DateTime<FixedOffset> {
        tz().with_ymd_and_hms(2024, 3, 14, 15, 0, 0).unwrap()
    }

    fn entry_at(drink_type: DrinkType, at: DateTime<FixedOffset>) -> DrinkEntry {
        DrinkEntry::new(drink_type, 12.0, Unit::Oz).logged_at(at.with_timezone(&Utc))
    }

    fn entry_with_std(std: f64, at: DateTime<FixedOffset>) -> DrinkEntry {
        let mut entry = entry_at(DrinkType::Other, at);
        entry.standard_drinks = std;
        entry
    }

    fn labels(buckets: &[AggregateBucket]) -> Vec<&str> {
        buckets.iter().map(|b| b.label.as_str()).collect()
    }

    /// Records every fetch window and can be told to fail on the n-th call.
    #[derive(Default)]
    struct RecordingStore {
        calls: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
        fail_on: Option<usize>,
    }

    #[async_trait]
    impl EntryStore for RecordingStore {
        async fn fetch_entries(
            &self,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<Vec<DrinkEntry>> {
            let mut calls = self.calls.lock().unwrap();
            calls.push((start, end));
            if self.fail_on == Some(calls.len()) {
                return Err(Error::Config("backend unreachable".into()));
            }
            Ok(Vec::new())
        }

        async fn list(&self, _query: ListQuery) -> Result<Vec<DrinkEntry>> {
            Ok(Vec::new())
        }

        async fn insert(&self, entry: DrinkEntry) -> Result<DrinkEntry> {
            Ok(entry)
        }

        async fn update(&self, id: &str, _patch: &DrinkPatch) -> Result<DrinkEntry> {
            Err(Error::NotFound(id.to_string()))
        }
    }

    #[tokio::test]
    async fn day_range_is_seven_days_ending_today() {
        let store = LocalStore::in_memory(Vec::new());
        let buckets = aggregate_at(Range::Day, &now(), Weekday::Sun, &store)
            .await
            .unwrap();

        assert_eq!(
            labels(&buckets),
            vec![
                "2024-03-08",
                "2024-03-09",
                "2024-03-10",
                "2024-03-11",
                "2024-03-12",
                "2024-03-13",
                "2024-03-14"
            ]
        );
        assert!(buckets.iter().all(|b| b.total == 0.0));
    }

    #[tokio::test]
    async fn today_and_yesterday_land_in_last_two_buckets() {
        let yesterday = now() - Duration::days(1);
        let store = LocalStore::in_memory(vec![
            entry_at(DrinkType::Beer, now()),
            DrinkEntry::new(DrinkType::Wine, 5.0, Unit::Oz)
                .logged_at(yesterday.with_timezone(&Utc)),
        ]);

        let buckets = aggregate_at(Range::Day, &now(), Weekday::Sun, &store)
            .await
            .unwrap();
        let totals: Vec<f64> = buckets.iter().map(|b| b.total).collect();

        assert_eq!(totals, vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0]);
    }

    #[tokio::test]
    async fn day_buckets_follow_local_midnight() {
        let late = tz().with_ymd_and_hms(2024, 3, 13, 23, 30, 0).unwrap();
        // still the 13th in UTC
        let early = tz().with_ymd_and_hms(2024, 3, 14, 0, 30, 0).unwrap();
        let store = LocalStore::in_memory(vec![
            entry_with_std(2.0, late),
            entry_with_std(3.0, early),
        ]);

        let buckets = aggregate_at(Range::Day, &now(), Weekday::Sun, &store)
            .await
            .unwrap();

        assert_eq!(buckets[5].total, 2.0);
        assert_eq!(buckets[6].total, 3.0);
    }

    #[tokio::test]
    async fn week_buckets_start_on_configured_day() {
        let store = LocalStore::in_memory(vec![
            entry_with_std(1.0, tz().with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap()),
            entry_with_std(4.0, tz().with_ymd_and_hms(2024, 3, 9, 23, 59, 59).unwrap()),
            entry_with_std(2.0, tz().with_ymd_and_hms(2024, 2, 18, 12, 0, 0).unwrap()),
        ]);

        let buckets = aggregate_at(Range::Week, &now(), Weekday::Sun, &store)
            .await
            .unwrap();
        assert_eq!(
            labels(&buckets),
            vec!["2024-02-18", "2024-02-25", "2024-03-03", "2024-03-10"]
        );
        let totals: Vec<f64> = buckets.iter().map(|b| b.total).collect();
        assert_eq!(totals, vec![2.0, 0.0, 4.0, 1.0]);

        let monday = bucket_spans(Range::Week, &now(), Weekday::Mon);
        assert_eq!(monday.last().unwrap().label, "2024-03-11");
    }

    #[test]
    fn week_start_on_the_current_day_begins_today() {
        let spans = bucket_spans(Range::Week, &now(), Weekday::Thu);
        let last = spans.last().unwrap();
        assert_eq!(last.label, "2024-03-14");
        assert_eq!(last.start, start_of_day(&tz(), now().date_naive()));
    }

    #[test]
    fn month_and_year_ranges_use_monthly_labels() {
        let months = bucket_spans(Range::Month, &now(), Weekday::Sun);
        let labels: Vec<&str> = months.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["2023-10", "2023-11", "2023-12", "2024-01", "2024-02", "2024-03"]
        );

        let year = bucket_spans(Range::Year, &now(), Weekday::Sun);
        assert_eq!(year.len(), 12);
        assert_eq!(year.first().unwrap().label, "2023-04");
        assert_eq!(year.last().unwrap().label, "2024-03");
    }

    #[test]
    fn month_span_covers_leap_day() {
        let months = bucket_spans(Range::Month, &now(), Weekday::Sun);
        let feb = &months[4];
        assert_eq!(feb.start, Utc.with_ymd_and_hms(2024, 1, 31, 22, 0, 0).unwrap());
        assert_eq!(
            feb.end,
            Utc.with_ymd_and_hms(2024, 2, 29, 21, 59, 59).unwrap() + Duration::milliseconds(999)
        );
    }

    #[test]
    fn spans_are_contiguous_and_disjoint() {
        for range in [Range::Day, Range::Week, Range::Month, Range::Year] {
            let spans = bucket_spans(range, &now(), Weekday::Sun);
            assert_eq!(spans.len() as u32, range.bucket_count());
            for pair in spans.windows(2) {
                assert!(pair[0].start < pair[0].end);
                assert_eq!(pair[0].end + Duration::milliseconds(1), pair[1].start);
            }
        }
    }

    #[tokio::test]
    async fn totals_add_up_to_entries_inside_the_window() {
        let inside = [
            entry_with_std(1.5, tz().with_ymd_and_hms(2023, 10, 1, 0, 0, 0).unwrap()),
            entry_with_std(2.0, tz().with_ymd_and_hms(2024, 1, 15, 19, 0, 0).unwrap()),
            entry_with_std(1.0, now()),
        ];
        let outside = [
            entry_with_std(9.0, tz().with_ymd_and_hms(2023, 9, 30, 23, 59, 0).unwrap()),
            entry_with_std(9.0, tz().with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()),
        ];
        let store =
            LocalStore::in_memory(inside.iter().chain(outside.iter()).cloned().collect());

        let first = aggregate_at(Range::Month, &now(), Weekday::Sun, &store)
            .await
            .unwrap();
        let total: f64 = first.iter().map(|b| b.total).sum();
        assert_eq!(total, 4.5);

        let second = aggregate_at(Range::Month, &now(), Weekday::Sun, &store)
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn fetches_once_per_bucket_in_order() {
        let store = RecordingStore::default();
        aggregate_at(Range::Year, &now(), Weekday::Sun, &store)
            .await
            .unwrap();

        let calls = store.calls.lock().unwrap();
        assert_eq!(calls.len(), 12);
        assert!(calls.windows(2).all(|pair| pair[0].1 < pair[1].0));
    }

    #[tokio::test]
    async fn first_fetch_error_aborts_aggregate() {
        let store = RecordingStore {
            fail_on: Some(3),
            ..Default::default()
        };

        let err = aggregate_at(Range::Day, &now(), Weekday::Sun, &store)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(store.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn daily_total_sums_one_local_day() {
        let store = LocalStore::in_memory(vec![
            entry_with_std(1.0, tz().with_ymd_and_hms(2024, 3, 14, 0, 0, 0).unwrap()),
            entry_with_std(2.0, tz().with_ymd_and_hms(2024, 3, 14, 23, 59, 59).unwrap()),
            entry_with_std(5.0, tz().with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap()),
        ]);

        let total = daily_total(now().date_naive(), &tz(), &store).await.unwrap();
        assert_eq!(total, 3.0);
    }

    #[tokio::test]
    async fn aggregate_uses_the_local_clock() {
        let before = Local::now().format("%Y-%m-%d").to_string();
        let store = LocalStore::in_memory(vec![DrinkEntry::new(DrinkType::Beer, 12.0, Unit::Oz)]);

        let buckets = aggregate(Range::Day, &store).await.unwrap();
        let after = Local::now().format("%Y-%m-%d").to_string();

        assert_eq!(buckets.len(), 7);
        let last = &buckets[6].label;
        assert!(*last == before || *last == after, "last bucket {last}");
        // a midnight tick mid-test can only move the drink one bucket back
        let total: f64 = buckets.iter().map(|bucket| bucket.total).sum();
        assert_eq!(total, 1.0);
    }
}
