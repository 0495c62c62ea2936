use std::{fmt::Write as _, path::PathBuf, time::Duration};

use anyhow::{bail, Context as _};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    aggregate::{aggregate_at, daily_total, end_of_day, start_of_day},
    config::Config,
    http::build_client,
    remote::RemoteStore,
    store::{EntryStore, ListQuery, DEFAULT_LIST_LIMIT},
    structs::{
        bucket::{AggregateBucket, Range},
        catalog::CatalogItem,
        drink_entry::{DrinkEntry, DrinkPatch, DrinkType, Unit},
    },
};

const BAR_WIDTH: f64 = 40.0;

#[derive(Parser, Debug)]
#[command(name = "intake", version, about = "Log drinks and chart your standard-drink intake")]
pub struct Cli {
    /// Config file, defaults to the platform config directory
    #[arg(long, global = true, env = "INTAKE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log a drink
    Log {
        /// beer, wine, spirits, cocktail, seltzer or other
        drink_type: DrinkType,
        quantity: f64,
        #[arg(long, default_value = "oz")]
        unit: Unit,
        /// When it was consumed (RFC 3339 or local `YYYY-MM-DD HH:MM`), default now
        #[arg(long, value_parser = parse_timestamp)]
        at: Option<DateTime<Utc>>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Edit a logged drink; the standard-drink count is recomputed
    Edit {
        id: String,
        #[arg(long = "type")]
        drink_type: Option<DrinkType>,
        #[arg(long)]
        quantity: Option<f64>,
        #[arg(long)]
        unit: Option<Unit>,
        #[arg(long, value_parser = parse_timestamp)]
        at: Option<DateTime<Utc>>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List logged drinks, newest first
    List {
        #[arg(long, value_parser = parse_timestamp)]
        from: Option<DateTime<Utc>>,
        #[arg(long, value_parser = parse_timestamp)]
        to: Option<DateTime<Utc>>,
        #[arg(long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Today's drinks and total
    Today,
    /// The most recent drink
    Latest,
    /// Chart totals for day, week, month or year
    Summary { range: Range },
    /// Search preset drinks
    Catalog {
        query: String,
        /// Log the best match with its default pour
        #[arg(long)]
        log: bool,
        /// When it was consumed, only with --log
        #[arg(long, value_parser = parse_timestamp, requires = "log")]
        at: Option<DateTime<Utc>>,
    },
    /// Classify an uploaded photo by its storage path
    Classify {
        path: String,
        /// Log the classified drink
        #[arg(long)]
        save: bool,
    },
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M")
        .map_err(|_| format!("`{raw}` is neither RFC 3339 nor `YYYY-MM-DD HH:MM`"))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|at| at.with_timezone(&Utc))
        .ok_or_else(|| format!("`{raw}` does not exist in the local time zone"))
}

pub struct Context {
    pub config: Config,
    pub store: Box<dyn EntryStore>,
    pub json: bool,
}

impl Context {
    fn remote(&self) -> anyhow::Result<RemoteStore> {
        let client = build_client(Duration::from_secs(self.config.backend.timeout_secs))?;
        RemoteStore::new(client, &self.config.backend, self.config.classifier_disabled)
            .context("catalog and classifier need the hosted backend")
    }

    fn print<T: Serialize>(
        &self,
        value: &T,
        text: impl FnOnce() -> String,
    ) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            print!("{}", text());
        }
        Ok(())
    }
}

/// Entry for the first catalog match, the one the backend ranks best.
fn preset_entry(items: &[CatalogItem], at: Option<DateTime<Utc>>) -> Option<DrinkEntry> {
    let entry = items.first()?.to_entry();
    Some(match at {
        Some(at) => entry.logged_at(at),
        None => entry,
    })
}

fn valid_quantity(quantity: f64) -> anyhow::Result<f64> {
    if !quantity.is_finite() || quantity <= 0.0 {
        bail!("please enter a valid quantity, got {quantity}");
    }
    Ok(quantity)
}

pub async fn run(command: Command, ctx: &Context) -> anyhow::Result<()> {
    debug!(?command, "running command");

    match command {
        Command::Log {
            drink_type,
            quantity,
            unit,
            at,
            notes,
        } => {
            let mut entry = DrinkEntry::new(drink_type, valid_quantity(quantity)?, unit);
            if let Some(at) = at {
                entry = entry.logged_at(at);
            }
            entry.notes = notes;

            let entry = ctx.store.insert(entry).await.context("unable to log drink")?;
            info!(id = %entry.id, standard_drinks = entry.standard_drinks, "drink logged");
            ctx.print(&entry, || render_entries(std::slice::from_ref(&entry), &Local))
        }

        Command::Edit {
            id,
            drink_type,
            quantity,
            unit,
            at,
            notes,
        } => {
            let patch = DrinkPatch {
                drink_type,
                quantity: quantity.map(valid_quantity).transpose()?,
                unit,
                logged_at: at,
                notes,
            };
            if patch.is_empty() {
                bail!("nothing to change, pass at least one field");
            }

            let entry = ctx
                .store
                .update(&id, &patch)
                .await
                .with_context(|| format!("unable to edit drink {id}"))?;
            ctx.print(&entry, || render_entries(std::slice::from_ref(&entry), &Local))
        }

        Command::List {
            from,
            to,
            limit,
            offset,
        } => {
            let entries = ctx
                .store
                .list(ListQuery {
                    from,
                    to,
                    limit,
                    offset,
                })
                .await?;
            ctx.print(&entries, || render_entries(&entries, &Local))
        }

        Command::Today => {
            let today = Local::now().date_naive();
            let total = daily_total(today, &Local, ctx.store.as_ref()).await?;
            let entries = ctx
                .store
                .list(ListQuery::between(
                    start_of_day(&Local, today),
                    end_of_day(&Local, today),
                ))
                .await?;

            #[derive(Serialize)]
            struct Today<'a> {
                date: String,
                total: f64,
                entries: &'a [DrinkEntry],
            }

            let date = today.format("%Y-%m-%d").to_string();
            ctx.print(
                &Today {
                    date: date.clone(),
                    total,
                    entries: &entries,
                },
                || format!("{date}: {total:.1} std\n{}", render_entries(&entries, &Local)),
            )
        }

        Command::Latest => match ctx.store.latest().await? {
            Some(entry) => {
                ctx.print(&entry, || render_entries(std::slice::from_ref(&entry), &Local))
            }
            None => ctx.print(&Option::<DrinkEntry>::None, || {
                "no drinks logged yet\n".to_string()
            }),
        },

        Command::Summary { range } => {
            let buckets =
                aggregate_at(range, &Local::now(), ctx.config.week_start, ctx.store.as_ref())
                    .await
                    .with_context(|| format!("unable to build {range} summary"))?;
            ctx.print(&buckets, || render_chart(&buckets))
        }

        Command::Catalog { query, log, at } => {
            let items = ctx.remote()?.search_catalog(&query).await?;
            if log {
                let entry = preset_entry(&items, at)
                    .with_context(|| format!("no preset matches `{query}`"))?;
                let entry = ctx.store.insert(entry).await.context("unable to log preset")?;
                info!(id = %entry.id, standard_drinks = entry.standard_drinks, "preset logged");
                return ctx.print(&entry, || render_entries(std::slice::from_ref(&entry), &Local));
            }

            ctx.print(&items, || {
                items.iter().fold(String::new(), |mut out, item| {
                    let _ = writeln!(
                        out,
                        "{:<24} {:<8} {} {} • {:.1} std",
                        item.label,
                        item.drink_type,
                        item.default_qty,
                        item.default_unit,
                        item.default_std
                    );
                    out
                })
            })
        }

        Command::Classify { path, save } => {
            let classification = ctx.remote()?.classify_photo(&path).await;
            if !save {
                return ctx.print(&classification, || {
                    format!(
                        "{} {} {} ({:.0}% sure)\n",
                        classification.drink_type,
                        classification.qty,
                        classification.unit,
                        classification.confidence * 100.0
                    )
                });
            }

            let entry = ctx
                .store
                .insert(classification.into_entry(Some(path)))
                .await
                .context("unable to log classified drink")?;
            ctx.print(&entry, || render_entries(std::slice::from_ref(&entry), &Local))
        }
    }
}

pub fn render_entries<Tz>(entries: &[DrinkEntry], tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    entries.iter().fold(String::new(), |mut out, entry| {
        let _ = write!(
            out,
            "{}  {:<8} {} {}  {:.1} std  {}",
            entry.logged_at.with_timezone(tz).format("%Y-%m-%d %H:%M"),
            entry.drink_type,
            entry.quantity,
            entry.unit,
            entry.standard_drinks,
            entry.id
        );
        if let Some(notes) = &entry.notes {
            let _ = write!(out, "  {notes}");
        }
        out.push('\n');
        out
    })
}

/// Horizontal bar chart, bars scaled to the largest bucket.
pub fn render_chart(buckets: &[AggregateBucket]) -> String {
    let max = buckets.iter().map(|b| b.total).fold(0.0_f64, f64::max);

    buckets.iter().fold(String::new(), |mut out, bucket| {
        let width = if max > 0.0 {
            (bucket.total / max * BAR_WIDTH).round() as usize
        } else {
            0
        };
        let _ = writeln!(
            out,
            "{:<10} {:>6.1} {}",
            bucket.label,
            bucket.total,
            "#".repeat(width)
        );
        out
    })
}
