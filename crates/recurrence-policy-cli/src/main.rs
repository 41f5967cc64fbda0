//! `recpol` CLI — build specific-date stacks and evaluate policy stacks.
//!
//! ## Usage
//!
//! ```sh
//! # Evaluate a stack (JSON array of policies) at an instant
//! recpol eval --stack stack.json --at 2025-08-16T10:00:00Z
//!
//! # Build the weekend-aware stack for one date
//! recpol stack --date 2025-08-16T09:00:00Z --fallback-days 3 --duration 8 --unit hour
//!
//! # Second Monday of March 2025
//! recpol nth --year 2025 --month 3 --weekday mon --n 2
//! ```
//!
//! Logging goes to stderr; set `RUST_LOG` or pass `--verbose`.

use std::io::{self, Read};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc, Weekday};
use clap::{Parser, Subcommand};
use recurrence_policy::{DurationUnit, PolicyStack, RuleBuilder};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "recpol",
    version,
    about = "Recurrence policy stack builder and evaluator"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a policy stack at an instant
    Eval {
        /// Stack file, a JSON array of policies (reads from stdin if omitted)
        #[arg(short, long)]
        stack: Option<String>,
        /// RFC 3339 instant to evaluate (defaults to now)
        #[arg(long)]
        at: Option<String>,
    },
    /// Build the layered stack for a single date
    Stack {
        /// RFC 3339 anchor instant
        #[arg(long)]
        date: String,
        /// Days to look ahead for a weekday fallback
        #[arg(long, default_value_t = 0)]
        fallback_days: u32,
        /// Jump the fallback straight to this weekday (e.g. "mon")
        #[arg(long)]
        shift_to: Option<String>,
        /// Active duration of each rule
        #[arg(long, default_value_t = 1)]
        duration: i64,
        /// Unit for --duration: second, minute, hour, day, week
        #[arg(long, default_value = "day")]
        unit: String,
        /// Base priority
        #[arg(long)]
        priority: Option<i32>,
        /// Comma-separated YYYY-MM-DD dates the fallback must avoid
        #[arg(long)]
        exclude: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Date of the nth weekday of a month
    Nth {
        #[arg(long)]
        year: i32,
        #[arg(long)]
        month: u32,
        /// Weekday name (e.g. "tue")
        #[arg(long)]
        weekday: String,
        #[arg(long)]
        n: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Eval { stack, at } => {
            let json = read_input(stack.as_deref())?;
            let stack: PolicyStack =
                serde_json::from_str(&json).context("Failed to parse policy stack JSON")?;
            tracing::debug!(policies = stack.len(), "loaded policy stack");
            let instant = match at {
                Some(at) => parse_instant(&at)?,
                None => Utc::now(),
            };
            let evaluation = stack.evaluate(instant);
            println!("{}", serde_json::to_string_pretty(&evaluation)?);
        }
        Commands::Stack {
            date,
            fallback_days,
            shift_to,
            duration,
            unit,
            priority,
            exclude,
            output,
        } => {
            let mut builder = RuleBuilder::specific_date(parse_instant(&date)?)
                .duration(duration, parse_unit(&unit)?)
                .max_fallback_days(fallback_days)
                .exclude_dates(&parse_dates(exclude.as_deref())?);
            if let Some(weekday) = shift_to {
                builder = builder.shift_to(parse_weekday(&weekday)?);
            }
            if let Some(priority) = priority {
                builder = builder.priority(priority);
            }

            let stack = PolicyStack::new(builder.build_specific_date_stack());
            let json = serde_json::to_string_pretty(&stack)?;
            write_output(output.as_deref(), &json)?;
        }
        Commands::Nth {
            year,
            month,
            weekday,
            n,
        } => {
            let weekday = parse_weekday(&weekday)?;
            match recurrence_policy::first_nth_weekday(year, month, weekday, n) {
                Some(date) => println!("{}", date),
                None => anyhow::bail!(
                    "no such occurrence: {}-{:02} has no weekday #{} of {}",
                    year,
                    month,
                    n,
                    weekday
                ),
            }
        }
    }

    Ok(())
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid RFC 3339 instant: '{}'", raw))
}

fn parse_weekday(raw: &str) -> Result<Weekday> {
    raw.parse::<Weekday>()
        .map_err(|_| anyhow::anyhow!("Unknown weekday: '{}'", raw))
}

fn parse_unit(raw: &str) -> Result<DurationUnit> {
    match raw.to_lowercase().as_str() {
        "second" | "seconds" => Ok(DurationUnit::Second),
        "minute" | "minutes" => Ok(DurationUnit::Minute),
        "hour" | "hours" => Ok(DurationUnit::Hour),
        "day" | "days" => Ok(DurationUnit::Day),
        "week" | "weeks" => Ok(DurationUnit::Week),
        other => anyhow::bail!(
            "Unknown unit: '{}'. Available units: second, minute, hour, day, week",
            other
        ),
    }
}

/// Parse `--exclude 2025-08-18,2025-08-19`. An empty string yields no dates.
fn parse_dates(raw: Option<&str>) -> Result<Vec<NaiveDate>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            NaiveDate::parse_from_str(part, "%Y-%m-%d")
                .with_context(|| format!("Invalid date: '{}'", part))
        })
        .collect()
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn write_output(path: Option<&str>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write file: {}", path))?;
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
