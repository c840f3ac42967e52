//! Querymend CLI
//!
//! Command-line front end for the correction step that sits between an
//! NL→SQL agent and query execution:
//! - Correcting upstream payloads (`correct`) or a single query (`sql`)
//! - Checking a query against the execution guards (`check`)
//! - Building the analysis prompt from executed rows (`prompt`)
//! - Serving all of the above as webhooks (`serve`)

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use querymend_pipeline::PipelineConfig;
use querymend_sql::{correct_sql, Correction, CorrectionInput};
use serde_json::Value;
use std::fs;
use std::io::{self, Read};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::Level;

mod ops;
mod server;

#[derive(Parser)]
#[command(name = "querymend")]
#[command(
    author,
    version,
    about = "Querymend: repairs LLM-generated SQL before it reaches the database"
)]
struct Cli {
    /// Log verbosity on stderr (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Correct upstream payloads (JSON object or array) → output records.
    ///
    /// Malformed payloads yield `{"error": ...}` records; the command still
    /// exits successfully so a batch is never aborted by one bad record.
    Correct {
        /// Input JSON file (`-` or omitted: stdin)
        input: Option<PathBuf>,
        /// Dataset used when a payload names none
        #[arg(long)]
        table: Option<String>,
        /// Pretty-print the output JSON
        #[arg(long)]
        pretty: bool,
        #[command(flatten)]
        correction: CorrectionArgs,
    },

    /// Correct a single SQL string and print the result.
    Sql {
        /// SQL text (`-`: stdin)
        sql: String,
        /// Dataset used when the query has no FROM clause
        #[arg(long, default_value = "")]
        table: String,
        /// Schema description file (pipe table or one column per line)
        #[arg(long)]
        schema: Option<PathBuf>,
        /// Print the full correction as JSON instead of just the SQL
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        correction: CorrectionArgs,
    },

    /// Report whether a query passes the execution guards.
    Check {
        /// SQL text (`-`: stdin)
        sql: String,
        /// Append `LIMIT N` when the query has none
        #[arg(long)]
        limit: Option<u64>,
        /// Wrap the query in a `USING SAMPLE P PERCENT` subquery
        #[arg(long)]
        sample: Option<f64>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build the analysis prompt from executed rows.
    Prompt {
        /// Input JSON file (`-` or omitted: stdin)
        input: Option<PathBuf>,
        /// Rows forwarded to the prompt (overrides QUERYMEND_ANALYSIS_MAX_ROWS)
        #[arg(long)]
        max_rows: Option<usize>,
        /// Pretty-print the output JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Serve the correction step over HTTP.
    Serve {
        /// Listen address
        #[arg(long, default_value = "127.0.0.1:8787")]
        listen: SocketAddr,
        /// Write `{"addr", "pid"}` here once listening
        #[arg(long)]
        ready_file: Option<PathBuf>,
        #[command(flatten)]
        correction: CorrectionArgs,
    },
}

/// Overrides layered on top of `QUERYMEND_*` environment settings.
#[derive(Args, Debug, Clone, Default)]
struct CorrectionArgs {
    /// Row cap for rewritten queries
    #[arg(long)]
    row_cap: Option<u64>,
    /// Keep only strictly positive aggregate values in rewritten queries
    #[arg(long)]
    positive_only: bool,
    /// Comma-separated name hints for the category column
    #[arg(long, value_delimiter = ',')]
    category_hints: Vec<String>,
}

impl CorrectionArgs {
    fn apply(&self, config: &mut PipelineConfig) -> Result<()> {
        if let Some(cap) = self.row_cap {
            if cap == 0 {
                return Err(anyhow!("--row-cap must be positive"));
            }
            config.correction.row_cap = cap;
        }
        if self.positive_only {
            config.correction.positive_only = true;
        }
        let hints: Vec<String> = self
            .category_hints
            .iter()
            .map(|h| h.trim().to_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        if !hints.is_empty() {
            config.correction.category_hints = hints;
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = PipelineConfig::from_env()?;

    match cli.command {
        Commands::Correct {
            input,
            table,
            pretty,
            correction,
        } => {
            correction.apply(&mut config)?;
            cmd_correct(input.as_deref(), table.as_deref(), pretty, &config)?;
        }
        Commands::Sql {
            sql,
            table,
            schema,
            json,
            correction,
        } => {
            correction.apply(&mut config)?;
            cmd_sql(&sql, &table, schema.as_deref(), json, &config)?;
        }
        Commands::Check {
            sql,
            limit,
            sample,
            json,
        } => cmd_check(&sql, limit, sample, json)?,
        Commands::Prompt {
            input,
            max_rows,
            pretty,
        } => {
            if let Some(n) = max_rows {
                if n == 0 {
                    return Err(anyhow!("--max-rows must be positive"));
                }
                config.analysis_max_rows = n;
            }
            cmd_prompt(input.as_deref(), pretty, &config)?;
        }
        Commands::Serve {
            listen,
            ready_file,
            correction,
        } => {
            correction.apply(&mut config)?;
            server::serve(server::ServerConfig {
                listen,
                ready_file,
                pipeline: config,
            })?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn cmd_correct(
    input: Option<&Path>,
    table: Option<&str>,
    pretty: bool,
    config: &PipelineConfig,
) -> Result<()> {
    let text = read_input(input)?;
    let payload: Value = serde_json::from_str(&text)
        .map_err(|e| anyhow!("failed to parse input as JSON: {e}"))?;
    let out = ops::correct_payload(&payload, config, table);

    let records = match &out {
        Value::Array(items) => items.iter().collect::<Vec<_>>(),
        other => vec![other],
    };
    let failed = records.iter().filter(|r| r.get("error").is_some()).count();
    if failed > 0 {
        eprintln!(
            "{} {} of {} record(s) could not be corrected",
            "warning:".yellow().bold(),
            failed,
            records.len()
        );
    }

    print_json(&out, pretty)
}

fn cmd_sql(
    sql: &str,
    table: &str,
    schema: Option<&Path>,
    json: bool,
    config: &PipelineConfig,
) -> Result<()> {
    let sql = if sql == "-" { read_input(None)? } else { sql.to_string() };
    let schema_text = match schema {
        Some(path) => Some(
            fs::read_to_string(path)
                .map_err(|e| anyhow!("failed to read schema {}: {e}", path.display()))?,
        ),
        None => None,
    };

    let input = CorrectionInput::new(sql.trim(), table).with_schema(schema_text.as_deref());
    let correction = correct_sql(input, &config.correction);

    if json {
        return print_json(&ops::to_json(&correction), true);
    }
    match &correction {
        Correction::Unchanged { reason, .. } => eprintln!(
            "{} unchanged ({})",
            "ok".green().bold(),
            format!("{reason:?}").as_str().dimmed()
        ),
        other => eprintln!(
            "{} {}",
            "rewrote".green().bold(),
            other.kind().as_str().bold()
        ),
    }
    println!("{}", correction.sql());
    Ok(())
}

fn cmd_check(sql: &str, limit: Option<u64>, sample: Option<f64>, json: bool) -> Result<()> {
    let sql = if sql == "-" { read_input(None)? } else { sql.to_string() };
    let report = ops::check_sql(&ops::CheckRequest {
        sql: sql.trim().to_string(),
        limit,
        sample,
    });

    if json {
        return print_json(&ops::to_json(&report), true);
    }

    let verdict = if report.read_only {
        "read-only".green().bold()
    } else {
        "rejected".red().bold()
    };
    println!("{} {}", "guard:".bold(), verdict);
    println!(
        "{} {}",
        "min/max without GROUP BY:".bold(),
        if report.needs_correction { "yes".yellow() } else { "no".normal() }
    );
    match &report.shape.parse_error {
        Some(err) => println!("{} {}", "parse:".bold(), err.as_str().red()),
        None => println!(
            "{} {} statement(s), single select: {}",
            "parse:".bold(),
            report.shape.statements,
            report.shape.single_select
        ),
    }
    if let Some(limited) = &report.limited {
        println!("  {} {}", "→".yellow(), limited);
    }
    if let Some(sampled) = &report.sampled {
        println!("  {} {}", "→".yellow(), sampled);
    }
    Ok(())
}

fn cmd_prompt(input: Option<&Path>, pretty: bool, config: &PipelineConfig) -> Result<()> {
    let text = read_input(input)?;
    let payload: Value = serde_json::from_str(&text)
        .map_err(|e| anyhow!("failed to parse input as JSON: {e}"))?;
    let out = ops::analysis_payload(&payload, config)?;
    print_json(&out, pretty)
}

fn read_input(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) if path != Path::new("-") => fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read {}: {e}", path.display())),
        _ => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| anyhow!("failed to read stdin: {e}"))?;
            Ok(buf)
        }
    }
}

fn print_json(value: &Value, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{text}");
    Ok(())
}
