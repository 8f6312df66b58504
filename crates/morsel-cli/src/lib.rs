use anyhow::{bail, Result};
use clap::Parser;
use morsel::{Engine, ForcedRow, Options};
use morsel_core::driver::Driver;

use std::io::Write;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "morsel")]
#[command(about = "Generate a referentially consistent random subset of a database")]
#[command(version)]
pub struct Cli {
    /// Connection URL for the data origin
    pub source: String,

    /// Connection URL for the data destination
    pub target: String,

    /// Proportion of rows to copy, greater than 0 and no greater than 1
    pub fraction: f64,

    /// Cut row counts logarithmically; try 0.5 for the fraction
    #[arg(short = 'l', long)]
    pub logarithmic: bool,

    /// Rows to buffer before each flush; 0 flushes every row
    #[arg(short = 'b', long, default_value_t = 1000)]
    pub buffer: usize,

    /// Max child rows to pull for each parent row
    #[arg(short = 'c', long, default_value_t = 3)]
    pub children: usize,

    /// A table:pk row to force into the target, descendants included
    #[arg(short = 'f', long = "force", value_name = "TABLE:PK")]
    pub force: Vec<String>,

    /// Non-default schema to include
    #[arg(long, value_name = "NAME")]
    pub schema: Vec<String>,

    /// Copy only tables matching this pattern (`*` wildcards)
    #[arg(short = 't', long = "table", value_name = "PATTERN")]
    pub tables: Vec<String>,

    /// Exclude tables matching this pattern
    #[arg(short = 'T', long = "exclude-table", value_name = "PATTERN")]
    pub exclude_tables: Vec<String>,

    /// Copy every row of this table
    #[arg(long = "full-table", value_name = "NAME")]
    pub full_tables: Vec<String>,

    /// Path to a JSON configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `morsel=debug`
    #[arg(long, default_value = "info")]
    pub log: String,

    /// Report each copied row through a row-added observer
    #[arg(long)]
    pub notify: bool,

    /// Proceed without stopping for confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,
}

impl Cli {
    pub fn to_options(&self) -> Result<Options> {
        let mut options = Options::new(self.fraction)?;
        options.logarithmic = self.logarithmic;
        options.buffer = self.buffer;
        options.children = self.children;
        options.schemas = self.schema.clone();
        options.tables = self.tables.clone();
        options.exclude_tables = self.exclude_tables.clone();
        options.full_tables = self.full_tables.clone();
        for directive in &self.force {
            options.force_rows.push(ForcedRow::parse(directive)?);
        }
        if let Some(path) = &self.config {
            options.apply_config_file(path)?;
        }
        Ok(options)
    }
}

/// Picks the driver matching the URL's scheme.
pub fn driver_for(url: &str) -> Result<Box<dyn Driver>> {
    let scheme = url.split(':').next().unwrap_or("");
    match scheme {
        "sqlite" => Ok(Box::new(morsel_driver_sqlite::Sqlite::new(url)?)),
        "postgresql" | "postgres" => {
            Ok(Box::new(morsel_driver_postgresql::PostgreSql::new(url)?))
        }
        other => bail!("unsupported database scheme `{other}`"),
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let options = cli.to_options()?;

    let source = driver_for(&cli.source)?;
    let target = driver_for(&cli.target)?;

    let mut engine = Engine::new(source.as_ref(), target.as_ref(), options).await?;

    for entry in engine.plan() {
        println!(
            "Create {} rows from {} in {}",
            entry.target_rows, entry.source_rows, entry.table
        );
    }
    if !cli.yes && !confirm()? {
        return Ok(());
    }

    if cli.notify {
        engine.subscribe(Box::new(|event| {
            tracing::info!(
                table = %event.table,
                prioritized = event.prioritized,
                "row added"
            );
            Ok(())
        }));
    }

    let summary = engine.run().await?;
    for entry in &summary.entries {
        println!(
            "{}: copied {} of {} targeted",
            entry.table, entry.copied, entry.target_rows
        );
    }
    Ok(())
}

fn confirm() -> Result<bool> {
    print!("Proceed? (Y/n) ");
    std::io::stdout().flush()?;
    let mut response = String::new();
    std::io::stdin().read_line(&mut response)?;
    let response = response.trim().to_lowercase();
    Ok(response.is_empty() || response.starts_with('y'))
}
