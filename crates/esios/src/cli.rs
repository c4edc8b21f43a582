//! CLI surface (spec.md §6): `indicators`, `archives`, `cache`, `config`,
//! and a stubbed `exec`.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "esios", about = "Client and cache for ESIOS electricity-market data")]
pub struct Cli {
    #[arg(long, env = "ESIOS_API_KEY", global = true)]
    pub api_key: Option<String>,

    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    #[command(subcommand)]
    Indicators(IndicatorsCommand),
    #[command(subcommand)]
    Archives(ArchivesCommand),
    #[command(subcommand)]
    Cache(CacheCommand),
    #[command(subcommand)]
    Config(ConfigCommand),
    Exec(ExecArgs),
}

#[derive(Debug, Subcommand)]
pub enum IndicatorsCommand {
    List,
    Search { query: String },
    Meta { id: u32 },
    History {
        id: u32,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        #[arg(long = "geo")]
        geo_ids: Vec<u32>,
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ArchivesCommand {
    List,
    Download {
        id: u32,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        #[arg(long, value_enum, default_value = "daily")]
        horizon: HorizonArg,
        #[arg(long, value_enum, default_value = "zip")]
        kind: KindArg,
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum HorizonArg {
    Daily,
    Monthly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum KindArg {
    Zip,
    Xls,
}

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    Status,
    Path,
    Clear {
        #[arg(long)]
        indicators: bool,
        #[arg(long)]
        offer_indicators: bool,
    },
    Geos,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    Get { key: String },
    Set { key: String, value: String },
}

#[derive(Debug, clap::Args)]
pub struct ExecArgs {
    pub expression: String,
}
