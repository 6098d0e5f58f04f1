use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::error::{Error, Result};

#[derive(Parser, Debug)]
#[command(name = "archsim", about = "Architecture load simulator")]
pub struct Args {
    /// Graph definition, TOML or JSON by extension.
    #[arg(long)]
    pub config: PathBuf,
    /// Override the simulated duration in seconds.
    #[arg(long)]
    pub duration: Option<u64>,
    #[arg(long, value_enum, default_value = "human")]
    pub format: FormatArg,
    #[arg(
        long,
        help = "Seed for randomized load splitting; omit for the graph's own seed (default 0)"
    )]
    pub seed: Option<u64>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum FormatArg {
    Human,
    Summary,
    Json,
}

pub fn parse_args() -> Result<Args> {
    Args::try_parse().map_err(|e| Error::Cli(e.to_string()))
}
