use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use colored::Colorize;
use goban::core::common::Res;
use sente::config::EngineConfig;
use sente::io::gomocup::GomProtocol;
use sente::io::gtp::GtpProtocol;
use sente::io::logger::Logger;

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum Mode {
    /// The Gomocup match protocol (START/TURN/BOARD over stdin).
    Gomocup,
    /// The GTP-style protocol with streaming analysis.
    Gtp,
}

#[derive(Parser)]
#[command(name = "sente", about = "A gomoku and renju playing and analysis engine")]
struct Cli {
    /// Which line protocol to speak on stdin/stdout.
    #[arg(long, value_enum, default_value_t = Mode::Gomocup)]
    mode: Mode,
    /// Engine configuration file (flat key = value).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Log protocol traffic and search summaries to this file.
    #[arg(long)]
    log_file: Option<String>,
    /// Override the search seed for reproducible runs.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Res<()> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.search.rand_seed = Some(seed);
    }
    if cli.log_file.is_some() {
        config.log_file = cli.log_file.clone();
    }

    let logger = Logger::new(config.log_file.as_deref(), false)?;
    for warning in &config.warnings {
        eprintln!("{} {warning}", "config warning:".yellow());
        logger.write(&format!("config warning: {warning}"));
    }

    let bot = config.build_bot()?;
    match cli.mode {
        Mode::Gomocup => GomProtocol::new(bot, config, logger).run(),
        Mode::Gtp => GtpProtocol::new(bot, config, logger).run(),
    }
}
