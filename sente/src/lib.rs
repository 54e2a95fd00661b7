/*
 *  sente: the engine on top of the `goban` rules library.
 *
 *  The decision stack, bottom to top: the consecutive-four threat solver,
 *  the neural evaluator service that batches positions from many search
 *  workers, the Monte-Carlo tree search with virtual-loss parallelism, and
 *  the asynchronous bot that owns the worker pool and speaks to the
 *  protocol front-ends.
 */

pub mod bot;
pub mod config;
pub mod io;
pub mod nn;
pub mod search;
pub mod time;
pub mod vcf;

pub use bot::AsyncBot;
pub use config::EngineConfig;
pub use nn::evaluator::NnEvaluator;
pub use vcf::{VcfResult, VcfSolver};

/// Reported by the `ABOUT` command and the GTP `name`/`version` pair.
pub const ENGINE_NAME: &str = "sente";
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
