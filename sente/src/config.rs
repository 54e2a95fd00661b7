//! Flat key = value engine configuration. Only the keys the decision core
//! actually consumes are interpreted; anything else warns and is ignored so
//! configs can be shared with tooling that has more knobs.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use goban::board::{Board, Player};
use goban::core::common::{Res, parse_bool_from_str, parse_fp_from_str, parse_int_from_str};
use goban::rules::BasicRule;

use crate::bot::AsyncBot;
use crate::nn::{NnEvaluator, PatternBackend};
use crate::search::{Search, SearchParams};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub search: SearchParams,
    pub rule: BasicRule,
    pub board_size: usize,
    pub nn_cache_size_pow_of_two: u32,
    pub nn_mutex_pool_size_pow_of_two: u32,
    pub num_nn_server_threads: usize,
    pub nn_max_batch_size: usize,
    pub log_file: Option<String>,
    /// Keys we didn't understand, reported once at startup.
    pub warnings: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            search: SearchParams::default(),
            rule: BasicRule::Freestyle,
            board_size: 15,
            nn_cache_size_pow_of_two: 18,
            nn_mutex_pool_size_pow_of_two: 12,
            num_nn_server_threads: 1,
            nn_max_batch_size: 32,
            log_file: None,
            warnings: vec![],
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: &Path) -> Res<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Couldn't read config file {}", path.display()))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Res<Self> {
        let mut config = EngineConfig::default();
        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                config.warnings.push(format!("line {}: expected key = value, got '{raw}'", lineno + 1));
                continue;
            };
            config.apply(key.trim(), value.trim())?;
        }
        Ok(config)
    }

    /// Applies one key at runtime, e.g. from `kata-set-param`.
    pub fn apply_override(&mut self, key: &str, value: &str) -> Res<()> {
        self.apply(key, value)
    }

    fn apply(&mut self, key: &str, value: &str) -> Res<()> {
        let s = &mut self.search;
        match key {
            "numSearchThreads" => s.num_search_threads = parse_int_from_str(value, key)?,
            "maxVisits" => s.max_visits = parse_int_from_str(value, key)?,
            "maxPlayouts" => s.max_playouts = parse_int_from_str(value, key)?,
            "maxTime" => s.max_time = parse_fp_from_str(value, key)?,
            "searchRandSeed" => s.rand_seed = Some(parse_int_from_str(value, key)?),
            "rootPolicyTemperature" => s.root_policy_temperature = parse_fp_from_str(value, key)?,
            "wideRootNoise" => s.wide_root_noise = parse_fp_from_str(value, key)?,
            "playoutDoublingAdvantage" => s.playout_doubling_advantage = parse_fp_from_str(value, key)?,
            "ponderingEnabled" => s.pondering_enabled = parse_bool_from_str(value, key)?,
            "cpuctExploration" => s.cpuct = parse_fp_from_str(value, key)?,
            "lagBuffer" => s.lag_buffer = parse_fp_from_str(value, key)?,
            "nnCacheSizePowerOfTwo" => self.nn_cache_size_pow_of_two = parse_int_from_str(value, key)?,
            "nnMutexPoolSizePowerOfTwo" => {
                self.nn_mutex_pool_size_pow_of_two = parse_int_from_str(value, key)?;
            }
            "numNNServerThreadsPerModel" => self.num_nn_server_threads = parse_int_from_str(value, key)?,
            "nnMaxBatchSize" => self.nn_max_batch_size = parse_int_from_str(value, key)?,
            "rules" => self.rule = value.parse()?,
            "boardSize" => self.board_size = parse_int_from_str(value, key)?,
            "logFile" => self.log_file = Some(value.to_string()),
            _ => self.warnings.push(format!("unknown config key '{key}'")),
        }
        Ok(())
    }

    /// Builds the full stack this config describes: backend, evaluator,
    /// search and worker pool.
    pub fn build_bot(&self) -> Res<AsyncBot> {
        let board = Board::new(self.board_size, self.board_size, self.rule)?;
        let backend = Arc::new(PatternBackend::new(self.nn_max_batch_size));
        let evaluator = NnEvaluator::new(
            backend,
            self.nn_cache_size_pow_of_two,
            self.nn_mutex_pool_size_pow_of_two,
            self.num_nn_server_threads,
        );
        let search = Search::new(evaluator, self.search.clone(), board, Player::Black);
        Ok(AsyncBot::new(search))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_core_keys() {
        let text = "
            # engine settings
            numSearchThreads = 16
            maxVisits = 800
            maxTime = 4.5
            nnCacheSizePowerOfTwo = 20   # entries
            searchRandSeed = 12345
            rules = renju
            ponderingEnabled = true
            someFutureKnob = 7
        ";
        let config = EngineConfig::parse(text).unwrap();
        assert_eq!(config.search.num_search_threads, 16);
        assert_eq!(config.search.max_visits, 800);
        assert_eq!(config.search.max_time, 4.5);
        assert_eq!(config.nn_cache_size_pow_of_two, 20);
        assert_eq!(config.search.rand_seed, Some(12345));
        assert_eq!(config.rule, BasicRule::Renju);
        assert!(config.search.pondering_enabled);
        assert_eq!(config.warnings.len(), 1);
        assert!(config.warnings[0].contains("someFutureKnob"));
    }

    #[test]
    fn bad_values_error_out() {
        assert!(EngineConfig::parse("maxVisits = soon").is_err());
        assert!(EngineConfig::parse("rules = checkers").is_err());
    }
}
