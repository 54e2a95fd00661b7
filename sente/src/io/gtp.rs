//! The GTP-style front-end: `=`/`?` replies with optional id echo,
//! letter-number vertices, and a streaming `analyze` in the lz/kata
//! lineage. Optional surface; match play uses the Gomocup protocol.

use std::io::BufRead;
use std::sync::Arc;

use edit_distance::edit_distance;
use goban::board::{Board, Loc, Player};
use itertools::Itertools;
use goban::core::common::{Res, parse_fp_from_str, parse_int_from_str};
use goban::history::BoardHistory;
use goban::rules::Rules;
use goban::timecontrols::TimeControls;

use crate::bot::AsyncBot;
use crate::config::EngineConfig;
use crate::io::logger::Logger;
use crate::{ENGINE_NAME, ENGINE_VERSION};

const COLUMN_LETTERS: &str = "ABCDEFGHJKLMNOPQRST";

const KNOWN_COMMANDS: &[&str] = &[
    "protocol_version",
    "name",
    "version",
    "known_command",
    "list_commands",
    "quit",
    "boardsize",
    "clear_board",
    "komi",
    "play",
    "genmove",
    "undo",
    "showboard",
    "clear_cache",
    "stop",
    "analyze",
    "kata-set-param",
    "time_settings",
    "time_left",
];

/// Formats an internal location as a GTP vertex (row 1 at the bottom).
pub fn format_vertex(loc: Loc, board_size: usize) -> String {
    let x = loc.x(board_size);
    let y = loc.y(board_size);
    let column = COLUMN_LETTERS.as_bytes()[x] as char;
    format!("{column}{}", board_size - y)
}

pub fn parse_vertex(s: &str, board_size: usize) -> Res<Loc> {
    let s = s.trim().to_ascii_uppercase();
    let mut chars = s.chars();
    let column = chars.next().ok_or_else(|| anyhow::anyhow!("empty vertex"))?;
    let x = COLUMN_LETTERS
        .find(column)
        .ok_or_else(|| anyhow::anyhow!("bad column in vertex '{s}'"))?;
    let row: usize = chars.as_str().parse().map_err(|_| anyhow::anyhow!("bad row in vertex '{s}'"))?;
    if x >= board_size || row == 0 || row > board_size {
        anyhow::bail!("vertex '{s}' is outside the board");
    }
    Ok(Loc::from_xy(x, board_size - row, board_size))
}

pub struct GtpProtocol {
    bot: AsyncBot,
    config: EngineConfig,
    tc: TimeControls,
    logger: Logger,
    board_size: usize,
    analyzing: bool,
}

impl GtpProtocol {
    pub fn new(bot: AsyncBot, config: EngineConfig, logger: Logger) -> Self {
        let board_size = config.board_size;
        GtpProtocol { bot, config, tc: TimeControls::default(), logger, board_size, analyzing: false }
    }

    pub fn run(&mut self) -> Res<()> {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = line?;
            self.logger.incoming(&line);
            let mut words = line.split_whitespace().peekable();
            let id = words.peek().and_then(|w| w.parse::<u64>().ok()).map(|id| {
                words.next();
                id
            });
            let Some(cmd) = words.next() else { continue };
            let cmd = cmd.to_ascii_lowercase();
            let args: Vec<&str> = words.collect();

            if self.analyzing {
                // any new command ends the stream
                self.bot.stop_and_wait();
                self.analyzing = false;
                println!();
            }

            let (ok, reply, quit) = match self.dispatch(&cmd, &args) {
                Ok(Response::Text(text)) => (true, text, false),
                Ok(Response::Quit) => (true, String::new(), true),
                // `analyze` acknowledged; info lines follow asynchronously
                Ok(Response::Streaming) => (true, String::new(), false),
                Err(err) => (false, format!("{err:#}"), false),
            };
            let prefix = if ok { "=" } else { "?" };
            let full = match id {
                Some(id) => format!("{prefix}{id} {reply}"),
                None => format!("{prefix} {reply}"),
            };
            self.logger.outgoing(&full);
            println!("{full}");
            if !self.analyzing {
                println!();
            }
            if quit {
                break;
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, cmd: &str, args: &[&str]) -> Res<Response> {
        match cmd {
            "protocol_version" => Ok(Response::Text("2".into())),
            "name" => Ok(Response::Text(ENGINE_NAME.into())),
            "version" => Ok(Response::Text(ENGINE_VERSION.into())),
            "quit" => Ok(Response::Quit),
            "list_commands" => Ok(Response::Text(KNOWN_COMMANDS.join("\n"))),
            "known_command" => {
                let known = args.first().is_some_and(|c| KNOWN_COMMANDS.contains(c));
                Ok(Response::Text(known.to_string()))
            }
            "boardsize" => {
                let size = parse_int_from_str(args.first().copied().unwrap_or(""), "board size")?;
                self.reset_board(size)?;
                Ok(Response::Text(String::new()))
            }
            "clear_board" => {
                self.reset_board(self.board_size)?;
                Ok(Response::Text(String::new()))
            }
            // carried for controller compatibility; five-in-a-row has no komi
            "komi" => Ok(Response::Text(String::new())),
            "play" => {
                let (pla, loc) = self.parse_play_args(args)?;
                let current = self.bot.search.root_player();
                if pla != current {
                    // GTP allows either side to move; resync the root
                    let board = self.bot.search.root_board();
                    let hist = self.bot.search.root_hist();
                    self.bot.set_position(pla, board, hist);
                }
                if !self.bot.make_move(loc, pla) {
                    anyhow::bail!("illegal move");
                }
                Ok(Response::Text(String::new()))
            }
            "genmove" => {
                let pla: Player = args.first().copied().unwrap_or("").parse()?;
                let chosen = self.bot.gen_move_synchronous(pla, self.tc, 1.0);
                if !chosen.is_real() {
                    return Ok(Response::Text("pass".into()));
                }
                self.bot.make_move(chosen, pla);
                Ok(Response::Text(format_vertex(chosen, self.board_size)))
            }
            "undo" => {
                let mut board = self.bot.search.root_board();
                let mut hist = self.bot.search.root_hist();
                hist.undo(&mut board)?;
                let pla = hist.presumed_next_move_pla;
                self.bot.set_position(pla, board, hist);
                Ok(Response::Text(String::new()))
            }
            "showboard" => Ok(Response::Text(format!("\n{}", self.bot.search.root_board()))),
            "clear_cache" => {
                self.bot.search.evaluator.clear_cache();
                Ok(Response::Text(String::new()))
            }
            "stop" => {
                self.bot.stop_and_wait();
                Ok(Response::Text(String::new()))
            }
            "analyze" => {
                let mut args = args.iter().peekable();
                let pla = match args.peek().and_then(|a| a.parse::<Player>().ok()) {
                    Some(p) => {
                        args.next();
                        p
                    }
                    None => self.bot.search.root_player(),
                };
                let centis: f64 = match args.next() {
                    Some(a) => parse_fp_from_str(a, "analyze interval")?,
                    None => 100.0,
                };
                let board_size = self.board_size;
                let callback: crate::bot::AnalysisCallback = Arc::new(move |rows| {
                    let line = rows
                        .iter()
                        .map(|row| {
                            format!(
                                "info move {} visits {} winrate {:.4} prior {:.4} lcb {:.4} order {} pv {}",
                                format_vertex(row.loc, board_size),
                                row.visits,
                                row.winrate,
                                row.prior,
                                row.lcb,
                                row.order,
                                row.pv.iter().map(|l| format_vertex(*l, board_size)).join(" ")
                            )
                        })
                        .join(" ");
                    if !line.is_empty() {
                        println!("{line}");
                    }
                });
                self.bot.analyze_async(pla, 1.0, centis / 100.0, callback);
                self.analyzing = true;
                Ok(Response::Streaming)
            }
            "kata-set-param" => {
                let (key, value) = match (args.first(), args.get(1)) {
                    (Some(k), Some(v)) => (*k, *v),
                    _ => anyhow::bail!("expected: kata-set-param <key> <value>"),
                };
                self.set_param(key, value)?;
                Ok(Response::Text(String::new()))
            }
            "time_settings" => {
                let main: f64 = parse_fp_from_str(args.first().copied().unwrap_or("0"), "main time")?;
                self.tc.main_time_left = main;
                Ok(Response::Text(String::new()))
            }
            "time_left" => {
                let secs: f64 = parse_fp_from_str(args.get(1).copied().unwrap_or("0"), "time left")?;
                self.tc.main_time_left = secs;
                Ok(Response::Text(String::new()))
            }
            _ => {
                let suggestion = KNOWN_COMMANDS
                    .iter()
                    .min_by_key(|known| edit_distance(cmd, known))
                    .filter(|known| edit_distance(cmd, known) <= 3);
                match suggestion {
                    Some(s) => anyhow::bail!("unknown command '{cmd}', did you mean '{s}'?"),
                    None => anyhow::bail!("unknown command '{cmd}'"),
                }
            }
        }
    }

    fn set_param(&mut self, key: &str, value: &str) -> Res<()> {
        // rebuild the stack with the new setting; the tree does not survive
        let mut config = self.config.clone();
        config.apply_override(key, value)?;
        let board = self.bot.search.root_board();
        let hist = self.bot.search.root_hist();
        let pla = self.bot.search.root_player();
        let bot = config.build_bot()?;
        bot.set_position(pla, board, hist);
        self.bot = bot;
        self.config = config;
        Ok(())
    }

    fn parse_play_args(&self, args: &[&str]) -> Res<(Player, Loc)> {
        if args.len() != 2 {
            anyhow::bail!("expected: play <color> <vertex>");
        }
        let pla: Player = args[0].parse()?;
        let loc = parse_vertex(args[1], self.board_size)?;
        Ok((pla, loc))
    }

    fn reset_board(&mut self, size: usize) -> Res<()> {
        let board = Board::new(size, size, self.config.rule)?;
        let hist = BoardHistory::new(&board, Player::Black, Rules::new(self.config.rule));
        self.bot.set_position(Player::Black, board, hist);
        self.bot.clear_search();
        self.board_size = size;
        Ok(())
    }
}

#[derive(Debug)]
enum Response {
    Text(String),
    Streaming,
    Quit,
}
