//! The Gomocup-style line protocol: `START`, `BOARD ... DONE`, `TURN`,
//! `INFO`, `ABOUT`, `RESTART`, `END`. Case-insensitive commands, `x,y`
//! move replies, `ERROR`/`UNKNOWN` on bad input. The engine answers every
//! opponent move immediately with its own move, as the protocol demands.

use std::io::BufRead;

use goban::board::{Board, Loc, Move, Player};
use goban::core::common::{Res, parse_fp_from_str, parse_int_from_str, tokenize_command};
use goban::history::BoardHistory;
use goban::rules::Rules;
use goban::timecontrols::TimeControls;

use crate::bot::AsyncBot;
use crate::config::EngineConfig;
use crate::io::logger::Logger;
use crate::{ENGINE_NAME, ENGINE_VERSION};

pub struct GomProtocol {
    bot: AsyncBot,
    config: EngineConfig,
    tc: TimeControls,
    logger: Logger,
    board_size: usize,
}

enum Reply {
    Line(String),
    Silent,
    Quit,
}

impl GomProtocol {
    pub fn new(bot: AsyncBot, config: EngineConfig, logger: Logger) -> Self {
        let board_size = config.board_size;
        GomProtocol { bot, config, tc: TimeControls::default(), logger, board_size }
    }

    pub fn run(&mut self) -> Res<()> {
        let stdin = std::io::stdin();
        let mut lines = stdin.lock().lines();
        while let Some(line) = lines.next() {
            let line = line?;
            self.logger.incoming(&line);
            // commas count as separators everywhere in this protocol
            let cleaned = line.replace(',', " ");
            let Some((cmd, args)) = tokenize_command(&cleaned) else {
                continue;
            };
            let reply = match self.dispatch(&cmd, &args, &mut lines) {
                Ok(reply) => reply,
                Err(err) => Reply::Line(format!("ERROR {err:#}")),
            };
            match reply {
                Reply::Line(text) => {
                    self.logger.outgoing(&text);
                    println!("{text}");
                }
                Reply::Silent => {}
                Reply::Quit => break,
            }
        }
        Ok(())
    }

    fn dispatch(
        &mut self,
        cmd: &str,
        args: &[&str],
        lines: &mut dyn Iterator<Item = std::io::Result<String>>,
    ) -> Res<Reply> {
        match cmd {
            "about" => Ok(Reply::Line(format!(
                "name=\"{ENGINE_NAME}\", version=\"{ENGINE_VERSION}\", author=\"sente developers\", country=\"\""
            ))),
            "end" => {
                self.logger.write("Quit requested by controller");
                Ok(Reply::Quit)
            }
            "start" => {
                let size = if args.is_empty() {
                    self.config.board_size
                } else {
                    parse_int_from_str(args[0], "board size")?
                };
                self.reset_board(size)?;
                Ok(Reply::Line("OK".to_string()))
            }
            "restart" => {
                self.reset_board(self.board_size)?;
                Ok(Reply::Line("OK".to_string()))
            }
            "info" => {
                self.handle_info(args)?;
                Ok(Reply::Silent)
            }
            "turn" => {
                if args.len() != 2 {
                    anyhow::bail!("Expected 2 arguments for TURN but got '{}'", args.join(" "));
                }
                let loc = self.parse_move(args[0], args[1])?;
                let pla = self.next_player();
                if !self.bot.make_move(loc, pla) {
                    anyhow::bail!("illegal move");
                }
                self.generate_and_play()
            }
            "begin" => self.generate_and_play(),
            "board" => {
                self.bot.search.evaluator.clear_cache();
                self.reset_board(self.board_size)?;
                let mut stones: Vec<Move> = vec![];
                let mut pla = Player::Black;
                for line in lines {
                    let line = line?;
                    self.logger.incoming(&line);
                    let cleaned = line.replace(',', " ");
                    let fields: Vec<&str> = cleaned.split_whitespace().collect();
                    if fields.first().is_some_and(|f| f.eq_ignore_ascii_case("done")) {
                        break;
                    }
                    if fields.len() < 2 {
                        anyhow::bail!("Expected x,y[,who] in BOARD block but got '{line}'");
                    }
                    let loc = self.parse_move(fields[0], fields[1])?;
                    stones.push(Move::new(loc, pla));
                    pla = pla.opponent();
                }
                self.replay_position(&stones)?;
                self.generate_and_play()
            }
            "clear_cache" => {
                self.bot.search.evaluator.clear_cache();
                Ok(Reply::Silent)
            }
            _ => Ok(Reply::Line(format!("UNKNOWN command '{cmd}'"))),
        }
    }

    fn handle_info(&mut self, args: &[&str]) -> Res<()> {
        let Some(&sub) = args.first() else {
            return Ok(());
        };
        match sub.to_ascii_lowercase().as_str() {
            "time_left" => {
                if args.len() != 2 {
                    anyhow::bail!("Expected 1 argument for info:time_left but got '{}'", args.join(" "));
                }
                self.tc.main_time_left = parse_fp_from_str(args[1], "time_left")? / 1000.0;
            }
            "timeout_turn" => {
                if args.len() != 2 {
                    anyhow::bail!("Expected 1 argument for info:timeout_turn but got '{}'", args.join(" "));
                }
                self.tc.per_move_time = parse_fp_from_str(args[1], "timeout_turn")? / 1000.0;
            }
            // timeout_match, max_memory, game_type ... are none of our business
            _ => {}
        }
        Ok(())
    }

    fn reset_board(&mut self, size: usize) -> Res<()> {
        let board = Board::new(size, size, self.config.rule)?;
        let hist = BoardHistory::new(&board, Player::Black, Rules::new(self.config.rule));
        self.bot.set_position(Player::Black, board, hist);
        self.bot.clear_search();
        self.board_size = size;
        Ok(())
    }

    fn replay_position(&mut self, stones: &[Move]) -> Res<()> {
        let mut board = Board::new(self.board_size, self.board_size, self.config.rule)?;
        let mut hist = BoardHistory::new(&board, Player::Black, Rules::new(self.config.rule));
        for mv in stones {
            if !hist.make_board_move_tolerant(&mut board, mv.loc, mv.pla) {
                anyhow::bail!("illegal stone in BOARD block");
            }
        }
        let next = stones.last().map_or(Player::Black, |mv| mv.pla.opponent());
        self.bot.set_position(next, board, hist);
        Ok(())
    }

    fn generate_and_play(&mut self) -> Res<Reply> {
        let pla = self.next_player();
        let chosen = self.bot.gen_move_synchronous(pla, self.tc, 1.0);
        if !chosen.is_real() {
            anyhow::bail!("no legal move available");
        }
        self.bot.make_move(chosen, pla);
        let x = chosen.x(self.board_size);
        let y = chosen.y(self.board_size);
        self.logger.write(&format!(
            "played {x},{y} visits {} time budget {}",
            self.bot.search.root_visits(),
            self.tc
        ));
        Ok(Reply::Line(format!("{x},{y}")))
    }

    fn next_player(&self) -> Player {
        self.bot.search.root_player()
    }

    fn parse_move(&self, xs: &str, ys: &str) -> Res<Loc> {
        let x: usize = parse_int_from_str(xs, "x coordinate")?;
        let y: usize = parse_int_from_str(ys, "y coordinate")?;
        if x >= self.board_size || y >= self.board_size {
            anyhow::bail!("Move outside board");
        }
        Ok(Loc::from_xy(x, y, self.board_size))
    }
}
