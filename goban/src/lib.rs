/*
 *  goban: the rules library for gomoku and renju.
 *
 *  Everything that defines the game itself lives here: the wall-padded
 *  board with its 128-bit zobrist hash, move legality and priority
 *  classification, the renju forbidden-point test, game histories, time
 *  controls, and the deterministic utilities the engine builds on.
 *  The search and the neural evaluator live in the `sente` crate.
 */

pub mod board;
pub mod core;
pub mod history;
pub mod rules;
pub mod timecontrols;

pub use board::{Board, Color, Loc, Move, MovePriority, Player, MAX_ARR_SIZE, MAX_LEN, MAX_PLAY_SIZE};
pub use core::common::Res;
pub use core::hash::Hash128;
pub use history::BoardHistory;
pub use rules::{BasicRule, Rules};
pub use timecontrols::TimeControls;
