use std::fmt::{self, Display, Formatter};

/// The clock state the protocol reports: total main time remaining and the
/// hard per-move cap, both in seconds.
#[derive(Debug, Copy, Clone, PartialEq)]
#[must_use]
pub struct TimeControls {
    pub per_move_time: f64,
    pub main_time_left: f64,
}

/// The budget handed to a single search: never stop before `min_time`,
/// aim for `recommended_time`, never exceed `max_time`.
#[derive(Debug, Copy, Clone, PartialEq)]
#[must_use]
pub struct TimeBudget {
    pub min_time: f64,
    pub recommended_time: f64,
    pub max_time: f64,
}

impl Default for TimeControls {
    fn default() -> Self {
        TimeControls { per_move_time: 10_000.0 / 1000.0, main_time_left: 1.0e10 }
    }
}

fn apply_lag_buffer(time: f64, lag_buffer: f64) -> f64 {
    if time < 2.0 * lag_buffer { time * 0.5 } else { time - lag_buffer }
}

impl TimeControls {
    /// Allocates time for the next move. The budget follows a decaying
    /// schedule over the game: a fixed fraction of the remaining main time,
    /// discounted by how many full moves have been played, clipped to the
    /// per-move cap minus a network-lag buffer. The very first move gets an
    /// extra debit because allocation and cache warm-up eat into it.
    pub fn get_time(&self, num_moves_played: usize, lag_buffer: f64) -> TimeBudget {
        let step = (num_moves_played / 2) as f64;
        let mut tm = 1e10;
        if self.main_time_left > 0.0 {
            tm = 0.4 * self.main_time_left / (step + 10.0).powf(0.7);
        }

        let max_per_move = apply_lag_buffer(self.per_move_time, lag_buffer);
        tm = tm.min(max_per_move);

        if num_moves_played / 2 == 0 {
            tm -= 1.5;
        }
        tm = tm.max(0.0);

        TimeBudget { min_time: tm, recommended_time: tm, max_time: tm }
    }

    pub fn to_debug_string(&self, num_moves_played: usize, lag_buffer: f64) -> String {
        let budget = self.get_time(num_moves_played, lag_buffer);
        format!(
            "timeLeft {} perMoveTime {} minRecMax {} {} {}",
            self.main_time_left, self.per_move_time, budget.min_time, budget.recommended_time, budget.max_time
        )
    }
}

impl Display for TimeControls {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "timeLeft {} perMoveTime {}", self.main_time_left, self.per_move_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_decays_over_the_game() {
        let tc = TimeControls { per_move_time: 1e9, main_time_left: 600.0 };
        let early = tc.get_time(2, 0.5).recommended_time;
        let late = tc.get_time(100, 0.5).recommended_time;
        assert!(early > late);
        assert!(late > 0.0);
    }

    #[test]
    fn per_move_cap_applies() {
        let tc = TimeControls { per_move_time: 2.0, main_time_left: 1e9 };
        let budget = tc.get_time(10, 0.25);
        assert!(budget.max_time <= 2.0 - 0.25 + 1e-9);
    }

    #[test]
    fn first_move_pays_warmup_debit() {
        let tc = TimeControls { per_move_time: 30.0, main_time_left: 600.0 };
        let first = tc.get_time(0, 0.5).recommended_time;
        let second = tc.get_time(2, 0.5).recommended_time;
        assert!(first < second);
    }

    #[test]
    fn never_negative() {
        let tc = TimeControls { per_move_time: 1.0, main_time_left: 0.5 };
        assert!(tc.get_time(0, 0.5).recommended_time >= 0.0);
    }
}
