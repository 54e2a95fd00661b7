use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use anyhow::anyhow;
use strum_macros::EnumIter;

/// Which win condition and restriction set the game is played under.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, EnumIter)]
#[must_use]
pub enum BasicRule {
    /// First to five or more in a row wins, no restrictions.
    #[default]
    Freestyle,
    /// Exactly five wins; overlines are dead stones for both sides.
    Standard,
    /// Black is barred from double-threes, double-fours and overlines.
    Renju,
}

impl Display for BasicRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BasicRule::Freestyle => write!(f, "freestyle"),
            BasicRule::Standard => write!(f, "standard"),
            BasicRule::Renju => write!(f, "renju"),
        }
    }
}

impl FromStr for BasicRule {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "freestyle" | "gomoku" => Ok(BasicRule::Freestyle),
            "standard" => Ok(BasicRule::Standard),
            "renju" => Ok(BasicRule::Renju),
            _ => Err(anyhow!("Unknown rule '{s}', expected freestyle, standard or renju")),
        }
    }
}

/// The full rule set. The game ancestors of this engine carried komi and
/// scoring knobs here; for five-in-a-row they are fixed constants and the
/// struct stays deliberately small.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
#[must_use]
pub struct Rules {
    pub basic_rule: BasicRule,
}

impl Rules {
    pub fn new(basic_rule: BasicRule) -> Self {
        Self { basic_rule }
    }

    pub fn renju() -> Self {
        Self::new(BasicRule::Renju)
    }

    pub fn freestyle() -> Self {
        Self::new(BasicRule::Freestyle)
    }
}

impl Display for Rules {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.basic_rule)
    }
}

impl FromStr for Rules {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Rules::new(s.parse()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn rule_strings_round_trip() {
        for rule in BasicRule::iter() {
            assert_eq!(rule.to_string().parse::<BasicRule>().unwrap(), rule);
        }
        assert!("5x5".parse::<BasicRule>().is_err());
    }
}
