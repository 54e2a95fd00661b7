use std::fmt::Display;
use std::str::FromStr;

pub use anyhow;

pub type Res<T> = anyhow::Result<T>;

pub fn parse_int_from_str<T: FromStr + Display>(as_str: &str, name: &str) -> Res<T> {
    // for some weird Rust reason, parse::<T>() returns a completely unbounded Err on failure,
    // so we just write the error message ourselves
    as_str
        .parse::<T>()
        .map_err(|_err| anyhow::anyhow!("Couldn't parse {name} ('{as_str}')"))
}

pub fn parse_fp_from_str(as_str: &str, name: &str) -> Res<f64> {
    as_str
        .parse::<f64>()
        .map_err(|_err| anyhow::anyhow!("Couldn't parse {name} ('{as_str}')"))
}

pub fn parse_bool_from_str(input: &str, name: &str) -> Res<bool> {
    if input.eq_ignore_ascii_case("true") || input == "1" {
        Ok(true)
    } else if input.eq_ignore_ascii_case("false") || input == "0" {
        Ok(false)
    } else {
        Err(anyhow::anyhow!("Couldn't parse {name} ('{input}') as a bool"))
    }
}

/// Tokenize a protocol line. Commands are matched case-insensitively, so the
/// first token is lowercased here once instead of at every comparison site.
pub fn tokenize_command(line: &str) -> Option<(String, Vec<&str>)> {
    let mut words = line.split_whitespace();
    let cmd = words.next()?.to_ascii_lowercase();
    Some((cmd, words.collect()))
}
