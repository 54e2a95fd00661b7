//! Session logging for the protocol front-ends. Every inbound command and
//! outbound reply is recorded with a direction prefix, plus free-form
//! search summaries, so a lost game can be replayed from the log alone.

use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

use goban::core::common::Res;

pub struct Logger {
    file: Option<Mutex<std::fs::File>>,
    also_stderr: bool,
}

impl Logger {
    pub fn new(log_file: Option<&str>, also_stderr: bool) -> Res<Self> {
        let file = match log_file {
            Some(path) => {
                let f = OpenOptions::new().create(true).append(true).open(path)?;
                Some(Mutex::new(f))
            }
            None => None,
        };
        let logger = Logger { file, also_stderr };
        logger.write(&format!("[Starting logging at {}]", chrono::Utc::now().to_rfc2822()));
        Ok(logger)
    }

    pub fn disabled() -> Self {
        Logger { file: None, also_stderr: false }
    }

    pub fn write(&self, message: &str) {
        if let Some(file) = &self.file {
            let mut file = file.lock().unwrap();
            let _ = writeln!(file, "{message}");
            let _ = file.flush();
        }
        if self.also_stderr {
            eprintln!("{message}");
        }
    }

    /// A line received from the controller.
    pub fn incoming(&self, line: &str) {
        self.write(&format!("> {line}"));
    }

    /// A line sent back to the controller.
    pub fn outgoing(&self, line: &str) {
        self.write(&format!("< {line}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logs_to_file_with_direction_prefixes() {
        let dir = std::env::temp_dir().join(format!("sente-logtest-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("session.log");
        let path_str = path.to_str().unwrap().to_string();
        {
            let logger = Logger::new(Some(&path_str), false).unwrap();
            logger.incoming("TURN 7,7");
            logger.outgoing("8,8");
        }
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("> TURN 7,7"));
        assert!(contents.contains("< 8,8"));
        assert!(contents.contains("[Starting logging at"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn disabled_logger_is_silent() {
        let logger = Logger::disabled();
        logger.write("nothing happens");
    }
}
