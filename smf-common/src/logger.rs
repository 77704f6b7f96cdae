//! Channel-backed logger shared by every long-lived task in the framework.
//!
//! A single background thread owns the file handle and serializes writes;
//! callers only ever touch a cheap, cloneable `Sender`. This mirrors the
//! ownership rule of design note "global singletons -> owned subsystems":
//! there is no process-wide logger singleton, each task constructor takes a
//! `Logger` handle explicitly and decides its own shutdown order.
use std::fmt::Display;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread::spawn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARNING",
            Level::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Logger {
    sink: Sender<String>,
}

impl Logger {
    /// Opens (creating if needed) `path` and spawns the writer thread.
    pub fn new(path: &str) -> Logger {
        let (sink, receiver) = channel();
        let path = path.to_string();
        spawn(move || write_loop(&path, receiver));
        Logger { sink }
    }

    /// A logger that discards everything; used in tests and for components
    /// configured with `log-level = off`.
    pub fn null() -> Logger {
        let (sink, receiver) = channel::<String>();
        spawn(move || for _ in receiver {});
        Logger { sink }
    }

    pub fn info(&self, module: &str, message: &str) {
        self.log(Level::Info, module, message);
    }

    pub fn warn(&self, module: &str, message: &str) {
        self.log(Level::Warn, module, message);
    }

    pub fn error(&self, module: &str, message: &str) {
        self.log(Level::Error, module, message);
    }

    pub fn debug<T: Display>(&self, module: &str, message: &str, data: T) {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let _ = self
            .sink
            .send(format!("[DEBUG] {now} {module}: {message} - {data}"));
    }

    fn log(&self, level: Level, module: &str, message: &str) {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let _ = self
            .sink
            .send(format!("[{}] {now} {module}: {message}", level.tag()));
    }
}

fn write_loop(path: &str, receiver: Receiver<String>) {
    let file = OpenOptions::new().create(true).append(true).open(path);
    let mut file = match file {
        Ok(f) => f,
        Err(e) => {
            eprintln!("smf-common::logger: cannot open {path}: {e}");
            return;
        }
    };
    for line in receiver {
        if let Err(e) = writeln!(file, "{line}") {
            eprintln!("smf-common::logger: write failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn writes_lines_with_level_tags() {
        let path = std::env::temp_dir().join(format!("smf-logger-test-{:?}", std::thread::current().id()));
        let path_str = path.to_str().unwrap().to_string();
        let logger = Logger::new(&path_str);
        logger.info("test", "hello");
        logger.error("test", "oops");
        sleep(Duration::from_millis(50));
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[INFO]"));
        assert!(contents.contains("[ERROR]"));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn null_logger_never_panics() {
        let logger = Logger::null();
        for _ in 0..100 {
            logger.info("test", "swallowed");
        }
    }
}
