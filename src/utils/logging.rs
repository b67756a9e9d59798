use chrono::Local;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::Path,
};

pub trait Logger: Send + Sync {
    fn log(&mut self, message: &str);
    fn debug_log(&mut self, message: &str);
}

#[derive(Debug)]
pub struct FileLogger {
    log_file: String,
    debug: bool,
}

impl FileLogger {
    pub fn new(log_file: &str, debug: bool) -> std::io::Result<Self> {
        // Create log directory if it doesn't exist
        if let Some(parent) = Path::new(log_file).parent() {
            fs::create_dir_all(parent)?;
        }

        Ok(FileLogger {
            log_file: log_file.to_string(),
            debug,
        })
    }

    fn write_to_file(&self, message: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)?;

        writeln!(
            file,
            "{}: {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            message
        )
    }
}

impl Logger for FileLogger {
    fn log(&mut self, message: &str) {
        if let Err(e) = self.write_to_file(message) {
            eprintln!("Failed to write to log file: {}", e);
        }
    }

    fn debug_log(&mut self, message: &str) {
        if self.debug {
            if let Err(e) = self.write_to_file(&format!("[DEBUG] {}", message)) {
                eprintln!("Failed to write debug log: {}", e);
            }
        }
    }
}

/// Progress lines for interactive runs. Stdout stays free for `--print`.
#[derive(Debug, Default)]
pub struct StderrLogger {
    debug: bool,
}

impl StderrLogger {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }
}

impl Logger for StderrLogger {
    fn log(&mut self, message: &str) {
        eprintln!("{}", message);
    }

    fn debug_log(&mut self, message: &str) {
        if self.debug {
            eprintln!("[DEBUG] {}", message);
        }
    }
}

// MultiLogger allows logging to multiple destinations
#[derive(Default)]
pub struct MultiLogger {
    loggers: Vec<Box<dyn Logger>>,
}

impl MultiLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, logger: Box<dyn Logger>) {
        self.loggers.push(logger);
    }
}

impl Logger for MultiLogger {
    fn log(&mut self, message: &str) {
        for logger in &mut self.loggers {
            logger.log(message);
        }
    }

    fn debug_log(&mut self, message: &str) {
        for logger in &mut self.loggers {
            logger.debug_log(message);
        }
    }
}

/// Where log lines go for one generation run.
#[derive(Debug, Clone, Default)]
pub struct LogSettings {
    pub log_file: Option<String>,
    pub debug: bool,
    pub stderr: bool,
}

impl LogSettings {
    pub fn build_logger(&self) -> Box<dyn Logger> {
        let mut multi = MultiLogger::new();

        if self.stderr {
            multi.push(Box::new(StderrLogger::new(self.debug)));
        }

        if let Some(path) = &self.log_file {
            let path = shellexpand::tilde(path).to_string();
            match FileLogger::new(&path, self.debug) {
                Ok(logger) => multi.push(Box::new(logger)),
                Err(e) => eprintln!("Failed to open log file {}: {}", path, e),
            }
        }

        Box::new(multi)
    }
}
