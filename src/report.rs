//! Display sinks for session progress.
use crate::stats::DatasetSummary;
use log::info;

/// Receives status changes, append-only log lines and the dataset summary.
pub trait Reporter {
    fn status(&mut self, message: &str);
    fn log(&mut self, line: &str);
    fn summary(&mut self, summary: &DatasetSummary);
}

/// Prints to stdout.
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn status(&mut self, message: &str) {
        println!("==> {}", message);
    }

    fn log(&mut self, line: &str) {
        println!("    {}", line);
    }

    fn summary(&mut self, summary: &DatasetSummary) {
        println!("{}", summary);
    }
}

/// Forwards to the `log` crate, leaving output to whatever logger is installed.
#[derive(Debug, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn status(&mut self, message: &str) {
        info!(target: "iris_mlp::status", "{}", message);
    }

    fn log(&mut self, line: &str) {
        info!("{}", line);
    }

    fn summary(&mut self, summary: &DatasetSummary) {
        for line in summary.to_string().lines() {
            info!("{}", line);
        }
    }
}

/// Keeps everything it receives.
#[derive(Debug, Default, Clone)]
pub struct MemoryReporter {
    pub statuses: Vec<String>,
    pub lines: Vec<String>,
    pub summaries: Vec<DatasetSummary>,
}

impl MemoryReporter {
    pub fn last_status(&self) -> Option<&str> {
        self.statuses.last().map(String::as_str)
    }
}

impl Reporter for MemoryReporter {
    fn status(&mut self, message: &str) {
        self.statuses.push(message.to_string());
    }

    fn log(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }

    fn summary(&mut self, summary: &DatasetSummary) {
        self.summaries.push(summary.clone());
    }
}
