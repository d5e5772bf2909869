//! JSON lines writer

use crate::error::Result;
use crate::sync::{LogLevel, Message, MessageSink};
use serde_json::json;
use std::io::Write;

/// Writes messages as JSON lines to any [`Write`]
#[derive(Debug)]
pub struct JsonLinesWriter<W: Write> {
    out: W,
    records: u64,
    states: u64,
}

impl JsonLinesWriter<std::io::Stdout> {
    /// A writer on standard output
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> JsonLinesWriter<W> {
    /// Wrap a writer
    pub fn new(out: W) -> Self {
        Self {
            out,
            records: 0,
            states: 0,
        }
    }

    /// Records written so far
    pub fn records_written(&self) -> u64 {
        self.records
    }

    /// State messages written so far
    pub fn states_written(&self) -> u64 {
        self.states
    }

    /// Flush and return the inner writer
    pub fn into_inner(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }

    fn write_line(&mut self, value: &serde_json::Value) -> Result<()> {
        serde_json::to_writer(&mut self.out, value)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }
}

impl<W: Write> MessageSink for JsonLinesWriter<W> {
    fn emit(&mut self, message: Message) -> Result<()> {
        match message {
            Message::Record { stream, record } => {
                self.write_line(&json!({
                    "type": "RECORD",
                    "stream": stream,
                    "record": record,
                }))?;
                self.records += 1;
            }
            Message::State { value } => {
                self.write_line(&json!({
                    "type": "STATE",
                    "value": value,
                }))?;
                // STATE lines are flushed immediately
                self.out.flush()?;
                self.states += 1;
            }
            Message::Log { level, message } => match level {
                LogLevel::Info => tracing::info!("{message}"),
                LogLevel::Warn => tracing::warn!("{message}"),
                LogLevel::Error => tracing::error!("{message}"),
            },
        }
        Ok(())
    }
}
