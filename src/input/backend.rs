//! Input backend trait

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::parse_line;
use crate::engine::{EngineCommand, EngineSettings};

/// Trait for presenter input backends
pub trait InputBackend: Send {
    /// Read input until it ends or the engine goes away, forwarding bound
    /// keys as engine commands. Blocks the calling thread.
    fn run(&mut self, tx: mpsc::Sender<EngineCommand>) -> Result<()>;
}

/// Reads one key name or relay message per line
pub struct LineBackend<R> {
    reader: R,
    settings: EngineSettings,
}

impl<R: BufRead + Send> LineBackend<R> {
    pub fn new(reader: R, settings: EngineSettings) -> Self {
        Self { reader, settings }
    }
}

impl<R: BufRead + Send> InputBackend for LineBackend<R> {
    fn run(&mut self, tx: mpsc::Sender<EngineCommand>) -> Result<()> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = self
                .reader
                .read_line(&mut line)
                .context("Failed to read presenter input")?;
            if read == 0 {
                info!("Input closed");
                return Ok(());
            }

            let Some(command) = parse_line(&line, &self.settings) else {
                debug!("Unbound input {:?}", line.trim_end());
                continue;
            };
            let shutdown = matches!(command, EngineCommand::Shutdown);
            if tx.blocking_send(command).is_err() {
                debug!("Engine gone, input stops");
                return Ok(());
            }
            if shutdown {
                return Ok(());
            }
        }
    }
}

/// Create the console input backend
pub fn create_input_backend(settings: EngineSettings) -> Box<dyn InputBackend> {
    info!("Using console input: space, left, right, k, p, q or a relay JSON line");
    Box::new(LineBackend::new(BufReader::new(std::io::stdin()), settings))
}
