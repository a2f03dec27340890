// Background conversion session driven by a front end

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use super::batch::{BatchController, BatchOptions, BatchReport};
use super::core::{ConversionEvent, EngineConfig, StopSignal};
use super::error::SessionError;

/// Owns the file selection, the worker thread and the event channel
///
/// At most one batch runs per session. Events are buffered in the channel until
/// the front end drains them with [`ConversionSession::poll_events`].
pub struct ConversionSession {
    config: EngineConfig,
    files: Vec<PathBuf>,
    stop: StopSignal,
    tx: Sender<ConversionEvent>,
    rx: Receiver<ConversionEvent>,
    handle: Option<JoinHandle<BatchReport>>,
}

impl ConversionSession {
    pub fn new(config: EngineConfig, kill_grace: Duration) -> Self {
        let (tx, rx) = mpsc::channel();

        Self {
            config,
            files: Vec::new(),
            stop: StopSignal::with_grace(kill_grace),
            tx,
            rx,
            handle: None,
        }
    }

    /// Replace the selection
    pub fn select_files(&mut self, paths: Vec<PathBuf>) -> Result<(), SessionError> {
        if self.is_running() {
            return Err(SessionError::AlreadyRunning);
        }
        self.files = paths;
        Ok(())
    }

    pub fn clear_files(&mut self) -> Result<(), SessionError> {
        self.select_files(Vec::new())
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Start the batch on a worker thread
    pub fn start_conversion(&mut self, options: BatchOptions) -> Result<(), SessionError> {
        if self.is_running() {
            return Err(SessionError::AlreadyRunning);
        }
        if self.files.is_empty() {
            return Err(SessionError::NoFilesSelected);
        }

        // A previous batch finished; collect its thread before starting over
        if let Some(previous) = self.handle.take() {
            let _ = previous.join();
        }
        self.stop.reset();

        let controller = BatchController::new(&self.config, &self.stop);
        let files = self.files.clone();
        let tx = self.tx.clone();

        let handle = thread::Builder::new()
            .name("reheight-worker".to_string())
            .spawn(move || controller.run(&files, &options, &tx))?;
        debug!(files = self.files.len(), "worker started");

        self.handle = Some(handle);
        Ok(())
    }

    /// Ask the running batch to stop; terminates the active encoder
    pub fn stop_conversion(&self) {
        if !self.is_running() {
            debug!("stop requested with no batch running");
        }
        self.stop.request_stop();
    }

    /// Shared stop signal, e.g. for a Ctrl-C handler
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Drain every event queued so far without blocking
    pub fn poll_events(&self) -> Vec<ConversionEvent> {
        self.rx.try_iter().collect()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Block until the worker exits and return its report
    pub fn wait(&mut self) -> Option<BatchReport> {
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(report) => Some(report),
            Err(_) => {
                warn!("worker thread panicked");
                None
            }
        }
    }
}
