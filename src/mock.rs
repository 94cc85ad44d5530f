//! In-memory pin for tests and for running the encoder without hardware.
use anyhow::{anyhow, bail, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex, PoisonError,
    },
    time::Duration,
};

use crate::gpio::{Edge, InputPin, Level, Pull};

// How long `edge` waits for a watcher before giving up
const HANDOFF_TIMEOUT: Duration = Duration::from_secs(5);

/// Pin whose edges are driven from code.
///
/// [`MockPin::edge`] hands one level change to the watcher blocked in
/// `wait_for_edge` and returns once that watcher has finished with it and is
/// waiting again. Driving pins one edge at a time therefore gives exactly
/// the interleaving the caller wrote down. Only one thread may drive a
/// given pin.
pub struct MockPin {
    name: String,
    level: Mutex<Level>,
    configured: Mutex<Option<(Pull, Edge)>>,
    setup_error: Option<String>,
    edges_tx: Sender<Level>,
    edges_rx: Receiver<Level>,
    waiting_tx: Sender<usize>,
    waiting_rx: Receiver<usize>,
    sent: AtomicUsize,
    taken: AtomicUsize,
}

impl MockPin {
    pub fn new(name: &str, level: Level) -> Self {
        let (edges_tx, edges_rx) = bounded(0);
        let (waiting_tx, waiting_rx) = unbounded();
        Self {
            name: name.to_string(),
            level: Mutex::new(level),
            configured: Mutex::new(None),
            setup_error: None,
            edges_tx,
            edges_rx,
            waiting_tx,
            waiting_rx,
            sent: AtomicUsize::new(0),
            taken: AtomicUsize::new(0),
        }
    }

    /// A pin that refuses to be configured.
    pub fn failing(name: &str, message: &str) -> Self {
        Self {
            setup_error: Some(message.to_string()),
            ..Self::new(name, Level::Low)
        }
    }

    /// Drive the pin to `level` and wait until the watcher processed the edge.
    ///
    /// Driving the current level again simulates a bounce that does not
    /// change anything.
    pub fn edge(&self, level: Level) -> Result<()> {
        let target = self.send_edge(level)?;

        loop {
            match self.waiting_rx.recv_timeout(HANDOFF_TIMEOUT) {
                Ok(taken) if taken >= target => return Ok(()),
                Ok(_) => continue,
                Err(_) => bail!("{}: edge was not processed in time", self.name),
            }
        }
    }

    /// Hand an edge to the watcher without waiting for it to be processed.
    ///
    /// Use this when the watcher is expected to stop on this edge.
    pub fn send_edge(&self, level: Level) -> Result<usize> {
        let sent = self.sent.fetch_add(1, Ordering::SeqCst) + 1;
        self.edges_tx
            .send_timeout(level, HANDOFF_TIMEOUT)
            .map_err(|_| anyhow!("{}: nobody is waiting for edges", self.name))?;
        Ok(sent)
    }

    /// Change the level without raising an edge.
    pub fn set_level(&self, level: Level) {
        *self.level.lock().unwrap_or_else(PoisonError::into_inner) = level;
    }

    pub fn level(&self) -> Level {
        *self.level.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pull and edge policy of the last successful `configure`.
    pub fn configured(&self) -> Option<(Pull, Edge)> {
        *self.configured.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl InputPin for MockPin {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&self, pull: Pull, edge: Edge) -> Result<()> {
        if let Some(message) = &self.setup_error {
            bail!("{}: {}", self.name, message);
        }
        *self.configured.lock().unwrap_or_else(PoisonError::into_inner) = Some((pull, edge));
        Ok(())
    }

    fn wait_for_edge(&self, timeout: Duration) -> Result<bool> {
        // tells `edge` everything before this wait has been handled
        let _ = self.waiting_tx.send(self.taken.load(Ordering::SeqCst));

        match self.edges_rx.recv_timeout(timeout) {
            Ok(level) => {
                self.set_level(level);
                self.taken.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            }
            Err(RecvTimeoutError::Timeout) => Ok(false),
            Err(RecvTimeoutError::Disconnected) => bail!("{}: edge source closed", self.name),
        }
    }

    fn read_level(&self) -> Result<Level> {
        Ok(self.level())
    }
}
