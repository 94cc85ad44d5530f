//! Errors that stop the encoder.
//!
//! Timeouts and cancellation are not errors, a watcher just loops or
//! returns `Ok(())`. Anything in here is fatal for the whole watcher group.

use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// The pin could not be put into edge-triggered input mode.
    PinSetup { pin: String, source: anyhow::Error },

    /// Waiting for an edge or reading a level failed after setup.
    PinIo { pin: String, source: anyhow::Error },

    /// A watcher thread panicked.
    WatcherPanicked { pin: String },
}

impl Error {
    pub fn pin(&self) -> &str {
        match self {
            Error::PinSetup { pin, .. }
            | Error::PinIo { pin, .. }
            | Error::WatcherPanicked { pin } => pin,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::PinSetup { pin, .. } => write!(f, "could not set up pin {}", pin),
            Error::PinIo { pin, .. } => write!(f, "could not access pin {}", pin),
            Error::WatcherPanicked { pin } => write!(f, "watcher for pin {} panicked", pin),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::PinSetup { source, .. } | Error::PinIo { source, .. } => Some(&**source),
            Error::WatcherPanicked { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
