//! Access GPIO input pins for the rotary encoder.
//!
//! The watchers only need three things from a pin: put it in edge-triggered
//! input mode, block until an edge or a timeout, and read its level. That is
//! the [`InputPin`] trait. [`SysfsPin`] implements it on top of the old
//! sysfs GPIO interface, which is still what most small Linux boards ship.
use anyhow::{Context, Result};
use log::{trace, warn};
use std::{
    fmt,
    sync::{Mutex, PoisonError},
    time::Duration,
};
use sysfs_gpio::PinPoller;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl From<u8> for Level {
    fn from(value: u8) -> Self {
        match value {
            0 => Level::Low,
            _ => Level::High,
        }
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> Self {
        match level {
            Level::Low => 0,
            Level::High => 1,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Low => "low",
            Level::High => "high",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pull {
    NoChange,
    Up,
    Down,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edge {
    None,
    Rising,
    Falling,
    Both,
}

impl From<Edge> for sysfs_gpio::Edge {
    fn from(edge: Edge) -> Self {
        match edge {
            Edge::None => sysfs_gpio::Edge::NoInterrupt,
            Edge::Rising => sysfs_gpio::Edge::RisingEdge,
            Edge::Falling => sysfs_gpio::Edge::FallingEdge,
            Edge::Both => sysfs_gpio::Edge::BothEdges,
        }
    }
}

/// A digital input the watchers can block on.
pub trait InputPin: Send + Sync {
    /// Name used in log lines and errors.
    fn name(&self) -> &str;

    /// Put the pin in input mode and arm edge notification.
    fn configure(&self, pull: Pull, edge: Edge) -> Result<()>;

    /// Block until an edge occurs or `timeout` elapses.
    ///
    /// Returns `false` on timeout, which is not an error.
    fn wait_for_edge(&self, timeout: Duration) -> Result<bool>;

    /// Current logic level.
    fn read_level(&self) -> Result<Level>;
}

/// GPIO line driven through `/sys/class/gpio`.
pub struct SysfsPin {
    name: String,
    pin: sysfs_gpio::Pin,
    poller: Mutex<Option<PinPoller>>,
}

impl SysfsPin {
    /// Create a new pin for sysfs line `pin_num`
    ///
    /// This function does not export the line, that happens in
    /// [`InputPin::configure`].
    pub fn new(pin_num: u64) -> SysfsPin {
        SysfsPin {
            name: format!("gpio{}", pin_num),
            pin: sysfs_gpio::Pin::new(pin_num),
            poller: Mutex::new(None),
        }
    }
}

impl InputPin for SysfsPin {
    fn name(&self) -> &str {
        &self.name
    }

    /// Export the line, make it an input and arm edge notification
    ///
    /// Exporting is equivalent to `echo N > /sys/class/gpio/export`, an
    /// already exported line is not an error.
    ///
    /// # Errors
    ///
    /// The main cases in which this function will fail are the following:
    /// 1. The system does not support the GPIO sysfs interface
    /// 2. The requested line is out of range or in use by the kernel
    /// 3. The line cannot generate interrupts for the requested edge
    fn configure(&self, pull: Pull, edge: Edge) -> Result<()> {
        if pull != Pull::NoChange {
            warn!(
                "{}: sysfs cannot set pull resistors, ignoring {:?}",
                self.name, pull
            );
        }

        self.pin
            .export()
            .with_context(|| format!("could not export {}", self.name))?;
        self.pin
            .set_direction(sysfs_gpio::Direction::In)
            .with_context(|| format!("could not set direction for {}", self.name))?;
        self.pin
            .set_edge(edge.into())
            .with_context(|| format!("could not set edge for {}", self.name))?;

        let mut poller = self
            .pin
            .get_poller()
            .with_context(|| format!("could not poll {}", self.name))?;

        // Ditch first OS event, the value file is readable right away
        poller
            .poll(0)
            .with_context(|| format!("could not poll {}", self.name))?;

        *self.poller.lock().unwrap_or_else(PoisonError::into_inner) = Some(poller);
        Ok(())
    }

    fn wait_for_edge(&self, timeout: Duration) -> Result<bool> {
        let mut poller = self.poller.lock().unwrap_or_else(PoisonError::into_inner);
        let poller = poller
            .as_mut()
            .with_context(|| format!("{} is not configured", self.name))?;

        let timeout_ms = isize::try_from(timeout.as_millis()).unwrap_or(isize::MAX);
        let value = poller
            .poll(timeout_ms)
            .with_context(|| format!("could not wait for edge on {}", self.name))?;

        trace!("{}: poll returned {:?}", self.name, value);
        Ok(value.is_some())
    }

    fn read_level(&self) -> Result<Level> {
        let value = self
            .pin
            .get_value()
            .with_context(|| format!("could not read {}", self.name))?;
        Ok(value.into())
    }
}
