use crossbeam_channel::{select, Sender};
use log::{debug, trace};
use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};

use crate::{
    cancel::CancelToken,
    error::{Error, Result},
    gpio::{Edge, InputPin, Pull},
    rotary::{Action, ButtonPolarity, ChannelOrder, Rotary},
};

/// The quadrature decoder together with the two pins it samples.
///
/// Both channel watchers hold a reference to the same instance, the mutex
/// gives a total order over evaluations.
pub struct SharedDecoder<'a> {
    rotary: Mutex<Rotary>,
    a: &'a dyn InputPin,
    b: &'a dyn InputPin,
}

impl<'a> SharedDecoder<'a> {
    pub fn new(a: &'a dyn InputPin, b: &'a dyn InputPin, order: ChannelOrder) -> Self {
        Self {
            rotary: Mutex::new(Rotary::new(order)),
            a,
            b,
        }
    }

    /// Sample both channels and run the decoder, all under the lock.
    ///
    /// Returns `Action::None` without touching the state when `cancel` fired
    /// while waiting for the lock.
    pub fn evaluate(&self, cancel: &CancelToken) -> anyhow::Result<Action> {
        // the register is a plain u8, a panic elsewhere cannot leave it torn
        let mut rotary = self.rotary.lock().unwrap_or_else(PoisonError::into_inner);
        if cancel.is_cancelled() {
            return Ok(Action::None);
        }

        let a = self.a.read_level()?;
        let b = self.b.read_level()?;
        let action = rotary.update(a, b);
        trace!(
            "a={} b={} state={:#010b} action={}",
            a,
            b,
            rotary.state(),
            action
        );
        Ok(action)
    }
}

/// Edge loop for a single pin.
///
/// Blocks on the pin with a bounded timeout so cancellation is noticed at
/// least once per timeout even when nothing moves.
pub struct Watcher<'a> {
    pin: &'a dyn InputPin,
    pull: Pull,
    timeout: Duration,
    sink: &'a Sender<Action>,
    cancel: &'a CancelToken,
}

impl<'a> Watcher<'a> {
    pub fn new(
        pin: &'a dyn InputPin,
        pull: Pull,
        timeout: Duration,
        sink: &'a Sender<Action>,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            pin,
            pull,
            timeout,
            sink,
            cancel,
        }
    }

    /// Watch one channel of the quadrature pair.
    pub fn run_channel(&self, decoder: &SharedDecoder<'_>) -> Result<()> {
        self.run(|| decoder.evaluate(self.cancel))
    }

    /// Watch the push button. No shared state, the level is read directly.
    pub fn run_button(&self, polarity: ButtonPolarity) -> Result<()> {
        self.run(|| Ok(polarity.action(self.pin.read_level()?)))
    }

    fn run<F>(&self, mut on_edge: F) -> Result<()>
    where
        F: FnMut() -> anyhow::Result<Action>,
    {
        let name = self.pin.name();
        self.pin
            .configure(self.pull, Edge::Both)
            .map_err(|source| Error::PinSetup {
                pin: name.to_string(),
                source,
            })?;
        debug!("{}: watching for edges", name);

        let io_error = |source: anyhow::Error| Error::PinIo {
            pin: name.to_string(),
            source,
        };

        while !self.cancel.is_cancelled() {
            trace!("{}: waiting for edge, timeout {:?}", name, self.timeout);
            if !self.pin.wait_for_edge(self.timeout).map_err(io_error)? {
                trace!("{}: no edge within timeout", name);
                continue;
            }

            let action = on_edge().map_err(io_error)?;
            if action.is_none() {
                continue;
            }

            debug!("{}: {}", name, action);
            if !self.send(action) {
                break;
            }
        }

        debug!("{}: stopped", name);
        Ok(())
    }

    /// Blocks until the action is taken. Returns `false` when the watcher
    /// should stop instead: cancelled, or nobody is receiving anymore.
    fn send(&self, action: Action) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        select! {
            send(self.sink, action) -> res => {
                if res.is_err() {
                    debug!("{}: results closed", self.pin.name());
                }
                res.is_ok()
            }
            recv(self.cancel.done()) -> _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{gpio::Level, mock::MockPin};

    #[test]
    fn evaluate_samples_both_channels() {
        let a = MockPin::new("A", Level::Low);
        let b = MockPin::new("B", Level::Low);
        let decoder = SharedDecoder::new(&a, &b, ChannelOrder::AHigh);
        let cancel = CancelToken::new();

        let mut fired = Vec::new();
        for (pin, level) in [(&b, Level::High), (&a, Level::High), (&b, Level::Low)] {
            pin.set_level(level);
            fired.push(decoder.evaluate(&cancel).unwrap());
        }
        assert_eq!(fired, vec![Action::None, Action::None, Action::Clockwise]);
    }

    #[test]
    fn evaluate_after_cancel_does_nothing() {
        let a = MockPin::new("A", Level::Low);
        let b = MockPin::new("B", Level::Low);
        let decoder = SharedDecoder::new(&a, &b, ChannelOrder::AHigh);
        let cancel = CancelToken::new();

        b.set_level(Level::High);
        a.set_level(Level::High);
        assert_eq!(decoder.evaluate(&cancel).unwrap(), Action::None);
        cancel.cancel();
        b.set_level(Level::Low);
        assert_eq!(decoder.evaluate(&cancel).unwrap(), Action::None);
        assert_eq!(decoder.rotary.lock().unwrap().state(), 0x03);
    }

    #[test]
    fn setup_failure_is_reported_for_the_pin() {
        let pin = MockPin::failing("button", "busy");
        let (tx, _rx) = crossbeam_channel::unbounded();
        let cancel = CancelToken::new();
        let watcher = Watcher::new(&pin, Pull::Up, Duration::from_millis(1), &tx, &cancel);

        match watcher.run_button(ButtonPolarity::ActiveLow) {
            Err(Error::PinSetup { pin, .. }) => assert_eq!(pin, "button"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn cancelled_watcher_returns_cleanly() {
        let pin = MockPin::new("button", Level::High);
        let (tx, rx) = crossbeam_channel::unbounded();
        let cancel = CancelToken::new();
        cancel.cancel();

        let watcher = Watcher::new(&pin, Pull::NoChange, Duration::from_millis(1), &tx, &cancel);
        assert!(watcher.run_button(ButtonPolarity::ActiveLow).is_ok());
        assert!(rx.try_recv().is_err());
    }
}
