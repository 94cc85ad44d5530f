use crossbeam_channel::{bounded, Sender};
use log::{error, info};
use std::{sync::Arc, thread, time::Duration};

use crate::{
    cancel::CancelToken,
    error::{Error, Result},
    gpio::{InputPin, Pull},
    rotary::{Action, ButtonPolarity, ChannelOrder},
    watcher::{SharedDecoder, Watcher},
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Rotary encoder on two quadrature pins and an optional push button.
pub struct RotaryEncoder {
    a: Arc<dyn InputPin>,
    b: Arc<dyn InputPin>,
    button: Option<Arc<dyn InputPin>>,
    timeout: Duration,
    pull: Pull,
    order: ChannelOrder,
    polarity: ButtonPolarity,
}

impl RotaryEncoder {
    pub fn new(a: Arc<dyn InputPin>, b: Arc<dyn InputPin>) -> Self {
        Self {
            a,
            b,
            button: None,
            timeout: DEFAULT_TIMEOUT,
            pull: Pull::NoChange,
            order: ChannelOrder::default(),
            polarity: ButtonPolarity::default(),
        }
    }

    pub fn with_button(mut self, button: Arc<dyn InputPin>, polarity: ButtonPolarity) -> Self {
        self.button = Some(button);
        self.polarity = polarity;
        self
    }

    /// How long a watcher blocks on its pin before checking for
    /// cancellation again.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_pull(mut self, pull: Pull) -> Self {
        self.pull = pull;
        self
    }

    pub fn with_channel_order(mut self, order: ChannelOrder) -> Self {
        self.order = order;
        self
    }

    /// Watch all pins until `cancel` fires, sending actions to `actions`.
    ///
    /// Every watcher has stopped by the time this returns, and the sender is
    /// dropped then, so a receiver sees the channel close only after the last
    /// action. A failing watcher stops its siblings and its error is returned.
    /// A dropped receiver stops the group as well, that is not an error.
    pub fn run(&self, cancel: &CancelToken, actions: Sender<Action>) -> Result<()> {
        let group = cancel.child();
        let decoder = SharedDecoder::new(&*self.a, &*self.b, self.order);

        info!("starting rotary encoder watchers");
        let result = thread::scope(|s| {
            let mut handles = Vec::new();

            for pin in [&self.a, &self.b] {
                let (pin, decoder, actions, group) = (&**pin, &decoder, &actions, &group);
                let handle = s.spawn(move || {
                    let _guard = StopGroup(group);
                    Watcher::new(pin, self.pull, self.timeout, actions, group).run_channel(decoder)
                });
                handles.push((pin.name(), handle));
            }

            if let Some(button) = &self.button {
                let (pin, actions, group, polarity) = (&**button, &actions, &group, self.polarity);
                let handle = s.spawn(move || {
                    let _guard = StopGroup(group);
                    Watcher::new(pin, self.pull, self.timeout, actions, group).run_button(polarity)
                });
                handles.push((pin.name(), handle));
            }

            let mut result = Ok(());
            for (name, handle) in handles {
                let outcome = handle.join().unwrap_or_else(|_| {
                    Err(Error::WatcherPanicked {
                        pin: name.to_string(),
                    })
                });
                if let Err(err) = outcome {
                    error!("{}: {}", name, err);
                    if result.is_ok() {
                        result = Err(err);
                    }
                }
            }
            result
        });

        info!("rotary encoder watchers finished, closing results");
        drop(actions);
        result
    }

    /// Wait for a single action.
    ///
    /// Returns `None` when `cancel` fires before anything happens.
    pub fn read(&self, cancel: &CancelToken) -> Result<Option<Action>> {
        let group = cancel.child();
        let (tx, rx) = bounded(1);

        thread::scope(|s| {
            let watchers = s.spawn(|| self.run(&group, tx));
            let action = rx.recv().ok();
            group.cancel();
            match watchers.join() {
                Ok(Ok(())) => Ok(action),
                Ok(Err(err)) => Err(err),
                Err(_) => Err(Error::WatcherPanicked {
                    pin: self.a.name().to_string(),
                }),
            }
        })
    }
}

/// Stops the whole group when a watcher exits, whatever the reason.
struct StopGroup<'a>(&'a CancelToken);

impl Drop for StopGroup<'_> {
    fn drop(&mut self) {
        self.0.cancel();
    }
}
