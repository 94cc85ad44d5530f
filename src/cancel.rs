use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError,
};

/// Cooperative stop signal shared by every watcher.
///
/// Cancelling is idempotent. Besides polling [`CancelToken::is_cancelled`],
/// blocking code can wait on [`CancelToken::done`] inside a
/// `crossbeam_channel::select!`: the receiver disconnects on cancel.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

struct Inner {
    cancelled: AtomicBool,
    done_tx: Mutex<Option<Sender<()>>>,
    done_rx: Receiver<()>,
    children: Mutex<Vec<CancelToken>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (done_tx, done_rx) = bounded(0);
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                done_tx: Mutex::new(Some(done_tx)),
                done_rx,
                children: Mutex::new(Vec::new()),
            }),
        }
    }

    /// A token that is cancelled together with this one, but can also be
    /// cancelled on its own without touching the parent.
    pub fn child(&self) -> CancelToken {
        let child = CancelToken::new();
        let mut children = self.lock_children();
        if self.is_cancelled() {
            child.cancel();
        } else {
            children.retain(|c| !c.is_cancelled());
            children.push(child.clone());
        }
        child
    }

    pub fn cancel(&self) {
        let children = {
            let mut children = self.lock_children();
            if self.inner.cancelled.swap(true, Ordering::SeqCst) {
                return;
            }
            std::mem::take(&mut *children)
        };

        // dropping the sender wakes everything selecting on `done`
        self.inner
            .done_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        for child in children {
            child.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    pub fn done(&self) -> &Receiver<()> {
        &self.inner.done_rx
    }

    fn lock_children(&self) -> std::sync::MutexGuard<'_, Vec<CancelToken>> {
        self.inner
            .children
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
