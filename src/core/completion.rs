//! Completion tokens for asynchronously produced values.
//!
//! A [`Completion`] is the consumer side of a one-shot value produced by a
//! loader task (buffer bytes, decoded images). The renderer polls it once
//! per frame; the transition out of [`Readiness::Pending`] happens exactly
//! once and is never undone.
//!
//! ```rust,ignore
//! let (completer, mut completion) = completion_pair::<Vec<u8>>();
//! completion.on_ready(|bytes| log::debug!("{} bytes arrived", bytes.len()));
//! std::thread::spawn(move || completer.complete(vec![0u8; 16]));
//! while completion.poll() == Readiness::Pending {}
//! ```

use std::fmt;

use crate::errors::View360Error;

/// Observable state of a [`Completion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Readiness {
    Pending,
    Ready,
    Failed,
}

type Continuation<T> = Box<dyn FnOnce(&T) + Send>;

enum Slot<T> {
    Pending(flume::Receiver<Result<T, View360Error>>),
    /// `None` once the value has been taken.
    Ready(Option<T>),
    Failed(View360Error),
}

/// Consumer side of a one-shot asynchronous value.
pub struct Completion<T> {
    slot: Slot<T>,
    continuations: Vec<Continuation<T>>,
}

/// Producer side of a one-shot asynchronous value.
///
/// Dropping a completer without settling it fails the paired completion.
pub struct Completer<T> {
    tx: flume::Sender<Result<T, View360Error>>,
}

/// Creates a connected completer/completion pair.
#[must_use]
pub fn completion_pair<T>() -> (Completer<T>, Completion<T>) {
    let (tx, rx) = flume::bounded(1);
    (
        Completer { tx },
        Completion {
            slot: Slot::Pending(rx),
            continuations: Vec::new(),
        },
    )
}

impl<T> Completer<T> {
    pub fn complete(self, value: T) {
        // The receiver may already be gone; nobody is waiting then.
        let _ = self.tx.send(Ok(value));
    }

    pub fn fail(self, error: View360Error) {
        let _ = self.tx.send(Err(error));
    }

    pub fn settle(self, result: Result<T, View360Error>) {
        let _ = self.tx.send(result);
    }
}

impl<T> Completion<T> {
    /// A completion that is ready from the start.
    #[must_use]
    pub fn ready(value: T) -> Self {
        Self {
            slot: Slot::Ready(Some(value)),
            continuations: Vec::new(),
        }
    }

    /// A completion that has already failed.
    #[must_use]
    pub fn failed(error: View360Error) -> Self {
        Self {
            slot: Slot::Failed(error),
            continuations: Vec::new(),
        }
    }

    /// Checks the producer without blocking and returns the resulting state.
    ///
    /// Continuations registered with [`on_ready`](Self::on_ready) run here,
    /// on the polling thread, when the value first becomes available.
    pub fn poll(&mut self) -> Readiness {
        let Slot::Pending(rx) = &self.slot else {
            return self.readiness();
        };

        let settled = match rx.try_recv() {
            Ok(result) => result,
            Err(flume::TryRecvError::Empty) => return Readiness::Pending,
            Err(flume::TryRecvError::Disconnected) => Err(View360Error::Abandoned),
        };

        match settled {
            Ok(value) => {
                for continuation in self.continuations.drain(..) {
                    continuation(&value);
                }
                self.slot = Slot::Ready(Some(value));
            }
            Err(error) => {
                self.continuations.clear();
                self.slot = Slot::Failed(error);
            }
        }
        self.readiness()
    }

    /// The last observed state, without polling.
    #[must_use]
    pub fn readiness(&self) -> Readiness {
        match self.slot {
            Slot::Pending(_) => Readiness::Pending,
            Slot::Ready(_) => Readiness::Ready,
            Slot::Failed(_) => Readiness::Failed,
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self.slot, Slot::Ready(_))
    }

    /// Registers a one-shot continuation.
    ///
    /// Runs immediately if the value is already available and not yet taken.
    /// Dropped without running if the completion fails.
    pub fn on_ready(&mut self, f: impl FnOnce(&T) + Send + 'static) {
        match &self.slot {
            Slot::Pending(_) => self.continuations.push(Box::new(f)),
            Slot::Ready(Some(value)) => f(value),
            Slot::Ready(None) | Slot::Failed(_) => {}
        }
    }

    #[must_use]
    pub fn value(&self) -> Option<&T> {
        match &self.slot {
            Slot::Ready(value) => value.as_ref(),
            _ => None,
        }
    }

    /// Moves the value out. The completion stays [`Readiness::Ready`].
    pub fn take(&mut self) -> Option<T> {
        match &mut self.slot {
            Slot::Ready(value) => value.take(),
            _ => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&View360Error> {
        match &self.slot {
            Slot::Failed(error) => Some(error),
            _ => None,
        }
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("readiness", &self.readiness())
            .field("continuations", &self.continuations.len())
            .finish()
    }
}
