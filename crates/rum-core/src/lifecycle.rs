//! Synchronous in-process event bus.
//!
//! Collectors (errors, requests, performance entries) publish on the bus and
//! consumers (collections, aggregation, senders) subscribe to it; neither side
//! knows about the other.
//!
//! # Typed channels
//!
//! Each [`LifeCycleEventType`] has a marker type implementing
//! [`LifeCycleEvent`] that fixes its payload, so a handler registered for
//! [`ResourceCollected`] can only ever receive a [`RumResourceEvent`].
//!
//! # Delivery
//!
//! - Handlers run synchronously, in registration order, and `notify` returns
//!   once all of them completed.
//! - A handler that returns an error or panics is logged and skipped; the
//!   remaining handlers still receive the event.
//! - A handler may call `notify` itself. The nested dispatch runs to
//!   completion before the outer one resumes (depth-first, not queued).
//! - Handlers are snapshotted when dispatch starts: subscriptions added or
//!   removed by a handler take effect from the next `notify`.
//!
//! The bus is single-threaded (`Rc`/`RefCell`) and is never shared across
//! threads.

use std::any::Any;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use crate::event_type::LifeCycleEventType;
use crate::events::{ErrorMessage, RequestDetails, RumResourceEvent, UserAction};
use crate::timing::TimingRecord;

/// Error returned by a failing handler.
pub type HandlerError = Box<dyn std::error::Error>;

type Handler<P> = Rc<dyn Fn(&P) -> Result<(), HandlerError>>;

mod sealed {
    pub trait Sealed {}
}

/// Binds an event type to its payload.
///
/// Implemented by one marker type per [`LifeCycleEventType`].
pub trait LifeCycleEvent: sealed::Sealed + 'static {
    const TYPE: LifeCycleEventType;
    type Payload: 'static;

    #[doc(hidden)]
    fn channel(channels: &mut Channels) -> &mut Channel<Self::Payload>;
}

macro_rules! lifecycle_events {
    ($(
        $(#[$meta:meta])*
        $marker:ident => $variant:ident($payload:ty), $field:ident;
    )*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy)]
            pub struct $marker;

            impl sealed::Sealed for $marker {}

            impl LifeCycleEvent for $marker {
                const TYPE: LifeCycleEventType = LifeCycleEventType::$variant;
                type Payload = $payload;

                fn channel(channels: &mut Channels) -> &mut Channel<$payload> {
                    &mut channels.$field
                }
            }
        )*

        /// Handler lists, one per event type.
        #[doc(hidden)]
        #[derive(Default)]
        pub struct Channels {
            $($field: Channel<$payload>,)*
        }

        impl Channels {
            fn remove(&mut self, event_type: LifeCycleEventType, id: u64) -> bool {
                match event_type {
                    $(LifeCycleEventType::$variant => self.$field.remove(id),)*
                }
            }

            fn len(&self, event_type: LifeCycleEventType) -> usize {
                match event_type {
                    $(LifeCycleEventType::$variant => self.$field.handlers.len(),)*
                }
            }
        }
    };
}

lifecycle_events! {
    /// An error was captured.
    ErrorCollected => ErrorCollected(ErrorMessage), error;
    /// An XHR or fetch request completed.
    RequestCompleted => RequestCompleted(RequestDetails), request;
    /// The host reported a raw performance entry.
    PerformanceEntryCollected => PerformanceEntryCollected(TimingRecord), performance_entry;
    /// A resource event is ready for aggregation.
    ResourceCollected => ResourceCollected(RumResourceEvent), resource;
    /// A user action was reported.
    UserActionCollected => UserActionCollected(UserAction), user_action;
}

/// Handlers registered for one event type.
#[doc(hidden)]
pub struct Channel<P> {
    handlers: Vec<(u64, Handler<P>)>,
}

impl<P> Default for Channel<P> {
    fn default() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }
}

impl<P> Channel<P> {
    fn snapshot(&self) -> Vec<Handler<P>> {
        self.handlers
            .iter()
            .map(|(_, handler)| Rc::clone(handler))
            .collect()
    }

    fn remove(&mut self, id: u64) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(handler_id, _)| *handler_id != id);
        self.handlers.len() != before
    }
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    channels: Channels,
}

/// Outcome of one `notify` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Handlers that completed successfully.
    pub delivered: usize,
    /// Handlers that returned an error or panicked.
    pub failed: usize,
}

/// The lifecycle bus.
///
/// Cloning yields another handle to the same bus.
#[derive(Clone, Default)]
pub struct LifeCycle {
    registry: Rc<RefCell<Registry>>,
}

impl std::fmt::Debug for LifeCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.borrow();
        let mut map = f.debug_map();
        for event_type in LifeCycleEventType::ALL {
            map.entry(&event_type.as_str(), &registry.channels.len(event_type));
        }
        map.finish()
    }
}

impl LifeCycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for events of type `E`.
    ///
    /// Handlers are called in registration order. The returned handle can
    /// remove the handler again; dropping it keeps the handler registered.
    pub fn subscribe<E, F>(&self, handler: F) -> Subscription
    where
        E: LifeCycleEvent,
        F: Fn(&E::Payload) -> Result<(), HandlerError> + 'static,
    {
        let mut registry = self.registry.borrow_mut();
        let id = registry.next_id;
        registry.next_id += 1;
        E::channel(&mut registry.channels)
            .handlers
            .push((id, Rc::new(handler)));

        Subscription {
            event_type: E::TYPE,
            id,
            registry: Rc::downgrade(&self.registry),
        }
    }

    /// Delivers `payload` to every handler registered for `E`.
    pub fn notify<E: LifeCycleEvent>(&self, payload: &E::Payload) -> Delivery {
        let handlers = E::channel(&mut self.registry.borrow_mut().channels).snapshot();

        let mut delivery = Delivery::default();
        for handler in handlers {
            match panic::catch_unwind(AssertUnwindSafe(|| (*handler)(payload))) {
                Ok(Ok(())) => delivery.delivered += 1,
                Ok(Err(err)) => {
                    tracing::warn!(event_type = %E::TYPE, error = %err, "lifecycle handler failed");
                    delivery.failed += 1;
                }
                Err(cause) => {
                    tracing::warn!(
                        event_type = %E::TYPE,
                        panic = panic_message(cause.as_ref()),
                        "lifecycle handler panicked"
                    );
                    delivery.failed += 1;
                }
            }
        }
        delivery
    }

    /// Number of handlers currently registered for `event_type`.
    pub fn subscriber_count(&self, event_type: LifeCycleEventType) -> usize {
        self.registry.borrow().channels.len(event_type)
    }

    /// A handle that does not keep the bus alive.
    ///
    /// Handlers that publish on the bus they are registered on should hold
    /// one of these rather than a `LifeCycle`, which would form a cycle.
    pub fn downgrade(&self) -> WeakLifeCycle {
        WeakLifeCycle {
            registry: Rc::downgrade(&self.registry),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Non-owning handle to a [`LifeCycle`].
#[derive(Debug, Clone, Default)]
pub struct WeakLifeCycle {
    registry: Weak<RefCell<Registry>>,
}

impl WeakLifeCycle {
    pub fn upgrade(&self) -> Option<LifeCycle> {
        self.registry.upgrade().map(|registry| LifeCycle { registry })
    }

    /// Notifies the bus if it is still alive.
    pub fn notify<E: LifeCycleEvent>(&self, payload: &E::Payload) -> Delivery {
        self.upgrade()
            .map(|lifecycle| lifecycle.notify::<E>(payload))
            .unwrap_or_default()
    }
}

/// Handle to a registered handler.
#[derive(Debug)]
pub struct Subscription {
    event_type: LifeCycleEventType,
    id: u64,
    registry: Weak<RefCell<Registry>>,
}

impl Subscription {
    pub const fn event_type(&self) -> LifeCycleEventType {
        self.event_type
    }

    /// Removes the handler. Returns `false` if the bus is gone or the handler
    /// was already removed.
    pub fn unsubscribe(self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        registry
            .borrow_mut()
            .channels
            .remove(self.event_type, self.id)
    }
}
