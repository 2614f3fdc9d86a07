//! The in-process, type-keyed event bus.
//!
//! `TypeId`-keyed handler map, `Arc<dyn Any + Send + Sync>` payload
//! dispatch. Two delivery modes: synchronous (handlers run inline on the
//! publisher's task, blocking it until every sync listener returns) and
//! asynchronous, fed through a **bounded** worker pool so a slow listener
//! applies backpressure to the publisher instead of letting queued work
//! grow without limit.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::{trace, warn};

use crate::error::BusError;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
type AnyEvent = Arc<dyn Any + Send + Sync>;
type SyncHandler = Box<dyn Fn(&AnyEvent) + Send + Sync>;
type AsyncHandler = Arc<dyn Fn(AnyEvent) -> BoxFuture<'static, ()> + Send + Sync>;

/// An opaque handle returned by `subscribe`/`subscribe_async`, used to
/// later `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

enum Handler {
    Sync(SyncHandler),
    Async(AsyncHandler),
}

struct Entry {
    id: u64,
    handler: Handler,
}

struct AsyncJob {
    handler: AsyncHandler,
    event: AnyEvent,
    type_name: &'static str,
}

/// Configuration for the bounded async worker pool.
#[derive(Debug, Clone, Copy)]
pub struct EventBusConfig {
    pub async_workers: usize,
    pub async_queue_capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        EventBusConfig { async_workers: 10, async_queue_capacity: 1024 }
    }
}

/// The in-process event bus.
pub struct EventBus {
    handlers: RwLock<HashMap<TypeId, Vec<Entry>>>,
    handle_types: RwLock<HashMap<u64, TypeId>>,
    next_id: AtomicU64,
    sender: mpsc::Sender<AsyncJob>,
    pending: Arc<AtomicUsize>,
    closed: AtomicBool,
}

impl EventBus {
    pub fn new(config: EventBusConfig) -> Arc<Self> {
        let (sender, receiver) = mpsc::channel::<AsyncJob>(config.async_queue_capacity.max(1));
        let receiver = Arc::new(AsyncMutex::new(receiver));
        let pending = Arc::new(AtomicUsize::new(0));

        let bus = Arc::new(EventBus {
            handlers: RwLock::new(HashMap::new()),
            handle_types: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            sender,
            pending: pending.clone(),
            closed: AtomicBool::new(false),
        });

        for worker in 0..config.async_workers.max(1) {
            let receiver = receiver.clone();
            let pending = pending.clone();
            tokio::spawn(async move {
                loop {
                    let job = {
                        let mut receiver = receiver.lock().await;
                        receiver.recv().await
                    };
                    let Some(job) = job else { break };
                    trace!(worker, event = job.type_name, "dispatching async event");
                    let result = std::panic::AssertUnwindSafe((job.handler)(job.event))
                        .catch_unwind()
                        .await;
                    if result.is_err() {
                        warn!(event = job.type_name, "async event listener panicked");
                    }
                    pending.fetch_sub(1, Ordering::SeqCst);
                }
            });
        }

        bus
    }

    /// Register a synchronous listener. Invoked on the publisher's task,
    /// in registration order, before `publish` returns. Rejected once
    /// `close` has run, the same as `publish`.
    pub fn subscribe<E, F>(&self, handler: F) -> Result<Subscription, BusError>
    where
        E: Send + Sync + 'static,
        F: Fn(&E) + Send + Sync + 'static,
    {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let boxed: SyncHandler = Box::new(move |event: &AnyEvent| {
            if let Some(e) = event.downcast_ref::<E>() {
                handler(e);
            }
        });
        self.insert(TypeId::of::<E>(), id, Handler::Sync(boxed));
        Ok(Subscription(id))
    }

    /// Register an asynchronous listener. Its invocation is queued onto the
    /// bounded worker pool; `publish` does not wait for it to run. Rejected
    /// once `close` has run, the same as `publish`.
    pub fn subscribe_async<E, F, Fut>(&self, handler: F) -> Result<Subscription, BusError>
    where
        E: Send + Sync + 'static,
        F: Fn(Arc<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let boxed: AsyncHandler = Arc::new(move |event: AnyEvent| {
            let handler = &handler;
            match event.downcast::<E>() {
                Ok(e) => Box::pin(handler(e)) as BoxFuture<'static, ()>,
                Err(_) => Box::pin(async {}),
            }
        });
        self.insert(TypeId::of::<E>(), id, Handler::Async(boxed));
        Ok(Subscription(id))
    }

    fn insert(&self, type_id: TypeId, id: u64, handler: Handler) {
        self.handlers
            .write()
            .expect("handlers lock poisoned")
            .entry(type_id)
            .or_default()
            .push(Entry { id, handler });
        self.handle_types.write().expect("handle_types lock poisoned").insert(id, type_id);
    }

    /// Remove a previously registered listener. Returns `false` if the
    /// handle is unknown (already unsubscribed, or never existed).
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let Some(type_id) = self.handle_types.write().expect("handle_types lock poisoned").remove(&subscription.0)
        else {
            return false;
        };
        let mut handlers = self.handlers.write().expect("handlers lock poisoned");
        if let Some(entries) = handlers.get_mut(&type_id) {
            let before = entries.len();
            entries.retain(|e| e.id != subscription.0);
            return entries.len() != before;
        }
        false
    }

    /// Publish `event` of type `E`. Sync listeners run inline, in
    /// registration order; async listeners are queued on the bounded pool
    /// (this call blocks if the queue is full). Publishing to a type with
    /// no listeners is a no-op, not an error.
    pub async fn publish<E: Send + Sync + 'static>(&self, event: E) -> Result<(), BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        let type_id = TypeId::of::<E>();
        let event: AnyEvent = Arc::new(event);

        let (sync_handlers, async_handlers): (Vec<_>, Vec<_>) = {
            let handlers = self.handlers.read().expect("handlers lock poisoned");
            let Some(entries) = handlers.get(&type_id) else {
                return Ok(());
            };
            let mut sync = Vec::new();
            let mut r#async = Vec::new();
            for entry in entries {
                match &entry.handler {
                    Handler::Sync(_) => sync.push(entry.id),
                    Handler::Async(h) => r#async.push(h.clone()),
                }
            }
            (sync, r#async)
        };

        if !sync_handlers.is_empty() {
            let handlers = self.handlers.read().expect("handlers lock poisoned");
            if let Some(entries) = handlers.get(&type_id) {
                for entry in entries {
                    if let Handler::Sync(f) = &entry.handler {
                        f(&event);
                    }
                }
            }
        }

        for handler in async_handlers {
            self.pending.fetch_add(1, Ordering::SeqCst);
            if self
                .sender
                .send(AsyncJob { handler, event: event.clone(), type_name: std::any::type_name::<E>() })
                .await
                .is_err()
            {
                self.pending.fetch_sub(1, Ordering::SeqCst);
            }
        }

        Ok(())
    }

    /// The number of listeners (sync + async) currently registered for `E`.
    pub fn listener_count<E: 'static>(&self) -> usize {
        self.handlers
            .read()
            .expect("handlers lock poisoned")
            .get(&TypeId::of::<E>())
            .map(|entries| entries.len())
            .unwrap_or(0)
    }

    /// Stop accepting new publishes/subscriptions and wait up to `deadline`
    /// for queued async jobs to finish. Returns `true` if the queue drained
    /// in time.
    pub async fn close(&self, deadline: Duration) -> bool {
        self.closed.store(true, Ordering::SeqCst);
        let start = tokio::time::Instant::now();
        loop {
            if self.pending.load(Ordering::SeqCst) == 0 {
                return true;
            }
            if start.elapsed() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

trait CatchUnwind: Future + Sized {
    fn catch_unwind(self) -> futures_catch_unwind::CatchUnwind<Self>;
}

impl<F: Future> CatchUnwind for F {
    fn catch_unwind(self) -> futures_catch_unwind::CatchUnwind<Self> {
        futures_catch_unwind::CatchUnwind::new(self)
    }
}

/// A minimal, local `AssertUnwindSafe`-based `catch_unwind` combinator for
/// futures, avoiding a dependency on `futures` just for this one adapter.
mod futures_catch_unwind {
    use std::future::Future;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::pin::Pin;
    use std::task::{Context, Poll};

    pub struct CatchUnwind<F> {
        inner: F,
    }

    impl<F> CatchUnwind<F> {
        pub fn new(inner: F) -> Self {
            CatchUnwind { inner }
        }
    }

    impl<F: Future> Future for CatchUnwind<F> {
        type Output = Result<F::Output, ()>;

        fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
            // SAFETY: `inner` is never moved out of; we only ever form a
            // pinned reference to it, matching the projection `pin-project`
            // would generate for a single-field struct.
            let inner = unsafe { self.map_unchecked_mut(|s| &mut s.inner) };
            match catch_unwind(AssertUnwindSafe(|| inner.poll(cx))) {
                Ok(poll) => poll.map(Ok),
                Err(_) => Poll::Ready(Err(())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;

    struct Ping(u32);

    #[tokio::test]
    async fn sync_listener_runs_before_publish_returns() {
        let bus = EventBus::new(EventBusConfig::default());
        let seen = Arc::new(StdAtomicUsize::new(0));
        let seen2 = seen.clone();
        bus.subscribe::<Ping, _>(move |p| {
            seen2.store(p.0 as usize, Ordering::SeqCst);
        })
        .unwrap();
        bus.publish(Ping(7)).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[tokio::test]
    async fn async_listener_eventually_runs() {
        let bus = EventBus::new(EventBusConfig::default());
        let seen = Arc::new(StdAtomicUsize::new(0));
        let seen2 = seen.clone();
        bus.subscribe_async::<Ping, _, _>(move |p| {
            let seen2 = seen2.clone();
            async move {
                seen2.store(p.0 as usize, Ordering::SeqCst);
            }
        })
        .unwrap();
        bus.publish(Ping(9)).await.unwrap();
        bus.close(Duration::from_secs(1)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 9);
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let bus = EventBus::new(EventBusConfig::default());
        let seen = Arc::new(StdAtomicUsize::new(0));
        let seen2 = seen.clone();
        let sub = bus
            .subscribe::<Ping, _>(move |p| {
                seen2.fetch_add(p.0 as usize, Ordering::SeqCst);
            })
            .unwrap();
        assert!(bus.unsubscribe(sub));
        bus.publish(Ping(1)).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn publishing_with_no_listeners_is_a_no_op() {
        let bus = EventBus::new(EventBusConfig::default());
        assert_eq!(bus.listener_count::<Ping>(), 0);
        bus.publish(Ping(1)).await.unwrap();
    }

    #[tokio::test]
    async fn publish_after_close_is_rejected() {
        let bus = EventBus::new(EventBusConfig::default());
        bus.close(Duration::from_millis(50)).await;
        let err = bus.publish(Ping(1)).await.unwrap_err();
        assert!(matches!(err, BusError::Closed));
    }

    #[tokio::test]
    async fn subscribe_after_close_is_rejected() {
        let bus = EventBus::new(EventBusConfig::default());
        bus.close(Duration::from_millis(50)).await;
        let err = bus.subscribe::<Ping, _>(|_| {}).unwrap_err();
        assert!(matches!(err, BusError::Closed));
        let err = bus.subscribe_async::<Ping, _, _>(|_| async {}).unwrap_err();
        assert!(matches!(err, BusError::Closed));
    }
}
