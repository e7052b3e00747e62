//! Live endpoint set for one service.
//!
//! # Responsibilities
//! - Consume discovery events on a single background task, in arrival order
//! - Build an endpoint per added instance, release it on removal
//! - Publish an immutable snapshot after every membership change
//!
//! # Design Decisions
//! - The instance map is owned by the task; nothing else can mutate it
//! - Readers load the snapshot through `ArcSwap`, never through a lock
//! - Instances whose endpoint cannot be built are logged and never published
//! - Removal drops the set's reference only; in-flight calls finish

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::discovery::{DiscoveryEvent, EventStream, Instance, Instancer};
use crate::endpoint::{EndpointBuilder, ServiceEndpoint};
use crate::observability::metrics;

/// Point-in-time view of every live endpoint, ordered by instance address.
pub type Snapshot<Req, Resp> = Arc<Vec<Arc<ServiceEndpoint<Req, Resp>>>>;

/// Endpoints of one logical service, kept in sync with discovery.
pub struct EndpointSet<Req, Resp> {
    service: Arc<str>,
    snapshot: Arc<ArcSwap<Vec<Arc<ServiceEndpoint<Req, Resp>>>>>,
    processed: watch::Receiver<u64>,
    cancel: CancellationToken,
}

impl<Req, Resp> EndpointSet<Req, Resp>
where
    Req: Send + Sync + 'static,
    Resp: Send + 'static,
{
    /// Subscribe to `instancer` and start the consumer task.
    ///
    /// Must be called inside a Tokio runtime. The task stops when `shutdown`
    /// is cancelled, when the set is dropped, or when the stream ends.
    pub fn spawn(
        service: &str,
        instancer: &dyn Instancer,
        builder: Arc<dyn EndpointBuilder<Req, Resp>>,
        shutdown: &CancellationToken,
    ) -> Self {
        Self::from_stream(service, instancer.subscribe(), builder, shutdown)
    }

    /// Like [`EndpointSet::spawn`], for an already-open event stream.
    pub fn from_stream(
        service: &str,
        events: EventStream,
        builder: Arc<dyn EndpointBuilder<Req, Resp>>,
        shutdown: &CancellationToken,
    ) -> Self {
        let service: Arc<str> = service.into();
        let snapshot = Arc::new(ArcSwap::from_pointee(Vec::new()));
        let (processed_tx, processed) = watch::channel(0u64);
        let cancel = shutdown.child_token();

        let worker = SetWorker {
            service: service.clone(),
            members: BTreeMap::new(),
            builder,
            snapshot: snapshot.clone(),
            processed: processed_tx,
        };
        let span = tracing::info_span!("endpoint_set", service = %service);
        tokio::spawn(worker.run(events, cancel.clone()).instrument(span));

        Self {
            service,
            snapshot,
            processed,
            cancel,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// The current snapshot. Never blocks.
    pub fn snapshot(&self) -> Snapshot<Req, Resp> {
        self.snapshot.load_full()
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of discovery events fully applied so far.
    pub fn processed(&self) -> u64 {
        *self.processed.borrow()
    }

    /// Wait until at least `count` events have been applied. Returns false
    /// if the consumer stopped first.
    pub async fn wait_processed(&self, count: u64) -> bool {
        let mut processed = self.processed.clone();
        let reached = processed.wait_for(|applied| *applied >= count).await.is_ok();
        reached
    }

    /// Wait up to `timeout` for at least one endpoint to be published.
    pub async fn wait_for_endpoints(&self, timeout: Duration) -> bool {
        let mut processed = self.processed.clone();
        let ready = processed.wait_for(|_| !self.snapshot.load().is_empty());
        let published = matches!(tokio::time::timeout(timeout, ready).await, Ok(Ok(_)));
        published
    }

    /// Stop consuming discovery events. The last snapshot stays readable.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl<Req, Resp> Drop for EndpointSet<Req, Resp> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Single consumer of the discovery stream; sole owner of the instance map.
struct SetWorker<Req, Resp> {
    service: Arc<str>,
    members: BTreeMap<Instance, Arc<ServiceEndpoint<Req, Resp>>>,
    builder: Arc<dyn EndpointBuilder<Req, Resp>>,
    snapshot: Arc<ArcSwap<Vec<Arc<ServiceEndpoint<Req, Resp>>>>>,
    processed: watch::Sender<u64>,
}

impl<Req: 'static, Resp: 'static> SetWorker<Req, Resp> {
    async fn run(mut self, mut events: EventStream, cancel: CancellationToken) {
        tracing::debug!("Endpoint set consumer started");
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("Endpoint set consumer cancelled");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => {
                        if self.apply(event) {
                            self.publish();
                        }
                        self.processed.send_modify(|applied| *applied += 1);
                    }
                    None => {
                        tracing::debug!("Discovery stream closed");
                        break;
                    }
                },
            }
        }
    }

    /// Apply one event. Returns true if membership changed.
    fn apply(&mut self, event: DiscoveryEvent) -> bool {
        match event {
            DiscoveryEvent::Added(instance) => {
                if self.members.contains_key(&instance) {
                    return false;
                }
                match self.builder.build(&instance) {
                    Ok(endpoint) => {
                        tracing::info!(instance = %instance, "Endpoint added");
                        self.members.insert(instance, Arc::new(endpoint));
                        true
                    }
                    Err(e) => {
                        tracing::warn!(instance = %instance, error = %e, "Skipping instance");
                        false
                    }
                }
            }
            DiscoveryEvent::Removed(instance) => match self.members.remove(&instance) {
                Some(_) => {
                    tracing::info!(instance = %instance, "Endpoint removed");
                    true
                }
                None => false,
            },
        }
    }

    fn publish(&self) {
        let endpoints: Vec<_> = self.members.values().cloned().collect();
        metrics::record_endpoint_count(&self.service, endpoints.len());
        self.snapshot.store(Arc::new(endpoints));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::EndpointFactory;
    use crate::error::{ConstructionError, TransportError};
    use crate::resilience::circuit_breaker::BreakerSettings;
    use crate::transport::Transport;
    use futures_util::future::BoxFuture;
    use tokio::sync::mpsc;

    struct Noop;

    impl Transport for Noop {
        type Request = ();
        type Response = ();
        type Target = ();

        fn prepare(&self, instance: &Instance) -> Result<(), ConstructionError> {
            if instance.as_str().contains(' ') {
                return Err(ConstructionError::new(instance, "whitespace in address"));
            }
            Ok(())
        }

        fn call<'a>(&'a self, _target: &'a (), _request: &'a ()) -> BoxFuture<'a, Result<(), TransportError>> {
            Box::pin(async { Ok(()) })
        }
    }

    fn spawn_set() -> (mpsc::UnboundedSender<DiscoveryEvent>, EndpointSet<(), ()>) {
        spawn_set_with(BreakerSettings::default())
    }

    fn spawn_set_with(settings: BreakerSettings) -> (mpsc::UnboundedSender<DiscoveryEvent>, EndpointSet<(), ()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let builder = Arc::new(EndpointFactory::new("noop", Arc::new(Noop), settings));
        let set = EndpointSet::from_stream("svc", rx, builder, &CancellationToken::new());
        (tx, set)
    }

    fn addresses(set: &EndpointSet<(), ()>) -> Vec<String> {
        set.snapshot().iter().map(|e| e.instance().to_string()).collect()
    }

    #[tokio::test]
    async fn test_add_remove_idempotent() {
        let (tx, set) = spawn_set();
        assert!(set.is_empty());

        tx.send(DiscoveryEvent::Added("http://b:2".into())).unwrap();
        tx.send(DiscoveryEvent::Added("http://a:1".into())).unwrap();
        tx.send(DiscoveryEvent::Added("http://a:1".into())).unwrap();
        assert!(set.wait_processed(3).await);
        assert_eq!(addresses(&set), vec!["http://a:1", "http://b:2"]);

        tx.send(DiscoveryEvent::Removed("http://a:1".into())).unwrap();
        tx.send(DiscoveryEvent::Removed("http://zzz:9".into())).unwrap();
        assert!(set.wait_processed(5).await);
        assert_eq!(addresses(&set), vec!["http://b:2"]);
    }

    #[tokio::test]
    async fn test_same_endpoint_kept_on_duplicate_add() {
        let (tx, set) = spawn_set();
        tx.send(DiscoveryEvent::Added("http://a:1".into())).unwrap();
        assert!(set.wait_processed(1).await);
        let before = set.snapshot()[0].clone();

        tx.send(DiscoveryEvent::Added("http://a:1".into())).unwrap();
        assert!(set.wait_processed(2).await);
        assert!(Arc::ptr_eq(&before, &set.snapshot()[0]));
    }

    #[tokio::test]
    async fn test_construction_failure_skipped() {
        let (tx, set) = spawn_set();
        tx.send(DiscoveryEvent::Added("bad address".into())).unwrap();
        tx.send(DiscoveryEvent::Added("http://a:1".into())).unwrap();
        assert!(set.wait_processed(2).await);
        assert_eq!(addresses(&set), vec!["http://a:1"]);
    }

    #[tokio::test]
    async fn test_old_snapshot_survives_removal() {
        let (tx, set) = spawn_set();
        tx.send(DiscoveryEvent::Added("http://a:1".into())).unwrap();
        assert!(set.wait_processed(1).await);
        let held = set.snapshot();

        tx.send(DiscoveryEvent::Removed("http://a:1".into())).unwrap();
        assert!(set.wait_processed(2).await);
        assert!(set.is_empty());
        assert_eq!(held.len(), 1);
        assert_eq!(Arc::strong_count(&held[0]), 1);
    }

    #[tokio::test]
    async fn test_stops_on_stream_close_and_shutdown() {
        let (tx, set) = spawn_set();
        tx.send(DiscoveryEvent::Added("http://a:1".into())).unwrap();
        drop(tx);
        assert!(set.wait_processed(1).await);
        assert!(!set.wait_processed(2).await);
        assert_eq!(set.len(), 1);

        let (tx, set) = spawn_set();
        set.shutdown();
        assert!(!set.wait_processed(1).await);
        assert!(tx.send(DiscoveryEvent::Added("http://a:1".into())).is_err());
    }

    #[tokio::test]
    async fn test_wait_for_endpoints() {
        let (tx, set) = spawn_set();
        assert!(!set.wait_for_endpoints(Duration::from_millis(20)).await);
        tx.send(DiscoveryEvent::Added("http://a:1".into())).unwrap();
        assert!(set.wait_for_endpoints(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_huge_breaker_window_keeps_consumer_alive() {
        let (tx, set) = spawn_set_with(BreakerSettings {
            interval: Duration::from_secs(i64::MAX as u64),
            cooldown: Duration::MAX,
            ..BreakerSettings::default()
        });
        tx.send(DiscoveryEvent::Added("http://a:1".into())).unwrap();
        tx.send(DiscoveryEvent::Added("http://b:2".into())).unwrap();
        assert!(set.wait_processed(2).await);
        assert_eq!(addresses(&set), vec!["http://a:1", "http://b:2"]);
    }
}
