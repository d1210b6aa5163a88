//! Module lifecycle driven by VDR's readiness.
//!
//! ```text
//!            probe == Ready / "Ready" signal
//!   Unknown ───────────────────────────────> Ready
//!      │                                     │  ▲
//!      │ probe fails / != Ready              │  │ "Ready" signal or probe == Ready
//!      ▼                                     ▼  │ (modules rebuilt in place)
//!   NotReady <──── "Stop"/"Start" signal, probe != Ready, name lost
//! ```
//!
//! Modules are never torn down; leaving `Ready` only marks them stale.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use zbus::fdo::DBusProxy;
use zbus::names::BusName;
use zbus::Connection;

use crate::error::{Result, VdrError};
use crate::facility::{Endpoint, Facility, ModuleFactory, Vdr, VdrStatus};
use crate::signals::{CallbackTable, VdrSignal, READY, START, STOP};

/// Whether the registered modules can be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Readiness {
    /// Not probed yet
    #[default]
    Unknown,
    /// VDR is ready and every module was built
    Ready,
    /// Modules need rebuilding before use
    NotReady,
}

/// The remote side as seen by the lifecycle manager.
#[async_trait]
pub trait Peer: Send + Sync {
    /// Whether VDR's bus name currently has an owner.
    async fn has_owner(&self) -> Result<bool>;

    /// Ask VDR for its status.
    async fn status(&self) -> Result<VdrStatus>;
}

/// VDR reached through the bus.
pub struct BusPeer {
    dbus: DBusProxy<'static>,
    service: String,
    vdr: Vdr,
}

impl BusPeer {
    pub async fn new(connection: &Connection, endpoint: &Endpoint) -> Result<Self> {
        Ok(Self {
            dbus: DBusProxy::new(connection).await?,
            service: endpoint.service(),
            vdr: Vdr::new(connection, endpoint).await?,
        })
    }
}

#[async_trait]
impl Peer for BusPeer {
    async fn has_owner(&self) -> Result<bool> {
        let name = BusName::try_from(self.service.as_str()).map_err(zbus::Error::from)?;
        self.dbus
            .name_has_owner(name)
            .await
            .map_err(|e| VdrError::from_call("NameHasOwner", zbus::Error::FDO(Box::new(e))))
    }

    async fn status(&self) -> Result<VdrStatus> {
        self.vdr.status().await
    }
}

struct Registry<M> {
    modules: HashMap<Facility, M>,
    readiness: Readiness,
    /// A `Stop` signal arrived since VDR last took its name.
    stop_seen: bool,
}

/// Builds the requested modules once VDR is ready and rebuilds them after restarts.
pub struct Lifecycle<P, F: ModuleFactory> {
    peer: P,
    factory: F,
    facilities: Vec<Facility>,
    registry: Mutex<Registry<F::Module>>,
    callbacks: CallbackTable,
}

impl<P: Peer, F: ModuleFactory> Lifecycle<P, F> {
    pub fn new(peer: P, factory: F, facilities: Vec<Facility>) -> Self {
        Self::with_callbacks(peer, factory, facilities, CallbackTable::new())
    }

    pub fn with_callbacks(
        peer: P,
        factory: F,
        facilities: Vec<Facility>,
        callbacks: CallbackTable,
    ) -> Self {
        Self {
            peer,
            factory,
            facilities,
            registry: Mutex::new(Registry {
                modules: HashMap::new(),
                readiness: Readiness::Unknown,
                stop_seen: false,
            }),
            callbacks,
        }
    }

    pub fn facilities(&self) -> &[Facility] {
        &self.facilities
    }

    pub fn callbacks(&self) -> &CallbackTable {
        &self.callbacks
    }

    pub async fn readiness(&self) -> Readiness {
        self.registry.lock().await.readiness
    }

    /// Module for `facility`, if it was ever built.
    pub async fn module(&self, facility: Facility) -> Option<F::Module> {
        self.registry.lock().await.modules.get(&facility).cloned()
    }

    /// Initial probe: build the modules if VDR owns its name and reports `Ready`.
    pub async fn start(&self) -> bool {
        match self.peer.has_owner().await {
            Ok(true) => self.check_ready().await,
            Ok(false) => {
                info!("VDR is not on the bus, waiting for it to appear");
                self.mark_not_ready().await;
                false
            }
            Err(e) => {
                warn!("Failed to look up VDR's bus name: {}", e);
                self.mark_not_ready().await;
                false
            }
        }
    }

    /// Probe VDR's status and rebuild the modules if they are stale.
    ///
    /// Probe failures count as "not ready".
    pub async fn check_ready(&self) -> bool {
        let status = match self.peer.status().await {
            Ok(status) => status,
            Err(e) => {
                debug!("VDR status probe failed: {}", e);
                self.mark_not_ready().await;
                return false;
            }
        };

        let mut registry = self.registry.lock().await;
        if status != VdrStatus::Ready {
            debug!("VDR status is {}", status);
            registry.readiness = Readiness::NotReady;
            return false;
        }
        if registry.readiness == Readiness::Ready {
            return true;
        }
        self.rebuild(&mut registry).await
    }

    /// React to a signal from VDR, then hand it to the registered callbacks.
    pub async fn handle_signal(&self, signal: &VdrSignal) {
        match signal.member() {
            READY => {
                info!("VDR signalled Ready");
                let mut registry = self.registry.lock().await;
                registry.stop_seen = false;
                self.rebuild(&mut registry).await;
            }
            STOP => {
                info!("VDR signalled Stop");
                let mut registry = self.registry.lock().await;
                registry.readiness = Readiness::NotReady;
                registry.stop_seen = true;
            }
            START => {
                info!("VDR signalled Start");
                self.mark_not_ready().await;
            }
            _ => {}
        }

        self.callbacks.dispatch(signal);
    }

    /// React to a change of VDR's bus-name owner.
    ///
    /// A known `old_owner` means the previous process lost the name, even when a
    /// queued owner takes it over in the same change.
    pub async fn handle_owner_change(&self, old_owner: Option<&str>, new_owner: Option<&str>) {
        if let Some(old) = old_owner {
            let crashed = {
                let mut registry = self.registry.lock().await;
                registry.readiness = Readiness::NotReady;
                !std::mem::take(&mut registry.stop_seen)
            };
            if crashed {
                warn!("VDR ({}) left the bus without a Stop signal, assuming it crashed", old);
                self.callbacks.dispatch(&VdrSignal::synthetic(STOP));
            } else {
                info!("VDR ({}) left the bus", old);
            }
        }

        if let Some(owner) = new_owner {
            debug!("VDR took its bus name as {}", owner);
            self.registry.lock().await.stop_seen = false;
        }
    }

    async fn mark_not_ready(&self) {
        self.registry.lock().await.readiness = Readiness::NotReady;
    }

    async fn rebuild(&self, registry: &mut Registry<F::Module>) -> bool {
        for &facility in &self.facilities {
            match self.factory.build(facility).await {
                Ok(module) => {
                    debug!("Initialized {}", facility);
                    registry.modules.insert(facility, module);
                }
                Err(e) => {
                    warn!("Failed to initialize {}: {}", facility, e);
                    registry.readiness = Readiness::NotReady;
                    return false;
                }
            }
        }
        info!("Initialized {} VDR modules", self.facilities.len());
        registry.readiness = Readiness::Ready;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};

    /// Peer whose answers the test controls.
    #[derive(Clone)]
    struct FakePeer {
        owned: Arc<AtomicBool>,
        status: Arc<StdMutex<Option<VdrStatus>>>,
        probes: Arc<AtomicUsize>,
    }

    impl FakePeer {
        fn new(owned: bool, status: Option<VdrStatus>) -> Self {
            Self {
                owned: Arc::new(AtomicBool::new(owned)),
                status: Arc::new(StdMutex::new(status)),
                probes: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn set_status(&self, status: Option<VdrStatus>) {
            *self.status.lock().unwrap() = status;
        }
    }

    #[async_trait]
    impl Peer for FakePeer {
        async fn has_owner(&self) -> Result<bool> {
            Ok(self.owned.load(Ordering::SeqCst))
        }

        async fn status(&self) -> Result<VdrStatus> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            let status = *self.status.lock().unwrap();
            status.ok_or_else(|| {
                VdrError::from_call(
                    "Status",
                    zbus::Error::FDO(Box::new(zbus::fdo::Error::ServiceUnknown(
                        "de.tvdr.vdr".into(),
                    ))),
                )
            })
        }
    }

    /// Factory counting how often each facility was built.
    #[derive(Clone, Default)]
    struct CountingFactory {
        builds: Arc<AtomicUsize>,
        fail: Arc<AtomicBool>,
    }

    #[async_trait]
    impl ModuleFactory for CountingFactory {
        type Module = (Facility, usize);

        async fn build(&self, facility: Facility) -> Result<(Facility, usize)> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(VdrError::UnknownFacility(facility.to_string()));
            }
            let n = self.builds.fetch_add(1, Ordering::SeqCst);
            Ok((facility, n))
        }
    }

    fn facilities() -> Vec<Facility> {
        vec![Facility::Vdr, Facility::Timers, Facility::Remote]
    }

    fn lifecycle(peer: &FakePeer, factory: &CountingFactory) -> Lifecycle<FakePeer, CountingFactory> {
        Lifecycle::new(peer.clone(), factory.clone(), facilities())
    }

    fn counter(table: &CallbackTable, member: &str) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        table.register(member, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        count
    }

    #[tokio::test]
    async fn test_start_builds_when_ready() {
        let peer = FakePeer::new(true, Some(VdrStatus::Ready));
        let factory = CountingFactory::default();
        let lc = lifecycle(&peer, &factory);

        assert_eq!(lc.readiness().await, Readiness::Unknown);
        assert!(lc.start().await);
        assert_eq!(lc.readiness().await, Readiness::Ready);
        assert_eq!(factory.builds.load(Ordering::SeqCst), 3);
        assert!(lc.module(Facility::Timers).await.is_some());
        assert!(lc.module(Facility::Epg).await.is_none());
    }

    #[tokio::test]
    async fn test_start_without_owner_skips_status_call() {
        let peer = FakePeer::new(false, Some(VdrStatus::Ready));
        let factory = CountingFactory::default();
        let lc = lifecycle(&peer, &factory);

        assert!(!lc.start().await);
        assert_eq!(lc.readiness().await, Readiness::NotReady);
        assert_eq!(peer.probes.load(Ordering::SeqCst), 0);
        assert_eq!(factory.builds.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_check_ready_builds_once() {
        let peer = FakePeer::new(true, Some(VdrStatus::Ready));
        let factory = CountingFactory::default();
        let lc = lifecycle(&peer, &factory);

        assert!(lc.check_ready().await);
        assert!(lc.check_ready().await);
        assert_eq!(factory.builds.load(Ordering::SeqCst), 3);
        assert_eq!(peer.probes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_check_ready_not_ready_status() {
        let peer = FakePeer::new(true, Some(VdrStatus::Start));
        let factory = CountingFactory::default();
        let lc = lifecycle(&peer, &factory);

        assert!(!lc.check_ready().await);
        assert_eq!(lc.readiness().await, Readiness::NotReady);
        assert_eq!(factory.builds.load(Ordering::SeqCst), 0);

        peer.set_status(Some(VdrStatus::Ready));
        assert!(lc.check_ready().await);
        assert_eq!(factory.builds.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_status_error_is_not_ready() {
        let peer = FakePeer::new(true, None);
        let factory = CountingFactory::default();
        let lc = lifecycle(&peer, &factory);

        assert!(!lc.check_ready().await);
        assert_eq!(lc.readiness().await, Readiness::NotReady);
    }

    #[tokio::test]
    async fn test_status_drop_marks_stale_and_rebuilds() {
        let peer = FakePeer::new(true, Some(VdrStatus::Ready));
        let factory = CountingFactory::default();
        let lc = lifecycle(&peer, &factory);
        assert!(lc.start().await);

        peer.set_status(Some(VdrStatus::Stop));
        assert!(!lc.check_ready().await);
        // Stale modules stay in place.
        assert!(lc.module(Facility::Vdr).await.is_some());

        peer.set_status(Some(VdrStatus::Ready));
        assert!(lc.check_ready().await);
        assert_eq!(factory.builds.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_stop_signal_defers_rebuild_until_ready() {
        let peer = FakePeer::new(true, Some(VdrStatus::Ready));
        let factory = CountingFactory::default();
        let lc = lifecycle(&peer, &factory);
        assert!(lc.start().await);

        lc.handle_signal(&VdrSignal::synthetic("Stop")).await;
        assert_eq!(lc.readiness().await, Readiness::NotReady);
        assert_eq!(factory.builds.load(Ordering::SeqCst), 3);

        lc.handle_signal(&VdrSignal::synthetic("Start")).await;
        assert_eq!(lc.readiness().await, Readiness::NotReady);
        assert_eq!(factory.builds.load(Ordering::SeqCst), 3);

        lc.handle_signal(&VdrSignal::synthetic("Ready")).await;
        assert_eq!(lc.readiness().await, Readiness::Ready);
        assert_eq!(factory.builds.load(Ordering::SeqCst), 6);

        // Rebuilt in place: the registry holds the newest module.
        let (facility, n) = lc.module(Facility::Vdr).await.unwrap();
        assert_eq!(facility, Facility::Vdr);
        assert_eq!(n, 3);
    }

    #[tokio::test]
    async fn test_build_failure_reports_not_ready() {
        let peer = FakePeer::new(true, Some(VdrStatus::Ready));
        let factory = CountingFactory::default();
        factory.fail.store(true, Ordering::SeqCst);
        let lc = lifecycle(&peer, &factory);

        assert!(!lc.start().await);
        assert_eq!(lc.readiness().await, Readiness::NotReady);

        // Next Ready signal retries.
        factory.fail.store(false, Ordering::SeqCst);
        lc.handle_signal(&VdrSignal::synthetic("Ready")).await;
        assert_eq!(lc.readiness().await, Readiness::Ready);
    }

    #[tokio::test]
    async fn test_signals_reach_callbacks() {
        let peer = FakePeer::new(true, Some(VdrStatus::Ready));
        let factory = CountingFactory::default();
        let lc = lifecycle(&peer, &factory);
        let ready = counter(lc.callbacks(), "Ready");
        let other = counter(lc.callbacks(), "AskUserSelect");

        lc.handle_signal(&VdrSignal::synthetic("Ready")).await;
        lc.handle_signal(&VdrSignal::synthetic("AskUserSelect")).await;
        lc.handle_signal(&VdrSignal::synthetic("AskUserSelect")).await;

        assert_eq!(ready.load(Ordering::SeqCst), 1);
        assert_eq!(other.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_name_lost_without_stop_fires_stop_callbacks() {
        let peer = FakePeer::new(true, Some(VdrStatus::Ready));
        let factory = CountingFactory::default();
        let lc = lifecycle(&peer, &factory);
        let first = counter(lc.callbacks(), "Stop");
        let second = counter(lc.callbacks(), "Stop");
        assert!(lc.start().await);

        lc.handle_owner_change(Some(":1.10"), None).await;
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(lc.readiness().await, Readiness::NotReady);

        // A second crash after VDR came back counts again.
        lc.handle_owner_change(None, Some(":1.77")).await;
        lc.handle_owner_change(Some(":1.77"), None).await;
        assert_eq!(first.load(Ordering::SeqCst), 2);
        assert_eq!(second.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_name_lost_after_stop_is_not_a_crash() {
        let peer = FakePeer::new(true, Some(VdrStatus::Ready));
        let factory = CountingFactory::default();
        let lc = lifecycle(&peer, &factory);
        let stops = counter(lc.callbacks(), "Stop");

        lc.handle_signal(&VdrSignal::synthetic("Stop")).await;
        assert_eq!(stops.load(Ordering::SeqCst), 1);

        lc.handle_owner_change(Some(":1.10"), None).await;
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_owner_handover_without_stop_is_a_crash() {
        let peer = FakePeer::new(true, Some(VdrStatus::Ready));
        let factory = CountingFactory::default();
        let lc = lifecycle(&peer, &factory);
        let stops = counter(lc.callbacks(), "Stop");
        assert!(lc.start().await);

        // A queued process takes the name straight from the old owner.
        lc.handle_owner_change(Some(":1.10"), Some(":1.11")).await;
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert_eq!(lc.readiness().await, Readiness::NotReady);

        // The new owner's own Stop and exit are a clean shutdown.
        lc.handle_signal(&VdrSignal::synthetic("Stop")).await;
        lc.handle_owner_change(Some(":1.11"), None).await;
        assert_eq!(stops.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_owner_handover_after_stop_is_clean() {
        let peer = FakePeer::new(true, Some(VdrStatus::Ready));
        let factory = CountingFactory::default();
        let lc = lifecycle(&peer, &factory);
        let stops = counter(lc.callbacks(), "Stop");
        assert!(lc.start().await);

        lc.handle_signal(&VdrSignal::synthetic("Stop")).await;
        lc.handle_owner_change(Some(":1.10"), Some(":1.11")).await;
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert_eq!(lc.readiness().await, Readiness::NotReady);

        // The new owner starts with a clean slate.
        lc.handle_owner_change(Some(":1.11"), None).await;
        assert_eq!(stops.load(Ordering::SeqCst), 2);
    }
}
