//! Facade over the VDR facilities.
//!
//! `VdrClient` owns the bus connection, the module registry and the callback
//! table. A background task watches VDR's bus name and its signals and keeps the
//! registry in step with VDR restarts.
//!
//! # Usage
//!
//! ```ignore
//! let client = VdrClient::connect(&config.bus).await?;
//! client.on_signal("Stop", |_| println!("VDR is going down"));
//!
//! if client.check_status().await {
//!     let timers = client.timers().await.expect("Timers module");
//!     println!("{:?}", timers.next().await?);
//! }
//! ```

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use zbus::fdo::{DBusProxy, NameOwnerChanged};
use zbus::message::Type as MessageType;
use zbus::names::{BusName, UniqueName};
use zbus::{Connection, MatchRule, MessageStream};

use crate::config::{BusConfig, BusKind};
use crate::error::Result;
use crate::facility::{
    Channels, Endpoint, Epg, Facility, Module, Plugins, ProxyFactory, Recordings, Remote, Setup,
    Shutdown, Skin, Status, Timers, Vdr,
};
use crate::lifecycle::{BusPeer, Lifecycle, Readiness};
use crate::signals::{PendingCallback, VdrSignal};

type BusLifecycle = Lifecycle<BusPeer, ProxyFactory>;

/// Client for one VDR instance.
pub struct VdrClient {
    connection: Connection,
    endpoint: Endpoint,
    lifecycle: Arc<BusLifecycle>,
    watcher: JoinHandle<()>,
}

impl VdrClient {
    /// Connect to the bus named in `config` and start watching VDR.
    pub async fn connect(config: &BusConfig) -> Result<Self> {
        let connection = match config.kind {
            BusKind::System => Connection::system().await?,
            BusKind::Session => Connection::session().await?,
        };
        let facilities = Facility::parse_list(&config.modules)?;
        Self::with_connection(connection, config.endpoint(), facilities).await
    }

    /// Use an existing connection.
    ///
    /// The `vdr` facility is always added since the readiness probe needs it.
    pub async fn with_connection(
        connection: Connection,
        endpoint: Endpoint,
        mut facilities: Vec<Facility>,
    ) -> Result<Self> {
        if !facilities.contains(&Facility::Vdr) {
            facilities.push(Facility::Vdr);
        }

        let peer = BusPeer::new(&connection, &endpoint).await?;
        let factory = ProxyFactory::new(connection.clone(), endpoint.clone());
        let lifecycle = Arc::new(Lifecycle::new(peer, factory, facilities));

        // Subscribe before probing so no signal slips through in between.
        let watch = Watch::subscribe(&connection, &endpoint.service()).await?;
        if lifecycle.start().await {
            info!("Connected to VDR at {}", endpoint.service());
        }
        let watcher = tokio::spawn(watch.run(lifecycle.clone()));

        Ok(Self {
            connection,
            endpoint,
            lifecycle,
            watcher,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub async fn readiness(&self) -> Readiness {
        self.lifecycle.readiness().await
    }

    /// Probe VDR and rebuild stale modules. `false` if VDR is not ready.
    pub async fn check_status(&self) -> bool {
        self.lifecycle.check_ready().await
    }

    /// Register `callback` for signals named `member`.
    pub fn on_signal<F>(&self, member: &str, callback: F)
    where
        F: Fn(&VdrSignal) + Send + Sync + 'static,
    {
        self.lifecycle.callbacks().register(member, callback);
    }

    /// Reserve a callback slot for `member`; fill it with [`PendingCallback::connect`].
    pub fn on(&self, member: &str) -> PendingCallback {
        self.lifecycle.callbacks().reserve(member)
    }

    pub async fn module(&self, facility: Facility) -> Option<Module> {
        self.lifecycle.module(facility).await
    }

    pub async fn channels(&self) -> Option<Channels> {
        match self.module(Facility::Channels).await? {
            Module::Channels(m) => Some(m),
            _ => None,
        }
    }

    pub async fn epg(&self) -> Option<Epg> {
        match self.module(Facility::Epg).await? {
            Module::Epg(m) => Some(m),
            _ => None,
        }
    }

    pub async fn plugins(&self) -> Option<Plugins> {
        match self.module(Facility::Plugins).await? {
            Module::Plugins(m) => Some(m),
            _ => None,
        }
    }

    pub async fn recordings(&self) -> Option<Recordings> {
        match self.module(Facility::Recordings).await? {
            Module::Recordings(m) => Some(m),
            _ => None,
        }
    }

    pub async fn remote(&self) -> Option<Remote> {
        match self.module(Facility::Remote).await? {
            Module::Remote(m) => Some(m),
            _ => None,
        }
    }

    pub async fn setup(&self) -> Option<Setup> {
        match self.module(Facility::Setup).await? {
            Module::Setup(m) => Some(m),
            _ => None,
        }
    }

    pub async fn shutdown(&self) -> Option<Shutdown> {
        match self.module(Facility::Shutdown).await? {
            Module::Shutdown(m) => Some(m),
            _ => None,
        }
    }

    pub async fn skin(&self) -> Option<Skin> {
        match self.module(Facility::Skin).await? {
            Module::Skin(m) => Some(m),
            _ => None,
        }
    }

    pub async fn timers(&self) -> Option<Timers> {
        match self.module(Facility::Timers).await? {
            Module::Timers(m) => Some(m),
            _ => None,
        }
    }

    pub async fn vdr(&self) -> Option<Vdr> {
        match self.module(Facility::Vdr).await? {
            Module::Vdr(m) => Some(m),
            _ => None,
        }
    }

    pub async fn status(&self) -> Option<Status> {
        match self.module(Facility::Status).await? {
            Module::Status(m) => Some(m),
            _ => None,
        }
    }
}

impl Drop for VdrClient {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

/// Unique name currently owning VDR's bus name.
#[derive(Debug, Default)]
struct OwnerTracker {
    owner: Option<String>,
}

impl OwnerTracker {
    fn new(owner: Option<String>) -> Self {
        Self { owner }
    }

    /// Record a new owner and return the previous one.
    fn update(&mut self, new_owner: Option<String>) -> Option<String> {
        std::mem::replace(&mut self.owner, new_owner)
    }

    fn current(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// Signals from anyone but the current owner are dropped. With no known owner
    /// the match rule alone decides.
    fn accepts(&self, signal: &VdrSignal) -> bool {
        match self.current() {
            Some(owner) => signal.sender() == Some(owner),
            None => true,
        }
    }
}

/// Signal and name-owner streams for VDR's bus name.
struct Watch {
    service: String,
    owner: OwnerTracker,
    signals: BoxStream<'static, zbus::Result<zbus::Message>>,
    owners: BoxStream<'static, NameOwnerChanged>,
}

impl Watch {
    async fn subscribe(connection: &Connection, service: &str) -> Result<Self> {
        let rule = MatchRule::builder()
            .msg_type(MessageType::Signal)
            .sender(service)?
            .build();
        let signals = MessageStream::for_match_rule(rule, connection, None)
            .await?
            .boxed();

        let dbus = DBusProxy::new(connection).await?;
        let owners = dbus
            .receive_name_owner_changed_with_args(&[(0, service)])
            .await?
            .boxed();

        // Signals carry the unique name of the sender, so track who owns ours.
        let name = BusName::try_from(service).map_err(zbus::Error::from)?;
        let owner = dbus.get_name_owner(name).await.ok().map(|o| o.to_string());
        debug!("Current owner of {}: {:?}", service, owner);

        Ok(Self {
            service: service.to_string(),
            owner: OwnerTracker::new(owner),
            signals,
            owners,
        })
    }

    async fn run(mut self, lifecycle: Arc<BusLifecycle>) {
        debug!("Watching signals from {}", self.service);
        loop {
            tokio::select! {
                biased;

                Some(change) = self.owners.next() => {
                    match change.args() {
                        Ok(args) => {
                            let old_owner: &Option<UniqueName<'_>> = args.old_owner();
                            let new_owner: &Option<UniqueName<'_>> = args.new_owner();
                            let old_owner = old_owner.as_ref().map(|o| o.to_string());
                            let new_owner = new_owner.as_ref().map(|o| o.to_string());
                            self.owner.update(new_owner.clone());
                            lifecycle
                                .handle_owner_change(old_owner.as_deref(), new_owner.as_deref())
                                .await;
                        }
                        Err(e) => warn!("Malformed NameOwnerChanged signal: {}", e),
                    }
                }

                Some(message) = self.signals.next() => {
                    let message = match message {
                        Ok(message) => message,
                        Err(e) => {
                            warn!("Failed to receive signal: {}", e);
                            continue;
                        }
                    };
                    let Some(signal) = VdrSignal::from_message(&message) else {
                        continue;
                    };
                    if !self.owner.accepts(&signal) {
                        debug!("Dropping {} from stale sender {:?}", signal.member(), signal.sender());
                        continue;
                    }
                    lifecycle.handle_signal(&signal).await;
                }

                else => break,
            }
        }
        debug!("Signal watch for {} ended", self.service);
    }
}
