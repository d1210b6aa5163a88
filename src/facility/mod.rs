//! Proxies for the dbus2vdr facilities.
//!
//! Every facility lives at a fixed object path and interface below the
//! `de.tvdr.vdr` service:
//!
//! ```text
//! ┌──────────────┐   de.tvdr.vdr[N]   ┌──────────────────────────┐
//! │ Channels     │───────────────────>│ /Channels  .channel      │
//! │ Epg          │───────────────────>│ /EPG       .epg          │
//! │ Plugins      │───────────────────>│ /Plugins   .plugin       │
//! │ ...          │                    │ ...                      │
//! └──────────────┘                    └──────────────────────────┘
//! ```
//!
//! Each wrapper forwards its methods 1:1 to the remote method of the same
//! name and returns the reply untouched.

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use zbus::Connection;

use crate::error::{Result, VdrError};

mod channels;
mod epg;
mod plugins;
mod recordings;
mod remote;
mod setup;
mod shutdown;
mod skin;
mod status;
mod timers;
mod vdr;

#[cfg(test)]
mod testing;

pub use channels::{ChannelList, Channels};
pub use epg::{Epg, EpgEvents};
pub use plugins::{plugin_path, PluginCache, Plugins};
pub use recordings::{PlayPosition, RecordingRef, Recordings};
pub use remote::Remote;
pub use setup::Setup;
pub use shutdown::{Shutdown, ShutdownConfirmation, WakeupTimer};
pub use skin::Skin;
pub use status::{ReplayStatus, Status};
pub use timers::{NextTimer, Timers};
pub use vdr::{Vdr, VdrStatus};

/// Well-known bus name of the default VDR instance.
pub const VDR_ADDR: &str = "de.tvdr.vdr";

/// Reply code and message, as most dbus2vdr methods answer.
pub type Reply = (i32, String);

/// Bus name for the given VDR instance (`de.tvdr.vdr`, `de.tvdr.vdr1`, ...).
pub fn service_name(instance: u32) -> String {
    if instance > 0 {
        format!("{}{}", VDR_ADDR, instance)
    } else {
        VDR_ADDR.to_string()
    }
}

/// Full interface name for a facility suffix.
pub fn interface_name(suffix: &str) -> String {
    format!("{}.{}", VDR_ADDR, suffix)
}

/// Where and how the proxies talk to VDR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub instance: u32,
    /// Deadline for ordinary calls.
    pub call_timeout: Duration,
    /// Deadline for `ConfirmShutdown`, which may wait on user interaction.
    pub confirm_timeout: Duration,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Endpoint {
    pub fn new(instance: u32) -> Self {
        Self {
            instance,
            call_timeout: Duration::from_secs(25),
            confirm_timeout: Duration::from_secs(120),
        }
    }

    pub fn service(&self) -> String {
        service_name(self.instance)
    }
}

/// One logical group of remote operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Facility {
    Recordings,
    Channels,
    Epg,
    Plugins,
    Remote,
    Setup,
    Shutdown,
    Skin,
    Timers,
    Vdr,
    Status,
}

impl Facility {
    pub const ALL: [Facility; 11] = [
        Facility::Recordings,
        Facility::Channels,
        Facility::Epg,
        Facility::Plugins,
        Facility::Remote,
        Facility::Setup,
        Facility::Shutdown,
        Facility::Skin,
        Facility::Timers,
        Facility::Vdr,
        Facility::Status,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Facility::Recordings => "/Recordings",
            Facility::Channels => "/Channels",
            Facility::Epg => "/EPG",
            Facility::Plugins => "/Plugins",
            Facility::Remote => "/Remote",
            Facility::Setup => "/Setup",
            Facility::Shutdown => "/Shutdown",
            Facility::Skin => "/Skin",
            Facility::Timers => "/Timers",
            Facility::Vdr => "/vdr",
            Facility::Status => "/Status",
        }
    }

    pub fn interface_suffix(&self) -> &'static str {
        match self {
            Facility::Recordings => "recording",
            Facility::Channels => "channel",
            Facility::Epg => "epg",
            Facility::Plugins => "plugin",
            Facility::Remote => "remote",
            Facility::Setup => "setup",
            Facility::Shutdown => "shutdown",
            Facility::Skin => "skin",
            Facility::Timers => "timer",
            Facility::Vdr => "vdr",
            Facility::Status => "status",
        }
    }

    pub fn interface(&self) -> String {
        interface_name(self.interface_suffix())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Facility::Recordings => "Recordings",
            Facility::Channels => "Channels",
            Facility::Epg => "EPG",
            Facility::Plugins => "Plugins",
            Facility::Remote => "Remote",
            Facility::Setup => "Setup",
            Facility::Shutdown => "Shutdown",
            Facility::Skin => "Skin",
            Facility::Timers => "Timers",
            Facility::Vdr => "vdr",
            Facility::Status => "Status",
        }
    }

    /// Expand a module selection; `"all"` selects every facility.
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Vec<Facility>> {
        if names.iter().any(|n| n.as_ref().eq_ignore_ascii_case("all")) {
            return Ok(Facility::ALL.to_vec());
        }

        let mut facilities = Vec::with_capacity(names.len());
        for name in names {
            let facility: Facility = name.as_ref().parse()?;
            if !facilities.contains(&facility) {
                facilities.push(facility);
            }
        }
        Ok(facilities)
    }
}

impl fmt::Display for Facility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Facility {
    type Err = VdrError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Facility::ALL
            .iter()
            .copied()
            .find(|f| f.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| VdrError::UnknownFacility(s.to_string()))
    }
}

/// A constructed facility proxy, as held by the module registry.
#[derive(Clone)]
pub enum Module {
    Recordings(Recordings),
    Channels(Channels),
    Epg(Epg),
    Plugins(Plugins),
    Remote(Remote),
    Setup(Setup),
    Shutdown(Shutdown),
    Skin(Skin),
    Timers(Timers),
    Vdr(Vdr),
    Status(Status),
}

impl Module {
    pub fn facility(&self) -> Facility {
        match self {
            Module::Recordings(_) => Facility::Recordings,
            Module::Channels(_) => Facility::Channels,
            Module::Epg(_) => Facility::Epg,
            Module::Plugins(_) => Facility::Plugins,
            Module::Remote(_) => Facility::Remote,
            Module::Setup(_) => Facility::Setup,
            Module::Shutdown(_) => Facility::Shutdown,
            Module::Skin(_) => Facility::Skin,
            Module::Timers(_) => Facility::Timers,
            Module::Vdr(_) => Facility::Vdr,
            Module::Status(_) => Facility::Status,
        }
    }
}

/// Builds modules for the lifecycle manager.
#[async_trait]
pub trait ModuleFactory: Send + Sync {
    type Module: Clone + Send + Sync + 'static;

    async fn build(&self, facility: Facility) -> Result<Self::Module>;
}

/// Builds real zbus-backed proxies on a shared connection.
#[derive(Clone)]
pub struct ProxyFactory {
    connection: Connection,
    endpoint: Endpoint,
}

impl ProxyFactory {
    pub fn new(connection: Connection, endpoint: Endpoint) -> Self {
        Self {
            connection,
            endpoint,
        }
    }
}

#[async_trait]
impl ModuleFactory for ProxyFactory {
    type Module = Module;

    async fn build(&self, facility: Facility) -> Result<Module> {
        let conn = &self.connection;
        let ep = &self.endpoint;
        let module = match facility {
            Facility::Recordings => Module::Recordings(Recordings::new(conn, ep).await?),
            Facility::Channels => Module::Channels(Channels::new(conn, ep).await?),
            Facility::Epg => Module::Epg(Epg::new(conn, ep).await?),
            Facility::Plugins => Module::Plugins(Plugins::new(conn, ep).await?),
            Facility::Remote => Module::Remote(Remote::new(conn, ep).await?),
            Facility::Setup => Module::Setup(Setup::new(conn, ep).await?),
            Facility::Shutdown => Module::Shutdown(Shutdown::new(conn, ep).await?),
            Facility::Skin => Module::Skin(Skin::new(conn, ep).await?),
            Facility::Timers => Module::Timers(Timers::new(conn, ep).await?),
            Facility::Vdr => Module::Vdr(Vdr::new(conn, ep).await?),
            Facility::Status => Module::Status(Status::new(conn, ep).await?),
        };
        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_name_default_instance() {
        assert_eq!(service_name(0), "de.tvdr.vdr");
        assert_eq!(Endpoint::new(0).service(), "de.tvdr.vdr");
    }

    #[test]
    fn test_service_name_suffixed_instance() {
        assert_eq!(service_name(1), "de.tvdr.vdr1");
        assert_eq!(service_name(12), "de.tvdr.vdr12");
        assert_eq!(Endpoint::new(3).service(), "de.tvdr.vdr3");
    }

    #[test]
    fn test_interface_names() {
        assert_eq!(Facility::Channels.interface(), "de.tvdr.vdr.channel");
        assert_eq!(Facility::Timers.interface(), "de.tvdr.vdr.timer");
        assert_eq!(Facility::Recordings.interface(), "de.tvdr.vdr.recording");
        assert_eq!(Facility::Vdr.interface(), "de.tvdr.vdr.vdr");
    }

    #[test]
    fn test_paths() {
        assert_eq!(Facility::Epg.path(), "/EPG");
        assert_eq!(Facility::Vdr.path(), "/vdr");
        assert_eq!(Facility::Status.path(), "/Status");
    }

    #[test]
    fn test_facility_from_str() {
        assert_eq!("Timers".parse::<Facility>().unwrap(), Facility::Timers);
        assert_eq!("epg".parse::<Facility>().unwrap(), Facility::Epg);
        assert_eq!("vdr".parse::<Facility>().unwrap(), Facility::Vdr);
        assert!(matches!(
            "Teletext".parse::<Facility>(),
            Err(VdrError::UnknownFacility(_))
        ));
    }

    #[test]
    fn test_parse_list_all() {
        let all = Facility::parse_list(&["all"]).unwrap();
        assert_eq!(all.len(), Facility::ALL.len());
    }

    #[test]
    fn test_parse_list_dedups_and_keeps_order() {
        let list = Facility::parse_list(&["Timers", "EPG", "timers"]).unwrap();
        assert_eq!(list, vec![Facility::Timers, Facility::Epg]);
    }

    #[test]
    fn test_facility_name_round_trip() {
        for facility in Facility::ALL {
            assert_eq!(facility.name().parse::<Facility>().unwrap(), facility);
        }
    }
}
