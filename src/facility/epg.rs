//! `/EPG`: EIT scanner control and event lookup.

use std::time::Duration;
use zbus::zvariant::OwnedValue;
use zbus::Connection;

use super::{Endpoint, Reply};
use crate::error::{call, Result};

/// Reply code, message and one `a(sv)` dictionary per event.
pub type EpgEvents = (i32, String, Vec<Vec<(String, OwnedValue)>>);

#[zbus::proxy(
    interface = "de.tvdr.vdr.epg",
    default_service = "de.tvdr.vdr",
    default_path = "/EPG"
)]
trait EpgService {
    fn disable_eit_scanner(&self, timeout: i32) -> zbus::Result<Reply>;
    fn enable_eit_scanner(&self) -> zbus::Result<Reply>;
    fn clear_epg(&self, timeout: i32) -> zbus::Result<Reply>;
    fn put_entry(&self, lines: &[&str]) -> zbus::Result<Reply>;
    fn put_file(&self, path: &str) -> zbus::Result<Reply>;
    fn now(&self, channel: &str) -> zbus::Result<EpgEvents>;
    fn next(&self, channel: &str) -> zbus::Result<EpgEvents>;
    fn at(&self, channel: &str, time: u64) -> zbus::Result<EpgEvents>;
}

#[derive(Clone)]
pub struct Epg {
    proxy: EpgServiceProxy<'static>,
    deadline: Duration,
}

impl Epg {
    pub async fn new(connection: &Connection, endpoint: &Endpoint) -> Result<Self> {
        let proxy = EpgServiceProxy::builder(connection)
            .destination(endpoint.service())?
            .build()
            .await?;
        Ok(Self {
            proxy,
            deadline: endpoint.call_timeout,
        })
    }

    /// Disable the EIT scanner; a `timeout` of 0 lets VDR pick its default (3600s).
    pub async fn disable_eit_scanner(&self, timeout: i32) -> Result<Reply> {
        call(
            "DisableEitScanner",
            self.deadline,
            self.proxy.disable_eit_scanner(timeout),
        )
        .await
    }

    pub async fn enable_eit_scanner(&self) -> Result<Reply> {
        call(
            "EnableEitScanner",
            self.deadline,
            self.proxy.enable_eit_scanner(),
        )
        .await
    }

    /// Clear EPG data. `timeout` is the EIT scanner inactivity timeout (0 means 10s).
    pub async fn clear_epg(&self, timeout: i32) -> Result<Reply> {
        call("ClearEpg", self.deadline, self.proxy.clear_epg(timeout)).await
    }

    /// Add an EPG entry given as SVDRP `PUTE` lines (`"C ..."`, `"E ..."`, ...).
    pub async fn put_entry<S: AsRef<str>>(&self, lines: &[S]) -> Result<Reply> {
        let lines: Vec<&str> = lines.iter().map(AsRef::as_ref).collect();
        call("PutEntry", self.deadline, self.proxy.put_entry(&lines)).await
    }

    /// Read EPG data from a file on the VDR host.
    pub async fn put_file(&self, path: &str) -> Result<Reply> {
        call("PutFile", self.deadline, self.proxy.put_file(path)).await
    }

    /// Current event of `channel`, or of every channel if empty.
    pub async fn now(&self, channel: &str) -> Result<EpgEvents> {
        call("Now", self.deadline, self.proxy.now(channel)).await
    }

    /// Following event of `channel`, or of every channel if empty.
    pub async fn next(&self, channel: &str) -> Result<EpgEvents> {
        call("Next", self.deadline, self.proxy.next(channel)).await
    }

    /// Event running at `time` (seconds since epoch).
    pub async fn at(&self, channel: &str, time: u64) -> Result<EpgEvents> {
        call("At", self.deadline, self.proxy.at(channel, time)).await
    }
}
