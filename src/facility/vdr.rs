//! `/vdr`: core status of the VDR process.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use zbus::Connection;

use super::Endpoint;
use crate::error::{call, Result, VdrError};

/// What VDR reports from `Status()` and announces through its signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VdrStatus {
    /// Starting up, plugins not yet initialized
    Start,
    /// Fully up, every facility usable
    Ready,
    /// Shutting down
    Stop,
}

impl VdrStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VdrStatus::Start => "Start",
            VdrStatus::Ready => "Ready",
            VdrStatus::Stop => "Stop",
        }
    }
}

impl fmt::Display for VdrStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VdrStatus {
    type Err = VdrError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Start" => Ok(VdrStatus::Start),
            "Ready" => Ok(VdrStatus::Ready),
            "Stop" => Ok(VdrStatus::Stop),
            other => Err(VdrError::UnknownStatus(other.to_string())),
        }
    }
}

#[zbus::proxy(
    interface = "de.tvdr.vdr.vdr",
    default_service = "de.tvdr.vdr",
    default_path = "/vdr"
)]
trait VdrService {
    fn status(&self) -> zbus::Result<String>;
}

#[derive(Clone)]
pub struct Vdr {
    proxy: VdrServiceProxy<'static>,
    deadline: Duration,
}

impl Vdr {
    pub async fn new(connection: &Connection, endpoint: &Endpoint) -> Result<Self> {
        let proxy = VdrServiceProxy::builder(connection)
            .destination(endpoint.service())?
            .build()
            .await?;
        Ok(Self {
            proxy,
            deadline: endpoint.call_timeout,
        })
    }

    /// Raw status string as sent by VDR.
    pub async fn status_raw(&self) -> Result<String> {
        call("Status", self.deadline, self.proxy.status()).await
    }

    pub async fn status(&self) -> Result<VdrStatus> {
        self.status_raw().await?.parse()
    }
}
