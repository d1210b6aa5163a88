//! `/Status`: replay state.

use std::time::Duration;
use zbus::Connection;

use super::Endpoint;
use crate::error::{call, Result};

/// Title, path and whether a replay is active.
pub type ReplayStatus = (String, String, bool);

#[zbus::proxy(
    interface = "de.tvdr.vdr.status",
    default_service = "de.tvdr.vdr",
    default_path = "/Status"
)]
trait StatusService {
    fn is_replaying(&self) -> zbus::Result<ReplayStatus>;
}

#[derive(Clone)]
pub struct Status {
    proxy: StatusServiceProxy<'static>,
    deadline: Duration,
}

impl Status {
    pub async fn new(connection: &Connection, endpoint: &Endpoint) -> Result<Self> {
        let proxy = StatusServiceProxy::builder(connection)
            .destination(endpoint.service())?
            .build()
            .await?;
        Ok(Self {
            proxy,
            deadline: endpoint.call_timeout,
        })
    }

    pub async fn is_replaying(&self) -> Result<ReplayStatus> {
        call("IsReplaying", self.deadline, self.proxy.is_replaying()).await
    }
}
