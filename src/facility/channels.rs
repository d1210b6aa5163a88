//! `/Channels`: channel list access.

use std::time::Duration;
use zbus::Connection;

use super::Endpoint;
use crate::error::{call, Result};

/// Channels as `(number, channels.conf line)`, followed by reply code and message.
pub type ChannelList = (Vec<(i32, String)>, i32, String);

#[zbus::proxy(
    interface = "de.tvdr.vdr.channel",
    default_service = "de.tvdr.vdr",
    default_path = "/Channels"
)]
trait Channel {
    fn count(&self) -> zbus::Result<i32>;
    fn get_from_to(&self, from_index: i32, to_index: i32) -> zbus::Result<ChannelList>;
    fn list(&self, filter: &str) -> zbus::Result<ChannelList>;
}

#[derive(Clone)]
pub struct Channels {
    proxy: ChannelProxy<'static>,
    deadline: Duration,
}

impl Channels {
    pub async fn new(connection: &Connection, endpoint: &Endpoint) -> Result<Self> {
        let proxy = ChannelProxy::builder(connection)
            .destination(endpoint.service())?
            .build()
            .await?;
        Ok(Self {
            proxy,
            deadline: endpoint.call_timeout,
        })
    }

    /// Number of channels.
    pub async fn count(&self) -> Result<i32> {
        call("Count", self.deadline, self.proxy.count()).await
    }

    /// Channels between `from_index` and `to_index`.
    pub async fn get_from_to(&self, from_index: i32, to_index: i32) -> Result<ChannelList> {
        call(
            "GetFromTo",
            self.deadline,
            self.proxy.get_from_to(from_index, to_index),
        )
        .await
    }

    /// `filter` is one of `groups`, `<number>`, `<name>` or `<id>`.
    pub async fn list(&self, filter: &str) -> Result<ChannelList> {
        call("List", self.deadline, self.proxy.list(filter)).await
    }
}
