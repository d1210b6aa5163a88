//! `/Remote`: remote-control input and OSD interaction.

use std::time::Duration;
use zbus::Connection;

use super::{Endpoint, Reply};
use crate::error::{call, Result};

#[zbus::proxy(
    interface = "de.tvdr.vdr.remote",
    default_service = "de.tvdr.vdr",
    default_path = "/Remote"
)]
trait RemoteControl {
    fn enable(&self) -> zbus::Result<Reply>;
    fn disable(&self) -> zbus::Result<Reply>;
    fn status(&self) -> zbus::Result<bool>;
    fn hit_key(&self, key: &str) -> zbus::Result<Reply>;
    fn hit_keys(&self, keys: &[&str]) -> zbus::Result<Reply>;
    fn ask_user(&self, title: &str, items: &[&str]) -> zbus::Result<Reply>;
    fn call_plugin(&self, plugin: &str) -> zbus::Result<Reply>;
    fn switch_channel(&self, channel: &str) -> zbus::Result<Reply>;
    fn set_volume(&self, volume: &str) -> zbus::Result<Reply>;
    fn get_volume(&self) -> zbus::Result<(i32, bool)>;
}

#[derive(Clone)]
pub struct Remote {
    proxy: RemoteControlProxy<'static>,
    deadline: Duration,
}

impl Remote {
    pub async fn new(connection: &Connection, endpoint: &Endpoint) -> Result<Self> {
        let proxy = RemoteControlProxy::builder(connection)
            .destination(endpoint.service())?
            .build()
            .await?;
        Ok(Self {
            proxy,
            deadline: endpoint.call_timeout,
        })
    }

    /// Enable the remote in VDR.
    pub async fn enable(&self) -> Result<Reply> {
        call("Enable", self.deadline, self.proxy.enable()).await
    }

    /// Disable the remote in VDR.
    pub async fn disable(&self) -> Result<Reply> {
        call("Disable", self.deadline, self.proxy.disable()).await
    }

    /// Whether the remote is enabled.
    pub async fn status(&self) -> Result<bool> {
        call("Status", self.deadline, self.proxy.status()).await
    }

    pub async fn hit_key(&self, key: &str) -> Result<Reply> {
        call("HitKey", self.deadline, self.proxy.hit_key(key)).await
    }

    pub async fn hit_keys<S: AsRef<str>>(&self, keys: &[S]) -> Result<Reply> {
        let keys: Vec<&str> = keys.iter().map(AsRef::as_ref).collect();
        call("HitKeys", self.deadline, self.proxy.hit_keys(&keys)).await
    }

    /// Show `items` on the OSD and let the user pick one.
    ///
    /// The choice arrives later as an `AskUserSelect` signal carrying the title
    /// and the zero-based index (-1 if nothing was selected).
    pub async fn ask_user<S: AsRef<str>>(&self, title: &str, items: &[S]) -> Result<Reply> {
        let items: Vec<&str> = items.iter().map(AsRef::as_ref).collect();
        call("AskUser", self.deadline, self.proxy.ask_user(title, &items)).await
    }

    /// Open the main menu entry of a plugin.
    pub async fn call_plugin(&self, plugin: &str) -> Result<Reply> {
        call("CallPlugin", self.deadline, self.proxy.call_plugin(plugin)).await
    }

    /// Switch like SVDRP `CHAN`: `+`, `-`, `<number>`, `<name>` or `<id>`.
    pub async fn switch_channel(&self, channel: &str) -> Result<Reply> {
        call(
            "SwitchChannel",
            self.deadline,
            self.proxy.switch_channel(channel),
        )
        .await
    }

    /// `<0-255>`, `+`, `-` or `mute`.
    pub async fn set_volume(&self, volume: &str) -> Result<Reply> {
        call("SetVolume", self.deadline, self.proxy.set_volume(volume)).await
    }

    /// Volume level and mute state.
    pub async fn get_volume(&self) -> Result<(i32, bool)> {
        call("GetVolume", self.deadline, self.proxy.get_volume()).await
    }
}
