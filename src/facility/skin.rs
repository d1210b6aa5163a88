//! `/Skin`: OSD messages and skin selection.

use std::time::Duration;
use zbus::Connection;

use super::{Endpoint, Reply};
use crate::error::{call, Result};

#[zbus::proxy(
    interface = "de.tvdr.vdr.skin",
    default_service = "de.tvdr.vdr",
    default_path = "/Skin"
)]
trait SkinService {
    fn queue_message(&self, message: &str) -> zbus::Result<Reply>;
    fn list_skins(&self) -> zbus::Result<(i32, Vec<(i32, String, String)>)>;
    fn current_skin(&self) -> zbus::Result<(i32, i32, String, String)>;
    fn set_skin(&self, skin: &str) -> zbus::Result<Reply>;
}

#[derive(Clone)]
pub struct Skin {
    proxy: SkinServiceProxy<'static>,
    deadline: Duration,
}

impl Skin {
    pub async fn new(connection: &Connection, endpoint: &Endpoint) -> Result<Self> {
        let proxy = SkinServiceProxy::builder(connection)
            .destination(endpoint.service())?
            .build()
            .await?;
        Ok(Self {
            proxy,
            deadline: endpoint.call_timeout,
        })
    }

    /// Queue a message for display on the OSD.
    pub async fn queue_message(&self, message: &str) -> Result<Reply> {
        call("QueueMessage", self.deadline, self.proxy.queue_message(message)).await
    }

    /// Reply code and `(index, name, description)` of every skin.
    pub async fn list_skins(&self) -> Result<(i32, Vec<(i32, String, String)>)> {
        call("ListSkins", self.deadline, self.proxy.list_skins()).await
    }

    /// Reply code, index, name and description of the active skin.
    pub async fn current_skin(&self) -> Result<(i32, i32, String, String)> {
        call("CurrentSkin", self.deadline, self.proxy.current_skin()).await
    }

    pub async fn set_skin(&self, skin: &str) -> Result<Reply> {
        call("SetSkin", self.deadline, self.proxy.set_skin(skin)).await
    }
}
