//! `/Plugins`: SVDRP commands and service calls into VDR plugins.
//!
//! `SVDRPCommand` is addressed at `/Plugins/<name>`, while the list of loaded
//! plugins comes from the separate `de.tvdr.vdr.pluginmanager` interface.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;
use zbus::zvariant::ObjectPath;
use zbus::Connection;

use super::{Endpoint, Reply};
use crate::error::{call, Result, VdrError};

#[zbus::proxy(
    interface = "de.tvdr.vdr.plugin",
    default_service = "de.tvdr.vdr",
    default_path = "/Plugins"
)]
trait Plugin {
    #[zbus(name = "SVDRPCommand")]
    fn svdrp_command(&self, command: &str, args: &str) -> zbus::Result<Reply>;
    fn service(&self, id: &str, data: &str) -> zbus::Result<(bool, String)>;
}

#[zbus::proxy(
    interface = "de.tvdr.vdr.pluginmanager",
    default_service = "de.tvdr.vdr",
    default_path = "/Plugins"
)]
trait PluginManager {
    fn list(&self) -> zbus::Result<Vec<(String, String)>>;
}

/// Object path of a single plugin.
pub fn plugin_path(plugin: &str) -> String {
    format!("/Plugins/{}", plugin)
}

/// Validated object path of a single plugin.
fn plugin_object_path(plugin: &str) -> Result<ObjectPath<'static>> {
    ObjectPath::try_from(plugin_path(plugin))
        .map_err(|_| VdrError::InvalidPluginName(plugin.to_string()))
}

/// Name → version map of loaded plugins, fetched once on demand.
#[derive(Clone, Default)]
pub struct PluginCache {
    plugins: Arc<Mutex<Option<HashMap<String, String>>>>,
}

impl PluginCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached map.
    pub async fn store(&self, list: &[(String, String)]) {
        *self.plugins.lock().await = Some(list.iter().cloned().collect());
    }

    /// Forget the cached map.
    pub async fn clear(&self) {
        *self.plugins.lock().await = None;
    }

    pub async fn is_populated(&self) -> bool {
        self.plugins.lock().await.is_some()
    }

    /// Whether `name` is loaded. Calls `fetch` only if the cache was never filled.
    pub async fn contains<F, Fut>(&self, name: &str, fetch: F) -> Result<bool>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<(String, String)>>>,
    {
        let mut plugins = self.plugins.lock().await;
        if plugins.is_none() {
            debug!("Plugin cache empty, fetching plugin list");
            let list = fetch().await?;
            *plugins = Some(list.into_iter().collect());
        }
        Ok(plugins
            .as_ref()
            .map(|p| p.contains_key(name))
            .unwrap_or(false))
    }

    /// Cached version of `name`, if any.
    pub async fn version(&self, name: &str) -> Option<String> {
        self.plugins
            .lock()
            .await
            .as_ref()
            .and_then(|p| p.get(name).cloned())
    }
}

#[derive(Clone)]
pub struct Plugins {
    connection: Connection,
    service: String,
    proxy: PluginProxy<'static>,
    manager: PluginManagerProxy<'static>,
    cache: PluginCache,
    deadline: Duration,
}

impl Plugins {
    pub async fn new(connection: &Connection, endpoint: &Endpoint) -> Result<Self> {
        let service = endpoint.service();
        let proxy = PluginProxy::builder(connection)
            .destination(service.clone())?
            .build()
            .await?;
        let manager = PluginManagerProxy::builder(connection)
            .destination(service.clone())?
            .build()
            .await?;
        Ok(Self {
            connection: connection.clone(),
            service,
            proxy,
            manager,
            cache: PluginCache::new(),
            deadline: endpoint.call_timeout,
        })
    }

    /// Send an SVDRP command to `plugin`.
    pub async fn svdrp_command(&self, plugin: &str, command: &str, args: &str) -> Result<Reply> {
        let proxy = PluginProxy::builder(&self.connection)
            .destination(self.service.clone())?
            .path(plugin_object_path(plugin)?)?
            .build()
            .await?;
        call(
            "SVDRPCommand",
            self.deadline,
            proxy.svdrp_command(command, args),
        )
        .await
    }

    /// Call a plugin's `Service` method.
    pub async fn service(&self, id: &str, data: &str) -> Result<(bool, String)> {
        call("Service", self.deadline, self.proxy.service(id, data)).await
    }

    /// Loaded plugins as `(name, version)`. Refreshes the cache.
    pub async fn list(&self) -> Result<Vec<(String, String)>> {
        let list = self.fetch().await?;
        self.cache.store(&list).await;
        Ok(list)
    }

    /// Whether `plugin` is loaded, answered from the cache after the first lookup.
    pub async fn check_plugin(&self, plugin: &str) -> Result<bool> {
        self.cache.contains(plugin, || self.fetch()).await
    }

    /// Cached version string of `plugin`.
    pub async fn version(&self, plugin: &str) -> Result<Option<String>> {
        if !self.check_plugin(plugin).await? {
            return Ok(None);
        }
        Ok(self.cache.version(plugin).await)
    }

    /// Drop the cached plugin list and fetch it again.
    pub async fn refresh_plugins(&self) -> Result<Vec<(String, String)>> {
        self.cache.clear().await;
        self.list().await
    }

    async fn fetch(&self) -> Result<Vec<(String, String)>> {
        call("List", self.deadline, self.manager.list()).await
    }
}
