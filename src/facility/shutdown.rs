//! `/Shutdown`: shutdown inhibition and wakeup queries.

use std::time::Duration;
use zbus::Connection;

use super::Endpoint;
use crate::error::{call, Result};

/// Reply code, message, shutdown-hook exit code and hook message.
pub type ShutdownConfirmation = (i32, String, i32, String);

/// Reply code, timer id and wakeup time (seconds since epoch).
pub type WakeupTimer = (i32, i32, u64);

#[zbus::proxy(
    interface = "de.tvdr.vdr.shutdown",
    default_service = "de.tvdr.vdr",
    default_path = "/Shutdown"
)]
trait ShutdownService {
    fn confirm_shutdown(&self, ignore_user: bool) -> zbus::Result<ShutdownConfirmation>;
    fn manual_start(&self) -> zbus::Result<bool>;
    fn set_user_inactive(&self) -> zbus::Result<()>;
    fn next_wakeup_timer(&self) -> zbus::Result<WakeupTimer>;
}

#[derive(Clone)]
pub struct Shutdown {
    proxy: ShutdownServiceProxy<'static>,
    deadline: Duration,
    confirm_deadline: Duration,
}

impl Shutdown {
    pub async fn new(connection: &Connection, endpoint: &Endpoint) -> Result<Self> {
        let proxy = ShutdownServiceProxy::builder(connection)
            .destination(endpoint.service())?
            .build()
            .await?;
        Ok(Self {
            proxy,
            deadline: endpoint.call_timeout,
            confirm_deadline: endpoint.confirm_timeout,
        })
    }

    /// Ask VDR whether it may shut down now.
    ///
    /// VDR runs its shutdown hooks before answering, so this call gets the
    /// extended deadline.
    pub async fn confirm_shutdown(&self, ignore_user: bool) -> Result<ShutdownConfirmation> {
        call(
            "ConfirmShutdown",
            self.confirm_deadline,
            self.proxy.confirm_shutdown(ignore_user),
        )
        .await
    }

    /// Whether VDR was started manually rather than by a timer.
    pub async fn manual_start(&self) -> Result<bool> {
        call("ManualStart", self.deadline, self.proxy.manual_start()).await
    }

    pub async fn set_user_inactive(&self) -> Result<()> {
        call(
            "SetUserInactive",
            self.deadline,
            self.proxy.set_user_inactive(),
        )
        .await
    }

    pub async fn next_wakeup_timer(&self) -> Result<WakeupTimer> {
        call(
            "NextWakeupTimer",
            self.deadline,
            self.proxy.next_wakeup_timer(),
        )
        .await
    }
}
