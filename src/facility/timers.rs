//! `/Timers`: timer listing and editing.

use std::time::Duration;
use zbus::Connection;

use super::{Endpoint, Reply};
use crate::error::{call, Result};

/// Reply of `Timers.Next`:
///
/// - reply code (250 on success, 550 on error)
/// - timer id (-1 if there is no timer at all)
/// - seconds until the timer starts (SVDRP `NEXT REL`)
/// - start time, seconds since epoch
/// - stop time, seconds since epoch
/// - event title
pub type NextTimer = (i32, i32, i32, u64, u64, String);

#[zbus::proxy(
    interface = "de.tvdr.vdr.timer",
    default_service = "de.tvdr.vdr",
    default_path = "/Timers"
)]
trait TimerService {
    fn list(&self) -> zbus::Result<Vec<String>>;
    fn next(&self) -> zbus::Result<NextTimer>;
    #[zbus(name = "New")]
    fn new_timer(&self, timer: &str) -> zbus::Result<Reply>;
    fn delete(&self, id: i32) -> zbus::Result<Reply>;
}

#[derive(Clone)]
pub struct Timers {
    proxy: TimerServiceProxy<'static>,
    deadline: Duration,
}

impl Timers {
    pub async fn new(connection: &Connection, endpoint: &Endpoint) -> Result<Self> {
        let proxy = TimerServiceProxy::builder(connection)
            .destination(endpoint.service())?
            .build()
            .await?;
        Ok(Self {
            proxy,
            deadline: endpoint.call_timeout,
        })
    }

    /// Timers in SVDRP `LSTT` format.
    pub async fn list(&self) -> Result<Vec<String>> {
        call("List", self.deadline, self.proxy.list()).await
    }

    pub async fn next(&self) -> Result<NextTimer> {
        call("Next", self.deadline, self.proxy.next()).await
    }

    /// Create a timer from an SVDRP `NEWT` line.
    pub async fn new_timer(&self, timer: &str) -> Result<Reply> {
        call("New", self.deadline, self.proxy.new_timer(timer)).await
    }

    pub async fn delete(&self, id: i32) -> Result<Reply> {
        call("Delete", self.deadline, self.proxy.delete(id)).await
    }
}
