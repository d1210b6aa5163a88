//! `/Recordings`: recording info, playback and extra video directories.

use std::time::Duration;
use zbus::zvariant::{OwnedValue, Value};
use zbus::Connection;

use super::{Endpoint, Reply};
use crate::error::{call, Result};

/// Key/value description of one recording.
pub type RecordingInfo = Vec<(String, OwnedValue)>;

/// Recordings are addressed either by number or by path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingRef {
    Number(i32),
    Path(String),
}

impl RecordingRef {
    pub fn to_value(&self) -> Value<'_> {
        match self {
            RecordingRef::Number(n) => Value::from(*n),
            RecordingRef::Path(p) => Value::from(p.as_str()),
        }
    }
}

impl From<i32> for RecordingRef {
    fn from(n: i32) -> Self {
        RecordingRef::Number(n)
    }
}

impl From<&str> for RecordingRef {
    fn from(path: &str) -> Self {
        RecordingRef::Path(path.to_string())
    }
}

/// Where playback starts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PlayPosition {
    /// Continue at the last saved position
    #[default]
    Resume,
    /// Frame number
    Frame(i32),
    /// Time offset as `hh:mm:ss.f`
    Time(String),
}

impl PlayPosition {
    pub fn to_value(&self) -> Value<'_> {
        match self {
            PlayPosition::Resume => Value::from(-1i32),
            PlayPosition::Frame(frame) => Value::from(*frame),
            PlayPosition::Time(time) => Value::from(time.as_str()),
        }
    }
}

#[zbus::proxy(
    interface = "de.tvdr.vdr.recording",
    default_service = "de.tvdr.vdr",
    default_path = "/Recordings"
)]
trait Recording {
    fn get(&self, recording: &Value<'_>) -> zbus::Result<(i32, RecordingInfo)>;
    fn change_name(&self, recording: &Value<'_>, name: &str) -> zbus::Result<Reply>;
    fn list(&self) -> zbus::Result<Vec<(i32, RecordingInfo)>>;
    fn play(&self, recording: &Value<'_>, position: &Value<'_>) -> zbus::Result<Reply>;
    fn add_extra_video_directory(&self, path: &str) -> zbus::Result<Reply>;
    fn delete_extra_video_directory(&self, path: &str) -> zbus::Result<Reply>;
    fn clear_extra_video_directories(&self) -> zbus::Result<Reply>;
    fn list_extra_video_directories(&self) -> zbus::Result<(i32, String, Vec<String>)>;
}

#[derive(Clone)]
pub struct Recordings {
    proxy: RecordingProxy<'static>,
    deadline: Duration,
}

impl Recordings {
    pub async fn new(connection: &Connection, endpoint: &Endpoint) -> Result<Self> {
        let proxy = RecordingProxy::builder(connection)
            .destination(endpoint.service())?
            .build()
            .await?;
        Ok(Self {
            proxy,
            deadline: endpoint.call_timeout,
        })
    }

    /// Info about a recording.
    pub async fn get(&self, recording: &RecordingRef) -> Result<(i32, RecordingInfo)> {
        let recording = recording.to_value();
        call("Get", self.deadline, self.proxy.get(&recording)).await
    }

    pub async fn change_name(&self, recording: &RecordingRef, name: &str) -> Result<Reply> {
        let recording = recording.to_value();
        call(
            "ChangeName",
            self.deadline,
            self.proxy.change_name(&recording, name),
        )
        .await
    }

    pub async fn list(&self) -> Result<Vec<(i32, RecordingInfo)>> {
        call("List", self.deadline, self.proxy.list()).await
    }

    pub async fn play(&self, recording: &RecordingRef, position: &PlayPosition) -> Result<Reply> {
        let recording = recording.to_value();
        let position = position.to_value();
        call(
            "Play",
            self.deadline,
            self.proxy.play(&recording, &position),
        )
        .await
    }

    pub async fn add_extra_video_directory(&self, path: &str) -> Result<Reply> {
        call(
            "AddExtraVideoDirectory",
            self.deadline,
            self.proxy.add_extra_video_directory(path),
        )
        .await
    }

    pub async fn delete_extra_video_directory(&self, path: &str) -> Result<Reply> {
        call(
            "DeleteExtraVideoDirectory",
            self.deadline,
            self.proxy.delete_extra_video_directory(path),
        )
        .await
    }

    pub async fn clear_extra_video_directories(&self) -> Result<Reply> {
        call(
            "ClearExtraVideoDirectories",
            self.deadline,
            self.proxy.clear_extra_video_directories(),
        )
        .await
    }

    pub async fn list_extra_video_directories(&self) -> Result<(i32, String, Vec<String>)> {
        call(
            "ListExtraVideoDirectories",
            self.deadline,
            self.proxy.list_extra_video_directories(),
        )
        .await
    }
}
