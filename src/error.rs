//! Error type shared by every facility proxy and the lifecycle manager.
//!
//! Calls that fail are split into transport faults (the peer is gone, the bus is
//! down, no reply arrived) and remote faults (VDR answered with a D-Bus error).
//! Nothing is collapsed into a bare `false`.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use zbus::DBusError;

pub type Result<T> = std::result::Result<T, VdrError>;

/// D-Bus error names raised by the bus itself rather than by VDR.
const TRANSPORT_ERROR_NAMES: &[&str] = &[
    "org.freedesktop.DBus.Error.ServiceUnknown",
    "org.freedesktop.DBus.Error.NameHasNoOwner",
    "org.freedesktop.DBus.Error.NoReply",
    "org.freedesktop.DBus.Error.Timeout",
    "org.freedesktop.DBus.Error.TimedOut",
    "org.freedesktop.DBus.Error.Disconnected",
    "org.freedesktop.DBus.Error.NoServer",
    "org.freedesktop.DBus.Error.NoNetwork",
];

#[derive(Error, Debug)]
pub enum VdrError {
    #[error("Transport error calling {method}: {source}")]
    Transport {
        method: &'static str,
        #[source]
        source: zbus::Error,
    },

    #[error("{method} rejected by vdr ({name}): {message}")]
    Remote {
        method: &'static str,
        name: String,
        message: String,
    },

    #[error("{method} timed out after {after:?}")]
    Timeout {
        method: &'static str,
        after: Duration,
    },

    #[error("D-Bus error: {0}")]
    Bus(#[from] zbus::Error),

    #[error("Unknown facility: {0}")]
    UnknownFacility(String),

    #[error("Unknown vdr status: {0}")]
    UnknownStatus(String),

    #[error("Plugin name {0:?} is not a valid object path element")]
    InvalidPluginName(String),
}

impl VdrError {
    /// Classify a failed method call.
    pub fn from_call(method: &'static str, err: zbus::Error) -> Self {
        match err {
            zbus::Error::MethodError(name, detail, _) if !is_transport_name(name.as_str()) => {
                VdrError::Remote {
                    method,
                    name: name.to_string(),
                    message: detail.unwrap_or_default(),
                }
            }
            zbus::Error::FDO(ref fdo) if !is_transport_name(fdo.name().as_str()) => {
                VdrError::Remote {
                    method,
                    name: fdo.name().to_string(),
                    message: fdo.description().unwrap_or_default().to_string(),
                }
            }
            other => VdrError::Transport {
                method,
                source: other,
            },
        }
    }

    /// The peer could not be reached or did not answer in time.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            VdrError::Transport { .. } | VdrError::Timeout { .. } | VdrError::Bus(_)
        )
    }

    /// VDR received the call and refused it.
    pub fn is_remote(&self) -> bool {
        matches!(self, VdrError::Remote { .. })
    }
}

fn is_transport_name(name: &str) -> bool {
    TRANSPORT_ERROR_NAMES.contains(&name)
}

/// Await a proxy call under a deadline and classify its failure.
pub(crate) async fn call<T, F>(method: &'static str, deadline: Duration, fut: F) -> Result<T>
where
    F: Future<Output = zbus::Result<T>>,
{
    debug!("Calling {}", method);
    match tokio::time::timeout(deadline, fut).await {
        Ok(reply) => reply.map_err(|e| VdrError::from_call(method, e)),
        Err(_) => Err(VdrError::Timeout {
            method,
            after: deadline,
        }),
    }
}
