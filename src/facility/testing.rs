//! Stand-in dbus2vdr objects reached over an in-process peer-to-peer connection.

use std::os::unix::net::UnixStream;
use std::sync::{Arc, Mutex};
use zbus::connection::Builder;
use zbus::zvariant::Value;
use zbus::{Connection, Guid};

/// Calls seen by the stand-in objects, in arrival order.
#[derive(Clone, Default)]
pub(crate) struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub(crate) fn push(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, call: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|c| *c == call).count()
    }
}

/// Connect a client to a server whose objects are registered by `serve`.
///
/// Returns `(client, server)`; the server connection must outlive the test.
pub(crate) async fn connect<F>(serve: F) -> (Connection, Connection)
where
    F: FnOnce(Builder<'static>) -> zbus::Result<Builder<'static>>,
{
    let (client, server) = UnixStream::pair().unwrap();
    let server = Builder::unix_stream(server)
        .server(Guid::generate())
        .unwrap()
        .p2p();
    let server = serve(server).unwrap();
    let client = Builder::unix_stream(client).p2p();

    futures_util::try_join!(client.build(), server.build()).unwrap()
}

/// Short rendering of a variant argument for the call log.
pub(crate) fn describe(value: &Value<'_>) -> String {
    match value {
        Value::I32(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Str(s) => s.as_str().to_string(),
        other => format!("{:?}", other),
    }
}
