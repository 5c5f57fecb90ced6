//! TCP-backed channel variant (spec §4.5/§6, optional extension).
//!
//! Grounded in the original's `NetworkChannel` class: a channel declared
//! with two endpoint ids and a runtime-supplied `host:port` + role becomes
//! a TCP-backed channel. Wire framing is a 4-byte big-endian length prefix
//! followed by a UTF-8 JSON payload (spec §6). The listener accepts exactly
//! one peer; the connector retries with a 1-second backoff.

use crate::error::RuntimeError;
use crate::runtime::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Which side of the connection this process plays for a given endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Listen for exactly one incoming connection.
    Bind,
    /// Connect out, retrying with a 1-second backoff on failure.
    Connect,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireValue {
    t: String,
    v: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFrame {
    op: String,
    values: Vec<WireValue>,
}

fn value_to_wire(value: &Value) -> WireValue {
    match value {
        Value::Integer(n) => WireValue {
            t: "INT".to_string(),
            v: serde_json::json!(n),
        },
        Value::Float(f) => WireValue {
            t: "FLOAT".to_string(),
            v: serde_json::json!(f),
        },
        Value::String(s) => WireValue {
            t: "STRING".to_string(),
            v: serde_json::json!(s),
        },
        other => WireValue {
            t: "OBJECT".to_string(),
            v: serde_json::json!(other.display_string()),
        },
    }
}

fn wire_to_value(wire: &WireValue) -> Value {
    match wire.t.as_str() {
        "INT" => Value::Integer(wire.v.as_i64().unwrap_or(0)),
        "FLOAT" => Value::Float(wire.v.as_f64().unwrap_or(0.0)),
        "STRING" => Value::String(wire.v.as_str().unwrap_or_default().to_string()),
        _ => Value::String(wire.v.to_string()),
    }
}

fn write_frame(stream: &mut TcpStream, values: &[Value]) -> std::io::Result<()> {
    let frame = WireFrame {
        op: "send".to_string(),
        values: values.iter().map(value_to_wire).collect(),
    };
    let body = serde_json::to_vec(&frame)?;
    let len = u32::try_from(body.len()).unwrap_or(u32::MAX);
    stream.write_all(&len.to_be_bytes())?;
    stream.write_all(&body)?;
    stream.flush()
}

fn read_frame(stream: &mut TcpStream) -> std::io::Result<Vec<Value>> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf) as usize;
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body)?;
    let frame: WireFrame = serde_json::from_slice(&body)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    Ok(frame.values.iter().map(wire_to_value).collect())
}

/// A TCP-backed channel. Received frames are decoded and enqueued into a
/// local queue so `receive` drains network traffic identically to
/// in-process traffic (spec §4.5).
#[derive(Debug)]
pub struct NetworkChannel {
    inbox: Mutex<VecDeque<Vec<Value>>>,
    not_empty: Condvar,
    outbound: Mutex<TcpStream>,
}

impl NetworkChannel {
    /// Establishes the connection per `role` and spawns the background
    /// reader thread. Blocks until the connection (or the first accept) is
    /// established.
    ///
    /// # Errors
    /// Returns [`RuntimeError::Network`] if binding/connecting fails after
    /// the connector's retries, or the address can't be parsed.
    pub fn establish(addr: &str, role: Role) -> Result<Arc<Self>, RuntimeError> {
        let stream = match role {
            Role::Bind => {
                let listener = TcpListener::bind(addr)
                    .map_err(|e| RuntimeError::Network(format!("bind {addr}: {e}")))?;
                debug!(%addr, "network channel listening");
                let (stream, peer) = listener
                    .accept()
                    .map_err(|e| RuntimeError::Network(format!("accept on {addr}: {e}")))?;
                debug!(%peer, "network channel accepted peer");
                stream
            }
            Role::Connect => {
                let mut attempt = 0u32;
                loop {
                    match TcpStream::connect(addr) {
                        Ok(stream) => {
                            debug!(%addr, "network channel connected");
                            break stream;
                        }
                        Err(e) => {
                            attempt += 1;
                            warn!(%addr, attempt, error = %e, "network channel connect failed, retrying");
                            std::thread::sleep(Duration::from_secs(1));
                        }
                    }
                }
            }
        };
        let reader_stream = stream
            .try_clone()
            .map_err(|e| RuntimeError::Network(format!("clone stream: {e}")))?;
        let channel = Arc::new(NetworkChannel {
            inbox: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
            outbound: Mutex::new(stream),
        });
        let reader_channel = Arc::clone(&channel);
        std::thread::spawn(move || reader_channel.reader_loop(reader_stream));
        Ok(channel)
    }

    fn reader_loop(&self, mut stream: TcpStream) {
        loop {
            match read_frame(&mut stream) {
                Ok(values) => {
                    let mut inbox = self.inbox.lock().expect("network inbox lock poisoned");
                    inbox.push_back(values);
                    self.not_empty.notify_one();
                }
                Err(e) => {
                    debug!(error = %e, "network channel reader stopped");
                    return;
                }
            }
        }
    }

    /// Sends one tuple over the wire.
    pub fn send(&self, values: Vec<Value>) {
        let mut stream = self.outbound.lock().expect("network outbound lock poisoned");
        if let Err(e) = write_frame(&mut stream, &values) {
            warn!(error = %e, "network channel send failed");
        }
    }

    /// Blocks until a tuple has been received from the peer and decoded.
    #[must_use]
    pub fn receive(&self) -> Vec<Value> {
        let mut inbox = self.inbox.lock().expect("network inbox lock poisoned");
        while inbox.is_empty() {
            inbox = self
                .not_empty
                .wait(inbox)
                .expect("network condvar wait poisoned");
        }
        inbox.pop_front().expect("just checked non-empty")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_then_connect_exchanges_one_frame() {
        let addr = "127.0.0.1:0";
        let listener = TcpListener::bind(addr).unwrap();
        let real_addr = listener.local_addr().unwrap();
        drop(listener);

        let addr_string = real_addr.to_string();
        let server_addr = addr_string.clone();
        let server = std::thread::spawn(move || NetworkChannel::establish(&server_addr, Role::Bind));
        std::thread::sleep(Duration::from_millis(50));
        let client = NetworkChannel::establish(&addr_string, Role::Connect).unwrap();
        let server = server.join().unwrap().unwrap();

        client.send(vec![Value::Integer(42), Value::String("hi".to_string())]);
        let received = server.receive();
        assert_eq!(received, vec![Value::Integer(42), Value::String("hi".to_string())]);
    }
}
