//! JSON-RPC 2.0 over a single WebSocket.
//!
//! One driver task owns the socket. Callers hand it requests through an
//! mpsc channel and wait on a oneshot for the matching response, so any
//! number of calls can be in flight at once over one connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Reply = oneshot::Sender<Result<Value, RpcError>>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RpcError {
    #[error("connection failed: {message}")]
    Connect { message: String },

    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("connection closed before a response arrived")]
    Closed,

    #[error("remote error {code}: {message}")]
    Remote { code: i64, message: String },

    #[error("malformed response: {message}")]
    Protocol { message: String },
}

struct Request {
    id: u64,
    payload: String,
    reply: Reply,
}

#[derive(Deserialize)]
struct ErrorObject {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// Handle to a JSON-RPC connection. Dropping it closes the socket once
/// in-flight calls have been answered.
pub struct RpcClient {
    outgoing: mpsc::UnboundedSender<Request>,
    next_id: AtomicU64,
}

impl RpcClient {
    /// Open a WebSocket to `url` (`ws://` or `wss://`) and start the driver.
    pub async fn connect(url: &str) -> Result<Self, RpcError> {
        let (socket, _) = connect_async(url).await.map_err(|e| RpcError::Connect {
            message: e.to_string(),
        })?;
        tracing::debug!(url, "websocket connected");

        let (outgoing, requests) = mpsc::unbounded_channel();
        tokio::spawn(drive(socket, requests));

        Ok(Self {
            outgoing,
            next_id: AtomicU64::new(1),
        })
    }

    /// Call `method` and wait for its result.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        })
        .to_string();

        tracing::trace!(id, method, "rpc call");
        let (reply, response) = oneshot::channel();
        self.outgoing
            .send(Request { id, payload, reply })
            .map_err(|_| RpcError::Closed)?;

        response.await.map_err(|_| RpcError::Closed)?
    }
}

async fn drive(socket: Socket, mut requests: mpsc::UnboundedReceiver<Request>) {
    let (mut sink, mut stream) = socket.split();
    let mut pending: HashMap<u64, Reply> = HashMap::new();
    let mut accepting = true;

    loop {
        tokio::select! {
            request = requests.recv(), if accepting => match request {
                Some(Request { id, payload, reply }) => {
                    match sink.send(Message::Text(payload)).await {
                        Ok(()) => {
                            pending.insert(id, reply);
                        }
                        Err(e) => {
                            let _ = reply.send(Err(RpcError::Transport { message: e.to_string() }));
                        }
                    }
                }
                None => {
                    accepting = false;
                    if pending.is_empty() {
                        break;
                    }
                }
            },
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    dispatch(&text, &mut pending);
                    if !accepting && pending.is_empty() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::debug!("websocket closed by peer");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "websocket error");
                    break;
                }
            },
        }
    }

    let _ = sink.close().await;
    for (_, reply) in pending.drain() {
        let _ = reply.send(Err(RpcError::Closed));
    }
}

/// Route one incoming frame to the caller waiting on its id. Frames
/// without a numeric id are server notifications and are ignored.
fn dispatch(text: &str, pending: &mut HashMap<u64, Reply>) {
    let frame: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable frame from server");
            return;
        }
    };
    let Some(id) = frame.get("id").and_then(Value::as_u64) else {
        return;
    };
    let Some(reply) = pending.remove(&id) else {
        tracing::debug!(id, "response for unknown request");
        return;
    };
    let _ = reply.send(into_result(frame));
}

fn into_result(mut frame: Value) -> Result<Value, RpcError> {
    match frame.get_mut("error").map(Value::take) {
        Some(Value::Null) | None => {}
        Some(error) => {
            let err: ErrorObject =
                serde_json::from_value(error).map_err(|e| RpcError::Protocol {
                    message: format!("bad error object: {e}"),
                })?;
            return Err(RpcError::Remote {
                code: err.code,
                message: err.message,
            });
        }
    }
    match frame.get_mut("result") {
        Some(result) => Ok(result.take()),
        None => Err(RpcError::Protocol {
            message: "response has neither result nor error".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_one(id: u64) -> (HashMap<u64, Reply>, oneshot::Receiver<Result<Value, RpcError>>) {
        let (tx, rx) = oneshot::channel();
        let mut pending = HashMap::new();
        pending.insert(id, tx);
        (pending, rx)
    }

    #[test]
    fn dispatch_routes_result_by_id() {
        let (mut pending, mut rx) = pending_one(7);
        dispatch(r#"{"jsonrpc":"2.0","id":7,"result":{"ok":true}}"#, &mut pending);
        assert!(pending.is_empty());
        assert_eq!(rx.try_recv().unwrap(), Ok(json!({"ok": true})));
    }

    #[test]
    fn dispatch_maps_remote_error() {
        let (mut pending, mut rx) = pending_one(3);
        dispatch(
            r#"{"jsonrpc":"2.0","id":3,"error":{"code":2,"message":"invalid credentials"}}"#,
            &mut pending,
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            Err(RpcError::Remote {
                code: 2,
                message: "invalid credentials".into()
            })
        );
    }

    #[test]
    fn dispatch_ignores_notifications_and_garbage() {
        let (mut pending, mut rx) = pending_one(1);
        dispatch(r#"{"jsonrpc":"2.0","method":"all","params":{}}"#, &mut pending);
        dispatch("not json", &mut pending);
        dispatch(r#"{"jsonrpc":"2.0","id":99,"result":1}"#, &mut pending);
        assert_eq!(pending.len(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn null_result_is_a_result() {
        let (mut pending, mut rx) = pending_one(4);
        dispatch(r#"{"jsonrpc":"2.0","id":4,"result":null}"#, &mut pending);
        assert_eq!(rx.try_recv().unwrap(), Ok(Value::Null));
    }

    #[test]
    fn missing_result_is_protocol_error() {
        let (mut pending, mut rx) = pending_one(5);
        dispatch(r#"{"jsonrpc":"2.0","id":5}"#, &mut pending);
        assert!(matches!(
            rx.try_recv().unwrap(),
            Err(RpcError::Protocol { .. })
        ));
    }
}
