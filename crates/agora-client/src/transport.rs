//! HTTP and WebSocket transport for the client.
//!
//! Thin I/O layers: [`HttpApi`] executes the requests the Sans-IO
//! [`crate::Client`] asks for, and [`connect_channel`] opens the persistent
//! channel. Protocol logic stays in the client.

use std::time::Duration;

use agora_proto::{ApiError, ApiRequest, ApiResponse, Method, UserId};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message as WsMessage};

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// URL could not be built.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),
}

/// HTTP client for the Agora service.
#[derive(Debug, Clone)]
pub struct HttpApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpApi {
    /// Client for the service at `base_url`.
    ///
    /// `timeout` bounds each request at the HTTP layer, in addition to the
    /// client's own deadline.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Connection(format!("http client: {e}")))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_owned() })
    }

    /// Execute `request`, authenticating with `token` when given.
    pub async fn execute(&self, request: &ApiRequest, token: Option<&str>) -> Result<ApiResponse, ApiError> {
        let url = format!("{}{}", self.base_url, request.path());
        let method = match request.method() {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
        };

        let mut builder = self.http.request(method, &url);
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = request.body().map_err(|e| ApiError::network(e.to_string()))? {
            builder = builder.json(&body);
        }

        let response = builder.send().await.map_err(|e| ApiError::network(e.to_string()))?;
        let status = response.status();
        let body = response.bytes().await.map_err(|e| ApiError::network(e.to_string()))?;

        if !status.is_success() {
            return Err(ApiError::from_response(status.as_u16(), &body));
        }
        request.decode_response(&body).map_err(|e| ApiError::network(e.to_string()))
    }
}

/// What the channel task reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelSignal {
    /// Text frame from the server.
    Frame(String),
    /// Connection ended without a local close.
    Closed(String),
}

/// Handle to an open channel.
///
/// Frames are sent/received via the channels, and an internal task handles
/// the WebSocket I/O.
pub struct ConnectedChannel {
    /// Send text frames to the server.
    pub to_server: mpsc::Sender<String>,
    /// Receive frames and the final close from the server.
    pub from_server: mpsc::Receiver<ChannelSignal>,
    /// Abort handle to stop the connection task.
    abort_handle: tokio::task::AbortHandle,
}

impl ConnectedChannel {
    /// Stop the connection.
    pub fn stop(&self) {
        self.abort_handle.abort();
    }
}

/// Open the channel at `ws_url` for `user_id`.
pub async fn connect_channel(ws_url: &str, user_id: &UserId) -> Result<ConnectedChannel, TransportError> {
    let url = reqwest::Url::parse_with_params(ws_url, &[("userId", user_id.as_str())])
        .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;

    let (socket, _response) =
        connect_async(url.as_str()).await.map_err(|e| TransportError::Connection(e.to_string()))?;

    let (to_server_tx, to_server_rx) = mpsc::channel::<String>(32);
    let (from_server_tx, from_server_rx) = mpsc::channel::<ChannelSignal>(64);

    let handle = tokio::spawn(run_channel(socket, to_server_rx, from_server_tx));

    Ok(ConnectedChannel {
        to_server: to_server_tx,
        from_server: from_server_rx,
        abort_handle: handle.abort_handle(),
    })
}

/// Bridge between the mpsc channels and the socket.
///
/// Dropping the sender half closes the socket quietly; anything else ending
/// the connection is reported as [`ChannelSignal::Closed`].
async fn run_channel(
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut to_server: mpsc::Receiver<String>,
    from_server: mpsc::Sender<ChannelSignal>,
) {
    let (mut sink, mut stream) = socket.split();

    let reason = loop {
        tokio::select! {
            outbound = to_server.recv() => match outbound {
                Some(text) => {
                    if let Err(e) = sink.send(WsMessage::Text(text)).await {
                        break format!("send failed: {e}");
                    }
                },
                None => {
                    let _ = sink.close().await;
                    return;
                },
            },
            inbound = stream.next() => match inbound {
                Some(Ok(WsMessage::Text(text))) => {
                    if from_server.send(ChannelSignal::Frame(text)).await.is_err() {
                        return;
                    }
                },
                Some(Ok(WsMessage::Close(frame))) => {
                    break frame.map_or_else(|| "closed by server".to_owned(), |f| f.reason.to_string());
                },
                Some(Ok(_)) => {},
                Some(Err(e)) => break e.to_string(),
                None => break "stream ended".to_owned(),
            },
        }
    };

    tracing::debug!(%reason, "channel task exiting");
    let _ = from_server.send(ChannelSignal::Closed(reason)).await;
}
