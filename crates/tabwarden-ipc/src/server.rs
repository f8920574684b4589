//! Native-messaging server
//!
//! The browser launches the service with the extension on the other end of
//! stdin/stdout. A reader task decodes inbound frames and routes them: popup
//! requests go to the service loop, everything else to the browser host. A
//! writer task serializes outbound frames in order.

use std::sync::Arc;
use tabwarden_api::{InboundFrame, OutboundFrame, Request, Response};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, warn};

use crate::{IpcError, read_frame, write_message};

/// Message from the extension to the service loop
#[derive(Debug)]
pub enum ServerMessage {
    Request(Request),
    /// The extension closed the connection; the browser is shutting us down
    Disconnected,
}

/// Handle for queuing frames to the extension
pub type OutboundSender = mpsc::UnboundedSender<OutboundFrame>;

/// Native-messaging server
pub struct IpcServer {
    outbound_tx: OutboundSender,
    message_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<ServerMessage>>>>,
    host_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<InboundFrame>>>>,
}

impl IpcServer {
    /// Serve over the process's stdin/stdout
    pub fn stdio() -> Self {
        Self::start(tokio::io::stdin(), tokio::io::stdout())
    }

    /// Spawn the reader and writer tasks over an arbitrary byte stream
    pub fn start<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let (host_tx, host_rx) = mpsc::unbounded_channel();

        tokio::spawn(read_loop(reader, message_tx, host_tx));
        tokio::spawn(write_loop(writer, outbound_rx));

        info!("Native-messaging server started");

        Self {
            outbound_tx,
            message_rx: Arc::new(Mutex::new(Some(message_rx))),
            host_rx: Arc::new(Mutex::new(Some(host_rx))),
        }
    }

    /// Get receiver for popup requests and disconnection
    pub async fn take_message_receiver(&self) -> Option<mpsc::UnboundedReceiver<ServerMessage>> {
        self.message_rx.lock().await.take()
    }

    /// Get receiver for tab events and query replies, consumed by the browser host
    pub async fn take_host_receiver(&self) -> Option<mpsc::UnboundedReceiver<InboundFrame>> {
        self.host_rx.lock().await.take()
    }

    /// Sender for outbound frames
    pub fn sender(&self) -> OutboundSender {
        self.outbound_tx.clone()
    }

    /// Send a response to a popup request
    pub fn send_response(&self, response: Response) -> Result<(), IpcError> {
        self.outbound_tx
            .send(OutboundFrame::Response { response })
            .map_err(|_| IpcError::ConnectionClosed)
    }
}

async fn read_loop<R>(
    mut reader: R,
    message_tx: mpsc::UnboundedSender<ServerMessage>,
    host_tx: mpsc::UnboundedSender<InboundFrame>,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let body = match read_frame(&mut reader).await {
            Ok(Some(body)) => body,
            Ok(None) => {
                debug!("Extension disconnected (EOF)");
                break;
            }
            Err(e) => {
                // A bad length prefix leaves the stream unsynchronized
                error!(error = %e, "Failed to read frame");
                break;
            }
        };

        match serde_json::from_slice::<InboundFrame>(&body) {
            Ok(InboundFrame::Request { request }) => {
                let _ = message_tx.send(ServerMessage::Request(request));
            }
            Ok(frame) => {
                let _ = host_tx.send(frame);
            }
            Err(e) => {
                warn!(error = %e, len = body.len(), "Invalid frame");
            }
        }
    }

    let _ = message_tx.send(ServerMessage::Disconnected);
}

async fn write_loop<W>(mut writer: W, mut outbound_rx: mpsc::UnboundedReceiver<OutboundFrame>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = outbound_rx.recv().await {
        match write_message(&mut writer, &frame).await {
            Ok(()) => {}
            Err(IpcError::FrameTooLarge { size, limit }) => {
                warn!(size, limit, "Dropping oversized outbound frame");
            }
            Err(e) => {
                debug!(error = %e, "Write error");
                break;
            }
        }
    }
}
