//! JSON-lines transport for the method channel.
//!
//! Each request line gets exactly one response line, in order. OS calls run on
//! the blocking pool and are bounded by the configured timeout.

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use nowplaying_core::{parse_request, MediaBridge, Method, MethodCall, MethodResponse};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{debug, error, info, warn};

const MAX_LINE_LENGTH: usize = 64 * 1024;

#[derive(Clone)]
pub struct ChannelServer {
    bridge: Arc<MediaBridge>,
    call_timeout: Duration,
}

impl ChannelServer {
    pub fn new(bridge: Arc<MediaBridge>, call_timeout: Duration) -> Self {
        Self {
            bridge,
            call_timeout,
        }
    }

    /// Answer one parsed call.
    ///
    /// A call that outlives the timeout is answered with the method's
    /// "nothing to report" value; the OS call itself finishes in the
    /// background and its result is dropped.
    pub async fn handle_call(&self, call: MethodCall) -> MethodResponse {
        let method = match call.method.parse::<Method>() {
            Ok(method) => method,
            // Unknown methods never reach the OS
            Err(_) => return self.bridge.respond(&call),
        };

        let bridge = self.bridge.clone();
        let id = call.id.clone();
        let task = tokio::task::spawn_blocking(move || bridge.respond(&call));

        match tokio::time::timeout(self.call_timeout, task).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                error!("{} panicked: {}", method.name(), e);
                MethodResponse::error(id, "fault", format!("{} did not complete", method.name()))
            }
            Err(_) => {
                warn!(
                    "{} timed out after {:?}, answering with fallback",
                    method.name(),
                    self.call_timeout
                );
                MethodResponse::from_reply(id, method.fallback_reply())
            }
        }
    }

    /// Parse and answer one request line
    pub async fn handle_line(&self, line: &str) -> MethodResponse {
        match parse_request(line) {
            Ok(call) => self.handle_call(call).await,
            Err(response) => {
                debug!("Rejected request line: {:?}", line);
                response
            }
        }
    }

    /// Serve requests from `reader` until it closes.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
        let mut out = FramedWrite::new(writer, LinesCodec::new());

        info!("Method channel ready (listener {})", self.bridge.listener());

        let mut resuming = false;
        loop {
            let next = match lines.next().await {
                Some(next) => next,
                // After a decode error the framed stream yields one `None`
                // before it reads on
                None if resuming => {
                    resuming = false;
                    continue;
                }
                None => break,
            };

            let line = match next {
                Ok(line) => {
                    resuming = false;
                    line
                }
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    warn!("Dropping request longer than {} bytes", MAX_LINE_LENGTH);
                    let response = MethodResponse::error(None, "bad_request", "request too long");
                    out.send(serde_json::to_string(&response)?).await?;
                    resuming = true;
                    continue;
                }
                Err(LinesCodecError::Io(e)) => {
                    return Err(e).context("Failed to read request");
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            let response = self.handle_line(&line).await;
            let encoded =
                serde_json::to_string(&response).context("Failed to encode response")?;
            out.send(encoded).await.context("Failed to write response")?;
        }

        info!("Method channel closed");
        Ok(())
    }
}
