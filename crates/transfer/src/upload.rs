use std::path::Path;
use std::time::Instant;

use bytes::{Bytes, BytesMut};
use futures::SinkExt;
use protocol::{Frame, FrameCodec};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;

use crate::base::MessagePump;
use crate::config::TransferConfig;
use crate::error::LocalshareError;
use crate::notifier::{Notifier, ProgressEvent, RateEvent};
use crate::status::UploadStatus;

type ProgressCallback = Box<dyn FnMut(ProgressEvent) + Send>;
type RateCallback = Box<dyn FnMut(RateEvent) + Send>;
type FailedCallback = Box<dyn FnMut(&LocalshareError) + Send>;

/// Sender side of a transfer: `Init -> Starting -> WaitingForPeerAnswer ->
/// Transfering -> {Completed, Rejected, Error}`.
pub struct Upload {
    username: String,
    config: TransferConfig,
    status: UploadStatus,
    manager: Option<payload::Manager>,
    notifier: Option<Notifier>,
    on_progress: Option<ProgressCallback>,
    on_rate: Option<RateCallback>,
    on_failed: Option<FailedCallback>,
    last_error: Option<String>,
}

impl Upload {
    /// Builds an upload that has not yet been given a payload.
    #[must_use]
    pub fn new(username: String, config: TransferConfig) -> Self {
        Self {
            username,
            config,
            status: UploadStatus::Init,
            manager: None,
            notifier: None,
            on_progress: None,
            on_rate: None,
            on_failed: None,
            last_error: None,
        }
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> &UploadStatus {
        &self.status
    }

    /// The notifier, once the transfer has started.
    #[must_use]
    pub fn notifier(&self) -> Option<&Notifier> {
        self.notifier.as_ref()
    }

    /// Message of the error that ended the transfer, if it ended in
    /// [`UploadStatus::Error`].
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Registers a progress callback, wired into the [`Notifier`] once
    /// [`Upload::run`] creates it. Must be called before `run`.
    pub fn on_progress(&mut self, callback: impl FnMut(ProgressEvent) + Send + 'static) {
        self.on_progress = Some(Box::new(callback));
    }

    /// Registers an instant-rate callback, wired into the [`Notifier`] once
    /// [`Upload::run`] creates it. Must be called before `run`.
    pub fn on_rate(&mut self, callback: impl FnMut(RateEvent) + Send + 'static) {
        self.on_rate = Some(Box::new(callback));
    }

    /// Registers the callback invoked with the last error once the transfer
    /// ends in [`UploadStatus::Error`]. Must be called before `run`.
    pub fn on_failed(&mut self, callback: impl FnMut(&LocalshareError) + Send + 'static) {
        self.on_failed = Some(Box::new(callback));
    }

    /// Builds the payload manager from `path` (see
    /// [`payload::Manager::scan_source`]). Moves `Init -> Starting`.
    pub async fn set_payload(&mut self, path: &Path) -> Result<(), LocalshareError> {
        let manager = payload::Manager::scan_source(path, self.config.ignore_hidden).await?;
        self.manager = Some(manager);
        self.status = UploadStatus::Starting;
        Ok(())
    }

    /// Runs the handshake, offer, and (if accepted) the full chunked send
    /// over an already-connected, already-handshaken duplex stream.
    /// Returns `self` so the caller can inspect the final status and
    /// notifier after the socket closes. On failure, `status` transitions
    /// to [`UploadStatus::Error`], `last_error` is set, and any registered
    /// `on_failed` callback fires before the error is returned.
    pub async fn run<S>(mut self, stream: S) -> Result<Self, LocalshareError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match self.run_body(stream).await {
            Ok(()) => Ok(self),
            Err(err) => {
                let message = err.to_string();
                if let Some(callback) = &mut self.on_failed {
                    callback(&err);
                }
                self.last_error = Some(message.clone());
                self.status = UploadStatus::Error(message);
                Err(err)
            }
        }
    }

    async fn run_body<S>(&mut self, mut stream: S) -> Result<(), LocalshareError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let manager = self
            .manager
            .as_ref()
            .ok_or(LocalshareError::InvalidOperation("run (no payload set)"))?;
        let manifest = manager.manifest();

        crate::handshake::perform(&mut stream).await?;

        let mut framed = Framed::new(stream, FrameCodec::new());
        framed
            .send(Frame::Offer {
                username: self.username.clone(),
                manifest,
            })
            .await?;
        self.status = UploadStatus::WaitingForPeerAnswer;

        let mut pump = MessagePump::new(self.config.max_work);
        match pump.next_frame(&mut framed).await? {
            Frame::Accept => {}
            Frame::Reject => {
                self.status = UploadStatus::Rejected;
                return Ok(());
            }
            other => {
                return Err(LocalshareError::IllegalMessage {
                    received: other.kind_name(),
                    state: "WaitingForPeerAnswer",
                })
            }
        }

        tracing::info!("offer accepted, starting upload");
        let manager = self.manager.as_mut().expect("checked above");
        manager.start_sending()?;
        let mut notifier = Notifier::new(manager.total_size());
        if let Some(callback) = self.on_progress.take() {
            notifier.on_progress(callback);
        }
        if let Some(callback) = self.on_rate.take() {
            notifier.on_rate(callback);
        }
        self.status = UploadStatus::Transfering;

        // Refill policy (see TransferConfig): batch chunks into the sink with
        // `feed` rather than flushing every one, and only actually flush (and
        // yield to the executor) once the outgoing buffer reaches
        // `write_buffer_size` or this burst has run past `max_work`.
        let mut queued_bytes: u64 = 0;
        let mut budget_start = Instant::now();

        while !manager.is_complete() {
            let mut buf = BytesMut::new();
            manager.send_next_chunk(&mut buf)?;
            if !buf.is_empty() {
                let chunk_len = buf.len() as u64;
                framed.feed(Frame::Chunk(buf.freeze())).await?;
                queued_bytes += chunk_len;
                notifier.probe(manager.total_transferred());
            }

            let finished = manager.take_pending_checksums();
            if !finished.is_empty() {
                let digests: Vec<Bytes> = finished
                    .into_iter()
                    .map(|c| Bytes::copy_from_slice(&c.digest))
                    .collect();
                framed.feed(Frame::Checksums(digests)).await?;
            }

            // Keeps instant_rate flowing even on a run of empty files, where
            // no chunk (and so no probe) fires for a while.
            notifier.tick(manager.total_transferred());

            if queued_bytes >= self.config.write_buffer_size || budget_start.elapsed() >= self.config.max_work {
                framed.flush().await?;
                queued_bytes = 0;
                budget_start = Instant::now();
                tokio::task::yield_now().await;
            }
        }
        framed.flush().await?;

        loop {
            match pump.next_frame(&mut framed).await? {
                Frame::Completed => break,
                other => {
                    return Err(LocalshareError::IllegalMessage {
                        received: other.kind_name(),
                        state: "Transfering (awaiting Completed)",
                    })
                }
            }
        }

        notifier.transfer_end(manager.total_transferred());
        self.notifier = Some(notifier);
        self.status = UploadStatus::Completed;
        tracing::info!(bytes = manager.total_size(), "upload completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_without_payload_fails_and_reports_to_on_failed() {
        use std::sync::{Arc, Mutex};

        let reported = Arc::new(Mutex::new(None));
        let reported_clone = reported.clone();

        let mut upload = Upload::new("alice".into(), TransferConfig::default());
        upload.on_failed(move |err| {
            *reported_clone.lock().unwrap() = Some(err.to_string());
        });

        let (client, _server) = tokio::io::duplex(64);
        let err = upload.run(client).await.unwrap_err();

        assert!(matches!(err, LocalshareError::InvalidOperation(_)));
        assert!(reported.lock().unwrap().is_some());
    }
}
