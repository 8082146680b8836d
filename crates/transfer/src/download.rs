use std::path::PathBuf;

use bytes::Bytes;
use futures::SinkExt;
use payload::Manifest;
use protocol::{Frame, FrameCodec};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;

use crate::base::MessagePump;
use crate::config::TransferConfig;
use crate::error::LocalshareError;
use crate::notifier::{Notifier, ProgressEvent, RateEvent};
use crate::status::DownloadStatus;

type ProgressCallback = Box<dyn FnMut(ProgressEvent) + Send>;
type RateCallback = Box<dyn FnMut(RateEvent) + Send>;
type FailedCallback = Box<dyn FnMut(&LocalshareError) + Send>;

/// What the caller decided to do with a validated offer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserChoice {
    /// Accept the transfer and start receiving.
    Accept,
    /// Decline the transfer.
    Reject,
}

/// A connection that has completed the handshake and received a validated
/// offer, parked until the caller supplies a `target_dir` and a
/// [`UserChoice`] via [`Download::give_user_choice`].
pub struct PendingOffer<S> {
    framed: Framed<S, FrameCodec>,
    manifest: Manifest,
}

impl<S> PendingOffer<S> {
    /// The manifest offered by the sender, already validated.
    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }
}

/// Receiver side of a transfer: `Starting -> WaitingForOffer ->
/// WaitingForUserChoice -> Transfering -> {Completed, Rejected, Error}`.
pub struct Download {
    config: TransferConfig,
    status: DownloadStatus,
    manager: Option<payload::Manager>,
    notifier: Option<Notifier>,
    peer_username: Option<String>,
    on_progress: Option<ProgressCallback>,
    on_rate: Option<RateCallback>,
    on_failed: Option<FailedCallback>,
    last_error: Option<String>,
}

impl Download {
    /// Builds a download that has not yet seen a connection.
    #[must_use]
    pub fn new(config: TransferConfig) -> Self {
        Self {
            config,
            status: DownloadStatus::Starting,
            manager: None,
            notifier: None,
            peer_username: None,
            on_progress: None,
            on_rate: None,
            on_failed: None,
            last_error: None,
        }
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> &DownloadStatus {
        &self.status
    }

    /// The notifier, once the transfer has started.
    #[must_use]
    pub fn notifier(&self) -> Option<&Notifier> {
        self.notifier.as_ref()
    }

    /// Username of the sending peer, once the offer has arrived.
    #[must_use]
    pub fn peer_username(&self) -> Option<&str> {
        self.peer_username.as_deref()
    }

    /// Message of the error that ended the transfer, if it ended in
    /// [`DownloadStatus::Error`].
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Registers a progress callback, wired into the [`Notifier`] once
    /// [`Download::give_user_choice`] creates it. Must be called before
    /// accepting.
    pub fn on_progress(&mut self, callback: impl FnMut(ProgressEvent) + Send + 'static) {
        self.on_progress = Some(Box::new(callback));
    }

    /// Registers an instant-rate callback, wired into the [`Notifier`] once
    /// [`Download::give_user_choice`] creates it. Must be called before
    /// accepting.
    pub fn on_rate(&mut self, callback: impl FnMut(RateEvent) + Send + 'static) {
        self.on_rate = Some(Box::new(callback));
    }

    /// Registers the callback invoked with the last error once the transfer
    /// ends in [`DownloadStatus::Error`]. Must be called before
    /// [`Download::wait_for_offer`].
    pub fn on_failed(&mut self, callback: impl FnMut(&LocalshareError) + Send + 'static) {
        self.on_failed = Some(Box::new(callback));
    }

    fn fail(&mut self, err: LocalshareError) -> LocalshareError {
        let message = err.to_string();
        if let Some(callback) = &mut self.on_failed {
            callback(&err);
        }
        self.last_error = Some(message.clone());
        self.status = DownloadStatus::Error(message);
        err
    }

    /// Performs the handshake and waits for the sender's `Offer`, validating
    /// it before returning. The caller inspects [`PendingOffer::manifest`]
    /// (e.g. to prompt a human) before calling [`Download::give_user_choice`].
    /// On failure, `status` transitions to [`DownloadStatus::Error`],
    /// `last_error` is set, and any registered `on_failed` callback fires.
    pub async fn wait_for_offer<S>(&mut self, stream: S) -> Result<PendingOffer<S>, LocalshareError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match self.wait_for_offer_body(stream).await {
            Ok(pending) => Ok(pending),
            Err(err) => Err(self.fail(err)),
        }
    }

    async fn wait_for_offer_body<S>(&mut self, mut stream: S) -> Result<PendingOffer<S>, LocalshareError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        crate::handshake::perform(&mut stream).await?;
        self.status = DownloadStatus::WaitingForOffer;

        let mut framed = Framed::new(stream, FrameCodec::new());
        let mut pump = MessagePump::new(self.config.max_work);
        let (username, manifest) = match pump.next_frame(&mut framed).await? {
            Frame::Offer { username, manifest } => (username, manifest),
            other => {
                return Err(LocalshareError::IllegalMessage {
                    received: other.kind_name(),
                    state: "WaitingForOffer",
                })
            }
        };
        self.peer_username = Some(username);

        if let Err(err) = validate_offer(&manifest) {
            framed.send(Frame::Error(err.to_string())).await.ok();
            return Err(err);
        }
        self.status = DownloadStatus::WaitingForUserChoice;
        tracing::info!(peer = %self.peer_username.as_deref().unwrap_or("?"), "received offer");

        Ok(PendingOffer { framed, manifest })
    }

    /// Sends `Reject` or `Accept` and, if accepted, drives the rest of the
    /// transfer (placing files under `target_dir`) until `Completed` has
    /// been sent. On failure, `status` transitions to
    /// [`DownloadStatus::Error`], `last_error` is set, and any registered
    /// `on_failed` callback fires before the error is returned.
    pub async fn give_user_choice<S>(
        mut self,
        pending: PendingOffer<S>,
        choice: UserChoice,
        target_dir: PathBuf,
    ) -> Result<Self, LocalshareError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match self.give_user_choice_body(pending, choice, target_dir).await {
            Ok(()) => Ok(self),
            Err(err) => Err(self.fail(err)),
        }
    }

    async fn give_user_choice_body<S>(
        &mut self,
        pending: PendingOffer<S>,
        choice: UserChoice,
        target_dir: PathBuf,
    ) -> Result<(), LocalshareError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let PendingOffer { mut framed, manifest } = pending;

        if choice == UserChoice::Reject {
            framed.send(Frame::Reject).await?;
            self.status = DownloadStatus::Rejected;
            return Ok(());
        }

        framed.send(Frame::Accept).await?;

        let mut manager = payload::Manager::from_manifest(&manifest, target_dir);
        manager.start_receiving()?;
        let mut notifier = Notifier::new(manager.total_size());
        if let Some(callback) = self.on_progress.take() {
            notifier.on_progress(callback);
        }
        if let Some(callback) = self.on_rate.take() {
            notifier.on_rate(callback);
        }
        self.status = DownloadStatus::Transfering;

        let mut pump = MessagePump::new(self.config.max_work);
        while !manager.is_complete() {
            match pump.next_frame(&mut framed).await? {
                Frame::Chunk(data) => {
                    manager.receive_chunk(&data)?;
                    notifier.probe(manager.total_transferred());
                }
                Frame::Checksums(digests) => {
                    let digests = to_digest_array(&digests)?;
                    manager.test_checksums(&digests)?;
                }
                other => {
                    return Err(LocalshareError::IllegalMessage {
                        received: other.kind_name(),
                        state: "Transfering",
                    })
                }
            }
            // Checksums-only frames carry no byte progress, so probe() alone
            // would leave instant_rate silent between them.
            notifier.tick(manager.total_transferred());
        }

        framed.send(Frame::Completed).await?;
        notifier.transfer_end(manager.total_transferred());
        tracing::info!(bytes = manager.total_size(), "download completed");
        self.notifier = Some(notifier);
        self.manager = Some(manager);
        self.status = DownloadStatus::Completed;
        Ok(())
    }

    /// Convenience wrapper for callers (the CLI's `--yes`, and tests) that
    /// always accept without inspecting the offer first.
    pub async fn run_auto_accept<S>(mut self, stream: S, target_dir: PathBuf) -> Result<Self, LocalshareError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let pending = self.wait_for_offer(stream).await?;
        self.give_user_choice(pending, UserChoice::Accept, target_dir).await
    }
}

fn validate_offer(manifest: &Manifest) -> Result<(), LocalshareError> {
    manifest.validate().map_err(LocalshareError::from)
}

fn to_digest_array(digests: &[Bytes]) -> Result<Vec<[u8; checksums::DIGEST_LEN]>, LocalshareError> {
    digests
        .iter()
        .map(|d| {
            <[u8; checksums::DIGEST_LEN]>::try_from(d.as_ref()).map_err(|_| LocalshareError::IllegalMessage {
                received: "Checksums",
                state: "Transfering (bad digest length)",
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failed_handshake_sets_error_status_and_reports_it() {
        use std::sync::{Arc, Mutex};

        let reported = Arc::new(Mutex::new(None));
        let reported_clone = reported.clone();

        let mut download = Download::new(TransferConfig::default());
        download.on_failed(move |err| {
            *reported_clone.lock().unwrap() = Some(err.to_string());
        });

        let (client, server) = tokio::io::duplex(64);
        drop(client);

        let err = download.wait_for_offer(server).await.unwrap_err();
        assert!(reported.lock().unwrap().is_some());
        assert_eq!(*download.status(), DownloadStatus::Error(err.to_string()));
        assert_eq!(download.last_error(), Some(err.to_string().as_str()));
    }
}
