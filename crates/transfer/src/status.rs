/// Lifecycle status of an [`crate::upload::Upload`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadStatus {
    /// Constructed, payload not yet built.
    Init,
    /// Payload built, socket not yet connected.
    Starting,
    /// Handshake and `Offer` sent, waiting for `Accept`/`Reject`.
    WaitingForPeerAnswer,
    /// Accepted; streaming chunks and checksums.
    Transfering,
    /// Peer sent `Completed`.
    Completed,
    /// Peer sent `Reject`.
    Rejected,
    /// Ended in failure; carries a human-readable reason.
    Error(String),
}

impl UploadStatus {
    /// Final disposition, collapsing every in-progress variant into
    /// [`Outcome::InProgress`].
    #[must_use]
    pub fn outcome(&self) -> Outcome {
        match self {
            UploadStatus::Completed => Outcome::Completed,
            UploadStatus::Rejected => Outcome::Rejected,
            UploadStatus::Error(reason) => Outcome::Error(reason.clone()),
            UploadStatus::Init | UploadStatus::Starting | UploadStatus::WaitingForPeerAnswer | UploadStatus::Transfering => {
                Outcome::InProgress
            }
        }
    }
}

/// Lifecycle status of a [`crate::download::Download`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DownloadStatus {
    /// Constructed, inbound connection not yet accepted.
    Starting,
    /// Handshake done, waiting for the sender's `Offer`.
    WaitingForOffer,
    /// A validated offer is pending the caller's accept/reject decision.
    WaitingForUserChoice,
    /// Accepted; streaming chunks and checksums.
    Transfering,
    /// Every byte and checksum accounted for; `Completed` sent.
    Completed,
    /// The caller rejected the offer.
    Rejected,
    /// Ended in failure; carries a human-readable reason.
    Error(String),
}

impl DownloadStatus {
    /// Final disposition, collapsing every in-progress variant into
    /// [`Outcome::InProgress`].
    #[must_use]
    pub fn outcome(&self) -> Outcome {
        match self {
            DownloadStatus::Completed => Outcome::Completed,
            DownloadStatus::Rejected => Outcome::Rejected,
            DownloadStatus::Error(reason) => Outcome::Error(reason.clone()),
            DownloadStatus::Starting
            | DownloadStatus::WaitingForOffer
            | DownloadStatus::WaitingForUserChoice
            | DownloadStatus::Transfering => Outcome::InProgress,
        }
    }
}

/// Final disposition of a finished transfer, common to both roles' otherwise
/// distinct status enums. Lets [`crate::role::TransferRole`] and its callers
/// match on one shape regardless of which role ran.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The transfer has not reached a terminal state.
    InProgress,
    /// The peer accepted and every byte and checksum was accounted for.
    Completed,
    /// The peer (or caller) declined the offer.
    Rejected,
    /// The transfer ended in failure; carries the last error's message.
    Error(String),
}
