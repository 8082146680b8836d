use crate::download::Download;
use crate::notifier::Notifier;
use crate::status::Outcome;
use crate::upload::Upload;

/// Either side of a transfer, realised as an enum rather than a trait object
/// so callers that build one or the other depending on `--upload`/`--download`
/// can still hold a single type and match on the concrete role without
/// dynamic dispatch.
pub enum TransferRole {
    Upload(Upload),
    Download(Download),
}

impl TransferRole {
    /// The notifier, once the underlying transfer has started.
    #[must_use]
    pub fn notifier(&self) -> Option<&Notifier> {
        match self {
            TransferRole::Upload(upload) => upload.notifier(),
            TransferRole::Download(download) => download.notifier(),
        }
    }

    /// Final disposition, regardless of which role ran.
    #[must_use]
    pub fn outcome(&self) -> Outcome {
        match self {
            TransferRole::Upload(upload) => upload.status().outcome(),
            TransferRole::Download(download) => download.status().outcome(),
        }
    }
}

impl From<Upload> for TransferRole {
    fn from(upload: Upload) -> Self {
        TransferRole::Upload(upload)
    }
}

impl From<Download> for TransferRole {
    fn from(download: Download) -> Self {
        TransferRole::Download(download)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransferConfig;

    #[test]
    fn upload_role_delegates_outcome_to_its_status() {
        let upload = Upload::new("alice".into(), TransferConfig::default());
        let role = TransferRole::from(upload);
        assert_eq!(role.outcome(), Outcome::InProgress);
    }

    #[test]
    fn download_role_delegates_outcome_to_its_status() {
        let download = Download::new(TransferConfig::default());
        let role = TransferRole::from(download);
        assert_eq!(role.outcome(), Outcome::InProgress);
    }
}
