//! Shared state-machine plumbing used by both [`crate::upload::Upload`] and
//! [`crate::download::Download`]: reading the next [`Frame`] off the wire,
//! translating a peer `Error` frame or a closed socket into
//! [`LocalshareError`], and yielding back to the executor once a bounded
//! wall-clock budget has elapsed so a long run of frames never starves the
//! rest of the runtime.

use std::time::{Duration, Instant};

use futures::StreamExt;
use protocol::{Frame, FrameCodec};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;

use crate::error::LocalshareError;

/// Drives the per-message pump shared by both roles: one `next_frame` call
/// per decoded [`Frame`], gated by a wall-clock budget rather than an
/// unconditional yield on every call.
pub(crate) struct MessagePump {
    budget: Duration,
    budget_start: Instant,
}

impl MessagePump {
    /// Builds a pump with the given per-invocation wall-clock budget.
    pub(crate) fn new(budget: Duration) -> Self {
        Self {
            budget,
            budget_start: Instant::now(),
        }
    }

    /// Reads the next frame, yielding to the executor first if this pump's
    /// budget has been exceeded since the last yield.
    pub(crate) async fn next_frame<S>(
        &mut self,
        framed: &mut Framed<S, FrameCodec>,
    ) -> Result<Frame, LocalshareError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if self.budget_start.elapsed() >= self.budget {
            tokio::task::yield_now().await;
            self.budget_start = Instant::now();
        }

        match framed.next().await {
            Some(Ok(Frame::Error(message))) => Err(LocalshareError::PeerReported(message)),
            Some(Ok(frame)) => Ok(frame),
            Some(Err(err)) => Err(err.into()),
            None => Err(LocalshareError::Transport(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "peer closed the connection",
            ))),
        }
    }
}
