//! One-shot readiness channel between parent and child.
//!
//! A unidirectional pipe with exactly one sender and one receiver. The
//! child writes a single [`READY_BYTE`] once its setup is complete; the
//! parent blocks until that byte arrives, the pipe closes, or the deadline
//! passes. Both ends are closed when dropped.

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use thiserror::Error;

use nsrun_common::constants::{READY_BYTE, SYNC_FD};
use nsrun_common::error::{NsrunError, Result, SetupStep};

/// Why the parent did not receive the readiness byte.
#[derive(Debug, Error)]
pub enum ReadinessError {
    /// Every write end closed before a byte arrived.
    #[error("child exited or closed the pipe before signaling readiness")]
    Closed,
    /// Something other than the readiness byte arrived.
    #[error("unexpected readiness byte {0:#04x}")]
    UnexpectedByte(u8),
    /// The deadline passed first.
    #[error("no readiness signal within {0:?}")]
    TimedOut(Duration),
    /// Polling or reading the pipe failed.
    #[error("reading readiness pipe failed: {0}")]
    Io(#[from] io::Error),
}

/// Parent-side read end.
#[derive(Debug)]
pub struct ReadinessReceiver {
    file: File,
}

/// Write end. Held by the parent only until the child has been spawned.
#[derive(Debug)]
pub struct ReadinessSender {
    fd: OwnedFd,
}

/// Creates a readiness channel.
///
/// Both descriptors are close-on-exec; the spawner is responsible for
/// placing the write end at [`SYNC_FD`] in the child.
///
/// # Errors
///
/// Returns [`NsrunError::Resource`] if `pipe2(2)` fails.
pub fn channel() -> Result<(ReadinessReceiver, ReadinessSender)> {
    let (read, write) = nix::unistd::pipe2(OFlag::O_CLOEXEC).map_err(|e| NsrunError::Resource {
        step: "create readiness pipe",
        source: e.into(),
    })?;
    tracing::debug!(read = read.as_raw_fd(), write = write.as_raw_fd(), "readiness pipe created");
    Ok((
        ReadinessReceiver {
            file: File::from(read),
        },
        ReadinessSender { fd: write },
    ))
}

impl ReadinessReceiver {
    /// Blocks until the child signals readiness.
    ///
    /// With `timeout` set, gives up once it elapses. Consumes the receiver,
    /// so the read end is closed on every path.
    ///
    /// # Errors
    ///
    /// Returns a [`ReadinessError`] describing what arrived instead of the
    /// readiness byte.
    pub fn wait(mut self, timeout: Option<Duration>) -> std::result::Result<(), ReadinessError> {
        if let Some(timeout) = timeout {
            self.wait_readable(timeout)?;
        }
        let mut byte = [0u8; 1];
        loop {
            match self.file.read(&mut byte) {
                Ok(0) => return Err(ReadinessError::Closed),
                Ok(_) if byte[0] == READY_BYTE => return Ok(()),
                Ok(_) => return Err(ReadinessError::UnexpectedByte(byte[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(ReadinessError::Io(e)),
            }
        }
    }

    fn wait_readable(&self, timeout: Duration) -> std::result::Result<(), ReadinessError> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            let poll_timeout = PollTimeout::try_from(remaining).unwrap_or(PollTimeout::MAX);
            let mut fds = [PollFd::new(self.file.as_fd(), PollFlags::POLLIN)];
            match poll(&mut fds, poll_timeout) {
                Ok(0) => return Err(ReadinessError::TimedOut(timeout)),
                // Readable or hung up; the read distinguishes the two.
                Ok(_) => return Ok(()),
                Err(Errno::EINTR) => {}
                Err(e) => return Err(ReadinessError::Io(e.into())),
            }
        }
    }
}

impl ReadinessSender {
    /// Adopts the write end inherited at [`SYNC_FD`].
    ///
    /// Called once, in the child, before signaling.
    ///
    /// # Errors
    ///
    /// Returns a setup error if no descriptor is open at [`SYNC_FD`].
    pub fn inherited() -> Result<Self> {
        // SAFETY: F_GETFD only inspects the descriptor table.
        if unsafe { libc::fcntl(SYNC_FD, libc::F_GETFD) } == -1 {
            return Err(NsrunError::setup(
                SetupStep::SignalParent,
                io::Error::last_os_error(),
            ));
        }
        // SAFETY: the descriptor is open, and nothing else in this process
        // claims ownership of the inherited slot.
        let fd = unsafe { OwnedFd::from_raw_fd(SYNC_FD) };
        Ok(Self { fd })
    }

    /// Writes the readiness byte and closes the write end.
    ///
    /// # Errors
    ///
    /// Returns a setup error if the write fails.
    pub fn signal(self) -> Result<()> {
        let mut file = File::from(self.fd);
        file.write_all(&[READY_BYTE])
            .map_err(|e| NsrunError::setup(SetupStep::SignalParent, e))?;
        tracing::debug!("parent signaled");
        Ok(())
    }
}

impl AsFd for ReadinessSender {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl AsRawFd for ReadinessSender {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}
