use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::process::CommandExt;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::stream::IpcStream;

/// Environment variable carrying the inherited channel descriptor number.
pub const CHANNEL_FD_ENV: &str = "SUBIPC_CHANNEL_FD";

/// Environment variable carrying the serialization profile (`advanced` | `json`).
pub const SERIALIZATION_ENV: &str = "SUBIPC_SERIALIZATION";

static ADOPTED: AtomicBool = AtomicBool::new(false);

/// The subprocess end of a channel socket pair.
///
/// The descriptor stays close-on-exec in this process, so programs spawned
/// by other threads never inherit it. [`ChildEnd::configure`] makes it
/// inheritable for one command only. Drop it in the parent once the
/// subprocess has started.
#[derive(Debug)]
pub struct ChildEnd {
    fd: OwnedFd,
}

impl ChildEnd {
    /// Environment entry announcing this descriptor to the subprocess.
    pub fn env_var(&self) -> (&'static str, String) {
        (CHANNEL_FD_ENV, self.fd.as_raw_fd().to_string())
    }

    /// Pass this end to the program `command` will spawn.
    ///
    /// Sets [`CHANNEL_FD_ENV`] and clears close-on-exec in the forked child
    /// just before `exec`, leaving the parent's descriptor untouched.
    pub fn configure<'a>(&self, command: &'a mut Command) -> &'a mut Command {
        let (var, value) = self.env_var();
        let fd = self.fd.as_raw_fd();
        command.env(var, value);
        // SAFETY: the hook only calls fcntl, which is async-signal-safe, on a
        // descriptor the forked child inherited from this process.
        unsafe {
            command.pre_exec(move || set_cloexec(fd, false));
        }
        command
    }
}

impl AsRawFd for ChildEnd {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

/// Create a socket pair: an async parent end and the end to hand to a
/// subprocess through [`ChildEnd::configure`].
///
/// Must be called inside a tokio runtime.
pub fn ipc_pair() -> Result<(IpcStream, ChildEnd)> {
    let (parent, child) = std::os::unix::net::UnixStream::pair()?;
    let parent = IpcStream::from_std(parent)?;
    debug!(fd = child.as_raw_fd(), "created channel socket pair");
    Ok((
        parent,
        ChildEnd {
            fd: OwnedFd::from(child),
        },
    ))
}

impl IpcStream {
    /// Adopt the channel descriptor inherited from the parent process.
    ///
    /// Returns `Ok(None)` when [`CHANNEL_FD_ENV`] is not set. The descriptor
    /// can be adopted once per process.
    pub fn from_env() -> Result<Option<Self>> {
        let Some(raw) = std::env::var_os(CHANNEL_FD_ENV) else {
            return Ok(None);
        };
        let value = raw.to_string_lossy().into_owned();
        let fd = parse_fd(&value)?;

        ensure_socket(fd)?;
        if ADOPTED
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(TransportError::AlreadyAdopted);
        }
        if let Err(err) = set_cloexec(fd, true) {
            ADOPTED.store(false, Ordering::SeqCst);
            return Err(err.into());
        }

        // SAFETY: `fd` was checked to be an open socket above, and the ADOPTED
        // flag guarantees ownership is taken at most once in this process.
        let stream = unsafe { std::os::unix::net::UnixStream::from_raw_fd(fd) };
        debug!(fd, "adopted inherited channel descriptor");
        Self::from_std(stream).map(Some)
    }
}

fn parse_fd(value: &str) -> Result<RawFd> {
    match value.trim().parse::<RawFd>() {
        Ok(fd) if fd >= 0 => Ok(fd),
        _ => Err(TransportError::InvalidDescriptor {
            var: CHANNEL_FD_ENV,
            value: value.to_string(),
        }),
    }
}

fn ensure_socket(fd: RawFd) -> Result<()> {
    // SAFETY: an all-zero `stat` is a valid value for fstat to overwrite.
    let mut stat: libc::stat = unsafe { std::mem::zeroed() };
    // SAFETY: `stat` is a valid writable pointer; fstat does not retain it.
    let rc = unsafe { libc::fstat(fd, &mut stat) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    if stat.st_mode & libc::S_IFMT != libc::S_IFSOCK {
        return Err(TransportError::NotASocket(fd));
    }
    Ok(())
}

fn set_cloexec(fd: RawFd, enabled: bool) -> std::io::Result<()> {
    // SAFETY: F_GETFD/F_SETFD only touch descriptor flags of an open fd.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags < 0 {
        return Err(std::io::Error::last_os_error());
    }
    let flags = if enabled {
        flags | libc::FD_CLOEXEC
    } else {
        flags & !libc::FD_CLOEXEC
    };
    // SAFETY: see above.
    if unsafe { libc::fcntl(fd, libc::F_SETFD, flags) } < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}
