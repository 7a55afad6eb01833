//! Privileged access to the devices of a seat.

use std::fmt::{self, Debug};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// A privileged session on a seat, through which hardware backends open devices.
///
/// Opening a session usually means talking to logind or seatd. This crate
/// does not do that itself: sessions are created by a
/// [`BackendProvider`](super::BackendProvider).
pub trait Session: Debug {
    /// The name of the seat this session runs on.
    fn seat(&self) -> &str;

    /// Whether the session currently has control of its devices.
    fn is_active(&self) -> bool {
        true
    }

    /// Enumerates the GPUs available to the session, at most `max` of them.
    ///
    /// The first device returned should be the boot GPU, if there is one.
    fn find_gpus(&self, max: usize) -> Vec<GpuDevice>;
}

/// A shared handle to a [`Session`].
///
/// The session is closed when the last handle is dropped.
pub type SessionHandle = Rc<dyn Session>;

/// A GPU found by a [`Session`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GpuDevice {
    path: PathBuf,
}

impl GpuDevice {
    /// Creates a new device for the DRM node at `path`.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// The path of the DRM node, e.g. `/dev/dri/card0`.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for GpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}
