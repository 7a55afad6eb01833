//! Traits and structs for the backends that feed a compositor with outputs and input devices.
//!
//! A [`Backend`] is a source of outputs and input devices, along with the
//! events announcing them. Backends come in several flavours:
//!
//! - nested backends, which run the compositor as a window inside another
//! Wayland compositor or an X server,
//! - the DRM backend, which drives a GPU directly from a TTY,
//! - the libinput backend, which only provides input devices,
//! - the [headless] and [no-op][noop] backends, which provide virtual outputs
//! and are mostly useful for testing.
//!
//! Any number of backends can be composed into a single [`MultiBackend`], which
//! is what the rest of the compositor drives. [`autocreate`] inspects the
//! environment and builds the appropriate `MultiBackend` for you.
//!
//! ## Destruction
//!
//! A backend is destroyed by dropping it. Every backend owns a [`BackendEvents`],
//! which fires its `destroy` signal when it is dropped, so backends should declare it
//! as their first field: that way the signal fires before any of their other
//! resources are released.
//!
//! [headless]: headless::HeadlessBackend
//! [noop]: noop::NoopBackend

use std::fmt::{self, Debug};

use rustix::time::ClockId;
use smithay::output::Output;
use smithay::utils::signaling::Signaler;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;

use crate::util::IdCounter;

pub mod autocreate;
pub mod headless;
pub mod multi;
pub mod noop;
pub mod provider;
pub mod renderer;
pub mod session;

#[doc(inline)]
pub use autocreate::{autocreate, AutocreateError, MAX_GPUS};
pub use headless::HeadlessBackend;
pub use multi::MultiBackend;
pub use noop::NoopBackend;
pub use provider::{BackendProvider, VirtualBackends};
pub use renderer::{CreateRendererFn, Renderer, RendererContext, RendererError, RendererHandle};
pub use session::{GpuDevice, Session, SessionHandle};

static BACKEND_ID_COUNTER: IdCounter = IdCounter::new();

/// A unique ID associated with a backend.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Ord, Eq, Hash)]
pub struct BackendId(u64);

impl BackendId {
    /// Allocates a new, never before seen ID.
    pub fn new() -> Self {
        Self(BACKEND_ID_COUNTER.next())
    }

    /// The raw value of the ID.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl Default for BackendId {
    fn default() -> Self {
        Self::new()
    }
}

/// The backends that can be requested by name.
///
/// The names are the lowercase variant names, e.g. `"wayland"` or `"drm"`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum BackendKind {
    /// Runs as a window inside another Wayland compositor.
    Wayland,
    /// Runs as a window inside an X server.
    X11,
    /// Virtual outputs backed by offscreen buffers.
    Headless,
    /// Virtual outputs that do nothing at all.
    Noop,
    /// Input devices through libinput.
    Libinput,
    /// Outputs on a GPU driven directly through DRM.
    Drm,
}

impl BackendKind {
    /// The order in which requested backends are created, regardless of the
    /// order they were requested in.
    pub const COMPOSITION_ORDER: [BackendKind; 6] = [
        BackendKind::X11,
        BackendKind::Wayland,
        BackendKind::Noop,
        BackendKind::Libinput,
        BackendKind::Drm,
        BackendKind::Headless,
    ];

    /// Whether the backend needs direct access to devices through a [`Session`].
    pub fn needs_session(self) -> bool {
        matches!(self, BackendKind::Libinput | BackendKind::Drm)
    }

    /// Whether the backend creates virtual outputs when it is set up.
    pub fn has_virtual_outputs(self) -> bool {
        matches!(self,
            BackendKind::Wayland | BackendKind::X11 | BackendKind::Headless | BackendKind::Noop
        )
    }
}

/// The kind of an input device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "kebab-case")]
#[allow(missing_docs)]
pub enum InputDeviceKind {
    Keyboard,
    Pointer,
    Touch,
    TabletTool,
    TabletPad,
    Switch,
}

/// An input device announced by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputDevice {
    /// The name of the device.
    pub name: String,
    /// What kind of device it is.
    pub kind: InputDeviceKind,
}

impl InputDevice {
    /// Creates a new input device.
    pub fn new<S: Into<String>>(name: S, kind: InputDeviceKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

impl fmt::Display for InputDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.kind)
    }
}

/// The events every backend emits.
///
/// `destroy` fires exactly once, when the `BackendEvents` is dropped.
#[derive(Debug, Default)]
pub struct BackendEvents {
    /// The backend is being destroyed.
    pub destroy: Signaler<()>,
    /// The backend has a new input device.
    pub new_input: Signaler<InputDevice>,
    /// The backend has a new output.
    pub new_output: Signaler<Output>,
}

impl BackendEvents {
    /// Creates a new set of events with no listeners.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Drop for BackendEvents {
    fn drop(&mut self) {
        self.destroy.signal(())
    }
}

/// A source of outputs and input devices.
///
/// Every method except [`id`][Backend::id], [`name`][Backend::name] and
/// [`events`][Backend::events] has a default implementation, so a backend
/// only needs to implement the capabilities it actually has.
///
/// A backend is destroyed by dropping it. See the module-level documentation.
pub trait Backend: Debug {
    /// The ID of this backend.
    fn id(&self) -> BackendId;

    /// The name of the backend, e.g. `"drm"`.
    fn name(&self) -> &str;

    /// The events emitted by this backend.
    fn events(&self) -> &BackendEvents;

    /// Starts the backend, making it emit events for its outputs and input
    /// devices.
    ///
    /// Backends with nothing to start always succeed.
    fn start(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    /// The renderer used by this backend, if it has one.
    fn renderer(&self) -> Option<RendererHandle> {
        None
    }

    /// The session shared by this backend, if it has one.
    fn session(&self) -> Option<SessionHandle> {
        None
    }

    /// The clock the backend uses for presentation timestamps.
    fn presentation_clock(&self) -> ClockId {
        ClockId::Monotonic
    }

    /// Creates a new virtual output.
    ///
    /// Only nested and virtual backends support this.
    fn add_output(&mut self) -> Result<Output, BackendError> {
        Err(BackendError::Unsupported {
            backend: self.name().to_string(),
            operation: "creating outputs",
        })
    }
}

/// Any error raised by a backend.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend does not support the requested operation.
    #[error("{backend} backend does not support {operation}")]
    Unsupported {
        /// The name of the backend.
        backend: String,
        /// The operation that was attempted.
        operation: &'static str,
    },
    /// This kind of backend cannot be created by the provider.
    #[error("{0} backend is not available")]
    Unavailable(BackendKind),
    /// The backend was already added to a `MultiBackend`.
    #[error("backend {0:?} was already added")]
    Duplicate(BackendId),
    /// An error with the privileged session.
    #[error("session error: {0}")]
    Session(String),
    /// A device could not be opened.
    #[error("unable to open device {path}: {reason}")]
    Device {
        /// The path of the device.
        path: String,
        /// Why it could not be opened.
        reason: String,
    },
    /// The backend could not connect to the display server it is nested in.
    #[error("could not connect to host display: {0}")]
    Connection(String),
    /// The renderer could not be created.
    #[error(transparent)]
    Renderer(#[from] RendererError),
    /// The backend failed to start.
    #[error("{backend} backend failed to start: {reason}")]
    Start {
        /// The name of the backend.
        backend: String,
        /// Why it failed.
        reason: String,
    },
}
