//! Constructors for the individual backends.
//!
//! The nested, libinput and DRM backends depend on system libraries and
//! services, so this crate does not implement them. Instead, [`autocreate`]
//! asks a [`BackendProvider`] to construct each backend it needs. The
//! headless and no-op backends are implemented here, and providers get them
//! for free.
//!
//! [`autocreate`]: super::autocreate

use smithay::reexports::wayland_server::DisplayHandle;

use super::{
    Backend, BackendError, BackendKind, CreateRendererFn,
    GpuDevice, HeadlessBackend, NoopBackend, SessionHandle,
};

/// Constructs backends on behalf of [`autocreate`](super::autocreate).
pub trait BackendProvider {
    /// Opens a privileged session for the hardware backends.
    fn create_session(&self, display: &DisplayHandle) -> Result<SessionHandle, BackendError>;

    /// Creates a backend running as a window inside another Wayland compositor.
    ///
    /// The host compositor is found through `WAYLAND_DISPLAY` or `WAYLAND_SOCKET`.
    fn create_wayland(
        &self,
        display: &DisplayHandle,
        create_renderer: &CreateRendererFn,
    ) -> Result<Box<dyn Backend>, BackendError>;

    /// Creates a backend running as a window inside an X server.
    ///
    /// `x11_display` is the X display to connect to. If it is `None`, the
    /// backend uses `DISPLAY`.
    fn create_x11(
        &self,
        display: &DisplayHandle,
        x11_display: Option<&str>,
        create_renderer: &CreateRendererFn,
    ) -> Result<Box<dyn Backend>, BackendError>;

    /// Creates a backend providing input devices through libinput.
    fn create_libinput(
        &self,
        display: &DisplayHandle,
        session: &SessionHandle,
    ) -> Result<Box<dyn Backend>, BackendError>;

    /// Creates a backend driving the GPU `gpu`.
    ///
    /// `primary` is the backend driving the primary GPU, if one was already
    /// created. Secondary GPUs use it to share buffers with the primary one.
    fn create_drm(
        &self,
        display: &DisplayHandle,
        session: &SessionHandle,
        gpu: &GpuDevice,
        primary: Option<&dyn Backend>,
        create_renderer: &CreateRendererFn,
    ) -> Result<Box<dyn Backend>, BackendError>;

    /// Creates a [`HeadlessBackend`].
    fn create_headless(
        &self,
        _display: &DisplayHandle,
        create_renderer: &CreateRendererFn,
    ) -> Result<Box<dyn Backend>, BackendError> {
        Ok(Box::new(HeadlessBackend::new(create_renderer)?))
    }

    /// Creates a [`NoopBackend`].
    fn create_noop(&self, _display: &DisplayHandle) -> Result<Box<dyn Backend>, BackendError> {
        Ok(Box::new(NoopBackend::new()))
    }
}

/// A provider that can only create the headless and no-op backends.
///
/// Every other backend is reported as [unavailable][BackendError::Unavailable].
#[derive(Debug, Clone, Copy, Default)]
pub struct VirtualBackends;

impl BackendProvider for VirtualBackends {
    fn create_session(&self, _: &DisplayHandle) -> Result<SessionHandle, BackendError> {
        Err(BackendError::Session("no session support".into()))
    }

    fn create_wayland(
        &self, _: &DisplayHandle, _: &CreateRendererFn,
    ) -> Result<Box<dyn Backend>, BackendError> {
        Err(BackendError::Unavailable(BackendKind::Wayland))
    }

    fn create_x11(
        &self, _: &DisplayHandle, _: Option<&str>, _: &CreateRendererFn,
    ) -> Result<Box<dyn Backend>, BackendError> {
        Err(BackendError::Unavailable(BackendKind::X11))
    }

    fn create_libinput(
        &self, _: &DisplayHandle, _: &SessionHandle,
    ) -> Result<Box<dyn Backend>, BackendError> {
        Err(BackendError::Unavailable(BackendKind::Libinput))
    }

    fn create_drm(
        &self,
        _: &DisplayHandle,
        _: &SessionHandle,
        _: &GpuDevice,
        _: Option<&dyn Backend>,
        _: &CreateRendererFn,
    ) -> Result<Box<dyn Backend>, BackendError> {
        Err(BackendError::Unavailable(BackendKind::Drm))
    }
}
