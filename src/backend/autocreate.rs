//! Automatic selection and composition of backends.

use smithay::reexports::wayland_server::DisplayHandle;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use super::{
    Backend, BackendError, BackendId, BackendKind, BackendProvider,
    CreateRendererFn, MultiBackend, SessionHandle,
};
use crate::config::{BackendConfig, ConfigError, BACKENDS_ENV};

/// The maximum number of GPUs that are opened.
pub const MAX_GPUS: usize = 8;

/// An error returned by [`autocreate`].
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum AutocreateError {
    /// The configuration was invalid. Nothing was created.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// No session could be opened.
    #[error("failed to start a session: {0}")]
    Session(#[source] BackendError),
    /// A hardware backend was attempted without a session.
    #[error("{0} backend needs a session")]
    NoSession(BackendKind),
    /// A backend could not be created.
    #[error("failed to load {kind} backend: {source}")]
    Backend {
        /// The backend that failed.
        kind: BackendKind,
        /// Why it failed.
        source: BackendError,
    },
    /// None of the GPUs could be opened.
    #[error("failed to open any DRM device")]
    NoGpu,
}

/// Builds the backend best suited to the environment described by `config`.
///
/// In order of precedence:
///
/// 1. If an explicit list of backends is configured, exactly those are
/// created, in the order x11, wayland, noop, libinput, drm, headless.
/// 2. If a Wayland compositor is available, a nested Wayland backend is created.
/// 3. If an X display is available, a nested X11 backend is created.
/// 4. Otherwise, a session is opened and the libinput and DRM backends are created.
///
/// The nested and virtual backends are created with as many outputs as
/// configured, one by default.
///
/// If any backend fails, everything created so far is dropped, including
/// the session, and the error is returned.
#[instrument(level = "debug", skip_all)]
pub fn autocreate(
    display: &DisplayHandle,
    provider: &dyn BackendProvider,
    config: &BackendConfig,
    create_renderer: &CreateRendererFn,
) -> Result<MultiBackend, AutocreateError> {
    let mut multi = MultiBackend::new();

    let ctx = Context { display, provider, config, create_renderer };
    match ctx.build(&mut multi) {
        Ok(()) => Ok(multi),
        Err(e) => {
            error!("could not create backend: {e}");
            // dropping `multi` tears down everything created so far
            Err(e)
        }
    }
}

struct Context<'a> {
    display: &'a DisplayHandle,
    provider: &'a dyn BackendProvider,
    config: &'a BackendConfig,
    create_renderer: &'a CreateRendererFn,
}

impl Context<'_> {
    fn build(&self, multi: &mut MultiBackend) -> Result<(), AutocreateError> {
        if let Some(requested) = self.config.requested_backends() {
            let types = requested?;
            info!("creating backends requested by {BACKENDS_ENV}: {types:?}");

            if types.needs_session() {
                self.start_session(multi)?;
            }
            for kind in types.kinds() {
                self.attempt(multi, kind)?;
            }
            return Ok(())
        }

        if self.config.wayland_display {
            info!("found a Wayland compositor, running nested");
            return self.attempt(multi, BackendKind::Wayland)
        }

        if let Some(x11_display) = nested_x11_display(self.config) {
            info!("found X display {x11_display}, running nested");
            return self.attempt(multi, BackendKind::X11)
        }

        info!("no host display found, running on hardware");
        self.start_session(multi)?;
        self.attempt(multi, BackendKind::Libinput)?;
        self.attempt(multi, BackendKind::Drm)
    }

    fn start_session(&self, multi: &mut MultiBackend) -> Result<SessionHandle, AutocreateError> {
        let session = self.provider.create_session(self.display)
            .map_err(AutocreateError::Session)?;
        debug!("started session on {}", session.seat());

        multi.set_session(session.clone());
        Ok(session)
    }

    fn attempt(&self, multi: &mut MultiBackend, kind: BackendKind) -> Result<(), AutocreateError> {
        let fail = |source| AutocreateError::Backend { kind, source };

        let backend = match kind {
            BackendKind::X11 => self.create_x11(),
            BackendKind::Wayland => self.provider.create_wayland(self.display, self.create_renderer),
            BackendKind::Headless => self.provider.create_headless(self.display, self.create_renderer),
            BackendKind::Noop => self.provider.create_noop(self.display),
            BackendKind::Libinput => {
                let session = multi.session().ok_or(AutocreateError::NoSession(kind))?;
                self.provider.create_libinput(self.display, &session)
            }
            BackendKind::Drm => return self.attempt_drm(multi).map(|_| ()),
        };
        let mut backend = backend.map_err(fail)?;

        if kind.has_virtual_outputs() {
            for _ in 0..self.config.output_count(kind) {
                if let Err(e) = backend.add_output() {
                    warn!("could not create {kind} output: {e}");
                }
            }
        }

        multi.add(backend)
            .map(|_| ())
            .map_err(|rejected| fail(BackendError::Duplicate(rejected.id())))
    }

    #[cfg(feature = "x11")]
    fn create_x11(&self) -> Result<Box<dyn Backend>, BackendError> {
        self.provider.create_x11(
            self.display,
            self.config.x11_display.as_deref(),
            self.create_renderer
        )
    }

    #[cfg(not(feature = "x11"))]
    fn create_x11(&self) -> Result<Box<dyn Backend>, BackendError> {
        Err(BackendError::Unavailable(BackendKind::X11))
    }

    /// Opens a DRM backend for every GPU the session can find, returning the primary one.
    fn attempt_drm(&self, multi: &mut MultiBackend) -> Result<BackendId, AutocreateError> {
        let session = multi.session().ok_or(AutocreateError::NoSession(BackendKind::Drm))?;

        let mut gpus = session.find_gpus(MAX_GPUS);
        if gpus.len() > MAX_GPUS {
            warn!("session found {} GPUs, only using the first {MAX_GPUS}", gpus.len());
            gpus.truncate(MAX_GPUS);
        }
        info!("found {} GPUs", gpus.len());

        let mut primary: Option<BackendId> = None;
        for gpu in &gpus {
            let hint = primary.and_then(|id| multi.get(id));
            let drm = match self.provider.create_drm(
                self.display, &session, gpu, hint, self.create_renderer
            ) {
                Ok(drm) => drm,
                Err(e) => {
                    error!("failed to open DRM device {gpu}: {e}");
                    continue
                }
            };

            let id = match multi.add(drm) {
                Ok(id) => id,
                Err(rejected) => {
                    error!("DRM backend for {gpu} was already added as {:?}", rejected.id());
                    continue
                }
            };
            if primary.is_none() {
                info!("using {gpu} as primary GPU");
                primary = Some(id);
            }
        }

        let primary = primary.ok_or(AutocreateError::NoGpu)?;
        multi.set_primary_gpu(primary);
        Ok(primary)
    }
}

#[cfg(feature = "x11")]
fn nested_x11_display(config: &BackendConfig) -> Option<&str> {
    config.x11_display.as_deref()
}

#[cfg(not(feature = "x11"))]
fn nested_x11_display(_: &BackendConfig) -> Option<&str> {
    None
}
