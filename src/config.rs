//! Configuration for backend autocreation.
//!
//! [`BackendConfig`] captures everything [`autocreate`] reads from the
//! environment, so that it is read exactly once and can be built by hand in
//! tests.
//!
//! [`autocreate`]: crate::backend::autocreate

use std::collections::HashMap;
use std::env;
use std::str::FromStr;

use thiserror::Error;
use tracing::warn;

use crate::backend::BackendKind;

/// Comma-separated list of backends to create, overriding detection.
pub const BACKENDS_ENV: &str = "TOARU_BACKENDS";
/// The number of outputs the nested Wayland backend creates.
pub const WL_OUTPUTS_ENV: &str = "TOARU_WL_OUTPUTS";
/// The number of outputs the nested X11 backend creates.
pub const X11_OUTPUTS_ENV: &str = "TOARU_X11_OUTPUTS";
/// The number of outputs the headless backend creates.
pub const HEADLESS_OUTPUTS_ENV: &str = "TOARU_HEADLESS_OUTPUTS";
/// The number of outputs the no-op backend creates.
pub const NOOP_OUTPUTS_ENV: &str = "TOARU_NOOP_OUTPUTS";

/// Any of these being set means we are running inside a Wayland compositor.
pub const WAYLAND_DISPLAY_ENVS: [&str; 3] = ["WAYLAND_DISPLAY", "_WAYLAND_DISPLAY", "WAYLAND_SOCKET"];
/// The X display to connect to.
pub const X11_DISPLAY_ENV: &str = "DISPLAY";

/// The number of outputs created when no valid count is configured.
pub const DEFAULT_OUTPUT_COUNT: usize = 1;
/// The largest number of outputs created for a single backend.
pub const MAX_OUTPUT_COUNT: usize = 32;

/// The environment variable holding the output count of `kind`, if it has one.
pub fn outputs_env(kind: BackendKind) -> Option<&'static str> {
    match kind {
        BackendKind::Wayland => Some(WL_OUTPUTS_ENV),
        BackendKind::X11 => Some(X11_OUTPUTS_ENV),
        BackendKind::Headless => Some(HEADLESS_OUTPUTS_ENV),
        BackendKind::Noop => Some(NOOP_OUTPUTS_ENV),
        BackendKind::Libinput | BackendKind::Drm => None,
    }
}

/// An invalid backend configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A backend name that is not recognized.
    #[error("unrecognized backend '{0}'")]
    UnknownBackend(String),
    /// The backend list did not name any backend.
    #[error("{BACKENDS_ENV} does not name any backend")]
    EmptyBackendList,
}

bitflags! {

/// A set of backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BackendTypes: u32 {
    /// The nested Wayland backend.
    const WAYLAND  = 1 << 0;
    /// The nested X11 backend.
    const X11      = 1 << 1;
    /// The headless backend.
    const HEADLESS = 1 << 2;
    /// The no-op backend.
    const NOOP     = 1 << 3;
    /// The libinput backend.
    const LIBINPUT = 1 << 4;
    /// The DRM backend.
    const DRM      = 1 << 5;
}

}

impl BackendTypes {
    /// Parses a comma-separated list of backend names.
    ///
    /// Empty entries are skipped and names are matched exactly, without
    /// trimming whitespace. Duplicate names are allowed.
    pub fn parse(list: &str) -> Result<Self, ConfigError> {
        let mut types = BackendTypes::empty();

        for name in list.split(',').filter(|name| !name.is_empty()) {
            let kind = BackendKind::from_str(name)
                .map_err(|_| ConfigError::UnknownBackend(name.to_string()))?;
            types |= kind.into();
        }

        if types.is_empty() {
            return Err(ConfigError::EmptyBackendList)
        }
        Ok(types)
    }

    /// Whether any of the backends needs a session.
    pub fn needs_session(&self) -> bool {
        self.intersects(BackendTypes::LIBINPUT | BackendTypes::DRM)
    }

    /// Iterates over the backends in the set, in the order they are created.
    pub fn kinds(&self) -> impl Iterator<Item = BackendKind> + '_ {
        BackendKind::COMPOSITION_ORDER.into_iter()
            .filter(|kind| self.contains((*kind).into()))
    }
}

impl From<BackendKind> for BackendTypes {
    fn from(kind: BackendKind) -> Self {
        match kind {
            BackendKind::Wayland => BackendTypes::WAYLAND,
            BackendKind::X11 => BackendTypes::X11,
            BackendKind::Headless => BackendTypes::HEADLESS,
            BackendKind::Noop => BackendTypes::NOOP,
            BackendKind::Libinput => BackendTypes::LIBINPUT,
            BackendKind::Drm => BackendTypes::DRM,
        }
    }
}

/// The settings [`autocreate`] reads from the environment.
///
/// Values are kept as they were given and only validated when they are used,
/// so a malformed value only matters if the backend it applies to is created.
///
/// [`autocreate`]: crate::backend::autocreate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BackendConfig {
    /// The explicit list of backends to create, as given.
    pub backends: Option<String>,
    /// The raw output counts for the backends that create outputs.
    pub output_counts: HashMap<BackendKind, String>,
    /// Whether a Wayland compositor is available to nest in.
    pub wayland_display: bool,
    /// The X display to nest in, if any.
    pub x11_display: Option<String>,
}

impl BackendConfig {
    /// Creates a configuration with nothing set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the configuration from the environment.
    pub fn from_env() -> Self {
        let output_counts = BackendKind::COMPOSITION_ORDER.into_iter()
            .filter_map(|kind| {
                let value = env::var(outputs_env(kind)?).ok()?;
                Some((kind, value))
            })
            .collect();

        Self {
            backends: env::var(BACKENDS_ENV).ok(),
            output_counts,
            wayland_display: WAYLAND_DISPLAY_ENVS.iter().any(|var| env::var_os(var).is_some()),
            x11_display: env::var(X11_DISPLAY_ENV).ok(),
        }
    }

    /// Sets the explicit list of backends.
    pub fn with_backends<S: Into<String>>(mut self, list: S) -> Self {
        self.backends = Some(list.into());
        self
    }

    /// Sets the raw output count for `kind`.
    pub fn with_output_count<S: Into<String>>(mut self, kind: BackendKind, count: S) -> Self {
        self.output_counts.insert(kind, count.into());
        self
    }

    /// Sets whether a Wayland compositor is available to nest in.
    pub fn with_wayland_display(mut self, available: bool) -> Self {
        self.wayland_display = available;
        self
    }

    /// Sets the X display to nest in.
    pub fn with_x11_display<S: Into<String>>(mut self, display: Option<S>) -> Self {
        self.x11_display = display.map(Into::into);
        self
    }

    /// Parses the explicit backend list, if one was given.
    pub fn requested_backends(&self) -> Option<Result<BackendTypes, ConfigError>> {
        self.backends.as_deref().map(BackendTypes::parse)
    }

    /// The number of outputs to create for `kind`.
    ///
    /// Falls back to [`DEFAULT_OUTPUT_COUNT`] if no count is set, or if the
    /// count is not a non-negative integer. Counts above [`MAX_OUTPUT_COUNT`]
    /// are capped.
    pub fn output_count(&self, kind: BackendKind) -> usize {
        let Some(raw) = self.output_counts.get(&kind) else {
            return DEFAULT_OUTPUT_COUNT
        };

        let var = outputs_env(kind).unwrap_or("output count");
        match raw.parse::<usize>() {
            Ok(count) if count > MAX_OUTPUT_COUNT => {
                warn!("{var} asks for {count} outputs, only creating {MAX_OUTPUT_COUNT}");
                MAX_OUTPUT_COUNT
            }
            Ok(count) => count,
            Err(_) => {
                warn!("{var} specified with invalid integer {raw:?}, using {DEFAULT_OUTPUT_COUNT}");
                DEFAULT_OUTPUT_COUNT
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_parse_skips_empty_entries() {
        let types = BackendTypes::parse(",drm,,libinput,").unwrap();

        assert_eq!(types, BackendTypes::DRM | BackendTypes::LIBINPUT);
        assert!(types.needs_session());
    }

    #[test]
    fn test_parse_rejects_unknown_names() {
        assert_eq!(
            BackendTypes::parse("wayland,bogus"),
            Err(ConfigError::UnknownBackend("bogus".into()))
        );
        // names are not trimmed
        assert_eq!(
            BackendTypes::parse("wayland, x11"),
            Err(ConfigError::UnknownBackend(" x11".into()))
        );
    }

    #[test]
    fn test_parse_rejects_empty_list() {
        assert_eq!(BackendTypes::parse(""), Err(ConfigError::EmptyBackendList));
        assert_eq!(BackendTypes::parse(",,"), Err(ConfigError::EmptyBackendList));
    }

    #[test]
    fn test_kinds_follow_composition_order() {
        let a = BackendTypes::parse("headless,drm,x11,noop").unwrap();
        let b = BackendTypes::parse("noop,x11,x11,drm,headless").unwrap();

        assert_eq!(a, b);
        assert_eq!(
            a.kinds().collect::<Vec<_>>(),
            [BackendKind::X11, BackendKind::Noop, BackendKind::Drm, BackendKind::Headless]
        );
    }

    #[test]
    fn test_output_count_defaults() {
        let config = BackendConfig::new()
            .with_output_count(BackendKind::Wayland, "3")
            .with_output_count(BackendKind::X11, "abc")
            .with_output_count(BackendKind::Headless, "-2")
            .with_output_count(BackendKind::Noop, "0");

        assert_eq!(config.output_count(BackendKind::Wayland), 3);
        assert_eq!(config.output_count(BackendKind::X11), 1);
        assert_eq!(config.output_count(BackendKind::Headless), 1);
        assert_eq!(config.output_count(BackendKind::Noop), 0);
        assert_eq!(config.output_count(BackendKind::Drm), 1);
    }

    #[test]
    fn test_output_count_rejects_empty() {
        let config = BackendConfig::new().with_output_count(BackendKind::Noop, "");

        assert_eq!(config.output_count(BackendKind::Noop), 1);
    }

    #[test]
    fn test_output_count_is_capped() {
        let config = BackendConfig::new()
            .with_output_count(BackendKind::Headless, "4000000000")
            .with_output_count(BackendKind::Noop, "32");

        assert_eq!(config.output_count(BackendKind::Headless), MAX_OUTPUT_COUNT);
        assert_eq!(config.output_count(BackendKind::Noop), 32);
    }

    #[test]
    fn test_requested_backends() {
        assert!(BackendConfig::new().requested_backends().is_none());

        let config = BackendConfig::new().with_backends("headless");
        assert_eq!(config.requested_backends(), Some(Ok(BackendTypes::HEADLESS)));
    }
}
