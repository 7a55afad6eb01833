//! # toaru-backend
//!
//! The backend layer of a Toaru compositor: where outputs and input devices
//! come from, and how clients can follow what happens on those outputs.
//!
//! ## Backends
//!
//! A [`Backend`] is a source of outputs and input devices. Backends can be
//! nested inside another display server, drive the hardware directly, or be
//! entirely virtual. Any number of them can be composed into a single
//! [`MultiBackend`], which is what the rest of the compositor drives.
//!
//! Most compositors do not need to pick backends by hand: [`autocreate`]
//! reads a [`BackendConfig`] (usually from the environment) and builds the
//! `MultiBackend` that fits. The hardware and nested backends need system
//! libraries, so they are constructed through a [`BackendProvider`]
//! supplied by the compositor. The headless and no-op backends ship with
//! this crate.
//!
//! ```no_run
//! use std::rc::Rc;
//!
//! use toaru_backend::{autocreate, BackendConfig, VirtualBackends};
//! use toaru_backend::backend::{Renderer, RendererHandle, CreateRendererFn};
//! # use toaru_backend::reexports::wayland_server::Display;
//!
//! #[derive(Debug)]
//! struct MyRenderer;
//!
//! impl Renderer for MyRenderer {
//!     fn name(&self) -> &str { "mine" }
//! }
//!
//! # struct State;
//! let display = Display::<State>::new().unwrap();
//! let create_renderer: CreateRendererFn = Rc::new(|_| Ok(Rc::new(MyRenderer) as RendererHandle));
//!
//! let config = BackendConfig::from_env();
//! let backend = autocreate(&display.handle(), &VirtualBackends, &config, &create_renderer)
//!     .expect("no usable backend");
//! ```
//!
//! ## Signals
//!
//! Backends and outputs announce what happens to them through smithay's
//! [`Signaler`]. Registering a callback returns a [`SignalToken`], which
//! unregisters it when dropped. Everything is single-threaded and lives on
//! the event loop.
//!
//! ## Damage streams
//!
//! The [`protocol::damage_stream`] module implements the
//! `zwlr_damage_stream_manager_v1` global, which lets clients receive the
//! damage extents of an output every time it needs a new frame.
//!
//! [`Signaler`]: smithay::utils::signaling::Signaler
//! [`SignalToken`]: smithay::utils::signaling::SignalToken

#![warn(
    missing_debug_implementations,
    missing_copy_implementations,
    missing_docs
)]

#[macro_use]
extern crate bitflags;

pub mod backend;
pub mod config;
pub mod output;
pub mod protocol;
pub mod util;

/// Modules that this crate is tightly integrated with, re-exported for convenience.
pub mod reexports {
    pub use smithay;
    pub use smithay::reexports::calloop;
    pub use smithay::reexports::wayland_server;
}

#[doc(inline)]
pub use crate::backend::{
    autocreate, AutocreateError, Backend, BackendError, BackendId, BackendKind,
    BackendProvider, MultiBackend, VirtualBackends,
};
#[doc(inline)]
pub use crate::config::{BackendConfig, BackendTypes, ConfigError};
#[doc(inline)]
pub use crate::output::{output_damage, DamageExtents, OutputDamage};
