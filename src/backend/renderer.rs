//! The renderer factory passed down to backends.

use std::fmt::Debug;
use std::rc::Rc;

use thiserror::Error;

use super::{BackendKind, GpuDevice};

/// A renderer created on behalf of a backend.
///
/// The compositor decides what a renderer actually is. Backends only hold
/// on to it and hand it back through [`Backend::renderer`](super::Backend::renderer).
pub trait Renderer: Debug {
    /// A human-readable name for the renderer.
    fn name(&self) -> &str;
}

/// A shared handle to a [`Renderer`].
pub type RendererHandle = Rc<dyn Renderer>;

/// What a renderer is being created for.
#[derive(Debug, Clone, Copy)]
pub struct RendererContext<'a> {
    /// The kind of backend requesting the renderer.
    pub backend: BackendKind,
    /// The GPU the renderer should run on, for backends that drive one.
    pub gpu: Option<&'a GpuDevice>,
}

/// An error returned by a [`CreateRendererFn`].
#[derive(Debug, Error)]
#[error("could not create renderer: {0}")]
pub struct RendererError(pub String);

/// The callback backends use to create their renderer.
///
/// It is passed unchanged to every backend that renders.
pub type CreateRendererFn = Rc<dyn Fn(&RendererContext<'_>) -> Result<RendererHandle, RendererError>>;
