//! A backend that aggregates other backends.

use indexmap::IndexMap;
use rustix::time::ClockId;
use smithay::utils::signaling::{SignalToken, Signaler};
use tracing::{debug, error, trace, warn};

use super::{Backend, BackendError, BackendEvents, BackendId, RendererHandle, SessionHandle};

#[derive(Debug)]
struct Child {
    backend: Box<dyn Backend>,
    _destroy: SignalToken,
    _new_input: SignalToken,
    _new_output: SignalToken,
}

/// A backend composed of any number of child backends.
///
/// Every `new_input` and `new_output` event of a child is re-emitted on the
/// `MultiBackend`'s own events, so consumers only ever have to listen to
/// the aggregate.
///
/// The `MultiBackend` owns its children. When it is dropped, it drops its
/// children in the order they were added, then its session, and finally
/// emits its own `destroy` event.
#[derive(Debug)]
pub struct MultiBackend {
    events: BackendEvents,
    backend_removed: Signaler<BackendId>,
    id: BackendId,
    children: IndexMap<BackendId, Child>,
    session: Option<SessionHandle>,
    primary_gpu: Option<BackendId>,
}

impl MultiBackend {
    /// Creates an empty `MultiBackend`.
    pub fn new() -> Self {
        Self {
            events: BackendEvents::new(),
            backend_removed: Signaler::new(),
            id: BackendId::new(),
            children: IndexMap::new(),
            session: None,
            primary_gpu: None,
        }
    }

    /// Adds a child backend.
    ///
    /// If a backend with the same ID was already added, `backend` is handed
    /// back untouched.
    pub fn add(&mut self, backend: Box<dyn Backend>) -> Result<BackendId, Box<dyn Backend>> {
        let id = backend.id();
        if self.children.contains_key(&id) {
            warn!("{} backend {id:?} was already added", backend.name());
            return Err(backend)
        }

        let events = backend.events();

        let removed = self.backend_removed.clone();
        let _destroy = events.destroy.register(move |_| {
            trace!("child backend {id:?} destroyed");
            removed.signal(id)
        });
        let new_input = self.events.new_input.clone();
        let _new_input = events.new_input.register(move |device| new_input.signal(device.clone()));
        let new_output = self.events.new_output.clone();
        let _new_output = events.new_output.register(move |output| new_output.signal(output.clone()));

        debug!("added {} backend {id:?}", backend.name());
        self.children.insert(id, Child { backend, _destroy, _new_input, _new_output });
        Ok(id)
    }

    /// Removes a child backend, handing ownership of it back to the caller.
    ///
    /// The remaining children are unaffected.
    pub fn remove(&mut self, id: BackendId) -> Option<Box<dyn Backend>> {
        let Child { backend, _destroy, _new_input, _new_output } = self.children.shift_remove(&id)?;
        drop((_destroy, _new_input, _new_output));

        if self.primary_gpu == Some(id) {
            self.primary_gpu = None;
        }
        debug!("removed {} backend {id:?}", backend.name());
        self.backend_removed.signal(id);
        Some(backend)
    }

    /// Returns the child backend with the given ID.
    pub fn get(&self, id: BackendId) -> Option<&dyn Backend> {
        self.children.get(&id).map(|child| child.backend.as_ref())
    }

    /// Returns the child backend with the given ID, mutably.
    pub fn get_mut(&mut self, id: BackendId) -> Option<&mut dyn Backend> {
        self.children.get_mut(&id).map(|child| -> &mut dyn Backend { child.backend.as_mut() })
    }

    /// Iterates over the child backends in the order they were added.
    pub fn iter(&self) -> impl Iterator<Item = (BackendId, &dyn Backend)> {
        self.children.iter().map(|(id, child)| (*id, child.backend.as_ref()))
    }

    /// The number of child backends.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Whether there are no child backends.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Gives the `MultiBackend` ownership of a session handle.
    ///
    /// The session is released after every child backend has been dropped.
    pub fn set_session(&mut self, session: SessionHandle) {
        self.session = Some(session);
    }

    /// The child driving the primary GPU, if a DRM backend was set up.
    pub fn primary_gpu(&self) -> Option<BackendId> {
        self.primary_gpu
    }

    /// Marks a child as the one driving the primary GPU.
    ///
    /// Returns `false` if there is no such child.
    pub fn set_primary_gpu(&mut self, id: BackendId) -> bool {
        if !self.children.contains_key(&id) {
            return false
        }
        self.primary_gpu = Some(id);
        true
    }

    /// Calls `f` every time a child backend is destroyed or removed.
    ///
    /// The callback stays registered for as long as the returned token is alive.
    pub fn on_backend_removed<F>(&self, f: F) -> SignalToken
    where
        F: FnMut(&BackendId) + 'static
    {
        self.backend_removed.register(f)
    }
}

impl Default for MultiBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for MultiBackend {
    fn id(&self) -> BackendId {
        self.id
    }

    fn name(&self) -> &str {
        "multi"
    }

    fn events(&self) -> &BackendEvents {
        &self.events
    }

    /// Starts every child in the order they were added, stopping at the first failure.
    fn start(&mut self) -> Result<(), BackendError> {
        for (id, child) in self.children.iter_mut() {
            if let Err(e) = child.backend.start() {
                error!("failed to initialize {} backend {id:?}: {e}", child.backend.name());
                return Err(e)
            }
        }
        Ok(())
    }

    /// The renderer of the first child that has one.
    fn renderer(&self) -> Option<RendererHandle> {
        self.children.values().find_map(|child| child.backend.renderer())
    }

    fn session(&self) -> Option<SessionHandle> {
        self.session.clone()
    }

    /// The clock of the first child, or the monotonic clock if there are no children.
    fn presentation_clock(&self) -> ClockId {
        self.children.values()
            .next()
            .map(|child| child.backend.presentation_clock())
            .unwrap_or(ClockId::Monotonic)
    }
}

impl Drop for MultiBackend {
    fn drop(&mut self) {
        for (id, child) in self.children.drain(..) {
            trace!("destroying {} backend {id:?}", child.backend.name());
            drop(child);
        }
        if self.session.take().is_some() {
            trace!("releasing session");
        }
        // `events` is dropped next, which emits our own destroy
    }
}
