//! The `zwlr_damage_stream_manager_v1` protocol.
//!
//! Clients subscribe to an output and receive a `damage` event carrying the
//! output's damage extents every time the output needs a new frame.
//!
//! To use it, store a [`DamageStreamManagerState`] in your compositor state,
//! implement [`DamageStreamHandler`], and call [`delegate_damage_stream!`]:
//!
//! ```no_run
//! use toaru_backend::delegate_damage_stream;
//! use toaru_backend::protocol::damage_stream::{DamageStreamHandler, DamageStreamManagerState};
//! # use toaru_backend::reexports::wayland_server::Display;
//!
//! struct State {
//!     damage_streams: DamageStreamManagerState,
//! }
//!
//! impl DamageStreamHandler for State {
//!     fn damage_stream_state(&mut self) -> &mut DamageStreamManagerState {
//!         &mut self.damage_streams
//!     }
//! }
//!
//! delegate_damage_stream!(State);
//!
//! let display = Display::<State>::new().unwrap();
//! let state = State {
//!     damage_streams: DamageStreamManagerState::new::<State>(&display.handle()),
//! };
//! ```
//!
//! The global is removed when the state is dropped, or earlier with
//! [`DamageStreamManagerState::destroy`].
//!
//! [`delegate_damage_stream!`]: crate::delegate_damage_stream

use std::collections::HashMap;

use custom_debug_derive::Debug;
use smithay::output::{Output, WeakOutput};
use smithay::reexports::wayland_server::{
    backend::{ClientId, GlobalId, ObjectId},
    protocol::wl_output::WlOutput,
    Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource,
};
use smithay::utils::signaling::{SignalToken, Signaler};
use tracing::{debug, trace};

use super::zwlr_damage_stream_manager_v1::{self, ZwlrDamageStreamManagerV1};
use super::zwlr_damage_stream_v1::{self, ZwlrDamageStreamV1};
use crate::output::output_damage;

const VERSION: u32 = 1;

/// A snapshot of the manager, passed to its destroy listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerTeardown {
    /// The number of live subscriptions.
    pub subscriptions: usize,
    /// The number of bound manager objects.
    pub clients: usize,
}

#[derive(Debug)]
struct Subscription {
    resource: ZwlrDamageStreamV1,
    #[debug(skip)]
    output: WeakOutput,
    token: Option<SignalToken>,
}

/// Display operations that need the compositor state type, captured when
/// the global is created.
#[derive(Debug)]
struct DisplayHooks {
    #[debug(skip)]
    display: DisplayHandle,
    #[debug(skip)]
    destroy_object: fn(&DisplayHandle, &ObjectId),
    #[debug(skip)]
    remove_global: fn(&DisplayHandle, GlobalId),
}

fn destroy_object<D: 'static>(display: &DisplayHandle, id: &ObjectId) {
    if let Err(e) = display.backend_handle().destroy_object::<D>(id) {
        // the client already went away
        trace!("could not destroy {id:?}: {e}");
    }
}

fn remove_global<D: 'static>(display: &DisplayHandle, global: GlobalId) {
    display.remove_global::<D>(global)
}

/// Implemented by the compositor state to give access to the [`DamageStreamManagerState`].
pub trait DamageStreamHandler {
    /// Returns the damage stream manager.
    fn damage_stream_state(&mut self) -> &mut DamageStreamManagerState;
}

/// State of the damage stream manager global.
///
/// The manager starts out active. Once [destroyed][Self::destroy], the
/// global is gone, every object created through it has been destroyed, and
/// it does nothing more.
#[derive(Debug)]
pub struct DamageStreamManagerState {
    global: Option<GlobalId>,
    hooks: DisplayHooks,
    clients: HashMap<ObjectId, ZwlrDamageStreamManagerV1>,
    subscriptions: HashMap<ObjectId, Subscription>,
    destroy_signal: Signaler<ManagerTeardown>,
}

impl DamageStreamManagerState {
    /// Creates the `zwlr_damage_stream_manager_v1` global.
    pub fn new<D>(display: &DisplayHandle) -> Self
    where
        D: GlobalDispatch<ZwlrDamageStreamManagerV1, ()>
            + Dispatch<ZwlrDamageStreamManagerV1, ()>
            + Dispatch<ZwlrDamageStreamV1, ()>
            + DamageStreamHandler
            + 'static,
    {
        let global = display.create_global::<D, ZwlrDamageStreamManagerV1, _>(VERSION, ());
        debug!("created damage stream manager global {global:?}");

        Self {
            global: Some(global),
            hooks: DisplayHooks {
                display: display.clone(),
                destroy_object: destroy_object::<D>,
                remove_global: remove_global::<D>,
            },
            clients: HashMap::new(),
            subscriptions: HashMap::new(),
            destroy_signal: Signaler::new(),
        }
    }

    /// The ID of the global, if the manager is still active.
    pub fn global(&self) -> Option<GlobalId> {
        self.global.clone()
    }

    /// Whether the manager has not been destroyed yet.
    pub fn is_active(&self) -> bool {
        self.global.is_some()
    }

    /// The number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// The number of live subscriptions on `output`.
    pub fn subscriptions_on(&self, output: &Output) -> usize {
        self.subscriptions.values()
            .filter(|sub| sub.output == *output)
            .count()
    }

    /// The number of bound manager objects.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Calls `f` when the manager is destroyed, before any of its state is
    /// torn down. The callback is dropped with the returned token.
    pub fn on_destroy<F>(&self, f: F) -> SignalToken
    where
        F: FnMut(&ManagerTeardown) + 'static
    {
        self.destroy_signal.register(f)
    }

    /// Destroys the manager.
    ///
    /// Destroy listeners are notified first. Then every subscription stops
    /// listening to its output and its stream object is destroyed, every
    /// bound manager object is destroyed and the global is removed.
    /// Destroying the manager again does nothing.
    pub fn destroy(&mut self) {
        if !self.is_active() {
            return
        }

        self.destroy_signal.signal(ManagerTeardown {
            subscriptions: self.subscriptions.len(),
            clients: self.clients.len(),
        });

        let ids: Vec<ObjectId> = self.subscriptions.keys().cloned().collect();
        for id in ids {
            if let Some(subscription) = self.unsubscribe(&id) {
                (self.hooks.destroy_object)(&self.hooks.display, &subscription.resource.id());
            }
        }
        for (id, _) in self.clients.drain() {
            (self.hooks.destroy_object)(&self.hooks.display, &id);
        }

        if let Some(global) = self.global.take() {
            (self.hooks.remove_global)(&self.hooks.display, global);
        }
        debug!("damage stream manager destroyed");
    }

    fn bind(&mut self, manager: ZwlrDamageStreamManagerV1) {
        if !self.is_active() {
            return
        }
        self.clients.insert(manager.id(), manager);
    }

    fn unbind(&mut self, id: &ObjectId) {
        // already forgotten if the manager was destroyed first
        self.clients.remove(id);
    }

    fn subscribe(&mut self, stream: ZwlrDamageStreamV1, wl_output: &WlOutput) {
        if !self.is_active() {
            debug!("damage stream manager is destroyed, stream {:?} is inert", stream.id());
            return
        }
        let Some(output) = Output::from_resource(wl_output) else {
            debug!("subscription to inert output, stream {:?} is inert", stream.id());
            return
        };

        let resource = stream.clone();
        let token = output_damage(&output).on_needs_frame(move |extents| {
            let [x1, y1, x2, y2] = extents.to_wire();
            trace!("sending damage ({x1}, {y1}, {x2}, {y2}) on {:?}", resource.id());
            resource.damage(x1, y1, x2, y2);
        });

        trace!("stream {:?} subscribed to {}", stream.id(), output.name());
        self.subscriptions.insert(stream.id(), Subscription {
            resource: stream,
            output: output.downgrade(),
            token: Some(token),
        });
    }

    fn unsubscribe(&mut self, id: &ObjectId) -> Option<Subscription> {
        // already gone if the manager was destroyed first
        let subscription = self.subscriptions.get_mut(id)?;
        // stop listening before the subscription goes away
        subscription.token.take();
        let subscription = self.subscriptions.remove(id)?;
        trace!("removed damage stream {:?}", subscription.resource.id());
        Some(subscription)
    }
}

impl Drop for DamageStreamManagerState {
    fn drop(&mut self) {
        self.destroy()
    }
}

impl<D> GlobalDispatch<ZwlrDamageStreamManagerV1, (), D> for DamageStreamManagerState
where
    D: GlobalDispatch<ZwlrDamageStreamManagerV1, ()>
        + Dispatch<ZwlrDamageStreamManagerV1, ()>
        + Dispatch<ZwlrDamageStreamV1, ()>
        + DamageStreamHandler
        + 'static,
{
    fn bind(
        state: &mut D,
        _dh: &DisplayHandle,
        client: &Client,
        resource: New<ZwlrDamageStreamManagerV1>,
        _global_data: &(),
        data_init: &mut DataInit<'_, D>,
    ) {
        let manager = data_init.init(resource, ());
        trace!("client {:?} bound damage stream manager", client.id());
        state.damage_stream_state().bind(manager);
    }
}

impl<D> Dispatch<ZwlrDamageStreamManagerV1, (), D> for DamageStreamManagerState
where
    D: GlobalDispatch<ZwlrDamageStreamManagerV1, ()>
        + Dispatch<ZwlrDamageStreamManagerV1, ()>
        + Dispatch<ZwlrDamageStreamV1, ()>
        + DamageStreamHandler
        + 'static,
{
    fn request(
        state: &mut D,
        _client: &Client,
        _resource: &ZwlrDamageStreamManagerV1,
        request: <ZwlrDamageStreamManagerV1 as Resource>::Request,
        _data: &(),
        _dh: &DisplayHandle,
        data_init: &mut DataInit<'_, D>,
    ) {
        match request {
            zwlr_damage_stream_manager_v1::Request::Subscribe { stream, output } => {
                let stream = data_init.init(stream, ());
                state.damage_stream_state().subscribe(stream, &output);
            }
            zwlr_damage_stream_manager_v1::Request::Destroy => {}
        }
    }

    fn destroyed(state: &mut D, _client: ClientId, resource: &ZwlrDamageStreamManagerV1, _data: &()) {
        state.damage_stream_state().unbind(&resource.id());
    }
}

impl<D> Dispatch<ZwlrDamageStreamV1, (), D> for DamageStreamManagerState
where
    D: Dispatch<ZwlrDamageStreamV1, ()> + DamageStreamHandler + 'static,
{
    fn request(
        _state: &mut D,
        _client: &Client,
        _resource: &ZwlrDamageStreamV1,
        request: <ZwlrDamageStreamV1 as Resource>::Request,
        _data: &(),
        _dh: &DisplayHandle,
        _data_init: &mut DataInit<'_, D>,
    ) {
        match request {
            zwlr_damage_stream_v1::Request::Destroy => {}
        }
    }

    fn destroyed(state: &mut D, _client: ClientId, resource: &ZwlrDamageStreamV1, _data: &()) {
        state.damage_stream_state().unsubscribe(&resource.id());
    }
}

/// Implements the damage stream protocol for a compositor state implementing
/// [`DamageStreamHandler`].
#[macro_export]
macro_rules! delegate_damage_stream {
    ($(@< $( $lt:tt $( : $clt:tt $(+ $dlt:tt )* )? ),+ >)? $ty: ty) => {
        $crate::reexports::wayland_server::delegate_global_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            $crate::protocol::zwlr_damage_stream_manager_v1::ZwlrDamageStreamManagerV1: ()
        ] => $crate::protocol::damage_stream::DamageStreamManagerState);
        $crate::reexports::wayland_server::delegate_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            $crate::protocol::zwlr_damage_stream_manager_v1::ZwlrDamageStreamManagerV1: ()
        ] => $crate::protocol::damage_stream::DamageStreamManagerState);
        $crate::reexports::wayland_server::delegate_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            $crate::protocol::zwlr_damage_stream_v1::ZwlrDamageStreamV1: ()
        ] => $crate::protocol::damage_stream::DamageStreamManagerState);
    };
}
