//! Drives the damage stream protocol with real clients over socket pairs.

use std::os::unix::net::UnixStream;
use std::rc::Rc;
use std::cell::RefCell;
use std::sync::Arc;

use smithay::output::Output;
use smithay::reexports::wayland_server::{
    backend::{ClientData, ClientId, GlobalId},
    protocol::wl_output::WlOutput as ServerOutput,
    Display,
};
use smithay::wayland::output::OutputHandler;
use wayland_client::{
    protocol::{wl_output::WlOutput, wl_registry::{self, WlRegistry}},
    Connection, Dispatch, EventQueue, Proxy, QueueHandle,
};

use toaru_backend::backend::{
    Backend, CreateRendererFn, HeadlessBackend, Renderer, RendererHandle,
};
use toaru_backend::delegate_damage_stream;
use toaru_backend::output::{output_damage, DamageExtents};
use toaru_backend::protocol::damage_stream::{
    DamageStreamHandler, DamageStreamManagerState, ManagerTeardown,
};

#[allow(non_upper_case_globals, non_camel_case_types, unused_imports, missing_docs)]
mod client_protocol {
    use wayland_client;
    use wayland_client::protocol::*;

    pub mod __interfaces {
        use wayland_client::protocol::__interfaces::*;
        wayland_scanner::generate_interfaces!("protocols/wlr-damage-stream-unstable-v1.xml");
    }
    use self::__interfaces::*;

    wayland_scanner::generate_client_code!("protocols/wlr-damage-stream-unstable-v1.xml");
}

use client_protocol::zwlr_damage_stream_manager_v1::ZwlrDamageStreamManagerV1;
use client_protocol::zwlr_damage_stream_v1::{self, ZwlrDamageStreamV1};

// server side

struct State {
    damage_streams: DamageStreamManagerState,
}

impl DamageStreamHandler for State {
    fn damage_stream_state(&mut self) -> &mut DamageStreamManagerState {
        &mut self.damage_streams
    }
}

impl OutputHandler for State {
    fn output_bound(&mut self, _output: Output, _wl_output: ServerOutput) {}
}

delegate_damage_stream!(State);
smithay::delegate_output!(State);

struct TestClientData;

impl ClientData for TestClientData {}

#[derive(Debug)]
struct NullRenderer;

impl Renderer for NullRenderer {
    fn name(&self) -> &str {
        "null"
    }
}

// client side

#[derive(Default)]
struct ClientState {
    output: Option<WlOutput>,
    manager: Option<ZwlrDamageStreamManagerV1>,
    damage: Vec<[u32; 4]>,
}

impl Dispatch<WlRegistry, ()> for ClientState {
    fn event(
        state: &mut Self,
        registry: &WlRegistry,
        event: wl_registry::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        if let wl_registry::Event::Global { name, interface, .. } = event {
            match interface.as_str() {
                "wl_output" if state.output.is_none() => {
                    state.output = Some(registry.bind(name, 1, qh, ()));
                }
                "zwlr_damage_stream_manager_v1" => {
                    state.manager = Some(registry.bind(name, 1, qh, ()));
                }
                _ => {}
            }
        }
    }
}

impl Dispatch<WlOutput, ()> for ClientState {
    fn event(
        _: &mut Self, _: &WlOutput, _: <WlOutput as Proxy>::Event,
        _: &(), _: &Connection, _: &QueueHandle<Self>,
    ) {}
}

impl Dispatch<ZwlrDamageStreamManagerV1, ()> for ClientState {
    fn event(
        _: &mut Self, _: &ZwlrDamageStreamManagerV1, _: <ZwlrDamageStreamManagerV1 as Proxy>::Event,
        _: &(), _: &Connection, _: &QueueHandle<Self>,
    ) {}
}

impl Dispatch<ZwlrDamageStreamV1, ()> for ClientState {
    fn event(
        state: &mut Self,
        _: &ZwlrDamageStreamV1,
        event: zwlr_damage_stream_v1::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let zwlr_damage_stream_v1::Event::Damage { x1, y1, x2, y2 } = event {
            state.damage.push([x1, y1, x2, y2]);
        }
    }
}

struct TestClient {
    id: ClientId,
    conn: Connection,
    queue: EventQueue<ClientState>,
    state: ClientState,
}

impl TestClient {
    fn subscribe(&mut self) -> ZwlrDamageStreamV1 {
        let qh = self.queue.handle();
        let manager = self.state.manager.as_ref().expect("manager global not bound");
        let output = self.state.output.as_ref().expect("output global not bound");
        manager.subscribe(output, &qh, ())
    }

    fn pump(&mut self) {
        self.conn.flush().unwrap();
        if let Some(guard) = self.queue.prepare_read() {
            // nothing to read is fine, the socket is non-blocking
            let _ = guard.read();
        }
        self.queue.dispatch_pending(&mut self.state).unwrap();
    }
}

// the state goes first so the manager global is removed while the display is alive
struct Harness {
    state: State,
    display: Display<State>,
    output: Option<Output>,
    output_global: Option<GlobalId>,
    clients: Vec<TestClient>,
    _backend: Option<HeadlessBackend>,
}

impl Harness {
    fn new() -> Self {
        let display = Display::<State>::new().unwrap();
        let dh = display.handle();

        let create_renderer: CreateRendererFn = Rc::new(|_| Ok(Rc::new(NullRenderer) as RendererHandle));
        let mut backend = HeadlessBackend::new(&create_renderer).unwrap();
        let output = backend.add_output().unwrap();
        let output_global = output.create_global::<State>(&dh);

        let state = State {
            damage_streams: DamageStreamManagerState::new::<State>(&dh),
        };

        Self {
            state,
            display,
            output: Some(output),
            output_global: Some(output_global),
            clients: Vec::new(),
            _backend: Some(backend),
        }
    }

    fn output(&self) -> &Output {
        self.output.as_ref().expect("output was dropped")
    }

    fn connect(&mut self) -> usize {
        let (server, client) = UnixStream::pair().unwrap();
        server.set_nonblocking(true).unwrap();
        client.set_nonblocking(true).unwrap();

        let id = self.display.handle().insert_client(server, Arc::new(TestClientData)).unwrap().id();

        let conn = Connection::from_socket(client).unwrap();
        let queue = conn.new_event_queue();
        let _registry = conn.display().get_registry(&queue.handle(), ());

        self.clients.push(TestClient { id, conn, queue, state: ClientState::default() });
        let idx = self.clients.len() - 1;

        self.roundtrip();
        assert!(self.clients[idx].state.manager.is_some(), "manager global not advertised");
        idx
    }

    /// Exchanges messages until both sides have processed everything.
    fn roundtrip(&mut self) {
        for _ in 0..4 {
            for client in &mut self.clients {
                client.conn.flush().unwrap();
            }
            self.display.dispatch_clients(&mut self.state).unwrap();
            self.display.flush_clients().unwrap();
            for client in &mut self.clients {
                client.pump();
            }
        }
    }

    fn damage(&mut self, extents: DamageExtents) {
        output_damage(self.output()).damage(extents);
        self.display.flush_clients().unwrap();
        self.roundtrip();
    }

    /// Drops every handle to the output, including its global.
    fn drop_output(&mut self) {
        let weak = self.output().downgrade();

        if let Some(global) = self.output_global.take() {
            self.display.handle().remove_global::<State>(global);
        }
        self._backend = None;
        self.output = None;

        assert!(weak.upgrade().is_none(), "output still referenced");
        self.roundtrip();
    }

    /// The number of objects of `interface` the server holds for a client.
    fn live_objects(&self, client: usize, interface: &str) -> usize {
        let mut count = 0;
        self.display.handle().backend_handle()
            .with_all_objects_for(self.clients[client].id.clone(), |id| {
                if id.interface().name == interface {
                    count += 1;
                }
            })
            .unwrap();
        count
    }
}

#[test_log::test]
fn test_damage_is_delivered_once() {
    let mut harness = Harness::new();
    let c = harness.connect();

    let _stream = harness.clients[c].subscribe();
    harness.roundtrip();

    assert_eq!(harness.state.damage_streams.subscription_count(), 1);
    assert_eq!(harness.state.damage_streams.subscriptions_on(harness.output()), 1);

    harness.damage(DamageExtents::new(3, 5, 40, 60));
    assert_eq!(harness.clients[c].state.damage, [[3, 5, 40, 60]]);

    // no coalescing between frames
    harness.damage(DamageExtents::new(0, 0, 10, 10));
    harness.damage(DamageExtents::new(0, 0, 10, 10));
    assert_eq!(harness.clients[c].state.damage.len(), 3);
}

#[test_log::test]
fn test_clients_are_independent() {
    let mut harness = Harness::new();
    let a = harness.connect();
    let b = harness.connect();

    let stream_a = harness.clients[a].subscribe();
    let _stream_b = harness.clients[b].subscribe();
    harness.roundtrip();

    assert_eq!(harness.state.damage_streams.client_count(), 2);
    assert_eq!(harness.state.damage_streams.subscription_count(), 2);

    harness.damage(DamageExtents::new(1, 1, 2, 2));
    assert_eq!(harness.clients[a].state.damage, [[1, 1, 2, 2]]);
    assert_eq!(harness.clients[b].state.damage, [[1, 1, 2, 2]]);

    stream_a.destroy();
    harness.roundtrip();

    assert_eq!(harness.state.damage_streams.subscription_count(), 1);
    assert_eq!(harness.live_objects(a, "zwlr_damage_stream_v1"), 0);

    harness.damage(DamageExtents::new(5, 5, 6, 6));
    assert_eq!(harness.clients[a].state.damage.len(), 1);
    assert_eq!(harness.clients[b].state.damage, [[1, 1, 2, 2], [5, 5, 6, 6]]);
}

#[test_log::test]
fn test_several_streams_on_one_client() {
    let mut harness = Harness::new();
    let c = harness.connect();

    let _first = harness.clients[c].subscribe();
    let _second = harness.clients[c].subscribe();
    harness.roundtrip();

    harness.damage(DamageExtents::new(7, 8, 9, 10));

    assert_eq!(harness.clients[c].state.damage, [[7, 8, 9, 10], [7, 8, 9, 10]]);
}

#[test_log::test]
fn test_disconnect_removes_subscriptions() {
    let mut harness = Harness::new();
    let c = harness.connect();
    let other = harness.connect();

    let _stream = harness.clients[c].subscribe();
    let _other_stream = harness.clients[other].subscribe();
    harness.roundtrip();
    assert_eq!(harness.state.damage_streams.subscription_count(), 2);

    let client = harness.clients.remove(c);
    drop(client);
    harness.roundtrip();

    assert_eq!(harness.state.damage_streams.subscription_count(), 1);
    assert_eq!(harness.state.damage_streams.client_count(), 1);

    // the remaining client is the only one left listening
    let other = harness.clients.len() - 1;
    harness.damage(DamageExtents::new(1, 2, 3, 4));
    assert_eq!(harness.clients[other].state.damage, [[1, 2, 3, 4]]);
}

#[test_log::test]
fn test_manager_destroy() {
    let mut harness = Harness::new();
    let a = harness.connect();
    let b = harness.connect();

    let _stream_a = harness.clients[a].subscribe();
    let _stream_b = harness.clients[b].subscribe();
    harness.roundtrip();

    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = Rc::clone(&seen);
    let _token = harness.state.damage_streams.on_destroy(move |teardown| s.borrow_mut().push(*teardown));

    harness.state.damage_streams.destroy();
    harness.state.damage_streams.destroy();

    assert_eq!(*seen.borrow(), [ManagerTeardown { subscriptions: 2, clients: 2 }]);
    assert!(!harness.state.damage_streams.is_active());
    assert_eq!(harness.state.damage_streams.subscription_count(), 0);
    assert_eq!(harness.state.damage_streams.client_count(), 0);

    harness.damage(DamageExtents::new(1, 2, 3, 4));
    assert!(harness.clients[a].state.damage.is_empty());
    assert!(harness.clients[b].state.damage.is_empty());
}

#[test_log::test]
fn test_manager_destroy_destroys_client_objects() {
    let mut harness = Harness::new();
    let a = harness.connect();
    let b = harness.connect();

    let _first = harness.clients[a].subscribe();
    let _second = harness.clients[a].subscribe();
    let _third = harness.clients[b].subscribe();
    harness.roundtrip();

    for (client, streams) in [(a, 2), (b, 1)] {
        assert_eq!(harness.live_objects(client, "zwlr_damage_stream_manager_v1"), 1);
        assert_eq!(harness.live_objects(client, "zwlr_damage_stream_v1"), streams);
    }

    harness.state.damage_streams.destroy();

    for client in [a, b] {
        assert_eq!(harness.live_objects(client, "zwlr_damage_stream_manager_v1"), 0);
        assert_eq!(harness.live_objects(client, "zwlr_damage_stream_v1"), 0);
    }

    // the destructors run on the next dispatch and find nothing left to remove,
    // and both clients stay connected
    harness.roundtrip();
    assert_eq!(harness.state.damage_streams.subscription_count(), 0);
    assert_eq!(harness.state.damage_streams.client_count(), 0);
    assert_eq!(harness.live_objects(a, "wl_output"), 1);
}

#[test_log::test]
fn test_stream_goes_silent_when_output_is_dropped() {
    let mut harness = Harness::new();
    let c = harness.connect();

    let stream = harness.clients[c].subscribe();
    harness.roundtrip();
    harness.damage(DamageExtents::new(1, 1, 2, 2));
    assert_eq!(harness.clients[c].state.damage.len(), 1);

    harness.drop_output();

    // the stream lives on until the client destroys it
    assert_eq!(harness.state.damage_streams.subscription_count(), 1);
    assert_eq!(harness.live_objects(c, "zwlr_damage_stream_v1"), 1);
    assert_eq!(harness.clients[c].state.damage.len(), 1);

    stream.destroy();
    harness.roundtrip();
    assert_eq!(harness.state.damage_streams.subscription_count(), 0);
}

#[test_log::test]
fn test_subscribe_to_dropped_output_is_inert() {
    let mut harness = Harness::new();
    let c = harness.connect();

    harness.drop_output();

    // the client still holds its wl_output, but there is no output behind it
    let _stream = harness.clients[c].subscribe();
    harness.roundtrip();

    assert_eq!(harness.state.damage_streams.subscription_count(), 0);
    assert_eq!(harness.live_objects(c, "zwlr_damage_stream_v1"), 1);
    assert!(harness.clients[c].state.damage.is_empty());
}
