//! Subscribes to the damage of the first output of a running compositor and
//! prints every damage event it receives.
//!
//! Run it from inside a compositor that advertises
//! `zwlr_damage_stream_manager_v1`:
//!
//! ```text
//! cargo run --example damage-stream
//! ```

use std::error::Error;

use tracing::{debug, Level};
use tracing_subscriber::fmt as logger;
use wayland_client::{
    protocol::{wl_output::{self, WlOutput}, wl_registry::{self, WlRegistry}},
    Connection, Dispatch, Proxy, QueueHandle,
};

#[allow(non_upper_case_globals, non_camel_case_types, unused_imports, missing_docs, dead_code)]
mod protocol {
    use wayland_client;
    use wayland_client::protocol::*;

    pub mod __interfaces {
        use wayland_client::protocol::__interfaces::*;
        wayland_scanner::generate_interfaces!("protocols/wlr-damage-stream-unstable-v1.xml");
    }
    use self::__interfaces::*;

    wayland_scanner::generate_client_code!("protocols/wlr-damage-stream-unstable-v1.xml");
}

use protocol::zwlr_damage_stream_manager_v1::ZwlrDamageStreamManagerV1;
use protocol::zwlr_damage_stream_v1::{self, ZwlrDamageStreamV1};

#[derive(Debug, Default)]
struct DamageClient {
    output: Option<WlOutput>,
    manager: Option<ZwlrDamageStreamManagerV1>,
}

impl Dispatch<WlRegistry, ()> for DamageClient {
    fn event(
        state: &mut Self,
        registry: &WlRegistry,
        event: wl_registry::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        let wl_registry::Event::Global { name, interface, .. } = event else {
            return
        };
        if interface == WlOutput::interface().name && state.output.is_none() {
            debug!("binding wl_output {name}");
            state.output = Some(registry.bind(name, 1, qh, ()));
        } else if interface == ZwlrDamageStreamManagerV1::interface().name {
            debug!("binding damage stream manager {name}");
            state.manager = Some(registry.bind(name, 1, qh, ()));
        }
    }
}

impl Dispatch<WlOutput, ()> for DamageClient {
    fn event(
        _: &mut Self, _: &WlOutput, _: wl_output::Event,
        _: &(), _: &Connection, _: &QueueHandle<Self>,
    ) {}
}

impl Dispatch<ZwlrDamageStreamManagerV1, ()> for DamageClient {
    fn event(
        _: &mut Self, _: &ZwlrDamageStreamManagerV1, _: <ZwlrDamageStreamManagerV1 as Proxy>::Event,
        _: &(), _: &Connection, _: &QueueHandle<Self>,
    ) {}
}

impl Dispatch<ZwlrDamageStreamV1, ()> for DamageClient {
    fn event(
        _: &mut Self,
        _: &ZwlrDamageStreamV1,
        event: zwlr_damage_stream_v1::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let zwlr_damage_stream_v1::Event::Damage { x1, y1, x2, y2 } = event {
            println!("Damage at coordinates ({x1}, {y1}; {x2}, {y2})");
        }
    }
}

fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    logger::fmt()
        .with_max_level(Level::INFO)
        .try_init()?;

    let conn = Connection::connect_to_env()?;
    let mut queue = conn.new_event_queue();
    let qh = queue.handle();

    let _registry = conn.display().get_registry(&qh, ());
    let mut client = DamageClient::default();
    queue.roundtrip(&mut client)?;

    let Some(output) = client.output.as_ref() else {
        return Err("no output".into())
    };
    let Some(manager) = client.manager.as_ref() else {
        return Err("no damage stream is available".into())
    };

    let _stream = manager.subscribe(output, &qh, ());

    loop {
        queue.blocking_dispatch(&mut client)?;
    }
}
