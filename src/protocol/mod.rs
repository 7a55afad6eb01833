//! Wayland protocols implemented by this crate.
//!
//! The bindings are generated at compile time from the XML files in `protocols/`.

pub mod damage_stream;

#[allow(missing_docs, missing_debug_implementations, non_upper_case_globals, non_camel_case_types, unused_imports)]
mod generated {
    use smithay::reexports::wayland_server;
    use smithay::reexports::wayland_server::protocol::*;

    pub mod __interfaces {
        use smithay::reexports::wayland_server::protocol::__interfaces::*;
        wayland_scanner::generate_interfaces!("protocols/wlr-damage-stream-unstable-v1.xml");
    }
    use self::__interfaces::*;

    wayland_scanner::generate_server_code!("protocols/wlr-damage-stream-unstable-v1.xml");
}

pub use generated::{zwlr_damage_stream_manager_v1, zwlr_damage_stream_v1};
