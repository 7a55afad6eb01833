//! A backend that does nothing.
//!
//! Its outputs have no modes and are never presented. It has no renderer
//! and no input devices.

use smithay::output::{Output, PhysicalProperties, Subpixel};
use tracing::debug;

use super::{Backend, BackendError, BackendEvents, BackendId};
use crate::output::output_damage;

/// A backend whose outputs go nowhere.
#[derive(Debug)]
pub struct NoopBackend {
    events: BackendEvents,
    id: BackendId,
    outputs: Vec<Output>,
    last_output_num: usize,
    started: bool,
}

impl NoopBackend {
    /// Creates a new no-op backend.
    pub fn new() -> Self {
        Self {
            events: BackendEvents::new(),
            id: BackendId::new(),
            outputs: Vec::new(),
            last_output_num: 0,
            started: false,
        }
    }

    /// The outputs created so far.
    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }
}

impl Default for NoopBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for NoopBackend {
    fn id(&self) -> BackendId {
        self.id
    }

    fn name(&self) -> &str {
        "noop"
    }

    fn events(&self) -> &BackendEvents {
        &self.events
    }

    fn start(&mut self) -> Result<(), BackendError> {
        if self.started {
            return Ok(())
        }
        debug!("starting noop backend");
        self.started = true;

        for output in &self.outputs {
            self.events.new_output.signal(output.clone());
        }
        Ok(())
    }

    fn add_output(&mut self) -> Result<Output, BackendError> {
        self.last_output_num += 1;

        let output = Output::new(format!("NOOP-{}", self.last_output_num), PhysicalProperties {
            size: (0, 0).into(),
            subpixel: Subpixel::Unknown,
            make: "noop".into(),
            model: "noop".into(),
        });
        output_damage(&output);

        self.outputs.push(output.clone());
        if self.started {
            self.events.new_output.signal(output.clone());
        }
        Ok(output)
    }
}
