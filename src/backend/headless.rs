//! A backend with virtual outputs and input devices.
//!
//! The headless backend renders into offscreen buffers with a real renderer,
//! which makes it useful for running a compositor in tests or on a machine
//! with no display.

use smithay::output::{Mode, Output, PhysicalProperties, Subpixel};
use tracing::{debug, instrument};

use super::{
    Backend, BackendError, BackendEvents, BackendId, BackendKind,
    CreateRendererFn, InputDevice, InputDeviceKind, RendererContext, RendererHandle,
};
use crate::output::output_damage;

/// The width of outputs created by [`Backend::add_output`].
pub const HEADLESS_DEFAULT_WIDTH: i32 = 1280;
/// The height of outputs created by [`Backend::add_output`].
pub const HEADLESS_DEFAULT_HEIGHT: i32 = 720;
/// The refresh rate of headless outputs, in mHz.
pub const HEADLESS_DEFAULT_REFRESH: i32 = 60 * 1000;

/// A backend with virtual outputs, backed by a renderer but no display.
///
/// Outputs and input devices added before [`start`][Backend::start] are
/// announced when the backend starts. Those added afterwards are announced
/// immediately.
#[derive(Debug)]
pub struct HeadlessBackend {
    events: BackendEvents,
    id: BackendId,
    renderer: RendererHandle,
    outputs: Vec<Output>,
    input_devices: Vec<InputDevice>,
    last_output_num: usize,
    started: bool,
}

impl HeadlessBackend {
    /// Creates a new headless backend, creating its renderer with `create_renderer`.
    #[instrument(level = "debug", skip_all)]
    pub fn new(create_renderer: &CreateRendererFn) -> Result<Self, BackendError> {
        let renderer = create_renderer(&RendererContext {
            backend: BackendKind::Headless,
            gpu: None,
        })?;
        debug!("created headless backend with renderer {}", renderer.name());

        Ok(Self {
            events: BackendEvents::new(),
            id: BackendId::new(),
            renderer,
            outputs: Vec::new(),
            input_devices: Vec::new(),
            last_output_num: 0,
            started: false,
        })
    }

    /// Creates a new output with a single mode of the given size.
    pub fn add_output_with_size(&mut self, width: i32, height: i32) -> Output {
        self.last_output_num += 1;
        let name = format!("HEADLESS-{}", self.last_output_num);

        let output = Output::new(name, PhysicalProperties {
            size: (0, 0).into(),
            subpixel: Subpixel::Unknown,
            make: "headless".into(),
            model: "headless".into(),
        });
        let mode = Mode {
            size: (width, height).into(),
            refresh: HEADLESS_DEFAULT_REFRESH,
        };
        output.change_current_state(Some(mode), None, None, Some((0, 0).into()));
        output.set_preferred(mode);
        output_damage(&output);

        debug!("added headless output {} ({width}x{height})", output.name());
        self.outputs.push(output.clone());
        if self.started {
            self.events.new_output.signal(output.clone());
        }
        output
    }

    /// Creates a new virtual input device.
    pub fn add_input_device(&mut self, kind: InputDeviceKind) -> InputDevice {
        let device = InputDevice::new(
            format!("headless {kind} {}", self.input_devices.len() + 1),
            kind
        );

        debug!("added headless input device {device}");
        self.input_devices.push(device.clone());
        if self.started {
            self.events.new_input.signal(device.clone());
        }
        device
    }

    /// The outputs created so far.
    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    /// The input devices created so far.
    pub fn input_devices(&self) -> &[InputDevice] {
        &self.input_devices
    }

    /// Whether the backend has been started.
    pub fn is_started(&self) -> bool {
        self.started
    }
}

impl Backend for HeadlessBackend {
    fn id(&self) -> BackendId {
        self.id
    }

    fn name(&self) -> &str {
        "headless"
    }

    fn events(&self) -> &BackendEvents {
        &self.events
    }

    fn start(&mut self) -> Result<(), BackendError> {
        if self.started {
            return Ok(())
        }
        debug!("starting headless backend");
        self.started = true;

        for output in &self.outputs {
            self.events.new_output.signal(output.clone());
        }
        for device in &self.input_devices {
            self.events.new_input.signal(device.clone());
        }
        Ok(())
    }

    fn renderer(&self) -> Option<RendererHandle> {
        Some(self.renderer.clone())
    }

    fn add_output(&mut self) -> Result<Output, BackendError> {
        Ok(self.add_output_with_size(HEADLESS_DEFAULT_WIDTH, HEADLESS_DEFAULT_HEIGHT))
    }
}
