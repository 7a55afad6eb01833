//! Damage tracking state attached to an [`Output`].
//!
//! Outputs are created by backends as plain Smithay [`Output`]s. Each one
//! carries an [`OutputDamage`] in its user data, holding the bounding box
//! of the damage accumulated for the next frame and a "needs frame" event
//! that fires whenever the output should be redrawn.
//!
//! This crate does not compute damage. Whoever renders the output stores
//! the extents with [`OutputDamage::damage`], which also fires the event.

use std::cell::Cell;

use smithay::output::Output;
use smithay::utils::signaling::{SignalToken, Signaler};
use smithay::utils::{Physical, Rectangle};

/// The bounding box of an output's damage, in output-local coordinates.
///
/// `(x1, y1)` is the top-left corner and `(x2, y2)` is the bottom-right corner
/// (exclusive).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DamageExtents {
    /// Left edge.
    pub x1: i32,
    /// Top edge.
    pub y1: i32,
    /// Right edge, exclusive.
    pub x2: i32,
    /// Bottom edge, exclusive.
    pub y2: i32,
}

impl DamageExtents {
    /// Creates a new set of extents.
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Returns the smallest box covering all of the given rectangles.
    ///
    /// Returns empty extents if there are no rectangles.
    pub fn bounding<I>(rects: I) -> Self
    where
        I: IntoIterator<Item = Rectangle<i32, Physical>>
    {
        rects.into_iter()
            .map(DamageExtents::from)
            .reduce(|acc, next| DamageExtents {
                x1: acc.x1.min(next.x1),
                y1: acc.y1.min(next.y1),
                x2: acc.x2.max(next.x2),
                y2: acc.y2.max(next.y2),
            })
            .unwrap_or_default()
    }

    /// Whether the extents cover no pixels.
    pub fn is_empty(&self) -> bool {
        self.x2 <= self.x1 || self.y2 <= self.y1
    }

    /// The extents as sent over the wire: `[x1, y1, x2, y2]`, with negative
    /// coordinates clamped to 0.
    pub fn to_wire(&self) -> [u32; 4] {
        [self.x1, self.y1, self.x2, self.y2].map(|c| c.max(0) as u32)
    }
}

impl From<Rectangle<i32, Physical>> for DamageExtents {
    fn from(rect: Rectangle<i32, Physical>) -> Self {
        Self {
            x1: rect.loc.x,
            y1: rect.loc.y,
            x2: rect.loc.x + rect.size.w,
            y2: rect.loc.y + rect.size.h,
        }
    }
}

/// Per-output damage state.
///
/// Use [`output_damage`] to retrieve the instance attached to an `Output`.
#[derive(Debug, Default)]
pub struct OutputDamage {
    extents: Cell<DamageExtents>,
    needs_frame: Signaler<DamageExtents>,
}

impl OutputDamage {
    /// The current damage extents.
    pub fn extents(&self) -> DamageExtents {
        self.extents.get()
    }

    /// Replaces the current damage extents without notifying anyone.
    pub fn set_extents(&self, extents: DamageExtents) {
        self.extents.set(extents)
    }

    /// Signals that the output needs a new frame, passing the current extents
    /// to every listener.
    pub fn schedule_frame(&self) {
        self.needs_frame.signal(self.extents())
    }

    /// Stores `extents` as the current damage and signals that the output
    /// needs a new frame.
    pub fn damage(&self, extents: DamageExtents) {
        self.set_extents(extents);
        self.schedule_frame();
    }

    /// Calls `f` with the current extents every time the output needs a new
    /// frame, until the returned token is dropped.
    pub fn on_needs_frame<F>(&self, f: F) -> SignalToken
    where
        F: FnMut(&DamageExtents) + 'static
    {
        self.needs_frame.register(f)
    }
}

/// Returns the damage state of an output, creating it on first access.
///
/// The state lives in the output's user data, so it is dropped together with
/// the last handle to the output. It must only be accessed from the thread
/// that first created it.
pub fn output_damage(output: &Output) -> &OutputDamage {
    let userdata = output.user_data();
    userdata.insert_if_missing(OutputDamage::default);
    userdata.get::<OutputDamage>()
        .expect("output damage state was inserted above")
}
