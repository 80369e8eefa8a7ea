//! Domain types providing compile-time safety and self-documentation
//!
//! Thread, core and callstack ids are defined next to the decoded records in
//! `timegraph-common` so a transport can produce them; they are re-exported
//! here together with the small enums shared by navigation and rendering.

pub use timegraph_common::{CallstackId, CoreId, Tid};

/// Direction of a jump from the currently selected timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JumpDirection {
    Previous,
    Next,
    /// One nesting level up (the enclosing call)
    Top,
    /// One nesting level down (the first nested call)
    Down,
}

/// Which timers a jump may land on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JumpScope {
    /// Neighbors inside the lane owning the reference timer
    SameThread,
    /// Calls of the same function on any thread lane
    SameFunction,
}

/// Zoom step direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZoomDirection {
    /// Narrow the visible window
    In,
    /// Widen the visible window
    Out,
}

/// Whether primitives are generated for display or for picking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PickingMode {
    #[default]
    None,
    Hover,
    Click,
}

impl PickingMode {
    #[must_use]
    pub fn is_picking(self) -> bool {
        self != PickingMode::None
    }
}

/// RGBA color, 8 bits per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const GREEN: Color = Color::rgb(0, 255, 0);
    /// Tint of profiler self-instrumentation lanes
    pub const INTROSPECTION: Color = Color::rgb(87, 166, 74);

    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    #[must_use]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    #[must_use]
    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// Scale the color channels, keeping alpha
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn scaled(self, coeff: f32) -> Self {
        let scale = |c: u8| (f32::from(c) * coeff).clamp(0.0, 255.0) as u8;
        Self { r: scale(self.r), g: scale(self.g), b: scale(self.b), a: self.a }
    }

    /// Packed as `0xRRGGBBAA`
    #[must_use]
    pub const fn to_u32(self) -> u32 {
        u32::from_be_bytes([self.r, self.g, self.b, self.a])
    }

    #[must_use]
    pub const fn from_u32(packed: u32) -> Self {
        let [r, g, b, a] = packed.to_be_bytes();
        Self { r, g, b, a }
    }
}

/// Human-readable duration from milliseconds
///
/// Picks the largest unit that keeps the value at or above one.
#[must_use]
pub fn pretty_time(millis: f64) -> String {
    const MS_PER_MINUTE: f64 = 60_000.0;
    const MS_PER_HOUR: f64 = 3_600_000.0;
    const MS_PER_DAY: f64 = 86_400_000.0;

    if millis < 0.001 {
        format!("{:.3} ns", millis * 1_000_000.0)
    } else if millis < 1.0 {
        format!("{:.3} us", millis * 1_000.0)
    } else if millis < 1_000.0 {
        format!("{millis:.3} ms")
    } else if millis < MS_PER_MINUTE {
        format!("{:.3} s", millis / 1_000.0)
    } else if millis < MS_PER_HOUR {
        format!("{:.3} min", millis / MS_PER_MINUTE)
    } else if millis < MS_PER_DAY {
        format!("{:.3} h", millis / MS_PER_HOUR)
    } else {
        format!("{:.3} days", millis / MS_PER_DAY)
    }
}
