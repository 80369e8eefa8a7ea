//! Abstract drawable descriptors
//!
//! The engine never rasterizes. Each frame it returns a [`PrimitiveBatch`]:
//! boxes, lines and labels in world coordinates, each optionally carrying a
//! [`PickingId`] that maps back to the timer, sample or track it represents.

use timegraph_common::{CallstackEvent, TimerRecord};

use crate::domain::Color;
use crate::tracks::TrackKey;

/// Axis-aligned rectangle in world coordinates (y grows downwards)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    #[must_use]
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }
}

/// Identifier linking a primitive to a [`PickTarget`]; `PickingId::NONE` is not pickable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PickingId(pub u32);

impl PickingId {
    pub const NONE: PickingId = PickingId(0);
}

/// What a picked primitive stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickTarget {
    Timer(TimerRecord),
    Sample(CallstackEvent),
    Track(TrackKey),
}

/// Layering of primitives, back to front
pub mod z {
    pub const TRACK_BACKGROUND: f32 = -0.1;
    pub const TIMER: f32 = 0.0;
    pub const EVENT: f32 = 0.1;
    pub const LABEL: f32 = 0.2;
    pub const OVERLAY: f32 = 0.4;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Box { rect: Rect, z: f32, color: Color, picking_id: PickingId },
    Line { from: (f32, f32), to: (f32, f32), z: f32, color: Color, picking_id: PickingId },
    Label { rect: Rect, z: f32, text: String, color: Color, picking_id: PickingId },
}

impl Primitive {
    #[must_use]
    pub fn picking_id(&self) -> PickingId {
        match self {
            Primitive::Box { picking_id, .. }
            | Primitive::Line { picking_id, .. }
            | Primitive::Label { picking_id, .. } => *picking_id,
        }
    }
}

/// Primitives of one frame plus their picking table
#[derive(Debug, Clone, Default)]
pub struct PrimitiveBatch {
    primitives: Vec<Primitive>,
    targets: Vec<PickTarget>,
}

impl PrimitiveBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pick target; `None` yields `PickingId::NONE`
    pub fn pickable(&mut self, target: Option<PickTarget>) -> PickingId {
        match target {
            Some(target) => {
                self.targets.push(target);
                PickingId(u32::try_from(self.targets.len()).unwrap_or(u32::MAX))
            }
            None => PickingId::NONE,
        }
    }

    pub fn add_box(&mut self, rect: Rect, z: f32, color: Color, target: Option<PickTarget>) {
        let picking_id = self.pickable(target);
        self.primitives.push(Primitive::Box { rect, z, color, picking_id });
    }

    pub fn add_vertical_line(
        &mut self,
        x: f32,
        y: f32,
        height: f32,
        z: f32,
        color: Color,
        target: Option<PickTarget>,
    ) {
        let picking_id = self.pickable(target);
        self.primitives.push(Primitive::Line { from: (x, y), to: (x, y + height), z, color, picking_id });
    }

    pub fn add_label(
        &mut self,
        rect: Rect,
        z: f32,
        text: impl Into<String>,
        color: Color,
        target: Option<PickTarget>,
    ) {
        let picking_id = self.pickable(target);
        self.primitives.push(Primitive::Label { rect, z, text: text.into(), color, picking_id });
    }

    /// Target of a picking id read back by the presentation layer
    #[must_use]
    pub fn pick(&self, id: PickingId) -> Option<&PickTarget> {
        let index = usize::try_from(id.0).ok()?.checked_sub(1)?;
        self.targets.get(index)
    }

    #[must_use]
    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    pub fn boxes(&self) -> impl Iterator<Item = &Primitive> {
        self.primitives.iter().filter(|p| matches!(p, Primitive::Box { .. }))
    }

    pub fn lines(&self) -> impl Iterator<Item = &Primitive> {
        self.primitives.iter().filter(|p| matches!(p, Primitive::Line { .. }))
    }

    pub fn labels(&self) -> impl Iterator<Item = &Primitive> {
        self.primitives.iter().filter(|p| matches!(p, Primitive::Label { .. }))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    pub fn clear(&mut self) {
        self.primitives.clear();
        self.targets.clear();
    }
}
