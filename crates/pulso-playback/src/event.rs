//! Timed events: what the renderer hands to the synthesis layer.

use pulso_arena::Opcode;

/// Kind of an emitted event. Rests never reach a sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// A pitched note with velocity and duration.
    Note,
    /// A control change: controller number in the pitch lane, value in
    /// the velocity lane.
    Control,
    /// A pitch bend: coarse value in the pitch lane.
    Bend,
}

impl EventKind {
    /// Map a node opcode to an emittable kind. Rests return `None`.
    pub fn from_opcode(opcode: Opcode) -> Option<Self> {
        match opcode {
            Opcode::Note => Some(EventKind::Note),
            Opcode::Rest => None,
            Opcode::Cc => Some(EventKind::Control),
            Opcode::Bend => Some(EventKind::Bend),
        }
    }
}

/// One rendered event, timestamped in both ticks and quantum frames.
/// Plain data, passed by value; the render path allocates nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimedEvent {
    /// Trigger time in ticks, transforms applied.
    pub tick: u32,
    /// Frame offset inside the quantum that produced the event.
    pub frame: u32,
    /// Event kind.
    pub kind: EventKind,
    /// Pitch lane after transposition (notes) or raw payload (CC/bend).
    pub pitch: u8,
    /// Velocity lane after scaling and humanize (notes) or raw payload.
    pub velocity: u8,
    /// Duration in ticks.
    pub duration: u32,
    /// Source identity of the originating node, 0 for none.
    pub source_id: u32,
}

/// Receiver for rendered events.
///
/// Object-safe with a single method so the audio thread can drive any
/// sink without allocation; closures implement it for free.
pub trait EventSink {
    /// Accept one event. Must not allocate or block when driven from the
    /// audio thread.
    fn emit(&mut self, event: TimedEvent);
}

impl<F: FnMut(TimedEvent)> EventSink for F {
    fn emit(&mut self, event: TimedEvent) {
        self(event);
    }
}

/// Collecting sink for tests and offline rendering.
#[cfg(feature = "std")]
impl EventSink for Vec<TimedEvent> {
    fn emit(&mut self, event: TimedEvent) {
        self.push(event);
    }
}
