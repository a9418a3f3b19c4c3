use std::sync::Arc;

use crate::common::Shared;
use crate::effects::{BiquadStage, ConvolverStage, EchoStage, EffectStage, WaveShaperStage};

/// The four effect kinds, in fixed chain order: distortion first for
/// character, reverb last for ambience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EffectKind {
    Distortion,
    Filter,
    Echo,
    Reverb,
}

impl EffectKind {
    /// Slot index in the chain ordering.
    pub fn priority(self) -> usize {
        match self {
            Self::Distortion => 0,
            Self::Filter => 1,
            Self::Echo => 2,
            Self::Reverb => 3,
        }
    }
}

/// Cloneable handle to a live processing stage.
///
/// Clones refer to the same underlying node, so a parameter written
/// through the rack's handle is picked up by the copy sitting in the
/// chain — node identity survives parameter changes.
#[derive(Clone)]
pub enum EffectNode {
    Distortion(Shared<WaveShaperStage>),
    Filter(Shared<BiquadStage>),
    Echo(Shared<EchoStage>),
    Reverb(Shared<ConvolverStage>),
}

impl EffectNode {
    pub fn kind(&self) -> EffectKind {
        match self {
            Self::Distortion(_) => EffectKind::Distortion,
            Self::Filter(_) => EffectKind::Filter,
            Self::Echo(_) => EffectKind::Echo,
            Self::Reverb(_) => EffectKind::Reverb,
        }
    }

    /// Identity comparison: true when both handles wrap the same stage.
    pub fn same_node(&self, other: &EffectNode) -> bool {
        match (self, other) {
            (Self::Distortion(a), Self::Distortion(b)) => Arc::ptr_eq(a, b),
            (Self::Filter(a), Self::Filter(b)) => Arc::ptr_eq(a, b),
            (Self::Echo(a), Self::Echo(b)) => Arc::ptr_eq(a, b),
            (Self::Reverb(a), Self::Reverb(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub(crate) fn process(&self, samples: &mut [f32]) {
        match self {
            Self::Distortion(stage) => stage.lock().process(samples),
            Self::Filter(stage) => stage.lock().process(samples),
            Self::Echo(stage) => stage.lock().process(samples),
            Self::Reverb(stage) => stage.lock().process(samples),
        }
    }

    /// Drop any internal state (delay tails, filter memory). Used when a
    /// node leaves the chain so it re-enters silent later.
    pub(crate) fn reset(&self) {
        match self {
            Self::Distortion(stage) => stage.lock().reset(),
            Self::Filter(stage) => stage.lock().reset(),
            Self::Echo(stage) => stage.lock().reset(),
            Self::Reverb(stage) => stage.lock().reset(),
        }
    }
}
