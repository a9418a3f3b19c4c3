//! The effects graph: one processing context, one analysis tap, one
//! source, one ordered chain of effect nodes.
//!
//! The graph is an explicitly constructed [`AudioGraph`] rather than
//! process-wide static state, so every test owns its own instance. All
//! mutation and rendering serialize on a single internal lock — a chain
//! edit is never observed half-applied by a render happening on another
//! thread.

pub mod node;

pub use node::{EffectKind, EffectNode};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::analysis::AnalysisTap;
use crate::common::EngineError;
use crate::config::EngineConfig;
use crate::source::SourceHandle;

/// Context lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphState {
    /// Created but not yet resumed (autoplay-policy analog); renders
    /// silence.
    Suspended,
    Running,
    /// Torn down; the next context access builds a fresh core.
    Closed,
}

struct GraphCore {
    state: GraphState,
    source: Option<SourceHandle>,
    chain: Vec<EffectNode>,
    tap: AnalysisTap,
}

/// The engine's shared audio context and signal-routing state.
pub struct AudioGraph {
    config: EngineConfig,
    core: Mutex<Option<GraphCore>>,
}

impl AudioGraph {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            core: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// Lazily create the context if absent or previously torn down.
    /// This is the single typed failure point for capability problems.
    pub fn context(&self) -> Result<GraphState, EngineError> {
        let mut guard = self.core.lock();
        let core = self.ensure_core(&mut guard)?;
        Ok(core.state)
    }

    /// Current lifecycle state without creating anything.
    pub fn state(&self) -> GraphState {
        match self.core.lock().as_ref() {
            Some(core) => core.state,
            None => GraphState::Closed,
        }
    }

    /// Lazily create and (re)configure the analysis tap.
    pub fn configure_tap(&self, window_size: usize, smoothing: f32) -> Result<(), EngineError> {
        let mut guard = self.core.lock();
        let core = self.ensure_core(&mut guard)?;
        core.tap.configure(window_size, smoothing);
        Ok(())
    }

    /// Wire a new source in front of the chain, replacing any prior one.
    pub fn connect_source(&self, source: SourceHandle) -> Result<(), EngineError> {
        let mut guard = self.core.lock();
        let core = self.ensure_core(&mut guard)?;
        if core.source.take().is_some() {
            debug!("replacing previously connected source");
        }
        core.source = Some(source);
        Ok(())
    }

    /// Disconnect `source` if it is the one currently wired.
    ///
    /// Stale handles and double disconnects are expected races between
    /// chain edits and source swaps; they are logged and swallowed.
    pub fn disconnect_source(&self, source: &SourceHandle) {
        let mut guard = self.core.lock();
        let Some(core) = guard.as_mut() else {
            debug!("disconnect on a closed context ignored");
            return;
        };
        let wired = core
            .source
            .as_ref()
            .map(|current| current.same_source(source));
        match wired {
            Some(true) => {
                core.source = None;
                debug!("source disconnected");
            }
            Some(false) => debug!("disconnect for a source that is no longer wired"),
            None => debug!("disconnect with nothing connected"),
        }
    }

    /// Insert an effect node at its kind's slot and rewire the chain.
    ///
    /// A node already present is left alone; a different node of the same
    /// kind is replaced. Ordering always ends up
    /// [distortion, filter, echo, reverb].
    pub fn add_effect(&self, node: EffectNode) -> Result<(), EngineError> {
        let mut guard = self.core.lock();
        let core = self.ensure_core(&mut guard)?;

        if core.chain.iter().any(|n| n.same_node(&node)) {
            debug!("{:?} node already in chain", node.kind());
            return Ok(());
        }
        if let Some(pos) = core.chain.iter().position(|n| n.kind() == node.kind()) {
            warn!("replacing existing {:?} stage in chain", node.kind());
            core.chain.remove(pos).reset();
        }

        let slot = core
            .chain
            .partition_point(|n| n.kind().priority() < node.kind().priority());
        core.chain.insert(slot, node);
        debug!("chain rewired: {:?}", Self::kinds_of(&core.chain));
        Ok(())
    }

    /// Remove a node from the chain and rewire. Removing a node that is
    /// not wired (double removal) is tolerated.
    pub fn remove_effect(&self, node: &EffectNode) {
        let mut guard = self.core.lock();
        let Some(core) = guard.as_mut() else {
            debug!("remove on a closed context ignored");
            return;
        };
        match core.chain.iter().position(|n| n.same_node(node)) {
            Some(pos) => {
                let removed = core.chain.remove(pos);
                removed.reset();
                debug!("removed {:?}, chain now {:?}", removed.kind(), Self::kinds_of(&core.chain));
            }
            None => debug!("remove for a {:?} node not in the chain", node.kind()),
        }
    }

    /// Disconnect and drop every chain stage; source feeds the tap
    /// directly afterwards. Idempotent.
    pub fn clear_effects(&self) {
        let mut guard = self.core.lock();
        let Some(core) = guard.as_mut() else {
            return;
        };
        for node in core.chain.drain(..) {
            node.reset();
        }
        debug!("effects chain cleared");
    }

    /// Ordered kinds currently in the chain.
    pub fn chain_kinds(&self) -> Vec<EffectKind> {
        match self.core.lock().as_ref() {
            Some(core) => Self::kinds_of(&core.chain),
            None => Vec::new(),
        }
    }

    pub fn chain_len(&self) -> usize {
        self.core.lock().as_ref().map_or(0, |core| core.chain.len())
    }

    /// Handle of the chain's node of `kind`, if wired.
    pub fn effect(&self, kind: EffectKind) -> Option<EffectNode> {
        self.core
            .lock()
            .as_ref()
            .and_then(|core| core.chain.iter().find(|n| n.kind() == kind).cloned())
    }

    /// Resume a suspended context. Safe to call repeatedly; a running
    /// context is left alone.
    pub fn resume(&self) -> Result<(), EngineError> {
        let mut guard = self.core.lock();
        let core = self.ensure_core(&mut guard)?;
        if core.state == GraphState::Suspended {
            core.state = GraphState::Running;
            info!("audio context running");
        }
        Ok(())
    }

    /// Disconnect everything and release the context. The next
    /// [`context`](Self::context) call builds a fresh instance.
    pub fn teardown(&self) {
        let mut guard = self.core.lock();
        if let Some(mut core) = guard.take() {
            for node in core.chain.drain(..) {
                node.reset();
            }
            core.source = None;
            info!("audio context closed");
        }
    }

    /// Render one host block: source → chain stages in order → tap.
    /// The processed signal is left in `out` for the output device.
    /// Suspended, closed or source-less graphs emit silence.
    pub fn render(&self, out: &mut [f32]) {
        out.fill(0.0);
        let mut guard = self.core.lock();
        let Some(core) = guard.as_mut() else {
            return;
        };
        if core.state != GraphState::Running {
            return;
        }
        let Some(source) = core.source.as_ref() else {
            return;
        };

        let written = source.pull(out);
        out[written..].fill(0.0);

        for node in core.chain.iter() {
            node.process(out);
        }
        core.tap.push(out);
    }

    pub(crate) fn has_source(&self) -> bool {
        self.core
            .lock()
            .as_ref()
            .is_some_and(|core| core.source.is_some())
    }

    pub(crate) fn with_tap<R>(&self, f: impl FnOnce(&mut AnalysisTap) -> R) -> Option<R> {
        let mut guard = self.core.lock();
        guard.as_mut().map(|core| f(&mut core.tap))
    }

    fn ensure_core<'a>(
        &self,
        guard: &'a mut Option<GraphCore>,
    ) -> Result<&'a mut GraphCore, EngineError> {
        if guard.is_none() {
            if self.config.sample_rate == 0 {
                return Err(EngineError::ContextUnavailable(
                    "sample rate must be non-zero".into(),
                ));
            }
            info!("creating audio context at {} Hz", self.config.sample_rate);
            *guard = Some(GraphCore {
                state: GraphState::Suspended,
                source: None,
                chain: Vec::new(),
                tap: AnalysisTap::new(
                    self.config.analysis.window_size,
                    self.config.analysis.smoothing,
                ),
            });
        }
        guard
            .as_mut()
            .ok_or_else(|| EngineError::ContextUnavailable("context initialization failed".into()))
    }

    fn kinds_of(chain: &[EffectNode]) -> Vec<EffectKind> {
        chain.iter().map(|n| n.kind()).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::effects::{BiquadStage, EchoStage, FilterShape, WaveShaperStage};
    use crate::source::{BufferSource, SourceHandle};

    fn graph() -> AudioGraph {
        AudioGraph::new(EngineConfig::default())
    }

    fn echo_node() -> EffectNode {
        EffectNode::Echo(Arc::new(Mutex::new(EchoStage::new(0.2, 0.4, 44100))))
    }

    fn filter_node() -> EffectNode {
        EffectNode::Filter(Arc::new(Mutex::new(BiquadStage::new(
            FilterShape::Lowpass,
            1000.0,
            1.0,
            44100,
        ))))
    }

    fn distortion_node() -> EffectNode {
        EffectNode::Distortion(Arc::new(Mutex::new(WaveShaperStage::new(0.3))))
    }

    #[test]
    fn context_lifecycle() {
        let graph = graph();
        assert_eq!(graph.state(), GraphState::Closed);
        assert_eq!(graph.context().unwrap(), GraphState::Suspended);
        graph.resume().unwrap();
        graph.resume().unwrap(); // repeated resume is a no-op
        assert_eq!(graph.state(), GraphState::Running);
        graph.teardown();
        assert_eq!(graph.state(), GraphState::Closed);
        // A fresh core comes back suspended.
        assert_eq!(graph.context().unwrap(), GraphState::Suspended);
    }

    #[test]
    fn zero_sample_rate_is_unavailable() {
        let mut config = EngineConfig::default();
        config.sample_rate = 0;
        let graph = AudioGraph::new(config);
        assert!(matches!(
            graph.context(),
            Err(EngineError::ContextUnavailable(_))
        ));
    }

    #[test]
    fn chain_keeps_priority_order() {
        let graph = graph();
        graph.add_effect(echo_node()).unwrap();
        graph.add_effect(distortion_node()).unwrap();
        graph.add_effect(filter_node()).unwrap();
        assert_eq!(
            graph.chain_kinds(),
            vec![EffectKind::Distortion, EffectKind::Filter, EffectKind::Echo]
        );
    }

    #[test]
    fn adding_same_node_twice_is_ignored() {
        let graph = graph();
        let node = echo_node();
        graph.add_effect(node.clone()).unwrap();
        graph.add_effect(node).unwrap();
        assert_eq!(graph.chain_len(), 1);
    }

    #[test]
    fn remove_twice_is_tolerated() {
        let graph = graph();
        let node = echo_node();
        graph.add_effect(node.clone()).unwrap();
        graph.remove_effect(&node);
        graph.remove_effect(&node);
        assert_eq!(graph.chain_len(), 0);
    }

    #[test]
    fn clear_effects_is_idempotent() {
        let graph = graph();
        graph.add_effect(echo_node()).unwrap();
        graph.clear_effects();
        assert_eq!(graph.chain_len(), 0);
        graph.clear_effects();
        assert_eq!(graph.chain_len(), 0);
    }

    #[test]
    fn double_disconnect_is_tolerated() {
        let graph = graph();
        let handle = SourceHandle::new(BufferSource::new(vec![0.0; 16]));
        graph.connect_source(handle.clone()).unwrap();
        graph.disconnect_source(&handle);
        graph.disconnect_source(&handle);
        assert!(!graph.has_source());
    }

    #[test]
    fn stale_handle_disconnect_leaves_current_source() {
        let graph = graph();
        let old = SourceHandle::new(BufferSource::new(vec![0.0; 16]));
        let new = SourceHandle::new(BufferSource::new(vec![0.0; 16]));
        graph.connect_source(old.clone()).unwrap();
        graph.connect_source(new).unwrap();
        graph.disconnect_source(&old);
        assert!(graph.has_source());
    }

    #[test]
    fn suspended_graph_renders_silence() {
        let graph = graph();
        let handle = SourceHandle::new(BufferSource::new(vec![0.5; 256]));
        graph.connect_source(handle).unwrap();
        let mut out = [1.0f32; 64];
        graph.render(&mut out);
        assert!(out.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn running_graph_passes_source_through_empty_chain() {
        let graph = graph();
        let handle = SourceHandle::new(BufferSource::new(vec![0.5; 256]));
        graph.connect_source(handle).unwrap();
        graph.resume().unwrap();
        let mut out = [0.0f32; 64];
        graph.render(&mut out);
        assert!(out.iter().all(|s| (*s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn teardown_drops_chain_and_source() {
        let graph = graph();
        graph.add_effect(echo_node()).unwrap();
        let handle = SourceHandle::new(BufferSource::new(vec![0.5; 16]));
        graph.connect_source(handle).unwrap();
        graph.teardown();
        assert_eq!(graph.chain_len(), 0);
        assert!(!graph.has_source());
    }
}
