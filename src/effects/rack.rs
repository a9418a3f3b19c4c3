//! Declarative effects control: translates an [`EffectsConfig`] pushed by
//! the UI into chain membership changes and in-place parameter writes
//! against the graph.
//!
//! Each effect kind runs its own Disabled/Enabled transition: enabling
//! creates (or reuses) the stage and inserts it at its chain slot,
//! disabling removes it but retains the handle for cheap re-enable, and a
//! parameter change while enabled never touches the chain at all.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::reverb::reverb_impulse;
use super::{BiquadStage, ConvolverStage, EchoStage, FilterShape, WaveShaperStage};
use crate::common::{EngineError, Shared};
use crate::graph::{AudioGraph, EffectNode};

/// Flat effects record pushed by the UI on any change. The serialized
/// form is camelCase to match the front-end payloads and stored presets.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EffectsConfig {
    pub reverb_enabled: bool,
    pub reverb_amount: f32,
    pub echo_enabled: bool,
    /// Echo delay in seconds.
    pub echo_delay: f32,
    pub echo_feedback: f32,
    pub filter_enabled: bool,
    pub filter_type: FilterShape,
    /// Filter center/cutoff frequency in Hz.
    pub filter_frequency: f32,
    pub filter_q: f32,
    pub distortion_enabled: bool,
    pub distortion_amount: f32,
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self {
            reverb_enabled: false,
            reverb_amount: 0.3,
            echo_enabled: false,
            echo_delay: 0.5,
            echo_feedback: 0.4,
            filter_enabled: false,
            filter_type: FilterShape::Lowpass,
            filter_frequency: 1000.0,
            filter_q: 1.0,
            distortion_enabled: false,
            distortion_amount: 0.3,
        }
    }
}

impl EffectsConfig {
    /// Parse a stored preset blob.
    pub fn from_json(raw: &str) -> Result<Self, EngineError> {
        serde_json::from_str(raw).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Serialize for the preset store.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Holds the stage handles for all four effect kinds and drives the graph
/// from config transitions.
#[derive(Default)]
pub struct EffectsRack {
    applied: EffectsConfig,
    distortion: Option<Shared<WaveShaperStage>>,
    filter: Option<Shared<BiquadStage>>,
    echo: Option<Shared<EchoStage>>,
    reverb: Option<Shared<ConvolverStage>>,
}

impl EffectsRack {
    pub fn new() -> Self {
        Self::default()
    }

    /// The configuration currently in effect.
    pub fn applied(&self) -> &EffectsConfig {
        &self.applied
    }

    /// Reconcile the graph with `config`.
    pub fn apply(&mut self, graph: &AudioGraph, config: &EffectsConfig) -> Result<(), EngineError> {
        self.apply_distortion(graph, config)?;
        self.apply_filter(graph, config)?;
        self.apply_echo(graph, config)?;
        self.apply_reverb(graph, config)?;
        self.applied = config.clone();
        Ok(())
    }

    /// Drop every stage from the chain and forget the retained handles.
    pub fn detach_all(&mut self, graph: &AudioGraph) {
        graph.clear_effects();
        self.distortion = None;
        self.filter = None;
        self.echo = None;
        self.reverb = None;
        self.applied = EffectsConfig {
            reverb_enabled: false,
            echo_enabled: false,
            filter_enabled: false,
            distortion_enabled: false,
            ..self.applied.clone()
        };
    }

    fn apply_distortion(
        &mut self,
        graph: &AudioGraph,
        config: &EffectsConfig,
    ) -> Result<(), EngineError> {
        match (self.applied.distortion_enabled, config.distortion_enabled) {
            (false, true) => {
                let stage = self
                    .distortion
                    .get_or_insert_with(|| {
                        Arc::new(Mutex::new(WaveShaperStage::new(config.distortion_amount)))
                    })
                    .clone();
                stage.lock().set_amount(config.distortion_amount);
                graph.add_effect(EffectNode::Distortion(stage))?;
            }
            (true, false) => {
                if let Some(stage) = &self.distortion {
                    graph.remove_effect(&EffectNode::Distortion(stage.clone()));
                }
            }
            (true, true) => {
                if config.distortion_amount != self.applied.distortion_amount {
                    if let Some(stage) = &self.distortion {
                        stage.lock().set_amount(config.distortion_amount);
                    }
                }
            }
            (false, false) => {}
        }
        Ok(())
    }

    fn apply_filter(
        &mut self,
        graph: &AudioGraph,
        config: &EffectsConfig,
    ) -> Result<(), EngineError> {
        match (self.applied.filter_enabled, config.filter_enabled) {
            (false, true) => {
                let sample_rate = graph.sample_rate();
                let stage = self
                    .filter
                    .get_or_insert_with(|| {
                        Arc::new(Mutex::new(BiquadStage::new(
                            config.filter_type,
                            config.filter_frequency,
                            config.filter_q,
                            sample_rate,
                        )))
                    })
                    .clone();
                {
                    let mut filter = stage.lock();
                    filter.set_shape(config.filter_type);
                    filter.set_frequency(config.filter_frequency);
                    filter.set_q(config.filter_q);
                }
                graph.add_effect(EffectNode::Filter(stage))?;
            }
            (true, false) => {
                if let Some(stage) = &self.filter {
                    graph.remove_effect(&EffectNode::Filter(stage.clone()));
                }
            }
            (true, true) => {
                if let Some(stage) = &self.filter {
                    let mut filter = stage.lock();
                    if config.filter_type != self.applied.filter_type {
                        filter.set_shape(config.filter_type);
                    }
                    if config.filter_frequency != self.applied.filter_frequency {
                        filter.set_frequency(config.filter_frequency);
                    }
                    if config.filter_q != self.applied.filter_q {
                        filter.set_q(config.filter_q);
                    }
                }
            }
            (false, false) => {}
        }
        Ok(())
    }

    fn apply_echo(&mut self, graph: &AudioGraph, config: &EffectsConfig) -> Result<(), EngineError> {
        match (self.applied.echo_enabled, config.echo_enabled) {
            (false, true) => {
                let sample_rate = graph.sample_rate();
                let stage = self
                    .echo
                    .get_or_insert_with(|| {
                        Arc::new(Mutex::new(EchoStage::new(
                            config.echo_delay,
                            config.echo_feedback,
                            sample_rate,
                        )))
                    })
                    .clone();
                {
                    let mut echo = stage.lock();
                    echo.set_delay(config.echo_delay);
                    echo.set_feedback(config.echo_feedback);
                }
                graph.add_effect(EffectNode::Echo(stage))?;
            }
            (true, false) => {
                if let Some(stage) = &self.echo {
                    graph.remove_effect(&EffectNode::Echo(stage.clone()));
                }
            }
            (true, true) => {
                if let Some(stage) = &self.echo {
                    let mut echo = stage.lock();
                    if config.echo_delay != self.applied.echo_delay {
                        echo.set_delay(config.echo_delay);
                    }
                    if config.echo_feedback != self.applied.echo_feedback {
                        echo.set_feedback(config.echo_feedback);
                    }
                }
            }
            (false, false) => {}
        }
        Ok(())
    }

    fn apply_reverb(
        &mut self,
        graph: &AudioGraph,
        config: &EffectsConfig,
    ) -> Result<(), EngineError> {
        match (self.applied.reverb_enabled, config.reverb_enabled) {
            (false, true) => {
                let stage = self
                    .reverb
                    .get_or_insert_with(|| {
                        let reverb = &graph.config().reverb;
                        let impulse = reverb_impulse(
                            graph.sample_rate(),
                            reverb.impulse_duration_secs,
                            reverb.impulse_decay,
                        );
                        Arc::new(Mutex::new(ConvolverStage::new(config.reverb_amount, impulse)))
                    })
                    .clone();
                stage.lock().set_mix(config.reverb_amount);
                graph.add_effect(EffectNode::Reverb(stage))?;
            }
            (true, false) => {
                if let Some(stage) = &self.reverb {
                    graph.remove_effect(&EffectNode::Reverb(stage.clone()));
                }
            }
            (true, true) => {
                if config.reverb_amount != self.applied.reverb_amount {
                    if let Some(stage) = &self.reverb {
                        stage.lock().set_mix(config.reverb_amount);
                    }
                }
            }
            (false, false) => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::graph::EffectKind;

    fn small_graph() -> AudioGraph {
        // A short reverb impulse keeps test convolver setup cheap.
        let mut config = EngineConfig::default();
        config.reverb.impulse_duration_secs = 0.05;
        AudioGraph::new(config)
    }

    fn all_enabled() -> EffectsConfig {
        EffectsConfig {
            reverb_enabled: true,
            echo_enabled: true,
            filter_enabled: true,
            distortion_enabled: true,
            ..EffectsConfig::default()
        }
    }

    #[test]
    fn chain_order_is_fixed_regardless_of_toggle_order() {
        let orders: [&[fn(&mut EffectsConfig)]; 3] = [
            &[
                |c| c.reverb_enabled = true,
                |c| c.distortion_enabled = true,
                |c| c.echo_enabled = true,
                |c| c.filter_enabled = true,
            ],
            &[
                |c| c.echo_enabled = true,
                |c| c.reverb_enabled = true,
                |c| c.filter_enabled = true,
                |c| c.distortion_enabled = true,
            ],
            &[
                |c| c.filter_enabled = true,
                |c| c.distortion_enabled = true,
                |c| c.reverb_enabled = true,
                |c| c.echo_enabled = true,
            ],
        ];

        for toggles in orders {
            let graph = small_graph();
            let mut rack = EffectsRack::new();
            let mut config = EffectsConfig::default();
            for toggle in toggles {
                toggle(&mut config);
                rack.apply(&graph, &config).unwrap();
            }
            assert_eq!(
                graph.chain_kinds(),
                vec![
                    EffectKind::Distortion,
                    EffectKind::Filter,
                    EffectKind::Echo,
                    EffectKind::Reverb
                ]
            );
        }
    }

    #[test]
    fn parameter_change_preserves_node_identity() {
        let graph = small_graph();
        let mut rack = EffectsRack::new();
        let mut config = EffectsConfig {
            echo_enabled: true,
            ..EffectsConfig::default()
        };
        rack.apply(&graph, &config).unwrap();

        let before = graph.effect(EffectKind::Echo).expect("echo wired");

        config.echo_feedback = 0.7;
        rack.apply(&graph, &config).unwrap();

        let after = graph.effect(EffectKind::Echo).expect("echo still wired");
        assert!(before.same_node(&after), "chain must keep the same node");

        // The coefficient write landed on that very node.
        let held = rack.echo.as_ref().unwrap();
        assert_eq!(held.lock().feedback(), 0.7);
    }

    #[test]
    fn filter_subtype_switch_is_in_place() {
        let graph = small_graph();
        let mut rack = EffectsRack::new();
        let mut config = EffectsConfig {
            filter_enabled: true,
            ..EffectsConfig::default()
        };
        rack.apply(&graph, &config).unwrap();
        let before = graph.effect(EffectKind::Filter).unwrap();

        config.filter_type = FilterShape::Notch;
        rack.apply(&graph, &config).unwrap();

        let after = graph.effect(EffectKind::Filter).unwrap();
        assert!(before.same_node(&after));
        assert_eq!(rack.filter.as_ref().unwrap().lock().shape(), FilterShape::Notch);
    }

    #[test]
    fn distortion_amount_change_keeps_node() {
        let graph = small_graph();
        let mut rack = EffectsRack::new();
        let mut config = EffectsConfig {
            distortion_enabled: true,
            ..EffectsConfig::default()
        };
        rack.apply(&graph, &config).unwrap();
        let before = graph.effect(EffectKind::Distortion).unwrap();

        config.distortion_amount = 0.9;
        rack.apply(&graph, &config).unwrap();

        assert!(before.same_node(&graph.effect(EffectKind::Distortion).unwrap()));
        assert_eq!(rack.distortion.as_ref().unwrap().lock().amount(), 0.9);
    }

    #[test]
    fn reenable_does_not_double_insert() {
        let graph = small_graph();
        let mut rack = EffectsRack::new();
        let mut config = EffectsConfig {
            echo_enabled: true,
            ..EffectsConfig::default()
        };
        rack.apply(&graph, &config).unwrap();
        let first = graph.effect(EffectKind::Echo).unwrap();

        config.echo_enabled = false;
        rack.apply(&graph, &config).unwrap();
        assert_eq!(graph.chain_len(), 0);

        config.echo_enabled = true;
        rack.apply(&graph, &config).unwrap();
        assert_eq!(graph.chain_len(), 1);

        // The retained handle was reused, not recreated.
        let second = graph.effect(EffectKind::Echo).unwrap();
        assert!(first.same_node(&second));
    }

    #[test]
    fn disable_all_empties_the_chain() {
        let graph = small_graph();
        let mut rack = EffectsRack::new();
        rack.apply(&graph, &all_enabled()).unwrap();
        assert_eq!(graph.chain_len(), 4);

        rack.apply(&graph, &EffectsConfig::default()).unwrap();
        assert_eq!(graph.chain_len(), 0);
    }

    #[test]
    fn detach_all_is_idempotent() {
        let graph = small_graph();
        let mut rack = EffectsRack::new();
        rack.apply(&graph, &all_enabled()).unwrap();

        rack.detach_all(&graph);
        assert_eq!(graph.chain_len(), 0);
        rack.detach_all(&graph);
        assert_eq!(graph.chain_len(), 0);
    }

    #[test]
    fn config_round_trips_as_camel_case_json() {
        let config = EffectsConfig {
            filter_enabled: true,
            filter_type: FilterShape::Bandpass,
            ..EffectsConfig::default()
        };
        let json = config.to_json();
        assert!(json.contains("\"filterEnabled\":true"));
        assert!(json.contains("\"filterType\":\"bandpass\""));

        let parsed = EffectsConfig::from_json(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let parsed =
            EffectsConfig::from_json(r#"{"reverbEnabled":true,"reverbAmount":0.6}"#).unwrap();
        assert!(parsed.reverb_enabled);
        assert_eq!(parsed.reverb_amount, 0.6);
        assert_eq!(parsed.echo_delay, 0.5);
        assert!(!parsed.echo_enabled);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = EffectsConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
