use tracing::warn;

use super::delay_line::DelayLine;
use super::EffectStage;

/// Longest supported echo delay, in seconds.
const MAX_DELAY_SECS: f32 = 5.0;
/// Wet level mixed back onto the dry signal.
const WET_MIX: f32 = 0.7;
/// Feedback ceiling; anything at or above 1.0 never decays.
const MAX_FEEDBACK: f32 = 0.95;

/// Feedback delay ("echo") stage.
///
/// One delay line per channel. `delay` and `feedback` are plain field
/// writes, so the rack can retune a running echo without touching the
/// chain and without audible discontinuities.
pub struct EchoStage {
    delay_secs: f32,
    feedback: f32,
    sample_rate: u32,
    left: DelayLine,
    right: DelayLine,
}

impl EchoStage {
    pub fn new(delay_secs: f32, feedback: f32, sample_rate: u32) -> Self {
        let size = (MAX_DELAY_SECS * sample_rate as f32) as usize + 2;
        let mut stage = Self {
            delay_secs: 0.0,
            feedback: 0.0,
            sample_rate,
            left: DelayLine::new(size),
            right: DelayLine::new(size),
        };
        stage.set_delay(delay_secs);
        stage.set_feedback(feedback);
        stage
    }

    pub fn set_delay(&mut self, delay_secs: f32) {
        if !(0.001..=MAX_DELAY_SECS).contains(&delay_secs) {
            warn!("echo delay {delay_secs}s out of range, clamping");
        }
        self.delay_secs = delay_secs.clamp(0.001, MAX_DELAY_SECS);
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        if !(0.0..=MAX_FEEDBACK).contains(&feedback) {
            warn!("echo feedback {feedback} out of range, clamping");
        }
        self.feedback = feedback.clamp(0.0, MAX_FEEDBACK);
    }

    pub fn delay(&self) -> f32 {
        self.delay_secs
    }

    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    fn delay_samples(&self) -> f64 {
        self.delay_secs as f64 * self.sample_rate as f64
    }
}

impl EffectStage for EchoStage {
    fn process(&mut self, samples: &mut [f32]) {
        let delay = self.delay_samples();
        for frame in samples.chunks_exact_mut(2) {
            let wet_l = self.left.read(delay);
            let wet_r = self.right.read(delay);

            // Feed the repeat back into the line before mixing it out.
            self.left.write(frame[0] + wet_l * self.feedback);
            self.right.write(frame[1] + wet_r * self.feedback);

            frame[0] += wet_l * WET_MIX;
            frame[1] += wet_r * WET_MIX;
        }
    }

    fn reset(&mut self) {
        self.left.clear();
        self.right.clear();
    }
}
