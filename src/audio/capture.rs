//! Recorded-artifact accumulation for one take.

/// Collects the processed mono samples that become the uploadable artifact.
/// Bounded by the hard-cap budget so a runaway stream cannot grow unchecked.
pub struct ArtifactBuffer {
    samples: Vec<f32>,
    max_samples: usize,
}

impl ArtifactBuffer {
    pub fn new(sample_rate: u32, budget_ms: u64) -> Self {
        let max_samples = ((budget_ms * u64::from(sample_rate)) / 1000).max(1) as usize;
        Self {
            samples: Vec::new(),
            max_samples,
        }
    }

    pub fn push_frame(&mut self, frame: &[f32]) {
        let room = self.max_samples.saturating_sub(self.samples.len());
        self.samples.extend_from_slice(&frame[..frame.len().min(room)]);
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}
