//! Demonstrator.
use anyhow::Result;
use ndarray::Array1;

/// A scripted expert producing demonstrations from the full state.
pub trait DemoPolicy {
    /// Called at the beginning of every demonstration episode.
    fn reset(&mut self);

    /// Action for the given state, in the environment's own scale.
    fn choose_action(&mut self, state: &Array1<f32>) -> Result<Array1<f32>>;
}
