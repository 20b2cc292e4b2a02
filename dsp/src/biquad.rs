//! Cascaded direct form I biquad filters.
//!
//! Each stage implements
//!
//! `y0 = b0*x0 + b1*x1 + b2*x2 + a1*y1 + a2*y2`
//!
//! with the feed-back coefficients already negated (normalized such that
//! `a0 = 1`). This is the coefficient layout produced by the usual filter
//! design tools for embedded targets: five values per stage,
//! `[b0, b1, b2, a1, a2]`, stages concatenated.
//!
//! The state of a stage holds the two previous inputs and the two previous
//! outputs `[x1, x2, y1, y2]`. It is only meaningful if samples are fed in
//! temporal order without gaps. Feeding out of order leaves the filter in an
//! undefined (but memory safe) state until [Cascade::reset].
use heapless::Vec;
use serde::{Deserialize, Serialize};

use super::macc;

/// Biquad coefficients `[b0, b1, b2, a1, a2]`.
pub type Coefficients = [f32; 5];

/// Biquad state `[x1, x2, y1, y2]`.
pub type State = [f32; 4];

/// Number of coefficients per biquad stage.
pub const COEFFICIENTS_PER_STAGE: usize = 5;

#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("{0} coefficients do not describe whole biquad stages")]
    CoefficientCount(usize),
    #[error("{0} stages exceed the cascade capacity")]
    TooManyStages(usize),
    #[error("input scale must be finite and positive")]
    InvalidScale,
}

/// A single second order section.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Biquad {
    pub ba: Coefficients,
}

impl Biquad {
    /// A stage that passes its input through unchanged.
    pub const IDENTITY: Self = Self {
        ba: [1., 0., 0., 0., 0.],
    };

    pub const fn new(ba: Coefficients) -> Self {
        Self { ba }
    }

    /// Overall DC gain of the stage.
    pub fn dc_gain(&self) -> f32 {
        let [b0, b1, b2, a1, a2] = self.ba;
        (b0 + b1 + b2) / (1. - a1 - a2)
    }

    /// Feed a new input value into the filter, update the filter state, and
    /// return the new output. Only the state `xy` is modified.
    ///
    /// # Arguments
    /// * `xy` - Current filter state.
    /// * `x0` - New input.
    pub fn update(&self, xy: &mut State, x0: f32) -> f32 {
        let [x1, x2, y1, y2] = *xy;
        let y0 = macc(0., &[x0, x1, x2, y1, y2], &self.ba);
        *xy = [x0, x1, y0, y1];
        y0
    }
}

/// Up to `N` biquad stages in series, each with its own state.
#[derive(Clone, Debug)]
pub struct Cascade<const N: usize> {
    stages: Vec<Biquad, N>,
    state: Vec<State, N>,
}

impl<const N: usize> Cascade<N> {
    /// Build a cascade from concatenated stage coefficients.
    ///
    /// # Args
    /// * `coefficients` - `5 * stage_count` values, `[b0, b1, b2, a1, a2]` per stage.
    /// * `stage_count` - The number of biquad stages.
    ///
    /// The state of every stage starts out zeroed.
    pub fn new(
        coefficients: &[f32],
        stage_count: usize,
    ) -> Result<Self, FilterError> {
        if stage_count > N {
            return Err(FilterError::TooManyStages(stage_count));
        }
        if stage_count == 0
            || coefficients.len() != stage_count * COEFFICIENTS_PER_STAGE
        {
            return Err(FilterError::CoefficientCount(coefficients.len()));
        }

        let mut stages = Vec::new();
        for ba in coefficients.chunks_exact(COEFFICIENTS_PER_STAGE) {
            let mut stage = Biquad::default();
            stage.ba.copy_from_slice(ba);
            // Capacity was checked above.
            stages.push(stage).ok();
        }

        let mut state = Vec::new();
        state.resize(stage_count, [0.; 4]).ok();

        Ok(Self { stages, state })
    }

    pub fn stages(&self) -> &[Biquad] {
        &self.stages
    }

    pub fn state(&self) -> &[State] {
        &self.state
    }

    /// Clear the filter history of all stages.
    pub fn reset(&mut self) {
        self.state.iter_mut().for_each(|xy| *xy = [0.; 4]);
    }

    /// Process one sample through all stages.
    pub fn update(&mut self, x0: f32) -> f32 {
        self.stages
            .iter()
            .zip(self.state.iter_mut())
            .fold(x0, |x, (stage, xy)| stage.update(xy, x))
    }
}
