use crate::animation::values::Interpolatable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InterpolationMode {
    #[default]
    Linear,
    Step,
    CubicSpline,
}

/// Keyframed values of one channel.
///
/// For [`InterpolationMode::CubicSpline`] every keyframe stores three values
/// (in-tangent, value, out-tangent), so `values.len() == times.len() * 3`.
#[derive(Debug, Clone)]
pub struct KeyframeTrack<T: Interpolatable> {
    pub times: Vec<f32>,
    pub values: Vec<T>,
    pub interpolation: InterpolationMode,
}

impl<T: Interpolatable> KeyframeTrack<T> {
    #[must_use]
    pub fn new(times: Vec<f32>, values: Vec<T>, interpolation: InterpolationMode) -> Self {
        Self {
            times,
            values,
            interpolation,
        }
    }

    /// Linear track from `(time, value)` pairs.
    #[must_use]
    pub fn linear(keys: &[(f32, T)]) -> Self {
        Self::new(
            keys.iter().map(|(t, _)| *t).collect(),
            keys.iter().map(|(_, v)| *v).collect(),
            InterpolationMode::Linear,
        )
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Time of the last keyframe, 0 for empty tracks.
    #[must_use]
    pub fn end_time(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    /// Samples the track, clamping outside the keyed range.
    ///
    /// Returns `None` for an empty track.
    #[must_use]
    pub fn sample(&self, time: f32) -> Option<T> {
        if self.times.is_empty() {
            return None;
        }
        // partition_point finds the first index where t > time, i.e. next_index
        let next_idx = self.times.partition_point(|&t| t <= time);
        let index = next_idx.saturating_sub(1);
        self.sample_at_frame(index, time)
    }

    /// For Linear/Step the index is used directly, for CubicSpline the value
    /// sits at `index * 3 + 1`.
    fn value_at(&self, index: usize) -> Option<T> {
        match self.interpolation {
            InterpolationMode::CubicSpline => self.values.get(index * 3 + 1).copied(),
            _ => self.values.get(index).copied(),
        }
    }

    fn sample_at_frame(&self, index: usize, time: f32) -> Option<T> {
        let len = self.times.len();
        if index >= len - 1 || time <= self.times[0] {
            let clamped = if time <= self.times[0] { 0 } else { len - 1 };
            return self.value_at(clamped);
        }

        let next_idx = index + 1;
        let t0 = self.times[index];
        let t1 = self.times[next_idx];
        let dt = t1 - t0;

        let t = if dt > 1e-6 { (time - t0) / dt } else { 0.0 };
        let t = t.clamp(0.0, 1.0);

        match self.interpolation {
            InterpolationMode::Step => self.value_at(index),
            InterpolationMode::Linear => {
                let v0 = self.value_at(index)?;
                let v1 = self.value_at(next_idx)?;
                Some(T::interpolate_linear(v0, v1, t))
            }
            InterpolationMode::CubicSpline => {
                let i_prev = index * 3;
                let i_next = next_idx * 3;

                let v0 = *self.values.get(i_prev + 1)?;
                let out_tangent0 = *self.values.get(i_prev + 2)?;
                let in_tangent1 = *self.values.get(i_next)?;
                let v1 = *self.values.get(i_next + 1)?;

                Some(T::interpolate_cubic(v0, out_tangent0, in_tangent1, v1, t, dt))
            }
        }
    }
}
