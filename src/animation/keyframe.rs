use crate::animation::tracks::InterpolationMode;

/// Two sampled frames bracketing a play position.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KeyframeSpan {
    pub before: usize,
    pub after: usize,
    /// Blend factor from `before` to `after`
    pub alpha: f32,
}

/// Resolves a normalized play position into the sampled frames around it.
///
/// Positions at or before the start clamp to frame 0, positions at or past
/// the end clamp to the last frame, both with a zero alpha. Step
/// interpolation always reports a zero alpha.
#[must_use]
pub fn time_to_index(normalized: f32, max_frames: usize, mode: InterpolationMode) -> KeyframeSpan {
    if max_frames < 2 || normalized.is_nan() || normalized <= 0.0 {
        return KeyframeSpan::default();
    }

    let last = max_frames - 1;
    if normalized >= 1.0 {
        return KeyframeSpan {
            before: last,
            after: last,
            alpha: 0.0,
        };
    }

    let position = normalized * last as f32;
    let before = (position.floor() as usize).min(last);
    let alpha = match mode {
        InterpolationMode::Step => 0.0,
        _ => position - before as f32,
    };

    KeyframeSpan {
        before,
        after: (before + 1).min(last),
        alpha,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_at_both_ends() {
        assert_eq!(time_to_index(-0.5, 20, InterpolationMode::Linear), KeyframeSpan::default());
        assert_eq!(time_to_index(0.0, 20, InterpolationMode::Linear), KeyframeSpan::default());

        let end = time_to_index(1.0, 20, InterpolationMode::Linear);
        assert_eq!((end.before, end.after), (19, 19));
        assert!(end.alpha.abs() < f32::EPSILON);
    }

    #[test]
    fn interior_splits_position() {
        let span = time_to_index(0.5, 21, InterpolationMode::Linear);
        assert_eq!((span.before, span.after), (10, 11));
        assert!(span.alpha.abs() < 1e-5);

        let span = time_to_index(0.525, 21, InterpolationMode::Linear);
        assert_eq!((span.before, span.after), (10, 11));
        assert!((span.alpha - 0.5).abs() < 1e-3);
    }

    #[test]
    fn step_has_no_alpha() {
        let span = time_to_index(0.525, 21, InterpolationMode::Step);
        assert_eq!(span.before, 10);
        assert!(span.alpha.abs() < f32::EPSILON);
    }

    #[test]
    fn single_frame_is_degenerate() {
        assert_eq!(time_to_index(0.7, 1, InterpolationMode::Linear), KeyframeSpan::default());
    }
}
