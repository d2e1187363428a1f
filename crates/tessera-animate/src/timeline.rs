//! Phase durations and the pure `(timeline, elapsed) -> state` mapping.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::AnimateError;
use crate::phase::Phase;

/// Nominal phase durations (at speed `1.0`) and the speed multiplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Source image fade-in, in milliseconds.
    pub source_image_ms: u64,
    /// Source to edge field crossfade, in milliseconds.
    pub edge_visualization_ms: u64,
    /// Point reveal, in milliseconds.
    pub point_cloud_ms: u64,
    /// Wireframe reveal, in milliseconds.
    pub wireframe_ms: u64,
    /// Color fill, in milliseconds.
    pub color_fill_ms: u64,
    /// Wireframe fade-out, in milliseconds.
    pub edge_fade_out_ms: u64,
    /// Playback speed. Every duration is divided by it.
    pub speed: f64,
}

impl TimelineConfig {
    /// Default source image fade-in.
    pub const DEFAULT_SOURCE_IMAGE_MS: u64 = 800;
    /// Default edge crossfade.
    pub const DEFAULT_EDGE_VISUALIZATION_MS: u64 = 1200;
    /// Default point reveal.
    pub const DEFAULT_POINT_CLOUD_MS: u64 = 1200;
    /// Default wireframe reveal.
    pub const DEFAULT_WIREFRAME_MS: u64 = 1800;
    /// Default color fill.
    pub const DEFAULT_COLOR_FILL_MS: u64 = 2000;
    /// Default wireframe fade-out.
    pub const DEFAULT_EDGE_FADE_OUT_MS: u64 = 800;
    /// Default playback speed.
    pub const DEFAULT_SPEED: f64 = 1.0;

    /// Nominal duration of `phase` in milliseconds (`0` for `Complete`).
    #[must_use]
    pub const fn nominal_ms(&self, phase: Phase) -> u64 {
        match phase {
            Phase::SourceImage => self.source_image_ms,
            Phase::EdgeVisualization => self.edge_visualization_ms,
            Phase::PointCloud => self.point_cloud_ms,
            Phase::Wireframe => self.wireframe_ms,
            Phase::ColorFill => self.color_fill_ms,
            Phase::EdgeFadeOut => self.edge_fade_out_ms,
            Phase::Complete => 0,
        }
    }

    /// Check the speed multiplier.
    ///
    /// # Errors
    ///
    /// Returns [`AnimateError::InvalidSpeed`] if `speed` is not a finite
    /// positive number.
    pub fn validate(&self) -> Result<(), AnimateError> {
        if self.speed.is_finite() && self.speed > 0.0 {
            Ok(())
        } else {
            Err(AnimateError::InvalidSpeed(self.speed))
        }
    }
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            source_image_ms: Self::DEFAULT_SOURCE_IMAGE_MS,
            edge_visualization_ms: Self::DEFAULT_EDGE_VISUALIZATION_MS,
            point_cloud_ms: Self::DEFAULT_POINT_CLOUD_MS,
            wireframe_ms: Self::DEFAULT_WIREFRAME_MS,
            color_fill_ms: Self::DEFAULT_COLOR_FILL_MS,
            edge_fade_out_ms: Self::DEFAULT_EDGE_FADE_OUT_MS,
            speed: Self::DEFAULT_SPEED,
        }
    }
}

/// A timed phase and where it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// The phase.
    pub phase: Phase,
    /// Offset from animation start.
    pub start: Duration,
    /// Scaled duration.
    pub length: Duration,
}

impl Span {
    /// Offset at which the phase ends.
    #[must_use]
    pub fn end(&self) -> Duration {
        self.start.saturating_add(self.length)
    }
}

/// Speed-scaled phase spans with cumulative start offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    spans: [Span; 6],
}

impl Timeline {
    /// Scale the configured durations by the speed.
    ///
    /// # Errors
    ///
    /// Returns [`AnimateError::InvalidSpeed`] for a non-positive or
    /// non-finite speed.
    pub fn new(config: &TimelineConfig) -> Result<Self, AnimateError> {
        config.validate()?;
        Ok(Self::scaled(config))
    }

    fn scaled(config: &TimelineConfig) -> Self {
        let mut start = Duration::ZERO;
        let spans = Phase::TIMED.map(|phase| {
            #[allow(
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss,
                clippy::cast_precision_loss
            )]
            let nanos = (config.nominal_ms(phase) as f64 * 1e6 / config.speed).round() as u64;
            let length = Duration::from_nanos(nanos);
            let span = Span {
                phase,
                start,
                length,
            };
            start = start.saturating_add(length);
            span
        });
        Self { spans }
    }

    /// The timed phases in order.
    #[must_use]
    pub const fn spans(&self) -> &[Span; 6] {
        &self.spans
    }

    /// Offset at which `Complete` is reached.
    #[must_use]
    pub fn total(&self) -> Duration {
        self.spans[5].end()
    }

    /// Resolve the state at `elapsed` since the animation started.
    #[must_use]
    pub fn state_at(&self, elapsed: Duration) -> AnimationState {
        AnimationState::at(self, elapsed)
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::scaled(&TimelineConfig::default())
    }
}

/// The active phase and how far through it the animation is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnimationState {
    /// Active phase.
    pub phase: Phase,
    /// Fraction of the phase elapsed, always in `[0, 1]`.
    pub progress: f64,
    /// Time since the animation started.
    pub elapsed: Duration,
}

impl AnimationState {
    /// The state before the first tick.
    pub const START: Self = Self {
        phase: Phase::SourceImage,
        progress: 0.0,
        elapsed: Duration::ZERO,
    };

    /// Pure phase and progress lookup.
    ///
    /// Zero-length phases are passed over; once every span has ended the
    /// state is `Complete` with progress `1`.
    #[must_use]
    pub fn at(timeline: &Timeline, elapsed: Duration) -> Self {
        for span in timeline.spans() {
            if elapsed < span.end() {
                let into = elapsed.saturating_sub(span.start);
                let progress = (into.as_secs_f64() / span.length.as_secs_f64()).clamp(0.0, 1.0);
                return Self {
                    phase: span.phase,
                    progress,
                    elapsed,
                };
            }
        }
        Self {
            phase: Phase::Complete,
            progress: 1.0,
            elapsed,
        }
    }

    /// Whether the animation has finished.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Complete
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn default_total_is_seven_point_eight_seconds() {
        let timeline = Timeline::default();
        assert_eq!(timeline.total(), ms(7800));
        assert_eq!(timeline.spans()[3].start, ms(3200));
    }

    #[test]
    fn speed_divides_durations() {
        let config = TimelineConfig {
            speed: 2.0,
            ..TimelineConfig::default()
        };
        let timeline = Timeline::new(&config).unwrap();
        assert_eq!(timeline.total(), ms(3900));
        assert_eq!(timeline.spans()[0].length, ms(400));
    }

    #[test]
    fn invalid_speed_is_rejected() {
        for speed in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let config = TimelineConfig {
                speed,
                ..TimelineConfig::default()
            };
            assert!(matches!(
                Timeline::new(&config),
                Err(AnimateError::InvalidSpeed(_))
            ));
        }
    }

    #[test]
    fn state_resolves_phase_and_progress() {
        let timeline = Timeline::default();
        let s = timeline.state_at(ms(400));
        assert_eq!(s.phase, Phase::SourceImage);
        assert!((s.progress - 0.5).abs() < 1e-9);

        let s = timeline.state_at(ms(800));
        assert_eq!(s.phase, Phase::EdgeVisualization);
        assert!(s.progress.abs() < 1e-9);

        let s = timeline.state_at(ms(7799));
        assert_eq!(s.phase, Phase::EdgeFadeOut);

        let s = timeline.state_at(ms(7800));
        assert!(s.is_complete());
        assert!((s.progress - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn progress_always_in_unit_interval() {
        let timeline = Timeline::default();
        for t in (0..9000).step_by(37) {
            let s = timeline.state_at(ms(t));
            assert!((0.0..=1.0).contains(&s.progress), "{s:?}");
        }
    }

    #[test]
    fn zero_length_phase_is_passed_over() {
        let config = TimelineConfig {
            point_cloud_ms: 0,
            ..TimelineConfig::default()
        };
        let timeline = Timeline::new(&config).unwrap();
        assert_eq!(timeline.state_at(ms(2000)).phase, Phase::Wireframe);
    }

    #[test]
    fn config_json_uses_defaults_for_missing_fields() {
        let config: TimelineConfig = serde_json::from_str(r#"{"speed": 3.0}"#).unwrap();
        assert_eq!(config.wireframe_ms, 1800);
        assert!((config.speed - 3.0).abs() < f64::EPSILON);
    }
}
