//! The fixed phase sequence of the build-up animation.

use serde::{Deserialize, Serialize};

/// One phase of the animation.
///
/// Phases always run in declaration order. [`Phase::Complete`] is
/// terminal and absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// The source image fades in.
    SourceImage,
    /// The source crossfades into the edge field.
    EdgeVisualization,
    /// Feature points appear over the dimmed edge field.
    PointCloud,
    /// Triangle edges are drawn in.
    Wireframe,
    /// Triangles fill with their colors, top to bottom.
    ColorFill,
    /// The wireframe fades out over the filled mesh.
    EdgeFadeOut,
    /// The finished mosaic.
    Complete,
}

impl Phase {
    /// Every phase in order.
    pub const ALL: [Self; 7] = [
        Self::SourceImage,
        Self::EdgeVisualization,
        Self::PointCloud,
        Self::Wireframe,
        Self::ColorFill,
        Self::EdgeFadeOut,
        Self::Complete,
    ];

    /// The phases that have a duration.
    pub const TIMED: [Self; 6] = [
        Self::SourceImage,
        Self::EdgeVisualization,
        Self::PointCloud,
        Self::Wireframe,
        Self::ColorFill,
        Self::EdgeFadeOut,
    ];

    /// Zero-based position in [`Phase::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The following phase. `Complete` is its own successor.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::SourceImage => Self::EdgeVisualization,
            Self::EdgeVisualization => Self::PointCloud,
            Self::PointCloud => Self::Wireframe,
            Self::Wireframe => Self::ColorFill,
            Self::ColorFill => Self::EdgeFadeOut,
            Self::EdgeFadeOut | Self::Complete => Self::Complete,
        }
    }

    /// Human-readable status label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::SourceImage => "source image",
            Self::EdgeVisualization => "edge extraction",
            Self::PointCloud => "feature points",
            Self::Wireframe => "triangulation",
            Self::ColorFill => "color fill",
            Self::EdgeFadeOut => "finishing",
            Self::Complete => "complete",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_walks_all_in_order() {
        let mut phase = Phase::SourceImage;
        let mut seen = vec![phase];
        while phase != Phase::Complete {
            phase = phase.next();
            seen.push(phase);
        }
        assert_eq!(seen, Phase::ALL);
    }

    #[test]
    fn complete_is_absorbing() {
        assert_eq!(Phase::Complete.next(), Phase::Complete);
    }

    #[test]
    fn index_matches_position() {
        for (i, phase) in Phase::ALL.iter().enumerate() {
            assert_eq!(phase.index(), i);
        }
        assert_eq!(&Phase::ALL[..6], &Phase::TIMED);
    }

    #[test]
    fn labels_are_distinct() {
        let labels: std::collections::HashSet<_> = Phase::ALL.iter().map(|p| p.label()).collect();
        assert_eq!(labels.len(), Phase::ALL.len());
    }
}
