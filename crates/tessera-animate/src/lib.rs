//! tessera-animate: the build-up animation of a finished mosaic.
//!
//! A [`Timeline`] fixes when each [`Phase`] runs; a [`Sequencer`] turns
//! monotonic timestamps into [`Frame`]s of [`DrawCommand`]s; a [`Host`]
//! owns the current run, drives the pipeline one stage at a time and
//! paints frames onto a [`Surface`]. No raster backend lives here.

pub mod draw;
pub mod ease;
pub mod phase;
pub mod sequencer;
pub mod session;
pub mod timeline;

pub use draw::{Artwork, DrawCommand, Layer, Surface, compose};
pub use ease::Ease;
pub use phase::Phase;
pub use sequencer::{Frame, Sequencer};
pub use session::{Host, RunToken, Session, Status};
pub use timeline::{AnimationState, Span, Timeline, TimelineConfig};

use tessera_pipeline::PipelineError;

/// Errors from starting or driving an animated run.
#[derive(Debug, thiserror::Error)]
pub enum AnimateError {
    /// The playback speed is not a finite positive number.
    #[error("animation speed must be finite and positive, got {0}")]
    InvalidSpeed(f64),

    /// No drawable surface could be acquired.
    #[error("drawable surface is unavailable")]
    ResourceUnavailable,

    /// The pipeline failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}
