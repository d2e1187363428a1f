//! Explicit run objects.
//!
//! A [`Session`] is one finished pipeline run together with its animation
//! and the surface it paints onto. A [`Host`] holds at most one run and
//! a generation counter: starting a new run replaces (and so cancels) the
//! previous one, and every call carries the [`RunToken`] it was started
//! with so that work queued by a cancelled run is ignored.

use std::time::Duration;

use tessera_pipeline::pipeline::{Advance, Stage};
use tessera_pipeline::{Pipeline, PipelineConfig, StagedResult};

use crate::AnimateError;
use crate::draw::{Artwork, Surface};
use crate::phase::Phase;
use crate::sequencer::{Frame, Sequencer};
use crate::timeline::{Timeline, TimelineConfig};

/// Identifies one run started by a [`Host`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunToken(u64);

impl RunToken {
    /// The run's generation number. Later runs have larger numbers.
    #[must_use]
    pub const fn generation(self) -> u64 {
        self.0
    }
}

/// A finished pipeline run being animated.
pub struct Session<S> {
    config: PipelineConfig,
    staged: StagedResult,
    sequencer: Sequencer,
    surface: S,
}

impl<S> Session<S> {
    /// The configuration the run was started with.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Everything the pipeline produced.
    #[must_use]
    pub const fn staged(&self) -> &StagedResult {
        &self.staged
    }

    /// The animation driver.
    #[must_use]
    pub const fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    /// The surface frames are painted onto.
    #[must_use]
    pub const fn surface(&self) -> &S {
        &self.surface
    }
}

/// What a [`Host`] is doing, for the status channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// No run.
    Idle,
    /// The pipeline is running; carries the label of the next stage.
    Processing(&'static str),
    /// The animation is playing.
    Animating(Phase),
    /// The animation reached its final frame.
    Complete,
    /// The run failed and produced nothing.
    Error(String),
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Processing(label) => f.write_str(label),
            Self::Animating(phase) => write!(f, "{phase}"),
            Self::Complete => f.write_str("complete"),
            Self::Error(message) => write!(f, "error: {message}"),
        }
    }
}

enum Run<S> {
    Idle,
    Processing {
        token: RunToken,
        stage: Stage,
        config: PipelineConfig,
        timeline: Timeline,
        surface: S,
    },
    Animating {
        token: RunToken,
        session: Session<S>,
    },
    Failed {
        token: RunToken,
        message: String,
    },
}

impl<S> Run<S> {
    const fn token(&self) -> Option<RunToken> {
        match self {
            Self::Idle => None,
            Self::Processing { token, .. }
            | Self::Animating { token, .. }
            | Self::Failed { token, .. } => Some(*token),
        }
    }
}

/// Owner of the current run.
pub struct Host<S> {
    generation: u64,
    run: Run<S>,
}

impl<S: Surface> Host<S> {
    /// A host with no run.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            generation: 0,
            run: Run::Idle,
        }
    }

    /// Start a new run, cancelling the current one.
    ///
    /// `surface` is `None` when the caller could not acquire a drawable
    /// surface. Nothing is processed yet; drive the pipeline with
    /// [`step`](Self::step).
    ///
    /// # Errors
    ///
    /// Returns [`AnimateError::InvalidSpeed`] for a bad timeline and
    /// [`AnimateError::ResourceUnavailable`] when there is no surface. In
    /// both cases the host is left exactly as it was.
    pub fn start(
        &mut self,
        surface: Option<S>,
        image_bytes: Vec<u8>,
        config: PipelineConfig,
        timeline: &TimelineConfig,
    ) -> Result<RunToken, AnimateError> {
        let timeline = Timeline::new(timeline)?;
        let surface = surface.ok_or(AnimateError::ResourceUnavailable)?;

        self.cancel();
        self.generation += 1;
        let token = RunToken(self.generation);
        tracing::info!(generation = token.0, bytes = image_bytes.len(), "starting run");

        self.run = Run::Processing {
            token,
            stage: Pipeline::new(image_bytes, config.clone()).into(),
            config,
            timeline,
            surface,
        };
        Ok(token)
    }

    /// Start a run from a pipeline result that is already complete.
    ///
    /// The surface is bound straight away and the run is ready to tick.
    ///
    /// # Errors
    ///
    /// As [`start`](Self::start), plus
    /// [`AnimateError::ResourceUnavailable`] when the surface refuses to
    /// bind. On error the host is left exactly as it was.
    pub fn present(
        &mut self,
        surface: Option<S>,
        config: PipelineConfig,
        staged: StagedResult,
        timeline: &TimelineConfig,
    ) -> Result<RunToken, AnimateError> {
        let timeline = Timeline::new(timeline)?;
        let surface = surface.ok_or(AnimateError::ResourceUnavailable)?;
        let session = Self::animate(config, staged, timeline, surface)?;

        self.cancel();
        self.generation += 1;
        let token = RunToken(self.generation);
        tracing::info!(generation = token.0, "presenting finished run");
        self.run = Run::Animating { token, session };
        Ok(token)
    }

    /// Run one pipeline stage of the run identified by `token`.
    ///
    /// The step that produces the final stage also binds the surface, so
    /// the animation is ready to tick as soon as processing reports done. Returns `Ok(None)` for a stale token, otherwise the
    /// status after the step. Stepping a run that is no longer
    /// processing does nothing.
    ///
    /// # Errors
    ///
    /// A pipeline failure moves the host to [`Status::Error`] and is
    /// returned. A surface that refuses to bind returns
    /// [`AnimateError::ResourceUnavailable`] and leaves the host idle.
    pub fn step(&mut self, token: RunToken) -> Result<Option<Status>, AnimateError> {
        if self.run.token() != Some(token) {
            return Ok(None);
        }
        if !matches!(self.run, Run::Processing { .. }) {
            return Ok(Some(self.status()));
        }
        let Run::Processing {
            token,
            stage,
            config,
            timeline,
            surface,
        } = std::mem::replace(&mut self.run, Run::Idle)
        else {
            return Ok(Some(self.status()));
        };

        let stage = match stage.advance() {
            Ok(Advance::Next(stage)) if !stage.is_complete() => {
                self.run = Run::Processing {
                    token,
                    stage,
                    config,
                    timeline,
                    surface,
                };
                return Ok(Some(self.status()));
            }
            Ok(Advance::Next(stage) | Advance::Complete(stage)) => stage,
            Err(e) => return Err(self.fail(token, e.into())),
        };

        let staged = match stage.complete() {
            Ok(staged) => staged,
            Err(e) => return Err(self.fail(token, e.into())),
        };
        // A refused surface leaves no trace: the run never started.
        let session = Self::animate(config, staged, timeline, surface).inspect_err(|error| {
            tracing::debug!(generation = token.0, %error, "surface refused, run not started");
        })?;
        self.run = Run::Animating { token, session };
        Ok(Some(self.status()))
    }

    /// Step until the pipeline has finished.
    ///
    /// Returns `Ok(false)` for a stale token.
    ///
    /// # Errors
    ///
    /// As [`step`](Self::step).
    pub fn finish_processing(&mut self, token: RunToken) -> Result<bool, AnimateError> {
        loop {
            match self.step(token)? {
                None => return Ok(false),
                Some(Status::Processing(_)) => {}
                Some(_) => return Ok(true),
            }
        }
    }

    /// Advance the animation of `token` to `now` and paint the frame.
    ///
    /// Returns `None` when `token` is not the animating run (stale,
    /// cancelled, failed, or still processing).
    pub fn tick(&mut self, token: RunToken, now: Duration) -> Option<Frame> {
        let Run::Animating { token: live, session } = &mut self.run else {
            return None;
        };
        if *live != token {
            return None;
        }
        let frame = session.sequencer.tick(now);
        session.surface.render(&frame.commands);
        Some(frame)
    }

    /// Drop the current run. Returns whether there was one.
    pub fn cancel(&mut self) -> bool {
        let Some(token) = self.run.token() else {
            return false;
        };
        let in_flight = match &self.run {
            Run::Processing { .. } => true,
            Run::Animating { session, .. } => !session.sequencer.is_complete(),
            Run::Idle | Run::Failed { .. } => false,
        };
        if in_flight {
            tracing::warn!(generation = token.0, "cancelled in-flight run");
        }
        self.run = Run::Idle;
        true
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> Status {
        match &self.run {
            Run::Idle => Status::Idle,
            Run::Processing { stage, .. } => Status::Processing(stage.status()),
            Run::Animating { session, .. } if session.sequencer.is_complete() => Status::Complete,
            Run::Animating { session, .. } => Status::Animating(session.sequencer.state().phase),
            Run::Failed { message, .. } => Status::Error(message.clone()),
        }
    }

    /// The token of the current run, if any.
    #[must_use]
    pub const fn current(&self) -> Option<RunToken> {
        self.run.token()
    }

    /// The animating session, if any.
    #[must_use]
    pub const fn session(&self) -> Option<&Session<S>> {
        match &self.run {
            Run::Animating { session, .. } => Some(session),
            _ => None,
        }
    }

    fn animate(
        config: PipelineConfig,
        staged: StagedResult,
        timeline: Timeline,
        mut surface: S,
    ) -> Result<Session<S>, AnimateError> {
        surface.bind(
            staged.dimensions,
            &staged.working,
            &staged.edge_field.to_gray_image(),
        )?;
        let sequencer = Sequencer::new(timeline, Artwork::from_staged(&staged));
        tracing::info!(
            triangles = staged.triangles.len(),
            total = ?sequencer.timeline().total(),
            "animation ready"
        );
        Ok(Session {
            config,
            staged,
            sequencer,
            surface,
        })
    }

    fn fail(&mut self, token: RunToken, error: AnimateError) -> AnimateError {
        tracing::warn!(generation = token.0, %error, "run failed");
        self.run = Run::Failed {
            token,
            message: error.to_string(),
        };
        error
    }
}

impl<S: Surface> Default for Host<S> {
    fn default() -> Self {
        Self::new()
    }
}
