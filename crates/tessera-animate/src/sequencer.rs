//! The time-driven state machine behind the animation.
//!
//! [`Sequencer::tick`] is a re-entrant step of `(state, now) -> frame`:
//! the host feeds monotonic timestamps from whatever clock drives its
//! frame loop, so tests can use synthetic ones.

use std::time::Duration;

use crate::draw::{Artwork, DrawCommand, compose};
use crate::phase::Phase;
use crate::timeline::{AnimationState, Timeline};

/// What one tick produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// The resolved state.
    pub state: AnimationState,
    /// Every phase entered since the previous tick, in order. Phases a
    /// long tick jumped over are still listed.
    pub entered: Vec<Phase>,
    /// Commands to paint.
    pub commands: Vec<DrawCommand>,
    /// Whether the host should schedule another tick.
    pub request_next: bool,
}

/// Animation driver for one run.
#[derive(Debug, Clone)]
pub struct Sequencer {
    timeline: Timeline,
    artwork: Artwork,
    start: Option<Duration>,
    state: Option<AnimationState>,
    terminal: Option<Frame>,
}

impl Sequencer {
    /// Create a sequencer. Nothing happens until the first tick.
    #[must_use]
    pub const fn new(timeline: Timeline, artwork: Artwork) -> Self {
        Self {
            timeline,
            artwork,
            start: None,
            state: None,
            terminal: None,
        }
    }

    /// The timeline in use.
    #[must_use]
    pub const fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// The geometry being revealed.
    #[must_use]
    pub const fn artwork(&self) -> &Artwork {
        &self.artwork
    }

    /// The state reached by the latest tick, or [`AnimationState::START`].
    #[must_use]
    pub fn state(&self) -> AnimationState {
        self.state.unwrap_or(AnimationState::START)
    }

    /// Whether `Complete` has been reached.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.terminal.is_some()
    }

    /// Advance to `now` and compose the frame.
    ///
    /// The first tick latches the start time. A timestamp earlier than a
    /// previous one is treated as that previous one, so the animation
    /// never runs backwards. Once `Complete` is reached every later tick
    /// returns the same terminal frame with no entered phases and
    /// `request_next == false`.
    pub fn tick(&mut self, now: Duration) -> Frame {
        if let Some(terminal) = &self.terminal {
            return Frame {
                entered: Vec::new(),
                ..terminal.clone()
            };
        }

        let start = *self.start.get_or_insert(now);
        let mut elapsed = now.saturating_sub(start);
        if let Some(previous) = self.state {
            elapsed = elapsed.max(previous.elapsed);
        }

        let state = self.timeline.state_at(elapsed);
        let entered = match self.state {
            None => Phase::ALL[..=state.phase.index()].to_vec(),
            Some(previous) => Phase::ALL[previous.phase.index() + 1..=state.phase.index()].to_vec(),
        };
        for phase in &entered {
            tracing::info!(phase = phase.label(), ?elapsed, "entered phase");
        }
        self.state = Some(state);

        let frame = Frame {
            state,
            entered,
            commands: compose(&state, &self.artwork),
            request_next: !state.is_complete(),
        };
        if state.is_complete() {
            self.terminal = Some(Frame {
                entered: Vec::new(),
                ..frame.clone()
            });
        }
        frame
    }
}
