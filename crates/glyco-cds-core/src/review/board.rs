//! Active run holder with last-call-wins generation.
//!
//! Generation is started with [`ReviewBoard::begin_generation`], which hands
//! out a ticket. Only the result delivered with the most recent ticket is
//! installed; results from superseded tickets are dropped.

use super::{RecommendationRun, ReviewError, ReviewResult};
use crate::models::{DecisionAction, Recommendation};

/// Handle for one generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GenerationTicket(u64);

impl GenerationTicket {
    pub fn sequence(&self) -> u64 {
        self.0
    }
}

/// Holds the current run and tracks in-flight generation.
#[derive(Debug, Default)]
pub struct ReviewBoard {
    current: Option<RecommendationRun>,
    latest: u64,
    in_flight: bool,
}

impl ReviewBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a generation. The current run and its decisions are discarded.
    pub fn begin_generation(&mut self) -> GenerationTicket {
        self.latest += 1;
        self.in_flight = true;
        self.current = None;
        tracing::debug!(ticket = self.latest, "Generation started");
        GenerationTicket(self.latest)
    }

    /// Deliver a generation result.
    ///
    /// Returns the installed run, or `None` when the ticket was superseded by
    /// a newer generation.
    pub fn complete_generation(
        &mut self,
        ticket: GenerationTicket,
        recommendations: Vec<Recommendation>,
    ) -> Option<&RecommendationRun> {
        if ticket.0 != self.latest {
            tracing::warn!(
                ticket = ticket.0,
                latest = self.latest,
                "Discarding stale generation result"
            );
            return None;
        }

        self.in_flight = false;
        let run = RecommendationRun::new(recommendations);
        tracing::info!(
            run_id = run.run_id(),
            count = run.recommendations().len(),
            "Recommendation run ready"
        );
        self.current = Some(run);
        self.current.as_ref()
    }

    /// Record that a generation produced no result. Only the latest ticket
    /// clears the in-flight flag.
    pub fn fail_generation(&mut self, ticket: GenerationTicket) {
        if ticket.0 == self.latest {
            self.in_flight = false;
        }
    }

    /// A generation with the latest ticket has not completed yet.
    pub fn is_generating(&self) -> bool {
        self.in_flight
    }

    pub fn current(&self) -> Option<&RecommendationRun> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> ReviewResult<&mut RecommendationRun> {
        self.current.as_mut().ok_or(ReviewError::NoActiveRun)
    }

    /// Apply a decision to the current run.
    pub fn apply(&mut self, id: &str, action: &DecisionAction) -> ReviewResult<Recommendation> {
        self.current_mut()?.apply(id, action)
    }

    /// Drop the current run without starting a new one. Every outstanding
    /// ticket becomes stale.
    pub fn clear(&mut self) {
        self.latest += 1;
        self.current = None;
        self.in_flight = false;
    }

    /// Reinstate a snapshot of the current run.
    pub(crate) fn restore(&mut self, run: Option<RecommendationRun>) {
        self.current = run;
    }
}
