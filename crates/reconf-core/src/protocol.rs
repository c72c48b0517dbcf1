//! The acceptance protocol.
//!
//! ```text
//! Proposed → CheckingReload ─┬→ NeedsFullReload
//!                            └→ CheckingAcceptance ─┬→ PolicyRejected(reason)
//!                                                   └→ Committed
//! ```
//!
//! Client-local scopes skip `CheckingAcceptance`. A proposal is evaluated
//! exactly once; the active instance is only touched on `Committed`.

use tracing::{debug, debug_span, info};

use crate::entity::{ConfigEntity, PartyId, Rejection};

/// States of a proposal evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposalState {
    /// A pending instance has been handed to the protocol.
    Proposed,
    /// Diffing the pending instance against the active one.
    CheckingReload,
    /// Asking the authoritative instance whether it accepts.
    CheckingAcceptance,
    /// The pending instance became the active one.
    Committed,
    /// The change can only be applied through a full reload.
    NeedsFullReload,
    /// The authoritative side declined.
    PolicyRejected(Rejection),
}

impl ProposalState {
    /// Whether evaluation stops in this state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Committed | Self::NeedsFullReload | Self::PolicyRejected(_)
        )
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Proposed => "proposed",
            Self::CheckingReload => "checking_reload",
            Self::CheckingAcceptance => "checking_acceptance",
            Self::Committed => "committed",
            Self::NeedsFullReload => "needs_full_reload",
            Self::PolicyRejected(_) => "policy_rejected",
        }
    }
}

/// Terminal result of a proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The pending instance is now active and `on_changed` has fired.
    Committed,
    /// Rejected: the difference requires a full reload.
    NeedsFullReload,
    /// Rejected by the authoritative side's acceptance hook.
    PolicyRejected(Rejection),
}

impl Outcome {
    /// Returns `true` if the proposal was committed.
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed)
    }

    /// Reason to report back to the proposer, if the proposal was rejected.
    pub fn rejection_reason(&self) -> Option<&str> {
        match self {
            Self::Committed => None,
            Self::NeedsFullReload => Some(Rejection::RELOAD_REQUIRED_KEY),
            Self::PolicyRejected(rejection) => Some(rejection.reason()),
        }
    }

    /// The terminal protocol state.
    pub fn state(&self) -> ProposalState {
        match self {
            Self::Committed => ProposalState::Committed,
            Self::NeedsFullReload => ProposalState::NeedsFullReload,
            Self::PolicyRejected(rejection) => ProposalState::PolicyRejected(rejection.clone()),
        }
    }
}

/// A pending instance on its way to becoming active.
#[derive(Debug)]
pub struct Proposal<T> {
    pending: T,
    proposer: PartyId,
    state: ProposalState,
}

impl<T: ConfigEntity> Proposal<T> {
    /// Wraps a pending instance proposed by `proposer`.
    pub fn new(pending: T, proposer: PartyId) -> Self {
        Self {
            pending,
            proposer,
            state: ProposalState::Proposed,
        }
    }

    /// The pending instance.
    pub fn pending(&self) -> &T {
        &self.pending
    }

    /// The proposing party.
    pub fn proposer(&self) -> PartyId {
        self.proposer
    }

    /// Runs the protocol against `active` to completion.
    ///
    /// On [`Outcome::Committed`] the pending instance replaces `active` and
    /// `on_changed` fires once; otherwise `active` is left untouched.
    pub fn evaluate(mut self, active: &mut T) -> Outcome {
        let _span = debug_span!("proposal", config = T::NAME, proposer = %self.proposer).entered();
        self.advance(ProposalState::CheckingReload);
        if active.needs_reload(&self.pending) {
            self.advance(ProposalState::NeedsFullReload);
            info!(config = T::NAME, proposer = %self.proposer, "Proposal requires a full reload");
            return Outcome::NeedsFullReload;
        }

        if T::mode().requires_authority() {
            self.advance(ProposalState::CheckingAcceptance);
            if let Err(rejection) = active.accept_changes(&self.pending, self.proposer) {
                self.advance(ProposalState::PolicyRejected(rejection.clone()));
                info!(
                    config = T::NAME,
                    proposer = %self.proposer,
                    reason = rejection.reason(),
                    "Proposal rejected"
                );
                return Outcome::PolicyRejected(rejection);
            }
        }

        self.advance(ProposalState::Committed);
        *active = self.pending;
        active.on_changed();
        info!(config = T::NAME, proposer = %self.proposer, "Proposal committed");
        Outcome::Committed
    }

    fn advance(&mut self, next: ProposalState) {
        debug!(
            config = T::NAME,
            from = self.state.name(),
            to = next.name(),
            "Proposal state transition"
        );
        self.state = next;
    }
}

/// Runs the protocol for `pending` against `active`.
pub fn propose<T: ConfigEntity>(active: &mut T, pending: T, proposer: PartyId) -> Outcome {
    Proposal::new(pending, proposer).evaluate(active)
}
