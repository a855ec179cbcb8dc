use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a workspace membership, independent of its role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MembershipStatus {
    #[default]
    Pending,
    UnderReview,
    NeedMoreSeat,
    NeedMoreSeatAndReview,
    Accepted,
}

// Older rows were written with snake case or spaced labels.
const STATUS_ALIASES: &[(MembershipStatus, &str)] = &[
    (MembershipStatus::Accepted, "accepted"),
    (MembershipStatus::Pending, "pending"),
    (MembershipStatus::UnderReview, "underreview"),
    (MembershipStatus::NeedMoreSeat, "needmoreseat"),
    (MembershipStatus::NeedMoreSeatAndReview, "needmoreseatandreview"),
];

impl MembershipStatus {
    pub const WAITLISTED: [MembershipStatus; 2] = [Self::NeedMoreSeat, Self::NeedMoreSeatAndReview];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::UnderReview => "UnderReview",
            Self::NeedMoreSeat => "NeedMoreSeat",
            Self::NeedMoreSeatAndReview => "NeedMoreSeatAndReview",
            Self::Accepted => "Accepted",
        }
    }

    pub fn parse(status: &str) -> Option<Self> {
        let simplified: String = status
            .trim()
            .chars()
            .filter(|ch| *ch != '_' && !ch.is_ascii_whitespace())
            .map(|ch| ch.to_ascii_lowercase())
            .collect();

        if simplified.is_empty() {
            return None;
        }

        STATUS_ALIASES
            .iter()
            .find_map(|(status, alias)| (simplified == *alias).then_some(*status))
    }

    /// Whether `grant` may move a not-yet-active membership from `self` to `next`.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Accepted)
                | (Self::UnderReview, Self::Accepted)
                | (Self::NeedMoreSeat, Self::Pending)
                | (Self::NeedMoreSeatAndReview, Self::UnderReview)
        )
    }

    pub const fn is_waitlisted(self) -> bool {
        matches!(self, Self::NeedMoreSeat | Self::NeedMoreSeatAndReview)
    }

    pub const fn needs_review(self) -> bool {
        matches!(self, Self::UnderReview | Self::NeedMoreSeatAndReview)
    }

    /// Status a waitlisted member moves to once a seat frees up. Other
    /// statuses are returned unchanged.
    pub const fn after_seat_allocated(self) -> Self {
        match self {
            Self::NeedMoreSeat => Self::Pending,
            Self::NeedMoreSeatAndReview => Self::UnderReview,
            other => other,
        }
    }

    /// Initial status of an invitee, given seat availability and whether an
    /// admin still has to review the request.
    pub const fn for_invitation(seat_available: bool, needs_review: bool) -> Self {
        match (seat_available, needs_review) {
            (true, false) => Self::Pending,
            (true, true) => Self::UnderReview,
            (false, false) => Self::NeedMoreSeat,
            (false, true) => Self::NeedMoreSeatAndReview,
        }
    }
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
