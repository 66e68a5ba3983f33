use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Approval state of vacation, permission and home-office entries.
#[derive(
    Debug,
    Default,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl ApprovalStatus {
    /// Statuses that still claim the dates they cover.
    pub const ACTIVE: [ApprovalStatus; 2] = [ApprovalStatus::Pending, ApprovalStatus::Approved];

    pub fn as_str(self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
            ApprovalStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_active(self) -> bool {
        Self::ACTIVE.contains(&self)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }

    pub fn can_transition_to(self, next: ApprovalStatus) -> bool {
        use ApprovalStatus::*;
        matches!(
            (self, next),
            (Pending, Approved) | (Pending, Rejected) | (Pending, Cancelled) | (Approved, Cancelled)
        )
    }
}

impl TryFrom<String> for ApprovalStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ApprovalStatus::*;

    #[test]
    fn parses_and_prints_lowercase() {
        assert_eq!("approved".parse::<ApprovalStatus>(), Ok(Approved));
        assert_eq!(Cancelled.to_string(), "cancelled");
        assert_eq!(Pending.as_ref(), "pending");
        assert_eq!(Approved.as_str(), Approved.as_ref());
        assert!("Approved".parse::<ApprovalStatus>().is_err());
        assert_eq!(ApprovalStatus::try_from("rejected".to_string()), Ok(Rejected));
    }

    #[test]
    fn serde_uses_lowercase_names() {
        assert_eq!(serde_json::to_string(&Rejected).unwrap(), "\"rejected\"");
        let parsed: ApprovalStatus = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(parsed, Pending);
    }

    #[test]
    fn review_transitions_start_from_pending() {
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(!Approved.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Approved));
    }

    #[test]
    fn cancel_is_allowed_until_terminal() {
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Approved.can_transition_to(Cancelled));
        assert!(!Rejected.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Cancelled));
    }

    #[test]
    fn active_means_pending_or_approved() {
        assert!(Pending.is_active());
        assert!(Approved.is_active());
        assert!(Rejected.is_terminal());
        assert!(Cancelled.is_terminal());
    }
}
