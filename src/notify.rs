//! Invitation notifications.
//!
//! No mail or SMS transport is wired up: every notification is written to the
//! log so an operator can forward the code by hand.

use chrono::DateTime;

use crate::models::AgentInvitation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Recorded in the log only
    Logged,
}

fn format_date(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%b %d, %Y").to_string())
        .unwrap_or_else(|| "Unknown date".to_string())
}

pub fn invitation_created(invitation: &AgentInvitation) -> NotifyOutcome {
    let contact = invitation
        .email
        .as_deref()
        .or(invitation.phone.as_deref())
        .unwrap_or("-");
    tracing::info!(
        "Invitation {} for {} expires {} (delivery disabled, log only)",
        invitation.invite_code,
        contact,
        format_date(invitation.expired_at)
    );
    NotifyOutcome::Logged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InvitationStatus;

    #[test]
    fn logs_without_delivery() {
        let invitation = AgentInvitation {
            id: 1,
            inviter_id: 1,
            invitee_id: None,
            invite_code: "ABCD1234".into(),
            email: None,
            phone: Some("5551234".into()),
            status: InvitationStatus::Pending,
            accepted_at: None,
            expired_at: 1_700_000_000,
            created_at: 1_699_395_200,
        };
        assert_eq!(invitation_created(&invitation), NotifyOutcome::Logged);
        assert_eq!(format_date(1_700_000_000), "Nov 14, 2023");
    }
}
