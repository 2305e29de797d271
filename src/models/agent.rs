use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use super::SettlementStatus;

/// Commission owed to one ancestor for one descendant sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCommission {
    pub id: i64,
    pub sale_id: i64,
    /// The descendant one hop below `agent_id` on the walk
    pub salesperson_id: i64,
    pub agent_id: i64,
    pub agent_level: i64,
    pub original_amount: f64,
    pub commission_rate: f64,
    pub commission_amount: f64,
    pub status: SettlementStatus,
    pub settlement_id: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentCommissionList {
    pub total_commission: f64,
    pub commissions: Vec<AgentCommission>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Rejected,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInvitation {
    pub id: i64,
    pub inviter_id: i64,
    /// Set once accepted
    pub invitee_id: Option<i64>,
    pub invite_code: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: InvitationStatus,
    pub accepted_at: Option<i64>,
    pub expired_at: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateInvitation {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSummary {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub level: i64,
    pub children_count: i64,
}

/// One node's immediate neighbourhood in the agent forest.
#[derive(Debug, Clone, Serialize)]
pub struct Hierarchy {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub level: i64,
    pub children_count: i64,
    pub agent_code: Option<String>,
    pub parent: Option<AgentSummary>,
    pub children: Vec<AgentSummary>,
}

/// The slice of a salesperson the hierarchy walks need.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentNode {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub level: i64,
    pub parent_commission_rate: f64,
}
