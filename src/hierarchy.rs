//! The salesperson forest: agent codes, invitations and acceptance.
//!
//! Every parent link is created by accepting an invitation. Acceptance is the
//! only place the forest can grow a cycle or exceed the depth limit, so all
//! structural checks happen there inside one transaction.

use std::collections::{HashSet, VecDeque};
use std::sync::LazyLock;

use regex::Regex;
use rusqlite::Connection;

use crate::clock::{Clock, SECONDS_PER_DAY};
use crate::codegen::CodeGenerator;
use crate::db::{atomically, queries};
use crate::error::{AppError, Result, is_unique_violation};
use crate::models::*;
use crate::notify;

pub const DEFAULT_MAX_AGENT_LEVEL: i64 = 5;
pub const DEFAULT_INVITATION_TTL_DAYS: i64 = 7;

const MAX_CODE_ATTEMPTS: usize = 5;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("Failed to compile email regex")
});

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{5,15}$").expect("Failed to compile phone regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HierarchyRules {
    /// Deepest level any salesperson may occupy (roots are level 0)
    pub max_agent_level: i64,
    pub invitation_ttl_secs: i64,
}

impl HierarchyRules {
    pub fn new(max_agent_level: i64, invitation_ttl_days: i64) -> Self {
        Self {
            max_agent_level: max_agent_level.max(0),
            invitation_ttl_secs: invitation_ttl_days.max(1) * SECONDS_PER_DAY,
        }
    }

    /// Traversal bound for any walk over the forest.
    fn walk_bound(&self) -> usize {
        usize::try_from(self.max_agent_level).unwrap_or(0) + 1
    }
}

impl Default for HierarchyRules {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_AGENT_LEVEL, DEFAULT_INVITATION_TTL_DAYS)
    }
}

/// Read access to the agent forest.
pub trait AgentGraph {
    fn agent_node(&self, id: i64) -> Result<Option<AgentNode>>;
    fn child_ids(&self, id: i64) -> Result<Vec<i64>>;
}

impl AgentGraph for Connection {
    fn agent_node(&self, id: i64) -> Result<Option<AgentNode>> {
        queries::get_agent_node(self, id)
    }

    fn child_ids(&self, id: i64) -> Result<Vec<i64>> {
        queries::child_ids(self, id)
    }
}

/// Breadth-first walk below `root`, at most `max_depth` generations deep.
/// Yields `(id, depth)` for every descendant, never `root` itself.
pub fn descendants<G: AgentGraph + ?Sized>(
    graph: &G,
    root: i64,
    max_depth: usize,
) -> Result<Vec<(i64, usize)>> {
    let mut seen = HashSet::from([root]);
    let mut queue = VecDeque::from([(root, 0usize)]);
    let mut out = Vec::new();

    while let Some((id, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        for child in graph.child_ids(id)? {
            // A repeat means the stored forest already has a cycle; don't loop on it
            if seen.insert(child) {
                out.push((child, depth + 1));
                queue.push_back((child, depth + 1));
            }
        }
    }
    Ok(out)
}

/// True if `candidate` is `ancestor` or sits anywhere below it.
pub fn is_descendant<G: AgentGraph + ?Sized>(
    graph: &G,
    ancestor: i64,
    candidate: i64,
    max_depth: usize,
) -> Result<bool> {
    if ancestor == candidate {
        return Ok(true);
    }
    Ok(descendants(graph, ancestor, max_depth)?
        .iter()
        .any(|(id, _)| *id == candidate))
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn validate_contact(input: CreateInvitation) -> Result<CreateInvitation> {
    let email = normalize(input.email);
    let phone = normalize(input.phone);

    if email.is_none() && phone.is_none() {
        return Err(AppError::BadRequest(
            "Either email or phone is required".into(),
        ));
    }
    if let Some(email) = &email {
        if !EMAIL_RE.is_match(email) {
            return Err(AppError::BadRequest("Invalid email format".into()));
        }
    }
    if let Some(phone) = &phone {
        if !PHONE_RE.is_match(phone) {
            return Err(AppError::BadRequest(
                "Invalid phone format, expected 5-15 digits".into(),
            ));
        }
    }
    Ok(CreateInvitation { email, phone })
}

/// Return the salesperson's agent code, minting one on first call.
pub fn generate_agent_code(
    conn: &mut Connection,
    codes: &CodeGenerator,
    clock: &dyn Clock,
    salesperson_id: i64,
) -> Result<String> {
    let now = clock.timestamp();
    atomically(conn, |tx| {
        let salesperson = queries::get_salesperson(tx, salesperson_id)?
            .ok_or_else(|| AppError::NotFound("Salesperson not found".into()))?;
        if let Some(code) = salesperson.agent_code {
            return Ok(code);
        }

        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = codes.agent_code();
            match queries::set_agent_code(tx, salesperson_id, &code, now) {
                Ok(true) => {
                    tracing::info!("Assigned agent code to salesperson {}", salesperson_id);
                    return Ok(code);
                }
                Ok(false) => {
                    return Err(AppError::InvalidState(
                        "Agent code was assigned concurrently".into(),
                    ));
                }
                Err(e) if is_unique_violation(&e) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(AppError::Internal("Could not generate a unique agent code".into()))
    })
}

pub fn create_invitation(
    conn: &mut Connection,
    codes: &CodeGenerator,
    clock: &dyn Clock,
    rules: &HierarchyRules,
    inviter_id: i64,
    input: CreateInvitation,
) -> Result<AgentInvitation> {
    let input = validate_contact(input)?;
    let now = clock.timestamp();
    let expires_at = now + rules.invitation_ttl_secs;

    let invitation = atomically(conn, |tx| {
        if queries::get_salesperson(tx, inviter_id)?.is_none() {
            return Err(AppError::NotFound("Salesperson not found".into()));
        }
        if queries::open_invitation_exists(tx, input.email.as_deref(), input.phone.as_deref(), now)? {
            return Err(AppError::InvalidState(
                "A pending invitation already exists for this email or phone".into(),
            ));
        }

        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = codes.invite_code();
            match queries::insert_invitation(tx, inviter_id, &code, &input, expires_at, now) {
                Ok(invitation) => return Ok(invitation),
                Err(e) if is_unique_violation(&e) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(AppError::Internal("Could not generate a unique invite code".into()))
    })?;

    tracing::info!(
        "Salesperson {} created invitation {}",
        inviter_id,
        invitation.id
    );
    notify::invitation_created(&invitation);
    Ok(invitation)
}

enum Acceptance {
    Accepted(AgentInvitation),
    Expired,
}

/// Attach `accepter_id` under the invitation's inviter.
///
/// Fails with `NotFound` when no pending invitation has this code,
/// `InvalidState` once it has expired (the invitation is marked expired), and
/// `Integrity` when the link would give the accepter a second upline, form a
/// cycle, or push any node past the maximum level. Nothing is written unless
/// every check passes.
pub fn accept_invitation(
    conn: &mut Connection,
    clock: &dyn Clock,
    rules: &HierarchyRules,
    invite_code: &str,
    accepter_id: i64,
) -> Result<AgentInvitation> {
    let now = clock.timestamp();

    let outcome = atomically(conn, |tx| {
        let invitation = queries::get_invitation_by_code(tx, invite_code)?
            .filter(|inv| inv.status == InvitationStatus::Pending)
            .ok_or_else(|| {
                AppError::NotFound("Invitation not found or no longer pending".into())
            })?;

        if now >= invitation.expired_at {
            queries::set_invitation_status(tx, invitation.id, InvitationStatus::Expired)?;
            return Ok(Acceptance::Expired);
        }

        let accepter = queries::get_salesperson(tx, accepter_id)?
            .ok_or_else(|| AppError::NotFound("Salesperson not found".into()))?;
        let inviter = queries::get_salesperson(tx, invitation.inviter_id)?
            .ok_or_else(|| AppError::NotFound("Inviter not found".into()))?;

        if accepter.parent_id.is_some() {
            return Err(AppError::Integrity(
                "Salesperson already has an upline".into(),
            ));
        }
        if inviter.level >= rules.max_agent_level {
            return Err(AppError::Integrity(format!(
                "Inviter is at the maximum agent level ({})",
                rules.max_agent_level
            )));
        }

        let graph: &Connection = tx;
        let below = descendants(graph, accepter.id, rules.walk_bound())?;
        if accepter.id == inviter.id || below.iter().any(|(id, _)| *id == inviter.id) {
            return Err(AppError::Integrity(
                "Cannot accept an invitation from yourself or your own downline".into(),
            ));
        }

        let new_level = inviter.level + 1;
        let height = below.iter().map(|(_, d)| *d as i64).max().unwrap_or(0);
        if new_level + height > rules.max_agent_level {
            return Err(AppError::Integrity(format!(
                "Accepting would place an agent at level {}, above the maximum {}",
                new_level + height,
                rules.max_agent_level
            )));
        }

        if !queries::attach_to_parent(tx, accepter.id, inviter.id, new_level, now)? {
            return Err(AppError::InvalidState(
                "Salesperson was attached concurrently".into(),
            ));
        }
        let delta = new_level - accepter.level;
        if delta != 0 {
            for (id, _) in &below {
                queries::shift_level(tx, *id, delta)?;
            }
        }
        queries::adjust_children_count(tx, inviter.id, 1)?;
        if !queries::mark_invitation_accepted(tx, invitation.id, accepter.id, now)? {
            return Err(AppError::InvalidState(
                "Invitation was resolved concurrently".into(),
            ));
        }

        Ok(Acceptance::Accepted(AgentInvitation {
            status: InvitationStatus::Accepted,
            invitee_id: Some(accepter.id),
            accepted_at: Some(now),
            ..invitation
        }))
    })?;

    match outcome {
        Acceptance::Accepted(invitation) => {
            tracing::info!(
                "Salesperson {} joined under {} via invitation {}",
                accepter_id,
                invitation.inviter_id,
                invitation.id
            );
            Ok(invitation)
        }
        Acceptance::Expired => {
            tracing::warn!("Invitation {} expired before acceptance", invite_code);
            Err(AppError::InvalidState("Invitation has expired".into()))
        }
    }
}

/// Decline a pending invitation on behalf of its prospective invitee.
///
/// The inviter cannot reject their own invitation. A lapsed invitation is
/// marked expired instead and reported as `InvalidState`.
pub fn reject_invitation(
    conn: &Connection,
    clock: &dyn Clock,
    invite_code: &str,
    rejecter_id: i64,
) -> Result<AgentInvitation> {
    let invitation = queries::get_invitation_by_code(conn, invite_code)?
        .ok_or_else(|| AppError::NotFound("Invitation not found".into()))?;
    if invitation.inviter_id == rejecter_id {
        return Err(AppError::Forbidden(
            "Cannot reject your own invitation".into(),
        ));
    }
    if invitation.status == InvitationStatus::Pending && clock.timestamp() >= invitation.expired_at {
        queries::set_invitation_status(conn, invitation.id, InvitationStatus::Expired)?;
        tracing::warn!("Invitation {} expired before rejection", invitation.id);
        return Err(AppError::InvalidState("Invitation has expired".into()));
    }
    if !queries::set_invitation_status(conn, invitation.id, InvitationStatus::Rejected)? {
        return Err(AppError::InvalidState(format!(
            "Invitation is already {}",
            invitation.status.as_ref()
        )));
    }
    tracing::info!("Invitation {} rejected by {}", invitation.id, rejecter_id);
    Ok(AgentInvitation {
        status: InvitationStatus::Rejected,
        ..invitation
    })
}

/// Immediate parent and children of a salesperson.
pub fn hierarchy(conn: &Connection, salesperson_id: i64) -> Result<Hierarchy> {
    let me = queries::get_salesperson(conn, salesperson_id)?
        .ok_or_else(|| AppError::NotFound("Salesperson not found".into()))?;
    let parent = match me.parent_id {
        Some(pid) => queries::get_agent_summary(conn, pid)?,
        None => None,
    };
    let children = queries::list_children(conn, me.id)?;

    Ok(Hierarchy {
        id: me.id,
        username: me.username,
        name: me.name,
        level: me.level,
        children_count: me.children_count,
        agent_code: me.agent_code,
        parent,
        children,
    })
}

pub fn agent_commissions(conn: &Connection, agent_id: i64) -> Result<AgentCommissionList> {
    if queries::get_salesperson(conn, agent_id)?.is_none() {
        return Err(AppError::NotFound("Salesperson not found".into()));
    }
    let commissions = queries::list_agent_commissions(conn, agent_id)?;
    let total_commission = commissions.iter().map(|c| c.commission_amount).sum();
    Ok(AgentCommissionList {
        total_commission,
        commissions,
    })
}
