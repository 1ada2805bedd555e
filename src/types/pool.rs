//! Savings pool and membership types

use super::ids::{OwnerId, PoolId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolStatus {
    Active,
    Completed,
    Cancelled,
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PoolStatus::Active => "active",
            PoolStatus::Completed => "completed",
            PoolStatus::Cancelled => "cancelled",
        })
    }
}

/// How often members are expected to contribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "biweekly" => Ok(Frequency::Biweekly),
            "monthly" => Ok(Frequency::Monthly),
            other => Err(format!("unknown frequency '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Owner,
    Member,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Active,
    Left,
}

/// A shared savings goal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    pub pool_id: PoolId,
    pub creator_id: OwnerId,
    pub name: String,
    pub goal_amount: Decimal,

    /// Sum of completed contributions; only the ledger moves it
    pub current_amount: Decimal,

    pub contribution_amount: Decimal,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub max_members: u32,
    pub status: PoolStatus,
    pub created_at: DateTime<Utc>,
}

impl Pool {
    pub fn goal_reached(&self) -> bool {
        self.current_amount >= self.goal_amount
    }
}

/// A user's participation in a pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    pub pool_id: PoolId,
    pub user_id: OwnerId,
    pub role: MemberRole,
    pub contribution_amount: Decimal,

    /// Monotonic; derived from completed contributions
    pub total_contributed: Decimal,

    pub status: MembershipStatus,
    pub join_date: NaiveDate,
}

impl Membership {
    pub fn is_active(&self) -> bool {
        self.status == MembershipStatus::Active
    }
}

/// A pool together with its memberships, locked and stored as one unit
#[derive(Debug, Clone, PartialEq)]
pub struct PoolRecord {
    pub pool: Pool,
    pub members: BTreeMap<OwnerId, Membership>,
}

impl PoolRecord {
    pub fn active_member_count(&self) -> usize {
        self.members.values().filter(|m| m.is_active()).count()
    }

    pub fn active_membership(&self, user_id: &OwnerId) -> Option<&Membership> {
        self.members.get(user_id).filter(|m| m.is_active())
    }

    /// Sum of every membership's contributions, including members who left
    pub fn total_contributed(&self) -> Decimal {
        self.members.values().map(|m| m.total_contributed).sum()
    }
}

/// Input to `PoolEngine::create_pool`
#[derive(Debug, Clone, PartialEq)]
pub struct NewPool {
    pub creator_id: OwnerId,
    pub name: String,
    pub goal_amount: Decimal,
    pub contribution_amount: Decimal,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub max_members: u32,
}
