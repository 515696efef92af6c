use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::item::{ItemId, UserId};
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Like,
    Pass,
    Shown,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Like => "like",
            ActionKind::Pass => "pass",
            ActionKind::Shown => "shown",
        }
    }

    /// Likes and passes are explicit feedback; a user has "seen" those items
    pub fn is_feedback(&self) -> bool {
        matches!(self, ActionKind::Like | ActionKind::Pass)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "like" => Ok(ActionKind::Like),
            "pass" => Ok(ActionKind::Pass),
            "shown" => Ok(ActionKind::Shown),
            other => Err(Error::invalid_parameter(
                "action",
                format!("unknown action `{other}`"),
            )),
        }
    }
}

/// Append-only interaction record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: Uuid,
    pub user_id: UserId,
    pub item_id: ItemId,
    pub action: ActionKind,
    pub timestamp: DateTime<Utc>,
}

impl Interaction {
    pub fn new(user_id: impl Into<UserId>, item_id: impl Into<ItemId>, action: ActionKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            item_id: item_id.into(),
            action,
            timestamp: Utc::now(),
        }
    }

    pub fn like(user_id: impl Into<UserId>, item_id: impl Into<ItemId>) -> Self {
        Self::new(user_id, item_id, ActionKind::Like)
    }

    pub fn pass(user_id: impl Into<UserId>, item_id: impl Into<ItemId>) -> Self {
        Self::new(user_id, item_id, ActionKind::Pass)
    }

    pub fn shown(user_id: impl Into<UserId>, item_id: impl Into<ItemId>) -> Self {
        Self::new(user_id, item_id, ActionKind::Shown)
    }
}
