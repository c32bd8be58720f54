//! Quota configuration and verdict types used by the limit validator

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::reservation::{Module, NoveltyOverride};

/// Upper bound for every day-count parameter and extension (ten years).
pub const MAX_DAYS: u32 = 3650;

/// Per-module reservation parameters, fetched once per operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub module: Module,
    pub enabled: bool,
    pub general_cap: u32,
    pub novelty_cap: u32,
    pub novelty_window_days: u32,
    pub novelty_tracking_enabled: bool,
    pub ready_expiry_days: u32,
    pub reminder_days_before: u32,
    pub loan_duration_days: u32,
}

impl LimitsConfig {
    /// Reject parameter sets the lifecycle cannot work with.
    pub fn validate(&self) -> Result<(), String> {
        if self.ready_expiry_days == 0 {
            return Err("ready_expiry_days must be at least 1".to_string());
        }
        let day_fields = [
            ("novelty_window_days", self.novelty_window_days),
            ("ready_expiry_days", self.ready_expiry_days),
            ("reminder_days_before", self.reminder_days_before),
            ("loan_duration_days", self.loan_duration_days),
        ];
        match day_fields.iter().find(|(_, days)| *days > MAX_DAYS) {
            Some((name, _)) => Err(format!("{} must be at most {}", name, MAX_DAYS)),
            None => Ok(()),
        }
    }

    /// Whether an item counts as a novelty at `now`.
    ///
    /// `force_not_new` always wins, `force_new` marks the item regardless of
    /// its age, otherwise the item is new while `added_at` is inside the window.
    pub fn is_novelty(
        &self,
        added_at: DateTime<Utc>,
        novelty_override: Option<NoveltyOverride>,
        now: DateTime<Utc>,
    ) -> bool {
        if !self.novelty_tracking_enabled {
            return false;
        }

        match novelty_override {
            Some(NoveltyOverride::ForceNotNew) => false,
            Some(NoveltyOverride::ForceNew) => true,
            // A window reaching past the calendar covers every item
            None => now
                .checked_sub_signed(Duration::days(i64::from(self.novelty_window_days)))
                .map_or(true, |start| added_at >= start),
        }
    }
}

/// A per-genre cap on concurrent reservations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenreLimit {
    pub id: i32,
    pub module: Module,
    pub genre_id: i32,
    pub max_concurrent: u32,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonKind {
    ModuleDisabled,
    AlreadyReserved,
    GeneralCapReached,
    NoveltyCapReached,
    GenreCapReached,
    ItemNotFound,
}

/// Why a reservation request was denied, with enough detail for a UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reason {
    pub kind: ReasonKind,
    pub current: u32,
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre_id: Option<i32>,
    pub message: String,
}

impl Reason {
    pub fn new(kind: ReasonKind, current: u32, limit: u32, message: impl Into<String>) -> Self {
        Self {
            kind,
            current,
            limit,
            genre_id: None,
            message: message.into(),
        }
    }

    pub fn genre(genre_id: i32, current: u32, limit: u32) -> Self {
        Self {
            kind: ReasonKind::GenreCapReached,
            current,
            limit,
            genre_id: Some(genre_id),
            message: format!(
                "Genre {} limit reached ({}/{} reservations)",
                genre_id, current, limit
            ),
        }
    }
}

/// Outcome of a limit validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub allowed: bool,
    pub reasons: Vec<Reason>,
}

impl Verdict {
    pub fn from_reasons(reasons: Vec<Reason>) -> Self {
        Self {
            allowed: reasons.is_empty(),
            reasons,
        }
    }

    pub fn deny(reason: Reason) -> Self {
        Self::from_reasons(vec![reason])
    }

    pub fn has(&self, kind: ReasonKind) -> bool {
        self.reasons.iter().any(|r| r.kind == kind)
    }
}

/// Usage against one cap, for the limits summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub current: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenreUsage {
    pub genre_id: i32,
    pub current: u32,
    pub limit: u32,
    pub enabled: bool,
}

/// Current usage of a patron against every cap of a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LimitsSummary {
    pub patron_id: i32,
    pub module: Module,
    pub enabled: bool,
    pub general: Usage,
    pub novelty: Usage,
    pub novelty_tracking_enabled: bool,
    pub genres: Vec<GenreUsage>,
}
