use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Storage usage counters of an organization after an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct UsageTotals {
    pub org_id: Uuid,
    pub used_storage_bytes: i64,
    pub file_count: i64,
}

/// Answer of the quota service for a requested number of bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub reason: Option<String>,
    pub current_usage: i64,
    /// `None` means the organization has no storage ceiling.
    pub limit: Option<i64>,
}

impl QuotaDecision {
    /// Decide whether `requested_bytes` fit next to `current_usage` under `limit`.
    pub fn evaluate(current_usage: i64, limit: Option<i64>, requested_bytes: u64) -> Self {
        let requested = i64::try_from(requested_bytes).unwrap_or(i64::MAX);
        match limit {
            Some(limit) if current_usage.saturating_add(requested) > limit => Self {
                allowed: false,
                reason: Some(format!(
                    "Storage quota exceeded: {} bytes requested, {} bytes available",
                    requested_bytes,
                    (limit - current_usage).max(0)
                )),
                current_usage,
                limit: Some(limit),
            },
            _ => Self {
                allowed: true,
                reason: None,
                current_usage,
                limit,
            },
        }
    }

    /// Bytes still available, `None` when unlimited.
    pub fn available(&self) -> Option<i64> {
        self.limit.map(|l| (l - self.current_usage).max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = 1024 * 1024;

    #[test]
    fn rejects_when_request_exceeds_available() {
        let limit = 100 * MB as i64;
        let used = 85 * MB as i64;
        let decision = QuotaDecision::evaluate(used, Some(limit), 30 * MB);
        assert!(!decision.allowed);
        assert_eq!(decision.available(), Some(15 * MB as i64));
        assert!(decision.reason.unwrap().contains("exceeded"));
    }

    #[test]
    fn allows_exact_fit_and_unlimited() {
        assert!(QuotaDecision::evaluate(90, Some(100), 10).allowed);
        let unlimited = QuotaDecision::evaluate(i64::MAX - 1, None, u64::MAX);
        assert!(unlimited.allowed);
        assert_eq!(unlimited.available(), None);
    }
}
