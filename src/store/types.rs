use crate::error::{RelayError, RelayResult};
use serde::{Deserialize, Serialize};

/// Which half of a two-part message a fragment carries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PartIndex {
    First,
    Second,
}

impl PartIndex {
    /// Maps the wire-level part number onto a `PartIndex`.
    ///
    /// Anything other than 0 or 1 is an `InvalidFragment`.
    pub fn from_number(number: i64) -> RelayResult<Self> {
        match number {
            0 => Ok(PartIndex::First),
            1 => Ok(PartIndex::Second),
            other => Err(RelayError::InvalidFragment(format!(
                "part index must be 0 or 1, got {}",
                other
            ))),
        }
    }

    pub fn as_number(self) -> u8 {
        match self {
            PartIndex::First => 0,
            PartIndex::Second => 1,
        }
    }
}

/// Time-bounded right to deliver a completed record.
///
/// Held by whichever submitter won the compare-and-set in `try_claim_delivery`.
/// If the holder dies, the claim expires and another submitter (or the
/// reconciler) may take over.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryClaim {
    pub token: String,
    pub expires_at_ms: u64,
}

impl DeliveryClaim {
    pub fn is_live(&self, now: u64) -> bool {
        self.expires_at_ms > now
    }
}

/// Accumulation state for one message identifier.
///
/// Stored under `msg_id`. Created implicitly by the first merged fragment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FragmentRecord {
    #[serde(rename = "msg_id")]
    pub id: String,
    pub first: Option<String>,
    pub second: Option<String>,
    /// Flips to `true` once, after a successful delivery. Never reverts.
    pub forwarded: bool,
    /// Set when downstream rejected the assembled message with a 4xx.
    #[serde(default)]
    pub rejected: bool,
    #[serde(default)]
    pub claim: Option<DeliveryClaim>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl FragmentRecord {
    pub fn new(id: &str, now: u64) -> Self {
        Self {
            id: id.to_string(),
            first: None,
            second: None,
            forwarded: false,
            rejected: false,
            claim: None,
            created_at_ms: now,
            updated_at_ms: now,
        }
    }

    pub fn part(&self, part: PartIndex) -> Option<&str> {
        match part {
            PartIndex::First => self.first.as_deref(),
            PartIndex::Second => self.second.as_deref(),
        }
    }

    /// Fills `part` unless it is already present.
    ///
    /// Returns `true` if the payload was written.
    pub fn fill(&mut self, part: PartIndex, payload: &str, now: u64) -> bool {
        let slot = match part {
            PartIndex::First => &mut self.first,
            PartIndex::Second => &mut self.second,
        };
        if slot.is_some() {
            return false;
        }
        *slot = Some(payload.to_string());
        self.updated_at_ms = now;
        true
    }

    pub fn is_complete(&self) -> bool {
        self.first.is_some() && self.second.is_some()
    }

    /// The assembled message: part 0 followed by part 1.
    pub fn assembled(&self) -> Option<String> {
        match (&self.first, &self.second) {
            (Some(first), Some(second)) => {
                let mut payload = String::with_capacity(first.len() + second.len());
                payload.push_str(first);
                payload.push_str(second);
                Some(payload)
            }
            _ => None,
        }
    }

    pub fn has_live_claim(&self, now: u64) -> bool {
        self.claim.as_ref().is_some_and(|claim| claim.is_live(now))
    }

    /// Complete, not yet forwarded, not rejected, and nobody currently delivering.
    pub fn is_stalled(&self, now: u64) -> bool {
        self.is_complete() && !self.forwarded && !self.rejected && !self.has_live_claim(now)
    }
}

/// Helper to get the current system time in milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
