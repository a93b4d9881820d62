//! Waitlist entry model

use serde::{Deserialize, Serialize};

/// One interested borrower queued for a book without free copies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub id: u32,
    pub email: String,
}

/// Entry together with its 1-based queue position
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueuedEntry {
    pub position: usize,
    #[serde(flatten)]
    pub entry: WaitlistEntry,
}
