use std::{
    sync::{
        LazyLock,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use {
    dashmap::{DashMap, mapref::entry::Entry},
    regex::Regex,
};

use guildlink_common::UserId;

const CLEANUP_EVERY_CHECKS: u64 = 512;

#[allow(clippy::expect_used)]
static INVITE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:discord\.gg|discord(?:app)?\.com/invite)/[a-z0-9-]+")
        .expect("invite pattern compiles")
});

/// True when the text carries a guild invite link. Invites are banned
/// from the shared feed and a match is fatal to the whole relay
/// attempt, not just one destination.
#[must_use]
pub fn contains_invite_link(text: &str) -> bool {
    INVITE_LINK.is_match(text)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownDecision {
    Allowed,
    Blocked { retry_after: Duration },
}

impl CooldownDecision {
    #[must_use]
    pub fn allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Per-author minimum interval between accepted sends.
///
/// Entries older than three windows are swept periodically, so the map
/// tracks recent senders rather than every author ever seen.
pub struct CooldownGate {
    window: Duration,
    last_accepted: DashMap<UserId, Instant>,
    checks_seen: AtomicU64,
}

impl CooldownGate {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: DashMap::new(),
            checks_seen: AtomicU64::new(0),
        }
    }

    /// Checks the author and, when allowed, records the send as the new
    /// cooldown anchor in the same map operation.
    pub fn check(&self, author_id: UserId) -> CooldownDecision {
        self.check_at(author_id, Instant::now())
    }

    fn check_at(&self, author_id: UserId, now: Instant) -> CooldownDecision {
        let decision = match self.last_accepted.entry(author_id) {
            Entry::Occupied(mut occupied) => {
                let elapsed = now.duration_since(*occupied.get());
                if elapsed < self.window {
                    CooldownDecision::Blocked {
                        retry_after: self.window.saturating_sub(elapsed),
                    }
                } else {
                    occupied.insert(now);
                    CooldownDecision::Allowed
                }
            },
            Entry::Vacant(vacant) => {
                vacant.insert(now);
                CooldownDecision::Allowed
            },
        };

        self.cleanup_if_needed(now);
        decision
    }

    fn cleanup_if_needed(&self, now: Instant) {
        let seen = self.checks_seen.fetch_add(1, Ordering::Relaxed) + 1;
        if !seen.is_multiple_of(CLEANUP_EVERY_CHECKS) {
            return;
        }
        let stale_after = self.window.saturating_mul(3);
        self.last_accepted
            .retain(|_, last| now.duration_since(*last) <= stale_after);
    }
}
