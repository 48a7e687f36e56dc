//! Shared group state: registry + message log behind one critical section.
//!
//! A `Group` is owned by the runtime (behind a single mutex) and handed to
//! every connection handler. Each public method is one critical section.
//! Methods that mutate state never perform socket writes: multicast returns a
//! `Fanout` that the caller delivers after releasing the lock, and replay
//! goes through `Outbound::deliver`, which only enqueues.

use std::sync::Arc;

use crate::{
    env::Environment,
    error::GroupError,
    log::{MessageLog, RetentionWindow},
    outbound::Outbound,
    registry::{GroupRegistry, HandleId},
};

/// Messages queued for a reconnecting handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Entries delivered to the reconnecting handle.
    pub replayed: usize,
    /// Expired entries removed from the log by this scan.
    pub evicted: usize,
}

/// Result of delivering a `Fanout`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanoutReport {
    /// Handles the message was handed to.
    pub delivered: usize,
    /// Handles whose channel is broken. Feed these, with the `Fanout`, to
    /// `Group::evict`.
    pub failed: Vec<HandleId>,
}

/// One multicast, captured under the lock, delivered outside it.
#[derive(Debug, Clone)]
pub struct Fanout<O> {
    message: Arc<str>,
    recipients: Vec<(HandleId, O)>,
}

impl<O: Outbound> Fanout<O> {
    /// The formatted message.
    pub fn message(&self) -> &Arc<str> {
        &self.message
    }

    /// Handles that were ACTIVE when the message was logged.
    pub fn recipients(&self) -> impl Iterator<Item = HandleId> + '_ {
        self.recipients.iter().map(|(id, _)| *id)
    }

    /// Channel `handle` was snapshotted with.
    fn channel(&self, handle: HandleId) -> Option<&O> {
        self.recipients.iter().find(|(id, _)| *id == handle).map(|(_, outbound)| outbound)
    }

    /// Hand the message to every recipient.
    ///
    /// A failing recipient does not stop delivery to the others.
    pub fn deliver(&self) -> FanoutReport {
        let mut report = FanoutReport::default();
        for (handle, outbound) in &self.recipients {
            match outbound.deliver(&self.message) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!(%handle, error = %e, "multicast delivery failed");
                    report.failed.push(*handle);
                },
            }
        }
        report
    }
}

/// Registry and message log shared by all handlers.
pub struct Group<E, O>
where
    E: Environment,
{
    registry: GroupRegistry<O>,
    log: MessageLog<E::Instant>,
    retention: RetentionWindow,
    env: E,
}

impl<E, O> Group<E, O>
where
    E: Environment,
    O: Outbound,
{
    /// Empty group with the given retention window.
    pub fn new(env: E, retention: RetentionWindow) -> Self {
        Self { registry: GroupRegistry::new(), log: MessageLog::new(), retention, env }
    }

    /// Retention window applied by reconnect scans.
    pub fn retention(&self) -> RetentionWindow {
        self.retention
    }

    /// Current members.
    pub fn registry(&self) -> &GroupRegistry<O> {
        &self.registry
    }

    /// Current log contents.
    pub fn log(&self) -> &MessageLog<E::Instant> {
        &self.log
    }

    /// Whether `handle` is ACTIVE.
    pub fn is_member(&self, handle: HandleId) -> bool {
        self.registry.is_member(handle)
    }

    /// Owned snapshot of the active members.
    pub fn active_members(&self) -> Vec<(HandleId, O)> {
        self.registry.active_members()
    }

    /// Add `handle` to the multicast group. Idempotent.
    pub fn register(&mut self, handle: HandleId, outbound: O) -> bool {
        let added = self.registry.register(handle, outbound);
        tracing::debug!(%handle, added, members = self.registry.len(), "register");
        added
    }

    /// Remove `handle` from the multicast group. Idempotent.
    pub fn deregister(&mut self, handle: HandleId) -> bool {
        let removed = self.registry.deregister(handle);
        tracing::debug!(%handle, removed, members = self.registry.len(), "deregister");
        removed
    }

    /// Deregister the handles whose channel broke during `fanout`.
    ///
    /// A handle is removed only while it is still registered with the channel
    /// that failed. One that left and rejoined after the snapshot keeps its
    /// new registration.
    pub fn evict(&mut self, fanout: &Fanout<O>, failed: &[HandleId]) -> usize {
        let mut evicted = 0;
        for &handle in failed {
            let Some(broken) = fanout.channel(handle) else { continue };
            let Some(current) = self.registry.get(handle) else { continue };
            if current.same_channel(broken) {
                self.registry.deregister(handle);
                evicted += 1;
            } else {
                tracing::debug!(%handle, "rejoined since fan-out, keeping new channel");
            }
        }
        if evicted > 0 {
            tracing::info!(evicted, members = self.registry.len(), "evicted broken members");
        }
        evicted
    }

    /// Log `message` and snapshot its recipients.
    ///
    /// Handles registering after this call returns never receive the
    /// message live; they may only see it through a later replay.
    pub fn multicast(&mut self, message: Arc<str>) -> Fanout<O> {
        self.log.append(Arc::clone(&message), self.env.now());
        let recipients = self.registry.active_members();
        tracing::debug!(recipients = recipients.len(), log_len = self.log.len(), "multicast");
        Fanout { message, recipients }
    }

    /// Replay the non-expired log to `handle`, evicting expired entries.
    ///
    /// Precondition: `handle` is already registered. Eviction applies to the
    /// shared log, not just to this handle's view. If the handle's channel
    /// breaks mid-replay it is deregistered and the remaining entries are
    /// skipped for it (they stay in the log).
    pub fn reconnect(&mut self, handle: HandleId) -> Result<ReplayReport, GroupError> {
        let outbound = self.registry.get(handle).ok_or(GroupError::NotMember(handle))?.clone();

        let outcome = self.log.scan(self.env.now(), self.retention);
        let mut report = ReplayReport { replayed: 0, evicted: outcome.evicted };

        for text in &outcome.replay {
            if let Err(source) = outbound.deliver(text) {
                self.registry.deregister(handle);
                return Err(GroupError::Replay { handle, source });
            }
            report.replayed += 1;
        }

        tracing::info!(%handle, replayed = report.replayed, evicted = report.evicted, "replay");
        Ok(report)
    }

    /// Register and replay in one critical section.
    ///
    /// A multicast racing with a rejoin is therefore delivered exactly once:
    /// either it was logged before the scan (replayed) or after the register
    /// (live), never both.
    pub fn rejoin(&mut self, handle: HandleId, outbound: O) -> Result<ReplayReport, GroupError> {
        self.register(handle, outbound);
        self.reconnect(handle)
    }
}

impl<E, O> std::fmt::Debug for Group<E, O>
where
    E: Environment,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("members", &self.registry.len())
            .field("log_len", &self.log.len())
            .field("retention", &self.retention)
            .finish_non_exhaustive()
    }
}
