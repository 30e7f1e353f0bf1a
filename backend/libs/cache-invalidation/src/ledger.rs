//! Fallback Ledger
//!
//! In-memory record of invalidations that still have to happen. Entries are an
//! intent, not a log: registering an id that is already pending overwrites its
//! kind. Reconciliation passes walk a snapshot of one domain, retry each
//! entity with bounded backoff and remove an entry only once its eviction
//! succeeded. Entries whose retry budget runs out stay for the next pass.

use crate::adapter::CacheEvictor;
use crate::event::{CacheInvalidationEvent, InvalidationDomain, InvalidationEventKind};
use crate::metrics::LedgerMetrics;
use crate::retry::{with_retry, RetryPolicy};
use crate::{InvalidationError, InvalidationResult};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
struct PendingEntry {
    kind: InvalidationEventKind,
    registered_at: DateTime<Utc>,
}

/// One pending entry as exposed to operators
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingInvalidation {
    pub domain: InvalidationDomain,
    pub entity_id: Uuid,
    pub kind: InvalidationEventKind,
    pub registered_at: DateTime<Utc>,
}

pub struct FallbackLedger {
    evictor: Arc<dyn CacheEvictor>,
    retry: RetryPolicy,
    conversations: DashMap<Uuid, PendingEntry>,
    messages: DashMap<Uuid, PendingEntry>,
    users: DashMap<Uuid, PendingEntry>,
    metrics: Option<LedgerMetrics>,
}

impl FallbackLedger {
    pub fn new(evictor: Arc<dyn CacheEvictor>, retry: RetryPolicy) -> Self {
        Self {
            evictor,
            retry,
            conversations: DashMap::new(),
            messages: DashMap::new(),
            users: DashMap::new(),
            metrics: None,
        }
    }

    /// Create a ledger that keeps Prometheus gauges current
    pub fn with_metrics(
        evictor: Arc<dyn CacheEvictor>,
        retry: RetryPolicy,
        metrics: LedgerMetrics,
    ) -> Self {
        Self {
            metrics: Some(metrics),
            ..Self::new(evictor, retry)
        }
    }

    fn entries(&self, domain: InvalidationDomain) -> &DashMap<Uuid, PendingEntry> {
        match domain {
            InvalidationDomain::Conversation => &self.conversations,
            InvalidationDomain::Message => &self.messages,
            InvalidationDomain::User => &self.users,
        }
    }

    /// Record that `id` must be re-synced. A missing id is logged and ignored.
    ///
    /// Returns true when an entry was written.
    pub fn register_pending(
        &self,
        domain: InvalidationDomain,
        id: Option<Uuid>,
        kind: InvalidationEventKind,
    ) -> bool {
        let Some(id) = id else {
            warn!(domain = %domain, kind = %kind, "Ignoring pending invalidation without an id");
            return false;
        };

        let previous = self.entries(domain).insert(
            id,
            PendingEntry {
                kind,
                registered_at: Utc::now(),
            },
        );

        match previous {
            Some(prev) => debug!(
                domain = %domain,
                entity_id = %id,
                previous_kind = %prev.kind,
                kind = %kind,
                "Pending invalidation overwritten"
            ),
            None => debug!(
                domain = %domain,
                entity_id = %id,
                kind = %kind,
                "Pending invalidation registered"
            ),
        }

        if let Some(metrics) = &self.metrics {
            metrics.pending.set(self.pending_count() as i64);
        }
        true
    }

    /// Hand every entity touched by a failed dispatch to the ledger
    pub fn demote(&self, event: &CacheInvalidationEvent) {
        warn!(
            kind = %event.kind,
            conversation_id = %event.conversation_id,
            message_id = ?event.message_id,
            "Demoting failed invalidation to the fallback ledger"
        );

        self.register_pending(
            InvalidationDomain::Conversation,
            Some(event.conversation_id),
            event.kind,
        );
        if event.message_id.is_some() {
            self.register_pending(InvalidationDomain::Message, event.message_id, event.kind);
        }
        for user_id in event.participants() {
            self.register_pending(InvalidationDomain::User, Some(user_id), event.kind);
        }

        if let Some(metrics) = &self.metrics {
            metrics.demoted.inc();
        }
    }

    /// Sum of the three domains
    pub fn pending_count(&self) -> usize {
        self.conversations.len() + self.messages.len() + self.users.len()
    }

    pub fn pending_in(&self, domain: InvalidationDomain) -> usize {
        self.entries(domain).len()
    }

    /// Latest kind registered for an id, if still pending
    pub fn pending_kind(
        &self,
        domain: InvalidationDomain,
        id: Uuid,
    ) -> Option<InvalidationEventKind> {
        self.entries(domain).get(&id).map(|entry| entry.kind)
    }

    /// Registration time of the oldest pending entry across all domains
    pub fn oldest_registered_at(&self) -> Option<DateTime<Utc>> {
        [&self.conversations, &self.messages, &self.users]
            .into_iter()
            .filter_map(|entries| entries.iter().map(|entry| entry.registered_at).min())
            .min()
    }

    pub fn metrics(&self) -> Option<&LedgerMetrics> {
        self.metrics.as_ref()
    }

    pub fn snapshot(&self) -> Vec<PendingInvalidation> {
        [
            InvalidationDomain::Conversation,
            InvalidationDomain::Message,
            InvalidationDomain::User,
        ]
        .into_iter()
        .flat_map(|domain| {
            self.entries(domain)
                .iter()
                .map(|entry| PendingInvalidation {
                    domain,
                    entity_id: *entry.key(),
                    kind: entry.kind,
                    registered_at: entry.registered_at,
                })
                .collect::<Vec<_>>()
        })
        .collect()
    }

    /// Drop every pending entry
    pub fn clear_all(&self) {
        let dropped = self.pending_count();
        self.conversations.clear();
        self.messages.clear();
        self.users.clear();
        self.refresh_metrics();
        info!(dropped, "Cleared all pending invalidations");
    }

    /// Invalidate one conversation right now, with retry, bypassing the ledger
    pub async fn execute_immediate(&self, conversation_id: Uuid) -> InvalidationResult<()> {
        self.evict_conversation(conversation_id).await?;
        debug!(conversation_id = %conversation_id, "Immediate invalidation succeeded");
        Ok(())
    }

    pub async fn reconcile_conversations(&self) -> usize {
        self.reconcile(InvalidationDomain::Conversation).await
    }

    pub async fn reconcile_messages(&self) -> usize {
        self.reconcile(InvalidationDomain::Message).await
    }

    pub async fn reconcile_users(&self) -> usize {
        self.reconcile(InvalidationDomain::User).await
    }

    /// Run all three passes back to back
    pub async fn reconcile_all(&self) -> usize {
        self.reconcile_conversations().await
            + self.reconcile_messages().await
            + self.reconcile_users().await
    }

    /// One reconciliation pass over a domain. Returns how many entries were cleared.
    pub async fn reconcile(&self, domain: InvalidationDomain) -> usize {
        let entries = self.entries(domain);
        let ids: Vec<Uuid> = entries.iter().map(|entry| *entry.key()).collect();
        if ids.is_empty() {
            return 0;
        }

        let mut cleared = 0;
        for id in &ids {
            let outcome = match domain {
                InvalidationDomain::Conversation => self.evict_conversation(*id).await,
                InvalidationDomain::Message => self.evict_message(*id).await,
                InvalidationDomain::User => self.evict_user(*id).await,
            };

            if outcome.is_ok() {
                entries.remove(id);
                cleared += 1;
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.reconciled.inc_by(cleared as u64);
        }
        self.refresh_metrics();

        info!(
            domain = %domain,
            attempted = ids.len(),
            cleared,
            remaining = entries.len(),
            "Reconciliation pass finished"
        );
        cleared
    }

    async fn evict_conversation(&self, conversation_id: Uuid) -> InvalidationResult<()> {
        let evictor = &self.evictor;
        with_retry(&self.retry, "conversation", conversation_id, || async move {
            evictor.evict_conversation_details(conversation_id).await?;
            evictor.evict_conversation_messages(conversation_id).await?;
            evictor.evict_first_pages().await?;
            Ok::<_, InvalidationError>(())
        })
        .await
    }

    async fn evict_message(&self, message_id: Uuid) -> InvalidationResult<()> {
        let evictor = &self.evictor;
        with_retry(&self.retry, "message", message_id, || async move {
            evictor.evict_message(message_id).await?;
            Ok::<_, InvalidationError>(())
        })
        .await
    }

    async fn evict_user(&self, user_id: Uuid) -> InvalidationResult<()> {
        let evictor = &self.evictor;
        with_retry(&self.retry, "user", user_id, || async move {
            evictor.evict_user_conversations(user_id).await?;
            evictor.evict_first_pages().await?;
            Ok::<_, InvalidationError>(())
        })
        .await
    }

    /// Bring both gauges up to date. Walks every pending entry.
    pub fn refresh_metrics(&self) {
        let Some(metrics) = &self.metrics else {
            return;
        };

        metrics.pending.set(self.pending_count() as i64);
        let age = self
            .oldest_registered_at()
            .map(|ts| (Utc::now() - ts).num_seconds().max(0))
            .unwrap_or(0);
        metrics.oldest_pending_age_seconds.set(age);
    }
}
