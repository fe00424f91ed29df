//! Scheduling orchestrator.
//!
//! Reconciles three independently-mutable parties each run: the OS pending
//! queue, the content store, and the user's preferred times. No mode is ever
//! persisted; the branch to take is inferred from live queries by `classify`,
//! which keeps the state machine explicit and testable apart from the I/O.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Timelike, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::delivery::mark_past_due_delivered;
use crate::events::{FeedEvent, FeedEvents};
use crate::fact::{Fact, ScheduledSlot};
use crate::prefs::PreferenceSource;
use crate::queue::{NotificationContent, NotificationQueue, PendingNotification};
use crate::slots::generate_slots;
use crate::store::ContentStore;
use crate::time::{canonicalize, resolve_local};

/// iOS allows at most 64 pending local notifications per app.
pub const OS_PENDING_LIMIT: usize = 64;

/// Structured result of every public scheduling operation. Callers branch on
/// these fields only; no operation panics or propagates an error past this.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScheduleOutcome {
    pub success: bool,
    pub count: usize,
    pub skipped: bool,
    pub error: Option<String>,
}

impl ScheduleOutcome {
    pub fn ok(count: usize) -> Self {
        Self {
            success: true,
            count,
            skipped: false,
            error: None,
        }
    }

    pub fn skipped() -> Self {
        Self {
            success: true,
            count: 0,
            skipped: true,
            error: None,
        }
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            count: 0,
            skipped: false,
            error: Some(msg.into()),
        }
    }
}

/// Which action a run takes, inferred from live state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    /// Permission missing: tear the schedule down.
    Disabled,
    /// Store believes items are scheduled but the OS queue is empty
    /// (OS-level data loss). Clear the store; the next run starts fresh.
    StoreAhead,
    /// OS has entries the store knows nothing about (store reset).
    /// Cancel them all, then build the full schedule.
    OsAhead,
    /// Queue is at or above the cap: nothing to do.
    AtCapacity,
    /// Both sides empty: build the full schedule.
    FullSchedule,
    /// Both sides live and below the cap: reconcile stale handles, then
    /// extend the schedule by `needed` slots.
    TopUp { needed: usize },
}

pub fn classify(
    permission_granted: bool,
    os_count: usize,
    store_count: usize,
    cap: usize,
) -> Branch {
    if !permission_granted {
        return Branch::Disabled;
    }
    if os_count == 0 && store_count > 0 {
        return Branch::StoreAhead;
    }
    if os_count > 0 && store_count == 0 {
        return Branch::OsAhead;
    }
    if os_count == 0 {
        return Branch::FullSchedule;
    }
    if os_count >= cap {
        return Branch::AtCapacity;
    }
    Branch::TopUp {
        needed: cap - os_count,
    }
}

/// The orchestrator. Owns the injected capabilities and serializes its public
/// operations behind one async mutex so re-entrant triggers (app foreground,
/// permission grant, download complete) cannot double-count the OS queue and
/// schedule past the cap.
pub struct Scheduler<S, Q, P> {
    store: S,
    queue: Q,
    prefs: P,
    cap: usize,
    events: Option<Arc<FeedEvents>>,
    op_lock: Mutex<()>,
}

impl<S: ContentStore, Q: NotificationQueue, P: PreferenceSource> Scheduler<S, Q, P> {
    pub fn new(store: S, queue: Q, prefs: P) -> Self {
        Self {
            store,
            queue,
            prefs,
            cap: OS_PENDING_LIMIT,
            events: None,
            op_lock: Mutex::new(()),
        }
    }

    pub fn with_cap(mut self, cap: usize) -> Self {
        self.cap = cap;
        self
    }

    pub fn with_events(mut self, events: Arc<FeedEvents>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// The top-up / permission-check cycle. Safe to call on every trigger.
    pub async fn sync(&self, now: DateTime<Utc>) -> ScheduleOutcome {
        let _guard = self.op_lock.lock().await;
        match self.sync_inner(now).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "sync failed");
                ScheduleOutcome::failed(e.to_string())
            }
        }
    }

    /// Tear down and rebuild the whole schedule (preferred times changed).
    pub async fn reschedule_all(&self, now: DateTime<Utc>) -> ScheduleOutcome {
        let _guard = self.op_lock.lock().await;
        let result = async {
            self.clear_all_inner(false, now).await?;
            self.full_schedule(now).await
        }
        .await;
        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "reschedule failed");
                ScheduleOutcome::failed(e.to_string())
            }
        }
    }

    /// Cancel every OS entry. With `clear_past` false (normal reschedule
    /// path) delivered content is folded into the feed first and only future
    /// scheduling state is cleared; with `clear_past` true (permission
    /// revoked) scheduling state is wiped unconditionally.
    pub async fn clear_all(&self, clear_past: bool, now: DateTime<Utc>) -> ScheduleOutcome {
        let _guard = self.op_lock.lock().await;
        match self.clear_all_inner(clear_past, now).await {
            Ok(()) => ScheduleOutcome::ok(0),
            Err(e) => {
                warn!(error = %e, "clear failed");
                ScheduleOutcome::failed(e.to_string())
            }
        }
    }

    /// First-run path: surface one fact in the feed right now, bypassing the
    /// OS entirely, so the feed is not empty before the first notification
    /// fires. Runs before the first sync so selection excludes the fact.
    pub async fn show_immediate_fact(&self, now: DateTime<Utc>) -> ScheduleOutcome {
        let _guard = self.op_lock.lock().await;
        match self.show_immediate_inner(now).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "immediate fact failed");
                ScheduleOutcome::failed(e.to_string())
            }
        }
    }

    /// Request permission when it has not been granted yet.
    pub async fn ensure_permission(&self) -> Result<crate::queue::PermissionStatus> {
        let status = self.queue.permission_status().await?;
        if status.is_granted() {
            return Ok(status);
        }
        self.queue.request_permission().await
    }

    async fn sync_inner(&self, now: DateTime<Utc>) -> Result<ScheduleOutcome> {
        // Delivery sync runs before any branch decision so a teardown or
        // rebuild never loses content the user already received.
        let shown = mark_past_due_delivered(&self.store, None, now).await?;
        if shown > 0 {
            self.publish(FeedEvent::FeedRefreshed { newly_shown: shown });
        }

        let permission = self.queue.permission_status().await?;
        let pending = if permission.is_granted() {
            self.queue.list_pending().await?
        } else {
            Vec::new()
        };
        let locale = self.prefs.locale();
        let store_count = self
            .store
            .count_future_pending(Some(&locale), now)
            .await?;

        let branch = classify(permission.is_granted(), pending.len(), store_count, self.cap);
        debug!(?branch, os = pending.len(), store = store_count, "sync");

        match branch {
            Branch::Disabled => {
                self.queue.cancel_all().await?;
                self.store.clear_all_scheduling().await?;
                Ok(ScheduleOutcome::skipped())
            }
            Branch::StoreAhead => {
                // OS lost its queue; drop our stale beliefs. The next run
                // sees both sides empty and rebuilds from scratch.
                self.store.clear_all_scheduling().await?;
                Ok(ScheduleOutcome::ok(0))
            }
            Branch::OsAhead => {
                self.queue.cancel_all().await?;
                self.full_schedule(now).await
            }
            Branch::AtCapacity => Ok(ScheduleOutcome::ok(0)),
            Branch::FullSchedule => self.full_schedule(now).await,
            Branch::TopUp { needed } => self.top_up(&pending, needed, now).await,
        }
    }

    async fn top_up(
        &self,
        pending: &[PendingNotification],
        needed: usize,
        now: DateTime<Utc>,
    ) -> Result<ScheduleOutcome> {
        // Stale-handle reconciliation happens whether or not the top-up below
        // schedules anything.
        let valid: Vec<String> = pending.iter().map(|p| p.handle.clone()).collect();
        let dropped = self.store.clear_stale_handles(&valid).await?;
        if dropped > 0 {
            debug!(dropped, "dropped associations with no live OS handle");
        }

        // Continue after the latest already-scheduled instant so new slots
        // never collide with live ones.
        let cursor = pending.iter().map(|p| p.trigger_at).max().unwrap_or(now);
        let slots = generate_slots(
            &self.prefs.preferred_times(),
            needed,
            Some(cursor),
            now,
            self.prefs.timezone(),
        );

        let locale = self.prefs.locale();
        let facts = self.store.random_unscheduled(slots.len(), &locale).await?;
        if facts.is_empty() {
            return Ok(ScheduleOutcome::failed(format!(
                "No facts available for locale '{locale}'"
            )));
        }

        let scheduled = self.register_batch(facts.iter().zip(slots.iter().map(|s| s.at))).await;
        if scheduled > 0 {
            self.publish(FeedEvent::ScheduleChanged { scheduled });
        }
        Ok(ScheduleOutcome::ok(scheduled))
    }

    /// Build the whole schedule from an empty queue: `cap / n` facts per
    /// preferred time (remainder dropped, not redistributed), successive
    /// facts on successive days within each time.
    async fn full_schedule(&self, now: DateTime<Utc>) -> Result<ScheduleOutcome> {
        let times = canonicalize(&self.prefs.preferred_times());
        if times.is_empty() {
            return Ok(ScheduleOutcome::failed(
                "no preferred delivery times configured",
            ));
        }
        let tz = self.prefs.timezone();
        let per_time = self.cap / times.len();

        let locale = self.prefs.locale();
        let facts = self
            .store
            .random_unscheduled(per_time * times.len(), &locale)
            .await?;
        if facts.is_empty() {
            return Ok(ScheduleOutcome::failed(format!(
                "No facts available for locale '{locale}'"
            )));
        }

        let local_now = now.with_timezone(&tz);
        let today = local_now.date_naive();

        let mut assignments: Vec<(&Fact, DateTime<Utc>)> = Vec::new();
        let mut fact_iter = facts.iter();
        'times: for t in &times {
            // Start today while this time-of-day is still ahead, else tomorrow.
            let start: i64 = if (t.hour, t.minute) > (local_now.hour(), local_now.minute()) {
                0
            } else {
                1
            };
            for i in 0..per_time {
                let Some(fact) = fact_iter.next() else {
                    break 'times;
                };
                let date = today + Duration::days(start + i as i64);
                let Some(mut at) = resolve_local(date, *t, tz) else {
                    // Nonexistent local time (DST gap); leave the fact for a
                    // later pass.
                    continue;
                };
                if at <= now {
                    // Second guard beyond the start offset.
                    at = resolve_local(date + Duration::days(1), *t, tz)
                        .unwrap_or(at + Duration::days(1));
                }
                assignments.push((fact, at));
            }
        }

        let scheduled = self.register_batch(assignments.into_iter()).await;
        if scheduled > 0 {
            self.publish(FeedEvent::ScheduleChanged { scheduled });
        }
        Ok(ScheduleOutcome::ok(scheduled))
    }

    /// Register each (fact, instant) pair sequentially. Sequential on
    /// purpose: it preserves the register-then-persist ordering per item and
    /// stays under OS registration rate limits. A single failure is logged
    /// and skipped, never aborting the rest of the batch.
    async fn register_batch<'a, I>(&self, pairs: I) -> usize
    where
        I: Iterator<Item = (&'a Fact, DateTime<Utc>)>,
    {
        let mut scheduled = 0;
        for (fact, at) in pairs {
            match self.try_register_and_persist(fact, at).await {
                Ok(_) => scheduled += 1,
                Err(e) => {
                    warn!(fact = %fact.id, error = %e, "registration failed; fact stays unscheduled");
                }
            }
        }
        scheduled
    }

    /// The two-phase unit: (1) register with the OS; (2) only on a confirmed
    /// non-empty handle, persist the association. A failure at either step
    /// leaves the fact unscheduled and eligible for a later attempt; the
    /// store never points at a registration that does not exist.
    async fn try_register_and_persist(
        &self,
        fact: &Fact,
        at: DateTime<Utc>,
    ) -> Result<ScheduledSlot> {
        let handle = self
            .queue
            .register(NotificationContent::from_fact(fact), at)
            .await
            .with_context(|| format!("register notification for fact {}", fact.id))?;
        if handle.is_empty() {
            anyhow::bail!("OS returned an empty handle for fact {}", fact.id);
        }
        self.store
            .mark_scheduled(&fact.id, at, &handle)
            .await
            .with_context(|| format!("persist schedule for fact {}", fact.id))?;
        Ok(ScheduledSlot {
            fact_id: fact.id.clone(),
            at,
            handle,
        })
    }

    async fn clear_all_inner(&self, clear_past: bool, now: DateTime<Utc>) -> Result<()> {
        self.queue.cancel_all().await?;
        if clear_past {
            self.store.clear_all_scheduling().await?;
        } else {
            let shown = mark_past_due_delivered(&self.store, None, now).await?;
            if shown > 0 {
                self.publish(FeedEvent::FeedRefreshed { newly_shown: shown });
            }
            self.store.clear_future_scheduling(now).await?;
        }
        Ok(())
    }

    async fn show_immediate_inner(&self, now: DateTime<Utc>) -> Result<ScheduleOutcome> {
        let locale = self.prefs.locale();
        let facts = self.store.random_unscheduled(1, &locale).await?;
        let Some(fact) = facts.first() else {
            return Ok(ScheduleOutcome::failed(format!(
                "No facts available for locale '{locale}'"
            )));
        };
        self.store.mark_shown_at(&fact.id, now).await?;
        self.publish(FeedEvent::FeedRefreshed { newly_shown: 1 });
        Ok(ScheduleOutcome::ok(1))
    }

    fn publish(&self, event: FeedEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::StaticPrefs;
    use crate::queue::PermissionStatus;
    use crate::store::MemoryStore;
    use crate::time::PreferredTime;
    use crate::validate::is_valid_schedule;
    use chrono::TimeZone;
    use chrono_tz::Tz;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    /// Scripted OS queue double.
    #[derive(Default)]
    struct MockQueue {
        granted: StdMutex<bool>,
        pending: StdMutex<Vec<PendingNotification>>,
        register_calls: AtomicUsize,
        cancel_calls: AtomicUsize,
        /// Fail every nth registration (1-based), to exercise the per-item
        /// failure path.
        fail_every: Option<usize>,
        next_handle: AtomicUsize,
    }

    impl MockQueue {
        fn granted() -> Self {
            Self {
                granted: StdMutex::new(true),
                ..Default::default()
            }
        }

        fn denied() -> Self {
            Self::default()
        }

        fn seed_pending(&self, entries: Vec<PendingNotification>) {
            *self.pending.lock().unwrap() = entries;
        }

        fn registers(&self) -> usize {
            self.register_calls.load(Ordering::SeqCst)
        }

        fn cancels(&self) -> usize {
            self.cancel_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl NotificationQueue for MockQueue {
        async fn permission_status(&self) -> Result<PermissionStatus> {
            Ok(if *self.granted.lock().unwrap() {
                PermissionStatus::Granted
            } else {
                PermissionStatus::Denied
            })
        }

        async fn request_permission(&self) -> Result<PermissionStatus> {
            *self.granted.lock().unwrap() = true;
            Ok(PermissionStatus::Granted)
        }

        async fn list_pending(&self) -> Result<Vec<PendingNotification>> {
            Ok(self.pending.lock().unwrap().clone())
        }

        async fn register(
            &self,
            _content: NotificationContent,
            trigger_at: DateTime<Utc>,
        ) -> Result<String> {
            let n = self.register_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(every) = self.fail_every {
                if n % every == 0 {
                    anyhow::bail!("simulated OS rejection");
                }
            }
            let handle = format!("ntf-{}", self.next_handle.fetch_add(1, Ordering::SeqCst));
            self.pending.lock().unwrap().push(PendingNotification {
                handle: handle.clone(),
                trigger_at,
            });
            Ok(handle)
        }

        async fn cancel_all(&self) -> Result<()> {
            self.cancel_calls.fetch_add(1, Ordering::SeqCst);
            self.pending.lock().unwrap().clear();
            Ok(())
        }
    }

    fn utc_tz() -> Tz {
        "UTC".parse().unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    fn prefs(times: &[(u32, u32)]) -> StaticPrefs {
        StaticPrefs::new(
            times.iter().map(|&(h, m)| PreferredTime::new(h, m)).collect(),
            "en",
            utc_tz(),
        )
    }

    fn facts(n: usize) -> Vec<Fact> {
        (0..n)
            .map(|i| Fact::new(format!("f{i:03}"), "en", format!("fact {i}")))
            .collect()
    }

    #[test]
    fn classify_covers_every_branch() {
        assert_eq!(classify(false, 10, 10, 64), Branch::Disabled);
        assert_eq!(classify(true, 0, 5, 64), Branch::StoreAhead);
        assert_eq!(classify(true, 5, 0, 64), Branch::OsAhead);
        assert_eq!(classify(true, 0, 0, 64), Branch::FullSchedule);
        assert_eq!(classify(true, 64, 40, 64), Branch::AtCapacity);
        assert_eq!(classify(true, 70, 40, 64), Branch::AtCapacity);
        assert_eq!(classify(true, 40, 40, 64), Branch::TopUp { needed: 24 });
    }

    #[tokio::test]
    async fn empty_queue_builds_full_schedule() {
        let store = MemoryStore::with_facts(facts(10));
        let sched = Scheduler::new(store, MockQueue::granted(), prefs(&[(9, 0), (18, 0)]))
            .with_cap(6);

        let out = sched.sync(now()).await;
        assert!(out.success);
        assert_eq!(out.count, 6);

        let pending = sched.queue().list_pending().await.unwrap();
        assert_eq!(pending.len(), 6);
        for p in &pending {
            assert!(p.trigger_at > now());
        }
        let instants: Vec<DateTime<Utc>> = pending.iter().map(|p| p.trigger_at).collect();
        assert!(is_valid_schedule(
            &instants,
            &[PreferredTime::new(9, 0), PreferredTime::new(18, 0)],
            utc_tz()
        ));
        assert_eq!(
            sched.store().count_future_pending(Some("en"), now()).await.unwrap(),
            6
        );
    }

    #[tokio::test]
    async fn full_schedule_drops_cap_remainder() {
        let store = MemoryStore::with_facts(facts(10));
        let sched = Scheduler::new(store, MockQueue::granted(), prefs(&[(9, 0), (18, 0)]))
            .with_cap(7);

        let out = sched.sync(now()).await;
        // floor(7 / 2) = 3 per time; the seventh slot is dropped.
        assert_eq!(out.count, 6);
    }

    #[tokio::test]
    async fn top_up_fills_exactly_to_cap() {
        let store = MemoryStore::with_facts(facts(80));
        let queue = MockQueue::granted();

        // 40 live entries, newest at +40h.
        let seeded: Vec<PendingNotification> = (1..=40)
            .map(|i| PendingNotification {
                handle: format!("seed-{i}"),
                trigger_at: now() + Duration::hours(i),
            })
            .collect();
        queue.seed_pending(seeded);
        // The store backs one of them so both sides count as live.
        store
            .mark_scheduled("f000", now() + Duration::hours(1), "seed-1")
            .await
            .unwrap();

        let sched = Scheduler::new(store, queue, prefs(&[(9, 0)])).with_cap(64);
        let out = sched.sync(now()).await;

        assert!(out.success);
        assert_eq!(out.count, 24);
        assert_eq!(sched.queue().registers(), 24);
        assert_eq!(sched.queue().list_pending().await.unwrap().len(), 64);

        // Every new slot continues strictly after the latest live entry.
        let cursor = now() + Duration::hours(40);
        let pending = sched.queue().list_pending().await.unwrap();
        for p in pending.iter().filter(|p| !p.handle.starts_with("seed-")) {
            assert!(p.trigger_at > cursor);
        }
    }

    #[tokio::test]
    async fn top_up_drops_stale_store_handles() {
        let store = MemoryStore::with_facts(facts(10));
        store
            .mark_scheduled("f000", now() + Duration::hours(2), "gone")
            .await
            .unwrap();
        store
            .mark_scheduled("f001", now() + Duration::hours(3), "live")
            .await
            .unwrap();

        let queue = MockQueue::granted();
        queue.seed_pending(vec![PendingNotification {
            handle: "live".to_string(),
            trigger_at: now() + Duration::hours(3),
        }]);

        let sched = Scheduler::new(store, queue, prefs(&[(9, 0)])).with_cap(3);
        let out = sched.sync(now()).await;
        assert!(out.success);

        let all = sched.store().all().await.unwrap();
        assert!(!all.iter().any(|f| f.handle.as_deref() == Some("gone")));
        let f001 = all.iter().find(|f| f.id == "f001").unwrap();
        assert_eq!(f001.handle.as_deref(), Some("live"));
    }

    #[tokio::test]
    async fn per_item_failures_do_not_abort_the_batch() {
        let store = MemoryStore::with_facts(facts(10));
        let queue = MockQueue {
            granted: StdMutex::new(true),
            fail_every: Some(3),
            ..Default::default()
        };
        let sched = Scheduler::new(store, queue, prefs(&[(9, 0)])).with_cap(6);

        let out = sched.sync(now()).await;
        assert!(out.success);
        // Registrations 3 and 6 fail; the other four land.
        assert_eq!(out.count, 4);
        assert_eq!(sched.queue().registers(), 6);

        // Only confirmed registrations were persisted.
        let all = sched.store().all().await.unwrap();
        assert_eq!(all.iter().filter(|f| f.handle.is_some()).count(), 4);
    }

    #[tokio::test]
    async fn zero_facts_fails_without_touching_the_os() {
        let store = MemoryStore::new();
        let sched = Scheduler::new(store, MockQueue::granted(), prefs(&[(9, 0)])).with_cap(8);

        let out = sched.sync(now()).await;
        assert!(!out.success);
        assert!(out.error.unwrap().contains("No facts available"));
        assert_eq!(sched.queue().registers(), 0);
    }

    #[tokio::test]
    async fn permission_denied_tears_down_and_skips() {
        let store = MemoryStore::with_facts(facts(5));
        store
            .mark_scheduled("f000", now() - Duration::hours(1), "old")
            .await
            .unwrap();
        store
            .mark_scheduled("f001", now() + Duration::hours(1), "future")
            .await
            .unwrap();

        let sched = Scheduler::new(store, MockQueue::denied(), prefs(&[(9, 0)])).with_cap(8);
        let out = sched.sync(now()).await;

        assert!(out.skipped);
        assert_eq!(out.count, 0);
        assert_eq!(sched.queue().cancels(), 1);
        assert_eq!(sched.queue().registers(), 0);

        let all = sched.store().all().await.unwrap();
        // Past-due content was folded into the feed before the wipe.
        let f000 = all.iter().find(|f| f.id == "f000").unwrap();
        assert!(f000.shown_at.is_some());
        // Future association is gone.
        let f001 = all.iter().find(|f| f.id == "f001").unwrap();
        assert!(f001.handle.is_none() && f001.shown_at.is_none());
    }

    #[tokio::test]
    async fn store_ahead_clears_then_next_run_rebuilds() {
        let store = MemoryStore::with_facts(facts(10));
        store
            .mark_scheduled("f000", now() + Duration::hours(1), "phantom")
            .await
            .unwrap();

        let sched = Scheduler::new(store, MockQueue::granted(), prefs(&[(9, 0)])).with_cap(4);

        let first = sched.sync(now()).await;
        assert!(first.success);
        assert_eq!(first.count, 0);
        assert_eq!(
            sched.store().count_future_pending(Some("en"), now()).await.unwrap(),
            0
        );

        let second = sched.sync(now()).await;
        assert_eq!(second.count, 4);
    }

    #[tokio::test]
    async fn os_ahead_cancels_and_rebuilds_in_one_run() {
        let store = MemoryStore::with_facts(facts(10));
        let queue = MockQueue::granted();
        queue.seed_pending(vec![PendingNotification {
            handle: "orphan".to_string(),
            trigger_at: now() + Duration::hours(1),
        }]);

        let sched = Scheduler::new(store, queue, prefs(&[(9, 0)])).with_cap(4);
        let out = sched.sync(now()).await;

        assert!(out.success);
        assert_eq!(out.count, 4);
        assert_eq!(sched.queue().cancels(), 1);
        let pending = sched.queue().list_pending().await.unwrap();
        assert_eq!(pending.len(), 4);
        assert!(!pending.iter().any(|p| p.handle == "orphan"));
    }

    #[tokio::test]
    async fn at_capacity_is_a_noop() {
        let store = MemoryStore::with_facts(facts(10));
        store
            .mark_scheduled("f000", now() + Duration::hours(1), "seed-1")
            .await
            .unwrap();
        let queue = MockQueue::granted();
        queue.seed_pending(
            (1..=4)
                .map(|i| PendingNotification {
                    handle: format!("seed-{i}"),
                    trigger_at: now() + Duration::hours(i),
                })
                .collect(),
        );

        let sched = Scheduler::new(store, queue, prefs(&[(9, 0)])).with_cap(4);
        let out = sched.sync(now()).await;

        assert!(out.success);
        assert_eq!(out.count, 0);
        assert_eq!(sched.queue().registers(), 0);
    }

    #[tokio::test]
    async fn clear_without_past_preserves_feed_history() {
        let store = MemoryStore::with_facts(facts(5));
        store
            .mark_scheduled("f000", now() - Duration::hours(1), "old")
            .await
            .unwrap();
        store
            .mark_scheduled("f001", now() + Duration::hours(1), "future")
            .await
            .unwrap();

        let sched = Scheduler::new(store, MockQueue::granted(), prefs(&[(9, 0)]));
        let out = sched.clear_all(false, now()).await;
        assert!(out.success);
        assert_eq!(sched.queue().cancels(), 1);

        let all = sched.store().all().await.unwrap();
        let f000 = all.iter().find(|f| f.id == "f000").unwrap();
        assert_eq!(f000.shown_at, Some(now() - Duration::hours(1)));
        let f001 = all.iter().find(|f| f.id == "f001").unwrap();
        assert!(f001.is_unscheduled());
    }

    #[tokio::test]
    async fn clear_with_past_wipes_unconditionally() {
        let store = MemoryStore::with_facts(facts(5));
        store
            .mark_scheduled("f000", now() - Duration::hours(1), "old")
            .await
            .unwrap();

        let sched = Scheduler::new(store, MockQueue::granted(), prefs(&[(9, 0)]));
        let out = sched.clear_all(true, now()).await;
        assert!(out.success);

        let all = sched.store().all().await.unwrap();
        let f000 = all.iter().find(|f| f.id == "f000").unwrap();
        // No shown-marking on this path; the caller's preceding cycle owns that.
        assert!(f000.shown_at.is_none());
        assert!(f000.handle.is_none());
        assert!(f000.scheduled_for.is_none());
    }

    #[tokio::test]
    async fn immediate_fact_is_excluded_from_later_selection() {
        let store = MemoryStore::with_facts(facts(4));
        let sched = Scheduler::new(store, MockQueue::granted(), prefs(&[(9, 0)])).with_cap(3);

        let first = sched.show_immediate_fact(now()).await;
        assert!(first.success);
        assert_eq!(first.count, 1);

        let all = sched.store().all().await.unwrap();
        let shown: Vec<&Fact> = all.iter().filter(|f| f.shown_at.is_some()).collect();
        assert_eq!(shown.len(), 1);
        let shown_id = shown[0].id.clone();
        assert_eq!(shown[0].shown_at, Some(now()));

        let out = sched.sync(now()).await;
        assert_eq!(out.count, 3);
        let all = sched.store().all().await.unwrap();
        let scheduled_ids: Vec<&str> = all
            .iter()
            .filter(|f| f.handle.is_some())
            .map(|f| f.id.as_str())
            .collect();
        assert!(!scheduled_ids.contains(&shown_id.as_str()));
    }

    #[tokio::test]
    async fn reschedule_rebuilds_from_scratch() {
        let store = MemoryStore::with_facts(facts(12));
        let sched = Scheduler::new(store, MockQueue::granted(), prefs(&[(9, 0), (18, 0)]))
            .with_cap(4);

        assert_eq!(sched.sync(now()).await.count, 4);
        let out = sched.reschedule_all(now()).await;
        assert!(out.success);
        assert_eq!(out.count, 4);
        assert_eq!(sched.queue().cancels(), 1);
        assert_eq!(sched.queue().list_pending().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn concurrent_syncs_never_overfill_the_queue() {
        let store = MemoryStore::with_facts(facts(40));
        let sched = Scheduler::new(store, MockQueue::granted(), prefs(&[(9, 0)])).with_cap(8);

        let (a, b) = tokio::join!(sched.sync(now()), sched.sync(now()));
        assert!(a.success && b.success);
        assert_eq!(a.count + b.count, 8);
        assert_eq!(sched.queue().list_pending().await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn ensure_permission_requests_when_missing() {
        let sched = Scheduler::new(MemoryStore::new(), MockQueue::denied(), prefs(&[(9, 0)]));
        let status = sched.ensure_permission().await.unwrap();
        assert!(status.is_granted());
    }

    #[tokio::test]
    async fn total_store_failure_is_caught_at_the_boundary() {
        struct BrokenStore;

        #[async_trait::async_trait]
        impl ContentStore for BrokenStore {
            async fn random_unscheduled(&self, _: usize, _: &str) -> Result<Vec<Fact>> {
                anyhow::bail!("store unreachable")
            }
            async fn mark_scheduled(&self, _: &str, _: DateTime<Utc>, _: &str) -> Result<()> {
                anyhow::bail!("store unreachable")
            }
            async fn mark_shown_at(&self, _: &str, _: DateTime<Utc>) -> Result<()> {
                anyhow::bail!("store unreachable")
            }
            async fn mark_all_past_due_shown(
                &self,
                _: Option<&str>,
                _: DateTime<Utc>,
            ) -> Result<usize> {
                anyhow::bail!("store unreachable")
            }
            async fn clear_future_scheduling(&self, _: DateTime<Utc>) -> Result<()> {
                anyhow::bail!("store unreachable")
            }
            async fn clear_all_scheduling(&self) -> Result<()> {
                anyhow::bail!("store unreachable")
            }
            async fn clear_stale_handles(&self, _: &[String]) -> Result<usize> {
                anyhow::bail!("store unreachable")
            }
            async fn count_future_pending(
                &self,
                _: Option<&str>,
                _: DateTime<Utc>,
            ) -> Result<usize> {
                anyhow::bail!("store unreachable")
            }
            async fn latest_scheduled_instant(&self) -> Result<Option<DateTime<Utc>>> {
                anyhow::bail!("store unreachable")
            }
            async fn insert(&self, _: Fact) -> Result<()> {
                anyhow::bail!("store unreachable")
            }
            async fn all(&self) -> Result<Vec<Fact>> {
                anyhow::bail!("store unreachable")
            }
        }

        let sched = Scheduler::new(BrokenStore, MockQueue::granted(), prefs(&[(9, 0)]));
        let out = sched.sync(now()).await;
        assert!(!out.success);
        assert!(out.error.unwrap().contains("store unreachable"));
    }
}
