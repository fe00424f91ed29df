//! Scheduling subcommands: wire the engine to the JSON store and the
//! simulated device, run one operation, report the outcome.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::Subcommand;

use factcast_core::{
    is_valid_schedule, FeedEvent, FeedEvents, ScheduleOutcome, Scheduler, StaticPrefs,
};

use crate::config::{load_config, save_config, Config};
use crate::device::SimDevice;
use crate::state::{device_path, facts_path};
use crate::store_json::JsonStore;

#[derive(Subcommand, Debug)]
pub enum TimesCommand {
    /// Show the configured delivery times
    Show,

    /// Replace the delivery times (1-3 entries, "HH:MM") and reschedule
    Set { times: Vec<String> },
}

#[derive(Subcommand, Debug)]
pub enum PermissionCommand {
    /// Show the simulated permission state
    Status,

    /// Grant notification permission on the simulated device
    Grant,

    /// Revoke permission and run a sync so the schedule is torn down
    Revoke,
}

type CliScheduler = Scheduler<JsonStore, SimDevice, StaticPrefs>;

fn build_scheduler(cfg: &Config, events: Arc<FeedEvents>) -> Result<CliScheduler> {
    let store = JsonStore::load(facts_path()?)?;
    let device = SimDevice::load(device_path()?)?;
    Ok(Scheduler::new(store, device, cfg.prefs()?).with_events(events))
}

fn print_outcome(op: &str, out: &ScheduleOutcome) {
    if out.skipped {
        println!("{op}: skipped (notification permission not granted)");
    } else if out.success {
        println!("{op}: ok, {} notification(s) scheduled", out.count);
    } else {
        println!(
            "{op}: failed: {}",
            out.error.as_deref().unwrap_or("unknown error")
        );
    }
}

/// Run `op` against a freshly composed scheduler, draining feed events for
/// display afterwards.
async fn with_scheduler<F, Fut>(op_name: &str, op: F) -> Result<()>
where
    F: FnOnce(Arc<CliScheduler>) -> Fut,
    Fut: std::future::Future<Output = ScheduleOutcome>,
{
    let cfg = load_config()?;
    let events = Arc::new(FeedEvents::new());
    let (sub, mut rx) = events.subscribe();
    let sched = Arc::new(build_scheduler(&cfg, events.clone())?);

    let fired = sched.queue().fire_due(Utc::now())?;
    if !fired.is_empty() {
        println!("{} notification(s) fired since last run", fired.len());
    }

    let out = op(sched).await;
    print_outcome(op_name, &out);

    while let Ok(ev) = rx.try_recv() {
        match ev {
            FeedEvent::FeedRefreshed { newly_shown } => {
                println!("feed: {newly_shown} new fact(s) available");
            }
            FeedEvent::ScheduleChanged { scheduled } => {
                println!("schedule: {scheduled} slot(s) changed");
            }
        }
    }
    events.unsubscribe(sub);
    Ok(())
}

pub async fn run_sync() -> Result<()> {
    with_scheduler("sync", |s| async move { s.sync(Utc::now()).await }).await
}

pub async fn run_reschedule() -> Result<()> {
    with_scheduler("reschedule", |s| async move {
        s.reschedule_all(Utc::now()).await
    })
    .await
}

pub async fn run_clear(include_past: bool) -> Result<()> {
    with_scheduler("clear", move |s| async move {
        s.clear_all(include_past, Utc::now()).await
    })
    .await
}

pub async fn run_times(cmd: TimesCommand) -> Result<()> {
    match cmd {
        TimesCommand::Show => {
            let cfg = load_config()?;
            for t in cfg.preferred_times()? {
                println!("{t}");
            }
            Ok(())
        }
        TimesCommand::Set { times } => {
            let mut cfg = load_config()?;
            cfg.profile.preferred_times = times;
            // Validate before persisting.
            let parsed = cfg.preferred_times()?;
            save_config(&cfg)?;
            println!(
                "Delivery times set to {}",
                parsed
                    .iter()
                    .map(|t| t.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            run_reschedule().await
        }
    }
}

pub async fn run_permission(cmd: PermissionCommand) -> Result<()> {
    let device = SimDevice::load(device_path()?)?;
    match cmd {
        PermissionCommand::Status => {
            use factcast_core::NotificationQueue;
            let status = device.permission_status().await?;
            println!("Permission: {status:?}");
            Ok(())
        }
        PermissionCommand::Grant => {
            use factcast_core::NotificationQueue;
            device.request_permission().await?;
            println!("Permission granted");
            Ok(())
        }
        PermissionCommand::Revoke => {
            device.set_permission(false)?;
            println!("Permission revoked");
            // The next cycle observes the revocation and tears down.
            run_sync().await
        }
    }
}

pub async fn run_status() -> Result<()> {
    use factcast_core::{ContentStore, NotificationQueue};

    let cfg = load_config()?;
    let now = Utc::now();
    let store = JsonStore::load(facts_path()?)?;
    let device = SimDevice::load(device_path()?)?;

    let status = device.permission_status().await?;
    let pending = device.list_pending().await?;
    let all = store.all().await?;
    let shown = all.iter().filter(|f| f.shown_at.is_some()).count();
    let unscheduled = all.iter().filter(|f| f.is_unscheduled()).count();
    let future = store
        .count_future_pending(Some(&cfg.profile.locale), now)
        .await?;

    println!("Permission:        {status:?}");
    println!("Pending in queue:  {}", pending.len());
    if let Some(next) = pending.iter().map(|p| p.trigger_at).min() {
        println!("Next delivery:     {}", next.with_timezone(&cfg.tz()?));
    }
    if let Some(last) = store.latest_scheduled_instant().await? {
        println!("Last delivery:     {}", last.with_timezone(&cfg.tz()?));
    }
    println!("Store: {} fact(s) total, {future} scheduled, {shown} shown, {unscheduled} available", all.len());

    let instants: Vec<_> = pending.iter().map(|p| p.trigger_at).collect();
    let valid = is_valid_schedule(&instants, &cfg.preferred_times()?, cfg.tz()?);
    println!("Schedule valid:    {}", if valid { "yes" } else { "NO" });
    Ok(())
}
