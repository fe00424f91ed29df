use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;

use factcast_core::{FeedEvents, Scheduler};

use crate::config::{config_path, load_config, save_config};
use crate::device::SimDevice;
use crate::state::{device_path, facts_path};
use crate::store_json::JsonStore;

fn prompt(label: &str, default: &str) -> Result<String> {
    print!("{label} [{default}]: ");
    io::stdout().flush().ok();
    let mut s = String::new();
    io::stdin().read_line(&mut s)?;
    let s = s.trim().to_string();
    Ok(if s.is_empty() { default.to_string() } else { s })
}

pub async fn run_setup() -> Result<()> {
    println!("factcast setup\n");

    let mut cfg = load_config()?;
    cfg.profile.timezone = prompt("Timezone (IANA)", &cfg.profile.timezone)?;
    cfg.profile.locale = prompt("Locale", &cfg.profile.locale)?;
    let times = prompt(
        "Delivery times (1-3, comma separated)",
        &cfg.profile.preferred_times.join(","),
    )?;
    cfg.profile.preferred_times = times
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    // Fail here rather than at the first sync.
    cfg.preferred_times()?;
    cfg.tz()?;
    save_config(&cfg)?;
    println!("Wrote {}", config_path()?.display());

    let grant = prompt("Enable notifications (y/n)", "y")?;
    let device = SimDevice::load(device_path()?)?;
    device.set_permission(grant.eq_ignore_ascii_case("y"))?;

    let store = JsonStore::load(facts_path()?)?;
    let events = Arc::new(FeedEvents::new());
    let sched = Scheduler::new(store, device, cfg.prefs()?).with_events(events);

    let now = Utc::now();
    let first = sched.show_immediate_fact(now).await;
    if first.success {
        println!("\nA first fact is waiting in your feed (factcast feed).");
    } else if let Some(err) = &first.error {
        println!("\nNo content yet ({err}); run `factcast fetch` and then `factcast sync`.");
        return Ok(());
    }

    let out = sched.sync(now).await;
    if out.skipped {
        println!("Notifications disabled; facts will only appear in the feed.");
    } else if out.success {
        println!("Scheduled {} notification(s).", out.count);
    } else {
        println!(
            "Scheduling failed: {}",
            out.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
