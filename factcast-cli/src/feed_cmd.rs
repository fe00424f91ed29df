//! Feed display: shown facts grouped by local day, newest first.

use anyhow::Result;
use chrono::NaiveDate;

use factcast_core::{ContentStore, Fact};

use crate::config::load_config;
use crate::state::facts_path;
use crate::store_json::JsonStore;

pub async fn run_feed(limit: usize) -> Result<()> {
    let cfg = load_config()?;
    let tz = cfg.tz()?;
    let store = JsonStore::load(facts_path()?)?;

    let mut shown: Vec<Fact> = store
        .all()
        .await?
        .into_iter()
        .filter(|f| f.shown_at.is_some())
        .collect();
    if shown.is_empty() {
        println!("Feed is empty. Run `factcast fetch`, then `factcast sync`.");
        return Ok(());
    }
    shown.sort_by_key(|f| std::cmp::Reverse(f.shown_at));
    shown.truncate(limit);

    let mut current_day: Option<NaiveDate> = None;
    for fact in &shown {
        let at = fact.shown_at.expect("filtered on shown_at").with_timezone(&tz);
        let day = at.date_naive();
        if current_day != Some(day) {
            println!("\n{}", day.format("%A, %B %-d %Y"));
            current_day = Some(day);
        }
        println!("  {}  {}", at.format("%H:%M"), fact.text);
    }
    Ok(())
}
