use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use factcast_core::{canonicalize, parse_tz, PreferredTime, StaticPrefs};

use crate::state::ensure_factcast_home;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub profile: ProfileSection,
    pub feed: FeedSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSection {
    /// IANA zone, e.g. "America/Chicago".
    pub timezone: String,
    pub locale: String,
    /// One to three "HH:MM" delivery times.
    pub preferred_times: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSection {
    pub url: String,
    pub image_concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile: ProfileSection {
                timezone: "America/Chicago".to_string(),
                locale: "en".to_string(),
                preferred_times: vec!["09:00".to_string()],
            },
            feed: FeedSection {
                url: "https://factcast.dev/feed/en.json".to_string(),
                image_concurrency: 4,
            },
        }
    }
}

impl Config {
    pub fn tz(&self) -> Result<Tz> {
        parse_tz(&self.profile.timezone)
    }

    pub fn preferred_times(&self) -> Result<Vec<PreferredTime>> {
        let mut times = Vec::new();
        for s in &self.profile.preferred_times {
            times.push(PreferredTime::parse(s)?);
        }
        let times = canonicalize(&times);
        if times.is_empty() || times.len() > 3 {
            anyhow::bail!("preferred_times must hold 1-3 entries, got {}", times.len());
        }
        Ok(times)
    }

    pub fn prefs(&self) -> Result<StaticPrefs> {
        Ok(StaticPrefs::new(
            self.preferred_times()?,
            self.profile.locale.clone(),
            self.tz()?,
        ))
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_factcast_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let p = config_path()?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    Ok(toml::from_str(&s).context("parse config.toml")?)
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}
