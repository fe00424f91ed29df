use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

pub fn factcast_home() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".factcast"))
}

pub fn ensure_factcast_home() -> Result<PathBuf> {
    let dir = factcast_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn facts_path() -> Result<PathBuf> {
    Ok(ensure_factcast_home()?.join("facts.json"))
}

pub fn device_path() -> Result<PathBuf> {
    Ok(ensure_factcast_home()?.join("device.json"))
}

pub fn images_dir() -> Result<PathBuf> {
    let dir = ensure_factcast_home()?.join("images");
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}
