//! `rhetor sources` subcommands

use anyhow::Context;
use rhetor_core::AnalysisConfig;
use rhetor_crypto::SecretString;
use rhetor_sources::{SourceDescriptor, SourceStore};

fn require(passphrase: Option<&SecretString>) -> anyhow::Result<&SecretString> {
    passphrase.context("a passphrase is required: pass --passphrase or set RHETOR_PASSPHRASE")
}

/// Strict load for commands that write the store back; an absent file
/// starts from the defaults.
fn open_for_update(config: &AnalysisConfig, passphrase: &SecretString) -> anyhow::Result<SourceStore> {
    let path = config.sources_path();
    if !path.exists() {
        return Ok(SourceStore::defaults());
    }
    SourceStore::open(&path, passphrase)
        .with_context(|| format!("cannot open source store {}", path.display()))
}

pub fn list(config: &AnalysisConfig, passphrase: Option<&SecretString>) {
    let store = SourceStore::load_or_default(&config.sources_path(), passphrase);
    if store.is_empty() {
        println!("(no sources)");
        return;
    }
    for source in store.iter() {
        let cached = if source.cached_text().is_some() { " [cached]" } else { "" };
        println!("{:<20} {:<12} {}{}", source.id, source.kind, source.label, cached);
    }
}

pub fn add(
    config: &AnalysisConfig,
    passphrase: Option<&SecretString>,
    descriptor: SourceDescriptor,
) -> anyhow::Result<()> {
    let passphrase = require(passphrase)?;
    let mut store = open_for_update(config, passphrase)?;
    let id = descriptor.id.clone();
    store.insert(descriptor)?;
    store.save(&config.sources_path(), passphrase)?;
    println!("Added source {}", id);
    Ok(())
}

pub fn remove(config: &AnalysisConfig, passphrase: Option<&SecretString>, id: &str) -> anyhow::Result<()> {
    let passphrase = require(passphrase)?;
    let mut store = open_for_update(config, passphrase)?;
    store.remove(id)?;
    store.save(&config.sources_path(), passphrase)?;
    println!("Removed source {}", id);
    Ok(())
}

pub fn seal(config: &AnalysisConfig, passphrase: Option<&SecretString>) -> anyhow::Result<()> {
    let passphrase = require(passphrase)?;
    let store = open_for_update(config, passphrase)?;
    let path = config.sources_path();
    store.save(&path, passphrase)?;
    println!("Sealed {} source(s) into {}", store.len(), path.display());
    Ok(())
}
