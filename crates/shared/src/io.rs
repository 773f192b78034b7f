use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::card::{CardDraft, DRAFT_VERSION};

/// Creates `dir` if needed and returns it.
pub fn ensure_dir(dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    Ok(dir.to_path_buf())
}

/// Save a card draft as pretty JSON so it can be edited by hand
pub fn save_draft(draft: &CardDraft, path: &Path) -> Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }

    let json = serde_json::to_string_pretty(draft).context("Failed to serialize card draft")?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write card draft {}", path.display()))?;

    Ok(path.to_path_buf())
}

/// Load and validate a card draft
pub fn load_draft(path: &Path) -> Result<CardDraft> {
    if !path.exists() {
        anyhow::bail!("Card draft not found: {}", path.display());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read card draft: {}", path.display()))?;

    let draft: CardDraft = serde_json::from_str(&content).with_context(|| {
        format!(
            "Failed to parse card draft JSON from {}. Check the file for editing mistakes such as a missing comma or quote.",
            path.display()
        )
    })?;

    if draft.version != DRAFT_VERSION {
        anyhow::bail!(
            "Unsupported card draft version: {}. Expected {}. Please regenerate the draft with render-card draft.",
            draft.version,
            DRAFT_VERSION
        );
    }

    if draft.items.is_empty() {
        anyhow::bail!(
            "Card draft {} contains no items. The file may be incomplete.",
            path.display()
        );
    }

    Ok(draft)
}
