//! `livedoc show`: print the current document.

use crate::{config::LivedocConfig, document::Document, document::DocumentStore};
use anyhow::{Context, Result, bail};
use std::io::Write;

pub fn show(config: &LivedocConfig, compact: bool) -> Result<()> {
    let path = &config.document.path;
    if !path.exists() {
        bail!("{} not found, run `livedoc init` first", path.display());
    }

    let store = DocumentStore::open(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let text = render(&store.read(), compact)?;

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{text}")?;
    Ok(())
}

fn render(document: &Document, compact: bool) -> serde_json::Result<String> {
    if compact {
        serde_json::to_string(document)
    } else {
        serde_json::to_string_pretty(document)
    }
}
