//! Warning correlator.
//!
//! Merges scanned content files with the sorting engine's per-file metadata
//! into one ordered warning report. Pure: no I/O and no engine calls.

use crate::engine::{CleaningEntry, EngineMessage, PluginDetails};
use crate::models::{PluginInfo, WarningCategory, WarningEntry};
use indexmap::IndexMap;
use std::collections::HashSet;

/// Plugin name used for messages that apply to the whole load order.
pub const GENERAL_PLUGIN_NAME: &str = "General";

pub const USER_OVERRIDE_MESSAGE: &str = "User rules are applied to this plugin.";

/// Build the warning report.
///
/// `details` is keyed by lowercase filename. Files without metadata produce no
/// entries. The result is ordered by plugin name (case-insensitive), then
/// category, then insertion order.
pub fn correlate(
    plugins: &[PluginInfo],
    details: &IndexMap<String, PluginDetails>,
    general: &[EngineMessage],
) -> Vec<WarningEntry> {
    let known: HashSet<String> = plugins.iter().map(PluginInfo::key).collect();
    let mut entries = Vec::new();

    for plugin in plugins {
        let Some(detail) = details.get(&plugin.key()) else {
            continue;
        };
        let name = plugin.filename.as_str();

        for message in &detail.messages {
            push_message(&mut entries, name, message);
        }

        if detail.has_user_metadata {
            entries.push(WarningEntry::new(name, WarningCategory::UserOverride, USER_OVERRIDE_MESSAGE));
        }

        for dirty in &detail.dirty {
            entries.push(WarningEntry::new(name, WarningCategory::Dirty, dirty_summary(dirty)));
        }

        for requirement in &detail.requirements {
            let required = requirement.name.trim();
            if required.is_empty() || known.contains(&required.to_lowercase()) {
                continue;
            }
            entries.push(WarningEntry::new(
                name,
                WarningCategory::MissingMaster,
                format!("Requires {}, which is not present.", required),
            ));
        }
    }

    for message in general {
        push_message(&mut entries, GENERAL_PLUGIN_NAME, message);
    }

    entries.sort_by_cached_key(|e| (e.plugin_name.to_lowercase(), e.category));
    entries
}

fn push_message(entries: &mut Vec<WarningEntry>, plugin: &str, message: &EngineMessage) {
    if message.text.trim().is_empty() {
        return;
    }
    entries.push(WarningEntry::new(
        plugin,
        WarningCategory::from_level(&message.level),
        message.text.clone(),
    ));
}

/// One-line summary of a dirty record.
pub fn dirty_summary(dirty: &CleaningEntry) -> String {
    let mut summary = format!(
        "Utility {} | CRC {} | ITM {} | UDR {} | NAV {}",
        dirty.utility, dirty.crc, dirty.itm, dirty.deleted_references, dirty.deleted_navmeshes
    );
    if let Some(detail) = dirty.detail.as_deref().filter(|d| !d.is_empty()) {
        summary.push_str(" | ");
        summary.push_str(detail);
    }
    summary
}
