use crate::engine::{EngineSession, MetadataPaths, PluginDetails};
use crate::metrics::Metrics;
use crate::models::{PluginInfo, WarningEntry};
use crate::services::correlator::correlate;
use indexmap::IndexMap;

/// Load metadata into `session` and correlate it with the scanned plugins.
///
/// Without a loadable masterlist there is nothing to correlate against and the
/// report is empty. The userlist is optional; stale user rules from an earlier
/// load are cleared first.
pub fn build_report(
    session: &mut EngineSession,
    plugins: &[PluginInfo],
    paths: &MetadataPaths,
    metrics: &Metrics,
) -> Vec<WarningEntry> {
    if !paths.masterlist.is_file() {
        tracing::info!(
            "No masterlist at {}; fetch one from {} to enable warnings",
            paths.masterlist,
            session.game().masterlist_repo_url()
        );
        return Vec::new();
    }

    if !session.load_authoritative_metadata(&paths.masterlist, paths.existing_prelude()) {
        return Vec::new();
    }

    session.clear_user_metadata();
    if paths.userlist.is_file() && !session.load_user_metadata(&paths.userlist) {
        tracing::warn!("Continuing without user rules from {}", paths.userlist);
    }

    let details: IndexMap<String, PluginDetails> = plugins
        .iter()
        .filter_map(|plugin| {
            session
                .plugin_details(&plugin.filename)
                .map(|detail| (plugin.key(), detail))
        })
        .collect();
    let general = session.general_messages();

    let report = correlate(plugins, &details, &general);
    metrics.record_plugins_scanned(plugins.len());
    metrics.record_warnings_reported(report.len());
    tracing::info!(
        "Correlated {} plugin(s): {} with metadata, {} warning(s)",
        plugins.len(),
        details.len(),
        report.len()
    );
    report
}
