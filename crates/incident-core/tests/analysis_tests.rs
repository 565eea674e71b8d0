use incident_core::config::{CorrelationConfig, RiskConfig};
use incident_core::risk::{Metric, SignalKind};
use incident_core::{CausalCorrelator, LogEntry, LogLevel, RiskDetector, RiskLevel, RuleReasoner};
use incident_test_utils::{auth_cascade, entry, resource_pressure, two_incidents, ScriptedReasoner};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn kinds(detector: &RiskDetector, entries: &[LogEntry], service: &str) -> Vec<SignalKind> {
    detector
        .scan(entries)
        .bundles
        .into_iter()
        .find(|b| b.service == service)
        .map(|b| b.signals.into_iter().map(|s| s.kind).collect())
        .unwrap_or_default()
}

#[test]
fn separate_incidents_become_separate_candidates() {
    let input = two_incidents();
    let scan = CausalCorrelator::default().candidates(&input.log_entries);

    let lines: Vec<Vec<u32>> = scan.candidates.iter().map(|c| c.lines()).collect();
    assert_eq!(lines, vec![vec![1, 2], vec![3, 4]]);
    assert_eq!(scan.known_services, vec!["db", "orders", "cache", "web"]);
}

#[test]
fn wider_window_merges_incidents_but_adjacency_still_holds() {
    let input = two_incidents();
    let correlator = CausalCorrelator::new(CorrelationConfig {
        window_secs: 3600,
        ..CorrelationConfig::default()
    });
    let scan = correlator.candidates(&input.log_entries);

    // db and cache never mention each other, so the merged cluster is not connected.
    assert!(scan.candidates.is_empty());
    assert_eq!(scan.discarded, 1);
}

#[tokio::test]
async fn chain_facts_come_from_the_log_not_the_reply() {
    let input = auth_cascade();
    let reasoner = ScriptedReasoner::new(|_| {
        Some(Ok(serde_json::json!({
            "root_cause": "auth-service rejected valid credentials",
            "confidence": "medium",
            "summary": "auth outage cascaded into payments",
            "affected_services": ["everything"],
            "blast_radius": 99,
        })))
    });

    let (chains, soft) = CausalCorrelator::default().correlate(&input.log_entries, &reasoner).await;

    assert!(soft.is_empty());
    assert_eq!(chains[0].blast_radius(), 2);
    assert_eq!(chains[0].affected_services().len(), 2);
    assert_eq!(reasoner.calls(), 1);
}

#[test]
fn resource_pressure_signals_per_service() {
    let input = resource_pressure();
    let detector = RiskDetector::default();

    assert_eq!(
        kinds(&detector, &input.log_entries, "db"),
        vec![SignalKind::Trend(Metric::Utilization), SignalKind::DiskCritical]
    );
    assert_eq!(kinds(&detector, &input.log_entries, "api"), vec![SignalKind::PoolExhaustion]);
}

#[test]
fn thresholds_come_from_configuration() {
    let input = resource_pressure();
    let lenient = RiskDetector::new(RiskConfig {
        disk_threshold_pct: 96.0,
        pool_threshold: 0.96,
        min_trend_points: 4,
        ..RiskConfig::default()
    });
    assert!(lenient.scan(&input.log_entries).bundles.is_empty());
}

#[test]
fn accelerating_errors_fire_frequency_signal() {
    let entries = vec![
        entry(1, "10:00:00", LogLevel::Error, "queue", "consumer lagging"),
        entry(2, "10:00:40", LogLevel::Error, "queue", "consumer lagging"),
        entry(3, "10:01:10", LogLevel::Error, "queue", "consumer lagging"),
        entry(4, "10:01:30", LogLevel::Error, "queue", "consumer lagging"),
        entry(5, "10:01:40", LogLevel::Critical, "queue", "consumer lagging"),
    ];
    let scan = RiskDetector::default().scan(&entries);

    assert_eq!(scan.bundles.len(), 1);
    let signal = &scan.bundles[0].signals[0];
    assert_eq!(signal.kind, SignalKind::FrequencyAcceleration);
    assert!(signal.detail.starts_with("gaps 40s > 30s > 20s > 10s"));
}

#[test]
fn unparseable_timestamps_still_count_for_ordered_detectors() {
    let entries = vec![
        LogEntry::new(1, "garbled", LogLevel::Error, "db", "disk usage 91%"),
        entry(2, "10:00:00", LogLevel::Info, "db", "checkpoint"),
    ];
    let scan = RiskDetector::default().scan(&entries);

    assert_eq!(scan.unparseable, vec![1]);
    assert_eq!(scan.bundles[0].signals[0].kind, SignalKind::DiskCritical);
}

#[tokio::test]
async fn rule_reasoner_rates_resource_pressure_high() {
    let input = resource_pressure();
    let (predictions, soft) = RiskDetector::default().assess(&input.log_entries, &RuleReasoner).await;

    assert!(soft.is_empty());
    let levels: Vec<(&str, RiskLevel)> = predictions.iter().map(|p| (p.service.as_str(), p.risk_level)).collect();
    assert_eq!(levels, vec![("db", RiskLevel::High), ("api", RiskLevel::High)]);
    assert!(predictions[1].evidence[0].contains("[pool_exhaustion]"));
}

fn arb_entries() -> impl Strategy<Value = Vec<LogEntry>> {
    let services = prop::sample::select(vec!["api", "db", "cache", "unknown"]);
    let levels = prop::sample::select(vec![LogLevel::Info, LogLevel::Warn, LogLevel::Error, LogLevel::Critical]);
    prop::collection::vec((0u32..600, levels, services, any::<bool>()), 0..24).prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (offset, level, service, mentions_db))| {
                let message = if mentions_db { "db timeout" } else { "request failed" };
                entry(
                    i as u32 + 1,
                    &format!("10:{:02}:{:02}", offset / 60, offset % 60),
                    level,
                    service,
                    message,
                )
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn candidates_span_services_and_stay_actionable(entries in arb_entries()) {
        let scan = CausalCorrelator::default().candidates(&entries);
        for candidate in &scan.candidates {
            prop_assert!(candidate.events.len() >= 2);
            prop_assert!(candidate.services.len() >= 2);
            prop_assert!(candidate.events.iter().all(|e| e.level.is_actionable()));
            prop_assert!(candidate.services.iter().all(|s| s != "unknown"));
        }
    }

    #[test]
    fn bundles_are_never_empty_or_unknown(entries in arb_entries()) {
        for bundle in RiskDetector::default().scan(&entries).bundles {
            prop_assert!(!bundle.signals.is_empty());
            prop_assert_ne!(bundle.service.as_str(), "unknown");
            prop_assert!(bundle.signals.iter().all(|s| s.lines.len() <= 5));
        }
    }
}
