//! Property tests: run-level accounting and audit chain health.

use crate::support::*;
use iai_audit::ChainVerifier;
use iai_authority::ScriptedOracle;
use proptest::prelude::*;
use serde_json::Value;

// ---------------------------------------------------------------------------
// Helpers / Strategies
// ---------------------------------------------------------------------------

/// Per generation: `None` is quiet, `Some(true)` is strained and accepted,
/// `Some(false)` is strained and rejected.
fn arb_plan() -> impl Strategy<Value = Vec<Option<bool>>> {
    prop::collection::vec(prop::option::of(any::<bool>()), 1..10)
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn run_totals_and_chain(plan in arb_plan()) {
        let strained_count = plan.iter().filter(|p| p.is_some()).count() as u64;
        let accepted_count = plan.iter().filter(|p| **p == Some(true)).count() as u64;

        let rt = tokio::runtime::Runtime::new().unwrap();
        let (report, lines, reverified) = rt.block_on(async {
            let payloads = plan
                .iter()
                .enumerate()
                .map(|(g, p)| match p {
                    None => quiet(),
                    Some(_) => strained(&format!("metric_{g}")),
                })
                .collect();
            let answers: Vec<String> = plan
                .iter()
                .flatten()
                .map(|ok| if *ok { accept() } else { reject() })
                .collect();
            let (mut h, sink) = harness(payloads, ScriptedOracle::new(answers)).await;
            let report = h.orchestrator.run_evolution(&Value::Null).await.unwrap();
            let reverified = h.orchestrator.audit_log().verify_chain().await.unwrap();
            (report, sink.lines(), reverified)
        });

        let m = &report.meta_metrics;
        prop_assert_eq!(m.generations_completed, plan.len() as u64);
        prop_assert_eq!(m.proposals_made, strained_count);
        prop_assert_eq!(m.proposals_accepted, accepted_count);
        prop_assert_eq!(m.proposals_rejected, strained_count - accepted_count);
        prop_assert!(m.is_consistent());

        // Two entries per review plus one per applied change.
        prop_assert_eq!(report.audit_entries, 2 * strained_count + accepted_count);
        prop_assert_eq!(lines.len() as u64, report.audit_entries);
        prop_assert!(report.chain_valid);
        prop_assert!(reverified.valid);
        prop_assert_eq!(ChainVerifier::verify_lines(&lines), reverified);
    }
}
