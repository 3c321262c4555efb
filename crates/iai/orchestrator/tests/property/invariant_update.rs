//! Property tests: invariants change only on ratified, actionable decisions.
//!
//! Every generation is strained and proposes a fresh metric, so the only
//! thing deciding whether the invariants move is the Authority's answer.

use crate::support::*;
use iai_authority::{OracleError, OracleResult, ScriptedOracle};
use iai_orchestrator::GenerationOutcome;
use iai_types::{Verdict, AuthorityDecision};
use proptest::prelude::*;
use serde_json::Value;

// ---------------------------------------------------------------------------
// Helpers / Strategies
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq)]
enum Answer {
    Accept,
    Reject,
    ModifyWithPayload,
    ModifyWithoutPayload,
    Garbage,
    Unreachable,
}

impl Answer {
    fn outcome(self, generation: usize) -> OracleResult<String> {
        match self {
            Answer::Accept => Ok(accept()),
            Answer::Reject => Ok(reject()),
            Answer::ModifyWithPayload => Ok(modify_to(&format!("modified_{generation}"))),
            Answer::ModifyWithoutPayload => Ok(modify_without_payload()),
            Answer::Garbage => Ok("not json at all".into()),
            Answer::Unreachable => Err(OracleError::Unavailable("connection refused".into())),
        }
    }

    fn changes_invariants(self) -> bool {
        matches!(self, Answer::Accept | Answer::ModifyWithPayload)
    }
}

fn arb_answer() -> impl Strategy<Value = Answer> {
    prop_oneof![
        Just(Answer::Accept),
        Just(Answer::Reject),
        Just(Answer::ModifyWithPayload),
        Just(Answer::ModifyWithoutPayload),
        Just(Answer::Garbage),
        Just(Answer::Unreachable),
    ]
}

struct Observed {
    outcomes: Vec<GenerationOutcome>,
    before_after: Vec<(String, String)>,
    decisions: Vec<AuthorityDecision>,
    accepted: u64,
    modified: u64,
    rejected: u64,
    made: u64,
}

fn run(answers: &[Answer]) -> Observed {
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let payloads = (0..answers.len())
            .map(|g| strained(&format!("proposed_{g}")))
            .collect();
        let oracle = ScriptedOracle::from_outcomes(
            answers.iter().enumerate().map(|(g, a)| a.outcome(g)),
        );
        let (mut h, _) = harness(payloads, oracle).await;

        let mut outcomes = Vec::new();
        let mut before_after = Vec::new();
        for _ in answers {
            let before = h.orchestrator.current_invariants().primary_metric.clone();
            outcomes.push(h.orchestrator.step_generation(&Value::Null).await.unwrap());
            let after = h.orchestrator.current_invariants().primary_metric.clone();
            before_after.push((before, after));
        }
        let m = h.orchestrator.meta_metrics().clone();
        Observed {
            outcomes,
            before_after,
            decisions: h.orchestrator.history().decisions.clone(),
            accepted: m.proposals_accepted,
            modified: m.proposals_modified,
            rejected: m.proposals_rejected,
            made: m.proposals_made,
        }
    })
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Invariants move exactly on ACCEPT and MODIFY-with-payload.
    #[test]
    fn invariants_change_only_when_ratified(answers in prop::collection::vec(arb_answer(), 1..8)) {
        let observed = run(&answers);

        for (g, answer) in answers.iter().enumerate() {
            let (before, after) = &observed.before_after[g];
            if answer.changes_invariants() {
                prop_assert_ne!(before, after);
                let expected = match answer {
                    Answer::Accept => format!("proposed_{g}"),
                    _ => format!("modified_{g}"),
                };
                prop_assert_eq!(after, &expected);
            } else {
                prop_assert_eq!(before, after);
            }
            match &observed.outcomes[g] {
                GenerationOutcome::Reviewed { applied, .. } => {
                    prop_assert_eq!(*applied, answer.changes_invariants());
                }
                GenerationOutcome::NoStrain => prop_assert!(false, "every generation is strained"),
            }
        }
    }

    /// Counters agree with the answers and always add up.
    #[test]
    fn counters_partition_reviews(answers in prop::collection::vec(arb_answer(), 1..8)) {
        let observed = run(&answers);
        let count = |f: fn(&Answer) -> bool| answers.iter().filter(|a| f(a)).count() as u64;

        prop_assert_eq!(observed.made, answers.len() as u64);
        prop_assert_eq!(observed.accepted, count(|a| *a == Answer::Accept));
        prop_assert_eq!(observed.modified, count(|a| *a == Answer::ModifyWithPayload));
        prop_assert_eq!(observed.rejected, count(|a| !a.changes_invariants()));
        prop_assert_eq!(observed.made, observed.accepted + observed.modified + observed.rejected);
    }

    /// Unusable oracle answers always end as REJECT with zero confidence.
    #[test]
    fn failures_are_closed(answers in prop::collection::vec(arb_answer(), 1..8)) {
        let observed = run(&answers);

        for (answer, decision) in answers.iter().zip(&observed.decisions) {
            if matches!(answer, Answer::Garbage | Answer::Unreachable) {
                prop_assert_eq!(decision.verdict, Verdict::Reject);
                prop_assert_eq!(decision.confidence, 0.0);
                prop_assert_eq!(decision.concerns.len(), 1);
            } else if *answer == Answer::ModifyWithoutPayload {
                prop_assert_eq!(decision.verdict, Verdict::Modify);
                prop_assert!(!decision.effective_change());
            }
        }
    }
}
