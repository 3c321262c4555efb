use serde::Serialize;

use crate::context::ReviewContext;

/// Builds review prompts for text-based decision oracles.
pub struct PromptBuilder;

impl PromptBuilder {
    /// Render the full review prompt for `ctx`.
    pub fn build_review_prompt(ctx: &ReviewContext) -> String {
        let mut prompt = String::new();

        prompt.push_str(
            "You are the Authority for an invariant-anchored learning system. \
             A Challenger proposes changes to the system's invariants; only you may ratify them.\n\n",
        );

        if !ctx.domain_context.trim().is_empty() {
            prompt.push_str(ctx.domain_context.trim());
            prompt.push_str("\n\n");
        }

        prompt.push_str(ctx.strictness.guidance());
        prompt.push_str("\n\n");

        prompt.push_str("## Current State\n");
        prompt.push_str(&format!("- Generation: {}\n", ctx.generation));
        prompt.push_str(&format!(
            "- Current Invariants: {}\n",
            pretty(&ctx.current_invariants)
        ));
        prompt.push_str(&format!("- Current Metrics: {}\n", pretty(&ctx.current_metrics)));
        prompt.push_str(&format!(
            "- Baseline Metrics: {}\n\n",
            pretty(&ctx.baseline_metrics)
        ));

        if ctx.violations.is_empty() {
            prompt.push_str("## Invariant Violations: none\n\n");
        } else {
            prompt.push_str("## Invariant Violations\n");
            for v in &ctx.violations {
                prompt.push_str(&format!(
                    "- [{}] {}: {}\n",
                    v.severity, v.violation_type, v.description
                ));
            }
            prompt.push('\n');
        }

        prompt.push_str("## Challenger Proposal\n");
        prompt.push_str(&pretty(&ctx.proposal));
        prompt.push_str("\n\n");

        prompt.push_str(&format!(
            "## Evolution History (last {} generations)\n",
            ctx.evolution_history.len()
        ));
        if ctx.evolution_history.is_empty() {
            prompt.push_str("No prior history\n\n");
        } else {
            prompt.push_str(&pretty(&ctx.evolution_history));
            prompt.push_str("\n\n");
        }

        prompt.push_str("## Your Task\n");
        prompt.push_str("Decide: ACCEPT, REJECT, or MODIFY this proposal.\n\n");
        prompt.push_str(RESPONSE_FORMAT);

        prompt
    }
}

fn pretty<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

const RESPONSE_FORMAT: &str = "\
Respond with a single JSON object and nothing else:
{
    \"verdict\": \"ACCEPT\" | \"REJECT\" | \"MODIFY\",
    \"rationale\": \"brief explanation of the decision\",
    \"confidence\": 0.0-1.0,
    \"concerns\": [\"list\", \"of\", \"concerns\"],
    \"modified_proposal\": null or {\"proposed_metrics\": [...], \"proposed_parameter_changes\": {...}}
}
";
