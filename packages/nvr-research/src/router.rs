use crate::{
	deadline::Deadline,
	decision::{self, RouterOutcome},
	model::ChatModel,
	prompts,
	state::ResearchState,
	usage::UsageMeter,
};

/// Asks the model for the next step. Never mutates `state`.
pub async fn route(
	chat: &dyn ChatModel,
	state: &ResearchState,
	usage: &UsageMeter,
	deadline: &Deadline,
) -> RouterOutcome {
	let request = prompts::router_request(state);

	match deadline.guard("routing", chat.generate(&request)).await {
		Ok(reply) => {
			usage.record(reply.usage);

			let outcome = decision::parse_routing_reply(&reply.text, state.mode);

			if let RouterOutcome::Unparseable { raw } = &outcome {
				tracing::warn!(reply = %raw, "Router reply is unparseable; finalizing.");
			}

			outcome
		},
		Err(err) => {
			tracing::warn!(error = %err, "Router call failed; finalizing.");

			RouterOutcome::Failed { message: err.to_string() }
		},
	}
}
