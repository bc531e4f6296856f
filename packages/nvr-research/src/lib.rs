//! Tool-routing research graph.
//!
//! A run threads one [`ResearchState`] through an explicit state machine:
//! router → (retrieval node → router)* → finalizer → terminated. The router asks a
//! language model which tool to call next; retrieval nodes append evidence batches; the
//! finalizer summarizes the evidence into the answer. The driver caps router invocations and
//! enforces a per-run deadline, so a run always terminates with either an answer or
//! [`FALLBACK_ANSWER`].

pub mod deadline;
pub mod decision;
pub mod driver;
pub mod finalizer;
pub mod model;
pub mod prompts;
pub mod retrieval;
pub mod router;
pub mod state;
pub mod time_serde;
pub mod usage;

mod error;

use std::{future::Future, pin::Pin};

pub use decision::{RouterOutcome, RoutingDecision};
pub use driver::{Limits, ResearchGraph, ResearchReport, ResearchRequest, Termination};
pub use error::{Error, Result};
pub use model::{ChatModel, ChatReply, ChatRequest, OpenAiChat, Purpose};
pub use retrieval::{Retrievers, SearchBackend};
pub use state::{
	ChatTurn, EvidenceBatch, EvidenceLog, EvidenceRecord, Mode, PeriodFilters, Provenance,
	ResearchState, Role, Tool,
};
pub use usage::{Usage, UsageMeter};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub const FALLBACK_ANSWER: &str =
	"No comprehensive results available. Please try again with a different query.";
