use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use nvr_research::{Mode, PeriodFilters, ResearchGraph, ResearchRequest};

#[derive(Debug, Parser)]
#[command(
	version = nvr_cli::VERSION,
	rename_all = "kebab",
	styles = nvr_cli::styles(),
)]
struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	config: PathBuf,
	#[arg(long, value_enum, default_value_t = ModeArg::Combined)]
	mode: ModeArg,
	/// Restrict filing search to a fiscal period; repeatable.
	#[arg(long = "period", value_name = "YYYY-Qn")]
	periods: Vec<String>,
	/// Print the full run report as JSON.
	#[arg(long)]
	json: bool,
	query: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
	Vector,
	Web,
	Combined,
}
impl From<ModeArg> for Mode {
	fn from(mode: ModeArg) -> Self {
		match mode {
			ModeArg::Vector => Mode::Vector,
			ModeArg::Web => Mode::Web,
			ModeArg::Combined => Mode::Combined,
		}
	}
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();
	let config = nvr_config::load(&args.config)?;

	nvr_cli::init_tracing(&config.service.log_level);

	let filters: PeriodFilters = args.periods.iter().map(|label| (label.clone(), true)).collect();
	let request = ResearchRequest::new(args.query, filters, args.mode.into());

	request.validate(&config.research.periods)?;

	let graph = ResearchGraph::from_config(&config)?;
	let report = graph.run_report(request).await;

	if args.json {
		println!("{}", serde_json::to_string_pretty(&report)?);
	} else {
		println!("{}", report.answer);
	}

	tracing::debug!(run_id = %report.run_id, termination = ?report.termination, "Query answered.");

	Ok(())
}
