use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = nvr_api::Args::parse();

	nvr_api::run(args).await
}
