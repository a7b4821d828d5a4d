use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hys::app::AppContext;
use hys::cli::Cli;
use hys::{digest, format};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let ctx = AppContext::new(None)?;

    let groups = cli.resolve_groups(&ctx)?;
    let digest = match cli.day_offset() {
        Some(offset) => digest::read_offset(&ctx, &groups, offset)?,
        None => digest::read(&ctx, &cli.to_request(groups)).await?,
    };

    print!("{}", format::render(&digest, !cli.no_color));
    Ok(())
}
