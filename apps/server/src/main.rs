//! StudyAid server: study-material uploads with background summary, quiz
//! and key-concept generation.

mod auth;
mod commands;
mod error;
mod router;
mod routes;
mod state;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
