mod app;
mod config;
mod models;
mod providers;
mod services;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use app::{App, Cli};
use services::StudioError;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match App::init(&cli).await {
        Ok(app) => app.run(cli.command).await,
        Err(e) => Err(e),
    };

    if let Err(err) = result {
        // Studio errors already carry the message meant for the user
        match err.downcast_ref::<StudioError>() {
            Some(studio) => eprintln!("{}", studio),
            None => eprintln!("Error: {:#}", err),
        }
        std::process::exit(1);
    }
}
