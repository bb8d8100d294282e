// Entrypoint for the CLI application.
// Keeps `main` small: load settings, set up logging, hand over to the UI.

use lms_cli::{config::Config, logger, ui};

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logger::init_logging();

    let config = Config::from_env();
    ui::run(config)?;
    Ok(())
}
