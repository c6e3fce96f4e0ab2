use anyhow::Context;
use clap::Parser;
use vexil_cli::{Cli, execute, load};
use vexil_logger::{LevelFilter, Logger};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load(&cli)?;

    let level: LevelFilter = config.log.level.parse().context("Invalid log level")?;
    let mut logger = Logger::builder().name(env!("CARGO_PKG_NAME")).console(config.log.console).level(level);
    if let Some(filter) = &config.log.env_filter {
        logger = logger.env_filter(filter);
    }
    if let Some(dir) = &config.log.dir {
        logger = logger.path(dir);
        if config.log.json {
            logger = logger.json();
        }
    }
    let _log = logger.init()?;

    let stdout = std::io::stdout();
    execute(cli, config, &mut stdout.lock()).await
}
