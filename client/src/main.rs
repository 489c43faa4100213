use {
    anyhow::Result,
    clap::Parser,
    tdstore::{
        cli::Cli,
        config::{Config, default_config_path},
        run, setup_logger,
    },
};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let config = Config::load(&config_path)?;
    setup_logger(config.log_file.as_deref(), &config.log_filter)?;
    run(cli, config)
}
