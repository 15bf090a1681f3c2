use anyhow::Result;
use featcrate_algorithms::PipelineConfig;
use featcrate_extract::{extract_session, Cli, DriverConfig, NoopObserver};
use log::info;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Some(cli) = Cli::parse_from_args(std::env::args_os()) else {
        println!("{}", Cli::usage());
        return Ok(());
    };

    let config = DriverConfig::default();
    info!("topic cloud: {}", config.channel);
    info!("calibration: {}", cli.calibration.display());

    let summary = extract_session(
        &cli.session,
        &cli.calibration,
        &config,
        PipelineConfig::default(),
        &mut NoopObserver,
    )?;

    info!("processed {} frames over {:.3}s", summary.frames, summary.duration);
    Ok(())
}
