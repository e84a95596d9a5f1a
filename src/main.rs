//! Run `RUST_LOG=debug cargo run --release` to see render target setup.

use island_bloom::{DemoConfig, IslandDemo, WinitConfig, WinitRunner};
use log::{error, info};

fn main() {
    init_logger();
    if let Err(err) = run() {
        error!("{err:#}");
        std::process::exit(-1);
    }
}

fn run() -> anyhow::Result<()> {
    let runner = WinitRunner::new(WinitConfig::default())?;
    let mut demo = IslandDemo::new(runner.window(), DemoConfig::default())?;
    runner.run(&mut demo)?;
    info!("Shut down cleanly");
    Ok(())
}

fn init_logger() {
    let mut builder = pretty_env_logger::formatted_builder();
    match std::env::var("RUST_LOG") {
        Ok(filters) => builder.parse_filters(&filters),
        Err(_) => builder.filter_level(log::LevelFilter::Info),
    };
    builder.init();
}
