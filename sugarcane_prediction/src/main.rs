use std::path::PathBuf;
use sugarcane_prediction::{config, start_app};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::get_configuration()?;
    let log_level = &format!("{},ort=warn", config.log_level.as_str());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stderr),
        )
        .init();
    tracing::debug!("Loaded configuration: {:?}", config);

    let images: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    start_app(config, &images)?;

    Ok(())
}
