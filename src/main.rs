mod config;
mod error;
mod hardware;
mod models;
mod station;
mod tracking;
mod upload;
mod utils;

use log::{error, info, warn};
use std::time::Duration;
use tokio::io::BufReader;
use tokio::time::sleep;

use config::StationConfig;
use hardware::{listen, SensorSuite, SnapshotFileSensors};
use station::Station;
use upload::transport::Transport;

async fn main_loop<S, T>(
    mut station: Station<S, T>,
    update_interval: Duration,
) -> Result<(), Box<dyn std::error::Error>>
where
    S: SensorSuite,
    T: Transport,
{
    info!("Starting weather station upload service");

    loop {
        // A failed cycle is logged and retried on the next natural cycle
        match station.run_cycle().await {
            Ok(response) if response.is_success() => {
                info!("Cycle {} uploaded: {}", station.cycles(), response);
            }
            Ok(response) => {
                warn!("Cycle {} rejected by endpoint: {}", station.cycles(), response);
            }
            Err(e) if e.is_fatal() => {
                error!("Cycle {} hit a configuration error: {}", station.cycles(), e);
                return Err(e.into());
            }
            Err(e) => {
                error!("Cycle {} failed: {}", station.cycles(), e);
            }
        }

        sleep(update_interval).await;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match StationConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let station: Station<SnapshotFileSensors> = match Station::from_config(&config) {
        Ok(station) => station,
        Err(e) => {
            error!("Failed to initialise station: {}", e);
            return Err(e.into());
        }
    };

    // Edge events arrive on stdin, one line per GPIO transition
    let handlers = station.edge_handlers(config.rain_pin, config.wind_pin);
    let debounce = config.debounce;
    tokio::spawn(async move {
        match listen(BufReader::new(tokio::io::stdin()), handlers, debounce).await {
            Ok(count) => warn!(
                "Edge stream closed after {} events; rain and wind will stay at zero",
                count
            ),
            Err(e) => error!("Edge stream failed: {}", e),
        }
    });

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = tx.send(());
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {}", e);
                // Keep the sender alive so the main loop is not torn down
                std::future::pending::<()>().await;
            }
        }
    });

    // Run main loop or wait for shutdown signal
    tokio::select! {
        result = main_loop(station, config.update_interval) => {
            match result {
                Ok(_) => info!("Program completed successfully"),
                Err(e) => {
                    error!("Fatal error: {}", e);
                    return Err(e);
                }
            }
        }
        _ = &mut rx => {
            info!("Program terminated by user. Exiting gracefully.");
        }
    }

    Ok(())
}
