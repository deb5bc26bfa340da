// src/engine/probe.rs

//! Reachability probe.
//!
//! A daemon task that pings the portal on a short cadence, purely to
//! notice connectivity loss and restoration. After the configured number
//! of consecutive failures the link counts as down; on the next success a
//! single Reconnect command is queued so the engine rechecks every
//! profile. The probe never touches engine state itself.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::engine::Command;
use crate::models::ProbeConfig;

/// Spawn the probe task. Aborted by the engine on shutdown.
pub fn spawn(
    config: ProbeConfig,
    url: String,
    commands: mpsc::UnboundedSender<Command>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let client = match reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                log::error!("Reachability probe could not start: {}", e);
                return;
            }
        };

        let mut consecutive_failures: u32 = 0;
        let mut down = false;

        loop {
            tokio::time::sleep(Duration::from_secs(config.interval_secs)).await;

            let reachable = match client.get(&url).send().await {
                Ok(response) => !response.status().is_server_error(),
                Err(_) => false,
            };

            if reachable {
                if down {
                    log::info!("Portal is reachable again");
                    if commands.send(Command::Reconnect).is_err() {
                        // engine is gone
                        return;
                    }
                }
                consecutive_failures = 0;
                down = false;
            } else {
                consecutive_failures += 1;
                if consecutive_failures == config.failure_threshold {
                    log::warn!(
                        "Portal unreachable ({} consecutive probe failures)",
                        consecutive_failures
                    );
                    down = true;
                }
            }
        }
    })
}
