// src/engine/commands.rs

//! CLI entry points.

use chrono::{Duration, Utc};

use crate::engine::{Engine, LogSink};
use crate::error::Result;
use crate::models::{Config, ProfileStore, Schedule};
use crate::services::auth;
use crate::services::session::Session;
use crate::storage::{LocalStore, StateStorage};
use crate::utils::time::{week_minutes, week_parity};

/// Run the bot until interrupted.
pub async fn run_bot(config: Config) -> Result<()> {
    config.validate()?;
    let storage = LocalStore::new(&config.paths);
    let engine = Engine::new(config, Box::new(storage), Box::new(LogSink)).await?;
    engine.run().await
}

/// Check every stored profile's login once and report.
pub async fn run_check(config: Config) -> Result<()> {
    config.validate()?;
    let storage = LocalStore::new(&config.paths);

    let profiles = storage.load_profiles().await?.unwrap_or_default();
    if profiles.is_empty() {
        log::warn!("No profiles stored; nothing to check");
        return Ok(());
    }
    let mut profiles = ProfileStore::from_profiles(profiles)?;

    // The replies channel stays unused: checks run on the blocking path.
    let (reply_tx, _replies) = tokio::sync::mpsc::unbounded_channel();
    let mut session = Session::new(&config.http, reply_tx)?;

    let mut failures = 0usize;
    for username in profiles.usernames() {
        let Some(profile) = profiles.get_mut(&username) else {
            continue;
        };
        match auth::check(&mut session, profile, &config.portal).await {
            Ok(()) => log::info!(
                "OK    '{}' -> {}",
                username,
                profile.display_name.as_deref().unwrap_or("?")
            ),
            Err(e) => {
                failures += 1;
                log::error!("FAIL  '{}': {}", username, e);
            }
        }
    }

    storage.save_profiles(profiles.as_slice()).await?;
    log::info!(
        "Checked {} profiles, {} failed",
        profiles.len(),
        failures
    );
    Ok(())
}

/// Validate configuration, schedule and profile data.
pub async fn run_validate(config: Config) -> Result<()> {
    config.validate()?;
    log::info!("Configuration: OK");

    let storage = LocalStore::new(&config.paths);

    let lessons = storage.load_schedule().await?.unwrap_or_default();
    let schedule = Schedule::new(lessons);
    schedule.validate()?;
    log::info!("Schedule: OK ({} lessons)", schedule.lessons().len());

    let profiles = storage.load_profiles().await?.unwrap_or_default();
    let profiles = ProfileStore::from_profiles(profiles)?;
    log::info!("Profiles: OK ({} accounts)", profiles.len());

    Ok(())
}

/// Print the schedule with the currently running lesson marked.
pub async fn run_schedule(config: Config) -> Result<()> {
    config.validate()?;
    let storage = LocalStore::new(&config.paths);
    let lessons = storage.load_schedule().await?.unwrap_or_default();
    let schedule = Schedule::new(lessons);

    let local = Utc::now() + Duration::minutes(config.bot.utc_offset_min as i64);
    let minute = week_minutes(&local);
    let parity = week_parity(&local, config.bot.week_parity_offset);

    log::info!(
        "Week parity {}, minute {} of the week",
        parity,
        minute
    );
    for lesson in schedule.lessons() {
        let marker = if lesson.contains(minute, parity) {
            " <- live"
        } else {
            ""
        };
        log::info!(
            "week {} +{:>5}min  {:>3}min  chat {}  {}{}",
            lesson.week_index,
            lesson.start_minutes,
            lesson.duration_minutes,
            lesson.chat_id,
            lesson.name,
            marker
        );
    }
    if schedule.is_empty() {
        log::warn!("Schedule is empty");
    }
    Ok(())
}
