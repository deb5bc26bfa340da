// src/engine/mod.rs

//! The engine owner loop.
//!
//! One task owns every piece of shared state: the HTTP session and its
//! cookie jar, the profile store, the schedule, and the coordinator.
//! Everything else talks to it through queues: spawned fetches deliver
//! [`FetchReply`] messages, the reachability probe delivers [`Command`]
//! messages. No state is touched from any other task, which is what makes
//! the whole engine lock-free.

pub mod commands;
pub mod coordinator;
pub mod probe;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::error::Result;
use crate::models::{ChatAction, Config, ProfileStore, Schedule};
use crate::services::auth;
use crate::services::session::{FetchReply, Session};
use crate::storage::StateStorage;

pub use commands::{run_bot, run_check, run_schedule, run_validate};
pub use coordinator::Coordinator;

/// Control message marshalled onto the owner loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Connectivity came back after an outage; recheck all profiles
    Reconnect,
    /// Stop the engine
    Shutdown,
}

/// Callback surface for collaborators (console reporter, GUI, tests).
pub trait EventSink {
    fn on_connected(&mut self, username: &str, chat_link: &str);
    fn on_connection_error(&mut self, username: &str, chat_link: &str, message: &str);
    fn on_chat_action(&mut self, username: &str, chat_link: &str, action: &ChatAction);
    fn on_session_changed(&mut self, chat_link: Option<&str>);
}

/// Sink that reports events through the log. Used by the CLI.
pub struct LogSink;

impl EventSink for LogSink {
    fn on_connected(&mut self, username: &str, chat_link: &str) {
        log::info!("'{}' connected to {}", username, chat_link);
    }

    fn on_connection_error(&mut self, username: &str, chat_link: &str, message: &str) {
        log::error!("Connection of '{}' to {} failed: {}", username, chat_link, message);
    }

    fn on_chat_action(&mut self, username: &str, _chat_link: &str, action: &ChatAction) {
        if let Some(users) = &action.new_users {
            log::info!("[{}] {} users in the room", username, users.len());
        }
        for message in &action.new_messages {
            log::info!(
                "[{}] {}: {}",
                username,
                message.user.as_deref().unwrap_or("system"),
                message.message
            );
        }
    }

    fn on_session_changed(&mut self, chat_link: Option<&str>) {
        match chat_link {
            Some(link) => log::info!("Active chat session: {}", link),
            None => log::info!("No active chat session"),
        }
    }
}

/// State owned exclusively by the engine loop.
struct EngineCore {
    config: Config,
    session: Session,
    profiles: ProfileStore,
    schedule: Schedule,
    coordinator: Coordinator,
    storage: Box<dyn StateStorage>,
    sink: Box<dyn EventSink + Send>,
}

impl EngineCore {
    /// Load persisted state. Must run before the first tick.
    async fn load_state(&mut self) -> Result<()> {
        if let Some(profiles) = self.storage.load_profiles().await? {
            self.profiles = ProfileStore::from_profiles(profiles)?;
        }
        if let Some(lessons) = self.storage.load_schedule().await? {
            let schedule = Schedule::new(lessons);
            schedule.validate()?;
            self.schedule = schedule;
        }
        if let Some(records) = self.storage.load_scheduled().await? {
            self.coordinator.restore(records);
        }
        Ok(())
    }

    /// Run the check-then-login fallback on every profile, serially: the
    /// shared cookie jar holds one identity at a time. This is the
    /// deliberate blocking path of the engine.
    async fn check_profiles(&mut self) {
        for username in self.profiles.usernames() {
            let Some(profile) = self.profiles.get_mut(&username) else {
                continue;
            };
            match auth::check(&mut self.session, profile, &self.config.portal).await {
                Ok(()) => log::info!(
                    "Profile '{}' is logged in as {}",
                    username,
                    profile.display_name.as_deref().unwrap_or("?")
                ),
                Err(e) => log::error!("Profile '{}' could not log in: {}", username, e),
            }
        }
        if let Err(e) = self.storage.save_profiles(self.profiles.as_slice()).await {
            log::error!("Failed to persist profiles: {}", e);
        }
    }

    async fn tick(&mut self) {
        let result = self
            .coordinator
            .tick(
                Utc::now(),
                &self.config,
                &mut self.session,
                &self.profiles,
                &self.schedule,
                self.storage.as_ref(),
                self.sink.as_mut(),
            )
            .await;
        if let Err(e) = result {
            log::error!("Coordinator tick failed: {}", e);
        }
    }

    async fn on_reply(&mut self, reply: FetchReply) {
        let result = self
            .coordinator
            .handle_reply(
                Utc::now(),
                reply,
                &self.config,
                &mut self.session,
                &self.profiles,
                self.storage.as_ref(),
                self.sink.as_mut(),
            )
            .await;
        if let Err(e) = result {
            log::error!("Handling a chat reply failed: {}", e);
        }
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self
            .coordinator
            .teardown(self.storage.as_ref(), self.sink.as_mut())
            .await
        {
            log::error!("Teardown failed: {}", e);
        }
    }
}

/// The bot engine: owner loop plus its inbound queues.
pub struct Engine {
    core: EngineCore,
    replies: mpsc::UnboundedReceiver<FetchReply>,
    commands: mpsc::UnboundedReceiver<Command>,
    command_tx: mpsc::UnboundedSender<Command>,
}

impl Engine {
    /// Build the engine and load persisted state.
    pub async fn new(
        config: Config,
        storage: Box<dyn StateStorage>,
        sink: Box<dyn EventSink + Send>,
    ) -> Result<Self> {
        let (reply_tx, replies) = mpsc::unbounded_channel();
        let (command_tx, commands) = mpsc::unbounded_channel();
        let session = Session::new(&config.http, reply_tx)?;

        let mut core = EngineCore {
            config,
            session,
            profiles: ProfileStore::default(),
            schedule: Schedule::default(),
            coordinator: Coordinator::new(),
            storage,
            sink,
        };
        core.load_state().await?;

        Ok(Self {
            core,
            replies,
            commands,
            command_tx,
        })
    }

    /// A sender for injecting commands (used by the probe and by tests).
    pub fn command_sender(&self) -> mpsc::UnboundedSender<Command> {
        self.command_tx.clone()
    }

    /// Run until Ctrl-C or a Shutdown command.
    pub async fn run(self) -> Result<()> {
        let Engine {
            mut core,
            mut replies,
            mut commands,
            command_tx,
        } = self;

        log::info!(
            "Engine starting: {} profiles, {} lessons",
            core.profiles.len(),
            core.schedule.lessons().len()
        );
        core.check_profiles().await;

        let probe_handle = probe::spawn(
            core.config.probe.clone(),
            core.config.portal.index_url(),
            command_tx,
        );

        let mut ticker =
            tokio::time::interval(std::time::Duration::from_millis(core.config.bot.tick_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => core.tick().await,
                Some(reply) = replies.recv() => core.on_reply(reply).await,
                Some(command) = commands.recv() => match command {
                    Command::Reconnect => {
                        log::info!("Connectivity restored; rechecking all profiles");
                        core.check_profiles().await;
                    }
                    Command::Shutdown => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    log::info!("Interrupted; shutting down");
                    break;
                }
            }
        }

        probe_handle.abort();
        core.shutdown().await;
        Ok(())
    }
}
