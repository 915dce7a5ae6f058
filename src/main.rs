use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use gameverse_client::core::SwipeDecision;
use gameverse_client::models::{CreateRoomRequest, PrivateLobby};
use gameverse_client::services::{RealtimeEvent, WsConnector};
use gameverse_client::store::{MatchmakingAction, MockLobbyBackend, QueueStatus, RoomAction};
use gameverse_client::views::{DashboardView, DiscoverScreen, DiscoverView, LobbyView, DASHBOARD_CARDS};
use gameverse_client::{
    AppError, ApiClient, CatalogCache, ErrorCode, LocalStorage, RealtimeClient, Session, Settings, Store,
};

const QUEUE_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Parser)]
#[command(name = "gameverse", version, about = "GameVerse command-line client")]
struct Cli {
    /// Configuration file; defaults to config/default and config/local
    #[arg(long, env = "GAMEVERSE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Request a one-time code by SMS
    SendOtp { phone: String },
    /// Exchange a one-time code for a session
    Verify { phone: String, code: String },
    Logout,
    /// Profile header, wallet and menu
    Dashboard,
    /// Claim today's bonus
    ClaimBonus,
    /// Walk through recommended profiles
    Discover {
        /// Like every card instead of passing
        #[arg(long)]
        like: bool,
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    #[command(subcommand)]
    Lobby(LobbyCommand),
    Rooms,
    CreateRoom {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Join a room, optionally post a message, then print traffic for a while
    Chat {
        room_id: String,
        #[arg(long)]
        message: Option<String>,
        #[arg(long, default_value_t = 30)]
        listen_secs: u64,
    },
    /// Wait in the matchmaking queue until matched or timed out
    Queue {
        game_type: String,
        #[arg(long)]
        skill_level: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum LobbyCommand {
    Create {
        #[arg(long)]
        game_type: Option<String>,
    },
    Join { code: String },
}

fn init_tracing(settings: &Settings) {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| settings.logging.level.clone());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| settings.logging.format.clone());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.init();
    }
}

fn build_store(settings: &Settings) -> Result<Store, AppError> {
    let storage = match &settings.storage.path {
        Some(path) => LocalStorage::open(path)?,
        None => LocalStorage::in_memory(),
    };
    let session = Arc::new(
        Session::new(storage).with_visibility_refresh(settings.session.visibility_refresh_secs),
    );
    let api = Arc::new(ApiClient::new(&settings.api, session)?);
    Ok(Store::new(api, CatalogCache::new(&settings.cache)))
}

#[tokio::main]
async fn main() {
    // Load .env file if present
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    let settings = match loaded {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(2);
        }
    };

    init_tracing(&settings);
    info!("Using API at {}", settings.api.base_url);

    if let Err(e) = run(cli.command, &settings).await {
        let shown = e.report(Some("gameverse"));
        eprintln!("{}", shown);
        std::process::exit(1);
    }
}

async fn run(command: Command, settings: &Settings) -> Result<(), AppError> {
    let store = build_store(settings)?;
    let watcher = store.watch_session();
    let tabs = store.session().watch_other_tabs();
    let refresher = store.schedule_token_refresh(Duration::from_secs(settings.session.refresh_interval_secs));

    if let Some(Err(e)) = store.refresh_if_stale().await {
        warn!("Could not refresh stored session: {}", e);
    }

    let outcome = dispatch(command, &store, settings).await;

    refresher.abort();
    tabs.abort();
    watcher.abort();
    outcome
}

async fn dispatch(command: Command, store: &Store, settings: &Settings) -> Result<(), AppError> {
    match command {
        Command::SendOtp { phone } => {
            store.send_otp(&phone).await?;
            println!("Code sent to {}", phone);
        }
        Command::Verify { phone, code } => {
            let tokens = store.verify_otp(&phone, &code).await?;
            if tokens.is_new_user {
                println!("Welcome! Create your profile to get started.");
            } else {
                println!("Logged in");
            }
        }
        Command::Logout => {
            store.logout().await;
            println!("Logged out");
        }
        Command::Dashboard => dashboard(store).await?,
        Command::ClaimBonus => {
            let claimed = store.claim_daily_bonus().await?;
            println!(
                "+{} GameCoins, balance {}",
                claimed.response.bonus_amount, claimed.response.new_balance
            );
        }
        Command::Discover { like, count } => discover(store, like, count).await?,
        Command::Lobby(LobbyCommand::Create { game_type }) => {
            let lobby = store.create_private_lobby(game_type.as_deref()).await?;
            print_lobby(&lobby);
        }
        Command::Lobby(LobbyCommand::Join { code }) => {
            let lobby = store.join_lobby_by_code(&code).await?;
            print_lobby(&lobby);
        }
        Command::Rooms => {
            for room in store.fetch_rooms().await? {
                println!(
                    "{:>6}  {:<24} {}/{}",
                    room.id, room.name, room.participant_count, room.max_capacity
                );
            }
        }
        Command::CreateRoom { name, description } => {
            let room = store.create_room(&CreateRoomRequest { name, description }).await?;
            println!("Created room {} ({})", room.name, room.id);
        }
        Command::Chat { room_id, message, listen_secs } => {
            chat(store, settings, &room_id, message, Duration::from_secs(listen_secs)).await?
        }
        Command::Queue { game_type, skill_level } => {
            queue(store, settings, &game_type, skill_level.as_deref()).await?
        }
    }
    Ok(())
}

async fn dashboard(store: &Store) -> Result<(), AppError> {
    let (profile, balance) = tokio::join!(store.fetch_profile(), store.fetch_balance());
    if let Err(e) = profile {
        warn!("Profile unavailable: {}", e);
    }
    balance?;

    let view = store.select(DashboardView::from_state).await;
    println!("[{}] {} ({:?})", view.initial, view.display_name, view.experience);
    println!("{}", view.balance_label());
    if view.daily_bonus_available {
        println!("Daily bonus available");
    }
    println!("Win rate {}  Games {}", view.win_rate_label(), view.games_played);
    for card in DASHBOARD_CARDS {
        println!("  {:<20} {}", card.title, card.description);
    }
    Ok(())
}

async fn discover(store: &Store, like: bool, count: usize) -> Result<(), AppError> {
    let decision = if like { SwipeDecision::Like } else { SwipeDecision::Pass };
    let mut view = DiscoverView::new();
    view.load(store).await?;

    for _ in 0..count {
        let state = store.select(|s| s.compatibility.clone()).await;
        match view.screen(&state) {
            DiscoverScreen::Card(card) => {
                println!(
                    "{} {}  {}% match, {}% wins  [{}]",
                    card.position,
                    card.display_name,
                    card.score,
                    card.win_rate,
                    card.interest_tags.join(", ")
                );
                view.decide(store, decision).await?;
            }
            DiscoverScreen::NoMore => {
                println!("No more profiles");
                break;
            }
            DiscoverScreen::Error(message) => {
                error!("Discovery failed: {}", message);
                break;
            }
            DiscoverScreen::Loading => break,
        }
    }
    Ok(())
}

fn print_lobby(lobby: &PrivateLobby) {
    let view = LobbyView::new(lobby, MockLobbyBackend::CURRENT_USER_ID);
    println!("Lobby {}  code {}", lobby.id, lobby.invite_code);
    println!("  {}  players {}", view.game_label(), view.capacity_label());
    println!("  expires in {}", view.expiry_label(Utc::now()));
    for player in &lobby.participants {
        let marker = if player.is_creator { " (host)" } else { "" };
        println!("  - {}{}", player.display_name, marker);
    }
}

/// Start the STOMP client, wait for its first connection, then feed the store.
async fn connect_realtime(store: &Store, settings: &Settings) -> Result<(RealtimeClient, JoinHandle<()>), AppError> {
    let (mut client, mut events) = RealtimeClient::start(
        Arc::new(WsConnector),
        Arc::clone(store.session()),
        settings.realtime.clone(),
    );

    let connected = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(event) = events.recv().await {
            match event {
                RealtimeEvent::Connected => return true,
                RealtimeEvent::GaveUp => return false,
                other => tracing::debug!("Before connect: {:?}", other),
            }
        }
        false
    })
    .await
    .unwrap_or(false);
    if !connected {
        client.disconnect().await;
        return Err(AppError::network("Could not reach the realtime server"));
    }
    Ok((client, store.follow_realtime(events)))
}

/// Live queue pushes for the signed-in user; polling covers their absence.
async fn watch_queue(store: &Store, settings: &Settings) -> Option<(RealtimeClient, JoinHandle<()>)> {
    let user_id = match store.fetch_profile().await {
        Ok(profile) => profile.user_id,
        Err(e) => {
            warn!("Live queue updates unavailable: {}", e);
            return None;
        }
    };
    let (mut client, follower) = match connect_realtime(store, settings).await {
        Ok(connected) => connected,
        Err(e) => {
            warn!("Live queue updates unavailable: {}", e);
            return None;
        }
    };
    if let Err(e) = client.watch_matchmaking(&user_id).await {
        warn!("Live queue updates unavailable: {}", e);
        client.disconnect().await;
        follower.abort();
        return None;
    }
    Some((client, follower))
}

async fn chat(
    store: &Store,
    settings: &Settings,
    room_id: &str,
    message: Option<String>,
    listen: Duration,
) -> Result<(), AppError> {
    store.join_room(room_id).await?;
    for message in store.fetch_messages(room_id).await? {
        println!("{}: {}", message.sender_display_name, message.content);
    }

    let (mut client, follower) = connect_realtime(store, settings).await?;
    store.dispatch(RoomAction::SetConnected(true)).await;

    client.join_room(room_id).await?;
    if let Some(content) = message {
        client.send_message(&content).await?;
    }

    let deadline = tokio::time::Instant::now() + listen;
    let mut heartbeat = tokio::time::interval(Duration::from_millis(settings.realtime.heartbeat_outgoing_ms));
    let mut printed = store.select(|s| s.room.messages.len()).await;
    while tokio::time::Instant::now() < deadline {
        tokio::select! {
            _ = heartbeat.tick() => {
                if let Err(e) = client.send_heartbeat().await {
                    warn!("Heartbeat failed: {}", e);
                }
            }
            _ = tokio::time::sleep_until(deadline) => break,
        }
        let messages = store.select(|s| s.room.messages.clone()).await;
        for message in messages.iter().skip(printed) {
            println!("{}: {}", message.sender_display_name, message.content);
        }
        printed = messages.len();
    }

    client.leave_room().await?;
    client.disconnect().await;
    follower.abort();
    store.leave_room(room_id).await?;
    Ok(())
}

async fn queue(store: &Store, settings: &Settings, game_type: &str, skill_level: Option<&str>) -> Result<(), AppError> {
    let joined = store.join_queue(game_type, skill_level).await?;
    println!(
        "In queue for {}, about {}s",
        game_type,
        joined.estimated_wait_time.unwrap_or_default()
    );

    let live = watch_queue(store, settings).await;
    let outcome = wait_for_match(store).await;
    if let Some((mut client, follower)) = live {
        if let Err(e) = client.unwatch_matchmaking().await {
            warn!("Failed to stop queue updates: {}", e);
        }
        client.disconnect().await;
        follower.abort();
    }
    outcome
}

async fn wait_for_match(store: &Store) -> Result<(), AppError> {
    loop {
        tokio::time::sleep(QUEUE_POLL_INTERVAL).await;
        store.dispatch(MatchmakingAction::UpdateQueueTime(Utc::now())).await;
        if let Err(e) = store.get_queue_status().await {
            warn!("Queue status unavailable: {}", e);
        }

        let state = store.select(|s| s.matchmaking.clone()).await;
        match state.status {
            QueueStatus::Found => {
                if let Some(details) = &state.match_details {
                    let names: Vec<&str> = details.opponents.iter().map(|o| o.display_name.as_str()).collect();
                    println!("Match found against {}", names.join(", "));
                }
                return Ok(());
            }
            QueueStatus::Error => {
                if let Err(e) = store.leave_queue().await {
                    warn!("Failed to leave queue: {}", e);
                }
                if !state.alternative_games.is_empty() {
                    println!("Try instead: {}", state.alternative_games.join(", "));
                }
                return Err(AppError::new(
                    ErrorCode::ConnectionTimeout,
                    state.error.unwrap_or_default(),
                ));
            }
            _ => {
                if let Some(position) = state.queue_position {
                    info!("Queue position {}", position);
                }
            }
        }
    }
}
