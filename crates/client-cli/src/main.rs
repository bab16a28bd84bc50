use anyhow::Result;
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shared::{Decision, ProfileUpdate, Ride, RideRequest, Role};

mod api;
mod auth;
mod config;
mod directory;
mod error;
mod faq;
mod profile;
mod requests;
mod rides;
mod router;
mod screen;
mod session;
mod store;

use api::HttpBackend;
use error::ClientError;
use requests::RequestLifecycle;
use rides::{CaptainDesk, RideForm, VehicleForm};
use router::{NotificationRouter, RouteOutcome};
use screen::{FocusLoader, Navigator, Screen};
use session::{Session, SessionStore};
use store::{keys, KvStore};

// Default backend URL
const DEFAULT_SERVER: &str = "http://localhost:8080";

#[derive(Parser)]
#[command(name = "chalo")]
#[command(about = "Share rides with people from nearby campuses")]
#[command(version)]
struct Cli {
    /// Server URL (overrides config)
    #[arg(long)]
    server: Option<String>,

    /// Local storage file (overrides the platform data directory)
    #[arg(long)]
    storage: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Start registration with a phone number and campus email
    Register {
        /// 10-digit phone number without the +92 prefix
        phone: String,
        email: String,
    },
    /// Verify the 6-digit code sent during registration
    Verify { code: String },
    /// Finish registration
    Details {
        full_name: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm: String,
    },
    /// Login with a phone number or email
    Login {
        identifier: String,
        #[arg(long)]
        password: String,
    },
    /// Logout and clear all local data
    Logout,
    /// Show current login status
    Whoami,
    /// Show or change the current mode (captain/passenger)
    Role {
        #[command(subcommand)]
        action: RoleAction,
    },
    /// Browse, request and manage rides
    Rides {
        #[command(subcommand)]
        action: RidesAction,
    },
    /// Manage your vehicles
    Vehicles {
        #[command(subcommand)]
        action: VehiclesAction,
    },
    /// Ride requests you sent or received
    Requests {
        #[command(subcommand)]
        action: RequestsAction,
    },
    /// View and edit your profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Show or follow notifications
    Notifications {
        #[command(subcommand)]
        action: NotificationsAction,
    },
    /// Store the device push token forwarded on login
    PushToken { token: String },
    /// Frequently asked questions
    Faq {
        /// Only show entries mentioning this term
        term: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Set a configuration value
    Set {
        /// Configuration key (server, timeout_secs, grace_minutes, email_domains)
        key: String,
        /// Configuration value
        value: String,
    },
    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },
    /// Show all configuration
    Show,
    /// Get the config file path
    Path,
}

#[derive(Subcommand)]
enum RoleAction {
    Show,
    Set { role: Role },
    /// Toggle between captain and passenger
    Switch,
}

#[derive(Subcommand)]
enum RidesAction {
    /// Open rides departing soon
    List,
    /// Ask to join a ride
    Request {
        ride_id: i64,
        #[arg(short, long)]
        message: String,
    },
    /// Rides you posted
    Mine,
    /// Ride details
    Show { ride_id: i64 },
    /// Post a new ride
    Add(RideArgs),
    /// Edit one of your rides; omitted fields keep their value
    Edit {
        ride_id: i64,
        #[command(flatten)]
        args: RideArgs,
    },
    /// Delete one of your rides
    Delete { ride_id: i64 },
    /// Earlier rides offered with a vehicle
    Previous { vehicle_id: i64 },
    /// Re-post an earlier ride
    Post { ride_id: i64, vehicle_id: i64 },
}

#[derive(Args)]
struct RideArgs {
    #[arg(long)]
    vehicle: Option<i64>,
    #[arg(long)]
    from: Option<String>,
    #[arg(long)]
    to: Option<String>,
    #[arg(long)]
    seats: Option<i64>,
    /// Departure time, e.g. "08:30 AM"
    #[arg(long)]
    time: Option<String>,
    /// YYYY-MM-DD, defaults to today
    #[arg(long)]
    date: Option<NaiveDate>,
    #[arg(long)]
    price: Option<f64>,
    #[arg(long)]
    ac: Option<bool>,
    #[arg(long)]
    quiet: Option<bool>,
}

#[derive(Subcommand)]
enum VehiclesAction {
    List,
    Add {
        /// Car or Bike
        #[arg(long = "type")]
        vehicle_type: String,
        #[arg(long)]
        model: String,
        #[arg(long)]
        plate: String,
        #[arg(long)]
        whatsapp: String,
    },
}

#[derive(Subcommand)]
enum RequestsAction {
    List,
    Accept { request_id: i64 },
    Reject { request_id: i64 },
    Cancel { request_id: i64 },
}

#[derive(Subcommand)]
enum ProfileAction {
    Show,
    Update {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    /// Upload a profile picture
    Upload { path: PathBuf },
}

#[derive(Subcommand)]
enum NotificationsAction {
    /// Notifications received since the last check
    List {
        /// Include notifications already seen
        #[arg(long)]
        all: bool,
    },
    /// Follow notifications and open the screen each one points to
    Watch {
        /// Poll interval in seconds
        #[arg(long, default_value_t = 5)]
        interval: u64,
    },
}

struct App {
    config: config::Config,
    server: String,
    sessions: SessionStore,
}

impl App {
    fn backend(&self, token: Option<String>) -> Result<HttpBackend> {
        let timeout = Duration::from_secs(self.config.remote.timeout_secs);
        Ok(HttpBackend::new(&self.server, timeout)?.with_token(token))
    }

    fn signed_in(&self) -> Result<(HttpBackend, Session)> {
        let session = self.sessions.require()?;
        let backend = self.backend(Some(session.token.clone()))?;
        Ok((backend, session))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chalo=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        if e.downcast_ref::<ClientError>()
            .is_some_and(ClientError::requires_login)
        {
            eprintln!("\x1b[33m🔐 {}\x1b[0m", e);
            eprintln!("   Run '\x1b[1mchalo login\x1b[0m' to authenticate.");
        } else {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::Config::load().unwrap_or_else(|e| {
        tracing::warn!("Using default configuration: {}", e);
        config::Config::default()
    });
    let server = cli
        .server
        .or(config.remote.server.clone())
        .unwrap_or_else(|| DEFAULT_SERVER.to_string());
    let storage = match cli.storage {
        Some(path) => path,
        None => config::Config::storage_path()?,
    };
    let app = App {
        config,
        server,
        sessions: SessionStore::new(KvStore::open(storage)),
    };

    let Some(command) = cli.command else {
        let screen = app.sessions.initial_screen();
        println!("Start screen: {}", screen);
        println!("Run 'chalo --help' to see what you can do from here.");
        return Ok(());
    };

    match command {
        Commands::Config { action } => handle_config_command(action)?,
        Commands::Register { phone, email } => {
            let backend = app.backend(None)?;
            let user_id = auth::AccountClient::new(&backend, &app.sessions)
                .register_contact(&phone, &email, &app.config.registration.allowed_email_domains)
                .await?;
            println!("A code has been sent to your email (user {}).", user_id);
            println!("Next: chalo verify <code>");
        }
        Commands::Verify { code } => {
            let backend = app.backend(None)?;
            auth::AccountClient::new(&backend, &app.sessions)
                .verify_code(&code)
                .await?;
            println!("Verification successful.");
            println!("Next: chalo details <full name> --password <password> --confirm <password>");
        }
        Commands::Details {
            full_name,
            password,
            confirm,
        } => {
            let backend = app.backend(None)?;
            auth::AccountClient::new(&backend, &app.sessions)
                .complete_details(&full_name, &password, &confirm)
                .await?;
            println!("Registration completed successfully.");
            println!("Next: chalo role set captain|passenger");
        }
        Commands::Login {
            identifier,
            password,
        } => {
            let backend = app.backend(None)?;
            let next = auth::AccountClient::new(&backend, &app.sessions)
                .login(&identifier, &password)
                .await?;
            println!("\x1b[32m✓ Logged in\x1b[0m");
            if next == Screen::Selection {
                println!("Pick a mode: chalo role set captain|passenger");
            }
        }
        Commands::Logout => {
            let backend = app.backend(None)?;
            auth::AccountClient::new(&backend, &app.sessions).logout()?;
            println!("Logged out successfully");
        }
        Commands::Whoami => match app.sessions.load()? {
            Some(session) => {
                println!("✓ Logged in as user {}", session.user_id);
                println!(
                    "  Mode: {}",
                    session.role.map(|r| r.as_str()).unwrap_or("not selected")
                );
                println!("  Server: {}", app.server);
            }
            None => println!("Not logged in"),
        },
        Commands::Role { action } => handle_role_command(&app, action)?,
        Commands::Rides { action } => handle_rides_command(&app, action).await?,
        Commands::Vehicles { action } => handle_vehicles_command(&app, action).await?,
        Commands::Requests { action } => handle_requests_command(&app, action).await?,
        Commands::Profile { action } => handle_profile_command(&app, action).await?,
        Commands::Notifications { action } => handle_notifications_command(&app, action).await?,
        Commands::PushToken { token } => {
            app.sessions.kv().set(keys::PUSH_TOKEN, token.trim())?;
            println!("Push token saved; it is sent with your next login.");
        }
        Commands::Faq { term } => {
            let entries = faq::search(term.as_deref().unwrap_or(""));
            if entries.is_empty() {
                println!("No matching questions.");
            }
            for entry in entries {
                println!("\x1b[1m{}\x1b[0m", entry.question);
                println!("  {}\n", entry.answer);
            }
        }
    }
    Ok(())
}

fn handle_config_command(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Set { key, value } => {
            let mut config = config::Config::load().unwrap_or_default();
            match key.as_str() {
                "server" => config.remote.server = Some(value),
                "timeout_secs" => config.remote.timeout_secs = value.parse()?,
                "grace_minutes" => config.directory.grace_minutes = config::parse_grace_minutes(&value)?,
                "email_domains" => {
                    config.registration.allowed_email_domains = value
                        .split(',')
                        .map(|d| d.trim().to_string())
                        .filter(|d| !d.is_empty())
                        .collect()
                }
                _ => anyhow::bail!(
                    "Unknown config key: {}. Valid keys: server, timeout_secs, grace_minutes, email_domains",
                    key
                ),
            }
            config.save()?;
            println!("Configuration saved");
        }
        ConfigAction::Get { key } => {
            let config = config::Config::load()?;
            let value = match key.as_str() {
                "server" => config.remote.server.unwrap_or_default(),
                "timeout_secs" => config.remote.timeout_secs.to_string(),
                "grace_minutes" => config.directory.grace_minutes.to_string(),
                "email_domains" => config.registration.allowed_email_domains.join(","),
                _ => anyhow::bail!("Unknown config key: {}", key),
            };
            println!("{}", value);
        }
        ConfigAction::Show => {
            let config = config::Config::load()?;
            println!("server: {}", config.remote.server.unwrap_or_default());
            println!("timeout_secs: {}", config.remote.timeout_secs);
            println!("grace_minutes: {}", config.directory.grace_minutes);
            println!(
                "email_domains: {}",
                config.registration.allowed_email_domains.join(",")
            );
        }
        ConfigAction::Path => {
            let path = config::Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

fn handle_role_command(app: &App, action: RoleAction) -> Result<()> {
    let session = app.sessions.require()?;
    let role = match action {
        RoleAction::Show => {
            match session.role {
                Some(role) => println!("{}", role),
                None => println!("No mode selected"),
            }
            return Ok(());
        }
        RoleAction::Set { role } => role,
        RoleAction::Switch => session.role.map(Role::toggled).unwrap_or(Role::Captain),
    };
    app.sessions.set_role(role)?;
    println!("Switched to {} mode", role);
    Ok(())
}

async fn handle_rides_command(app: &App, action: RidesAction) -> Result<()> {
    let (backend, session) = app.signed_in()?;
    let desk = CaptainDesk::new(&backend, &session);

    match action {
        RidesAction::List => {
            let rides =
                directory::list_open_rides(&backend, Local::now().naive_local(), app.config.grace())
                    .await?;
            print_rides(&rides, backend.base_url());
        }
        RidesAction::Request { ride_id, message } => {
            let ride = desk.ride(ride_id).await?;
            let outcome = RequestLifecycle::new(&backend, &session)
                .send(&ride, &message)
                .await?;
            println!(
                "Your request has been sent! You can view its status with 'chalo requests list'. (request {})",
                outcome.request_id
            );
            warn_unnotified(outcome.notified);
        }
        RidesAction::Mine => print_rides(&desk.my_rides().await?, backend.base_url()),
        RidesAction::Show { ride_id } => print_rides(&[desk.ride(ride_id).await?], backend.base_url()),
        RidesAction::Add(args) => {
            let form = ride_form(&args, None)?;
            match desk.add_ride(&form).await? {
                Some(ride) => println!("Ride added successfully. (ride {})", ride.ride_id),
                None => println!("Ride added successfully."),
            }
        }
        RidesAction::Edit { ride_id, args } => {
            let current = desk.ride(ride_id).await?;
            let form = ride_form(&args, Some(&current))?;
            desk.update_ride(ride_id, &form).await?;
            println!("Ride updated successfully!");
        }
        RidesAction::Delete { ride_id } => {
            desk.delete_ride(ride_id).await?;
            println!("Ride deleted successfully.");
        }
        RidesAction::Previous { vehicle_id } => {
            print_rides(&desk.previous_rides(vehicle_id).await?, backend.base_url())
        }
        RidesAction::Post {
            ride_id,
            vehicle_id,
        } => {
            desk.post_ride(ride_id, vehicle_id).await?;
            println!("Ride successfully posted!");
        }
    }
    Ok(())
}

/// Build a ride form from flags, falling back to `base` for edits
fn ride_form(args: &RideArgs, base: Option<&Ride>) -> Result<RideForm, ClientError> {
    let incomplete =
        || ClientError::Validation("Please fill out all fields including date and time.".to_string());

    let date = match (args.date, base.and_then(|r| r.ride_date.as_deref())) {
        (Some(date), _) => date,
        (None, Some(stored)) => stored
            .get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .unwrap_or_else(|| Local::now().date_naive()),
        (None, None) => Local::now().date_naive(),
    };

    Ok(RideForm {
        vehicle_id: args
            .vehicle
            .or(base.and_then(|r| r.vehicle_id))
            .ok_or_else(incomplete)?,
        pickup_point: args
            .from
            .clone()
            .or(base.map(|r| r.pickup_point.clone()))
            .ok_or_else(incomplete)?,
        dropoff_point: args
            .to
            .clone()
            .or(base.map(|r| r.dropoff_point.clone()))
            .ok_or_else(incomplete)?,
        passengers: args
            .seats
            .or(base.map(|r| r.passengers))
            .ok_or_else(incomplete)?,
        time: args
            .time
            .clone()
            .or(base.map(|r| r.time_slot.clone()))
            .ok_or_else(incomplete)?,
        date,
        price: args.price.or(base.map(|r| r.price)).ok_or_else(incomplete)?,
        ac_enabled: args.ac.or(base.map(|r| r.ac_enabled)).unwrap_or(false),
        quiet_ride: args.quiet.or(base.map(|r| r.quiet_ride)).unwrap_or(false),
    })
}

async fn handle_vehicles_command(app: &App, action: VehiclesAction) -> Result<()> {
    let (backend, session) = app.signed_in()?;
    let desk = CaptainDesk::new(&backend, &session);

    match action {
        VehiclesAction::List => {
            let vehicles = desk.vehicles().await?;
            if vehicles.is_empty() {
                println!("No vehicles yet. Add one with 'chalo vehicles add'.");
            }
            for v in vehicles {
                println!(
                    "#{:<4} {:<5} {:<20} {:<10} {}",
                    v.vehicle_id, v.vehicle_type, v.vehicle_model, v.vehicle_plate, v.whatsapp_number
                );
            }
        }
        VehiclesAction::Add {
            vehicle_type,
            model,
            plate,
            whatsapp,
        } => {
            let vehicle = desk
                .add_vehicle(&VehicleForm {
                    vehicle_type,
                    model,
                    plate,
                    whatsapp,
                })
                .await?;
            println!("Vehicle added successfully. (vehicle {})", vehicle.vehicle_id);
        }
    }
    Ok(())
}

async fn handle_requests_command(app: &App, action: RequestsAction) -> Result<()> {
    let (backend, session) = app.signed_in()?;
    let lifecycle = RequestLifecycle::new(&backend, &session);

    let outcome = match action {
        RequestsAction::List => {
            print_requests(&lifecycle.list().await?, session.user_id);
            return Ok(());
        }
        RequestsAction::Accept { request_id } => lifecycle.respond(request_id, Decision::Accept).await?,
        RequestsAction::Reject { request_id } => lifecycle.respond(request_id, Decision::Reject).await?,
        RequestsAction::Cancel { request_id } => lifecycle.cancel(request_id).await?,
    };
    println!("Request {} {} successfully", outcome.request_id, outcome.status);
    warn_unnotified(outcome.notified);
    Ok(())
}

async fn handle_profile_command(app: &App, action: ProfileAction) -> Result<()> {
    match action {
        ProfileAction::Show => {
            let session = app.sessions.load()?;
            let backend = app.backend(session.map(|s| s.token))?;
            let loaded = profile::ProfileService::new(&backend, &app.sessions)
                .load()
                .await;
            if loaded.source != profile::ProfileSource::Network {
                eprintln!("\x1b[33m(offline: showing {:?} profile)\x1b[0m", loaded.source);
            }
            let p = loaded.profile;
            println!("\x1b[1m{}\x1b[0m  {:?} · ★ {:.1}", p.name, p.badge, p.rating);
            if !p.bio.is_empty() {
                println!("{}", p.bio);
            }
            println!("Email: {}", p.email);
            println!("Phone: {}", p.phone);
            if let Some(url) = shared::image_url(backend.base_url(), &p.profile_image) {
                println!("Image: {}", url);
            }
            println!(
                "Rides: {}  Saved: Rs {:.0}  Trees: {}",
                p.stats.total_rides, p.stats.money_saved, p.stats.trees_planted
            );
        }
        ProfileAction::Update {
            name,
            bio,
            email,
            phone,
        } => {
            let (backend, _) = app.signed_in()?;
            profile::ProfileService::new(&backend, &app.sessions)
                .update(&ProfileUpdate {
                    name,
                    bio,
                    email,
                    phone,
                })
                .await?;
            println!("Profile updated successfully");
        }
        ProfileAction::Upload { path } => {
            let (backend, _) = app.signed_in()?;
            let image = profile::ProfileService::new(&backend, &app.sessions)
                .upload_image(&path)
                .await?;
            println!("Profile image updated: {}", image);
        }
    }
    Ok(())
}

async fn handle_notifications_command(app: &App, action: NotificationsAction) -> Result<()> {
    let (backend, session) = app.signed_in()?;
    let last_seen = |kv: &KvStore| -> Result<Option<i64>> {
        Ok(kv.get(keys::LAST_NOTIFICATION)?.and_then(|v| v.parse().ok()))
    };

    match action {
        NotificationsAction::List { all } => {
            let after = if all { None } else { last_seen(app.sessions.kv())? };
            let pushes = backend.notifications(session.user_id, after).await?;
            if pushes.is_empty() {
                println!("No new notifications.");
            }
            for push in &pushes {
                println!("[{}] {}", push.kind, push.body);
            }
            if let Some(id) = pushes.iter().filter_map(|p| p.id).max() {
                app.sessions.kv().set(keys::LAST_NOTIFICATION, &id.to_string())?;
            }
        }
        NotificationsAction::Watch { interval } => {
            let start = app.sessions.initial_screen();
            let after = last_seen(app.sessions.kv())?;
            let interval = Duration::from_secs(interval.max(1));
            watch(app, backend, session, start, interval, after).await?;
        }
    }
    Ok(())
}

/// Poll the notification outbox, route each push, and reload whichever
/// screen gains focus.
async fn watch(
    app: &App,
    backend: HttpBackend,
    session: Session,
    start: Screen,
    interval: Duration,
    mut after: Option<i64>,
) -> Result<()> {
    let navigator = Arc::new(Navigator::new());
    let router = NotificationRouter::new(navigator.clone());

    let (b, s) = (backend.clone(), session.clone());
    let (_requests_loader, mut requests_rx) = FocusLoader::spawn(&navigator, Screen::Requests, move || {
        let (b, s) = (b.clone(), s.clone());
        async move { RequestLifecycle::new(&b, &s).list().await }
    });

    let (b, grace) = (backend.clone(), app.config.grace());
    let (_rides_loader, mut rides_rx) = FocusLoader::spawn(&navigator, Screen::ShowRides, move || {
        let b = b.clone();
        async move { directory::list_open_rides(&b, Local::now().naive_local(), grace).await }
    });

    navigator.mount(start);
    println!("Watching notifications (Ctrl-C to stop)...");
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                navigator.unmount();
                break;
            }
            _ = ticker.tick() => {
                let pushes = match backend.notifications(session.user_id, after).await {
                    Ok(pushes) => pushes,
                    Err(e) => {
                        tracing::warn!("Notification poll failed: {}", e);
                        continue;
                    }
                };
                for push in pushes {
                    println!("\n\x1b[1;36m🔔 {}\x1b[0m", push.body);
                    if let RouteOutcome::Navigated(screen) = router.route(&push) {
                        println!("\x1b[90m→ {}\x1b[0m", screen);
                    }
                    if let Some(id) = push.id {
                        after = Some(after.map_or(id, |a| a.max(id)));
                        remember_notification(app.sessions.kv(), id);
                    }
                }
            }
            Some(result) = requests_rx.recv() => match result {
                Ok(requests) => print_requests(&requests, session.user_id),
                Err(e) => eprintln!("Failed to fetch requests: {}", e),
            },
            Some(result) = rides_rx.recv() => match result {
                Ok(rides) => print_rides(&rides, backend.base_url()),
                Err(e) => eprintln!("Failed to fetch rides: {}", e),
            },
        }
    }
    Ok(())
}

/// Persist the newest notification id. A failed write only costs a replay
/// on the next start, so watching carries on.
fn remember_notification(kv: &KvStore, id: i64) -> bool {
    match kv.set(keys::LAST_NOTIFICATION, &id.to_string()) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Failed to remember notification {}: {}", id, e);
            false
        }
    }
}

fn warn_unnotified(notified: bool) {
    if !notified {
        eprintln!("\x1b[33mThe other party could not be notified.\x1b[0m");
    }
}

fn print_rides(rides: &[Ride], base_url: &str) {
    if rides.is_empty() {
        println!("No rides found.");
        return;
    }
    for ride in rides {
        let mut extras = Vec::new();
        if ride.ac_enabled {
            extras.push("AC");
        }
        if ride.quiet_ride {
            extras.push("quiet");
        }
        println!(
            "#{:<4} {:>8}  {} → {}  Rs {:.0}  {} seat(s)  {}",
            ride.ride_id,
            ride.time_slot,
            ride.pickup_point,
            ride.dropoff_point,
            ride.price,
            ride.passengers,
            extras.join(", ")
        );
        println!(
            "       {} · {} {} ({})",
            ride.full_name, ride.vehicle_type, ride.vehicle_model, ride.vehicle_plate
        );
        if let Some(url) = shared::image_url(base_url, &ride.profile_image) {
            println!("\x1b[90m       {}\x1b[0m", url);
        }
    }
}

fn print_requests(requests: &[RideRequest], user_id: i64) {
    if requests.is_empty() {
        println!("No requests.");
        return;
    }
    for r in requests {
        let party = if r.ride_owner_id == user_id {
            format!("from {}", r.requester_name)
        } else {
            "sent by you".to_string()
        };
        println!(
            "#{:<4} [{}] {}  {} → {} at {}",
            r.request_id, r.status, party, r.pickup_point, r.dropoff_point, r.time_slot
        );
        if !r.message.is_empty() {
            println!("       \"{}\"", r.message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_args() -> RideArgs {
        RideArgs {
            vehicle: None,
            from: None,
            to: None,
            seats: None,
            time: None,
            date: None,
            price: None,
            ac: None,
            quiet: None,
        }
    }

    #[test]
    fn test_remember_notification_survives_storage_errors() {
        let dir = tempfile::tempdir().unwrap();
        let kv = KvStore::open(dir.path().join("storage.json"));
        assert!(remember_notification(&kv, 7));
        assert_eq!(kv.get(keys::LAST_NOTIFICATION).unwrap().as_deref(), Some("7"));

        // A directory in place of the storage file cannot be written
        let broken = KvStore::open(dir.path());
        assert!(!remember_notification(&broken, 8));
    }

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();

        let cli = Cli::parse_from(["chalo", "requests", "accept", "12"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Requests {
                action: RequestsAction::Accept { request_id: 12 }
            })
        ));

        let cli = Cli::parse_from(["chalo", "role", "set", "Captain"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Role {
                action: RoleAction::Set { role: Role::Captain }
            })
        ));
    }

    #[test]
    fn test_ride_form_for_add_needs_every_field() {
        let err = ride_form(&empty_args(), None).err().unwrap();
        assert!(matches!(err, ClientError::Validation(_)));
    }

    #[test]
    fn test_ride_form_for_edit_keeps_existing_values() {
        let current: Ride = serde_json::from_str(
            r#"{"ride_id":3,"user_id":1,"vehicle_id":2,"pickup_point":"Gulshan","dropoff_point":"MAJU",
                "passengers":3,"time_slot":"08:00 AM","ride_date":"2024-06-01T00:00:00.000Z",
                "price":"150.00","ac_enabled":1,"quiet_ride":0}"#,
        )
        .unwrap();
        let mut args = empty_args();
        args.price = Some(200.0);

        let form = ride_form(&args, Some(&current)).unwrap();
        assert_eq!(form.vehicle_id, 2);
        assert_eq!(form.pickup_point, "Gulshan");
        assert_eq!(form.date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert!((form.price - 200.0).abs() < f64::EPSILON);
        assert!(form.ac_enabled);
    }
}
