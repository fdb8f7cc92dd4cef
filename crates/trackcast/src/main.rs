//! `trackcast` - CLI for race-track weather
//!
//! This binary manages saved tracks, refreshes their weather and prints the
//! stored observations.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;

use trackcast::cli::{
    AddTrackArgs, Cli, Command, ConfigCommand, EditTrackArgs, RefreshCommand, TrackCommand,
    UserCommand, WeatherCommand,
};
use trackcast::{
    init_logging, Config, Error, FetchOutcome, NewTrack, NewUser, Storage, Track, User,
    WeatherApiClient, WeatherFetchCoordinator, WeatherObservation, WeatherRecordStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    let Cli {
        config: config_path,
        command,
        ..
    } = cli;

    // `config` subcommands report load errors themselves
    let command = match command {
        Command::Config(config_cmd) => return handle_config(config_path, config_cmd),
        other => other,
    };

    let config = Config::load_from(config_path).context("failed to load configuration")?;
    let storage = Arc::new(Storage::open(config.database_path())?);

    match command {
        Command::Track(track_cmd) => handle_track(&storage, track_cmd),
        Command::User(user_cmd) => handle_user(&storage, user_cmd),
        Command::Refresh(refresh_cmd) => handle_refresh(&config, storage, &refresh_cmd).await,
        Command::Weather(weather_cmd) => handle_weather(&storage, weather_cmd),
        Command::Status(status_cmd) => handle_status(&config, &storage, status_cmd.json),
        Command::Config(_) => Ok(()),
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn handle_track(storage: &Storage, cmd: TrackCommand) -> anyhow::Result<()> {
    match cmd {
        TrackCommand::Add(args) => add_track(storage, args)?,
        TrackCommand::List {
            user,
            favorites,
            search,
        } => {
            let tracks = match (search, favorites) {
                (Some(query), _) => storage.search_tracks(user, &query)?,
                (None, true) => storage.favorite_tracks(user)?,
                (None, false) => storage.tracks_for_user(user)?,
            };
            if tracks.is_empty() {
                println!("No tracks found.");
            }
            let latest: HashMap<_, _> = storage
                .latest_for_all()?
                .into_iter()
                .map(|observation| (observation.location_id, observation))
                .collect();
            for track in &tracks {
                print_track(track, latest.get(&track.id));
            }
        }
        TrackCommand::Edit(args) => edit_track(storage, &args)?,
        TrackCommand::Remove { id } => {
            if storage.delete_track(id)? {
                println!("Removed track {id} and its weather history.");
            } else {
                return Err(Error::track_not_found(id).into());
            }
        }
        TrackCommand::Favorite { id, off } => {
            if !storage.set_favorite(id, !off)? {
                return Err(Error::track_not_found(id).into());
            }
            let state = if off { "no longer a favorite" } else { "a favorite" };
            println!("Track {id} is {state}.");
        }
    }
    Ok(())
}

fn add_track(storage: &Storage, args: AddTrackArgs) -> anyhow::Result<()> {
    if let Err(message) = args.validate() {
        bail!("invalid track: {message}");
    }

    let track = storage.add_track(&NewTrack {
        user_id: args.user,
        name: args.name,
        location: args.location,
        latitude: args.lat,
        longitude: args.lon,
        country: args.country,
        is_favorite: args.favorite,
        date_added_millis: now_millis(),
    })?;
    println!("Added track {}:", track.id);
    print_track(&track, None);
    Ok(())
}

fn edit_track(storage: &Storage, args: &EditTrackArgs) -> anyhow::Result<()> {
    if args.is_empty() {
        bail!("nothing to change; pass --name, --location, --lat, --lon or --country");
    }
    let mut track = storage
        .get_track(args.id)?
        .ok_or_else(|| Error::track_not_found(args.id))?;
    if let Err(message) = args.apply(&mut track) {
        bail!("invalid track: {message}");
    }
    if !storage.update_track(&track)? {
        return Err(Error::track_not_found(args.id).into());
    }
    println!("Updated track {}:", track.id);
    print_track(&track, storage.latest(track.id)?.as_ref());
    Ok(())
}

fn print_track(track: &Track, latest: Option<&WeatherObservation>) {
    let star = if track.is_favorite { "*" } else { " " };
    let weather = latest.map_or_else(
        || "no weather".to_string(),
        |o| {
            format!(
                "air {:.1}°C  surface {:.1}°C",
                o.air_temperature_c, o.surface_temperature_c
            )
        },
    );
    println!(
        "{star} {:>4}  {:<28} {}, {}  ({:.4}, {:.4})  {weather}",
        track.id, track.name, track.location, track.country, track.latitude, track.longitude
    );
}

fn handle_user(storage: &Storage, cmd: UserCommand) -> anyhow::Result<()> {
    match cmd {
        UserCommand::Add {
            username,
            temperature_unit,
            wind_speed_unit,
        } => {
            let user = storage.add_user(&NewUser {
                username,
                temperature_unit,
                wind_speed_unit,
                date_joined_millis: now_millis(),
            })?;
            println!("Added user {}:", user.id);
            print_user(&user);
        }
        UserCommand::List => {
            for user in storage.users()? {
                print_user(&user);
            }
        }
        UserCommand::Show { id } => {
            let user = storage.get_user(id)?.ok_or_else(|| Error::user_not_found(id))?;
            print_user(&user);
        }
        UserCommand::Set {
            id,
            username,
            temperature_unit,
            wind_speed_unit,
        } => {
            let mut user = storage.get_user(id)?.ok_or_else(|| Error::user_not_found(id))?;
            if let Some(username) = username {
                user.username = username;
            }
            if let Some(unit) = temperature_unit {
                user.temperature_unit = unit;
            }
            if let Some(unit) = wind_speed_unit {
                user.wind_speed_unit = unit;
            }
            if !storage.update_user(&user)? {
                return Err(Error::user_not_found(id).into());
            }
            print_user(&user);
        }
    }
    Ok(())
}

fn print_user(user: &User) {
    println!(
        "{:>4}  {:<20} {} / {}",
        user.id, user.username, user.temperature_unit, user.wind_speed_unit
    );
}

async fn handle_refresh(
    config: &Config,
    storage: Arc<Storage>,
    cmd: &RefreshCommand,
) -> anyhow::Result<()> {
    let tracks = match cmd.track {
        Some(id) => vec![storage
            .get_track(id)?
            .ok_or_else(|| Error::track_not_found(id))?],
        None => storage.tracks_for_user(cmd.user)?,
    };
    if tracks.is_empty() {
        println!("No tracks to refresh.");
        return Ok(());
    }

    let provider = WeatherApiClient::new(&config.weather.base_url, config.request_timeout())?;
    let coordinator = WeatherFetchCoordinator::new(
        storage as Arc<dyn WeatherRecordStore>,
        Arc::new(provider),
        config.api_key(),
    );

    let mut policy = config.fetch_policy();
    if let Some(hours) = cmd.max_age_hours {
        policy.max_age_hours = hours;
    }

    let locations: Vec<_> = tracks.iter().map(Track::weather_location).collect();
    let now = now_millis();
    let outcomes = if cmd.force {
        let mut outcomes = Vec::with_capacity(locations.len());
        for location in &locations {
            outcomes.push(coordinator.fetch_now(*location, now, policy).await);
        }
        outcomes
    } else {
        coordinator
            .refresh_all_stale(&locations, now, policy, config.weather.max_concurrent_fetches)
            .await
    };

    for (track, outcome) in tracks.iter().zip(&outcomes) {
        match outcome {
            FetchOutcome::Fresh { observation, .. } => {
                println!("{:<28} fresh    {}", track.name, summarize(observation));
            }
            FetchOutcome::Done { observation, .. } => {
                println!("{:<28} updated  {}", track.name, summarize(observation));
            }
            FetchOutcome::Failed { error, .. } => {
                println!("{:<28} failed   [{}] {error}", track.name, error.kind());
            }
        }
    }

    if outcomes.iter().all(|o| !o.is_success()) {
        bail!("weather refresh failed for every track");
    }
    Ok(())
}

fn summarize(observation: &WeatherObservation) -> String {
    format!(
        "air {:.1}°C  surface {:.1}°C  {}{}",
        observation.air_temperature_c,
        observation.surface_temperature_c,
        observation.condition_text,
        if observation.is_drying { "  (drying)" } else { "" }
    )
}

fn format_time(observation: &WeatherObservation) -> String {
    observation.observed_at().map_or_else(
        || observation.observed_at_millis.to_string(),
        |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

fn print_observation(observation: &WeatherObservation) {
    println!("Observed:     {}", format_time(observation));
    println!("Air:          {:.1}°C", observation.air_temperature_c);
    println!(
        "Surface:      {:.1}°C (+{:.1})",
        observation.surface_temperature_c,
        observation.surface_delta_c()
    );
    println!("Humidity:     {}%", observation.humidity_pct);
    println!(
        "Wind:         {:.1} kph {}",
        observation.wind_speed_kph, observation.wind_direction
    );
    println!("Conditions:   {}", observation.condition_text);
    println!(
        "Track:        {}",
        if observation.is_drying { "drying" } else { "not drying" }
    );
}

fn handle_weather(storage: &Storage, cmd: WeatherCommand) -> anyhow::Result<()> {
    match cmd {
        WeatherCommand::Latest { track, json } => {
            let Some(observation) = storage.latest(track)? else {
                bail!("no weather stored for track {track}");
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&observation)?);
            } else {
                print_observation(&observation);
            }
        }
        WeatherCommand::History { track, limit, json } => {
            let history = storage.history(track, limit)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&history)?);
            } else if history.is_empty() {
                println!("No weather stored for track {track}.");
            } else {
                for observation in &history {
                    println!("{}  {}", format_time(observation), summarize(observation));
                }
            }
        }
    }
    Ok(())
}

fn handle_status(config: &Config, storage: &Storage, json: bool) -> anyhow::Result<()> {
    let stats = storage.stats()?;
    let oldest = stats
        .oldest_observation_millis
        .and_then(chrono::DateTime::from_timestamp_millis);
    let newest = stats
        .newest_observation_millis
        .and_then(chrono::DateTime::from_timestamp_millis);

    if json {
        let status = serde_json::json!({
            "database_path": storage.path(),
            "track_count": stats.track_count,
            "observation_count": stats.observation_count,
            "oldest_observation": oldest,
            "newest_observation": newest,
            "db_size_bytes": stats.db_size_bytes,
            "api_key_configured": config.api_key().is_some(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        let show = |t: Option<chrono::DateTime<chrono::Utc>>| {
            t.map_or_else(|| "-".to_string(), |t| t.to_rfc3339())
        };
        println!("trackcast status");
        println!("----------------");
        println!("Database:      {}", storage.path().display());
        println!("Tracks:        {}", stats.track_count);
        println!("Observations:  {}", stats.observation_count);
        println!("Oldest:        {}", show(oldest));
        println!("Newest:        {}", show(newest));
        println!("Size:          {} bytes", stats.db_size_bytes);
        println!(
            "API key:       {}",
            if config.api_key().is_some() { "configured" } else { "missing" }
        );
    }
    Ok(())
}

fn handle_config(
    config_path: Option<std::path::PathBuf>,
    cmd: ConfigCommand,
) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = Config::load_from(config_path)?;
            if json {
                let mut shown = config.clone();
                if shown.weather.api_key.is_some() {
                    shown.weather.api_key = Some("<redacted>".to_string());
                }
                println!("{}", serde_json::to_string_pretty(&shown)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!("  Retention limit:    {}", config.storage.retention_limit);
                println!();
                println!("[Weather]");
                println!("  Base URL:           {}", config.weather.base_url);
                println!(
                    "  API key:            {}",
                    if config.api_key().is_some() { "set" } else { "not set" }
                );
                println!("  Max age (hours):    {}", config.weather.max_age_hours);
                println!(
                    "  Request timeout:    {}s",
                    config.weather.request_timeout_secs
                );
                println!(
                    "  Concurrent fetches: {}",
                    config.weather.max_concurrent_fetches
                );
            }
        }
        ConfigCommand::Path => {
            println!(
                "{}",
                config_path
                    .unwrap_or_else(Config::default_config_path)
                    .display()
            );
        }
        ConfigCommand::Validate { file } => {
            let path = file
                .or(config_path)
                .unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => bail!("configuration error: {e}"),
            }
        }
    }
    Ok(())
}
