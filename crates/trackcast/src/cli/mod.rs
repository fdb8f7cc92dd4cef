//! Command-line interface for trackcast.
//!
//! This module provides the CLI structure for the `trackcast` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::logging::Verbosity;

pub use commands::{
    validate_track_fields, AddTrackArgs, ConfigCommand, EditTrackArgs, RefreshCommand,
    StatusCommand, TrackCommand, UserCommand, WeatherCommand, DEFAULT_USER_ID,
};

/// trackcast - Track-surface weather for race circuits
///
/// Keeps a short history of weather observations per race track, refreshing
/// them from WeatherAPI.com when they go stale and estimating the asphalt
/// temperature from air temperature, UV, cloud cover and humidity.
#[derive(Debug, Parser)]
#[command(name = "trackcast")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage race tracks
    #[command(subcommand)]
    Track(TrackCommand),

    /// Manage users and their unit preferences
    #[command(subcommand)]
    User(UserCommand),

    /// Fetch weather for tracks whose observations are stale
    Refresh(RefreshCommand),

    /// Inspect stored weather
    #[command(subcommand)]
    Weather(WeatherCommand),

    /// Show database status
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_name() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "trackcast");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_flags() {
        let cli = Cli::try_parse_from(["trackcast", "-q", "status"]).unwrap();
        assert_eq!(cli.verbosity(), Verbosity::Quiet);

        let cli = Cli::try_parse_from(["trackcast", "status"]).unwrap();
        assert_eq!(cli.verbosity(), Verbosity::Normal);

        let cli = Cli::try_parse_from(["trackcast", "-v", "status"]).unwrap();
        assert_eq!(cli.verbosity(), Verbosity::Verbose);

        let cli = Cli::try_parse_from(["trackcast", "-vv", "status"]).unwrap();
        assert_eq!(cli.verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_parse_track_add_with_negative_longitude() {
        let cli = Cli::try_parse_from([
            "trackcast",
            "track",
            "add",
            "--name",
            "Silverstone",
            "--location",
            "Towcester",
            "--lat",
            "52.0786",
            "--lon",
            "-1.0169",
            "--country",
            "United Kingdom",
            "--favorite",
        ])
        .unwrap();

        let Command::Track(TrackCommand::Add(args)) = cli.command else {
            panic!("expected track add");
        };
        assert_eq!(args.name, "Silverstone");
        assert!((args.lon + 1.0169).abs() < 1e-9);
        assert_eq!(args.user, DEFAULT_USER_ID);
        assert!(args.favorite);
    }

    #[test]
    fn test_parse_track_list_filters() {
        let cli =
            Cli::try_parse_from(["trackcast", "track", "list", "--user", "7", "--favorites"])
                .unwrap();
        assert!(matches!(
            cli.command,
            Command::Track(TrackCommand::List {
                user: 7,
                favorites: true,
                search: None
            })
        ));
    }

    #[test]
    fn test_parse_track_edit() {
        let cli = Cli::try_parse_from([
            "trackcast", "track", "edit", "4", "--name", "Imola", "--lon", "-11.7",
        ])
        .unwrap();
        let Command::Track(TrackCommand::Edit(args)) = cli.command else {
            panic!("expected track edit");
        };
        assert_eq!(args.id, 4);
        assert_eq!(args.name.as_deref(), Some("Imola"));
        assert!(args.lon.is_some_and(|lon| (lon + 11.7).abs() < 1e-9));
        assert_eq!(args.lat, None);
        assert_eq!(args.location, None);
    }

    #[test]
    fn test_parse_user_commands() {
        let cli = Cli::try_parse_from(["trackcast", "user", "add", "lando"]).unwrap();
        let Command::User(UserCommand::Add {
            username,
            temperature_unit,
            wind_speed_unit,
        }) = cli.command
        else {
            panic!("expected user add");
        };
        assert_eq!(username, "lando");
        assert_eq!(temperature_unit, "Celsius");
        assert_eq!(wind_speed_unit, "kph");

        let cli = Cli::try_parse_from([
            "trackcast",
            "user",
            "set",
            "2",
            "--temperature-unit",
            "Fahrenheit",
        ])
        .unwrap();
        let Command::User(UserCommand::Set {
            id,
            username,
            temperature_unit,
            wind_speed_unit,
        }) = cli.command
        else {
            panic!("expected user set");
        };
        assert_eq!(id, 2);
        assert_eq!(username, None);
        assert_eq!(temperature_unit.as_deref(), Some("Fahrenheit"));
        assert_eq!(wind_speed_unit, None);
    }

    #[test]
    fn test_parse_refresh() {
        let cli = Cli::try_parse_from(["trackcast", "refresh"]).unwrap();
        let Command::Refresh(cmd) = cli.command else {
            panic!("expected refresh");
        };
        assert_eq!(cmd.track, None);
        assert_eq!(cmd.max_age_hours, None);
        assert!(!cmd.force);

        let cli = Cli::try_parse_from([
            "trackcast",
            "refresh",
            "--track",
            "3",
            "--max-age-hours",
            "6",
            "--force",
        ])
        .unwrap();
        let Command::Refresh(cmd) = cli.command else {
            panic!("expected refresh");
        };
        assert_eq!(cmd.track, Some(3));
        assert_eq!(cmd.max_age_hours, Some(6));
        assert!(cmd.force);
    }

    #[test]
    fn test_parse_weather_history() {
        let cli =
            Cli::try_parse_from(["trackcast", "weather", "history", "2", "--limit", "5"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Weather(WeatherCommand::History {
                track: 2,
                limit: Some(5),
                json: false
            })
        ));
    }

    #[test]
    fn test_parse_with_config() {
        let cli =
            Cli::try_parse_from(["trackcast", "-c", "/custom/config.toml", "status"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_parse_rejects_missing_track_id() {
        assert!(Cli::try_parse_from(["trackcast", "track", "remove"]).is_err());
    }
}
