use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "trafficlight",
    about = "Watch and control a Particle-hosted traffic light",
    version
)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, global = true, env = "TRAFFICLIGHT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Credentials file path, overriding the configuration file
    #[arg(long, global = true, env = "TRAFFICLIGHT_CREDENTIALS")]
    pub credentials: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Follow the light's status until interrupted
    Watch,

    /// Switch the light to available
    Available,

    /// Switch the light to busy
    Busy,

    /// Switch the light to do not disturb
    #[command(alias = "do-not-disturb")]
    Dnd,

    /// Store the Particle user token; omit the value to remove it
    Token {
        value: Option<String>,
    },

    /// Store the Particle device id; omit the value to remove it
    Device {
        value: Option<String>,
    },

    /// Print the effective configuration
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_status_subcommands() {
        let args = Args::try_parse_from(["trafficlight", "busy"]).unwrap();
        assert!(matches!(args.command, Commands::Busy));

        let args = Args::try_parse_from(["trafficlight", "do-not-disturb"]).unwrap();
        assert!(matches!(args.command, Commands::Dnd));

        let args = Args::try_parse_from(["trafficlight", "available"]).unwrap();
        assert!(matches!(args.command, Commands::Available));
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let args =
            Args::try_parse_from(["trafficlight", "watch", "--verbose", "--config", "tl.toml"])
                .unwrap();
        assert!(args.verbose);
        assert_eq!(args.config, Some(PathBuf::from("tl.toml")));

        let args =
            Args::try_parse_from(["trafficlight", "token", "--credentials", "secrets.toml"])
                .unwrap();
        assert_eq!(args.credentials, Some(PathBuf::from("secrets.toml")));
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        assert!(Args::try_parse_from(["trafficlight", "-v", "-q", "watch"]).is_err());
    }

    #[test]
    fn secret_value_is_optional() {
        let args = Args::try_parse_from(["trafficlight", "token"]).unwrap();
        assert!(matches!(args.command, Commands::Token { value: None }));

        let args = Args::try_parse_from(["trafficlight", "device", "abc123"]).unwrap();
        assert!(matches!(args.command, Commands::Device { value: Some(ref v) } if v == "abc123"));
    }
}
