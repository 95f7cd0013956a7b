//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use smarttank_types::{CostKind, LengthUnit};

use crate::commands::ConfigAction;

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "smarttank")]
#[command(author, version, about = "Set up SmartTank water-tank monitors over Bluetooth", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true, env = "SMARTTANK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Reusable device arguments
#[derive(Debug, Clone, Args)]
pub struct DeviceArgs {
    /// Device identifier (MAC address or UUID); defaults to the last set-up device
    #[arg(short, long, env = "SMARTTANK_DEVICE")]
    pub device: Option<String>,
}

/// Tank and cost values for a non-interactive setup
#[derive(Debug, Clone, Default, Args)]
pub struct SetupValues {
    /// Tank height
    #[arg(long)]
    pub height: Option<String>,

    /// Unit of --height
    #[arg(long, value_parser = parse_unit, default_value = "cm")]
    pub height_unit: LengthUnit,

    /// Tank diameter
    #[arg(long)]
    pub diameter: Option<String>,

    /// Unit of --diameter
    #[arg(long, value_parser = parse_unit, default_value = "cm")]
    pub diameter_unit: LengthUnit,

    /// What the cost applies to
    #[arg(long, value_parser = parse_cost_kind)]
    pub cost_type: Option<CostKind>,

    /// Price per unit of electricity or per liter of water
    #[arg(long)]
    pub cost: Option<String>,
}

fn parse_unit(s: &str) -> Result<LengthUnit, String> {
    s.parse().map_err(|e: smarttank_types::ValidationError| e.to_string())
}

fn parse_cost_kind(s: &str) -> Result<CostKind, String> {
    s.parse().map_err(|e: smarttank_types::ValidationError| e.to_string())
}

/// Pump relay state
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PumpState {
    On,
    Off,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan for nearby SmartTank devices
    Scan {
        /// Scan window in seconds (overrides config)
        #[arg(short, long)]
        timeout: Option<u64>,

        /// List every advertising device, not just SmartTank ones
        #[arg(short, long)]
        all: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Walk a device through setup
    Setup {
        #[command(flatten)]
        device: DeviceArgs,

        #[command(flatten)]
        values: SetupValues,

        /// Skip the Wi-Fi handoff even if one is configured
        #[arg(long)]
        no_wifi: bool,
    },

    /// Show the values saved by the last setup
    Status {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Switch the pump relay
    Pump {
        #[command(flatten)]
        device: DeviceArgs,

        /// Relay state
        #[arg(value_enum)]
        state: PumpState,
    },

    /// Send a raw command, e.g. GET_CONFIG
    Send {
        #[command(flatten)]
        device: DeviceArgs,

        /// Command text as the firmware expects it
        command: String,
    },

    /// Forget the saved setup values
    Reset {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// List devices registered to your account
    Devices {
        /// API token
        #[arg(long, env = "SMARTTANK_TOKEN", hide_env_values = true)]
        token: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_setup_values() {
        let cli = Cli::try_parse_from([
            "smarttank",
            "setup",
            "--height",
            "4",
            "--height-unit",
            "ft",
            "--diameter",
            "90",
            "--cost-type",
            "water",
            "--cost",
            "0.5",
        ])
        .unwrap();

        let Commands::Setup { values, no_wifi, .. } = cli.command else {
            panic!("expected setup");
        };
        assert_eq!(values.height.as_deref(), Some("4"));
        assert_eq!(values.height_unit, LengthUnit::Ft);
        assert_eq!(values.diameter_unit, LengthUnit::Cm);
        assert_eq!(values.cost_type, Some(CostKind::Water));
        assert!(!no_wifi);
    }

    #[test]
    fn test_rejects_unknown_unit() {
        let result = Cli::try_parse_from(["smarttank", "setup", "--height-unit", "yards"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_pump() {
        let cli = Cli::try_parse_from(["smarttank", "pump", "on", "--device", "AA:BB"]).unwrap();
        let Commands::Pump { device, state } = cli.command else {
            panic!("expected pump");
        };
        assert_eq!(state, PumpState::On);
        assert_eq!(device.device.as_deref(), Some("AA:BB"));
    }

    #[test]
    fn test_parse_config_init() {
        let cli = Cli::try_parse_from(["smarttank", "config", "init", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Init { force: true }
            }
        ));
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["smarttank", "-v", "-q", "status"]).is_err());
    }
}
