//! Setup wizard command.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use dialoguer::Select;
use dialoguer::theme::ColorfulTheme;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::debug;

use smarttank_core::{
    BleRadio, DiscoveredDevice, EventReceiver, NetworkScanner, PermissionGate, Provisioner,
    RadioPlatform, SetupStep, StaticNetworks, WifiHandoff,
};
use smarttank_store::Store;
use smarttank_types::{CostConfig, CostKind, LengthUnit, NormalizedDimensions, TankDimensions};

use super::{confirm, input, is_interactive, open_radio, open_store};
use crate::cli::SetupValues;
use crate::config::Config;
use crate::prompt::TerminalPrompt;
use crate::style;
use crate::wifi::NmcliNetworks;

type Wizard = Provisioner<BleRadio, Store>;

/// Permission gate for the configured platform.
pub(crate) fn permission_gate(config: &Config) -> Result<PermissionGate> {
    Ok(match config.radio_platform()? {
        RadioPlatform::Desktop => PermissionGate::desktop(),
        platform => PermissionGate::new(platform, Arc::new(TerminalPrompt)),
    })
}

fn handoff(config: &Config) -> Result<Option<WifiHandoff>> {
    let (Some(section), Some(credentials)) = (&config.handoff, config.handoff_config()?) else {
        return Ok(None);
    };
    let scanner: Arc<dyn NetworkScanner> = if section.skip_range_check {
        Arc::new(StaticNetworks::new([credentials.ssid.clone()]))
    } else {
        Arc::new(NmcliNetworks)
    };
    Ok(Some(WifiHandoff::new(credentials, scanner)))
}

fn spawn_event_log(mut events: EventReceiver) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => debug!("setup event: {}", json),
                    Err(_) => debug!("setup event: {:?}", event),
                },
                Err(RecvError::Lagged(n)) => debug!("Dropped {} setup events", n),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

pub async fn cmd_setup(
    config: &Config,
    device: Option<String>,
    values: SetupValues,
    no_wifi: bool,
    quiet: bool,
) -> Result<()> {
    let radio = open_radio().await?;
    let store = Arc::new(open_store(config)?);

    let mut wizard = Provisioner::new(radio, store, permission_gate(config)?)
        .with_retry_policy(config.retry_policy()?)
        .with_scan_options(config.scan_options(None, false)?)
        .with_encoding(config.payload_encoding);
    if !no_wifi && let Some(handoff) = handoff(config)? {
        wizard = wizard.with_handoff(handoff);
    }

    let event_log = spawn_event_log(wizard.subscribe());
    let result = run(&mut wizard, device, &values, quiet).await;
    if result.is_err() {
        wizard.abandon().await;
    }
    event_log.abort();
    result
}

fn announce(step: SetupStep, title: &str, quiet: bool) {
    if !quiet {
        eprintln!(
            "\n{} {}",
            style::step_prefix(step.number(), SetupStep::COUNT),
            title
        );
    }
}

async fn run(
    wizard: &mut Wizard,
    device: Option<String>,
    values: &SetupValues,
    quiet: bool,
) -> Result<()> {
    let interactive = is_interactive();

    let devices = scan_until_found(wizard, interactive, quiet).await?;

    announce(wizard.step(), "Select your device", quiet);
    let identifier = match device {
        Some(device) => device,
        None if devices.len() == 1 => devices[0].identifier.clone(),
        None if interactive => choose_device(&devices)?,
        None => bail!("Several devices found; pick one with --device"),
    };
    wizard.select_device(&identifier)?;
    connect(wizard, &identifier, interactive, quiet).await?;

    announce(wizard.step(), "Tank dimensions", quiet);
    let dimensions = submit_dimensions(wizard, values, interactive).await?;

    announce(wizard.step(), "Cost", quiet);
    let cost = submit_cost(wizard, values, interactive).await?;

    announce(wizard.step(), "Finishing", quiet);
    let spinner = style::spinner("Finishing setup...", quiet);
    let result = wizard.finalize().await;
    style::finish(spinner);
    result.context("Failed to finish setup")?;

    if !quiet {
        eprintln!("\n{}", style::success("Setup complete"));
    }
    print!("{}", summary(&identifier, &dimensions, &cost));
    Ok(())
}

async fn scan_until_found(
    wizard: &mut Wizard,
    interactive: bool,
    quiet: bool,
) -> Result<Vec<DiscoveredDevice>> {
    loop {
        announce(SetupStep::Scanning, "Looking for SmartTank devices", quiet);
        let spinner = style::spinner("Scanning...", quiet);
        let result = wizard.scan().await.map(<[DiscoveredDevice]>::to_vec);
        style::finish(spinner);

        let devices = match result {
            Ok(devices) => devices,
            Err(e) => {
                if e.offers_settings_link() {
                    eprintln!("Allow Bluetooth access for this app in the system settings.");
                }
                return Err(e).context("Scan failed");
            }
        };
        if !devices.is_empty() {
            return Ok(devices);
        }

        eprintln!("{}", style::failure("No SmartTank devices found"));
        if !interactive || !confirm("Scan again?", true)? {
            bail!("No SmartTank devices found. Make sure the device is powered on and nearby.");
        }
    }
}

fn choose_device(devices: &[DiscoveredDevice]) -> Result<String> {
    let items: Vec<String> = devices
        .iter()
        .map(|d| format!("{} ({})", d.display_name, d.identifier))
        .collect();
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select a device")
        .items(&items)
        .default(0)
        .interact()
        .context("Failed to get user selection")?;
    Ok(devices[selection].identifier.clone())
}

async fn connect(wizard: &mut Wizard, identifier: &str, interactive: bool, quiet: bool) -> Result<()> {
    loop {
        let spinner = style::spinner(format!("Connecting to {}...", identifier), quiet);
        let result = wizard.confirm_device().await;
        style::finish(spinner);

        match result {
            Ok(()) => {
                if !quiet {
                    eprintln!("{}", style::success(&format!("Connected to {}", identifier)));
                }
                return Ok(());
            }
            Err(e) if interactive => {
                eprintln!("{}", style::failure(&e.to_string()));
                if !confirm("Try again?", true)? {
                    return Err(e.into());
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn select_unit(prompt: &str, default: LengthUnit) -> Result<LengthUnit> {
    let index = LengthUnit::ALL
        .iter()
        .position(|u| *u == default)
        .unwrap_or(0);
    let items: Vec<&str> = LengthUnit::ALL.iter().map(|u| u.as_str()).collect();
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(&items)
        .default(index)
        .interact()
        .context("Failed to get user selection")?;
    Ok(LengthUnit::ALL[selection])
}

async fn submit_dimensions(
    wizard: &mut Wizard,
    values: &SetupValues,
    interactive: bool,
) -> Result<NormalizedDimensions> {
    let mut first = true;
    loop {
        let parsed = match (&values.height, &values.diameter) {
            (Some(height), Some(diameter)) if first => {
                TankDimensions::parse(height, values.height_unit, diameter, values.diameter_unit)
            }
            _ if interactive => {
                let height_unit = select_unit("Height unit", values.height_unit)?;
                eprintln!(
                    "  {} is subtracted for the sensor mount.",
                    height_unit.deduction_label()
                );
                let height = input(&format!("Tank height ({})", height_unit))?;
                let diameter_unit = select_unit("Diameter unit", values.diameter_unit)?;
                let diameter = input(&format!("Tank diameter ({})", diameter_unit))?;
                TankDimensions::parse(&height, height_unit, &diameter, diameter_unit)
            }
            _ => bail!("Tank size required: pass --height and --diameter"),
        };
        first = false;

        let result = match parsed {
            Ok(dimensions) => wizard
                .submit_dimensions(dimensions)
                .await
                .map_err(anyhow::Error::from),
            Err(e) => Err(e.into()),
        };
        match result {
            Ok(normalized) => return Ok(normalized),
            Err(e) if interactive => eprintln!("{}", style::failure(&e.to_string())),
            Err(e) => return Err(e),
        }
    }
}

async fn submit_cost(
    wizard: &mut Wizard,
    values: &SetupValues,
    interactive: bool,
) -> Result<CostConfig> {
    let mut first = true;
    loop {
        let parsed = match (values.cost_type, &values.cost) {
            (Some(kind), Some(amount)) if first => CostConfig::new(kind, amount.as_str()),
            _ if interactive => {
                let kinds = [CostKind::Electricity, CostKind::Water];
                let items: Vec<&str> = kinds.iter().map(|k| k.as_str()).collect();
                let selection = Select::with_theme(&ColorfulTheme::default())
                    .with_prompt("Cost applies to")
                    .items(&items)
                    .default(0)
                    .interact()
                    .context("Failed to get user selection")?;
                let kind = kinds[selection];
                let amount = input(&format!("Cost {}", kind.per_unit_label()))?;
                CostConfig::new(kind, amount)
            }
            _ => bail!("Cost required: pass --cost-type and --cost"),
        };
        first = false;

        let result = match parsed {
            Ok(cost) => wizard
                .submit_cost(cost.clone())
                .await
                .map(|()| cost)
                .map_err(anyhow::Error::from),
            Err(e) => Err(e.into()),
        };
        match result {
            Ok(cost) => return Ok(cost),
            Err(e) if interactive => eprintln!("{}", style::failure(&e.to_string())),
            Err(e) => return Err(e),
        }
    }
}

fn summary(identifier: &str, dimensions: &NormalizedDimensions, cost: &CostConfig) -> String {
    format!(
        "Device:    {}\n\
         Height:    {} cm (usable)\n\
         Diameter:  {} cm\n\
         Capacity:  {:.0} L\n\
         Cost:      {} {} ({})\n",
        identifier,
        dimensions.height_text(),
        dimensions.diameter_text(),
        dimensions.capacity_liters(),
        cost.amount(),
        cost.kind().per_unit_label(),
        cost.kind(),
    )
}
