use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use log::LevelFilter;
use mwcan_rs::can::link::LinkConfig;
use mwcan_rs::command::Operation;
use mwcan_rs::constants::{DEFAULT_INTERFACE, DEFAULT_SERIAL_DEVICE, NO_REPLY};
use mwcan_rs::logging::{log_error, log_info, log_warn, parse_level};
use mwcan_rs::{
    init_logger_with_level, DeviceAddress, DeviceSession, DeviceVariant, Direction, IpLink,
    LimitsFile, LinkControl, SocketCanBus,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "mwcan-cli")]
#[command(about = "Controlling the Mean Well CAN devices BIC-2200 power supply and NPB charger")]
#[command(after_help = "<value> = amps or volts * 100 --> 25.66V = 2566")]
struct Cli {
    command: CliCommand,

    /// Set-point or configuration word for the *set commands
    value: Option<i64>,

    /// Device family: bic2200 or npb
    #[arg(short, long)]
    device: Option<DeviceVariant>,

    /// Node id set on the device (BIC-2200 0-7, NPB 0-3)
    #[arg(short, long)]
    node: Option<u8>,

    #[arg(short, long, default_value = DEFAULT_INTERFACE)]
    interface: String,

    /// Serial device of an slcan adapter, used when the interface does not exist
    #[arg(long, default_value = DEFAULT_SERIAL_DEVICE)]
    serial_device: String,

    /// JSON file with the limits of each device model
    #[arg(short, long, default_value = "mwcan.json")]
    limits: PathBuf,

    /// Log level by name (error, warn, info, debug, trace) or number (50 ... 10, 0)
    #[arg(long, default_value = "info", value_parser = parse_level)]
    log_level: LevelFilter,

    /// How long to wait for each reply, in milliseconds
    #[arg(long, default_value_t = 500)]
    reply_timeout_ms: u64,

    /// Use the interface as is; never run ip link or slcand
    #[arg(long)]
    keep_link: bool,

    /// Run ip link and slcand through sudo
    #[arg(long)]
    sudo: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lower")]
enum CliCommand {
    /// Output on
    On,
    /// Output off
    Off,
    /// Read current on/off status
    ReadOnOff,
    /// Read charge voltage setting
    CvRead,
    /// Set charge voltage
    CvSet,
    /// Read charge current setting
    CcRead,
    /// Set charge current
    CcSet,
    /// Read discharge voltage setting
    DvRead,
    /// Set discharge voltage
    DvSet,
    /// Read discharge current setting
    DcRead,
    /// Set discharge current
    DcSet,
    /// Read DC voltage
    VRead,
    /// Read DC current
    CRead,
    /// Read AC voltage
    AcvRead,
    /// Set direction charge battery
    Charge,
    /// Set direction discharge battery
    Discharge,
    /// Read temperature
    TempRead,
    /// Read device type
    TypeRead,
    /// Read firmware
    FirmwareRead,
    /// Read serial number
    SerialRead,
    /// Read system status
    StatusRead,
    /// Read fan speed 1
    Fan1,
    /// Read fan speed 2
    Fan2,
    /// Read fault status
    FaultRead,
    /// Read scaling factors
    ReadScaling,
    /// Read system config
    SystemConfigRead,
    /// Write system config
    SystemConfigSet,
    /// Read charge status (NPB)
    ChargeStatusRead,
    /// Set PSU = 0 or charger mode = 1 (NPB)
    #[value(name = "NPB_chargemode")]
    NpbChargeMode,
    /// Read curve config (NPB)
    #[value(name = "NPB_readcurve")]
    NpbReadCurve,
}

impl CliCommand {
    fn needs_value(self) -> bool {
        matches!(
            self,
            CliCommand::CvSet
                | CliCommand::CcSet
                | CliCommand::DvSet
                | CliCommand::DcSet
                | CliCommand::SystemConfigSet
                | CliCommand::NpbChargeMode
        )
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger_with_level(cli.log_level);

    let Some(variant) = cli.device else {
        eprintln!("ERROR - the device family is not configured, pass --device bic2200|npb");
        return ExitCode::from(1);
    };
    let Some(node) = cli.node else {
        eprintln!("ERROR - the node id is not configured, pass --node <id>");
        return ExitCode::from(1);
    };

    match run(&cli, variant, node).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log_error(&format!("{e:#}"));
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: &Cli, variant: DeviceVariant, node: u8) -> anyhow::Result<()> {
    if cli.command.needs_value() && cli.value.is_none() {
        bail!("{:?} needs a <value>", cli.command);
    }

    let address = DeviceAddress::resolve(variant, node).context("invalid device address")?;
    let limits = LimitsFile::load(&cli.limits)
        .with_context(|| format!("cannot load limits from {}", cli.limits.display()))?;

    let config = LinkConfig {
        interface: cli.interface.clone(),
        serial_device: cli.serial_device.clone(),
        ..LinkConfig::default()
    };
    let mut link = IpLink::new(config, cli.sudo);
    if !cli.keep_link {
        link.ensure_up().await.context("cannot bring up the CAN link")?;
    }

    let result = tokio::select! {
        r = execute(cli, address, &limits) => r,
        _ = tokio::signal::ctrl_c() => {
            log_warn("Interrupted");
            Ok(())
        }
    };

    if !cli.keep_link {
        log_info("CLEAN UP ...");
        if let Err(e) = link.tear_down().await {
            log_warn(&format!("Link teardown failed: {e}"));
        }
    }
    result
}

async fn execute(cli: &Cli, address: DeviceAddress, limits: &LimitsFile) -> anyhow::Result<()> {
    let bus = SocketCanBus::open(&cli.interface)?;
    let mut session = DeviceSession::connect(address, limits, bus)
        .await
        .context("cannot identify the device")?
        .with_reply_timeout(Duration::from_millis(cli.reply_timeout_ms));
    println!("Found Device: {}", session.profile().model());

    let value = cli.value.unwrap_or_default();
    let printed = match cli.command {
        CliCommand::On => session.set_output(true).await?,
        CliCommand::Off => session.set_output(false).await?,
        CliCommand::ReadOnOff => session.output_enabled().await?,
        CliCommand::CvRead => session.charge_voltage().await?,
        CliCommand::CvSet if value == 0 => NO_REPLY,
        CliCommand::CvSet => session.set_charge_voltage(value).await?,
        CliCommand::CcRead => session.charge_current().await?,
        CliCommand::CcSet => session.set_charge_current(value).await?,
        CliCommand::DvRead => session.discharge_voltage().await?,
        CliCommand::DvSet if value == 0 => NO_REPLY,
        CliCommand::DvSet => session.set_discharge_voltage(value).await?,
        CliCommand::DcRead => session.discharge_current().await?,
        CliCommand::DcSet if value == 0 => NO_REPLY,
        CliCommand::DcSet => session.set_discharge_current(value).await?,
        CliCommand::VRead => session.dc_voltage().await?,
        CliCommand::CRead => session.dc_current().await?,
        CliCommand::AcvRead => session.ac_voltage().await?,
        CliCommand::Charge => session.set_direction(Direction::Charge).await?,
        CliCommand::Discharge => session.set_direction(Direction::Discharge).await?,
        CliCommand::TempRead => session.temperature().await?,
        CliCommand::Fan1 => session.fan_speed_1().await?,
        CliCommand::Fan2 => session.fan_speed_2().await?,
        CliCommand::ReadScaling => session.scaling_factors().await?,
        CliCommand::NpbChargeMode => session.set_charger_mode(value != 0).await?,
        CliCommand::TypeRead => {
            println!("{}", session.model_type().await?);
            return Ok(());
        }
        CliCommand::SerialRead => {
            println!("{}", session.serial_number().await?);
            return Ok(());
        }
        CliCommand::FirmwareRead => {
            match session.firmware().await? {
                Some(fw) => {
                    println!("MCU1 firmware version: {}", fw.mcu1);
                    println!("MCU2 firmware version: {}", fw.mcu2);
                }
                None => println!("{NO_REPLY}"),
            }
            return Ok(());
        }
        CliCommand::StatusRead => return describe(&mut session, Operation::SystemStatus).await,
        CliCommand::FaultRead => return describe(&mut session, Operation::FaultStatus).await,
        CliCommand::SystemConfigRead => {
            return describe(&mut session, Operation::SystemConfig).await
        }
        CliCommand::SystemConfigSet => {
            session.set_system_config(value).await?;
            return describe(&mut session, Operation::SystemConfig).await;
        }
        CliCommand::ChargeStatusRead => {
            return describe(&mut session, Operation::ChargeStatus).await
        }
        CliCommand::NpbReadCurve => return describe(&mut session, Operation::CurveConfig).await,
    };

    println!("{printed}");
    Ok(())
}

async fn describe(
    session: &mut DeviceSession<SocketCanBus>,
    operation: Operation,
) -> anyhow::Result<()> {
    let lines = session.describe(operation).await?;
    if lines.is_empty() {
        println!("{NO_REPLY}");
    }
    for line in lines {
        println!("{line}");
    }
    Ok(())
}
