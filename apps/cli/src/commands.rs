use crate::args::{Cli, Command};
use anyhow::{Context, Result};
use std::io::Write;
use tracing::debug;
use vexil::Session;
use vexil::domain::config::VexilConfig;
use vexil::domain::{FlagListing, FlagRecord, FlagState, FlagValue};
use vexil::engine::{CommandLine, Registry};
use vexil::kernel::config::load_config;
use vexil::storage::StaticProbe;
use vexil::usage::{TracingHistograms, sample_id};

const PROGRAM: &str = "browser";

/// Configuration for `cli`, honouring `--config`.
///
/// # Errors
/// Fails if the configuration file or environment overrides are malformed.
pub fn load(cli: &Cli) -> Result<VexilConfig> {
    load_config(cli.config.as_ref()).context("Configuration is malformed")
}

/// Reads the registry named by `cli` and adds the unexpire escape hatches for
/// the configured milestone.
///
/// # Errors
/// Fails if the registry cannot be read or does not validate.
pub fn load_registry(cli: &Cli, config: &VexilConfig) -> Result<Registry> {
    Registry::from_path(&cli.registry)
        .and_then(|registry| registry.with_unexpire_entries(config.build.milestone))
        .with_context(|| format!("Cannot load flag registry {}", cli.registry.display()))
}

/// Executes one subcommand, writing human output to `out`.
///
/// # Errors
/// Fails on registry problems and when `out` cannot be written.
pub async fn execute<W: Write>(cli: Cli, mut config: VexilConfig, out: &mut W) -> Result<()> {
    let registry = load_registry(&cli, &config)?;
    if let Command::Switches { no_sentinels: true, .. } = &cli.command {
        config.command_line.sentinels = false;
    }

    let mut session = Session::open(config, registry, &StaticProbe(cli.owner)).await;
    debug!(command = ?cli.command, access = ?session.access(), "Executing command");

    match cli.command {
        Command::List { json, all } => {
            let listing = session.list();
            if json {
                serde_json::to_writer_pretty(&mut *out, &listing)?;
                writeln!(out)?;
            } else {
                write_listing(out, &listing, all)?;
            }
        },
        Command::Enable { name } => {
            session.set_enabled(&name, true);
            write_restart_hint(out, &session)?;
        },
        Command::Disable { name } => {
            session.set_enabled(&name, false);
            write_restart_hint(out, &session)?;
        },
        Command::Choose { name, index } => {
            session.set_choice(&name, index);
            write_restart_hint(out, &session)?;
        },
        Command::SetString { name, value } => {
            session.set_string(&name, &value);
            write_restart_hint(out, &session)?;
        },
        Command::SetOrigins { name, value } => {
            session.set_origin_list(&name, &value);
            write_restart_hint(out, &session)?;
        },
        Command::Reset {} => {
            session.reset_all();
            write_restart_hint(out, &session)?;
        },
        Command::Prune {} => {
            let removed = session.prune_stale_selections();
            writeln!(out, "Removed {removed} stale entries")?;
        },
        Command::Switches { args, .. } => {
            let mut line = CommandLine::from_args(std::iter::once(PROGRAM.to_owned()).chain(args));
            session.apply_to(&mut line);
            writeln!(out, "{line}")?;
        },
        Command::Report {} => {
            match session.report_usage(&TracingHistograms) {
                Some(report) => {
                    for name in report.names() {
                        writeln!(out, "{:>12}  {name}", sample_id(name))?;
                    }
                },
                None => writeln!(out, "Telemetry is disabled")?,
            }
        },
    }

    session.close();
    Ok(())
}

fn write_restart_hint<W: Write>(out: &mut W, session: &Session) -> Result<()> {
    if session.is_restart_needed() {
        writeln!(out, "Restart required for changes to take effect")?;
    } else {
        writeln!(out, "No change")?;
    }
    Ok(())
}

fn write_listing<W: Write>(out: &mut W, listing: &FlagListing, all: bool) -> Result<()> {
    for record in &listing.supported {
        write_record(out, record)?;
    }
    if all && !listing.unsupported.is_empty() {
        writeln!(out, "\nUnavailable on this platform:")?;
        for record in &listing.unsupported {
            write_record(out, record)?;
        }
    }
    Ok(())
}

fn write_record<W: Write>(out: &mut W, record: &FlagRecord) -> Result<()> {
    let state = match record.state {
        FlagState::Unset => "default".to_owned(),
        FlagState::Enabled => "enabled".to_owned(),
        FlagState::DisabledExplicitly => "disabled".to_owned(),
        FlagState::ChosenVariant(index) => format!("option {index}"),
        FlagState::Expired => "expired".to_owned(),
    };
    writeln!(out, "{:<48} {:<10} {}", record.internal_name, state, record.label)?;

    for option in &record.options {
        let marker = if option.selected { '*' } else { ' ' };
        writeln!(out, "  {marker} {:<44} {}", option.internal_name, option.label)?;
    }
    match &record.value {
        Some(FlagValue::String(value) | FlagValue::OriginList(value)) if !value.is_empty() => {
            writeln!(out, "    = {value}")?;
        },
        _ => {},
    }
    Ok(())
}
