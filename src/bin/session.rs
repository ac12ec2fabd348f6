//! TENS pain-conditioning session runner.
//!
//! Loads the session config, prompts for the participant ID, reserves the
//! data file, and runs the full experiment (instructions, calibration
//! staircase, main trial sequence) against the configured output port.
//!
//! The console surface is a development stand-in for the lab display:
//! frames print to stdout and responses are typed as lines on stdin.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use painrig::logging::{self, LogConfig};
use painrig::session::parse_participant_id;
use painrig::ui::ConsoleSurface;
use painrig::{
    CsvSink, DesignVariant, ExperimentController, HardwarePort, NullPort, OutputPort, RigError,
    SessionConfig, SessionIo, SystemClock, TimingConfig, TrialPlanGenerator, TrialSink,
};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser)]
#[command(name = "session")]
#[command(version, about = "TENS pain-conditioning session runner", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "painrig.toml")]
    config: String,

    /// Participant ID (prompted interactively if omitted)
    #[arg(long)]
    participant: Option<String>,

    /// Override data directory from config
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override parallel port base address, e.g. 0x3ff8 (omit for no device)
    #[arg(long, env = "PAINRIG_PORT_BASE")]
    port_base: Option<String>,

    /// Override experiment variant (choice, context_renewal)
    #[arg(long)]
    variant: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log file path (logs to both file and stdout)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Dry run: generate and print the trial plan without running anything
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a sample config file
    GenerateConfig {
        /// Output file path
        #[arg(short, long, default_value = "painrig.toml")]
        output: String,
    },
    /// Validate config without running
    ValidateConfig,
    /// Run a session (default)
    Run,
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct AppConfig {
    #[serde(default)]
    session: SessionSettings,
    #[serde(default)]
    timing: TimingConfig,
    #[serde(default)]
    logging: LogConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct SessionSettings {
    /// Where per-participant response files are written.
    #[serde(default = "default_data_dir")]
    data_dir: PathBuf,
    /// Parallel port base address, e.g. "0x3ff8". Absent means no device.
    #[serde(default)]
    port_base: Option<String>,
    #[serde(default = "default_variant")]
    variant: DesignVariant,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_variant() -> DesignVariant {
    DesignVariant::Choice
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            port_base: None,
            variant: default_variant(),
        }
    }
}

fn load_config(path: &str) -> Result<AppConfig, Box<dyn std::error::Error>> {
    if Path::new(path).exists() {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    } else {
        Ok(AppConfig::default())
    }
}

fn parse_variant(s: &str) -> Result<DesignVariant, Box<dyn std::error::Error>> {
    match s.to_lowercase().as_str() {
        "choice" => Ok(DesignVariant::Choice),
        "context_renewal" | "renewal" => Ok(DesignVariant::ContextRenewal),
        _ => Err(format!("Unknown variant '{s}'. Use: choice, context_renewal").into()),
    }
}

fn parse_port_base(s: &str) -> Result<u16, Box<dyn std::error::Error>> {
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16)
    } else {
        s.parse()
    };
    parsed.map_err(|_| format!("Invalid port base address '{s}'").into())
}

// ============================================================================
// Participant intake
// ============================================================================

/// Set while the ID prompt is blocking on stdin. Ctrl-C there is a clean
/// cancellation; anywhere else the escape key is the abort path, so the
/// signal must not kill a run while a trigger line could be hot.
static PROMPT_ACTIVE: AtomicBool = AtomicBool::new(false);

#[derive(Debug, PartialEq, Eq)]
enum InterruptAction {
    CancelCleanly,
    Ignore,
}

fn interrupt_action(prompt_active: bool) -> InterruptAction {
    if prompt_active {
        InterruptAction::CancelCleanly
    } else {
        InterruptAction::Ignore
    }
}

fn install_interrupt_handler() -> Result<(), Box<dyn std::error::Error>> {
    ctrlc::set_handler(|| {
        match interrupt_action(PROMPT_ACTIVE.load(Ordering::SeqCst)) {
            InterruptAction::CancelCleanly => {
                println!("\nSession cancelled.");
                std::process::exit(0);
            }
            InterruptAction::Ignore => {
                eprintln!("(press escape to end the session)");
            }
        }
    })?;
    Ok(())
}

/// Prompt until a usable participant ID is typed. Re-prompts on empty,
/// non-numeric, and already-used IDs; EOF or Ctrl-C at the prompt cancels
/// the session cleanly.
fn prompt_participant(
    data_dir: &Path,
) -> Result<Option<(u32, CsvSink)>, Box<dyn std::error::Error>> {
    PROMPT_ACTIVE.store(true, Ordering::SeqCst);
    let result = prompt_loop(data_dir);
    PROMPT_ACTIVE.store(false, Ordering::SeqCst);
    result
}

fn prompt_loop(data_dir: &Path) -> Result<Option<(u32, CsvSink)>, Box<dyn std::error::Error>> {
    let stdin = std::io::stdin();
    loop {
        print!("Participant ID: ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            println!();
            return Ok(None);
        }
        let pid = match parse_participant_id(&line) {
            Ok(pid) => pid,
            Err(_) => {
                eprintln!("Please enter a whole number.");
                continue;
            }
        };
        match CsvSink::create(data_dir, pid) {
            Ok(sink) => return Ok(Some((pid, sink))),
            Err(RigError::DuplicateParticipant { path, .. }) => {
                eprintln!(
                    "Data for participant {pid} already exists at {}. Choose another ID.",
                    path.display()
                );
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Claim a data file for a participant given on the command line. Unlike the
/// interactive path, a duplicate here is fatal.
fn claim_participant(
    data_dir: &Path,
    raw: &str,
) -> Result<(u32, CsvSink), Box<dyn std::error::Error>> {
    let pid = parse_participant_id(raw)?;
    let sink = CsvSink::create(data_dir, pid)?;
    Ok((pid, sink))
}

// ============================================================================
// Dry run
// ============================================================================

#[derive(Serialize)]
struct PlanSummary {
    participant_id: u32,
    group: u32,
    group_name: &'static str,
    counterbalance: u32,
    optimal: &'static str,
    optimal_pattern: &'static str,
    main_trials: usize,
    calibration_trials: usize,
    trials_by_phase: Vec<(String, usize)>,
}

fn print_plan_summary(config: &SessionConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = rand::thread_rng();
    let plan = TrialPlanGenerator::new(&config.design).generate(&mut rng);

    let mut by_phase: Vec<(String, usize)> = Vec::new();
    for trial in &plan.main {
        let name = trial.phase.to_string();
        match by_phase.iter_mut().find(|(p, _)| *p == name) {
            Some((_, n)) => *n += 1,
            None => by_phase.push((name, 1)),
        }
    }
    let cb = &config.counterbalance;
    let summary = PlanSummary {
        participant_id: config.participant_id,
        group: cb.group,
        group_name: cb.group_name,
        counterbalance: cb.index,
        optimal: cb.optimal.name(),
        optimal_pattern: config.optimal_pattern().name(),
        main_trials: plan.main.len(),
        calibration_trials: plan.calibration.len(),
        trials_by_phase: by_phase,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::GenerateConfig { ref output }) => {
            let content = toml::to_string_pretty(&AppConfig::default())?;
            std::fs::write(output, content)?;
            println!("Sample config written to: {output}");
            return Ok(());
        }
        Some(Commands::ValidateConfig) => {
            let config = load_config(&cli.config)?;
            config.timing.validate().map_err(RigError::Config)?;
            println!("Config OK: {}", cli.config);
            return Ok(());
        }
        Some(Commands::Run) | None => {}
    }

    let app = load_config(&cli.config)?;
    app.timing.validate().map_err(RigError::Config)?;

    let mut log_config = app.logging.clone();
    if let Some(ref level) = cli.log_level {
        log_config.level = level.clone();
    }
    if let Some(ref path) = cli.log_file {
        log_config.log_file = Some(path.clone());
    }
    let _log_guard = logging::init_logging(&log_config)?;

    let variant = match cli.variant {
        Some(ref s) => parse_variant(s)?,
        None => app.session.variant,
    };
    let data_dir = cli.data_dir.unwrap_or(app.session.data_dir);

    if cli.dry_run {
        // No data file is reserved in a dry run; use a placeholder ID if
        // none was given.
        let pid = match cli.participant {
            Some(ref raw) => parse_participant_id(raw)?,
            None => 0,
        };
        let config = SessionConfig::new(pid, variant, app.timing);
        return print_plan_summary(&config);
    }

    install_interrupt_handler()?;

    // Reserve the data file before touching any hardware, so a duplicate ID
    // cannot clobber an existing session.
    let Some((pid, mut sink)) = (match cli.participant {
        Some(ref raw) => Some(claim_participant(&data_dir, raw)?),
        None => prompt_participant(&data_dir)?,
    }) else {
        info!("no participant entered, session cancelled");
        return Ok(());
    };

    let config = SessionConfig::new(pid, variant, app.timing);
    info!(
        participant = pid,
        group = config.counterbalance.group_name,
        counterbalance = config.counterbalance.index,
        ?variant,
        "session configured"
    );

    let port_base = cli.port_base.or(app.session.port_base);
    let mut port: Box<dyn OutputPort> = match port_base {
        Some(ref addr) => {
            let base = parse_port_base(addr)?;
            match HardwarePort::open(base) {
                Ok(p) => {
                    info!(base = %addr, "hardware port opened");
                    Box::new(p)
                }
                Err(e) => {
                    warn!(error = %e, "hardware port unavailable, triggers disabled");
                    Box::new(NullPort)
                }
            }
        }
        None => {
            warn!("no port configured, triggers disabled");
            Box::new(NullPort)
        }
    };

    let mut rng = rand::thread_rng();
    let plan = TrialPlanGenerator::new(&config.design).generate(&mut rng);

    let clock = SystemClock::new();
    let mut surface = ConsoleSurface::new(Duration::from_secs_f64(config.timing.frame_interval));

    let outcome = {
        let mut io = SessionIo::new(&clock, &mut surface, &mut *port);
        let mut controller = ExperimentController::new(&config, plan);
        controller.run(&mut io, &mut rng, &mut sink as &mut dyn TrialSink)?
    };
    info!(?outcome, path = %sink.path().display(), "session finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_cancels_cleanly_only_at_the_id_prompt() {
        assert_eq!(interrupt_action(true), InterruptAction::CancelCleanly);
        assert_eq!(interrupt_action(false), InterruptAction::Ignore);
    }

    #[test]
    fn variant_names_parse() {
        assert!(matches!(parse_variant("choice"), Ok(DesignVariant::Choice)));
        assert!(matches!(
            parse_variant("Context_Renewal"),
            Ok(DesignVariant::ContextRenewal)
        ));
        assert!(parse_variant("blocked").is_err());
    }

    #[test]
    fn port_base_accepts_hex_and_decimal() {
        assert_eq!(parse_port_base("0x3ff8").unwrap(), 0x3ff8);
        assert_eq!(parse_port_base("888").unwrap(), 888);
        assert!(parse_port_base("garbage").is_err());
    }
}
