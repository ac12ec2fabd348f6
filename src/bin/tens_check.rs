//! TENS hookup check.
//!
//! Drives a steady pulse train on the output port so the experimenter can
//! verify electrode placement and sensation level before a session. Stops
//! after the configured duration or as soon as a line arrives on stdin.

use std::sync::mpsc::{self, TryRecvError};
use std::thread;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use painrig::consts::TENS_TRIG;
use painrig::logging::{self, LogConfig};
use painrig::session::{Clock, PatternKind, PulsePattern, PulseScheduler};
use painrig::{HardwarePort, NullPort, OutputPort, SystemClock};

#[derive(Parser)]
#[command(name = "tens_check")]
#[command(version, about = "Pulse the TENS trigger line for a hookup check", long_about = None)]
struct Cli {
    /// Parallel port base address, e.g. 0x3ff8 (omit for a dry run)
    #[arg(long, env = "PAINRIG_PORT_BASE")]
    port_base: Option<String>,

    /// How long to pulse, in seconds
    #[arg(long, default_value_t = 300.0)]
    duration: f64,

    /// Pattern to play: check (0.1 s on/off), pause, constant
    #[arg(long, default_value = "check")]
    pattern: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Steady 0.1 s on / 0.1 s off train across the 1 s cycle.
fn check_pattern() -> PulsePattern {
    let steps = (0..10)
        .map(|i| {
            let value = if i % 2 == 0 { TENS_TRIG } else { 0 };
            (f64::from(i) * 0.1, value)
        })
        .collect();
    PulsePattern::new("check", steps)
}

fn parse_pattern(s: &str) -> Result<PulsePattern, Box<dyn std::error::Error>> {
    match s.to_lowercase().as_str() {
        "check" => Ok(check_pattern()),
        "pause" => Ok(PulsePattern::of(PatternKind::Pause)),
        "constant" => Ok(PulsePattern::of(PatternKind::Constant)),
        _ => Err(format!("Unknown pattern '{s}'. Use: check, pause, constant").into()),
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

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let _log_guard = logging::init_logging(&LogConfig {
        level: cli.log_level.clone(),
        ..Default::default()
    })?;

    let pattern = parse_pattern(&cli.pattern)?;
    let mut port: Box<dyn OutputPort> = match cli.port_base {
        Some(ref addr) => Box::new(HardwarePort::open(parse_port_base(addr)?)?),
        None => {
            warn!("no port configured, writes go nowhere");
            Box::new(NullPort)
        }
    };

    // Stdin lines stop the train early; read on a thread so the pulse loop
    // never blocks.
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_ok() {
            let _ = tx.send(());
        }
    });

    info!(
        pattern = pattern.name(),
        duration = cli.duration,
        "pulsing; press enter to stop"
    );

    let clock = SystemClock::new();
    let mut scheduler = PulseScheduler::new(pattern);
    while clock.now() < cli.duration {
        match rx.try_recv() {
            Ok(()) => break,
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => break,
        }
        scheduler.drive(&mut *port, clock.now());
        thread::sleep(Duration::from_millis(2));
    }

    port.write(0);
    info!("check finished, port zeroed");
    Ok(())
}
