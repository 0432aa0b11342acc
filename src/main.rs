use std::fs;
use std::io::{self, IsTerminal as _, Read as _, Write as _};
use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use crossterm::terminal;
use miette::{miette, IntoDiagnostic, Result};

use zedmon::cli::ansi::{Rx, Serial};
use zedmon::monitor::ihx;
use zedmon::{MemBus, Monitor};

/// Z80 machine-code monitor: assemble, disassemble, and poke memory over an
/// in-process bus.
#[derive(Parser)]
#[command(version)]
struct Cli {
    /// Intel HEX image to load before starting
    #[arg(long, value_name = "FILE")]
    load: Option<PathBuf>,

    /// Bus address width in bits; narrower buses wrap
    #[arg(long, default_value_t = 16)]
    width: u8,

    /// Commands to run before reading input, separated by `;`
    #[arg(short, long)]
    command: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if !(1..=16).contains(&cli.width) {
        return Err(miette!("bus width must be between 1 and 16 bits"));
    }

    let mut bus = MemBus::with_width(cli.width);
    if let Some(path) = &cli.load {
        let text = fs::read_to_string(path).into_diagnostic()?;
        if !ihx::load(&mut bus, &text) {
            return Err(miette!("malformed Intel HEX image: {}", path.display()));
        }
        println!("{:>12} image {}", "Loaded".green().bold(), path.display());
    }

    let interactive = io::stdin().is_terminal();
    if interactive {
        println!("~ zedmon v{} - Z80 memory monitor ~", VERSION);
    }

    let _raw = if interactive {
        Some(RawGuard::enable()?)
    } else {
        None
    };
    let serial = StdioSerial::new(cli.command.as_deref());
    Monitor::new(bus, serial).run();

    Ok(())
}

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Puts the terminal in raw mode for the monitor's own line editing, and
/// restores it on drop.
struct RawGuard;

impl RawGuard {
    fn enable() -> Result<Self> {
        terminal::enable_raw_mode().into_diagnostic()?;
        Ok(Self)
    }
}

impl Drop for RawGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        println!();
    }
}

/// Byte stream over stdio, fed first from the `--command` argument.
///
/// Ctrl-C closes the stream so the run loop can exit and restore the
/// terminal.
struct StdioSerial {
    queued: Vec<u8>,
    next: usize,
    stdout: io::Stdout,
}

impl StdioSerial {
    fn new(command: Option<&str>) -> Self {
        let queued = command
            .map(|text| {
                let mut bytes: Vec<u8> = text.trim().bytes().collect();
                for byte in bytes.iter_mut() {
                    if *byte == b';' {
                        *byte = b'\n';
                    }
                }
                bytes.push(b'\n');
                bytes
            })
            .unwrap_or_default();
        Self {
            queued,
            next: 0,
            stdout: io::stdout(),
        }
    }
}

impl Serial for StdioSerial {
    fn read(&mut self) -> Rx {
        if let Some(byte) = self.queued.get(self.next) {
            self.next += 1;
            return Rx::Byte(*byte);
        }
        let _ = self.stdout.flush();
        let mut buf = [0u8; 1];
        match io::stdin().lock().read(&mut buf) {
            Ok(0) | Err(_) => Rx::Closed,
            // Ctrl-C arrives as a plain byte in raw mode
            Ok(_) if buf[0] == 0x03 => Rx::Closed,
            Ok(_) => Rx::Byte(buf[0]),
        }
    }

    fn write(&mut self, byte: u8) {
        let _ = self.stdout.write_all(&[byte]);
    }

    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }
}
