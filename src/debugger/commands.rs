use clap::{Parser, Subcommand};
use clap_num::maybe_hex;

use crate::{emu::Fault, emu::Opcode, u4};

#[derive(Parser)]
#[command(multicall = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run until paused or a breakpoint is hit
    #[command(visible_alias = "r")]
    Run,

    #[command(visible_alias = "p")]
    Pause,

    /// Execute instructions one at a time
    #[command(visible_alias = "s")]
    Step {
        #[arg(default_value = "1", value_parser = maybe_hex::<u16>)]
        count: u16,
    },

    #[command(visible_alias = "b")]
    Breakpoint {
        #[command(subcommand)]
        action: BreakpointAction,
    },

    /// Overwrite a register, the index, the PC or a timer
    Set {
        #[arg(value_parser = parse_set_target)]
        target: SetTarget,
        #[arg(value_parser = maybe_hex::<u16>)]
        value: u16,
    },

    /// Hex dump of memory
    #[command(visible_alias = "m")]
    Mem {
        #[arg(default_value = "0x200", value_parser = maybe_hex::<u16>)]
        start: u16,
        #[arg(default_value = "32", value_parser = maybe_hex::<u16>)]
        len: u16,
    },

    /// Decode instructions from memory
    #[command(visible_alias = "d")]
    Disasm {
        #[arg(default_value = "0x200", value_parser = maybe_hex::<u16>)]
        start: u16,
        #[arg(default_value = "16", value_parser = maybe_hex::<u16>)]
        len: u16,
    },

    /// Reload the ROM into a freshly reset machine
    Reset,

    #[command(visible_alias = "q")]
    Quit,
}

#[derive(Debug, PartialEq, Eq)]
pub enum CommandResult {
    Ok,
    Breakpoints(Vec<u16>),
    MemDump {
        offset: u16,
        data: Vec<u8>,
    },
    Disasm {
        offset: u16,
        instructions: Vec<(u16, Opcode)>,
    },
    Quit,
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{0}")]
    Fault(#[from] Fault),
    #[error("Value {value:#X} out of range for {target}")]
    ValueOutOfRange { target: SetTarget, value: u16 },
}

#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
pub enum BreakpointAction {
    #[command(visible_alias = "s")]
    Set {
        #[arg(value_parser = maybe_hex::<u16>)]
        addr: u16,
    },

    #[command(visible_alias = "c")]
    Clear {
        #[arg(value_parser = maybe_hex::<u16>)]
        addr: u16,
    },

    #[command(visible_alias = "l")]
    List,

    #[command(visible_alias = "ca")]
    ClearAll,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetTarget {
    V(u4),
    I,
    Pc,
    DelayTimer,
    SoundTimer,
}

impl std::fmt::Display for SetTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SetTarget::V(reg) => write!(f, "V{:X}", reg.get()),
            SetTarget::I => write!(f, "I"),
            SetTarget::Pc => write!(f, "PC"),
            SetTarget::DelayTimer => write!(f, "DT"),
            SetTarget::SoundTimer => write!(f, "ST"),
        }
    }
}

fn parse_set_target(s: &str) -> Result<SetTarget, String> {
    let lower = s.to_lowercase();

    match lower.as_str() {
        "index" | "i" => Ok(SetTarget::I),
        "pc" => Ok(SetTarget::Pc),
        "dt" | "delay" => Ok(SetTarget::DelayTimer),
        "st" | "sound" => Ok(SetTarget::SoundTimer),

        _ if lower.starts_with('v') => {
            let hex_str = &lower[1..];
            match u8::from_str_radix(hex_str, 16) {
                Ok(val) if val < 16 => Ok(SetTarget::V(u4::new(val))),
                _ => Err(format!("Invalid register: '{}'", s)),
            }
        }

        _ => Err(format!("Unknown set target: '{}'", s)),
    }
}
