use std::path::PathBuf;

/// Non-fatal conditions raised while executing an instruction.
///
/// By the time a fault is returned its effect on the machine has already been
/// applied (the instruction was a no-op, the call was skipped, or the PC was
/// left pointing at the next instruction), so execution can simply continue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Fault {
    #[error("Unknown opcode {opcode:#06X} at {address:#05X}")]
    UnknownOpcode { opcode: u16, address: u16 },

    #[error("Stack overflow: call to {target:#05X} skipped, {depth} return addresses already stacked")]
    StackOverflow { target: u16, depth: usize },

    #[error("Stack underflow: return with empty call stack at {address:#05X}")]
    StackUnderflow { address: u16 },

    #[error("Jump target {target:#06X} is not an instruction address in program memory, ignored")]
    InvalidJump { target: u16 },

    #[error("Program counter {pc:#06X} left program memory, execution halted")]
    PcOutOfBounds { pc: u16 },
}

/// Errors raised while loading a ROM into the machine.
#[derive(Debug, thiserror::Error)]
pub enum Chip8Error {
    #[error("Failed to read ROM {path:?}")]
    RomRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ROM {path:?} is empty")]
    RomEmpty { path: PathBuf },
}

pub const DISPLAY_X: usize = 64;
pub const DISPLAY_Y: usize = 32;
/// A type alias for the CHIP-8 display buffer representation, indexed `[y][x]`.
pub type Display<T> = [[T; DISPLAY_X]; DISPLAY_Y];
