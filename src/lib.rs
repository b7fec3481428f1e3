pub mod debugger;
pub mod emu;
mod nibble;

pub use emu::{Chip8, Chip8Runner, Config, DISPLAY_X, DISPLAY_Y, Display, Quirks};
pub use nibble::{u4, u12};
