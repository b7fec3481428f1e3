mod chip8;
mod config;
mod execute;
mod font;
mod opcode;
mod quirks;
mod runner;
mod types;

pub use chip8::*;
pub use config::*;
pub use font::*;
pub use opcode::*;
pub use quirks::*;
pub use runner::*;
pub use types::*;
