use super::Quirks;

/// Number of instructions run per 1/60 s slice unless configured otherwise.
pub const DEFAULT_INSTRUCTIONS_PER_TICK: u32 = 11;

/// Runtime configuration for a [`Chip8Runner`](super::Chip8Runner).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Instructions executed per time slice. This only tunes perceived speed,
    /// timers decay at 60Hz regardless.
    pub instructions_per_tick: u32,
    pub quirks: Quirks,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            instructions_per_tick: DEFAULT_INSTRUCTIONS_PER_TICK,
            quirks: Quirks::default(),
        }
    }
}
