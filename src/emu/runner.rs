use std::collections::HashSet;

use super::{Chip8, Config, Fault};
use crate::u4;

/// Instruction slices per second; each slice runs `Config::instructions_per_tick` steps.
pub const TICK_HZ: f32 = 60.0;
pub const TIMER_HZ: f32 = 60.0;

pub const TICK_TIME_STEP: f32 = 1.0 / TICK_HZ;
pub const TIMER_TIME_STEP: f32 = 1.0 / TIMER_HZ;

/// Longest stretch of time a single update catches up on. Anything beyond it
/// (a stalled host, a debugger pause) is dropped.
pub const MAX_UPDATE_DT: f32 = 0.25;

/// High-level emulator runner that manages timing internally.
///
/// Instruction slices and timer decrements are driven by separate
/// accumulators, so the timers always decay at 60Hz no matter how many
/// instructions run per slice.
pub struct Chip8Runner {
    chip8: Chip8,
    config: Config,
    tick_dt_accumulator: f32,
    timer_dt_accumulator: f32,
    last_fault: Option<Fault>,
    fault_count: u64,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Chip8RunnerResult {
    HitBreakpoint,
    Ok,
}

impl Chip8Runner {
    pub fn new(chip8: Chip8) -> Self {
        Self::with_config(chip8, Config::default())
    }

    pub fn with_config(mut chip8: Chip8, config: Config) -> Self {
        chip8.set_quirks(config.quirks);

        Self {
            chip8,
            config,
            tick_dt_accumulator: 0.0,
            timer_dt_accumulator: 0.0,
            last_fault: None,
            fault_count: 0,
        }
    }

    /// Update emulator by delta time (in seconds), handles both CPU and timer cycles.
    ///
    /// Runs as many instruction slices and timer updates as fit in the elapsed time `dt`.
    pub fn update(&mut self, dt: f32) -> Chip8RunnerResult {
        self.update_with_breakpoints(dt, None)
    }

    /// Like `update` but checks for breakpoints after each CPU cycle.
    ///
    /// On a breakpoint the rest of the slice is dropped and pending slice
    /// time is cleared so resuming doesn't "catch up".
    pub fn update_with_breakpoints(
        &mut self,
        dt: f32,
        breakpoints: Option<&HashSet<u16>>,
    ) -> Chip8RunnerResult {
        let dt = dt.min(MAX_UPDATE_DT);
        self.tick_dt_accumulator += dt;
        self.timer_dt_accumulator += dt;

        while self.timer_dt_accumulator >= TIMER_TIME_STEP {
            self.timer_dt_accumulator -= TIMER_TIME_STEP;
            self.chip8.timers_cycle();
        }

        while self.tick_dt_accumulator >= TICK_TIME_STEP {
            self.tick_dt_accumulator -= TICK_TIME_STEP;

            if self.run_slice(breakpoints) == Chip8RunnerResult::HitBreakpoint {
                self.tick_dt_accumulator = 0.0;
                return Chip8RunnerResult::HitBreakpoint;
            }
        }

        Chip8RunnerResult::Ok
    }

    /// Runs exactly one slice of instructions without touching the timers.
    pub fn tick(&mut self) {
        self.run_slice(None);
    }

    /// Runs a single instruction, reporting any fault like a normal slice does.
    pub fn step(&mut self) -> Result<(), Fault> {
        let result = self.chip8.cpu_cycle();
        if let Err(fault) = &result {
            self.report(fault.clone());
        }
        result
    }

    fn run_slice(&mut self, breakpoints: Option<&HashSet<u16>>) -> Chip8RunnerResult {
        for _ in 0..self.config.instructions_per_tick {
            // Faults are non-fatal, the machine keeps running
            let _ = self.step();

            if let Some(breakpoints) = breakpoints
                && breakpoints.contains(&self.chip8.pc)
            {
                return Chip8RunnerResult::HitBreakpoint;
            }
        }

        Chip8RunnerResult::Ok
    }

    fn report(&mut self, fault: Fault) {
        log::warn!("{fault}");
        self.fault_count += 1;
        self.last_fault = Some(fault);
    }

    /// Resets the machine and loads a new ROM, clearing pending time and faults.
    pub fn load(&mut self, rom: &[u8]) -> usize {
        self.tick_dt_accumulator = 0.0;
        self.timer_dt_accumulator = 0.0;
        self.last_fault = None;
        self.fault_count = 0;
        self.chip8.load(rom)
    }

    /// Returns true if the sound timer is active, indicating a beep should be played.
    pub fn should_beep(&self) -> bool {
        self.chip8.should_beep()
    }

    /// Set the state of a key on the keypad.
    pub fn set_key(&mut self, key: u4, pressed: bool) {
        self.chip8.set_key(key, pressed)
    }

    /// Get the state of a pixel on the display (true = on, false = off).
    pub fn get_display_pixel(&self, y: usize, x: usize) -> bool {
        self.chip8.get_display_pixel(y, x)
    }

    /// The most recent fault, if any occurred since the last load.
    pub fn last_fault(&self) -> Option<&Fault> {
        self.last_fault.as_ref()
    }

    pub fn fault_count(&self) -> u64 {
        self.fault_count
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn chip8_ref(&self) -> &Chip8 {
        &self.chip8
    }

    pub fn chip8_mut(&mut self) -> &mut Chip8 {
        &mut self.chip8
    }
}
