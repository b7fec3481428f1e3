use std::collections::HashSet;

use super::commands::{BreakpointAction, Command, CommandError, CommandResult, SetTarget};
use crate::emu::{
    Chip8Runner, Chip8RunnerResult, Fault, MEMORY_SIZE, Opcode, is_instruction_address,
};

/// Drives a [`Chip8Runner`] on behalf of the interactive debugger.
pub struct Executor {
    is_running: bool,
    runner: Chip8Runner,
    rom: Vec<u8>,
    breakpoints: HashSet<u16>,
}

impl Executor {
    /// Takes ownership of the runner and loads `rom` into it. The ROM is kept
    /// around so `reset` can reload it.
    pub fn new(mut runner: Chip8Runner, rom: Vec<u8>) -> Self {
        runner.load(&rom);

        Self {
            is_running: false,
            runner,
            rom,
            breakpoints: HashSet::new(),
        }
    }

    /// Advances the machine while in running mode. Pauses on a breakpoint.
    pub fn poll(&mut self, dt: f32) -> Chip8RunnerResult {
        if !self.is_running {
            return Chip8RunnerResult::Ok;
        }

        let result = self
            .runner
            .update_with_breakpoints(dt, Some(&self.breakpoints));

        if result == Chip8RunnerResult::HitBreakpoint {
            self.is_running = false;
        }

        result
    }

    pub fn execute(&mut self, command: Command) -> Result<CommandResult, CommandError> {
        match command {
            Command::Run => {
                self.run();
                Ok(CommandResult::Ok)
            }
            Command::Pause => {
                self.pause();
                Ok(CommandResult::Ok)
            }
            Command::Step { count } => self.step(count),
            Command::Breakpoint { action } => Ok(self.handle_breakpoint(action)),
            Command::Set { target, value } => self.handle_set(target, value),
            Command::Mem { start, len } => Ok(self.mem_dump(start, len)),
            Command::Disasm { start, len } => Ok(self.disasm(start, len)),
            Command::Reset => {
                self.is_running = false;
                self.runner.load(&self.rom);
                Ok(CommandResult::Ok)
            }
            Command::Quit => Ok(CommandResult::Quit),
        }
    }

    pub fn run(&mut self) {
        self.is_running = true;
    }

    pub fn pause(&mut self) {
        self.is_running = false;
    }

    /// Executes `count` instructions, stopping at the first fault.
    pub fn step(&mut self, count: u16) -> Result<CommandResult, CommandError> {
        for _ in 0..count {
            self.runner.step()?;
        }
        Ok(CommandResult::Ok)
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn last_fault(&self) -> Option<&Fault> {
        self.runner.last_fault()
    }

    pub fn runner(&self) -> &Chip8Runner {
        &self.runner
    }

    pub fn runner_mut(&mut self) -> &mut Chip8Runner {
        &mut self.runner
    }

    fn handle_breakpoint(&mut self, action: BreakpointAction) -> CommandResult {
        match action {
            BreakpointAction::Set { addr } => {
                self.breakpoints.insert(addr);
            }
            BreakpointAction::Clear { addr } => {
                self.breakpoints.remove(&addr);
            }
            BreakpointAction::ClearAll => {
                self.breakpoints.clear();
            }
            BreakpointAction::List => {
                let mut bps: Vec<u16> = self.breakpoints.iter().copied().collect();
                bps.sort();
                return CommandResult::Breakpoints(bps);
            }
        };

        CommandResult::Ok
    }

    fn handle_set(&mut self, target: SetTarget, value: u16) -> Result<CommandResult, CommandError> {
        let out_of_range = CommandError::ValueOutOfRange { target, value };
        let chip8 = self.runner.chip8_mut();

        match target {
            SetTarget::V(reg) => {
                chip8.v[reg] = u8::try_from(value).map_err(|_| out_of_range)?;
            }
            SetTarget::I => {
                chip8.i = value;
            }
            SetTarget::Pc => {
                if !is_instruction_address(value) {
                    return Err(out_of_range);
                }
                chip8.pc = value;
            }
            SetTarget::DelayTimer => {
                chip8.delay_timer = u8::try_from(value).map_err(|_| out_of_range)?;
            }
            SetTarget::SoundTimer => {
                chip8.sound_timer = u8::try_from(value).map_err(|_| out_of_range)?;
            }
        }

        Ok(CommandResult::Ok)
    }

    fn mem_dump(&self, start: u16, len: u16) -> CommandResult {
        let memory = self.runner.chip8_ref().memory();
        let data = (0..len)
            .map(|offset| memory[(start as usize + offset as usize) % MEMORY_SIZE])
            .collect();

        CommandResult::MemDump {
            offset: start,
            data,
        }
    }

    fn disasm(&self, start: u16, len: u16) -> CommandResult {
        let chip8 = self.runner.chip8_ref();
        let instructions = (0..len)
            .map(|n| {
                let raw = chip8.peek_opcode(start.wrapping_add(n.wrapping_mul(2)));
                (raw, Opcode::decode(raw))
            })
            .collect();

        CommandResult::Disasm {
            offset: start,
            instructions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{emu::Chip8, u4, u12};

    fn executor(rom: &[u8]) -> Executor {
        Executor::new(Chip8Runner::new(Chip8::with_seed(0)), rom.to_vec())
    }

    #[test]
    fn step_runs_requested_instruction_count() {
        let mut exec = executor(&[0x60, 0x05, 0x61, 0x06, 0x62, 0x07]);

        exec.execute(Command::Step { count: 2 }).unwrap();

        let chip8 = exec.runner().chip8_ref();
        assert_eq!(chip8.pc(), 0x204);
        assert_eq!(&chip8.v()[..3], &[5, 6, 0]);
    }

    #[test]
    fn step_surfaces_faults() {
        let mut exec = executor(&[0x00, 0xEE]);

        let err = exec.execute(Command::Step { count: 1 }).unwrap_err();

        assert!(matches!(
            err,
            CommandError::Fault(Fault::StackUnderflow { address: 0x200 })
        ));
        assert_eq!(exec.last_fault(), Some(&Fault::StackUnderflow { address: 0x200 }));
    }

    #[test]
    fn breakpoints_pause_running_executor() {
        // 7001 / 1200: count V0 up forever
        let mut exec = executor(&[0x70, 0x01, 0x12, 0x00]);
        exec.execute(Command::Breakpoint {
            action: BreakpointAction::Set { addr: 0x202 },
        })
        .unwrap();
        exec.execute(Command::Run).unwrap();

        let result = exec.poll(1.0 / 60.0);

        assert_eq!(result, Chip8RunnerResult::HitBreakpoint);
        assert!(!exec.is_running());
        assert_eq!(exec.runner().chip8_ref().pc(), 0x202);
    }

    #[test]
    fn paused_executor_does_not_advance() {
        let mut exec = executor(&[0x70, 0x01, 0x12, 0x00]);

        exec.poll(1.0);

        assert_eq!(exec.runner().chip8_ref().pc(), 0x200);
    }

    #[test]
    fn lists_breakpoints_sorted() {
        let mut exec = executor(&[]);
        for addr in [0x300, 0x204, 0x250] {
            exec.execute(Command::Breakpoint {
                action: BreakpointAction::Set { addr },
            })
            .unwrap();
        }
        exec.execute(Command::Breakpoint {
            action: BreakpointAction::Clear { addr: 0x250 },
        })
        .unwrap();

        let result = exec
            .execute(Command::Breakpoint {
                action: BreakpointAction::List,
            })
            .unwrap();

        assert_eq!(result, CommandResult::Breakpoints(vec![0x204, 0x300]));
    }

    #[test]
    fn set_validates_widths() {
        let mut exec = executor(&[]);

        exec.execute(Command::Set {
            target: SetTarget::V(u4::new(3)),
            value: 0xAB,
        })
        .unwrap();
        assert_eq!(exec.runner().chip8_ref().v()[3], 0xAB);

        let err = exec
            .execute(Command::Set {
                target: SetTarget::V(u4::new(3)),
                value: 0x100,
            })
            .unwrap_err();
        assert!(matches!(err, CommandError::ValueOutOfRange { .. }));

        for pc in [0x1000, 0x201, 0x100] {
            assert!(
                exec.execute(Command::Set {
                    target: SetTarget::Pc,
                    value: pc,
                })
                .is_err()
            );
        }
        exec.execute(Command::Set {
            target: SetTarget::Pc,
            value: 0xFFE,
        })
        .unwrap();
        assert_eq!(exec.runner().chip8_ref().pc(), 0xFFE);
    }

    #[test]
    fn mem_and_disasm_read_loaded_program() {
        let mut exec = executor(&[0x00, 0xE0, 0x12, 0x00]);

        let dump = exec
            .execute(Command::Mem {
                start: 0x200,
                len: 4,
            })
            .unwrap();
        assert_eq!(
            dump,
            CommandResult::MemDump {
                offset: 0x200,
                data: vec![0x00, 0xE0, 0x12, 0x00]
            }
        );

        let disasm = exec
            .execute(Command::Disasm {
                start: 0x200,
                len: 2,
            })
            .unwrap();
        assert_eq!(
            disasm,
            CommandResult::Disasm {
                offset: 0x200,
                instructions: vec![
                    (0x00E0, Opcode::ClearDisplay),
                    (
                        0x1200,
                        Opcode::Jump {
                            nnn: u12::new(0x200)
                        }
                    ),
                ]
            }
        );
    }

    #[test]
    fn reset_reloads_rom() {
        let mut exec = executor(&[0x60, 0x05]);
        exec.execute(Command::Step { count: 1 }).unwrap();
        exec.execute(Command::Run).unwrap();

        exec.execute(Command::Reset).unwrap();

        let chip8 = exec.runner().chip8_ref();
        assert!(!exec.is_running());
        assert_eq!(chip8.pc(), 0x200);
        assert_eq!(chip8.v()[0], 0);
        assert_eq!(chip8.memory()[0x200], 0x60);
    }
}
