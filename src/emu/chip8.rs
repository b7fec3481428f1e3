use std::path::Path;

use rand::{SeedableRng, rngs::StdRng};

use super::{
    Chip8Error, DISPLAY_X, DISPLAY_Y, Display, FONT, FONT_END_ADDRESS, FONT_START_ADDRESS, Fault,
    Opcode, Quirks,
};
use crate::u4;

// The constants are specified by the CHIP-8 specification
pub const ROM_START_ADDRESS: usize = 0x200;
pub const MEMORY_SIZE: usize = 4096;
pub const MAX_ROM_SIZE: usize = MEMORY_SIZE - ROM_START_ADDRESS;
/// Highest address a jump or call may target, the last full instruction slot.
pub const MAX_JUMP_TARGET: u16 = 0xFFE;
/// Maximum number of nested subroutine calls.
pub const STACK_DEPTH: usize = 16;

/// CHIP-8 virtual machine state
pub struct Chip8 {
    /// 4KB memory array
    pub(crate) memory: [u8; MEMORY_SIZE],
    /// Display buffer: 64x32 monochrome pixels
    pub(crate) display: Display<bool>,

    /// Program counter: address of the next instruction to execute
    pub(crate) pc: u16,
    /// Index register: used for memory operations
    pub(crate) i: u16,
    /// General-purpose registers V0-VF (VF is used as a flag register)
    pub(crate) v: [u8; 16],
    /// Call stack for subroutine returns, never longer than `STACK_DEPTH`
    pub(crate) stack: Vec<u16>,

    /// Delay timer: decrements at 60Hz until it reaches 0
    pub(crate) delay_timer: u8,
    /// Sound timer: decrements at 60Hz, beeps while non-zero
    pub(crate) sound_timer: u8,

    /// Keypad state: 16 keys mapped as booleans (true = pressed)
    pub(crate) keypad: [bool; 16],

    pub(crate) quirks: Quirks,
    /// Source for the Cxnn instruction
    pub(crate) rng: StdRng,
}

/// True for an even address inside the program area where a full
/// instruction fits.
pub fn is_instruction_address(addr: u16) -> bool {
    (ROM_START_ADDRESS as u16..=MAX_JUMP_TARGET).contains(&addr) && addr % 2 == 0
}

/// Reads a ROM image from disk, rejecting empty files.
pub fn read_rom(path: impl AsRef<Path>) -> Result<Vec<u8>, Chip8Error> {
    let path = path.as_ref();

    let rom = std::fs::read(path).map_err(|source| Chip8Error::RomRead {
        path: path.to_path_buf(),
        source,
    })?;
    if rom.is_empty() {
        return Err(Chip8Error::RomEmpty {
            path: path.to_path_buf(),
        });
    }

    Ok(rom)
}

impl Chip8 {
    /// Creates a machine in its reset state with an OS-seeded random source.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Creates a machine whose Cxnn results are reproducible for a given seed.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        let mut chip8 = Chip8 {
            memory: [0; MEMORY_SIZE],
            display: [[false; DISPLAY_X]; DISPLAY_Y],
            pc: ROM_START_ADDRESS as u16,
            i: 0,
            v: [0; 16],
            stack: Vec::with_capacity(STACK_DEPTH),
            delay_timer: 0,
            sound_timer: 0,
            keypad: [false; 16],
            quirks: Quirks::default(),
            rng,
        };
        chip8.reset();
        chip8
    }

    /// Zeroes all machine state, reloads the font and points PC at the ROM start.
    ///
    /// Quirk settings and the random source survive a reset.
    pub fn reset(&mut self) {
        self.memory = [0; MEMORY_SIZE];
        self.memory[FONT_START_ADDRESS..FONT_END_ADDRESS].copy_from_slice(&FONT);
        self.display = [[false; DISPLAY_X]; DISPLAY_Y];
        self.pc = ROM_START_ADDRESS as u16;
        self.i = 0;
        self.v = [0; 16];
        self.stack.clear();
        self.delay_timer = 0;
        self.sound_timer = 0;
        self.keypad = [false; 16];
    }

    /// Resets the machine and copies a ROM to the program area.
    ///
    /// ROMs larger than the program area are truncated. Returns the number of
    /// bytes loaded.
    pub fn load(&mut self, rom: &[u8]) -> usize {
        self.reset();

        let len = rom.len().min(MAX_ROM_SIZE);
        if len < rom.len() {
            log::warn!(
                "ROM is {} bytes, truncated to {} bytes",
                rom.len(),
                MAX_ROM_SIZE
            );
        }

        self.memory[ROM_START_ADDRESS..ROM_START_ADDRESS + len].copy_from_slice(&rom[..len]);
        log::debug!("Loaded {len} byte ROM at {ROM_START_ADDRESS:#05X}");

        len
    }

    /// Resets the machine and loads a ROM from disk.
    ///
    /// On failure the machine is left in its reset state.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<usize, Chip8Error> {
        self.reset();
        let rom = read_rom(path)?;
        Ok(self.load(&rom))
    }

    /// Executes a single CPU cycle (fetch, decode, execute).
    ///
    /// A returned fault has already been handled as a no-op, the machine
    /// remains consistent and the next cycle can run.
    ///
    /// A PC that has run off the program area is never fetched from; the
    /// cycle faults and leaves the machine untouched.
    pub fn cpu_cycle(&mut self) -> Result<(), Fault> {
        if !is_instruction_address(self.pc) {
            return Err(Fault::PcOutOfBounds { pc: self.pc });
        }

        let opcode = self.fetch();
        let decoded_opcode = Opcode::decode(opcode);
        log::trace!("{:#05X}: {opcode:04X} {decoded_opcode:?}", self.pc);
        self.execute(decoded_opcode)
    }

    /// Updates the delay and sound timers. Should be called at 60Hz.
    pub fn timers_cycle(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }

    /// Returns true if the sound timer is greater than zero, indicating a beep should be played.
    pub fn should_beep(&self) -> bool {
        self.sound_timer > 0
    }

    /// Set the state of a key on the keypad.
    pub fn set_key(&mut self, key: u4, pressed: bool) {
        self.keypad[key] = pressed;
    }

    /// Get the state of a pixel on the display (true = on, false = off).
    pub fn get_display_pixel(&self, y: usize, x: usize) -> bool {
        self.display[y][x]
    }

    pub fn display(&self) -> &Display<bool> {
        &self.display
    }

    pub fn set_quirks(&mut self, quirks: Quirks) {
        self.quirks = quirks;
    }

    pub fn quirks(&self) -> Quirks {
        self.quirks
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn i(&self) -> u16 {
        self.i
    }

    pub fn v(&self) -> &[u8; 16] {
        &self.v
    }

    pub fn stack(&self) -> &[u16] {
        &self.stack
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound_timer
    }

    pub fn keypad(&self) -> &[bool; 16] {
        &self.keypad
    }

    pub fn memory(&self) -> &[u8; MEMORY_SIZE] {
        &self.memory
    }

    /// Reads the big-endian instruction word at `addr` without executing it.
    pub fn peek_opcode(&self, addr: u16) -> u16 {
        u16::from_be_bytes([self.mem_read(addr), self.mem_read(addr.wrapping_add(1))])
    }

    /// Fetches the next 16-bit opcode from memory.
    fn fetch(&self) -> u16 {
        self.peek_opcode(self.pc)
    }

    /// Reads memory, wrapping addresses past the end back to the start.
    pub(crate) fn mem_read(&self, addr: u16) -> u8 {
        self.memory[addr as usize % MEMORY_SIZE]
    }

    /// Writes memory, wrapping addresses past the end back to the start.
    pub(crate) fn mem_write(&mut self, addr: u16, value: u8) {
        self.memory[addr as usize % MEMORY_SIZE] = value;
    }
}

impl Default for Chip8 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_machine_is_reset() {
        let chip8 = Chip8::with_seed(0);

        assert_eq!(chip8.pc, 0x200);
        assert_eq!(chip8.i, 0);
        assert!(chip8.stack.is_empty());
        assert_eq!(&chip8.memory[FONT_START_ADDRESS..FONT_END_ADDRESS], &FONT);
        assert!(chip8.memory[ROM_START_ADDRESS..].iter().all(|&b| b == 0));
    }

    #[test]
    fn reset_clears_everything_but_font() {
        let mut chip8 = Chip8::with_seed(0);
        chip8.load(&[0x12, 0x34]);
        chip8.v[3] = 9;
        chip8.i = 0x300;
        chip8.pc = 0x456;
        chip8.stack.push(0x202);
        chip8.delay_timer = 4;
        chip8.sound_timer = 5;
        chip8.keypad[2] = true;
        chip8.display[1][1] = true;
        chip8.memory[0x000] = 0xFF;

        chip8.reset();
        chip8.reset();

        assert_eq!(chip8.pc, 0x200);
        assert_eq!(chip8.i, 0);
        assert_eq!(chip8.v, [0; 16]);
        assert!(chip8.stack.is_empty());
        assert_eq!((chip8.delay_timer, chip8.sound_timer), (0, 0));
        assert_eq!(chip8.keypad, [false; 16]);
        assert!(!chip8.display[1][1]);
        assert_eq!(chip8.memory[0x000], 0);
        assert_eq!(chip8.memory[0x200], 0);
        assert_eq!(&chip8.memory[FONT_START_ADDRESS..FONT_END_ADDRESS], &FONT);
    }

    #[test]
    fn load_truncates_oversized_rom() {
        let mut chip8 = Chip8::with_seed(0);
        let rom = vec![0xAB; MAX_ROM_SIZE + 10];

        assert_eq!(chip8.load(&rom), MAX_ROM_SIZE);
        assert_eq!(chip8.memory[MEMORY_SIZE - 1], 0xAB);
    }

    #[test]
    fn load_resets_previous_program() {
        let mut chip8 = Chip8::with_seed(0);
        chip8.load(&[1, 2, 3, 4]);
        chip8.v[0] = 1;

        chip8.load(&[9]);

        assert_eq!(&chip8.memory[0x200..0x204], &[9, 0, 0, 0]);
        assert_eq!(chip8.v[0], 0);
    }

    #[test]
    fn missing_rom_file_leaves_machine_reset() {
        let mut chip8 = Chip8::with_seed(0);
        chip8.load(&[0x60, 0x01]);
        chip8.pc = 0x300;

        let result = chip8.load_file("this/rom/does/not/exist.ch8");

        assert!(matches!(result, Err(Chip8Error::RomRead { .. })));
        assert_eq!(chip8.pc, 0x200);
        assert_eq!(chip8.memory[0x200], 0);
    }

    #[test]
    fn read_rom_rejects_empty_file() {
        let path =
            std::env::temp_dir().join(format!("chip8-vm-empty-{}.ch8", std::process::id()));
        std::fs::write(&path, b"").unwrap();

        let result = read_rom(&path);
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(result, Err(Chip8Error::RomEmpty { .. })));
    }

    #[test]
    fn falling_off_the_end_of_memory_halts() {
        let mut chip8 = Chip8::with_seed(0);
        let mut rom = vec![0; MAX_ROM_SIZE];
        // 6001 in the last instruction slot
        rom[MAX_ROM_SIZE - 2..].copy_from_slice(&[0x60, 0x01]);
        chip8.load(&rom);
        chip8.pc = 0xFFE;

        chip8.cpu_cycle().unwrap();
        assert_eq!(chip8.pc, 0x1000);
        assert_eq!(chip8.v[0], 1);

        for _ in 0..3 {
            assert_eq!(chip8.cpu_cycle(), Err(Fault::PcOutOfBounds { pc: 0x1000 }));
            assert_eq!(chip8.pc, 0x1000);
        }
    }

    #[test]
    fn misaligned_or_reserved_pc_is_not_fetched() {
        for pc in [0x201, 0x1FE, 0x000] {
            let mut chip8 = Chip8::with_seed(0);
            chip8.load(&[0x60, 0x01, 0x60, 0x02]);
            chip8.pc = pc;

            assert_eq!(chip8.cpu_cycle(), Err(Fault::PcOutOfBounds { pc }));
            assert_eq!(chip8.pc, pc);
            assert_eq!(chip8.v[0], 0);
        }
    }

    #[test]
    fn instruction_addresses_are_even_and_in_program_area() {
        assert!(is_instruction_address(0x200));
        assert!(is_instruction_address(0xFFE));
        assert!(!is_instruction_address(0x1FE));
        assert!(!is_instruction_address(0x201));
        assert!(!is_instruction_address(0xFFF));
        assert!(!is_instruction_address(0x1000));
    }

    #[test]
    fn timers_saturate_at_zero() {
        let mut chip8 = Chip8::with_seed(0);
        chip8.delay_timer = 1;
        chip8.sound_timer = 2;

        chip8.timers_cycle();
        assert_eq!((chip8.delay_timer, chip8.sound_timer), (0, 1));
        assert!(chip8.should_beep());

        chip8.timers_cycle();
        chip8.timers_cycle();
        assert_eq!((chip8.delay_timer, chip8.sound_timer), (0, 0));
        assert!(!chip8.should_beep());
    }

    #[test]
    fn memory_access_wraps() {
        let mut chip8 = Chip8::with_seed(0);
        chip8.mem_write(0x1005, 0x42);

        assert_eq!(chip8.memory[0x005], 0x42);
        assert_eq!(chip8.mem_read(0xF005), 0x42);
    }

    #[test]
    fn fetch_is_big_endian() {
        let mut chip8 = Chip8::with_seed(0);
        chip8.load(&[0xA1, 0x23]);

        assert_eq!(chip8.fetch(), 0xA123);
    }
}
