use chip8_vm::{
    Chip8, Chip8Runner, Config, DISPLAY_X, DISPLAY_Y, Quirks,
    emu::{Chip8Error, FONT_START_ADDRESS, Fault, TIMER_TIME_STEP},
    u4,
};

/// Assembles big-endian opcode words into ROM bytes.
fn rom(words: &[u16]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_be_bytes()).collect()
}

fn machine(words: &[u16]) -> Chip8 {
    let mut chip8 = Chip8::with_seed(1);
    chip8.load(&rom(words));
    chip8
}

fn run(chip8: &mut Chip8, cycles: usize) {
    for _ in 0..cycles {
        chip8.cpu_cycle().expect("program should not fault");
    }
}

fn lit_pixels(chip8: &Chip8) -> usize {
    chip8.display().iter().flatten().filter(|&&p| p).count()
}

#[test]
fn clear_then_jump_to_self_loops_forever() {
    let mut chip8 = machine(&[0x00E0, 0x1202, 0x0000]);

    run(&mut chip8, 1);
    assert_eq!(chip8.pc(), 0x202);

    for _ in 0..1000 {
        run(&mut chip8, 1);
        assert_eq!(chip8.pc(), 0x202);
        assert!(chip8.stack().is_empty());
    }
    assert_eq!(lit_pixels(&chip8), 0);
}

#[test]
fn clear_and_jump_to_start_oscillates_at_rom_start() {
    let mut chip8 = machine(&[0x00E0, 0x1200]);

    for _ in 0..500 {
        run(&mut chip8, 1);
        assert_eq!(chip8.pc(), 0x202);
        run(&mut chip8, 1);
        assert_eq!(chip8.pc(), 0x200);
    }
    assert!(chip8.stack().is_empty());
    assert_eq!(lit_pixels(&chip8), 0);
}

#[test]
fn register_dump_and_load_round_trip() {
    let mut chip8 = machine(&[
        0x6001, 0x6102, 0x6203, // V0..V2 = 1, 2, 3
        0xA300, // I = 0x300
        0xF255, // dump V0..V2
        0x6000, 0x6100, 0x6200, // clear them
        0xF265, // load V0..V2
    ]);

    run(&mut chip8, 5);
    assert_eq!(&chip8.memory()[0x300..0x304], &[1, 2, 3, 0]);

    run(&mut chip8, 4);
    assert_eq!(&chip8.v()[..3], &[1, 2, 3]);
    assert_eq!(chip8.i(), 0x300);
}

#[test]
fn add_immediate_wraps_and_never_touches_flag() {
    let mut program = vec![0x60FF, 0x6F42];
    program.extend(std::iter::repeat_n(0x7001, 256));
    let mut chip8 = machine(&program);

    run(&mut chip8, 3);
    assert_eq!(chip8.v()[0], 0);
    assert_eq!(chip8.v()[0xF], 0x42);

    run(&mut chip8, 255);
    assert_eq!(chip8.v()[0], 255);
    assert_eq!(chip8.v()[0xF], 0x42);
}

#[test]
fn subroutine_returns_to_instruction_after_call() {
    let mut chip8 = machine(&[
        0x2206, // 200: call 206
        0x6501, // 202: V5 = 1
        0x1204, // 204: spin
        0x6402, // 206: V4 = 2
        0x00EE, // 208: return
    ]);

    run(&mut chip8, 2);
    assert_eq!(chip8.stack(), &[0x202]);

    run(&mut chip8, 1);
    assert_eq!(chip8.pc(), 0x202);
    assert!(chip8.stack().is_empty());

    run(&mut chip8, 3);
    assert_eq!(chip8.v()[4], 2);
    assert_eq!(chip8.v()[5], 1);
    assert_eq!(chip8.pc(), 0x204);
}

#[test]
fn runaway_recursion_is_capped_without_corrupting_the_stack() {
    // 200: call 200, forever
    let mut runner = Chip8Runner::with_config(
        Chip8::with_seed(1),
        Config {
            instructions_per_tick: 17,
            quirks: Quirks::default(),
        },
    );
    runner.load(&rom(&[0x2200]));

    // 16 calls fill the stack, the 17th is skipped
    runner.tick();

    let chip8 = runner.chip8_ref();
    assert_eq!(chip8.pc(), 0x202);
    assert_eq!(runner.fault_count(), 1);
    assert_eq!(chip8.stack().len(), 16);
    assert!(chip8.stack().iter().all(|&ret| ret == 0x202));
    assert_eq!(
        runner.last_fault(),
        Some(&Fault::StackOverflow {
            target: 0x200,
            depth: 16
        })
    );
}

#[test]
fn running_past_the_last_instruction_halts_with_a_fault() {
    let mut program = vec![0u8; 0x1000 - 0x200];
    program[..2].copy_from_slice(&[0x1F, 0xFE]); // 200: jump FFE
    program[0xDFE..].copy_from_slice(&[0x60, 0x01]); // FFE: V0 = 1
    let mut runner = Chip8Runner::new(Chip8::with_seed(1));
    runner.load(&program);

    runner.tick();

    let chip8 = runner.chip8_ref();
    assert_eq!(chip8.v()[0], 1);
    assert_eq!(chip8.pc(), 0x1000);
    assert_eq!(runner.last_fault(), Some(&Fault::PcOutOfBounds { pc: 0x1000 }));
    // One report per halted cycle, nothing else executed
    assert_eq!(runner.fault_count(), 11 - 2);
}

#[test]
fn computed_jump_to_odd_address_is_rejected() {
    // V0 = 1, jump V0 + 300, V1 = 2
    let mut chip8 = machine(&[0x6001, 0xB300, 0x6102]);

    run(&mut chip8, 1);
    assert_eq!(
        chip8.cpu_cycle(),
        Err(Fault::InvalidJump { target: 0x301 })
    );
    assert_eq!(chip8.pc(), 0x204);

    run(&mut chip8, 1);
    assert_eq!(chip8.v()[1], 2);
}

#[test]
fn drawing_a_glyph_twice_erases_it_and_reports_collision() {
    let mut chip8 = machine(&[
        0x6A05, // VA = 5
        0xFA29, // I = glyph 5
        0x6000, 0x6100, // V0, V1 = 0
        0xD015, // draw
        0xD015, // draw again
    ]);

    run(&mut chip8, 5);
    assert_eq!(chip8.i() as usize, FONT_START_ADDRESS + 5 * 5);
    assert_eq!(chip8.v()[0xF], 0);
    // F0 80 F0 10 F0
    assert_eq!(lit_pixels(&chip8), 4 + 1 + 4 + 1 + 4);

    run(&mut chip8, 1);
    assert_eq!(chip8.v()[0xF], 1);
    assert_eq!(lit_pixels(&chip8), 0);
}

#[test]
fn framebuffer_is_64_by_32() {
    let chip8 = Chip8::with_seed(1);

    assert_eq!(chip8.display().len(), DISPLAY_Y);
    assert_eq!(chip8.display()[0].len(), DISPLAY_X);
    assert_eq!((DISPLAY_X, DISPLAY_Y), (64, 32));
}

#[test]
fn delay_timer_decays_once_per_sixtieth_regardless_of_instruction_rate() {
    for instructions_per_tick in [0, 11, 700] {
        let mut runner = Chip8Runner::with_config(
            Chip8::with_seed(1),
            Config {
                instructions_per_tick,
                quirks: Quirks::default(),
            },
        );
        // VA = 60, delay = VA, spin
        runner.load(&rom(&[0x6A3C, 0xFA15, 0x1204]));
        runner.step().unwrap();
        runner.step().unwrap();

        runner.update(TIMER_TIME_STEP);

        assert_eq!(runner.chip8_ref().delay_timer(), 59);
    }
}

#[test]
fn key_wait_blocks_until_a_key_is_pressed() {
    let mut runner = Chip8Runner::new(Chip8::with_seed(1));
    // V3 = key, spin
    runner.load(&rom(&[0xF30A, 0x1202]));

    for _ in 0..5 {
        runner.tick();
        assert_eq!(runner.chip8_ref().pc(), 0x200);
    }

    runner.set_key(u4::new(0xB), true);
    runner.tick();

    assert_eq!(runner.chip8_ref().v()[3], 0xB);
    assert_eq!(runner.chip8_ref().pc(), 0x202);
    assert_eq!(runner.fault_count(), 0);
}

#[test]
fn sound_timer_drives_beep() {
    let mut runner = Chip8Runner::new(Chip8::with_seed(1));
    // V0 = 2, sound = V0, spin
    runner.load(&rom(&[0x6002, 0xF018, 0x1204]));
    runner.step().unwrap();
    runner.step().unwrap();
    assert!(runner.should_beep());

    runner.update(TIMER_TIME_STEP);
    assert!(runner.should_beep());

    runner.update(TIMER_TIME_STEP);
    assert!(!runner.should_beep());
}

#[test]
fn rom_files_load_and_failures_leave_a_reset_machine() {
    let dir = std::env::temp_dir();
    let good = dir.join(format!("chip8-vm-test-{}.ch8", std::process::id()));
    let empty = dir.join(format!("chip8-vm-test-{}-empty.ch8", std::process::id()));
    std::fs::write(&good, rom(&[0x6007, 0x1202])).unwrap();
    std::fs::write(&empty, b"").unwrap();

    let mut chip8 = Chip8::with_seed(1);
    assert_eq!(chip8.load_file(&good).unwrap(), 4);
    run(&mut chip8, 1);
    assert_eq!(chip8.v()[0], 7);

    let err = chip8.load_file(&empty).unwrap_err();
    assert!(matches!(err, Chip8Error::RomEmpty { .. }));
    assert_eq!(chip8.v()[0], 0);
    assert_eq!(chip8.pc(), 0x200);
    assert_eq!(chip8.memory()[0x200], 0);

    std::fs::remove_file(good).unwrap();
    std::fs::remove_file(empty).unwrap();
}
