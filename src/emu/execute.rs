use rand::Rng;

use super::{
    Chip8, DISPLAY_X, DISPLAY_Y, Fault, Opcode, OpcodeALU, STACK_DEPTH, glyph_address,
    is_instruction_address,
};
use crate::u4;

impl Chip8 {
    pub(crate) fn execute(&mut self, opcode: Opcode) -> Result<(), Fault> {
        let address = self.pc;
        self.pc = self.pc.wrapping_add(2);

        match opcode {
            Opcode::ClearDisplay => {
                self.display = [[false; DISPLAY_X]; DISPLAY_Y];
            }
            Opcode::Jump { nnn } => {
                self.pc = check_jump_target(nnn.into())?;
            }
            Opcode::JumpWithOffset { nnn } => {
                let target = u16::from(nnn) + u16::from(self.v[0]);
                self.pc = check_jump_target(target)?;
            }
            Opcode::Call { nnn } => {
                let target = check_jump_target(nnn.into())?;
                if self.stack.len() >= STACK_DEPTH {
                    return Err(Fault::StackOverflow {
                        target,
                        depth: self.stack.len(),
                    });
                }
                self.stack.push(self.pc);
                self.pc = target;
            }
            Opcode::Return => {
                self.pc = self.stack.pop().ok_or(Fault::StackUnderflow { address })?;
            }
            Opcode::SkipRegEqualImm { x, nn } => {
                self.skip_if(self.v[x] == nn);
            }
            Opcode::SkipRegNotEqualImm { x, nn } => {
                self.skip_if(self.v[x] != nn);
            }
            Opcode::SkipRegEqualReg { x, y } => {
                self.skip_if(self.v[x] == self.v[y]);
            }
            Opcode::SkipRegNotEqualReg { x, y } => {
                self.skip_if(self.v[x] != self.v[y]);
            }
            Opcode::SetRegImm { x, nn } => {
                self.v[x] = nn;
            }
            Opcode::AddRegImm { x, nn } => {
                self.v[x] = self.v[x].wrapping_add(nn);
            }
            Opcode::ALU { x, y, op } => {
                self.execute_alu(x, y, op);
            }
            Opcode::Random { x, nn } => {
                let rand_byte: u8 = self.rng.random();
                self.v[x] = rand_byte & nn;
            }
            Opcode::SetIndexImm { nnn } => {
                self.i = nnn.into();
            }
            Opcode::AddIndexReg { x } => {
                self.i = self.i.wrapping_add(self.v[x].into());
            }
            Opcode::Draw { x, y, n } => {
                self.execute_draw(x, y, n);
            }
            Opcode::SkipIfPressed { x } => {
                self.skip_if(self.keypad[u4::from_low_bits(self.v[x])]);
            }
            Opcode::SkipIfNotPressed { x } => {
                self.skip_if(!self.keypad[u4::from_low_bits(self.v[x])]);
            }
            Opcode::WaitForKey { x } => {
                self.execute_wait_for_key(x);
            }
            Opcode::ReadDelayTimer { x } => {
                self.v[x] = self.delay_timer;
            }
            Opcode::SetDelayTimer { x } => {
                self.delay_timer = self.v[x];
            }
            Opcode::SetSoundTimer { x } => {
                self.sound_timer = self.v[x];
            }
            Opcode::FontChar { x } => {
                self.i = glyph_address(self.v[x]);
            }
            Opcode::BCD { x } => {
                let value = self.v[x];
                self.mem_write(self.i, value / 100);
                self.mem_write(self.i.wrapping_add(1), (value / 10) % 10);
                self.mem_write(self.i.wrapping_add(2), value % 10);
            }
            Opcode::StoreRegs { x } => {
                for reg_index in 0..=usize::from(x) {
                    self.mem_write(self.i.wrapping_add(reg_index as u16), self.v[reg_index]);
                }
                self.advance_index_after_transfer(x);
            }
            Opcode::LoadRegs { x } => {
                for reg_index in 0..=usize::from(x) {
                    self.v[reg_index] = self.mem_read(self.i.wrapping_add(reg_index as u16));
                }
                self.advance_index_after_transfer(x);
            }
            Opcode::Unknown(opcode) => {
                return Err(Fault::UnknownOpcode { opcode, address });
            }
        };

        Ok(())
    }

    fn skip_if(&mut self, condition: bool) {
        if condition {
            self.pc = self.pc.wrapping_add(2);
        }
    }

    /// Flag-producing operations read both operands first and write VF last,
    /// so VF as an operand never sees its own flag.
    fn execute_alu(&mut self, x: u4, y: u4, op: OpcodeALU) {
        let vx = self.v[x];
        let vy = self.v[y];

        match op {
            OpcodeALU::Set => self.v[x] = vy,
            OpcodeALU::Or => {
                self.v[x] = vx | vy;
                self.reset_flag_after_logic();
            }
            OpcodeALU::And => {
                self.v[x] = vx & vy;
                self.reset_flag_after_logic();
            }
            OpcodeALU::Xor => {
                self.v[x] = vx ^ vy;
                self.reset_flag_after_logic();
            }
            OpcodeALU::Add => {
                let (res, carry) = vx.overflowing_add(vy);
                self.v[x] = res;
                self.v[0xF] = u8::from(carry);
            }
            OpcodeALU::Sub => {
                let (res, borrow) = vx.overflowing_sub(vy);
                self.v[x] = res;
                self.v[0xF] = u8::from(!borrow);
            }
            OpcodeALU::SubReverse => {
                let (res, borrow) = vy.overflowing_sub(vx);
                self.v[x] = res;
                self.v[0xF] = u8::from(!borrow);
            }
            OpcodeALU::ShiftRight => {
                let source = if self.quirks.shift_uses_vy { vy } else { vx };
                self.v[x] = source >> 1;
                self.v[0xF] = source & 1;
            }
            OpcodeALU::ShiftLeft => {
                let source = if self.quirks.shift_uses_vy { vy } else { vx };
                self.v[x] = source << 1;
                self.v[0xF] = source >> 7;
            }
        }
    }

    fn reset_flag_after_logic(&mut self) {
        if self.quirks.logic_resets_vf {
            self.v[0xF] = 0;
        }
    }

    fn execute_draw(&mut self, x: u4, y: u4, n: u4) {
        let x_pos = self.v[x] as usize % DISPLAY_X;
        let y_pos = self.v[y] as usize % DISPLAY_Y;
        let clip = self.quirks.clip_sprites;

        let mut collision = false;
        for row in 0..usize::from(n) {
            let py = y_pos + row;
            if clip && py >= DISPLAY_Y {
                break;
            }

            let sprite_byte = self.mem_read(self.i.wrapping_add(row as u16));

            for col in 0..8 {
                let px = x_pos + col;
                if clip && px >= DISPLAY_X {
                    break;
                }

                // If current sprite bit is non-zero
                if (sprite_byte & (0x80 >> col)) != 0 {
                    let pixel = &mut self.display[py % DISPLAY_Y][px % DISPLAY_X];
                    collision |= *pixel;
                    // Flip the pixel
                    *pixel ^= true;
                }
            }
        }

        self.v[0xF] = u8::from(collision);
    }

    fn execute_wait_for_key(&mut self, x: u4) {
        match self.keypad.iter().position(|&pressed| pressed) {
            Some(key) => self.v[x] = key as u8,
            // Repeat this instruction until a key is pressed
            None => self.pc = self.pc.wrapping_sub(2),
        }
    }

    fn advance_index_after_transfer(&mut self, x: u4) {
        if self.quirks.load_store_increments_i {
            self.i = self.i.wrapping_add(u16::from(x.get()) + 1);
        }
    }
}

fn check_jump_target(target: u16) -> Result<u16, Fault> {
    if is_instruction_address(target) {
        Ok(target)
    } else {
        Err(Fault::InvalidJump { target })
    }
}
