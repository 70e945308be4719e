use std::path::Path;

use log::{debug, error, trace};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    decode::OpCodes,
    display::FrameBuffer,
    keyboard::Keypad,
    memory::{Memory, RomError, TypeAddr},
    registers::Registers,
    timer::Timer,
};

/// Where pc goes once an instruction has executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Next,
    Skip,
    Jump(TypeAddr),
    /// Leave pc on this instruction so it runs again next step.
    Hold,
}

impl Flow {
    fn skip_if(cond: bool) -> Self {
        if cond {
            Flow::Skip
        } else {
            Flow::Next
        }
    }
}

/// The whole machine. One instance per ROM run, owned by whoever drives it.
pub struct Emulator {
    pub regs: Registers,
    pub mem: Memory,
    pub fb: FrameBuffer,
    pub keypad: Keypad,
    pub delay_timer: Timer,
    pub sound_timer: Timer,
    rng: StdRng,
}

impl Emulator {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// A machine whose CXNN results are reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::new(),
            fb: FrameBuffer::new(),
            keypad: Keypad::new(),
            delay_timer: Timer::new(0),
            sound_timer: Timer::new(0),
            rng,
        }
    }

    #[cfg(test)]
    pub fn load_rom(&mut self, rom: &[u8]) -> Result<(), RomError> {
        self.mem.load_rom(rom)
    }

    pub fn load_rom_by_file(&mut self, path: impl AsRef<Path>) -> Result<(), RomError> {
        self.mem.load_rom_by_file(path)
    }

    pub fn fetch_decode(&self) -> OpCodes {
        let ins = self.mem.next_instruction();
        OpCodes::decode_raw(ins)
    }

    /// Runs one fetch-decode-execute cycle.
    ///
    /// Returns true when the framebuffer was touched and should be presented.
    pub fn step(&mut self) -> bool {
        let pc = self.mem.pc.0;
        let operation = self.fetch_decode();
        trace!("{:04X}: {:?} v{:02X?} i{:04X}", pc, operation, self.regs, self.mem.index.0);
        self.execute_ins(operation)
    }

    pub fn execute_ins(&mut self, ins: OpCodes) -> bool {
        let flow = match ins {
            OpCodes::ClearScreen => {
                self.fb.clear_buffer();
                Flow::Next
            }
            OpCodes::PopSubroutine => match self.mem.stack.pop() {
                // return to the instruction after the call
                Ok(addr) => Flow::Jump(addr.wrapping_add(2)),
                Err(e) => {
                    error!("{:04X}: {}", self.mem.pc.0, e);
                    Flow::Hold
                }
            },
            OpCodes::Jump(addr) => Flow::Jump(addr),
            OpCodes::PushSubroutine(addr) => match self.mem.stack.push(self.mem.pc.0) {
                Ok(()) => Flow::Jump(addr),
                Err(e) => {
                    error!("{:04X}: {}", self.mem.pc.0, e);
                    Flow::Hold
                }
            },
            OpCodes::SkipEqualConstant(vx, nn) => Flow::skip_if(self.regs.get(vx) == nn),
            OpCodes::SkipNotEqualConstant(vx, nn) => Flow::skip_if(self.regs.get(vx) != nn),
            OpCodes::SkipEqualRegister(vx, vy) => {
                Flow::skip_if(self.regs.get(vx) == self.regs.get(vy))
            }
            OpCodes::SkipNotEqualRegister(vx, vy) => {
                Flow::skip_if(self.regs.get(vx) != self.regs.get(vy))
            }
            OpCodes::SetRegister(vx, nn) => {
                self.regs.set_register(vx, nn);
                Flow::Next
            }
            OpCodes::AddToRegister(vx, nn) => {
                self.regs.add_to_register(vx, nn);
                Flow::Next
            }
            OpCodes::CopyRegister(vx, vy) => {
                self.regs.set_register(vx, self.regs.get(vy));
                Flow::Next
            }
            OpCodes::Or(vx, vy) => {
                self.regs
                    .set_register(vx, self.regs.get(vx) | self.regs.get(vy));
                Flow::Next
            }
            OpCodes::And(vx, vy) => {
                self.regs
                    .set_register(vx, self.regs.get(vx) & self.regs.get(vy));
                Flow::Next
            }
            OpCodes::XOr(vx, vy) => {
                self.regs
                    .set_register(vx, self.regs.get(vx) ^ self.regs.get(vy));
                Flow::Next
            }
            // For the flag setting ALU ops the flag is computed from the operands
            // before the result is written, and is written last.
            OpCodes::Add(vx, vy) => {
                let (x, y) = (self.regs.get(vx), self.regs.get(vy));
                let (z, carry) = x.overflowing_add(y);
                self.regs.set_register(vx, z);
                self.regs.set_flag(carry);
                Flow::Next
            }
            OpCodes::SubtractForward(vx, vy) => {
                let (x, y) = (self.regs.get(vx), self.regs.get(vy));
                self.regs.set_register(vx, x.wrapping_sub(y));
                self.regs.set_flag(x > y);
                Flow::Next
            }
            OpCodes::SubtractBackward(vx, vy) => {
                let (x, y) = (self.regs.get(vx), self.regs.get(vy));
                self.regs.set_register(vx, y.wrapping_sub(x));
                self.regs.set_flag(y > x);
                Flow::Next
            }
            OpCodes::RightShift(vx, _) => {
                let vx_value = self.regs.get(vx);
                self.regs.set_register(vx, vx_value >> 1);
                self.regs.set_register(0xF, vx_value & 1);
                Flow::Next
            }
            OpCodes::LeftShift(vx, _) => {
                let vx_value = self.regs.get(vx);
                self.regs.set_register(vx, vx_value << 1);
                self.regs.set_register(0xF, (vx_value >> 7) & 1);
                Flow::Next
            }
            OpCodes::SetIndexRegister(addr) => {
                self.mem.set_index(addr);
                Flow::Next
            }
            OpCodes::JumpWithOffset(addr) => Flow::Jump(addr + self.regs.get(0) as TypeAddr),
            OpCodes::Random(vx, nn) => {
                let ransuu: u8 = self.rng.gen();
                self.regs.set_register(vx, nn & ransuu);
                Flow::Next
            }
            OpCodes::Display(reg_x, reg_y, height) => {
                let (x, y) = (self.regs.get(reg_x), self.regs.get(reg_y));
                let sprite: Vec<u8> = (0..height as u16)
                    .map(|row| self.mem.get_indexed(row))
                    .collect();
                let vf = self.fb.paint(x, y, &sprite);
                self.regs.set_flag(vf);
                Flow::Next
            }
            OpCodes::SkipIfPressed(vx) => Flow::skip_if(self.keypad.is_pressed(self.regs.get(vx))),
            OpCodes::SkipIfNotPressed(vx) => {
                Flow::skip_if(!self.keypad.is_pressed(self.regs.get(vx)))
            }
            OpCodes::CopyDelayToRegister(vx) => {
                self.regs.set_register(vx, self.delay_timer.count);
                Flow::Next
            }
            OpCodes::CopyRegisterToDelay(vx) => {
                self.delay_timer.set(self.regs.get(vx));
                Flow::Next
            }
            OpCodes::CopyRegisterToSound(vx) => {
                self.sound_timer.set(self.regs.get(vx));
                Flow::Next
            }
            OpCodes::AddToIndex(vx) => {
                self.mem.index.add(self.regs.get(vx));
                Flow::Next
            }
            // Polls rather than blocks: re-executes every step until a key is held.
            OpCodes::GetKey(vx) => match self.keypad.first_pressed() {
                Some(key) => {
                    self.regs.set_register(vx, key);
                    Flow::Next
                }
                None => Flow::Hold,
            },
            OpCodes::PointChar(vx) => {
                self.mem.set_index(Memory::glyph_addr(self.regs.get(vx)));
                Flow::Next
            }
            OpCodes::ToDecimal(vx) => {
                let value = self.regs.get(vx);
                let digits = [value / 100, (value / 10) % 10, value % 10];
                for (i, digit) in digits.into_iter().enumerate() {
                    self.mem.set_indexed(i as u16, digit);
                }
                Flow::Next
            }
            OpCodes::StoreRegisterToMemory(vx) => {
                for reg in 0..=vx {
                    self.mem.set_indexed(reg as u16, self.regs.get(reg));
                }
                Flow::Next
            }
            OpCodes::LoadRegisterFromMemory(vx) => {
                for reg in 0..=vx {
                    let reg_val = self.mem.get_indexed(reg as u16);
                    self.regs.set_register(reg, reg_val);
                }
                Flow::Next
            }
            OpCodes::Unimplemented(code) => {
                debug!("{:04X}: unknown opcode {:04X}", self.mem.pc.0, code);
                Flow::Hold
            }
        };

        match flow {
            Flow::Next => self.mem.increment_pc(),
            Flow::Skip => self.mem.pc.skip(),
            Flow::Jump(addr) => self.mem.set_pc(addr),
            Flow::Hold => {}
        }

        matches!(ins, OpCodes::ClearScreen | OpCodes::Display(..))
    }

    pub fn sync_timers(&mut self) {
        self.delay_timer.tick();
        self.sound_timer.tick();
    }
}

impl Default for Emulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{HEIGHT, WIDTH};

    fn emulator_with(program: &[u8]) -> Emulator {
        let mut emu = Emulator::with_seed(0xC8);
        emu.load_rom(program).unwrap();
        emu
    }

    fn run(emu: &mut Emulator, op: u16) -> bool {
        emu.execute_ins(OpCodes::decode_raw(op))
    }

    #[test]
    fn test_load_and_add_program() {
        let mut emu = emulator_with(&[0x60, 0x05, 0x70, 0x03]);
        assert!(!emu.step());
        assert!(!emu.step());
        assert_eq!(emu.regs.get(0), 8);
        assert_eq!(emu.mem.pc.0, 0x204);
    }

    #[test]
    fn test_clear_screen_requests_draw() {
        let mut emu = emulator_with(&[0x00, 0xE0]);
        emu.fb.paint(0, 0, &[0xFF, 0xFF]);
        assert!(emu.step());
        assert_eq!(emu.fb, FrameBuffer::new());
        assert_eq!(emu.mem.pc.0, 0x202);
    }

    #[test]
    fn test_jump() {
        let mut emu = Emulator::with_seed(1);
        assert!(!run(&mut emu, 0x1ABC));
        assert_eq!(emu.mem.pc.0, 0xABC);
    }

    #[test]
    fn test_jump_with_offset() {
        let mut emu = Emulator::with_seed(1);
        emu.regs.set_register(0, 0x10);
        run(&mut emu, 0xB300);
        assert_eq!(emu.mem.pc.0, 0x310);
    }

    #[test]
    fn test_call_then_return() {
        // 0x200: call 0x206, 0x206: return
        let mut emu = emulator_with(&[0x22, 0x06, 0x00, 0x00, 0x00, 0x00, 0x00, 0xEE]);
        emu.step();
        assert_eq!(emu.mem.pc.0, 0x206);
        assert_eq!(emu.mem.stack.sp, 1);
        emu.step();
        assert_eq!(emu.mem.pc.0, 0x202);
        assert_eq!(emu.mem.stack.sp, 0);
    }

    #[test]
    fn test_return_with_empty_stack_holds() {
        let mut emu = emulator_with(&[0x00, 0xEE]);
        emu.step();
        assert_eq!(emu.mem.pc.0, 0x200);
        assert_eq!(emu.mem.stack.sp, 0);
    }

    #[test]
    fn test_call_with_full_stack_holds() {
        // calls itself forever
        let mut emu = emulator_with(&[0x22, 0x00]);
        for _ in 0..15 {
            emu.step();
        }
        assert_eq!(emu.mem.stack.sp, 15);
        emu.step();
        assert_eq!(emu.mem.stack.sp, 15);
        assert_eq!(emu.mem.pc.0, 0x200);
    }

    #[test]
    fn test_skips() {
        let cases: [(u16, bool); 8] = [
            (0x3142, true),
            (0x3143, false),
            (0x4143, true),
            (0x4142, false),
            (0x5120, true),
            (0x5130, false),
            (0x9130, true),
            (0x9120, false),
        ];
        for (op, skips) in cases {
            let mut emu = Emulator::with_seed(1);
            emu.regs.set_register(1, 0x42);
            emu.regs.set_register(2, 0x42);
            emu.regs.set_register(3, 0x07);
            run(&mut emu, op);
            let expected = if skips { 0x204 } else { 0x202 };
            assert_eq!(emu.mem.pc.0, expected, "opcode {:04X}", op);
        }
    }

    #[test]
    fn test_key_skips() {
        let mut emu = Emulator::with_seed(1);
        emu.regs.set_register(4, 0xA);
        run(&mut emu, 0xE49E);
        assert_eq!(emu.mem.pc.0, 0x202);
        run(&mut emu, 0xE4A1);
        assert_eq!(emu.mem.pc.0, 0x206);

        emu.keypad.set(0xA, true);
        run(&mut emu, 0xE49E);
        assert_eq!(emu.mem.pc.0, 0x20A);
        run(&mut emu, 0xE4A1);
        assert_eq!(emu.mem.pc.0, 0x20C);
    }

    #[test]
    fn test_key_skips_with_key_above_f() {
        let mut emu = Emulator::with_seed(1);
        emu.regs.set_register(4, 0x1A);
        emu.keypad.set(0xA, true);
        run(&mut emu, 0xE49E);
        assert_eq!(emu.mem.pc.0, 0x202);
        run(&mut emu, 0xE4A1);
        assert_eq!(emu.mem.pc.0, 0x206);
    }

    #[test]
    fn test_flag_overwrites_result_in_vf() {
        let mut emu = Emulator::with_seed(1);
        emu.regs.set_register(0xF, 0x02);
        run(&mut emu, 0x8F06);
        assert_eq!(emu.regs.get(0xF), 0);

        emu.regs.set_register(0xF, 0xFF);
        emu.regs.set_register(1, 0x01);
        run(&mut emu, 0x8F14);
        assert_eq!(emu.regs.get(0xF), 1);
    }

    #[test]
    fn test_add_to_register_keeps_flag() {
        let mut emu = Emulator::with_seed(1);
        emu.regs.set_register(2, 0xFE);
        emu.regs.set_register(0xF, 0x7);
        run(&mut emu, 0x7203);
        assert_eq!(emu.regs.get(2), 0x01);
        assert_eq!(emu.regs.get(0xF), 0x7);
    }

    #[test]
    fn test_bitwise_ops() {
        let mut emu = Emulator::with_seed(1);
        emu.regs.set_register(1, 0b1100);
        emu.regs.set_register(2, 0b1010);
        run(&mut emu, 0x8121);
        assert_eq!(emu.regs.get(1), 0b1110);
        emu.regs.set_register(1, 0b1100);
        run(&mut emu, 0x8122);
        assert_eq!(emu.regs.get(1), 0b1000);
        emu.regs.set_register(1, 0b1100);
        run(&mut emu, 0x8123);
        assert_eq!(emu.regs.get(1), 0b0110);
        run(&mut emu, 0x8120);
        assert_eq!(emu.regs.get(1), 0b1010);
    }

    #[test]
    fn test_add_with_carry() {
        let mut emu = Emulator::with_seed(1);
        emu.regs.set_register(1, 0xF0);
        emu.regs.set_register(2, 0x20);
        run(&mut emu, 0x8124);
        assert_eq!(emu.regs.get(1), 0x10);
        assert_eq!(emu.regs.get(0xF), 1);

        emu.regs.set_register(1, 0x10);
        run(&mut emu, 0x8124);
        assert_eq!(emu.regs.get(1), 0x30);
        assert_eq!(emu.regs.get(0xF), 0);
    }

    #[test]
    fn test_subtract_flags_use_operands() {
        let mut emu = Emulator::with_seed(1);
        emu.regs.set_register(1, 0x10);
        emu.regs.set_register(2, 0x20);
        run(&mut emu, 0x8125);
        assert_eq!(emu.regs.get(1), 0xF0);
        assert_eq!(emu.regs.get(0xF), 0);

        emu.regs.set_register(1, 0x10);
        run(&mut emu, 0x8127);
        assert_eq!(emu.regs.get(1), 0x10);
        assert_eq!(emu.regs.get(0xF), 1);

        // equal operands do not count as "no borrow"
        emu.regs.set_register(1, 0x20);
        run(&mut emu, 0x8125);
        assert_eq!(emu.regs.get(1), 0);
        assert_eq!(emu.regs.get(0xF), 0);
    }

    #[test]
    fn test_shifts() {
        let mut emu = Emulator::with_seed(1);
        emu.regs.set_register(3, 0b1000_0001);
        run(&mut emu, 0x8306);
        assert_eq!(emu.regs.get(3), 0b0100_0000);
        assert_eq!(emu.regs.get(0xF), 1);

        emu.regs.set_register(3, 0b1000_0001);
        run(&mut emu, 0x830E);
        assert_eq!(emu.regs.get(3), 0b0000_0010);
        assert_eq!(emu.regs.get(0xF), 1);

        run(&mut emu, 0x830E);
        assert_eq!(emu.regs.get(0xF), 0);
    }

    #[test]
    fn test_random_is_masked() {
        let mut emu = Emulator::with_seed(7);
        for _ in 0..64 {
            emu.regs.set_register(5, 0xAA);
            run(&mut emu, 0xC500);
            assert_eq!(emu.regs.get(5), 0);
            run(&mut emu, 0xC50F);
            assert_eq!(emu.regs.get(5) & 0xF0, 0);
        }
    }

    #[test]
    fn test_random_is_reproducible() {
        let mut a = Emulator::with_seed(99);
        let mut b = Emulator::with_seed(99);
        for _ in 0..8 {
            run(&mut a, 0xC1FF);
            run(&mut b, 0xC1FF);
            assert_eq!(a.regs.get(1), b.regs.get(1));
        }
    }

    #[test]
    fn test_draw_font_glyph() {
        let mut emu = Emulator::with_seed(1);
        emu.regs.set_register(0, 0x8);
        run(&mut emu, 0xF029);
        assert_eq!(emu.mem.index.0, 40);
        assert!(run(&mut emu, 0xD125));
        assert_eq!(emu.regs.get(0xF), 0);

        let glyph = [0xF0u8, 0x90, 0xF0, 0x90, 0xF0];
        for (y, row) in glyph.iter().enumerate() {
            for x in 0..8 {
                let expected = (row >> (7 - x)) & 1 == 1;
                assert_eq!(emu.fb.get(x, y), expected, "pixel ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_draw_twice_restores_screen() {
        let mut emu = Emulator::with_seed(1);
        emu.regs.set_register(1, 20);
        emu.regs.set_register(2, 10);
        emu.mem.set_index(Memory::glyph_addr(0x3));
        run(&mut emu, 0xD125);
        assert_eq!(emu.regs.get(0xF), 0);
        run(&mut emu, 0xD125);
        assert_eq!(emu.regs.get(0xF), 1);
        assert_eq!(emu.fb, FrameBuffer::new());
        // a third draw on the blank screen collides with nothing
        run(&mut emu, 0xD125);
        assert_eq!(emu.regs.get(0xF), 0);
    }

    #[test]
    fn test_draw_clips_at_edges() {
        let mut emu = Emulator::with_seed(1);
        emu.regs.set_register(1, (WIDTH - 2) as u8);
        emu.regs.set_register(2, (HEIGHT - 1) as u8);
        emu.mem.set_index(0x300);
        emu.mem.set(0x300, 0xFF);
        emu.mem.set(0x301, 0xFF);
        run(&mut emu, 0xD122);
        let lit = emu.fb.cells().iter().filter(|&&on| on).count();
        assert_eq!(lit, 2);
        assert!(emu.fb.get(WIDTH - 1, HEIGHT - 1));
    }

    #[test]
    fn test_get_key_polls() {
        let mut emu = emulator_with(&[0xF3, 0x0A]);
        emu.step();
        emu.step();
        assert_eq!(emu.mem.pc.0, 0x200);

        emu.keypad.set(0xC, true);
        emu.keypad.set(0x9, true);
        emu.step();
        assert_eq!(emu.regs.get(3), 0x9);
        assert_eq!(emu.mem.pc.0, 0x202);
    }

    #[test]
    fn test_timers() {
        let mut emu = Emulator::with_seed(1);
        emu.regs.set_register(1, 3);
        run(&mut emu, 0xF115);
        run(&mut emu, 0xF118);
        emu.sync_timers();
        run(&mut emu, 0xF207);
        assert_eq!(emu.regs.get(2), 2);
        assert_eq!(emu.sound_timer.count, 2);
        for _ in 0..5 {
            emu.sync_timers();
        }
        assert_eq!(emu.delay_timer.count, 0);
        assert_eq!(emu.sound_timer.count, 0);
    }

    #[test]
    fn test_index_ops() {
        let mut emu = Emulator::with_seed(1);
        run(&mut emu, 0xAFFE);
        assert_eq!(emu.mem.index.0, 0xFFE);
        emu.regs.set_register(1, 0x04);
        run(&mut emu, 0xF11E);
        assert_eq!(emu.mem.index.0, 0x1002);
        assert_eq!(emu.regs.get(0xF), 0);
    }

    #[test]
    fn test_binary_coded_decimal() {
        let mut emu = Emulator::with_seed(1);
        emu.regs.set_register(6, 254);
        emu.mem.set_index(0x400);
        run(&mut emu, 0xF633);
        assert_eq!(emu.mem.get(0x400), 2);
        assert_eq!(emu.mem.get(0x401), 5);
        assert_eq!(emu.mem.get(0x402), 4);

        emu.regs.set_register(6, 7);
        run(&mut emu, 0xF633);
        assert_eq!(emu.mem.get(0x400), 0);
        assert_eq!(emu.mem.get(0x401), 0);
        assert_eq!(emu.mem.get(0x402), 7);
    }

    #[test]
    fn test_store_then_load_registers() {
        let mut emu = Emulator::with_seed(1);
        for reg in 0..=5 {
            emu.regs.set_register(reg, reg * 3 + 1);
        }
        emu.regs.set_register(6, 0x66);
        let before = emu.regs.clone();
        emu.mem.set_index(0x500);
        run(&mut emu, 0xF555);
        assert_eq!(emu.mem.get(0x505), 16);
        assert_eq!(emu.mem.get(0x506), 0);

        for reg in 0..=6 {
            emu.regs.set_register(reg, 0);
        }
        run(&mut emu, 0xF565);
        for reg in 0..=5 {
            assert_eq!(emu.regs.get(reg), before.get(reg));
        }
        assert_eq!(emu.regs.get(6), 0);
        assert_eq!(emu.mem.index.0, 0x500);
    }

    #[test]
    fn test_unknown_opcode_holds_pc() {
        let mut emu = emulator_with(&[0x01, 0x23, 0xE1, 0x00, 0x80, 0x0F, 0xF0, 0xFF]);
        for pc in [0x200, 0x202, 0x204, 0x206] {
            emu.mem.set_pc(pc);
            assert!(!emu.step());
            assert_eq!(emu.mem.pc.0, pc);
        }
    }
}
