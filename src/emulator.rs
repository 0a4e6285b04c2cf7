use log::trace;
use rand::{Rng, RngCore};

use crate::decode::OpCodes;
use crate::display::FrameBuffer;
use crate::error::EmulatorError;
use crate::keyboard::Keyboard;
use crate::memory::Memory;
use crate::registers::{Registers, Stack, VF};
use crate::timer::Timer;

/// The machine: register file, memory, stack, framebuffer, keypad and timers,
/// advanced by an external cycle driver through [`Emulator::step`] and
/// [`Emulator::tick_timers`].
///
/// The two cadences are independent on purpose: programs assume 60Hz timers
/// no matter how many instructions per second the host runs.
pub struct Emulator {
    regs: Registers,
    mem: Memory,
    stack: Stack,
    fb: FrameBuffer,
    keyboard: Keyboard,
    delay_timer: Timer,
    sound_timer: Timer,
    rng: Box<dyn RngCore>,
    // register awaiting a key press (FX0A); fetching is suspended while set
    waiting_for_key: Option<u8>,
}

impl Emulator {
    pub fn new() -> Self {
        Self::with_rng(Box::new(rand::thread_rng()))
    }

    /// Builds the machine around a caller-owned random source, so RND
    /// outcomes can be reproduced with a deterministic generator.
    pub fn with_rng(rng: Box<dyn RngCore>) -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::new(),
            stack: Stack::new(),
            fb: FrameBuffer::new(),
            keyboard: Keyboard::new(),
            delay_timer: Timer::new(),
            sound_timer: Timer::new(),
            rng,
            waiting_for_key: None,
        }
    }

    /// Loads a ROM image into the program region. Fails atomically with
    /// `RomTooLarge` when the image exceeds the 3584-byte capacity.
    pub fn load_program(&mut self, rom: &[u8]) -> Result<(), EmulatorError> {
        self.mem.load_program(rom)
    }

    /// One fetch-decode-execute cycle.
    ///
    /// While a key-wait is pending this is a no-op: no fetch, no PC movement,
    /// no state change, until [`Emulator::set_key_state`] reports a press.
    pub fn step(&mut self) -> Result<(), EmulatorError> {
        if self.waiting_for_key.is_some() {
            return Ok(());
        }
        let raw = self.mem.read_opcode(self.regs.pc)?;
        let op = OpCodes::decode_raw(raw)?;
        trace!("{raw:04X} pc={:03X} i={:03X}", self.regs.pc, self.regs.i);
        // past the opcode before the handler runs, so control flow can
        // overwrite the PC
        self.regs.pc += 2;
        self.execute_ins(op)
    }

    fn execute_ins(&mut self, op: OpCodes) -> Result<(), EmulatorError> {
        match op {
            OpCodes::ClearScreen => {
                self.fb.clear();
            }
            OpCodes::PopSubroutine => {
                self.regs.pc = self.stack.pop()?;
            }
            OpCodes::Jump(addr) => {
                self.regs.pc = addr;
            }
            OpCodes::PushSubroutine(addr) => {
                self.stack.push(self.regs.pc)?;
                self.regs.pc = addr;
            }
            OpCodes::SkipEqualConstant(vx, nn) => {
                if self.regs.get(vx)? == nn {
                    self.skip_next();
                }
            }
            OpCodes::SkipNotEqualConstant(vx, nn) => {
                if self.regs.get(vx)? != nn {
                    self.skip_next();
                }
            }
            OpCodes::SkipEqualRegister(vx, vy) => {
                if self.regs.get(vx)? == self.regs.get(vy)? {
                    self.skip_next();
                }
            }
            OpCodes::SetRegister(vx, nn) => {
                self.regs.set(vx, nn)?;
            }
            OpCodes::AddToRegister(vx, nn) => {
                // wraps; no carry flag for the immediate form
                let sum = self.regs.get(vx)?.wrapping_add(nn);
                self.regs.set(vx, sum)?;
            }
            OpCodes::CopyRegister(vx, vy) => {
                self.regs.set(vx, self.regs.get(vy)?)?;
            }
            OpCodes::Or(vx, vy) => {
                self.regs.set(vx, self.regs.get(vx)? | self.regs.get(vy)?)?;
            }
            OpCodes::And(vx, vy) => {
                self.regs.set(vx, self.regs.get(vx)? & self.regs.get(vy)?)?;
            }
            OpCodes::XOr(vx, vy) => {
                self.regs.set(vx, self.regs.get(vx)? ^ self.regs.get(vy)?)?;
            }
            OpCodes::Add(vx, vy) => {
                let (sum, carry) = self.regs.get(vx)?.overflowing_add(self.regs.get(vy)?);
                self.regs.set(vx, sum)?;
                self.regs.set(VF, carry as u8)?;
            }
            OpCodes::SubtractForward(vx, vy) => {
                let (diff, borrow) = self.regs.get(vx)?.overflowing_sub(self.regs.get(vy)?);
                self.regs.set(vx, diff)?;
                self.regs.set(VF, !borrow as u8)?;
            }
            OpCodes::RightShift(vx) => {
                let value = self.regs.get(vx)?;
                self.regs.set(vx, value >> 1)?;
                self.regs.set(VF, value & 1)?;
            }
            OpCodes::SubtractBackward(vx, vy) => {
                let (diff, borrow) = self.regs.get(vy)?.overflowing_sub(self.regs.get(vx)?);
                self.regs.set(vx, diff)?;
                self.regs.set(VF, !borrow as u8)?;
            }
            OpCodes::LeftShift(vx) => {
                let value = self.regs.get(vx)?;
                self.regs.set(vx, value << 1)?;
                self.regs.set(VF, value >> 7)?;
            }
            OpCodes::SkipNotEqualRegister(vx, vy) => {
                if self.regs.get(vx)? != self.regs.get(vy)? {
                    self.skip_next();
                }
            }
            OpCodes::SetIndexRegister(addr) => {
                self.regs.i = addr;
            }
            OpCodes::JumpWithOffset(addr) => {
                self.regs.pc = addr + self.regs.get(0x0)? as u16;
            }
            OpCodes::Random(vx, nn) => {
                let byte: u8 = self.rng.gen();
                self.regs.set(vx, byte & nn)?;
            }
            OpCodes::Display(vx, vy, height) => {
                let x = self.regs.get(vx)?;
                let y = self.regs.get(vy)?;
                // collision flag is cleared before any pixel is painted
                self.regs.set(VF, 0)?;
                let mut sprite = Vec::with_capacity(height as usize);
                for row in 0..height as u16 {
                    sprite.push(self.mem.read8(self.regs.i.wrapping_add(row))?);
                }
                let collision = self.fb.paint(x, y, &sprite);
                self.regs.set(VF, collision as u8)?;
            }
            OpCodes::SkipIfPressed(vx) => {
                if self.keyboard.is_pressed(self.regs.get(vx)?)? {
                    self.skip_next();
                }
            }
            OpCodes::SkipIfNotPressed(vx) => {
                if !self.keyboard.is_pressed(self.regs.get(vx)?)? {
                    self.skip_next();
                }
            }
            OpCodes::CopyDelayToRegister(vx) => {
                self.regs.set(vx, self.delay_timer.get())?;
            }
            OpCodes::GetKey(vx) => {
                self.waiting_for_key = Some(vx);
            }
            OpCodes::CopyRegisterToDelay(vx) => {
                self.delay_timer.set(self.regs.get(vx)?);
            }
            OpCodes::CopyRegisterToSound(vx) => {
                self.sound_timer.set(self.regs.get(vx)?);
            }
            OpCodes::AddToIndex(vx) => {
                // no overflow flag defined for this one
                self.regs.i = self.regs.i.wrapping_add(self.regs.get(vx)? as u16);
            }
            OpCodes::PointChar(vx) => {
                self.regs.i = Memory::font_addr(self.regs.get(vx)?);
            }
            OpCodes::ToDecimal(vx) => {
                let value = self.regs.get(vx)?;
                self.mem.write8(self.regs.i, value / 100 % 10)?;
                self.mem.write8(self.regs.i.wrapping_add(1), value / 10 % 10)?;
                self.mem.write8(self.regs.i.wrapping_add(2), value % 10)?;
            }
            OpCodes::StoreRegistersToMemory(vx) => {
                // I itself is left unchanged by the transfer
                for reg in 0..=vx {
                    let addr = self.regs.i.wrapping_add(reg as u16);
                    self.mem.write8(addr, self.regs.get(reg)?)?;
                }
            }
            OpCodes::LoadRegistersFromMemory(vx) => {
                for reg in 0..=vx {
                    let addr = self.regs.i.wrapping_add(reg as u16);
                    self.regs.set(reg, self.mem.read8(addr)?)?;
                }
            }
        }
        Ok(())
    }

    /// One 1/60s timer tick for both countdown timers. Driven by the cycle
    /// driver on its own cadence, independent of the instruction rate, and
    /// not gated by a pending key-wait.
    pub fn tick_timers(&mut self) {
        self.delay_timer.tick();
        self.sound_timer.tick();
    }

    /// Reports a host key press or release. A press completes a pending
    /// FX0A wait: the key index lands in the waiting register and fetching
    /// resumes on the next step.
    pub fn set_key_state(&mut self, key: u8, pressed: bool) -> Result<(), EmulatorError> {
        self.keyboard.set_key(key, pressed)?;
        if pressed {
            if let Some(reg) = self.waiting_for_key.take() {
                self.regs.set(reg, key)?;
            }
        }
        Ok(())
    }

    /// Read-only snapshot of the 64x32 pixel grid for rendering.
    pub fn frame(&self) -> &[u8] {
        self.fb.pixels()
    }

    pub fn is_sound_active(&self) -> bool {
        self.sound_timer.is_active()
    }

    /// Back to power-on state, except memory: the font and the loaded
    /// program survive, so the current ROM can be re-run without reloading.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.stack.reset();
        self.fb.clear();
        self.keyboard.reset();
        self.delay_timer.set(0);
        self.sound_timer.set(0);
        self.waiting_for_key = None;
    }

    fn skip_next(&mut self) {
        self.regs.pc += 2;
    }
}

impl Default for Emulator {
    fn default() -> Self {
        Self::new()
    }
}
