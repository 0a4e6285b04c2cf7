use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use log::{error, info};
use minifb::{Key, KeyRepeat, Scale, Window, WindowOptions};

use rchip8::display::{HEIGHT, WIDTH};
use rchip8::sound::Sound;
use rchip8::timer::TICKS_PER_SECOND;
use rchip8::Emulator;

const ON_COLOR: u32 = 0x007FFF;
const OFF_COLOR: u32 = 0x000000;

#[derive(Parser, Debug)]
#[command(version, about = "A CHIP-8 virtual machine", long_about = None)]
struct Args {
    /// Path to the ROM file to run
    rom: PathBuf,

    /// Instructions per second
    #[arg(short, long, default_value_t = 700)]
    ips: u32,
}

/// 1234/QWER/ASDF/ZXCV mapped onto the hex pad layout:
///
/// ```text
/// 1 2 3 C
/// 4 5 6 D
/// 7 8 9 E
/// A 0 B F
/// ```
fn keymap(key: Key) -> Option<u8> {
    match key {
        Key::Key1 => Some(0x1),
        Key::Key2 => Some(0x2),
        Key::Key3 => Some(0x3),
        Key::Key4 => Some(0xC),
        Key::Q => Some(0x4),
        Key::W => Some(0x5),
        Key::E => Some(0x6),
        Key::R => Some(0xD),
        Key::A => Some(0x7),
        Key::S => Some(0x8),
        Key::D => Some(0x9),
        Key::F => Some(0xE),
        Key::Z => Some(0xA),
        Key::X => Some(0x0),
        Key::C => Some(0xB),
        Key::V => Some(0xF),
        _ => None,
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let rom = fs::read(&args.rom)
        .with_context(|| format!("could not read ROM {}", args.rom.display()))?;
    let mut emu = Emulator::new();
    emu.load_program(&rom)?;
    info!("loaded ROM {} ({} bytes)", args.rom.display(), rom.len());

    let mut window = Window::new(
        "rchip8 - ESC to exit",
        WIDTH,
        HEIGHT,
        WindowOptions {
            scale: Scale::X16,
            ..WindowOptions::default()
        },
    )?;
    // Limit to max ~60 fps update rate
    window.limit_update_rate(Some(Duration::from_micros(16600)));

    let mut sound = Sound::new();
    let cycles_per_frame = (args.ips / TICKS_PER_SECOND).max(1);
    let tick = Duration::from_secs(1) / TICKS_PER_SECOND;
    let mut last_tick = Instant::now();
    let mut pixels = vec![OFF_COLOR; WIDTH * HEIGHT];

    'frames: while window.is_open() && !window.is_key_down(Key::Escape) {
        for key in window.get_keys_pressed(KeyRepeat::No) {
            if let Some(key) = keymap(key) {
                emu.set_key_state(key, true)?;
            }
        }
        for key in window.get_keys_released() {
            if let Some(key) = keymap(key) {
                emu.set_key_state(key, false)?;
            }
        }

        for _ in 0..cycles_per_frame {
            if let Err(err) = emu.step() {
                // driver policy: report the failure and halt
                error!("emulation halted: {err}");
                break 'frames;
            }
        }

        // timers run at a fixed 60Hz regardless of the instruction rate
        while last_tick.elapsed() >= tick {
            emu.tick_timers();
            last_tick += tick;
        }

        if let Some(sound) = sound.as_mut() {
            sound.set_active(emu.is_sound_active());
        }

        for (pixel, &bit) in pixels.iter_mut().zip(emu.frame()) {
            *pixel = if bit == 1 { ON_COLOR } else { OFF_COLOR };
        }
        window.update_with_buffer(&pixels, WIDTH, HEIGHT)?;
    }

    Ok(())
}
