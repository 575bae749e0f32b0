use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use dmg_core::bus::joypad::JoypadFlags;
use dmg_core::cartridge::Cartridge;
use dmg_core::ppu::{SCREEN_HEIGHT, SCREEN_WIDTH};
use dmg_core::GameBoy;
use gumdrop::Options;
use minifb::{Key, Window, WindowOptions};

#[derive(Debug, Options)]
struct Args {
    #[options(help = "print this help message")]
    help: bool,

    #[options(free, help = "path to a .gb ROM image")]
    rom: Option<PathBuf>,

    #[options(help = "treat undefined opcodes as errors instead of documented NOPs")]
    strict_illegal_opcodes: bool,

    #[options(help = "window scale factor", default = "3")]
    scale: usize,
}

/// Shade index (0..=3, lightest to darkest) to an RGB888 packed pixel, the
/// only place in this crate that knows what a Game Boy screen is supposed to
/// look like; the core only ever deals in shade indices.
const SHADE_RAMP: [u32; 4] = [0x00E0F8D0, 0x0088C070, 0x00346856, 0x00081820];

fn shade_to_rgb(shade: u8) -> u32 {
    SHADE_RAMP[(shade & 0b11) as usize]
}

fn keys_to_joypad(window: &Window) -> JoypadFlags {
    let mut pressed = JoypadFlags::empty();
    let bindings = [
        (Key::Right, JoypadFlags::RIGHT),
        (Key::Left, JoypadFlags::LEFT),
        (Key::Up, JoypadFlags::UP),
        (Key::Down, JoypadFlags::DOWN),
        (Key::X, JoypadFlags::A),
        (Key::Z, JoypadFlags::B),
        (Key::Backspace, JoypadFlags::SELECT),
        (Key::Enter, JoypadFlags::START),
    ];
    for (key, flag) in bindings {
        if window.is_key_down(key) {
            pressed |= flag;
        }
    }
    pressed
}

fn main() -> Result<()> {
    let args = Args::parse_args_default_or_exit();

    simplelog::SimpleLogger::init(simplelog::LevelFilter::Info, simplelog::Config::default())
        .context("failed to initialize logger")?;

    let rom_path = args.rom.context("a ROM path is required, see --help")?;
    let rom_bytes = fs::read(&rom_path).with_context(|| format!("failed to read {}", rom_path.display()))?;
    let cartridge = Cartridge::load(rom_bytes).map_err(anyhow::Error::msg)?;
    let title = cartridge.header.title.clone();

    let mut gb = GameBoy::with_options(cartridge, args.strict_illegal_opcodes);

    let scale = args.scale.max(1);
    let mut window = Window::new(
        &format!("dmg - {}", title),
        SCREEN_WIDTH * scale,
        SCREEN_HEIGHT * scale,
        WindowOptions::default(),
    )
    .context("failed to open window")?;
    window.limit_update_rate(Some(std::time::Duration::from_micros(16_600)));

    let mut scaled_buffer = vec![0u32; SCREEN_WIDTH * scale * SCREEN_HEIGHT * scale];

    while window.is_open() && !window.is_key_down(Key::Escape) {
        gb.set_keys(keys_to_joypad(&window));

        if let Err(err) = gb.step_frame() {
            log::error!("emulation stopped: {}", err);
            break;
        }

        blit_scaled(gb.framebuffer(), scale, &mut scaled_buffer);
        window
            .update_with_buffer(&scaled_buffer, SCREEN_WIDTH * scale, SCREEN_HEIGHT * scale)
            .context("failed to present frame")?;
    }

    Ok(())
}

fn blit_scaled(framebuffer: &[u8], scale: usize, out: &mut [u32]) {
    let out_width = SCREEN_WIDTH * scale;
    for y in 0..SCREEN_HEIGHT {
        for x in 0..SCREEN_WIDTH {
            let rgb = shade_to_rgb(framebuffer[y * SCREEN_WIDTH + x]);
            for dy in 0..scale {
                let row = (y * scale + dy) * out_width;
                for dx in 0..scale {
                    out[row + x * scale + dx] = rgb;
                }
            }
        }
    }
}
