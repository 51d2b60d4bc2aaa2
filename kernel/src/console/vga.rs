//! VGA text renderer: per-character color output, hardware cursor handling
//! and scrolling.

use core::sync::atomic::{AtomicU8, Ordering};

use crate::hal::{TextVideo, VideoMode};

pub const COLUMNS: usize = 80;
pub const ROWS: usize = 25;

const BACKSPACE: u8 = 0x08;
const BLANK: u8 = b' ';

/// The 16 classic VGA text-mode colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Color {
    Black = 0,
    Blue,
    Green,
    Cyan,
    Red,
    Magenta,
    Brown,
    LightGray,
    DarkGray,
    LightBlue,
    LightGreen,
    LightCyan,
    LightRed,
    Pink,
    Yellow,
    White,
}

/// Packed attribute byte: 4-bit foreground, 4-bit background.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorCode(u8);

impl ColorCode {
    pub const fn new(foreground: Color, background: Color) -> Self {
        Self((background as u8) << 4 | foreground as u8)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }
}

pub const DEFAULT_COLOR: ColorCode = ColorCode::new(Color::LightGray, Color::Black);

/// Character renderer over the text-video capability.
///
/// The cursor is never cached here: each call round-trips through the CRT
/// registers, so concurrent cursor movers serialized by the output lock
/// always see each other's position.
pub struct Vga {
    hw: &'static dyn TextVideo,
    mode: VideoMode,
    /// Attribute for cells freed by scrolling; follows the most recent
    /// [`Vga::set_background`] so a scroll does not repaint a colored
    /// console black.
    clear_attr: AtomicU8,
}

impl Vga {
    pub(crate) fn new(hw: &'static dyn TextVideo, mode: VideoMode) -> Self {
        Self {
            hw,
            mode,
            clear_attr: AtomicU8::new(DEFAULT_COLOR.bits()),
        }
    }

    /// Draw one character at the hardware cursor and advance it, handling
    /// newline, backspace and scrolling.
    ///
    /// Backspace only moves the cursor; the cell it backs onto keeps its
    /// contents until the next non-backspace write lands there.
    pub(crate) fn putc(&self, c: u8, color: ColorCode) {
        let mut pos = self.hw.cursor();

        match c {
            b'\n' => pos += COLUMNS - pos % COLUMNS,
            BACKSPACE => pos = pos.saturating_sub(1),
            _ => {
                self.hw.write_cell(pos, c, color.bits());
                pos += 1;
            }
        }

        if pos / COLUMNS >= ROWS {
            self.scroll();
            pos -= COLUMNS;
        }

        self.hw.set_cursor(pos);
    }

    /// Move rows `1..ROWS` up by one and clear the freed bottom row.
    fn scroll(&self) {
        for pos in 0..(ROWS - 1) * COLUMNS {
            let (ch, attr) = self.hw.read_cell(pos + COLUMNS);
            self.hw.write_cell(pos, ch, attr);
        }
        self.hw.fill_cells(
            (ROWS - 1) * COLUMNS,
            COLUMNS,
            BLANK,
            self.clear_attr.load(Ordering::Relaxed),
        );
    }

    /// Flood the whole mapped region with a solid blank in `color`.
    pub(crate) fn set_background(&self, color: Color) {
        let attr = ColorCode::new(color, color).bits();
        self.clear_attr.store(attr, Ordering::Relaxed);
        self.hw.fill_cells(0, self.hw.cell_count(), BLANK, attr);
    }

    /// Program the video mode: push the opaque register table and glyph
    /// bitmap through to the controller.
    pub(crate) fn init_mode(&self) {
        self.hw.load_registers(self.mode.registers);
        self.hw.load_font(self.mode.font);
    }
}
