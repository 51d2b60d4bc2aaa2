//! x86_64 implementations of the console hardware traits: VGA text memory
//! and the CRT controller cursor, COM1 serial, the legacy PIC keyboard line
//! and per-CPU operations.

use pic8259::ChainedPics;
use spin::Mutex;
use uart_16550::SerialPort;
use x86_64::instructions::interrupts;
use x86_64::instructions::port::Port;

use super::{CpuOps, IrqControl, SerialSink, TextVideo};

/// CRT controller index/data ports for the color adapter.
const CRT_INDEX: u16 = 0x3d4;
const CRT_DATA: u16 = 0x3d5;

/// Cursor location registers (high/low byte of the linear offset).
const CURSOR_HIGH: u8 = 14;
const CURSOR_LOW: u8 = 15;

const COM1_PORT: u16 = 0x3f8;

/// Keyboard is IRQ1 on the master PIC.
const KEYBOARD_IRQ: u8 = 1;

/// VGA text-mode adapter: character/attribute cells at a fixed mapped base,
/// cursor in the CRT controller, font memory behind the plane-2 window.
pub struct VgaText {
    base: usize,
    cells: usize,
    font_base: usize,
}

impl VgaText {
    /// # Safety
    ///
    /// `base` and `font_base` must be the virtual addresses of the VGA text
    /// framebuffer and font window, and `cells` must not extend past the
    /// mapped text region.
    pub const unsafe fn new(base: usize, cells: usize, font_base: usize) -> Self {
        Self {
            base,
            cells,
            font_base,
        }
    }

    fn cell_ptr(&self, pos: usize) -> *mut u16 {
        debug_assert!(pos < self.cells);
        (self.base as *mut u16).wrapping_add(pos)
    }
}

impl TextVideo for VgaText {
    fn cursor(&self) -> usize {
        let mut index: Port<u8> = Port::new(CRT_INDEX);
        let mut data: Port<u8> = Port::new(CRT_DATA);
        unsafe {
            index.write(CURSOR_HIGH);
            let hi = data.read() as usize;
            index.write(CURSOR_LOW);
            let lo = data.read() as usize;
            hi << 8 | lo
        }
    }

    fn set_cursor(&self, pos: usize) {
        let mut index: Port<u8> = Port::new(CRT_INDEX);
        let mut data: Port<u8> = Port::new(CRT_DATA);
        unsafe {
            index.write(CURSOR_HIGH);
            data.write((pos >> 8) as u8);
            index.write(CURSOR_LOW);
            data.write(pos as u8);
        }
    }

    fn write_cell(&self, pos: usize, ch: u8, attr: u8) {
        let cell = (attr as u16) << 8 | ch as u16;
        unsafe { core::ptr::write_volatile(self.cell_ptr(pos), cell) };
    }

    fn read_cell(&self, pos: usize) -> (u8, u8) {
        let cell = unsafe { core::ptr::read_volatile(self.cell_ptr(pos)) };
        (cell as u8, (cell >> 8) as u8)
    }

    fn fill_cells(&self, start: usize, count: usize, ch: u8, attr: u8) {
        let cell = (attr as u16) << 8 | ch as u16;
        for pos in start..start + count {
            unsafe { core::ptr::write_volatile(self.cell_ptr(pos), cell) };
        }
    }

    fn cell_count(&self) -> usize {
        self.cells
    }

    fn load_registers(&self, table: &[u8]) {
        // Table layout follows the usual dump order: 1 miscellaneous output
        // byte, 5 sequencer, 25 CRT, 9 graphics and 21 attribute registers.
        let mut values = table.iter().copied();
        unsafe {
            let mut misc: Port<u8> = Port::new(0x3c2);
            if let Some(v) = values.next() {
                misc.write(v);
            }

            let mut seq_index: Port<u8> = Port::new(0x3c4);
            let mut seq_data: Port<u8> = Port::new(0x3c5);
            for i in 0u8..5 {
                if let Some(v) = values.next() {
                    seq_index.write(i);
                    seq_data.write(v);
                }
            }

            // Unlock CRT registers 0-7 before loading the table over them.
            let mut crt_index: Port<u8> = Port::new(CRT_INDEX);
            let mut crt_data: Port<u8> = Port::new(CRT_DATA);
            crt_index.write(0x03);
            let end_horiz = crt_data.read();
            crt_index.write(0x03);
            crt_data.write(end_horiz | 0x80);
            crt_index.write(0x11);
            let vert_retrace = crt_data.read();
            crt_index.write(0x11);
            crt_data.write(vert_retrace & !0x80);
            for i in 0u8..25 {
                if let Some(v) = values.next() {
                    crt_index.write(i);
                    crt_data.write(v);
                }
            }

            let mut gfx_index: Port<u8> = Port::new(0x3ce);
            let mut gfx_data: Port<u8> = Port::new(0x3cf);
            for i in 0u8..9 {
                if let Some(v) = values.next() {
                    gfx_index.write(i);
                    gfx_data.write(v);
                }
            }

            // Reading the input status register resets the attribute
            // controller's index/data flip-flop.
            let mut status: Port<u8> = Port::new(0x3da);
            let mut attr: Port<u8> = Port::new(0x3c0);
            for i in 0u8..21 {
                if let Some(v) = values.next() {
                    let _ = status.read();
                    attr.write(i);
                    attr.write(v);
                }
            }
            let _ = status.read();
            // Re-enable video output.
            attr.write(0x20);
        }
    }

    fn load_font(&self, glyphs: &[u8]) {
        // Glyphs are 16 bytes tall; font memory stores them at a 32-byte
        // stride.
        const GLYPH_HEIGHT: usize = 16;
        const GLYPH_SLOT: usize = 32;

        for (glyph, rows) in glyphs.chunks_exact(GLYPH_HEIGHT).enumerate() {
            for (row, &bits) in rows.iter().enumerate() {
                let dst = (self.font_base + glyph * GLYPH_SLOT + row) as *mut u8;
                unsafe { core::ptr::write_volatile(dst, bits) };
            }
        }
    }
}

/// COM1, the raw mirror for every console character.
pub struct Com1 {
    port: Mutex<SerialPort>,
}

impl Com1 {
    pub const fn new() -> Self {
        Self {
            port: Mutex::new(unsafe { SerialPort::new(COM1_PORT) }),
        }
    }

    /// Program the UART line settings. Call once during bring-up, before the
    /// console starts mirroring output.
    pub fn init(&self) {
        self.port.lock().init();
    }
}

impl SerialSink for Com1 {
    fn put(&self, byte: u8) {
        self.port.lock().send_raw(byte);
    }
}

/// Legacy PIC control for the keyboard line. Shares the remapped offsets the
/// interrupt layer programmed at boot.
pub struct PicKeyboard {
    pics: Mutex<ChainedPics>,
}

impl PicKeyboard {
    pub const fn new(offset1: u8, offset2: u8) -> Self {
        Self {
            pics: Mutex::new(unsafe { ChainedPics::new(offset1, offset2) }),
        }
    }
}

impl IrqControl for PicKeyboard {
    fn enable_keyboard(&self) {
        let mut pics = self.pics.lock();
        unsafe {
            let masks = pics.read_masks();
            pics.write_masks(masks[0] & !(1u8 << KEYBOARD_IRQ), masks[1]);
        }
    }
}

/// CPU operations for one processor.
pub struct X86Cpu {
    id: usize,
}

impl X86Cpu {
    pub const fn new(id: usize) -> Self {
        Self { id }
    }
}

impl CpuOps for X86Cpu {
    fn id(&self) -> usize {
        self.id
    }

    fn interrupts_enabled(&self) -> bool {
        interrupts::are_enabled()
    }

    fn disable_interrupts(&self) {
        interrupts::disable();
    }

    fn enable_interrupts(&self) {
        interrupts::enable();
    }

    fn halt(&self) {
        x86_64::instructions::hlt();
    }

    #[inline(never)]
    fn capture_return_addresses(&self, pcs: &mut [usize]) -> usize {
        let mut frame: usize;
        unsafe { core::arch::asm!("mov {}, rbp", out(reg) frame) };

        let mut depth = 0;
        while depth < pcs.len() {
            if frame == 0 || frame % core::mem::align_of::<usize>() != 0 {
                break;
            }
            // Saved return address sits above the saved frame pointer.
            let ret = unsafe { core::ptr::read((frame + 8) as *const usize) };
            if ret == 0 {
                break;
            }
            pcs[depth] = ret;
            depth += 1;
            frame = unsafe { core::ptr::read(frame as *const usize) };
        }
        depth
    }
}
