//! Hardware capability traits for the console subsystem.
//!
//! Everything the console touches outside its own state — video memory, the
//! CRT cursor registers, the serial port, the interrupt controller, the
//! scheduler's sleep/wake primitives — is reached through these traits.
//! Production implementations live in [`x86`]; tests use the in-memory
//! doubles in `mock`.

use spin::{Mutex, MutexGuard};

use crate::console::input::InputQueue;
use crate::console::CharDevice;

#[cfg(target_arch = "x86_64")]
pub mod x86;

#[cfg(test)]
pub(crate) mod mock;

/// VGA text-mode video hardware: a linear array of character/attribute cells
/// plus the CRT controller's cursor registers.
///
/// The cursor is deliberately not cached in software. Renderer calls read it
/// on entry and write it back before returning, so concurrent cursor movers
/// serialized by the output lock always see each other's position.
pub trait TextVideo: Sync {
    /// Current linear cursor offset (`row * 80 + col`).
    fn cursor(&self) -> usize;

    /// Move the hardware cursor to a linear offset.
    fn set_cursor(&self, pos: usize);

    /// Write one character/attribute cell.
    fn write_cell(&self, pos: usize, ch: u8, attr: u8);

    /// Read one cell back (the renderer scrolls by copying rows).
    fn read_cell(&self, pos: usize) -> (u8, u8);

    /// Fill `count` cells starting at `start` with the same cell value.
    fn fill_cells(&self, start: usize, count: usize, ch: u8, attr: u8);

    /// Total number of cells in the mapped region (the visible grid plus the
    /// controller's working space).
    fn cell_count(&self) -> usize;

    /// Load an opaque register table into the video controller.
    fn load_registers(&self, table: &[u8]);

    /// Expand an opaque glyph bitmap into the controller's font memory.
    fn load_font(&self, glyphs: &[u8]);
}

/// Raw single-character serial sink; every console character is mirrored
/// here after it hits the framebuffer.
pub trait SerialSink: Sync {
    fn put(&self, byte: u8);
}

/// Per-CPU operations the console needs from the architecture layer.
pub trait CpuOps: Sync {
    /// Identifier of the calling CPU, for the panic banner.
    fn id(&self) -> usize;

    fn interrupts_enabled(&self) -> bool;

    fn disable_interrupts(&self);

    fn enable_interrupts(&self);

    /// Stop the calling CPU. The panic path still spins afterwards in case
    /// the halt primitive returns.
    fn halt(&self);

    /// Walk the caller's frame-pointer chain, storing up to `pcs.len()`
    /// return addresses and stopping early at a zero terminator. Returns the
    /// number of addresses captured.
    fn capture_return_addresses(&self, pcs: &mut [usize]) -> usize;
}

/// Blocking support supplied by the scheduler.
pub trait Scheduler: Sync {
    /// Atomically release the input lock and block the calling thread until
    /// [`Scheduler::wakeup`] runs, then reacquire the lock. Wakeups may be
    /// spurious and are shared by every waiter; callers re-test their own
    /// predicate after each return.
    fn sleep<'a>(
        &self,
        lock: &'a Mutex<InputQueue>,
        guard: MutexGuard<'a, InputQueue>,
    ) -> MutexGuard<'a, InputQueue>;

    /// Wake every thread blocked in [`Scheduler::sleep`].
    fn wakeup(&self);

    /// Whether the calling thread has a pending kill. A blocked read
    /// abandons its wait once this turns true.
    fn current_killed(&self) -> bool;
}

/// Interrupt-controller hook: unmask the keyboard line once the console is
/// ready to consume key events.
pub trait IrqControl: Sync {
    fn enable_keyboard(&self);
}

/// The kernel's character-device table.
pub trait DeviceRegistry: Sync {
    /// Install the console as the system console character device.
    fn register_console(&self, dev: &'static dyn CharDevice);
}

/// Opaque video-mode configuration handed through to the controller at
/// bring-up: a register table and a glyph bitmap, both supplied by the
/// platform.
#[derive(Clone, Copy)]
pub struct VideoMode {
    pub registers: &'static [u8],
    pub font: &'static [u8],
}

/// Everything the console needs from the platform, bundled so that
/// [`crate::console::init`] stays a single call.
#[derive(Clone, Copy)]
pub struct ConsoleHw {
    pub video: &'static dyn TextVideo,
    pub serial: &'static dyn SerialSink,
    pub cpu: &'static dyn CpuOps,
    pub sched: &'static dyn Scheduler,
    pub irq: &'static dyn IrqControl,
    pub mode: VideoMode,
}
