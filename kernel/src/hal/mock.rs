//! In-memory doubles for the hardware traits, plus a small bench that wires
//! a console to fresh doubles. Everything is leaked: the subsystem hands out
//! `&'static` references because the real console lives for the kernel's
//! lifetime, and the tests mirror that.

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex as StdMutex};
use std::time::Duration;

use spin::{Mutex, MutexGuard};

use super::{
    ConsoleHw, CpuOps, DeviceRegistry, IrqControl, Scheduler, SerialSink, TextVideo, VideoMode,
};
use crate::console::input::InputQueue;
use crate::console::{CharDevice, Console};

pub const ROWS: usize = 25;
pub const COLS: usize = 80;

static MODE_REGISTERS: [u8; 61] = [0; 61];
static MODE_FONT: [u8; 4096] = [0; 4096];

pub struct MockVideo {
    pub cells: Mutex<Vec<(u8, u8)>>,
    cursor: AtomicUsize,
    pub registers_loaded: AtomicBool,
    pub font_loaded: AtomicBool,
}

impl MockVideo {
    pub fn new() -> Self {
        Self {
            cells: Mutex::new(vec![(0, 0); ROWS * COLS]),
            cursor: AtomicUsize::new(0),
            registers_loaded: AtomicBool::new(false),
            font_loaded: AtomicBool::new(false),
        }
    }

    /// The characters of one visible row, for content assertions.
    pub fn row_text(&self, row: usize) -> String {
        let cells = self.cells.lock();
        cells[row * COLS..(row + 1) * COLS]
            .iter()
            .map(|&(c, _)| c as char)
            .collect()
    }

    pub fn cell(&self, pos: usize) -> (u8, u8) {
        self.cells.lock()[pos]
    }
}

impl TextVideo for MockVideo {
    fn cursor(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }

    fn set_cursor(&self, pos: usize) {
        self.cursor.store(pos, Ordering::SeqCst);
    }

    fn write_cell(&self, pos: usize, ch: u8, attr: u8) {
        self.cells.lock()[pos] = (ch, attr);
    }

    fn read_cell(&self, pos: usize) -> (u8, u8) {
        self.cells.lock()[pos]
    }

    fn fill_cells(&self, start: usize, count: usize, ch: u8, attr: u8) {
        let mut cells = self.cells.lock();
        for cell in &mut cells[start..start + count] {
            *cell = (ch, attr);
        }
    }

    fn cell_count(&self) -> usize {
        ROWS * COLS
    }

    fn load_registers(&self, _table: &[u8]) {
        self.registers_loaded.store(true, Ordering::SeqCst);
    }

    fn load_font(&self, _glyphs: &[u8]) {
        self.font_loaded.store(true, Ordering::SeqCst);
    }
}

pub struct MockSerial {
    pub bytes: Mutex<Vec<u8>>,
}

impl MockSerial {
    pub fn new() -> Self {
        Self {
            bytes: Mutex::new(Vec::new()),
        }
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock()).into_owned()
    }
}

impl SerialSink for MockSerial {
    fn put(&self, byte: u8) {
        self.bytes.lock().push(byte);
    }
}

pub struct MockCpu {
    pub halted: AtomicBool,
}

impl MockCpu {
    pub fn new() -> Self {
        Self {
            halted: AtomicBool::new(false),
        }
    }
}

impl CpuOps for MockCpu {
    fn id(&self) -> usize {
        0
    }

    fn interrupts_enabled(&self) -> bool {
        false
    }

    fn disable_interrupts(&self) {}

    fn enable_interrupts(&self) {}

    fn halt(&self) {
        self.halted.store(true, Ordering::SeqCst);
    }

    fn capture_return_addresses(&self, pcs: &mut [usize]) -> usize {
        // A fixed three-frame chain stands in for the real stack walk.
        let chain = [0x1000usize, 0x2000, 0x3000];
        let depth = chain.len().min(pcs.len());
        pcs[..depth].copy_from_slice(&chain[..depth]);
        depth
    }
}

/// Condvar-backed scheduler double. A generation counter read while the
/// input lock is still held closes the window between releasing the lock and
/// blocking, so no wakeup is lost.
pub struct MockSched {
    generation: StdMutex<u64>,
    condvar: Condvar,
    pub killed: AtomicBool,
}

impl MockSched {
    pub fn new() -> Self {
        Self {
            generation: StdMutex::new(0),
            condvar: Condvar::new(),
            killed: AtomicBool::new(false),
        }
    }
}

impl Scheduler for MockSched {
    fn sleep<'a>(
        &self,
        lock: &'a Mutex<InputQueue>,
        guard: MutexGuard<'a, InputQueue>,
    ) -> MutexGuard<'a, InputQueue> {
        let seen = *self.generation.lock().unwrap();
        drop(guard);

        let mut generation = self.generation.lock().unwrap();
        while *generation == seen && !self.killed.load(Ordering::SeqCst) {
            let (next, _timeout) = self
                .condvar
                .wait_timeout(generation, Duration::from_millis(20))
                .unwrap();
            generation = next;
        }
        drop(generation);

        lock.lock()
    }

    fn wakeup(&self) {
        *self.generation.lock().unwrap() += 1;
        self.condvar.notify_all();
    }

    fn current_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }
}

pub struct MockIrq {
    pub keyboard_enabled: AtomicBool,
}

impl MockIrq {
    pub fn new() -> Self {
        Self {
            keyboard_enabled: AtomicBool::new(false),
        }
    }
}

impl IrqControl for MockIrq {
    fn enable_keyboard(&self) {
        self.keyboard_enabled.store(true, Ordering::SeqCst);
    }
}

pub struct MockRegistry {
    pub registered: AtomicBool,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self {
            registered: AtomicBool::new(false),
        }
    }
}

impl DeviceRegistry for MockRegistry {
    fn register_console(&self, _dev: &'static dyn CharDevice) {
        self.registered.store(true, Ordering::SeqCst);
    }
}

/// A console wired to fresh doubles, with handles kept for assertions.
pub struct TestBench {
    pub video: &'static MockVideo,
    pub serial: &'static MockSerial,
    pub cpu: &'static MockCpu,
    pub sched: &'static MockSched,
    pub irq: &'static MockIrq,
    pub hw: ConsoleHw,
    pub console: &'static Console,
}

pub fn bench() -> TestBench {
    let video: &'static MockVideo = Box::leak(Box::new(MockVideo::new()));
    let serial: &'static MockSerial = Box::leak(Box::new(MockSerial::new()));
    let cpu: &'static MockCpu = Box::leak(Box::new(MockCpu::new()));
    let sched: &'static MockSched = Box::leak(Box::new(MockSched::new()));
    let irq: &'static MockIrq = Box::leak(Box::new(MockIrq::new()));

    let hw = ConsoleHw {
        video,
        serial,
        cpu,
        sched,
        irq,
        mode: VideoMode {
            registers: &MODE_REGISTERS,
            font: &MODE_FONT,
        },
    };

    TestBench {
        video,
        serial,
        cpu,
        sched,
        irq,
        hw,
        console: Box::leak(Box::new(Console::new(hw))),
    }
}
