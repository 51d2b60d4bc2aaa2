//! Console character device: line-buffered input, color VGA output with a
//! serial mirror, formatted diagnostics and the kernel panic protocol.
//!
//! One [`Console`] exists per running kernel, created by [`init`] and handed
//! around as `&'static Console`. Output is serialized by a spin-lock that
//! thread-context callers take with interrupts disabled, so the echo path in
//! the keyboard interrupt handler can spin on it safely. Input state lives
//! behind its own lock, which also backs the blocking-read condition.

pub mod input;
pub mod printf;
pub mod vga;

use core::sync::atomic::{AtomicBool, Ordering};

use conquer_once::spin::OnceCell;
use spin::Mutex;

use crate::hal::{ConsoleHw, CpuOps, DeviceRegistry, Scheduler, SerialSink};
use input::InputQueue;
use vga::Vga;

pub use printf::Arg;
pub use vga::{Color, ColorCode};

/// Errors surfaced by the character-device contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleError {
    /// The calling thread was killed while blocked in `read`.
    Cancelled,
}

/// Character-device hooks the kernel's device table dispatches through.
pub trait CharDevice: Sync {
    fn read(&self, dst: &mut [u8]) -> Result<usize, ConsoleError>;
    fn write(&self, src: &[u8]) -> usize;
}

/// The process-wide console singleton, created once by [`init`] and never
/// torn down.
pub static CONSOLE: OnceCell<Console> = OnceCell::uninit();

/// Return-address capture depth for the panic trace.
const MAX_BACKTRACE: usize = 10;

pub struct Console {
    vga: Vga,
    serial: &'static dyn SerialSink,
    cpu: &'static dyn CpuOps,
    sched: &'static dyn Scheduler,
    /// Serializes all output across CPUs. Guards no data of its own: the
    /// cursor lives in hardware registers and the cells in video memory.
    output_lock: Mutex<()>,
    /// Cleared by the panic path so diagnostics can bypass a lock that a
    /// frozen CPU may still hold.
    locking: AtomicBool,
    /// One-way frozen flag. Once set, any output attempt from another CPU
    /// spins forever in [`Console::emit`].
    panicked: AtomicBool,
    pub(crate) input: Mutex<InputQueue>,
}

impl Console {
    /// Wire up a console against the given platform capabilities.
    pub fn new(hw: ConsoleHw) -> Self {
        Self {
            vga: Vga::new(hw.video, hw.mode),
            serial: hw.serial,
            cpu: hw.cpu,
            sched: hw.sched,
            output_lock: Mutex::new(()),
            locking: AtomicBool::new(true),
            panicked: AtomicBool::new(false),
            input: Mutex::new(InputQueue::new()),
        }
    }

    /// Route one character to the framebuffer, then the serial mirror.
    ///
    /// This is the choke point every output path funnels through, and it is
    /// where a CPU discovers that another CPU has panicked — in which case
    /// the call never returns. Callers hold the output lock, except for the
    /// panic path after it has disabled locking.
    pub(crate) fn emit(&self, c: u8, color: ColorCode) {
        if self.panicked.load(Ordering::Relaxed) {
            self.cpu.disable_interrupts();
            loop {
                core::hint::spin_loop();
            }
        }
        self.vga.putc(c, color);
        self.serial.put(c);
    }

    /// Emit one character with an explicit color, under the output lock.
    pub fn putc(&self, c: u8, color: ColorCode) {
        let restore = self.cpu.interrupts_enabled();
        self.cpu.disable_interrupts();
        {
            let _guard = self.output_lock.lock();
            self.emit(c, color);
        }
        if restore {
            self.cpu.enable_interrupts();
        }
    }

    /// Echo one typed character from the interrupt handler. Interrupts are
    /// already off in that context, so spinning on the output lock is safe:
    /// any thread-context holder runs with interrupts disabled and will
    /// release it.
    pub(crate) fn echo(&self, c: u8) {
        let _guard = self.output_lock.lock();
        self.emit(c, vga::DEFAULT_COLOR);
    }

    /// Echo a visual erase: back up, blank the glyph, back up again.
    pub(crate) fn echo_erase(&self) {
        let _guard = self.output_lock.lock();
        self.emit(0x08, vga::DEFAULT_COLOR);
        self.emit(b' ', vga::DEFAULT_COLOR);
        self.emit(0x08, vga::DEFAULT_COLOR);
    }

    /// Raw pass-through write for the character device; no format
    /// interpretation.
    pub fn write(&self, src: &[u8]) -> usize {
        let restore = self.cpu.interrupts_enabled();
        self.cpu.disable_interrupts();
        {
            let _guard = self.output_lock.lock();
            for &c in src {
                self.emit(c, vga::DEFAULT_COLOR);
            }
        }
        if restore {
            self.cpu.enable_interrupts();
        }
        src.len()
    }

    /// Kernel panic protocol: dump diagnostics unlocked, freeze every other
    /// CPU's console output, halt this CPU. Never returns.
    pub fn panic(&self, msg: &str) -> ! {
        self.cpu.disable_interrupts();
        // The output lock may be held by a CPU frozen mid-print; from here
        // on, printing bypasses it.
        self.locking.store(false, Ordering::SeqCst);

        self.printf("\n\nPANIC on cpu %d\n ", &[Arg::Int(self.cpu.id() as i64)]);
        self.printf(msg, &[]);
        self.printf("\nSTACK:\n", &[]);

        let mut pcs = [0usize; MAX_BACKTRACE];
        let depth = self.cpu.capture_return_addresses(&mut pcs);
        for (i, &pc) in pcs[..depth].iter().enumerate() {
            self.printf(" [%d] %p\n", &[Arg::Int(i as i64), Arg::Ptr(pc)]);
        }
        self.printf("HLT\n", &[]);

        self.panicked.store(true, Ordering::SeqCst);
        self.cpu.halt();
        loop {
            core::hint::spin_loop();
        }
    }
}

impl CharDevice for Console {
    fn read(&self, dst: &mut [u8]) -> Result<usize, ConsoleError> {
        Console::read(self, dst)
    }

    fn write(&self, src: &[u8]) -> usize {
        Console::write(self, src)
    }
}

/// One-time console bring-up.
///
/// Creates the singleton, installs the serial logger, registers the
/// character device with the kernel's device table, unmasks the keyboard
/// interrupt line, programs the video mode and clears the screen, then
/// prints the startup banner.
pub fn init(hw: ConsoleHw, devices: &'static dyn DeviceRegistry) -> &'static Console {
    CONSOLE
        .try_init_once(|| Console::new(hw))
        .expect("console: init called twice");
    let console = CONSOLE.try_get().expect("console: initialized above");

    crate::logger::init(hw.serial, log::LevelFilter::Info);

    devices.register_console(console);
    hw.irq.enable_keyboard();

    console.vga.init_mode();
    console.vga.set_background(Color::Black);

    console.printf("VGA ", &[]);
    for (c, fg) in [
        (b'C', Color::Red),
        (b'O', Color::Magenta),
        (b'L', Color::LightGreen),
        (b'O', Color::Yellow),
        (b'R', Color::Green),
    ] {
        console.putc(c, ColorCode::new(fg, Color::Black));
    }
    console.printf(" Console\n", &[]);

    log::info!("console: initialized");
    console
}
