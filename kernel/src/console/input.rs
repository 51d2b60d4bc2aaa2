//! Line-buffered keyboard input: the edit/commit ring buffer and the
//! blocking read side of the console device.
//!
//! Three monotonically increasing indices split the ring into a committed
//! region `[r, w)` visible to readers and a pending region `[w, e)` owned by
//! the line editor, so backspace and kill-line never disturb data a reader
//! may already be draining.

use spin::MutexGuard;

use super::{Console, ConsoleError};

/// Capacity of the raw input ring.
pub const INPUT_BUF: usize = 128;

/// Acquisition attempts the interrupt-context producer makes before giving
/// up on the input lock.
const LOCK_RETRIES: usize = 100;

/// Translate a character to its control-key code.
const fn ctrl(c: u8) -> u8 {
    c.wrapping_sub(b'@')
}

const ERASE: u8 = ctrl(b'H');
const DEL: u8 = 0x7f;
const KILL_LINE: u8 = ctrl(b'U');
const EOF: u8 = ctrl(b'D');

/// Raw input ring buffer.
///
/// The indices are unbounded counters compared directly and reduced modulo
/// [`INPUT_BUF`] only for storage, which keeps `r <= w <= e` and
/// `e - r <= INPUT_BUF` as plain integer invariants with no wrap handling in
/// the comparisons.
pub struct InputQueue {
    buf: [u8; INPUT_BUF],
    /// Next byte a reader will take.
    r: usize,
    /// Boundary between committed and pending bytes.
    w: usize,
    /// Next insertion point for a freshly typed byte.
    e: usize,
}

impl InputQueue {
    pub(crate) const fn new() -> Self {
        Self {
            buf: [0; INPUT_BUF],
            r: 0,
            w: 0,
            e: 0,
        }
    }
}

impl Console {
    /// Keyboard interrupt entry: drain `getc` until it runs dry, applying
    /// line editing and committing completed lines to readers.
    ///
    /// Runs in interrupt context and never blocks. The interrupted thread
    /// may itself hold the input lock, and on that CPU it can never release
    /// it while the handler spins, so the lock is taken with a bounded
    /// number of attempts. Reader critical sections are short, so the
    /// retries ride out a holder on another CPU; if the lock stays held,
    /// the key events are drained from the hardware and dropped.
    pub fn handle_interrupt(&self, getc: &mut dyn FnMut() -> Option<u8>) {
        let Some(mut input) = self.try_lock_input() else {
            while getc().is_some() {}
            return;
        };

        while let Some(c) = getc() {
            match c {
                KILL_LINE => {
                    while input.e != input.w && input.buf[(input.e - 1) % INPUT_BUF] != b'\n' {
                        input.e -= 1;
                        self.echo_erase();
                    }
                }
                ERASE | DEL => {
                    if input.e != input.w {
                        input.e -= 1;
                        self.echo_erase();
                    }
                }
                _ => {
                    if c != 0 && input.e - input.r < INPUT_BUF {
                        let c = if c == b'\r' { b'\n' } else { c };
                        let slot = input.e % INPUT_BUF;
                        input.buf[slot] = c;
                        input.e += 1;
                        self.echo(c);

                        if c == b'\n' || c == EOF || input.e == input.r + INPUT_BUF {
                            // A whole line (or end-of-file, or a full queue)
                            // has arrived; hand it to the readers.
                            input.w = input.e;
                            self.sched.wakeup();
                        }
                    }
                }
            }
        }
    }

    fn try_lock_input(&self) -> Option<MutexGuard<'_, InputQueue>> {
        for _ in 0..LOCK_RETRIES {
            if let Some(guard) = self.input.try_lock() {
                return Some(guard);
            }
            core::hint::spin_loop();
        }
        None
    }

    /// Blocking line-buffered read for the character device.
    ///
    /// Sleeps while no committed bytes are available, re-testing on every
    /// wake. A Ctrl-D found after data has already been collected in this
    /// call is pushed back for the next call, so end-of-file always arrives
    /// as its own zero-byte result.
    pub fn read(&self, dst: &mut [u8]) -> Result<usize, ConsoleError> {
        let mut n = 0;

        let mut input = self.input.lock();
        while n < dst.len() {
            while input.r == input.w {
                if self.sched.current_killed() {
                    return Err(ConsoleError::Cancelled);
                }
                input = self.sched.sleep(&self.input, input);
            }

            let c = input.buf[input.r % INPUT_BUF];
            input.r += 1;

            if c == EOF {
                if n > 0 {
                    // Save the Ctrl-D for the next call.
                    input.r -= 1;
                }
                break;
            }

            dst[n] = c;
            n += 1;

            if c == b'\n' {
                break;
            }
        }

        Ok(n)
    }
}
