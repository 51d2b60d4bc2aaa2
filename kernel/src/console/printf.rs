//! Minimal formatted diagnostics with a closed conversion set.
//!
//! The console printer deliberately avoids `core::fmt`: it has to work from
//! the panic path with nothing behind it but the character choke point.
//! Arguments arrive as a tagged slice, and an unrecognized conversion prints
//! itself verbatim to draw attention instead of failing silently.

use core::sync::atomic::Ordering;

use super::vga::DEFAULT_COLOR;
use super::Console;

/// One formatted argument.
#[derive(Debug, Clone, Copy)]
pub enum Arg<'a> {
    /// `%d` — signed decimal.
    Int(i64),
    /// `%x` — unsigned hexadecimal.
    Hex(u64),
    /// `%p` — zero-padded hexadecimal at pointer width.
    Ptr(usize),
    /// `%s` — string; `None` prints `(null)`.
    Str(Option<&'a str>),
}

const DIGITS: &[u8; 16] = b"0123456789abcdef";

impl Console {
    /// Print `fmt` to the framebuffer and serial mirror, substituting `args`
    /// for `%`-conversions in order.
    ///
    /// Takes the output lock unless the panic path has disabled locking
    /// process-wide.
    pub fn printf(&self, fmt: &str, args: &[Arg]) {
        let restore = self.cpu.interrupts_enabled();
        self.cpu.disable_interrupts();

        {
            let _guard = self
                .locking
                .load(Ordering::Acquire)
                .then(|| self.output_lock.lock());
            self.format(fmt, args);
        }

        if restore {
            self.cpu.enable_interrupts();
        }
    }

    fn format(&self, fmt: &str, args: &[Arg]) {
        let mut args = args.iter();
        let mut bytes = fmt.bytes();

        while let Some(b) = bytes.next() {
            if b != b'%' {
                self.emit(b, DEFAULT_COLOR);
                continue;
            }
            let Some(conv) = bytes.next() else { break };
            match conv {
                b'%' => self.emit(b'%', DEFAULT_COLOR),
                b'd' | b'x' | b'p' | b's' => match args.next() {
                    Some(&Arg::Int(v)) if conv == b'd' => self.print_int(v),
                    Some(&Arg::Hex(v)) if conv == b'x' => self.print_hex(v),
                    Some(&Arg::Ptr(v)) if conv == b'p' => self.print_ptr(v),
                    Some(&Arg::Str(s)) if conv == b's' => {
                        for c in s.unwrap_or("(null)").bytes() {
                            self.emit(c, DEFAULT_COLOR);
                        }
                    }
                    // Missing or mismatched argument: print the conversion
                    // itself rather than losing the diagnostic.
                    _ => {
                        self.emit(b'%', DEFAULT_COLOR);
                        self.emit(conv, DEFAULT_COLOR);
                    }
                },
                _ => {
                    self.emit(b'%', DEFAULT_COLOR);
                    self.emit(conv, DEFAULT_COLOR);
                }
            }
        }
    }

    fn print_int(&self, v: i64) {
        // i64::MIN negates cleanly through the unsigned width.
        let mut x = v.unsigned_abs();
        let mut buf = [0u8; 20];
        let mut i = 0;
        loop {
            buf[i] = DIGITS[(x % 10) as usize];
            i += 1;
            x /= 10;
            if x == 0 {
                break;
            }
        }
        if v < 0 {
            self.emit(b'-', DEFAULT_COLOR);
        }
        while i > 0 {
            i -= 1;
            self.emit(buf[i], DEFAULT_COLOR);
        }
    }

    fn print_hex(&self, v: u64) {
        let mut x = v;
        let mut buf = [0u8; 16];
        let mut i = 0;
        loop {
            buf[i] = DIGITS[(x % 16) as usize];
            i += 1;
            x /= 16;
            if x == 0 {
                break;
            }
        }
        while i > 0 {
            i -= 1;
            self.emit(buf[i], DEFAULT_COLOR);
        }
    }

    fn print_ptr(&self, v: usize) {
        let width = core::mem::size_of::<usize>() * 2;
        for shift in (0..width).rev() {
            let nibble = (v >> (shift * 4)) & 0xf;
            self.emit(DIGITS[nibble], DEFAULT_COLOR);
        }
    }
}
