//! Kernel console subsystem.
//!
//! Turns raw keyboard-interrupt events into a line-buffered input stream for
//! blocking reader threads, renders output characters with per-character
//! color onto the VGA text framebuffer (mirrored to serial), and implements
//! the kernel's panic protocol: once one CPU starts reporting a fatal
//! condition, console output on every other CPU freezes permanently.
//!
//! All hardware access goes through the capability traits in [`hal`], so the
//! renderer and line discipline run unmodified under the host test harness
//! against in-memory doubles. Production implementations for x86_64 live in
//! [`hal::x86`].

#![cfg_attr(not(test), no_std)]

pub mod console;
pub mod hal;
pub mod logger;

pub use console::{Arg, CharDevice, Color, ColorCode, Console, ConsoleError, CONSOLE};
