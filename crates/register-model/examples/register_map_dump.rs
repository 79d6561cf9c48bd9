//! Register map dump for a small peripheral block.
//!
//! Builds a UART register file, instantiates it twice inside a system map,
//! drives a few accesses through callbacks and prints every dump format.
//!
//! ## Usage
//!
//! ```sh
//! cargo run -p register-model --example register_map_dump
//! ```
//!
//! ## Output
//!
//! - Layout table of the system map and of each nested file
//! - Flattened register list with absolute offsets
//! - Field layout and detailed view of the UART control register

#![allow(clippy::pedantic)]

use std::cell::Cell;
use std::rc::Rc;

use bitvec as _;
use proptest as _;
use register_model::{AccessMode, RegisterArena, Result};
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;

fn main() -> Result<()> {
    let mut arena = RegisterArena::new();

    let uart = arena.create_file("UART", "Universal asynchronous receiver-transmitter", 4)?;
    {
        let mut view = arena.file_mut(uart)?;
        view.create_register(0x0, 8, "DATA", "Receive/transmit holding register", AccessMode::ReadWrite)?;
        let ctrl = view.create_register(0x4, 32, "CTRL", "Control register", AccessMode::Unspecified)?;
        view.create_register(0x8, 32, "STATUS", "Status flags", AccessMode::ReadOnly)?;
        view.create_register_block(0x10, 4, 32, "SCRATCH", "Scratch word", AccessMode::ReadWrite)?;

        let ctrl = arena.register_mut(ctrl)?;
        ctrl.create_field("ENABLE", 0, 0, "Transceiver enable", AccessMode::ReadWrite)?;
        ctrl.create_field("PARITY", 2, 1, "Parity selection", AccessMode::ReadWrite)?;
        ctrl.create_field("BAUD_DIV", 15, 4, "Baud rate divider", AccessMode::ReadWrite)?;
        ctrl.create_field("VERSION", 31, 24, "Hardware revision", AccessMode::ReadOnly)?;
    }

    let system = arena.create_file("SoC", "System register map", 4)?;
    {
        let mut view = arena.file_mut(system)?;
        view.create_register(0x0, 32, "ID", "Chip identifier", AccessMode::ReadOnly)?;
        view.add_register_file_copy(0x100, uart, None)?;
        view.add_register_file_copy(0x200, uart, Some(0x40))?;
    }

    let writes = Rc::new(Cell::new(0_u32));
    {
        let mut view = arena.file_mut(system)?;
        let counter = Rc::clone(&writes);
        view.register_at_mut(0x204)?
            .register_post_write_callback(move |_| counter.set(counter.get() + 1));
        view.write(0x204, &[0xA5, 0x3C, 0x00, 0xFF])?;
        view.write(0x104, &[0x01])?;
    }

    let view = arena.file(system)?;
    println!("{}", view.recursive_info(0));
    println!("{}", view.flattened_info());
    println!("{}", view.register_at(0x204)?.info(0));
    println!("{}", view.register_info_at(0x204)?);
    println!("post-write callbacks fired: {}", writes.get());
    Ok(())
}
