//! # buslink-bench
//!
//! The out-of-process instrument application.  A hardware/firmware simulator
//! launches this process with three positional arguments — main port, irq
//! port, and its own address — and the process connects back, then serves one
//! memory-mapped address space assembled from virtual instruments.
//!
//! Module map:
//! - [`link`] — the two TCP channels (request/response "main", unsolicited
//!   "irq") and their exact-size packet framing.
//! - [`server`] — the serving loop and the irq pump task.
//! - [`instruments`] — concrete devices: keypad, DC motor, UART over a
//!   Wishbone bus model.
//! - [`config`] — optional TOML tuning (bus tick budget, motor step size,
//!   default log level).

pub mod config;
pub mod instruments;
pub mod link;
pub mod server;
