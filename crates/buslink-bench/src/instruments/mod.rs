//! Concrete virtual instruments.
//!
//! Each instrument implements the [`buslink_core::Peripheral`] capability
//! contract and is registered with the bank once at startup.  Register
//! layouts are fixed byte structures; some offsets are plain storage, some
//! are actionable (write triggers a model step) and some self-clearing
//! (read returns the value then resets it, modeling interrupt-flag
//! registers).

pub mod dcmotor;
pub mod keypad;
pub mod motor;
pub mod uart;
