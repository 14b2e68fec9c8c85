#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

// Shared logic for the SwitchBank channel controller.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library and exposing abstractions the other crates can adopt.

pub mod buttons;
pub mod channels;
pub mod controller;
pub mod protocol;
pub mod telemetry;
