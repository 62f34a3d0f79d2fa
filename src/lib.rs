//! `lanlights` controls HSBK smart lights on the local network and runs timed color animations on
//! them.
//!
//! # Structure
//!
//! * [protocol]: binary frames exchanged with the devices over UDP
//! * [transport] and [retry]: request/response exchanges over an unreliable, possibly broadcast
//!   UDP socket
//! * [device]: discovery and control of single-color lights, zone strips and tile chains
//! * [color], [generators] and [geometry]: color values and the fields painted on devices
//! * [animation]: one cancellable frame loop per device
//! * [animations]: ready-made animations, including candle flames and wave fronts
//! * [config]: TOML configuration file

#[macro_use]
extern crate tracing;

pub mod animation;
pub mod animations;
pub mod color;
pub mod config;
pub mod device;
pub mod generators;
pub mod geometry;
pub mod protocol;
pub mod retry;
pub mod transport;

#[cfg(test)]
mod testing;
