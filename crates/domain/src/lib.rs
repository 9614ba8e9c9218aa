//! # threeway-domain
//!
//! Pure domain model for the threeway switch synchronizer.
//!
//! ## Responsibilities
//! - Foundational types: serial numbers, record identifiers, error conventions
//! - Define **Devices** (network switches and dimmers, with their last known state)
//! - Define **Descriptors** (what a discovery pass reports about a device)
//! - Define **Groups** (sets of switches wired to one circuit, with a primary)
//! - Classify transport failures (noise, unreachable, other)
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;

pub mod device;
pub mod group;
pub mod state;
