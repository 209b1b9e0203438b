#![allow(unused_imports)]
#![allow(dead_code)]
//! Shared test utilities for integration tests.
//!
//! Fakes for every OS and network seam of a provisioning run, so the whole
//! flow runs without a cluster or a validator binary.
//!
//! # Modules
//!
//! - `fakes`: scripted `AccountSource`, process table, launcher and health probe
//! - `setup`: config files, free ports and provisioner wiring

pub mod fakes;
pub mod setup;

pub use fakes::{FakeCluster, FakeLauncher, FakeLocator, FakeProbe, FakeTerminator, LaunchRecord};
pub use setup::{free_port, key, mint_account, write_config, Harness};
