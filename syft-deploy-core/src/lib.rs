#![doc = "syft-deploy-core: core logic library for syft-deploy."]

//! Dataset discovery, progress tracking, description generation and the bulk
//! command handlers. The crate holds no network code: remote calls go through
//! the traits in [`contract`], implemented by the `syft-deploy` binary and by
//! the exported mocks in tests.

pub mod catalog;
pub mod commands;
pub mod contract;
pub mod describe;
pub mod error;
pub mod progress;
pub mod slug;
