//! stagesrc library exports.
//!
//! Exposes the negotiators, their collaborator interfaces, and the shared
//! primitives for integration testing and for the loader binary.

pub mod copy;
pub mod error;
pub mod fetch;
pub mod kickstart;
pub mod meminfo;
pub mod mount;
pub mod netinfo;
pub mod nfs;
pub mod paths;
pub mod product;
pub mod source;
pub mod stage2;
pub mod state;
pub mod transfer;
pub mod ui;
pub mod url;
pub mod validate;
