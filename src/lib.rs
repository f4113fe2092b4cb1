//! Canopy - hierarchical resource authorization
//!
//! Accounts are granted READ or WRITE on namespaces and objects; decisions
//! follow ownership and containment edges through a resource graph. This
//! library exposes all modules for testing purposes.

pub mod authz;
pub mod directory;
pub mod entities;
pub mod errors;
pub mod settings;
pub mod storage;
pub mod topology;
pub mod web;
