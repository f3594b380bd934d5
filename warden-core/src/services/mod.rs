//! Service layer for the login protection policy
//!
//! This module contains the service that turns attempt store contents into
//! login decisions.

pub mod brute_force;

pub use brute_force::BruteForceProtectionService;
