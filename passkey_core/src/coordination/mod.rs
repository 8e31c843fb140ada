//! Ceremony coordination
//!
//! [`PasskeyCoordinator`] is the entry point for transport layers. It owns the
//! relying-party policy, the stores, the attestation format registry and the
//! clock, and hands each request to the registration or authentication flow.

mod passkey;

pub use passkey::PasskeyCoordinator;
