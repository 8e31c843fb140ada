mod core;
mod none;
mod packed;
mod u2f;
mod utils;

pub use self::core::{AttestationFormat, AttestationFormats, AttestationInput};
