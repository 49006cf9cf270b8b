//! VOPRF(P-256, SHA-256) client-side primitives built on RustCrypto.
pub mod core;
pub mod dleq;

pub use self::core::{HashToCurve, Sswu};
pub use self::dleq::DleqProof;
