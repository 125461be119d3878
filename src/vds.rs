//! Visible Digital Seal – Non-Constrained (VDS-NC) records
//!
//! ICAO 9303 signed JSON credentials carrying vaccination or test events.
//! Decoding keeps the exact bytes of the signed `data` object so that the
//! signature can later be checked without re-serialising anything.

mod errors;
pub mod model;
mod reader;
pub mod uvci;

pub use errors::{DecodeError, DecodeResult};
pub use model::{
    SignatureAlgorithm, Vds, VdsData, VdsHeader, VdsMessage, VdsPerson, VdsSignature,
    VdsVaccinationDetail, VdsVaccinationEvent,
};
pub use reader::VdsReader;
pub use uvci::{UvciChecker, UvciRange};
