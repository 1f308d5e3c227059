pub mod algorithm;
pub mod build;
pub mod error;
pub mod hasher;
pub mod localize;
pub mod manifest;
pub mod path_safety;
pub mod report;
pub mod verify;
pub mod walk;

pub use algorithm::Algorithm;
pub use build::{BuildOptions, BuildOutput, Builder};
pub use error::{Error, Result};
pub use manifest::{FileRecord, Manifest, ManifestFormat};
pub use verify::{verify, Reconciliation, Summary, VerifyOptions};
