pub mod detector;
pub mod document;
pub mod fingerprint;

pub use detector::{
    FingerprintRecord, FingerprintStore, JsonFingerprintStore, MemoryFingerprintStore,
    ModificationDetector, RegionState,
};
pub use document::{parse, render, Document, Region, Segment};
pub use fingerprint::ContentFingerprint;
