//! Trust envelopes: the document model and how one gets built and signed

pub mod builder;
pub mod model;

pub use builder::{assemble, build_envelope, sign, ProvenanceDeclaration};
pub use model::{
    envelope_now, AiTool, AnalysisResult, Confidence, Envelope, Integrity, OptionalContext,
    Provenance, ProvenanceMethod, ReviewLevel, Verification, OCTP_VERSION,
};
