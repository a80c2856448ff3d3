//! Central error handling for the lightmap baker
//!
//! Provides a unified BakeError enum with consistent categorization so that
//! every failure can be traced back to the chunk and collaborator that caused it.

use glam::IVec3;

/// Cached artifact kinds, used to report which load missed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    GeometryBuffers,
    ChunkVicinity,
}

impl ArtifactKind {
    pub fn name(&self) -> &'static str {
        match self {
            ArtifactKind::GeometryBuffers => "geometry buffers",
            ArtifactKind::ChunkVicinity => "chunk vicinity",
        }
    }
}

/// Centralized error type for all baking operations
#[derive(thiserror::Error, Debug)]
pub enum BakeError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Missing {} for chunk ({}, {}, {})", artifact.name(), chunk.x, chunk.y, chunk.z)]
    MissingArtifact { chunk: IVec3, artifact: ArtifactKind },

    #[error("Cannot run {phase} before {requires} has finished every chunk")]
    PhaseOrder { phase: &'static str, requires: &'static str },

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Collaborator error: {0}")]
    Collaborator(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BakeError {
    /// Short category prefix, handy for log lines
    pub fn category(&self) -> &'static str {
        match self {
            BakeError::Backend(_) => "Backend",
            BakeError::MissingArtifact { .. } => "MissingArtifact",
            BakeError::PhaseOrder { .. } => "PhaseOrder",
            BakeError::Cache(_) => "Cache",
            BakeError::Collaborator(_) => "Collaborator",
            BakeError::Config(_) => "Config",
            BakeError::Io(_) => "IO",
            BakeError::Serialization(_) => "Serialization",
        }
    }

    /// Convenience constructors for common error types
    pub fn backend<T: ToString>(msg: T) -> Self {
        BakeError::Backend(msg.to_string())
    }

    pub fn cache<T: ToString>(msg: T) -> Self {
        BakeError::Cache(msg.to_string())
    }

    pub fn collaborator<T: ToString>(msg: T) -> Self {
        BakeError::Collaborator(msg.to_string())
    }

    pub fn config<T: ToString>(msg: T) -> Self {
        BakeError::Config(msg.to_string())
    }

    pub fn missing(chunk: IVec3, artifact: ArtifactKind) -> Self {
        BakeError::MissingArtifact { chunk, artifact }
    }
}

impl From<anyhow::Error> for BakeError {
    fn from(err: anyhow::Error) -> Self {
        BakeError::Backend(format!("{err:#}"))
    }
}

/// Result type alias for baking operations
pub type BakeResult<T> = Result<T, BakeError>;
