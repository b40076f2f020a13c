//! Error types for phyz-impm.

use thiserror::Error;

use crate::config::UpdateMethod;

#[derive(Debug, Error)]
pub enum ImpmError {
    #[error(
        "deformation gradient of particle {particle} in object {object} is inverted (det F = {determinant:e}); \
         the time step is too large or the material response is unstable"
    )]
    InvertedDeformation {
        object: usize,
        particle: usize,
        determinant: f64,
    },

    #[error("invertible MPM only supports the CPDI2 update method, got {0:?}")]
    UnsupportedUpdateMethod(UpdateMethod),

    #[error("grid velocity of object {object} at node {node} is missing during velocity transfer")]
    MissingGridVelocity { object: usize, node: usize },

    #[error("object index {0} out of range")]
    ObjectOutOfRange(usize),

    #[error("particle index {particle} out of range for object {object}")]
    ParticleOutOfRange { object: usize, particle: usize },

    #[error("domain corner index {corner} out of range for object {object}")]
    CornerOutOfRange { object: usize, corner: usize },

    #[error("grid node {0:?} out of range")]
    NodeOutOfRange(Vec<usize>),

    #[error("invalid particle: {0}")]
    InvalidParticle(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("config parse error: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ImpmError>;
