//! Built-in megacomplexes.

pub mod baseline;
pub mod coherent_artifact;
pub mod damped_oscillation;
pub mod decay;
pub mod spectral;

pub use baseline::Baseline;
pub use coherent_artifact::CoherentArtifact;
pub use damped_oscillation::{DampedOscillation, Oscillation};
pub use decay::{decay_basis, DecayMegacomplex, DecayScheme};
pub use spectral::{SpectralMegacomplex, SpectralShape};
