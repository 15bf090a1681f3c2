//! Fixed-length global shape descriptor signatures

/// Number of bins in a Viewpoint Feature Histogram
pub const VFH_SIZE: usize = 308;

/// Number of bins in an Ensemble of Shape Functions histogram
pub const ESF_SIZE: usize = 640;

/// Viewpoint Feature Histogram: three angular pair-feature histograms, a
/// distance histogram and a viewpoint-angle histogram over the whole cloud.
#[derive(Debug, Clone, PartialEq)]
pub struct VfhSignature {
    pub histogram: [f32; VFH_SIZE],
}

/// Ensemble of Shape Functions: angle, area and distance histograms sampled
/// from random point triples, split by surface occupancy.
#[derive(Debug, Clone, PartialEq)]
pub struct EsfSignature {
    pub histogram: [f32; ESF_SIZE],
}

impl VfhSignature {
    /// An all-zero signature, emitted in place of a descriptor that could not be computed
    pub fn zeroed() -> Self {
        Self { histogram: [0.0; VFH_SIZE] }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.histogram
    }
}

impl EsfSignature {
    /// An all-zero signature, emitted in place of a descriptor that could not be computed
    pub fn zeroed() -> Self {
        Self { histogram: [0.0; ESF_SIZE] }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.histogram
    }
}

impl Default for VfhSignature {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl Default for EsfSignature {
    fn default() -> Self {
        Self::zeroed()
    }
}
