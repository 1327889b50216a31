//! Pipeline-wide configuration. Constructed by the caller; this crate never
//! parses a config file or CLI flags itself (see crate root docs).

/// How a subgroup-wide active-lane mask is represented once mask lowering
/// has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubgroupMaskRepresentation {
    /// SPIR-V `GroupNonUniformBallot`'s native 4xi32 vector. Needs lane
    /// extraction and widening to recover a flat 64-bit mask.
    SpvKHRBallot,
    /// A native 64-bit integer mask, already flat.
    I64,
}

impl Default for SubgroupMaskRepresentation {
    fn default() -> Self {
        SubgroupMaskRepresentation::SpvKHRBallot
    }
}

/// Options recognized by the arena, the mask-lowering pass, and the emitter.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub subgroup_mask_representation: SubgroupMaskRepresentation,
    pub subgroup_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            subgroup_mask_representation: SubgroupMaskRepresentation::default(),
            subgroup_size: 32,
        }
    }
}
