// This module describes the target GPU. HwGen lists the supported generations in release order,
// so that hardware rules can compare generations directly. HwConfig derives the register granule,
// the maximum lane count and the availability of 2D block and cache-control messages from the
// generation, and allows tests and tools to override the granule and lane count.

//! Hardware capability descriptor.
//!
//! [`HwConfig`] is the read-only view of the target GPU that message
//! construction and decomposition consult: register-file granule size,
//! maximum lane count and the optional 2D block and cache-control
//! extensions. Generations are totally ordered so that rules can be written
//! as "XeHPC and newer".

use std::fmt;
use std::str::FromStr;

use super::error::{enum_name, parse_enum, ParseError};

/// GPU hardware generation, oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HwGen {
    Gen9,
    Gen11,
    XeLp,
    XeHp,
    XeHpg,
    XeHpc,
    Xe2,
    Xe3,
}

const HW_GEN_NAMES: [(HwGen, &str); 8] = [
    (HwGen::Gen9, "gen9"),
    (HwGen::Gen11, "gen11"),
    (HwGen::XeLp, "xelp"),
    (HwGen::XeHp, "xehp"),
    (HwGen::XeHpg, "xehpg"),
    (HwGen::XeHpc, "xehpc"),
    (HwGen::Xe2, "xe2"),
    (HwGen::Xe3, "xe3"),
];

impl HwGen {
    pub fn name(self) -> &'static str {
        enum_name(&HW_GEN_NAMES, self)
    }
}

impl fmt::Display for HwGen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HwGen {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_enum(&HW_GEN_NAMES, "hardware generation", s)
    }
}

/// Capabilities of the target hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HwConfig {
    /// Hardware generation.
    pub gen: HwGen,
    /// Register-file granule in bytes.
    pub grf_size: u32,
    /// Widest SIMD message supported (slots per scattered message).
    pub max_lanes: u32,
    /// 2D block (tile) load/store/prefetch messages are available.
    pub has_tile_transfer: bool,
    /// Per-message L1/L3 cache control is available.
    pub has_cache_hints: bool,
}

impl HwConfig {
    pub fn new(gen: HwGen) -> Self {
        let hpc = gen >= HwGen::XeHpc;
        Self {
            gen,
            grf_size: if hpc { 64 } else { 32 },
            max_lanes: if hpc { 32 } else { 16 },
            has_tile_transfer: hpc,
            has_cache_hints: gen >= HwGen::XeHpg,
        }
    }

    pub fn with_grf_size(mut self, grf_size: u32) -> Self {
        assert!(grf_size.is_power_of_two(), "GRF size must be a power of two");
        self.grf_size = grf_size;
        self
    }

    pub fn with_max_lanes(mut self, max_lanes: u32) -> Self {
        assert!(
            max_lanes.is_power_of_two() && max_lanes <= 32,
            "Lane count must be a power of two no larger than 32"
        );
        self.max_lanes = max_lanes;
        self
    }

    pub fn is_xe_hp_plus(&self) -> bool {
        self.gen >= HwGen::XeHp
    }

    pub fn is_xe_hpc_plus(&self) -> bool {
        self.gen >= HwGen::XeHpc
    }

    /// Per-element masking is the default message mode from XeHPC on.
    pub fn default_fine_grained(&self) -> bool {
        self.is_xe_hpc_plus()
    }

    /// Older generations have a 16-bit mask field that block messages reuse
    /// round-robin.
    pub fn mask_cap_applies(&self) -> bool {
        !self.is_xe_hpc_plus()
    }
}
