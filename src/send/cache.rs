// This module maps the cache hint carried by a message descriptor to the L1 and L3 policies the
// message encodes. Hardware without cache control always gets the default settings. A
// load-once load streams through L1 and stays cached in L3, and an unhinted prefetch is cached
// at both levels.

//! Caching directives attached to messages.
//!
//! A [`CacheHint`] on a descriptor is a request; this table maps it to the
//! L1/L3 policies the message encodes.

use std::fmt;

use super::message::{CacheHint, MessageDescriptor};
use crate::core::hw::HwConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CachePolicy {
    #[default]
    Default,
    Uncached,
    Cached,
    Streaming,
}

impl CachePolicy {
    pub fn name(self) -> &'static str {
        match self {
            CachePolicy::Default => "default",
            CachePolicy::Uncached => "uc",
            CachePolicy::Cached => "c",
            CachePolicy::Streaming => "s",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CacheSettings {
    pub l1: CachePolicy,
    pub l3: CachePolicy,
}

impl CacheSettings {
    pub const DEFAULT: CacheSettings = CacheSettings {
        l1: CachePolicy::Default,
        l3: CachePolicy::Default,
    };

    pub fn new(l1: CachePolicy, l3: CachePolicy) -> Self {
        Self { l1, l3 }
    }

    pub fn is_default(&self) -> bool {
        *self == Self::DEFAULT
    }
}

impl fmt::Display for CacheSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_default() {
            return f.write_str("default");
        }
        write!(f, "l1{}_l3{}", self.l1.name(), self.l3.name())
    }
}

/// Concrete cache policies for `msg` on `hw`.
pub fn cache_settings(msg: &MessageDescriptor, hw: &HwConfig) -> CacheSettings {
    if !hw.has_cache_hints {
        return CacheSettings::DEFAULT;
    }
    let op = msg.op();
    match msg.cache_hint() {
        CacheHint::LoadOnce if op.is_load() => {
            CacheSettings::new(CachePolicy::Streaming, CachePolicy::Cached)
        }
        CacheHint::Undef if op.is_prefetch() => {
            CacheSettings::new(CachePolicy::Cached, CachePolicy::Cached)
        }
        _ => CacheSettings::DEFAULT,
    }
}
