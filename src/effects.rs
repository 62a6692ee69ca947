//! Effects that ship with the crate.

pub mod bouncing_boxes;
pub mod xor_lines;

use crate::effect::EffectDescriptor;

/// Descriptors for every built-in effect.
pub fn builtins() -> Vec<EffectDescriptor> {
    vec![xor_lines::descriptor(), bouncing_boxes::descriptor()]
}
