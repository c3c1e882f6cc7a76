//! Fixed tables for effect state blocks: the states accepted inside
//! `sampler_state`, `pass` and `pipeline` bodies, together with the named
//! values each state admits. State names and values match case-insensitively.

pub struct EffectStateValue {
    pub name: &'static str,
    pub value: i32,
}

pub struct EffectState {
    pub name: &'static str,
    pub d3d_render_state: i32,
    pub values: &'static [EffectStateValue],
}

const fn value(name: &'static str, value: i32) -> EffectStateValue {
    EffectStateValue { name, value }
}

const fn state(
    name: &'static str,
    d3d_render_state: i32,
    values: &'static [EffectStateValue],
) -> EffectState {
    EffectState {
        name,
        d3d_render_state,
        values,
    }
}

pub const BOOLEAN_VALUES: [EffectStateValue; 2] = [value("False", 0), value("True", 1)];

pub const TEXTURE_FILTERING_VALUES: [EffectStateValue; 4] = [
    value("None", 0),
    value("Point", 1),
    value("Linear", 2),
    value("Anisotropic", 3),
];

pub const TEXTURE_ADDRESSING_VALUES: [EffectStateValue; 5] = [
    value("Wrap", 1),
    value("Mirror", 2),
    value("Clamp", 3),
    value("Border", 4),
    value("MirrorOnce", 5),
];

pub const CULL_VALUES: [EffectStateValue; 3] =
    [value("None", 1), value("CW", 2), value("CCW", 3)];

pub const CMP_VALUES: [EffectStateValue; 8] = [
    value("Never", 1),
    value("Less", 2),
    value("Equal", 3),
    value("LessEqual", 4),
    value("Greater", 5),
    value("NotEqual", 6),
    value("GreaterEqual", 7),
    value("Always", 8),
];

pub const BLEND_VALUES: [EffectStateValue; 13] = [
    value("Zero", 1),
    value("One", 2),
    value("SrcColor", 3),
    value("InvSrcColor", 4),
    value("SrcAlpha", 5),
    value("InvSrcAlpha", 6),
    value("DestAlpha", 7),
    value("InvDestAlpha", 8),
    value("DestColor", 9),
    value("InvDestColor", 10),
    value("SrcAlphaSat", 11),
    value("BlendFactor", 14),
    value("InvBlendFactor", 15),
];

pub const BLEND_OP_VALUES: [EffectStateValue; 5] = [
    value("Add", 1),
    value("Subtract", 2),
    value("RevSubtract", 3),
    value("Min", 4),
    value("Max", 5),
];

pub const FILL_MODE_VALUES: [EffectStateValue; 3] = [
    value("Point", 1),
    value("Wireframe", 2),
    value("Solid", 3),
];

pub const STENCIL_OP_VALUES: [EffectStateValue; 8] = [
    value("Keep", 1),
    value("Zero", 2),
    value("Replace", 3),
    value("IncrSat", 4),
    value("DecrSat", 5),
    value("Invert", 6),
    value("Incr", 7),
    value("Decr", 8),
];

/// States that accept a bare numeric literal.
pub const INTEGER_VALUES: [EffectStateValue; 0] = [];
pub const FLOAT_VALUES: [EffectStateValue; 0] = [];

/// States accepted inside a `sampler_state` block. `Texture` takes an
/// angle-bracketed reference instead of a named value.
pub const SAMPLER_STATES: [EffectState; 11] = [
    state("Texture", 0, &[]),
    state("AddressU", 1, &TEXTURE_ADDRESSING_VALUES),
    state("AddressV", 2, &TEXTURE_ADDRESSING_VALUES),
    state("AddressW", 3, &TEXTURE_ADDRESSING_VALUES),
    state("MagFilter", 5, &TEXTURE_FILTERING_VALUES),
    state("MinFilter", 6, &TEXTURE_FILTERING_VALUES),
    state("MipFilter", 7, &TEXTURE_FILTERING_VALUES),
    state("MipMapLodBias", 8, &FLOAT_VALUES),
    state("MaxMipLevel", 9, &INTEGER_VALUES),
    state("MaxAnisotropy", 10, &INTEGER_VALUES),
    state("sRGBTexture", 11, &BOOLEAN_VALUES),
];

/// Render states accepted inside `pass` and `pipeline` blocks.
pub const EFFECT_STATES: [EffectState; 24] = [
    state("ZEnable", 7, &BOOLEAN_VALUES),
    state("FillMode", 8, &FILL_MODE_VALUES),
    state("ZWriteEnable", 14, &BOOLEAN_VALUES),
    state("AlphaTestEnable", 15, &BOOLEAN_VALUES),
    state("SrcBlend", 19, &BLEND_VALUES),
    state("DestBlend", 20, &BLEND_VALUES),
    state("CullMode", 22, &CULL_VALUES),
    state("ZFunc", 23, &CMP_VALUES),
    state("AlphaRef", 24, &INTEGER_VALUES),
    state("AlphaFunc", 25, &CMP_VALUES),
    state("DitherEnable", 26, &BOOLEAN_VALUES),
    state("AlphaBlendEnable", 27, &BOOLEAN_VALUES),
    state("StencilEnable", 52, &BOOLEAN_VALUES),
    state("StencilFail", 53, &STENCIL_OP_VALUES),
    state("StencilZFail", 54, &STENCIL_OP_VALUES),
    state("StencilPass", 55, &STENCIL_OP_VALUES),
    state("StencilFunc", 56, &CMP_VALUES),
    state("StencilRef", 57, &INTEGER_VALUES),
    state("StencilMask", 58, &INTEGER_VALUES),
    state("StencilWriteMask", 59, &INTEGER_VALUES),
    state("ColorWriteEnable", 168, &INTEGER_VALUES),
    state("BlendOp", 171, &BLEND_OP_VALUES),
    state("SrcBlendAlpha", 207, &BLEND_VALUES),
    state("DestBlendAlpha", 208, &BLEND_VALUES),
];

pub fn find_sampler_state(name: &str) -> Option<&'static EffectState> {
    SAMPLER_STATES
        .iter()
        .find(|state| state.name.eq_ignore_ascii_case(name))
}

pub fn find_effect_state(name: &str) -> Option<&'static EffectState> {
    EFFECT_STATES
        .iter()
        .find(|state| state.name.eq_ignore_ascii_case(name))
}

pub fn find_state_value(state: &EffectState, name: &str) -> Option<i32> {
    state
        .values
        .iter()
        .find(|candidate| candidate.name.eq_ignore_ascii_case(name))
        .map(|candidate| candidate.value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_lookup_is_case_insensitive() {
        assert!(find_effect_state("cullmode").is_some());
        assert!(find_effect_state("CULLMODE").is_some());
        assert!(find_effect_state("NoSuchState").is_none());
    }

    #[test]
    fn value_lookup_resolves_named_codes() {
        let cull = find_effect_state("CullMode").unwrap();
        assert_eq!(find_state_value(cull, "None"), Some(1));
        assert_eq!(find_state_value(cull, "ccw"), Some(3));
        assert_eq!(find_state_value(cull, "Sideways"), None);
    }

    #[test]
    fn sampler_states_are_distinct_from_render_states() {
        assert!(find_sampler_state("AddressU").is_some());
        assert!(find_effect_state("AddressU").is_none());
        assert!(find_sampler_state("CullMode").is_none());
    }
}
