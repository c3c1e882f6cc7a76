use once_cell::sync::Lazy;

use crate::types::BaseType;

pub const MAX_INTRINSIC_ARGS: usize = 4;

/// Signature of a built-in function. Arguments are implicitly const; the
/// parser materializes full types when it ranks a call against the table.
pub struct Intrinsic {
    pub name: &'static str,
    pub return_type: BaseType,
    pub args: [BaseType; MAX_INTRINSIC_ARGS],
    pub num_args: u8,
}

impl Intrinsic {
    fn new(name: &'static str, return_type: BaseType, args: &[BaseType]) -> Self {
        let mut stored = [BaseType::Unknown; MAX_INTRINSIC_ARGS];
        stored[..args.len()].copy_from_slice(args);
        Intrinsic {
            name,
            return_type,
            args: stored,
            num_args: args.len() as u8,
        }
    }

    pub fn arg_types(&self) -> &[BaseType] {
        &self.args[..self.num_args as usize]
    }
}

/// Float and half, scalar through vector4: the variant set every
/// component-wise math intrinsic is instantiated over.
const FLOAT_VARIANTS: [BaseType; 8] = [
    BaseType::Float,
    BaseType::Float2,
    BaseType::Float3,
    BaseType::Float4,
    BaseType::Half,
    BaseType::Half2,
    BaseType::Half3,
    BaseType::Half4,
];

struct TableBuilder {
    table: Vec<Intrinsic>,
}

impl TableBuilder {
    fn add(&mut self, name: &'static str, return_type: BaseType, args: &[BaseType]) {
        self.table.push(Intrinsic::new(name, return_type, args));
    }

    /// `name(T) -> T` over all float/half variants.
    fn component_wise1(&mut self, name: &'static str) {
        for ty in FLOAT_VARIANTS {
            self.add(name, ty, &[ty]);
        }
    }

    /// `name(T, T) -> T` over all float/half variants.
    fn component_wise2(&mut self, name: &'static str) {
        for ty in FLOAT_VARIANTS {
            self.add(name, ty, &[ty, ty]);
        }
    }

    /// `name(T, T, T) -> T` over all float/half variants.
    fn component_wise3(&mut self, name: &'static str) {
        for ty in FLOAT_VARIANTS {
            self.add(name, ty, &[ty, ty, ty]);
        }
    }

    /// `name(T) -> scalar` over all float/half variants.
    fn reducing1(&mut self, name: &'static str) {
        for ty in FLOAT_VARIANTS {
            self.add(name, ty.scalar_type(), &[ty]);
        }
    }

    /// `name(T, T) -> scalar` over all float/half variants.
    fn reducing2(&mut self, name: &'static str) {
        for ty in FLOAT_VARIANTS {
            self.add(name, ty.scalar_type(), &[ty, ty]);
        }
    }

    /// `name(T) -> bool` over float, half and bool variants.
    fn predicate1(&mut self, name: &'static str) {
        for ty in FLOAT_VARIANTS {
            self.add(name, BaseType::Bool, &[ty]);
        }
        for ty in [
            BaseType::Bool,
            BaseType::Bool2,
            BaseType::Bool3,
            BaseType::Bool4,
        ] {
            self.add(name, BaseType::Bool, &[ty]);
        }
    }
}

/// The fixed intrinsic function table. Declaration order matters only for
/// ties, which overload resolution reports as ambiguous anyway; lookup is
/// a linear scan by name like every other fixed table here.
pub static INTRINSICS: Lazy<Vec<Intrinsic>> = Lazy::new(|| {
    use BaseType::*;

    let mut b = TableBuilder { table: Vec::new() };

    for name in [
        "abs", "acos", "asin", "atan", "ceil", "cos", "ddx", "ddy", "exp", "exp2", "floor",
        "frac", "log", "log2", "log10", "normalize", "rcp", "round", "rsqrt", "saturate", "sign",
        "sin", "sqrt", "tan",
    ] {
        b.component_wise1(name);
    }

    for name in ["atan2", "fmod", "max", "min", "pow", "step"] {
        b.component_wise2(name);
    }

    for name in ["clamp", "lerp", "smoothstep"] {
        b.component_wise3(name);
    }

    b.reducing1("length");
    b.reducing2("dot");
    b.reducing2("distance");

    b.add("cross", Float3, &[Float3, Float3]);
    b.add("cross", Half3, &[Half3, Half3]);

    b.add("reflect", Float3, &[Float3, Float3]);
    b.add("reflect", Half3, &[Half3, Half3]);
    b.add("refract", Float3, &[Float3, Float3, Float]);
    b.add("refract", Half3, &[Half3, Half3, Half]);

    b.predicate1("any");
    b.predicate1("all");

    for ty in FLOAT_VARIANTS {
        b.add("clip", Void, &[ty]);
    }
    for ty in FLOAT_VARIANTS {
        b.add("sincos", Void, &[ty, ty, ty]);
    }

    // Matrix products. Vector/matrix pairings outside this list are the
    // holes of the binary-op table and stay rejected.
    b.add("mul", Float2, &[Float2, Float2x2]);
    b.add("mul", Float2, &[Float2x2, Float2]);
    b.add("mul", Float3, &[Float3, Float3x3]);
    b.add("mul", Float3, &[Float3x3, Float3]);
    b.add("mul", Float4, &[Float4, Float4x4]);
    b.add("mul", Float4, &[Float4x4, Float4]);
    b.add("mul", Float3, &[Float4, Float4x3]);
    b.add("mul", Float2, &[Float4, Float4x2]);
    b.add("mul", Float2x2, &[Float2x2, Float2x2]);
    b.add("mul", Float3x3, &[Float3x3, Float3x3]);
    b.add("mul", Float4x4, &[Float4x4, Float4x4]);
    b.add("mul", Half2, &[Half2, Half2x2]);
    b.add("mul", Half2, &[Half2x2, Half2]);
    b.add("mul", Half3, &[Half3, Half3x3]);
    b.add("mul", Half3, &[Half3x3, Half3]);
    b.add("mul", Half4, &[Half4, Half4x4]);
    b.add("mul", Half4, &[Half4x4, Half4]);
    b.add("mul", Half3, &[Half4, Half4x3]);
    b.add("mul", Half2, &[Half4, Half4x2]);
    b.add("mul", Half2x2, &[Half2x2, Half2x2]);
    b.add("mul", Half3x3, &[Half3x3, Half3x3]);
    b.add("mul", Half4x4, &[Half4x4, Half4x4]);

    b.add("transpose", Float2x2, &[Float2x2]);
    b.add("transpose", Float3x3, &[Float3x3]);
    b.add("transpose", Float4x4, &[Float4x4]);
    b.add("transpose", Half2x2, &[Half2x2]);
    b.add("transpose", Half3x3, &[Half3x3]);
    b.add("transpose", Half4x4, &[Half4x4]);

    // Texture sampling.
    b.add("tex2D", Float4, &[Sampler2D, Float2]);
    b.add("tex2Dproj", Float4, &[Sampler2D, Float4]);
    b.add("tex2Dlod", Float4, &[Sampler2D, Float4]);
    b.add("tex2Dlod", Float4, &[Sampler2D, Float4, Int2]);
    b.add("tex2Dbias", Float4, &[Sampler2D, Float4]);
    b.add("tex2Dgrad", Float4, &[Sampler2D, Float2, Float2, Float2]);
    b.add("tex2Dgather", Float4, &[Sampler2D, Float2, Int]);
    b.add("tex2Dsize", Int2, &[Sampler2D]);
    b.add("tex2Dfetch", Float4, &[Sampler2D, Int3]);
    b.add("tex2Dcmp", Float4, &[Sampler2DShadow, Float4]);
    b.add("tex2DMSfetch", Float4, &[Sampler2DMS, Int2, Int]);
    b.add("tex2DMSsize", Int3, &[Sampler2DMS]);
    b.add("tex2DArray", Float4, &[Sampler2DArray, Float3]);
    b.add("tex3D", Float4, &[Sampler3D, Float3]);
    b.add("tex3Dlod", Float4, &[Sampler3D, Float4]);
    b.add("tex3Dbias", Float4, &[Sampler3D, Float4]);
    b.add("tex3Dsize", Int3, &[Sampler3D]);
    b.add("texCUBE", Float4, &[SamplerCube, Float3]);
    b.add("texCUBElod", Float4, &[SamplerCube, Float4]);
    b.add("texCUBEbias", Float4, &[SamplerCube, Float4]);
    b.add("texCUBEsize", Int, &[SamplerCube]);

    b.table
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_full_variant_coverage() {
        let dot: Vec<_> = INTRINSICS.iter().filter(|i| i.name == "dot").collect();
        assert_eq!(dot.len(), 8);
        assert!(dot
            .iter()
            .all(|i| i.return_type == BaseType::Float || i.return_type == BaseType::Half));
    }

    #[test]
    fn component_wise_intrinsics_preserve_their_type() {
        for intrinsic in INTRINSICS.iter().filter(|i| i.name == "saturate") {
            assert_eq!(intrinsic.return_type, intrinsic.args[0]);
            assert_eq!(intrinsic.num_args, 1);
        }
    }

    #[test]
    fn table_is_large_and_discoverable_by_name() {
        assert!(INTRINSICS.len() > 200);
        assert!(INTRINSICS.iter().any(|i| i.name == "tex2D"));
        assert!(INTRINSICS.iter().any(|i| i.name == "mul"));
        assert!(INTRINSICS.iter().any(|i| i.name == "sincos"));
    }

    #[test]
    fn arg_types_reports_declared_arity() {
        let lerp = INTRINSICS
            .iter()
            .find(|i| i.name == "lerp" && i.args[0] == BaseType::Float3)
            .unwrap();
        assert_eq!(lerp.arg_types().len(), 3);
    }
}
