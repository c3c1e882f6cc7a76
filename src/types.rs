use once_cell::sync::Lazy;
use serde::Serialize;

use crate::ast::{BinaryOp, ExprId, Tree};
use crate::strings::InternedStr;

/// Base type of a value. The order is fixed: numeric types form the
/// contiguous range [`FIRST_NUMERIC`]..=[`LAST_NUMERIC`] and the integer
/// types the sub-range starting at `Bool`, which the rank tables index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BaseType {
    Unknown,
    Void,
    Float,
    Float2,
    Float3,
    Float4,
    Float2x2,
    Float3x3,
    Float4x4,
    Float4x3,
    Float4x2,
    Half,
    Half2,
    Half3,
    Half4,
    Half2x2,
    Half3x3,
    Half4x4,
    Half4x3,
    Half4x2,
    Bool,
    Bool2,
    Bool3,
    Bool4,
    Int,
    Int2,
    Int3,
    Int4,
    Uint,
    Uint2,
    Uint3,
    Uint4,
    Texture,
    Sampler,
    Sampler2D,
    Sampler3D,
    SamplerCube,
    Sampler2DShadow,
    Sampler2DMS,
    Sampler2DArray,
    Texture1D,
    Texture1DArray,
    Texture2D,
    Texture2DArray,
    Texture2DMS,
    Texture2DMSArray,
    Texture3D,
    TextureCube,
    TextureCubeArray,
    SamplerState,
    UserDefined,
    Expression,
    Auto,
}

pub const FIRST_NUMERIC: BaseType = BaseType::Float;
pub const LAST_NUMERIC: BaseType = BaseType::Uint4;
pub const FIRST_INTEGER: BaseType = BaseType::Bool;
pub const NUM_NUMERIC_TYPES: usize = 30;

impl BaseType {
    pub fn is_numeric(self) -> bool {
        (self as u8) >= (FIRST_NUMERIC as u8) && (self as u8) <= (LAST_NUMERIC as u8)
    }

    /// Bool, int and uint scalars and vectors. Bool counts as an integer
    /// type, matching the constant evaluator's treatment of it.
    pub fn is_integer(self) -> bool {
        (self as u8) >= (FIRST_INTEGER as u8) && (self as u8) <= (LAST_NUMERIC as u8)
    }

    pub fn is_sampler(self) -> bool {
        matches!(
            self,
            BaseType::Sampler
                | BaseType::Sampler2D
                | BaseType::Sampler3D
                | BaseType::SamplerCube
                | BaseType::Sampler2DShadow
                | BaseType::Sampler2DMS
                | BaseType::Sampler2DArray
        )
    }

    pub fn is_texture(self) -> bool {
        matches!(
            self,
            BaseType::Texture1D
                | BaseType::Texture1DArray
                | BaseType::Texture2D
                | BaseType::Texture2DArray
                | BaseType::Texture2DMS
                | BaseType::Texture2DMSArray
                | BaseType::Texture3D
                | BaseType::TextureCube
                | BaseType::TextureCubeArray
        )
    }

    pub fn is_scalar(self) -> bool {
        let info = self.info();
        info.number_type.is_some() && info.components == 1 && info.height == 1
    }

    pub fn is_vector(self) -> bool {
        let info = self.info();
        info.number_type.is_some() && info.components > 1 && info.height == 1
    }

    pub fn is_matrix(self) -> bool {
        self.info().height > 1
    }

    pub fn info(self) -> &'static BaseTypeInfo {
        &BASE_TYPE_INFO[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }

    /// The scalar type of this type's numeric family, or `Unknown` for
    /// non-numeric types.
    pub fn scalar_type(self) -> BaseType {
        match self.info().number_type {
            Some(family) => family.scalar_type(),
            None => BaseType::Unknown,
        }
    }
}

/// Numeric family of a base type; indexes the conversion rank matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberType {
    Float,
    Half,
    Bool,
    Int,
    Uint,
}

impl NumberType {
    pub fn scalar_type(self) -> BaseType {
        match self {
            NumberType::Float => BaseType::Float,
            NumberType::Half => BaseType::Half,
            NumberType::Bool => BaseType::Bool,
            NumberType::Int => BaseType::Int,
            NumberType::Uint => BaseType::Uint,
        }
    }

    /// Vector of this family with the given width; width 1 is the scalar.
    pub fn vector_type(self, width: u8) -> BaseType {
        const VECTORS: [[BaseType; 4]; 5] = [
            [BaseType::Float, BaseType::Float2, BaseType::Float3, BaseType::Float4],
            [BaseType::Half, BaseType::Half2, BaseType::Half3, BaseType::Half4],
            [BaseType::Bool, BaseType::Bool2, BaseType::Bool3, BaseType::Bool4],
            [BaseType::Int, BaseType::Int2, BaseType::Int3, BaseType::Int4],
            [BaseType::Uint, BaseType::Uint2, BaseType::Uint3, BaseType::Uint4],
        ];
        VECTORS[self as usize][(width - 1) as usize]
    }
}

/// Per-base-type descriptor: spelling, numeric family and shape. Vectors
/// have height 1 and their width in `components`; matrices carry their row
/// count in `height` and their row width in `components`, so indexing a
/// `float4x3` yields a `float3`.
pub struct BaseTypeInfo {
    pub name: &'static str,
    pub number_type: Option<NumberType>,
    pub components: u8,
    pub height: u8,
}

const fn numeric(name: &'static str, family: NumberType, components: u8, height: u8) -> BaseTypeInfo {
    BaseTypeInfo {
        name,
        number_type: Some(family),
        components,
        height,
    }
}

const fn opaque(name: &'static str) -> BaseTypeInfo {
    BaseTypeInfo {
        name,
        number_type: None,
        components: 0,
        height: 0,
    }
}

pub static BASE_TYPE_INFO: [BaseTypeInfo; 53] = [
    opaque("unknown type"),
    opaque("void"),
    numeric("float", NumberType::Float, 1, 1),
    numeric("float2", NumberType::Float, 2, 1),
    numeric("float3", NumberType::Float, 3, 1),
    numeric("float4", NumberType::Float, 4, 1),
    numeric("float2x2", NumberType::Float, 2, 2),
    numeric("float3x3", NumberType::Float, 3, 3),
    numeric("float4x4", NumberType::Float, 4, 4),
    numeric("float4x3", NumberType::Float, 3, 4),
    numeric("float4x2", NumberType::Float, 2, 4),
    numeric("half", NumberType::Half, 1, 1),
    numeric("half2", NumberType::Half, 2, 1),
    numeric("half3", NumberType::Half, 3, 1),
    numeric("half4", NumberType::Half, 4, 1),
    numeric("half2x2", NumberType::Half, 2, 2),
    numeric("half3x3", NumberType::Half, 3, 3),
    numeric("half4x4", NumberType::Half, 4, 4),
    numeric("half4x3", NumberType::Half, 3, 4),
    numeric("half4x2", NumberType::Half, 2, 4),
    numeric("bool", NumberType::Bool, 1, 1),
    numeric("bool2", NumberType::Bool, 2, 1),
    numeric("bool3", NumberType::Bool, 3, 1),
    numeric("bool4", NumberType::Bool, 4, 1),
    numeric("int", NumberType::Int, 1, 1),
    numeric("int2", NumberType::Int, 2, 1),
    numeric("int3", NumberType::Int, 3, 1),
    numeric("int4", NumberType::Int, 4, 1),
    numeric("uint", NumberType::Uint, 1, 1),
    numeric("uint2", NumberType::Uint, 2, 1),
    numeric("uint3", NumberType::Uint, 3, 1),
    numeric("uint4", NumberType::Uint, 4, 1),
    opaque("texture"),
    opaque("sampler"),
    opaque("sampler2D"),
    opaque("sampler3D"),
    opaque("samplerCUBE"),
    opaque("sampler2DShadow"),
    opaque("sampler2DMS"),
    opaque("sampler2DArray"),
    opaque("Texture1D"),
    opaque("Texture1DArray"),
    opaque("Texture2D"),
    opaque("Texture2DArray"),
    opaque("Texture2DMS"),
    opaque("Texture2DMSArray"),
    opaque("Texture3D"),
    opaque("TextureCube"),
    opaque("TextureCubeArray"),
    opaque("SamplerState"),
    opaque("user-defined"),
    opaque("expression"),
    opaque("auto"),
];

/// Qualifier and storage flags, combinable on any type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypeFlags(u32);

impl TypeFlags {
    pub const NONE: TypeFlags = TypeFlags(0);
    pub const CONST: TypeFlags = TypeFlags(0x01);
    pub const STATIC: TypeFlags = TypeFlags(0x02);
    pub const INPUT: TypeFlags = TypeFlags(0x04);
    pub const OUTPUT: TypeFlags = TypeFlags(0x08);
    pub const LINEAR: TypeFlags = TypeFlags(0x10);
    pub const CENTROID: TypeFlags = TypeFlags(0x20);
    pub const NO_INTERPOLATION: TypeFlags = TypeFlags(0x40);
    pub const NO_PERSPECTIVE: TypeFlags = TypeFlags(0x80);
    pub const SAMPLE: TypeFlags = TypeFlags(0x100);
    pub const NO_PROMOTE: TypeFlags = TypeFlags(0x200);

    pub fn contains(self, other: TypeFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn without(self, other: TypeFlags) -> TypeFlags {
        TypeFlags(self.0 & !other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl std::ops::BitOr for TypeFlags {
    type Output = TypeFlags;

    fn bitor(self, rhs: TypeFlags) -> TypeFlags {
        TypeFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for TypeFlags {
    fn bitor_assign(&mut self, rhs: TypeFlags) {
        self.0 |= rhs.0;
    }
}

impl std::ops::BitAnd for TypeFlags {
    type Output = TypeFlags;

    fn bitand(self, rhs: TypeFlags) -> TypeFlags {
        TypeFlags(self.0 & rhs.0)
    }
}

/// Full type descriptor attached to declarations and expressions.
#[derive(Debug, Clone, Copy)]
pub struct Type<'a> {
    pub base: BaseType,
    /// Element type of a sampler: `Float` or `Half`.
    pub sampler_type: BaseType,
    /// Only present when `base` is `UserDefined`.
    pub type_name: Option<InternedStr<'a>>,
    pub array: bool,
    /// Absent on an array type means unsized; only legal in argument
    /// position.
    pub array_size: Option<ExprId<'a>>,
    pub flags: TypeFlags,
}

impl<'a> Type<'a> {
    pub fn new(base: BaseType) -> Self {
        Type {
            base,
            sampler_type: BaseType::Float,
            type_name: None,
            array: false,
            array_size: None,
            flags: TypeFlags::NONE,
        }
    }

    pub fn with_flags(base: BaseType, flags: TypeFlags) -> Self {
        let mut ty = Type::new(base);
        ty.flags = flags;
        ty
    }

    pub fn user_defined(name: InternedStr<'a>) -> Self {
        let mut ty = Type::new(BaseType::UserDefined);
        ty.type_name = Some(name);
        ty
    }

    pub fn is_const(&self) -> bool {
        self.flags.contains(TypeFlags::CONST)
    }
}

/// Conversion cost between numeric families; row is the source, column the
/// destination. Zero means same family; larger values are costlier class
/// changes, and the rank matrix feeds bit 1.. of the cast rank.
const NUMBER_TYPE_RANK: [[u32; 5]; 5] = [
    //F  H  B  I  U
    [0, 4, 4, 4, 4], // Float
    [1, 0, 4, 4, 4], // Half
    [5, 5, 0, 5, 5], // Bool
    [5, 5, 4, 0, 3], // Int
    [5, 5, 4, 2, 0], // Uint
];

const PROMOTION_BIT: u32 = 1 << 0;
const TRUNCATION_BIT: u32 = 1 << 4;

const ALL_NUMERIC_TYPES: [BaseType; NUM_NUMERIC_TYPES] = [
    BaseType::Float,
    BaseType::Float2,
    BaseType::Float3,
    BaseType::Float4,
    BaseType::Float2x2,
    BaseType::Float3x3,
    BaseType::Float4x4,
    BaseType::Float4x3,
    BaseType::Float4x2,
    BaseType::Half,
    BaseType::Half2,
    BaseType::Half3,
    BaseType::Half4,
    BaseType::Half2x2,
    BaseType::Half3x3,
    BaseType::Half4x4,
    BaseType::Half4x3,
    BaseType::Half4x2,
    BaseType::Bool,
    BaseType::Bool2,
    BaseType::Bool3,
    BaseType::Bool4,
    BaseType::Int,
    BaseType::Int2,
    BaseType::Int3,
    BaseType::Int4,
    BaseType::Uint,
    BaseType::Uint2,
    BaseType::Uint3,
    BaseType::Uint4,
];

pub fn numeric_index(base: BaseType) -> usize {
    debug_assert!(base.is_numeric());
    base as usize - FIRST_NUMERIC as usize
}

fn numeric_type(family: NumberType, components: u8, height: u8) -> BaseType {
    for base in ALL_NUMERIC_TYPES {
        let info = base.info();
        if info.number_type == Some(family) && info.components == components && info.height == height
        {
            return base;
        }
    }
    BaseType::Unknown
}

/// Which family wins an arithmetic pairing; lower beats higher. Bool
/// promotes to int, int to uint, and half to float, as in C.
fn family_priority(family: NumberType) -> u32 {
    match family {
        NumberType::Float => 0,
        NumberType::Half => 1,
        NumberType::Uint => 2,
        NumberType::Int => 3,
        NumberType::Bool => 4,
    }
}

fn combine_numeric(lhs: BaseType, rhs: BaseType) -> BaseType {
    let info1 = lhs.info();
    let info2 = rhs.info();
    let (family1, family2) = match (info1.number_type, info2.number_type) {
        (Some(family1), Some(family2)) => (family1, family2),
        _ => return BaseType::Unknown,
    };
    let family = if family_priority(family1) <= family_priority(family2) {
        family1
    } else {
        family2
    };

    let scalar1 = info1.components == 1 && info1.height == 1;
    let scalar2 = info2.components == 1 && info2.height == 1;
    let (components, height) = if scalar1 {
        (info2.components, info2.height)
    } else if scalar2 {
        (info1.components, info1.height)
    } else if info1.height == 1 && info2.height == 1 {
        // Mismatched vector widths pair down to the narrower operand.
        (info1.components.min(info2.components), 1)
    } else if info1.components == info2.components && info1.height == info2.height {
        (info1.components, info1.height)
    } else {
        return BaseType::Unknown;
    };

    numeric_type(family, components, height)
}

/// Result base type of a non-comparison binary operator, indexed by the
/// numeric indices of the operands. The `Unknown` holes (matrix/vector
/// pairings and mismatched matrices) are deliberate and load-bearing:
/// downstream code relies on exactly these pairings being rejected.
pub static BINARY_OP_TYPE: Lazy<[[BaseType; NUM_NUMERIC_TYPES]; NUM_NUMERIC_TYPES]> =
    Lazy::new(|| {
        let mut table = [[BaseType::Unknown; NUM_NUMERIC_TYPES]; NUM_NUMERIC_TYPES];
        for (i, lhs) in ALL_NUMERIC_TYPES.iter().enumerate() {
            for (j, rhs) in ALL_NUMERIC_TYPES.iter().enumerate() {
                table[i][j] = combine_numeric(*lhs, *rhs);
            }
        }
        table
    });

/// Implicit conversion cost from `src` to `dst`: `None` when no conversion
/// exists, otherwise a score where exact beats promotion beats class
/// conversion beats truncation.
pub fn type_cast_rank<'a>(tree: &Tree<'a>, src: &Type<'a>, dst: &Type<'a>) -> Option<u32> {
    if src.array != dst.array {
        return None;
    }
    if src.array {
        match (src.array_size, dst.array_size) {
            (Some(size1), Some(size2)) => {
                let value1 = tree.expression_value_int(size1)?;
                let value2 = tree.expression_value_int(size2)?;
                if value1 != value2 {
                    return None;
                }
            }
            // An unsized array only appears in argument position and
            // accepts any size.
            _ => {}
        }
    }

    if src.base == BaseType::UserDefined && dst.base == BaseType::UserDefined {
        return if src.type_name == dst.type_name {
            Some(0)
        } else {
            None
        };
    }

    if src.base == dst.base {
        if src.base.is_sampler() {
            return if src.sampler_type == dst.sampler_type {
                Some(0)
            } else {
                None
            };
        }
        return Some(0);
    }

    let info1 = src.base.info();
    let info2 = dst.base.info();
    let (family1, family2) = match (info1.number_type, info2.number_type) {
        (Some(f1), Some(f2)) => (f1, f2),
        _ => return None,
    };

    let mut result = NUMBER_TYPE_RANK[family1 as usize][family2 as usize] << 1;

    let scalar1 = info1.components == 1 && info1.height == 1;
    let scalar2 = info2.components == 1 && info2.height == 1;

    if info1.components == info2.components && info1.height == info2.height {
        // Same shape, pure class conversion.
    } else if scalar1 {
        result |= PROMOTION_BIT;
    } else if scalar2 {
        result |= TRUNCATION_BIT;
    } else if info1.height == 1 && info2.height == 1 {
        if info2.components < info1.components {
            result |= TRUNCATION_BIT;
        } else {
            return None;
        }
    } else if info1.height > 1 && info2.height > 1 {
        if info2.components <= info1.components && info2.height <= info1.height {
            result |= TRUNCATION_BIT;
        } else {
            return None;
        }
    } else {
        return None;
    }

    Some(result)
}

/// Result type of `lhs op rhs`, or `None` when the operands do not admit
/// the operator. The result is const iff both operands are.
pub fn binary_op_result_type<'a>(op: BinaryOp, lhs: &Type<'a>, rhs: &Type<'a>) -> Option<Type<'a>> {
    if !lhs.base.is_numeric() || !rhs.base.is_numeric() || lhs.array || rhs.array {
        return None;
    }

    if op.is_bitwise() && (!lhs.base.is_integer() || !rhs.base.is_integer()) {
        return None;
    }

    let base = if op.is_compare() || op.is_logic() {
        let width = lhs.base.info().components.max(rhs.base.info().components);
        NumberType::Bool.vector_type(width)
    } else {
        let result = BINARY_OP_TYPE[numeric_index(lhs.base)][numeric_index(rhs.base)];
        if result == BaseType::Unknown {
            return None;
        }
        result
    };

    let mut result = Type::new(base);
    if lhs.is_const() && rhs.is_const() {
        result.flags |= TypeFlags::CONST;
    }
    Some(result)
}

/// Human-readable spelling of a type for diagnostics, e.g. `int[5]` or
/// `float4`. Array sizes are constant-folded when possible.
pub fn type_description<'a>(tree: &Tree<'a>, ty: &Type<'a>) -> String {
    let name = match ty.type_name {
        Some(name) if ty.base == BaseType::UserDefined => name.as_str().to_string(),
        _ => ty.base.name().to_string(),
    };
    if !ty.array {
        return name;
    }
    match ty.array_size.and_then(|size| tree.expression_value_int(size)) {
        Some(size) => format!("{}[{}]", name, size),
        None => format!("{}[]", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Tree;
    use crate::strings::StringPool;
    use bumpalo::Bump;

    #[test]
    fn cast_rank_is_zero_for_identical_types() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let tree = Tree::new(&pool);
        for index in 0..BASE_TYPE_INFO.len() {
            let base = ALL_BASE_TYPES[index];
            if base == BaseType::Unknown {
                continue;
            }
            let ty = Type::new(base);
            assert_eq!(
                type_cast_rank(&tree, &ty, &ty),
                Some(0),
                "rank({:?}, {:?})",
                base,
                base
            );
        }
    }

    const ALL_BASE_TYPES: [BaseType; 53] = [
        BaseType::Unknown,
        BaseType::Void,
        BaseType::Float,
        BaseType::Float2,
        BaseType::Float3,
        BaseType::Float4,
        BaseType::Float2x2,
        BaseType::Float3x3,
        BaseType::Float4x4,
        BaseType::Float4x3,
        BaseType::Float4x2,
        BaseType::Half,
        BaseType::Half2,
        BaseType::Half3,
        BaseType::Half4,
        BaseType::Half2x2,
        BaseType::Half3x3,
        BaseType::Half4x4,
        BaseType::Half4x3,
        BaseType::Half4x2,
        BaseType::Bool,
        BaseType::Bool2,
        BaseType::Bool3,
        BaseType::Bool4,
        BaseType::Int,
        BaseType::Int2,
        BaseType::Int3,
        BaseType::Int4,
        BaseType::Uint,
        BaseType::Uint2,
        BaseType::Uint3,
        BaseType::Uint4,
        BaseType::Texture,
        BaseType::Sampler,
        BaseType::Sampler2D,
        BaseType::Sampler3D,
        BaseType::SamplerCube,
        BaseType::Sampler2DShadow,
        BaseType::Sampler2DMS,
        BaseType::Sampler2DArray,
        BaseType::Texture1D,
        BaseType::Texture1DArray,
        BaseType::Texture2D,
        BaseType::Texture2DArray,
        BaseType::Texture2DMS,
        BaseType::Texture2DMSArray,
        BaseType::Texture3D,
        BaseType::TextureCube,
        BaseType::TextureCubeArray,
        BaseType::SamplerState,
        BaseType::UserDefined,
        BaseType::Expression,
        BaseType::Auto,
    ];

    #[test]
    fn diagonal_of_binary_op_table_is_never_unknown() {
        for base in ALL_NUMERIC_TYPES {
            let index = numeric_index(base);
            assert_eq!(BINARY_OP_TYPE[index][index], base, "{:?}", base);
        }
    }

    #[test]
    fn mismatched_vector_widths_pair_down() {
        let result =
            BINARY_OP_TYPE[numeric_index(BaseType::Float3)][numeric_index(BaseType::Float2)];
        assert_eq!(result, BaseType::Float2);
    }

    #[test]
    fn matrix_vector_pairings_are_holes() {
        let result =
            BINARY_OP_TYPE[numeric_index(BaseType::Float4x4)][numeric_index(BaseType::Float4)];
        assert_eq!(result, BaseType::Unknown);
        let result =
            BINARY_OP_TYPE[numeric_index(BaseType::Float3x3)][numeric_index(BaseType::Float4x4)];
        assert_eq!(result, BaseType::Unknown);
    }

    #[test]
    fn int_and_float_combine_to_float() {
        let result = BINARY_OP_TYPE[numeric_index(BaseType::Int)][numeric_index(BaseType::Float4)];
        assert_eq!(result, BaseType::Float4);
        let result = BINARY_OP_TYPE[numeric_index(BaseType::Int)][numeric_index(BaseType::Uint)];
        assert_eq!(result, BaseType::Uint);
    }

    #[test]
    fn exact_beats_promotion_beats_conversion() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let tree = Tree::new(&pool);

        let float1 = Type::new(BaseType::Float);
        let float4 = Type::new(BaseType::Float4);
        let int1 = Type::new(BaseType::Int);

        let exact = type_cast_rank(&tree, &float1, &float1).unwrap();
        let promotion = type_cast_rank(&tree, &float1, &float4).unwrap();
        let conversion = type_cast_rank(&tree, &int1, &float1).unwrap();
        let truncation = type_cast_rank(&tree, &float4, &float1).unwrap();

        assert!(exact < promotion);
        assert!(promotion < conversion);
        assert!(conversion < truncation);
    }

    #[test]
    fn vector_widening_has_no_implicit_conversion() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let tree = Tree::new(&pool);
        let float2 = Type::new(BaseType::Float2);
        let float4 = Type::new(BaseType::Float4);
        assert_eq!(type_cast_rank(&tree, &float2, &float4), None);
        assert!(type_cast_rank(&tree, &float4, &float2).is_some());
    }

    #[test]
    fn array_mismatch_never_converts() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let tree = Tree::new(&pool);
        let scalar = Type::new(BaseType::Int);
        let mut array = Type::new(BaseType::Int);
        array.array = true;
        assert_eq!(type_cast_rank(&tree, &scalar, &array), None);
        assert_eq!(type_cast_rank(&tree, &array, &scalar), None);
    }

    #[test]
    fn sampler_element_types_must_match() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let tree = Tree::new(&pool);
        let float_sampler = Type::new(BaseType::Sampler2D);
        let mut half_sampler = Type::new(BaseType::Sampler2D);
        half_sampler.sampler_type = BaseType::Half;
        assert_eq!(type_cast_rank(&tree, &float_sampler, &half_sampler), None);
        assert_eq!(
            type_cast_rank(&tree, &float_sampler, &float_sampler),
            Some(0)
        );
    }

    #[test]
    fn comparison_yields_bool_of_wider_operand() {
        let lhs = Type::new(BaseType::Float3);
        let rhs = Type::new(BaseType::Float);
        let result = binary_op_result_type(BinaryOp::Less, &lhs, &rhs).unwrap();
        assert_eq!(result.base, BaseType::Bool3);
    }

    #[test]
    fn bitwise_requires_integer_operands() {
        let int_ty = Type::new(BaseType::Int);
        let float_ty = Type::new(BaseType::Float);
        assert!(binary_op_result_type(BinaryOp::BitAnd, &int_ty, &int_ty).is_some());
        assert!(binary_op_result_type(BinaryOp::BitAnd, &int_ty, &float_ty).is_none());
    }

    #[test]
    fn const_propagates_only_when_both_const() {
        let const_int = Type::with_flags(BaseType::Int, TypeFlags::CONST);
        let int_ty = Type::new(BaseType::Int);
        let both = binary_op_result_type(BinaryOp::Add, &const_int, &const_int).unwrap();
        let mixed = binary_op_result_type(BinaryOp::Add, &const_int, &int_ty).unwrap();
        assert!(both.is_const());
        assert!(!mixed.is_const());
    }
}
