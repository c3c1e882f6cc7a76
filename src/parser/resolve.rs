use super::Parser;
use crate::ast::{Callee, ExprId, ExpressionKind, FunctionCall, StatementKind};
use crate::intrinsics::INTRINSICS;
use crate::strings::InternedStr;
use crate::types::{type_cast_rank, type_description, BaseType, NumberType, Type, TypeFlags};

/// Semantic resolution interleaved with parsing: implicit conversion
/// checks, overload resolution and member/index access typing.
pub trait Resolution<'a, 's> {
    /// Checks that `expression` implicitly converts to `dst`; reports the
    /// conversion error when it does not.
    fn check_type_cast(&mut self, expression: ExprId<'a>, dst: &Type<'a>) -> bool;

    /// Resolves a call site against user functions first, then intrinsics,
    /// and builds the call node with the winner's return type.
    fn resolve_function_call(
        &mut self,
        name: InternedStr<'a>,
        argument: Option<ExprId<'a>>,
        num_arguments: u32,
        file: InternedStr<'a>,
        line: u32,
    ) -> Option<ExprId<'a>>;

    /// Types `object.field` and reports whether it is a swizzle.
    fn resolve_member_access(
        &mut self,
        object_ty: &Type<'a>,
        field: InternedStr<'a>,
    ) -> Option<(Type<'a>, bool)>;

    /// Types `object[index]`.
    fn resolve_index_access(&mut self, object_ty: &Type<'a>) -> Option<Type<'a>>;
}

/// Per-argument conversion ranks of a viable candidate, sorted worst-first
/// so two candidates compare lexicographically on their most expensive
/// conversions.
struct Candidate<'a> {
    callee: Callee<'a>,
    ranks: Vec<u32>,
}

impl<'a, 's> Resolution<'a, 's> for Parser<'a, 's> {
    fn check_type_cast(&mut self, expression: ExprId<'a>, dst: &Type<'a>) -> bool {
        let src = self.tree.expression(expression).ty;
        if type_cast_rank(&self.tree, &src, dst).is_some() {
            return true;
        }
        let message = format!(
            "Cannot implicitly convert from '{}' to '{}'",
            type_description(&self.tree, &src),
            type_description(&self.tree, dst)
        );
        self.error(message);
        false
    }

    fn resolve_function_call(
        &mut self,
        name: InternedStr<'a>,
        argument: Option<ExprId<'a>>,
        num_arguments: u32,
        file: InternedStr<'a>,
        line: u32,
    ) -> Option<ExprId<'a>> {
        let mut argument_types = Vec::with_capacity(num_arguments as usize);
        let mut walk = argument;
        while let Some(id) = walk {
            let expression = self.tree.expression(id);
            argument_types.push(expression.ty);
            walk = expression.next;
        }

        let mut name_is_known = false;
        let mut candidates: Vec<Candidate<'a>> = Vec::new();

        for &function_id in &self.functions {
            let function = self.tree.function(function_id);
            if function.name != name {
                continue;
            }
            name_is_known = true;
            if let Some(ranks) = self.rank_user_function(function_id, &argument_types) {
                candidates.push(Candidate {
                    callee: Callee::User(function_id),
                    ranks,
                });
            }
        }
        for (index, intrinsic) in INTRINSICS.iter().enumerate() {
            if name != intrinsic.name {
                continue;
            }
            name_is_known = true;
            if let Some(ranks) = self.rank_intrinsic(index, &argument_types) {
                candidates.push(Candidate {
                    callee: Callee::Intrinsic(index),
                    ranks,
                });
            }
        }

        if candidates.is_empty() {
            if name_is_known {
                self.error(format!("No matching overload for function '{}'", name));
            } else {
                self.error(format!("Undeclared function '{}'", name));
            }
            return None;
        }

        let mut best = 0;
        let mut ambiguous = false;
        for index in 1..candidates.len() {
            match candidates[index].ranks.cmp(&candidates[best].ranks) {
                std::cmp::Ordering::Less => {
                    best = index;
                    ambiguous = false;
                }
                std::cmp::Ordering::Equal => ambiguous = true,
                std::cmp::Ordering::Greater => {}
            }
        }
        if ambiguous {
            self.error(format!(
                "Ambiguous call to overloaded function '{}'",
                name
            ));
            return None;
        }

        let callee = candidates[best].callee;
        let ty = self.tree.callee_return_type(callee);
        Some(self.tree.add_expression(
            file,
            line,
            ty,
            ExpressionKind::Call(FunctionCall {
                function: callee,
                argument,
                num_arguments,
            }),
        ))
    }

    fn resolve_member_access(
        &mut self,
        object_ty: &Type<'a>,
        field: InternedStr<'a>,
    ) -> Option<(Type<'a>, bool)> {
        let info = object_ty.base.info();

        if object_ty.base == BaseType::UserDefined {
            let Some(type_name) = object_ty.type_name else {
                self.error(format!("Unknown field '{}'", field));
                return None;
            };
            let Some(struct_id) = self.find_user_type(type_name.as_str()) else {
                self.error(format!("Undeclared type '{}'", type_name));
                return None;
            };
            let mut field_id = match &self.tree.statement(struct_id).kind {
                StatementKind::Struct(def) => def.field,
                _ => None,
            };
            while let Some(id) = field_id {
                let struct_field = self.tree.field(id);
                if struct_field.name == field {
                    return Some((struct_field.ty, false));
                }
                field_id = struct_field.next_field;
            }
            self.error(format!("Unknown field '{}'", field));
            return None;
        }

        if object_ty.array {
            self.error(format!("Invalid member access '{}' on an array", field));
            return None;
        }

        if object_ty.base.is_scalar() || object_ty.base.is_vector() {
            let name = field.as_str();
            if name.is_empty()
                || name.len() > 4
                || !name
                    .bytes()
                    .all(|c| matches!(c, b'x' | b'y' | b'z' | b'w' | b'r' | b'g' | b'b' | b'a'))
            {
                self.error(format!("Invalid swizzle '{}'", field));
                return None;
            }
            let family = info.number_type.unwrap_or(NumberType::Float);
            let mut ty = Type::new(family.vector_type(name.len() as u8));
            ty.flags = object_ty.flags;
            return Some((ty, true));
        }

        if object_ty.base.is_matrix() {
            let Some(count) = parse_matrix_members(field.as_str(), info.height, info.components)
            else {
                self.error(format!("Invalid matrix member access '{}'", field));
                return None;
            };
            let family = info.number_type.unwrap_or(NumberType::Float);
            let mut ty = Type::new(family.vector_type(count));
            ty.flags = object_ty.flags;
            return Some((ty, true));
        }

        self.error(format!(
            "Invalid member access '{}' on type '{}'",
            field,
            type_description(&self.tree, object_ty)
        ));
        None
    }

    fn resolve_index_access(&mut self, object_ty: &Type<'a>) -> Option<Type<'a>> {
        if object_ty.array {
            let mut ty = *object_ty;
            ty.array = false;
            ty.array_size = None;
            return Some(ty);
        }

        let info = object_ty.base.info();
        if object_ty.base.is_matrix() {
            let family = info.number_type.unwrap_or(NumberType::Float);
            let mut ty = Type::new(family.vector_type(info.components));
            ty.flags = object_ty.flags;
            return Some(ty);
        }
        if object_ty.base.is_vector() {
            let mut ty = Type::new(object_ty.base.scalar_type());
            ty.flags = object_ty.flags;
            return Some(ty);
        }

        let message = format!(
            "Cannot index type '{}'",
            type_description(&self.tree, object_ty)
        );
        self.error(message);
        None
    }
}

impl<'a, 's> Parser<'a, 's> {
    /// Conversion ranks of each call argument against a user function, or
    /// `None` when the function is not viable: it must declare at least as
    /// many parameters as the call passes, every unfilled parameter needs a
    /// default, and every argument must convert.
    fn rank_user_function(
        &self,
        function_id: crate::ast::StmtId<'a>,
        argument_types: &[Type<'a>],
    ) -> Option<Vec<u32>> {
        let function = self.tree.function(function_id);
        if (function.num_arguments as usize) < argument_types.len() {
            return None;
        }

        let mut ranks = Vec::with_capacity(argument_types.len());
        let mut parameter = function.argument;
        for argument_ty in argument_types {
            let parameter_id = parameter?;
            let declared = self.tree.argument(parameter_id);
            let rank = type_cast_rank(&self.tree, argument_ty, &declared.ty)?;
            ranks.push(rank);
            parameter = declared.next_argument;
        }
        // Parameters beyond the call's arguments must all have defaults.
        while let Some(parameter_id) = parameter {
            let declared = self.tree.argument(parameter_id);
            declared.default_value?;
            parameter = declared.next_argument;
        }

        ranks.sort_unstable_by(|a, b| b.cmp(a));
        Some(ranks)
    }

    fn rank_intrinsic(&self, index: usize, argument_types: &[Type<'a>]) -> Option<Vec<u32>> {
        let intrinsic = &INTRINSICS[index];
        if intrinsic.num_args as usize != argument_types.len() {
            return None;
        }

        let mut ranks = Vec::with_capacity(argument_types.len());
        for (argument_ty, &declared) in argument_types.iter().zip(intrinsic.arg_types()) {
            let declared_ty = Type::with_flags(declared, TypeFlags::CONST);
            let rank = type_cast_rank(&self.tree, argument_ty, &declared_ty)?;
            ranks.push(rank);
        }

        ranks.sort_unstable_by(|a, b| b.cmp(a));
        Some(ranks)
    }
}

/// Parses a matrix member selection: `_m<row><col>` (0-indexed) or
/// `_<row><col>` (1-indexed), repeated up to four times. Returns the
/// number of selected components.
fn parse_matrix_members(field: &str, height: u8, components: u8) -> Option<u8> {
    let bytes = field.as_bytes();
    let mut position = 0;
    let mut count = 0u8;
    while position < bytes.len() {
        if count == 4 || bytes[position] != b'_' {
            return None;
        }
        position += 1;
        let zero_indexed = position < bytes.len() && bytes[position] == b'm';
        if zero_indexed {
            position += 1;
        }
        if position + 2 > bytes.len() {
            return None;
        }
        let row = bytes[position].wrapping_sub(b'0');
        let col = bytes[position + 1].wrapping_sub(b'0');
        position += 2;
        let (row, col) = if zero_indexed {
            (row, col)
        } else {
            (row.wrapping_sub(1), col.wrapping_sub(1))
        };
        if row >= height || col >= components {
            return None;
        }
        count += 1;
    }
    if count == 0 {
        return None;
    }
    Some(count)
}

#[cfg(test)]
mod tests {
    use super::parse_matrix_members;

    #[test]
    fn zero_indexed_members() {
        assert_eq!(parse_matrix_members("_m00", 4, 4), Some(1));
        assert_eq!(parse_matrix_members("_m00_m11_m22", 3, 3), Some(3));
    }

    #[test]
    fn one_indexed_members() {
        assert_eq!(parse_matrix_members("_11", 4, 4), Some(1));
        assert_eq!(parse_matrix_members("_11_22_33_44", 4, 4), Some(4));
    }

    #[test]
    fn out_of_range_members_are_rejected() {
        assert_eq!(parse_matrix_members("_m33", 3, 3), None);
        assert_eq!(parse_matrix_members("_44", 3, 3), None);
    }

    #[test]
    fn more_than_four_members_are_rejected() {
        assert_eq!(parse_matrix_members("_11_11_11_11_11", 4, 4), None);
    }

    #[test]
    fn malformed_members_are_rejected() {
        assert_eq!(parse_matrix_members("", 4, 4), None);
        assert_eq!(parse_matrix_members("_m0", 4, 4), None);
        assert_eq!(parse_matrix_members("m00", 4, 4), None);
    }
}
