use crate::ast::{
    BinaryOp, ExpressionKind, IfStatement, Literal, StatementKind, StmtId, Tree,
};
use crate::types::{BaseType, Type};

/// Emulates fixed-function alpha testing by rewriting the entry function:
/// before every `return`, `if (result.a < threshold) discard;` is inserted.
/// A `float`/`half` return value is compared directly. Returns false when
/// the entry returns any other type.
pub fn emulate_alpha_test(tree: &mut Tree<'_>, entry_name: &str, alpha_ref: f32) -> bool {
    let Some(entry) = tree.find_function(entry_name) else {
        return true;
    };

    let mut previous: Option<StmtId<'_>> = None;
    let mut statement = tree.function(entry).statement;
    while let Some(id) = statement {
        if let StatementKind::Return {
            expression: Some(return_expression),
        } = tree.statement(id).kind
        {
            let (file, line) = {
                let node = tree.statement(id);
                (node.file, node.line)
            };
            let return_type = tree.expression(return_expression).ty.base;

            // Build: if (<alpha> < threshold) discard;
            let alpha = match return_type {
                BaseType::Float4 | BaseType::Half4 => {
                    let field = tree.add_string("a");
                    tree.add_expression(
                        file,
                        line,
                        Type::new(BaseType::Float),
                        ExpressionKind::MemberAccess {
                            object: return_expression,
                            field,
                            swizzle: true,
                        },
                    )
                }
                BaseType::Float | BaseType::Half => return_expression,
                _ => return false,
            };

            let threshold = tree.add_expression(
                file,
                line,
                Type::new(BaseType::Float),
                ExpressionKind::Literal(Literal::Float(alpha_ref)),
            );
            let condition = tree.add_expression(
                file,
                line,
                Type::new(BaseType::Bool),
                ExpressionKind::Binary {
                    op: BinaryOp::Less,
                    left: alpha,
                    right: threshold,
                },
            );
            let discard = tree.add_statement(file, line, StatementKind::Discard);
            let test = tree.add_statement(
                file,
                line,
                StatementKind::If(IfStatement {
                    condition,
                    statement: Some(discard),
                    else_statement: None,
                    is_static: false,
                }),
            );

            // Insert before the return.
            tree.statement_mut(test).next = Some(id);
            match previous {
                Some(previous) => tree.statement_mut(previous).next = Some(test),
                None => tree.function_mut(entry).statement = Some(test),
            }
        }

        previous = Some(id);
        statement = tree.statement(id).next;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::strings::StringPool;
    use bumpalo::Bump;

    #[test]
    fn inserts_discard_before_float4_returns() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let source = "float4 main_ps() { return float4(1.0, 1.0, 1.0, 0.25); }";
        let mut tree = parse(&pool, "test.hlsl", source).unwrap();

        assert!(emulate_alpha_test(&mut tree, "main_ps", 0.5));

        let entry = tree.find_function("main_ps").unwrap();
        let first = tree.function(entry).statement.unwrap();
        let StatementKind::If(if_statement) = tree.statement(first).kind else {
            panic!("expected inserted if statement");
        };
        let discard = if_statement.statement.unwrap();
        assert!(matches!(tree.statement(discard).kind, StatementKind::Discard));

        let ExpressionKind::Binary { op, left, right } =
            tree.expression(if_statement.condition).kind
        else {
            panic!("expected comparison");
        };
        assert_eq!(op, BinaryOp::Less);
        assert!(matches!(
            tree.expression(left).kind,
            ExpressionKind::MemberAccess { swizzle: true, .. }
        ));
        let ExpressionKind::Literal(Literal::Float(threshold)) = tree.expression(right).kind
        else {
            panic!("expected literal threshold");
        };
        assert_eq!(threshold, 0.5);

        // The return statement follows the inserted test.
        let next = tree.statement(first).next.unwrap();
        assert!(matches!(
            tree.statement(next).kind,
            StatementKind::Return { .. }
        ));
    }

    #[test]
    fn scalar_returns_compare_the_value_directly() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let source = "float main_ps() { return 0.25; }";
        let mut tree = parse(&pool, "test.hlsl", source).unwrap();

        assert!(emulate_alpha_test(&mut tree, "main_ps", 0.75));

        let entry = tree.find_function("main_ps").unwrap();
        let first = tree.function(entry).statement.unwrap();
        let StatementKind::If(if_statement) = tree.statement(first).kind else {
            panic!("expected inserted if statement");
        };
        let ExpressionKind::Binary { left, .. } = tree.expression(if_statement.condition).kind
        else {
            panic!("expected comparison");
        };
        assert!(matches!(
            tree.expression(left).kind,
            ExpressionKind::Literal(Literal::Float(_))
        ));
    }

    #[test]
    fn non_color_entry_points_fail() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let source = "int main_ps() { return 1; }";
        let mut tree = parse(&pool, "test.hlsl", source).unwrap();
        assert!(!emulate_alpha_test(&mut tree, "main_ps", 0.5));
    }

    #[test]
    fn missing_entry_point_is_a_no_op() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let source = "float4 other() { return float4(0.0, 0.0, 0.0, 0.0); }";
        let mut tree = parse(&pool, "test.hlsl", source).unwrap();
        assert!(emulate_alpha_test(&mut tree, "main_ps", 0.5));
    }
}
