use super::StatementList;
use crate::ast::{
    Declaration, ExprId, ExpressionKind, StatementKind, StmtId, Tree,
};
use crate::types::BaseType;
use crate::visitor::Visitor;

/// Rewrites expressions into three-address form wherever a nested function
/// call with out/inout arguments would otherwise have its side effects
/// reordered. Temporaries are named `tmp0, tmp1, ...` and the split
/// statements preserve evaluation order. Left-hand sides of assignments
/// are never flattened, only their right-hand sides.
pub fn flatten_expressions(tree: &mut Tree<'_>) {
    let mut flattener = ExpressionFlattener {
        tmp_index: 0,
        slot: None,
        replaced: None,
    };
    flattener.visit_root(tree);
}

/// True when evaluating `expr` requires splitting: some nested
/// subexpression is a call with output arguments. Conditionals, casts,
/// literals, identifiers, constructors, member and array accesses never
/// require flattening themselves, only their operands may.
fn needs_flattening<'a>(tree: &Tree<'a>, expr: Option<ExprId<'a>>, level: u32) -> bool {
    let Some(id) = expr else {
        return false;
    };
    let expression = tree.expression(id);
    let next = expression.next;
    match expression.kind {
        ExpressionKind::Unary { operand, .. } => {
            needs_flattening(tree, Some(operand), level + 1) || needs_flattening(tree, next, level)
        }
        ExpressionKind::Binary { op, left, right } => {
            if op.is_assign() {
                needs_flattening(tree, Some(right), level + 1)
                    || needs_flattening(tree, next, level)
            } else {
                needs_flattening(tree, Some(left), level + 1)
                    || needs_flattening(tree, Some(right), level + 1)
                    || needs_flattening(tree, next, level)
            }
        }
        ExpressionKind::Conditional {
            condition,
            if_true,
            if_false,
        } => {
            needs_flattening(tree, Some(condition), level + 1)
                || needs_flattening(tree, Some(if_true), level + 1)
                || needs_flattening(tree, Some(if_false), level + 1)
                || needs_flattening(tree, next, level)
        }
        ExpressionKind::Cast { operand } => {
            needs_flattening(tree, Some(operand), level + 1) || needs_flattening(tree, next, level)
        }
        ExpressionKind::Literal(_) | ExpressionKind::Identifier { .. } => {
            needs_flattening(tree, next, level)
        }
        ExpressionKind::Constructor { argument } => {
            needs_flattening(tree, argument, level + 1) || needs_flattening(tree, next, level)
        }
        ExpressionKind::MemberAccess { object, .. } => {
            needs_flattening(tree, Some(object), level + 1) || needs_flattening(tree, next, level)
        }
        ExpressionKind::ArrayAccess { array, index } => {
            needs_flattening(tree, Some(array), level + 1)
                || needs_flattening(tree, Some(index), level + 1)
                || needs_flattening(tree, next, level)
        }
        ExpressionKind::Call(call) => {
            if tree.callee_num_output_arguments(call.function) > 0 && level > 0 {
                return true;
            }
            needs_flattening(tree, call.argument, level + 1)
                || needs_flattening(tree, next, level)
        }
        ExpressionKind::SamplerState { .. } => false,
    }
}

/// Where the statement chain currently being visited hangs off the tree;
/// replacing a statement rewrites this link.
#[derive(Clone, Copy)]
enum Slot<'a> {
    FunctionBody(StmtId<'a>),
    BlockBody(StmtId<'a>),
    IfBody(StmtId<'a>),
    IfElse(StmtId<'a>),
    ForBody(StmtId<'a>),
    Next(StmtId<'a>),
}

impl<'a> Slot<'a> {
    fn set(self, tree: &mut Tree<'a>, value: Option<StmtId<'a>>) {
        match self {
            Slot::FunctionBody(id) => tree.function_mut(id).statement = value,
            Slot::BlockBody(id) => {
                if let StatementKind::Block { statement } = &mut tree.statement_mut(id).kind {
                    *statement = value;
                }
            }
            Slot::IfBody(id) => {
                if let StatementKind::If(if_statement) = &mut tree.statement_mut(id).kind {
                    if_statement.statement = value;
                }
            }
            Slot::IfElse(id) => {
                if let StatementKind::If(if_statement) = &mut tree.statement_mut(id).kind {
                    if_statement.else_statement = value;
                }
            }
            Slot::ForBody(id) => {
                if let StatementKind::For(for_statement) = &mut tree.statement_mut(id).kind {
                    for_statement.statement = value;
                }
            }
            Slot::Next(id) => tree.statement_mut(id).next = value,
        }
    }
}

struct ExpressionFlattener<'a> {
    tmp_index: u32,
    slot: Option<Slot<'a>>,
    /// Tail of the replacement chain for the statement just visited, when
    /// it was rewritten; the statement walk continues from here.
    replaced: Option<StmtId<'a>>,
}

impl<'a> ExpressionFlattener<'a> {
    /// Rewrites `expr` for embedding in its parent statement, appending
    /// temporary declarations to `statements` in evaluation order.
    fn flatten_subexpression(
        &mut self,
        tree: &mut Tree<'a>,
        expr: ExprId<'a>,
        statements: &mut StatementList<'a>,
    ) -> ExprId<'a> {
        if !needs_flattening(tree, Some(expr), 1) {
            return expr;
        }
        let expression = *tree.expression(expr);
        match expression.kind {
            ExpressionKind::Unary { op, operand } => {
                let tmp = self.materialize(tree, operand, statements);
                tree.add_expression(
                    expression.file,
                    expression.line,
                    expression.ty,
                    ExpressionKind::Unary { op, operand: tmp },
                )
            }
            ExpressionKind::Binary { op, left, right } if !op.is_assign() => {
                let tmp1 = self.materialize(tree, left, statements);
                let tmp2 = self.materialize(tree, right, statements);
                tree.add_expression(
                    expression.file,
                    expression.line,
                    expression.ty,
                    ExpressionKind::Binary {
                        op,
                        left: tmp1,
                        right: tmp2,
                    },
                )
            }
            ExpressionKind::Binary { op, left, right } => {
                // Assignment: only the right-hand side is rewritten.
                let rhs = self.flatten_subexpression(tree, right, statements);
                tree.add_expression(
                    expression.file,
                    expression.line,
                    expression.ty,
                    ExpressionKind::Binary {
                        op,
                        left,
                        right: rhs,
                    },
                )
            }
            ExpressionKind::Call(call) => {
                // Argument lists of out-parameter calls are not split
                // further; the call itself anchors the ordering.
                debug_assert!(!needs_flattening(tree, call.argument, 0));
                expr
            }
            _ => expr,
        }
    }

    /// Evaluates `expr` into a fresh temporary and returns an identifier
    /// expression referencing it.
    fn materialize(
        &mut self,
        tree: &mut Tree<'a>,
        expr: ExprId<'a>,
        statements: &mut StatementList<'a>,
    ) -> ExprId<'a> {
        let initializer = self.flatten_subexpression(tree, expr, statements);
        let expression = *tree.expression(initializer);
        debug_assert!(expression.ty.base != BaseType::Void);

        let name = tree.add_string_format(format_args!("tmp{}", self.tmp_index));
        self.tmp_index += 1;

        let declaration = tree.add_statement(
            expression.file,
            expression.line,
            StatementKind::Declaration(Declaration {
                name,
                ty: expression.ty,
                register_name: None,
                space_name: None,
                semantic: None,
                next_declaration: None,
                assignment: Some(initializer),
                buffer: None,
            }),
        );
        statements.append(tree, declaration);

        tree.add_expression(
            expression.file,
            expression.line,
            expression.ty,
            ExpressionKind::Identifier {
                name,
                global: false,
            },
        )
    }

    /// Replaces `statement` with the chain in `statements` (which must
    /// contain it, or end with its replacement) through the current slot.
    fn splice(
        &mut self,
        tree: &mut Tree<'a>,
        statements: StatementList<'a>,
        old_next: Option<StmtId<'a>>,
    ) {
        let (Some(head), Some(tail)) = (statements.head, statements.tail) else {
            return;
        };
        if let Some(slot) = self.slot {
            slot.set(tree, Some(head));
        }
        tree.statement_mut(tail).next = old_next;
        self.replaced = Some(tail);
    }
}

impl<'a> Visitor<'a> for ExpressionFlattener<'a> {
    fn visit_function(&mut self, tree: &mut Tree<'a>, id: StmtId<'a>) {
        let body = tree.function(id).statement;
        self.slot = Some(Slot::FunctionBody(id));
        self.visit_statements(tree, body);
        self.slot = None;
    }

    fn visit_if_statement(&mut self, tree: &mut Tree<'a>, id: StmtId<'a>) {
        // Conditions would need their temporaries hoisted above the if
        // statement; they are left untouched.
        let (body, else_body) = match tree.statement(id).kind {
            StatementKind::If(if_statement) => {
                (if_statement.statement, if_statement.else_statement)
            }
            _ => return,
        };
        self.slot = Some(Slot::IfBody(id));
        self.visit_statements(tree, body);
        if else_body.is_some() {
            self.slot = Some(Slot::IfElse(id));
            self.visit_statements(tree, else_body);
        }
    }

    fn visit_for_statement(&mut self, tree: &mut Tree<'a>, id: StmtId<'a>) {
        // Initializers, conditions and increments are left untouched; a
        // rewrite there would have to handle every loop exit.
        let body = match tree.statement(id).kind {
            StatementKind::For(for_statement) => for_statement.statement,
            _ => return,
        };
        self.slot = Some(Slot::ForBody(id));
        self.visit_statements(tree, body);
    }

    fn visit_block_statement(&mut self, tree: &mut Tree<'a>, id: StmtId<'a>) {
        let body = match tree.statement(id).kind {
            StatementKind::Block { statement } => statement,
            _ => return,
        };
        self.slot = Some(Slot::BlockBody(id));
        self.visit_statements(tree, body);
    }

    fn visit_statements(&mut self, tree: &mut Tree<'a>, first: Option<StmtId<'a>>) {
        let mut statement = first;
        while let Some(id) = statement {
            self.visit_statement(tree, id);
            let anchor = self.replaced.take().unwrap_or(id);
            self.slot = Some(Slot::Next(anchor));
            statement = tree.statement(anchor).next;
        }
    }

    // Usually a function call or assignment.
    fn visit_expression_statement(&mut self, tree: &mut Tree<'a>, id: StmtId<'a>) {
        let StatementKind::Expression(expression) = tree.statement(id).kind else {
            return;
        };
        if !needs_flattening(tree, Some(expression), 0) {
            return;
        }

        let mut statements = StatementList::new();
        let rewritten = self.flatten_subexpression(tree, expression, &mut statements);
        let (file, line) = {
            let node = tree.expression(rewritten);
            (node.file, node.line)
        };
        let replacement = tree.add_statement(file, line, StatementKind::Expression(rewritten));
        statements.append(tree, replacement);

        let old_next = tree.statement(id).next;
        self.splice(tree, statements, old_next);
    }

    fn visit_declaration(&mut self, tree: &mut Tree<'a>, id: StmtId<'a>) {
        // Global declarations have no statement context to splice into.
        if self.slot.is_none() {
            return;
        }
        let Some(assignment) = tree.declaration(id).assignment else {
            return;
        };
        if !needs_flattening(tree, Some(assignment), 1) {
            return;
        }

        let mut statements = StatementList::new();
        let rewritten = self.flatten_subexpression(tree, assignment, &mut statements);
        tree.declaration_mut(id).assignment = Some(rewritten);

        let old_next = tree.statement(id).next;
        statements.append(tree, id);
        self.splice(tree, statements, old_next);
    }

    fn visit_return_statement(&mut self, tree: &mut Tree<'a>, id: StmtId<'a>) {
        let StatementKind::Return {
            expression: Some(expression),
        } = tree.statement(id).kind
        else {
            return;
        };
        if !needs_flattening(tree, Some(expression), 1) {
            return;
        }

        let mut statements = StatementList::new();
        let rewritten = self.flatten_subexpression(tree, expression, &mut statements);
        tree.statement_mut(id).kind = StatementKind::Return {
            expression: Some(rewritten),
        };

        let old_next = tree.statement(id).next;
        statements.append(tree, id);
        self.splice(tree, statements, old_next);
    }
}
