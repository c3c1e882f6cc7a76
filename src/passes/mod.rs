//! Tree transformations. Every pass mutates the tree in place through the
//! visitor or by relinking statement chains directly.

mod alpha_test;
mod flatten;
mod group;
mod prune;
mod sort;

pub use alpha_test::emulate_alpha_test;
pub use flatten::flatten_expressions;
pub use group::group_parameters;
pub use prune::prune_tree;
pub use sort::sort_tree;

use crate::ast::{ExpressionKind, StmtId, Tree};
use crate::strings::InternedStr;
use crate::visitor::Visitor;

/// Head/tail accumulator for building a statement chain in order.
pub(crate) struct StatementList<'a> {
    pub head: Option<StmtId<'a>>,
    pub tail: Option<StmtId<'a>>,
}

impl<'a> StatementList<'a> {
    pub fn new() -> Self {
        StatementList {
            head: None,
            tail: None,
        }
    }

    pub fn append(&mut self, tree: &mut Tree<'a>, statement: StmtId<'a>) {
        if self.head.is_none() {
            self.head = Some(statement);
        }
        if let Some(tail) = self.tail {
            tree.statement_mut(tail).next = Some(statement);
        }
        self.tail = Some(statement);
    }
}

/// Inserts the chain `first..=last` after `before`, or at the front of the
/// top-level chain when `before` is absent.
pub(crate) fn add_statements<'a>(
    tree: &mut Tree<'a>,
    before: Option<StmtId<'a>>,
    first: StmtId<'a>,
    last: StmtId<'a>,
) {
    match before {
        None => {
            tree.statement_mut(last).next = tree.first_statement();
            tree.set_first_statement(Some(first));
        }
        Some(before) => {
            let after = tree.statement(before).next;
            tree.statement_mut(last).next = after;
            tree.statement_mut(before).next = Some(first);
        }
    }
}

pub(crate) fn add_single_statement<'a>(
    tree: &mut Tree<'a>,
    before: Option<StmtId<'a>>,
    statement: StmtId<'a>,
) {
    add_statements(tree, before, statement, statement);
}

struct FindArgumentVisitor<'a> {
    found: bool,
    name: InternedStr<'a>,
}

impl<'a> Visitor<'a> for FindArgumentVisitor<'a> {
    fn visit_statements(&mut self, tree: &mut Tree<'a>, first: Option<StmtId<'a>>) {
        let mut statement = first;
        while let Some(id) = statement {
            if self.found {
                break;
            }
            self.visit_statement(tree, id);
            statement = tree.statement(id).next;
        }
    }

    fn visit_identifier_expression(&mut self, tree: &mut Tree<'a>, id: crate::ast::ExprId<'a>) {
        if let ExpressionKind::Identifier { name, .. } = tree.expression(id).kind {
            if name == self.name {
                self.found = true;
            }
        }
    }
}

/// Marks the arguments of `function` that its body never references.
pub fn hide_unused_arguments<'a>(tree: &mut Tree<'a>, function: StmtId<'a>) {
    let mut argument = tree.function(function).argument;
    while let Some(arg_id) = argument {
        let name = tree.argument(arg_id).name;
        let body = tree.function(function).statement;
        let mut visitor = FindArgumentVisitor { found: false, name };
        visitor.visit_statements(tree, body);
        if !visitor.found {
            tree.argument_mut(arg_id).hidden = true;
        }
        argument = tree.argument(arg_id).next_argument;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::strings::StringPool;
    use bumpalo::Bump;

    #[test]
    fn unused_arguments_are_hidden() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let source = "float f(float used, float unused) { return used; }";
        let mut tree = parse(&pool, "test.hlsl", source).unwrap();

        let function = tree.find_function("f").unwrap();
        hide_unused_arguments(&mut tree, function);

        let first = tree.function(function).argument.unwrap();
        let second = tree.argument(first).next_argument.unwrap();
        assert!(!tree.argument(first).hidden);
        assert!(tree.argument(second).hidden);
    }
}
