use crate::ast::{Callee, ExpressionKind, StatementKind, StmtId, Tree};
use crate::types::{BaseType, Type};
use crate::visitor::{self, Visitor};

/// Hides every top-level statement and buffer field, then re-marks the
/// statements reachable from the given entry points: called functions,
/// referenced globals and every user-defined type appearing in a reached
/// type. A buffer stays visible iff one of its fields is.
pub fn prune_tree<'a>(tree: &mut Tree<'a>, entry_name0: &str, entry_name1: Option<&str>) {
    let mut reset = ResetHiddenFlagVisitor;
    reset.visit_root(tree);

    if let Some(entry) = find_entry(tree, entry_name0) {
        let mut mark = MarkVisibleStatementsVisitor;
        mark.visit_function(tree, entry);
    }
    if let Some(name) = entry_name1 {
        if let Some(entry) = find_entry(tree, name) {
            let mut mark = MarkVisibleStatementsVisitor;
            mark.visit_function(tree, entry);
        }
    }

    // Mark buffers visible if any of their fields is.
    let mut statement = tree.first_statement();
    while let Some(id) = statement {
        if let StatementKind::Buffer(buffer) = tree.statement(id).kind {
            let mut field = buffer.field;
            while let Some(field_id) = field {
                if !tree.statement(field_id).hidden {
                    tree.statement_mut(id).hidden = false;
                    break;
                }
                field = tree.statement(field_id).next;
            }
        }
        statement = tree.statement(id).next;
    }
}

/// The entry function to mark from: the definition when the name was also
/// forward-declared, otherwise the first match.
fn find_entry<'a>(tree: &Tree<'a>, name: &str) -> Option<StmtId<'a>> {
    let mut fallback = None;
    for id in tree.statements() {
        if let StatementKind::Function(function) = &tree.statement(id).kind {
            if function.name == *name {
                if function.statement.is_some() {
                    return Some(id);
                }
                fallback.get_or_insert(id);
            }
        }
    }
    fallback
}

/// The definition completing a bodyless forward declaration, if any.
fn find_definition<'a>(tree: &Tree<'a>, forward: StmtId<'a>) -> Option<StmtId<'a>> {
    tree.statements().find(|id| match &tree.statement(*id).kind {
        StatementKind::Function(function) => function.forward == Some(forward),
        _ => false,
    })
}

struct ResetHiddenFlagVisitor;

impl<'a> Visitor<'a> for ResetHiddenFlagVisitor {
    fn visit_top_level_statement(&mut self, tree: &mut Tree<'a>, id: StmtId<'a>) {
        tree.statement_mut(id).hidden = true;
        if matches!(tree.statement(id).kind, StatementKind::Buffer(_)) {
            self.visit_buffer(tree, id);
        }
    }

    // Hide buffer fields.
    fn visit_declaration(&mut self, tree: &mut Tree<'a>, id: StmtId<'a>) {
        tree.statement_mut(id).hidden = true;
    }

    fn visit_argument(&mut self, tree: &mut Tree<'a>, id: crate::ast::ArgId<'a>) {
        tree.argument_mut(id).hidden = false;
    }
}

struct MarkVisibleStatementsVisitor;

impl<'a> Visitor<'a> for MarkVisibleStatementsVisitor {
    fn visit_function(&mut self, tree: &mut Tree<'a>, id: StmtId<'a>) {
        tree.statement_mut(id).hidden = false;
        visitor::walk_function(self, tree, id);

        if let Some(forward) = tree.function(id).forward {
            self.visit_function(tree, forward);
        }
    }

    fn visit_function_call(&mut self, tree: &mut Tree<'a>, id: crate::ast::ExprId<'a>) {
        visitor::walk_function_call(self, tree, id);

        if let ExpressionKind::Call(call) = tree.expression(id).kind {
            if let Callee::User(function_id) = call.function {
                if tree.statement(function_id).hidden {
                    self.visit_function(tree, function_id);
                }
                // Calls resolved against a forward declaration must also
                // keep the completing definition alive.
                if tree.function(function_id).statement.is_none() {
                    if let Some(definition) = find_definition(tree, function_id) {
                        if tree.statement(definition).hidden {
                            self.visit_function(tree, definition);
                        }
                    }
                }
            }
        }
    }

    fn visit_identifier_expression(&mut self, tree: &mut Tree<'a>, id: crate::ast::ExprId<'a>) {
        if let ExpressionKind::Identifier { name, global } = tree.expression(id).kind {
            if global {
                if let Some((declaration, _)) = tree.find_global_declaration(name.as_str()) {
                    if tree.statement(declaration).hidden {
                        tree.statement_mut(declaration).hidden = false;
                        self.visit_declaration(tree, declaration);
                    }
                }
            }
        }
    }

    fn visit_type(&mut self, tree: &mut Tree<'a>, ty: Type<'a>) {
        if ty.base == BaseType::UserDefined {
            if let Some(name) = ty.type_name {
                if let Some(struct_id) = tree.find_global_struct(name.as_str()) {
                    tree.statement_mut(struct_id).hidden = false;
                    self.visit_struct(tree, struct_id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::strings::StringPool;
    use bumpalo::Bump;

    #[test]
    fn prune_keeps_only_reachable_statements() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let source = "\
float4 usedGlobal;
float4 unusedGlobal;
struct UsedStruct { float4 value; };
struct UnusedStruct { float4 value; };
float4 helper(UsedStruct s) { return s.value; }
float4 orphan() { return unusedGlobal; }
float4 main_ps() {
    UsedStruct s;
    return helper(s) + usedGlobal;
}
";
        let mut tree = parse(&pool, "test.hlsl", source).unwrap();
        prune_tree(&mut tree, "main_ps", None);

        let hidden_of = |name: &str| {
            let id = tree
                .statements()
                .find(|id| match &tree.statement(*id).kind {
                    StatementKind::Function(f) => f.name == *name,
                    StatementKind::Struct(s) => s.name == *name,
                    StatementKind::Declaration(d) => d.name == *name,
                    _ => false,
                })
                .unwrap();
            tree.statement(id).hidden
        };

        assert!(!hidden_of("main_ps"));
        assert!(!hidden_of("helper"));
        assert!(!hidden_of("usedGlobal"));
        assert!(!hidden_of("UsedStruct"));
        assert!(hidden_of("orphan"));
        assert!(hidden_of("unusedGlobal"));
        assert!(hidden_of("UnusedStruct"));
    }

    #[test]
    fn buffers_survive_when_a_field_is_referenced() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let source = "\
cbuffer Used { float4 tint; };
cbuffer Unused { float4 nobodyCares; };
float4 main_ps() { return tint; }
";
        let mut tree = parse(&pool, "test.hlsl", source).unwrap();
        prune_tree(&mut tree, "main_ps", None);

        let used = tree.find_buffer("Used").unwrap();
        let unused = tree.find_buffer("Unused").unwrap();
        assert!(!tree.statement(used).hidden);
        assert!(tree.statement(unused).hidden);
    }

    #[test]
    fn forward_declared_entry_keeps_its_definition() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let source = "\
float helper(float x);
float main_ps() { return helper(1.0); }
float helper(float x) { return x; }
";
        let mut tree = parse(&pool, "test.hlsl", source).unwrap();
        prune_tree(&mut tree, "main_ps", None);

        for id in tree.statements() {
            if let StatementKind::Function(function) = &tree.statement(id).kind {
                if function.name == *"helper" && function.statement.is_some() {
                    assert!(!tree.statement(id).hidden);
                }
            }
        }
    }
}
