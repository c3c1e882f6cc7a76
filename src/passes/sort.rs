use crate::ast::{StatementKind, StmtId, Tree};
use crate::types::TypeFlags;

struct Chain<'a> {
    first: Option<StmtId<'a>>,
    last: Option<StmtId<'a>>,
}

impl<'a> Chain<'a> {
    fn new() -> Self {
        Chain {
            first: None,
            last: None,
        }
    }

    fn push(&mut self, tree: &mut Tree<'a>, statement: StmtId<'a>) {
        if self.first.is_none() {
            self.first = Some(statement);
        }
        if let Some(last) = self.last {
            tree.statement_mut(last).next = Some(statement);
        }
        self.last = Some(statement);
    }
}

/// Stable partition of the top-level statements into: structs, const
/// declarations, other declarations and buffers, functions, then
/// everything else. Relative order within each bucket is preserved.
pub fn sort_tree(tree: &mut Tree<'_>) {
    let mut structs = Chain::new();
    let mut const_declarations = Chain::new();
    let mut declarations = Chain::new();
    let mut functions = Chain::new();
    let mut other = Chain::new();

    let mut statement = tree.first_statement();
    while let Some(id) = statement {
        let next = tree.statement(id).next;
        tree.statement_mut(id).next = None;

        match tree.statement(id).kind {
            StatementKind::Struct(_) => structs.push(tree, id),
            StatementKind::Declaration(declaration)
                if declaration.ty.flags.contains(TypeFlags::CONST) =>
            {
                const_declarations.push(tree, id)
            }
            StatementKind::Declaration(_) | StatementKind::Buffer(_) => {
                declarations.push(tree, id)
            }
            StatementKind::Function(_) => functions.push(tree, id),
            _ => other.push(tree, id),
        }

        statement = next;
    }

    // Chain the buckets in the order we want.
    let mut first: Option<StmtId<'_>> = None;
    let mut last: Option<StmtId<'_>> = None;
    for chain in [structs, const_declarations, declarations, functions, other] {
        if let (Some(chain_first), Some(chain_last)) = (chain.first, chain.last) {
            match last {
                Some(previous) => tree.statement_mut(previous).next = Some(chain_first),
                None => first = Some(chain_first),
            }
            last = Some(chain_last);
        }
    }
    tree.set_first_statement(first);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::strings::StringPool;
    use bumpalo::Bump;

    fn bucket_of(kind: &StatementKind<'_>) -> u32 {
        match kind {
            StatementKind::Struct(_) => 0,
            StatementKind::Declaration(declaration)
                if declaration.ty.flags.contains(TypeFlags::CONST) =>
            {
                1
            }
            StatementKind::Declaration(_) | StatementKind::Buffer(_) => 2,
            StatementKind::Function(_) => 3,
            _ => 4,
        }
    }

    #[test]
    fn statements_become_monotonic_by_bucket() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let source = "\
float4 tint;
float helper() { return 1.0; }
static const float PI = 3.14159;
struct Vertex { float4 position; };
technique T { pass P { ZEnable = True; } }
cbuffer Globals { float4 extra; };
";
        let mut tree = parse(&pool, "test.hlsl", source).unwrap();
        sort_tree(&mut tree);

        let buckets: Vec<u32> = tree
            .statements()
            .map(|id| bucket_of(&tree.statement(id).kind))
            .collect();
        let mut sorted = buckets.clone();
        sorted.sort_unstable();
        assert_eq!(buckets, sorted, "buckets out of order: {:?}", buckets);
        assert_eq!(buckets.len(), 6);
    }

    #[test]
    fn relative_order_within_buckets_is_preserved() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let source = "\
float second() { return 2.0; }
struct A { float x; };
float first() { return 1.0; }
";
        let mut tree = parse(&pool, "test.hlsl", source).unwrap();
        sort_tree(&mut tree);

        let names: Vec<String> = tree
            .statements()
            .filter_map(|id| match &tree.statement(id).kind {
                StatementKind::Function(function) => Some(function.name.as_str().to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["second", "first"]);
    }
}
