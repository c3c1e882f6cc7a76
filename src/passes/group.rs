use super::{add_single_statement, add_statements};
use crate::ast::{Buffer, StatementKind, StmtId, Tree};
use crate::types::TypeFlags;

fn append_declaration<'a>(
    tree: &mut Tree<'a>,
    first: &mut Option<StmtId<'a>>,
    last: &mut Option<StmtId<'a>>,
    declaration: StmtId<'a>,
) {
    match *last {
        Some(previous) => tree.statement_mut(previous).next = Some(declaration),
        None => *first = Some(declaration),
    }
    *last = Some(declaration);
}

fn has_semantic<'a>(tree: &Tree<'a>, declaration: StmtId<'a>, name: &str) -> bool {
    tree.declaration(declaration)
        .semantic
        .map_or(false, |semantic| {
            semantic.as_str().eq_ignore_ascii_case(name)
        })
}

/// Reorganizes uniform globals into two synthetic cbuffers, `per_item`
/// (register b0) and `per_pass` (register b1), grouped by semantic:
/// `PER_ITEM`, `PER_MATERIAL` or no semantic select per-item, everything
/// else per-pass. Samplers are hoisted to precede the buffers, and
/// `PER_INSTANCED_ITEM` declarations are appended at the end of per-item.
/// Static and const declarations are not moved.
pub fn group_parameters(tree: &mut Tree<'_>) {
    let mut first_per_item = None;
    let mut last_per_item = None;

    let mut instance_data_declaration = None;

    let mut first_per_pass = None;
    let mut last_per_pass = None;

    let mut first_per_item_sampler = None;
    let mut last_per_item_sampler = None;

    let mut first_per_pass_sampler = None;
    let mut last_per_pass_sampler = None;

    // The buffers are inserted after the last struct or const declaration.
    let mut statement_before_buffers: Option<StmtId<'_>> = None;

    let mut previous: Option<StmtId<'_>> = None;
    let mut statement = tree.first_statement();
    while let Some(id) = statement {
        let next = tree.statement(id).next;

        match tree.statement(id).kind {
            StatementKind::Struct(_) => {
                statement_before_buffers = Some(id);
            }
            StatementKind::Declaration(declaration) => {
                if declaration.ty.flags.contains(TypeFlags::CONST) {
                    statement_before_buffers = Some(id);
                }

                // Samplers and static/const parameters stay where they are.
                let moveable = !declaration.ty.flags.contains(TypeFlags::STATIC)
                    && !declaration.ty.flags.contains(TypeFlags::CONST);
                if moveable {
                    // Unlink the statement.
                    tree.statement_mut(id).next = None;
                    match previous {
                        Some(previous) => tree.statement_mut(previous).next = next,
                        None => tree.set_first_statement(next),
                    }

                    let mut declaration_id = Some(id);
                    while let Some(current) = declaration_id {
                        let next_declaration = tree.declaration(current).next_declaration;

                        if has_semantic(tree, current, "PER_INSTANCED_ITEM") {
                            debug_assert!(instance_data_declaration.is_none());
                            instance_data_declaration = Some(current);
                        } else {
                            // Select the group based on type and semantic.
                            let per_item = tree.declaration(current).semantic.is_none()
                                || has_semantic(tree, current, "PER_ITEM")
                                || has_semantic(tree, current, "PER_MATERIAL");
                            let sampler = tree.declaration(current).ty.base.is_sampler();
                            match (per_item, sampler) {
                                (true, true) => append_declaration(
                                    tree,
                                    &mut first_per_item_sampler,
                                    &mut last_per_item_sampler,
                                    current,
                                ),
                                (true, false) => append_declaration(
                                    tree,
                                    &mut first_per_item,
                                    &mut last_per_item,
                                    current,
                                ),
                                (false, true) => append_declaration(
                                    tree,
                                    &mut first_per_pass_sampler,
                                    &mut last_per_pass_sampler,
                                    current,
                                ),
                                (false, false) => append_declaration(
                                    tree,
                                    &mut first_per_pass,
                                    &mut last_per_pass,
                                    current,
                                ),
                            }
                        }

                        // Unlink from the multi-variable declaration list
                        // and drop any explicit register.
                        tree.declaration_mut(current).next_declaration = None;
                        tree.declaration_mut(current).register_name = None;

                        declaration_id = next_declaration;
                    }
                }
            }
            _ => {}
        }

        if tree.statement(id).next == next {
            previous = Some(id);
        }
        statement = next;
    }

    // Instance data goes at the end of the per-item buffer.
    if let Some(instance) = instance_data_declaration {
        match last_per_item {
            Some(last) => tree.statement_mut(last).next = Some(instance),
            None => first_per_item = Some(instance),
        }
    }

    // Hoist samplers to precede the buffers.
    if let (Some(first), Some(last)) = (first_per_item_sampler, last_per_item_sampler) {
        add_statements(tree, statement_before_buffers, first, last);
        statement_before_buffers = Some(last);
    }
    if let (Some(first), Some(last)) = (first_per_pass_sampler, last_per_pass_sampler) {
        add_statements(tree, statement_before_buffers, first, last);
        statement_before_buffers = Some(last);
    }

    if let Some(first_field) = first_per_item {
        let buffer = build_synthetic_buffer(tree, "per_item", "b0", first_field);
        add_single_statement(tree, statement_before_buffers, buffer);
        statement_before_buffers = Some(buffer);
    }

    if let Some(first_field) = first_per_pass {
        let buffer = build_synthetic_buffer(tree, "per_pass", "b1", first_field);
        add_single_statement(tree, statement_before_buffers, buffer);
    }
}

fn build_synthetic_buffer<'a>(
    tree: &mut Tree<'a>,
    name: &str,
    register: &str,
    first_field: StmtId<'a>,
) -> StmtId<'a> {
    let (file, line) = {
        let statement = tree.statement(first_field);
        (statement.file, statement.line.saturating_sub(1))
    };
    let name = tree.add_string(name);
    let register_name = tree.add_string(register);
    let buffer = tree.add_statement(
        file,
        line,
        StatementKind::Buffer(Buffer {
            name,
            register_name: Some(register_name),
            space_name: None,
            field: Some(first_field),
        }),
    );

    let mut field = Some(first_field);
    while let Some(id) = field {
        tree.declaration_mut(id).buffer = Some(buffer);
        field = tree.statement(id).next;
    }
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::strings::StringPool;
    use bumpalo::Bump;

    #[test]
    fn uniforms_are_grouped_into_synthetic_buffers() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let source = "\
float4 objectColor : PER_ITEM;
float4 lightDirection : PER_PASS;
float4 materialTint;
sampler2D diffuseSampler;
static const float PI = 3.14159;
float4 f(float4 p) { return p; }
";
        let mut tree = parse(&pool, "test.hlsl", source).unwrap();
        group_parameters(&mut tree);

        let per_item = tree.find_buffer("per_item").unwrap();
        let per_pass = tree.find_buffer("per_pass").unwrap();

        let field_names = |buffer_id| {
            let buffer = match &tree.statement(buffer_id).kind {
                StatementKind::Buffer(buffer) => buffer,
                _ => panic!("expected buffer"),
            };
            let mut names = Vec::new();
            let mut field = buffer.field;
            while let Some(id) = field {
                names.push(tree.declaration(id).name.as_str().to_string());
                field = tree.statement(id).next;
            }
            names
        };

        assert_eq!(field_names(per_item), vec!["objectColor", "materialTint"]);
        assert_eq!(field_names(per_pass), vec!["lightDirection"]);

        // Buffer registers are b0/b1; fields link back to their buffer.
        let per_item_buffer = match &tree.statement(per_item).kind {
            StatementKind::Buffer(buffer) => buffer,
            _ => unreachable!(),
        };
        assert_eq!(per_item_buffer.register_name.unwrap(), "b0");
        let first_field = per_item_buffer.field.unwrap();
        assert_eq!(tree.declaration(first_field).buffer, Some(per_item));
    }

    #[test]
    fn samplers_and_consts_stay_out_of_buffers() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let source = "\
static const float PI = 3.14159;
sampler2D diffuseSampler;
float4 tint;
";
        let mut tree = parse(&pool, "test.hlsl", source).unwrap();
        group_parameters(&mut tree);

        // The sampler is hoisted as a plain declaration, before the buffer.
        let order: Vec<String> = tree
            .statements()
            .map(|id| match &tree.statement(id).kind {
                StatementKind::Declaration(declaration) => {
                    declaration.name.as_str().to_string()
                }
                StatementKind::Buffer(buffer) => buffer.name.as_str().to_string(),
                _ => "?".to_string(),
            })
            .collect();
        assert_eq!(order, vec!["PI", "diffuseSampler", "per_item"]);

        let (sampler, containing) = tree.find_global_declaration("diffuseSampler").unwrap();
        assert!(containing.is_none());
        assert!(tree.declaration(sampler).buffer.is_none());
    }

    #[test]
    fn instanced_item_semantics_append_to_per_item() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let source = "\
float4 color : PER_ITEM;
float4x4 instanceTransform : PER_INSTANCED_ITEM;
";
        let mut tree = parse(&pool, "test.hlsl", source).unwrap();
        group_parameters(&mut tree);

        let per_item = tree.find_buffer("per_item").unwrap();
        let buffer = match &tree.statement(per_item).kind {
            StatementKind::Buffer(buffer) => buffer,
            _ => unreachable!(),
        };
        let mut names = Vec::new();
        let mut field = buffer.field;
        while let Some(id) = field {
            names.push(tree.declaration(id).name.as_str().to_string());
            field = tree.statement(id).next;
        }
        assert_eq!(names, vec!["color", "instanceTransform"]);
    }
}
