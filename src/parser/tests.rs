use bumpalo::Bump;

use super::parse;
use crate::ast::{Callee, ExpressionKind, StatementKind, StateValue};
use crate::strings::StringPool;
use crate::types::BaseType;

#[test]
fn parses_global_declaration() {
    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    let tree = parse(&pool, "test.hlsl", "float4 color;").unwrap();

    let statements: Vec<_> = tree.statements().collect();
    assert_eq!(statements.len(), 1);
    let declaration = tree.declaration(statements[0]);
    assert_eq!(declaration.name, "color");
    assert_eq!(declaration.ty.base, BaseType::Float4);
}

#[test]
fn constructor_resolves_to_constructed_type() {
    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    let tree = parse(
        &pool,
        "test.hlsl",
        "float4 f(float3 x) { return float4(x, 1.0); }",
    )
    .unwrap();

    let function_id = tree.find_function("f").unwrap();
    let function = tree.function(function_id);
    let body = function.statement.unwrap();
    let StatementKind::Return {
        expression: Some(expression),
    } = tree.statement(body).kind
    else {
        panic!("expected return statement");
    };
    assert_eq!(tree.expression(expression).ty.base, BaseType::Float4);
    assert!(matches!(
        tree.expression(expression).kind,
        ExpressionKind::Constructor { .. }
    ));
}

#[test]
fn array_size_constant_folds() {
    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    let tree = parse(&pool, "test.hlsl", "int a[2+3];").unwrap();

    let statement = tree.statements().next().unwrap();
    let declaration = tree.declaration(statement);
    assert!(declaration.ty.array);
    let size = declaration.ty.array_size.unwrap();
    assert_eq!(tree.expression_value_int(size), Some(5));
}

#[test]
fn array_to_vector_conversion_is_reported() {
    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    let error = parse(&pool, "test.hlsl", "int a[2+3]; float4 b = a;").unwrap_err();
    assert_eq!(
        error.message,
        "Cannot implicitly convert from 'int[5]' to 'float4'"
    );
    assert_eq!(error.line, 1);
}

#[test]
fn overload_resolution_prefers_exact_match() {
    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    let source = "\
float f(float x) { return x; }
float f(int x) { return 1.0; }
float g() { return f(1); }
";
    let tree = parse(&pool, "test.hlsl", source).unwrap();

    let g = tree.find_function("g").unwrap();
    let body = tree.function(g).statement.unwrap();
    let StatementKind::Return {
        expression: Some(expression),
    } = tree.statement(body).kind
    else {
        panic!("expected return statement");
    };
    let ExpressionKind::Call(call) = tree.expression(expression).kind else {
        panic!("expected call");
    };
    let Callee::User(callee) = call.function else {
        panic!("expected user function");
    };
    let resolved = tree.function(callee);
    let parameter = tree.argument(resolved.argument.unwrap());
    assert_eq!(parameter.ty.base, BaseType::Int);
}

#[test]
fn ambiguous_overload_is_reported() {
    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    let source = "\
float f(float2 v) { return v.x; }
float f(float3 v) { return v.x; }
float4 c;
float g() { return f(c); }
";
    let error = parse(&pool, "test.hlsl", source).unwrap_err();
    assert!(error.message.contains("Ambiguous"), "{}", error.message);
}

#[test]
fn no_matching_overload_is_distinct_from_undeclared() {
    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    let source = "float f(float x) { return x; }\nfloat g() { return f(1.0, 2.0); }";
    let error = parse(&pool, "test.hlsl", source).unwrap_err();
    assert!(
        error.message.contains("No matching overload"),
        "{}",
        error.message
    );

    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    let error = parse(&pool, "test.hlsl", "float g() { return h(1.0); }").unwrap_err();
    assert!(error.message.contains("Undeclared function"), "{}", error.message);
}

#[test]
fn unknown_struct_field_is_reported() {
    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    let source = "struct S { float x; }; S s; float y = s.y;";
    let error = parse(&pool, "test.hlsl", source).unwrap_err();
    assert!(error.message.contains("Unknown field 'y'"), "{}", error.message);
}

#[test]
fn struct_member_access_uses_field_type() {
    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    let source = "struct S { float3 position; }; S s; float3 p = s.position;";
    let tree = parse(&pool, "test.hlsl", source).unwrap();
    assert!(tree.find_global_struct("S").is_some());
}

#[test]
fn line_directive_attributes_declarations_to_original_source() {
    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    let tree = parse(&pool, "test.hlsl", "#line 42 \"other.hlsl\"\nint x;").unwrap();

    let statement_id = tree.statements().next().unwrap();
    let statement = tree.statement(statement_id);
    assert_eq!(statement.file.as_str(), "other.hlsl");
    assert_eq!(statement.line, 42);
}

#[test]
fn swizzles_type_as_vectors() {
    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    let source = "float4 v; float2 f() { return v.xy; }";
    let tree = parse(&pool, "test.hlsl", source).unwrap();
    assert!(tree.find_function("f").is_some());
}

#[test]
fn swizzle_of_length_five_is_rejected() {
    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    let source = "float4 v; float f() { return v.xyzwx; }";
    let error = parse(&pool, "test.hlsl", source).unwrap_err();
    assert!(error.message.contains("Invalid swizzle"), "{}", error.message);
}

#[test]
fn matrix_index_yields_row_vector() {
    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    let source = "float4x3 m; float3 f(int i) { return m[i]; }";
    assert!(parse(&pool, "test.hlsl", source).is_ok());
}

#[test]
fn matrix_member_access_is_bounds_checked() {
    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    let source = "float3x3 m; float f() { return m._m33; }";
    let error = parse(&pool, "test.hlsl", source).unwrap_err();
    assert!(error.message.contains("matrix member"), "{}", error.message);
}

#[test]
fn undeclared_identifier_is_reported() {
    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    let error = parse(&pool, "test.hlsl", "float f() { return missing; }").unwrap_err();
    assert!(
        error.message.contains("Undeclared identifier 'missing'"),
        "{}",
        error.message
    );
}

#[test]
fn block_scopes_hide_locals() {
    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    let source = "float f() { { float inner = 1.0; } return inner; }";
    let error = parse(&pool, "test.hlsl", source).unwrap_err();
    assert!(error.message.contains("Undeclared identifier"), "{}", error.message);
}

#[test]
fn inner_scopes_shadow_outer_variables() {
    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    let source = "\
float x;
float f() {
    int x = 1;
    return 1.0;
}
";
    assert!(parse(&pool, "test.hlsl", source).is_ok());
}

#[test]
fn forward_declaration_links_to_definition() {
    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    let source = "\
float helper(float x);
float main_ps() { return helper(1.0); }
float helper(float x) { return x * 2.0; }
";
    let tree = parse(&pool, "test.hlsl", source).unwrap();

    // The first match by name is the forward declaration.
    let first = tree.find_function("helper").unwrap();
    assert!(tree.function(first).statement.is_none());

    // The definition points back at the forward declaration.
    let statements: Vec<_> = tree.statements().collect();
    let definition = statements[2];
    let function = tree.function(definition);
    assert!(function.statement.is_some());
    assert_eq!(function.forward, Some(first));
}

#[test]
fn function_redefinition_is_reported() {
    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    let source = "float f() { return 1.0; }\nfloat f() { return 2.0; }";
    let error = parse(&pool, "test.hlsl", source).unwrap_err();
    assert!(error.message.contains("Redefinition"), "{}", error.message);
}

#[test]
fn duplicate_struct_names_are_reported() {
    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    let source = "struct S { float x; };\nstruct S { float y; };";
    let error = parse(&pool, "test.hlsl", source).unwrap_err();
    assert!(error.message.contains("already declared"), "{}", error.message);
}

#[test]
fn cbuffer_fields_are_global_declarations() {
    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    let source = "\
cbuffer Globals : register(b0) {
    float4x4 worldViewProjection;
    float4 tint;
};
float4 f(float4 p) { return tint; }
";
    let tree = parse(&pool, "test.hlsl", source).unwrap();

    let buffer_id = tree.find_buffer("Globals").unwrap();
    let (declaration, containing) = tree.find_global_declaration("tint").unwrap();
    assert_eq!(containing, Some(buffer_id));
    assert_eq!(tree.declaration(declaration).ty.base, BaseType::Float4);

    let buffer = match &tree.statement(buffer_id).kind {
        StatementKind::Buffer(buffer) => buffer,
        _ => panic!("expected buffer"),
    };
    assert_eq!(buffer.register_name.unwrap(), "b0");
}

#[test]
fn technique_passes_resolve_state_values() {
    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    let source = "\
technique Shadow {
    pass P0 {
        CullMode = None;
        AlphaBlendEnable = True;
        AlphaRef = 128;
    }
}
";
    let tree = parse(&pool, "test.hlsl", source).unwrap();

    let technique_id = tree.find_technique("Shadow").unwrap();
    let technique = match &tree.statement(technique_id).kind {
        StatementKind::Technique(technique) => technique,
        _ => panic!("expected technique"),
    };
    assert_eq!(technique.num_passes, 1);

    let pass = tree.technique_pass(technique.passes.unwrap());
    assert_eq!(pass.name, "P0");
    assert_eq!(pass.num_state_assignments, 3);

    let first_state = tree.state_assignment(pass.state_assignments.unwrap());
    assert_eq!(first_state.state_name, "CullMode");
    assert_eq!(first_state.value, StateValue::Int(1));
}

#[test]
fn unknown_state_is_reported() {
    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    let source = "technique T { pass P { Sideways = True; } }";
    let error = parse(&pool, "test.hlsl", source).unwrap_err();
    assert!(error.message.contains("Unknown state"), "{}", error.message);
}

#[test]
fn sampler_state_initializer_parses() {
    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    let source = "\
texture diffuseMap;
sampler2D diffuseSampler = sampler_state {
    Texture = <diffuseMap>;
    AddressU = Wrap;
    MinFilter = Linear;
};
";
    let tree = parse(&pool, "test.hlsl", source).unwrap();

    let (declaration, _) = tree.find_global_declaration("diffuseSampler").unwrap();
    let assignment = tree.declaration(declaration).assignment.unwrap();
    let ExpressionKind::SamplerState {
        num_state_assignments,
        ..
    } = tree.expression(assignment).kind
    else {
        panic!("expected sampler_state");
    };
    assert_eq!(num_state_assignments, 3);
}

#[test]
fn attributes_attach_to_statements() {
    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    let source = "\
float f(int n) {
    float sum = 0.0;
    [unroll(4)]
    for (int i = 0; i < n; i = i + 1) {
        sum = sum + 1.0;
    }
    return sum;
}
";
    let tree = parse(&pool, "test.hlsl", source).unwrap();

    let f = tree.find_function("f").unwrap();
    let mut statement = tree.function(f).statement;
    let mut found = false;
    while let Some(id) = statement {
        if let Some(attr_id) = tree.statement(id).attributes {
            let attribute = tree.attribute(attr_id);
            assert_eq!(attribute.kind, crate::ast::AttributeKind::Unroll);
            assert!(attribute.argument.is_some());
            found = true;
        }
        statement = tree.statement(id).next;
    }
    assert!(found, "expected an attributed statement");
}

#[test]
fn default_arguments_make_shorter_calls_viable() {
    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    let source = "\
float scale(float x, float factor = 2.0) { return x * factor; }
float f() { return scale(3.0); }
";
    assert!(parse(&pool, "test.hlsl", source).is_ok());
}

#[test]
fn void_functions_reject_return_values() {
    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    let source = "void f() { return 1.0; }";
    let error = parse(&pool, "test.hlsl", source).unwrap_err();
    assert!(
        error.message.contains("Cannot implicitly convert"),
        "{}",
        error.message
    );
}

#[test]
fn intrinsic_calls_resolve_against_the_table() {
    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    let source = "float f(float3 a, float3 b) { return dot(a, b); }";
    let tree = parse(&pool, "test.hlsl", source).unwrap();

    let f = tree.find_function("f").unwrap();
    let body = tree.function(f).statement.unwrap();
    let StatementKind::Return {
        expression: Some(expression),
    } = tree.statement(body).kind
    else {
        panic!("expected return");
    };
    let ExpressionKind::Call(call) = tree.expression(expression).kind else {
        panic!("expected call");
    };
    assert!(matches!(call.function, Callee::Intrinsic(_)));
    assert_eq!(tree.expression(expression).ty.base, BaseType::Float);
}

#[test]
fn texture_sampling_types_check() {
    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    let source = "\
sampler2D s;
float4 f(float2 uv) { return tex2D(s, uv); }
";
    assert!(parse(&pool, "test.hlsl", source).is_ok());
}

#[test]
fn pipeline_and_stage_parse() {
    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    let source = "\
pipeline Forward {
    ZEnable = True;
    CullMode = CCW;
}
stage Shade {
    in float4 position;
    out float4 color;
    color = position;
}
";
    let tree = parse(&pool, "test.hlsl", source).unwrap();
    assert!(tree.find_pipeline("Forward").is_some());
    assert_eq!(tree.find_first_pipeline(), tree.find_pipeline("Forward"));

    let statements: Vec<_> = tree.statements().collect();
    let stage = match &tree.statement(statements[1]).kind {
        StatementKind::Stage(stage) => stage,
        _ => panic!("expected stage"),
    };
    assert!(stage.inputs.is_some());
    assert!(stage.outputs.is_some());
    assert!(stage.statement.is_some());
}

#[test]
fn unsized_arrays_are_only_accepted_as_arguments() {
    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    let source = "float first(float values[], int count) { return values[0]; }";
    assert!(parse(&pool, "test.hlsl", source).is_ok());

    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    let error = parse(&pool, "test.hlsl", "float values[];").unwrap_err();
    assert!(error.message.contains("array size"), "{}", error.message);
}

#[test]
fn conditional_expression_takes_true_branch_type() {
    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    let source = "float f(bool c) { return c ? 1.0 : 2.0; }";
    assert!(parse(&pool, "test.hlsl", source).is_ok());
}

#[test]
fn multi_variable_declarations_share_the_base_type() {
    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    let source = "float f() { float a = 1.0, b = 2.0; return a + b; }";
    assert!(parse(&pool, "test.hlsl", source).is_ok());
}

#[test]
fn first_error_wins() {
    let bump = Bump::new();
    let pool = StringPool::new(&bump);
    // Both statements are bad; only the first produces the diagnostic.
    let error = parse(&pool, "test.hlsl", "float a = missing1;\nfloat b = missing2;").unwrap_err();
    assert!(error.message.contains("missing1"), "{}", error.message);
}
