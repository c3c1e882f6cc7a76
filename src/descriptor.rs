//! Serialization of the tree into a structured JSON descriptor, the
//! payload of the driver's `.analysis` output. Statements carry their
//! full payload; expressions are summarized as their node kind plus
//! resolved type.

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::ast::{ExpressionKind, StatementKind, StmtId, Tree};
use crate::types::Type;

fn enum_name<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn statement_node_type(kind: &StatementKind<'_>) -> &'static str {
    match kind {
        StatementKind::Declaration(_) => "Declaration",
        StatementKind::Struct(_) => "Struct",
        StatementKind::Buffer(_) => "Buffer",
        StatementKind::Function(_) => "Function",
        StatementKind::Expression(_) => "ExpressionStatement",
        StatementKind::Return { .. } => "ReturnStatement",
        StatementKind::Discard => "DiscardStatement",
        StatementKind::Break => "BreakStatement",
        StatementKind::Continue => "ContinueStatement",
        StatementKind::If(_) => "IfStatement",
        StatementKind::For(_) => "ForStatement",
        StatementKind::Block { .. } => "BlockStatement",
        StatementKind::Technique(_) => "Technique",
        StatementKind::Pipeline(_) => "Pipeline",
        StatementKind::Stage(_) => "Stage",
    }
}

fn expression_node_type(kind: &ExpressionKind<'_>) -> &'static str {
    match kind {
        ExpressionKind::Unary { .. } => "UnaryExpression",
        ExpressionKind::Binary { .. } => "BinaryExpression",
        ExpressionKind::Conditional { .. } => "ConditionalExpression",
        ExpressionKind::Cast { .. } => "CastingExpression",
        ExpressionKind::Literal(_) => "LiteralExpression",
        ExpressionKind::Identifier { .. } => "IdentifierExpression",
        ExpressionKind::Constructor { .. } => "ConstructorExpression",
        ExpressionKind::MemberAccess { .. } => "MemberAccess",
        ExpressionKind::ArrayAccess { .. } => "ArrayAccess",
        ExpressionKind::Call(_) => "FunctionCall",
        ExpressionKind::SamplerState { .. } => "SamplerState",
    }
}

/// Descriptors of every top-level statement, in order. This is the payload
/// the driver writes to the `.analysis` file.
pub fn tree_to_json(tree: &Tree<'_>) -> Value {
    Value::Array(
        tree.statements()
            .map(|id| statement_to_json(tree, id))
            .collect(),
    )
}

pub fn type_to_json<'a>(tree: &Tree<'a>, ty: &Type<'a>) -> Value {
    let mut output = Map::new();
    output.insert("baseType".to_string(), enum_name(&ty.base));
    output.insert("samplerType".to_string(), enum_name(&ty.sampler_type));
    if let Some(name) = ty.type_name {
        output.insert("typeName".to_string(), json!(name.as_str()));
    }
    output.insert("array".to_string(), json!(ty.array));
    if let Some(size) = ty.array_size {
        output.insert("arraySize".to_string(), expression_to_json(tree, size));
    }
    if !ty.flags.is_empty() {
        output.insert("flags".to_string(), json!(ty.flags.bits()));
    }
    Value::Object(output)
}

pub fn expression_to_json<'a>(tree: &Tree<'a>, id: crate::ast::ExprId<'a>) -> Value {
    let expression = tree.expression(id);
    let mut output = Map::new();
    output.insert(
        "nodeType".to_string(),
        json!(expression_node_type(&expression.kind)),
    );
    output.insert("type".to_string(), type_to_json(tree, &expression.ty));
    Value::Object(output)
}

fn attribute_chain_to_json<'a>(tree: &Tree<'a>, first: Option<crate::ast::AttrId<'a>>) -> Value {
    let mut attributes = Vec::new();
    let mut attribute = first;
    while let Some(id) = attribute {
        let node = tree.attribute(id);
        let mut output = Map::new();
        output.insert("nodeType".to_string(), json!("Attribute"));
        output.insert("attributeType".to_string(), enum_name(&node.kind));
        let mut arguments = Vec::new();
        let mut argument = node.argument;
        while let Some(arg_id) = argument {
            arguments.push(expression_to_json(tree, arg_id));
            argument = tree.expression(arg_id).next;
        }
        output.insert("arguments".to_string(), Value::Array(arguments));
        attributes.push(Value::Object(output));
        attribute = node.next_attribute;
    }
    Value::Array(attributes)
}

pub fn statement_to_json<'a>(tree: &Tree<'a>, id: StmtId<'a>) -> Value {
    let statement = tree.statement(id);
    let mut output = Map::new();
    output.insert(
        "nodeType".to_string(),
        json!(statement_node_type(&statement.kind)),
    );
    if statement.attributes.is_some() {
        output.insert(
            "attributes".to_string(),
            attribute_chain_to_json(tree, statement.attributes),
        );
    }

    match &statement.kind {
        StatementKind::Declaration(declaration) => {
            output.insert("name".to_string(), json!(declaration.name.as_str()));
            output.insert("type".to_string(), type_to_json(tree, &declaration.ty));
            if let Some(register_name) = declaration.register_name {
                output.insert("registerName".to_string(), json!(register_name.as_str()));
            }
            if let Some(semantic) = declaration.semantic {
                output.insert("semantic".to_string(), json!(semantic.as_str()));
            }
            let mut assignments = Vec::new();
            let mut assignment = declaration.assignment;
            while let Some(expr_id) = assignment {
                assignments.push(expression_to_json(tree, expr_id));
                assignment = tree.expression(expr_id).next;
            }
            output.insert("assignments".to_string(), Value::Array(assignments));
        }
        StatementKind::Struct(def) => {
            output.insert("name".to_string(), json!(def.name.as_str()));
            let mut fields = Vec::new();
            let mut field = def.field;
            while let Some(field_id) = field {
                let node = tree.field(field_id);
                let mut field_output = Map::new();
                field_output.insert("name".to_string(), json!(node.name.as_str()));
                field_output.insert("type".to_string(), type_to_json(tree, &node.ty));
                if let Some(semantic) = node.semantic {
                    field_output.insert("semantic".to_string(), json!(semantic.as_str()));
                }
                fields.push(Value::Object(field_output));
                field = node.next_field;
            }
            output.insert("fields".to_string(), Value::Array(fields));
        }
        StatementKind::Buffer(buffer) => {
            output.insert("name".to_string(), json!(buffer.name.as_str()));
            if let Some(register_name) = buffer.register_name {
                output.insert("registerName".to_string(), json!(register_name.as_str()));
            }
            if let Some(space_name) = buffer.space_name {
                output.insert("spaceName".to_string(), json!(space_name.as_str()));
            }
            let mut fields = Vec::new();
            let mut field = buffer.field;
            while let Some(field_id) = field {
                fields.push(statement_to_json(tree, field_id));
                field = tree.statement(field_id).next;
            }
            output.insert("fields".to_string(), Value::Array(fields));
        }
        StatementKind::Function(function) => {
            output.insert("name".to_string(), json!(function.name.as_str()));
            output.insert(
                "returnType".to_string(),
                type_to_json(tree, &function.return_type),
            );
            if let Some(semantic) = function.semantic {
                output.insert("semantic".to_string(), json!(semantic.as_str()));
            }
            let mut arguments = Vec::new();
            let mut argument = function.argument;
            while let Some(arg_id) = argument {
                let node = tree.argument(arg_id);
                let mut argument_output = Map::new();
                argument_output.insert("name".to_string(), json!(node.name.as_str()));
                argument_output.insert("modifier".to_string(), enum_name(&node.modifier));
                argument_output.insert("type".to_string(), type_to_json(tree, &node.ty));
                if let Some(semantic) = node.semantic {
                    argument_output.insert("semantic".to_string(), json!(semantic.as_str()));
                }
                let mut default_value = Vec::new();
                let mut expression = node.default_value;
                while let Some(expr_id) = expression {
                    default_value.push(expression_to_json(tree, expr_id));
                    expression = tree.expression(expr_id).next;
                }
                argument_output.insert("defaultValue".to_string(), Value::Array(default_value));
                arguments.push(Value::Object(argument_output));
                argument = node.next_argument;
            }
            output.insert("arguments".to_string(), Value::Array(arguments));
            if let Some(forward) = function.forward {
                output.insert("forward".to_string(), statement_to_json(tree, forward));
            }
        }
        _ => {}
    }

    Value::Object(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::strings::StringPool;
    use bumpalo::Bump;

    #[test]
    fn declarations_serialize_their_payload() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let source = "float4 tint : register(c0) = float4(1.0, 1.0, 1.0, 1.0);";
        let tree = parse(&pool, "test.hlsl", source).unwrap();

        let output = tree_to_json(&tree);
        let declaration = &output[0];
        assert_eq!(declaration["nodeType"], "Declaration");
        assert_eq!(declaration["name"], "tint");
        assert_eq!(declaration["type"]["baseType"], "Float4");
        assert_eq!(declaration["registerName"], "c0");
        assert_eq!(
            declaration["assignments"][0]["nodeType"],
            "ConstructorExpression"
        );
    }

    #[test]
    fn functions_serialize_arguments_and_return_type() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let source = "float4 main_ps(float2 uv : TEXCOORD0) : COLOR { return float4(uv, 0.0, 1.0); }";
        let tree = parse(&pool, "test.hlsl", source).unwrap();

        let output = tree_to_json(&tree);
        let function = &output[0];
        assert_eq!(function["nodeType"], "Function");
        assert_eq!(function["name"], "main_ps");
        assert_eq!(function["semantic"], "COLOR");
        assert_eq!(function["returnType"]["baseType"], "Float4");
        assert_eq!(function["arguments"][0]["name"], "uv");
        assert_eq!(function["arguments"][0]["semantic"], "TEXCOORD0");
        assert_eq!(function["arguments"][0]["modifier"], "None");
    }

    #[test]
    fn structs_serialize_their_fields() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let source = "struct Vertex { float3 position : POSITION; float2 uv; };";
        let tree = parse(&pool, "test.hlsl", source).unwrap();

        let output = tree_to_json(&tree);
        let def = &output[0];
        assert_eq!(def["nodeType"], "Struct");
        assert_eq!(def["fields"][0]["name"], "position");
        assert_eq!(def["fields"][0]["semantic"], "POSITION");
        assert_eq!(def["fields"][1]["name"], "uv");
    }

    #[test]
    fn array_types_serialize_their_size_expression() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let tree = parse(&pool, "test.hlsl", "int weights[4];").unwrap();

        let output = tree_to_json(&tree);
        let ty = &output[0]["type"];
        assert_eq!(ty["array"], true);
        assert_eq!(ty["arraySize"]["nodeType"], "LiteralExpression");
    }
}
