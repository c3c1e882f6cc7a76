use crate::ast::{
    ArgId, ExprId, ExpressionKind, FieldId, PassId, StateId, StatementKind, StmtId, Tree,
};
use crate::types::Type;

/// Tree traversal with one method per node kind. Every method defaults to
/// recursing into the node's children through the matching `walk_*`
/// function; passes override just the methods they care about.
///
/// A pass may replace a child link before descending into it, but must not
/// reorder sibling links it has not visited yet.
pub trait Visitor<'a>: Sized {
    fn visit_type(&mut self, tree: &mut Tree<'a>, ty: Type<'a>) {
        let _ = (tree, ty);
    }

    fn visit_root(&mut self, tree: &mut Tree<'a>) {
        walk_root(self, tree);
    }

    fn visit_top_level_statement(&mut self, tree: &mut Tree<'a>, id: StmtId<'a>) {
        walk_top_level_statement(self, tree, id);
    }

    fn visit_statements(&mut self, tree: &mut Tree<'a>, first: Option<StmtId<'a>>) {
        walk_statements(self, tree, first);
    }

    fn visit_statement(&mut self, tree: &mut Tree<'a>, id: StmtId<'a>) {
        walk_statement(self, tree, id);
    }

    fn visit_declaration(&mut self, tree: &mut Tree<'a>, id: StmtId<'a>) {
        walk_declaration(self, tree, id);
    }

    fn visit_struct(&mut self, tree: &mut Tree<'a>, id: StmtId<'a>) {
        walk_struct(self, tree, id);
    }

    fn visit_struct_field(&mut self, tree: &mut Tree<'a>, id: FieldId<'a>) {
        walk_struct_field(self, tree, id);
    }

    fn visit_buffer(&mut self, tree: &mut Tree<'a>, id: StmtId<'a>) {
        walk_buffer(self, tree, id);
    }

    fn visit_function(&mut self, tree: &mut Tree<'a>, id: StmtId<'a>) {
        walk_function(self, tree, id);
    }

    fn visit_argument(&mut self, tree: &mut Tree<'a>, id: ArgId<'a>) {
        walk_argument(self, tree, id);
    }

    fn visit_expression_statement(&mut self, tree: &mut Tree<'a>, id: StmtId<'a>) {
        walk_expression_statement(self, tree, id);
    }

    fn visit_return_statement(&mut self, tree: &mut Tree<'a>, id: StmtId<'a>) {
        walk_return_statement(self, tree, id);
    }

    fn visit_discard_statement(&mut self, tree: &mut Tree<'a>, id: StmtId<'a>) {
        let _ = (tree, id);
    }

    fn visit_break_statement(&mut self, tree: &mut Tree<'a>, id: StmtId<'a>) {
        let _ = (tree, id);
    }

    fn visit_continue_statement(&mut self, tree: &mut Tree<'a>, id: StmtId<'a>) {
        let _ = (tree, id);
    }

    fn visit_if_statement(&mut self, tree: &mut Tree<'a>, id: StmtId<'a>) {
        walk_if_statement(self, tree, id);
    }

    fn visit_for_statement(&mut self, tree: &mut Tree<'a>, id: StmtId<'a>) {
        walk_for_statement(self, tree, id);
    }

    fn visit_block_statement(&mut self, tree: &mut Tree<'a>, id: StmtId<'a>) {
        walk_block_statement(self, tree, id);
    }

    fn visit_expression(&mut self, tree: &mut Tree<'a>, id: ExprId<'a>) {
        walk_expression(self, tree, id);
    }

    fn visit_unary_expression(&mut self, tree: &mut Tree<'a>, id: ExprId<'a>) {
        walk_unary_expression(self, tree, id);
    }

    fn visit_binary_expression(&mut self, tree: &mut Tree<'a>, id: ExprId<'a>) {
        walk_binary_expression(self, tree, id);
    }

    fn visit_conditional_expression(&mut self, tree: &mut Tree<'a>, id: ExprId<'a>) {
        walk_conditional_expression(self, tree, id);
    }

    fn visit_casting_expression(&mut self, tree: &mut Tree<'a>, id: ExprId<'a>) {
        walk_casting_expression(self, tree, id);
    }

    fn visit_literal_expression(&mut self, tree: &mut Tree<'a>, id: ExprId<'a>) {
        let _ = (tree, id);
    }

    fn visit_identifier_expression(&mut self, tree: &mut Tree<'a>, id: ExprId<'a>) {
        let _ = (tree, id);
    }

    fn visit_constructor_expression(&mut self, tree: &mut Tree<'a>, id: ExprId<'a>) {
        walk_constructor_expression(self, tree, id);
    }

    fn visit_member_access(&mut self, tree: &mut Tree<'a>, id: ExprId<'a>) {
        walk_member_access(self, tree, id);
    }

    fn visit_array_access(&mut self, tree: &mut Tree<'a>, id: ExprId<'a>) {
        walk_array_access(self, tree, id);
    }

    fn visit_function_call(&mut self, tree: &mut Tree<'a>, id: ExprId<'a>) {
        walk_function_call(self, tree, id);
    }

    fn visit_sampler_state(&mut self, tree: &mut Tree<'a>, id: ExprId<'a>) {
        walk_sampler_state(self, tree, id);
    }

    fn visit_state_assignment(&mut self, tree: &mut Tree<'a>, id: StateId<'a>) {
        let _ = (tree, id);
    }

    fn visit_pass(&mut self, tree: &mut Tree<'a>, id: PassId<'a>) {
        walk_pass(self, tree, id);
    }

    fn visit_technique(&mut self, tree: &mut Tree<'a>, id: StmtId<'a>) {
        walk_technique(self, tree, id);
    }

    fn visit_pipeline(&mut self, tree: &mut Tree<'a>, id: StmtId<'a>) {
        let _ = (tree, id);
    }

    fn visit_stage(&mut self, tree: &mut Tree<'a>, id: StmtId<'a>) {
        walk_stage(self, tree, id);
    }

    /// Visits only the function statements at the top level.
    fn visit_functions(&mut self, tree: &mut Tree<'a>) {
        let mut statement = tree.first_statement();
        while let Some(id) = statement {
            if matches!(tree.statement(id).kind, StatementKind::Function(_)) {
                self.visit_function(tree, id);
            }
            statement = tree.statement(id).next;
        }
    }

    /// Visits only the global declarations at the top level.
    fn visit_parameters(&mut self, tree: &mut Tree<'a>) {
        let mut statement = tree.first_statement();
        while let Some(id) = statement {
            if matches!(tree.statement(id).kind, StatementKind::Declaration(_)) {
                self.visit_declaration(tree, id);
            }
            statement = tree.statement(id).next;
        }
    }
}

pub fn walk_root<'a, V: Visitor<'a>>(visitor: &mut V, tree: &mut Tree<'a>) {
    let mut statement = tree.first_statement();
    while let Some(id) = statement {
        visitor.visit_top_level_statement(tree, id);
        statement = tree.statement(id).next;
    }
}

pub fn walk_top_level_statement<'a, V: Visitor<'a>>(
    visitor: &mut V,
    tree: &mut Tree<'a>,
    id: StmtId<'a>,
) {
    match tree.statement(id).kind {
        StatementKind::Declaration(_) => visitor.visit_declaration(tree, id),
        StatementKind::Struct(_) => visitor.visit_struct(tree, id),
        StatementKind::Buffer(_) => visitor.visit_buffer(tree, id),
        StatementKind::Function(_) => visitor.visit_function(tree, id),
        StatementKind::Technique(_) => visitor.visit_technique(tree, id),
        StatementKind::Pipeline(_) => visitor.visit_pipeline(tree, id),
        StatementKind::Stage(_) => visitor.visit_stage(tree, id),
        _ => visitor.visit_statement(tree, id),
    }
}

pub fn walk_statements<'a, V: Visitor<'a>>(
    visitor: &mut V,
    tree: &mut Tree<'a>,
    first: Option<StmtId<'a>>,
) {
    let mut statement = first;
    while let Some(id) = statement {
        visitor.visit_statement(tree, id);
        statement = tree.statement(id).next;
    }
}

pub fn walk_statement<'a, V: Visitor<'a>>(visitor: &mut V, tree: &mut Tree<'a>, id: StmtId<'a>) {
    match tree.statement(id).kind {
        StatementKind::Declaration(_) => visitor.visit_declaration(tree, id),
        StatementKind::Struct(_) => visitor.visit_struct(tree, id),
        StatementKind::Buffer(_) => visitor.visit_buffer(tree, id),
        StatementKind::Function(_) => visitor.visit_function(tree, id),
        StatementKind::Expression(_) => visitor.visit_expression_statement(tree, id),
        StatementKind::Return { .. } => visitor.visit_return_statement(tree, id),
        StatementKind::Discard => visitor.visit_discard_statement(tree, id),
        StatementKind::Break => visitor.visit_break_statement(tree, id),
        StatementKind::Continue => visitor.visit_continue_statement(tree, id),
        StatementKind::If(_) => visitor.visit_if_statement(tree, id),
        StatementKind::For(_) => visitor.visit_for_statement(tree, id),
        StatementKind::Block { .. } => visitor.visit_block_statement(tree, id),
        StatementKind::Technique(_) => visitor.visit_technique(tree, id),
        StatementKind::Pipeline(_) => visitor.visit_pipeline(tree, id),
        StatementKind::Stage(_) => visitor.visit_stage(tree, id),
    }
}

pub fn walk_declaration<'a, V: Visitor<'a>>(visitor: &mut V, tree: &mut Tree<'a>, id: StmtId<'a>) {
    let declaration = *tree.declaration(id);
    visitor.visit_type(tree, declaration.ty);
    if let Some(assignment) = declaration.assignment {
        visitor.visit_expression(tree, assignment);
    }
    if let Some(next) = declaration.next_declaration {
        visitor.visit_declaration(tree, next);
    }
}

pub fn walk_struct<'a, V: Visitor<'a>>(visitor: &mut V, tree: &mut Tree<'a>, id: StmtId<'a>) {
    let mut field = match tree.statement(id).kind {
        StatementKind::Struct(def) => def.field,
        _ => None,
    };
    while let Some(field_id) = field {
        visitor.visit_struct_field(tree, field_id);
        field = tree.field(field_id).next_field;
    }
}

pub fn walk_struct_field<'a, V: Visitor<'a>>(visitor: &mut V, tree: &mut Tree<'a>, id: FieldId<'a>) {
    let ty = tree.field(id).ty;
    visitor.visit_type(tree, ty);
}

pub fn walk_buffer<'a, V: Visitor<'a>>(visitor: &mut V, tree: &mut Tree<'a>, id: StmtId<'a>) {
    let mut field = match tree.statement(id).kind {
        StatementKind::Buffer(buffer) => buffer.field,
        _ => None,
    };
    while let Some(field_id) = field {
        visitor.visit_declaration(tree, field_id);
        field = tree.statement(field_id).next;
    }
}

pub fn walk_function<'a, V: Visitor<'a>>(visitor: &mut V, tree: &mut Tree<'a>, id: StmtId<'a>) {
    let function = *tree.function(id);
    visitor.visit_type(tree, function.return_type);

    let mut argument = function.argument;
    while let Some(arg_id) = argument {
        visitor.visit_argument(tree, arg_id);
        argument = tree.argument(arg_id).next_argument;
    }

    visitor.visit_statements(tree, function.statement);
}

pub fn walk_argument<'a, V: Visitor<'a>>(visitor: &mut V, tree: &mut Tree<'a>, id: ArgId<'a>) {
    let argument = *tree.argument(id);
    visitor.visit_type(tree, argument.ty);
    if let Some(default_value) = argument.default_value {
        visitor.visit_expression(tree, default_value);
    }
}

pub fn walk_expression_statement<'a, V: Visitor<'a>>(
    visitor: &mut V,
    tree: &mut Tree<'a>,
    id: StmtId<'a>,
) {
    if let StatementKind::Expression(expression) = tree.statement(id).kind {
        visitor.visit_expression(tree, expression);
    }
}

pub fn walk_return_statement<'a, V: Visitor<'a>>(
    visitor: &mut V,
    tree: &mut Tree<'a>,
    id: StmtId<'a>,
) {
    if let StatementKind::Return {
        expression: Some(expression),
    } = tree.statement(id).kind
    {
        visitor.visit_expression(tree, expression);
    }
}

pub fn walk_if_statement<'a, V: Visitor<'a>>(visitor: &mut V, tree: &mut Tree<'a>, id: StmtId<'a>) {
    if let StatementKind::If(if_statement) = tree.statement(id).kind {
        visitor.visit_expression(tree, if_statement.condition);
        visitor.visit_statements(tree, if_statement.statement);
        if if_statement.else_statement.is_some() {
            visitor.visit_statements(tree, if_statement.else_statement);
        }
    }
}

pub fn walk_for_statement<'a, V: Visitor<'a>>(visitor: &mut V, tree: &mut Tree<'a>, id: StmtId<'a>) {
    if let StatementKind::For(for_statement) = tree.statement(id).kind {
        if let Some(initialization) = for_statement.initialization {
            visitor.visit_declaration(tree, initialization);
        }
        if let Some(condition) = for_statement.condition {
            visitor.visit_expression(tree, condition);
        }
        if let Some(increment) = for_statement.increment {
            visitor.visit_expression(tree, increment);
        }
        visitor.visit_statements(tree, for_statement.statement);
    }
}

pub fn walk_block_statement<'a, V: Visitor<'a>>(
    visitor: &mut V,
    tree: &mut Tree<'a>,
    id: StmtId<'a>,
) {
    if let StatementKind::Block { statement } = tree.statement(id).kind {
        visitor.visit_statements(tree, statement);
    }
}

pub fn walk_expression<'a, V: Visitor<'a>>(visitor: &mut V, tree: &mut Tree<'a>, id: ExprId<'a>) {
    let ty = tree.expression(id).ty;
    visitor.visit_type(tree, ty);

    match tree.expression(id).kind {
        ExpressionKind::Unary { .. } => visitor.visit_unary_expression(tree, id),
        ExpressionKind::Binary { .. } => visitor.visit_binary_expression(tree, id),
        ExpressionKind::Conditional { .. } => visitor.visit_conditional_expression(tree, id),
        ExpressionKind::Cast { .. } => visitor.visit_casting_expression(tree, id),
        ExpressionKind::Literal(_) => visitor.visit_literal_expression(tree, id),
        ExpressionKind::Identifier { .. } => visitor.visit_identifier_expression(tree, id),
        ExpressionKind::Constructor { .. } => visitor.visit_constructor_expression(tree, id),
        ExpressionKind::MemberAccess { .. } => visitor.visit_member_access(tree, id),
        ExpressionKind::ArrayAccess { .. } => visitor.visit_array_access(tree, id),
        ExpressionKind::Call(_) => visitor.visit_function_call(tree, id),
        ExpressionKind::SamplerState { .. } => visitor.visit_sampler_state(tree, id),
    }
}

pub fn walk_unary_expression<'a, V: Visitor<'a>>(
    visitor: &mut V,
    tree: &mut Tree<'a>,
    id: ExprId<'a>,
) {
    if let ExpressionKind::Unary { operand, .. } = tree.expression(id).kind {
        visitor.visit_expression(tree, operand);
    }
}

pub fn walk_binary_expression<'a, V: Visitor<'a>>(
    visitor: &mut V,
    tree: &mut Tree<'a>,
    id: ExprId<'a>,
) {
    if let ExpressionKind::Binary { left, right, .. } = tree.expression(id).kind {
        visitor.visit_expression(tree, left);
        visitor.visit_expression(tree, right);
    }
}

pub fn walk_conditional_expression<'a, V: Visitor<'a>>(
    visitor: &mut V,
    tree: &mut Tree<'a>,
    id: ExprId<'a>,
) {
    if let ExpressionKind::Conditional {
        condition,
        if_true,
        if_false,
    } = tree.expression(id).kind
    {
        visitor.visit_expression(tree, condition);
        visitor.visit_expression(tree, if_false);
        visitor.visit_expression(tree, if_true);
    }
}

pub fn walk_casting_expression<'a, V: Visitor<'a>>(
    visitor: &mut V,
    tree: &mut Tree<'a>,
    id: ExprId<'a>,
) {
    let ty = tree.expression(id).ty;
    visitor.visit_type(tree, ty);
    if let ExpressionKind::Cast { operand } = tree.expression(id).kind {
        visitor.visit_expression(tree, operand);
    }
}

pub fn walk_constructor_expression<'a, V: Visitor<'a>>(
    visitor: &mut V,
    tree: &mut Tree<'a>,
    id: ExprId<'a>,
) {
    if let ExpressionKind::Constructor { argument } = tree.expression(id).kind {
        let mut argument = argument;
        while let Some(arg_id) = argument {
            visitor.visit_expression(tree, arg_id);
            argument = tree.expression(arg_id).next;
        }
    }
}

pub fn walk_member_access<'a, V: Visitor<'a>>(visitor: &mut V, tree: &mut Tree<'a>, id: ExprId<'a>) {
    if let ExpressionKind::MemberAccess { object, .. } = tree.expression(id).kind {
        visitor.visit_expression(tree, object);
    }
}

pub fn walk_array_access<'a, V: Visitor<'a>>(visitor: &mut V, tree: &mut Tree<'a>, id: ExprId<'a>) {
    if let ExpressionKind::ArrayAccess { array, index } = tree.expression(id).kind {
        visitor.visit_expression(tree, array);
        visitor.visit_expression(tree, index);
    }
}

pub fn walk_function_call<'a, V: Visitor<'a>>(visitor: &mut V, tree: &mut Tree<'a>, id: ExprId<'a>) {
    if let ExpressionKind::Call(call) = tree.expression(id).kind {
        let mut argument = call.argument;
        while let Some(arg_id) = argument {
            visitor.visit_expression(tree, arg_id);
            argument = tree.expression(arg_id).next;
        }
    }
}

pub fn walk_sampler_state<'a, V: Visitor<'a>>(visitor: &mut V, tree: &mut Tree<'a>, id: ExprId<'a>) {
    if let ExpressionKind::SamplerState {
        state_assignments, ..
    } = tree.expression(id).kind
    {
        let mut state = state_assignments;
        while let Some(state_id) = state {
            visitor.visit_state_assignment(tree, state_id);
            state = tree.state_assignment(state_id).next_state_assignment;
        }
    }
}

pub fn walk_pass<'a, V: Visitor<'a>>(visitor: &mut V, tree: &mut Tree<'a>, id: PassId<'a>) {
    let mut state = tree.technique_pass(id).state_assignments;
    while let Some(state_id) = state {
        visitor.visit_state_assignment(tree, state_id);
        state = tree.state_assignment(state_id).next_state_assignment;
    }
}

pub fn walk_technique<'a, V: Visitor<'a>>(visitor: &mut V, tree: &mut Tree<'a>, id: StmtId<'a>) {
    let mut pass = match tree.statement(id).kind {
        StatementKind::Technique(technique) => technique.passes,
        _ => None,
    };
    while let Some(pass_id) = pass {
        visitor.visit_pass(tree, pass_id);
        pass = tree.technique_pass(pass_id).next_pass;
    }
}

pub fn walk_stage<'a, V: Visitor<'a>>(visitor: &mut V, tree: &mut Tree<'a>, id: StmtId<'a>) {
    if let StatementKind::Stage(stage) = tree.statement(id).kind {
        visitor.visit_statements(tree, stage.inputs);
        visitor.visit_statements(tree, stage.outputs);
        visitor.visit_statements(tree, stage.statement);
    }
}
