use serde::Serialize;

use crate::arena::{Arena, Id};
use crate::intrinsics::INTRINSICS;
use crate::strings::{InternedStr, StringPool};
use crate::types::{BaseType, Type, TypeFlags};

pub type StmtId<'a> = Id<Statement<'a>>;
pub type ExprId<'a> = Id<Expression<'a>>;
pub type ArgId<'a> = Id<Argument<'a>>;
pub type FieldId<'a> = Id<StructField<'a>>;
pub type AttrId<'a> = Id<Attribute<'a>>;
pub type PassId<'a> = Id<TechniquePass<'a>>;
pub type StateId<'a> = Id<StateAssignment<'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Equal,
    NotEqual,
    BitAnd,
    BitOr,
    BitXor,
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
}

impl BinaryOp {
    pub fn is_compare(self) -> bool {
        matches!(
            self,
            BinaryOp::Less
                | BinaryOp::Greater
                | BinaryOp::LessEqual
                | BinaryOp::GreaterEqual
                | BinaryOp::Equal
                | BinaryOp::NotEqual
        )
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div
        )
    }

    pub fn is_logic(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn is_bitwise(self) -> bool {
        matches!(self, BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor)
    }

    pub fn is_assign(self) -> bool {
        matches!(
            self,
            BinaryOp::Assign
                | BinaryOp::AddAssign
                | BinaryOp::SubAssign
                | BinaryOp::MulAssign
                | BinaryOp::DivAssign
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Negative,
    Positive,
    Not,
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArgumentModifier {
    None,
    In,
    Out,
    Inout,
    Uniform,
    Const,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttributeKind {
    Unknown,
    Unroll,
    Branch,
    Flatten,
    NoFastMath,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    Bool(bool),
    Float(f32),
    Half(f32),
    Int(i32),
}

/// Value of a state assignment inside a pass, pipeline or sampler_state
/// block. Named enum values are resolved to their numeric code at parse
/// time; texture bindings keep the referenced name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StateValue<'a> {
    Int(i32),
    Float(f32),
    Texture(InternedStr<'a>),
}

/// A top-level or function-body statement. Statements chain through `next`
/// and carry the hidden marker the prune pass toggles.
#[derive(Debug, Clone, Copy)]
pub struct Statement<'a> {
    pub file: InternedStr<'a>,
    pub line: u32,
    pub attributes: Option<AttrId<'a>>,
    pub next: Option<StmtId<'a>>,
    pub hidden: bool,
    pub kind: StatementKind<'a>,
}

#[derive(Debug, Clone, Copy)]
pub enum StatementKind<'a> {
    Declaration(Declaration<'a>),
    Struct(StructDef<'a>),
    Buffer(Buffer<'a>),
    Function(Function<'a>),
    Expression(ExprId<'a>),
    Return { expression: Option<ExprId<'a>> },
    Discard,
    Break,
    Continue,
    If(IfStatement<'a>),
    For(ForStatement<'a>),
    Block { statement: Option<StmtId<'a>> },
    Technique(Technique<'a>),
    Pipeline(Pipeline<'a>),
    Stage(Stage<'a>),
}

#[derive(Debug, Clone, Copy)]
pub struct Declaration<'a> {
    pub name: InternedStr<'a>,
    pub ty: Type<'a>,
    pub register_name: Option<InternedStr<'a>>,
    pub space_name: Option<InternedStr<'a>>,
    pub semantic: Option<InternedStr<'a>>,
    /// Further variables declared on the same line.
    pub next_declaration: Option<StmtId<'a>>,
    pub assignment: Option<ExprId<'a>>,
    /// The cbuffer/tbuffer this declaration is a field of, if any.
    pub buffer: Option<StmtId<'a>>,
}

#[derive(Debug, Clone, Copy)]
pub struct StructDef<'a> {
    pub name: InternedStr<'a>,
    pub field: Option<FieldId<'a>>,
}

#[derive(Debug, Clone, Copy)]
pub struct StructField<'a> {
    pub file: InternedStr<'a>,
    pub line: u32,
    pub name: InternedStr<'a>,
    pub ty: Type<'a>,
    pub semantic: Option<InternedStr<'a>>,
    pub next_field: Option<FieldId<'a>>,
    pub hidden: bool,
}

/// A cbuffer or tbuffer declaration. Fields are Declaration statements
/// chained through their statement links.
#[derive(Debug, Clone, Copy)]
pub struct Buffer<'a> {
    pub name: InternedStr<'a>,
    pub register_name: Option<InternedStr<'a>>,
    pub space_name: Option<InternedStr<'a>>,
    pub field: Option<StmtId<'a>>,
}

#[derive(Debug, Clone, Copy)]
pub struct Function<'a> {
    pub name: InternedStr<'a>,
    pub return_type: Type<'a>,
    pub semantic: Option<InternedStr<'a>>,
    pub num_arguments: u32,
    /// Out and inout arguments, the ones the flatten pass cares about.
    pub num_output_arguments: u32,
    pub argument: Option<ArgId<'a>>,
    pub statement: Option<StmtId<'a>>,
    /// The earlier forward declaration this definition completes.
    pub forward: Option<StmtId<'a>>,
}

#[derive(Debug, Clone, Copy)]
pub struct Argument<'a> {
    pub file: InternedStr<'a>,
    pub line: u32,
    pub name: InternedStr<'a>,
    pub modifier: ArgumentModifier,
    pub ty: Type<'a>,
    pub semantic: Option<InternedStr<'a>>,
    pub default_value: Option<ExprId<'a>>,
    pub next_argument: Option<ArgId<'a>>,
    pub hidden: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct IfStatement<'a> {
    pub condition: ExprId<'a>,
    pub statement: Option<StmtId<'a>>,
    pub else_statement: Option<StmtId<'a>>,
    pub is_static: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ForStatement<'a> {
    pub initialization: Option<StmtId<'a>>,
    pub condition: Option<ExprId<'a>>,
    pub increment: Option<ExprId<'a>>,
    pub statement: Option<StmtId<'a>>,
}

#[derive(Debug, Clone, Copy)]
pub struct Technique<'a> {
    pub name: InternedStr<'a>,
    pub num_passes: u32,
    pub passes: Option<PassId<'a>>,
}

#[derive(Debug, Clone, Copy)]
pub struct TechniquePass<'a> {
    pub file: InternedStr<'a>,
    pub line: u32,
    pub name: InternedStr<'a>,
    pub num_state_assignments: u32,
    pub state_assignments: Option<StateId<'a>>,
    pub next_pass: Option<PassId<'a>>,
}

#[derive(Debug, Clone, Copy)]
pub struct Pipeline<'a> {
    pub name: InternedStr<'a>,
    pub num_state_assignments: u32,
    pub state_assignments: Option<StateId<'a>>,
}

#[derive(Debug, Clone, Copy)]
pub struct Stage<'a> {
    pub name: InternedStr<'a>,
    pub statement: Option<StmtId<'a>>,
    pub inputs: Option<StmtId<'a>>,
    pub outputs: Option<StmtId<'a>>,
}

#[derive(Debug, Clone, Copy)]
pub struct StateAssignment<'a> {
    pub file: InternedStr<'a>,
    pub line: u32,
    pub state_name: InternedStr<'a>,
    pub d3d_render_state: i32,
    pub value: StateValue<'a>,
    pub next_state_assignment: Option<StateId<'a>>,
}

#[derive(Debug, Clone, Copy)]
pub struct Attribute<'a> {
    pub file: InternedStr<'a>,
    pub line: u32,
    pub kind: AttributeKind,
    pub argument: Option<ExprId<'a>>,
    pub next_attribute: Option<AttrId<'a>>,
}

/// An expression node. Every expression carries its resolved type; `next`
/// chains expressions that form a list, like call arguments.
#[derive(Debug, Clone, Copy)]
pub struct Expression<'a> {
    pub file: InternedStr<'a>,
    pub line: u32,
    pub ty: Type<'a>,
    pub next: Option<ExprId<'a>>,
    pub kind: ExpressionKind<'a>,
}

#[derive(Debug, Clone, Copy)]
pub enum ExpressionKind<'a> {
    Unary {
        op: UnaryOp,
        operand: ExprId<'a>,
    },
    Binary {
        op: BinaryOp,
        left: ExprId<'a>,
        right: ExprId<'a>,
    },
    Conditional {
        condition: ExprId<'a>,
        if_true: ExprId<'a>,
        if_false: ExprId<'a>,
    },
    /// The target type is the expression's own type.
    Cast {
        operand: ExprId<'a>,
    },
    Literal(Literal),
    Identifier {
        name: InternedStr<'a>,
        global: bool,
    },
    /// `float2(1, 2)`; the constructed type is the expression's own type.
    Constructor {
        argument: Option<ExprId<'a>>,
    },
    MemberAccess {
        object: ExprId<'a>,
        field: InternedStr<'a>,
        swizzle: bool,
    },
    ArrayAccess {
        array: ExprId<'a>,
        index: ExprId<'a>,
    },
    Call(FunctionCall<'a>),
    SamplerState {
        num_state_assignments: u32,
        state_assignments: Option<StateId<'a>>,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct FunctionCall<'a> {
    pub function: Callee<'a>,
    pub argument: Option<ExprId<'a>>,
    pub num_arguments: u32,
}

/// Resolved target of a call: a user function statement or an entry in the
/// static intrinsic table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callee<'a> {
    User(StmtId<'a>),
    Intrinsic(usize),
}

/// Abstract syntax tree for a parsed compilation unit. The tree owns every
/// node through its typed arenas; all links between nodes are ids, stable
/// until the tree is dropped.
pub struct Tree<'a> {
    strings: &'a StringPool<'a>,
    statements: Arena<Statement<'a>>,
    expressions: Arena<Expression<'a>>,
    arguments: Arena<Argument<'a>>,
    fields: Arena<StructField<'a>>,
    attributes: Arena<Attribute<'a>>,
    passes: Arena<TechniquePass<'a>>,
    states: Arena<StateAssignment<'a>>,
    first_statement: Option<StmtId<'a>>,
}

impl<'a> std::fmt::Debug for Tree<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tree")
            .field("statements", &self.statements)
            .field("expressions", &self.expressions)
            .field("arguments", &self.arguments)
            .field("fields", &self.fields)
            .field("attributes", &self.attributes)
            .field("passes", &self.passes)
            .field("states", &self.states)
            .field("first_statement", &self.first_statement)
            .finish()
    }
}

impl<'a> Tree<'a> {
    pub fn new(strings: &'a StringPool<'a>) -> Self {
        Tree {
            strings,
            statements: Arena::new(),
            expressions: Arena::new(),
            arguments: Arena::new(),
            fields: Arena::new(),
            attributes: Arena::new(),
            passes: Arena::new(),
            states: Arena::new(),
            first_statement: None,
        }
    }

    pub fn add_string(&self, s: &str) -> InternedStr<'a> {
        self.strings.add(s)
    }

    pub fn add_string_format(&self, args: std::fmt::Arguments<'_>) -> InternedStr<'a> {
        self.strings.add_format(args)
    }

    pub fn contains_string(&self, s: &str) -> bool {
        self.strings.contains(s)
    }

    pub fn first_statement(&self) -> Option<StmtId<'a>> {
        self.first_statement
    }

    pub fn set_first_statement(&mut self, statement: Option<StmtId<'a>>) {
        self.first_statement = statement;
    }

    /// Iterates the top-level statement chain.
    pub fn statements(&self) -> impl Iterator<Item = StmtId<'a>> + '_ {
        let mut current = self.first_statement;
        std::iter::from_fn(move || {
            let id = current?;
            current = self.statement(id).next;
            Some(id)
        })
    }

    pub fn add_statement(
        &mut self,
        file: InternedStr<'a>,
        line: u32,
        kind: StatementKind<'a>,
    ) -> StmtId<'a> {
        self.statements.alloc(Statement {
            file,
            line,
            attributes: None,
            next: None,
            hidden: false,
            kind,
        })
    }

    pub fn add_expression(
        &mut self,
        file: InternedStr<'a>,
        line: u32,
        ty: Type<'a>,
        kind: ExpressionKind<'a>,
    ) -> ExprId<'a> {
        self.expressions.alloc(Expression {
            file,
            line,
            ty,
            next: None,
            kind,
        })
    }

    pub fn add_argument(&mut self, argument: Argument<'a>) -> ArgId<'a> {
        self.arguments.alloc(argument)
    }

    pub fn add_field(&mut self, field: StructField<'a>) -> FieldId<'a> {
        self.fields.alloc(field)
    }

    pub fn add_attribute(&mut self, attribute: Attribute<'a>) -> AttrId<'a> {
        self.attributes.alloc(attribute)
    }

    pub fn add_pass(&mut self, pass: TechniquePass<'a>) -> PassId<'a> {
        self.passes.alloc(pass)
    }

    pub fn add_state_assignment(&mut self, state: StateAssignment<'a>) -> StateId<'a> {
        self.states.alloc(state)
    }

    pub fn statement(&self, id: StmtId<'a>) -> &Statement<'a> {
        &self.statements[id]
    }

    pub fn statement_mut(&mut self, id: StmtId<'a>) -> &mut Statement<'a> {
        &mut self.statements[id]
    }

    pub fn expression(&self, id: ExprId<'a>) -> &Expression<'a> {
        &self.expressions[id]
    }

    pub fn expression_mut(&mut self, id: ExprId<'a>) -> &mut Expression<'a> {
        &mut self.expressions[id]
    }

    pub fn argument(&self, id: ArgId<'a>) -> &Argument<'a> {
        &self.arguments[id]
    }

    pub fn argument_mut(&mut self, id: ArgId<'a>) -> &mut Argument<'a> {
        &mut self.arguments[id]
    }

    pub fn field(&self, id: FieldId<'a>) -> &StructField<'a> {
        &self.fields[id]
    }

    pub fn field_mut(&mut self, id: FieldId<'a>) -> &mut StructField<'a> {
        &mut self.fields[id]
    }

    pub fn attribute(&self, id: AttrId<'a>) -> &Attribute<'a> {
        &self.attributes[id]
    }

    pub fn attribute_mut(&mut self, id: AttrId<'a>) -> &mut Attribute<'a> {
        &mut self.attributes[id]
    }

    pub fn technique_pass(&self, id: PassId<'a>) -> &TechniquePass<'a> {
        &self.passes[id]
    }

    pub fn technique_pass_mut(&mut self, id: PassId<'a>) -> &mut TechniquePass<'a> {
        &mut self.passes[id]
    }

    pub fn state_assignment(&self, id: StateId<'a>) -> &StateAssignment<'a> {
        &self.states[id]
    }

    pub fn state_assignment_mut(&mut self, id: StateId<'a>) -> &mut StateAssignment<'a> {
        &mut self.states[id]
    }

    /// The function statement behind `id`. Callers hold ids they took from
    /// `StatementKind::Function` statements, so the match cannot fail on a
    /// well-formed tree.
    pub fn function(&self, id: StmtId<'a>) -> &Function<'a> {
        match &self.statement(id).kind {
            StatementKind::Function(function) => function,
            _ => unreachable!("statement is not a function"),
        }
    }

    pub fn function_mut(&mut self, id: StmtId<'a>) -> &mut Function<'a> {
        match &mut self.statement_mut(id).kind {
            StatementKind::Function(function) => function,
            _ => unreachable!("statement is not a function"),
        }
    }

    pub fn declaration(&self, id: StmtId<'a>) -> &Declaration<'a> {
        match &self.statement(id).kind {
            StatementKind::Declaration(declaration) => declaration,
            _ => unreachable!("statement is not a declaration"),
        }
    }

    pub fn declaration_mut(&mut self, id: StmtId<'a>) -> &mut Declaration<'a> {
        match &mut self.statement_mut(id).kind {
            StatementKind::Declaration(declaration) => declaration,
            _ => unreachable!("statement is not a declaration"),
        }
    }

    // Queries over the top-level statement chain. These do no signature
    // matching; the first statement with the requested name wins.

    pub fn find_function(&self, name: &str) -> Option<StmtId<'a>> {
        self.statements().find(|id| match &self.statement(*id).kind {
            StatementKind::Function(function) => function.name == *name,
            _ => false,
        })
    }

    /// Finds a global declaration by name, looking through top-level
    /// declarations and buffer fields. Returns the declaration and, when it
    /// is a buffer field, the containing buffer.
    pub fn find_global_declaration(
        &self,
        name: &str,
    ) -> Option<(StmtId<'a>, Option<StmtId<'a>>)> {
        for id in self.statements() {
            match &self.statement(id).kind {
                StatementKind::Declaration(declaration) => {
                    if declaration.name == *name {
                        return Some((id, None));
                    }
                }
                StatementKind::Buffer(buffer) => {
                    let mut field = buffer.field;
                    while let Some(field_id) = field {
                        let statement = self.statement(field_id);
                        let declaration = self.declaration(field_id);
                        if declaration.name == *name {
                            return Some((field_id, Some(id)));
                        }
                        field = statement.next;
                    }
                }
                _ => {}
            }
        }
        None
    }

    pub fn find_global_struct(&self, name: &str) -> Option<StmtId<'a>> {
        self.statements().find(|id| match &self.statement(*id).kind {
            StatementKind::Struct(def) => def.name == *name,
            _ => false,
        })
    }

    pub fn find_technique(&self, name: &str) -> Option<StmtId<'a>> {
        self.statements().find(|id| match &self.statement(*id).kind {
            StatementKind::Technique(technique) => technique.name == *name,
            _ => false,
        })
    }

    pub fn find_buffer(&self, name: &str) -> Option<StmtId<'a>> {
        self.statements().find(|id| match &self.statement(*id).kind {
            StatementKind::Buffer(buffer) => buffer.name == *name,
            _ => false,
        })
    }

    pub fn find_pipeline(&self, name: &str) -> Option<StmtId<'a>> {
        self.statements().find(|id| match &self.statement(*id).kind {
            StatementKind::Pipeline(pipeline) => pipeline.name == *name,
            _ => false,
        })
    }

    pub fn find_first_pipeline(&self) -> Option<StmtId<'a>> {
        self.find_next_pipeline(None)
    }

    pub fn find_next_pipeline(&self, current: Option<StmtId<'a>>) -> Option<StmtId<'a>> {
        let mut statement = match current {
            Some(id) => self.statement(id).next,
            None => self.first_statement,
        };
        while let Some(id) = statement {
            if matches!(self.statement(id).kind, StatementKind::Pipeline(_)) {
                return Some(id);
            }
            statement = self.statement(id).next;
        }
        None
    }

    pub fn callee_name(&self, callee: Callee<'a>) -> &str {
        match callee {
            Callee::User(id) => self.function(id).name.as_str(),
            Callee::Intrinsic(index) => INTRINSICS[index].name,
        }
    }

    pub fn callee_num_arguments(&self, callee: Callee<'a>) -> u32 {
        match callee {
            Callee::User(id) => self.function(id).num_arguments,
            Callee::Intrinsic(index) => INTRINSICS[index].num_args as u32,
        }
    }

    pub fn callee_num_output_arguments(&self, callee: Callee<'a>) -> u32 {
        match callee {
            Callee::User(id) => self.function(id).num_output_arguments,
            Callee::Intrinsic(_) => 0,
        }
    }

    pub fn callee_return_type(&self, callee: Callee<'a>) -> Type<'a> {
        match callee {
            Callee::User(id) => self.function(id).return_type,
            Callee::Intrinsic(index) => Type::new(INTRINSICS[index].return_type),
        }
    }

    /// Constant-folds an integer or bool scalar expression. The expression
    /// must be const; identifiers dereference through const global
    /// declarations with initializers.
    pub fn expression_value_int(&self, id: ExprId<'a>) -> Option<i32> {
        let expression = self.expression(id);

        if !expression.ty.flags.contains(TypeFlags::CONST) {
            return None;
        }
        if expression.ty.base != BaseType::Int && expression.ty.base != BaseType::Bool {
            return None;
        }
        if expression.ty.array {
            return None;
        }

        match expression.kind {
            ExpressionKind::Binary { op, left, right } => {
                let value1 = self.expression_value_int(left)?;
                let value2 = self.expression_value_int(right)?;
                match op {
                    BinaryOp::And => Some((value1 != 0 && value2 != 0) as i32),
                    BinaryOp::Or => Some((value1 != 0 || value2 != 0) as i32),
                    BinaryOp::Add => Some(value1.wrapping_add(value2)),
                    BinaryOp::Sub => Some(value1.wrapping_sub(value2)),
                    BinaryOp::Mul => Some(value1.wrapping_mul(value2)),
                    BinaryOp::Div => value1.checked_div(value2),
                    BinaryOp::Less => Some((value1 < value2) as i32),
                    BinaryOp::Greater => Some((value1 > value2) as i32),
                    BinaryOp::LessEqual => Some((value1 <= value2) as i32),
                    BinaryOp::GreaterEqual => Some((value1 >= value2) as i32),
                    BinaryOp::Equal => Some((value1 == value2) as i32),
                    BinaryOp::NotEqual => Some((value1 != value2) as i32),
                    BinaryOp::BitAnd => Some(value1 & value2),
                    BinaryOp::BitOr => Some(value1 | value2),
                    BinaryOp::BitXor => Some(value1 ^ value2),
                    _ => None,
                }
            }
            ExpressionKind::Unary { op, operand } => {
                let value = self.expression_value_int(operand)?;
                match op {
                    UnaryOp::Negative => Some(value.wrapping_neg()),
                    UnaryOp::Positive => Some(value),
                    UnaryOp::Not => Some((value == 0) as i32),
                    UnaryOp::BitNot => Some(!value),
                    _ => None,
                }
            }
            ExpressionKind::Identifier { name, .. } => {
                let (declaration_id, _) = self.find_global_declaration(name.as_str())?;
                let declaration = self.declaration(declaration_id);
                if !declaration.ty.flags.contains(TypeFlags::CONST) {
                    return None;
                }
                self.expression_value_int(declaration.assignment?)
            }
            ExpressionKind::Literal(Literal::Int(value)) => Some(value),
            ExpressionKind::Literal(Literal::Bool(value)) => Some(value as i32),
            _ => None,
        }
    }

    /// Constant-folds a float expression of up to four components into
    /// `values`. Returns the dimension, 0 when the expression is not a
    /// foldable constant. Integer scalars convert with a broadcast.
    pub fn expression_value_float4(&self, id: ExprId<'a>, values: &mut [f32; 4]) -> usize {
        let expression = self.expression(id);

        if !expression.ty.flags.contains(TypeFlags::CONST) {
            return 0;
        }
        if expression.ty.base == BaseType::Int || expression.ty.base == BaseType::Bool {
            if let Some(int_value) = self.expression_value_int(id) {
                for slot in values.iter_mut() {
                    *slot = int_value as f32;
                }
                return 1;
            }
            return 0;
        }
        if expression.ty.base.is_integer() || !expression.ty.base.is_numeric() {
            return 0;
        }
        if expression.ty.array {
            return 0;
        }

        match expression.kind {
            ExpressionKind::Binary { op, left, right } => {
                let dim = vector_dimension(expression.ty.base);

                let mut values1 = [0.0f32; 4];
                let mut values2 = [0.0f32; 4];
                let mut dim1 = self.expression_value_float4(left, &mut values1);
                let mut dim2 = self.expression_value_float4(right, &mut values2);
                if dim1 == 0 || dim2 == 0 {
                    return 0;
                }

                if dim1 != dim2 {
                    // Broadcast the scalar side to the vector size.
                    if dim1 == 1 {
                        for i in 1..dim2 {
                            values1[i] = values1[0];
                        }
                        dim1 = dim2;
                    } else if dim2 == 1 {
                        for i in 1..dim1 {
                            values2[i] = values2[0];
                        }
                        dim2 = dim1;
                    } else {
                        return 0;
                    }
                }
                let _ = dim2;
                if dim != dim1 {
                    return 0;
                }

                match op {
                    BinaryOp::Add => {
                        for i in 0..dim {
                            values[i] = values1[i] + values2[i];
                        }
                        dim
                    }
                    BinaryOp::Sub => {
                        for i in 0..dim {
                            values[i] = values1[i] - values2[i];
                        }
                        dim
                    }
                    BinaryOp::Mul => {
                        for i in 0..dim {
                            values[i] = values1[i] * values2[i];
                        }
                        dim
                    }
                    BinaryOp::Div => {
                        for i in 0..dim {
                            values[i] = values1[i] / values2[i];
                        }
                        dim
                    }
                    _ => 0,
                }
            }
            ExpressionKind::Unary { op, operand } => {
                let dim = vector_dimension(expression.ty.base);
                let dim1 = self.expression_value_float4(operand, values);
                if dim1 == 0 || dim != dim1 {
                    return 0;
                }
                match op {
                    UnaryOp::Negative => {
                        for value in values.iter_mut().take(dim) {
                            *value = -*value;
                        }
                        dim
                    }
                    UnaryOp::Positive => dim,
                    _ => 0,
                }
            }
            ExpressionKind::Constructor { argument } => {
                let dim = vector_dimension(expression.ty.base);

                let mut index = 0;
                let mut argument = argument;
                while let Some(arg_id) = argument {
                    let mut tmp = [0.0f32; 4];
                    let count = self.expression_value_float4(arg_id, &mut tmp);
                    if count == 0 || index + count > 4 {
                        return 0;
                    }
                    values[index..index + count].copy_from_slice(&tmp[..count]);
                    index += count;
                    argument = self.expression(arg_id).next;
                }
                if dim != index {
                    return 0;
                }
                dim
            }
            ExpressionKind::Identifier { name, .. } => {
                let Some((declaration_id, _)) = self.find_global_declaration(name.as_str()) else {
                    return 0;
                };
                let declaration = self.declaration(declaration_id);
                if !declaration.ty.flags.contains(TypeFlags::CONST) {
                    return 0;
                }
                match declaration.assignment {
                    Some(assignment) => self.expression_value_float4(assignment, values),
                    None => 0,
                }
            }
            ExpressionKind::Literal(literal) => {
                values[0] = match literal {
                    Literal::Float(value) | Literal::Half(value) => value,
                    Literal::Bool(value) => value as i32 as f32,
                    Literal::Int(value) => value as f32,
                };
                1
            }
            _ => 0,
        }
    }

    /// True when any reachable (non-hidden) call invokes a function with
    /// this name. The string pool gives a cheap early out: a name that was
    /// never interned cannot be called.
    pub fn needs_function(&self, name: &str) -> bool {
        if !self.strings.contains(name) {
            return false;
        }
        for id in self.statements() {
            if !self.statement(id).hidden && self.statement_needs_function(id, name) {
                return true;
            }
        }
        false
    }

    fn statement_chain_needs_function(&self, first: Option<StmtId<'a>>, name: &str) -> bool {
        let mut statement = first;
        while let Some(id) = statement {
            if self.statement_needs_function(id, name) {
                return true;
            }
            statement = self.statement(id).next;
        }
        false
    }

    fn statement_needs_function(&self, id: StmtId<'a>, name: &str) -> bool {
        match self.statement(id).kind {
            StatementKind::Declaration(declaration) => {
                declaration
                    .assignment
                    .map_or(false, |assignment| {
                        self.expression_needs_function(assignment, name)
                    })
                    || declaration.next_declaration.map_or(false, |next| {
                        self.statement_needs_function(next, name)
                    })
            }
            StatementKind::Buffer(buffer) => {
                self.statement_chain_needs_function(buffer.field, name)
            }
            StatementKind::Function(function) => {
                let mut argument = function.argument;
                while let Some(arg_id) = argument {
                    let arg = self.argument(arg_id);
                    if arg
                        .default_value
                        .map_or(false, |value| self.expression_needs_function(value, name))
                    {
                        return true;
                    }
                    argument = arg.next_argument;
                }
                self.statement_chain_needs_function(function.statement, name)
            }
            StatementKind::Expression(expression) => {
                self.expression_needs_function(expression, name)
            }
            StatementKind::Return { expression } => expression
                .map_or(false, |expression| {
                    self.expression_needs_function(expression, name)
                }),
            StatementKind::If(if_statement) => {
                self.expression_needs_function(if_statement.condition, name)
                    || self.statement_chain_needs_function(if_statement.statement, name)
                    || self.statement_chain_needs_function(if_statement.else_statement, name)
            }
            StatementKind::For(for_statement) => {
                for_statement.initialization.map_or(false, |init| {
                    self.statement_needs_function(init, name)
                }) || for_statement.condition.map_or(false, |condition| {
                    self.expression_needs_function(condition, name)
                }) || for_statement.increment.map_or(false, |increment| {
                    self.expression_needs_function(increment, name)
                }) || self.statement_chain_needs_function(for_statement.statement, name)
            }
            StatementKind::Block { statement } => {
                self.statement_chain_needs_function(statement, name)
            }
            StatementKind::Stage(stage) => self.statement_chain_needs_function(stage.statement, name),
            _ => false,
        }
    }

    fn expression_needs_function(&self, id: ExprId<'a>, name: &str) -> bool {
        let expression = self.expression(id);
        let found = match expression.kind {
            ExpressionKind::Unary { operand, .. } => self.expression_needs_function(operand, name),
            ExpressionKind::Binary { left, right, .. } => {
                self.expression_needs_function(left, name)
                    || self.expression_needs_function(right, name)
            }
            ExpressionKind::Conditional {
                condition,
                if_true,
                if_false,
            } => {
                self.expression_needs_function(condition, name)
                    || self.expression_needs_function(if_true, name)
                    || self.expression_needs_function(if_false, name)
            }
            ExpressionKind::Cast { operand } => self.expression_needs_function(operand, name),
            ExpressionKind::Constructor { argument } => argument
                .map_or(false, |argument| self.expression_needs_function(argument, name)),
            ExpressionKind::MemberAccess { object, .. } => {
                self.expression_needs_function(object, name)
            }
            ExpressionKind::ArrayAccess { array, index } => {
                self.expression_needs_function(array, name)
                    || self.expression_needs_function(index, name)
            }
            ExpressionKind::Call(call) => {
                self.callee_name(call.function) == name
                    || call.argument.map_or(false, |argument| {
                        self.expression_needs_function(argument, name)
                    })
            }
            _ => false,
        };
        found
            || expression
                .next
                .map_or(false, |next| self.expression_needs_function(next, name))
    }
}

/// Component count of float and half scalars and vectors; everything else
/// (including matrices) folds as dimension 0.
fn vector_dimension(base: BaseType) -> usize {
    match base {
        BaseType::Float | BaseType::Half => 1,
        BaseType::Float2 | BaseType::Half2 => 2,
        BaseType::Float3 | BaseType::Half3 => 3,
        BaseType::Float4 | BaseType::Half4 => 4,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bumpalo::Bump;

    fn literal_int<'a>(tree: &mut Tree<'a>, value: i32) -> ExprId<'a> {
        let file = tree.add_string("test");
        tree.add_expression(
            file,
            1,
            Type::with_flags(BaseType::Int, TypeFlags::CONST),
            ExpressionKind::Literal(Literal::Int(value)),
        )
    }

    #[test]
    fn folds_integer_arithmetic() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let mut tree = Tree::new(&pool);
        let file = tree.add_string("test");

        let left = literal_int(&mut tree, 2);
        let right = literal_int(&mut tree, 3);
        let sum = tree.add_expression(
            file,
            1,
            Type::with_flags(BaseType::Int, TypeFlags::CONST),
            ExpressionKind::Binary {
                op: BinaryOp::Add,
                left,
                right,
            },
        );
        assert_eq!(tree.expression_value_int(sum), Some(5));
    }

    #[test]
    fn non_const_expressions_do_not_fold() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let mut tree = Tree::new(&pool);
        let file = tree.add_string("test");
        let id = tree.add_expression(
            file,
            1,
            Type::new(BaseType::Int),
            ExpressionKind::Literal(Literal::Int(7)),
        );
        assert_eq!(tree.expression_value_int(id), None);
    }

    #[test]
    fn division_by_zero_does_not_fold() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let mut tree = Tree::new(&pool);
        let file = tree.add_string("test");
        let left = literal_int(&mut tree, 1);
        let right = literal_int(&mut tree, 0);
        let div = tree.add_expression(
            file,
            1,
            Type::with_flags(BaseType::Int, TypeFlags::CONST),
            ExpressionKind::Binary {
                op: BinaryOp::Div,
                left,
                right,
            },
        );
        assert_eq!(tree.expression_value_int(div), None);
    }

    #[test]
    fn folds_float_constructor_with_broadcast() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let mut tree = Tree::new(&pool);
        let file = tree.add_string("test");

        let x = tree.add_expression(
            file,
            1,
            Type::with_flags(BaseType::Float, TypeFlags::CONST),
            ExpressionKind::Literal(Literal::Float(1.5)),
        );
        let y = tree.add_expression(
            file,
            1,
            Type::with_flags(BaseType::Float, TypeFlags::CONST),
            ExpressionKind::Literal(Literal::Float(2.5)),
        );
        tree.expression_mut(x).next = Some(y);
        let constructor = tree.add_expression(
            file,
            1,
            Type::with_flags(BaseType::Float2, TypeFlags::CONST),
            ExpressionKind::Constructor { argument: Some(x) },
        );

        let mut values = [0.0f32; 4];
        assert_eq!(tree.expression_value_float4(constructor, &mut values), 2);
        assert_eq!(&values[..2], &[1.5, 2.5]);
    }

    #[test]
    fn int_scalar_folds_to_float_with_broadcast() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let mut tree = Tree::new(&pool);
        let id = literal_int(&mut tree, 3);
        let mut values = [0.0f32; 4];
        assert_eq!(tree.expression_value_float4(id, &mut values), 1);
        assert_eq!(values, [3.0, 3.0, 3.0, 3.0]);
    }

    #[test]
    fn empty_tree_has_no_statements() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let tree = Tree::new(&pool);
        assert_eq!(tree.statements().count(), 0);
        assert!(tree.find_function("main").is_none());
        assert!(!tree.needs_function("main"));
    }
}
