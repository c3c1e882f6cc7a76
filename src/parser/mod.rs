mod expr;
mod resolve;

#[cfg(test)]
mod tests;

pub use expr::ExpressionParsing;
pub use resolve::Resolution;

use crate::ast::{
    ArgId, Argument, ArgumentModifier, Attribute, AttributeKind, AttrId, Buffer, Declaration,
    ExprId, ForStatement, Function, IfStatement, Pipeline, Stage, StateAssignment, StateValue,
    StatementKind, StmtId, StructDef, StructField, Technique, TechniquePass, Tree,
};
use crate::error::ParseError;
use crate::states;
use crate::strings::{InternedStr, StringPool};
use crate::token::{token_name, Keyword, Token};
use crate::tokenizer::Tokenizer;
use crate::types::{BaseType, Type, TypeFlags};

/// Parses a source buffer into a fully type-annotated tree.
///
/// On failure the first diagnostic is returned; it has already been written
/// to the error log in `file(line) : message` form.
pub fn parse<'a, 's>(
    strings: &'a StringPool<'a>,
    file_name: &str,
    source: &'s str,
) -> Result<Tree<'a>, ParseError> {
    Parser::new(strings, file_name, source).parse()
}

/// An entry on the variable stack. A scope boundary is an entry without a
/// name; `end_scope` pops entries until it has removed one.
pub(super) struct ScopeEntry<'a> {
    pub name: Option<InternedStr<'a>>,
    pub ty: Type<'a>,
}

/// Recursive-descent parser with one-token lookahead. Semantic analysis is
/// interleaved: every production that builds an expression node also
/// resolves its type, so a successful parse yields a tree with no Unknown
/// expression types.
pub struct Parser<'a, 's> {
    pub(super) tokenizer: Tokenizer<'a, 's>,
    pub(super) tree: Tree<'a>,
    pub(super) variables: Vec<ScopeEntry<'a>>,
    pub(super) user_types: Vec<StmtId<'a>>,
    /// Declaration order is preserved for stable overload iteration.
    pub(super) functions: Vec<StmtId<'a>>,
    pub(super) num_globals: usize,
    pub(super) current_return_type: Option<Type<'a>>,
}

impl<'a, 's> Parser<'a, 's> {
    pub fn new(strings: &'a StringPool<'a>, file_name: &str, source: &'s str) -> Self {
        Parser {
            tokenizer: Tokenizer::new(strings, file_name, source),
            tree: Tree::new(strings),
            variables: Vec::new(),
            user_types: Vec::new(),
            functions: Vec::new(),
            num_globals: 0,
            current_return_type: None,
        }
    }

    pub fn parse(mut self) -> Result<Tree<'a>, ParseError> {
        self.begin_scope();

        let mut last: Option<StmtId<'a>> = None;
        while !self.accept(Token::EndOfStream) {
            match self.parse_top_level() {
                Some(statement) => {
                    match last {
                        Some(previous) => self.tree.statement_mut(previous).next = Some(statement),
                        None => self.tree.set_first_statement(Some(statement)),
                    }
                    last = Some(statement);
                    self.num_globals = self.variables.len();
                }
                None => break,
            }
        }

        self.end_scope();

        if self.tokenizer.has_error() {
            let fallback = ParseError::new(
                self.tokenizer.file_name().as_str(),
                self.tokenizer.line_number(),
                "parse failed".to_string(),
            );
            return Err(self.tokenizer.take_diagnostic().unwrap_or(fallback));
        }
        debug_assert!(self.variables.is_empty());
        Ok(self.tree)
    }

    // ------------------------------------------------------------------
    // Primitives
    // ------------------------------------------------------------------

    pub(super) fn error(&mut self, message: String) {
        self.tokenizer.error(message);
    }

    /// Consumes the current token when it matches.
    pub(super) fn accept(&mut self, token: Token) -> bool {
        if self.tokenizer.token() == token {
            self.tokenizer.next();
            true
        } else {
            false
        }
    }

    /// Like `accept`, but a mismatch is a syntax error.
    pub(super) fn expect(&mut self, token: Token) -> bool {
        if self.accept(token) {
            return true;
        }
        let message = format!(
            "Syntax error: expected '{}' near '{}'",
            token_name(token),
            self.tokenizer.token_name()
        );
        self.error(message);
        false
    }

    /// Consumes the current token when it is the given identifier. Used for
    /// the contextual keywords (`pipeline`, `stage`, qualifier names) that
    /// are not reserved words.
    pub(super) fn accept_identifier(&mut self, name: &str) -> bool {
        if self.tokenizer.token() == Token::Identifier && self.tokenizer.identifier() == name {
            self.tokenizer.next();
            true
        } else {
            false
        }
    }

    /// Consumes and interns the current identifier; anything else is a
    /// syntax error.
    pub(super) fn expect_any_identifier(&mut self) -> Option<InternedStr<'a>> {
        if self.tokenizer.token() == Token::Identifier {
            let name = self.tree.add_string(self.tokenizer.identifier());
            self.tokenizer.next();
            Some(name)
        } else {
            let message = format!(
                "Syntax error: expected identifier near '{}'",
                self.tokenizer.token_name()
            );
            self.error(message);
            None
        }
    }

    pub(super) fn file_line(&self) -> (InternedStr<'a>, u32) {
        (self.tokenizer.file_name(), self.tokenizer.line_number())
    }

    // ------------------------------------------------------------------
    // Scope handling
    // ------------------------------------------------------------------

    pub(super) fn begin_scope(&mut self) {
        self.variables.push(ScopeEntry {
            name: None,
            ty: Type::new(BaseType::Unknown),
        });
    }

    pub(super) fn end_scope(&mut self) {
        while let Some(entry) = self.variables.pop() {
            if entry.name.is_none() {
                break;
            }
        }
    }

    pub(super) fn declare_variable(&mut self, name: InternedStr<'a>, ty: Type<'a>) {
        self.variables.push(ScopeEntry {
            name: Some(name),
            ty,
        });
    }

    /// Innermost binding for `name`, and whether it is a global.
    pub(super) fn find_variable(&self, name: InternedStr<'a>) -> Option<(Type<'a>, bool)> {
        for (index, entry) in self.variables.iter().enumerate().rev() {
            if entry.name == Some(name) {
                return Some((entry.ty, index < self.num_globals));
            }
        }
        None
    }

    pub(super) fn find_user_type(&self, name: &str) -> Option<StmtId<'a>> {
        self.user_types
            .iter()
            .copied()
            .find(|id| match &self.tree.statement(*id).kind {
                StatementKind::Struct(def) => def.name == *name,
                _ => false,
            })
    }

    // ------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------

    /// Storage and interpolation qualifiers preceding a type.
    pub(super) fn parse_type_flags(&mut self) -> TypeFlags {
        let mut flags = TypeFlags::NONE;
        loop {
            if self.accept(Token::Keyword(Keyword::Const)) {
                flags |= TypeFlags::CONST;
            } else if self.accept(Token::Keyword(Keyword::Static)) {
                flags |= TypeFlags::STATIC;
            } else if self.accept(Token::Keyword(Keyword::Uniform))
                || self.accept(Token::Keyword(Keyword::Inline))
            {
                // Accepted and dropped.
            } else if self.accept_identifier("linear") {
                flags |= TypeFlags::LINEAR;
            } else if self.accept_identifier("centroid") {
                flags |= TypeFlags::CENTROID;
            } else if self.accept_identifier("nointerpolation") {
                flags |= TypeFlags::NO_INTERPOLATION;
            } else if self.accept_identifier("noperspective") {
                flags |= TypeFlags::NO_PERSPECTIVE;
            } else if self.accept_identifier("sample") {
                flags |= TypeFlags::SAMPLE;
            } else {
                return flags;
            }
        }
    }

    /// Consumes a type name when the current token starts one. Identifiers
    /// are types only when they name a previously declared struct.
    pub(super) fn accept_type(&mut self, allow_void: bool) -> Option<Type<'a>> {
        if let Token::Keyword(keyword) = self.tokenizer.token() {
            if keyword == Keyword::Void {
                if !allow_void {
                    return None;
                }
                self.tokenizer.next();
                return Some(Type::new(BaseType::Void));
            }
            if let Some(base) = keyword_base_type(keyword) {
                self.tokenizer.next();
                return Some(Type::new(base));
            }
            return None;
        }
        if self.tokenizer.token() == Token::Identifier {
            if self.find_user_type(self.tokenizer.identifier()).is_some() {
                let name = self.tree.add_string(self.tokenizer.identifier());
                self.tokenizer.next();
                return Some(Type::user_defined(name));
            }
        }
        None
    }

    pub(super) fn expect_type(&mut self, allow_void: bool) -> Option<Type<'a>> {
        match self.accept_type(allow_void) {
            Some(ty) => Some(ty),
            None => {
                let message = format!(
                    "Syntax error: expected type near '{}'",
                    self.tokenizer.token_name()
                );
                self.error(message);
                None
            }
        }
    }

    /// True when the current token can begin a declaration.
    pub(super) fn is_type_start(&self) -> bool {
        match self.tokenizer.token() {
            Token::Keyword(keyword) => {
                keyword_base_type(keyword).is_some()
                    || matches!(
                        keyword,
                        Keyword::Void
                            | Keyword::Const
                            | Keyword::Static
                            | Keyword::Uniform
                            | Keyword::Inline
                    )
            }
            Token::Identifier => self.find_user_type(self.tokenizer.identifier()).is_some(),
            _ => false,
        }
    }

    /// `[size]` or `[]` after a declarator. An absent size is only accepted
    /// in argument position.
    fn parse_array_suffix(&mut self, ty: &mut Type<'a>, allow_unsized: bool) -> bool {
        if !self.accept(Token::Symbol(b'[')) {
            return true;
        }
        ty.array = true;
        if self.accept(Token::Symbol(b']')) {
            if !allow_unsized {
                self.error("Syntax error: expected array size".to_string());
                return false;
            }
            return true;
        }
        let Some(size) = self.parse_expression() else {
            return false;
        };
        ty.array_size = Some(size);
        self.expect(Token::Symbol(b']'))
    }

    /// `: register(name[, space])` and `: SEMANTIC` annotations, in either
    /// order.
    fn parse_register_and_semantic(
        &mut self,
    ) -> Option<(
        Option<InternedStr<'a>>,
        Option<InternedStr<'a>>,
        Option<InternedStr<'a>>,
    )> {
        let mut register_name = None;
        let mut space_name = None;
        let mut semantic = None;
        while self.accept(Token::Symbol(b':')) {
            if self.accept(Token::Keyword(Keyword::Register)) {
                if !self.expect(Token::Symbol(b'(')) {
                    return None;
                }
                register_name = Some(self.expect_any_identifier()?);
                if self.accept(Token::Symbol(b',')) {
                    space_name = Some(self.expect_any_identifier()?);
                }
                if !self.expect(Token::Symbol(b')')) {
                    return None;
                }
            } else {
                semantic = Some(self.expect_any_identifier()?);
            }
        }
        Some((register_name, space_name, semantic))
    }

    // ------------------------------------------------------------------
    // Top level
    // ------------------------------------------------------------------

    fn parse_top_level(&mut self) -> Option<StmtId<'a>> {
        let attributes = self.parse_attributes()?;

        let statement = if self.accept(Token::Keyword(Keyword::Struct)) {
            self.parse_struct()?
        } else if self.accept(Token::Keyword(Keyword::CBuffer)) {
            self.parse_buffer()?
        } else if self.accept(Token::Keyword(Keyword::TBuffer)) {
            self.parse_buffer()?
        } else if self.accept(Token::Keyword(Keyword::Technique)) {
            self.parse_technique()?
        } else if self.accept_identifier("pipeline") {
            self.parse_pipeline()?
        } else if self.accept_identifier("stage") {
            self.parse_stage()?
        } else {
            let (file, line) = self.file_line();
            let flags = self.parse_type_flags();
            let Some(mut ty) = self.accept_type(true) else {
                let message = format!(
                    "Syntax error: expected declaration near '{}'",
                    self.tokenizer.token_name()
                );
                self.error(message);
                return None;
            };
            ty.flags |= flags;
            let name = self.expect_any_identifier()?;

            if self.accept(Token::Symbol(b'(')) {
                self.parse_function(ty, name, file, line)?
            } else {
                if ty.base == BaseType::Void {
                    self.error(format!("Syntax error: void variable '{}'", name));
                    return None;
                }
                let declaration = self.parse_declaration_declarators(ty, name, file, line)?;
                if !self.expect(Token::Symbol(b';')) {
                    return None;
                }
                declaration
            }
        };

        self.tree.statement_mut(statement).attributes = attributes;
        Some(statement)
    }

    /// One or more `[name]` / `[name(arg)]` blocks, merged into a single
    /// attribute chain.
    fn parse_attributes(&mut self) -> Option<Option<AttrId<'a>>> {
        let mut first: Option<AttrId<'a>> = None;
        let mut last: Option<AttrId<'a>> = None;
        while self.accept(Token::Symbol(b'[')) {
            let (file, line) = self.file_line();
            let name = self.expect_any_identifier()?;
            let kind = match name.as_str() {
                "unroll" => AttributeKind::Unroll,
                "branch" => AttributeKind::Branch,
                "flatten" => AttributeKind::Flatten,
                "nofastmath" => AttributeKind::NoFastMath,
                _ => AttributeKind::Unknown,
            };
            let argument = if self.accept(Token::Symbol(b'(')) {
                let argument = self.parse_expression()?;
                if !self.expect(Token::Symbol(b')')) {
                    return None;
                }
                Some(argument)
            } else {
                None
            };
            if !self.expect(Token::Symbol(b']')) {
                return None;
            }
            let attribute = self.tree.add_attribute(Attribute {
                file,
                line,
                kind,
                argument,
                next_attribute: None,
            });
            match last {
                Some(previous) => self.tree.attribute_mut(previous).next_attribute = Some(attribute),
                None => first = Some(attribute),
            }
            last = Some(attribute);
        }
        Some(first)
    }

    fn parse_struct(&mut self) -> Option<StmtId<'a>> {
        let (file, line) = self.file_line();
        let name = self.expect_any_identifier()?;
        if self.find_user_type(name.as_str()).is_some() {
            self.error(format!("Type '{}' already declared", name));
            return None;
        }
        if !self.expect(Token::Symbol(b'{')) {
            return None;
        }

        let statement = self.tree.add_statement(
            file,
            line,
            StatementKind::Struct(StructDef { name, field: None }),
        );
        // Fields may reference the struct's own name in nested arrays, so
        // register the type before parsing the body.
        self.user_types.push(statement);

        let mut last_field: Option<crate::ast::FieldId<'a>> = None;
        while !self.accept(Token::Symbol(b'}')) {
            if self.tokenizer.token() == Token::EndOfStream {
                self.error("Syntax error: expected '}' near end of stream".to_string());
                return None;
            }
            let field = self.parse_struct_field()?;
            match last_field {
                Some(previous) => self.tree.field_mut(previous).next_field = Some(field),
                None => match &mut self.tree.statement_mut(statement).kind {
                    StatementKind::Struct(def) => def.field = Some(field),
                    _ => {}
                },
            }
            last_field = Some(field);
        }
        if !self.expect(Token::Symbol(b';')) {
            return None;
        }
        Some(statement)
    }

    fn parse_struct_field(&mut self) -> Option<crate::ast::FieldId<'a>> {
        let (file, line) = self.file_line();
        let flags = self.parse_type_flags();
        let mut ty = self.expect_type(false)?;
        ty.flags |= flags;
        let name = self.expect_any_identifier()?;
        if !self.parse_array_suffix(&mut ty, false) {
            return None;
        }
        let mut semantic = None;
        if self.accept(Token::Symbol(b':')) {
            semantic = Some(self.expect_any_identifier()?);
        }
        if !self.expect(Token::Symbol(b';')) {
            return None;
        }
        Some(self.tree.add_field(StructField {
            file,
            line,
            name,
            ty,
            semantic,
            next_field: None,
            hidden: false,
        }))
    }

    fn parse_buffer(&mut self) -> Option<StmtId<'a>> {
        let (file, line) = self.file_line();
        let name = self.expect_any_identifier()?;
        let (register_name, space_name, _) = self.parse_register_and_semantic()?;
        if !self.expect(Token::Symbol(b'{')) {
            return None;
        }

        let buffer = self.tree.add_statement(
            file,
            line,
            StatementKind::Buffer(Buffer {
                name,
                register_name,
                space_name,
                field: None,
            }),
        );

        let mut last_field: Option<StmtId<'a>> = None;
        while !self.accept(Token::Symbol(b'}')) {
            if self.tokenizer.token() == Token::EndOfStream {
                self.error("Syntax error: expected '}' near end of stream".to_string());
                return None;
            }
            let (field_file, field_line) = self.file_line();
            let field_flags = self.parse_type_flags();
            let mut field_ty = self.expect_type(false)?;
            field_ty.flags |= field_flags;
            let field_name = self.expect_any_identifier()?;
            let field = self.parse_declaration_declarators(
                field_ty, field_name, field_file, field_line,
            )?;
            if !self.expect(Token::Symbol(b';')) {
                return None;
            }

            // Chain buffer fields and point each back at the buffer.
            let mut declaration = Some(field);
            while let Some(id) = declaration {
                self.tree.declaration_mut(id).buffer = Some(buffer);
                declaration = self.tree.declaration(id).next_declaration;
            }
            match last_field {
                Some(previous) => self.tree.statement_mut(previous).next = Some(field),
                None => match &mut self.tree.statement_mut(buffer).kind {
                    StatementKind::Buffer(buffer_data) => buffer_data.field = Some(field),
                    _ => {}
                },
            }
            last_field = Some(field);
        }
        if !self.expect(Token::Symbol(b';')) {
            return None;
        }
        Some(buffer)
    }

    /// Declarators after the first `type name` pair has been consumed:
    /// array suffix, annotations, initializer, then any further
    /// comma-separated declarators sharing the base type.
    fn parse_declaration_declarators(
        &mut self,
        base_ty: Type<'a>,
        name: InternedStr<'a>,
        file: InternedStr<'a>,
        line: u32,
    ) -> Option<StmtId<'a>> {
        let first = self.parse_single_declarator(base_ty, name, file, line)?;
        let mut previous = first;
        while self.accept(Token::Symbol(b',')) {
            let (next_file, next_line) = self.file_line();
            let next_name = self.expect_any_identifier()?;
            let next = self.parse_single_declarator(base_ty, next_name, next_file, next_line)?;
            self.tree.declaration_mut(previous).next_declaration = Some(next);
            previous = next;
        }
        Some(first)
    }

    fn parse_single_declarator(
        &mut self,
        base_ty: Type<'a>,
        name: InternedStr<'a>,
        file: InternedStr<'a>,
        line: u32,
    ) -> Option<StmtId<'a>> {
        let mut ty = base_ty;
        if !self.parse_array_suffix(&mut ty, false) {
            return None;
        }
        let (register_name, space_name, semantic) = self.parse_register_and_semantic()?;

        let assignment = if self.accept(Token::Symbol(b'=')) {
            Some(self.parse_declaration_assignment(&ty)?)
        } else {
            None
        };

        self.declare_variable(name, ty);
        Some(self.tree.add_statement(
            file,
            line,
            StatementKind::Declaration(Declaration {
                name,
                ty,
                register_name,
                space_name,
                semantic,
                next_declaration: None,
                assignment,
                buffer: None,
            }),
        ))
    }

    /// The initializer of a declaration: a sampler_state block for
    /// samplers, a brace-enclosed expression list for arrays, otherwise a
    /// single expression checked against the declared type.
    fn parse_declaration_assignment(&mut self, ty: &Type<'a>) -> Option<ExprId<'a>> {
        if ty.base.is_sampler() {
            return self.parse_sampler_state_expression();
        }
        if ty.array && self.accept(Token::Symbol(b'{')) {
            let (first, _count) = self.parse_expression_list(b'}')?;
            return first;
        }
        let expression = self.parse_expression()?;
        if !self.check_type_cast(expression, ty) {
            return None;
        }
        Some(expression)
    }

    // ------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------

    fn parse_function(
        &mut self,
        return_type: Type<'a>,
        name: InternedStr<'a>,
        file: InternedStr<'a>,
        line: u32,
    ) -> Option<StmtId<'a>> {
        self.begin_scope();
        let result = self.parse_function_inner(return_type, name, file, line);
        self.end_scope();
        result
    }

    fn parse_function_inner(
        &mut self,
        return_type: Type<'a>,
        name: InternedStr<'a>,
        file: InternedStr<'a>,
        line: u32,
    ) -> Option<StmtId<'a>> {
        let mut first_argument: Option<ArgId<'a>> = None;
        let mut last_argument: Option<ArgId<'a>> = None;
        let mut num_arguments = 0u32;
        let mut num_output_arguments = 0u32;

        if !self.accept(Token::Symbol(b')')) {
            loop {
                let argument = self.parse_argument(&mut num_output_arguments)?;
                match last_argument {
                    Some(previous) => {
                        self.tree.argument_mut(previous).next_argument = Some(argument)
                    }
                    None => first_argument = Some(argument),
                }
                last_argument = Some(argument);
                num_arguments += 1;
                if self.accept(Token::Symbol(b')')) {
                    break;
                }
                if !self.expect(Token::Symbol(b',')) {
                    return None;
                }
            }
        }

        let mut semantic = None;
        if self.accept(Token::Symbol(b':')) {
            semantic = Some(self.expect_any_identifier()?);
        }

        let statement = self.tree.add_statement(
            file,
            line,
            StatementKind::Function(Function {
                name,
                return_type,
                semantic,
                num_arguments,
                num_output_arguments,
                argument: first_argument,
                statement: None,
                forward: None,
            }),
        );

        let is_definition = self.tokenizer.token() != Token::Symbol(b';');
        let forward = match self.find_matching_function(statement) {
            Some(existing) => {
                if is_definition {
                    if self.tree.function(existing).statement.is_some() {
                        self.error(format!("Redefinition of function '{}'", name));
                        return None;
                    }
                    // The definition supersedes the forward declaration for
                    // later call resolution.
                    if let Some(slot) = self.functions.iter().position(|id| *id == existing) {
                        self.functions[slot] = statement;
                    }
                    Some(existing)
                } else {
                    None
                }
            }
            None => {
                self.functions.push(statement);
                None
            }
        };
        self.tree.function_mut(statement).forward = forward;

        if self.accept(Token::Symbol(b';')) {
            return Some(statement);
        }

        if !self.expect(Token::Symbol(b'{')) {
            return None;
        }
        let saved_return_type = self.current_return_type.replace(return_type);
        let body = self.parse_statements_until_brace();
        self.current_return_type = saved_return_type;
        let body = body?;
        self.tree.function_mut(statement).statement = body;
        Some(statement)
    }

    fn parse_argument(&mut self, num_output_arguments: &mut u32) -> Option<ArgId<'a>> {
        let (file, line) = self.file_line();

        let mut modifier = ArgumentModifier::None;
        let mut flags = TypeFlags::NONE;
        loop {
            if self.accept(Token::Keyword(Keyword::In)) {
                modifier = ArgumentModifier::In;
                flags |= TypeFlags::INPUT;
            } else if self.accept(Token::Keyword(Keyword::Out)) {
                modifier = ArgumentModifier::Out;
                flags |= TypeFlags::OUTPUT;
                *num_output_arguments += 1;
            } else if self.accept(Token::Keyword(Keyword::InOut)) {
                modifier = ArgumentModifier::Inout;
                flags |= TypeFlags::INPUT | TypeFlags::OUTPUT;
                *num_output_arguments += 1;
            } else if self.accept(Token::Keyword(Keyword::Uniform)) {
                modifier = ArgumentModifier::Uniform;
            } else if self.accept(Token::Keyword(Keyword::Const)) {
                modifier = ArgumentModifier::Const;
                flags |= TypeFlags::CONST;
            } else {
                break;
            }
        }

        let mut ty = self.expect_type(false)?;
        ty.flags |= flags;
        let name = self.expect_any_identifier()?;
        if !self.parse_array_suffix(&mut ty, true) {
            return None;
        }

        let mut semantic = None;
        if self.accept(Token::Symbol(b':')) {
            semantic = Some(self.expect_any_identifier()?);
        }

        let default_value = if self.accept(Token::Symbol(b'=')) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        self.declare_variable(name, ty);
        Some(self.tree.add_argument(Argument {
            file,
            line,
            name,
            modifier,
            ty,
            semantic,
            default_value,
            next_argument: None,
            hidden: false,
        }))
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    /// Statements up to the closing `}` of the surrounding block, chained
    /// in order.
    fn parse_statements_until_brace(&mut self) -> Option<Option<StmtId<'a>>> {
        let mut first: Option<StmtId<'a>> = None;
        let mut last: Option<StmtId<'a>> = None;
        while !self.accept(Token::Symbol(b'}')) {
            if self.tokenizer.token() == Token::EndOfStream {
                self.error("Syntax error: expected '}' near end of stream".to_string());
                return None;
            }
            if let Some(statement) = self.parse_statement()? {
                match last {
                    Some(previous) => self.tree.statement_mut(previous).next = Some(statement),
                    None => first = Some(statement),
                }
                last = Some(statement);
            }
        }
        Some(first)
    }

    /// A single statement, or nothing for a stray `;`.
    fn parse_statement(&mut self) -> Option<Option<StmtId<'a>>> {
        let attributes = self.parse_attributes()?;

        if self.accept(Token::Symbol(b';')) {
            return Some(None);
        }

        let (file, line) = self.file_line();

        let statement = if self.accept(Token::Symbol(b'{')) {
            self.begin_scope();
            let body = self.parse_statements_until_brace();
            self.end_scope();
            self.tree
                .add_statement(file, line, StatementKind::Block { statement: body? })
        } else if self.accept(Token::Keyword(Keyword::Discard)) {
            if !self.expect(Token::Symbol(b';')) {
                return None;
            }
            self.tree.add_statement(file, line, StatementKind::Discard)
        } else if self.accept(Token::Keyword(Keyword::Break)) {
            if !self.expect(Token::Symbol(b';')) {
                return None;
            }
            self.tree.add_statement(file, line, StatementKind::Break)
        } else if self.accept(Token::Keyword(Keyword::Continue)) {
            if !self.expect(Token::Symbol(b';')) {
                return None;
            }
            self.tree.add_statement(file, line, StatementKind::Continue)
        } else if self.accept(Token::Keyword(Keyword::If)) {
            self.parse_if(file, line)?
        } else if self.accept(Token::Keyword(Keyword::For)) {
            self.parse_for(file, line)?
        } else if self.accept(Token::Keyword(Keyword::Return)) {
            self.parse_return(file, line)?
        } else if self.is_type_start() {
            let flags = self.parse_type_flags();
            let mut ty = self.expect_type(false)?;
            ty.flags |= flags;
            let name = self.expect_any_identifier()?;
            let declaration = self.parse_declaration_declarators(ty, name, file, line)?;
            if !self.expect(Token::Symbol(b';')) {
                return None;
            }
            declaration
        } else {
            let expression = self.parse_expression()?;
            if !self.expect(Token::Symbol(b';')) {
                return None;
            }
            self.tree
                .add_statement(file, line, StatementKind::Expression(expression))
        };

        self.tree.statement_mut(statement).attributes = attributes;
        Some(Some(statement))
    }

    /// The body of an `if`, `else` or `for`: a braced chain of statements
    /// or a single statement.
    fn parse_statement_or_block(&mut self) -> Option<Option<StmtId<'a>>> {
        if self.accept(Token::Symbol(b'{')) {
            self.begin_scope();
            let body = self.parse_statements_until_brace();
            self.end_scope();
            return body;
        }
        self.parse_statement()
    }

    fn parse_if(&mut self, file: InternedStr<'a>, line: u32) -> Option<StmtId<'a>> {
        if !self.expect(Token::Symbol(b'(')) {
            return None;
        }
        let condition = self.parse_expression()?;
        if !self.check_type_cast(condition, &Type::new(BaseType::Bool)) {
            return None;
        }
        if !self.expect(Token::Symbol(b')')) {
            return None;
        }
        let statement = self.parse_statement_or_block()?;
        let else_statement = if self.accept(Token::Keyword(Keyword::Else)) {
            self.parse_statement_or_block()?
        } else {
            None
        };
        Some(self.tree.add_statement(
            file,
            line,
            StatementKind::If(IfStatement {
                condition,
                statement,
                else_statement,
                is_static: false,
            }),
        ))
    }

    fn parse_for(&mut self, file: InternedStr<'a>, line: u32) -> Option<StmtId<'a>> {
        if !self.expect(Token::Symbol(b'(')) {
            return None;
        }
        self.begin_scope();
        let result = self.parse_for_inner(file, line);
        self.end_scope();
        result
    }

    fn parse_for_inner(&mut self, file: InternedStr<'a>, line: u32) -> Option<StmtId<'a>> {
        let initialization = if self.is_type_start() {
            let (decl_file, decl_line) = self.file_line();
            let flags = self.parse_type_flags();
            let mut ty = self.expect_type(false)?;
            ty.flags |= flags;
            let name = self.expect_any_identifier()?;
            Some(self.parse_declaration_declarators(ty, name, decl_file, decl_line)?)
        } else {
            None
        };
        if !self.expect(Token::Symbol(b';')) {
            return None;
        }

        let condition = if self.tokenizer.token() != Token::Symbol(b';') {
            Some(self.parse_expression()?)
        } else {
            None
        };
        if !self.expect(Token::Symbol(b';')) {
            return None;
        }

        let increment = if self.tokenizer.token() != Token::Symbol(b')') {
            Some(self.parse_expression()?)
        } else {
            None
        };
        if !self.expect(Token::Symbol(b')')) {
            return None;
        }

        let statement = self.parse_statement_or_block()?;
        Some(self.tree.add_statement(
            file,
            line,
            StatementKind::For(ForStatement {
                initialization,
                condition,
                increment,
                statement,
            }),
        ))
    }

    fn parse_return(&mut self, file: InternedStr<'a>, line: u32) -> Option<StmtId<'a>> {
        let expression = if self.tokenizer.token() != Token::Symbol(b';') {
            let expression = self.parse_expression()?;
            if let Some(return_type) = self.current_return_type {
                if !self.check_type_cast(expression, &return_type) {
                    return None;
                }
            }
            Some(expression)
        } else {
            None
        };
        if !self.expect(Token::Symbol(b';')) {
            return None;
        }
        Some(
            self.tree
                .add_statement(file, line, StatementKind::Return { expression }),
        )
    }

    // ------------------------------------------------------------------
    // Techniques, pipelines and stages
    // ------------------------------------------------------------------

    fn parse_technique(&mut self) -> Option<StmtId<'a>> {
        let (file, line) = self.file_line();
        let name = self.expect_any_identifier()?;
        if !self.expect(Token::Symbol(b'{')) {
            return None;
        }

        let mut first_pass = None;
        let mut last_pass: Option<crate::ast::PassId<'a>> = None;
        let mut num_passes = 0u32;
        while !self.accept(Token::Symbol(b'}')) {
            if !self.expect(Token::Keyword(Keyword::Pass)) {
                return None;
            }
            let pass = self.parse_pass()?;
            match last_pass {
                Some(previous) => self.tree.technique_pass_mut(previous).next_pass = Some(pass),
                None => first_pass = Some(pass),
            }
            last_pass = Some(pass);
            num_passes += 1;
        }

        Some(self.tree.add_statement(
            file,
            line,
            StatementKind::Technique(Technique {
                name,
                num_passes,
                passes: first_pass,
            }),
        ))
    }

    fn parse_pass(&mut self) -> Option<crate::ast::PassId<'a>> {
        let (file, line) = self.file_line();
        let name = self.expect_any_identifier()?;
        if !self.expect(Token::Symbol(b'{')) {
            return None;
        }
        let (state_assignments, num_state_assignments) = self.parse_state_assignments(false)?;
        Some(self.tree.add_pass(TechniquePass {
            file,
            line,
            name,
            num_state_assignments,
            state_assignments,
            next_pass: None,
        }))
    }

    fn parse_pipeline(&mut self) -> Option<StmtId<'a>> {
        let (file, line) = self.file_line();
        let name = self.expect_any_identifier()?;
        if !self.expect(Token::Symbol(b'{')) {
            return None;
        }
        let (state_assignments, num_state_assignments) = self.parse_state_assignments(false)?;
        Some(self.tree.add_statement(
            file,
            line,
            StatementKind::Pipeline(Pipeline {
                name,
                num_state_assignments,
                state_assignments,
            }),
        ))
    }

    /// `stage name { ... }`. Declarations introduced with `in`/`out` are
    /// collected into the stage's input and output chains; everything else
    /// forms the body.
    fn parse_stage(&mut self) -> Option<StmtId<'a>> {
        let (file, line) = self.file_line();
        let name = self.expect_any_identifier()?;
        if !self.expect(Token::Symbol(b'{')) {
            return None;
        }
        self.begin_scope();
        let result = self.parse_stage_inner(file, line, name);
        self.end_scope();
        result
    }

    fn parse_stage_inner(
        &mut self,
        file: InternedStr<'a>,
        line: u32,
        name: InternedStr<'a>,
    ) -> Option<StmtId<'a>> {
        let mut body: Option<StmtId<'a>> = None;
        let mut body_last: Option<StmtId<'a>> = None;
        let mut inputs: Option<StmtId<'a>> = None;
        let mut inputs_last: Option<StmtId<'a>> = None;
        let mut outputs: Option<StmtId<'a>> = None;
        let mut outputs_last: Option<StmtId<'a>> = None;

        while !self.accept(Token::Symbol(b'}')) {
            if self.tokenizer.token() == Token::EndOfStream {
                self.error("Syntax error: expected '}' near end of stream".to_string());
                return None;
            }
            let io_flag = if self.accept(Token::Keyword(Keyword::In)) {
                Some(TypeFlags::INPUT)
            } else if self.accept(Token::Keyword(Keyword::Out)) {
                Some(TypeFlags::OUTPUT)
            } else {
                None
            };
            if let Some(flag) = io_flag {
                let (decl_file, decl_line) = self.file_line();
                let flags = self.parse_type_flags() | flag;
                let mut ty = self.expect_type(false)?;
                ty.flags |= flags;
                let decl_name = self.expect_any_identifier()?;
                let declaration =
                    self.parse_declaration_declarators(ty, decl_name, decl_file, decl_line)?;
                if !self.expect(Token::Symbol(b';')) {
                    return None;
                }
                if flag == TypeFlags::INPUT {
                    match inputs_last {
                        Some(previous) => {
                            self.tree.statement_mut(previous).next = Some(declaration)
                        }
                        None => inputs = Some(declaration),
                    }
                    inputs_last = Some(declaration);
                } else {
                    match outputs_last {
                        Some(previous) => {
                            self.tree.statement_mut(previous).next = Some(declaration)
                        }
                        None => outputs = Some(declaration),
                    }
                    outputs_last = Some(declaration);
                }
                continue;
            }
            if let Some(statement) = self.parse_statement()? {
                match body_last {
                    Some(previous) => self.tree.statement_mut(previous).next = Some(statement),
                    None => body = Some(statement),
                }
                body_last = Some(statement);
            }
        }

        Some(self.tree.add_statement(
            file,
            line,
            StatementKind::Stage(Stage {
                name,
                statement: body,
                inputs,
                outputs,
            }),
        ))
    }

    // ------------------------------------------------------------------
    // State assignments
    // ------------------------------------------------------------------

    /// `Name = value;` entries up to the closing `}`. State names and named
    /// values are validated against the fixed effect-state tables.
    pub(super) fn parse_state_assignments(
        &mut self,
        sampler: bool,
    ) -> Option<(Option<crate::ast::StateId<'a>>, u32)> {
        let mut first = None;
        let mut last: Option<crate::ast::StateId<'a>> = None;
        let mut count = 0u32;
        while !self.accept(Token::Symbol(b'}')) {
            if self.tokenizer.token() == Token::EndOfStream {
                self.error("Syntax error: expected '}' near end of stream".to_string());
                return None;
            }
            let state = self.parse_state_assignment(sampler)?;
            match last {
                Some(previous) => {
                    self.tree.state_assignment_mut(previous).next_state_assignment = Some(state)
                }
                None => first = Some(state),
            }
            last = Some(state);
            count += 1;
        }
        Some((first, count))
    }

    fn parse_state_assignment(&mut self, sampler: bool) -> Option<crate::ast::StateId<'a>> {
        let (file, line) = self.file_line();
        let state_name = self.expect_any_identifier()?;

        let state = if sampler {
            states::find_sampler_state(state_name.as_str())
        } else {
            states::find_effect_state(state_name.as_str())
        };
        let Some(state) = state else {
            self.error(format!("Unknown state '{}'", state_name));
            return None;
        };

        if !self.expect(Token::Symbol(b'=')) {
            return None;
        }

        let value = if self.accept(Token::Symbol(b'<')) {
            let texture = self.expect_any_identifier()?;
            if !self.expect(Token::Symbol(b'>')) {
                return None;
            }
            StateValue::Texture(texture)
        } else if self.tokenizer.token() == Token::IntLiteral {
            let value = self.tokenizer.int_value();
            self.tokenizer.next();
            StateValue::Int(value)
        } else if matches!(
            self.tokenizer.token(),
            Token::FloatLiteral | Token::HalfLiteral
        ) {
            let value = self.tokenizer.float_value();
            self.tokenizer.next();
            StateValue::Float(value)
        } else if self.accept(Token::Keyword(Keyword::True)) {
            StateValue::Int(1)
        } else if self.accept(Token::Keyword(Keyword::False)) {
            StateValue::Int(0)
        } else if self.tokenizer.token() == Token::Identifier {
            let value_name = self.tokenizer.identifier().to_string();
            match states::find_state_value(state, &value_name) {
                Some(code) => {
                    self.tokenizer.next();
                    StateValue::Int(code)
                }
                None => {
                    self.error(format!(
                        "Unknown value '{}' for state '{}'",
                        value_name, state_name
                    ));
                    return None;
                }
            }
        } else {
            let message = format!(
                "Syntax error: expected state value near '{}'",
                self.tokenizer.token_name()
            );
            self.error(message);
            return None;
        };

        if !self.expect(Token::Symbol(b';')) {
            return None;
        }

        Some(self.tree.add_state_assignment(StateAssignment {
            file,
            line,
            state_name,
            d3d_render_state: state.d3d_render_state,
            value,
            next_state_assignment: None,
        }))
    }

    /// Exact-signature lookup used to pair forward declarations with their
    /// definitions.
    fn find_matching_function(&self, candidate: StmtId<'a>) -> Option<StmtId<'a>> {
        let candidate_fn = self.tree.function(candidate);
        for &existing in &self.functions {
            let existing_fn = self.tree.function(existing);
            if existing_fn.name != candidate_fn.name
                || existing_fn.num_arguments != candidate_fn.num_arguments
            {
                continue;
            }
            let mut left = existing_fn.argument;
            let mut right = candidate_fn.argument;
            let mut matches = true;
            while let (Some(left_id), Some(right_id)) = (left, right) {
                let left_arg = self.tree.argument(left_id);
                let right_arg = self.tree.argument(right_id);
                if !same_declared_type(&left_arg.ty, &right_arg.ty) {
                    matches = false;
                    break;
                }
                left = left_arg.next_argument;
                right = right_arg.next_argument;
            }
            if matches {
                return Some(existing);
            }
        }
        None
    }
}

fn same_declared_type(a: &Type<'_>, b: &Type<'_>) -> bool {
    a.base == b.base && a.array == b.array && a.type_name == b.type_name
}

fn keyword_base_type(keyword: Keyword) -> Option<BaseType> {
    let base = match keyword {
        Keyword::Float => BaseType::Float,
        Keyword::Float2 => BaseType::Float2,
        Keyword::Float3 => BaseType::Float3,
        Keyword::Float4 => BaseType::Float4,
        Keyword::Float2x2 => BaseType::Float2x2,
        Keyword::Float3x3 => BaseType::Float3x3,
        Keyword::Float4x4 => BaseType::Float4x4,
        Keyword::Float4x3 => BaseType::Float4x3,
        Keyword::Float4x2 => BaseType::Float4x2,
        Keyword::Half => BaseType::Half,
        Keyword::Half2 => BaseType::Half2,
        Keyword::Half3 => BaseType::Half3,
        Keyword::Half4 => BaseType::Half4,
        Keyword::Half2x2 => BaseType::Half2x2,
        Keyword::Half3x3 => BaseType::Half3x3,
        Keyword::Half4x4 => BaseType::Half4x4,
        Keyword::Half4x3 => BaseType::Half4x3,
        Keyword::Half4x2 => BaseType::Half4x2,
        Keyword::Bool => BaseType::Bool,
        Keyword::Bool2 => BaseType::Bool2,
        Keyword::Bool3 => BaseType::Bool3,
        Keyword::Bool4 => BaseType::Bool4,
        Keyword::Int => BaseType::Int,
        Keyword::Int2 => BaseType::Int2,
        Keyword::Int3 => BaseType::Int3,
        Keyword::Int4 => BaseType::Int4,
        Keyword::Uint => BaseType::Uint,
        Keyword::Uint2 => BaseType::Uint2,
        Keyword::Uint3 => BaseType::Uint3,
        Keyword::Uint4 => BaseType::Uint4,
        Keyword::Texture => BaseType::Texture,
        Keyword::Sampler => BaseType::Sampler,
        Keyword::Sampler2D => BaseType::Sampler2D,
        Keyword::Sampler3D => BaseType::Sampler3D,
        Keyword::SamplerCube => BaseType::SamplerCube,
        Keyword::Sampler2DShadow => BaseType::Sampler2DShadow,
        Keyword::Sampler2DMS => BaseType::Sampler2DMS,
        Keyword::Sampler2DArray => BaseType::Sampler2DArray,
        Keyword::Texture1D => BaseType::Texture1D,
        Keyword::Texture1DArray => BaseType::Texture1DArray,
        Keyword::Texture2D => BaseType::Texture2D,
        Keyword::Texture2DArray => BaseType::Texture2DArray,
        Keyword::Texture2DMS => BaseType::Texture2DMS,
        Keyword::Texture2DMSArray => BaseType::Texture2DMSArray,
        Keyword::Texture3D => BaseType::Texture3D,
        Keyword::TextureCube => BaseType::TextureCube,
        Keyword::TextureCubeArray => BaseType::TextureCubeArray,
        Keyword::SamplerState => BaseType::SamplerState,
        _ => return None,
    };
    Some(base)
}
