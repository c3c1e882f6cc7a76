use super::resolve::Resolution;
use super::Parser;
use crate::ast::{BinaryOp, ExprId, ExpressionKind, Literal, UnaryOp};
use crate::token::{Keyword, Token};
use crate::types::{type_description, BaseType, Type, TypeFlags};

/// Expression grammar: Pratt-style precedence climbing over the binary
/// operator table, with assignment parsed as a right-associative tail and
/// unary/postfix operators handled around the terminal parse.
pub trait ExpressionParsing<'a, 's> {
    fn parse_expression(&mut self) -> Option<ExprId<'a>>;
    fn parse_binary_expression(&mut self, priority: u32) -> Option<ExprId<'a>>;
    fn parse_terminal_expression(&mut self) -> Option<ExprId<'a>>;
    /// Comma-separated expressions chained through their `next` links, up
    /// to (and consuming) the closing symbol.
    fn parse_expression_list(&mut self, end: u8) -> Option<(Option<ExprId<'a>>, u32)>;
    fn parse_sampler_state_expression(&mut self) -> Option<ExprId<'a>>;
}

/// Binding priority of the binary operator starting at the current token;
/// higher binds tighter. `?:` is handled separately at priority 1.
fn binary_op_for_token(token: Token) -> Option<(BinaryOp, u32)> {
    let entry = match token {
        Token::Symbol(b'*') => (BinaryOp::Mul, 9),
        Token::Symbol(b'/') => (BinaryOp::Div, 9),
        Token::Symbol(b'+') => (BinaryOp::Add, 8),
        Token::Symbol(b'-') => (BinaryOp::Sub, 8),
        Token::Symbol(b'<') => (BinaryOp::Less, 7),
        Token::Symbol(b'>') => (BinaryOp::Greater, 7),
        Token::LessEqual => (BinaryOp::LessEqual, 7),
        Token::GreaterEqual => (BinaryOp::GreaterEqual, 7),
        Token::EqualEqual => (BinaryOp::Equal, 6),
        Token::NotEqual => (BinaryOp::NotEqual, 6),
        Token::Symbol(b'&') => (BinaryOp::BitAnd, 5),
        Token::Symbol(b'^') => (BinaryOp::BitXor, 4),
        Token::Symbol(b'|') => (BinaryOp::BitOr, 3),
        Token::AndAnd => (BinaryOp::And, 2),
        Token::BarBar => (BinaryOp::Or, 1),
        _ => return None,
    };
    Some(entry)
}

fn assignment_op_for_token(token: Token) -> Option<BinaryOp> {
    match token {
        Token::Symbol(b'=') => Some(BinaryOp::Assign),
        Token::PlusEqual => Some(BinaryOp::AddAssign),
        Token::MinusEqual => Some(BinaryOp::SubAssign),
        Token::TimesEqual => Some(BinaryOp::MulAssign),
        Token::DivideEqual => Some(BinaryOp::DivAssign),
        _ => None,
    }
}

impl<'a, 's> ExpressionParsing<'a, 's> for Parser<'a, 's> {
    fn parse_expression(&mut self) -> Option<ExprId<'a>> {
        let lhs = self.parse_binary_expression(0)?;

        let Some(op) = assignment_op_for_token(self.tokenizer.token()) else {
            return Some(lhs);
        };
        self.tokenizer.next();

        let (file, line) = self.file_line();
        let rhs = self.parse_expression()?;

        let lhs_ty = self.tree.expression(lhs).ty;
        if !self.check_type_cast(rhs, &lhs_ty) {
            return None;
        }

        let mut ty = lhs_ty;
        ty.flags = ty.flags.without(TypeFlags::CONST);
        Some(self.tree.add_expression(
            file,
            line,
            ty,
            ExpressionKind::Binary {
                op,
                left: lhs,
                right: rhs,
            },
        ))
    }

    fn parse_binary_expression(&mut self, priority: u32) -> Option<ExprId<'a>> {
        let mut lhs = self.parse_terminal_expression()?;

        loop {
            if priority < 1 && self.accept(Token::Symbol(b'?')) {
                let (file, line) = self.file_line();
                if !self.check_type_cast(lhs, &Type::new(BaseType::Bool)) {
                    return None;
                }
                let if_true = self.parse_binary_expression(0)?;
                if !self.expect(Token::Symbol(b':')) {
                    return None;
                }
                let if_false = self.parse_binary_expression(0)?;

                let true_ty = self.tree.expression(if_true).ty;
                if !self.check_type_cast(if_false, &true_ty) {
                    return None;
                }
                let false_ty = self.tree.expression(if_false).ty;
                let mut ty = true_ty;
                if !(true_ty.is_const() && false_ty.is_const()) {
                    ty.flags = ty.flags.without(TypeFlags::CONST);
                }
                lhs = self.tree.add_expression(
                    file,
                    line,
                    ty,
                    ExpressionKind::Conditional {
                        condition: lhs,
                        if_true,
                        if_false,
                    },
                );
                continue;
            }

            let Some((op, op_priority)) = binary_op_for_token(self.tokenizer.token()) else {
                break;
            };
            if op_priority <= priority {
                break;
            }
            self.tokenizer.next();

            let (file, line) = self.file_line();
            let rhs = self.parse_binary_expression(op_priority)?;

            let lhs_ty = self.tree.expression(lhs).ty;
            let rhs_ty = self.tree.expression(rhs).ty;
            let Some(ty) = crate::types::binary_op_result_type(op, &lhs_ty, &rhs_ty) else {
                let message = format!(
                    "Invalid operands '{}' and '{}' to binary expression",
                    type_description(&self.tree, &lhs_ty),
                    type_description(&self.tree, &rhs_ty)
                );
                self.error(message);
                return None;
            };

            lhs = self.tree.add_expression(
                file,
                line,
                ty,
                ExpressionKind::Binary {
                    op,
                    left: lhs,
                    right: rhs,
                },
            );
        }

        Some(lhs)
    }

    fn parse_terminal_expression(&mut self) -> Option<ExprId<'a>> {
        let (file, line) = self.file_line();

        // Prefix unary operators bind to the following terminal.
        let unary_op = match self.tokenizer.token() {
            Token::Symbol(b'-') => Some(UnaryOp::Negative),
            Token::Symbol(b'+') => Some(UnaryOp::Positive),
            Token::Symbol(b'!') => Some(UnaryOp::Not),
            Token::Symbol(b'~') => Some(UnaryOp::BitNot),
            Token::PlusPlus => Some(UnaryOp::PreIncrement),
            Token::MinusMinus => Some(UnaryOp::PreDecrement),
            _ => None,
        };
        if let Some(op) = unary_op {
            self.tokenizer.next();
            let operand = self.parse_terminal_expression()?;
            let operand_ty = self.tree.expression(operand).ty;

            if op == UnaryOp::BitNot && !operand_ty.base.is_integer() {
                let message = format!(
                    "Invalid operand '{}' to unary '~'",
                    type_description(&self.tree, &operand_ty)
                );
                self.error(message);
                return None;
            }
            if !operand_ty.base.is_numeric() {
                let message = format!(
                    "Invalid operand '{}' to unary expression",
                    type_description(&self.tree, &operand_ty)
                );
                self.error(message);
                return None;
            }

            let mut ty = operand_ty;
            if matches!(op, UnaryOp::PreIncrement | UnaryOp::PreDecrement) {
                ty.flags = ty.flags.without(TypeFlags::CONST);
            }
            return Some(self.tree.add_expression(
                file,
                line,
                ty,
                ExpressionKind::Unary { op, operand },
            ));
        }

        let mut expression = self.parse_primary_expression(file, line)?;

        // Postfix suffixes: ++ -- .field [index]
        loop {
            let (file, line) = self.file_line();
            if self.accept(Token::PlusPlus) {
                let operand_ty = self.tree.expression(expression).ty;
                let mut ty = operand_ty;
                ty.flags = ty.flags.without(TypeFlags::CONST);
                expression = self.tree.add_expression(
                    file,
                    line,
                    ty,
                    ExpressionKind::Unary {
                        op: UnaryOp::PostIncrement,
                        operand: expression,
                    },
                );
            } else if self.accept(Token::MinusMinus) {
                let operand_ty = self.tree.expression(expression).ty;
                let mut ty = operand_ty;
                ty.flags = ty.flags.without(TypeFlags::CONST);
                expression = self.tree.add_expression(
                    file,
                    line,
                    ty,
                    ExpressionKind::Unary {
                        op: UnaryOp::PostDecrement,
                        operand: expression,
                    },
                );
            } else if self.accept(Token::Symbol(b'.')) {
                let field = self.expect_any_identifier()?;
                let object_ty = self.tree.expression(expression).ty;
                let (ty, swizzle) = self.resolve_member_access(&object_ty, field)?;
                expression = self.tree.add_expression(
                    file,
                    line,
                    ty,
                    ExpressionKind::MemberAccess {
                        object: expression,
                        field,
                        swizzle,
                    },
                );
            } else if self.accept(Token::Symbol(b'[')) {
                let index = self.parse_expression()?;
                if !self.expect(Token::Symbol(b']')) {
                    return None;
                }
                let object_ty = self.tree.expression(expression).ty;
                let ty = self.resolve_index_access(&object_ty)?;
                expression = self.tree.add_expression(
                    file,
                    line,
                    ty,
                    ExpressionKind::ArrayAccess {
                        array: expression,
                        index,
                    },
                );
            } else {
                break;
            }
        }

        Some(expression)
    }

    fn parse_expression_list(&mut self, end: u8) -> Option<(Option<ExprId<'a>>, u32)> {
        if self.accept(Token::Symbol(end)) {
            return Some((None, 0));
        }
        let mut first = None;
        let mut last: Option<ExprId<'a>> = None;
        let mut count = 0u32;
        loop {
            let expression = self.parse_expression()?;
            match last {
                Some(previous) => self.tree.expression_mut(previous).next = Some(expression),
                None => first = Some(expression),
            }
            last = Some(expression);
            count += 1;
            if self.accept(Token::Symbol(end)) {
                break;
            }
            if !self.expect(Token::Symbol(b',')) {
                return None;
            }
        }
        Some((first, count))
    }

    fn parse_sampler_state_expression(&mut self) -> Option<ExprId<'a>> {
        let (file, line) = self.file_line();
        if !self.expect(Token::Keyword(Keyword::SamplerStateBlock)) {
            return None;
        }
        if !self.expect(Token::Symbol(b'{')) {
            return None;
        }
        let (state_assignments, num_state_assignments) = self.parse_state_assignments(true)?;
        Some(self.tree.add_expression(
            file,
            line,
            Type::new(BaseType::SamplerState),
            ExpressionKind::SamplerState {
                num_state_assignments,
                state_assignments,
            },
        ))
    }
}

impl<'a, 's> Parser<'a, 's> {
    fn parse_primary_expression(
        &mut self,
        file: crate::strings::InternedStr<'a>,
        line: u32,
    ) -> Option<ExprId<'a>> {
        // Parenthesized expression or C-style cast.
        if self.accept(Token::Symbol(b'(')) {
            if let Some(mut ty) = self.accept_type(false) {
                if !self.expect(Token::Symbol(b')')) {
                    return None;
                }
                let operand = self.parse_terminal_expression()?;
                if self.tree.expression(operand).ty.is_const() {
                    ty.flags |= TypeFlags::CONST;
                }
                return Some(self.tree.add_expression(
                    file,
                    line,
                    ty,
                    ExpressionKind::Cast { operand },
                ));
            }
            let expression = self.parse_expression()?;
            if !self.expect(Token::Symbol(b')')) {
                return None;
            }
            return Some(expression);
        }

        // Literals.
        match self.tokenizer.token() {
            Token::IntLiteral => {
                let value = self.tokenizer.int_value();
                self.tokenizer.next();
                return Some(self.tree.add_expression(
                    file,
                    line,
                    Type::with_flags(BaseType::Int, TypeFlags::CONST),
                    ExpressionKind::Literal(Literal::Int(value)),
                ));
            }
            Token::FloatLiteral => {
                let value = self.tokenizer.float_value();
                self.tokenizer.next();
                return Some(self.tree.add_expression(
                    file,
                    line,
                    Type::with_flags(BaseType::Float, TypeFlags::CONST),
                    ExpressionKind::Literal(Literal::Float(value)),
                ));
            }
            Token::HalfLiteral => {
                let value = self.tokenizer.float_value();
                self.tokenizer.next();
                return Some(self.tree.add_expression(
                    file,
                    line,
                    Type::with_flags(BaseType::Half, TypeFlags::CONST),
                    ExpressionKind::Literal(Literal::Half(value)),
                ));
            }
            Token::Keyword(Keyword::True) => {
                self.tokenizer.next();
                return Some(self.tree.add_expression(
                    file,
                    line,
                    Type::with_flags(BaseType::Bool, TypeFlags::CONST),
                    ExpressionKind::Literal(Literal::Bool(true)),
                ));
            }
            Token::Keyword(Keyword::False) => {
                self.tokenizer.next();
                return Some(self.tree.add_expression(
                    file,
                    line,
                    Type::with_flags(BaseType::Bool, TypeFlags::CONST),
                    ExpressionKind::Literal(Literal::Bool(false)),
                ));
            }
            Token::Keyword(Keyword::SamplerStateBlock) => {
                return self.parse_sampler_state_expression();
            }
            _ => {}
        }

        // Constructor: a type name followed by an argument list.
        if let Some(mut ty) = self.accept_type(false) {
            if !self.expect(Token::Symbol(b'(')) {
                return None;
            }
            let (argument, _count) = self.parse_expression_list(b')')?;

            let mut all_const = true;
            let mut walk = argument;
            while let Some(id) = walk {
                let expression = self.tree.expression(id);
                all_const &= expression.ty.is_const();
                walk = expression.next;
            }
            if all_const {
                ty.flags |= TypeFlags::CONST;
            }
            return Some(self.tree.add_expression(
                file,
                line,
                ty,
                ExpressionKind::Constructor { argument },
            ));
        }

        // Identifier: a function call or a variable reference.
        if self.tokenizer.token() == Token::Identifier {
            let name = self.tree.add_string(self.tokenizer.identifier());
            self.tokenizer.next();

            if self.accept(Token::Symbol(b'(')) {
                let (argument, num_arguments) = self.parse_expression_list(b')')?;
                return self.resolve_function_call(name, argument, num_arguments, file, line);
            }

            return match self.find_variable(name) {
                Some((ty, global)) => Some(self.tree.add_expression(
                    file,
                    line,
                    ty,
                    ExpressionKind::Identifier { name, global },
                )),
                None => {
                    self.error(format!("Undeclared identifier '{}'", name));
                    None
                }
            };
        }

        let message = format!(
            "Syntax error: expected expression near '{}'",
            self.tokenizer.token_name()
        );
        self.error(message);
        None
    }
}
