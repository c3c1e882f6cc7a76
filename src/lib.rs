//! Front-end compiler for HLSL-family shading languages.
//!
//! Source text is tokenized, parsed and semantically analyzed in one pass,
//! producing a tree in which every expression carries its resolved type,
//! every call its resolved overload, and constant subexpressions fold on
//! demand. The tree can then be transformed in place (pruning, sorting,
//! parameter grouping, expression flattening, alpha-test emulation) or
//! serialized to a JSON descriptor.
//!
//! ```
//! use bumpalo::Bump;
//! use hlslparser::{parse, StringPool};
//!
//! let bump = Bump::new();
//! let pool = StringPool::new(&bump);
//! let tree = parse(&pool, "example.hlsl", "float4 tint;").unwrap();
//! assert!(tree.find_global_declaration("tint").is_some());
//! ```

pub mod arena;
pub mod ast;
pub mod descriptor;
pub mod error;
pub mod intrinsics;
pub mod parser;
pub mod passes;
pub mod states;
pub mod strings;
pub mod token;
pub mod tokenizer;
pub mod types;
pub mod visitor;

pub use arena::{Arena, Id};
pub use ast::{Callee, Expression, ExpressionKind, Statement, StatementKind, Tree};
pub use error::ParseError;
pub use parser::{parse, Parser};
pub use passes::{
    emulate_alpha_test, flatten_expressions, group_parameters, hide_unused_arguments, prune_tree,
    sort_tree,
};
pub use strings::{InternedStr, StringPool};
pub use token::{Keyword, Token};
pub use tokenizer::Tokenizer;
pub use types::{BaseType, Type, TypeFlags};
pub use visitor::Visitor;
