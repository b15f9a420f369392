//! Logic-less `{{mustache}}`-style templates compiled to a flat chunk
//! program.
//!
//! A template is compiled once into a small instruction sequence, then
//! rendered any number of times against a caller-supplied record. Variables
//! are described up front by a static table of [`VarDescriptor`]s mapping
//! template names to typed accessors on the record; there is no expression
//! language, no filters, and nothing is resolved at render time.
//!
//! # Syntax
//!
//! | Form | Meaning |
//! |---|---|
//! | `{{var}}` | substitute `var` (strings unescaped) |
//! | `{{{var}}}` | substitute a string variable, HTML-escaped |
//! | `{{#var}} … {{/var}}` | iterate, body once per yielded item |
//! | `{{^#var}} … {{/var}}` | negated iteration, body when there are no items |
//! | `{{var?}} … {{/var?}}` | conditional, body iff `var` is not empty |
//! | `{{^var?}} … {{/var?}}` | inverted conditional |
//! | `{{> name}}` | compile-time inclusion of the template file `name` |
//! | `{{! … }}` | comment, dropped (balanced inner braces allowed) |
//!
//! # Example
//!
//! ```
//! use stencil::{Template, VarDescriptor};
//!
//! struct Greeting {
//!     name: String,
//! }
//!
//! fn name(g: &Greeting) -> Option<&str> {
//!     Some(&g.name)
//! }
//!
//! static VARS: [VarDescriptor<Greeting>; 1] = [VarDescriptor::string("name", name)];
//!
//! # fn main() -> stencil::Result<()> {
//! let template = Template::compile_string("hello {{name}}", &VARS)?;
//! let mut greeting = Greeting { name: "world".to_string() };
//! assert_eq!(template.apply(&mut greeting), "hello world");
//! # Ok(())
//! # }
//! ```

mod chunk;
mod descriptor;
mod errors;
mod lexer;
mod parser;
mod renderer;
mod symtab;
mod template;
mod utils;

pub use crate::descriptor::{
    AppendFn, Descriptors, DoubleFn, Generator, GeneratorFn, IntFn, IsEmptyFn, StrFn,
    VarDescriptor, VarKind,
};
pub use crate::errors::{Error, ErrorKind, Result};
pub use crate::template::{CompileFlags, Template};
