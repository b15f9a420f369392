use std::fmt;
use std::fs;
use std::path::Path;

use crate::chunk::{Chunk, Op};
use crate::descriptor::Descriptors;
use crate::errors::Result;
use crate::parser::Parser;
use crate::renderer::Renderer;

/// Compile-time options.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CompileFlags {
    /// Text chunks borrow from the source instead of copying it; the source
    /// must then outlive the template.
    pub const_template: bool,
}

/// A compiled template: the linked chunk program plus a presizing hint for
/// the output buffer. `R` is the record type descriptors read from; `'s` is
/// the source lifetime for const-compiled templates (`'static` otherwise).
pub struct Template<'s, R: 'static> {
    chunks: Vec<Chunk<'s, R>>,
    minimum_size: usize,
}

impl<R: 'static> Template<'static, R> {
    /// Compiles an in-memory source, copying template text into the
    /// program.
    pub fn compile_string(
        source: &str,
        descriptors: Descriptors<R>,
    ) -> Result<Template<'static, R>> {
        Template::compile_string_full(source, descriptors, CompileFlags::default())
            .map(Template::into_owned)
    }

    /// Loads a template file in one shot and compiles it. Partials named by
    /// the template resolve relative to the process working directory, and
    /// are not checked for cycles.
    pub fn compile_file<P: AsRef<Path>>(
        path: P,
        descriptors: Descriptors<R>,
    ) -> Result<Template<'static, R>> {
        let source = fs::read_to_string(path)?;
        Template::compile_string(&source, descriptors)
    }
}

impl<'s, R: 'static> Template<'s, R> {
    /// Compiles an in-memory source. With `const_template` set, text chunks
    /// share storage with `source`.
    pub fn compile_string_full(
        source: &'s str,
        descriptors: Descriptors<R>,
        flags: CompileFlags,
    ) -> Result<Template<'s, R>> {
        let (chunks, minimum_size) = Parser::new(source, descriptors, flags).parse()?;
        Ok(Template {
            chunks,
            minimum_size,
        })
    }

    /// Detaches the template from its source by copying any borrowed text.
    pub fn into_owned(self) -> Template<'static, R> {
        Template {
            chunks: self.chunks.into_iter().map(Chunk::into_owned).collect(),
            minimum_size: self.minimum_size,
        }
    }

    /// Renders into a fresh buffer.
    pub fn apply(&self, record: &mut R) -> String {
        let mut buf = String::new();
        self.apply_with_buffer(&mut buf, record);
        buf
    }

    /// Renders into a caller-owned buffer, which is reset and pre-grown to
    /// the template's minimum size first.
    pub fn apply_with_buffer(&self, buf: &mut String, record: &mut R) {
        buf.clear();
        buf.reserve(self.minimum_size);
        Renderer::new(self).render(record, buf);
    }

    /// Lower bound used to presize output buffers: the sum of literal text
    /// lengths plus a small per-variable reservation.
    pub fn minimum_size(&self) -> usize {
        self.minimum_size
    }

    pub(crate) fn chunks(&self) -> &[Chunk<'s, R>] {
        &self.chunks
    }

    #[cfg(test)]
    pub(crate) fn from_raw_parts(chunks: Vec<Chunk<'s, R>>, minimum_size: usize) -> Template<'s, R> {
        Template {
            chunks,
            minimum_size,
        }
    }
}

/// Lists the chunk program one instruction per line, nesting indented.
impl<'s, R: 'static> fmt::Debug for Template<'s, R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "template: {} chunks, minimum size {}",
            self.chunks.len(),
            self.minimum_size
        )?;

        let mut depth = 0usize;
        for (index, chunk) in self.chunks.iter().enumerate() {
            if let Op::IterClose { .. } | Op::CondClose { .. } = chunk.op {
                depth = depth.saturating_sub(1);
            }
            write!(f, "{:>4} {:width$}", index, "", width = depth * 2)?;
            match chunk.op {
                Op::Append(ref text) => write!(f, "APPEND [{}]", text)?,
                Op::AppendChar(c) => write!(f, "APPEND_CHAR [{:?}]", c)?,
                Op::Variable(descriptor) => write!(f, "APPEND_VAR [{}]", descriptor.name)?,
                Op::VariableStr(_) => write!(f, "APPEND_VAR_STR")?,
                Op::VariableStrEscape(_) => write!(f, "APPEND_VAR_STR_ESCAPE")?,
                Op::CondOpen { descriptor, end } => {
                    write!(f, "IF_VAR_NOT_EMPTY [{}] -> {}", descriptor.name, end)?;
                    depth += 1;
                }
                Op::CondClose { descriptor } => {
                    write!(f, "END_VAR_NOT_EMPTY [{}]", descriptor.name)?
                }
                Op::IterOpen { descriptor, after } => {
                    write!(f, "START_ITER [{}] -> {}", descriptor.name, after)?;
                    depth += 1;
                }
                Op::IterClose { open } => write!(f, "END_ITER [{}]", open)?,
                Op::ApplyTpl(_) => write!(f, "APPLY_TEMPLATE")?,
                Op::Last => write!(f, "LAST")?,
            }
            if chunk.flags.negate {
                write!(f, " NEG")?;
            }
            if chunk.flags.quote {
                write!(f, " QUOTE")?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}
