use std::borrow::Cow;
use std::ptr;

use log::error;

use crate::descriptor::{StrFn, VarDescriptor};
use crate::errors::{Error, Result};
use crate::template::Template;

/// Placeholder for a jump index the linker has not filled in yet.
pub const UNLINKED: usize = usize::MAX;

/// Modifier flags attached to a chunk while parsing. `negate` survives into
/// the linked program (inverted conditionals and iterations); `quote` only
/// drives the string specialization at link time.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Flags {
    pub negate: bool,
    pub quote: bool,
}

/// One instruction of the compiled template program, payload included.
pub enum Op<'s, R: 'static> {
    /// Append a literal run of text.
    Append(Cow<'s, str>),
    /// Append a single byte of text.
    AppendChar(char),
    /// Append a scalar variable through its descriptor.
    Variable(&'static VarDescriptor<R>),
    /// Append a string field verbatim.
    VariableStr(StrFn<R>),
    /// Append a string field HTML-escaped.
    VariableStrEscape(StrFn<R>),
    /// `{{var?}}`; `end` is the index of the matching `CondClose`.
    CondOpen {
        descriptor: &'static VarDescriptor<R>,
        end: usize,
    },
    CondClose {
        descriptor: &'static VarDescriptor<R>,
    },
    /// `{{#var}}`; `after` is the index one past the matching `IterClose`.
    IterOpen {
        descriptor: &'static VarDescriptor<R>,
        after: usize,
    },
    /// `{{/var}}`; `open` is the index of the matching `IterOpen`.
    IterClose { open: usize },
    /// Render a compiled partial.
    ApplyTpl(Box<Template<'s, R>>),
    /// Program terminator; always the final chunk.
    Last,
}

pub struct Chunk<'s, R: 'static> {
    pub op: Op<'s, R>,
    pub flags: Flags,
}

impl<'s, R: 'static> std::fmt::Debug for Op<'s, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Op::Append(text) => write!(f, "Append({:?})", text),
            Op::AppendChar(c) => write!(f, "AppendChar({:?})", c),
            Op::Variable(descriptor) => write!(f, "Variable({:?})", descriptor),
            Op::VariableStr(_) => write!(f, "VariableStr"),
            Op::VariableStrEscape(_) => write!(f, "VariableStrEscape"),
            Op::CondOpen { descriptor, end } => {
                write!(f, "CondOpen {{ descriptor: {:?}, end: {} }}", descriptor, end)
            }
            Op::CondClose { descriptor } => write!(f, "CondClose {{ descriptor: {:?} }}", descriptor),
            Op::IterOpen { descriptor, after } => {
                write!(f, "IterOpen {{ descriptor: {:?}, after: {} }}", descriptor, after)
            }
            Op::IterClose { open } => write!(f, "IterClose {{ open: {} }}", open),
            Op::ApplyTpl(template) => write!(f, "ApplyTpl({:?})", template),
            Op::Last => write!(f, "Last"),
        }
    }
}

impl<'s, R: 'static> std::fmt::Debug for Chunk<'s, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Chunk {{ op: {:?}, flags: {:?} }}", self.op, self.flags)
    }
}

impl<'s, R: 'static> Chunk<'s, R> {
    pub fn new(op: Op<'s, R>, flags: Flags) -> Chunk<'s, R> {
        Chunk { op, flags }
    }

    /// Copies any text borrowed from the template source so the chunk can
    /// outlive it.
    pub fn into_owned(self) -> Chunk<'static, R> {
        let op = match self.op {
            Op::Append(text) => Op::Append(Cow::Owned(text.into_owned())),
            Op::AppendChar(c) => Op::AppendChar(c),
            Op::Variable(descriptor) => Op::Variable(descriptor),
            Op::VariableStr(get) => Op::VariableStr(get),
            Op::VariableStrEscape(get) => Op::VariableStrEscape(get),
            Op::CondOpen { descriptor, end } => Op::CondOpen { descriptor, end },
            Op::CondClose { descriptor } => Op::CondClose { descriptor },
            Op::IterOpen { descriptor, after } => Op::IterOpen { descriptor, after },
            Op::IterClose { open } => Op::IterClose { open },
            Op::ApplyTpl(template) => Op::ApplyTpl(Box::new(template.into_owned())),
            Op::Last => Op::Last,
        };
        Chunk {
            op,
            flags: self.flags,
        }
    }
}

/// Post-processing pass over a freshly parsed program: link control-flow
/// chunks by index and specialize variable chunks by descriptor kind.
pub fn link<R: 'static>(chunks: &mut [Chunk<'_, R>]) -> Result<()> {
    let mut i = 0;
    while i < chunks.len() {
        match chunks[i].op {
            Op::CondOpen { descriptor, .. } => {
                if descriptor.is_iterable() {
                    return Err(Error::msg(format!(
                        "Variable `{}` cannot be tested for emptiness",
                        descriptor.name
                    )));
                }
                let close = find_cond_close(chunks, i, descriptor)?;
                if let Op::CondOpen { ref mut end, .. } = chunks[i].op {
                    *end = close;
                }
            }
            Op::IterOpen { .. } => {
                let close = find_iter_close(chunks, i)?;
                let open_flags = chunks[i].flags;
                chunks[close].flags.negate |= open_flags.negate;
                chunks[close].flags.quote |= open_flags.quote;
                if let Op::IterOpen { ref mut after, .. } = chunks[i].op {
                    *after = close + 1;
                }
            }
            Op::Variable(descriptor) => {
                let quote = chunks[i].flags.quote;
                if let Some(get) = descriptor.str_getter() {
                    chunks[i].op = if quote {
                        Op::VariableStrEscape(get)
                    } else {
                        Op::VariableStr(get)
                    };
                } else if quote {
                    return Err(Error::msg("Variable must be string to be escaped"));
                } else if descriptor.is_iterable() {
                    return Err(Error::msg(format!(
                        "Invalid variable descriptor: `{}`",
                        descriptor.name
                    )));
                }
            }
            Op::Last => break,
            _ => {}
        }
        i += 1;
    }

    Ok(())
}

fn find_cond_close<R: 'static>(
    chunks: &[Chunk<'_, R>],
    open: usize,
    descriptor: &'static VarDescriptor<R>,
) -> Result<usize> {
    for (j, chunk) in chunks.iter().enumerate().skip(open + 1) {
        match chunk.op {
            Op::CondClose {
                descriptor: close_descriptor,
            } if ptr::eq(close_descriptor, descriptor) => return Ok(j),
            Op::Last => break,
            _ => {}
        }
    }

    error!("could not find the conditional close chunk for `{}`", descriptor.name);
    Err(Error::msg(format!(
        "Internal error: could not find the end of conditional `{}`",
        descriptor.name
    )))
}

fn find_iter_close<R: 'static>(chunks: &[Chunk<'_, R>], open: usize) -> Result<usize> {
    for (j, chunk) in chunks.iter().enumerate().skip(open + 1) {
        match chunk.op {
            Op::IterClose { open: o } if o == open => return Ok(j),
            Op::Last => break,
            _ => {}
        }
    }

    error!("could not find the iteration close chunk for index {}", open);
    Err(Error::msg(
        "Internal error: could not find the end of iteration",
    ))
}
