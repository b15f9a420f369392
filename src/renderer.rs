use log::warn;

use crate::chunk::Op;
use crate::descriptor::Generator;
use crate::template::Template;
use crate::utils::escape_html;

/// Marks the chunk at which a recursive frame hands control back to its
/// caller.
#[derive(Clone, Copy, PartialEq)]
enum ReturnMarker {
    /// Run until `Last`.
    Finish,
    /// A conditional body; return at the close chunk with this index.
    CondEnd(usize),
    /// An iteration body; return at the close chunk paired with this open
    /// index.
    IterBody(usize),
}

/// Walks the chunk program, appending rendered output. Conditional and loop
/// bodies run in recursive frames; each frame owns at most one active
/// generator.
pub struct Renderer<'t, 's, R: 'static> {
    template: &'t Template<'s, R>,
}

impl<'t, 's, R: 'static> Renderer<'t, 's, R> {
    pub fn new(template: &'t Template<'s, R>) -> Renderer<'t, 's, R> {
        Renderer { template }
    }

    pub fn render(&self, record: &mut R, buf: &mut String) {
        self.run(0, ReturnMarker::Finish, record, buf);
    }

    /// Dispatch loop. Returns the index of the chunk that ended the frame:
    /// the caller's return marker, or `Last`.
    fn run(&self, start: usize, marker: ReturnMarker, record: &mut R, buf: &mut String) -> usize {
        let chunks = self.template.chunks();
        let mut generator: Option<Box<dyn Generator<R>>> = None;
        let mut i = start;

        loop {
            let chunk = &chunks[i];
            match chunk.op {
                Op::Append(ref text) => {
                    buf.push_str(text);
                    i += 1;
                }
                Op::AppendChar(c) => {
                    buf.push(c);
                    i += 1;
                }
                Op::Variable(descriptor) => {
                    descriptor.append_value(record, buf);
                    i += 1;
                }
                Op::VariableStr(get) => {
                    if let Some(s) = get(record) {
                        buf.push_str(s);
                    }
                    i += 1;
                }
                Op::VariableStrEscape(get) => {
                    if let Some(s) = get(record) {
                        escape_html(s, buf);
                    }
                    i += 1;
                }
                Op::CondOpen { descriptor, end } => {
                    let mut empty = descriptor.is_empty(record);
                    if chunk.flags.negate {
                        empty = !empty;
                    }
                    if empty {
                        i = end + 1;
                    } else {
                        let stopped = self.run(i + 1, ReturnMarker::CondEnd(end), record, buf);
                        i = stopped + 1;
                    }
                }
                Op::CondClose { .. } => {
                    if marker == ReturnMarker::CondEnd(i) {
                        return i;
                    }
                    i += 1;
                }
                Op::ApplyTpl(ref template) => {
                    let nested = template.apply(record);
                    buf.push_str(&nested);
                    i += 1;
                }
                Op::IterOpen { descriptor, after } => {
                    let mut fresh = match descriptor.spawn_generator(record) {
                        Some(spawned) => spawned,
                        None => {
                            warn!("variable `{}` has no generator", descriptor.name);
                            i = after;
                            continue;
                        }
                    };
                    let negate = chunk.flags.negate;
                    let mut available = fresh.next(record);
                    if negate {
                        available = !available;
                    }
                    if !available {
                        // The negated loop skipped its body because items
                        // exist; give the generator a chance to release them.
                        if negate {
                            fresh.close(record);
                        }
                        i = after;
                        continue;
                    }
                    generator = Some(fresh);
                    i = self.run(i + 1, ReturnMarker::IterBody(i), record, buf);
                }
                Op::IterClose { open } => {
                    if marker == ReturnMarker::IterBody(open) {
                        return i;
                    }
                    match generator.take() {
                        Some(mut active) => {
                            if active.next(record) {
                                generator = Some(active);
                                i = self.run(open + 1, ReturnMarker::IterBody(open), record, buf);
                            } else {
                                i += 1;
                            }
                        }
                        None => {
                            if !chunk.flags.negate {
                                warn!("no generator active when finishing iteration");
                            }
                            i += 1;
                        }
                    }
                }
                Op::Last => return i,
            }
        }
    }
}
