use std::fmt;
use std::fmt::Write;

/// A descriptor set shared by a record type. Descriptor identity is pointer
/// identity, so sets are expected to live in `static` tables.
pub type Descriptors<R> = &'static [VarDescriptor<R>];

/// Reads a string field out of the record. `None` renders as nothing and
/// counts as empty.
pub type StrFn<R> = for<'r> fn(&'r R) -> Option<&'r str>;
pub type IntFn<R> = fn(&R) -> i64;
pub type DoubleFn<R> = fn(&R) -> f64;
/// Formats a field straight into the output buffer.
pub type AppendFn<R> = fn(&R, &mut String);
pub type IsEmptyFn<R> = fn(&R) -> bool;
/// Spawns a fresh generator bound to the record for one loop.
pub type GeneratorFn<R> = fn(&mut R) -> Box<dyn Generator<R>>;

/// A resumable producer driving `{{#var}}` loops.
///
/// Each call to `next` either makes the next item addressable through the
/// record and returns `true`, or returns `false` once exhausted. Calling
/// `next` again after exhaustion must keep returning `false`. `close` runs
/// when a negated loop skips its body, so a generator that was advanced but
/// never drained can release whatever it holds.
pub trait Generator<R> {
    fn next(&mut self, record: &mut R) -> bool;

    fn close(&mut self, record: &mut R) {
        let _ = record;
    }
}

/// How a variable reads from the record and formats itself. Each kind
/// carries its own accessor, formatting, and emptiness rules.
pub enum VarKind<R: 'static> {
    /// A string field; the only kind `{{{var}}}` accepts.
    Str(StrFn<R>),
    /// Rendered in plain decimal; empty when 0.
    Int(IntFn<R>),
    /// Rendered with 6 fractional digits; empty when ±0.0.
    Double(DoubleFn<R>),
    /// Caller-defined formatting and emptiness.
    Custom {
        append: AppendFn<R>,
        is_empty: IsEmptyFn<R>,
    },
    /// An iterable field backing `{{#var}}`; `list_desc` is the descriptor
    /// set visible inside the loop body.
    Iter {
        generator: GeneratorFn<R>,
        list_desc: Descriptors<R>,
    },
}

impl<R: 'static> Clone for VarKind<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: 'static> Copy for VarKind<R> {}

/// Metadata about one caller field exposed to templates.
pub struct VarDescriptor<R: 'static> {
    pub name: &'static str,
    pub kind: VarKind<R>,
}

impl<R: 'static> Clone for VarDescriptor<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: 'static> Copy for VarDescriptor<R> {}

impl<R: 'static> fmt::Debug for VarDescriptor<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "VarDescriptor({})", self.name)
    }
}

impl<R: 'static> VarDescriptor<R> {
    pub const fn string(name: &'static str, get: StrFn<R>) -> VarDescriptor<R> {
        VarDescriptor {
            name,
            kind: VarKind::Str(get),
        }
    }

    pub const fn int(name: &'static str, get: IntFn<R>) -> VarDescriptor<R> {
        VarDescriptor {
            name,
            kind: VarKind::Int(get),
        }
    }

    pub const fn double(name: &'static str, get: DoubleFn<R>) -> VarDescriptor<R> {
        VarDescriptor {
            name,
            kind: VarKind::Double(get),
        }
    }

    pub const fn custom(
        name: &'static str,
        append: AppendFn<R>,
        is_empty: IsEmptyFn<R>,
    ) -> VarDescriptor<R> {
        VarDescriptor {
            name,
            kind: VarKind::Custom { append, is_empty },
        }
    }

    pub const fn list(
        name: &'static str,
        generator: GeneratorFn<R>,
        list_desc: Descriptors<R>,
    ) -> VarDescriptor<R> {
        VarDescriptor {
            name,
            kind: VarKind::Iter {
                generator,
                list_desc,
            },
        }
    }

    /// Formats the field into the output buffer. String variables are
    /// rewritten to specialized chunks at link time, so this handles the
    /// scalar kinds.
    pub(crate) fn append_value(&self, record: &R, buf: &mut String) {
        match self.kind {
            VarKind::Str(get) => {
                if let Some(s) = get(record) {
                    buf.push_str(s);
                }
            }
            VarKind::Int(get) => {
                let _ = write!(buf, "{}", get(record));
            }
            VarKind::Double(get) => {
                let _ = write!(buf, "{:.6}", get(record));
            }
            VarKind::Custom { append, .. } => append(record, buf),
            VarKind::Iter { .. } => {}
        }
    }

    pub(crate) fn is_empty(&self, record: &R) -> bool {
        match self.kind {
            VarKind::Str(get) => get(record).map_or(true, str::is_empty),
            VarKind::Int(get) => get(record) == 0,
            VarKind::Double(get) => get(record) == 0.0,
            VarKind::Custom { is_empty, .. } => is_empty(record),
            VarKind::Iter { .. } => true,
        }
    }

    pub(crate) fn str_getter(&self) -> Option<StrFn<R>> {
        match self.kind {
            VarKind::Str(get) => Some(get),
            _ => None,
        }
    }

    pub(crate) fn is_iterable(&self) -> bool {
        matches!(self.kind, VarKind::Iter { .. })
    }

    pub(crate) fn list_desc(&self) -> Option<Descriptors<R>> {
        match self.kind {
            VarKind::Iter { list_desc, .. } => Some(list_desc),
            _ => None,
        }
    }

    pub(crate) fn spawn_generator(&self, record: &mut R) -> Option<Box<dyn Generator<R>>> {
        match self.kind {
            VarKind::Iter { generator, .. } => Some(generator(record)),
            _ => None,
        }
    }
}
