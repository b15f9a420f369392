use std::borrow::Cow;
use std::ptr;

use log::{debug, error};

use crate::chunk::{link, Chunk, Flags, Op, UNLINKED};
use crate::descriptor::{Descriptors, VarDescriptor};
use crate::errors::{Error, Result};
use crate::lexer::{Lexeme, LexemeKind, Lexer, LEXEME_MAX_LEN};
use crate::symtab::SymbolTable;
use crate::template::{CompileFlags, Template};

/// List of different states the parser can be in. Each state consumes one
/// lexeme and names the state that handles the next one.
enum ParserState {
    Text,
    Meta,
    Iter,
    Negate,
    Slash,
    Partial,
    RightMeta,
    Done,
}

/// Turns the lexeme stream into a flat chunk program, validating nesting
/// through the open-block stack and resolving identifiers through the
/// symbol table.
pub struct Parser<'s, R: 'static> {
    lexer: Lexer<'s>,
    descriptors: Descriptors<R>,
    symtab: SymbolTable<R>,
    flags: Flags,
    /// Open `#`/`?`/`^` identifiers, most recent last.
    stack: Vec<Lexeme<'s>>,
    chunks: Vec<Chunk<'s, R>>,
    minimum_size: usize,
    template_flags: CompileFlags,
}

impl<'s, R: 'static> Parser<'s, R> {
    pub fn new(
        source: &'s str,
        descriptors: Descriptors<R>,
        template_flags: CompileFlags,
    ) -> Parser<'s, R> {
        Parser {
            lexer: Lexer::new(source),
            descriptors,
            symtab: SymbolTable::new(),
            flags: Flags::default(),
            stack: vec![],
            chunks: vec![],
            minimum_size: 0,
            template_flags,
        }
    }

    /// Runs the parse loop to completion and returns the linked chunk
    /// program together with the output presizing hint.
    pub fn parse(mut self) -> Result<(Vec<Chunk<'s, R>>, usize)> {
        self.symtab.push_scope(self.descriptors);

        let mut state = ParserState::Text;
        let outcome = loop {
            if let ParserState::Done = state {
                break Ok(());
            }
            let lexeme = match self.next_lexeme() {
                Ok(lexeme) => lexeme,
                Err(e) => break Err(e),
            };
            match self.step(state, lexeme) {
                Ok(next) => state = next,
                Err(e) => break Err(e),
            }
        };

        self.shutdown(outcome)
    }

    fn step(&mut self, state: ParserState, lexeme: Lexeme<'s>) -> Result<ParserState> {
        match state {
            ParserState::Text => self.parse_text(lexeme),
            ParserState::Meta => self.parse_meta(lexeme),
            ParserState::Iter => self.parse_iter(lexeme),
            ParserState::Negate => self.parse_negate(lexeme),
            ParserState::Slash => self.parse_slash(lexeme),
            ParserState::Partial => self.parse_partial(lexeme),
            ParserState::RightMeta => self.parse_right_meta(lexeme),
            ParserState::Done => Ok(ParserState::Done),
        }
    }

    fn next_lexeme(&mut self) -> Result<Lexeme<'s>> {
        match self.lexer.next_lexeme() {
            Some(lexeme) => {
                if lexeme.kind == LexemeKind::Error {
                    Err(Error::msg(lexeme.value))
                } else {
                    Ok(lexeme)
                }
            }
            None => Err(Error::msg("unexpected end of lexeme stream")),
        }
    }

    fn emit(&mut self, op: Op<'s, R>, flags: Flags) {
        self.chunks.push(Chunk::new(op, flags));
    }

    fn unexpected(&self, lexeme: &Lexeme) -> Error {
        Error::msg(format!(
            "unexpected lexeme: {} [{}]",
            lexeme.kind,
            lexeme.text()
        ))
    }

    fn resolve(&self, lexeme: &Lexeme) -> Result<&'static VarDescriptor<R>> {
        let name = lexeme.text();
        if name.len() > LEXEME_MAX_LEN {
            return Err(Error::msg(format!(
                "Lexeme exceeds {} characters",
                LEXEME_MAX_LEN
            )));
        }
        self.symtab
            .lookup(name)
            .ok_or_else(|| Error::msg(format!("Unknown variable: {}", name)))
    }

    fn text_payload(&self, lexeme: Lexeme<'s>) -> Cow<'s, str> {
        if self.template_flags.const_template {
            lexeme.value
        } else {
            Cow::Owned(lexeme.value.into_owned())
        }
    }

    fn parse_text(&mut self, lexeme: Lexeme<'s>) -> Result<ParserState> {
        match lexeme.kind {
            LexemeKind::LeftMeta => Ok(ParserState::Meta),
            LexemeKind::Text => {
                self.minimum_size += lexeme.value.len();
                if let [b] = lexeme.value.as_bytes() {
                    let c = *b as char;
                    self.emit(Op::AppendChar(c), Flags::default());
                } else {
                    let payload = self.text_payload(lexeme);
                    self.emit(Op::Append(payload), Flags::default());
                }
                Ok(ParserState::Text)
            }
            LexemeKind::Eof => {
                self.emit(Op::Last, Flags::default());
                Ok(ParserState::Done)
            }
            _ => Err(self.unexpected(&lexeme)),
        }
    }

    fn parse_meta(&mut self, lexeme: Lexeme<'s>) -> Result<ParserState> {
        match lexeme.kind {
            LexemeKind::OpenCurlyBrace => {
                if self.flags.quote {
                    return Err(self.unexpected(&lexeme));
                }
                self.flags.quote = true;
                Ok(ParserState::Meta)
            }
            LexemeKind::Identifier => self.parse_identifier(lexeme),
            LexemeKind::GreaterThan => Ok(ParserState::Partial),
            LexemeKind::Hash => Ok(ParserState::Iter),
            LexemeKind::Hat => Ok(ParserState::Negate),
            LexemeKind::Slash => Ok(ParserState::Slash),
            _ => Err(self.unexpected(&lexeme)),
        }
    }

    /// An identifier was read inside an action; what follows decides whether
    /// it is a substitution or a conditional open.
    fn parse_identifier(&mut self, lexeme: Lexeme<'s>) -> Result<ParserState> {
        let mut next = self.next_lexeme()?;

        if self.flags.quote {
            if next.kind != LexemeKind::CloseCurlyBrace {
                return Err(Error::msg("Expecting closing brace"));
            }
            next = self.next_lexeme()?;
        }

        match next.kind {
            LexemeKind::RightMeta => {
                let descriptor = self.resolve(&lexeme)?;
                self.emit(Op::Variable(descriptor), self.flags);
                // A dangling negate is caught at shutdown, like a dangling
                // quote would be.
                self.flags.quote = false;
                self.minimum_size += lexeme.value.len() + 1;
                Ok(ParserState::Text)
            }
            LexemeKind::QuestionMark => {
                let descriptor = self.resolve(&lexeme)?;
                let flags = Flags {
                    negate: self.flags.negate,
                    quote: false,
                };
                self.emit(Op::CondOpen {
                    descriptor,
                    end: UNLINKED,
                }, flags);
                self.stack.push(lexeme);
                self.flags.negate = false;
                Ok(ParserState::RightMeta)
            }
            _ => Err(self.unexpected(&next)),
        }
    }

    fn parse_negate(&mut self, lexeme: Lexeme<'s>) -> Result<ParserState> {
        match lexeme.kind {
            LexemeKind::Hash => {
                self.flags.negate = !self.flags.negate;
                Ok(ParserState::Iter)
            }
            LexemeKind::Identifier => {
                self.flags.negate = !self.flags.negate;
                self.parse_identifier(lexeme)
            }
            _ => Err(self.unexpected(&lexeme)),
        }
    }

    fn parse_iter(&mut self, lexeme: Lexeme<'s>) -> Result<ParserState> {
        if lexeme.kind != LexemeKind::Identifier {
            return Err(self.unexpected(&lexeme));
        }
        let descriptor = self.resolve(&lexeme)?;
        let list_desc = descriptor.list_desc().ok_or_else(|| {
            Error::msg(format!(
                "Couldn't find descriptor for variable `{}`",
                lexeme.text()
            ))
        })?;
        self.symtab.push_scope(list_desc);
        let flags = Flags {
            negate: self.flags.negate,
            quote: false,
        };
        self.emit(Op::IterOpen {
            descriptor,
            after: UNLINKED,
        }, flags);
        self.stack.push(lexeme);
        self.flags.negate = false;
        Ok(ParserState::RightMeta)
    }

    fn parse_slash(&mut self, lexeme: Lexeme<'s>) -> Result<ParserState> {
        if lexeme.kind != LexemeKind::Identifier {
            return Err(self.unexpected(&lexeme));
        }
        let next = self.next_lexeme()?;
        match next.kind {
            LexemeKind::RightMeta => self.close_iter(lexeme),
            LexemeKind::QuestionMark => self.close_cond(lexeme),
            _ => Err(self.unexpected(&next)),
        }
    }

    /// Pops the block stack entry for a close tag; the open and close
    /// identifiers must be byte-identical.
    fn pop_matching(&mut self, lexeme: &Lexeme) -> Result<()> {
        let top = match self.stack.last() {
            Some(top) => top,
            None => {
                return Err(Error::msg(format!("unexpected {{{{/{}}}}}", lexeme.text())));
            }
        };
        if top.kind == LexemeKind::Identifier && top.text() == lexeme.text() {
            self.stack.pop();
            Ok(())
        } else {
            Err(Error::msg(format!(
                "expecting {} `{}` but found `{}`",
                top.kind,
                top.text(),
                lexeme.text()
            )))
        }
    }

    fn close_iter(&mut self, lexeme: Lexeme<'s>) -> Result<ParserState> {
        self.pop_matching(&lexeme)?;
        let descriptor = self.resolve(&lexeme)?;
        let open_index = self.chunks.iter().rposition(|chunk| match chunk.op {
            Op::IterOpen {
                descriptor: open, ..
            } => ptr::eq(open, descriptor),
            _ => false,
        });
        match open_index {
            Some(open) => {
                self.emit(Op::IterClose { open }, Flags::default());
                self.symtab.pop_scope();
                Ok(ParserState::Text)
            }
            None => Err(Error::msg(format!(
                "Could not find {{{{#{}}}}}",
                lexeme.text()
            ))),
        }
    }

    fn close_cond(&mut self, lexeme: Lexeme<'s>) -> Result<ParserState> {
        self.pop_matching(&lexeme)?;
        let descriptor = self.resolve(&lexeme)?;
        let found = self.chunks.iter().rev().any(|chunk| match chunk.op {
            Op::CondOpen {
                descriptor: open, ..
            } => ptr::eq(open, descriptor),
            _ => false,
        });
        if found {
            self.emit(Op::CondClose { descriptor }, Flags::default());
            Ok(ParserState::RightMeta)
        } else {
            Err(Error::msg(format!(
                "Could not find {{{{{}?}}}}",
                lexeme.text()
            )))
        }
    }

    /// Compiles the named template file against the top-level descriptor set
    /// and embeds it. No cycle detection: a template including itself
    /// recurses until the file system gives out.
    fn parse_partial(&mut self, lexeme: Lexeme<'s>) -> Result<ParserState> {
        if lexeme.kind != LexemeKind::Identifier {
            return Err(self.unexpected(&lexeme));
        }
        let filename = lexeme.text();
        match Template::compile_file(filename, self.descriptors) {
            Ok(template) => {
                self.emit(Op::ApplyTpl(Box::new(template)), Flags::default());
                Ok(ParserState::RightMeta)
            }
            Err(e) => Err(Error::chain(
                format!("Could not compile template `{}`", filename),
                e,
            )),
        }
    }

    fn parse_right_meta(&mut self, lexeme: Lexeme<'s>) -> Result<ParserState> {
        if lexeme.kind != LexemeKind::RightMeta {
            return Err(self.unexpected(&lexeme));
        }
        Ok(ParserState::Text)
    }

    /// Reports everything left hanging once the parse loop stops, then runs
    /// the linker on success.
    fn shutdown(mut self, outcome: Result<()>) -> Result<(Vec<Chunk<'s, R>>, usize)> {
        let mut outcome = outcome;

        for open in self.stack.drain(..).rev() {
            let message = format!("EOF while looking for matching {{{{/{}}}}}", open.text());
            error!("parser error: {}", message);
            if outcome.is_ok() {
                outcome = Err(Error::msg(message));
            }
        }

        self.symtab.pop_scope();
        if !self.symtab.is_empty() && outcome.is_ok() {
            error!("parser error: symbol table not empty when finishing parser");
            outcome = Err(Error::msg("Symbol table not empty when finishing parser"));
        }

        if self.flags.negate && outcome.is_ok() {
            outcome = Err(Error::msg("unmatched negation"));
        }
        if self.flags.quote && outcome.is_ok() {
            outcome = Err(Error::msg("unmatched quote"));
        }

        outcome?;

        link(&mut self.chunks)?;
        debug!("compiled template program with {} chunks", self.chunks.len());

        Ok((self.chunks, self.minimum_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Generator;

    struct Rec {
        greeting: String,
        count: i64,
        items: Vec<i64>,
        item: i64,
    }

    fn greeting(r: &Rec) -> Option<&str> {
        Some(&r.greeting)
    }

    fn count(r: &Rec) -> i64 {
        r.count
    }

    fn item(r: &Rec) -> i64 {
        r.item
    }

    struct Items {
        index: usize,
    }

    impl Generator<Rec> for Items {
        fn next(&mut self, record: &mut Rec) -> bool {
            match record.items.get(self.index) {
                Some(&value) => {
                    record.item = value;
                    self.index += 1;
                    true
                }
                None => false,
            }
        }
    }

    fn spawn_items(_: &mut Rec) -> Box<dyn Generator<Rec>> {
        Box::new(Items { index: 0 })
    }

    static ITEM_VARS: [VarDescriptor<Rec>; 1] = [VarDescriptor::int("item", item)];
    static VARS: [VarDescriptor<Rec>; 3] = [
        VarDescriptor::string("greeting", greeting),
        VarDescriptor::int("count", count),
        VarDescriptor::list("items", spawn_items, &ITEM_VARS),
    ];

    fn parse(source: &str) -> Result<(Vec<Chunk<'_, Rec>>, usize)> {
        Parser::new(source, &VARS, CompileFlags::default()).parse()
    }

    fn ops(source: &str) -> Vec<&'static str> {
        let (chunks, _) = parse(source).unwrap();
        chunks
            .iter()
            .map(|chunk| match chunk.op {
                Op::Append(_) => "append",
                Op::AppendChar(_) => "append_char",
                Op::Variable(_) => "variable",
                Op::VariableStr(_) => "variable_str",
                Op::VariableStrEscape(_) => "variable_str_escape",
                Op::CondOpen { .. } => "cond_open",
                Op::CondClose { .. } => "cond_close",
                Op::IterOpen { .. } => "iter_open",
                Op::IterClose { .. } => "iter_close",
                Op::ApplyTpl(_) => "apply_tpl",
                Op::Last => "last",
            })
            .collect()
    }

    #[test]
    fn test_text_and_variable_program() {
        assert_eq!(
            ops("hello {{greeting}}!"),
            vec!["append", "variable_str", "append_char", "last"]
        );
    }

    #[test]
    fn test_scalar_variable_stays_generic() {
        assert_eq!(ops("{{count}}"), vec!["variable", "last"]);
    }

    #[test]
    fn test_iteration_program_is_linked() {
        let (chunks, _) = parse("{{#items}}{{item}}{{/items}}x").unwrap();
        match chunks[0].op {
            Op::IterOpen { after, .. } => assert_eq!(after, 3),
            _ => panic!("expected IterOpen"),
        }
        match chunks[2].op {
            Op::IterClose { open } => assert_eq!(open, 0),
            _ => panic!("expected IterClose"),
        }
    }

    #[test]
    fn test_conditional_program_is_linked() {
        let (chunks, _) = parse("{{count?}}yes{{/count?}}").unwrap();
        match chunks[0].op {
            Op::CondOpen { end, .. } => assert_eq!(end, 2),
            _ => panic!("expected CondOpen"),
        }
    }

    #[test]
    fn test_negate_flag_reaches_the_open_chunk() {
        let (chunks, _) = parse("{{^#items}}{{/items}}").unwrap();
        assert!(chunks[0].flags.negate);
        // The parser flag is consumed by the open tag.
        let (chunks, _) = parse("{{^#items}}{{/items}}{{#items}}{{/items}}").unwrap();
        assert!(!chunks[2].flags.negate);
    }

    #[test]
    fn test_minimum_size_accounts_for_text_and_variables() {
        let (_, minimum_size) = parse("hello {{greeting}}!").unwrap();
        // "hello " + "!" = 7 bytes of text, plus len("greeting") + 1.
        assert_eq!(minimum_size, 7 + "greeting".len() + 1);
    }

    #[test]
    fn test_mismatched_close_tag() {
        let err = parse("{{#items}}{{/greeting}}").unwrap_err();
        assert_eq!(
            err.to_string(),
            "expecting IDENTIFIER `items` but found `greeting`"
        );
    }

    #[test]
    fn test_close_without_open() {
        let err = parse("{{/items}}").unwrap_err();
        assert_eq!(err.to_string(), "unexpected {{/items}}");
    }

    #[test]
    fn test_unknown_variable() {
        let err = parse("{{nope}}").unwrap_err();
        assert_eq!(err.to_string(), "Unknown variable: nope");
    }

    #[test]
    fn test_identifier_too_long() {
        let long = "x".repeat(LEXEME_MAX_LEN + 1);
        let err = parse(&format!("{{{{{}}}}}", long)).unwrap_err();
        assert_eq!(err.to_string(), "Lexeme exceeds 64 characters");
    }

    #[test]
    fn test_iterating_a_scalar() {
        let err = parse("{{#count}}{{/count}}").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Couldn't find descriptor for variable `count`"
        );
    }

    #[test]
    fn test_unclosed_block_at_eof() {
        let err = parse("{{#items}}never closed").unwrap_err();
        assert_eq!(
            err.to_string(),
            "EOF while looking for matching {{/items}}"
        );
    }

    #[test]
    fn test_dangling_negation() {
        let err = parse("{{^greeting}}").unwrap_err();
        assert_eq!(err.to_string(), "unmatched negation");
    }

    #[test]
    fn test_loop_scope_is_closed_after_the_loop() {
        let err = parse("{{#items}}{{/items}}{{item}}").unwrap_err();
        assert_eq!(err.to_string(), "Unknown variable: item");
    }

    #[test]
    fn test_shadowing_inside_loop() {
        // `item` resolves only inside the loop body.
        assert_eq!(
            ops("{{#items}}{{item}}{{/items}}"),
            vec!["iter_open", "variable", "iter_close", "last"]
        );
    }
}
