//! Statement parsing.
//!
//! Parsing runs directly over the source text with a [`Cursor`]. Each
//! construct has one function that returns `Ok(None)` when the input does
//! not start that construct, leaving the caller's cursor where it was.
//! Once a construct's leading keyword has been recognized, malformed input
//! is reported as a located [`ParseError`].
//!
//! Expressions live in `expr_parser`.

use std::sync::Arc;

use super::error::ParseError;
use super::include;
use super::object::{Class, FieldInit, Function};
use super::symbols::Symbols;
use crate::ast::{BinaryOp, Case, Node, NodeKind};
use crate::cursor::Cursor;
use crate::diagnostic::Span;
use crate::stack;

/// A parse result: the node and the cursor after it, or no match.
pub(crate) type Parsed<'s> = Result<Option<(Node, Cursor<'s>)>, ParseError>;

/// Words that never start a variable path.
pub(crate) const RESERVED: &[&str] = &[
    "if", "else", "while", "do", "for", "foreach", "in", "switch", "case", "default", "try", "return", "break",
    "continue", "throw", "class", "static", "function", "include", "include_live", "reload", "using", "persist",
    "new", "async", "await", "true", "false", "null", "as",
];

/// Parses a whole document. Classes and functions it declares are
/// registered with `symbols` as they are parsed.
pub fn parse_document(symbols: &Symbols, source: &str, template: bool) -> Result<Node, ParseError> {
    tracing::debug!(bytes = source.len(), template, "parsing document");
    Parser::new(symbols, template).program(Cursor::new(source))
}

fn punct(lit: &str) -> &'static str {
    match lit {
        "(" => "`(`",
        ")" => "`)`",
        "{" => "`{`",
        "}" => "`}`",
        "]" => "`]`",
        ":" => "`:`",
        ";" => "`;`",
        "=>" => "`=>`",
        "->" => "`->`",
        "%>" => "`%>`",
        "in" => "`in`",
        "while" => "`while`",
        _ => "token",
    }
}

/// Consumes `lit` or fails with a located error.
pub(crate) fn expect<'s>(c: Cursor<'s>, lit: &str, context: &str) -> Result<Cursor<'s>, ParseError> {
    c.eat(lit)
        .ok_or_else(|| ParseError::expected(punct(lit), context, c.skip_ws().span()))
}

pub(crate) fn is_reserved(word: &str) -> bool {
    RESERVED.contains(&word)
}

/// Where a statement list stops.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Until {
    End,
    CloseBrace,
    /// A switch arm: the next `case`, `default` or `}`.
    Arm,
}

pub(crate) struct Parser<'a> {
    pub(crate) symbols: &'a Symbols,
    pub(crate) template: bool,
    include_depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(symbols: &'a Symbols, template: bool) -> Self {
        Self { symbols, template, include_depth: 0 }
    }

    fn program<'s>(&self, c: Cursor<'s>) -> Result<Node, ParseError> {
        let start = c;
        let mut nodes = Vec::new();
        let mut c = c;
        if self.template {
            let (text, next) = self.text_run(c)?;
            nodes.extend(text);
            c = next;
        }
        let (rest, end) = self.statements(c, Until::End)?;
        nodes.extend(rest);
        Ok(Node::new(NodeKind::Sequence(nodes), end.span_from(start)))
    }

    /// Statements up to `until`. The returned cursor is past a closing
    /// brace, but before an arm's terminating keyword.
    fn statements<'s>(&self, c: Cursor<'s>, until: Until) -> Result<(Vec<Node>, Cursor<'s>), ParseError> {
        let open = c.span();
        let mut nodes = Vec::new();
        let mut c = c;
        loop {
            c = c.skip_ws();
            if c.is_at_end() {
                return match until {
                    Until::End => Ok((nodes, c)),
                    _ => Err(ParseError::Unterminated { what: "block", span: open }),
                };
            }
            if until != Until::End && c.starts_with("}") {
                let c = if until == Until::CloseBrace { c.advance(1) } else { c };
                return Ok((nodes, c));
            }
            if until == Until::Arm && (c.eat_keyword("case").is_some() || c.eat_keyword("default").is_some()) {
                return Ok((nodes, c));
            }
            if let Some(next) = c.eat(";") {
                c = next;
                continue;
            }
            match self.statement(c)? {
                Some((node, next)) => {
                    nodes.push(node);
                    c = next;
                }
                None => {
                    let found: String = c.rest().chars().take_while(|ch| !ch.is_whitespace()).take(16).collect();
                    return Err(ParseError::Unexpected { found, span: c.span() });
                }
            }
        }
    }

    /// One statement, first match wins.
    pub(crate) fn statement<'s>(&self, c: Cursor<'s>) -> Parsed<'s> {
        stack::ensure_sufficient_stack(|| {
            let c = c.skip_ws();
            if self.template && c.starts_with("%>") {
                return self.text(c);
            }
            if c.starts_with("{") {
                return self.block(c).map(Some);
            }
            let Some((word, _)) = c.ident() else {
                return self.expression_statement(c);
            };
            match word {
                "if" => self.if_statement(c),
                "while" => self.while_statement(c),
                "do" => self.do_statement(c),
                "for" => self.for_statement(c),
                "foreach" => self.foreach_statement(c),
                "switch" => self.switch_statement(c),
                "try" => self.try_statement(c),
                "return" => self.return_statement(c),
                "break" | "continue" => {
                    let (_, after) = c.ident().ok_or_else(|| ParseError::expected("statement", "", c.span()))?;
                    let kind = if word == "break" { NodeKind::Break } else { NodeKind::Continue };
                    let end = after.eat(";").unwrap_or(after);
                    Ok(Some((Node::new(kind, after.span_from(c)), end)))
                }
                "throw" => self.throw_statement(c),
                "class" => self.class_declaration(c),
                "function" => self.function_declaration(c),
                "include" | "include_live" => self.include_statement(c, word == "include_live"),
                "reload" => {
                    let after = c.advance(word.len());
                    let end = after.eat(";").unwrap_or(after);
                    Ok(Some((Node::new(NodeKind::Reload, after.span_from(c)), end)))
                }
                "using" => self.using_statement(c),
                "persist" => self.persist_statement(c),
                _ => self.expression_statement(c),
            }
        })
    }

    fn required_statement<'s>(&self, c: Cursor<'s>, context: &str) -> Result<(Node, Cursor<'s>), ParseError> {
        self.statement(c)?
            .ok_or_else(|| ParseError::expected("statement", context, c.skip_ws().span()))
    }

    fn expression_statement<'s>(&self, c: Cursor<'s>) -> Parsed<'s> {
        let Some((node, after)) = self.expression(c)? else {
            return Ok(None);
        };
        let end = after.eat(";").unwrap_or(after);
        Ok(Some((node, end)))
    }

    pub(crate) fn block<'s>(&self, c: Cursor<'s>) -> Result<(Node, Cursor<'s>), ParseError> {
        let start = c.skip_ws();
        let inner = expect(start, "{", "to open a block")?;
        let (nodes, end) = self
            .statements(inner, Until::CloseBrace)
            .map_err(|e| match e {
                ParseError::Unterminated { what, .. } => ParseError::Unterminated { what, span: start.span() },
                other => other,
            })?;
        Ok((Node::new(NodeKind::Block(nodes), end.span_from(start)), end))
    }

    /// `(` expression `)` after a keyword.
    fn condition<'s>(&self, c: Cursor<'s>, keyword: &str) -> Result<(Node, Cursor<'s>), ParseError> {
        let open = expect(c, "(", &format!("after `{}`", keyword))?;
        let (condition, after) = self.required_expression(open, &format!("in `{}` condition", keyword))?;
        let close = after
            .eat(")")
            .ok_or(ParseError::Unmatched { bracket: '(', span: open.span() })?;
        Ok((condition, close))
    }

    fn if_statement<'s>(&self, c: Cursor<'s>) -> Parsed<'s> {
        let Some(after) = c.eat_keyword("if") else { return Ok(None) };
        let (condition, after) = self.condition(after, "if")?;
        let (then_branch, after) = self.required_statement(after, "after `if` condition")?;
        let (else_branch, end) = match after.eat_keyword("else") {
            Some(after_else) => {
                let (node, end) = self.required_statement(after_else, "after `else`")?;
                (Some(Box::new(node)), end)
            }
            None => (None, after),
        };
        let kind = NodeKind::If {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch,
        };
        Ok(Some((Node::new(kind, end.span_from(c)), end)))
    }

    fn while_statement<'s>(&self, c: Cursor<'s>) -> Parsed<'s> {
        let Some(after) = c.eat_keyword("while") else { return Ok(None) };
        let (condition, after) = self.condition(after, "while")?;
        let (body, end) = self.required_statement(after, "as `while` body")?;
        let kind = NodeKind::While { condition: Box::new(condition), body: Box::new(body) };
        Ok(Some((Node::new(kind, end.span_from(c)), end)))
    }

    fn do_statement<'s>(&self, c: Cursor<'s>) -> Parsed<'s> {
        let Some(after) = c.eat_keyword("do") else { return Ok(None) };
        let (body, after) = self.required_statement(after, "after `do`")?;
        let after = after
            .eat_keyword("while")
            .ok_or_else(|| ParseError::expected(punct("while"), "after `do` body", after.skip_ws().span()))?;
        let (condition, after) = self.condition(after, "while")?;
        let end = after.eat(";").unwrap_or(after);
        let kind = NodeKind::DoWhile { body: Box::new(body), condition: Box::new(condition) };
        Ok(Some((Node::new(kind, end.span_from(c)), end)))
    }

    fn for_statement<'s>(&self, c: Cursor<'s>) -> Parsed<'s> {
        let Some(after) = c.eat_keyword("for") else { return Ok(None) };
        let open = expect(after, "(", "after `for`")?;

        let (init, after) = self.optional_expression(open)?;
        let after = expect(after, ";", "after `for` initializer")?;
        let (condition, after) = self.optional_expression(after)?;
        let after = expect(after, ";", "after `for` condition")?;
        let (step, after) = self.optional_expression(after)?;
        let after = after
            .eat(")")
            .ok_or(ParseError::Unmatched { bracket: '(', span: open.span() })?;

        let (body, end) = self.required_statement(after, "as `for` body")?;
        let kind = NodeKind::For {
            init: init.map(Box::new),
            condition: condition.map(Box::new),
            step: step.map(Box::new),
            body: Box::new(body),
        };
        Ok(Some((Node::new(kind, end.span_from(c)), end)))
    }

    fn foreach_statement<'s>(&self, c: Cursor<'s>) -> Parsed<'s> {
        let Some(after) = c.eat_keyword("foreach") else { return Ok(None) };
        let open = expect(after, "(", "after `foreach`")?;
        let (var, after) = open
            .ident()
            .filter(|(name, _)| !is_reserved(name))
            .ok_or_else(|| ParseError::expected("loop variable", "in `foreach`", open.skip_ws().span()))?;
        let after = after
            .eat_keyword("in")
            .ok_or_else(|| ParseError::expected(punct("in"), "after the loop variable", after.skip_ws().span()))?;
        let (iterable, after) = self.required_expression(after, "after `in`")?;
        let after = after
            .eat(")")
            .ok_or(ParseError::Unmatched { bracket: '(', span: open.span() })?;
        let (body, end) = self.required_statement(after, "as `foreach` body")?;
        let kind = NodeKind::Foreach {
            var: var.to_string(),
            iterable: Box::new(iterable),
            body: Box::new(body),
        };
        Ok(Some((Node::new(kind, end.span_from(c)), end)))
    }

    fn switch_statement<'s>(&self, c: Cursor<'s>) -> Parsed<'s> {
        let Some(after) = c.eat_keyword("switch") else { return Ok(None) };
        let (subject, after) = self.condition(after, "switch")?;
        let open = expect(after, "{", "to open the `switch` body")?;

        let mut cases = Vec::new();
        let mut default = None;
        let mut c2 = open;
        loop {
            let here = c2.skip_ws();
            if let Some(end) = here.eat("}") {
                c2 = end;
                break;
            }
            if here.is_at_end() {
                return Err(ParseError::Unterminated { what: "switch", span: open.span() });
            }
            if let Some(after_case) = here.eat_keyword("case") {
                let (guard, after_guard) = self.case_guard(after_case)?;
                let after_colon = expect(after_guard, ":", "after `case` value")?;
                let (body, next) = self.arm(after_colon)?;
                cases.push(Case { guard, body });
                c2 = next;
            } else if let Some(after_default) = here.eat_keyword("default") {
                let after_colon = expect(after_default, ":", "after `default`")?;
                let (body, next) = self.arm(after_colon)?;
                default = Some(Box::new(body));
                c2 = next;
            } else {
                return Err(ParseError::expected("`case`", "in `switch` body", here.span()));
            }
        }
        let kind = NodeKind::Switch { subject: Box::new(subject), cases, default };
        Ok(Some((Node::new(kind, c2.span_from(c)), c2)))
    }

    /// A case value compared with the switch subject; a leading comparator
    /// replaces the default `==`.
    fn case_guard<'s>(&self, c: Cursor<'s>) -> Result<(Node, Cursor<'s>), ParseError> {
        const COMPARATORS: [(&str, &[char], BinaryOp); 6] = [
            ("==", &[], BinaryOp::Eq),
            ("!=", &[], BinaryOp::NotEq),
            ("<=", &[], BinaryOp::LessEq),
            (">=", &[], BinaryOp::GreaterEq),
            ("<", &['=', '%'], BinaryOp::Less),
            (">", &['='], BinaryOp::Greater),
        ];
        let (op, c) = COMPARATORS
            .iter()
            .find_map(|(lit, forbidden, op)| c.eat_op(lit, forbidden).map(|next| (*op, next)))
            .unwrap_or((BinaryOp::Eq, c));
        let (value, end) = self.required_expression(c, "after `case`")?;
        let span = value.span;
        let kind = NodeKind::Binary {
            left: Box::new(Node::new(NodeKind::Subject, span)),
            op,
            right: Box::new(value),
        };
        Ok((Node::new(kind, span), end))
    }

    fn arm<'s>(&self, c: Cursor<'s>) -> Result<(Node, Cursor<'s>), ParseError> {
        let start = c.skip_ws();
        let (nodes, end) = self.statements(start, Until::Arm)?;
        Ok((Node::new(NodeKind::Sequence(nodes), end.span_from(start)), end))
    }

    fn try_statement<'s>(&self, c: Cursor<'s>) -> Parsed<'s> {
        let Some(after) = c.eat_keyword("try") else { return Ok(None) };
        let (body, end) = self.required_statement(after, "after `try`")?;
        Ok(Some((Node::new(NodeKind::Try(Box::new(body)), end.span_from(c)), end)))
    }

    fn return_statement<'s>(&self, c: Cursor<'s>) -> Parsed<'s> {
        let Some(after) = c.eat_keyword("return") else { return Ok(None) };
        let (value, after) = self.optional_expression(after)?;
        let end = after.eat(";").unwrap_or(after);
        let node = Node::new(NodeKind::Return(value.map(Box::new)), after.span_from(c));
        Ok(Some((node, end)))
    }

    fn throw_statement<'s>(&self, c: Cursor<'s>) -> Parsed<'s> {
        let Some(after) = c.eat_keyword("throw") else { return Ok(None) };
        let (value, after) = self.required_expression(after, "after `throw`")?;
        let end = after.eat(";").unwrap_or(after);
        Ok(Some((Node::new(NodeKind::Throw(Box::new(value)), after.span_from(c)), end)))
    }

    fn name<'s>(&self, c: Cursor<'s>, context: &str) -> Result<(String, Cursor<'s>), ParseError> {
        c.dotted_name()
            .filter(|(name, _)| !is_reserved(name))
            .ok_or_else(|| ParseError::expected("a name", context, c.skip_ws().span()))
    }

    /// `(a, b, c)`
    pub(crate) fn params<'s>(&self, c: Cursor<'s>, context: &str) -> Result<(Vec<String>, Cursor<'s>), ParseError> {
        let open = expect(c, "(", context)?;
        let mut params = Vec::new();
        if let Some(end) = open.eat(")") {
            return Ok((params, end));
        }
        let mut c = open;
        loop {
            let (param, after) = c
                .ident()
                .filter(|(name, _)| !is_reserved(name))
                .ok_or_else(|| ParseError::expected("a parameter name", context, c.skip_ws().span()))?;
            params.push(param.to_string());
            if let Some(next) = after.eat(",") {
                c = next;
            } else if let Some(end) = after.eat(")") {
                return Ok((params, end));
            } else {
                return Err(ParseError::Unmatched { bracket: '(', span: open.span() });
            }
        }
    }

    fn function_declaration<'s>(&self, c: Cursor<'s>) -> Parsed<'s> {
        let Some(after) = c.eat_keyword("function") else { return Ok(None) };
        let (name, after) = self.name(after, "after `function`")?;
        let (params, after) = self.params(after, "in function declaration")?;
        let (body, end) = self.block(after)?;
        let function = Arc::new(Function::new(name, params, body));
        self.symbols.define_function(function.clone());
        Ok(Some((Node::new(NodeKind::FunctionDecl(function), end.span_from(c)), end)))
    }

    fn class_declaration<'s>(&self, c: Cursor<'s>) -> Parsed<'s> {
        let Some(after) = c.eat_keyword("class") else { return Ok(None) };
        let (name, after) = self.name(after, "after `class`")?;
        let (base, after) = match after.eat(":") {
            Some(after_colon) => {
                let (base, next) = self.name(after_colon, "as base class")?;
                (Some(base), next)
            }
            None => (None, after),
        };
        let open = expect(after, "{", "to open the class body")?;

        let mut class = Class {
            name,
            base,
            fields: Vec::new(),
            methods: Default::default(),
            statics: Default::default(),
        };
        let mut c2 = open;
        loop {
            let here = c2.skip_ws();
            if let Some(end) = here.eat("}") {
                c2 = end;
                break;
            }
            if here.is_at_end() {
                return Err(ParseError::Unterminated { what: "class body", span: open.span() });
            }
            if let Some(next) = here.eat(";") {
                c2 = next;
                continue;
            }
            c2 = self.member(here, &mut class)?;
        }

        let class = Arc::new(class);
        self.symbols.define_class(class.clone());
        Ok(Some((Node::new(NodeKind::ClassDecl(class), c2.span_from(c)), c2)))
    }

    /// One class member: a method, a static method or a field.
    fn member<'s>(&self, c: Cursor<'s>, class: &mut Class) -> Result<Cursor<'s>, ParseError> {
        let (is_static, c) = match c.eat_keyword("static") {
            Some(after) => (true, after),
            None => (false, c),
        };
        let c = c.eat_keyword("function").unwrap_or(c);
        let (name, after) = c
            .ident()
            .filter(|(name, _)| !is_reserved(name))
            .ok_or_else(|| ParseError::expected("a member name", "in class body", c.skip_ws().span()))?;

        if after.skip_ws().starts_with("(") {
            let (params, after) = self.params(after, "in method declaration")?;
            let (body, end) = self.block(after)?;
            let mut method = Function::new(name, params, body);
            method.is_static = is_static;
            let table = if is_static { &mut class.statics } else { &mut class.methods };
            table.insert(name.to_string(), Arc::new(method));
            return Ok(end);
        }

        let (value, after) = match after.eat_op("=", &['=', '>']) {
            Some(after_eq) => {
                let (value, next) = self.required_expression(after_eq, "as field initializer")?;
                (Some(value), next)
            }
            None => (None, after),
        };
        class.fields.push(FieldInit { name: name.to_string(), value });
        Ok(after.eat(";").unwrap_or(after))
    }

    fn include_statement<'s>(&self, c: Cursor<'s>, live: bool) -> Parsed<'s> {
        let keyword = if live { "include_live" } else { "include" };
        let Some(after) = c.eat_keyword(keyword) else { return Ok(None) };
        let (path, after) = after
            .string_literal()
            .ok_or_else(|| ParseError::expected("a quoted path", &format!("after `{}`", keyword), after.skip_ws().span()))?;
        let end = after.eat(";").unwrap_or(after);
        let span = after.span_from(c);

        let kind = if live {
            NodeKind::IncludeLive { path, template: self.template }
        } else {
            let body = self.include_file(&path, span)?;
            NodeKind::Include { path, body: Box::new(body) }
        };
        Ok(Some((Node::new(kind, span), end)))
    }

    /// Reads and parses an included file in this document's mode.
    fn include_file(&self, path: &str, span: Span) -> Result<Node, ParseError> {
        let include_error = |message: String| ParseError::Include { path: path.to_string(), message, span };
        if self.include_depth >= include::MAX_INCLUDE_DEPTH {
            return Err(include_error(format!("includes nested deeper than {}", include::MAX_INCLUDE_DEPTH)));
        }
        let full = include::resolve_path(&self.symbols.config().include_root, path);
        tracing::debug!(path = %full.display(), "including file");
        let source = std::fs::read_to_string(&full).map_err(|e| include_error(e.to_string()))?;
        let nested = Parser {
            symbols: self.symbols,
            template: self.template,
            include_depth: self.include_depth + 1,
        };
        nested.program(Cursor::new(&source)).map_err(|e| match e {
            ParseError::Include { .. } => e,
            other => include_error(other.to_string()),
        })
    }

    fn using_statement<'s>(&self, c: Cursor<'s>) -> Parsed<'s> {
        let Some(after) = c.eat_keyword("using") else { return Ok(None) };
        let (prefix, after) = self.name(after, "after `using`")?;
        self.symbols.add_using(&prefix);
        let end = after.eat(";").unwrap_or(after);
        Ok(Some((Node::new(NodeKind::Using(prefix), after.span_from(c)), end)))
    }

    fn persist_statement<'s>(&self, c: Cursor<'s>) -> Parsed<'s> {
        let Some(after) = c.eat_keyword("persist") else { return Ok(None) };
        let (slot, after) = self.name(after, "after `persist`")?;
        let after = expect(after, "->", "after the persist slot")?;
        let (var, after) = after
            .ident()
            .filter(|(name, _)| !is_reserved(name))
            .ok_or_else(|| ParseError::expected("a variable name", "after `->`", after.skip_ws().span()))?;
        let end = after.eat(";").unwrap_or(after);
        let kind = NodeKind::Persist { slot, var: var.to_string() };
        Ok(Some((Node::new(kind, after.span_from(c)), end)))
    }

    /// `%>` followed by template text, in statement position.
    fn text<'s>(&self, c: Cursor<'s>) -> Parsed<'s> {
        let start = c;
        let (mut nodes, end) = self.text_run(c.advance(2))?;
        let node = match nodes.len() {
            1 => nodes.remove(0),
            _ => Node::new(NodeKind::Sequence(nodes), end.span_from(start)),
        };
        Ok(Some((node, end)))
    }

    /// Raw text up to the next `<%`, with `<%= expr %>` output tags along
    /// the way. Stops after the `<%` or at the end of input.
    fn text_run<'s>(&self, c: Cursor<'s>) -> Result<(Vec<Node>, Cursor<'s>), ParseError> {
        let mut nodes = Vec::new();
        let mut c = c;
        loop {
            let rest = c.rest();
            let Some(open) = rest.find("<%") else {
                if !rest.is_empty() {
                    nodes.push(Node::new(NodeKind::Text(Arc::from(rest)), Span::new(c.pos(), c.limit())));
                }
                return Ok((nodes, c.at(c.limit())));
            };
            if open > 0 {
                nodes.push(Node::new(NodeKind::Text(Arc::from(&rest[..open])), Span::new(c.pos(), c.pos() + open)));
            }
            let tag = c.advance(open);
            if !tag.advance(2).starts_with("=") {
                return Ok((nodes, tag.advance(2)));
            }

            let (value, after) = self.required_expression(tag.advance(3), "in `<%=` tag")?;
            let close = after
                .eat("%>")
                .ok_or(ParseError::Unterminated { what: "output tag", span: tag.span() })?;
            nodes.push(Node::new(NodeKind::Emit(Box::new(value)), close.span_from(tag)));
            c = close;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Step;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Node {
        parse_document(&Symbols::default(), source, false).unwrap()
    }

    fn parse_err(source: &str) -> ParseError {
        parse_document(&Symbols::default(), source, false).unwrap_err()
    }

    fn statements(node: &Node) -> &[Node] {
        match &node.kind {
            NodeKind::Sequence(nodes) => nodes,
            other => panic!("expected a sequence, got {:?}", other),
        }
    }

    fn assert_miss<'s>(source: &'s str, parse: impl FnOnce(Cursor<'s>) -> Parsed<'s>) {
        let c = Cursor::new(source);
        let result = parse(c).unwrap();
        assert!(result.is_none(), "{:?} matched", source);
        assert_eq!(c.rest(), source);
    }

    #[test]
    fn test_statement_miss_leaves_cursor() {
        let symbols = Symbols::default();
        let parser = Parser::new(&symbols, false);
        assert_miss(") rest", |c| parser.statement(c));
        assert_miss("   ", |c| parser.statement(c));
    }

    #[test]
    fn test_each_statement_form_misses_on_other_input() {
        let symbols = Symbols::default();
        let parser = Parser::new(&symbols, false);
        assert_miss("iffy = 1;", |c| parser.if_statement(c));
        assert_miss("x = 1;", |c| parser.if_statement(c));
        assert_miss("whilex;", |c| parser.while_statement(c));
        assert_miss("done = 1;", |c| parser.do_statement(c));
        assert_miss("foreach (x in y) {}", |c| parser.for_statement(c));
        assert_miss("for (;;) {}", |c| parser.foreach_statement(c));
        assert_miss("switches;", |c| parser.switch_statement(c));
        assert_miss("tryhard;", |c| parser.try_statement(c));
        assert_miss("returned = 1;", |c| parser.return_statement(c));
        assert_miss("thrown;", |c| parser.throw_statement(c));
        assert_miss("functional();", |c| parser.function_declaration(c));
        assert_miss("classy = 1;", |c| parser.class_declaration(c));
        assert_miss(r#"include_live "a.ql";"#, |c| parser.include_statement(c, false));
        assert_miss(r#"include "a.ql";"#, |c| parser.include_statement(c, true));
        assert_miss("user;", |c| parser.using_statement(c));
        assert_miss("persisted;", |c| parser.persist_statement(c));
        assert_miss("+;", |c| parser.expression_statement(c));
        assert_miss("}", |c| parser.expression_statement(c));
        assert!(symbols.function("functional").is_none());
        assert!(symbols.class("classy").is_none());
    }

    #[test]
    fn test_keywords_need_boundaries() {
        let program = parse("iffy = 1; fortune = 2;");
        let nodes = statements(&program);
        assert_eq!(nodes.len(), 2);
        assert!(matches!(nodes[0].kind, NodeKind::Assign { .. }));
    }

    #[test]
    fn test_if_else_chain() {
        let program = parse("if (a) x = 1; else if (b) x = 2; else x = 3;");
        let nodes = statements(&program);
        let NodeKind::If { else_branch: Some(else_branch), .. } = &nodes[0].kind else {
            panic!("expected if");
        };
        assert!(matches!(else_branch.kind, NodeKind::If { .. }));
    }

    #[test]
    fn test_switch_guards_compare_with_subject() {
        let program = parse("switch (x) { case 1: a = 1; case > 5: a = 2; default: a = 3; }");
        let NodeKind::Switch { cases, default, .. } = &statements(&program)[0].kind else {
            panic!("expected switch");
        };
        assert_eq!(cases.len(), 2);
        assert!(default.is_some());
        assert!(matches!(
            &cases[1].guard.kind,
            NodeKind::Binary { op: BinaryOp::Greater, left, .. } if matches!(left.kind, NodeKind::Subject)
        ));
    }

    #[test]
    fn test_class_members() {
        let symbols = Symbols::default();
        parse_document(
            &symbols,
            "class Shapes.Circle : Shape { r = 1; area() { return r * r; } static function unit() { return new Circle(); } }",
            false,
        )
        .unwrap();
        let class = symbols.class("Shapes.Circle").unwrap();
        assert_eq!(class.base.as_deref(), Some("Shape"));
        assert_eq!(class.fields.len(), 1);
        assert!(class.methods.contains_key("area"));
        assert!(class.statics.contains_key("unit"));
    }

    #[test]
    fn test_functions_register_while_parsing() {
        let symbols = Symbols::default();
        parse_document(&symbols, "function add(a, b) { return a + b; }", false).unwrap();
        assert_eq!(symbols.function("add").unwrap().params, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_template_text_and_emit() {
        let program = parse_document(&Symbols::default(), "Hi <%= name %>!<% x = 1; %>done", true).unwrap();
        let kinds: Vec<&str> = statements(&program)
            .iter()
            .map(|n| match &n.kind {
                NodeKind::Text(_) => "text",
                NodeKind::Emit(_) => "emit",
                NodeKind::Assign { .. } => "assign",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, vec!["text", "emit", "text", "assign", "text"]);
    }

    #[test]
    fn test_template_blocks_span_code_tags() {
        let program = parse_document(&Symbols::default(), "<% if (x) { %>yes<% } %>", true).unwrap();
        let NodeKind::If { then_branch, .. } = &statements(&program)[0].kind else {
            panic!("expected if");
        };
        let NodeKind::Block(body) = &then_branch.kind else { panic!("expected block") };
        assert!(matches!(&body[0].kind, NodeKind::Text(t) if &**t == "yes"));
    }

    #[test]
    fn test_persist_and_using() {
        let program = parse("using Shapes; persist Visits -> count;");
        let nodes = statements(&program);
        assert!(matches!(&nodes[0].kind, NodeKind::Using(p) if p == "Shapes"));
        assert!(matches!(&nodes[1].kind, NodeKind::Persist { slot, var } if slot == "Visits" && var == "count"));
    }

    #[test]
    fn test_foreach_binds_variable() {
        let program = parse("foreach (item in list) total += item.Value;");
        let NodeKind::Foreach { var, iterable, .. } = &statements(&program)[0].kind else {
            panic!("expected foreach");
        };
        assert_eq!(var, "item");
        let NodeKind::Variable(path) = &iterable.kind else { panic!("expected variable") };
        assert!(matches!(&path.steps[..], [Step::Key(k)] if k == "list"));
    }

    #[test]
    fn test_malformed_keyword_constructs_are_located() {
        let err = parse_err("if x) {}");
        assert!(matches!(err, ParseError::Expected { .. }));
        assert_eq!(err.span(), Span::point(3));

        assert!(matches!(parse_err("while (x { }"), ParseError::Unmatched { bracket: '(', .. }));
        assert!(matches!(parse_err("{ a = 1;"), ParseError::Unterminated { what: "block", .. }));
    }

    #[test]
    fn test_leftover_input_is_unexpected() {
        assert!(matches!(parse_err("a = 1; )"), ParseError::Unexpected { .. }));
    }

    #[test]
    fn test_missing_include_fails_at_parse_time() {
        let err = parse_err("include \"does/not/exist.ql\";");
        assert!(matches!(err, ParseError::Include { ref path, .. } if path == "does/not/exist.ql"));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn statement_miss_consumes_nothing(
                source in "(if|while|do|for|foreach|switch|try|return|throw|class|function|using|persist)?[ -~]{0,24}"
            ) {
                let symbols = Symbols::default();
                let parser = Parser::new(&symbols, false);
                let c = Cursor::new(&source);
                match parser.statement(c) {
                    Ok(None) => prop_assert_eq!(c.rest(), source.as_str()),
                    Ok(Some((_, end))) => prop_assert!(end.pos() > c.pos()),
                    Err(_) => {}
                }
            }
        }
    }
}
