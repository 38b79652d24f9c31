//! Expression parsing by precedence climbing, directly over the source.

use std::sync::Arc;

use super::dispatch::CallSite;
use super::error::ParseError;
use super::object::Function;
use super::parser::{expect, is_reserved, Parsed, Parser};
use crate::ast::{Arg, BinaryOp, Call, Node, NodeKind, Root, Step, UnaryOp, Variable};
use crate::cursor::{is_ident_start, Cursor};
use crate::stack;
use crate::value::{format_number, Value};

type Operator = (&'static str, &'static [char], BinaryOp);

/// Binary operators from loosest to tightest. The character lists are
/// followers that make the text a different operator (`<` vs `<=` vs `<%`).
const LEVELS: &[&[Operator]] = &[
    &[("||", &[], BinaryOp::Or)],
    &[("&&", &[], BinaryOp::And)],
    &[("==", &[], BinaryOp::Eq), ("!=", &[], BinaryOp::NotEq)],
    &[
        ("<=", &[], BinaryOp::LessEq),
        (">=", &[], BinaryOp::GreaterEq),
        ("<", &['=', '%'], BinaryOp::Less),
        (">", &['='], BinaryOp::Greater),
    ],
    &[("+", &['='], BinaryOp::Add), ("-", &['=', '>'], BinaryOp::Sub)],
    &[("*", &['='], BinaryOp::Mul), ("/", &['=', '/', '*'], BinaryOp::Div), ("%", &['>', '='], BinaryOp::Mod)],
];

const ASSIGN_OPS: &[(&str, &[char], Option<BinaryOp>)] = &[
    ("=", &['=', '>'], None),
    ("+=", &[], Some(BinaryOp::Add)),
    ("-=", &[], Some(BinaryOp::Sub)),
    ("*=", &[], Some(BinaryOp::Mul)),
    ("/=", &[], Some(BinaryOp::Div)),
];

/// Name given to arrow functions.
pub const LAMBDA_NAME: &str = "<lambda>";

/// Digits directly under the cursor, for `list.0` style steps.
fn digits(c: Cursor<'_>) -> Option<(&str, Cursor<'_>)> {
    let rest = c.rest();
    let len = rest.bytes().take_while(u8::is_ascii_digit).count();
    (len > 0).then(|| (&rest[..len], c.advance(len)))
}

/// Wraps a node as the root of a path so steps or a call can follow it.
fn into_path(node: Node) -> Variable {
    match node.kind {
        NodeKind::Variable(var) => var,
        kind => Variable {
            root: Root::Expr(Box::new(Node::new(kind, node.span))),
            steps: Vec::new(),
            type_hint: None,
        },
    }
}

impl Parser<'_> {
    pub(crate) fn expression<'s>(&self, c: Cursor<'s>) -> Parsed<'s> {
        stack::ensure_sufficient_stack(|| {
            let Some((left, after)) = self.ternary(c)? else {
                return Ok(None);
            };
            let assign = ASSIGN_OPS
                .iter()
                .find_map(|(lit, forbidden, op)| after.eat_op(lit, forbidden).map(|next| (*op, next)));
            match (left.kind, assign) {
                (NodeKind::Variable(target), Some((op, after_op))) => {
                    let (value, end) = self.required_expression(after_op, "after assignment")?;
                    let kind = NodeKind::Assign { target, op, value: Box::new(value) };
                    Ok(Some((Node::new(kind, left.span.merge(end.span())), end)))
                }
                (kind, _) => Ok(Some((Node::new(kind, left.span), after))),
            }
        })
    }

    pub(crate) fn required_expression<'s>(&self, c: Cursor<'s>, context: &str) -> Result<(Node, Cursor<'s>), ParseError> {
        self.expression(c)?
            .ok_or_else(|| ParseError::expected("an expression", context, c.skip_ws().span()))
    }

    pub(crate) fn optional_expression<'s>(&self, c: Cursor<'s>) -> Result<(Option<Node>, Cursor<'s>), ParseError> {
        Ok(match self.expression(c)? {
            Some((node, after)) => (Some(node), after),
            None => (None, c),
        })
    }

    fn ternary<'s>(&self, c: Cursor<'s>) -> Parsed<'s> {
        let Some((condition, after)) = self.binary(c, 0)? else {
            return Ok(None);
        };
        let Some(after_q) = after.eat("?") else {
            return Ok(Some((condition, after)));
        };
        let (then_branch, after) = self.required_expression(after_q, "after `?`")?;
        let after = expect(after, ":", "in conditional expression")?;
        let (else_branch, end) = self.required_expression(after, "after `:`")?;
        let span = condition.span.merge(end.span());
        let kind = NodeKind::Ternary {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        };
        Ok(Some((Node::new(kind, span), end)))
    }

    fn binary<'s>(&self, c: Cursor<'s>, level: usize) -> Parsed<'s> {
        let Some(operators) = LEVELS.get(level) else {
            return self.unary(c);
        };
        let Some((mut left, mut c)) = self.binary(c, level + 1)? else {
            return Ok(None);
        };
        while let Some((op, after_op)) = operators
            .iter()
            .find_map(|(lit, forbidden, op)| c.eat_op(lit, forbidden).map(|next| (*op, next)))
        {
            let (right, next) = match self.binary(after_op, level + 1)? {
                Some(parsed) => parsed,
                None => {
                    let context = format!("after `{}`", op.symbol());
                    return Err(ParseError::expected("an expression", context, after_op.skip_ws().span()));
                }
            };
            let span = left.span.merge(right.span);
            left = Node::new(NodeKind::Binary { left: Box::new(left), op, right: Box::new(right) }, span);
            c = next;
        }
        Ok(Some((left, c)))
    }

    fn unary<'s>(&self, c: Cursor<'s>) -> Parsed<'s> {
        stack::ensure_sufficient_stack(|| {
            let start = c.skip_ws();
            let prefix = start
                .eat_op("!", &['='])
                .map(|after| (UnaryOp::Not, after))
                .or_else(|| start.eat_op("-", &['=', '>']).map(|after| (UnaryOp::Neg, after)));
            if let Some((op, after)) = prefix {
                let (expr, end) = self
                    .unary(after)?
                    .ok_or_else(|| ParseError::expected("an operand", "after unary operator", after.skip_ws().span()))?;
                return Ok(Some((Node::new(NodeKind::Unary { op, expr: Box::new(expr) }, end.span_from(start)), end)));
            }

            if let Some(after) = start.eat_keyword("await") {
                let (value, end) = self
                    .unary(after)?
                    .ok_or_else(|| ParseError::expected("an expression", "after `await`", after.skip_ws().span()))?;
                return Ok(Some((Node::new(NodeKind::Await(Box::new(value)), end.span_from(start)), end)));
            }
            if let Some(after) = start.eat_keyword("async") {
                return self.async_expression(start, after).map(Some);
            }
            // `x = try f();` catches into a value.
            if let Some(after) = start.eat_keyword("try") {
                let (body, end) = self
                    .async_body(after)?
                    .ok_or_else(|| ParseError::expected("an expression", "after `try`", after.skip_ws().span()))?;
                return Ok(Some((Node::new(NodeKind::Try(Box::new(body)), end.span_from(start)), end)));
            }
            self.postfix(start)
        })
    }

    /// `async (ms) body` or `async body`. A parenthesized expression is
    /// the wait bound only when a body follows it.
    fn async_expression<'s>(&self, start: Cursor<'s>, after: Cursor<'s>) -> Result<(Node, Cursor<'s>), ParseError> {
        if let Some(open) = after.eat("(") {
            if let Some((max_wait, inner_end)) = self.expression(open)? {
                if let Some(after_paren) = inner_end.eat(")") {
                    if let Some((body, end)) = self.async_body(after_paren)? {
                        let kind = NodeKind::Async { max_wait: Some(Box::new(max_wait)), body: Arc::new(body) };
                        return Ok((Node::new(kind, end.span_from(start)), end));
                    }
                }
            }
        }
        let (body, end) = self
            .async_body(after)?
            .ok_or_else(|| ParseError::expected("an expression", "after `async`", after.skip_ws().span()))?;
        let kind = NodeKind::Async { max_wait: None, body: Arc::new(body) };
        Ok((Node::new(kind, end.span_from(start)), end))
    }

    fn async_body<'s>(&self, c: Cursor<'s>) -> Parsed<'s> {
        if c.skip_ws().starts_with("{") {
            return self.block(c).map(Some);
        }
        self.unary(c)
    }

    /// A primary followed by member steps, `as` hints and calls.
    fn postfix<'s>(&self, c: Cursor<'s>) -> Parsed<'s> {
        let start = c.skip_ws();
        let Some((mut node, mut c)) = self.primary(start)? else {
            return Ok(None);
        };
        loop {
            if let Some((step, next)) = self.step(c)? {
                let mut path = into_path(node);
                path.steps.push(step);
                node = Node::new(NodeKind::Variable(path), next.span_from(start));
                c = next;
                continue;
            }
            if let NodeKind::Variable(var) = &mut node.kind {
                if var.type_hint.is_none() {
                    if let Some(after_as) = c.eat_keyword("as") {
                        let (hint, next) = after_as
                            .dotted_name()
                            .filter(|(name, _)| !is_reserved(name))
                            .ok_or_else(|| ParseError::expected("a type name", "after `as`", after_as.skip_ws().span()))?;
                        var.type_hint = Some(hint);
                        node.span = next.span_from(start);
                        c = next;
                        continue;
                    }
                }
            }
            if c.skip_ws().starts_with("(") {
                let (args, next) = self.args(c, "in call")?;
                let call = Call { path: into_path(node), args, site: CallSite::new() };
                node = Node::new(NodeKind::Call(call), next.span_from(start));
                c = next;
                continue;
            }
            return Ok(Some((node, c)));
        }
    }

    /// `.name`, `._`, `.0` or `[expr]`.
    fn step<'s>(&self, c: Cursor<'s>) -> Result<Option<(Step, Cursor<'s>)>, ParseError> {
        if let Some(after_dot) = c.eat(".") {
            if after_dot.starts_with(".") {
                return Ok(None);
            }
            if let Some((key, next)) = digits(after_dot) {
                return Ok(Some((Step::Key(key.to_string()), next)));
            }
            return Ok(match after_dot.peek() {
                Some(ch) if is_ident_start(ch) => after_dot.ident().map(|(name, next)| {
                    let step = if name == "_" { Step::Current } else { Step::Key(name.to_string()) };
                    (step, next)
                }),
                _ => None,
            });
        }
        let Some(open) = c.eat("[") else {
            return Ok(None);
        };
        let (key, after) = self.required_expression(open, "inside `[]`")?;
        let end = after
            .eat("]")
            .ok_or(ParseError::Unmatched { bracket: '[', span: c.skip_ws().span() })?;
        let step = match key.kind {
            NodeKind::Literal(Value::String(s)) => Step::Key(s.to_string()),
            NodeKind::Literal(Value::Number(n, false)) if n >= 0.0 && n.fract() == 0.0 => {
                Step::Key(format_number(n, false))
            }
            kind => Step::Computed(Box::new(Node::new(kind, key.span))),
        };
        Ok(Some((step, end)))
    }

    /// `(a, name: b)`
    pub(crate) fn args<'s>(&self, c: Cursor<'s>, context: &str) -> Result<(Vec<Arg>, Cursor<'s>), ParseError> {
        let open = expect(c, "(", context)?;
        let mut args = Vec::new();
        if let Some(end) = open.eat(")") {
            return Ok((args, end));
        }
        let mut c = open;
        loop {
            let (name, value_start) = match c.ident() {
                Some((name, after)) if !is_reserved(name) => match after.eat(":") {
                    Some(value_start) => (Some(name.to_string()), value_start),
                    None => (None, c),
                },
                _ => (None, c),
            };
            let (value, after) = self.required_expression(value_start, "as argument")?;
            args.push(Arg { name, value });
            if let Some(next) = after.eat(",") {
                c = next;
            } else if let Some(end) = after.eat(")") {
                return Ok((args, end));
            } else {
                return Err(ParseError::Unmatched { bracket: '(', span: open.span() });
            }
        }
    }

    fn primary<'s>(&self, start: Cursor<'s>) -> Parsed<'s> {
        let literal = |value: Value, end: Cursor<'s>| -> Parsed<'s> {
            Ok(Some((Node::new(NodeKind::Literal(value), end.span_from(start)), end)))
        };

        if let Some((n, is_float, end)) = start.number() {
            return literal(Value::Number(n, is_float), end);
        }
        match start.peek() {
            Some('"') | Some('\'') => {
                return match start.string_literal() {
                    Some((s, end)) => literal(Value::from(s), end),
                    None => Err(ParseError::Unterminated { what: "string", span: start.span() }),
                };
            }
            Some('(') => return self.paren(start).map(Some),
            Some('[') => return self.array(start).map(Some),
            Some('{') => return self.map(start).map(Some),
            _ => {}
        }

        let Some((word, end)) = start.ident() else {
            return Ok(None);
        };
        let path = |root: Root, steps: Vec<Step>| -> Parsed<'s> {
            let var = Variable { root, steps, type_hint: None };
            Ok(Some((Node::new(NodeKind::Variable(var), end.span_from(start)), end)))
        };
        match word {
            "true" => literal(Value::Bool(true), end),
            "false" => literal(Value::Bool(false), end),
            "null" => literal(Value::Null, end),
            "Static" => path(Root::Static, Vec::new()),
            "_" => path(Root::Scope, vec![Step::Current]),
            "new" => self.new_expression(start, end).map(Some),
            word if is_reserved(word) => Ok(None),
            word => path(Root::Scope, vec![Step::Key(word.to_string())]),
        }
    }

    /// `new Name(args)`; member steps and calls may follow it.
    fn new_expression<'s>(&self, start: Cursor<'s>, after: Cursor<'s>) -> Result<(Node, Cursor<'s>), ParseError> {
        let (class, after) = after
            .dotted_name()
            .filter(|(name, _)| !is_reserved(name))
            .ok_or_else(|| ParseError::expected("a class name", "after `new`", after.skip_ws().span()))?;
        let (args, end) = self.args(after, "after class name")?;
        Ok((Node::new(NodeKind::New { class, args }, end.span_from(start)), end))
    }

    /// An arrow function or a parenthesized expression.
    fn paren<'s>(&self, start: Cursor<'s>) -> Result<(Node, Cursor<'s>), ParseError> {
        let close = start
            .matching_bracket()
            .ok_or(ParseError::Unmatched { bracket: '(', span: start.span() })?;
        if let Some(after_arrow) = start.at(close + 1).eat("=>") {
            let (params, _) = self.params(start, "in arrow function")?;
            let (body, end) = if after_arrow.skip_ws().starts_with("{") {
                self.block(after_arrow)?
            } else {
                self.required_expression(after_arrow, "after `=>`")?
            };
            let function = Arc::new(Function::new(LAMBDA_NAME, params, body));
            return Ok((Node::new(NodeKind::Lambda(function), end.span_from(start)), end));
        }

        let (inner, after) = self.required_expression(start.advance(1), "inside `()`")?;
        let end = after
            .eat(")")
            .ok_or(ParseError::Unmatched { bracket: '(', span: start.span() })?;
        // `((x))` keeps a single group.
        let kind = match inner.kind {
            NodeKind::Group(_) => inner.kind,
            _ => NodeKind::Group(Box::new(inner)),
        };
        Ok((Node::new(kind, end.span_from(start)), end))
    }

    fn array<'s>(&self, start: Cursor<'s>) -> Result<(Node, Cursor<'s>), ParseError> {
        let mut items = Vec::new();
        let mut c = start.advance(1);
        loop {
            if let Some(end) = c.eat("]") {
                return Ok((Node::new(NodeKind::Array(items), end.span_from(start)), end));
            }
            let (item, after) = self.required_expression(c, "in array literal")?;
            items.push(item);
            c = match after.eat(",") {
                Some(next) => next,
                None if after.skip_ws().starts_with("]") => after,
                None => return Err(ParseError::Unmatched { bracket: '[', span: start.span() }),
            };
        }
    }

    fn map<'s>(&self, start: Cursor<'s>) -> Result<(Node, Cursor<'s>), ParseError> {
        let mut entries = Vec::new();
        let mut c = start.advance(1);
        loop {
            if let Some(end) = c.eat("}") {
                return Ok((Node::new(NodeKind::Map(entries), end.span_from(start)), end));
            }
            let (key, after) = match c.string_literal() {
                Some(parsed) => parsed,
                None => match c.ident() {
                    Some((name, next)) => (name.to_string(), next),
                    None => match digits(c.skip_ws()) {
                        Some((n, next)) => (n.to_string(), next),
                        None => return Err(ParseError::expected("a key", "in map literal", c.skip_ws().span())),
                    },
                },
            };
            let after = expect(after, ":", "after map key")?;
            let (value, after) = self.required_expression(after, "as map value")?;
            entries.push((key, value));
            c = match after.eat(",") {
                Some(next) => next,
                None if after.skip_ws().starts_with("}") => after,
                None => return Err(ParseError::Unmatched { bracket: '{', span: start.span() }),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::symbols::Symbols;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_expression_forms_miss_on_other_input() {
        let symbols = Symbols::default();
        let parser = Parser::new(&symbols, false);
        let misses: [(&str, fn(&Parser<'_>, Cursor<'_>) -> bool); 8] = [
            ("+1", |p, c| p.primary(c).unwrap().is_none()),
            (")", |p, c| p.primary(c).unwrap().is_none()),
            ("if", |p, c| p.primary(c).unwrap().is_none()),
            ("*2", |p, c| p.postfix(c).unwrap().is_none()),
            (")", |p, c| p.unary(c).unwrap().is_none()),
            ("}", |p, c| p.expression(c).unwrap().is_none()),
            ("x", |p, c| p.step(c).unwrap().is_none()),
            ("..y", |p, c| p.step(c).unwrap().is_none()),
        ];
        for (source, misses) in misses {
            let c = Cursor::new(source);
            assert!(misses(&parser, c), "{:?} matched", source);
            assert_eq!(c.rest(), source);
        }
    }

    fn expr(source: &str) -> Node {
        let symbols = Symbols::default();
        let parser = Parser::new(&symbols, false);
        let (node, end) = parser.expression(Cursor::new(source)).unwrap().unwrap();
        assert!(end.skip_ws().is_at_end(), "unparsed input: {:?}", end.rest());
        node
    }

    #[test]
    fn test_precedence() {
        assert_eq!(expr("1 + 2 * 3 - 4").to_string(), "1 + 2 * 3 - 4");
        let NodeKind::Binary { op, right, .. } = expr("a || b && c").kind else { panic!() };
        assert_eq!(op, BinaryOp::Or);
        assert!(matches!(right.kind, NodeKind::Binary { op: BinaryOp::And, .. }));
    }

    #[test]
    fn test_binary_is_left_associative() {
        let NodeKind::Binary { left, op: BinaryOp::Sub, .. } = expr("10 - 4 - 3").kind else { panic!() };
        assert!(matches!(left.kind, NodeKind::Binary { op: BinaryOp::Sub, .. }));
    }

    #[test]
    fn test_comparison_does_not_eat_template_tags() {
        let symbols = Symbols::default();
        let parser = Parser::new(&symbols, true);
        let (node, end) = parser.expression(Cursor::new("a %>")).unwrap().unwrap();
        assert!(matches!(node.kind, NodeKind::Variable(_)));
        assert_eq!(end.skip_ws().rest(), "%>");
    }

    #[test]
    fn test_paths_and_calls() {
        let node = expr("user.friends[0].name");
        let NodeKind::Variable(var) = &node.kind else { panic!() };
        assert_eq!(var.steps.len(), 4);
        assert_eq!(node.to_string(), "user.friends.0.name");

        let node = expr("list.items(x).count()");
        let NodeKind::Call(call) = &node.kind else { panic!() };
        assert!(matches!(call.path.root, Root::Expr(_)));
    }

    #[test]
    fn test_computed_keys_stay_computed() {
        let NodeKind::Variable(var) = expr("m[key]").kind else { panic!() };
        assert!(matches!(var.steps[1], Step::Computed(_)));
    }

    #[test]
    fn test_named_arguments() {
        let NodeKind::Call(call) = expr("f(b: 2, 1)").kind else { panic!() };
        assert_eq!(call.args[0].name.as_deref(), Some("b"));
        assert_eq!(call.args[1].name, None);
    }

    #[test]
    fn test_arrow_functions() {
        let NodeKind::Lambda(function) = expr("(a, b) => a + b").kind else { panic!() };
        assert_eq!(function.params, vec!["a".to_string(), "b".to_string()]);
        assert!(matches!(expr("(a) => { return a; }").kind, NodeKind::Lambda(_)));
        assert!(matches!(expr("(a)").kind, NodeKind::Group(_)));
    }

    #[test]
    fn test_compound_assignment() {
        let NodeKind::Assign { op, .. } = expr("total += 2").kind else { panic!() };
        assert_eq!(op, Some(BinaryOp::Add));
    }

    #[test]
    fn test_async_wait_bound_needs_a_body() {
        let NodeKind::Async { max_wait, .. } = expr("async (50) work()").kind else { panic!() };
        assert!(max_wait.is_some());
        let NodeKind::Async { max_wait, body } = expr("async (work())").kind else { panic!() };
        assert!(max_wait.is_none());
        assert!(matches!(body.kind, NodeKind::Group(_)));
    }

    #[test]
    fn test_type_hint() {
        let NodeKind::Variable(var) = expr("widget.size as Widget").kind else { panic!() };
        assert_eq!(var.type_hint.as_deref(), Some("Widget"));
    }

    #[test]
    fn test_literals() {
        assert_eq!(expr("[1, 'two', { a: 3 }]").to_string(), "[1, \"two\", { a: 3 }]");
        assert!(matches!(expr("null").kind, NodeKind::Literal(Value::Null)));
        assert!(matches!(expr("2.50").kind, NodeKind::Literal(Value::Number(n, true)) if n == 2.5));
    }

    #[test]
    fn test_unbalanced_brackets_fail() {
        let symbols = Symbols::default();
        let parser = Parser::new(&symbols, false);
        assert!(matches!(
            parser.expression(Cursor::new("(1 + 2")),
            Err(ParseError::Unmatched { bracket: '(', .. })
        ));
        assert!(matches!(
            parser.expression(Cursor::new("'open")),
            Err(ParseError::Unterminated { what: "string", .. })
        ));
    }

    #[test]
    fn test_reserved_words_do_not_start_paths() {
        let symbols = Symbols::default();
        let parser = Parser::new(&symbols, false);
        assert!(parser.expression(Cursor::new("while")).unwrap().is_none());
    }
}
