use owo_colors::{OwoColorize, Style};

/// A byte range in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn dummy() -> Self {
        Self::default()
    }

    pub fn point(at: usize) -> Self {
        Self { start: at, end: at + 1 }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn is_dummy(&self) -> bool {
        self.start == 0 && self.end == 0
    }
}


#[derive(Debug, Clone)]
pub struct Label {
    pub span: Span,
    pub message: String,
}

impl Label {
    pub fn primary(span: Span, message: impl Into<String>) -> Self {
        Self { span, message: message.into() }
    }
}

/// A located report produced by the parser or the evaluator.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<&'static str>,
    pub message: String,
    pub labels: Vec<Label>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            labels: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_label(mut self, label: Label) -> Self {
        self.labels.push(label);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.notes.push(format!("help: {}", help.into()));
        self
    }
}

/// 1-based line and column of a byte offset.
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source[..floor_char_boundary(source, offset)];
    let line = before.matches('\n').count() + 1;
    let col = match before.rfind('\n') {
        Some(nl) => before[nl + 1..].chars().count() + 1,
        None => before.chars().count() + 1,
    };
    (line, col)
}

fn floor_char_boundary(source: &str, mut offset: usize) -> usize {
    while offset > 0 && !source.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

fn line_text(source: &str, line: usize) -> Option<&str> {
    source.split('\n').nth(line - 1).map(|l| l.trim_end_matches('\r'))
}

/// Renders diagnostics in a compiler-like layout with a source excerpt.
pub struct DiagnosticRenderer<'a> {
    source: &'a str,
    file_name: &'a str,
    use_color: bool,
}

impl<'a> DiagnosticRenderer<'a> {
    pub fn new(source: &'a str, file_name: &'a str, use_color: bool) -> Self {
        Self { source, file_name, use_color }
    }

    fn paint(&self, text: &str, style: Style) -> String {
        if self.use_color {
            text.style(style).to_string()
        } else {
            text.to_string()
        }
    }

    fn gutter(&self) -> Style {
        Style::new().blue().bold()
    }

    pub fn render(&self, diagnostic: &Diagnostic) -> String {
        let mut out = String::new();

        let head = match diagnostic.code {
            Some(code) => format!("error[{}]", code),
            None => "error".to_string(),
        };
        out.push_str(&self.paint(&head, Style::new().red().bold()));
        out.push_str(": ");
        out.push_str(&self.paint(&diagnostic.message, Style::new().bold()));
        out.push('\n');

        let located: Vec<&Label> = diagnostic.labels.iter().filter(|l| !l.span.is_dummy()).collect();
        if let Some(first) = located.first() {
            let mut lines: Vec<usize> = located
                .iter()
                .map(|l| line_col(self.source, l.span.start).0)
                .collect();
            lines.sort_unstable();
            lines.dedup();

            let width = lines.last().map(|l| l.to_string().len()).unwrap_or(1);
            let pad = " ".repeat(width);
            let bar = self.paint("|", self.gutter());

            let (line, col) = line_col(self.source, first.span.start);
            out.push_str(&format!(
                "{}{} {}:{}:{}\n",
                pad,
                self.paint("-->", self.gutter()),
                self.file_name,
                line,
                col
            ));
            out.push_str(&format!("{} {}\n", pad, bar));

            for line in lines {
                let Some(text) = line_text(self.source, line) else {
                    continue;
                };
                let number = format!("{:>width$}", line, width = width);
                out.push_str(&format!("{} {} {}\n", self.paint(&number, self.gutter()), bar, text));

                for label in located.iter().filter(|l| line_col(self.source, l.span.start).0 == line) {
                    let (_, start_col) = line_col(self.source, label.span.start);
                    let (end_line, end_col) = line_col(self.source, label.span.end.max(label.span.start + 1));
                    let length = if end_line == line {
                        end_col.saturating_sub(start_col).max(1)
                    } else {
                        text.chars().count().saturating_sub(start_col - 1).max(1)
                    };
                    let style = Style::new().red().bold();
                    let underline = "^".repeat(length);
                    let annotated = if label.message.is_empty() {
                        underline
                    } else {
                        format!("{} {}", underline, label.message)
                    };
                    out.push_str(&format!(
                        "{} {} {}{}\n",
                        pad,
                        bar,
                        " ".repeat(start_col - 1),
                        self.paint(&annotated, style)
                    ));
                }
            }
        }

        for note in &diagnostic.notes {
            out.push_str(&format!("{} {} {}\n", " ".repeat(1), self.paint("=", self.gutter()), note));
        }
        out
    }
}

pub fn render_diagnostics(source: &str, file_name: &str, diagnostics: &[Diagnostic], use_color: bool) -> String {
    let renderer = DiagnosticRenderer::new(source, file_name, use_color);
    let mut out = String::new();
    for diagnostic in diagnostics {
        out.push_str(&renderer.render(diagnostic));
        out.push('\n');
    }

    let errors = diagnostics.len();
    if errors > 0 {
        let summary = format!(
            "aborting due to {} error{}",
            errors,
            if errors == 1 { "" } else { "s" }
        );
        out.push_str(&renderer.paint("error", Style::new().red().bold()));
        out.push_str(": ");
        out.push_str(&summary);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col() {
        let source = "x = 5;\ny = 10;";
        assert_eq!(line_col(source, 0), (1, 1));
        assert_eq!(line_col(source, 4), (1, 5));
        assert_eq!(line_col(source, 7), (2, 1));
        assert_eq!(line_col(source, 11), (2, 5));
    }

    #[test]
    fn test_line_col_past_end() {
        assert_eq!(line_col("ab", 99), (1, 3));
    }

    #[test]
    fn test_span_merge() {
        let merged = Span::new(5, 10).merge(Span::new(8, 15));
        assert_eq!(merged, Span::new(5, 15));
    }

    #[test]
    fn test_render_points_at_location() {
        let source = "if x) { }\n";
        let diagnostic = Diagnostic::error("expected `(` after `if`")
            .with_code("E0101")
            .with_label(Label::primary(Span::new(3, 4), "expected `(` here"))
            .with_help("wrap the condition in parentheses");

        let output = DiagnosticRenderer::new(source, "script", false).render(&diagnostic);
        assert!(output.contains("error[E0101]"));
        assert!(output.contains("script:1:4"));
        assert!(output.contains("^ expected `(` here"));
        assert!(output.contains("help: wrap the condition"));
    }

    #[test]
    fn test_summary_counts_errors() {
        let diagnostics = vec![Diagnostic::error("a"), Diagnostic::error("b")];
        let output = render_diagnostics("", "script", &diagnostics, false);
        assert!(output.contains("aborting due to 2 errors"));
    }
}
