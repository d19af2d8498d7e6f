//! Message template parsing (§4.3): a lenient, byte-level, heap-free
//! tokenizer for Serilog-style templates, e.g. `"{User} logged in from
//! {@Request,-20:json}"`.

mod lexer;
mod token;

pub use token::{ArgumentInfo, ArgumentRef, Destructuring, Span, Token};

/// Stateless cursor over a template string. Cheap to construct and restart;
/// holds no heap allocation of its own.
#[derive(Debug, Clone, Copy)]
pub struct TemplateParser<'a> {
    template: &'a str,
    pos: usize,
}

impl<'a> TemplateParser<'a> {
    pub fn new(template: &'a str) -> Self {
        Self { template, pos: 0 }
    }

    /// Resumes parsing from an arbitrary byte offset (e.g. one previously
    /// returned as a [`Span::end`]).
    pub fn resume_at(template: &'a str, pos: usize) -> Self {
        Self { template, pos }
    }

    /// Parses and returns the next token, advancing the internal cursor.
    pub fn next_token(&mut self) -> Option<(Token<'a>, Span)> {
        let (tok, span) = lexer::parse_next(self.template, self.pos)?;
        self.pos = span.end;
        Some((tok, span))
    }
}

impl<'a> Iterator for TemplateParser<'a> {
    type Item = (Token<'a>, Span);

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iterates_all_tokens() {
        let parser = TemplateParser::new("{Name} is {Age,5} years old");
        let tokens: Vec<_> = parser.map(|(t, _)| t).collect();
        assert_eq!(tokens.len(), 4);
    }

    #[test]
    fn resume_at_continues_from_prior_span() {
        let template = "a{0}b";
        let mut parser = TemplateParser::new(template);
        let (_, span) = parser.next_token().unwrap();
        let mut resumed = TemplateParser::resume_at(template, span.end);
        let (tok, _) = resumed.next_token().unwrap();
        assert!(matches!(tok, Token::Argument(_)));
    }
}
