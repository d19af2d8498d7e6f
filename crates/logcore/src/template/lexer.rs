//! Byte-level, lenient, stateless template lexer (§4.3).

use super::token::{ArgumentInfo, ArgumentRef, Destructuring, Span, Token};

/// Parses the `{...}` body between the braces (sigil, reference,
/// alignment, format). Returns `None` for anything the grammar rejects,
/// in which case the caller falls back to treating the whole `{...}`
/// group as literal text.
pub(super) fn parse_argument_content(content: &str) -> Option<ArgumentInfo<'_>> {
    let mut pos = 0usize;
    let mut destructuring = Destructuring::Default;

    if let Some(c) = content.chars().next() {
        if c == '@' {
            destructuring = Destructuring::Destructure;
            pos += c.len_utf8();
        } else if c == '$' {
            destructuring = Destructuring::Stringify;
            pos += c.len_utf8();
        }
    }

    if pos >= content.len() {
        return None;
    }

    let rest = &content[pos..];
    let first = rest.chars().next()?;

    let (reference, consumed) = if first.is_ascii_digit() {
        let digits_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let digits = &rest[..digits_end];
        let value: u32 = digits.parse().ok()?;
        (ArgumentRef::Index(value), digits_end)
    } else {
        if !(first.is_alphabetic() || first == '_' || !first.is_ascii()) {
            return None;
        }
        let mut end = first.len_utf8();
        for c in rest[end..].chars() {
            if c.is_alphanumeric() || c == '_' || !c.is_ascii() {
                end += c.len_utf8();
            } else {
                break;
            }
        }
        (ArgumentRef::Name(&rest[..end]), end)
    };

    let tail = &rest[consumed..];
    if tail.is_empty() {
        return Some(ArgumentInfo {
            destructuring,
            reference,
            alignment: None,
            format: None,
        });
    }

    let (alignment, after_align) = if let Some(body) = tail.strip_prefix(',') {
        let (neg, digits_part) = match body.strip_prefix('-') {
            Some(d) => (true, d),
            None => (false, body),
        };
        let digit_end = digits_part.find(':').unwrap_or(digits_part.len());
        let digits = &digits_part[..digit_end];
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let value: i32 = digits.parse().ok()?;
        if value == 0 {
            return None;
        }
        (Some(if neg { -value } else { value }), &digits_part[digit_end..])
    } else {
        (None, tail)
    };

    let format = if after_align.is_empty() {
        None
    } else if let Some(fmt) = after_align.strip_prefix(':') {
        Some(fmt)
    } else {
        return None;
    };

    Some(ArgumentInfo {
        destructuring,
        reference,
        alignment,
        format,
    })
}

/// Parses a single token starting at byte offset `pos` in `template`.
///
/// Stateless and restartable: the caller drives the cursor by feeding back
/// `span.end` from the previous call. Returns `None` once `pos` reaches the
/// end of the template.
pub fn parse_next(template: &str, pos: usize) -> Option<(Token<'_>, Span)> {
    if pos >= template.len() {
        return None;
    }
    let rest = &template[pos..];
    let bytes = rest.as_bytes();

    if bytes[0] == b'{' {
        if bytes.len() > 1 && bytes[1] == b'{' {
            return Some((Token::EscapedOpenBrace, Span { start: pos, end: pos + 2 }));
        }
        if let Some(close_rel) = rest[1..].find('}') {
            let close = 1 + close_rel;
            let content = &rest[1..close];
            let span = Span {
                start: pos,
                end: pos + close + 1,
            };
            return Some(match parse_argument_content(content) {
                Some(info) => (Token::Argument(info), span),
                None => (Token::Literal(&rest[..=close]), span),
            });
        }
        // No matching `}` anywhere in the remainder: the rest of the
        // template is malformed, lenient literal text.
        return Some((
            Token::Literal(rest),
            Span {
                start: pos,
                end: template.len(),
            },
        ));
    }

    if bytes[0] == b'}' {
        if bytes.len() > 1 && bytes[1] == b'}' {
            return Some((Token::EscapedCloseBrace, Span { start: pos, end: pos + 2 }));
        }
        // A lone `}` is not an escape; pass it through as a one-byte literal.
        return Some((Token::Literal(&rest[..1]), Span { start: pos, end: pos + 1 }));
    }

    let end_rel = rest.find(['{', '}']).unwrap_or(rest.len());
    Some((
        Token::Literal(&rest[..end_rel]),
        Span {
            start: pos,
            end: pos + end_rel,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(template: &str) -> Vec<Token<'_>> {
        let mut pos = 0;
        let mut out = Vec::new();
        while let Some((tok, span)) = parse_next(template, pos) {
            out.push(tok);
            pos = span.end;
        }
        out
    }

    #[test]
    fn plain_literal() {
        assert_eq!(tokens("hello world"), vec![Token::Literal("hello world")]);
    }

    #[test]
    fn escaped_braces() {
        assert_eq!(
            tokens("{{x}}"),
            vec![Token::EscapedOpenBrace, Token::Literal("x"), Token::EscapedCloseBrace]
        );
    }

    #[test]
    fn positional_index_argument() {
        let toks = tokens("value={0}");
        match &toks[1] {
            Token::Argument(info) => assert_eq!(info.reference, ArgumentRef::Index(0)),
            other => panic!("expected argument, got {other:?}"),
        }
    }

    #[test]
    fn named_argument_with_destructure_sigil() {
        let toks = tokens("{@User}");
        match &toks[0] {
            Token::Argument(info) => {
                assert_eq!(info.destructuring, Destructuring::Destructure);
                assert_eq!(info.reference, ArgumentRef::Name("User"));
            }
            other => panic!("expected argument, got {other:?}"),
        }
    }

    #[test]
    fn alignment_and_format() {
        let toks = tokens("{Elapsed,-10:000}");
        match &toks[0] {
            Token::Argument(info) => {
                assert_eq!(info.alignment, Some(-10));
                assert_eq!(info.format, Some("000"));
            }
            other => panic!("expected argument, got {other:?}"),
        }
    }

    #[test]
    fn malformed_groups_become_literal() {
        for template in ["{}", "{ space}", "{w@rld}", "{3.1415}", "{Hello,0}"] {
            let toks = tokens(template);
            assert_eq!(toks, vec![Token::Literal(template)], "template={template}");
        }
    }

    #[test]
    fn unterminated_brace_is_literal_to_end() {
        assert_eq!(tokens("abc {unterminated"), vec![Token::Literal("abc "), Token::Literal("{unterminated")]);
    }

    #[test]
    fn spans_are_contiguous_and_restartable() {
        let template = "a {0} b {{c}} d";
        let mut pos = 0;
        let mut covered = String::new();
        while let Some((_, span)) = parse_next(template, pos) {
            assert_eq!(span.start, pos);
            covered.push_str(&template[span.start..span.end]);
            pos = span.end;
        }
        assert_eq!(covered, template);
    }
}
