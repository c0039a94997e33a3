//! Owned tokens from the html5ever tokenizer.
//!
//! Used where markup is read as a flat token stream rather than a tree: the
//! sanitizer's depth pass and the strict markup reader.

use html5ever::tendril::StrTendril;
use html5ever::tokenizer::{
    BufferQueue, TagKind, Token as RawToken, TokenSink, TokenSinkResult, Tokenizer,
    TokenizerOpts,
};

/// A lexical HTML token. Entities in text and attribute values are decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Text(String),
    StartTag {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    EndTag {
        name: String,
    },
    Comment,
    Doctype,
    /// Input the tokenizer had to repair, e.g. a bare `<` in text.
    Error(String),
}

#[derive(Default)]
struct Collector {
    tokens: Vec<Token>,
}

impl TokenSink for Collector {
    type Handle = ();

    fn process_token(&mut self, token: RawToken, _line_number: u64) -> TokenSinkResult<()> {
        let token = match token {
            RawToken::CharacterTokens(text) => {
                if let Some(Token::Text(previous)) = self.tokens.last_mut() {
                    previous.push_str(&text);
                    return TokenSinkResult::Continue;
                }
                Token::Text(text.to_string())
            }
            RawToken::TagToken(tag) => {
                let name = tag.name.to_string();
                match tag.kind {
                    TagKind::StartTag => Token::StartTag {
                        name,
                        attrs: tag
                            .attrs
                            .into_iter()
                            .map(|a| (a.name.local.to_string(), a.value.to_string()))
                            .collect(),
                        self_closing: tag.self_closing,
                    },
                    TagKind::EndTag => Token::EndTag { name },
                }
            }
            RawToken::CommentToken(_) => Token::Comment,
            RawToken::DoctypeToken(_) => Token::Doctype,
            RawToken::ParseError(message) => Token::Error(message.into_owned()),
            _ => return TokenSinkResult::Continue,
        };
        self.tokens.push(token);
        TokenSinkResult::Continue
    }
}

/// Tokenize `input` completely.
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut queue = BufferQueue::default();
    queue.push_back(StrTendril::from_slice(input));

    let mut tokenizer = Tokenizer::new(Collector::default(), TokenizerOpts::default());
    let _ = tokenizer.feed(&mut queue);
    tokenizer.end();
    tokenizer.sink.tokens
}

/// Escape text content.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape a double-quoted attribute value.
pub fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_and_text() {
        let tokens = tokenize(r#"a<B Href="x&amp;y">b</b><br/>"#);
        assert_eq!(
            tokens,
            vec![
                Token::Text("a".into()),
                Token::StartTag {
                    name: "b".into(),
                    attrs: vec![("href".into(), "x&y".into())],
                    self_closing: false,
                },
                Token::Text("b".into()),
                Token::EndTag { name: "b".into() },
                Token::StartTag {
                    name: "br".into(),
                    attrs: vec![],
                    self_closing: true,
                },
            ]
        );
    }

    #[test]
    fn test_entities_and_comments() {
        let tokens = tokenize("1 &lt; 2<!-- note -->&amp;");
        assert_eq!(
            tokens,
            vec![
                Token::Text("1 < 2".into()),
                Token::Comment,
                Token::Text("&".into()),
            ]
        );
    }

    #[test]
    fn test_bare_angle_bracket_is_reported() {
        let tokens = tokenize("a < b");
        assert!(tokens.iter().any(|t| matches!(t, Token::Error(_))));
        let text: String = tokens
            .iter()
            .filter_map(|t| match t {
                Token::Text(s) => Some(s.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "a < b");
    }

    #[test]
    fn test_escaping() {
        assert_eq!(escape_text("a<b>&c"), "a&lt;b&gt;&amp;c");
        assert_eq!(escape_attr(r#"say "hi" & go"#), "say &quot;hi&quot; &amp; go");
    }
}
