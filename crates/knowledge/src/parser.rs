//! Frame source parser
//!
//! Parses blocks of the form
//!
//! ```text
//! pest(aphid, [type: insect, controls: [neem_oil, ladybugs]]).
//! ```
//!
//! A malformed block is reported as a [`AppError::Parse`] and skipped; the
//! parser resumes at the next line that starts a new block.

use crate::frame::{Attribute, AttributeValue, Frame, FrameType, Scalar};
use pestwise_common::errors::AppError;
use pestwise_common::vocabulary::SynonymMap;
use tracing::warn;

type ParseResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Word(String),
    Str(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Dot,
    Invalid(String),
}

impl Tok {
    fn describe(&self) -> String {
        match self {
            Tok::Word(w) => format!("'{}'", w),
            Tok::Str(s) => format!("string \"{}\"", s),
            Tok::LParen => "'('".to_string(),
            Tok::RParen => "')'".to_string(),
            Tok::LBracket => "'['".to_string(),
            Tok::RBracket => "']'".to_string(),
            Tok::Comma => "','".to_string(),
            Tok::Colon => "':'".to_string(),
            Tok::Dot => "'.'".to_string(),
            Tok::Invalid(reason) => reason.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    line: usize,
    /// First token on its line
    line_start: bool,
}

fn is_delimiter(c: char) -> bool {
    matches!(c, '(' | ')' | '[' | ']' | ',' | ':' | '"')
}

fn is_identifier(word: &str) -> bool {
    let mut chars = word.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn lex(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();

    for (idx, raw) in source.lines().enumerate() {
        let line = idx + 1;
        let mut chars = raw.chars().peekable();
        let mut line_start = true;
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() {
                chars.next();
                continue;
            }
            // `%` or `#` opening a token comments out the rest of the line
            if c == '%' || c == '#' {
                break;
            }

            let tok = match c {
                '(' | ')' | '[' | ']' | ',' | ':' => {
                    chars.next();
                    match c {
                        '(' => Tok::LParen,
                        ')' => Tok::RParen,
                        '[' => Tok::LBracket,
                        ']' => Tok::RBracket,
                        ',' => Tok::Comma,
                        _ => Tok::Colon,
                    }
                }
                '"' => {
                    chars.next();
                    let mut value = String::new();
                    let mut closed = false;
                    while let Some(c) = chars.next() {
                        match c {
                            '\\' => match chars.next() {
                                Some('n') => value.push('\n'),
                                Some('t') => value.push('\t'),
                                Some(other) => value.push(other),
                                None => break,
                            },
                            '"' => {
                                closed = true;
                                break;
                            }
                            other => value.push(other),
                        }
                    }
                    if closed {
                        Tok::Str(value)
                    } else {
                        Tok::Invalid("unterminated string".to_string())
                    }
                }
                _ => {
                    let mut word = String::new();
                    while let Some(&c) = chars.peek() {
                        if c.is_whitespace() || is_delimiter(c) {
                            break;
                        }
                        if word == "." && (c == '%' || c == '#') {
                            break;
                        }
                        word.push(c);
                        chars.next();
                    }
                    if word == "." {
                        Tok::Dot
                    } else {
                        Tok::Word(word)
                    }
                }
            };

            tokens.push(Token {
                tok,
                line,
                line_start,
            });
            line_start = false;
        }
    }

    tokens
}

/// Outcome of parsing one source
#[derive(Debug, Default)]
pub struct ParseReport {
    /// Well-formed frames, in source order
    pub frames: Vec<Frame>,
    /// One `Parse` error per skipped block
    pub errors: Vec<AppError>,
}

impl ParseReport {
    /// Number of blocks seen, well-formed or not
    pub fn blocks(&self) -> usize {
        self.frames.len() + self.errors.len()
    }
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    synonyms: &'a SynonymMap,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|t| &t.tok)
    }

    fn current_line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn error(&self, message: impl Into<String>) -> AppError {
        AppError::Parse {
            line: self.current_line(),
            message: message.into(),
        }
    }

    fn unexpected(&self, expected: &str) -> AppError {
        match self.peek() {
            Some(tok) => self.error(format!("expected {}, found {}", expected, tok.describe())),
            None => self.error(format!("expected {}, found end of input", expected)),
        }
    }

    fn eat(&mut self, want: &Tok) -> bool {
        if self.peek() == Some(want) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, want: &Tok, expected: &str) -> ParseResult<()> {
        if self.eat(want) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    /// A quoted string, or a run of bare words joined by single spaces
    fn value_text(&mut self, expected: &str) -> ParseResult<(String, bool)> {
        if let Some(Tok::Str(s)) = self.peek() {
            let s = s.clone();
            self.pos += 1;
            return Ok((s, true));
        }

        let mut words = Vec::new();
        while let Some(Tok::Word(w)) = self.peek() {
            words.push(w.clone());
            self.pos += 1;
        }
        if words.is_empty() {
            return Err(self.unexpected(expected));
        }
        Ok((words.join(" "), false))
    }

    fn string_list(&mut self) -> ParseResult<Vec<String>> {
        self.expect(&Tok::LBracket, "'['")?;
        let mut items = Vec::new();
        loop {
            if self.eat(&Tok::RBracket) {
                return Ok(items);
            }
            let (item, _) = self.value_text("list item")?;
            items.push(item);
            if self.eat(&Tok::Comma) {
                continue;
            }
            if self.eat(&Tok::RBracket) {
                return Ok(items);
            }
            return Err(self.unexpected("',' or ']' in list"));
        }
    }

    fn attribute_list(&mut self) -> ParseResult<Vec<Attribute>> {
        self.expect(&Tok::LBracket, "'[' before attributes")?;
        let mut attributes: Vec<Attribute> = Vec::new();
        loop {
            if self.eat(&Tok::RBracket) {
                return Ok(attributes);
            }

            let name = match self.peek() {
                Some(Tok::Word(w)) if is_identifier(w) => w.to_lowercase(),
                Some(Tok::Str(s)) => s.trim().to_lowercase(),
                _ => return Err(self.unexpected("attribute name")),
            };
            self.pos += 1;
            self.expect(&Tok::Colon, "':' after attribute name")?;

            let value = if self.peek() == Some(&Tok::LBracket) {
                AttributeValue::List(self.string_list()?)
            } else {
                let (text, quoted) = self.value_text("attribute value")?;
                AttributeValue::Scalar(if quoted { Scalar::Text(text) } else { scalar(text) })
            };

            // A repeated key keeps its first position and takes the later value
            match attributes.iter_mut().find(|a| a.name == name) {
                Some(existing) => existing.value = value,
                None => attributes.push(Attribute { name, value }),
            }

            if self.eat(&Tok::Comma) {
                continue;
            }
            if self.eat(&Tok::RBracket) {
                return Ok(attributes);
            }
            return Err(self.unexpected("',' or ']' after attribute"));
        }
    }

    fn block(&mut self) -> ParseResult<Frame> {
        let line = self.current_line();
        let frame_type = match self.peek() {
            Some(Tok::Word(w)) if is_identifier(w) => FrameType::from(w.as_str()),
            _ => return Err(self.unexpected("frame type")),
        };
        self.pos += 1;
        self.expect(&Tok::LParen, "'(' after frame type")?;

        let (name, _) = self.value_text("frame name")?;
        let key = self.synonyms.key(&name);
        if key.is_empty() {
            return Err(self.error("frame name has no usable characters"));
        }

        let attributes = if self.eat(&Tok::Comma) {
            self.attribute_list()?
        } else {
            Vec::new()
        };
        self.expect(&Tok::RParen, "')' closing the frame")?;
        self.eat(&Tok::Dot);

        Ok(Frame {
            id: format!("{}:{}", frame_type, key),
            frame_type,
            name,
            attributes,
            line,
        })
    }

    /// Skip to the next line-initial `identifier (` after `from`
    fn resync(&mut self, from: usize) {
        let mut pos = from + 1;
        while pos < self.tokens.len() {
            let token = &self.tokens[pos];
            let starts_block = token.line_start
                && matches!(&token.tok, Tok::Word(w) if is_identifier(w))
                && matches!(self.tokens.get(pos + 1).map(|t| &t.tok), Some(Tok::LParen));
            if starts_block {
                break;
            }
            pos += 1;
        }
        self.pos = pos;
    }
}

/// Bare values: integers and booleans are typed, everything else is text
fn scalar(text: String) -> Scalar {
    if let Ok(i) = text.parse::<i64>() {
        return Scalar::Int(i);
    }
    match text.to_lowercase().as_str() {
        "true" | "yes" => Scalar::Bool(true),
        "false" | "no" => Scalar::Bool(false),
        _ => Scalar::Text(text),
    }
}

/// Parse every block in `source`. Never fails; malformed blocks end up in
/// [`ParseReport::errors`].
pub fn parse_frames(source: &str, synonyms: &SynonymMap) -> ParseReport {
    let mut parser = Parser {
        tokens: lex(source),
        pos: 0,
        synonyms,
    };
    let mut report = ParseReport::default();

    while parser.pos < parser.tokens.len() {
        let start = parser.pos;
        match parser.block() {
            Ok(frame) => report.frames.push(frame),
            Err(err) => {
                warn!(error = %err, "Skipping malformed frame block");
                report.errors.push(err);
                parser.resync(start);
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> ParseReport {
        parse_frames(source, &SynonymMap::default())
    }

    #[test]
    fn test_parse_simple_frame() {
        let report = parse("pest(aphid, [type: insect, controls: [neem_oil, ladybugs]])");
        assert!(report.errors.is_empty());
        assert_eq!(report.frames.len(), 1);

        let frame = &report.frames[0];
        assert_eq!(frame.id, "pest:aphid");
        assert_eq!(frame.frame_type, FrameType::Pest);
        assert_eq!(frame.get("type").and_then(|v| v.as_text()), Some("insect"));
        assert_eq!(
            frame.list("controls").unwrap(),
            &["neem_oil".to_string(), "ladybugs".to_string()]
        );
    }

    #[test]
    fn test_parse_extended_syntax() {
        let source = r#"
% leading comment
# another comment
crop("Sukuma Wiki", [
    soil_ph: "6.0 to 7.5",
    days_to_maturity: 60,
    perennial: no,
    notes: "says \"plant early\"",
    pests: [aphid, "diamondback moth", cabbage looper],
]).
"#;
        let report = parse(source);
        assert!(report.errors.is_empty(), "{:?}", report.errors);
        let frame = &report.frames[0];
        assert_eq!(frame.id, "crop:kale");
        assert_eq!(frame.name, "Sukuma Wiki");
        assert_eq!(frame.line, 4);
        assert_eq!(frame.get("days_to_maturity"), Some(&AttributeValue::Scalar(Scalar::Int(60))));
        assert_eq!(frame.get("perennial"), Some(&AttributeValue::Scalar(Scalar::Bool(false))));
        assert_eq!(frame.get("notes").and_then(|v| v.as_text()), Some("says \"plant early\""));
        assert_eq!(frame.list("pests").unwrap()[2], "cabbage looper");
    }

    #[test]
    fn test_trailing_comments() {
        let source = "pest(aphid, [type: insect]). % sap sucker\n\
                      pest(whitefly, [ # tiny and white\n\
                          type: insect, loss: 40%\n\
                      ]).# end\n";
        let report = parse(source);
        assert!(report.errors.is_empty(), "{:?}", report.errors);
        assert_eq!(report.frames.len(), 2);
        assert_eq!(report.frames[1].get("loss").and_then(|v| v.as_text()), Some("40%"));
    }

    #[test]
    fn test_frame_without_attributes() {
        let report = parse("practice(crop_rotation)");
        assert_eq!(report.frames.len(), 1);
        assert!(report.frames[0].attributes.is_empty());
    }

    #[test]
    fn test_malformed_block_is_skipped() {
        let source = "pest(aphid, [type: insect, controls: [neem_oil, ladybugs]])\n\
                      pest(whitefly, [type insect])\n\
                      crop(tomato, [pests: [aphid]])\n";
        let report = parse(source);
        assert_eq!(report.frames.len(), 2);
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(report.errors[0], AppError::Parse { line: 2, .. }));
        assert_eq!(report.frames[1].id, "crop:tomato");
    }

    #[test]
    fn test_unclosed_block_does_not_swallow_next() {
        let source = "pest(aphid, [controls: [neem_oil\n\
                      crop(maize, [pests: [fall_armyworm]])\n";
        let report = parse(source);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.frames.len(), 1);
        assert_eq!(report.frames[0].id, "crop:maize");
    }

    #[test]
    fn test_unterminated_string() {
        let report = parse("pest(\"aphid, [type: insect])\npest(mealybug)");
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.frames.len(), 1);
        assert_eq!(report.blocks(), 2);
    }

    #[test]
    fn test_repeated_attribute_keeps_later_value() {
        let report = parse("soil(clay, [drainage: poor, drainage: slow])");
        let frame = &report.frames[0];
        assert_eq!(frame.attributes.len(), 1);
        assert_eq!(frame.get("drainage").and_then(|v| v.as_text()), Some("slow"));
    }

    #[test]
    fn test_garbage_only() {
        let report = parse("this is not a frame\n)))");
        assert!(report.frames.is_empty());
        assert!(!report.errors.is_empty());
    }
}
