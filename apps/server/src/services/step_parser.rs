// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! STEP (ISO 10303-21) tokenizer and entity scanner.
//!
//! The scanner finds `#id=TYPE(...);` instances without parsing them; the
//! nom tokenizer decodes the attribute list of the ones that matter.

use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, digit1, one_of},
    combinator::{map, map_res, opt, recognize},
    multi::separated_list0,
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("malformed entity #{id}: {reason}")]
pub struct ParseError {
    pub id: u32,
    pub reason: String,
}

/// One STEP attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    /// `#123`
    EntityRef(u32),
    /// `'text'`, still escaped
    String(&'a str),
    Integer(i64),
    Float(f64),
    /// `.ELEMENT.`
    Enum(&'a str),
    List(Vec<Token<'a>>),
    /// `IFCLABEL('x')`
    TypedValue(&'a str, Vec<Token<'a>>),
    /// `$`
    Null,
    /// `*`
    Derived,
}

impl<'a> Token<'a> {
    pub fn as_ref_id(&self) -> Option<u32> {
        match self {
            Token::EntityRef(id) => Some(*id),
            _ => None,
        }
    }

    /// Decoded string, looking through typed wrappers like `IFCLABEL('x')`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Token::String(raw) => Some(decode_string(raw)),
            Token::TypedValue(_, args) => args.first().and_then(Token::as_text),
            _ => None,
        }
    }

    /// Entity references in a list attribute.
    pub fn ref_list(&self) -> Vec<u32> {
        match self {
            Token::List(items) => items.iter().filter_map(Token::as_ref_id).collect(),
            _ => Vec::new(),
        }
    }
}

fn entity_ref(input: &str) -> IResult<&str, Token> {
    map(
        preceded(char('#'), map_res(digit1, |s: &str| s.parse::<u32>())),
        Token::EntityRef,
    )(input)
}

/// `'text'` with `''` standing for a quote.
fn string_literal(input: &str) -> IResult<&str, Token> {
    fn content(input: &str) -> IResult<&str, &str> {
        let bytes = input.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'\'' {
                if bytes.get(i + 1) == Some(&b'\'') {
                    i += 2;
                    continue;
                }
                return Ok((&input[i..], &input[..i]));
            }
            i += 1;
        }
        Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Char,
        )))
    }

    map(delimited(char('\''), content, char('\'')), Token::String)(input)
}

fn integer(input: &str) -> IResult<&str, Token> {
    map_res(recognize(pair(opt(char('-')), digit1)), |s: &str| {
        s.parse::<i64>().map(Token::Integer)
    })(input)
}

/// `3.14`, `1.5E-10` and the bare `0.` form.
fn float(input: &str) -> IResult<&str, Token> {
    map_res(
        recognize(tuple((
            opt(char('-')),
            digit1,
            char('.'),
            opt(digit1),
            opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
        ))),
        |s: &str| s.parse::<f64>().map(Token::Float),
    )(input)
}

fn enum_value(input: &str) -> IResult<&str, Token> {
    map(
        delimited(
            char('.'),
            take_while1(|c: char| c.is_alphanumeric() || c == '_'),
            char('.'),
        ),
        Token::Enum,
    )(input)
}

fn typed_value(input: &str) -> IResult<&str, Token> {
    map(
        pair(
            take_while1(|c: char| c.is_alphanumeric() || c == '_'),
            arguments,
        ),
        |(type_name, args)| Token::TypedValue(type_name, args),
    )(input)
}

fn ws(input: &str) -> IResult<&str, ()> {
    map(take_while(|c: char| c.is_whitespace()), |_| ())(input)
}

fn token(input: &str) -> IResult<&str, Token> {
    delimited(
        ws,
        alt((
            // float before integer: both start with digits
            float,
            integer,
            entity_ref,
            string_literal,
            enum_value,
            map(arguments, Token::List),
            typed_value,
            map(char('$'), |_| Token::Null),
            map(char('*'), |_| Token::Derived),
        )),
        ws,
    )(input)
}

fn arguments(input: &str) -> IResult<&str, Vec<Token>> {
    delimited(
        char('('),
        separated_list0(delimited(ws, char(','), ws), token),
        preceded(ws, char(')')),
    )(input)
}

/// Parse one instance line: `#123=IFCWALL('guid',#5,'Wall',$);`
pub fn parse_entity(input: &str) -> Result<(u32, &str, Vec<Token<'_>>), ParseError> {
    let parsed: IResult<&str, (u32, &str, Vec<Token>)> = tuple((
        delimited(
            ws,
            preceded(char('#'), map_res(digit1, |s: &str| s.parse::<u32>())),
            ws,
        ),
        preceded(
            char('='),
            delimited(
                ws,
                take_while1(|c: char| c.is_alphanumeric() || c == '_'),
                ws,
            ),
        ),
        arguments,
    ))(input);

    match parsed {
        Ok((_, (id, type_name, args))) => Ok((id, type_name, args)),
        Err(e) => Err(ParseError {
            id: leading_id(input).unwrap_or_default(),
            reason: e.to_string(),
        }),
    }
}

fn leading_id(input: &str) -> Option<u32> {
    let digits = input.trim_start().strip_prefix('#')?;
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse().ok()
}

/// Decode the STEP string escapes: `''`, `\X2\...\X0\` (UTF-16 hex)
/// and `\X\hh` (ISO 8859-1).
pub fn decode_string(raw: &str) -> String {
    if !raw.contains('\\') && !raw.contains("''") {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(c) = rest.chars().next() {
        if let Some(after) = rest.strip_prefix("''") {
            out.push('\'');
            rest = after;
        } else if let Some(after) = rest.strip_prefix("\\X2\\") {
            let end = after.find("\\X0\\").unwrap_or(after.len());
            let units: Vec<u16> = after[..end]
                .as_bytes()
                .chunks(4)
                .filter_map(|chunk| std::str::from_utf8(chunk).ok())
                .filter_map(|hex| u16::from_str_radix(hex, 16).ok())
                .collect();
            out.extend(char::decode_utf16(units).map(|r| r.unwrap_or('\u{FFFD}')));
            rest = after.get(end + 4..).unwrap_or_default();
        } else if let Some(byte) = rest
            .strip_prefix("\\X\\")
            .and_then(|after| after.get(..2))
            .and_then(|hex| u8::from_str_radix(hex, 16).ok())
        {
            out.push(char::from(byte));
            rest = &rest[5..];
        } else {
            out.push(c);
            rest = &rest[c.len_utf8()..];
        }
    }
    out
}

/// Finds entity instances without parsing their attributes.
pub struct EntityScanner<'a> {
    content: &'a str,
    position: usize,
}

impl<'a> EntityScanner<'a> {
    pub fn new(content: &'a str) -> Self {
        let position = content
            .find("DATA;")
            .map(|i| i + "DATA;".len())
            .unwrap_or(0);
        Self { content, position }
    }

    /// Next `(id, type_name, line_start, line_end)`; `line_end` is past the `;`.
    pub fn next_entity(&mut self) -> Option<(u32, &'a str, usize, usize)> {
        let bytes = self.content.as_bytes();
        loop {
            let line_start = self.position + memchr::memchr(b'#', &bytes[self.position..])?;
            let line_end = statement_end(bytes, line_start)?;
            self.position = line_end;

            let line = &self.content[line_start..line_end];
            let Some(id) = leading_id(line) else {
                continue;
            };
            let Some(eq) = line.find('=') else {
                continue;
            };
            let after_eq = line[eq + 1..].trim_start();
            let type_end = after_eq
                .find(|c: char| c == '(' || c.is_whitespace())
                .unwrap_or(after_eq.len());
            let type_name = &after_eq[..type_end];
            if type_name.is_empty() {
                continue;
            }
            return Some((id, type_name, line_start, line_end));
        }
    }
}

/// Position after the `;` closing the statement at `start`, skipping quoted text.
fn statement_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut in_string = false;
    for (offset, &b) in bytes[start..].iter().enumerate() {
        match b {
            b'\'' => in_string = !in_string,
            b';' if !in_string => return Some(start + offset + 1),
            _ => {}
        }
    }
    None
}
