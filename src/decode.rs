use std::collections::BTreeMap;

use nom::{
    character::complete::{char, digit1},
    combinator::{opt, recognize},
    sequence::{delimited, pair, terminated},
    IResult, Parser,
};

use crate::{BencodeType, Error, Result};

const MAX_DEPTH: usize = 64;

/// Decode bencoded data, ignoring any bytes after the first complete value
pub fn decode(data: &[u8]) -> Result<BencodeType> {
    decode_prefix(data).map(|(value, _)| value)
}

/// Decode the first bencoded value in `data`, returning it with the unconsumed remainder
pub fn decode_prefix(data: &[u8]) -> Result<(BencodeType, &[u8])> {
    let decoder = Decoder { input: data };
    let (rest, value) = decoder.value(data, 0)?;
    Ok((value, rest))
}

/// Decode bencoded data that must contain exactly one value
pub fn decode_exact(data: &[u8]) -> Result<BencodeType> {
    let (value, rest) = decode_prefix(data)?;
    if !rest.is_empty() {
        return Err(Error::MalformedEncoding {
            offset: data.len() - rest.len(),
            reason: format!("{} trailing bytes after value", rest.len()),
        });
    }
    Ok(value)
}

/// Recursive descent over a remaining-input cursor. `input` is only kept to report offsets.
struct Decoder<'a> {
    input: &'a [u8],
}

impl<'a> Decoder<'a> {
    fn offset(&self, rest: &[u8]) -> usize {
        self.input.len() - rest.len()
    }

    fn malformed(&self, rest: &[u8], reason: impl Into<String>) -> Error {
        Error::MalformedEncoding {
            offset: self.offset(rest),
            reason: reason.into(),
        }
    }

    fn value(&self, rest: &'a [u8], depth: usize) -> Result<(&'a [u8], BencodeType)> {
        if depth > MAX_DEPTH {
            return Err(self.malformed(rest, "nesting too deep"));
        }
        match rest.first() {
            None => Err(self.malformed(rest, "unexpected end of input")),
            Some(b'i') => self.integer(rest),
            Some(b'l') => self.list(rest, depth),
            Some(b'd') => self.dict(rest, depth),
            Some(b'0'..=b'9') => self.byte_string(rest),
            Some(&other) => Err(Error::UnexpectedToken {
                offset: self.offset(rest),
                token: other as char,
            }),
        }
    }

    fn integer(&self, rest: &'a [u8]) -> Result<(&'a [u8], BencodeType)> {
        let (remaining, digits) =
            integer_token(rest).map_err(|_| self.malformed(rest, "invalid integer"))?;
        if digits.starts_with(b"-0") || (digits.starts_with(b"0") && digits.len() > 1) {
            return Err(self.malformed(rest, "integer has leading zero"));
        }
        // `digits` only holds an optional '-' and ASCII digits
        let integer = std::str::from_utf8(digits)
            .ok()
            .and_then(|text| text.parse::<i64>().ok())
            .ok_or_else(|| self.malformed(rest, "integer out of range"))?;
        Ok((remaining, BencodeType::Integer(integer)))
    }

    fn byte_string(&self, rest: &'a [u8]) -> Result<(&'a [u8], BencodeType)> {
        let (remaining, bytes) = self.raw_byte_string(rest)?;
        Ok((remaining, BencodeType::ByteString(bytes.to_vec())))
    }

    fn raw_byte_string(&self, rest: &'a [u8]) -> Result<(&'a [u8], &'a [u8])> {
        let (remaining, digits) =
            length_prefix(rest).map_err(|_| self.malformed(rest, "invalid byte string length"))?;
        let len = std::str::from_utf8(digits)
            .ok()
            .and_then(|text| text.parse::<usize>().ok())
            .ok_or_else(|| self.malformed(rest, "byte string length out of range"))?;
        if len > remaining.len() {
            return Err(Error::TruncatedInput {
                offset: self.offset(rest),
                declared: len,
                available: remaining.len(),
            });
        }
        Ok((&remaining[len..], &remaining[..len]))
    }

    fn list(&self, rest: &'a [u8], depth: usize) -> Result<(&'a [u8], BencodeType)> {
        let mut rest = &rest[1..];
        let mut items = Vec::new();
        loop {
            match rest.first() {
                None => return Err(self.malformed(rest, "unterminated list")),
                Some(b'e') => return Ok((&rest[1..], BencodeType::List(items))),
                Some(_) => {
                    let (remaining, item) = self.value(rest, depth + 1)?;
                    items.push(item);
                    rest = remaining;
                }
            }
        }
    }

    fn dict(&self, rest: &'a [u8], depth: usize) -> Result<(&'a [u8], BencodeType)> {
        let mut rest = &rest[1..];
        let mut dict = BTreeMap::new();
        loop {
            match rest.first() {
                None => return Err(self.malformed(rest, "unterminated dict")),
                Some(b'e') => return Ok((&rest[1..], BencodeType::Dict(dict))),
                Some(_) => {
                    let key_offset = self.offset(rest);
                    let (remaining, key) = self.value(rest, depth + 1)?;
                    let key = match key {
                        BencodeType::ByteString(key) => key,
                        _ => return Err(Error::InvalidKeyType(key_offset)),
                    };
                    let (remaining, value) = self.value(remaining, depth + 1)?;
                    dict.insert(key, value);
                    rest = remaining;
                }
            }
        }
    }
}

/// Match `i<optional minus><digits>e`, yielding the signed digits
fn integer_token(input: &[u8]) -> IResult<&[u8], &[u8]> {
    delimited(char('i'), recognize(pair(opt(char('-')), digit1)), char('e')).parse(input)
}

/// Match `<digits>:`, yielding the digits
fn length_prefix(input: &[u8]) -> IResult<&[u8], &[u8]> {
    terminated(digit1, char(':')).parse(input)
}
