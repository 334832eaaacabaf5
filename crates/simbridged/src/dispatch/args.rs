//! Whitespace-token cursor over a request's argument tail.

use std::str::FromStr;

use super::errors::CommandError;

/// Cursor over the text following the command word.
///
/// Both execution phases receive a fresh cursor over the same tail, so a
/// deferred handler re-reads the arguments from the start rather than
/// resuming where the immediate phase stopped.
#[derive(Debug)]
pub(crate) struct Args<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Args<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    /// Next whitespace-delimited token, or `None` at the end of input.
    pub(crate) fn token(&mut self) -> Option<&'a str> {
        let rest = &self.text[self.pos..];
        let start = rest.find(|c: char| !c.is_whitespace())?;
        let rest = &rest[start..];
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        self.pos += start + end;
        Some(&rest[..end])
    }

    /// Next token, required.
    pub(crate) fn require(&mut self, what: &'static str) -> Result<&'a str, CommandError> {
        self.token().ok_or(CommandError::Missing { what })
    }

    /// Parses the next token as `T`.
    pub(crate) fn parse<T: FromStr>(&mut self, what: &'static str) -> Result<T, CommandError> {
        let token = self.require(what)?;
        token.parse().map_err(|_| CommandError::Invalid {
            what,
            value: token.to_owned(),
        })
    }

    /// Parses the next token as `T`, or returns `None` at the end of input.
    pub(crate) fn opt<T: FromStr>(
        &mut self,
        what: &'static str,
    ) -> Result<Option<T>, CommandError> {
        let Some(token) = self.token() else {
            return Ok(None);
        };
        token
            .parse()
            .map(Some)
            .map_err(|_| CommandError::Invalid {
                what,
                value: token.to_owned(),
            })
    }

    /// Parses exactly `count` further tokens as `T`.
    pub(crate) fn take<T: FromStr>(
        &mut self,
        count: usize,
        what: &'static str,
    ) -> Result<Vec<T>, CommandError> {
        (0..count).map(|_| self.parse(what)).collect()
    }

    /// Parses every remaining token as `T`.
    pub(crate) fn remaining<T: FromStr>(
        &mut self,
        what: &'static str,
    ) -> Result<Vec<T>, CommandError> {
        let mut values = Vec::new();
        while let Some(value) = self.opt(what)? {
            values.push(value);
        }
        Ok(values)
    }

    /// Unconsumed input with surrounding whitespace trimmed.
    pub(crate) fn rest(&self) -> &'a str {
        self.text[self.pos..].trim()
    }
}
