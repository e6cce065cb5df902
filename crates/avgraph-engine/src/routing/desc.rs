//! Reader for textual graph descriptions.
//!
//! ```text
//! [in]split=2[a][b]; [a]null[out0]; [b]fifo,null[out1]
//! ```
//!
//! ## Grammar
//!
//! ```text
//! graph  ::= chain ( ';' chain )*
//! chain  ::= filter ( ',' filter )*
//! filter ::= label* name ( '=' args )? label*
//! label  ::= '[' text ']'
//! name   ::= type ( '@' instance )?
//! args   ::= text up to an unquoted ',' ';' '[' or ']'
//! ```
//!
//! Inside `args`, `'...'` quotes a span and `\` escapes one character.
//! Reading is pure: linking the result against a graph happens in
//! [`super::RoutingGraph`].

use crate::error::EngineError;

// ---------------------------------------------------------------------------
// IR types
// ---------------------------------------------------------------------------

/// One filter occurrence in a description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    /// Labels before the filter name.
    pub inputs: Vec<String>,
    /// Filter type name.
    pub filter: String,
    /// Instance suffix after `@`.
    pub instance: Option<String>,
    /// Arguments after `=`, unquoted.
    pub args: Option<String>,
    /// Labels after the filter.
    pub outputs: Vec<String>,
}

/// A parsed description: `;`-separated chains of `,`-separated filters.
pub type Description = Vec<Vec<FilterSpec>>;

/// Reads a description.
pub fn parse(src: &str) -> Result<Description, EngineError> {
    Reader::new(src).parse_graph()
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// LL(1) reader over the description bytes.
struct Reader<'a> {
    src: &'a str,
    input: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            input: src.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn error(&self, message: impl Into<String>) -> EngineError {
        EngineError::Parse {
            pos: self.pos,
            message: message.into(),
        }
    }

    /// `graph ::= chain ( ';' chain )*`
    fn parse_graph(&mut self) -> Result<Description, EngineError> {
        let mut chains = Vec::new();
        self.skip_ws();
        if self.peek().is_none() {
            return Ok(chains);
        }
        loop {
            chains.push(self.parse_chain()?);
            self.skip_ws();
            match self.peek() {
                Some(b';') => {
                    self.advance();
                    self.skip_ws();
                    if self.peek().is_none() {
                        break;
                    }
                }
                None => break,
                Some(b) => return Err(self.error(format!("unexpected '{}'", b as char))),
            }
        }
        Ok(chains)
    }

    /// `chain ::= filter ( ',' filter )*`
    fn parse_chain(&mut self) -> Result<Vec<FilterSpec>, EngineError> {
        let mut filters = vec![self.parse_filter()?];
        loop {
            self.skip_ws();
            if self.peek() == Some(b',') {
                self.advance();
                filters.push(self.parse_filter()?);
            } else {
                break;
            }
        }
        Ok(filters)
    }

    /// `filter ::= label* name ( '=' args )? label*`
    fn parse_filter(&mut self) -> Result<FilterSpec, EngineError> {
        let inputs = self.parse_labels()?;
        self.skip_ws();

        let start = self.pos;
        while let Some(b) = self.peek() {
            if matches!(b, b'=' | b',' | b';' | b'[' | b']') || b.is_ascii_whitespace() {
                break;
            }
            self.advance();
        }
        let name = &self.src[start..self.pos];
        if name.is_empty() {
            return Err(self.error("expected a filter name"));
        }
        let (filter, instance) = match name.split_once('@') {
            Some((f, i)) if !f.is_empty() && !i.is_empty() => (f, Some(i.to_string())),
            Some(_) => return Err(self.error(format!("bad instance name '{name}'"))),
            None => (name, None),
        };

        self.skip_ws();
        let args = if self.peek() == Some(b'=') {
            self.advance();
            Some(self.parse_args()?)
        } else {
            None
        };

        let outputs = self.parse_labels()?;
        Ok(FilterSpec {
            inputs,
            filter: filter.to_string(),
            instance,
            args,
            outputs,
        })
    }

    /// `label* ` where `label ::= '[' text ']'`
    fn parse_labels(&mut self) -> Result<Vec<String>, EngineError> {
        let mut labels = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() != Some(b'[') {
                return Ok(labels);
            }
            self.advance();
            let start = self.pos;
            while self.peek().is_some_and(|b| b != b']') {
                self.advance();
            }
            if self.peek().is_none() {
                return Err(EngineError::Parse {
                    pos: start - 1,
                    message: "unterminated link label".to_string(),
                });
            }
            let label = self.src[start..self.pos].trim();
            if label.is_empty() {
                return Err(self.error("empty link label"));
            }
            labels.push(label.to_string());
            self.advance(); // ']'
        }
    }

    /// Arguments up to an unquoted terminator, with quotes and escapes removed.
    fn parse_args(&mut self) -> Result<String, EngineError> {
        let mut out = Vec::new();
        loop {
            match self.peek() {
                None | Some(b',' | b';' | b'[' | b']') => break,
                Some(b'\\') => {
                    self.advance();
                    let Some(b) = self.peek() else {
                        return Err(self.error("dangling escape"));
                    };
                    out.push(b);
                    self.advance();
                }
                Some(b'\'') => {
                    self.advance();
                    let start = self.pos;
                    while self.peek().is_some_and(|b| b != b'\'') {
                        self.advance();
                    }
                    if self.peek().is_none() {
                        return Err(EngineError::Parse {
                            pos: start - 1,
                            message: "unterminated quote".to_string(),
                        });
                    }
                    out.extend_from_slice(&self.input[start..self.pos]);
                    self.advance();
                }
                Some(b) => {
                    out.push(b);
                    self.advance();
                }
            }
        }
        let text = String::from_utf8_lossy(&out);
        Ok(text.trim_end().to_string())
    }
}
