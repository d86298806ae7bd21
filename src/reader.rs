use crate::error::{LispError, LispResult};
use crate::heap::Heap;
use crate::symbol::SymbolTable;
use crate::value::{Obj, ObjId};

/// Reader: parses slisp source text into heap objects.
///
/// Grammar: parenthesized lists, double-quoted strings (contents taken
/// verbatim, no escape processing), decimal integers with an optional
/// leading `-`, the literals `nil` and `t`, and symbols over a fixed
/// character class. `;` starts a comment that runs to end of line.
pub struct Reader<'a> {
    input: &'a [u8],
    pos: usize,
    heap: &'a mut Heap,
    symbols: &'a mut SymbolTable,
}

impl<'a> Reader<'a> {
    pub fn new(input: &'a str, heap: &'a mut Heap, symbols: &'a mut SymbolTable) -> Self {
        Reader {
            input: input.as_bytes(),
            pos: 0,
            heap,
            symbols,
        }
    }

    /// Read one expression. Returns None at EOF.
    pub fn read(&mut self) -> LispResult<Option<ObjId>> {
        self.skip_whitespace_and_comments();
        if self.pos >= self.input.len() {
            return Ok(None);
        }
        let val = self.read_expr()?;
        Ok(Some(val))
    }

    /// Return current byte position in the input.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Read all expressions from the input.
    pub fn read_all(&mut self) -> LispResult<Vec<ObjId>> {
        let mut results = Vec::new();
        while let Some(val) = self.read()? {
            results.push(val);
        }
        Ok(results)
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.pos < self.input.len() {
                let ch = self.input[self.pos];
                if ch == b' ' || ch == b'\t' || ch == b'\n' || ch == b'\r' {
                    self.pos += 1;
                } else {
                    break;
                }
            }
            if self.pos < self.input.len() && self.input[self.pos] == b';' {
                while self.pos < self.input.len() && self.input[self.pos] != b'\n' {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn read_expr(&mut self) -> LispResult<ObjId> {
        self.skip_whitespace_and_comments();

        let ch = self
            .peek()
            .ok_or_else(|| LispError::ReadError("unexpected end of code".into()))?;

        match ch {
            b'(' => self.read_list(),
            b')' => Err(LispError::ReadError("unexpected ')'".into())),
            b'"' => self.read_string(),
            b'-' if self.digit_follows() => self.read_integer(),
            c if c.is_ascii_digit() => self.read_integer(),
            c if is_symbol_char(c) => self.read_word(),
            c => Err(LispError::ReadError(format!(
                "unexpected character '{}'",
                c as char
            ))),
        }
    }

    fn digit_follows(&self) -> bool {
        self.input
            .get(self.pos + 1)
            .is_some_and(|c| c.is_ascii_digit())
    }

    /// Read a list: (a b c). The grammar has no dotted-pair syntax;
    /// improper lists can only be built with `cons`.
    fn read_list(&mut self) -> LispResult<ObjId> {
        self.pos += 1; // consume '('

        let mut elements = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            match self.peek() {
                Some(b')') => {
                    self.pos += 1;
                    break;
                }
                Some(_) => elements.push(self.read_expr()?),
                None => {
                    return Err(LispError::ReadError(
                        "unexpected end of code : expected ')'".into(),
                    ))
                }
            }
        }

        self.heap.list(&elements)
    }

    /// Read a string: everything up to the next '"', verbatim.
    fn read_string(&mut self) -> LispResult<ObjId> {
        self.pos += 1; // consume '"'
        let start = self.pos;
        while self.pos < self.input.len() && self.input[self.pos] != b'"' {
            self.pos += 1;
        }
        if self.pos >= self.input.len() {
            return Err(LispError::ReadError("unterminated string".into()));
        }
        let text = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();
        self.pos += 1; // consume closing '"'
        self.heap.alloc(Obj::Str(text))
    }

    fn read_integer(&mut self) -> LispResult<ObjId> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        while self.pos < self.input.len() && self.input[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| LispError::ReadError("invalid UTF-8".into()))?;
        let n: i64 = text
            .parse()
            .map_err(|_| LispError::ReadError(format!("integer out of range: {}", text)))?;
        self.heap.int(n)
    }

    /// Read a word: `nil`, `t`, or a symbol.
    fn read_word(&mut self) -> LispResult<ObjId> {
        let start = self.pos;
        while self.pos < self.input.len() && is_symbol_char(self.input[self.pos]) {
            self.pos += 1;
        }
        let word = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| LispError::ReadError("invalid UTF-8".into()))?;

        match word {
            "nil" => self.heap.nil(),
            "t" => self.heap.truth(),
            _ => {
                let id = self.symbols.intern(word);
                self.heap.sym(id)
            }
        }
    }
}

/// The fixed symbol character class: `!`, `#`-`'`, `*`-`/`, `<`-`@`,
/// and ASCII letters.
fn is_symbol_char(ch: u8) -> bool {
    ch == b'!'
        || (b'#'..=b'\'').contains(&ch)
        || (b'*'..=b'/').contains(&ch)
        || (b'<'..=b'@').contains(&ch)
        || ch.is_ascii_alphabetic()
}

/// Read a single expression from a string.
pub fn read_str(input: &str, heap: &mut Heap, symbols: &mut SymbolTable) -> LispResult<ObjId> {
    let mut reader = Reader::new(input, heap, symbols);
    reader
        .read()?
        .ok_or_else(|| LispError::ReadError("empty input".into()))
}

/// Read all expressions from a string.
pub fn read_all(input: &str, heap: &mut Heap, symbols: &mut SymbolTable) -> LispResult<Vec<ObjId>> {
    let mut reader = Reader::new(input, heap, symbols);
    reader.read_all()
}

/// Read one expression starting at byte offset `pos`.
/// Returns `Ok(Some((value, new_pos)))` or `Ok(None)` if only
/// whitespace/comments remain.
pub fn read_one_at(
    input: &str,
    pos: usize,
    heap: &mut Heap,
    symbols: &mut SymbolTable,
) -> LispResult<Option<(ObjId, usize)>> {
    let mut reader = Reader::new(&input[pos..], heap, symbols);
    match reader.read()? {
        Some(val) => Ok(Some((val, pos + reader.position()))),
        None => Ok(None),
    }
}
