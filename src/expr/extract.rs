//! Pulls one value out of a raw JSON snapshot.
//!
//! A [`JsonParseToken`] program is compiled once per variable during the
//! checking pass; at evaluation time it is replayed here against the events
//! of an incremental scanner. Anything that goes wrong — truncated or
//! malformed snapshot, missing element, no matching key row — makes the
//! extraction come back empty, which the evaluator turns into `Null`.

use crate::expr::any::{Any, JsonPrimitive};
use crate::expr::parser::ConstNode;

/// One instruction of a compiled path-match program.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonParseToken {
    /// The next event must open an object.
    ObjectStart,
    /// Scan the current object for an element with this name.
    ObjectElementStart(String),
    /// The next event must open an array (a keyed table's row list).
    ArrayStart,
    /// Switch to row scanning: find the row whose `"key"` matches the
    /// expected index-key list, then its `"val"` sibling.
    SetModeKeySearch,
    /// The next scalar is the target value.
    SetModeCaptureValue,
}

#[derive(Debug, Clone, PartialEq)]
enum JsonEvent {
    ObjectStart,
    ObjectEnd,
    ArrayStart,
    ArrayEnd,
    ElementName(String),
    Scalar(JsonPrimitive),
}

struct ScanError;

/// Incremental JSON event scanner over a flat string. No value tree is
/// built; numbers are classified into the smallest 32/64-bit class that
/// holds them. Floats are not part of the value model and scan as errors.
struct JsonScanner<'a> {
    src: &'a str,
    pos: usize,
    stack: Vec<Container>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Container {
    Object { expect_key: bool },
    Array,
}

impl<'a> JsonScanner<'a> {
    fn new(src: &'a str) -> JsonScanner<'a> {
        JsonScanner {
            src,
            pos: 0,
            stack: Vec::new(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn next_event(&mut self) -> Result<Option<JsonEvent>, ScanError> {
        loop {
            let b = loop {
                match self.peek() {
                    None => return Ok(None),
                    Some(b) if b.is_ascii_whitespace() => self.pos += 1,
                    Some(b) => break b,
                }
            };
            match b {
                b',' => {
                    self.pos += 1;
                    if let Some(Container::Object { expect_key }) = self.stack.last_mut() {
                        *expect_key = true;
                    }
                }
                b':' => self.pos += 1,
                b'{' => {
                    self.pos += 1;
                    self.stack.push(Container::Object { expect_key: true });
                    return Ok(Some(JsonEvent::ObjectStart));
                }
                b'}' => {
                    self.pos += 1;
                    match self.stack.pop() {
                        Some(Container::Object { .. }) => return Ok(Some(JsonEvent::ObjectEnd)),
                        _ => return Err(ScanError),
                    }
                }
                b'[' => {
                    self.pos += 1;
                    self.stack.push(Container::Array);
                    return Ok(Some(JsonEvent::ArrayStart));
                }
                b']' => {
                    self.pos += 1;
                    match self.stack.pop() {
                        Some(Container::Array) => return Ok(Some(JsonEvent::ArrayEnd)),
                        _ => return Err(ScanError),
                    }
                }
                b'"' => {
                    let s = self.scan_string()?;
                    if let Some(Container::Object { expect_key }) = self.stack.last_mut() {
                        if *expect_key {
                            *expect_key = false;
                            return Ok(Some(JsonEvent::ElementName(s)));
                        }
                    }
                    return Ok(Some(JsonEvent::Scalar(JsonPrimitive::Str(s))));
                }
                b't' | b'f' | b'n' => {
                    let p = self.scan_word()?;
                    return Ok(Some(JsonEvent::Scalar(p)));
                }
                b'-' | b'0'..=b'9' => {
                    let p = self.scan_number()?;
                    return Ok(Some(JsonEvent::Scalar(p)));
                }
                _ => return Err(ScanError),
            }
        }
    }

    fn scan_word(&mut self) -> Result<JsonPrimitive, ScanError> {
        for (word, value) in [
            ("true", JsonPrimitive::Bool(true)),
            ("false", JsonPrimitive::Bool(false)),
            ("null", JsonPrimitive::Null),
        ] {
            if self.src[self.pos..].starts_with(word) {
                self.pos += word.len();
                return Ok(value);
            }
        }
        Err(ScanError)
    }

    fn scan_number(&mut self) -> Result<JsonPrimitive, ScanError> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        if matches!(self.peek(), Some(b'.' | b'e' | b'E')) {
            return Err(ScanError);
        }
        let text = &self.src[start..self.pos];
        if text.starts_with('-') {
            if let Ok(v) = text.parse::<i32>() {
                return Ok(JsonPrimitive::I32(v));
            }
            return text.parse::<i64>().map(JsonPrimitive::I64).map_err(|_| ScanError);
        }
        if let Ok(v) = text.parse::<u32>() {
            return Ok(JsonPrimitive::U32(v));
        }
        text.parse::<u64>().map(JsonPrimitive::U64).map_err(|_| ScanError)
    }

    fn scan_string(&mut self) -> Result<String, ScanError> {
        self.pos += 1; // opening quote
        let mut out = String::new();
        let mut chars = self.src[self.pos..].char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos += i + 1;
                    return Ok(out);
                }
                '\\' => match chars.next() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, 'r')) => out.push('\r'),
                    Some((_, 'b')) => out.push('\u{8}'),
                    Some((_, 'f')) => out.push('\u{c}'),
                    Some((_, '"')) => out.push('"'),
                    Some((_, '\\')) => out.push('\\'),
                    Some((_, '/')) => out.push('/'),
                    Some((_, 'u')) => {
                        let mut code = 0u32;
                        for _ in 0..4 {
                            let d = chars.next().and_then(|(_, h)| h.to_digit(16));
                            code = code * 16 + d.ok_or(ScanError)?;
                        }
                        out.push(char::from_u32(code).ok_or(ScanError)?);
                    }
                    _ => return Err(ScanError),
                },
                c => out.push(c),
            }
        }
        Err(ScanError)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Normal,
    KeySearch,
    KeyCapture,
    ValSearch,
    CaptureValue,
}

/// Replay a compiled program against a snapshot, returning the target
/// scalar. `None` covers every failure: not found, no matching key row,
/// malformed or truncated snapshot.
pub fn extract(
    program: &[JsonParseToken],
    keys: &[ConstNode],
    json: &str,
) -> Option<JsonPrimitive> {
    Machine {
        program,
        pc: 0,
        keys,
        mode: Mode::Normal,
        captured: Vec::new(),
        key_in_list: false,
        value_skip: None,
        row_skip: None,
    }
    .run(json)
}

struct Machine<'a> {
    program: &'a [JsonParseToken],
    pc: usize,
    keys: &'a [ConstNode],
    mode: Mode,
    captured: Vec<JsonPrimitive>,
    key_in_list: bool,
    /// Skipping one off-path value; counts open containers.
    value_skip: Option<u32>,
    /// Skipping the remainder of a rejected key row; counts open containers
    /// starting from the row object itself.
    row_skip: Option<u32>,
}

impl Machine<'_> {
    fn run(mut self, json: &str) -> Option<JsonPrimitive> {
        let mut scanner = JsonScanner::new(json);
        loop {
            while self.mode == Mode::Normal {
                match self.program.get(self.pc) {
                    Some(JsonParseToken::SetModeKeySearch) => {
                        self.mode = Mode::KeySearch;
                        self.pc += 1;
                    }
                    Some(JsonParseToken::SetModeCaptureValue) => {
                        self.mode = Mode::CaptureValue;
                        self.pc += 1;
                    }
                    _ => break,
                }
            }
            let ev = scanner.next_event().ok()??;
            if self.skipping(&ev)? {
                continue;
            }
            match self.mode {
                Mode::Normal => self.step_normal(ev)?,
                Mode::KeySearch => self.step_key_search(ev)?,
                Mode::KeyCapture => self.step_key_capture(ev)?,
                Mode::ValSearch => self.step_val_search(ev)?,
                Mode::CaptureValue => {
                    return match ev {
                        JsonEvent::Scalar(p) => Some(p),
                        _ => None,
                    };
                }
            }
        }
    }

    /// Advance any active skip. Returns Some(true) when the event was
    /// swallowed, None on a structurally impossible event.
    fn skipping(&mut self, ev: &JsonEvent) -> Option<bool> {
        if let Some(depth) = &mut self.value_skip {
            match ev {
                JsonEvent::ObjectStart | JsonEvent::ArrayStart => *depth += 1,
                JsonEvent::Scalar(_) if *depth == 0 => self.value_skip = None,
                JsonEvent::ObjectEnd | JsonEvent::ArrayEnd => {
                    if *depth == 0 {
                        return None;
                    }
                    *depth -= 1;
                    if *depth == 0 {
                        self.value_skip = None;
                    }
                }
                _ => {}
            }
            return Some(true);
        }
        if let Some(depth) = &mut self.row_skip {
            match ev {
                JsonEvent::ObjectStart | JsonEvent::ArrayStart => *depth += 1,
                JsonEvent::ObjectEnd | JsonEvent::ArrayEnd => {
                    *depth -= 1;
                    if *depth == 0 {
                        self.row_skip = None;
                        self.mode = Mode::KeySearch;
                    }
                }
                _ => {}
            }
            return Some(true);
        }
        Some(false)
    }

    fn step_normal(&mut self, ev: JsonEvent) -> Option<()> {
        match (self.program.get(self.pc)?, ev) {
            (JsonParseToken::ObjectStart, JsonEvent::ObjectStart) => self.pc += 1,
            (JsonParseToken::ArrayStart, JsonEvent::ArrayStart) => self.pc += 1,
            (JsonParseToken::ObjectElementStart(want), JsonEvent::ElementName(got)) => {
                if *want == got {
                    self.pc += 1;
                } else {
                    self.value_skip = Some(0);
                }
            }
            _ => return None,
        }
        Some(())
    }

    fn step_key_search(&mut self, ev: JsonEvent) -> Option<()> {
        match ev {
            JsonEvent::ObjectStart | JsonEvent::ObjectEnd => {}
            JsonEvent::ElementName(name) if name == "key" => {
                self.captured.clear();
                self.key_in_list = false;
                self.mode = Mode::KeyCapture;
            }
            JsonEvent::ElementName(_) => self.value_skip = Some(0),
            // End of the row list without a match.
            JsonEvent::ArrayEnd => return None,
            _ => return None,
        }
        Some(())
    }

    fn step_key_capture(&mut self, ev: JsonEvent) -> Option<()> {
        match ev {
            JsonEvent::ArrayStart if !self.key_in_list && self.captured.is_empty() => {
                self.key_in_list = true;
            }
            JsonEvent::Scalar(p) => {
                self.captured.push(p);
                if !self.key_in_list {
                    self.finish_key();
                }
            }
            JsonEvent::ArrayEnd if self.key_in_list => self.finish_key(),
            _ => return None,
        }
        Some(())
    }

    fn finish_key(&mut self) {
        let hit = self.captured.len() == self.keys.len()
            && self
                .keys
                .iter()
                .zip(&self.captured)
                .all(|(want, got)| key_matches(want, got));
        if hit {
            self.mode = Mode::ValSearch;
        } else {
            // Rejected row: skip to its end and keep scanning siblings.
            self.row_skip = Some(1);
            self.mode = Mode::KeySearch;
        }
    }

    fn step_val_search(&mut self, ev: JsonEvent) -> Option<()> {
        match ev {
            JsonEvent::ElementName(name) if name == "val" => self.mode = Mode::Normal,
            JsonEvent::ElementName(_) => self.value_skip = Some(0),
            _ => return None,
        }
        Some(())
    }
}

/// Enum-aware key comparison: the snapshot carries enum member names, the
/// expected constant was already converted to the member's `Int32` value.
fn key_matches(want: &ConstNode, got: &JsonPrimitive) -> bool {
    if let (Some(d), JsonPrimitive::Str(name)) = (&want.descriptor, got) {
        return d.value_of(name).map(Any::Int32).as_ref() == Some(&want.value);
    }
    Any::from_json(want.value.type_name(), got).as_ref() == Some(&want.value)
}
