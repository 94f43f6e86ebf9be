//! Encoding and decoding primitives for the word-addressed bytecode format.
//!
//! A stream is a sequence of sections. Each section starts with the
//! [`HEADER`] marker word followed by a section tag word and runs until the
//! next marker or the end of the stream:
//!
//! - **Strings** (`1`): NUL-terminated UTF-8 strings, each padded with `0x01`
//!   bytes up to the next word boundary. String ids are indices in order.
//! - **Functions** (`2`): per function, the [`FUNCTION_HEADER`] marker, the
//!   name string id, the parameter count, one string id per parameter and
//!   then the instruction stream, which ends with `ret`.
//! - **Text** (`3`): the number of lookup cache slots, then the top-level
//!   instruction stream up to the end of the section.
//!
//! Sections with any other tag are skipped.

use crate::bytecode::instruction::OpCode;
use crate::error::FormatError;

/// Every opcode, operand and marker is one little-endian `i64`.
pub const WORD_SIZE: usize = 8;

/// Marks the start of a section.
pub const HEADER: i64 = i64::from_le_bytes([0xFF, b'V', b'E', b'R', b'V', b'E', 0xFF, 0x00]);
/// Marks the start of a function inside the Functions section.
pub const FUNCTION_HEADER: i64 = i64::from_le_bytes([0xFF, b'F', b'N', b'H', b'D', b'R', 0xFF, 0x00]);

pub const SECTION_STRINGS: i64 = 1;
pub const SECTION_FUNCTIONS: i64 = 2;
pub const SECTION_TEXT: i64 = 3;

const STRING_PADDING: u8 = 0x01;

pub type FormatResult<T> = Result<T, FormatError>;

/// Absolute target of a relative jump whose offset word sits at `offset_at`.
pub fn jump_target(offset_at: usize, stored: i64) -> Option<usize> {
    let target = (offset_at as i64).checked_add(stored)?;
    usize::try_from(target).ok()
}

/// A bounds-checked word reader.
#[derive(Clone, Debug)]
pub struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    pub fn at(bytes: &'a [u8], offset: usize) -> Self {
        Self { bytes, offset }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn at_end(&self) -> bool {
        self.offset >= self.bytes.len()
    }

    pub fn read_word(&mut self) -> FormatResult<i64> {
        let word = self
            .peek_word()
            .ok_or(FormatError::UnexpectedEof {
                offset: self.offset,
            })?;
        self.offset += WORD_SIZE;
        Ok(word)
    }

    pub fn peek_word(&self) -> Option<i64> {
        let end = self.offset.checked_add(WORD_SIZE)?;
        let bytes = self.bytes.get(self.offset..end)?;
        let mut buf = [0u8; WORD_SIZE];
        buf.copy_from_slice(bytes);
        Some(i64::from_le_bytes(buf))
    }

    /// Read a word that must be a non-negative count or index.
    pub fn read_index(&mut self) -> FormatResult<usize> {
        let offset = self.offset;
        let value = self.read_word()?;
        usize::try_from(value).map_err(|_| FormatError::BadOperand { value, offset })
    }

    pub fn read_opcode(&mut self) -> FormatResult<OpCode> {
        let offset = self.offset;
        let word = self.read_word()?;
        OpCode::from_word(word).ok_or(FormatError::UnknownOpcode { word, offset })
    }

    /// Read a NUL-terminated string and skip its padding.
    pub fn read_string(&mut self) -> FormatResult<String> {
        let start = self.offset;
        let rest = self.bytes.get(start..).unwrap_or_default();
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(FormatError::UnterminatedString { offset: start })?;
        let text = std::str::from_utf8(&rest[..len])
            .map_err(|_| FormatError::InvalidUtf8 { offset: start })?
            .to_string();
        let consumed = (len + 1).next_multiple_of(WORD_SIZE);
        self.offset = (start + consumed).min(self.bytes.len());
        Ok(text)
    }

    fn at_marker(&self) -> bool {
        matches!(self.peek_word(), Some(HEADER) | Some(FUNCTION_HEADER))
    }

    fn skip_to_header(&mut self) {
        while !self.at_end() {
            match self.peek_word() {
                Some(HEADER) => return,
                Some(_) => self.offset += WORD_SIZE,
                None => self.offset = self.bytes.len(),
            }
        }
    }
}

/// A growable word writer.
#[derive(Clone, Debug, Default)]
pub struct Writer {
    bytes: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    /// Byte offset the next word will be written at.
    pub fn position(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }

    pub fn write_word(&mut self, word: i64) {
        self.bytes.extend_from_slice(&word.to_le_bytes());
    }

    pub fn write_op(&mut self, op: OpCode) {
        self.write_word(op.into());
    }

    pub fn write_string(&mut self, text: &str) {
        self.bytes.extend_from_slice(text.as_bytes());
        self.bytes.push(0);
        while self.bytes.len() % WORD_SIZE != 0 {
            self.bytes.push(STRING_PADDING);
        }
    }

    /// Overwrite the word at `at`, which must already have been written.
    pub fn patch_word(&mut self, at: usize, word: i64) {
        if let Some(slot) = self.bytes.get_mut(at..at + WORD_SIZE) {
            slot.copy_from_slice(&word.to_le_bytes());
        }
    }

    pub fn append(&mut self, other: &Writer) {
        self.bytes.extend_from_slice(&other.bytes);
    }
}

/// A function's header fields and the byte range of its instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionEntry {
    /// Offset of the function header marker.
    pub offset: usize,
    pub name: u32,
    pub params: Vec<u32>,
    /// Offset of the first instruction.
    pub entry: usize,
    /// Offset just past the last instruction.
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSection {
    /// Offset of the section header.
    pub offset: usize,
    pub lookup_slots: usize,
    pub start: usize,
    pub end: usize,
}

/// Section layout of a decoded stream. Instructions are not decoded beyond
/// what is needed to find where each function ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Image {
    pub strings: Vec<String>,
    /// Offset of each string, parallel to `strings`.
    pub string_offsets: Vec<usize>,
    pub functions: Vec<FunctionEntry>,
    pub text: Option<TextSection>,
    pub strings_offset: Option<usize>,
    pub functions_offset: Option<usize>,
}

impl Image {
    pub fn string(&self, id: i64, offset: usize) -> FormatResult<&str> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.strings.get(index))
            .map(String::as_str)
            .ok_or(FormatError::BadStringId { id, offset })
    }

    pub fn function(&self, id: i64, offset: usize) -> FormatResult<&FunctionEntry> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.functions.get(index))
            .ok_or(FormatError::BadFunctionId { id, offset })
    }
}

/// Decode the section layout of a stream.
pub fn decode(bytes: &[u8]) -> FormatResult<Image> {
    let mut image = Image::default();
    let mut reader = Reader::new(bytes);

    while !reader.at_end() {
        let offset = reader.offset();
        if reader.read_word()? != HEADER {
            return Err(FormatError::MissingHeader { offset });
        }
        match reader.read_word()? {
            SECTION_STRINGS => {
                image.strings_offset = Some(offset);
                decode_strings(&mut reader, &mut image)?;
            }
            SECTION_FUNCTIONS => {
                image.functions_offset = Some(offset);
                decode_functions(&mut reader, &mut image)?;
            }
            SECTION_TEXT => {
                if image.text.is_some() {
                    tracing::warn!(offset, "duplicate text section replaces the earlier one");
                }
                image.text = Some(decode_text(&mut reader, offset)?);
            }
            tag => {
                tracing::debug!(tag, offset, "skipping unknown section");
                reader.skip_to_header();
            }
        }
    }

    tracing::trace!(
        strings = image.strings.len(),
        functions = image.functions.len(),
        has_text = image.text.is_some(),
        "decoded bytecode layout"
    );
    Ok(image)
}

fn decode_strings(reader: &mut Reader<'_>, image: &mut Image) -> FormatResult<()> {
    while !reader.at_end() && reader.peek_word() != Some(HEADER) {
        image.string_offsets.push(reader.offset());
        let text = reader.read_string()?;
        image.strings.push(text);
    }
    Ok(())
}

fn decode_functions(reader: &mut Reader<'_>, image: &mut Image) -> FormatResult<()> {
    while !reader.at_end() && reader.peek_word() != Some(HEADER) {
        let offset = reader.offset();
        if reader.read_word()? != FUNCTION_HEADER {
            return Err(FormatError::MissingHeader { offset });
        }
        let name = read_string_id(reader, image)?;
        let argc = reader.read_index()?;
        let mut params = Vec::with_capacity(argc.min(64));
        for _ in 0..argc {
            params.push(read_string_id(reader, image)?);
        }
        let entry = reader.offset();
        skip_instructions(reader)?;
        image.functions.push(FunctionEntry {
            offset,
            name,
            params,
            entry,
            end: reader.offset(),
        });
    }
    Ok(())
}

fn decode_text(reader: &mut Reader<'_>, offset: usize) -> FormatResult<TextSection> {
    let lookup_slots = reader.read_index()?;
    let start = reader.offset();
    skip_instructions(reader)?;
    Ok(TextSection {
        offset,
        lookup_slots,
        start,
        end: reader.offset(),
    })
}

fn read_string_id(reader: &mut Reader<'_>, image: &Image) -> FormatResult<u32> {
    let offset = reader.offset();
    let id = reader.read_word()?;
    image.string(id, offset)?;
    Ok(id as u32)
}

/// Advance over whole instructions until a marker or the end of the stream.
fn skip_instructions(reader: &mut Reader<'_>) -> FormatResult<()> {
    while !reader.at_end() && !reader.at_marker() {
        let op = reader.read_opcode()?;
        for _ in 0..op.operand_count() {
            reader.read_word()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_padding() {
        let mut writer = Writer::new();
        writer.write_string("add");
        writer.write_string("");
        writer.write_string("eight by");
        let bytes = writer.into_vec();
        assert_eq!(bytes.len(), 8 + 8 + 16);
        assert_eq!(&bytes[..8], &[b'a', b'd', b'd', 0, 1, 1, 1, 1]);

        let mut reader = Reader::new(&bytes);
        assert_eq!(reader.read_string().unwrap(), "add");
        assert_eq!(reader.read_string().unwrap(), "");
        assert_eq!(reader.read_string().unwrap(), "eight by");
        assert!(reader.at_end());
    }

    #[test]
    fn test_decode_sections() {
        let mut w = Writer::new();
        w.write_word(HEADER);
        w.write_word(SECTION_STRINGS);
        w.write_string("id");
        w.write_string("x");
        w.write_word(HEADER);
        w.write_word(SECTION_FUNCTIONS);
        w.write_word(FUNCTION_HEADER);
        w.write_word(0);
        w.write_word(1);
        w.write_word(1);
        w.write_op(OpCode::PushArg);
        w.write_word(0);
        w.write_op(OpCode::Ret);
        w.write_word(HEADER);
        w.write_word(SECTION_TEXT);
        w.write_word(0);
        w.write_op(OpCode::Pop);

        let image = decode(w.as_slice()).unwrap();
        assert_eq!(image.strings, vec!["id".to_string(), "x".to_string()]);
        assert_eq!(image.functions.len(), 1);
        let function = &image.functions[0];
        assert_eq!((function.name, function.params.clone()), (0, vec![1]));
        assert_eq!(function.end - function.entry, 3 * WORD_SIZE);
        let text = image.text.unwrap();
        assert_eq!(text.end - text.start, WORD_SIZE);
    }

    #[test]
    fn test_unknown_section_is_skipped() {
        let mut w = Writer::new();
        w.write_word(HEADER);
        w.write_word(99);
        w.write_word(12345);
        w.write_word(HEADER);
        w.write_word(SECTION_TEXT);
        w.write_word(2);
        let image = decode(w.as_slice()).unwrap();
        assert_eq!(image.text.map(|t| t.lookup_slots), Some(2));
    }

    #[test]
    fn test_missing_header() {
        let mut w = Writer::new();
        w.write_word(7);
        assert_eq!(
            decode(w.as_slice()),
            Err(FormatError::MissingHeader { offset: 0 })
        );
    }

    #[test]
    fn test_unknown_opcode_has_offset() {
        let mut w = Writer::new();
        w.write_word(HEADER);
        w.write_word(SECTION_TEXT);
        w.write_word(0);
        w.write_word(9999);
        assert_eq!(
            decode(w.as_slice()),
            Err(FormatError::UnknownOpcode {
                word: 9999,
                offset: 24
            })
        );
    }

    #[test]
    fn test_truncated_operand() {
        let mut w = Writer::new();
        w.write_word(HEADER);
        w.write_word(SECTION_TEXT);
        w.write_word(0);
        w.write_op(OpCode::Lookup);
        w.write_word(0);
        assert_eq!(
            decode(w.as_slice()),
            Err(FormatError::UnexpectedEof { offset: 40 })
        );
    }

    #[test]
    fn test_jump_target() {
        assert_eq!(jump_target(40, 16), Some(56));
        assert_eq!(jump_target(40, -40), Some(0));
        assert_eq!(jump_target(40, -48), None);
    }
}
