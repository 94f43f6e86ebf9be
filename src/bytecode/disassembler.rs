//! Bytecode disassembler for debugging.
//!
//! Produces one line per string, function header and instruction, each
//! prefixed with its byte offset in the stream. Names are resolved through
//! the string table and jump targets are printed as absolute offsets.

use crate::bytecode::format::{self, FormatResult, Image, Reader};
use crate::bytecode::instruction::OpCode;
use crate::bytecode::nanvalue::NaNValue;
use crate::error::FormatError;

/// Disassemble a byte stream into a listing.
pub fn disassemble(bytes: &[u8]) -> FormatResult<String> {
    let image = format::decode(bytes)?;
    let mut listing = Listing::new(bytes, &image);
    listing.strings();
    listing.functions()?;
    listing.text()?;
    Ok(listing.output)
}

/// Print the disassembly of a byte stream to stdout.
pub fn print_disassembly(bytes: &[u8]) -> FormatResult<()> {
    print!("{}", disassemble(bytes)?);
    Ok(())
}

struct Listing<'a> {
    bytes: &'a [u8],
    image: &'a Image,
    width: usize,
    output: String,
}

impl<'a> Listing<'a> {
    fn new(bytes: &'a [u8], image: &'a Image) -> Self {
        let width = ((bytes.len() + 1) as f64).log10().ceil() as usize + 1;
        Self {
            bytes,
            image,
            width,
            output: String::new(),
        }
    }

    fn heading(&mut self, offset: usize, text: &str) {
        self.output
            .push_str(&format!("[{:>w$}] {}\n", offset, text, w = self.width));
    }

    fn line(&mut self, offset: usize, text: &str) {
        self.output
            .push_str(&format!("[{:>w$}]   {}\n", offset, text, w = self.width));
    }

    fn strings(&mut self) {
        let Some(offset) = self.image.strings_offset else {
            return;
        };
        self.heading(offset, "STRINGS:");
        let image = self.image;
        for (id, (at, text)) in image.string_offsets.iter().zip(&image.strings).enumerate() {
            self.line(*at, &format!("${}: {}", id, text));
        }
    }

    fn functions(&mut self) -> FormatResult<()> {
        let Some(offset) = self.image.functions_offset else {
            return Ok(());
        };
        self.heading(offset, "FUNCTIONS:");
        let image = self.image;
        for function in &image.functions {
            let name = image.string(function.name.into(), function.offset)?;
            let params: Vec<String> = function
                .params
                .iter()
                .enumerate()
                .map(|(i, p)| format!("${}: {}", i, image.strings[*p as usize]))
                .collect();
            self.heading(function.offset, &format!("{}({}):", name, params.join(", ")));
            self.instructions(function.entry, function.end)?;
        }
        Ok(())
    }

    fn text(&mut self) -> FormatResult<()> {
        let Some(text) = &self.image.text else {
            return Ok(());
        };
        self.heading(text.offset, "TEXT:");
        self.instructions(text.start, text.end)
    }

    fn instructions(&mut self, start: usize, end: usize) -> FormatResult<()> {
        let mut reader = Reader::at(self.bytes, start);
        while reader.offset() < end {
            let at = reader.offset();
            let text = self.instruction(&mut reader)?;
            self.line(at, &text);
        }
        Ok(())
    }

    fn instruction(&self, reader: &mut Reader<'_>) -> FormatResult<String> {
        let op = reader.read_opcode()?;
        let operand_at = reader.offset();
        let text = match op {
            OpCode::Push => format!("push {}", NaNValue::from_word(reader.read_word()?)),
            OpCode::Call => format!("call ({})", reader.read_word()?),
            OpCode::LoadString => {
                let id = reader.read_word()?;
                format!("load_string ${}", self.image.string(id, operand_at)?)
            }
            OpCode::Lookup => {
                let symbol = reader.read_word()?;
                let cache_slot = reader.read_word()?;
                let name = self.image.string(symbol, operand_at)?;
                format!("lookup ${}({}) [cacheSlot={}]", symbol, name, cache_slot)
            }
            OpCode::CreateClosure => {
                let id = reader.read_word()?;
                let captures = reader.read_word()? != 0;
                let function = self.image.function(id, operand_at)?;
                let name = self.image.string(function.name.into(), function.offset)?;
                format!("create_closure {} [capturesScope={}]", name, captures)
            }
            OpCode::Jmp | OpCode::Jz => {
                let stored = reader.read_word()?;
                let target = format::jump_target(operand_at, stored)
                    .filter(|target| *target <= self.bytes.len())
                    .ok_or(FormatError::BadJumpTarget {
                        target: (operand_at as i64).wrapping_add(stored),
                        offset: operand_at,
                    })?;
                format!("{} [{}]", op.mnemonic(), target)
            }
            OpCode::PushArg => format!("push_arg ${}", reader.read_word()?),
            OpCode::PutToScope | OpCode::Bind => {
                let id = reader.read_word()?;
                format!("{} ${}", op.mnemonic(), self.image.string(id, operand_at)?)
            }
            OpCode::AllocObj => {
                let size = reader.read_word()?;
                let tag = reader.read_word()?;
                format!("alloc_obj (size={}, tag={})", size, tag)
            }
            OpCode::AllocList => format!("alloc_list (size={})", reader.read_word()?),
            OpCode::ObjStoreAt
            | OpCode::ObjTagTest
            | OpCode::ObjLoad
            | OpCode::StackAlloc
            | OpCode::StackStore
            | OpCode::StackLoad
            | OpCode::StackFree => format!("{} #{}", op.mnemonic(), reader.read_word()?),
            _ => op.mnemonic().to_string(),
        };
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::format::{Writer, HEADER, SECTION_TEXT};
    use crate::compile_source;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_listing_of_builtin_call() {
        let bytes = compile_source("add(1, 2)").unwrap();
        let listing = disassemble(&bytes).unwrap();
        let expected = "\
[   0] STRINGS:
[  16]   $0: add
[  24] TEXT:
[  48]   lookup $0(add) [cacheSlot=0]
[  72]   push 1
[  88]   push 2
[ 104]   call (2)
";
        assert_eq!(listing, expected);
    }

    #[test]
    fn test_jump_targets_are_absolute() {
        let bytes = compile_source("if (false) { 1 } else { 2 }").unwrap();
        let listing = disassemble(&bytes).unwrap();
        let lines: Vec<&str> = listing.lines().collect();
        // TEXT at 0: lookup-slot word, then push false at 24, jz at 40,
        // push 1 at 56, jmp at 72, push 2 at 88, end at 104.
        assert_eq!(lines[0], "[   0] TEXT:");
        assert_eq!(lines[2], "[  40]   jz [88]");
        assert_eq!(lines[4], "[  72]   jmp [104]");
        assert_eq!(lines[5], "[  88]   push 2");
    }

    #[test]
    fn test_function_headers_name_parameters() {
        let bytes = compile_source("fn pick(a: Int, b: Int) -> Int { b }\npick(1, 2)").unwrap();
        let listing = disassemble(&bytes).unwrap();
        assert!(listing.contains("] FUNCTIONS:\n"));
        assert!(listing.contains("] pick($0: a, $1: b):\n"));
        assert!(listing.contains("]   push_arg $1\n"));
        assert!(listing.contains("]   ret\n"));
        assert!(listing.contains("]   create_closure pick [capturesScope=false]\n"));
        assert!(listing.contains("]   bind $pick\n"));
    }

    /// Instruction lines under the heading that ends with `heading`, as
    /// `(offset, text)` pairs.
    fn section(listing: &str, heading: &str) -> Vec<(usize, String)> {
        let mut out = Vec::new();
        let mut inside = false;
        for line in listing.lines() {
            let close = line.find(']').unwrap();
            let offset: usize = line[1..close].trim().parse().unwrap();
            let rest = &line[close + 1..];
            match rest.strip_prefix("   ") {
                Some(text) if inside => out.push((offset, text.to_string())),
                Some(_) => {}
                None if inside => break,
                None => inside = rest.trim_end().ends_with(heading),
            }
        }
        out
    }

    fn jump_target(text: &str) -> usize {
        let open = text.find('[').unwrap();
        text[open + 1..text.len() - 1].parse().unwrap()
    }

    #[test]
    fn test_listing_decodes_every_emitted_instruction() {
        let source = r#"
            enum Pair { Both(Int, Int), Neither }
            fn pick(p: Pair, k: Int) -> Int {
                let f = fn () -> Int { k }
                match p { Both(a, b) => a + b + f(), Neither => 0 }
            }
            let xs = [10, 20]
            pick(Both(1, 2), 3)
        "#;
        let bytes = compile_source(source).unwrap();
        let listing = disassemble(&bytes).unwrap();

        let text: Vec<String> = section(&listing, "TEXT:").into_iter().map(|(_, t)| t).collect();
        assert_eq!(
            text,
            vec![
                "create_closure pick [capturesScope=false]",
                "bind $pick",
                "alloc_list (size=2)",
                "push 10",
                "obj_store_at #0",
                "push 20",
                "obj_store_at #1",
                "bind $xs",
                "lookup $0(pick) [cacheSlot=0]",
                "alloc_obj (size=2, tag=0)",
                "push 1",
                "obj_store_at #0",
                "push 2",
                "obj_store_at #1",
                "push 3",
                "call (2)",
            ]
        );

        let lambda: Vec<String> = section(&listing, "<lambda>():")
            .into_iter()
            .map(|(_, t)| t)
            .collect();
        assert_eq!(lambda, vec!["lookup $3(k) [cacheSlot=1]", "ret"]);

        let pick = section(&listing, "pick($0: p, $1: k):");
        let texts: Vec<&str> = pick
            .iter()
            .map(|(_, t)| match t.find(" [") {
                Some(cut) if t.starts_with('j') => &t[..cut],
                _ => t.as_str(),
            })
            .collect();
        assert_eq!(
            texts,
            vec![
                "put_to_scope $k",
                "stack_alloc #1",
                "create_closure <lambda> [capturesScope=true]",
                "stack_store #0",
                "push_arg $0",
                "stack_alloc #1",
                "stack_store #1",
                // Both(a, b)
                "stack_load #1",
                "obj_tag_test #0",
                "jz",
                "stack_alloc #2",
                "stack_load #1",
                "obj_load #0",
                "stack_store #2",
                "stack_load #1",
                "obj_load #1",
                "stack_store #3",
                "stack_load #2",
                "stack_load #3",
                "add",
                "stack_load #0",
                "call (0)",
                "add",
                "stack_free #2",
                "jmp",
                // Neither
                "stack_load #1",
                "obj_tag_test #1",
                "jz",
                "push 0",
                "jmp",
                "match_fail",
                "stack_free #1",
                "stack_free #1",
                "ret",
            ]
        );

        // A failed tag test lands on the next case's subject load, the last
        // one on match_fail; both case exits land after match_fail.
        let offset = |index: usize| pick[index].0;
        assert_eq!(jump_target(&pick[9].1), offset(25));
        assert_eq!(jump_target(&pick[27].1), offset(30));
        assert_eq!(jump_target(&pick[24].1), offset(31));
        assert_eq!(jump_target(&pick[29].1), offset(31));
    }

    #[test]
    fn test_text_only_stream() {
        let mut w = Writer::new();
        w.write_word(HEADER);
        w.write_word(SECTION_TEXT);
        w.write_word(0);
        w.write_op(OpCode::Not);
        let listing = disassemble(w.as_slice()).unwrap();
        assert_eq!(listing, "[  0] TEXT:\n[ 24]   not\n");
    }

    #[test]
    fn test_bad_string_id_reports_offset() {
        let mut w = Writer::new();
        w.write_word(HEADER);
        w.write_word(SECTION_TEXT);
        w.write_word(0);
        w.write_op(OpCode::LoadString);
        w.write_word(5);
        assert_eq!(
            disassemble(w.as_slice()),
            Err(FormatError::BadStringId { id: 5, offset: 32 })
        );
    }

    #[test]
    fn test_empty_stream() {
        assert_eq!(disassemble(&[]).unwrap(), "");
    }
}
