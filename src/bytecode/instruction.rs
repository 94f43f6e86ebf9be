//! Opcode definitions for the Verve bytecode format.
//!
//! Every opcode and every operand occupies one word (a little-endian `i64`).

/// Opcodes for the bytecode virtual machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    // ============ Stack & Calls ============
    /// Push an immediate: PUSH <imm>
    Push = 0,
    /// Call the value below the arguments: CALL <argc>
    Call,
    /// Return the top of stack to the caller
    Ret,
    /// Discard the top of stack
    Pop,
    /// Push a string from the string table: LOAD_STRING <string_id>
    LoadString,
    /// Resolve a name through scope, globals and builtins:
    /// LOOKUP <symbol_id> <cache_slot>
    Lookup,
    /// Create a closure: CREATE_CLOSURE <function_id> <captures_scope>
    CreateClosure,

    // ============ Control Flow ============
    /// Unconditional relative jump: JMP <offset>
    Jmp,
    /// Pop and jump when the value is `0` or `false`: JZ <offset>
    Jz,
    /// Fault: no case of a match applied
    MatchFail,

    // ============ Arguments & Scope ============
    /// Push an argument of the current frame: PUSH_ARG <index>
    PushArg,
    /// Copy the named parameter into the frame's scope: PUT_TO_SCOPE <string_id>
    PutToScope,
    /// Pop into the frame's scope: BIND <string_id>
    Bind,

    // ============ Heap Objects ============
    /// ALLOC_OBJ <size> <tag>
    AllocObj,
    /// ALLOC_LIST <size>
    AllocList,
    /// Pop a value into the object below it: OBJ_STORE_AT <index>
    ObjStoreAt,
    /// Pop an object and push whether its tag matches: OBJ_TAG_TEST <tag>
    ObjTagTest,
    /// Pop an object and push one of its fields: OBJ_LOAD <offset>
    ObjLoad,

    // ============ Locals ============
    /// STACK_ALLOC <size>
    StackAlloc,
    /// STACK_STORE <slot>
    StackStore,
    /// STACK_LOAD <slot>
    StackLoad,
    /// STACK_FREE <size>
    StackFree,

    // ============ Integer Arithmetic ============
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,

    // ============ Float Arithmetic ============
    FAdd,
    FSub,
    FMul,
    FDiv,
    FNeg,

    // ============ Comparison ============
    Lt,
    Gt,
    Lte,
    Gte,
    FLt,
    FGt,
    FLte,
    FGte,
    Eq,
    Neq,

    // ============ Logic ============
    Not,
}

impl OpCode {
    /// Number of operand words following the opcode word.
    pub fn operand_count(self) -> usize {
        match self {
            OpCode::Lookup | OpCode::CreateClosure | OpCode::AllocObj => 2,

            OpCode::Push
            | OpCode::Call
            | OpCode::LoadString
            | OpCode::Jmp
            | OpCode::Jz
            | OpCode::PushArg
            | OpCode::PutToScope
            | OpCode::Bind
            | OpCode::AllocList
            | OpCode::ObjStoreAt
            | OpCode::ObjTagTest
            | OpCode::ObjLoad
            | OpCode::StackAlloc
            | OpCode::StackStore
            | OpCode::StackLoad
            | OpCode::StackFree => 1,

            OpCode::Ret
            | OpCode::Pop
            | OpCode::MatchFail
            | OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Div
            | OpCode::Mod
            | OpCode::Neg
            | OpCode::FAdd
            | OpCode::FSub
            | OpCode::FMul
            | OpCode::FDiv
            | OpCode::FNeg
            | OpCode::Lt
            | OpCode::Gt
            | OpCode::Lte
            | OpCode::Gte
            | OpCode::FLt
            | OpCode::FGt
            | OpCode::FLte
            | OpCode::FGte
            | OpCode::Eq
            | OpCode::Neq
            | OpCode::Not => 0,
        }
    }

    /// Total size in bytes of an instruction with this opcode.
    pub fn encoded_len(self) -> usize {
        (1 + self.operand_count()) * super::format::WORD_SIZE
    }

    /// Name used in disassembly listings.
    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Push => "push",
            OpCode::Call => "call",
            OpCode::Ret => "ret",
            OpCode::Pop => "pop",
            OpCode::LoadString => "load_string",
            OpCode::Lookup => "lookup",
            OpCode::CreateClosure => "create_closure",
            OpCode::Jmp => "jmp",
            OpCode::Jz => "jz",
            OpCode::MatchFail => "match_fail",
            OpCode::PushArg => "push_arg",
            OpCode::PutToScope => "put_to_scope",
            OpCode::Bind => "bind",
            OpCode::AllocObj => "alloc_obj",
            OpCode::AllocList => "alloc_list",
            OpCode::ObjStoreAt => "obj_store_at",
            OpCode::ObjTagTest => "obj_tag_test",
            OpCode::ObjLoad => "obj_load",
            OpCode::StackAlloc => "stack_alloc",
            OpCode::StackStore => "stack_store",
            OpCode::StackLoad => "stack_load",
            OpCode::StackFree => "stack_free",
            OpCode::Add => "add",
            OpCode::Sub => "sub",
            OpCode::Mul => "mul",
            OpCode::Div => "div",
            OpCode::Mod => "mod",
            OpCode::Neg => "neg",
            OpCode::FAdd => "fadd",
            OpCode::FSub => "fsub",
            OpCode::FMul => "fmul",
            OpCode::FDiv => "fdiv",
            OpCode::FNeg => "fneg",
            OpCode::Lt => "lt",
            OpCode::Gt => "gt",
            OpCode::Lte => "lte",
            OpCode::Gte => "gte",
            OpCode::FLt => "flt",
            OpCode::FGt => "fgt",
            OpCode::FLte => "flte",
            OpCode::FGte => "fgte",
            OpCode::Eq => "eq",
            OpCode::Neq => "neq",
            OpCode::Not => "not",
        }
    }

    /// Decode an opcode word.
    pub fn from_word(word: i64) -> Option<OpCode> {
        let op = match word {
            0 => OpCode::Push,
            1 => OpCode::Call,
            2 => OpCode::Ret,
            3 => OpCode::Pop,
            4 => OpCode::LoadString,
            5 => OpCode::Lookup,
            6 => OpCode::CreateClosure,
            7 => OpCode::Jmp,
            8 => OpCode::Jz,
            9 => OpCode::MatchFail,
            10 => OpCode::PushArg,
            11 => OpCode::PutToScope,
            12 => OpCode::Bind,
            13 => OpCode::AllocObj,
            14 => OpCode::AllocList,
            15 => OpCode::ObjStoreAt,
            16 => OpCode::ObjTagTest,
            17 => OpCode::ObjLoad,
            18 => OpCode::StackAlloc,
            19 => OpCode::StackStore,
            20 => OpCode::StackLoad,
            21 => OpCode::StackFree,
            22 => OpCode::Add,
            23 => OpCode::Sub,
            24 => OpCode::Mul,
            25 => OpCode::Div,
            26 => OpCode::Mod,
            27 => OpCode::Neg,
            28 => OpCode::FAdd,
            29 => OpCode::FSub,
            30 => OpCode::FMul,
            31 => OpCode::FDiv,
            32 => OpCode::FNeg,
            33 => OpCode::Lt,
            34 => OpCode::Gt,
            35 => OpCode::Lte,
            36 => OpCode::Gte,
            37 => OpCode::FLt,
            38 => OpCode::FGt,
            39 => OpCode::FLte,
            40 => OpCode::FGte,
            41 => OpCode::Eq,
            42 => OpCode::Neq,
            43 => OpCode::Not,
            _ => return None,
        };
        Some(op)
    }

    /// True for `jmp` and `jz`, whose single operand is a relative offset.
    pub fn is_jump(self) -> bool {
        matches!(self, OpCode::Jmp | OpCode::Jz)
    }
}

impl From<OpCode> for i64 {
    fn from(op: OpCode) -> i64 {
        op as u8 as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip() {
        for word in 0..=OpCode::Not as i64 {
            let op = OpCode::from_word(word).expect("valid opcode");
            assert_eq!(word, i64::from(op));
        }
    }

    #[test]
    fn test_invalid_opcode() {
        assert!(OpCode::from_word(-1).is_none());
        assert!(OpCode::from_word(OpCode::Not as i64 + 1).is_none());
    }

    #[test]
    fn test_operand_counts() {
        assert_eq!(OpCode::Lookup.operand_count(), 2);
        assert_eq!(OpCode::AllocObj.operand_count(), 2);
        assert_eq!(OpCode::Push.operand_count(), 1);
        assert_eq!(OpCode::StackFree.operand_count(), 1);
        assert_eq!(OpCode::Ret.operand_count(), 0);
        assert_eq!(OpCode::Call.encoded_len(), 16);
    }
}
