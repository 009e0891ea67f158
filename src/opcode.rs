//! Numeric opcode assignments for the Zata instruction stream.
//!
//! Bytecode is a flat sequence of signed 32-bit words. Each opcode occupies
//! one word and consumes zero, one, or two trailing operand words (indices,
//! signed jump offsets, or counts). Decoding goes through `FromPrimitive`
//! so an unassigned word surfaces as a bytecode error instead of UB.

#[derive(FromPrimitive, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Opcode {
    // operator dispatch
    BCalc = 0x01,
    UCalc = 0x02,

    // load/store and plain stack shuffling
    LoadConst = 0x20,
    LoadLocal = 0x21,
    StoreLocal = 0x22,
    LoadGlobal = 0x23,
    StoreGlobal = 0x24,
    LoadClosure = 0x25,
    Swap = 0x26,
    Dup = 0x27,
    Pop = 0x28,
    LoadSll = 0x29,

    // control flow
    Jmp = 0x30,
    JmpIfTrue = 0x31,
    JmpIfFalse = 0x32,
    Call = 0x33,
    Ret = 0x34,
    Nop = 0x35,

    // object model
    MakeInstance = 0x40,
    GetAttr = 0x41,
    SetAttr = 0x42,
    GetIter = 0x43,
    NextIter = 0x44,

    // managed heap cells
    Alloc = 0x50,
    Free = 0x51,
    LoadMem = 0x52,
    StoreMem = 0x53,

    // structured exception machinery
    SetupFinally = 0x54,
    SetupCatch = 0x55,
    EndFinally = 0x56,
    BsPop = 0x57,
    Throw = 0x58,

    Halt = 0xFF,
}

impl Opcode {
    /// Mnemonic used in error messages.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::BCalc => "B_CALC",
            Opcode::UCalc => "U_CALC",
            Opcode::LoadConst => "LOAD_CONST",
            Opcode::LoadLocal => "LOAD_LOCAL",
            Opcode::StoreLocal => "STORE_LOCAL",
            Opcode::LoadGlobal => "LOAD_GLOBAL",
            Opcode::StoreGlobal => "STORE_GLOBAL",
            Opcode::LoadClosure => "LOAD_CLOSURE",
            Opcode::Swap => "SWAP",
            Opcode::Dup => "DUP",
            Opcode::Pop => "POP",
            Opcode::LoadSll => "LOAD_SLL",
            Opcode::Jmp => "JMP",
            Opcode::JmpIfTrue => "JMP_IF_TRUE",
            Opcode::JmpIfFalse => "JMP_IF_FALSE",
            Opcode::Call => "CALL",
            Opcode::Ret => "RET",
            Opcode::Nop => "NOP",
            Opcode::MakeInstance => "MAKE_INSTANCE",
            Opcode::GetAttr => "GET_ATTR",
            Opcode::SetAttr => "SET_ATTR",
            Opcode::GetIter => "GET_ITER",
            Opcode::NextIter => "NEXT_ITER",
            Opcode::Alloc => "ALLOC",
            Opcode::Free => "FREE",
            Opcode::LoadMem => "LOAD_MEM",
            Opcode::StoreMem => "STORE_MEM",
            Opcode::SetupFinally => "SETUP_FINALLY",
            Opcode::SetupCatch => "SETUP_CATCH",
            Opcode::EndFinally => "END_FINALLY",
            Opcode::BsPop => "BS_POP",
            Opcode::Throw => "THROW",
            Opcode::Halt => "HALT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::FromPrimitive;

    #[test]
    fn decodes_assigned_words() {
        assert_eq!(Opcode::from_i32(0x01), Some(Opcode::BCalc));
        assert_eq!(Opcode::from_i32(0x20), Some(Opcode::LoadConst));
        assert_eq!(Opcode::from_i32(0x33), Some(Opcode::Call));
        assert_eq!(Opcode::from_i32(0xFF), Some(Opcode::Halt));
    }

    #[test]
    fn rejects_unassigned_words() {
        assert_eq!(Opcode::from_i32(0x00), None);
        assert_eq!(Opcode::from_i32(0x59), None);
        assert_eq!(Opcode::from_i32(0x100), None);
        assert_eq!(Opcode::from_i32(-1), None);
    }
}
