//! Opcode table for the modeled instruction set
//!
//! Only the subset the translator lowers is listed. Disassemblies may contain
//! other opnames; those survive loading as raw strings and are rejected by
//! the translator with an unknown-opcode error carrying the offset.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    // Constants and names
    LoadConst,
    LoadName,
    LoadGlobal,
    LoadFast,
    StoreName,
    StoreGlobal,
    StoreFast,

    // Attributes
    LoadAttr,
    StoreAttr,

    // Arithmetic
    BinaryAdd,

    // Calls
    CallFunction,
    LoadMethod,
    CallMethod,
    MakeFunction,

    // Iteration
    GetIter,
    ForIter,

    // Control flow
    PopJumpIfFalse,
    PopJumpIfTrue,
    JumpIfFalseOrPop,
    JumpIfTrueOrPop,
    JumpAbsolute,
    JumpForward,
    ReturnValue,

    // Class building
    LoadBuildClass,

    // Containers
    BuildTuple,
    BuildConstKeyMap,

    // Stack shuffles and padding
    PopTop,
    DupTop,
    RotTwo,
    Nop,
    SetupAnnotations,
}

impl Opcode {
    pub fn name(&self) -> &'static str {
        match self {
            Opcode::LoadConst => "LOAD_CONST",
            Opcode::LoadName => "LOAD_NAME",
            Opcode::LoadGlobal => "LOAD_GLOBAL",
            Opcode::LoadFast => "LOAD_FAST",
            Opcode::StoreName => "STORE_NAME",
            Opcode::StoreGlobal => "STORE_GLOBAL",
            Opcode::StoreFast => "STORE_FAST",
            Opcode::LoadAttr => "LOAD_ATTR",
            Opcode::StoreAttr => "STORE_ATTR",
            Opcode::BinaryAdd => "BINARY_ADD",
            Opcode::CallFunction => "CALL_FUNCTION",
            Opcode::LoadMethod => "LOAD_METHOD",
            Opcode::CallMethod => "CALL_METHOD",
            Opcode::MakeFunction => "MAKE_FUNCTION",
            Opcode::GetIter => "GET_ITER",
            Opcode::ForIter => "FOR_ITER",
            Opcode::PopJumpIfFalse => "POP_JUMP_IF_FALSE",
            Opcode::PopJumpIfTrue => "POP_JUMP_IF_TRUE",
            Opcode::JumpIfFalseOrPop => "JUMP_IF_FALSE_OR_POP",
            Opcode::JumpIfTrueOrPop => "JUMP_IF_TRUE_OR_POP",
            Opcode::JumpAbsolute => "JUMP_ABSOLUTE",
            Opcode::JumpForward => "JUMP_FORWARD",
            Opcode::ReturnValue => "RETURN_VALUE",
            Opcode::LoadBuildClass => "LOAD_BUILD_CLASS",
            Opcode::BuildTuple => "BUILD_TUPLE",
            Opcode::BuildConstKeyMap => "BUILD_CONST_KEY_MAP",
            Opcode::PopTop => "POP_TOP",
            Opcode::DupTop => "DUP_TOP",
            Opcode::RotTwo => "ROT_TWO",
            Opcode::Nop => "NOP",
            Opcode::SetupAnnotations => "SETUP_ANNOTATIONS",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "LOAD_CONST" => Some(Opcode::LoadConst),
            "LOAD_NAME" => Some(Opcode::LoadName),
            "LOAD_GLOBAL" => Some(Opcode::LoadGlobal),
            "LOAD_FAST" => Some(Opcode::LoadFast),
            "STORE_NAME" => Some(Opcode::StoreName),
            "STORE_GLOBAL" => Some(Opcode::StoreGlobal),
            "STORE_FAST" => Some(Opcode::StoreFast),
            "LOAD_ATTR" => Some(Opcode::LoadAttr),
            "STORE_ATTR" => Some(Opcode::StoreAttr),
            "BINARY_ADD" => Some(Opcode::BinaryAdd),
            "CALL_FUNCTION" => Some(Opcode::CallFunction),
            "LOAD_METHOD" => Some(Opcode::LoadMethod),
            "CALL_METHOD" => Some(Opcode::CallMethod),
            "MAKE_FUNCTION" => Some(Opcode::MakeFunction),
            "GET_ITER" => Some(Opcode::GetIter),
            "FOR_ITER" => Some(Opcode::ForIter),
            "POP_JUMP_IF_FALSE" => Some(Opcode::PopJumpIfFalse),
            "POP_JUMP_IF_TRUE" => Some(Opcode::PopJumpIfTrue),
            "JUMP_IF_FALSE_OR_POP" => Some(Opcode::JumpIfFalseOrPop),
            "JUMP_IF_TRUE_OR_POP" => Some(Opcode::JumpIfTrueOrPop),
            "JUMP_ABSOLUTE" => Some(Opcode::JumpAbsolute),
            "JUMP_FORWARD" => Some(Opcode::JumpForward),
            "RETURN_VALUE" => Some(Opcode::ReturnValue),
            "LOAD_BUILD_CLASS" => Some(Opcode::LoadBuildClass),
            "BUILD_TUPLE" => Some(Opcode::BuildTuple),
            "BUILD_CONST_KEY_MAP" => Some(Opcode::BuildConstKeyMap),
            "POP_TOP" => Some(Opcode::PopTop),
            "DUP_TOP" => Some(Opcode::DupTop),
            "ROT_TWO" => Some(Opcode::RotTwo),
            "NOP" => Some(Opcode::Nop),
            "SETUP_ANNOTATIONS" => Some(Opcode::SetupAnnotations),
            _ => None,
        }
    }
}
