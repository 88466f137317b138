//! The command tree: one tagged variant per kind in the taxonomy (`Kind`),
//! owning only the fields that kind's binary layout actually carries.

use crate::error::{GeckoError, Result};
use crate::kind::Kind;

/// Value width for `WriteSerial`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSize {
    U8,
    U16,
    U32,
}

impl ValueSize {
    pub fn from_bits(bits: u8) -> ValueSize {
        match bits & 0b11 {
            0 => ValueSize::U8,
            1 => ValueSize::U16,
            _ => ValueSize::U32,
        }
    }

    pub fn to_bits(self) -> u8 {
        match self {
            ValueSize::U8 => 0,
            ValueSize::U16 => 1,
            ValueSize::U32 => 2,
        }
    }

    pub fn byte_len(self) -> usize {
        match self {
            ValueSize::U8 => 1,
            ValueSize::U16 => 2,
            ValueSize::U32 => 4,
        }
    }
}

/// The arithmetic/logic operation a `GeckoRegisterOperate{,I}` performs.
/// Grounded on the Gecko "register operation" subtype table used across
/// the console-modding ecosystem; `Other` preserves an unrecognized nibble
/// rather than rejecting it, since this subfield is not validated by the
/// original decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticType {
    Add,
    Mul,
    Or,
    And,
    Xor,
    ShiftLeft,
    ShiftRight,
    RotateLeft,
    ArithmeticShiftRight,
    FloatAdd,
    FloatMul,
    Other(u8),
}

impl ArithmeticType {
    pub fn from_nibble(v: u8) -> ArithmeticType {
        match v & 0xF {
            0 => ArithmeticType::Add,
            1 => ArithmeticType::Mul,
            2 => ArithmeticType::Or,
            3 => ArithmeticType::And,
            4 => ArithmeticType::Xor,
            5 => ArithmeticType::ShiftLeft,
            6 => ArithmeticType::ShiftRight,
            7 => ArithmeticType::RotateLeft,
            8 => ArithmeticType::ArithmeticShiftRight,
            10 => ArithmeticType::FloatAdd,
            11 => ArithmeticType::FloatMul,
            other => ArithmeticType::Other(other),
        }
    }

    pub fn to_nibble(self) -> u8 {
        match self {
            ArithmeticType::Add => 0,
            ArithmeticType::Mul => 1,
            ArithmeticType::Or => 2,
            ArithmeticType::And => 3,
            ArithmeticType::Xor => 4,
            ArithmeticType::ShiftLeft => 5,
            ArithmeticType::ShiftRight => 6,
            ArithmeticType::RotateLeft => 7,
            ArithmeticType::ArithmeticShiftRight => 8,
            ArithmeticType::FloatAdd => 10,
            ArithmeticType::FloatMul => 11,
            ArithmeticType::Other(v) => v & 0xF,
        }
    }
}

/// Addressing submode for the `BaseAddress*`/`PointerAddress*` family
/// (the `flags` nibble in their metadata word).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingFlags {
    /// Use the value as-is.
    Direct,
    /// Add the value to the current base/pointer address.
    AddToCurrent,
    /// Load the value from the indirect address it names.
    Indirect,
    Other(u8),
}

impl AddressingFlags {
    pub fn from_nibble(v: u8) -> AddressingFlags {
        match v & 0xF {
            0 => AddressingFlags::Direct,
            1 => AddressingFlags::AddToCurrent,
            2 => AddressingFlags::Indirect,
            other => AddressingFlags::Other(other),
        }
    }

    pub fn to_nibble(self) -> u8 {
        match self {
            AddressingFlags::Direct => 0,
            AddressingFlags::AddToCurrent => 1,
            AddressingFlags::Indirect => 2,
            AddressingFlags::Other(v) => v & 0xF,
        }
    }
}

pub(crate) fn validate_register(value: u8, line: usize) -> Result<u8> {
    if value > 0x0F {
        Err(GeckoError::InvalidRegister { line, value: value as u32 })
    } else {
        Ok(value)
    }
}

/// Masks a 25-bit address field to the natural alignment of `kind`.
pub fn address_mask_for(kind: Kind) -> u32 {
    match kind {
        Kind::Write16
        | Kind::IfEqual16
        | Kind::IfNotEqual16
        | Kind::IfGreaterThan16
        | Kind::IfLesserThan16 => 0x01FFFFFE,
        Kind::Write32
        | Kind::IfEqual32
        | Kind::IfNotEqual32
        | Kind::IfGreaterThan32
        | Kind::IfLesserThan32
        | Kind::AsmInsertXor
        | Kind::BrainslugSearch => 0x01FFFFFC,
        _ => 0x01FFFFFF,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Write8 { address: u32, is_pointer: bool, value: u8, repeat: u16 },
    Write16 { address: u32, is_pointer: bool, value: u16, repeat: u16 },
    Write32 { address: u32, is_pointer: bool, value: u32 },
    WriteStr { address: u32, is_pointer: bool, value: Vec<u8> },
    WriteSerial {
        address: u32,
        is_pointer: bool,
        value: u32,
        value_size: ValueSize,
        repeat: u16,
        address_inc: u16,
        value_inc: u32,
    },

    IfEqual32 { address: u32, is_pointer: bool, endif: bool, value: u32, children: Vec<Command> },
    IfNotEqual32 { address: u32, is_pointer: bool, endif: bool, value: u32, children: Vec<Command> },
    IfGreaterThan32 { address: u32, is_pointer: bool, endif: bool, value: u32, children: Vec<Command> },
    IfLesserThan32 { address: u32, is_pointer: bool, endif: bool, value: u32, children: Vec<Command> },
    IfEqual16 { address: u32, is_pointer: bool, endif: bool, mask: u16, value: u16, children: Vec<Command> },
    IfNotEqual16 { address: u32, is_pointer: bool, endif: bool, mask: u16, value: u16, children: Vec<Command> },
    IfGreaterThan16 { address: u32, is_pointer: bool, endif: bool, mask: u16, value: u16, children: Vec<Command> },
    IfLesserThan16 { address: u32, is_pointer: bool, endif: bool, mask: u16, value: u16, children: Vec<Command> },

    BaseAddressLoad { flags: AddressingFlags, is_pointer: bool, value: u32 },
    BaseAddressSet { flags: AddressingFlags, is_pointer: bool, value: u32 },
    BaseAddressStore { flags: AddressingFlags, is_pointer: bool, value: u32 },
    BaseAddressGetNext { value: u16 },
    PointerAddressLoad { flags: AddressingFlags, is_pointer: bool, value: u32 },
    PointerAddressSet { flags: AddressingFlags, is_pointer: bool, value: u32 },
    PointerAddressStore { flags: AddressingFlags, is_pointer: bool, value: u32 },
    PointerAddressGetNext { value: u16 },

    RepeatSet { repeat: u16, reserved: u8 },
    RepeatExec { flags: u8, reserved: u8 },
    Return { flags: u8, reserved: u8 },
    Goto { flags: u8, line_offset: i16 },
    Gosub { flags: u8, line_offset: i16, register: u8 },

    GeckoRegisterSet { flags: AddressingFlags, is_pointer: bool, register: u8, value: u32 },
    GeckoRegisterLoad { flags: AddressingFlags, is_pointer: bool, register: u8, value: u32 },
    GeckoRegisterStore {
        flags: AddressingFlags,
        is_pointer: bool,
        register: u8,
        repeat: u16,
        value: u32,
    },
    GeckoRegisterOperateI { op_type: ArithmeticType, flags: u8, register: u8, value: u32 },
    GeckoRegisterOperate { op_type: ArithmeticType, flags: u8, register: u8, other_register: u8 },
    MemoryCopyTo { is_pointer: bool, register: u8, other_register: u8, size: u16, value: u32 },
    MemoryCopyFrom { is_pointer: bool, register: u8, other_register: u8, size: u16, value: u32 },

    GeckoIfEqual16 { address: u32, is_pointer: bool, endif: bool, register: u8, other_register: u8, mask: u16, children: Vec<Command> },
    GeckoIfNotEqual16 { address: u32, is_pointer: bool, endif: bool, register: u8, other_register: u8, mask: u16, children: Vec<Command> },
    GeckoIfGreaterThan16 { address: u32, is_pointer: bool, endif: bool, register: u8, other_register: u8, mask: u16, children: Vec<Command> },
    GeckoIfLesserThan16 { address: u32, is_pointer: bool, endif: bool, register: u8, other_register: u8, mask: u16, children: Vec<Command> },

    CounterIfEqual16 { flags: u8, endif: bool, counter: u16, mask: u16, value: u16, children: Vec<Command> },
    CounterIfNotEqual16 { flags: u8, endif: bool, counter: u16, mask: u16, value: u16, children: Vec<Command> },
    CounterIfGreaterThan16 { flags: u8, endif: bool, counter: u16, mask: u16, value: u16, children: Vec<Command> },
    CounterIfLesserThan16 { flags: u8, endif: bool, counter: u16, mask: u16, value: u16, children: Vec<Command> },

    AsmExecute { value: Vec<u8> },
    AsmInsert { address: u32, is_pointer: bool, value: Vec<u8> },
    AsmInsertLink { address: u32, is_pointer: bool, value: Vec<u8> },
    WriteBranch { address: u32, is_pointer: bool, value: u32 },
    Switch,
    AddressRangeCheck { is_pointer: bool, endif: bool, value: u32 },
    Terminator { value: u32 },
    Endif { as_else: bool, num_endifs: u8, value: u32 },
    Exit,
    AsmInsertXor { address: u32, mask: u16, xor_count: u8, value: Vec<u8> },
    BrainslugSearch { address: u32, search_range: (u16, u16), value: Vec<u8>, children: Vec<Command> },
}

impl Command {
    pub fn kind(&self) -> Kind {
        match self {
            Command::Write8 { .. } => Kind::Write8,
            Command::Write16 { .. } => Kind::Write16,
            Command::Write32 { .. } => Kind::Write32,
            Command::WriteStr { .. } => Kind::WriteStr,
            Command::WriteSerial { .. } => Kind::WriteSerial,
            Command::IfEqual32 { .. } => Kind::IfEqual32,
            Command::IfNotEqual32 { .. } => Kind::IfNotEqual32,
            Command::IfGreaterThan32 { .. } => Kind::IfGreaterThan32,
            Command::IfLesserThan32 { .. } => Kind::IfLesserThan32,
            Command::IfEqual16 { .. } => Kind::IfEqual16,
            Command::IfNotEqual16 { .. } => Kind::IfNotEqual16,
            Command::IfGreaterThan16 { .. } => Kind::IfGreaterThan16,
            Command::IfLesserThan16 { .. } => Kind::IfLesserThan16,
            Command::BaseAddressLoad { .. } => Kind::BaseAddressLoad,
            Command::BaseAddressSet { .. } => Kind::BaseAddressSet,
            Command::BaseAddressStore { .. } => Kind::BaseAddressStore,
            Command::BaseAddressGetNext { .. } => Kind::BaseAddressGetNext,
            Command::PointerAddressLoad { .. } => Kind::PointerAddressLoad,
            Command::PointerAddressSet { .. } => Kind::PointerAddressSet,
            Command::PointerAddressStore { .. } => Kind::PointerAddressStore,
            Command::PointerAddressGetNext { .. } => Kind::PointerAddressGetNext,
            Command::RepeatSet { .. } => Kind::RepeatSet,
            Command::RepeatExec { .. } => Kind::RepeatExec,
            Command::Return { .. } => Kind::Return,
            Command::Goto { .. } => Kind::Goto,
            Command::Gosub { .. } => Kind::Gosub,
            Command::GeckoRegisterSet { .. } => Kind::GeckoRegisterSet,
            Command::GeckoRegisterLoad { .. } => Kind::GeckoRegisterLoad,
            Command::GeckoRegisterStore { .. } => Kind::GeckoRegisterStore,
            Command::GeckoRegisterOperateI { .. } => Kind::GeckoRegisterOperateI,
            Command::GeckoRegisterOperate { .. } => Kind::GeckoRegisterOperate,
            Command::MemoryCopyTo { .. } => Kind::MemoryCopyTo,
            Command::MemoryCopyFrom { .. } => Kind::MemoryCopyFrom,
            Command::GeckoIfEqual16 { .. } => Kind::GeckoIfEqual16,
            Command::GeckoIfNotEqual16 { .. } => Kind::GeckoIfNotEqual16,
            Command::GeckoIfGreaterThan16 { .. } => Kind::GeckoIfGreaterThan16,
            Command::GeckoIfLesserThan16 { .. } => Kind::GeckoIfLesserThan16,
            Command::CounterIfEqual16 { .. } => Kind::CounterIfEqual16,
            Command::CounterIfNotEqual16 { .. } => Kind::CounterIfNotEqual16,
            Command::CounterIfGreaterThan16 { .. } => Kind::CounterIfGreaterThan16,
            Command::CounterIfLesserThan16 { .. } => Kind::CounterIfLesserThan16,
            Command::AsmExecute { .. } => Kind::AsmExecute,
            Command::AsmInsert { .. } => Kind::AsmInsert,
            Command::AsmInsertLink { .. } => Kind::AsmInsertLink,
            Command::WriteBranch { .. } => Kind::WriteBranch,
            Command::Switch => Kind::Switch,
            Command::AddressRangeCheck { .. } => Kind::AddressRangeCheck,
            Command::Terminator { .. } => Kind::Terminator,
            Command::Endif { .. } => Kind::Endif,
            Command::Exit => Kind::Exit,
            Command::AsmInsertXor { .. } => Kind::AsmInsertXor,
            Command::BrainslugSearch { .. } => Kind::BrainslugSearch,
        }
    }

    pub fn is_block(&self) -> bool {
        self.kind().is_block()
    }

    pub fn is_multiline(&self) -> bool {
        self.kind().is_multiline()
    }

    pub fn can_preapply(&self) -> bool {
        self.kind().can_preapply()
    }

    /// Children of a block command; empty slice for every non-block kind.
    pub fn children(&self) -> &[Command] {
        match self {
            Command::IfEqual32 { children, .. }
            | Command::IfNotEqual32 { children, .. }
            | Command::IfGreaterThan32 { children, .. }
            | Command::IfLesserThan32 { children, .. }
            | Command::IfEqual16 { children, .. }
            | Command::IfNotEqual16 { children, .. }
            | Command::IfGreaterThan16 { children, .. }
            | Command::IfLesserThan16 { children, .. }
            | Command::GeckoIfEqual16 { children, .. }
            | Command::GeckoIfNotEqual16 { children, .. }
            | Command::GeckoIfGreaterThan16 { children, .. }
            | Command::GeckoIfLesserThan16 { children, .. }
            | Command::CounterIfEqual16 { children, .. }
            | Command::CounterIfNotEqual16 { children, .. }
            | Command::CounterIfGreaterThan16 { children, .. }
            | Command::CounterIfLesserThan16 { children, .. }
            | Command::BrainslugSearch { children, .. } => children,
            _ => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Command>> {
        match self {
            Command::IfEqual32 { children, .. }
            | Command::IfNotEqual32 { children, .. }
            | Command::IfGreaterThan32 { children, .. }
            | Command::IfLesserThan32 { children, .. }
            | Command::IfEqual16 { children, .. }
            | Command::IfNotEqual16 { children, .. }
            | Command::IfGreaterThan16 { children, .. }
            | Command::IfLesserThan16 { children, .. }
            | Command::GeckoIfEqual16 { children, .. }
            | Command::GeckoIfNotEqual16 { children, .. }
            | Command::GeckoIfGreaterThan16 { children, .. }
            | Command::GeckoIfLesserThan16 { children, .. }
            | Command::CounterIfEqual16 { children, .. }
            | Command::CounterIfNotEqual16 { children, .. }
            | Command::CounterIfGreaterThan16 { children, .. }
            | Command::CounterIfLesserThan16 { children, .. }
            | Command::BrainslugSearch { children, .. } => Some(children),
            _ => None,
        }
    }

    /// Length of this command in 8-byte lines, including payload and
    /// children, but excluding any enclosing terminator.
    pub fn virtual_length(&self) -> usize {
        let payload_lines = match self {
            Command::WriteStr { value, .. } => (value.len() + 7) / 8,
            Command::WriteSerial { .. } => 1,
            Command::AsmExecute { value }
            | Command::AsmInsert { value, .. }
            | Command::AsmInsertLink { value, .. } => value.len() / 8,
            Command::AsmInsertXor { value, .. } => 1 + value.len() / 8,
            Command::BrainslugSearch { value, .. } => 1 + value.len() / 8,
            _ => 0,
        };
        let children_lines: usize = self.children().iter().map(Command::virtual_length).sum();
        1 + payload_lines + children_lines
    }

    /// A one-line human-readable description, parameterized by kind and
    /// fields. Not part of the round-trip contract (§4.7); used by
    /// `crate::format::print_map`.
    pub fn describe(&self) -> String {
        let addr = |a: u32, is_pointer: bool| {
            if is_pointer {
                format!("[ptr+0x{a:06X}]")
            } else {
                format!("[base+0x{a:06X}]")
            }
        };
        match self {
            Command::Write8 { address, is_pointer, value, repeat } => {
                format!("write8 {} = 0x{value:02X} (x{})", addr(*address, *is_pointer), *repeat as u32 + 1)
            }
            Command::Write16 { address, is_pointer, value, repeat } => {
                format!("write16 {} = 0x{value:04X} (x{})", addr(*address, *is_pointer), *repeat as u32 + 1)
            }
            Command::Write32 { address, is_pointer, value } => {
                format!("write32 {} = 0x{value:08X}", addr(*address, *is_pointer))
            }
            Command::WriteStr { address, is_pointer, value } => {
                format!("write {} bytes at {}", value.len(), addr(*address, *is_pointer))
            }
            Command::WriteSerial { address, is_pointer, repeat, .. } => {
                format!("serial write at {} (x{})", addr(*address, *is_pointer), *repeat as u32 + 1)
            }
            Command::IfEqual32 { address, is_pointer, value, .. } => {
                format!("if {} == 0x{value:08X}", addr(*address, *is_pointer))
            }
            Command::IfNotEqual32 { address, is_pointer, value, .. } => {
                format!("if {} != 0x{value:08X}", addr(*address, *is_pointer))
            }
            Command::IfGreaterThan32 { address, is_pointer, value, .. } => {
                format!("if {} > 0x{value:08X}", addr(*address, *is_pointer))
            }
            Command::IfLesserThan32 { address, is_pointer, value, .. } => {
                format!("if {} < 0x{value:08X}", addr(*address, *is_pointer))
            }
            Command::IfEqual16 { address, is_pointer, mask, value, .. } => {
                format!("if ({} & 0x{mask:04X}) == 0x{value:04X}", addr(*address, *is_pointer))
            }
            Command::IfNotEqual16 { address, is_pointer, mask, value, .. } => {
                format!("if ({} & 0x{mask:04X}) != 0x{value:04X}", addr(*address, *is_pointer))
            }
            Command::IfGreaterThan16 { address, is_pointer, mask, value, .. } => {
                format!("if ({} & 0x{mask:04X}) > 0x{value:04X}", addr(*address, *is_pointer))
            }
            Command::IfLesserThan16 { address, is_pointer, mask, value, .. } => {
                format!("if ({} & 0x{mask:04X}) < 0x{value:04X}", addr(*address, *is_pointer))
            }
            Command::BaseAddressLoad { value, .. } => format!("load base address <- 0x{value:08X}"),
            Command::BaseAddressSet { value, .. } => format!("set base address = 0x{value:08X}"),
            Command::BaseAddressStore { value, .. } => format!("store base address -> 0x{value:08X}"),
            Command::BaseAddressGetNext { value } => format!("get next base address (step 0x{value:04X})"),
            Command::PointerAddressLoad { value, .. } => format!("load pointer address <- 0x{value:08X}"),
            Command::PointerAddressSet { value, .. } => format!("set pointer address = 0x{value:08X}"),
            Command::PointerAddressStore { value, .. } => format!("store pointer address -> 0x{value:08X}"),
            Command::PointerAddressGetNext { value } => format!("get next pointer address (step 0x{value:04X})"),
            Command::RepeatSet { repeat, .. } => format!("set repeat count = {repeat}"),
            Command::RepeatExec { .. } => "exec repeat".to_string(),
            Command::Return { .. } => "return".to_string(),
            Command::Goto { line_offset, .. } => format!("goto {line_offset:+}"),
            Command::Gosub { line_offset, register, .. } => format!("gosub {line_offset:+} (save to gr{register})"),
            Command::GeckoRegisterSet { register, value, .. } => format!("gr{register} = 0x{value:08X}"),
            Command::GeckoRegisterLoad { register, value, .. } => format!("gr{register} <- [0x{value:08X}]"),
            Command::GeckoRegisterStore { register, value, .. } => format!("[0x{value:08X}] <- gr{register}"),
            Command::GeckoRegisterOperateI { op_type, flags, register, value } => {
                format!("gr{register} {op_type:?}= 0x{value:08X} (flags {flags:02b})")
            }
            Command::GeckoRegisterOperate { op_type, flags, register, other_register } => {
                format!("gr{register} {op_type:?}= gr{other_register} (flags {flags:02b})")
            }
            Command::MemoryCopyTo { register, other_register, size, value, .. } => {
                if *other_register == 0xF {
                    format!("memcpy 0x{size:04X} bytes from [gr{register}] to (base address + 0x{value:08X})")
                } else {
                    format!("memcpy 0x{size:04X} bytes from [gr{register}] to ([gr{other_register}] + 0x{value:08X})")
                }
            }
            Command::MemoryCopyFrom { register, other_register, size, value, .. } => {
                if *other_register == 0xF {
                    format!("memcpy 0x{size:04X} bytes from (base address + 0x{value:08X}) to [gr{register}]")
                } else {
                    format!("memcpy 0x{size:04X} bytes from ([gr{other_register}] + 0x{value:08X}) to [gr{register}]")
                }
            }
            Command::GeckoIfEqual16 { register, mask, .. } => format!("if gr{register} & 0x{mask:04X} == value"),
            Command::GeckoIfNotEqual16 { register, mask, .. } => format!("if gr{register} & 0x{mask:04X} != value"),
            Command::GeckoIfGreaterThan16 { register, mask, .. } => format!("if gr{register} & 0x{mask:04X} > value"),
            Command::GeckoIfLesserThan16 { register, mask, .. } => format!("if gr{register} & 0x{mask:04X} < value"),
            Command::CounterIfEqual16 { counter, value, .. } => format!("if counter(0x{counter:04X}) == 0x{value:04X}"),
            Command::CounterIfNotEqual16 { counter, value, .. } => format!("if counter(0x{counter:04X}) != 0x{value:04X}"),
            Command::CounterIfGreaterThan16 { counter, value, .. } => format!("if counter(0x{counter:04X}) > 0x{value:04X}"),
            Command::CounterIfLesserThan16 { counter, value, .. } => format!("if counter(0x{counter:04X}) < 0x{value:04X}"),
            Command::AsmExecute { value } => format!("execute {} bytes of asm", value.len()),
            Command::AsmInsert { address, is_pointer, value } => {
                format!("insert {} bytes of asm at {}", value.len(), addr(*address, *is_pointer))
            }
            Command::AsmInsertLink { address, is_pointer, value } => {
                format!("insert {} bytes of asm (linked) at {}", value.len(), addr(*address, *is_pointer))
            }
            Command::WriteBranch { address, is_pointer, value } => {
                format!("branch {} -> 0x{value:08X}", addr(*address, *is_pointer))
            }
            Command::Switch => "switch".to_string(),
            Command::AddressRangeCheck { value, .. } => format!("check address range end 0x{value:08X}"),
            Command::Terminator { .. } => "terminator".to_string(),
            Command::Endif { num_endifs, .. } => format!("endif (x{num_endifs})"),
            Command::Exit => "exit".to_string(),
            Command::AsmInsertXor { address, value, .. } => {
                format!("xor-insert {} bytes of asm at [base+0x{address:06X}]", value.len())
            }
            Command::BrainslugSearch { search_range, value, .. } => format!(
                "brainslug search {} bytes in [0x{:08X}, 0x{:08X})",
                value.len(),
                search_range.0,
                search_range.1
            ),
        }
    }
}
