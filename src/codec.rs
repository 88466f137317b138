//! Binary/text-agnostic encode and decode of the command tree. Both codecs
//! instantiate the same algorithm over a [`LineReader`]/[`LineWriter`]; only
//! how an 8-byte line is physically represented differs between them.

use crate::command::{AddressingFlags, ArithmeticType, Command, ValueSize};
use crate::cursor::{LineReader, LineWriter};
use crate::error::Result;
use crate::kind::Kind;

fn pack_opcode(kind: Kind, is_pointer: bool, endif: bool) -> u8 {
    kind.opcode() | if is_pointer { 0x10 } else { 0 } | if endif { 0x01 } else { 0 }
}

fn unpack_flags(opcode_byte: u8) -> (bool, bool) {
    (opcode_byte & 0x10 != 0, opcode_byte & 0x01 != 0)
}

fn line_from(metadata: u32, info: u32) -> [u8; 8] {
    let mut out = [0u8; 8];
    out[0..4].copy_from_slice(&metadata.to_be_bytes());
    out[4..8].copy_from_slice(&info.to_be_bytes());
    out
}

fn split_line(line: [u8; 8]) -> (u32, u32) {
    let metadata = u32::from_be_bytes([line[0], line[1], line[2], line[3]]);
    let info = u32::from_be_bytes([line[4], line[5], line[6], line[7]]);
    (metadata, info)
}

/// Peek-decodes children of a block command up to (but not consuming) a
/// `Terminator`/`Exit` sibling at the enclosing level.
fn decode_children<R: LineReader>(r: &mut R) -> Result<Vec<Command>> {
    let mut children = Vec::new();
    loop {
        let Some(op) = r.peek_opcode()? else { break };
        let masked = op & if op & 0xF0 == 0xF0 { 0xFE } else { 0xEE };
        let masked = if masked == 0xF2 { 0xF4 } else { masked };
        if masked == Kind::Terminator.opcode() || masked == Kind::Exit.opcode() {
            break;
        }
        children.push(decode_command(r)?);
    }
    Ok(children)
}

fn encode_children<W: LineWriter>(w: &mut W, children: &[Command]) {
    for child in children {
        encode_command(w, child);
    }
}

pub fn decode_command<R: LineReader>(r: &mut R) -> Result<Command> {
    let line_no = r.line_no();
    let line = r.read_line()?;
    let (metadata, info) = split_line(line);
    let opcode_byte = (metadata >> 24) as u8;
    let kind = Kind::from_opcode(opcode_byte, line_no)?;
    let (is_pointer, endif) = unpack_flags(opcode_byte);
    let low24 = metadata & 0x00FF_FFFF;
    let address = low24 & 0x01FF_FFFF;
    let reg = |v: u32| -> Result<u8> { crate::command::validate_register(v as u8, line_no) };
    log::trace!("line {line_no}: decoding {kind:?} (address 0x{address:06X})");

    Ok(match kind {
        Kind::Write8 => Command::Write8 {
            address,
            is_pointer,
            value: info as u8,
            repeat: (info >> 16) as u16,
        },
        Kind::Write16 => Command::Write16 {
            address,
            is_pointer,
            value: info as u16,
            repeat: (info >> 16) as u16,
        },
        Kind::Write32 => Command::Write32 { address, is_pointer, value: info },
        Kind::WriteStr => {
            let n = info as usize;
            let lines = (n + 7) / 8;
            let payload = r.read_payload(lines)?;
            Command::WriteStr { address, is_pointer, value: payload[..n].to_vec() }
        }
        Kind::WriteSerial => {
            let sub = r.read_line()?;
            let (sub_metadata, sub_info) = split_line(sub);
            Command::WriteSerial {
                address,
                is_pointer,
                value: info,
                value_size: ValueSize::from_bits((sub_metadata >> 28) as u8),
                repeat: (sub_metadata >> 16) as u16 & 0x0FFF,
                address_inc: sub_metadata as u16,
                value_inc: sub_info,
            }
        }
        Kind::IfEqual32 => Command::IfEqual32 {
            address: low24 & 0x01FF_FFFC,
            is_pointer,
            endif,
            value: info,
            children: decode_children(r)?,
        },
        Kind::IfNotEqual32 => Command::IfNotEqual32 {
            address: low24 & 0x01FF_FFFC,
            is_pointer,
            endif,
            value: info,
            children: decode_children(r)?,
        },
        Kind::IfGreaterThan32 => Command::IfGreaterThan32 {
            address: low24 & 0x01FF_FFFC,
            is_pointer,
            endif,
            value: info,
            children: decode_children(r)?,
        },
        Kind::IfLesserThan32 => Command::IfLesserThan32 {
            address: low24 & 0x01FF_FFFC,
            is_pointer,
            endif,
            value: info,
            children: decode_children(r)?,
        },
        Kind::IfEqual16 => Command::IfEqual16 {
            address: low24 & 0x01FF_FFFE,
            is_pointer,
            endif,
            mask: (info >> 16) as u16,
            value: info as u16,
            children: decode_children(r)?,
        },
        Kind::IfNotEqual16 => Command::IfNotEqual16 {
            address: low24 & 0x01FF_FFFE,
            is_pointer,
            endif,
            mask: (info >> 16) as u16,
            value: info as u16,
            children: decode_children(r)?,
        },
        Kind::IfGreaterThan16 => Command::IfGreaterThan16 {
            address: low24 & 0x01FF_FFFE,
            is_pointer,
            endif,
            mask: (info >> 16) as u16,
            value: info as u16,
            children: decode_children(r)?,
        },
        Kind::IfLesserThan16 => Command::IfLesserThan16 {
            address: low24 & 0x01FF_FFFE,
            is_pointer,
            endif,
            mask: (info >> 16) as u16,
            value: info as u16,
            children: decode_children(r)?,
        },
        Kind::BaseAddressLoad => Command::BaseAddressLoad {
            flags: AddressingFlags::from_nibble((low24 >> 20) as u8),
            is_pointer,
            value: info,
        },
        Kind::BaseAddressSet => Command::BaseAddressSet {
            flags: AddressingFlags::from_nibble((low24 >> 20) as u8),
            is_pointer,
            value: info,
        },
        Kind::BaseAddressStore => Command::BaseAddressStore {
            flags: AddressingFlags::from_nibble((low24 >> 20) as u8),
            is_pointer,
            value: info,
        },
        Kind::BaseAddressGetNext => Command::BaseAddressGetNext { value: info as u16 },
        Kind::PointerAddressLoad => Command::PointerAddressLoad {
            flags: AddressingFlags::from_nibble((low24 >> 20) as u8),
            is_pointer,
            value: info,
        },
        Kind::PointerAddressSet => Command::PointerAddressSet {
            flags: AddressingFlags::from_nibble((low24 >> 20) as u8),
            is_pointer,
            value: info,
        },
        Kind::PointerAddressStore => Command::PointerAddressStore {
            flags: AddressingFlags::from_nibble((low24 >> 20) as u8),
            is_pointer,
            value: info,
        },
        Kind::PointerAddressGetNext => Command::PointerAddressGetNext { value: info as u16 },
        Kind::RepeatSet => Command::RepeatSet { repeat: (info >> 16) as u16, reserved: info as u8 },
        Kind::RepeatExec => Command::RepeatExec { flags: low24 as u8, reserved: info as u8 },
        Kind::Return => Command::Return { flags: low24 as u8, reserved: info as u8 },
        Kind::Goto => Command::Goto { flags: low24 as u8, line_offset: info as u16 as i16 },
        Kind::Gosub => Command::Gosub {
            flags: low24 as u8,
            line_offset: (info >> 16) as u16 as i16,
            register: reg(info & 0xF)?,
        },
        Kind::GeckoRegisterSet => Command::GeckoRegisterSet {
            flags: AddressingFlags::from_nibble((low24 >> 20) as u8),
            is_pointer,
            register: reg(low24 & 0xF)?,
            value: info,
        },
        Kind::GeckoRegisterLoad => Command::GeckoRegisterLoad {
            flags: AddressingFlags::from_nibble((low24 >> 20) as u8),
            is_pointer,
            register: reg(low24 & 0xF)?,
            value: info,
        },
        Kind::GeckoRegisterStore => Command::GeckoRegisterStore {
            flags: AddressingFlags::from_nibble((low24 >> 12) as u8),
            is_pointer,
            register: reg(low24 & 0xF)?,
            repeat: (low24 >> 4) as u16 & 0xFF,
            value: info,
        },
        Kind::GeckoRegisterOperateI => Command::GeckoRegisterOperateI {
            op_type: ArithmeticType::from_nibble((low24 >> 20) as u8),
            flags: ((low24 >> 16) & 0x3) as u8,
            register: reg(low24 & 0xF)?,
            value: info,
        },
        Kind::GeckoRegisterOperate => Command::GeckoRegisterOperate {
            op_type: ArithmeticType::from_nibble((low24 >> 20) as u8),
            flags: ((low24 >> 16) & 0x3) as u8,
            register: reg(low24 & 0xF)?,
            other_register: reg(info & 0xF)?,
        },
        Kind::MemoryCopyTo => Command::MemoryCopyTo {
            is_pointer,
            register: reg((low24 >> 4) & 0xF)?,
            other_register: reg(low24 & 0xF)?,
            size: ((low24 >> 8) & 0xFFFF) as u16,
            value: info,
        },
        Kind::MemoryCopyFrom => Command::MemoryCopyFrom {
            is_pointer,
            register: reg((low24 >> 4) & 0xF)?,
            other_register: reg(low24 & 0xF)?,
            size: ((low24 >> 8) & 0xFFFF) as u16,
            value: info,
        },
        Kind::GeckoIfEqual16 => Command::GeckoIfEqual16 {
            address: low24 & 0x01FF_FFFE,
            is_pointer,
            endif,
            register: ((info >> 24) & 0xF) as u8,
            other_register: ((info >> 28) & 0xF) as u8,
            mask: info as u16,
            children: decode_children(r)?,
        },
        Kind::GeckoIfNotEqual16 => Command::GeckoIfNotEqual16 {
            address: low24 & 0x01FF_FFFE,
            is_pointer,
            endif,
            register: ((info >> 24) & 0xF) as u8,
            other_register: ((info >> 28) & 0xF) as u8,
            mask: info as u16,
            children: decode_children(r)?,
        },
        Kind::GeckoIfGreaterThan16 => Command::GeckoIfGreaterThan16 {
            address: low24 & 0x01FF_FFFE,
            is_pointer,
            endif,
            register: ((info >> 24) & 0xF) as u8,
            other_register: ((info >> 28) & 0xF) as u8,
            mask: info as u16,
            children: decode_children(r)?,
        },
        Kind::GeckoIfLesserThan16 => Command::GeckoIfLesserThan16 {
            address: low24 & 0x01FF_FFFE,
            is_pointer,
            endif,
            register: ((info >> 24) & 0xF) as u8,
            other_register: ((info >> 28) & 0xF) as u8,
            mask: info as u16,
            children: decode_children(r)?,
        },
        Kind::CounterIfEqual16 => Command::CounterIfEqual16 {
            flags: (low24 >> 20) as u8,
            endif: (low24 >> 20) & 1 != 0,
            counter: low24 as u16,
            mask: (info >> 16) as u16,
            value: info as u16,
            children: decode_children(r)?,
        },
        Kind::CounterIfNotEqual16 => Command::CounterIfNotEqual16 {
            flags: (low24 >> 20) as u8,
            endif: (low24 >> 20) & 1 != 0,
            counter: low24 as u16,
            mask: (info >> 16) as u16,
            value: info as u16,
            children: decode_children(r)?,
        },
        Kind::CounterIfGreaterThan16 => Command::CounterIfGreaterThan16 {
            flags: (low24 >> 20) as u8,
            endif: (low24 >> 20) & 1 != 0,
            counter: low24 as u16,
            mask: (info >> 16) as u16,
            value: info as u16,
            children: decode_children(r)?,
        },
        Kind::CounterIfLesserThan16 => Command::CounterIfLesserThan16 {
            flags: (low24 >> 20) as u8,
            endif: (low24 >> 20) & 1 != 0,
            counter: low24 as u16,
            mask: (info >> 16) as u16,
            value: info as u16,
            children: decode_children(r)?,
        },
        Kind::AsmExecute => {
            let payload = r.read_payload(info as usize)?;
            Command::AsmExecute { value: payload }
        }
        Kind::AsmInsert => {
            let payload = r.read_payload(info as usize)?;
            Command::AsmInsert { address, is_pointer, value: payload }
        }
        Kind::AsmInsertLink => {
            let payload = r.read_payload(info as usize)?;
            Command::AsmInsertLink { address, is_pointer, value: payload }
        }
        Kind::WriteBranch => Command::WriteBranch { address, is_pointer, value: info },
        Kind::Switch => Command::Switch,
        Kind::AddressRangeCheck => {
            Command::AddressRangeCheck { is_pointer, endif, value: info }
        }
        Kind::Terminator => Command::Terminator { value: info },
        Kind::Endif => Command::Endif {
            as_else: (low24 >> 20) & 1 != 0,
            num_endifs: low24 as u8,
            value: info,
        },
        Kind::Exit => Command::Exit,
        Kind::AsmInsertXor => {
            let sub = r.read_line()?;
            let (sub_metadata, _) = split_line(sub);
            let n_lines = info as usize;
            let payload = r.read_payload(n_lines)?;
            Command::AsmInsertXor {
                address: low24 & 0x01FF_FFFC,
                mask: (sub_metadata >> 16) as u16,
                xor_count: sub_metadata as u8,
                value: payload,
            }
        }
        Kind::BrainslugSearch => {
            let count_line = r.read_line()?;
            let (n_lines_word, _) = split_line(count_line);
            let payload = r.read_payload(n_lines_word as usize)?;
            Command::BrainslugSearch {
                address: low24 & 0x01FF_FFFC,
                search_range: ((info >> 16) as u16, info as u16),
                value: payload,
                children: decode_children(r)?,
            }
        }
    })
}

/// Appends the canonical nop (`60 00 00 00`) the AsmInsert family requires
/// when their blob is a non-empty exact multiple of 8 bytes.
fn asm_insert_payload(value: &[u8]) -> std::borrow::Cow<'_, [u8]> {
    if !value.is_empty() && value.len() % 8 == 0 {
        let mut padded = value.to_vec();
        padded.extend_from_slice(&[0x60, 0x00, 0x00, 0x00]);
        std::borrow::Cow::Owned(padded)
    } else {
        std::borrow::Cow::Borrowed(value)
    }
}

pub fn encode_command<W: LineWriter>(w: &mut W, cmd: &Command) {
    let kind = cmd.kind();
    match cmd {
        Command::Write8 { address, is_pointer, value, repeat } => {
            let op = pack_opcode(kind, *is_pointer, false);
            w.write_line(line_from((op as u32) << 24 | address, (*repeat as u32) << 16 | *value as u32));
        }
        Command::Write16 { address, is_pointer, value, repeat } => {
            let op = pack_opcode(kind, *is_pointer, false);
            w.write_line(line_from((op as u32) << 24 | address, (*repeat as u32) << 16 | *value as u32));
        }
        Command::Write32 { address, is_pointer, value } => {
            let op = pack_opcode(kind, *is_pointer, false);
            w.write_line(line_from((op as u32) << 24 | address, *value));
        }
        Command::WriteStr { address, is_pointer, value } => {
            let op = pack_opcode(kind, *is_pointer, false);
            w.write_line(line_from((op as u32) << 24 | address, value.len() as u32));
            let pad = (8 - value.len() % 8) % 8;
            w.write_payload(value);
            if pad > 0 {
                w.write_payload(&vec![0u8; pad]);
            }
        }
        Command::WriteSerial { address, is_pointer, value, value_size, repeat, address_inc, value_inc } => {
            let op = pack_opcode(kind, *is_pointer, false);
            w.write_line(line_from((op as u32) << 24 | address, *value));
            let sub_metadata = (value_size.to_bits() as u32) << 28
                | (*repeat as u32 & 0x0FFF) << 16
                | *address_inc as u32;
            w.write_line(line_from(sub_metadata, *value_inc));
        }
        Command::IfEqual32 { address, is_pointer, endif, value, children }
        | Command::IfNotEqual32 { address, is_pointer, endif, value, children }
        | Command::IfGreaterThan32 { address, is_pointer, endif, value, children }
        | Command::IfLesserThan32 { address, is_pointer, endif, value, children } => {
            let op = pack_opcode(kind, *is_pointer, *endif);
            w.write_line(line_from((op as u32) << 24 | (address & 0x01FF_FFFC), *value));
            encode_children(w, children);
        }
        Command::IfEqual16 { address, is_pointer, endif, mask, value, children }
        | Command::IfNotEqual16 { address, is_pointer, endif, mask, value, children }
        | Command::IfGreaterThan16 { address, is_pointer, endif, mask, value, children }
        | Command::IfLesserThan16 { address, is_pointer, endif, mask, value, children } => {
            let op = pack_opcode(kind, *is_pointer, *endif);
            w.write_line(line_from(
                (op as u32) << 24 | (address & 0x01FF_FFFE),
                (*mask as u32) << 16 | *value as u32,
            ));
            encode_children(w, children);
        }
        Command::BaseAddressLoad { flags, is_pointer, value }
        | Command::BaseAddressSet { flags, is_pointer, value }
        | Command::BaseAddressStore { flags, is_pointer, value }
        | Command::PointerAddressLoad { flags, is_pointer, value }
        | Command::PointerAddressSet { flags, is_pointer, value }
        | Command::PointerAddressStore { flags, is_pointer, value } => {
            let op = pack_opcode(kind, *is_pointer, false);
            w.write_line(line_from((op as u32) << 24 | (flags.to_nibble() as u32) << 20, *value));
        }
        Command::BaseAddressGetNext { value } | Command::PointerAddressGetNext { value } => {
            let op = pack_opcode(kind, false, false);
            w.write_line(line_from((op as u32) << 24, *value as u32));
        }
        Command::RepeatSet { repeat, reserved } => {
            let op = pack_opcode(kind, false, false);
            w.write_line(line_from((op as u32) << 24, (*repeat as u32) << 16 | *reserved as u32));
        }
        Command::RepeatExec { flags, reserved } | Command::Return { flags, reserved } => {
            let op = pack_opcode(kind, false, false);
            w.write_line(line_from((op as u32) << 24 | *flags as u32, *reserved as u32));
        }
        Command::Goto { flags, line_offset } => {
            let op = pack_opcode(kind, false, false);
            w.write_line(line_from((op as u32) << 24 | *flags as u32, *line_offset as u16 as u32));
        }
        Command::Gosub { flags, line_offset, register } => {
            let op = pack_opcode(kind, false, false);
            w.write_line(line_from(
                (op as u32) << 24 | *flags as u32,
                (*line_offset as u16 as u32) << 16 | *register as u32,
            ));
        }
        Command::GeckoRegisterSet { flags, is_pointer, register, value }
        | Command::GeckoRegisterLoad { flags, is_pointer, register, value } => {
            let op = pack_opcode(kind, *is_pointer, false);
            w.write_line(line_from(
                (op as u32) << 24 | (flags.to_nibble() as u32) << 20 | *register as u32,
                *value,
            ));
        }
        Command::GeckoRegisterStore { flags, is_pointer, register, repeat, value } => {
            let op = pack_opcode(kind, *is_pointer, false);
            let low24 = (flags.to_nibble() as u32) << 12
                | (*repeat as u32 & 0xFF) << 4
                | *register as u32;
            w.write_line(line_from((op as u32) << 24 | low24, *value));
        }
        Command::GeckoRegisterOperateI { op_type, flags, register, value } => {
            let op = pack_opcode(kind, false, false);
            w.write_line(line_from(
                (op as u32) << 24
                    | (op_type.to_nibble() as u32) << 20
                    | (*flags as u32 & 0x3) << 16
                    | *register as u32,
                *value,
            ));
        }
        Command::GeckoRegisterOperate { op_type, flags, register, other_register } => {
            let op = pack_opcode(kind, false, false);
            w.write_line(line_from(
                (op as u32) << 24
                    | (op_type.to_nibble() as u32) << 20
                    | (*flags as u32 & 0x3) << 16
                    | *register as u32,
                *other_register as u32,
            ));
        }
        Command::MemoryCopyTo { is_pointer, register, other_register, size, value }
        | Command::MemoryCopyFrom { is_pointer, register, other_register, size, value } => {
            let op = pack_opcode(kind, *is_pointer, false);
            w.write_line(line_from(
                (op as u32) << 24 | (*size as u32) << 8 | (*register as u32) << 4 | *other_register as u32,
                *value,
            ));
        }
        Command::GeckoIfEqual16 { address, is_pointer, endif, register, other_register, mask, children }
        | Command::GeckoIfNotEqual16 { address, is_pointer, endif, register, other_register, mask, children }
        | Command::GeckoIfGreaterThan16 { address, is_pointer, endif, register, other_register, mask, children }
        | Command::GeckoIfLesserThan16 { address, is_pointer, endif, register, other_register, mask, children } => {
            let op = pack_opcode(kind, *is_pointer, *endif);
            w.write_line(line_from(
                (op as u32) << 24 | (address & 0x01FF_FFFE),
                (*other_register as u32) << 28 | (*register as u32) << 24 | *mask as u32,
            ));
            encode_children(w, children);
        }
        Command::CounterIfEqual16 { flags, endif, counter, mask, value, children }
        | Command::CounterIfNotEqual16 { flags, endif, counter, mask, value, children }
        | Command::CounterIfGreaterThan16 { flags, endif, counter, mask, value, children }
        | Command::CounterIfLesserThan16 { flags, endif, counter, mask, value, children } => {
            let op = pack_opcode(kind, false, false);
            let flag_nibble = (*flags & !1) | if *endif { 1 } else { 0 };
            w.write_line(line_from(
                (op as u32) << 24 | ((flag_nibble as u32) & 0xF) << 20 | (*counter as u32 & 0xFFFFF),
                (*mask as u32) << 16 | *value as u32,
            ));
            encode_children(w, children);
        }
        Command::AsmExecute { value } => {
            let op = pack_opcode(kind, false, false);
            w.write_line(line_from((op as u32) << 24, (value.len() / 8) as u32));
            w.write_payload(value);
        }
        Command::AsmInsert { address, is_pointer, value } | Command::AsmInsertLink { address, is_pointer, value } => {
            let op = pack_opcode(kind, *is_pointer, false);
            let payload = asm_insert_payload(value);
            w.write_line(line_from((op as u32) << 24 | address, (payload.len() / 8) as u32));
            w.write_payload(&payload);
        }
        Command::WriteBranch { address, is_pointer, value } => {
            let op = pack_opcode(kind, *is_pointer, false);
            w.write_line(line_from((op as u32) << 24 | address, *value));
        }
        Command::Switch => {
            let op = pack_opcode(kind, false, false);
            w.write_line(line_from((op as u32) << 24, 0));
        }
        Command::AddressRangeCheck { is_pointer, endif, value } => {
            let op = pack_opcode(kind, *is_pointer, *endif);
            w.write_line(line_from((op as u32) << 24, *value));
        }
        Command::Terminator { value } => {
            let op = pack_opcode(kind, false, false);
            w.write_line(line_from((op as u32) << 24, *value));
        }
        Command::Endif { as_else, num_endifs, value } => {
            let op = pack_opcode(kind, false, false);
            w.write_line(line_from(
                (op as u32) << 24 | (*as_else as u32) << 20 | *num_endifs as u32,
                *value,
            ));
        }
        Command::Exit => {
            let op = pack_opcode(kind, false, false);
            w.write_line(line_from((op as u32) << 24, 0));
        }
        Command::AsmInsertXor { address, mask, xor_count, value } => {
            let op = pack_opcode(kind, false, false);
            let payload = asm_insert_payload(value);
            w.write_line(line_from((op as u32) << 24 | (address & 0x01FF_FFFC), (payload.len() / 8) as u32));
            w.write_line(line_from((*mask as u32) << 16 | *xor_count as u32, 0));
            w.write_payload(&payload);
        }
        Command::BrainslugSearch { address, search_range, value, children } => {
            let op = pack_opcode(kind, false, false);
            w.write_line(line_from(
                (op as u32) << 24 | (address & 0x01FF_FFFC),
                (search_range.0 as u32) << 16 | search_range.1 as u32,
            ));
            w.write_line(line_from((value.len() / 8) as u32, 0));
            w.write_payload(value);
            encode_children(w, children);
        }
    }
}

/// Decodes every command from the source until EOF (used for a bare
/// sequence of commands, as opposed to a whole magic-bracketed CodeTable).
pub fn decode_all<R: LineReader>(r: &mut R) -> Result<Vec<Command>> {
    let mut out = Vec::new();
    while !r.is_eof() {
        out.push(decode_command(r)?);
    }
    Ok(out)
}

pub use crate::error::GeckoError as CodecError;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::{BinaryReader, BinaryWriter};

    fn round_trip(cmd: Command) -> Command {
        let mut w = BinaryWriter::default();
        encode_command(&mut w, &cmd);
        let mut r = BinaryReader::new(&w.buf);
        decode_command(&mut r).unwrap()
    }

    #[test]
    fn write32_round_trips_byte_identical() {
        let cmd = Command::Write32 { address: 0x123456, is_pointer: false, value: 0xDEADBEEF };
        let mut w = BinaryWriter::default();
        encode_command(&mut w, &cmd);
        assert_eq!(w.buf, vec![0x04, 0x12, 0x34, 0x56, 0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(round_trip(cmd.clone()), cmd);
    }

    #[test]
    fn write_str_round_trips_and_pads_to_8_bytes() {
        let cmd = Command::WriteStr { address: 0x1000, is_pointer: false, value: b"HELLO".to_vec() };
        let mut w = BinaryWriter::default();
        encode_command(&mut w, &cmd);
        assert_eq!(w.buf.len(), 16);
        assert_eq!(round_trip(cmd.clone()), cmd);
    }

    #[test]
    fn asm_insert_appends_nop_when_blob_is_multiple_of_8() {
        let value = vec![0x38, 0x60, 0x00, 0x01, 0x4E, 0x80, 0x00, 0x20];
        let cmd = Command::AsmInsert { address: 0x1000, is_pointer: false, value: value.clone() };
        let mut w = BinaryWriter::default();
        encode_command(&mut w, &cmd);
        assert_eq!(&w.buf[w.buf.len() - 4..], &[0x60, 0x00, 0x00, 0x00]);
        let decoded = round_trip(cmd);
        match decoded {
            Command::AsmInsert { value: decoded_value, .. } => {
                assert_eq!(decoded_value.len(), value.len() + 4);
            }
            _ => panic!("wrong kind"),
        }
    }

    #[test]
    fn if_equal_32_block_decodes_its_child_and_stops_before_terminator() {
        let mut w = BinaryWriter::default();
        let block = Command::IfEqual32 {
            address: 0x3000,
            is_pointer: false,
            endif: true,
            value: 0,
            children: vec![Command::Write8 { address: 0, is_pointer: false, value: 1, repeat: 0 }],
        };
        encode_command(&mut w, &block);
        encode_command(&mut w, &Command::Terminator { value: 0 });
        let mut r = BinaryReader::new(&w.buf);
        let decoded = decode_command(&mut r).unwrap();
        assert_eq!(decoded.virtual_length(), 2);
        let terminator = decode_command(&mut r).unwrap();
        assert_eq!(terminator.kind(), Kind::Terminator);
    }

    #[test]
    fn brainslug_search_children_survive_before_terminator() {
        let mut w = BinaryWriter::default();
        let search = Command::BrainslugSearch {
            address: 0x2000,
            search_range: (0, 0x100),
            value: vec![0u8; 16],
            children: vec![
                Command::Write32 { address: 0x10, is_pointer: false, value: 1 },
                Command::Write32 { address: 0x20, is_pointer: false, value: 2 },
            ],
        };
        encode_command(&mut w, &search);
        encode_command(&mut w, &Command::Terminator { value: 0 });
        let mut r = BinaryReader::new(&w.buf);
        let decoded = decode_command(&mut r).unwrap();
        match decoded {
            Command::BrainslugSearch { children, value, .. } => {
                assert_eq!(children.len(), 2);
                assert_eq!(value.len(), 16);
            }
            _ => panic!("wrong kind"),
        }
        assert_eq!(decode_command(&mut r).unwrap().kind(), Kind::Terminator);
    }

    #[test]
    fn memory_copy_to_round_trips_with_its_value_operand() {
        let cmd = Command::MemoryCopyTo {
            is_pointer: false,
            register: 3,
            other_register: 0xF,
            size: 0x20,
            value: 0x8000_1000,
        };
        assert_eq!(round_trip(cmd.clone()), cmd);
    }

    #[test]
    fn memory_copy_from_round_trips_through_an_other_register_offset() {
        let cmd = Command::MemoryCopyFrom {
            is_pointer: true,
            register: 1,
            other_register: 2,
            size: 0x10,
            value: 0x40,
        };
        assert_eq!(round_trip(cmd.clone()), cmd);
    }

    #[test]
    fn gecko_register_operate_i_round_trips_with_flags() {
        let cmd = Command::GeckoRegisterOperateI {
            op_type: ArithmeticType::Xor,
            flags: 0b11,
            register: 4,
            value: 0xCAFEBABE,
        };
        assert_eq!(round_trip(cmd.clone()), cmd);
    }

    #[test]
    fn gecko_register_operate_carries_other_register_in_the_info_word() {
        let cmd = Command::GeckoRegisterOperate {
            op_type: ArithmeticType::Add,
            flags: 0b01,
            register: 2,
            other_register: 9,
        };
        assert_eq!(round_trip(cmd.clone()), cmd);
    }
}
