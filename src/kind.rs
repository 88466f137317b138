//! The closed command taxonomy: opcode <-> tag mapping and per-kind
//! classification (block / multiline / pre-applicable).

use crate::error::{GeckoError, Result};

macro_rules! kinds {
    ($( $variant:ident = $opcode:expr ),+ $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Kind {
            $( $variant, )+
        }

        impl Kind {
            pub const ALL: &'static [Kind] = &[ $( Kind::$variant, )+ ];

            /// Canonical (already-masked) opcode byte for this kind.
            pub fn opcode(self) -> u8 {
                match self {
                    $( Kind::$variant => $opcode, )+
                }
            }

            fn from_masked(masked: u8) -> Option<Kind> {
                match masked {
                    $( $opcode => Some(Kind::$variant), )+
                    _ => None,
                }
            }
        }
    };
}

kinds! {
    Write8 = 0x00,
    Write16 = 0x02,
    Write32 = 0x04,
    WriteStr = 0x06,
    WriteSerial = 0x08,

    IfEqual32 = 0x20,
    IfNotEqual32 = 0x22,
    IfGreaterThan32 = 0x24,
    IfLesserThan32 = 0x26,
    IfEqual16 = 0x28,
    IfNotEqual16 = 0x2A,
    IfGreaterThan16 = 0x2C,
    IfLesserThan16 = 0x2E,

    BaseAddressLoad = 0x40,
    BaseAddressSet = 0x42,
    BaseAddressStore = 0x44,
    BaseAddressGetNext = 0x46,
    PointerAddressLoad = 0x48,
    PointerAddressSet = 0x4A,
    PointerAddressStore = 0x4C,
    PointerAddressGetNext = 0x4E,

    RepeatSet = 0x60,
    RepeatExec = 0x62,
    Return = 0x64,
    Goto = 0x66,
    Gosub = 0x68,

    GeckoRegisterSet = 0x80,
    GeckoRegisterLoad = 0x82,
    GeckoRegisterStore = 0x84,
    GeckoRegisterOperateI = 0x86,
    GeckoRegisterOperate = 0x88,
    MemoryCopyTo = 0x8A,
    MemoryCopyFrom = 0x8C,

    GeckoIfEqual16 = 0xA0,
    GeckoIfNotEqual16 = 0xA2,
    GeckoIfGreaterThan16 = 0xA4,
    GeckoIfLesserThan16 = 0xA6,
    CounterIfEqual16 = 0xA8,
    CounterIfNotEqual16 = 0xAA,
    CounterIfGreaterThan16 = 0xAC,
    CounterIfLesserThan16 = 0xAE,

    AsmExecute = 0xC0,
    AsmInsert = 0xC2,
    AsmInsertLink = 0xC4,
    WriteBranch = 0xC6,
    Switch = 0xCC,
    AddressRangeCheck = 0xCE,

    Terminator = 0xE0,
    Endif = 0xE2,
    Exit = 0xF0,
    AsmInsertXor = 0xF4,
    BrainslugSearch = 0xF6,
}

impl Kind {
    /// Recovers the tag from a raw opcode byte as stored on the wire
    /// (i.e. including the `isPointer` and `endif`/low-order bits).
    pub fn from_opcode(raw: u8, line: usize) -> Result<Kind> {
        let mask = if raw & 0xF0 == 0xF0 { 0xFE } else { 0xEE };
        let mut masked = raw & mask;
        // 0xF2 and 0xF4 are both ASM_INSERT_XOR; the mask above does not
        // collapse them since they differ outside the masked-off bits.
        if masked == 0xF2 {
            masked = 0xF4;
        }
        Kind::from_masked(masked).ok_or(GeckoError::InvalidCommand { line, opcode: raw })
    }

    /// True for the 16 conditional/search kinds that own nested children.
    pub fn is_block(self) -> bool {
        matches!(
            self,
            Kind::IfEqual32
                | Kind::IfNotEqual32
                | Kind::IfGreaterThan32
                | Kind::IfLesserThan32
                | Kind::IfEqual16
                | Kind::IfNotEqual16
                | Kind::IfGreaterThan16
                | Kind::IfLesserThan16
                | Kind::GeckoIfEqual16
                | Kind::GeckoIfNotEqual16
                | Kind::GeckoIfGreaterThan16
                | Kind::GeckoIfLesserThan16
                | Kind::CounterIfEqual16
                | Kind::CounterIfNotEqual16
                | Kind::CounterIfGreaterThan16
                | Kind::CounterIfLesserThan16
                | Kind::BrainslugSearch
        )
    }

    /// True if the payload can span more than one 8-byte line.
    pub fn is_multiline(self) -> bool {
        matches!(
            self,
            Kind::WriteStr
                | Kind::WriteSerial
                | Kind::AsmExecute
                | Kind::AsmInsert
                | Kind::AsmInsertLink
                | Kind::AsmInsertXor
                | Kind::BrainslugSearch
        )
    }

    /// True for kinds the pre-applier executes statically (see `crate::apply`).
    pub fn can_preapply(self) -> bool {
        matches!(
            self,
            Kind::Write8
                | Kind::Write16
                | Kind::Write32
                | Kind::WriteStr
                | Kind::WriteSerial
                | Kind::WriteBranch
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_round_trips_its_own_opcode() {
        for &kind in Kind::ALL {
            let recovered = Kind::from_opcode(kind.opcode(), 0).unwrap();
            assert_eq!(recovered, kind);
        }
    }

    #[test]
    fn ispointer_and_endif_bits_do_not_change_the_tag() {
        let with_pointer_and_endif = Kind::Write32.opcode() | 0x10 | 0x01;
        assert_eq!(Kind::from_opcode(with_pointer_and_endif, 0).unwrap(), Kind::Write32);
    }

    #[test]
    fn asm_insert_xor_accepts_both_wire_opcodes() {
        assert_eq!(Kind::from_opcode(0xF2, 0).unwrap(), Kind::AsmInsertXor);
        assert_eq!(Kind::from_opcode(0xF4, 0).unwrap(), Kind::AsmInsertXor);
    }

    #[test]
    fn unknown_opcode_is_rejected() {
        assert!(Kind::from_opcode(0x10, 3).is_err());
    }

    #[test]
    fn block_and_multiline_classification_matches_the_kind_table() {
        assert!(Kind::IfEqual32.is_block());
        assert!(!Kind::Write32.is_block());
        assert!(Kind::WriteStr.is_multiline());
        assert!(!Kind::Write32.is_multiline());
        assert!(Kind::Write8.can_preapply());
        assert!(!Kind::Goto.can_preapply());
    }
}
