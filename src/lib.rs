//! Parsing, validation, manipulation, re-serialization and pre-application
//! of Gecko codelists: the patch/cheat command format interpreted by the
//! Gecko code-handler on PowerPC-based Nintendo consoles (GameCube/Wii).
//!
//! The pieces, leaves first: [`kind::Kind`] is the closed opcode taxonomy;
//! [`command::Command`] is the in-memory tree a codec produces; [`codec`]
//! implements that codec over either a byte cursor or hex text via
//! [`cursor::LineReader`]/[`cursor::LineWriter`]; [`code::Code`] names a
//! sequence of commands; [`codetable::CodeTable`] is the codelist container
//! with its three textual presentations and one binary form; [`apply`]
//! statically executes the pre-applicable subset against an
//! [`apply::Image`].

pub mod apply;
pub mod code;
pub mod codec;
pub mod codetable;
pub mod command;
pub mod cursor;
pub mod error;
pub mod format;
pub mod kind;

pub use apply::{apply_code, apply_command, apply_table, Image};
pub use code::Code;
pub use codetable::{CodeTable, CodelistFormat, TextDecodeOptions};
pub use command::Command;
pub use error::{GeckoError, Result};
pub use format::print_map;
pub use kind::Kind;

/// End-to-end scenarios from the specification's testable-properties
/// section, exercised against the public API rather than any one module.
#[cfg(test)]
mod scenarios {
    use crate::apply::Image;
    use crate::code::Code;
    use crate::codec::{decode_command, encode_command};
    use crate::codetable::{CodeTable, TextDecodeOptions, MAGIC};
    use crate::command::Command;
    use crate::cursor::{BinaryReader, BinaryWriter};
    use crate::kind::Kind;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn scenario_1_write32_decodes_and_round_trips_byte_identical() {
        init_logging();
        let bytes = [0x04, 0x12, 0x34, 0x56, 0xDE, 0xAD, 0xBE, 0xEF];
        let mut r = BinaryReader::new(&bytes);
        let cmd = decode_command(&mut r).unwrap();
        assert_eq!(
            cmd,
            Command::Write32 { address: 0x123456, is_pointer: false, value: 0xDEADBEEF }
        );
        let mut w = BinaryWriter::default();
        encode_command(&mut w, &cmd);
        assert_eq!(w.buf, bytes);
    }

    #[test]
    fn scenario_2_if_eq_32_block_with_one_child_and_sibling_terminator() {
        init_logging();
        let block = Command::IfEqual32 {
            address: 0x003000,
            is_pointer: false,
            endif: true,
            value: 0,
            children: vec![Command::Write8 { address: 0, is_pointer: false, value: 1, repeat: 0 }],
        };
        let mut w = BinaryWriter::default();
        encode_command(&mut w, &block);
        encode_command(&mut w, &Command::Terminator { value: 0 });
        let mut r = BinaryReader::new(&w.buf);
        let decoded = decode_command(&mut r).unwrap();
        assert_eq!(decoded.virtual_length(), 2);
        assert_eq!(decode_command(&mut r).unwrap().kind(), Kind::Terminator);
    }

    #[test]
    fn scenario_3_write_str_hello_encodes_to_the_expected_hex() {
        init_logging();
        let cmd = Command::WriteStr { address: 0, is_pointer: false, value: b"HELLO".to_vec() };
        let mut w = BinaryWriter::default();
        encode_command(&mut w, &cmd);
        assert_eq!(
            w.buf,
            vec![0x06, 0, 0, 0, 0, 0, 0, 5, b'H', b'E', b'L', b'L', b'O', 0, 0, 0]
        );
        let mut r = BinaryReader::new(&w.buf);
        assert_eq!(decode_command(&mut r).unwrap(), cmd);
    }

    #[test]
    fn scenario_4_dolphin_codelist_preserves_volatile_only_on_second_code() {
        init_logging();
        let mut table = CodeTable::new("GALE01", "Test Game");
        table.insert(Code::new(
            "First",
            vec![Command::Write32 { address: 0x1000, is_pointer: false, value: 1 }],
        ));
        let mut second = Code::new(
            "Second",
            vec![Command::Write32 { address: 0x2000, is_pointer: false, value: 2 }],
        );
        second.pre_applicable = false;
        second.enabled = false;
        table.insert(second);

        let text = table.encode_dolphin();
        let decoded = CodeTable::decode_text(&text, TextDecodeOptions::default()).unwrap();
        assert!(decoded.get("First").unwrap().pre_applicable);
        assert!(!decoded.get("Second").unwrap().pre_applicable);
        assert_eq!(decoded.len(), 2);
    }

    struct MockImage {
        mapped_addr: u32,
        writes: Vec<Vec<u8>>,
        cursor: u32,
    }

    impl Image for MockImage {
        fn is_mapped(&self, addr: u32) -> bool {
            addr == self.mapped_addr
        }
        fn seek(&mut self, addr: u32) {
            self.cursor = addr;
        }
        fn write(&mut self, bytes: &[u8]) {
            assert_eq!(self.cursor, self.mapped_addr);
            self.writes.push(bytes.to_vec());
        }
        fn insert_branch(&mut self, _dst: u32, _src: u32, _link: bool) {
            panic!("not expected in this scenario");
        }
    }

    #[test]
    fn scenario_5_preapplying_a_single_write32_invokes_one_write_and_returns_true() {
        init_logging();
        let mut table = CodeTable::new("GALE01", "Test Game");
        table.insert(Code::new(
            "Single write",
            vec![Command::Write32 { address: 0x1000, is_pointer: false, value: 0x12345678 }],
        ));
        let mut image = MockImage { mapped_addr: 0x8000_1000, writes: Vec::new(), cursor: 0 };
        let applied = crate::apply::apply_table(&table, &mut image);
        assert!(applied);
        assert_eq!(image.writes, vec![vec![0x12, 0x34, 0x56, 0x78]]);
    }

    #[test]
    fn scenario_6_brainslug_search_children_round_trip_before_terminator() {
        init_logging();
        let search = Command::BrainslugSearch {
            address: 0x2000,
            search_range: (0, 0x100),
            value: vec![0xAB; 16],
            children: vec![
                Command::Write32 { address: 0x10, is_pointer: false, value: 1 },
                Command::Write32 { address: 0x20, is_pointer: false, value: 2 },
            ],
        };
        let mut w = BinaryWriter::default();
        encode_command(&mut w, &search);
        encode_command(&mut w, &Command::Terminator { value: 0 });
        let mut r = BinaryReader::new(&w.buf);
        let decoded = decode_command(&mut r).unwrap();
        match decoded {
            Command::BrainslugSearch { children, value, .. } => {
                assert_eq!(children.len(), 2);
                assert_eq!(value, vec![0xAB; 16]);
            }
            _ => panic!("wrong kind"),
        }
        assert_eq!(decode_command(&mut r).unwrap().kind(), Kind::Terminator);
    }

    #[test]
    fn binary_container_round_trips_through_magic_and_terminator() {
        init_logging();
        let mut table = CodeTable::new("GALE01", "Test Game");
        table.insert(Code::new(
            "Only",
            vec![Command::Write32 { address: 0x1000, is_pointer: false, value: 1 }],
        ));
        let bytes = table.encode_binary();
        assert_eq!(&bytes[..8], &MAGIC);
        let decoded = CodeTable::decode_binary(&bytes).unwrap();
        assert_eq!(decoded.codes()[0].commands.len(), 1);
    }
}
