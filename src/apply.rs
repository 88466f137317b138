//! Pre-application: statically executing the write-family commands against
//! a mapped executable image, as opposed to runtime interpretation on-console.

use crate::command::Command;
use crate::code::Code;
use crate::codetable::CodeTable;

/// The executable-image collaborator. Out of scope per the spec: callers
/// supply an implementation (backed by a DOL/ELF section map, a live
/// process, or a test double); this crate only calls through the trait.
pub trait Image {
    fn is_mapped(&self, addr: u32) -> bool;
    fn seek(&mut self, addr: u32);
    fn write(&mut self, bytes: &[u8]);
    /// Synthesizes a PPC branch instruction from `src` to `dst`, optionally
    /// link-updating (`bl`/`blr` family), writing it at `src`.
    fn insert_branch(&mut self, dst: u32, src: u32, link: bool);
}

const MEM_BASE: u32 = 0x8000_0000;

/// Applies the pre-applicable subset of one command against `image`.
/// Returns `false` without consulting the image further if the target
/// address isn't mapped; never errors (see `crate::error::GeckoError`,
/// which deliberately has no `PreApplyUnmapped` variant).
pub fn apply_command(cmd: &Command, image: &mut impl Image) -> bool {
    match cmd {
        Command::Write8 { address, repeat, value, .. } => {
            let addr = address | MEM_BASE;
            if !image.is_mapped(addr) {
                return false;
            }
            image.seek(addr);
            image.write(&vec![*value; *repeat as usize + 1]);
            true
        }
        Command::Write16 { address, repeat, value, .. } => {
            let addr = address | MEM_BASE;
            if !image.is_mapped(addr) {
                return false;
            }
            image.seek(addr);
            let bytes = value.to_be_bytes();
            let mut buf = Vec::with_capacity(bytes.len() * (*repeat as usize + 1));
            for _ in 0..=*repeat {
                buf.extend_from_slice(&bytes);
            }
            image.write(&buf);
            true
        }
        Command::Write32 { address, value, .. } => {
            let addr = address | MEM_BASE;
            if !image.is_mapped(addr) {
                return false;
            }
            image.seek(addr);
            image.write(&value.to_be_bytes());
            true
        }
        Command::WriteStr { address, value, .. } => {
            let addr = address | MEM_BASE;
            if !image.is_mapped(addr) {
                return false;
            }
            image.seek(addr);
            image.write(value);
            true
        }
        Command::WriteSerial { address, value, value_size, repeat, address_inc, value_inc, .. } => {
            let addr = address | MEM_BASE;
            if !image.is_mapped(addr) {
                return false;
            }
            for i in 0..=*repeat as u32 {
                let cur_addr = addr.wrapping_add(i * *address_inc as u32);
                let cur_value = value.wrapping_add(i * *value_inc);
                image.seek(cur_addr);
                match value_size {
                    crate::command::ValueSize::U8 => image.write(&[cur_value as u8]),
                    crate::command::ValueSize::U16 => image.write(&(cur_value as u16).to_be_bytes()),
                    crate::command::ValueSize::U32 => image.write(&cur_value.to_be_bytes()),
                }
            }
            true
        }
        Command::WriteBranch { address, value, .. } => {
            let addr = address | MEM_BASE;
            if !image.is_mapped(addr) {
                return false;
            }
            let link = address & 1 != 0;
            image.insert_branch(*value, addr, link);
            true
        }
        _ => false,
    }
}

fn apply_commands(commands: &[Command], image: &mut impl Image) -> bool {
    let mut applied = false;
    for cmd in commands {
        applied |= apply_command(cmd, image);
        applied |= apply_commands(cmd.children(), image);
    }
    applied
}

/// Pre-applies one code. A code whose `pre_applicable` flag is clear (the
/// `[[volatile]]` marker) is skipped entirely without consulting the image.
pub fn apply_code(code: &Code, image: &mut impl Image) -> bool {
    if !code.pre_applicable {
        log::debug!("skipping volatile code {:?}", code.name);
        return false;
    }
    log::debug!("pre-applying code {:?} ({} commands)", code.name, code.commands.len());
    apply_commands(&code.commands, image)
}

/// Walks every code in `table`, OR-aggregating pre-apply success.
pub fn apply_table(table: &CodeTable, image: &mut impl Image) -> bool {
    let mut applied = false;
    for code in table.codes() {
        applied |= apply_code(code, image);
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct MockImage {
        mapped: HashSet<u32>,
        cursor: u32,
        writes: Vec<(u32, Vec<u8>)>,
        branches: Vec<(u32, u32, bool)>,
    }

    impl MockImage {
        fn new(mapped: &[u32]) -> Self {
            MockImage { mapped: mapped.iter().copied().collect(), cursor: 0, writes: Vec::new(), branches: Vec::new() }
        }
    }

    impl Image for MockImage {
        fn is_mapped(&self, addr: u32) -> bool {
            self.mapped.contains(&addr)
        }
        fn seek(&mut self, addr: u32) {
            self.cursor = addr;
        }
        fn write(&mut self, bytes: &[u8]) {
            self.writes.push((self.cursor, bytes.to_vec()));
        }
        fn insert_branch(&mut self, dst: u32, src: u32, link: bool) {
            self.branches.push((dst, src, link));
        }
    }

    #[test]
    fn write32_applies_when_mapped_and_returns_true() {
        let mut image = MockImage::new(&[0x8000_1000]);
        let cmd = Command::Write32 { address: 0x1000, is_pointer: false, value: 0x1234_5678 };
        assert!(apply_command(&cmd, &mut image));
        assert_eq!(image.writes, vec![(0x8000_1000, vec![0x12, 0x34, 0x56, 0x78])]);
    }

    #[test]
    fn unmapped_address_skips_and_returns_false() {
        let mut image = MockImage::new(&[]);
        let cmd = Command::Write32 { address: 0x1000, is_pointer: false, value: 1 };
        assert!(!apply_command(&cmd, &mut image));
        assert!(image.writes.is_empty());
    }

    #[test]
    fn write8_repeats_value_repeat_plus_one_times() {
        let mut image = MockImage::new(&[0x8000_2000]);
        let cmd = Command::Write8 { address: 0x2000, is_pointer: false, value: 0xAB, repeat: 3 };
        assert!(apply_command(&cmd, &mut image));
        assert_eq!(image.writes, vec![(0x8000_2000, vec![0xAB; 4])]);
    }

    #[test]
    fn write_branch_asks_image_to_synthesize_and_honors_link_bit() {
        let mut image = MockImage::new(&[0x8000_3001]);
        let cmd = Command::WriteBranch { address: 0x3001, is_pointer: false, value: 0x8001_0000 };
        assert!(apply_command(&cmd, &mut image));
        assert_eq!(image.branches, vec![(0x8001_0000, 0x8000_3001, true)]);
    }

    #[test]
    fn non_preapplicable_command_contributes_false() {
        let mut image = MockImage::new(&[0x8000_0000]);
        assert!(!apply_command(&Command::Switch, &mut image));
    }

    #[test]
    fn volatile_code_is_skipped_without_consulting_image() {
        let mut image = MockImage::new(&[0x8000_1000]);
        let mut code = Code::new(
            "volatile",
            vec![Command::Write32 { address: 0x1000, is_pointer: false, value: 1 }],
        );
        code.pre_applicable = false;
        assert!(!apply_code(&code, &mut image));
        assert!(image.writes.is_empty());
    }
}
