use std::env;
use std::fs;

use anyhow::{Context, Result};
use geckolib::{apply::Image, CodeTable, TextDecodeOptions};

/// A flat in-memory image, useful for demoing pre-apply without a real
/// DOL/ELF loader. Addresses below `BASE` are considered unmapped.
struct FlatImage {
    base: u32,
    bytes: Vec<u8>,
    cursor: usize,
}

impl FlatImage {
    fn new(base: u32, size: usize) -> Self {
        FlatImage { base, bytes: vec![0u8; size], cursor: 0 }
    }
}

impl Image for FlatImage {
    fn is_mapped(&self, addr: u32) -> bool {
        addr >= self.base && ((addr - self.base) as usize) < self.bytes.len()
    }

    fn seek(&mut self, addr: u32) {
        self.cursor = (addr - self.base) as usize;
    }

    fn write(&mut self, data: &[u8]) {
        let end = (self.cursor + data.len()).min(self.bytes.len());
        let n = end - self.cursor;
        self.bytes[self.cursor..end].copy_from_slice(&data[..n]);
        self.cursor = end;
    }

    fn insert_branch(&mut self, dst: u32, src: u32, link: bool) {
        let opcode: u32 = if link { 0x4800_0001 } else { 0x4800_0000 };
        let delta = dst.wrapping_sub(src) & 0x03FF_FFFC;
        self.seek(src);
        self.write(&(opcode | delta).to_be_bytes());
    }
}

fn load_codelist(path: &str) -> Result<CodeTable> {
    let raw = fs::read(path).with_context(|| format!("reading {path}"))?;
    if raw.len() >= 8 && raw[0..8] == geckolib::codetable::MAGIC {
        CodeTable::decode_binary(&raw).with_context(|| format!("decoding {path} as a binary codelist"))
    } else {
        let text = String::from_utf8(raw).with_context(|| format!("{path} is not valid UTF-8 text"))?;
        CodeTable::decode_text(&text, TextDecodeOptions::default())
            .with_context(|| format!("decoding {path} as a textual codelist"))
    }
}

fn main() -> Result<()> {
    let path = env::args().nth(1).context("usage: geckolib-demo <codelist file>")?;
    let table = load_codelist(&path)?;

    println!("{} ({}) — {} code(s)", table.game_name, table.game_id, table.len());
    println!("{}", geckolib::print_map(table.codes(), 2));

    let mut image = FlatImage::new(0x8000_0000, 0x0200_0000);
    let applied = geckolib::apply_table(&table, &mut image);
    println!("pre-apply against a scratch 32MiB image: {applied}");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_image_write32_lands_at_the_right_offset() {
        let mut image = FlatImage::new(0x8000_0000, 0x10);
        let cmd = geckolib::Command::Write32 { address: 0x4, is_pointer: false, value: 0xDEADBEEF };
        assert!(geckolib::apply_command(&cmd, &mut image));
        assert_eq!(&image.bytes[4..8], &[0xDE, 0xAD, 0xBE, 0xEF]);
    }
}
