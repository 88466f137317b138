//! A named, authored sequence of commands (one entry of a `CodeTable`).

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::command::Command;
use crate::cursor::TextWriter;

/// A labelled block of commands plus display metadata. `commands` never
/// contains an explicit `Exit`; the enclosing `CodeTable` appends that on
/// binary/textual emission (see `crate::codetable`).
#[derive(Debug, Clone)]
pub struct Code {
    pub name: String,
    pub author: Option<String>,
    pub description: Vec<String>,
    pub enabled: bool,
    /// Clear when the textual `[[volatile]]` marker is present; a volatile
    /// code is skipped wholesale by the table-level pre-apply walk.
    pub pre_applicable: bool,
    pub commands: Vec<Command>,
}

/// Per §4.4: two codes are equal iff their textual header plus command
/// sequence hash equally, regardless of description.
impl PartialEq for Code {
    fn eq(&self, other: &Self) -> bool {
        self.full_hash() == other.full_hash()
    }
}

impl Code {
    pub fn new(name: impl Into<String>, commands: Vec<Command>) -> Self {
        Code {
            name: name.into(),
            author: None,
            description: Vec::new(),
            enabled: true,
            pre_applicable: true,
            commands,
        }
    }

    /// Inserts a command, preserving insertion order. If the sequence were
    /// ever to end in an explicit `Exit` (not produced by this type's own
    /// codec, but tolerated from hand-built sequences), the new command is
    /// placed before it rather than after.
    pub fn add_child(&mut self, command: Command) {
        if matches!(self.commands.last(), Some(Command::Exit)) {
            let last = self.commands.len() - 1;
            self.commands.insert(last, command);
        } else {
            self.commands.push(command);
        }
    }

    /// Hex text of just this code's command sequence (no header/name), used
    /// as the input to both hashes below and as the body of every textual
    /// presentation.
    pub fn body_text(&self) -> Vec<String> {
        let mut w = TextWriter::default();
        for cmd in &self.commands {
            crate::codec::encode_command(&mut w, cmd);
        }
        w.lines
    }

    /// Hash of the command sequence's textual form alone. Two codes with
    /// this hash equal are "body-equal" regardless of name/author/description.
    pub fn body_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for line in self.body_text() {
            line.hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Hash of the textual header (name/author/volatile marker) plus body,
    /// used for whole-`Code` equality in `CodeTable`.
    pub fn full_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.name.hash(&mut hasher);
        self.author.hash(&mut hasher);
        self.pre_applicable.hash(&mut hasher);
        for line in self.body_text() {
            line.hash(&mut hasher);
        }
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;

    fn sample() -> Code {
        Code::new(
            "Test Code",
            vec![Command::Write32 { address: 0x1000, is_pointer: false, value: 1 }],
        )
    }

    #[test]
    fn add_child_inserts_before_trailing_exit() {
        let mut code = sample();
        code.commands.push(Command::Exit);
        code.add_child(Command::Write32 { address: 0x2000, is_pointer: false, value: 2 });
        assert_eq!(code.commands.len(), 3);
        assert_eq!(code.commands.last().unwrap().kind(), crate::kind::Kind::Exit);
    }

    #[test]
    fn body_hash_ignores_name_and_author() {
        let mut a = sample();
        let mut b = sample();
        a.name = "Alpha".to_string();
        b.name = "Beta".to_string();
        b.author = Some("Someone".to_string());
        assert_eq!(a.body_hash(), b.body_hash());
        assert_ne!(a.full_hash(), b.full_hash());
    }
}
