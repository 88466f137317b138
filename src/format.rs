//! Human-readable rendering of a codelist (§4.7). Indentation is threaded
//! as an explicit parameter rather than a process-wide mutable global (see
//! the design notes on the source's class-level indentation state).

use crate::code::Code;
use crate::command::Command;

fn print_command(out: &mut String, cmd: &Command, depth: usize, indent_width: usize) {
    out.push_str(&" ".repeat(depth * indent_width));
    out.push_str(&cmd.describe());
    out.push('\n');
    for child in cmd.children() {
        print_command(out, child, depth + 1, indent_width);
    }
}

/// Renders every code in `codes` as an indented one-line-per-command map,
/// block children indented by `indent_width` spaces per nesting level.
pub fn print_map(codes: &[Code], indent_width: usize) -> String {
    let mut out = String::new();
    for code in codes {
        out.push_str(&code.name);
        out.push('\n');
        for cmd in &code.commands {
            print_command(&mut out, cmd, 1, indent_width);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;

    #[test]
    fn block_children_are_indented_one_level_deeper() {
        let code = Code::new(
            "Sample",
            vec![Command::IfEqual32 {
                address: 0x3000,
                is_pointer: false,
                endif: true,
                value: 0,
                children: vec![Command::Write8 { address: 0, is_pointer: false, value: 1, repeat: 0 }],
            }],
        );
        let rendered = print_map(&[code], 2);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "Sample");
        assert!(lines[1].starts_with("  if"));
        assert!(lines[2].starts_with("    write8"));
    }
}
