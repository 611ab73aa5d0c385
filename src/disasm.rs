use std::fmt::Write;

use crate::decode::{self, Mode, Role};

/// Pretty-print a linear disassembly of an Intcode tape.
///
/// Each decodable word starts an instruction line:
///
/// ```text
/// 0000: 1002 4 3 4       MUL [4] 3 -> [4]
/// ```
///
/// Operands are `[n]` for position mode, `n` for immediate and `[rb+n]`
/// for relative; the write target follows `->`. Words that do not decode,
/// and instructions truncated by the end of the tape, are shown as
/// `.word` data. Since code and data share the tape, data regions that
/// happen to decode are listed as instructions too.
pub fn disassemble(tape: &[i64]) -> String {
    let mut out = String::new();
    let mut pc = 0;
    while pc < tape.len() {
        let word = tape[pc];
        let inst = match decode::decode(word, true) {
            Ok(inst) if pc + inst.opcode.width() <= tape.len() => inst,
            _ => {
                let _ = writeln!(out, "{pc:04}: {word:<16} .word {word}");
                pc += 1;
                continue;
            }
        };

        let width = inst.opcode.width();
        let raw = tape[pc..pc + width]
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(" ");

        let mut text = inst.opcode.mnemonic().to_string();
        for (i, (role, mode)) in inst.params().enumerate() {
            let operand = format_operand(tape[pc + 1 + i], mode);
            match role {
                Role::Read => {
                    let _ = write!(text, " {operand}");
                }
                Role::Write => {
                    let _ = write!(text, " -> {operand}");
                }
            }
        }
        let _ = writeln!(out, "{pc:04}: {raw:<16} {text}");
        pc += width;
    }
    out
}

fn format_operand(raw: i64, mode: Mode) -> String {
    match mode {
        Mode::Position => format!("[{raw}]"),
        Mode::Immediate => raw.to_string(),
        Mode::Relative if raw < 0 => format!("[rb{raw}]"),
        Mode::Relative => format!("[rb+{raw}]"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disassemble_modes() {
        let listing = disassemble(&[1002, 4, 3, 4, 33]);
        assert_eq!(
            listing,
            "0000: 1002 4 3 4       MUL [4] 3 -> [4]\n\
             0004: 33               .word 33\n"
        );
    }

    #[test]
    fn test_disassemble_relative() {
        let listing = disassemble(&[109, 1, 204, -1, 21101, 2, 3, 4, 99]);
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].ends_with("ARB 1"));
        assert!(lines[1].ends_with("OUT [rb-1]"));
        assert!(lines[2].ends_with("ADD 2 3 -> [rb+4]"));
        assert!(lines[3].starts_with("0008: 99"));
        assert!(lines[3].ends_with("HALT"));
    }

    #[test]
    fn test_truncated_instruction_is_data() {
        let listing = disassemble(&[1, 0, 0]);
        assert_eq!(listing.lines().count(), 3);
        assert!(listing.lines().all(|line| line.contains(".word")));
    }

    #[test]
    fn test_immediate_write_is_data() {
        let listing = disassemble(&[11101, 1, 1, 0]);
        assert!(listing.starts_with("0000: 11101"));
        assert!(listing.lines().next().unwrap().ends_with(".word 11101"));
    }

    #[test]
    fn test_empty_tape() {
        assert_eq!(disassemble(&[]), "");
    }
}
