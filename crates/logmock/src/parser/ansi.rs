/// ANSI escape code stripping
///
/// `ansible-playbook` colours its output when run with a TTY or
/// `ANSIBLE_FORCE_COLOR`, and captured job logs keep those codes. They have to
/// go before format predicates run, otherwise `\x1b[0;32mok: [web1]` never
/// matches the host-result grammar. Event messages keep the original text.

use std::borrow::Cow;

/// Strip ANSI escape codes from a line
///
/// Handles:
/// - CSI sequences: `\x1b[...m`
/// - OSC sequences: `\x1b]...` terminated by BEL or `ESC \`
/// - Simple Fe sequences (`ESC` + one byte in 0x40-0x5F)
///
/// Returns `Cow::Borrowed` when the line carries no escape byte.
pub fn strip_ansi_codes(input: &str) -> Cow<'_, str> {
    if !input.contains('\x1b') {
        return Cow::Borrowed(input);
    }

    let bytes = input.as_bytes();
    let mut output = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == 0x1b && i + 1 >= bytes.len() {
            // Lone trailing ESC
            i += 1;
            continue;
        }
        if bytes[i] == 0x1b {
            // CSI: ESC [ ... final byte in 0x40-0x7E
            if bytes[i + 1] == b'[' {
                i += 2;
                while i < bytes.len() {
                    let b = bytes[i];
                    i += 1;
                    if (0x40..=0x7E).contains(&b) {
                        break;
                    }
                }
                continue;
            }

            // OSC: ESC ] ... BEL | ESC \
            if bytes[i + 1] == b']' {
                i += 2;
                while i < bytes.len() {
                    if bytes[i] == 0x07 {
                        i += 1;
                        break;
                    }
                    if bytes[i] == 0x1b && i + 1 < bytes.len() && bytes[i + 1] == b'\\' {
                        i += 2;
                        break;
                    }
                    i += 1;
                }
                continue;
            }

            if (0x40..=0x5F).contains(&bytes[i + 1]) {
                i += 2;
                continue;
            }
        }

        output.push(bytes[i]);
        i += 1;
    }

    // Only ASCII bytes are ever dropped and every skip stops on an ASCII byte,
    // so the remainder is still valid UTF-8.
    match String::from_utf8(output) {
        Ok(s) => Cow::Owned(s),
        Err(e) => Cow::Owned(String::from_utf8_lossy(e.as_bytes()).into_owned()),
    }
}
