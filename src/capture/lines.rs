use std::mem;

/// Reassembles lines from raw output chunks for the log side.
///
/// `\n`, `\r` and `\r\n` all end a line, so progress output that only
/// returns the carriage is still classified line by line. Terminators are
/// stripped; a terminator split across two chunks is handled.
#[derive(Debug, Default)]
pub(crate) struct LineSplitter {
    partial: Vec<u8>,
    after_cr: bool,
}

impl LineSplitter {
    /// Feed one chunk and collect the lines it completes.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if mem::take(&mut self.after_cr) && byte == b'\n' {
                continue;
            }
            match byte {
                b'\n' => lines.push(mem::take(&mut self.partial)),
                b'\r' => {
                    lines.push(mem::take(&mut self.partial));
                    self.after_cr = true;
                }
                _ => self.partial.push(byte),
            }
        }
        lines
    }

    /// Unterminated trailing text, once the stream has ended.
    pub(crate) fn finish(&mut self) -> Option<Vec<u8>> {
        self.after_cr = false;
        (!self.partial.is_empty()).then(|| mem::take(&mut self.partial))
    }
}
