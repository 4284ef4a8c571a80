//! Logical line reconstruction across decoded chunk boundaries.

use std::collections::VecDeque;

use crate::decode::DecodeError;

/// Reassembles newline-delimited lines from a decoded chunk sequence.
///
/// A partial line at the end of one chunk is buffered and completed by the
/// next. When the chunk sequence ends, a final segment with no trailing
/// newline is dropped, not emitted: dump archives terminate every record
/// with `\n`, and a missing terminator means the record is incomplete.
pub struct LineAssembler<I> {
    chunks: I,
    ready: VecDeque<String>,
    partial: String,
    done: bool,
}

impl<I> LineAssembler<I>
where
    I: Iterator<Item = Result<String, DecodeError>>,
{
    pub fn new(chunks: I) -> Self {
        Self {
            chunks,
            ready: VecDeque::new(),
            partial: String::new(),
            done: false,
        }
    }
}

impl<I> Iterator for LineAssembler<I>
where
    I: Iterator<Item = Result<String, DecodeError>>,
{
    type Item = Result<String, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(line) = self.ready.pop_front() {
                return Some(Ok(line));
            }
            if self.done {
                return None;
            }
            match self.chunks.next() {
                None => {
                    // Unterminated tail is dropped, see the type docs.
                    self.done = true;
                    self.partial.clear();
                    return None;
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                Some(Ok(chunk)) => {
                    if !chunk.contains('\n') {
                        self.partial.push_str(&chunk);
                        continue;
                    }
                    let combined = std::mem::take(&mut self.partial) + &chunk;
                    let mut segments: Vec<&str> = combined.split('\n').collect();
                    self.partial = segments.pop().unwrap_or_default().to_string();
                    self.ready.extend(segments.into_iter().map(String::from));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(parts: &[&str]) -> impl Iterator<Item = Result<String, DecodeError>> {
        parts
            .iter()
            .map(|p| Ok(p.to_string()))
            .collect::<Vec<_>>()
            .into_iter()
    }

    fn assemble(parts: &[&str]) -> Vec<String> {
        LineAssembler::new(chunks(parts))
            .map(|l| l.expect("line"))
            .collect()
    }

    #[test]
    fn lines_within_one_chunk() {
        assert_eq!(assemble(&["a\nb\n"]), vec!["a", "b"]);
    }

    #[test]
    fn line_split_across_chunks() {
        assert_eq!(assemble(&["first ", "half\nsecond\n"]), vec!["first half", "second"]);
    }

    #[test]
    fn line_spanning_many_chunks() {
        assert_eq!(assemble(&["a", "b", "c", "\n"]), vec!["abc"]);
    }

    #[test]
    fn empty_lines_preserved() {
        assert_eq!(assemble(&["a\n\nb\n"]), vec!["a", "", "b"]);
    }

    #[test]
    fn unterminated_tail_dropped() {
        assert_eq!(assemble(&["kept\nlost"]), vec!["kept"]);
    }

    #[test]
    fn no_chunks_no_lines() {
        assert!(assemble(&[]).is_empty());
    }

    #[test]
    fn decode_error_propagates_and_ends() {
        let input = vec![
            Ok("ok\n".to_string()),
            Err(DecodeError::WindowExceeded { bytes_read: 11 }),
            Ok("never\n".to_string()),
        ];
        let mut assembler = LineAssembler::new(input.into_iter());
        assert_eq!(assembler.next().unwrap().unwrap(), "ok");
        assert!(matches!(
            assembler.next(),
            Some(Err(DecodeError::WindowExceeded { bytes_read: 11 }))
        ));
        assert!(assembler.next().is_none());
    }

    #[test]
    fn every_byte_boundary_reproduces_lines() {
        let text = "héllo wörld\nдругий запис\n第三行\n";
        let expected = vec!["héllo wörld", "другий запис", "第三行"];
        for chunk_size in 1..=text.len() {
            let decoder = crate::decode::ChunkDecoder::new(
                std::io::Cursor::new(text.as_bytes().to_vec()),
                &crate::decode::ReadOptions {
                    chunk_size_bytes: chunk_size,
                    max_window_size_bytes: 1 << 20,
                    zst_max_window_size_bytes: 1 << 31,
                },
            );
            let lines: Vec<String> = LineAssembler::new(decoder).map(|l| l.unwrap()).collect();
            assert_eq!(lines, expected, "chunk_size={chunk_size}");
        }
    }
}
