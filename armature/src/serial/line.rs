//! Assembly of input bytes into lines.
//!
//! Bytes pushed into a [`LineDiscipline`] are buffered until
//! [`LineDiscipline::next_line`] finds a terminator. Whatever follows the
//! terminator stays buffered for the next call.
//!
//! In VT100 mode a minimal line editor sits in front of the terminator
//! detection: backspace and DEL erase, escape sequences are dropped, and the
//! up and down arrows recall previously entered lines.

use std::collections::VecDeque;

use tracing::warn;

use super::{LineStyle, TerminalMode};

const BACKSPACE: u8 = 0x08;
const DEL: u8 = 0x7f;
const ESC: u8 = 0x1b;
/// Sent by some keyboards instead of Return.
const ALT_RETURN: u8 = 0xd0;

pub const HISTORY_LEN: usize = 32;
/// Longer lines are dropped up to their terminator.
pub const MAX_LINE_LEN: usize = 4096;
/// Queued input beyond this loses its oldest bytes.
pub const MAX_BACKLOG: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Escape {
    Idle,
    /// Got ESC.
    Start,
    /// Inside `ESC [ params final`.
    Csi { has_params: bool },
    /// Got `ESC O`, the next byte ends the sequence.
    Ss3,
}

#[derive(Debug)]
pub struct LineDiscipline {
    style: LineStyle,
    mode: TerminalMode,
    backlog: VecDeque<u8>,
    partial: Vec<u8>,
    /// Skipping the rest of an overlong line.
    discarding: bool,
    escape: Escape,
    history: VecDeque<Vec<u8>>,
    history_pos: Option<usize>,
}

impl LineDiscipline {
    pub fn new(style: LineStyle, mode: TerminalMode) -> Self {
        Self {
            style,
            mode,
            backlog: VecDeque::new(),
            partial: Vec::new(),
            discarding: false,
            escape: Escape::Idle,
            history: VecDeque::new(),
            history_pos: None,
        }
    }

    pub fn style(&self) -> LineStyle {
        self.style
    }

    pub fn set_style(&mut self, style: LineStyle) {
        self.style = style;
    }

    pub fn mode(&self) -> TerminalMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: TerminalMode) {
        self.mode = mode;
        self.escape = Escape::Idle;
    }

    /// Queue raw input bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.backlog.extend(bytes);
        if self.backlog.len() > MAX_BACKLOG {
            let excess = self.backlog.len() - MAX_BACKLOG;
            self.backlog.drain(..excess);
            warn!(dropped = excess, "Serial input backlog full, oldest bytes dropped");
        }
    }

    /// Whether bytes are queued that have not been examined yet.
    pub fn has_backlog(&self) -> bool {
        !self.backlog.is_empty()
    }

    /// Bytes of the line currently being assembled.
    pub fn partial(&self) -> &[u8] {
        &self.partial
    }

    /// Drop queued input and the partial line. History is kept.
    pub fn clear(&mut self) {
        self.backlog.clear();
        self.partial.clear();
        self.discarding = false;
        self.escape = Escape::Idle;
        self.history_pos = None;
    }

    /// Previously completed lines, oldest first. Only kept in VT100 mode.
    pub fn history(&self) -> impl Iterator<Item = String> + '_ {
        self.history.iter().map(|l| String::from_utf8_lossy(l).into_owned())
    }

    /// Consume queued bytes until a line is complete.
    pub fn next_line(&mut self) -> Option<String> {
        while let Some(byte) = self.backlog.pop_front() {
            if self.mode == TerminalMode::Vt100 && self.edit(byte) {
                continue;
            }
            if let Some(line) = self.accept(byte) {
                return Some(line);
            }
        }
        None
    }

    /// Terminator detection. Returns the finished line, if any.
    fn accept(&mut self, byte: u8) -> Option<String> {
        let end = match self.style {
            LineStyle::Lf => byte == b'\n',
            LineStyle::Cr => byte == b'\r',
            LineStyle::Zero => byte == 0,
            LineStyle::Crlf => {
                if byte == b'\n' && self.partial.last() == Some(&b'\r') {
                    self.partial.pop();
                    true
                } else {
                    false
                }
            }
            LineStyle::Sloppy => {
                if matches!(byte, b'\r' | b'\n' | 0 | ALT_RETURN) {
                    // Runs of terminators, including CRLF, collapse into one
                    if self.partial.is_empty() {
                        return None;
                    }
                    true
                } else {
                    false
                }
            }
        };

        if !end {
            if self.discarding {
                // Only the last byte is needed to spot a CRLF
                self.partial.clear();
            } else if self.partial.len() >= MAX_LINE_LEN {
                warn!(limit = MAX_LINE_LEN, "Serial input line too long, dropped");
                self.partial.clear();
                self.discarding = true;
            }
            self.partial.push(byte);
            return None;
        }

        let line = std::mem::take(&mut self.partial);
        self.history_pos = None;
        if std::mem::take(&mut self.discarding) {
            return None;
        }
        if self.mode == TerminalMode::Vt100 && !line.is_empty() {
            if self.history.back() != Some(&line) {
                if self.history.len() == HISTORY_LEN {
                    self.history.pop_front();
                }
                self.history.push_back(line.clone());
            }
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// VT100 editing. Returns true when the byte was consumed.
    fn edit(&mut self, byte: u8) -> bool {
        match self.escape {
            Escape::Idle => match byte {
                BACKSPACE | DEL => {
                    self.partial.pop();
                    true
                }
                ESC => {
                    self.escape = Escape::Start;
                    true
                }
                _ => false,
            },
            Escape::Start => {
                self.escape = match byte {
                    b'[' => Escape::Csi { has_params: false },
                    b'O' => Escape::Ss3,
                    _ => Escape::Idle,
                };
                true
            }
            Escape::Csi { has_params } => {
                match byte {
                    // Parameter and intermediate bytes
                    0x20..=0x3f => self.escape = Escape::Csi { has_params: true },
                    0x40..=0x7e => {
                        self.escape = Escape::Idle;
                        if !has_params {
                            self.arrow(byte);
                        }
                    }
                    // Malformed, give up on the sequence
                    _ => self.escape = Escape::Idle,
                }
                true
            }
            Escape::Ss3 => {
                self.escape = Escape::Idle;
                self.arrow(byte);
                true
            }
        }
    }

    fn arrow(&mut self, key: u8) {
        if self.history.is_empty() {
            return;
        }
        match key {
            b'A' => {
                let pos = match self.history_pos {
                    None => self.history.len() - 1,
                    Some(pos) => pos.saturating_sub(1),
                };
                self.recall(Some(pos));
            }
            b'B' => match self.history_pos {
                Some(pos) if pos + 1 < self.history.len() => self.recall(Some(pos + 1)),
                Some(_) => self.recall(None),
                None => {}
            },
            _ => {}
        }
    }

    fn recall(&mut self, pos: Option<usize>) {
        self.history_pos = pos;
        self.partial = match pos {
            Some(pos) => self.history[pos].clone(),
            None => Vec::new(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(style: LineStyle, mode: TerminalMode, chunks: &[&[u8]]) -> Vec<String> {
        let mut ld = LineDiscipline::new(style, mode);
        let mut out = Vec::new();
        for chunk in chunks {
            ld.push(chunk);
            while let Some(line) = ld.next_line() {
                out.push(line);
            }
        }
        out
    }

    fn plain(style: LineStyle, chunks: &[&[u8]]) -> Vec<String> {
        lines(style, TerminalMode::Plain, chunks)
    }

    #[test]
    fn test_sloppy_reassembly() {
        assert_eq!(
            plain(LineStyle::Sloppy, &[b"hel", b"lo\r", b"world\n"]),
            vec!["hello", "world"]
        );
    }

    #[test]
    fn test_sloppy_collapses_terminators() {
        assert_eq!(
            plain(LineStyle::Sloppy, &[b"\r\n\r\na\r\n\0b\xd0\n\n"]),
            vec!["a", "b"]
        );
    }

    #[test]
    fn test_lf_keeps_cr_and_empty_lines() {
        assert_eq!(
            plain(LineStyle::Lf, &[b"a\r\n\nb\n"]),
            vec!["a\r", "", "b"]
        );
    }

    #[test]
    fn test_cr_only() {
        assert_eq!(plain(LineStyle::Cr, &[b"a\nb\rc"]), vec!["a\nb"]);
    }

    #[test]
    fn test_crlf_requires_pair() {
        assert_eq!(
            plain(LineStyle::Crlf, &[b"a\nb\r", b"\n", b"c\rd\r\n"]),
            vec!["a\nb", "c\rd"]
        );
    }

    #[test]
    fn test_zero() {
        assert_eq!(plain(LineStyle::Zero, &[b"a\nb\0c\0"]), vec!["a\nb", "c"]);
    }

    #[test]
    fn test_backlog_kept_between_calls() {
        let mut ld = LineDiscipline::new(LineStyle::Lf, TerminalMode::Plain);
        ld.push(b"one\ntwo\nthr");
        assert_eq!(ld.next_line().as_deref(), Some("one"));
        assert!(ld.has_backlog());
        assert_eq!(ld.next_line().as_deref(), Some("two"));
        assert_eq!(ld.next_line(), None);
        assert_eq!(ld.partial(), b"thr");
        ld.push(b"ee\n");
        assert_eq!(ld.next_line().as_deref(), Some("three"));
    }

    #[test]
    fn test_plain_mode_keeps_control_bytes() {
        assert_eq!(plain(LineStyle::Lf, &[b"ab\x08c\n"]), vec!["ab\x08c"]);
    }

    #[test]
    fn test_vt100_erase_and_escape_stripping() {
        assert_eq!(
            lines(
                LineStyle::Sloppy,
                TerminalMode::Vt100,
                &[b"helo\x08lo\x7f\x7flo\r", b"x\x1b[1;5Cy\x1bOPz\r"]
            ),
            vec!["hello", "xyz"]
        );
    }

    #[test]
    fn test_vt100_escape_split_across_chunks() {
        assert_eq!(
            lines(LineStyle::Sloppy, TerminalMode::Vt100, &[b"a\x1b", b"[", b"2", b"~b\n"]),
            vec!["ab"]
        );
    }

    #[test]
    fn test_vt100_history() {
        let mut ld = LineDiscipline::new(LineStyle::Sloppy, TerminalMode::Vt100);
        ld.push(b"first\rsecond\r");
        assert_eq!(ld.next_line().as_deref(), Some("first"));
        assert_eq!(ld.next_line().as_deref(), Some("second"));

        // Up, up, down
        ld.push(b"\x1b[A\x1b[A\x1b[B");
        assert_eq!(ld.next_line(), None);
        assert_eq!(ld.partial(), b"second");

        // Up past the oldest entry stays there
        ld.push(b"\x1bOA\x1bOA\x1bOA");
        assert_eq!(ld.next_line(), None);
        assert_eq!(ld.partial(), b"first");

        ld.push(b"!\r");
        assert_eq!(ld.next_line().as_deref(), Some("first!"));
        assert_eq!(ld.history().collect::<Vec<_>>(), vec!["first", "second", "first!"]);

        // Down past the newest entry clears the line
        ld.push(b"\x1b[A\x1b[B");
        assert_eq!(ld.next_line(), None);
        assert!(ld.partial().is_empty());
    }

    #[test]
    fn test_history_bounded() {
        let mut ld = LineDiscipline::new(LineStyle::Lf, TerminalMode::Vt100);
        for i in 0..HISTORY_LEN + 5 {
            ld.push(format!("cmd{i}\n").as_bytes());
            assert!(ld.next_line().is_some());
        }
        let history: Vec<_> = ld.history().collect();
        assert_eq!(history.len(), HISTORY_LEN);
        assert_eq!(history[0], "cmd5");
    }

    #[test]
    fn test_overlong_line_dropped() {
        let long = vec![b'a'; MAX_LINE_LEN + 10];
        assert_eq!(plain(LineStyle::Lf, &[&long, b"\nok\n"]), vec!["ok"]);
        assert_eq!(plain(LineStyle::Crlf, &[&long, b"\r", b"\nok\r\n"]), vec!["ok"]);
        assert_eq!(plain(LineStyle::Sloppy, &[&long, b"\r\nok\r\n"]), vec!["ok"]);

        let full = vec![b'b'; MAX_LINE_LEN];
        let out = plain(LineStyle::Lf, &[&full, b"\n"]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].len(), MAX_LINE_LEN);
    }

    #[test]
    fn test_backlog_bounded() {
        let mut ld = LineDiscipline::new(LineStyle::Lf, TerminalMode::Plain);
        ld.push(b"old\n");
        ld.push(&vec![b'x'; MAX_BACKLOG]);
        assert_eq!(ld.backlog.len(), MAX_BACKLOG);
        assert_eq!(ld.next_line(), None);
    }

    #[test]
    fn test_clear() {
        let mut ld = LineDiscipline::new(LineStyle::Lf, TerminalMode::Plain);
        ld.push(b"abc\ndef");
        ld.clear();
        assert!(!ld.has_backlog());
        assert_eq!(ld.next_line(), None);
    }
}
