//! Pkt-line framing.
//!
//! Each packet is prefixed with a 4-hex-digit length that counts the prefix
//! itself. `0000` is a flush packet and ends a section.

use std::io::{Read, Write};

use crate::ProtocolError;

/// Maximum data per packet (65520 - 4).
pub const MAX_PKT_DATA_LEN: usize = 65516;

pub const FLUSH_PKT: &[u8; 4] = b"0000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PktLine {
    Data(Vec<u8>),
    Flush,
}

impl PktLine {
    pub fn as_data(&self) -> Option<&[u8]> {
        match self {
            PktLine::Data(d) => Some(d),
            PktLine::Flush => None,
        }
    }
}

pub struct PktLineReader<R> {
    reader: R,
}

impl<R: Read> PktLineReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Read one packet, or `None` at a clean end of input.
    pub fn next_pkt(&mut self) -> Result<Option<PktLine>, ProtocolError> {
        let mut len_buf = [0u8; 4];
        let mut filled = 0;
        while filled < len_buf.len() {
            match self.reader.read(&mut len_buf[filled..])? {
                0 if filled == 0 => return Ok(None),
                0 => {
                    return Err(ProtocolError::InvalidPktLine(
                        "unexpected EOF reading pkt-line length".into(),
                    ))
                }
                n => filled += n,
            }
        }

        let len = std::str::from_utf8(&len_buf)
            .ok()
            .and_then(|s| u16::from_str_radix(s, 16).ok())
            .ok_or_else(|| ProtocolError::InvalidPktLine(format!("invalid pkt-line length {len_buf:?}")))?;

        match len {
            0 => Ok(Some(PktLine::Flush)),
            1..=3 => Err(ProtocolError::InvalidPktLine(format!("pkt-line length {len} is invalid"))),
            _ => {
                let data_len = len as usize - 4;
                if data_len > MAX_PKT_DATA_LEN {
                    return Err(ProtocolError::InvalidPktLine(format!("pkt-line too long: {data_len} bytes")));
                }
                let mut data = vec![0u8; data_len];
                self.reader.read_exact(&mut data).map_err(|e| {
                    ProtocolError::InvalidPktLine(format!("truncated pkt-line of {data_len} bytes: {e}"))
                })?;
                Ok(Some(PktLine::Data(data)))
            }
        }
    }

    /// Like [`next_pkt`](Self::next_pkt) but end of input is an error.
    pub fn read_pkt(&mut self) -> Result<PktLine, ProtocolError> {
        self.next_pkt()?
            .ok_or_else(|| ProtocolError::Protocol("unexpected end of response".into()))
    }

    /// Data packets up to the next flush or end of input.
    pub fn read_until_flush(&mut self) -> Result<Vec<Vec<u8>>, ProtocolError> {
        let mut lines = Vec::new();
        while let Some(PktLine::Data(data)) = self.next_pkt()? {
            lines.push(data);
        }
        Ok(lines)
    }
}

pub struct PktLineWriter<W> {
    writer: W,
}

impl<W: Write> PktLineWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    pub fn write_line(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        if data.len() > MAX_PKT_DATA_LEN {
            return Err(ProtocolError::InvalidPktLine(format!(
                "data too long for pkt-line: {} bytes (max {MAX_PKT_DATA_LEN})",
                data.len()
            )));
        }
        write!(self.writer, "{:04x}", data.len() + 4)?;
        self.writer.write_all(data)?;
        Ok(())
    }

    /// Write a text line, appending `\n` if missing.
    pub fn write_text(&mut self, text: &str) -> Result<(), ProtocolError> {
        if text.ends_with('\n') {
            self.write_line(text.as_bytes())
        } else {
            let mut data = Vec::with_capacity(text.len() + 1);
            data.extend_from_slice(text.as_bytes());
            data.push(b'\n');
            self.write_line(&data)
        }
    }

    pub fn write_flush(&mut self) -> Result<(), ProtocolError> {
        self.writer.write_all(FLUSH_PKT)?;
        Ok(())
    }

    /// Unframed bytes, such as a pack following the commands.
    pub fn write_raw(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        self.writer.write_all(data)?;
        Ok(())
    }
}
