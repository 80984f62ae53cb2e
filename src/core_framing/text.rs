//! Character-set translation for ASCII and EBCDIC transfers.
//!
//! Sits above framing. Units are arbitrary read chunks, so a CRLF pair may
//! straddle two of them; the codec carries one byte of state across calls
//! to keep the translation chunk-boundary agnostic. Binary (Image)
//! transfers bypass this layer entirely. EBCDIC uses the CP037 code page,
//! which is a permutation of Latin-1.

use std::sync::OnceLock;

use crate::session::DataType;

#[rustfmt::skip]
const EBCDIC_TO_LATIN1: [u8; 256] = [
    0x00, 0x01, 0x02, 0x03, 0x9C, 0x09, 0x86, 0x7F, 0x97, 0x8D, 0x8E, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F,
    0x10, 0x11, 0x12, 0x13, 0x9D, 0x85, 0x08, 0x87, 0x18, 0x19, 0x92, 0x8F, 0x1C, 0x1D, 0x1E, 0x1F,
    0x80, 0x81, 0x82, 0x83, 0x84, 0x0A, 0x17, 0x1B, 0x88, 0x89, 0x8A, 0x8B, 0x8C, 0x05, 0x06, 0x07,
    0x90, 0x91, 0x16, 0x93, 0x94, 0x95, 0x96, 0x04, 0x98, 0x99, 0x9A, 0x9B, 0x14, 0x15, 0x9E, 0x1A,
    0x20, 0xA0, 0xE2, 0xE4, 0xE0, 0xE1, 0xE3, 0xE5, 0xE7, 0xF1, 0xA2, 0x2E, 0x3C, 0x28, 0x2B, 0x7C,
    0x26, 0xE9, 0xEA, 0xEB, 0xE8, 0xED, 0xEE, 0xEF, 0xEC, 0xDF, 0x21, 0x24, 0x2A, 0x29, 0x3B, 0xAC,
    0x2D, 0x2F, 0xC2, 0xC4, 0xC0, 0xC1, 0xC3, 0xC5, 0xC7, 0xD1, 0xA6, 0x2C, 0x25, 0x5F, 0x3E, 0x3F,
    0xF8, 0xC9, 0xCA, 0xCB, 0xC8, 0xCD, 0xCE, 0xCF, 0xCC, 0x60, 0x3A, 0x23, 0x40, 0x27, 0x3D, 0x22,
    0xD8, 0x61, 0x62, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68, 0x69, 0xAB, 0xBB, 0xF0, 0xFD, 0xFE, 0xB1,
    0xB0, 0x6A, 0x6B, 0x6C, 0x6D, 0x6E, 0x6F, 0x70, 0x71, 0x72, 0xAA, 0xBA, 0xE6, 0xB8, 0xC6, 0xA4,
    0xB5, 0x7E, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7A, 0xA1, 0xBF, 0xD0, 0xDD, 0xDE, 0xAE,
    0x5E, 0xA3, 0xA5, 0xB7, 0xA9, 0xA7, 0xB6, 0xBC, 0xBD, 0xBE, 0x5B, 0x5D, 0xAF, 0xA8, 0xB4, 0xD7,
    0x7B, 0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49, 0xAD, 0xF4, 0xF6, 0xF2, 0xF3, 0xF5,
    0x7D, 0x4A, 0x4B, 0x4C, 0x4D, 0x4E, 0x4F, 0x50, 0x51, 0x52, 0xB9, 0xFB, 0xFC, 0xF9, 0xFA, 0xFF,
    0x5C, 0xF7, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5A, 0xB2, 0xD4, 0xD6, 0xD2, 0xD3, 0xD5,
    0x30, 0x31, 0x32, 0x33, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0xB3, 0xDB, 0xDC, 0xD9, 0xDA, 0x9F,
];

fn latin1_to_ebcdic() -> &'static [u8; 256] {
    static TABLE: OnceLock<[u8; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut inverse = [0u8; 256];
        for (ebcdic, &latin1) in EBCDIC_TO_LATIN1.iter().enumerate() {
            inverse[latin1 as usize] = ebcdic as u8;
        }
        inverse
    })
}

/// Chunk-boundary-safe re-encoding stage between the local file and the
/// wire framing.
///
/// Outbound remembers the last byte emitted so a CR ending one chunk
/// suppresses the CR insertion for an LF opening the next. Inbound withholds
/// a trailing CR until the next chunk decides whether it belongs to a CRLF
/// pair; [`TextCodec::finish_inbound`] releases it at end of stream.
pub struct TextCodec {
    kind: DataType,
    last_outbound: u8,
    pending_cr: bool,
}

impl TextCodec {
    pub fn new(kind: DataType) -> Self {
        Self {
            kind,
            last_outbound: 0,
            pending_cr: false,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.kind == DataType::Image
    }

    /// Converts lone LF line endings to CRLF without doubling existing CRLF.
    fn lf_to_crlf(&mut self, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len());
        let mut prev = self.last_outbound;
        for &b in data {
            if b == b'\n' && prev != b'\r' {
                out.push(b'\r');
            }
            out.push(b);
            prev = b;
        }
        self.last_outbound = prev;
        out
    }

    /// Converts CRLF line endings back to LF.
    fn crlf_to_lf(&mut self, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len() + 1);
        for &b in data {
            if self.pending_cr {
                self.pending_cr = false;
                if b != b'\n' {
                    out.push(b'\r');
                }
            }
            if b == b'\r' {
                self.pending_cr = true;
            } else {
                out.push(b);
            }
        }
        out
    }

    /// Local representation to wire representation.
    pub fn outbound(&mut self, data: &[u8]) -> Vec<u8> {
        match self.kind {
            DataType::Image => data.to_vec(),
            DataType::Ascii => self.lf_to_crlf(data),
            DataType::Ebcdic => {
                let table = latin1_to_ebcdic();
                self.lf_to_crlf(data)
                    .iter()
                    .map(|&b| table[b as usize])
                    .collect()
            }
        }
    }

    /// Wire representation to local representation.
    pub fn inbound(&mut self, data: &[u8]) -> Vec<u8> {
        match self.kind {
            DataType::Image => data.to_vec(),
            DataType::Ascii => self.crlf_to_lf(data),
            DataType::Ebcdic => {
                let decoded: Vec<u8> = data
                    .iter()
                    .map(|&b| EBCDIC_TO_LATIN1[b as usize])
                    .collect();
                self.crlf_to_lf(&decoded)
            }
        }
    }

    /// A CR withheld at the end of the last inbound chunk, if the stream
    /// ends with one.
    pub fn finish_inbound(&mut self) -> Vec<u8> {
        if std::mem::take(&mut self.pending_cr) {
            vec![b'\r']
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cp037_is_a_permutation() {
        let mut seen = [false; 256];
        for &b in EBCDIC_TO_LATIN1.iter() {
            assert!(!seen[b as usize]);
            seen[b as usize] = true;
        }
    }

    #[test]
    fn ebcdic_roundtrip_is_identity() {
        let mut codec = TextCodec::new(DataType::Ebcdic);
        let text = b"Hello, WORLD 0123456789!".to_vec();
        let wire = codec.outbound(&text);
        assert_eq!(codec.inbound(&wire), text);
    }

    #[test]
    fn ebcdic_maps_known_codepoints() {
        let table = latin1_to_ebcdic();
        assert_eq!(table[b'A' as usize], 0xC1);
        assert_eq!(table[b'a' as usize], 0x81);
        assert_eq!(table[b'0' as usize], 0xF0);
        assert_eq!(table[b' ' as usize], 0x40);
    }

    #[test]
    fn ascii_normalizes_line_endings() {
        let mut codec = TextCodec::new(DataType::Ascii);
        assert_eq!(codec.outbound(b"a\nb\r\nc"), b"a\r\nb\r\nc");
        let mut codec = TextCodec::new(DataType::Ascii);
        assert_eq!(codec.inbound(b"a\r\nb\r\nc"), b"a\nb\nc");
        assert!(codec.finish_inbound().is_empty());
    }

    #[test]
    fn ascii_handles_crlf_split_across_chunks() {
        // Inbound: a CRLF pair cut by the chunk boundary collapses to LF.
        let mut codec = TextCodec::new(DataType::Ascii);
        let mut stored = Vec::new();
        for chunk in [&b"a\r"[..], &b"\nb"[..]] {
            stored.extend(codec.inbound(chunk));
        }
        stored.extend(codec.finish_inbound());
        assert_eq!(stored, b"a\nb");

        // Outbound: the CR ending one chunk is not doubled for the LF
        // opening the next.
        let mut codec = TextCodec::new(DataType::Ascii);
        let mut wire = Vec::new();
        for chunk in [&b"a\r"[..], &b"\nb"[..]] {
            wire.extend(codec.outbound(chunk));
        }
        assert_eq!(wire, b"a\r\nb");
    }

    #[test]
    fn trailing_carriage_return_survives_end_of_stream() {
        let mut codec = TextCodec::new(DataType::Ascii);
        let mut out = codec.inbound(b"x\r");
        assert_eq!(out, b"x");
        out.extend(codec.finish_inbound());
        assert_eq!(out, b"x\r");
    }

    #[test]
    fn image_bypasses_translation() {
        let mut codec = TextCodec::new(DataType::Image);
        let blob = vec![0x00, 0x0A, 0x0D, 0xFF];
        assert!(codec.is_identity());
        assert_eq!(codec.outbound(&blob), blob);
        assert_eq!(codec.inbound(&blob), blob);
    }
}
