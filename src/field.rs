use std::io;
use std::io::{Read, Write};

use byteorder::{BigEndian, ByteOrder};

use crate::error::{Error, Result};

/// Values below this encode as the 2-byte short form; everything else takes the 6-byte escaped
/// form. Note the boundary itself escapes: 65535 is the sentinel, not a legal short value.
pub(crate) const MAX_SHORT_VALUE: usize = 65535;

/// Encode a length field into a fixed buffer, returning it with the number of bytes used: 2 for
/// the big-endian short form below 65535, 6 for the `0xFF 0xFF` sentinel followed by the value as
/// 4 bytes big-endian. Values above `u32::MAX` are out of contract and get truncated to 32 bits.
pub(crate) fn field_length_bytes(n: usize) -> ([u8; 6], usize) {
    let mut buf = [0u8; 6];
    if n < MAX_SHORT_VALUE {
        BigEndian::write_u16(&mut buf, n as u16);
        (buf, 2)
    } else {
        buf[0] = 0xff;
        buf[1] = 0xff;
        BigEndian::write_u32(&mut buf[2..], n as u32);
        (buf, 6)
    }
}

pub(crate) fn write_field_length<W: Write + ?Sized>(out: &mut W, n: usize) -> io::Result<()> {
    let (buf, len) = field_length_bytes(n);
    out.write_all(&buf[..len])
}

/// Read a length field. Two bytes of `0xFF` escape to a further 4-byte big-endian value; anything
/// else is the value itself as big-endian u16.
pub(crate) fn read_field_length<R: Read + ?Sized>(input: &mut R) -> Result<usize> {
    let mut short = [0u8; 2];
    fill_exact(input, &mut short, "length field")?;
    if short == [0xff, 0xff] {
        let mut long = [0u8; 4];
        fill_exact(input, &mut long, "escaped length field")?;
        Ok(BigEndian::read_u32(&long) as usize)
    } else {
        Ok(BigEndian::read_u16(&short) as usize)
    }
}

/// Fill `buf` completely from the stream, or fail with `ShortRead` carrying the byte counts for
/// the named decoding step. Genuine stream failures surface as `Io`.
pub(crate) fn fill_exact<R: Read + ?Sized>(
    input: &mut R,
    buf: &mut [u8],
    step: &'static str,
) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(Error::ShortRead {
                    step,
                    expected: buf.len() as u64,
                    actual: filled as u64,
                })
            }
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(n: usize) -> Vec<u8> {
        let mut buf = Vec::new();
        write_field_length(&mut buf, n).unwrap();
        buf
    }

    #[test]
    fn short_form_boundary() {
        assert_eq!(encoded(0), vec![0x00, 0x00]);
        assert_eq!(encoded(4), vec![0x00, 0x04]);
        assert_eq!(encoded(65534), vec![0xff, 0xfe]);
    }

    #[test]
    fn escaped_form_boundary() {
        assert_eq!(encoded(65535), vec![0xff, 0xff, 0x00, 0x00, 0xff, 0xff]);
        assert_eq!(encoded(65536), vec![0xff, 0xff, 0x00, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn decode_inverts_encode() {
        for n in [0usize, 1, 4, 127, 65534, 65535, 65536, 0x0123_4567] {
            let buf = encoded(n);
            let got = read_field_length(&mut &buf[..]).unwrap();
            assert_eq!(got, n, "length field should round-trip");
        }
    }

    #[test]
    fn truncated_field_is_short_read() {
        let err = read_field_length(&mut &[0x00u8][..]).unwrap_err();
        assert!(matches!(
            err,
            Error::ShortRead {
                step: "length field",
                expected: 2,
                actual: 1,
            }
        ));

        // Sentinel present but the escaped value cut off
        let err = read_field_length(&mut &[0xffu8, 0xff, 0x00][..]).unwrap_err();
        assert!(matches!(
            err,
            Error::ShortRead {
                step: "escaped length field",
                expected: 4,
                actual: 1,
            }
        ));
    }
}
