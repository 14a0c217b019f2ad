use std::collections::HashMap;
use std::io;
use std::io::{Read, Write};

use byteorder::{BigEndian, WriteBytesExt};

use crate::error::Result;
use crate::field::write_field_length;
use crate::MAGIC_HEADER;

/// Encoder for FlowFile v3 records.
///
/// A `Packager` is stateless and may be reused across any number of records and output streams.
#[derive(Clone, Copy, Debug, Default)]
pub struct Packager;

impl Packager {
    /// Create a new Packager.
    pub fn new() -> Packager {
        Packager
    }

    /// Package one record: the magic header, the attribute set, the declared payload length, and
    /// then every remaining byte of `input` copied verbatim to `output`.
    ///
    /// `attributes` of `None` (or an empty map) writes an attribute count of zero. Such a record
    /// is legal to write but will be rejected by [`Unpackager`][crate::Unpackager], which treats
    /// an empty attribute set as malformed.
    ///
    /// The copy is deliberately not truncated to `payload_len`: the caller must supply an input
    /// stream yielding exactly that many bytes, or the record is malformed in a way only the
    /// decoder will detect. Negative `payload_len` values are likewise written unvalidated.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Io`][crate::Error::Io] on any underlying stream failure. Output is
    /// written incrementally, so a failure partway leaves a partially written, unrecoverable
    /// record; no rollback is attempted.
    pub fn package<R, W>(
        &self,
        input: &mut R,
        output: &mut W,
        attributes: Option<&HashMap<String, String>>,
        payload_len: i64,
    ) -> Result<()>
    where
        R: Read + ?Sized,
        W: Write + ?Sized,
    {
        output.write_all(&MAGIC_HEADER)?;

        match attributes {
            None => write_field_length(output, 0)?,
            Some(attributes) => {
                write_field_length(output, attributes.len())?;
                for (key, value) in attributes {
                    write_string(output, key)?;
                    write_string(output, value)?;
                }
            }
        }

        output.write_i64::<BigEndian>(payload_len)?;

        io::copy(input, output)?;
        Ok(())
    }
}

fn write_string<W: Write + ?Sized>(output: &mut W, val: &str) -> io::Result<()> {
    let bytes = val.as_bytes();
    write_field_length(output, bytes.len())?;
    output.write_all(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|&(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn single_attribute_wire_bytes() {
        let attributes = attrs(&[("key1", "value1")]);
        let mut out = Vec::new();
        Packager::new()
            .package(&mut &b"test data"[..], &mut out, Some(&attributes), 9)
            .unwrap();
        assert_eq!(
            hex::encode(&out),
            "4e694669464633000100046b657931000676616c7565310000000000000009746573742064617461"
        );
    }

    #[test]
    fn absent_attributes_write_zero_count() {
        let mut out = Vec::new();
        Packager::new()
            .package(&mut &b"test data"[..], &mut out, None, 9)
            .unwrap();
        assert_eq!(
            hex::encode(&out),
            "4e69466946463300000000000000000009746573742064617461"
        );
    }

    #[test]
    fn empty_map_matches_absent_attributes() {
        let empty = HashMap::new();
        let mut with_empty = Vec::new();
        let mut with_none = Vec::new();
        let packager = Packager::new();
        packager
            .package(&mut &b"x"[..], &mut with_empty, Some(&empty), 1)
            .unwrap();
        packager
            .package(&mut &b"x"[..], &mut with_none, None, 1)
            .unwrap();
        assert_eq!(with_empty, with_none);
    }

    #[test]
    fn copy_is_not_truncated_to_declared_length() {
        let mut out = Vec::new();
        Packager::new()
            .package(&mut &b"test data"[..], &mut out, None, 4)
            .unwrap();
        // Declared 4 bytes, but all 9 input bytes land in the output.
        assert!(out.ends_with(b"test data"));
    }
}
