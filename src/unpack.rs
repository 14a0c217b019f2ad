use std::collections::HashMap;
use std::io;
use std::io::{Read, Write};

use byteorder::{BigEndian, ByteOrder};

use crate::error::{Error, Result};
use crate::field::{fill_exact, read_field_length};
use crate::MAGIC_HEADER;

/// Where the decoder stands between calls. Parsing a header leaves a payload owed to the caller;
/// draining it (or handing out a bounded reader for it) arms the next header parse.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum State {
    AwaitingHeader,
    AwaitingPayloadDrain { bytes_owed: u64 },
}

/// Stateful decoder for a stream of FlowFile v3 records.
///
/// One `Unpackager` decodes one stream. For each record, call [`unpackage`][Self::unpackage] to
/// parse the header and attributes, then drain the payload exactly once with either
/// [`get_data`][Self::get_data] or [`get_data_reader`][Self::get_data_reader] before parsing the
/// next header. Illegal call sequences return [`Error::PayloadPending`] or
/// [`Error::NoPayloadPending`] rather than silently desynchronizing the stream.
///
/// Iterate until `unpackage` returns [`Error::EndOfStream`]; every other error is terminal for
/// the stream, since a malformed record poisons the stream position.
#[derive(Debug)]
pub struct Unpackager {
    state: State,
}

impl Default for Unpackager {
    fn default() -> Self {
        Self::new()
    }
}

impl Unpackager {
    /// Create a new Unpackager.
    pub fn new() -> Unpackager {
        Unpackager {
            state: State::AwaitingHeader,
        }
    }

    /// Parse one record's header and attribute set, leaving the payload unread in the stream.
    ///
    /// On success the decoder owes the caller the record's declared payload, which must be
    /// drained before the next call.
    ///
    /// # Errors
    ///
    /// - [`Error::EndOfStream`] if the stream was already exhausted: the clean no-more-records
    ///   condition.
    /// - [`Error::MalformedHeader`] if the magic bytes are truncated, mismatched, or the stream
    ///   errored while they were read.
    /// - [`Error::InvalidAttributes`] if the declared attribute count is zero.
    /// - [`Error::InvalidString`], [`Error::InvalidEncoding`], [`Error::ShortRead`] for bad
    ///   attribute strings.
    /// - [`Error::NegativeLength`] if the declared payload length is negative.
    /// - [`Error::PayloadPending`] if the previous record's payload wasn't drained.
    pub fn unpackage<R: Read + ?Sized>(
        &mut self,
        input: &mut R,
    ) -> Result<HashMap<String, String>> {
        if let State::AwaitingPayloadDrain { bytes_owed } = self.state {
            return Err(Error::PayloadPending { bytes_owed });
        }

        read_magic(input)?;
        let attributes = read_attributes(input)?;

        let mut buf = [0u8; 8];
        fill_exact(input, &mut buf, "payload length")?;
        let declared = BigEndian::read_i64(&buf);
        if declared < 0 {
            return Err(Error::NegativeLength(declared));
        }

        self.state = State::AwaitingPayloadDrain {
            bytes_owed: declared as u64,
        };
        Ok(attributes)
    }

    /// Copy exactly the pending record's declared payload from `input` to `output`, returning the
    /// byte count. Only on success is the decoder re-armed for the next header parse.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::ShortRead`] if the stream held fewer bytes than declared, with
    /// [`Error::Io`] on a genuine stream failure, and with [`Error::NoPayloadPending`] if no
    /// parsed record is awaiting its drain.
    pub fn get_data<R, W>(&mut self, input: &mut R, output: &mut W) -> Result<u64>
    where
        R: Read + ?Sized,
        W: Write + ?Sized,
    {
        let State::AwaitingPayloadDrain { bytes_owed } = self.state else {
            return Err(Error::NoPayloadPending);
        };

        let mut bounded = BoundedReader {
            inner: input,
            remaining: bytes_owed,
        };
        let copied = io::copy(&mut bounded, output)?;
        if copied != bytes_owed {
            return Err(Error::ShortRead {
                step: "payload",
                expected: bytes_owed,
                actual: copied,
            });
        }

        self.state = State::AwaitingHeader;
        Ok(copied)
    }

    /// Hand out a reader view hard-limited to the pending record's payload, along with the
    /// declared length.
    ///
    /// The view consumes the underlying stream lazily as the caller reads from it, and reports
    /// end-of-stream once the budget is spent no matter how much more the stream holds. The
    /// decoder is re-armed immediately: the caller takes over responsibility for fully draining
    /// the view before the next [`unpackage`][Self::unpackage] call, and the decoder does not
    /// track whether that happened.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NoPayloadPending`] if no parsed record is awaiting its drain.
    pub fn get_data_reader<'a, R: Read + ?Sized>(
        &mut self,
        input: &'a mut R,
    ) -> Result<(BoundedReader<'a, R>, u64)> {
        let State::AwaitingPayloadDrain { bytes_owed } = self.state else {
            return Err(Error::NoPayloadPending);
        };
        self.state = State::AwaitingHeader;
        Ok((
            BoundedReader {
                inner: input,
                remaining: bytes_owed,
            },
            bytes_owed,
        ))
    }
}

/// Read and check the 7 magic bytes. Zero bytes available is the clean end-of-stream condition;
/// a partial header or a stream error mid-read is a malformed header.
fn read_magic<R: Read + ?Sized>(input: &mut R) -> Result<()> {
    let mut header = [0u8; 7];
    let mut filled = 0;
    while filled < header.len() {
        match input.read(&mut header[filled..]) {
            Ok(0) if filled == 0 => return Err(Error::EndOfStream),
            Ok(0) => return Err(Error::MalformedHeader),
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => return Err(Error::MalformedHeader),
        }
    }
    if header != MAGIC_HEADER {
        return Err(Error::MalformedHeader);
    }
    Ok(())
}

fn read_attributes<R: Read + ?Sized>(input: &mut R) -> Result<HashMap<String, String>> {
    let count = read_field_length(input)?;
    if count == 0 {
        return Err(Error::InvalidAttributes);
    }
    let mut attributes = HashMap::new();
    for _ in 0..count {
        let key = read_string(input, "attribute key")?;
        let value = read_string(input, "attribute value")?;
        // Repeated keys: last write wins
        attributes.insert(key, value);
    }
    Ok(attributes)
}

fn read_string<R: Read + ?Sized>(input: &mut R, step: &'static str) -> Result<String> {
    let length = read_field_length(input)?;
    if length == 0 {
        return Err(Error::InvalidString);
    }
    let mut bytes = vec![0u8; length];
    fill_exact(input, &mut bytes, step)?;
    String::from_utf8(bytes).map_err(|e| Error::InvalidEncoding(e.utf8_error()))
}

/// A `Read` decorator capped at a byte budget.
///
/// Holds a reference to the underlying stream, not ownership. Once the budget is spent every read
/// returns 0 regardless of how much more the underlying stream has, so a caller can never over-
/// read into the next record through this view.
#[derive(Debug)]
pub struct BoundedReader<'a, R: ?Sized> {
    inner: &'a mut R,
    remaining: u64,
}

impl<R: ?Sized> BoundedReader<'_, R> {
    /// Bytes this view will still yield, assuming the underlying stream holds them.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl<R: Read + ?Sized> Read for BoundedReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }
        let max = buf.len().min(self.remaining.min(usize::MAX as u64) as usize);
        let n = self.inner.read(&mut buf[..max])?;
        self.remaining -= n as u64;
        Ok(n)
    }
}
