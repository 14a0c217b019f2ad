//! Asynchronous mirror of the codec, for cooperatively suspending streams.
//!
//! Wire rules, decoder state machine, and error taxonomy are identical to the blocking codec;
//! only the stream traits differ ([`futures_io::AsyncRead`] / [`futures_io::AsyncWrite`]).

use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use byteorder::{BigEndian, ByteOrder};
use futures_core::ready;
use futures_io::{AsyncRead, AsyncWrite};
use futures_util::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::field::field_length_bytes;
use crate::unpack::State;
use crate::MAGIC_HEADER;

/// Encoder for FlowFile v3 records over asynchronous streams.
///
/// The asynchronous counterpart of [`Packager`][crate::Packager]; stateless and freely reusable.
#[derive(Clone, Copy, Debug, Default)]
pub struct AsyncPackager;

impl AsyncPackager {
    /// Create a new AsyncPackager.
    pub fn new() -> AsyncPackager {
        AsyncPackager
    }

    /// Package one record. Semantics match [`Packager::package`][crate::Packager::package]
    /// exactly: a `None` or empty attribute map writes a zero count, the payload length is
    /// written unvalidated, and the input is copied to exhaustion rather than truncated to
    /// `payload_len`.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Io`][crate::Error::Io] on any underlying stream failure, with no
    /// rollback of bytes already written.
    pub async fn package<R, W>(
        &self,
        input: &mut R,
        output: &mut W,
        attributes: Option<&HashMap<String, String>>,
        payload_len: i64,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin + ?Sized,
        W: AsyncWrite + Unpin + ?Sized,
    {
        output.write_all(&MAGIC_HEADER).await?;

        match attributes {
            None => write_field_length(output, 0).await?,
            Some(attributes) => {
                write_field_length(output, attributes.len()).await?;
                for (key, value) in attributes {
                    write_string(output, key).await?;
                    write_string(output, value).await?;
                }
            }
        }

        output.write_all(&payload_len.to_be_bytes()).await?;

        futures_util::io::copy(input, output).await?;
        Ok(())
    }
}

async fn write_field_length<W: AsyncWrite + Unpin + ?Sized>(
    output: &mut W,
    n: usize,
) -> io::Result<()> {
    let (buf, len) = field_length_bytes(n);
    output.write_all(&buf[..len]).await
}

async fn write_string<W: AsyncWrite + Unpin + ?Sized>(output: &mut W, val: &str) -> io::Result<()> {
    let bytes = val.as_bytes();
    write_field_length(output, bytes.len()).await?;
    output.write_all(bytes).await
}

/// Stateful decoder for a stream of FlowFile v3 records over an asynchronous stream.
///
/// The asynchronous counterpart of [`Unpackager`][crate::Unpackager], with the same call
/// protocol: [`unpackage`][Self::unpackage], then exactly one of [`get_data`][Self::get_data] or
/// [`get_data_reader`][Self::get_data_reader], repeated until `unpackage` returns
/// [`Error::EndOfStream`].
#[derive(Debug)]
pub struct AsyncUnpackager {
    state: State,
}

impl Default for AsyncUnpackager {
    fn default() -> Self {
        Self::new()
    }
}

impl AsyncUnpackager {
    /// Create a new AsyncUnpackager.
    pub fn new() -> AsyncUnpackager {
        AsyncUnpackager {
            state: State::AwaitingHeader,
        }
    }

    /// Parse one record's header and attribute set, leaving the payload unread. Errors match
    /// [`Unpackager::unpackage`][crate::Unpackager::unpackage].
    pub async fn unpackage<R: AsyncRead + Unpin + ?Sized>(
        &mut self,
        input: &mut R,
    ) -> Result<HashMap<String, String>> {
        if let State::AwaitingPayloadDrain { bytes_owed } = self.state {
            return Err(Error::PayloadPending { bytes_owed });
        }

        read_magic(input).await?;
        let attributes = read_attributes(input).await?;

        let mut buf = [0u8; 8];
        fill_exact(input, &mut buf, "payload length").await?;
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
    /// byte count. Errors match [`Unpackager::get_data`][crate::Unpackager::get_data].
    pub async fn get_data<R, W>(&mut self, input: &mut R, output: &mut W) -> Result<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
        W: AsyncWrite + Unpin + ?Sized,
    {
        let State::AwaitingPayloadDrain { bytes_owed } = self.state else {
            return Err(Error::NoPayloadPending);
        };

        let mut bounded = AsyncBoundedReader {
            inner: input,
            remaining: bytes_owed,
        };
        let copied = futures_util::io::copy(&mut bounded, output).await?;
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
    /// declared length. The caller takes over responsibility for fully draining it, exactly as
    /// with [`Unpackager::get_data_reader`][crate::Unpackager::get_data_reader].
    pub fn get_data_reader<'a, R: AsyncRead + Unpin + ?Sized>(
        &mut self,
        input: &'a mut R,
    ) -> Result<(AsyncBoundedReader<'a, R>, u64)> {
        let State::AwaitingPayloadDrain { bytes_owed } = self.state else {
            return Err(Error::NoPayloadPending);
        };
        self.state = State::AwaitingHeader;
        Ok((
            AsyncBoundedReader {
                inner: input,
                remaining: bytes_owed,
            },
            bytes_owed,
        ))
    }
}

async fn read_magic<R: AsyncRead + Unpin + ?Sized>(input: &mut R) -> Result<()> {
    let mut header = [0u8; 7];
    let mut filled = 0;
    while filled < header.len() {
        match input.read(&mut header[filled..]).await {
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

async fn read_attributes<R: AsyncRead + Unpin + ?Sized>(
    input: &mut R,
) -> Result<HashMap<String, String>> {
    let count = read_field_length(input).await?;
    if count == 0 {
        return Err(Error::InvalidAttributes);
    }
    let mut attributes = HashMap::new();
    for _ in 0..count {
        let key = read_string(input, "attribute key").await?;
        let value = read_string(input, "attribute value").await?;
        attributes.insert(key, value);
    }
    Ok(attributes)
}

async fn read_field_length<R: AsyncRead + Unpin + ?Sized>(input: &mut R) -> Result<usize> {
    let mut short = [0u8; 2];
    fill_exact(input, &mut short, "length field").await?;
    if short == [0xff, 0xff] {
        let mut long = [0u8; 4];
        fill_exact(input, &mut long, "escaped length field").await?;
        Ok(BigEndian::read_u32(&long) as usize)
    } else {
        Ok(BigEndian::read_u16(&short) as usize)
    }
}

async fn read_string<R: AsyncRead + Unpin + ?Sized>(
    input: &mut R,
    step: &'static str,
) -> Result<String> {
    let length = read_field_length(input).await?;
    if length == 0 {
        return Err(Error::InvalidString);
    }
    let mut bytes = vec![0u8; length];
    fill_exact(input, &mut bytes, step).await?;
    String::from_utf8(bytes).map_err(|e| Error::InvalidEncoding(e.utf8_error()))
}

async fn fill_exact<R: AsyncRead + Unpin + ?Sized>(
    input: &mut R,
    buf: &mut [u8],
    step: &'static str,
) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]).await {
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

/// An [`AsyncRead`] decorator capped at a byte budget.
///
/// The asynchronous counterpart of [`BoundedReader`][crate::BoundedReader]: holds a reference to
/// the underlying stream and reports end-of-stream once the budget is spent.
#[derive(Debug)]
pub struct AsyncBoundedReader<'a, R: ?Sized> {
    inner: &'a mut R,
    remaining: u64,
}

impl<R: ?Sized> AsyncBoundedReader<'_, R> {
    /// Bytes this view will still yield, assuming the underlying stream holds them.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl<R: AsyncRead + Unpin + ?Sized> AsyncRead for AsyncBoundedReader<'_, R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if this.remaining == 0 {
            return Poll::Ready(Ok(0));
        }
        let max = buf.len().min(this.remaining.min(usize::MAX as u64) as usize);
        let n = ready!(Pin::new(&mut *this.inner).poll_read(cx, &mut buf[..max]))?;
        this.remaining -= n as u64;
        Poll::Ready(Ok(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_executor::block_on;

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|&(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    async fn packaged(attributes: &HashMap<String, String>, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        AsyncPackager::new()
            .package(
                &mut &payload[..],
                &mut out,
                Some(attributes),
                payload.len() as i64,
            )
            .await
            .unwrap();
        out
    }

    #[test]
    fn matches_blocking_encoder() {
        let attributes = attrs(&[("key1", "value1")]);
        let buf = block_on(packaged(&attributes, b"test data"));
        assert_eq!(
            hex::encode(&buf),
            "4e694669464633000100046b657931000676616c7565310000000000000009746573742064617461"
        );
    }

    #[test]
    fn round_trip() {
        block_on(async {
            let attributes = attrs(&[("path", "./"), ("filename", "a.bin")]);
            let buf = packaged(&attributes, b"async payload").await;

            let mut input = &buf[..];
            let mut unpackager = AsyncUnpackager::new();
            let got = unpackager.unpackage(&mut input).await.unwrap();
            assert_eq!(got, attributes);

            let mut data = Vec::new();
            let copied = unpackager.get_data(&mut input, &mut data).await.unwrap();
            assert_eq!(copied, 13);
            assert_eq!(data, b"async payload");

            assert!(matches!(
                unpackager.unpackage(&mut input).await,
                Err(Error::EndOfStream)
            ));
        });
    }

    #[test]
    fn bounded_reader_cannot_reach_next_record() {
        block_on(async {
            let first = attrs(&[("key1", "value1")]);
            let second = attrs(&[("key2", "value2")]);
            let mut buf = packaged(&first, b"first payload").await;
            buf.extend_from_slice(&packaged(&second, b"second payload").await);

            let mut input = &buf[..];
            let mut unpackager = AsyncUnpackager::new();
            unpackager.unpackage(&mut input).await.unwrap();

            let (mut reader, length) = unpackager.get_data_reader(&mut input).unwrap();
            assert_eq!(length, 13);
            let mut data = Vec::new();
            reader.read_to_end(&mut data).await.unwrap();
            assert_eq!(data, b"first payload");
            assert_eq!(reader.remaining(), 0);

            assert_eq!(unpackager.unpackage(&mut input).await.unwrap(), second);
            let mut data = Vec::new();
            unpackager.get_data(&mut input, &mut data).await.unwrap();
            assert_eq!(data, b"second payload");
        });
    }

    #[test]
    fn state_machine_misuse_is_typed() {
        block_on(async {
            let buf = packaged(&attrs(&[("key1", "value1")]), b"test data").await;
            let mut input = &buf[..];
            let mut unpackager = AsyncUnpackager::new();

            let err = unpackager
                .get_data(&mut input, &mut Vec::new())
                .await
                .unwrap_err();
            assert!(matches!(err, Error::NoPayloadPending));

            unpackager.unpackage(&mut input).await.unwrap();
            let err = unpackager.unpackage(&mut input).await.unwrap_err();
            assert!(matches!(err, Error::PayloadPending { bytes_owed: 9 }));
        });
    }
}
