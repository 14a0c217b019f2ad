//! flowfile-pack implements the NiFi FlowFile v3 container format: a binary framing that bundles
//! a set of string key/value metadata ("attributes") with an opaque payload of known length, so
//! that self-describing units of data can move between processes or storage with no separate
//! index.
//!
//! A stream is zero or more records concatenated back-to-back with no separators:
//!
//! ```text
//! record := magic(7 bytes, literal "NiFiFF3")
//!           attrCount(length-field)
//!           attrCount * ( keyLen(length-field) keyBytes(keyLen)
//!                         valLen(length-field) valBytes(valLen) )
//!           payloadLen(int64, 8 bytes signed big-endian)
//!           payloadBytes(payloadLen bytes)
//!
//! length-field := shortForm(2 bytes big-endian u16, value < 65535)
//!               | 0xFF 0xFF longForm(4 bytes big-endian u32)
//! ```
//!
//! [`Packager`] writes one record per call to any [`Write`][std::io::Write] stream. [`Unpackager`]
//! is the stateful counterpart: it parses one record's header and attributes from a shared
//! [`Read`][std::io::Read] stream, then lets the caller drain exactly the declared payload, either
//! copied whole with [`Unpackager::get_data`] or streamed through a [`BoundedReader`] that cannot
//! over-read into the next record. Parsing loops until [`Error::EndOfStream`]:
//!
//! ```no_run
//! use flowfile_pack::{Error, Unpackager};
//!
//! fn drain(mut input: impl std::io::Read) -> flowfile_pack::Result<()> {
//!     let mut unpackager = Unpackager::new();
//!     loop {
//!         let attributes = match unpackager.unpackage(&mut input) {
//!             Ok(attributes) => attributes,
//!             Err(Error::EndOfStream) => return Ok(()),
//!             Err(e) => return Err(e),
//!         };
//!         println!("{} attributes", attributes.len());
//!         unpackager.get_data(&mut input, &mut std::io::sink())?;
//!     }
//! }
//! ```
//!
//! The same operations are available for cooperatively suspending streams via [`AsyncPackager`]
//! and [`AsyncUnpackager`], built on the `futures-io` traits.
//!
//! The codec assumes a reliable, ordered byte stream. There is no version negotiation, no
//! checksum, and no compression; exactly the V3 layout above is handled.

mod error;
mod field;
mod nonblocking;
mod pack;
mod unpack;

pub use self::error::{Error, Result};
pub use self::nonblocking::{AsyncBoundedReader, AsyncPackager, AsyncUnpackager};
pub use self::pack::Packager;
pub use self::unpack::{BoundedReader, Unpackager};

/// The magic token opening every record, identifying the format version.
pub const MAGIC_HEADER: [u8; 7] = *b"NiFiFF3";
