//! Checked big-endian reader and writer helpers for the compact protocol codecs.
//!
//! Bodies are a fixed-order sequence of big-endian integers and u32-length-prefixed
//! octet strings. Optional IEs carry a one-octet presence flag; lists carry a u32 count.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{CodecError, Result};
use crate::types::{NrCgi, Plmn, SNssai};

/// A sequential reader over a byte slice that fails instead of panicking.
///
/// # Example
/// ```
/// use cucp_common::octet::OctetReader;
///
/// let data = [0x12, 0x34, 0x56];
/// let mut reader = OctetReader::new(&data);
/// assert_eq!(reader.get_u16().unwrap(), 0x1234);
/// assert_eq!(reader.get_u8().unwrap(), 0x56);
/// assert!(reader.finish().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct OctetReader<'a> {
    buf: &'a [u8],
}

impl<'a> OctetReader<'a> {
    /// Creates a reader over `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { buf: data }
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    fn need(&self, needed: usize) -> Result<()> {
        if self.buf.len() < needed {
            return Err(CodecError::BufferTooShort {
                needed,
                available: self.buf.len(),
            });
        }
        Ok(())
    }

    /// Reads one octet.
    pub fn get_u8(&mut self) -> Result<u8> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    /// Reads a big-endian u16.
    pub fn get_u16(&mut self) -> Result<u16> {
        self.need(2)?;
        Ok(self.buf.get_u16())
    }

    /// Reads a big-endian u32.
    pub fn get_u32(&mut self) -> Result<u32> {
        self.need(4)?;
        Ok(self.buf.get_u32())
    }

    /// Reads a big-endian u64.
    pub fn get_u64(&mut self) -> Result<u64> {
        self.need(8)?;
        Ok(self.buf.get_u64())
    }

    /// Reads a boolean octet (0 or 1).
    pub fn get_bool(&mut self, field: &'static str) -> Result<bool> {
        match self.get_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::InvalidValue {
                field,
                value: other as u64,
            }),
        }
    }

    /// Reads exactly `N` octets.
    pub fn get_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.need(N)?;
        let mut out = [0u8; N];
        self.buf.copy_to_slice(&mut out);
        Ok(out)
    }

    /// Reads a u32-length-prefixed octet string.
    pub fn get_octets(&mut self) -> Result<Bytes> {
        let len = self.get_u32()? as usize;
        self.need(len)?;
        Ok(self.buf.copy_to_bytes(len))
    }

    /// Reads a u32-length-prefixed UTF-8 string.
    pub fn get_string(&mut self, field: &'static str) -> Result<String> {
        let raw = self.get_octets()?;
        String::from_utf8(raw.to_vec()).map_err(|_| CodecError::InvalidUtf8(field))
    }

    /// Reads an optional IE: a presence flag followed by the value when present.
    pub fn get_optional<T>(
        &mut self,
        field: &'static str,
        read: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<Option<T>> {
        if self.get_bool(field)? {
            read(self).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Reads a u32-counted list.
    pub fn get_list<T>(&mut self, mut read: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        let count = self.get_u32()? as usize;
        // Every element takes at least one octet.
        self.need(count)?;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(read(self)?);
        }
        Ok(items)
    }

    /// Reads a 3-octet BCD PLMN.
    pub fn get_plmn(&mut self) -> Result<Plmn> {
        Ok(Plmn::decode(self.get_array::<3>()?)?)
    }

    /// Reads an S-NSSAI (SST plus optional SD).
    pub fn get_snssai(&mut self) -> Result<SNssai> {
        let sst = self.get_u8()?;
        let sd = self.get_optional("sd", |r| r.get_array::<3>())?;
        Ok(SNssai { sst, sd })
    }

    /// Reads an NR-CGI (PLMN plus 36-bit cell identity in a u64).
    pub fn get_nr_cgi(&mut self) -> Result<NrCgi> {
        let plmn = self.get_plmn()?;
        let cell_identity = self.get_u64()?;
        if cell_identity > NrCgi::MAX_CELL_IDENTITY {
            return Err(CodecError::InvalidValue {
                field: "nr_cell_identity",
                value: cell_identity,
            });
        }
        Ok(NrCgi::new(plmn, cell_identity))
    }

    /// Fails if any bytes remain unread.
    pub fn finish(self) -> Result<()> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(CodecError::TrailingData(self.buf.len()))
        }
    }
}

/// Writer counterparts of the [`OctetReader`] accessors.
pub trait OctetWriter: BufMut {
    /// Writes a boolean octet.
    fn put_bool(&mut self, value: bool) {
        self.put_u8(value as u8);
    }

    /// Writes a u32-length-prefixed octet string.
    fn put_octets(&mut self, data: &[u8]) {
        self.put_u32(data.len() as u32);
        self.put_slice(data);
    }

    /// Writes a u32-length-prefixed UTF-8 string.
    fn put_string(&mut self, value: &str) {
        self.put_octets(value.as_bytes());
    }

    /// Writes an optional IE with its presence flag.
    fn put_optional<T>(&mut self, value: Option<&T>, write: impl FnOnce(&mut Self, &T))
    where
        Self: Sized,
    {
        match value {
            Some(v) => {
                self.put_bool(true);
                write(self, v);
            }
            None => self.put_bool(false),
        }
    }

    /// Writes a u32-counted list.
    fn put_list<T>(&mut self, items: &[T], mut write: impl FnMut(&mut Self, &T))
    where
        Self: Sized,
    {
        self.put_u32(items.len() as u32);
        for item in items {
            write(self, item);
        }
    }

    /// Writes a 3-octet BCD PLMN.
    fn put_plmn(&mut self, plmn: &Plmn) {
        self.put_slice(&plmn.encode());
    }

    /// Writes an S-NSSAI.
    fn put_snssai(&mut self, snssai: &SNssai)
    where
        Self: Sized,
    {
        self.put_u8(snssai.sst);
        self.put_optional(snssai.sd.as_ref(), |w, sd| w.put_slice(sd));
    }

    /// Writes an NR-CGI.
    fn put_nr_cgi(&mut self, cgi: &NrCgi) {
        self.put_plmn(&cgi.plmn);
        self.put_u64(cgi.cell_identity);
    }
}

impl OctetWriter for BytesMut {}
