use std::net::IpAddr;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::dictionary::avp;
use crate::error::{CodecError, Result};
use crate::identity::Identity;

const AVP_FLAG_VENDOR: u8 = 0x80;
const AVP_FLAG_MANDATORY: u8 = 0x40;
const AVP_FLAG_PROTECTED: u8 = 0x20;

/// AVP flag bits. Reserved bits are ignored on read and written as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AvpFlags {
    pub vendor: bool,
    pub mandatory: bool,
    pub protected: bool,
}

impl AvpFlags {
    pub(crate) fn unpack(byte: u8) -> Self {
        Self {
            vendor: byte & AVP_FLAG_VENDOR != 0,
            mandatory: byte & AVP_FLAG_MANDATORY != 0,
            protected: byte & AVP_FLAG_PROTECTED != 0,
        }
    }

    pub(crate) fn pack(self) -> u8 {
        let mut byte = 0;
        if self.vendor {
            byte |= AVP_FLAG_VENDOR;
        }
        if self.mandatory {
            byte |= AVP_FLAG_MANDATORY;
        }
        if self.protected {
            byte |= AVP_FLAG_PROTECTED;
        }
        byte
    }
}

/// A raw Attribute-Value Pair: code, flags, optional vendor id and the
/// unpadded payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAvp {
    pub code: u32,
    /// 0 means no vendor; any other value implies the vendor flag.
    pub vendor_id: u32,
    pub flags: AvpFlags,
    pub payload: Bytes,
}

impl RawAvp {
    pub fn new(code: u32, vendor_id: u32, mandatory: bool, payload: impl Into<Bytes>) -> Self {
        Self {
            code,
            vendor_id,
            flags: AvpFlags {
                vendor: vendor_id != 0,
                mandatory,
                protected: false,
            },
            payload: payload.into(),
        }
    }

    /// Unsigned32 AVP.
    pub fn unsigned32(code: u32, mandatory: bool, value: u32) -> Self {
        Self::new(code, 0, mandatory, value.to_be_bytes().to_vec())
    }

    /// UTF8String AVP.
    pub fn utf8(code: u32, mandatory: bool, value: &str) -> Self {
        Self::new(code, 0, mandatory, value.as_bytes().to_vec())
    }

    /// DiameterIdentity AVP.
    pub fn identity(code: u32, mandatory: bool, value: &Identity) -> Self {
        Self::new(code, 0, mandatory, value.as_bytes().to_vec())
    }

    /// Address AVP: two-byte address family followed by the raw address.
    pub fn address(code: u32, mandatory: bool, addr: IpAddr) -> Self {
        let mut data = Vec::with_capacity(18);
        match addr {
            IpAddr::V4(v4) => {
                data.extend_from_slice(&1u16.to_be_bytes());
                data.extend_from_slice(&v4.octets());
            }
            IpAddr::V6(v6) => {
                data.extend_from_slice(&2u16.to_be_bytes());
                data.extend_from_slice(&v6.octets());
            }
        }
        Self::new(code, 0, mandatory, data)
    }

    /// Grouped AVP built from already-constructed members.
    pub fn grouped(code: u32, mandatory: bool, members: &[RawAvp]) -> Result<Self> {
        let mut buf = BytesMut::new();
        for member in members {
            member.put(&mut buf)?;
        }
        Ok(Self::new(code, 0, mandatory, buf.freeze()))
    }

    pub fn as_unsigned32(&self) -> Result<u32> {
        let bytes: [u8; 4] =
            self.payload
                .as_ref()
                .try_into()
                .map_err(|_| CodecError::InvalidAvpValue {
                    code: self.code,
                    reason: format!("Unsigned32 payload of {} bytes", self.payload.len()),
                })?;
        Ok(u32::from_be_bytes(bytes))
    }

    pub fn as_utf8(&self) -> Result<&str> {
        std::str::from_utf8(&self.payload).map_err(|_| CodecError::InvalidAvpValue {
            code: self.code,
            reason: "payload is not valid UTF-8".to_string(),
        })
    }

    pub fn as_identity(&self) -> Result<Identity> {
        Identity::from_utf8(&self.payload)
    }

    /// Parse the payload as a sequence of member AVPs.
    pub fn grouped_members(&self) -> Result<Vec<RawAvp>> {
        let mut buf = self.payload.as_ref();
        let mut members = Vec::new();
        while !buf.is_empty() {
            members.push(RawAvp::get(&mut buf)?);
        }
        Ok(members)
    }

    /// Encoded length without trailing padding.
    pub fn encoded_len(&self) -> usize {
        let header = if self.vendor_bit() { 12 } else { 8 };
        header + self.payload.len()
    }

    /// Encoded length rounded up to the 4-byte boundary.
    pub fn padded_len(&self) -> usize {
        align4(self.encoded_len())
    }

    fn vendor_bit(&self) -> bool {
        self.flags.vendor || self.vendor_id != 0
    }

    /// Append the AVP, including padding, to `buf`.
    pub(crate) fn put(&self, buf: &mut BytesMut) -> Result<()> {
        if self.flags.vendor != (self.vendor_id != 0) {
            return Err(CodecError::MalformedAvp(format!(
                "AVP {}: vendor flag does not match vendor-id {}",
                self.code, self.vendor_id
            )));
        }
        let len = self.encoded_len();
        if len > 0x00FF_FFFF {
            return Err(CodecError::EncodingOverflow(len));
        }

        buf.put_u32(self.code);
        buf.put_u8(self.flags.pack());
        put_u24(buf, len as u32);
        if self.vendor_id != 0 {
            buf.put_u32(self.vendor_id);
        }
        buf.put_slice(&self.payload);
        for _ in len..align4(len) {
            buf.put_u8(0);
        }
        Ok(())
    }

    /// Parse one AVP from the front of `buf`, consuming its padding.
    ///
    /// Padding bytes are consumed but not required to be zero.
    pub(crate) fn get(buf: &mut &[u8]) -> Result<Self> {
        if buf.remaining() < 8 {
            return Err(CodecError::TruncatedAvp {
                need: 8 - buf.remaining(),
                have: buf.remaining(),
            });
        }
        let code = buf.get_u32();
        let flags = AvpFlags::unpack(buf.get_u8());
        let len = get_u24(buf) as usize;

        let header = if flags.vendor { 12 } else { 8 };
        if len < header {
            return Err(CodecError::MalformedAvp(format!(
                "AVP {code}: length {len} below header size {header}"
            )));
        }

        let vendor_id = if flags.vendor {
            if buf.remaining() < 4 {
                return Err(CodecError::TruncatedAvp {
                    need: 4 - buf.remaining(),
                    have: buf.remaining(),
                });
            }
            buf.get_u32()
        } else {
            0
        };

        let body = len - header;
        let padding = align4(len) - len;
        if buf.remaining() < body + padding {
            return Err(CodecError::TruncatedAvp {
                need: body + padding - buf.remaining(),
                have: buf.remaining(),
            });
        }
        let payload = Bytes::copy_from_slice(&buf[..body]);
        buf.advance(body + padding);

        Ok(Self {
            code,
            vendor_id,
            flags,
            payload,
        })
    }
}

/// Round `len` up to the next 4-byte boundary.
pub fn align4(len: usize) -> usize {
    len + (4 - len % 4) % 4
}

pub(crate) fn put_u24(buf: &mut BytesMut, value: u32) {
    buf.put_u8((value >> 16) as u8);
    buf.put_u8((value >> 8) as u8);
    buf.put_u8(value as u8);
}

pub(crate) fn get_u24(buf: &mut &[u8]) -> u32 {
    let hi = buf.get_u8() as u32;
    let mid = buf.get_u8() as u32;
    let lo = buf.get_u8() as u32;
    (hi << 16) | (mid << 8) | lo
}

/// Build the mandatory Result-Code AVP.
pub fn result_code_avp(value: u32) -> RawAvp {
    RawAvp::unsigned32(avp::RESULT_CODE, true, value)
}
