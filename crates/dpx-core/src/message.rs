use bytes::{Buf, BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::avp::{get_u24, put_u24, RawAvp};
use crate::dictionary::{avp, result_code};
use crate::error::{CodecError, Result};

/// Fixed size of the Diameter message header.
pub const HEADER_LEN: usize = 20;

/// The only protocol version this codec speaks.
pub const VERSION: u8 = 1;

/// Upper bound imposed by the 24-bit message length field.
pub const MAX_MESSAGE_LEN: usize = 0x00FF_FFFF;

const FLAG_REQUEST: u8 = 0x80;
const FLAG_PROXIABLE: u8 = 0x40;
const FLAG_ERROR: u8 = 0x20;
const FLAG_RETRANSMIT: u8 = 0x10;

/// Command flag bits of the message header.
///
/// Reserved bits are ignored on read and written as zero. The retransmit
/// bit is never set by this library; it survives decode/encode untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandFlags {
    pub request: bool,
    pub proxiable: bool,
    pub error: bool,
    pub retransmit: bool,
}

impl CommandFlags {
    fn unpack(byte: u8) -> Self {
        Self {
            request: byte & FLAG_REQUEST != 0,
            proxiable: byte & FLAG_PROXIABLE != 0,
            error: byte & FLAG_ERROR != 0,
            retransmit: byte & FLAG_RETRANSMIT != 0,
        }
    }

    fn pack(self) -> u8 {
        let mut byte = 0;
        if self.request {
            byte |= FLAG_REQUEST;
        }
        if self.proxiable {
            byte |= FLAG_PROXIABLE;
        }
        if self.error {
            byte |= FLAG_ERROR;
        }
        if self.retransmit {
            byte |= FLAG_RETRANSMIT;
        }
        byte
    }
}

/// A complete Diameter message: header fields plus ordered AVPs.
///
/// The version octet is fixed at 1 and therefore not stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub flags: CommandFlags,
    /// Command code, 24 bits on the wire.
    pub code: u32,
    pub app_id: u32,
    pub hbh_id: u32,
    pub ete_id: u32,
    pub avps: Vec<RawAvp>,
}

impl RawMessage {
    pub fn new(code: u32, app_id: u32, flags: CommandFlags) -> Self {
        Self {
            flags,
            code,
            app_id,
            hbh_id: 0,
            ete_id: 0,
            avps: Vec::new(),
        }
    }

    /// A request message with the R bit set.
    pub fn request(code: u32, app_id: u32) -> Self {
        Self::new(
            code,
            app_id,
            CommandFlags {
                request: true,
                ..CommandFlags::default()
            },
        )
    }

    /// An answer skeleton for `req`: same command code, application id and
    /// correlation ids, R bit cleared, P bit copied from the request.
    pub fn answer_to(req: &RawMessage) -> Self {
        let mut ans = Self::new(
            req.code,
            req.app_id,
            CommandFlags {
                proxiable: req.flags.proxiable,
                ..CommandFlags::default()
            },
        );
        ans.hbh_id = req.hbh_id;
        ans.ete_id = req.ete_id;
        ans
    }

    pub fn with_avp(mut self, avp: RawAvp) -> Self {
        self.avps.push(avp);
        self
    }

    pub fn is_request(&self) -> bool {
        self.flags.request
    }

    pub fn find_avp(&self, code: u32) -> Option<&RawAvp> {
        self.avps.iter().find(|a| a.code == code)
    }

    pub fn find_all_avps(&self, code: u32) -> Vec<&RawAvp> {
        self.avps.iter().filter(|a| a.code == code).collect()
    }

    /// The Result-Code carried by an answer, looking through the
    /// Experimental-Result grouped AVP when the plain AVP is absent.
    pub fn result_code(&self) -> Option<u32> {
        if let Some(rc) = self.find_avp(avp::RESULT_CODE) {
            return rc.as_unsigned32().ok();
        }
        let experimental = self.find_avp(avp::EXPERIMENTAL_RESULT)?;
        experimental
            .grouped_members()
            .ok()?
            .iter()
            .find(|m| m.code == avp::EXPERIMENTAL_RESULT_CODE)
            .and_then(|m| m.as_unsigned32().ok())
    }

    /// Whether the answer reports DIAMETER_SUCCESS.
    pub fn is_success(&self) -> bool {
        self.result_code() == Some(result_code::SUCCESS)
    }

    /// Serialize to wire bytes.
    ///
    /// The header is written with a placeholder length which is patched
    /// once all AVPs have been appended.
    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.code > 0x00FF_FFFF {
            return Err(CodecError::MalformedHeader(format!(
                "command code {} exceeds 24 bits",
                self.code
            )));
        }

        let capacity = HEADER_LEN + self.avps.iter().map(RawAvp::padded_len).sum::<usize>();
        let mut buf = BytesMut::with_capacity(capacity);

        buf.put_u8(VERSION);
        put_u24(&mut buf, 0); // patched below
        buf.put_u8(self.flags.pack());
        put_u24(&mut buf, self.code);
        buf.put_u32(self.app_id);
        buf.put_u32(self.hbh_id);
        buf.put_u32(self.ete_id);

        for avp in &self.avps {
            avp.put(&mut buf)?;
        }

        let total = buf.len();
        if total > MAX_MESSAGE_LEN {
            return Err(CodecError::EncodingOverflow(total));
        }
        buf[1] = (total >> 16) as u8;
        buf[2] = (total >> 8) as u8;
        buf[3] = total as u8;

        Ok(buf.to_vec())
    }

    /// Parse wire bytes that hold exactly one message.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(CodecError::MalformedHeader(format!(
                "{} bytes is shorter than the {HEADER_LEN}-byte header",
                data.len()
            )));
        }

        let mut buf = data;
        let version = buf.get_u8();
        if version != VERSION {
            return Err(CodecError::MalformedHeader(format!(
                "unsupported version {version}"
            )));
        }
        let length = get_u24(&mut buf) as usize;
        if length != data.len() {
            return Err(CodecError::MalformedHeader(format!(
                "length field {length} does not match the {}-byte buffer",
                data.len()
            )));
        }
        let flags = CommandFlags::unpack(buf.get_u8());
        let code = get_u24(&mut buf);
        let app_id = buf.get_u32();
        let hbh_id = buf.get_u32();
        let ete_id = buf.get_u32();

        let mut avps = Vec::new();
        while !buf.is_empty() {
            avps.push(RawAvp::get(&mut buf)?);
        }

        Ok(Self {
            flags,
            code,
            app_id,
            hbh_id,
            ete_id,
            avps,
        })
    }

    /// Reject a message whose addressing fields disagree with what the
    /// caller expected to receive.
    pub fn validate(
        &self,
        app_id: u32,
        code: u32,
        request: bool,
        proxiable: bool,
        error: bool,
        retransmit: bool,
    ) -> Result<()> {
        if self.app_id != app_id {
            return Err(CodecError::UnexpectedMessage(format!(
                "application id {} where {app_id} was expected",
                self.app_id
            )));
        }
        if self.code != code {
            return Err(CodecError::UnexpectedMessage(format!(
                "command code {} where {code} was expected",
                self.code
            )));
        }
        let expected = CommandFlags {
            request,
            proxiable,
            error,
            retransmit,
        };
        if self.flags != expected {
            return Err(CodecError::UnexpectedMessage(format!(
                "command flags {:?} where {:?} were expected",
                self.flags, expected
            )));
        }
        Ok(())
    }
}

/// Read one length-delimited message frame from `reader`.
///
/// Returns `None` on a clean end of stream at a frame boundary. The
/// returned buffer is a complete frame, ready for [`RawMessage::decode`].
pub async fn read_frame<R>(reader: &mut R) -> std::io::Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "message header truncated",
            ));
        }
        filled += n;
    }

    let length = u32::from_be_bytes([0, header[1], header[2], header[3]]) as usize;
    if length <= HEADER_LEN {
        // Header-only frame, or a bogus length that decode will reject.
        return Ok(Some(header.to_vec()));
    }

    let mut frame = vec![0u8; length];
    frame[..HEADER_LEN].copy_from_slice(&header);
    reader.read_exact(&mut frame[HEADER_LEN..]).await?;
    Ok(Some(frame))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avp::align4;
    use crate::dictionary::cmd;
    use crate::identity::Identity;

    fn sample_request() -> RawMessage {
        let host = Identity::new("client.example.com").unwrap();
        let realm = Identity::new("example.com").unwrap();
        let mut msg = RawMessage::request(cmd::CAPABILITIES_EXCHANGE, 0)
            .with_avp(RawAvp::identity(avp::ORIGIN_HOST, true, &host))
            .with_avp(RawAvp::identity(avp::ORIGIN_REALM, true, &realm))
            .with_avp(RawAvp::unsigned32(avp::VENDOR_ID, true, 0));
        msg.hbh_id = 0x1000_0001;
        msg.ete_id = 0x2000_0002;
        msg
    }

    #[test]
    fn test_header_wire_layout() {
        let data = vec![
            1, 0, 0, 20, // version, length 20
            0x80, 0, 1, 1, // request flag, command 257
            0, 0, 0, 0, // application id
            0, 0, 0, 1, // hop-by-hop id
            0, 0, 0, 2, // end-to-end id
        ];
        let msg = RawMessage::decode(&data).unwrap();
        assert_eq!(msg.code, 257);
        assert!(msg.flags.request);
        assert_eq!(msg.hbh_id, 1);
        assert_eq!(msg.ete_id, 2);
        assert!(msg.avps.is_empty());

        assert_eq!(msg.encode().unwrap(), data);
    }

    #[test]
    fn test_roundtrip() {
        let msg = sample_request();
        let wire = msg.encode().unwrap();
        let decoded = RawMessage::decode(&wire).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_encoded_length_is_sum_of_padded_avps() {
        let msg = sample_request();
        let wire = msg.encode().unwrap();
        let expected: usize = HEADER_LEN
            + msg
                .avps
                .iter()
                .map(|a| align4(a.encoded_len()))
                .sum::<usize>();
        assert_eq!(wire.len(), expected);
        let header_length = u32::from_be_bytes([0, wire[1], wire[2], wire[3]]) as usize;
        assert_eq!(header_length, expected);
    }

    #[test]
    fn test_decode_rejects_bad_version() {
        let mut wire = sample_request().encode().unwrap();
        wire[0] = 2;
        assert!(matches!(
            RawMessage::decode(&wire),
            Err(CodecError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_decode_rejects_length_mismatch() {
        let mut wire = sample_request().encode().unwrap();
        wire.push(0);
        assert!(matches!(
            RawMessage::decode(&wire),
            Err(CodecError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_decode_rejects_truncated_avp() {
        let mut wire = sample_request().encode().unwrap();
        // Shrink the last AVP and fix up the header length accordingly.
        wire.truncate(wire.len() - 4);
        let len = wire.len();
        wire[1] = (len >> 16) as u8;
        wire[2] = (len >> 8) as u8;
        wire[3] = len as u8;
        assert!(matches!(
            RawMessage::decode(&wire),
            Err(CodecError::TruncatedAvp { .. })
        ));
    }

    #[test]
    fn test_retransmit_flag_survives_roundtrip() {
        let mut msg = sample_request();
        msg.flags.retransmit = true;
        let decoded = RawMessage::decode(&msg.encode().unwrap()).unwrap();
        assert!(decoded.flags.retransmit);
    }

    #[test]
    fn test_validate() {
        let msg = sample_request();
        assert!(msg
            .validate(0, cmd::CAPABILITIES_EXCHANGE, true, false, false, false)
            .is_ok());
        assert!(matches!(
            msg.validate(0, cmd::DEVICE_WATCHDOG, true, false, false, false),
            Err(CodecError::UnexpectedMessage(_))
        ));
        assert!(matches!(
            msg.validate(0, cmd::CAPABILITIES_EXCHANGE, false, false, false, false),
            Err(CodecError::UnexpectedMessage(_))
        ));
        assert!(matches!(
            msg.validate(5, cmd::CAPABILITIES_EXCHANGE, true, false, false, false),
            Err(CodecError::UnexpectedMessage(_))
        ));
    }

    #[test]
    fn test_result_code_plain_and_experimental() {
        let req = sample_request();
        let plain = RawMessage::answer_to(&req)
            .with_avp(crate::avp::result_code_avp(result_code::SUCCESS));
        assert_eq!(plain.result_code(), Some(2001));
        assert!(plain.is_success());

        let experimental = RawMessage::answer_to(&req).with_avp(
            RawAvp::grouped(
                avp::EXPERIMENTAL_RESULT,
                true,
                &[
                    RawAvp::unsigned32(avp::VENDOR_ID, true, 10415),
                    RawAvp::unsigned32(avp::EXPERIMENTAL_RESULT_CODE, true, 5142),
                ],
            )
            .unwrap(),
        );
        assert_eq!(experimental.result_code(), Some(5142));
        assert!(!experimental.is_success());

        assert_eq!(req.result_code(), None);
    }

    #[tokio::test]
    async fn test_read_frame() {
        let msg = sample_request();
        let wire = msg.encode().unwrap();
        let mut stream: &[u8] = &wire;

        let frame = read_frame(&mut stream).await.unwrap().unwrap();
        assert_eq!(RawMessage::decode(&frame).unwrap(), msg);
        assert!(read_frame(&mut stream).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_frame_truncated_stream() {
        let wire = sample_request().encode().unwrap();
        let mut stream: &[u8] = &wire[..10];
        assert!(read_frame(&mut stream).await.is_err());
    }
}
