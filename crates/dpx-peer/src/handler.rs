use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use dpx_core::dictionary::{avp, cmd, disconnect_cause, result_code};
use dpx_core::{result_code_avp, Identity, RawAvp, RawMessage};

use crate::state::State;

/// Product-Name advertised by the built-in handlers.
pub const PRODUCT_NAME: &str = "dpx";

/// Error-Message text carried by synthesized timeout answers.
pub(crate) const TIMEOUT_MESSAGE: &str = "no answer from peer node";

/// Connection context handed to the system-message collaborators.
#[derive(Debug, Clone)]
pub struct ConnInfo {
    pub local_host: Identity,
    pub local_realm: Identity,
    pub peer_host: Identity,
    pub peer_realm: Identity,
    pub local_addr: Option<SocketAddr>,
    pub origin_state_id: u32,
    pub state: State,
}

/// Application hooks for the six base-protocol exchanges.
///
/// `make_*` build locally-originated requests; `handle_*` on the request
/// side build the answer to send back. Correlation ids are assigned by
/// the connection after the fact, so implementations leave them zero.
/// The answer's error flag is likewise derived from its Result-Code by
/// the connection.
pub trait SystemHandlers: Send + Sync {
    fn make_cer(&self, conn: &ConnInfo) -> RawMessage;
    fn make_dwr(&self, conn: &ConnInfo) -> RawMessage;
    fn make_dpr(&self, conn: &ConnInfo) -> RawMessage;

    fn handle_cer(&self, cer: &RawMessage, conn: &ConnInfo) -> RawMessage;
    fn handle_dwr(&self, dwr: &RawMessage, conn: &ConnInfo) -> RawMessage;
    fn handle_dpr(&self, dpr: &RawMessage, conn: &ConnInfo) -> RawMessage;

    /// Observe the peer's CEA before the connection opens.
    fn handle_cea(&self, _cea: &RawMessage, _conn: &ConnInfo) {}

    /// Observe the peer's DWA.
    fn handle_dwa(&self, _dwa: &RawMessage, _conn: &ConnInfo) {}

    /// Observe the peer's DPA before the transport closes.
    fn handle_dpa(&self, _dpa: &RawMessage, _conn: &ConnInfo) {}
}

/// RFC 6733 base semantics: accept every peer, answer every probe with
/// success, and advertise only the base application.
#[derive(Debug, Default)]
pub struct BaseHandlers;

impl BaseHandlers {
    fn origin_avps(conn: &ConnInfo) -> [RawAvp; 2] {
        [
            RawAvp::identity(avp::ORIGIN_HOST, true, &conn.local_host),
            RawAvp::identity(avp::ORIGIN_REALM, true, &conn.local_realm),
        ]
    }

    fn host_ip(conn: &ConnInfo) -> RawAvp {
        let ip = conn
            .local_addr
            .map(|a| a.ip())
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        RawAvp::address(avp::HOST_IP_ADDRESS, true, ip)
    }

    fn capabilities(msg: RawMessage, conn: &ConnInfo) -> RawMessage {
        let [host, realm] = Self::origin_avps(conn);
        msg.with_avp(host)
            .with_avp(realm)
            .with_avp(Self::host_ip(conn))
            .with_avp(RawAvp::unsigned32(avp::VENDOR_ID, true, 0))
            .with_avp(RawAvp::utf8(avp::PRODUCT_NAME, false, PRODUCT_NAME))
            .with_avp(RawAvp::unsigned32(avp::ORIGIN_STATE_ID, true, conn.origin_state_id))
            .with_avp(RawAvp::unsigned32(avp::AUTH_APPLICATION_ID, true, 0))
    }
}

impl SystemHandlers for BaseHandlers {
    fn make_cer(&self, conn: &ConnInfo) -> RawMessage {
        Self::capabilities(RawMessage::request(cmd::CAPABILITIES_EXCHANGE, 0), conn)
    }

    fn make_dwr(&self, conn: &ConnInfo) -> RawMessage {
        let [host, realm] = Self::origin_avps(conn);
        RawMessage::request(cmd::DEVICE_WATCHDOG, 0)
            .with_avp(host)
            .with_avp(realm)
            .with_avp(RawAvp::unsigned32(avp::ORIGIN_STATE_ID, true, conn.origin_state_id))
    }

    fn make_dpr(&self, conn: &ConnInfo) -> RawMessage {
        let [host, realm] = Self::origin_avps(conn);
        RawMessage::request(cmd::DISCONNECT_PEER, 0)
            .with_avp(host)
            .with_avp(realm)
            .with_avp(RawAvp::unsigned32(
                avp::DISCONNECT_CAUSE,
                true,
                disconnect_cause::DO_NOT_WANT_TO_TALK_TO_YOU,
            ))
    }

    fn handle_cer(&self, cer: &RawMessage, conn: &ConnInfo) -> RawMessage {
        let ans = RawMessage::answer_to(cer).with_avp(result_code_avp(result_code::SUCCESS));
        Self::capabilities(ans, conn)
    }

    fn handle_dwr(&self, dwr: &RawMessage, conn: &ConnInfo) -> RawMessage {
        let [host, realm] = Self::origin_avps(conn);
        RawMessage::answer_to(dwr)
            .with_avp(result_code_avp(result_code::SUCCESS))
            .with_avp(host)
            .with_avp(realm)
            .with_avp(RawAvp::unsigned32(avp::ORIGIN_STATE_ID, true, conn.origin_state_id))
    }

    fn handle_dpr(&self, dpr: &RawMessage, conn: &ConnInfo) -> RawMessage {
        let [host, realm] = Self::origin_avps(conn);
        RawMessage::answer_to(dpr)
            .with_avp(result_code_avp(result_code::SUCCESS))
            .with_avp(host)
            .with_avp(realm)
    }
}

/// Build a negative answer to `req`: error flag set, the given
/// Result-Code, origin identification and a human-readable cause.
pub fn failure_answer(
    req: &RawMessage,
    host: &Identity,
    realm: &Identity,
    code: u32,
    message: &str,
) -> RawMessage {
    let mut ans = RawMessage::answer_to(req)
        .with_avp(result_code_avp(code))
        .with_avp(RawAvp::identity(avp::ORIGIN_HOST, true, host))
        .with_avp(RawAvp::identity(avp::ORIGIN_REALM, true, realm))
        .with_avp(RawAvp::utf8(avp::ERROR_MESSAGE, false, message));
    ans.flags.error = true;
    ans
}
