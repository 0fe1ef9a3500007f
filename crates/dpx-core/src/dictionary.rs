//! RFC 6733 base-protocol constants.

/// Command codes.
pub mod cmd {
    pub const CAPABILITIES_EXCHANGE: u32 = 257;
    pub const DEVICE_WATCHDOG: u32 = 280;
    pub const DISCONNECT_PEER: u32 = 282;
}

/// AVP codes.
pub mod avp {
    pub const USER_NAME: u32 = 1;
    pub const HOST_IP_ADDRESS: u32 = 257;
    pub const AUTH_APPLICATION_ID: u32 = 258;
    pub const ACCT_APPLICATION_ID: u32 = 259;
    pub const VENDOR_SPECIFIC_APPLICATION_ID: u32 = 260;
    pub const SESSION_ID: u32 = 263;
    pub const ORIGIN_HOST: u32 = 264;
    pub const SUPPORTED_VENDOR_ID: u32 = 265;
    pub const VENDOR_ID: u32 = 266;
    pub const FIRMWARE_REVISION: u32 = 267;
    pub const RESULT_CODE: u32 = 268;
    pub const PRODUCT_NAME: u32 = 269;
    pub const DISCONNECT_CAUSE: u32 = 273;
    pub const ORIGIN_STATE_ID: u32 = 278;
    pub const ERROR_MESSAGE: u32 = 281;
    pub const ROUTE_RECORD: u32 = 282;
    pub const DESTINATION_REALM: u32 = 283;
    pub const DESTINATION_HOST: u32 = 293;
    pub const ORIGIN_REALM: u32 = 296;
    pub const EXPERIMENTAL_RESULT: u32 = 297;
    pub const EXPERIMENTAL_RESULT_CODE: u32 = 298;
}

/// Result-Code values (AVP 268).
pub mod result_code {
    pub const SUCCESS: u32 = 2001; // DIAMETER_SUCCESS
    pub const COMMAND_UNSUPPORTED: u32 = 3001;
    pub const UNABLE_TO_DELIVER: u32 = 3002;
    pub const TOO_BUSY: u32 = 3004;
    pub const INVALID_HDR_BITS: u32 = 3008;
    pub const INVALID_AVP_BITS: u32 = 3009;
    pub const UNKNOWN_PEER: u32 = 3010;
    pub const INVALID_AVP_VALUE: u32 = 5004;
    pub const MISSING_AVP: u32 = 5005;
    pub const UNABLE_TO_COMPLY: u32 = 5012;
    pub const INVALID_AVP_LENGTH: u32 = 5014;
}

/// Disconnect-Cause values (AVP 273).
pub mod disconnect_cause {
    pub const REBOOTING: u32 = 0;
    pub const BUSY: u32 = 1;
    pub const DO_NOT_WANT_TO_TALK_TO_YOU: u32 = 2;
}

/// Application ids.
pub mod app {
    pub const BASE: u32 = 0;
    pub const RELAY: u32 = 0xFFFF_FFFF;
}

/// Name of a well-known base-protocol AVP, for notices and logs.
pub fn avp_name(code: u32) -> Option<&'static str> {
    let name = match code {
        avp::USER_NAME => "User-Name",
        avp::HOST_IP_ADDRESS => "Host-IP-Address",
        avp::AUTH_APPLICATION_ID => "Auth-Application-Id",
        avp::ACCT_APPLICATION_ID => "Acct-Application-Id",
        avp::VENDOR_SPECIFIC_APPLICATION_ID => "Vendor-Specific-Application-Id",
        avp::SESSION_ID => "Session-Id",
        avp::ORIGIN_HOST => "Origin-Host",
        avp::SUPPORTED_VENDOR_ID => "Supported-Vendor-Id",
        avp::VENDOR_ID => "Vendor-Id",
        avp::FIRMWARE_REVISION => "Firmware-Revision",
        avp::RESULT_CODE => "Result-Code",
        avp::PRODUCT_NAME => "Product-Name",
        avp::DISCONNECT_CAUSE => "Disconnect-Cause",
        avp::ORIGIN_STATE_ID => "Origin-State-Id",
        avp::ERROR_MESSAGE => "Error-Message",
        avp::ROUTE_RECORD => "Route-Record",
        avp::DESTINATION_REALM => "Destination-Realm",
        avp::DESTINATION_HOST => "Destination-Host",
        avp::ORIGIN_REALM => "Origin-Realm",
        avp::EXPERIMENTAL_RESULT => "Experimental-Result",
        avp::EXPERIMENTAL_RESULT_CODE => "Experimental-Result-Code",
        _ => return None,
    };
    Some(name)
}
