//! Access tokens for the audio/video (RTC) and messaging (RTM) transport.
//!
//! Tokens use the provider's `006` layout:
//!
//! ```text
//! token   = "006" app_id base64(content)
//! content = bytes(signature) u32(crc32(channel)) u32(crc32(uid)) bytes(message)
//! message = u32(salt) u32(ts) map<u16, u32>(privileges)
//! signature = HMAC-SHA256(app_certificate, app_id channel uid message)
//! ```
//!
//! Integers are little-endian, `bytes` are prefixed by a u16 length and map
//! entries are ordered by key.

use std::collections::BTreeMap;

use base64::{prelude::BASE64_STANDARD, Engine};
use hmac::{Hmac, Mac};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use time::OffsetDateTime;

use crate::config::AgoraConfig;

pub const VERSION: &str = "006";
/// Seconds a minted privilege stays usable.
pub const PRIVILEGE_LIFETIME: u32 = 3600;
const MESSAGE_LIFETIME: u32 = 24 * 3600;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u16)]
pub enum Privilege {
    JoinChannel = 1,
    PublishAudioStream = 2,
    PublishVideoStream = 3,
    PublishDataStream = 4,
    RtmLogin = 1000,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("{0} is too long to fit in a token")]
    TooLong(&'static str),
    #[error("app certificate is not a usable signing key")]
    Key,
}

/// Tokens handed to a client for one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub rtc_token: String,
    pub rtm_token: String,
}

#[derive(Clone)]
struct AppKeys {
    app_id: String,
    app_certificate: String,
}

/// Mints transport tokens. Without app keys every token is the empty string.
#[derive(Clone)]
pub struct TokenBuilder {
    keys: Option<AppKeys>,
}

impl TokenBuilder {
    pub fn new(app_id: impl Into<String>, app_certificate: impl Into<String>) -> TokenBuilder {
        TokenBuilder {
            keys: Some(AppKeys {
                app_id: app_id.into(),
                app_certificate: app_certificate.into(),
            }),
        }
    }

    pub fn disabled() -> TokenBuilder {
        TokenBuilder { keys: None }
    }

    pub fn from_config(agora: Option<&AgoraConfig>) -> TokenBuilder {
        match agora {
            Some(agora) => TokenBuilder::new(&agora.app_id, &agora.app_certificate),
            None => TokenBuilder::disabled(),
        }
    }

    /// Publisher token for `channel`, bound to the user account `account`.
    pub fn rtc_token(&self, channel: &str, account: &str) -> Result<String, TokenError> {
        let Some(keys) = &self.keys else {
            return Ok(String::new());
        };
        let expires = privilege_expiry();
        let mut token = AccessToken::new(keys, channel, account);
        token.grant(Privilege::JoinChannel, expires);
        token.grant(Privilege::PublishAudioStream, expires);
        token.grant(Privilege::PublishVideoStream, expires);
        token.grant(Privilege::PublishDataStream, expires);
        token.build()
    }

    /// Messaging login token for `account`.
    pub fn rtm_token(&self, account: &str) -> Result<String, TokenError> {
        let Some(keys) = &self.keys else {
            return Ok(String::new());
        };
        // messaging tokens carry the account where media tokens carry the channel
        let mut token = AccessToken::new(keys, account, "");
        token.grant(Privilege::RtmLogin, privilege_expiry());
        token.build()
    }

    pub fn mint(&self, channel: &str, account: &str) -> Result<Credentials, TokenError> {
        Ok(Credentials {
            rtc_token: self.rtc_token(channel, account)?,
            rtm_token: self.rtm_token(account)?,
        })
    }
}

fn unix_now() -> u32 {
    u32::try_from(OffsetDateTime::now_utc().unix_timestamp()).unwrap_or(u32::MAX)
}

fn privilege_expiry() -> u32 {
    unix_now().saturating_add(PRIVILEGE_LIFETIME)
}

struct AccessToken<'a> {
    keys: &'a AppKeys,
    channel: &'a str,
    uid: &'a str,
    salt: u32,
    ts: u32,
    privileges: BTreeMap<u16, u32>,
}

impl<'a> AccessToken<'a> {
    fn new(keys: &'a AppKeys, channel: &'a str, uid: &'a str) -> AccessToken<'a> {
        AccessToken {
            keys,
            channel,
            uid,
            salt: rand::rng().random_range(1..=99_999_999),
            ts: unix_now().saturating_add(MESSAGE_LIFETIME),
            privileges: BTreeMap::new(),
        }
    }

    fn grant(&mut self, privilege: Privilege, expires: u32) {
        self.privileges.insert(privilege as u16, expires);
    }

    fn message(&self) -> Result<Vec<u8>, TokenError> {
        let mut message = Vec::with_capacity(10 + 6 * self.privileges.len());
        put_u32(&mut message, self.salt);
        put_u32(&mut message, self.ts);
        let len = u16::try_from(self.privileges.len()).map_err(|_| TokenError::TooLong("privileges"))?;
        put_u16(&mut message, len);
        for (&privilege, &expires) in &self.privileges {
            put_u16(&mut message, privilege);
            put_u32(&mut message, expires);
        }
        Ok(message)
    }

    fn build(&self) -> Result<String, TokenError> {
        let message = self.message()?;

        let mut mac = HmacSha256::new_from_slice(self.keys.app_certificate.as_bytes())
            .map_err(|_| TokenError::Key)?;
        mac.update(self.keys.app_id.as_bytes());
        mac.update(self.channel.as_bytes());
        mac.update(self.uid.as_bytes());
        mac.update(&message);
        let signature = mac.finalize().into_bytes();

        let mut content = Vec::with_capacity(signature.len() + message.len() + 12);
        put_bytes(&mut content, &signature, "signature")?;
        put_u32(&mut content, crc32fast::hash(self.channel.as_bytes()));
        put_u32(&mut content, crc32fast::hash(self.uid.as_bytes()));
        put_bytes(&mut content, &message, "message")?;

        Ok(format!("{VERSION}{}{}", self.keys.app_id, BASE64_STANDARD.encode(content)))
    }
}

fn put_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8], what: &'static str) -> Result<(), TokenError> {
    let len = u16::try_from(bytes.len()).map_err(|_| TokenError::TooLong(what))?;
    put_u16(buf, len);
    buf.extend_from_slice(bytes);
    Ok(())
}
