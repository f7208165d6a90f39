// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Encodings for stored leaf values.
//!
//! A stack file leaf may carry a YAML tag that names how its text is
//! stored. Reversible codecs need key material from a [`KeyContext`];
//! when the key is missing or wrong the stored text is returned as is.

use data_encoding::BASE64;
use md5::{Digest, Md5};
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};

use crate::{Error, Result};

#[cfg(test)]
#[path = "./codec_test.rs"]
mod codec_test;

/// Variable holding a base64 encoded 256 bit AES-GCM key.
pub const SYMMETRIC_KEY_VAR: &str = "ENVSTACK_SYMMETRIC_KEY";

/// Variable holding a Fernet key.
pub const FERNET_KEY_VAR: &str = "ENVSTACK_FERNET_KEY";

const AES_KEY_LEN: usize = 32;
const AES_BLOCK_LEN: usize = 16;
const AES_TAG_LEN: usize = 16;

/// Key material available for encoding and decoding values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyContext {
    symmetric: Option<String>,
    fernet: Option<String>,
}

impl KeyContext {
    /// Create an empty context, where only base64 is available.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read key material from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read key material through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            symmetric: lookup(SYMMETRIC_KEY_VAR).filter(|k| !k.is_empty()),
            fernet: lookup(FERNET_KEY_VAR).filter(|k| !k.is_empty()),
        }
    }

    pub fn with_symmetric_key<S: Into<String>>(mut self, key: S) -> Self {
        self.symmetric = Some(key.into());
        self
    }

    pub fn with_fernet_key<S: Into<String>>(mut self, key: S) -> Self {
        self.fernet = Some(key.into());
        self
    }

    pub fn symmetric_key(&self) -> Option<&str> {
        self.symmetric.as_deref()
    }

    pub fn fernet_key(&self) -> Option<&str> {
        self.fernet.as_deref()
    }

    /// Combine two contexts, keys in `other` take precedence.
    pub fn overlay(&self, other: &KeyContext) -> KeyContext {
        KeyContext {
            symmetric: other.symmetric.clone().or_else(|| self.symmetric.clone()),
            fernet: other.fernet.clone().or_else(|| self.fernet.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.symmetric.is_none() && self.fernet.is_none()
    }
}

/// Generate a new base64 encoded AES-256-GCM key.
pub fn generate_symmetric_key() -> Result<String> {
    let mut key = [0u8; AES_KEY_LEN];
    SystemRandom::new()
        .fill(&mut key)
        .map_err(|_| Error::InvalidKey {
            name: SYMMETRIC_KEY_VAR.to_string(),
            reason: "system random source unavailable".to_string(),
        })?;
    Ok(BASE64.encode(&key))
}

/// Generate a new Fernet key.
pub fn generate_fernet_key() -> String {
    fernet::Fernet::generate_key()
}

/// How a leaf value is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    /// Untagged text.
    Plain,
    /// Reversible base64, no secrecy.
    Base64,
    /// The strongest reversible codec the available keys allow.
    Encrypt,
    /// AES-256-GCM with a random nonce.
    AesGcm,
    /// Fernet tokens.
    Fernet,
    /// One way MD5 hex digest.
    Md5,
}

impl Codec {
    /// The YAML tag selecting this codec, `None` for plain values.
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            Self::Plain => None,
            Self::Base64 => Some("!base64"),
            Self::Encrypt => Some("!encrypt"),
            Self::AesGcm => Some("!aesgcm"),
            Self::Fernet => Some("!fernet"),
            Self::Md5 => Some("!md5"),
        }
    }

    /// Look up a codec by YAML tag, with or without the leading `!`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim_start_matches('!') {
            "base64" => Some(Self::Base64),
            "encrypt" => Some(Self::Encrypt),
            "aesgcm" => Some(Self::AesGcm),
            "fernet" => Some(Self::Fernet),
            "md5" => Some(Self::Md5),
            _ => None,
        }
    }

    /// Whether decoding can recover the plaintext.
    pub fn is_reversible(&self) -> bool {
        !matches!(self, Self::Md5)
    }

    /// The concrete codec used for the given keys.
    ///
    /// Only [`Codec::Encrypt`] changes: it prefers AES-GCM, then Fernet,
    /// then base64.
    pub fn select(&self, keys: &KeyContext) -> Codec {
        match self {
            Self::Encrypt if keys.symmetric_key().is_some() => Self::AesGcm,
            Self::Encrypt if keys.fernet_key().is_some() => Self::Fernet,
            Self::Encrypt => Self::Base64,
            other => *other,
        }
    }

    /// Encode plaintext for storage.
    pub fn encode(&self, plaintext: &str, keys: &KeyContext) -> Result<String> {
        if plaintext.is_empty() && *self != Self::Md5 {
            return Ok(String::new());
        }
        match self.select(keys) {
            Self::Plain => Ok(plaintext.to_string()),
            Self::Base64 | Self::Encrypt => Ok(BASE64.encode(plaintext.as_bytes())),
            Self::AesGcm => aes_encrypt(plaintext, &aes_key(keys)?),
            Self::Fernet => Ok(fernet_cipher(keys)?.encrypt(plaintext.as_bytes())),
            Self::Md5 => Ok(format!("{:x}", Md5::digest(plaintext.as_bytes()))),
        }
    }

    /// Decode stored text.
    ///
    /// Never fails: a missing key, a wrong key or corrupt data yields the
    /// stored text unchanged, and a hash decodes to itself.
    pub fn decode(&self, encoded: &str, keys: &KeyContext) -> String {
        let decoded = match self.select(keys) {
            Self::Plain | Self::Md5 => return encoded.to_string(),
            Self::Base64 | Self::Encrypt => base64_decode(encoded),
            Self::AesGcm => aes_key(keys)
                .ok()
                .and_then(|key| aes_decrypt(encoded, &key)),
            Self::Fernet => fernet_cipher(keys)
                .ok()
                .and_then(|cipher| cipher.decrypt(encoded).ok())
                .and_then(|bytes| String::from_utf8(bytes).ok()),
        };
        match decoded {
            Some(plaintext) => plaintext,
            None => {
                tracing::debug!(codec = ?self, "unable to decode value, keeping stored text");
                encoded.to_string()
            }
        }
    }
}

fn base64_decode(encoded: &str) -> Option<String> {
    let bytes = BASE64.decode(encoded.trim().as_bytes()).ok()?;
    String::from_utf8(bytes).ok()
}

fn aes_key(keys: &KeyContext) -> Result<LessSafeKey> {
    let invalid = |reason: &str| Error::InvalidKey {
        name: SYMMETRIC_KEY_VAR.to_string(),
        reason: reason.to_string(),
    };
    let encoded = keys.symmetric_key().ok_or_else(|| invalid("not set"))?;
    let raw = BASE64
        .decode(encoded.trim().as_bytes())
        .map_err(|_| invalid("not valid base64"))?;
    if raw.len() != AES_KEY_LEN {
        return Err(invalid("expected a 256 bit key"));
    }
    let unbound = UnboundKey::new(&AES_256_GCM, &raw).map_err(|_| invalid("rejected by cipher"))?;
    Ok(LessSafeKey::new(unbound))
}

/// Stored as base64(nonce + ciphertext + tag) over PKCS#7 padded text.
fn aes_encrypt(plaintext: &str, key: &LessSafeKey) -> Result<String> {
    let mut nonce = [0u8; NONCE_LEN];
    SystemRandom::new()
        .fill(&mut nonce)
        .map_err(|_| Error::InvalidKey {
            name: SYMMETRIC_KEY_VAR.to_string(),
            reason: "system random source unavailable".to_string(),
        })?;

    let mut in_out = plaintext.as_bytes().to_vec();
    let padding = AES_BLOCK_LEN - in_out.len() % AES_BLOCK_LEN;
    in_out.extend(std::iter::repeat_n(padding as u8, padding));

    key.seal_in_place_append_tag(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut in_out)
        .map_err(|_| Error::InvalidKey {
            name: SYMMETRIC_KEY_VAR.to_string(),
            reason: "encryption failed".to_string(),
        })?;

    let mut blob = nonce.to_vec();
    blob.extend(in_out);
    Ok(BASE64.encode(&blob))
}

fn aes_decrypt(encoded: &str, key: &LessSafeKey) -> Option<String> {
    let blob = BASE64.decode(encoded.trim().as_bytes()).ok()?;
    if blob.len() < NONCE_LEN + AES_TAG_LEN {
        return None;
    }
    let (nonce, sealed) = blob.split_at(NONCE_LEN);
    let nonce = Nonce::try_assume_unique_for_key(nonce).ok()?;
    let mut in_out = sealed.to_vec();
    let opened = key.open_in_place(nonce, Aad::empty(), &mut in_out).ok()?;

    let padding = *opened.last()? as usize;
    if padding == 0 || padding > AES_BLOCK_LEN || padding > opened.len() {
        return None;
    }
    let (text, pad) = opened.split_at(opened.len() - padding);
    if pad.iter().any(|b| *b as usize != padding) {
        return None;
    }
    String::from_utf8(text.to_vec()).ok()
}

fn fernet_cipher(keys: &KeyContext) -> Result<fernet::Fernet> {
    let invalid = |reason: &str| Error::InvalidKey {
        name: FERNET_KEY_VAR.to_string(),
        reason: reason.to_string(),
    };
    let key = keys.fernet_key().ok_or_else(|| invalid("not set"))?;
    fernet::Fernet::new(key.trim()).ok_or_else(|| invalid("not a valid Fernet key"))
}
