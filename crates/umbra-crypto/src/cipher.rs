//! AES-256-CBC session cipher.
//!
//! All functions are pure. Ciphertext is standard base64 so it can travel in
//! a JSON string field unchanged.

use std::fmt;

use aes::Aes256;
use base64::{Engine, engine::general_purpose::STANDARD as B64};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::CipherError;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Session key size (AES-256).
pub const KEY_SIZE: usize = 32;

/// Session IV size (one AES block).
pub const IV_SIZE: usize = 16;

/// Text substituted for a frame that fails to decrypt.
pub const DECRYPTION_FAILED_PLACEHOLDER: &str = "[unable to decrypt message]";

/// Relay-issued key material for one connection.
///
/// Zeroized on drop. `Debug` never prints the bytes.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SessionKeys {
    key: [u8; KEY_SIZE],
    iv: [u8; IV_SIZE],
}

impl SessionKeys {
    /// Wrap raw key material.
    pub fn new(key: [u8; KEY_SIZE], iv: [u8; IV_SIZE]) -> Self {
        Self { key, iv }
    }

    /// Decode the base64 fields of an `encryption_init` envelope.
    ///
    /// # Errors
    ///
    /// - `CipherError::InvalidEncoding` if either field is not base64
    /// - `CipherError::InvalidLength` if the key is not 32 bytes or the IV is
    ///   not 16 bytes
    pub fn from_base64(key: &str, iv: &str) -> Result<Self, CipherError> {
        let key = decode_fixed::<KEY_SIZE>(key, "key")?;
        let iv = decode_fixed::<IV_SIZE>(iv, "iv")?;
        Ok(Self { key, iv })
    }

    /// Base64 encoding of the key and IV, as the relay sends them.
    pub fn to_base64(&self) -> (String, String) {
        (B64.encode(self.key), B64.encode(self.iv))
    }
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeys").finish_non_exhaustive()
    }
}

fn decode_fixed<const N: usize>(input: &str, field: &'static str) -> Result<[u8; N], CipherError> {
    let mut bytes = B64.decode(input.trim()).map_err(|_| CipherError::InvalidEncoding { field })?;

    let result = <[u8; N]>::try_from(bytes.as_slice()).map_err(|_| CipherError::InvalidLength {
        field,
        expected: N,
        actual: bytes.len(),
    });
    bytes.zeroize();
    result
}

/// Symmetric cipher for one connection.
#[derive(Debug, Clone)]
pub struct CipherSession {
    keys: SessionKeys,
}

impl CipherSession {
    /// Create a cipher from relay-issued keys.
    pub fn new(keys: SessionKeys) -> Self {
        Self { keys }
    }

    /// Encrypt a protocol line. Returns base64 ciphertext.
    pub fn encrypt(&self, plaintext: &str) -> String {
        let cipher = Aes256CbcEnc::new(&self.keys.key.into(), &self.keys.iv.into());
        let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
        B64.encode(ciphertext)
    }

    /// Decrypt base64 ciphertext.
    ///
    /// # Errors
    ///
    /// - `CipherError::InvalidEncoding` if `data` is not base64
    /// - `CipherError::BadPadding` on wrong key or tampered ciphertext
    /// - `CipherError::InvalidUtf8` if the plaintext is not text
    pub fn decrypt(&self, data: &str) -> Result<String, CipherError> {
        let ciphertext = B64
            .decode(data.trim())
            .map_err(|_| CipherError::InvalidEncoding { field: "ciphertext" })?;

        let cipher = Aes256CbcDec::new(&self.keys.key.into(), &self.keys.iv.into());
        let plaintext = cipher
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| CipherError::BadPadding)?;

        String::from_utf8(plaintext).map_err(|_| CipherError::InvalidUtf8)
    }

    /// Decrypt, substituting [`DECRYPTION_FAILED_PLACEHOLDER`] on failure.
    ///
    /// Returns the text and whether decryption succeeded.
    pub fn decrypt_or_placeholder(&self, data: &str) -> (String, bool) {
        match self.decrypt(data) {
            Ok(text) => (text, true),
            Err(_) => (DECRYPTION_FAILED_PLACEHOLDER.to_string(), false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> CipherSession {
        CipherSession::new(SessionKeys::new([7u8; KEY_SIZE], [3u8; IV_SIZE]))
    }

    #[test]
    fn roundtrip_single_line() {
        let cipher = session();
        let ciphertext = cipher.encrypt("PRIVMSG #room :hello");
        assert_ne!(ciphertext, "PRIVMSG #room :hello");
        assert_eq!(cipher.decrypt(&ciphertext).unwrap(), "PRIVMSG #room :hello");
    }

    #[test]
    fn ciphertext_is_block_aligned() {
        let cipher = session();
        for len in [0usize, 1, 15, 16, 17, 64] {
            let raw = B64.decode(cipher.encrypt(&"x".repeat(len))).unwrap();
            assert_eq!(raw.len() % 16, 0);
            // PKCS#7 always adds at least one byte
            assert!(raw.len() > len);
        }
    }

    #[test]
    fn matches_known_vector() {
        // NIST SP 800-38A F.2.5 first block; the PKCS#7 block follows it.
        let key: [u8; 32] = [
            0x60, 0x3d, 0xeb, 0x10, 0x15, 0xca, 0x71, 0xbe, 0x2b, 0x73, 0xae, 0xf0, 0x85, 0x7d,
            0x77, 0x81, 0x1f, 0x35, 0x2c, 0x07, 0x3b, 0x61, 0x08, 0xd7, 0x2d, 0x98, 0x10, 0xa3,
            0x09, 0x14, 0xdf, 0xf4,
        ];
        let iv: [u8; 16] = core::array::from_fn(|i| i as u8);
        let plaintext: [u8; 16] = [
            0x6b, 0xc1, 0xbe, 0xe2, 0x2e, 0x40, 0x9f, 0x96, 0xe9, 0x3d, 0x7e, 0x11, 0x73, 0x93,
            0x17, 0x2a,
        ];
        let expected_first_block: [u8; 16] = [
            0xf5, 0x8c, 0x4c, 0x04, 0xd6, 0xe5, 0xf1, 0xba, 0x77, 0x9e, 0xab, 0xfb, 0x5f, 0x7b,
            0xfb, 0xd6,
        ];

        let cipher = Aes256CbcEnc::new(&key.into(), &iv.into());
        let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(&plaintext);
        assert_eq!(&ciphertext[..16], &expected_first_block);
        assert_eq!(ciphertext.len(), 32);
    }

    #[test]
    fn wrong_key_fails() {
        let ciphertext = session().encrypt("secret line");
        let other = CipherSession::new(SessionKeys::new([8u8; KEY_SIZE], [3u8; IV_SIZE]));

        // A wrong key yields garbage that almost always fails the padding or
        // UTF-8 check; it must never yield the original text.
        assert_ne!(other.decrypt(&ciphertext).ok().as_deref(), Some("secret line"));
    }

    #[test]
    fn garbage_degrades_to_placeholder() {
        let cipher = session();
        assert_eq!(
            cipher.decrypt("!!not base64!!"),
            Err(CipherError::InvalidEncoding { field: "ciphertext" })
        );
        assert_eq!(cipher.decrypt(&B64.encode([1u8; 5])), Err(CipherError::BadPadding));

        let (text, ok) = cipher.decrypt_or_placeholder("AAAA");
        assert!(!ok);
        assert_eq!(text, DECRYPTION_FAILED_PLACEHOLDER);
    }

    #[test]
    fn keys_from_base64_validate_length() {
        let key = B64.encode([1u8; 32]);
        let iv = B64.encode([2u8; 16]);
        assert!(SessionKeys::from_base64(&key, &iv).is_ok());

        assert_eq!(
            SessionKeys::from_base64(&B64.encode([1u8; 16]), &iv),
            Err(CipherError::InvalidLength { field: "key", expected: 32, actual: 16 })
        );
        assert_eq!(
            SessionKeys::from_base64(&key, &B64.encode([2u8; 8])),
            Err(CipherError::InvalidLength { field: "iv", expected: 16, actual: 8 })
        );
        assert_eq!(
            SessionKeys::from_base64("%%%", &iv),
            Err(CipherError::InvalidEncoding { field: "key" })
        );
    }

    #[test]
    fn debug_does_not_leak_keys() {
        let keys = SessionKeys::new([0xAB; KEY_SIZE], [0xCD; IV_SIZE]);
        let printed = format!("{keys:?} {:?}", CipherSession::new(keys.clone()));
        assert!(!printed.contains("171"));
        assert!(!printed.contains("AB"));
    }

    #[test]
    fn base64_roundtrip_of_keys() {
        let keys = SessionKeys::new([9u8; KEY_SIZE], [4u8; IV_SIZE]);
        let (key, iv) = keys.to_base64();
        assert_eq!(SessionKeys::from_base64(&key, &iv).unwrap(), keys);
    }
}
