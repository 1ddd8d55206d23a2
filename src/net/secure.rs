//! Secure Channel
//!
//! Session-key bootstrap and authenticated encryption. The listener owns
//! an RSA key pair generated at session start; the connector generates the
//! symmetric session key and transports it RSA-encrypted. Once both sides
//! hold the key, every frame is sealed with XChaCha20-Poly1305 (random
//! nonce prepended), so tampered or foreign frames fail authentication
//! instead of decoding to garbage.
//!
//! This module holds the primitives; the exchange itself is driven by the
//! message bus.

use chacha20poly1305::aead::{Aead, AeadCore, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs1::{DecodeRsaPublicKey, EncodeRsaPublicKey};
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::net::protocol::Header;
use crate::net::transport::Role;

/// Symmetric session key length in bytes.
pub const SYMMETRIC_KEY_LEN: usize = 32;

/// XChaCha20 nonce length prepended to every sealed frame.
pub const NONCE_LEN: usize = 24;

/// Smallest accepted RSA modulus, in bits.
pub const MIN_KEY_BITS: usize = 1024;

/// Non-fatal signal: a frame failed authentication and must be treated as
/// corrupt or foreign, never as plaintext.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthFailure;

// =============================================================================
// SESSION CIPHER
// =============================================================================

/// The established symmetric cipher shared by both peers.
pub struct SessionCipher {
    cipher: XChaCha20Poly1305,
    fingerprint: String,
}

impl SessionCipher {
    fn new(key: &[u8; SYMMETRIC_KEY_LEN]) -> Self {
        let digest = Sha256::digest(key);
        let mut fingerprint = hex::encode(digest);
        fingerprint.truncate(8);
        Self {
            cipher: XChaCha20Poly1305::new(Key::from_slice(key)),
            fingerprint,
        }
    }

    /// Truncated SHA-256 of the key material, for logs and diagnostics.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Seal a frame: random 24-byte nonce followed by the ciphertext.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| Error::Encryption)?;
        let mut frame = nonce.to_vec();
        frame.extend_from_slice(&ciphertext);
        Ok(frame)
    }

    /// Open a sealed frame.
    ///
    /// Failure is a signal, not an error: the caller logs and discards the
    /// frame and the session continues.
    pub fn decrypt(&self, frame: &[u8]) -> std::result::Result<Vec<u8>, AuthFailure> {
        if frame.len() <= NONCE_LEN {
            return Err(AuthFailure);
        }
        let (nonce, ciphertext) = frame.split_at(NONCE_LEN);
        self.cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| AuthFailure)
    }
}

impl std::fmt::Debug for SessionCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCipher")
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// SECURE CHANNEL
// =============================================================================

/// Per-session key state: `Unkeyed` until the exchange completes, `Ready`
/// once a [`SessionCipher`] is installed.
#[derive(Debug)]
pub struct SecureChannel {
    role: Role,
    keypair: Option<(RsaPublicKey, RsaPrivateKey)>,
    cipher: Option<SessionCipher>,
}

impl SecureChannel {
    /// A fresh, unkeyed channel for the given role.
    pub fn new(role: Role) -> Self {
        Self {
            role,
            keypair: None,
            cipher: None,
        }
    }

    /// Whether the symmetric cipher is established.
    pub fn is_ready(&self) -> bool {
        self.cipher.is_some()
    }

    /// The established cipher, if any.
    pub fn cipher(&self) -> Option<&SessionCipher> {
        self.cipher.as_ref()
    }

    /// Listener: generate the session RSA key pair and return the public
    /// key as PKCS#1 DER for the wire.
    ///
    /// `bits` must be at least 1024 and a multiple of 256.
    pub fn generate_keypair(&mut self, bits: usize) -> Result<Vec<u8>> {
        if self.role != Role::Listener {
            return Err(Error::InvalidRole(self.role));
        }
        if bits < MIN_KEY_BITS || bits % 256 != 0 {
            return Err(Error::InvalidKeySize(bits));
        }

        let mut rng = OsRng;
        let private = RsaPrivateKey::new(&mut rng, bits)?;
        let public = RsaPublicKey::from(&private);
        let der = public
            .to_pkcs1_der()
            .map_err(|e| Error::KeyEncoding(e.to_string()))?
            .as_bytes()
            .to_vec();
        info!("generated {}-bit RSA key pair", bits);

        self.keypair = Some((public, private));
        Ok(der)
    }

    /// Listener: recover the session key from the connector's RSA
    /// ciphertext and install the cipher.
    ///
    /// Failure is fatal for the session: the channel stays unkeyed and
    /// encryption never becomes available.
    pub fn install_symmetric_key(&mut self, ciphertext: &[u8]) -> Result<()> {
        if self.role != Role::Listener {
            return Err(Error::InvalidRole(self.role));
        }
        let Some((_, private)) = self.keypair.as_ref() else {
            return Err(Error::ChannelNotReady);
        };

        let recovered = private.decrypt(Pkcs1v15Encrypt, ciphertext).map_err(|_| {
            error!("cannot decrypt given data with private key, symmetric cipher untouched");
            Error::AsymmetricDecryption
        })?;
        let key: [u8; SYMMETRIC_KEY_LEN] = recovered
            .try_into()
            .map_err(|_| Error::AsymmetricDecryption)?;

        self.install(&key);
        Ok(())
    }

    /// Connector: generate a fresh session key, install the cipher, and
    /// return the key RSA-encrypted with the listener's public key.
    pub fn generate_symmetric_key(&mut self, partner_der: &[u8]) -> Result<Vec<u8>> {
        if self.role != Role::Connector {
            return Err(Error::InvalidRole(self.role));
        }
        let partner = RsaPublicKey::from_pkcs1_der(partner_der)
            .map_err(|_| Error::MalformedPayload(Header::Pubkey))?;

        let mut key = [0u8; SYMMETRIC_KEY_LEN];
        OsRng.fill_bytes(&mut key);
        let ciphertext = partner.encrypt(&mut OsRng, Pkcs1v15Encrypt, &key)?;

        self.install(&key);
        Ok(ciphertext)
    }

    fn install(&mut self, key: &[u8; SYMMETRIC_KEY_LEN]) {
        if self.cipher.is_some() {
            warn!("symmetric cipher was already set");
        }
        let cipher = SessionCipher::new(key);
        info!("secure channel ready (key fingerprint {})", cipher.fingerprint());
        self.cipher = Some(cipher);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cipher_from(key: [u8; SYMMETRIC_KEY_LEN]) -> SessionCipher {
        SessionCipher::new(&key)
    }

    #[test]
    fn test_key_size_validation() {
        let mut channel = SecureChannel::new(Role::Listener);
        assert!(matches!(
            channel.generate_keypair(512),
            Err(Error::InvalidKeySize(512))
        ));
        assert!(matches!(
            channel.generate_keypair(1000),
            Err(Error::InvalidKeySize(1000))
        ));
        assert!(channel.generate_keypair(1024).is_ok());
    }

    #[test]
    fn test_role_guards() {
        let mut connector = SecureChannel::new(Role::Connector);
        assert!(matches!(
            connector.generate_keypair(1024),
            Err(Error::InvalidRole(Role::Connector))
        ));
        assert!(matches!(
            connector.install_symmetric_key(b"junk"),
            Err(Error::InvalidRole(Role::Connector))
        ));

        let mut listener = SecureChannel::new(Role::Listener);
        assert!(matches!(
            listener.generate_symmetric_key(b"junk"),
            Err(Error::InvalidRole(Role::Listener))
        ));
    }

    #[test]
    fn test_exchange_yields_identical_key_material() {
        let mut listener = SecureChannel::new(Role::Listener);
        let mut connector = SecureChannel::new(Role::Connector);

        let der = listener.generate_keypair(1024).unwrap();
        let ciphertext = connector.generate_symmetric_key(&der).unwrap();
        listener.install_symmetric_key(&ciphertext).unwrap();

        assert!(listener.is_ready());
        assert!(connector.is_ready());
        assert_eq!(
            listener.cipher().unwrap().fingerprint(),
            connector.cipher().unwrap().fingerprint()
        );

        // Frames sealed by one side open on the other.
        let sealed = listener.cipher().unwrap().encrypt(b"who goes there").unwrap();
        let opened = connector.cipher().unwrap().decrypt(&sealed).unwrap();
        assert_eq!(opened, b"who goes there");
    }

    #[test]
    fn test_decrypt_rejects_tampered_frames() {
        let cipher = cipher_from([7u8; SYMMETRIC_KEY_LEN]);
        let mut sealed = cipher.encrypt(b"five in a row").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert_eq!(cipher.decrypt(&sealed), Err(AuthFailure));
    }

    #[test]
    fn test_decrypt_rejects_foreign_keys() {
        let ours = cipher_from([1u8; SYMMETRIC_KEY_LEN]);
        let theirs = cipher_from([2u8; SYMMETRIC_KEY_LEN]);
        let sealed = ours.encrypt(b"secret").unwrap();
        assert_eq!(theirs.decrypt(&sealed), Err(AuthFailure));
    }

    #[test]
    fn test_decrypt_rejects_short_frames() {
        let cipher = cipher_from([3u8; SYMMETRIC_KEY_LEN]);
        assert_eq!(cipher.decrypt(&[0u8; NONCE_LEN]), Err(AuthFailure));
        assert_eq!(cipher.decrypt(b""), Err(AuthFailure));
    }

    #[test]
    fn test_install_rejects_wrong_key_length() {
        let mut listener = SecureChannel::new(Role::Listener);
        let der = listener.generate_keypair(1024).unwrap();

        // A peer that encrypts a key of the wrong size is rejected the
        // same way as an undecryptable one.
        let partner = RsaPublicKey::from_pkcs1_der(&der).unwrap();
        let short = partner
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, &[0u8; 16])
            .unwrap();
        assert!(matches!(
            listener.install_symmetric_key(&short),
            Err(Error::AsymmetricDecryption)
        ));
        assert!(!listener.is_ready());
    }

    proptest! {
        #[test]
        fn prop_roundtrip_arbitrary_payloads(
            payload in proptest::collection::vec(any::<u8>(), 0..2048)
        ) {
            let cipher = cipher_from([42u8; SYMMETRIC_KEY_LEN]);
            let sealed = cipher.encrypt(&payload).unwrap();
            prop_assert_eq!(cipher.decrypt(&sealed).unwrap(), payload);
        }
    }
}
