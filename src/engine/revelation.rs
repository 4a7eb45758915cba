//! Revelation vault format
//!
//! Layout: a 12-byte header, a 16-byte IV encrypted with AES-256-ECB, then
//! the AES-256-CBC encrypted body. The key is the password truncated or
//! NUL-padded to 32 bytes. The decrypted body is a zlib stream followed by
//! padding whose length is given by the last byte.

use std::io::{Read, Write};

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{
    block_padding::NoPadding, BlockDecrypt, BlockDecryptMut, BlockEncrypt, BlockEncryptMut,
    KeyInit, KeyIvInit,
};
use aes::Aes256;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use secrecy::zeroize::Zeroizing;
use secrecy::{ExposeSecret, SecretString};

use super::{Decrypt, DecryptError};

type Aes256CbcDec = cbc::Decryptor<Aes256>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;

const KEY_LEN: usize = 32;
const HEADER_LEN: usize = 12;
const IV_LEN: usize = 16;
const BODY_OFFSET: usize = HEADER_LEN + IV_LEN;

/// Header written by [`seal`]: magic, data version 2, app version 0.4.14
const HEADER: [u8; HEADER_LEN] = [b'r', b'v', b'l', 0, 2, 0, 0, 4, 14, 0, 0, 0];

fn derive_key(password: &SecretString) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    let bytes = password.expose_secret().as_bytes();
    let n = bytes.len().min(KEY_LEN);
    key[..n].copy_from_slice(&bytes[..n]);
    key
}

/// Built-in engine for Revelation files
#[derive(Debug, Default, Clone, Copy)]
pub struct RevelationEngine;

impl Decrypt for RevelationEngine {
    fn decrypt(&self, password: &SecretString, data: &[u8]) -> Result<Vec<u8>, DecryptError> {
        if data.len() <= BODY_OFFSET {
            return Err(DecryptError::TooSmall);
        }
        if data[..3] != HEADER[..3] {
            tracing::debug!("vault header magic not recognised, decrypting anyway");
        }

        let key = derive_key(password);
        let key = GenericArray::from_slice(&key[..]);

        let mut iv = GenericArray::clone_from_slice(&data[HEADER_LEN..BODY_OFFSET]);
        Aes256::new(key).decrypt_block(&mut iv);

        let body = Zeroizing::new(
            Aes256CbcDec::new(key, &iv)
                .decrypt_padded_vec_mut::<NoPadding>(&data[BODY_OFFSET..])
                .map_err(|_| DecryptError::Cipher)?,
        );

        let padding = body.last().copied().map(usize::from).unwrap_or_default();
        if padding > body.len() {
            return Err(DecryptError::Inflate);
        }

        let mut plaintext = Vec::new();
        ZlibDecoder::new(&body[..body.len() - padding])
            .read_to_end(&mut plaintext)
            .map_err(|_| DecryptError::Inflate)?;

        tracing::debug!(bytes = plaintext.len(), "vault decrypted");
        Ok(plaintext)
    }
}

/// Produce a Revelation file holding `plaintext`, using `iv` for the body
pub fn seal(password: &SecretString, plaintext: &[u8], iv: [u8; IV_LEN]) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(plaintext)?;
    let mut body = encoder.finish()?;

    let padding = IV_LEN - body.len() % IV_LEN;
    body.extend(std::iter::repeat(padding as u8).take(padding));

    let key = derive_key(password);
    let key = GenericArray::from_slice(&key[..]);
    let iv = GenericArray::from(iv);

    let mut wrapped_iv = iv;
    Aes256::new(key).encrypt_block(&mut wrapped_iv);

    let ciphertext = Aes256CbcEnc::new(key, &iv).encrypt_padded_vec_mut::<NoPadding>(&body);

    let mut out = Vec::with_capacity(BODY_OFFSET + ciphertext.len());
    out.extend_from_slice(&HEADER);
    out.extend_from_slice(&wrapped_iv);
    out.extend(ciphertext);
    Ok(out)
}
