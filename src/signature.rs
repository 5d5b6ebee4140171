//! Weak archive signatures.
//!
//! A weak signature is the `(signature)` internal file: 8 zero bytes followed
//! by a 512-bit RSA signature in little-endian order. It signs the MD5 of the
//! whole archive, from the MPQ header to the archive end, with the
//! `(signature)` file itself hashed as zeros. The key pair is Blizzard's
//! published weak signature key.

use std::cmp::min;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::ops::Range;

use rsa::{BigUint, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};

use super::consts::*;
use super::error::Error;

const DIGEST_CHUNK_SIZE: usize = 0x10000;

// DER DigestInfo header of an MD5 digest
const MD5_DIGEST_INFO: [u8; 18] = [
    0x30, 0x20, 0x30, 0x0C, 0x06, 0x08, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x02, 0x05, 0x05,
    0x00, 0x04, 0x10,
];

const WEAK_PUBLIC_EXPONENT: [u8; 3] = [0x01, 0x00, 0x01];

const WEAK_MODULUS: [u8; 64] = [
    0x92, 0x62, 0x77, 0x04, 0xBF, 0xB8, 0x82, 0xCC, 0x05, 0x23, 0xB9, 0x0C, 0xB1, 0xAC, 0x04,
    0x59, 0x27, 0x21, 0x75, 0x96, 0x8D, 0x02, 0x5E, 0xDA, 0x47, 0xDD, 0x7C, 0x49, 0x37, 0x1B,
    0xF8, 0xFA, 0xEB, 0x0E, 0x0A, 0x92, 0x16, 0x75, 0x57, 0xAD, 0x51, 0xB7, 0x8C, 0xCB, 0x68,
    0xC5, 0x42, 0x62, 0x90, 0xEE, 0x9F, 0xB1, 0x4B, 0xC1, 0x18, 0xE4, 0x30, 0x34, 0x9E, 0xA4,
    0xED, 0x6A, 0xD8, 0x37,
];

const WEAK_PRIVATE_EXPONENT: [u8; 64] = [
    0x36, 0xD8, 0xB3, 0xB5, 0x50, 0xCC, 0x26, 0x1D, 0xA1, 0x13, 0x58, 0x63, 0x3C, 0x32, 0xB2,
    0x52, 0x61, 0x09, 0xF5, 0x4F, 0xDA, 0x37, 0x78, 0x28, 0x9A, 0xE2, 0x8E, 0x8D, 0xB4, 0x1B,
    0x43, 0xF6, 0xD6, 0x59, 0xC3, 0x3F, 0x59, 0xF8, 0x52, 0x54, 0x79, 0x8F, 0xAA, 0xDA, 0xA1,
    0xFD, 0xB4, 0x08, 0xD9, 0x45, 0xC5, 0xAF, 0x4A, 0xE7, 0x5E, 0x78, 0x1E, 0xB5, 0xE6, 0x47,
    0x2E, 0xBF, 0xDB, 0xF1,
];

const WEAK_PRIME_P: [u8; 32] = [
    0xCB, 0x96, 0xAE, 0x24, 0x8A, 0x18, 0xC0, 0x02, 0xC3, 0x5F, 0x3F, 0xAD, 0x55, 0x5F, 0x52,
    0xB4, 0xE1, 0xB3, 0xDD, 0x79, 0xA1, 0xD2, 0x81, 0x1F, 0x50, 0x25, 0xAF, 0x7B, 0xCC, 0x55,
    0x5C, 0xD9,
];

const WEAK_PRIME_Q: [u8; 32] = [
    0xB8, 0x11, 0xCF, 0x49, 0x09, 0x20, 0xC1, 0xC6, 0xFA, 0x2F, 0x83, 0x16, 0x6A, 0x22, 0xAE,
    0x3B, 0x3A, 0xB4, 0xF2, 0x64, 0xB2, 0x36, 0xA3, 0xDE, 0x37, 0xCA, 0x12, 0xCB, 0x5F, 0x2A,
    0xF3, 0x8F,
];

fn weak_private_key() -> Result<RsaPrivateKey, Error> {
    let key = RsaPrivateKey::from_components(
        BigUint::from_bytes_be(&WEAK_MODULUS),
        BigUint::from_bytes_be(&WEAK_PUBLIC_EXPONENT),
        BigUint::from_bytes_be(&WEAK_PRIVATE_EXPONENT),
        vec![
            BigUint::from_bytes_be(&WEAK_PRIME_P),
            BigUint::from_bytes_be(&WEAK_PRIME_Q),
        ],
    )?;

    Ok(key)
}

fn weak_public_key() -> Result<RsaPublicKey, Error> {
    let key = RsaPublicKey::new(
        BigUint::from_bytes_be(&WEAK_MODULUS),
        BigUint::from_bytes_be(&WEAK_PUBLIC_EXPONENT),
    )?;

    Ok(key)
}

fn digest_info(digest: &[u8; 16]) -> Vec<u8> {
    let mut info = MD5_DIGEST_INFO.to_vec();
    info.extend_from_slice(digest);
    info
}

/// MD5 of the bytes in `archive`, with the bytes in `excluded` hashed as
/// zeros. Both ranges are absolute reader positions.
pub(crate) fn archive_digest<R>(
    mut reader: R,
    archive: Range<u64>,
    excluded: Range<u64>,
) -> Result<[u8; 16], Error>
where
    R: Read + Seek,
{
    let mut context = md5::Context::new();
    let mut buf = vec![0u8; DIGEST_CHUNK_SIZE];
    let mut pos = archive.start;

    reader.seek(SeekFrom::Start(pos))?;

    while pos < archive.end {
        let len = min(DIGEST_CHUNK_SIZE as u64, archive.end - pos) as usize;
        let chunk = &mut buf[..len];
        reader.read_exact(chunk)?;

        let chunk_end = pos + len as u64;
        let zero_start = excluded.start.max(pos);
        let zero_end = excluded.end.min(chunk_end);
        if zero_start < zero_end {
            for byte in &mut chunk[(zero_start - pos) as usize..(zero_end - pos) as usize] {
                *byte = 0;
            }
        }

        context.consume(&chunk[..]);
        pos = chunk_end;
    }

    Ok(context.compute().0)
}

/// Signs an archive digest, returning the signature in the little-endian
/// order `(signature)` stores it in.
pub(crate) fn sign_weak(digest: &[u8; 16]) -> Result<[u8; WEAK_SIGNATURE_SIZE], Error> {
    let key = weak_private_key()?;
    let signed = key.sign(Pkcs1v15Sign::new_unprefixed(), &digest_info(digest))?;

    if signed.len() != WEAK_SIGNATURE_SIZE {
        return Err(Error::Corrupted);
    }

    let mut signature = [0u8; WEAK_SIGNATURE_SIZE];
    for (slot, byte) in signature.iter_mut().zip(signed.iter().rev()) {
        *slot = *byte;
    }

    Ok(signature)
}

/// Checks a little-endian weak signature against an archive digest.
pub(crate) fn verify_weak(digest: &[u8; 16], signature: &[u8]) -> Result<bool, Error> {
    if signature.len() != WEAK_SIGNATURE_SIZE {
        return Ok(false);
    }

    let key = weak_public_key()?;
    let signature: Vec<u8> = signature.iter().rev().copied().collect();

    Ok(key
        .verify(Pkcs1v15Sign::new_unprefixed(), &digest_info(digest), &signature)
        .is_ok())
}

/// Signs a fully written archive held in `data`. `signature_pos` is where
/// the zero-filled `(signature)` file starts.
pub(crate) fn write_weak_signature(
    data: &mut [u8],
    archive: Range<u64>,
    signature_pos: u64,
) -> Result<(), Error> {
    let excluded = signature_pos..signature_pos + WEAK_SIGNATURE_FILE_SIZE;
    let digest = archive_digest(Cursor::new(&*data), archive, excluded)?;
    let signature = sign_weak(&digest)?;

    let start = signature_pos as usize + WEAK_SIGNATURE_OFFSET;
    data.get_mut(start..start + WEAK_SIGNATURE_SIZE)
        .ok_or(Error::Corrupted)?
        .copy_from_slice(&signature);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST: [u8; 16] = [
        0x52, 0x50, 0x12, 0xA6, 0x5F, 0x73, 0xFB, 0x9E, 0x7D, 0xC5, 0x2C, 0x11, 0x7F, 0x08, 0x16,
        0x9C,
    ];

    const SIGNATURE: [u8; 64] = [
        0x7D, 0xCB, 0x53, 0x0B, 0xFF, 0x81, 0xC4, 0x37, 0x96, 0xB8, 0x41, 0xF1, 0xA7, 0x69, 0x99,
        0x47, 0xF9, 0xB5, 0x7B, 0xD7, 0xC7, 0xC5, 0x0E, 0xAD, 0x18, 0x53, 0x76, 0x3E, 0x77, 0x57,
        0x35, 0x5C, 0x13, 0x3F, 0xB4, 0x4B, 0xDE, 0xAB, 0xFE, 0xE7, 0x84, 0xD0, 0xD8, 0x49, 0xEA,
        0xC5, 0x39, 0x5E, 0xE0, 0x49, 0xFC, 0xD5, 0x41, 0xDB, 0x8F, 0x54, 0x38, 0x5B, 0x95, 0x57,
        0x17, 0xC8, 0xB6, 0x00,
    ];

    #[test]
    fn known_signature() {
        assert_eq!(md5::compute(b"weak signature test").0, DIGEST);
        assert_eq!(&sign_weak(&DIGEST).unwrap()[..], &SIGNATURE[..]);
        assert!(verify_weak(&DIGEST, &SIGNATURE).unwrap());
    }

    #[test]
    fn rejects_other_digests_and_signatures() {
        let mut digest = DIGEST;
        digest[0] ^= 1;
        assert!(!verify_weak(&digest, &SIGNATURE).unwrap());

        let mut signature = SIGNATURE;
        signature[10] ^= 0x80;
        assert!(!verify_weak(&DIGEST, &signature).unwrap());

        assert!(!verify_weak(&DIGEST, &SIGNATURE[..32]).unwrap());
    }

    #[test]
    fn excluded_bytes_hash_as_zeros() {
        let data: Vec<u8> = (0..200u32).map(|i| i as u8).collect();
        let mut zeroed = data.clone();
        for byte in &mut zeroed[120..150] {
            *byte = 0;
        }

        let digest = archive_digest(Cursor::new(&data), 100..200, 120..150).unwrap();
        assert_eq!(digest, md5::compute(&zeroed[100..200]).0);

        let whole = archive_digest(Cursor::new(&data), 0..200, 0..0).unwrap();
        assert_eq!(whole, md5::compute(&data).0);
    }

    #[test]
    fn signs_in_place() {
        let mut data = vec![0xAAu8; 512];
        for byte in &mut data[300..372] {
            *byte = 0;
        }

        write_weak_signature(&mut data, 0..512, 300).unwrap();
        assert_eq!(&data[300..308], &[0u8; 8]);

        let digest = archive_digest(Cursor::new(&data), 0..512, 300..372).unwrap();
        assert!(verify_weak(&digest, &data[308..372]).unwrap());
    }
}
