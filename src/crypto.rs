use byteorder::{ByteOrder, LE};
use lazy_static::lazy_static;

use super::consts::*;

lazy_static! {
    static ref CRYPTO_TABLE: [u32; 0x500] = generate_crypto_table();
    static ref ASCII_UPPER_LOOKUP: [u8; 256] = generate_upper_lookup();
}

fn generate_crypto_table() -> [u32; 0x500] {
    let mut crypto_table = [0u32; 0x500];
    let mut seed: u32 = 0x0010_0001;

    for i in 0..0x100 {
        for j in 0..5 {
            let index = i + j * 0x100;
            seed = (seed * 125 + 3) % 0x002A_AAAB;
            let t1 = (seed & 0xFFFF) << 0x10;
            seed = (seed * 125 + 3) % 0x002A_AAAB;
            let t2 = seed & 0xFFFF;

            crypto_table[index] = t1 | t2;
        }
    }

    crypto_table
}

// names hash the same regardless of case and path separator
fn generate_upper_lookup() -> [u8; 256] {
    let mut lookup = [0u8; 256];

    for (i, slot) in lookup.iter_mut().enumerate() {
        let byte = i as u8;
        *slot = if byte == b'/' {
            b'\\'
        } else {
            byte.to_ascii_uppercase()
        };
    }

    lookup
}

pub(crate) fn hash_string(source: &[u8], hash_type: u32) -> u32 {
    let mut seed1: u32 = 0x7FED_7FED;
    let mut seed2: u32 = 0xEEEE_EEEE;

    for byte in source {
        let upper = u32::from(ASCII_UPPER_LOOKUP[*byte as usize]);

        seed1 = CRYPTO_TABLE[(hash_type + upper) as usize] ^ seed1.wrapping_add(seed2);
        seed2 = upper
            .wrapping_add(seed1)
            .wrapping_add(seed2)
            .wrapping_add(seed2 << 5)
            .wrapping_add(3);
    }

    seed1
}

// the trailing bytes that don't fit into a whole u32 are never encrypted
pub(crate) fn encrypt_mpq_block(data: &mut [u8], mut key: u32) {
    let mut key_secondary: u32 = 0xEEEE_EEEE;

    for chunk in data.chunks_exact_mut(4) {
        key_secondary =
            key_secondary.wrapping_add(CRYPTO_TABLE[(MPQ_HASH_KEY2_MIX + (key & 0xFF)) as usize]);

        let plain = LE::read_u32(chunk);
        LE::write_u32(chunk, plain ^ key.wrapping_add(key_secondary));

        key = ((!key << 0x15).wrapping_add(0x1111_1111)) | (key >> 0x0B);
        key_secondary = plain
            .wrapping_add(key_secondary)
            .wrapping_add(key_secondary << 5)
            .wrapping_add(3);
    }
}

pub(crate) fn decrypt_mpq_block(data: &mut [u8], mut key: u32) {
    let mut key_secondary: u32 = 0xEEEE_EEEE;

    for chunk in data.chunks_exact_mut(4) {
        key_secondary =
            key_secondary.wrapping_add(CRYPTO_TABLE[(MPQ_HASH_KEY2_MIX + (key & 0xFF)) as usize]);

        let plain = LE::read_u32(chunk) ^ key.wrapping_add(key_secondary);
        LE::write_u32(chunk, plain);

        key = ((!key << 0x15).wrapping_add(0x1111_1111)) | (key >> 0x0B);
        key_secondary = plain
            .wrapping_add(key_secondary)
            .wrapping_add(key_secondary << 5)
            .wrapping_add(3);
    }
}

pub(crate) fn get_plain_name(input: &str) -> &[u8] {
    let bytes = input.as_bytes();

    match bytes.iter().rposition(|b| *b == b'\\' || *b == b'/') {
        Some(pos) => &bytes[(pos + 1)..],
        None => bytes,
    }
}

pub(crate) fn calculate_file_key(
    file_name: &str,
    file_offset: u32,
    file_size: u32,
    adjusted: bool,
) -> u32 {
    let plain_name = get_plain_name(file_name);
    let mut key = hash_string(plain_name, MPQ_HASH_FILE_KEY);

    if adjusted {
        key = key.wrapping_add(file_offset) ^ file_size
    }

    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_keys_match_their_names() {
        assert_eq!(hash_string(b"(hash table)", MPQ_HASH_FILE_KEY), HASH_TABLE_KEY);
        assert_eq!(hash_string(b"(block table)", MPQ_HASH_FILE_KEY), BLOCK_TABLE_KEY);
    }

    #[test]
    fn hashing_ignores_case_and_separator() {
        let a = hash_string(b"Units\\Human\\Footman.mdx", MPQ_HASH_NAME_A);
        let b = hash_string(b"units/human/footman.MDX", MPQ_HASH_NAME_A);
        assert_eq!(a, b);
    }

    #[test]
    fn encryption_is_reversible() {
        let original: Vec<u8> = (0u8..=42).collect();
        let mut data = original.clone();

        encrypt_mpq_block(&mut data, 0xDEAD_BEEF);
        assert_ne!(data[..40], original[..40]);
        // the unaligned tail stays as it was
        assert_eq!(data[40..], original[40..]);

        decrypt_mpq_block(&mut data, 0xDEAD_BEEF);
        assert_eq!(data, original);
    }

    #[test]
    fn plain_name_strips_directories() {
        assert_eq!(get_plain_name("war3map.j"), b"war3map.j");
        assert_eq!(get_plain_name("Scripts\\war3map.j"), b"war3map.j");
        assert_eq!(get_plain_name("a/b\\c.txt"), b"c.txt");
    }

    #[test]
    fn adjusted_key_mixes_position_and_size() {
        let plain = calculate_file_key("dir\\file.txt", 0x200, 0x40, false);
        let adjusted = calculate_file_key("dir\\file.txt", 0x200, 0x40, true);
        assert_eq!(adjusted, plain.wrapping_add(0x200) ^ 0x40);
    }
}
