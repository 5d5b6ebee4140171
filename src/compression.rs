use std::io::Write;

use bzip2::write::BzEncoder;
use flate2::write::ZlibEncoder;
use log::debug;

use super::consts::*;
use super::crypto::decrypt_mpq_block;
use super::error::Error;

fn unsupported(kind: &str) -> Error {
    Error::UnsupportedCompression {
        kind: kind.to_string(),
    }
}

/// Decodes a block of data from an MPQ archive.
///
/// 1) If `encryption_key` is specified, it will decrypt the block using
/// that encryption key.
/// 2) If the block is shorter than `uncompressed_size`, it is compressed.
/// Imploded blocks are raw PKWare DCL streams; all other blocks start with
/// a byte holding the set of codecs applied to them.
pub(crate) fn decode_mpq_block(
    input: &[u8],
    uncompressed_size: u64,
    encryption_key: Option<u32>,
    imploded: bool,
) -> Result<Vec<u8>, Error> {
    let compressed_size = input.len() as u64;
    let mut buf: Vec<u8> = input.into();

    if let Some(encryption_key) = encryption_key {
        decrypt_mpq_block(&mut buf, encryption_key);
    }

    if compressed_size >= uncompressed_size {
        buf.truncate(uncompressed_size as usize);
        return Ok(buf);
    }

    if imploded {
        return Err(unsupported("PKWare DCL"));
    }

    let compression_type = u32::from(*buf.first().ok_or(Error::Corrupted)?);

    if compression_type == MPQ_COMPRESSION_LZMA {
        return Err(unsupported("LZMA"));
    }

    if compression_type & MPQ_COMPRESSION_ADPCM_MONO != 0 {
        return Err(unsupported("IMA ADPCM Mono"));
    }

    if compression_type & MPQ_COMPRESSION_ADPCM_STEREO != 0 {
        return Err(unsupported("IMA ADPCM Stereo"));
    }

    if compression_type & MPQ_COMPRESSION_HUFFMANN != 0 {
        return Err(unsupported("Huffman"));
    }

    if compression_type & MPQ_COMPRESSION_PKWARE != 0 {
        return Err(unsupported("PKWare DCL"));
    }

    if compression_type & MPQ_COMPRESSION_SPARSE != 0 {
        return Err(unsupported("Sparse"));
    }

    if compression_type & (MPQ_COMPRESSION_BZIP2 | MPQ_COMPRESSION_ZLIB) == 0 {
        return Err(Error::Corrupted);
    }

    if compression_type & MPQ_COMPRESSION_BZIP2 != 0 {
        let mut decompressed = vec![0u8; uncompressed_size as usize];
        let mut decompressor = bzip2::Decompress::new(false);
        let status = decompressor.decompress(&buf[1..], &mut decompressed);

        match status {
            Ok(bzip2::Status::Ok) | Ok(bzip2::Status::StreamEnd) => {}
            _ => return Err(Error::Corrupted),
        }

        decompressed.truncate(decompressor.total_out() as usize);
        buf = decompressed;
    } else {
        let mut decompressed = vec![0u8; uncompressed_size as usize];
        let mut decompressor = flate2::Decompress::new(true);
        let status = decompressor.decompress(
            &buf[1..],
            &mut decompressed,
            flate2::FlushDecompress::Finish,
        );

        match status {
            Ok(flate2::Status::BufError) | Err(_) => return Err(Error::Corrupted),
            Ok(_) => {}
        }

        decompressed.truncate(decompressor.total_out() as usize);
        buf = decompressed;
    }

    if buf.len() as u64 != uncompressed_size {
        return Err(Error::Corrupted);
    }

    Ok(buf)
}

/// Which codec the writer actually uses for a requested codec mask.
pub(crate) fn effective_codec(compression: u32) -> Option<u32> {
    if compression == MPQ_COMPRESSION_NEXT_SAME {
        None
    } else if compression & MPQ_COMPRESSION_BZIP2 != 0 {
        Some(MPQ_COMPRESSION_BZIP2)
    } else if compression & MPQ_COMPRESSION_ZLIB != 0 {
        Some(MPQ_COMPRESSION_ZLIB)
    } else {
        None
    }
}

/// Compresses one sector with the codec chosen for `compression`.
///
/// The result is either a codec byte followed by the compressed stream, or
/// the untouched sector when there is no codec to use or no space to gain.
pub(crate) fn compress_sector(data: &[u8], compression: u32) -> Result<Vec<u8>, Error> {
    let codec = match effective_codec(compression) {
        Some(codec) => codec,
        None => {
            if compression != 0 && compression != MPQ_COMPRESSION_NEXT_SAME {
                debug!(
                    "compression mask 0x{:02X} has no writable codec, storing sector",
                    compression
                );
            }
            return Ok(data.to_vec());
        }
    };

    let mut out = vec![codec as u8];
    if codec == MPQ_COMPRESSION_BZIP2 {
        let mut encoder = BzEncoder::new(out, bzip2::Compression::default());
        encoder.write_all(data)?;
        out = encoder.finish()?;
    } else {
        let mut encoder = ZlibEncoder::new(out, flate2::Compression::default());
        encoder.write_all(data)?;
        out = encoder.finish()?;
    }

    if out.len() < data.len() {
        Ok(out)
    } else {
        Ok(data.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        b"abcabcabcabcabcabcabcabcabcabcabcabcabcabcabcabcabcabcabcabc".repeat(20)
    }

    #[test]
    fn zlib_sector_roundtrip() {
        let data = sample();
        let compressed = compress_sector(&data, MPQ_COMPRESSION_ZLIB).unwrap();
        assert_eq!(u32::from(compressed[0]), MPQ_COMPRESSION_ZLIB);
        assert!(compressed.len() < data.len());

        let decoded = decode_mpq_block(&compressed, data.len() as u64, None, false).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn bzip2_wins_over_zlib() {
        let data = sample();
        let mask = MPQ_COMPRESSION_ZLIB | MPQ_COMPRESSION_BZIP2;
        let compressed = compress_sector(&data, mask).unwrap();
        assert_eq!(u32::from(compressed[0]), MPQ_COMPRESSION_BZIP2);

        let decoded = decode_mpq_block(&compressed, data.len() as u64, None, false).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn unwritable_codecs_store_raw() {
        let data = sample();
        let stored = compress_sector(&data, MPQ_COMPRESSION_PKWARE).unwrap();
        assert_eq!(stored, data);

        let stored = compress_sector(&data, 0).unwrap();
        assert_eq!(stored, data);
    }

    #[test]
    fn incompressible_data_stores_raw() {
        let data = vec![7u8; 3];
        assert_eq!(compress_sector(&data, MPQ_COMPRESSION_ZLIB).unwrap(), data);
    }

    #[test]
    fn unsupported_codecs_are_reported() {
        let block = [MPQ_COMPRESSION_PKWARE as u8, 1, 2, 3];
        match decode_mpq_block(&block, 100, None, false) {
            Err(Error::UnsupportedCompression { kind }) => assert_eq!(kind, "PKWare DCL"),
            other => panic!("unexpected result: {:?}", other),
        }

        let block = [MPQ_COMPRESSION_LZMA as u8, 1, 2, 3];
        match decode_mpq_block(&block, 100, None, false) {
            Err(Error::UnsupportedCompression { kind }) => assert_eq!(kind, "LZMA"),
            other => panic!("unexpected result: {:?}", other),
        }

        let block = [1u8, 2, 3];
        assert!(decode_mpq_block(&block, 100, None, true).is_err());
    }
}
