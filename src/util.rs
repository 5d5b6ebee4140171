/// Number of sectors a file of `size` bytes occupies. Empty files have none.
pub(crate) fn sector_count_from_size(size: u64, sector_size: u64) -> u64 {
    if size == 0 {
        0
    } else {
        ((size - 1) / sector_size) + 1
    }
}

/// Converts a sector size in bytes to the header's `512 << shift` encoding.
pub(crate) fn sector_size_shift(sector_size: u32) -> Option<u16> {
    if sector_size < 512 || !sector_size.is_power_of_two() {
        return None;
    }

    Some((sector_size / 512).trailing_zeros() as u16)
}

/// Converts every forward slash to the backslash MPQ names use.
pub(crate) fn normalize_archive_name(name: &str) -> String {
    name.replace('/', "\\")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sector_counts() {
        assert_eq!(sector_count_from_size(0, 0x1000), 0);
        assert_eq!(sector_count_from_size(1, 0x1000), 1);
        assert_eq!(sector_count_from_size(0x1000, 0x1000), 1);
        assert_eq!(sector_count_from_size(0x1001, 0x1000), 2);
    }

    #[test]
    fn sector_shifts() {
        assert_eq!(sector_size_shift(512), Some(0));
        assert_eq!(sector_size_shift(0x1000), Some(3));
        assert_eq!(sector_size_shift(0x4000), Some(5));
        assert_eq!(sector_size_shift(0x1001), None);
        assert_eq!(sector_size_shift(256), None);
    }
}
