//! Memory estimates for chunk sizing.

use super::BatchConfig;
use crate::core::source::SourceFile;
use sysinfo::System;
use tracing::debug;

/// Device memory is capped here before the fraction is applied, so large
/// machines don't produce huge chunks.
const DEVICE_MEMORY_CAP: u64 = 8 * 1024 * 1024 * 1024;

/// Decoded size relative to encoded size
const DECODE_EXPANSION: u64 = 4;

/// Bytes the batch may hold in flight.
///
/// A fraction of (capped) device memory, or the configured floor when the
/// device figure is unknown.
pub fn estimate_available_memory(config: &BatchConfig) -> u64 {
    let device = config.device_memory_bytes.or_else(detect_device_memory);

    match device {
        Some(total) if total > 0 => {
            let capped = total.min(DEVICE_MEMORY_CAP);
            (capped as f64 * config.memory_fraction) as u64
        }
        _ => config.memory_floor_bytes,
    }
}

/// Files per chunk: available memory over the estimated per-file footprint,
/// clamped to the configured bounds.
pub fn optimal_chunk_size(files: &[SourceFile], available: u64, config: &BatchConfig) -> usize {
    let min = config.min_chunk_size.max(1);
    let max = config.max_chunk_size.max(min);
    if files.is_empty() {
        return min;
    }

    let total: u64 = files.iter().map(|f| f.byte_size).sum();
    let average = total / files.len() as u64;
    let per_file = average.saturating_mul(DECODE_EXPANSION);
    if per_file == 0 {
        return max;
    }

    let chunk = (available / per_file) as usize;
    let chunk = chunk.clamp(min, max);
    debug!(average_bytes = average, available, chunk, "computed chunk size");
    chunk
}

fn detect_device_memory() -> Option<u64> {
    let mut system = System::new();
    system.refresh_memory();
    let total = system.total_memory();
    (total > 0).then_some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = 1024 * 1024;

    fn files_of(size: usize, count: usize) -> Vec<SourceFile> {
        (0..count)
            .map(|i| SourceFile::from_bytes(format!("{}.jpg", i), vec![0u8; size]))
            .collect()
    }

    #[test]
    fn chunk_is_clamped_to_bounds() {
        let config = BatchConfig::default();

        // 10 KB files with 100 MB available: far more than 50
        assert_eq!(optimal_chunk_size(&files_of(10 * 1024, 3), 100 * MB, &config), 50);
        // 1 MB files with 1 MB available: less than 1
        assert_eq!(optimal_chunk_size(&files_of(1024 * 1024, 2), MB, &config), 1);
    }

    #[test]
    fn chunk_divides_available_memory() {
        // 1 MB average -> 4 MB per file -> 40 MB / 4 MB = 10
        let config = BatchConfig::default();
        assert_eq!(optimal_chunk_size(&files_of(1024 * 1024, 4), 40 * MB, &config), 10);
    }

    #[test]
    fn empty_list_uses_minimum() {
        assert_eq!(optimal_chunk_size(&[], 100 * MB, &BatchConfig::default()), 1);
    }

    #[test]
    fn known_device_memory_uses_fraction() {
        let config = BatchConfig {
            device_memory_bytes: Some(1000 * MB),
            ..BatchConfig::default()
        };
        assert_eq!(estimate_available_memory(&config), 150 * MB);
    }

    #[test]
    fn large_devices_are_capped() {
        let config = BatchConfig {
            device_memory_bytes: Some(64 * 1024 * MB),
            ..BatchConfig::default()
        };
        assert_eq!(
            estimate_available_memory(&config),
            (DEVICE_MEMORY_CAP as f64 * 0.15) as u64
        );
    }

    #[test]
    fn unknown_device_memory_uses_floor() {
        let config = BatchConfig {
            device_memory_bytes: Some(0),
            ..BatchConfig::default()
        };
        assert_eq!(estimate_available_memory(&config), 200 * MB);
    }
}
