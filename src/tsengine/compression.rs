//! SSTable block (de)compression. `compress`/`decompress` dispatch on the
//! `Compression` the storage config was validated against; `validate()`
//! already rejects any variant without a codec here.

use crate::cfg::Compression;
use crate::error::{MonitorError, MonitorResult};

pub fn compress(algorithm: Compression, data: &[u8]) -> MonitorResult<Vec<u8>> {
    match algorithm {
        Compression::None => Ok(data.to_vec()),
        Compression::Zstd => zstd::encode_all(data, 0)
            .map_err(|e| MonitorError::StorageWriteFailed(format!("zstd compress: {e}"))),
        other => Err(MonitorError::invalid_configuration(format!(
            "no codec implemented for {other:?}"
        ))),
    }
}

pub fn decompress(algorithm: Compression, data: &[u8]) -> MonitorResult<Vec<u8>> {
    match algorithm {
        Compression::None => Ok(data.to_vec()),
        Compression::Zstd => zstd::decode_all(data)
            .map_err(|e| MonitorError::StorageReadFailed(format!("zstd decompress: {e}"))),
        other => Err(MonitorError::invalid_configuration(format!(
            "no codec implemented for {other:?}"
        ))),
    }
}
