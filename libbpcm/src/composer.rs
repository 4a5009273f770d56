//! Frame serialization.
//!
//! Wire layout: sync byte, info byte, optional explicit sample count
//! (2 bytes LE), length field (1/2/3 bytes LE by data-length mode), payload.
//! Silent frames carry no payload or length field; the sample count goes
//! where the length field would be, its width smuggled through the
//! compression bits of the info byte.

use crate::core::{
    CompressionKind, DataLengthMode, Error, InfoByte, SYNC_BYTE,
};

/// Serialize one frame. `payload` of `None` composes a silent-run frame
/// whose `sample_count` may use the full 24-bit range; data frames write
/// the count as 16 bits when `write_sample_count` is set and otherwise
/// flag the reader to inherit the previous count.
pub fn compose_frame(
    payload: Option<&[u8]>,
    sample_rate: u32,
    channels: u8,
    compression: CompressionKind,
    write_sample_count: bool,
    sample_count: u64,
) -> Result<Vec<u8>, Error> {
    match payload {
        Some(data) => {
            let mode = DataLengthMode::for_payload(data.len())?;
            let info = InfoByte {
                data_length: mode,
                compression,
                channels,
                use_last_sample_count: !write_sample_count,
                sample_rate,
            }
            .compose()?;

            let mut out = Vec::with_capacity(data.len() + 8);
            out.push(SYNC_BYTE);
            out.push(info);
            if write_sample_count {
                out.extend_from_slice(&(sample_count as u16).to_le_bytes());
            }
            out.extend_from_slice(&data.len().to_le_bytes()[..mode.field_width()]);
            out.extend_from_slice(data);
            Ok(out)
        }
        None => {
            let width: usize = match sample_count {
                0..=0xFF => 1,
                0x100..=0xFFFF => 2,
                0x1_0000..=0xFF_FFFF => 3,
                _ => return Err(Error::SilentRunTooLong(sample_count)),
            };
            let info = InfoByte {
                data_length: DataLengthMode::Silent,
                // the compression bits carry the count width instead
                compression: CompressionKind::from(width as u8),
                channels,
                use_last_sample_count: false,
                sample_rate,
            }
            .compose()?;

            let mut out = Vec::with_capacity(2 + width);
            out.push(SYNC_BYTE);
            out.push(info);
            out.extend_from_slice(&(sample_count as u32).to_le_bytes()[..width]);
            Ok(out)
        }
    }
}
