//! Binary wire/storage format for Diagnosis Keys.
//!
//! Every key is one fixed 20-byte frame:
//!
//! ```text
//! [temporary_exposure_key: 16 bytes][interval_number: u32 BE]
//! ```
//!
//! Frames are concatenated with no header, delimiter, length prefix or
//! checksum. A stream is valid only if its length is a positive multiple
//! of [`DIAGNOSIS_KEY_SIZE`].

use std::io::{Read, Write};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{
    CodecError, DiagnosisKey, DIAGNOSIS_KEY_SIZE, INTERVAL_NUMBER_SIZE, TEMPORARY_EXPOSURE_KEY_SIZE,
};

/// Append the frames for `keys`, in order, to `buf`.
pub fn encode_into<B: BufMut>(buf: &mut B, keys: &[DiagnosisKey]) {
    for key in keys {
        buf.put_slice(&key.temporary_exposure_key);
        buf.put_u32(key.interval_number);
    }
}

/// Encode `keys` into a freshly allocated buffer.
pub fn encode(keys: &[DiagnosisKey]) -> Bytes {
    let mut buf = BytesMut::with_capacity(keys.len() * DIAGNOSIS_KEY_SIZE);
    encode_into(&mut buf, keys);
    buf.freeze()
}

/// Write the frames for `keys` to `w`.
///
/// Fails only when the writer does.
pub fn write_diagnosis_keys<W: Write>(w: &mut W, keys: &[DiagnosisKey]) -> Result<(), CodecError> {
    let mut frame = [0u8; DIAGNOSIS_KEY_SIZE];
    for key in keys {
        frame[..TEMPORARY_EXPOSURE_KEY_SIZE].copy_from_slice(&key.temporary_exposure_key);
        frame[TEMPORARY_EXPOSURE_KEY_SIZE..].copy_from_slice(&key.interval_number.to_be_bytes());
        w.write_all(&frame)?;
    }
    Ok(())
}

/// Decode a buffer of concatenated frames.
///
/// An empty buffer, or one with a partial trailing frame, is
/// [`CodecError::UnexpectedEof`]. Decoded keys carry no upload time.
pub fn decode(mut buf: &[u8]) -> Result<Vec<DiagnosisKey>, CodecError> {
    let len = buf.len();
    if len == 0 || len % DIAGNOSIS_KEY_SIZE != 0 {
        return Err(CodecError::UnexpectedEof { len });
    }

    let mut keys = Vec::with_capacity(len / DIAGNOSIS_KEY_SIZE);
    while buf.remaining() >= DIAGNOSIS_KEY_SIZE {
        let mut temporary_exposure_key = [0u8; TEMPORARY_EXPOSURE_KEY_SIZE];
        buf.copy_to_slice(&mut temporary_exposure_key);
        debug_assert!(buf.remaining() >= INTERVAL_NUMBER_SIZE);
        let interval_number = buf.get_u32();
        keys.push(DiagnosisKey::new(temporary_exposure_key, interval_number));
    }

    Ok(keys)
}

/// Read an upload body to the end and decode it.
pub fn parse_diagnosis_keys<R: Read>(mut r: R) -> Result<Vec<DiagnosisKey>, CodecError> {
    let mut buf = Vec::new();
    r.read_to_end(&mut buf)?;
    decode(&buf)
}
