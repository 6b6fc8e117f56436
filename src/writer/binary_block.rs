//! Binary block codec shared by the exporters.
//!
//! A numeric array becomes a text-safe block in four steps:
//!
//! 1. pack the values into a flat byte buffer ([`ByteBuffer`]),
//! 2. zlib-compress the buffer,
//! 3. frame it with a `u32` header `[1, raw_size, raw_size, compressed_size]`,
//! 4. base64 the header and the payload separately and concatenate them.
//!
//! This is the layout VTK's `vtkZLibDataCompressor` reads for a
//! `format="binary"` data array holding a single block.

use std::io::{Read, Write};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{MeshError, MeshResult};

/// Byte order of packed values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

impl ByteOrder {
    /// Byte order of the host
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::BigEndian
        } else {
            ByteOrder::LittleEndian
        }
    }

    /// Value of the VTU `byte_order` attribute
    pub fn vtk_name(&self) -> &'static str {
        match self {
            ByteOrder::LittleEndian => "LittleEndian",
            ByteOrder::BigEndian => "BigEndian",
        }
    }
}

/// Fixed-width value that can be packed into a [`ByteBuffer`]
pub trait Pack: Copy {
    /// Size in bytes
    const WIDTH: usize;
    /// VTK `DataArray` type name
    const TYPE_NAME: &'static str;

    fn pack_into(self, order: ByteOrder, out: &mut Vec<u8>);

    /// Reads one value from exactly `WIDTH` bytes
    fn unpack_from(bytes: &[u8], order: ByteOrder) -> Self;
}

macro_rules! impl_pack {
    ($($t:ty => $name:expr),* $(,)?) => {
        $(
            impl Pack for $t {
                const WIDTH: usize = std::mem::size_of::<$t>();
                const TYPE_NAME: &'static str = $name;

                fn pack_into(self, order: ByteOrder, out: &mut Vec<u8>) {
                    match order {
                        ByteOrder::LittleEndian => out.extend_from_slice(&self.to_le_bytes()),
                        ByteOrder::BigEndian => out.extend_from_slice(&self.to_be_bytes()),
                    }
                }

                fn unpack_from(bytes: &[u8], order: ByteOrder) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$t>()];
                    raw.copy_from_slice(&bytes[..std::mem::size_of::<$t>()]);
                    match order {
                        ByteOrder::LittleEndian => <$t>::from_le_bytes(raw),
                        ByteOrder::BigEndian => <$t>::from_be_bytes(raw),
                    }
                }
            }
        )*
    };
}

impl_pack! {
    u8 => "UInt8",
    u16 => "UInt16",
    i32 => "Int32",
    u32 => "UInt32",
    i64 => "Int64",
    f32 => "Float32",
    f64 => "Float64",
}

/// Growable byte buffer of packed fixed-width values, no padding
#[derive(Debug, Clone)]
pub struct ByteBuffer {
    bytes: Vec<u8>,
    order: ByteOrder,
}

impl ByteBuffer {
    pub fn new(order: ByteOrder) -> Self {
        Self { bytes: Vec::new(), order }
    }

    pub fn with_capacity(order: ByteOrder, capacity: usize) -> Self {
        Self { bytes: Vec::with_capacity(capacity), order }
    }

    pub fn push<T: Pack>(&mut self, value: T) {
        value.pack_into(self.order, &mut self.bytes);
    }

    pub fn extend<T: Pack>(&mut self, values: &[T]) {
        self.bytes.reserve(values.len() * T::WIDTH);
        for &value in values {
            value.pack_into(self.order, &mut self.bytes);
        }
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Splits `bytes` into values of `T`; the length must be a multiple of the width
pub fn unpack<T: Pack>(bytes: &[u8], order: ByteOrder) -> MeshResult<Vec<T>> {
    if bytes.len() % T::WIDTH != 0 {
        return Err(MeshError::format(format!(
            "{} bytes is not a whole number of {} values",
            bytes.len(),
            T::TYPE_NAME
        )));
    }
    Ok(bytes
        .chunks_exact(T::WIDTH)
        .map(|chunk| T::unpack_from(chunk, order))
        .collect())
}

/// zlib at the default level
pub fn compress(data: &[u8]) -> MeshResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| MeshError::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| MeshError::Compression(e.to_string()))
}

pub fn decompress(data: &[u8]) -> MeshResult<Vec<u8>> {
    let mut decoded = Vec::new();
    ZlibDecoder::new(data)
        .read_to_end(&mut decoded)
        .map_err(|e| MeshError::Compression(e.to_string()))?;
    Ok(decoded)
}

/// Single-block header: block count, block size, total size, compressed size
fn frame_header(raw_size: usize, compressed_size: usize, order: ByteOrder) -> MeshResult<Vec<u8>> {
    let raw = u32::try_from(raw_size)?;
    let compressed = u32::try_from(compressed_size)?;
    let mut header = ByteBuffer::with_capacity(order, 16);
    header.extend(&[1u32, raw, raw, compressed]);
    Ok(header.into_bytes())
}

// base64 of the 16-byte header: 6 groups of 4 characters
const ENCODED_HEADER_LEN: usize = 24;

/// Compresses, frames and base64-encodes one packed buffer
pub fn encode_block(data: &[u8], order: ByteOrder) -> MeshResult<String> {
    let compressed = compress(data)?;
    let header = frame_header(data.len(), compressed.len(), order)?;

    let mut block = BASE64.encode(&header);
    block.push_str(&BASE64.encode(&compressed));
    Ok(block)
}

/// Packs `values` in host order and encodes them as one block
pub fn encode_array<T: Pack>(values: &[T]) -> MeshResult<String> {
    let mut buffer = ByteBuffer::with_capacity(ByteOrder::native(), values.len() * T::WIDTH);
    buffer.extend(values);
    encode_block(buffer.as_bytes(), buffer.order())
}

/// Inverse of [`encode_block`]: returns the original packed buffer
pub fn decode_block(text: &str, order: ByteOrder) -> MeshResult<Vec<u8>> {
    let text = text.trim();
    let (header_text, payload_text) = match (text.get(..ENCODED_HEADER_LEN), text.get(ENCODED_HEADER_LEN..)) {
        (Some(header), Some(payload)) => (header, payload),
        _ => return Err(MeshError::format("Binary block shorter than its header")),
    };

    let header_bytes = BASE64
        .decode(header_text)
        .map_err(|e| MeshError::format(format!("Invalid block header encoding: {}", e)))?;
    let header: Vec<u32> = unpack(&header_bytes, order)?;
    if header.len() != 4 || header[0] != 1 || header[1] != header[2] {
        return Err(MeshError::format(format!(
            "Unexpected block header {:?}, expected a single block",
            header
        )));
    }
    let raw_size = header[1] as usize;
    let compressed_size = header[3] as usize;

    let compressed = BASE64
        .decode(payload_text)
        .map_err(|e| MeshError::format(format!("Invalid block payload encoding: {}", e)))?;
    if compressed.len() != compressed_size {
        return Err(MeshError::format(format!(
            "Block payload is {} bytes, header says {}",
            compressed.len(),
            compressed_size
        )));
    }

    let data = decompress(&compressed)?;
    if data.len() != raw_size {
        return Err(MeshError::format(format!(
            "Block inflates to {} bytes, header says {}",
            data.len(),
            raw_size
        )));
    }
    Ok(data)
}

/// Decodes a host-order block straight into values of `T`
pub fn decode_array<T: Pack>(text: &str) -> MeshResult<Vec<T>> {
    let order = ByteOrder::native();
    unpack(&decode_block(text, order)?, order)
}
