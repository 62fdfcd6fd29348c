//! Binary catalog file layout.
//!
//! All integers are little-endian and the structures are packed:
//!
//! ```text
//! Header (84 bytes)
//!   magic        [u8; 4]  "MUSI"
//!   version      u32      1
//!   song_count   u32
//!   songs_offset u64      = HEADER_SIZE
//!   reserved     [u8; 64] zero
//! Record (1160 bytes), song_count times
//!   id           u32
//!   title        [u8; 256]  NUL padded
//!   artist       [u8; 128]
//!   filename     [u8; 256]
//!   url          [u8; 512]
//!   duration     u32
//! ```

use super::types::Song;
use crate::error::{CatalogError, Result};

pub const MAGIC: &[u8; 4] = b"MUSI";
pub const VERSION: u32 = 1;

const RESERVED_SIZE: usize = 64;
pub const HEADER_SIZE: usize = 4 + 4 + 4 + 8 + RESERVED_SIZE;

pub const TITLE_SLOT: usize = 256;
pub const ARTIST_SLOT: usize = 128;
pub const FILENAME_SLOT: usize = 256;
pub const URL_SLOT: usize = 512;
pub const RECORD_SIZE: usize = 4 + TITLE_SLOT + ARTIST_SLOT + FILENAME_SLOT + URL_SLOT + 4;

/// Parsed file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u32,
    pub song_count: u32,
    pub songs_offset: u64,
}

impl Header {
    pub fn new(song_count: u32) -> Self {
        Self {
            version: VERSION,
            song_count,
            songs_offset: HEADER_SIZE as u64,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(MAGIC);
        buf[4..8].copy_from_slice(&self.version.to_le_bytes());
        buf[8..12].copy_from_slice(&self.song_count.to_le_bytes());
        buf[12..20].copy_from_slice(&self.songs_offset.to_le_bytes());
        buf
    }

    /// Fails with `CorruptDatabase` on a short buffer or a wrong magic number.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(CatalogError::CorruptDatabase(format!(
                "header is {} bytes, expected {}",
                buf.len(),
                HEADER_SIZE
            )));
        }
        if &buf[0..4] != MAGIC {
            return Err(CatalogError::CorruptDatabase(
                "wrong magic number".to_string(),
            ));
        }

        Ok(Self {
            version: read_u32(&buf[4..8]),
            song_count: read_u32(&buf[8..12]),
            songs_offset: u64::from_le_bytes(fixed(&buf[12..20])),
        })
    }
}

/// Largest text each slot can hold; one byte is kept for the terminator.
pub fn max_len(slot: usize) -> usize {
    slot - 1
}

/// Appends the fixed-width encoding of `song` to `out`.
///
/// Text longer than its slot is an error; callers validate before this point.
pub fn encode_song(song: &Song, out: &mut Vec<u8>) -> Result<()> {
    out.extend_from_slice(&song.id.to_le_bytes());
    put_text(out, "title", &song.title, TITLE_SLOT)?;
    put_text(out, "artist", &song.artist, ARTIST_SLOT)?;
    put_text(out, "filename", &song.filename, FILENAME_SLOT)?;
    put_text(out, "url", &song.url, URL_SLOT)?;
    out.extend_from_slice(&song.duration.to_le_bytes());
    Ok(())
}

pub fn decode_song(buf: &[u8]) -> Result<Song> {
    if buf.len() < RECORD_SIZE {
        return Err(CatalogError::CorruptDatabase(format!(
            "record is {} bytes, expected {}",
            buf.len(),
            RECORD_SIZE
        )));
    }

    let (id, rest) = buf.split_at(4);
    let (title, rest) = rest.split_at(TITLE_SLOT);
    let (artist, rest) = rest.split_at(ARTIST_SLOT);
    let (filename, rest) = rest.split_at(FILENAME_SLOT);
    let (url, rest) = rest.split_at(URL_SLOT);

    let id = read_u32(id);
    let title = get_text(title);
    let artist = get_text(artist);
    let filename = get_text(filename);
    let url = get_text(url);
    let duration = read_u32(&rest[..4]);

    Ok(Song {
        id,
        title,
        artist,
        filename,
        url,
        duration,
    })
}

fn put_text(out: &mut Vec<u8>, field: &'static str, text: &str, slot: usize) -> Result<()> {
    let bytes = text.as_bytes();
    if bytes.len() > max_len(slot) {
        return Err(CatalogError::FieldTooLong {
            field,
            len: bytes.len(),
            max: max_len(slot),
        });
    }
    out.extend_from_slice(bytes);
    out.resize(out.len() + slot - bytes.len(), 0);
    Ok(())
}

fn get_text(slot: &[u8]) -> String {
    let end = slot.iter().position(|&b| b == 0).unwrap_or(slot.len());
    String::from_utf8_lossy(&slot[..end]).into_owned()
}

fn fixed<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes(fixed(bytes))
}
