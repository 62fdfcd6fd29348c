//! Song Store
//!
//! The authoritative, append-only song collection together with the word
//! indices built over it. Songs are never removed or modified; ids are
//! assigned sequentially starting at 1.
//!
//! ## Persistence
//! Only the songs are written to disk (`storage::codec` layout). The indices
//! are rebuilt from titles and artists on every load, so they cannot drift
//! from the data regardless of how the previous process stopped.

use super::codec::{
    self, ARTIST_SLOT, FILENAME_SLOT, HEADER_SIZE, Header, RECORD_SIZE, TITLE_SLOT, URL_SLOT,
    VERSION,
};
use super::types::{Song, SongFields};
use crate::error::{CatalogError, Result};
use crate::search::engine::SearchIndex;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub struct SongStore {
    songs: Vec<Song>,
    next_id: u32,
    index: SearchIndex,
}

impl Default for SongStore {
    fn default() -> Self {
        Self {
            songs: Vec::new(),
            next_id: 1,
            index: SearchIndex::new(),
        }
    }
}

impl SongStore {
    /// Creates an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from already-identified songs and indexes all of them.
    ///
    /// `next_id` continues after the highest id present. A song holding the
    /// largest representable id leaves no id to continue with and is rejected.
    pub fn from_songs(songs: Vec<Song>) -> Result<Self> {
        let next_id = match songs.iter().map(|song| song.id).max() {
            Some(max) => max.checked_add(1).ok_or_else(|| {
                CatalogError::CorruptDatabase(format!("song id {} leaves no id to assign", max))
            })?,
            None => 1,
        };
        let mut store = Self {
            songs,
            next_id,
            index: SearchIndex::new(),
        };

        let mut word_count = 0;
        for song in &store.songs {
            word_count += store.index.insert_text(&song.title, song.id);
            word_count += store.index.insert_text(&song.artist, song.id);
        }
        tracing::info!(
            "Rebuilt indices for {} song(s): {} word occurrence(s), {} distinct word(s)",
            store.songs.len(),
            word_count,
            store.index.exact().len()
        );
        Ok(store)
    }

    /// Validates, stores and indexes a new song. Returns its id.
    pub fn add_song(&mut self, fields: SongFields) -> Result<u32> {
        let artist = fields.artist_or_default();
        validate(&fields, &artist)?;

        if self.is_duplicate_url(&fields.url) {
            return Err(CatalogError::DuplicateUrl);
        }

        self.songs
            .try_reserve(1)
            .map_err(|_| CatalogError::CapacityExhausted)?;

        let id = self.next_id;
        let next_id = id.checked_add(1).ok_or(CatalogError::CapacityExhausted)?;

        let song = Song {
            id,
            title: fields.title,
            artist,
            filename: fields.filename,
            url: fields.url,
            duration: fields.duration,
        };

        let words = self.index.insert_text(&song.title, id) + self.index.insert_text(&song.artist, id);
        tracing::info!(
            "Added song [{}] {} - {} ({} word(s) indexed)",
            id,
            song.title,
            song.artist,
            words
        );

        self.songs.push(song);
        self.next_id = next_id;
        Ok(id)
    }

    /// Linear scan; the catalog is expected to stay in the low thousands.
    pub fn is_duplicate_url(&self, url: &str) -> bool {
        self.songs.iter().any(|song| song.url == url)
    }

    pub fn get_by_id(&self, id: u32) -> Option<&Song> {
        self.songs.iter().find(|song| song.id == id)
    }

    /// Byte offset of the song's record in the persisted file.
    pub fn get_offset(&self, id: u32) -> Option<u64> {
        self.songs
            .iter()
            .position(|song| song.id == id)
            .map(|position| (HEADER_SIZE + position * RECORD_SIZE) as u64)
    }

    /// Songs matching `query`, ordered by id.
    pub fn search(&self, query: &str) -> Vec<&Song> {
        self.index
            .search(query)
            .into_iter()
            .filter_map(|id| self.get_by_id(id))
            .collect()
    }

    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Writes header and songs to `path` through a temporary sibling file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let count = u32::try_from(self.songs.len()).map_err(|_| CatalogError::CapacityExhausted)?;

        let mut buf = Vec::with_capacity(HEADER_SIZE + self.songs.len() * RECORD_SIZE);
        buf.extend_from_slice(&Header::new(count).encode());
        for song in &self.songs {
            codec::encode_song(song, &mut buf)?;
        }

        let tmp = tmp_path(path);
        fs::write(&tmp, &buf)?;
        fs::rename(&tmp, path)?;

        tracing::debug!("Saved {} song(s) to {}", count, path.display());
        Ok(())
    }

    /// Loads the store from `path`, creating it when missing.
    ///
    /// A file with a short header or the wrong magic number is deleted and
    /// replaced by an empty store. A readable header with a truncated body is
    /// an error.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::info!("No database at {}, creating an empty one", path.display());
                return Self::create_empty(path);
            }
            Err(err) => return Err(err.into()),
        };

        let header = match Header::decode(&bytes) {
            Ok(header) => header,
            Err(err) => {
                tracing::error!(
                    "Discarding database {}: {}. Starting with an empty catalog",
                    path.display(),
                    err
                );
                fs::remove_file(path)?;
                return Self::create_empty(path);
            }
        };

        if header.version != VERSION {
            return Err(CatalogError::UnsupportedVersion(header.version));
        }

        let count = header.song_count as usize;
        let start = usize::try_from(header.songs_offset)
            .map_err(|_| CatalogError::CorruptDatabase("songs offset out of range".to_string()))?;
        let end = count
            .checked_mul(RECORD_SIZE)
            .and_then(|body| body.checked_add(start))
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| {
                CatalogError::CorruptDatabase(format!(
                    "expected {} song record(s) at offset {}, file has {} bytes",
                    count,
                    start,
                    bytes.len()
                ))
            })?;

        let songs = bytes[start..end]
            .chunks_exact(RECORD_SIZE)
            .map(codec::decode_song)
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(
            "Loaded {} song(s) from {} (version {})",
            songs.len(),
            path.display(),
            header.version
        );
        Self::from_songs(songs)
    }

    fn create_empty(path: &Path) -> Result<Self> {
        let store = Self::new();
        store.save(path)?;
        Ok(store)
    }
}

fn validate(fields: &SongFields, artist: &str) -> Result<()> {
    if fields.title.trim().is_empty() {
        return Err(CatalogError::MissingTitle);
    }
    if fields.filename.trim().is_empty() {
        return Err(CatalogError::MissingFilename);
    }

    let bounded = [
        ("title", fields.title.as_str(), TITLE_SLOT),
        ("artist", artist, ARTIST_SLOT),
        ("filename", fields.filename.as_str(), FILENAME_SLOT),
        ("url", fields.url.as_str(), URL_SLOT),
    ];
    for (field, value, slot) in bounded {
        let max = codec::max_len(slot);
        if value.len() > max {
            return Err(CatalogError::FieldTooLong {
                field,
                len: value.len(),
                max,
            });
        }
    }
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}
