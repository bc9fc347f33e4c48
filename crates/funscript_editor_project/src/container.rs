// SPDX-License-Identifier: MIT OR Apache-2.0
//! Binary project container.
//!
//! Layout: the magic bytes `OFSP`, a bincode `u32` format version, then a
//! bincode list of records. Each record is an opaque byte buffer holding a
//! sequence of bincode-encoded fields.
//!
//! Records grow by appending fields. A reader decodes the fields it knows in
//! order; when a record ends early the remaining fields take their defaults,
//! and bytes after the last known field are ignored. Unknown trailing records
//! are ignored the same way.

use crate::error::{ProjectError, Result};
use funscript_editor_timeline::{Action, Metadata};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// File extension of project containers, without the dot
pub const PROJECT_EXTENSION: &str = "ofsp";

/// Leading magic bytes
pub const CONTAINER_MAGIC: [u8; 4] = *b"OFSP";

/// Current container format version
pub const CONTAINER_VERSION: u32 = 1;

/// Player state saved with the project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSettings {
    /// Last playback position in milliseconds
    pub last_position_ms: f64,
    /// Playback speed multiplier
    pub playback_speed: f32,
    /// Volume in `0.0..=1.0`
    pub volume: f32,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            last_position_ms: 0.0,
            playback_speed: 1.0,
            volume: 0.5,
        }
    }
}

/// One script as stored in a project
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptRecord {
    /// Actions sorted by time
    pub actions: Vec<Action>,
    /// Path relative to the project file
    pub relative_path: String,
    /// Display title
    pub title: String,
    /// Enabled flag
    pub enabled: bool,
}

/// Decoded project container
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectContainer {
    /// Whether the project was complete when written
    pub valid: bool,
    /// Media path relative to the project file
    pub media_path: String,
    /// Shared metadata
    pub metadata: Metadata,
    /// Player state
    pub player: PlayerSettings,
    /// Scripts in project order
    pub scripts: Vec<ScriptRecord>,
}

impl Default for ProjectContainer {
    fn default() -> Self {
        Self {
            valid: true,
            media_path: String::new(),
            metadata: Metadata::default(),
            player: PlayerSettings::default(),
            scripts: Vec::new(),
        }
    }
}

#[derive(Default)]
struct RecordWriter {
    buf: Vec<u8>,
}

impl RecordWriter {
    fn field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<&mut Self> {
        bincode::serialize_into(&mut self.buf, value)?;
        Ok(self)
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }
}

struct RecordReader<'a> {
    rest: &'a [u8],
}

impl<'a> RecordReader<'a> {
    fn new(record: &'a [u8]) -> Self {
        Self { rest: record }
    }

    fn field<T: DeserializeOwned>(&mut self, default: T) -> Result<T> {
        if self.rest.is_empty() {
            return Ok(default);
        }
        Ok(bincode::deserialize_from(&mut self.rest)?)
    }
}

fn encode_metadata(metadata: &Metadata) -> Result<Vec<u8>> {
    let mut record = RecordWriter::default();
    record
        .field(&metadata.kind)?
        .field(&metadata.title)?
        .field(&metadata.creator)?
        .field(&metadata.script_url)?
        .field(&metadata.video_url)?
        .field(&metadata.tags)?
        .field(&metadata.performers)?
        .field(&metadata.description)?
        .field(&metadata.license)?
        .field(&metadata.notes)?
        .field(&metadata.duration)?;
    Ok(record.finish())
}

fn decode_metadata(record: &[u8]) -> Result<Metadata> {
    let mut reader = RecordReader::new(record);
    let defaults = Metadata::default();
    Ok(Metadata {
        kind: reader.field(defaults.kind)?,
        title: reader.field(defaults.title)?,
        creator: reader.field(defaults.creator)?,
        script_url: reader.field(defaults.script_url)?,
        video_url: reader.field(defaults.video_url)?,
        tags: reader.field(defaults.tags)?,
        performers: reader.field(defaults.performers)?,
        description: reader.field(defaults.description)?,
        license: reader.field(defaults.license)?,
        notes: reader.field(defaults.notes)?,
        duration: reader.field(defaults.duration)?,
    })
}

fn encode_script(script: &ScriptRecord) -> Result<Vec<u8>> {
    let mut record = RecordWriter::default();
    record
        .field(&script.actions)?
        .field(&script.relative_path)?
        .field(&script.title)?
        .field(&script.enabled)?;
    Ok(record.finish())
}

fn decode_script(record: &[u8]) -> Result<ScriptRecord> {
    let mut reader = RecordReader::new(record);
    let actions: Vec<Action> = reader.field(Vec::new())?;
    Ok(ScriptRecord {
        // Re-validate: the container is untrusted input
        actions: actions
            .into_iter()
            .filter_map(|a| Action::try_new(a.at(), i64::from(a.pos())))
            .collect(),
        relative_path: reader.field(String::new())?,
        title: reader.field(String::new())?,
        enabled: reader.field(true)?,
    })
}

impl ProjectContainer {
    /// Encode to bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut header = RecordWriter::default();
        header.field(&self.valid)?.field(&self.media_path)?;

        let mut player = RecordWriter::default();
        player
            .field(&self.player.last_position_ms)?
            .field(&self.player.playback_speed)?
            .field(&self.player.volume)?;

        let scripts = self
            .scripts
            .iter()
            .map(encode_script)
            .collect::<Result<Vec<_>>>()?;
        let mut script_list = RecordWriter::default();
        script_list.field(&scripts)?;

        let records = vec![
            header.finish(),
            encode_metadata(&self.metadata)?,
            player.finish(),
            script_list.finish(),
        ];

        let mut out = CONTAINER_MAGIC.to_vec();
        bincode::serialize_into(&mut out, &CONTAINER_VERSION)?;
        bincode::serialize_into(&mut out, &records)?;
        Ok(out)
    }

    /// Decode from bytes
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let Some(mut rest) = bytes.strip_prefix(&CONTAINER_MAGIC[..]) else {
            return Err(ProjectError::InvalidContainer("missing magic bytes".into()));
        };

        let version: u32 = bincode::deserialize_from(&mut rest)?;
        if version > CONTAINER_VERSION {
            return Err(ProjectError::VersionTooNew {
                found: version,
                supported: CONTAINER_VERSION,
            });
        }

        let records: Vec<Vec<u8>> = bincode::deserialize_from(&mut rest)?;
        let record = |idx: usize| records.get(idx).map_or(&[][..], Vec::as_slice);

        let mut header = RecordReader::new(record(0));
        let valid = header.field(false)?;
        let media_path = header.field(String::new())?;

        let metadata = decode_metadata(record(1))?;

        let mut reader = RecordReader::new(record(2));
        let defaults = PlayerSettings::default();
        let player = PlayerSettings {
            last_position_ms: reader.field(defaults.last_position_ms)?,
            playback_speed: reader.field(defaults.playback_speed)?,
            volume: reader.field(defaults.volume)?,
        };

        let script_records: Vec<Vec<u8>> = RecordReader::new(record(3)).field(Vec::new())?;
        let scripts = script_records
            .iter()
            .map(|r| decode_script(r.as_slice()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            valid,
            media_path,
            metadata,
            player,
            scripts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ProjectContainer {
        ProjectContainer {
            valid: true,
            media_path: "video.mp4".into(),
            metadata: Metadata::titled("scene"),
            player: PlayerSettings {
                last_position_ms: 1234.5,
                playback_speed: 1.5,
                volume: 0.8,
            },
            scripts: vec![
                ScriptRecord {
                    actions: vec![Action::new(0.0, 0), Action::new(500.0, 100)],
                    relative_path: "video.funscript".into(),
                    title: "video".into(),
                    enabled: true,
                },
                ScriptRecord {
                    actions: Vec::new(),
                    relative_path: "video.roll.funscript".into(),
                    title: "video.roll".into(),
                    enabled: false,
                },
            ],
        }
    }

    #[test]
    fn test_encode_decode() {
        let container = sample();
        let bytes = container.encode().unwrap();
        assert_eq!(&bytes[..4], b"OFSP");
        assert_eq!(ProjectContainer::decode(&bytes).unwrap(), container);
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = sample().encode().unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            ProjectContainer::decode(&bytes),
            Err(ProjectError::InvalidContainer(_))
        ));
    }

    #[test]
    fn test_newer_version_rejected() {
        let mut bytes = CONTAINER_MAGIC.to_vec();
        bincode::serialize_into(&mut bytes, &(CONTAINER_VERSION + 1)).unwrap();
        bincode::serialize_into(&mut bytes, &Vec::<Vec<u8>>::new()).unwrap();
        assert!(matches!(
            ProjectContainer::decode(&bytes),
            Err(ProjectError::VersionTooNew { .. })
        ));
    }

    #[test]
    fn test_truncated_is_error() {
        let bytes = sample().encode().unwrap();
        assert!(ProjectContainer::decode(&bytes[..bytes.len() / 2]).is_err());
    }

    #[test]
    fn test_older_writer_fields_default() {
        // Header without media path, no metadata/player records, one script without an enabled flag
        let mut header = RecordWriter::default();
        header.field(&true).unwrap();
        let mut script = RecordWriter::default();
        script
            .field(&vec![Action::new(10.0, 20)])
            .unwrap()
            .field("a.funscript")
            .unwrap();
        let mut scripts = RecordWriter::default();
        scripts.field(&vec![script.finish()]).unwrap();

        let records = vec![header.finish(), Vec::new(), Vec::new(), scripts.finish()];
        let mut bytes = CONTAINER_MAGIC.to_vec();
        bincode::serialize_into(&mut bytes, &CONTAINER_VERSION).unwrap();
        bincode::serialize_into(&mut bytes, &records).unwrap();

        let decoded = ProjectContainer::decode(&bytes).unwrap();
        assert!(decoded.valid);
        assert_eq!(decoded.media_path, "");
        assert_eq!(decoded.metadata, Metadata::default());
        assert_eq!(decoded.player, PlayerSettings::default());
        assert_eq!(decoded.scripts[0].relative_path, "a.funscript");
        assert!(decoded.scripts[0].enabled);
    }

    #[test]
    fn test_newer_writer_extras_ignored() {
        let container = sample();
        let mut header = RecordWriter::default();
        header
            .field(&true)
            .unwrap()
            .field("video.mp4")
            .unwrap()
            .field(&42u64)
            .unwrap();

        let bytes = container.encode().unwrap();
        let mut rest = &bytes[4..];
        let _version: u32 = bincode::deserialize_from(&mut rest).unwrap();
        let mut records: Vec<Vec<u8>> = bincode::deserialize_from(&mut rest).unwrap();
        records[0] = header.finish();
        records.push(vec![1, 2, 3]);

        let mut extended = CONTAINER_MAGIC.to_vec();
        bincode::serialize_into(&mut extended, &CONTAINER_VERSION).unwrap();
        bincode::serialize_into(&mut extended, &records).unwrap();

        assert_eq!(ProjectContainer::decode(&extended).unwrap(), container);
    }
}
