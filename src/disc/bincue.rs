//! Cue sheet parsing
//!
//! Reads CDRWIN-style `.cue` sheets to find the files they reference and the
//! data image a BIN/CUE pair should be read from. Keyword matching is
//! case-insensitive and both quoted and unquoted file names are accepted.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use cue_sheet::parser::{parse_cue, Command, TrackType};
use regex::Regex;
use thiserror::Error;

use super::formats::LayoutKind;

/// Errors specific to cue sheet reading
#[derive(Error, Debug)]
pub enum CueError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid cue sheet at line {line}: {reason}")]
    Syntax { line: usize, reason: String },

    #[error("{} is not a cue sheet (line {line})", .path.display())]
    NotACueSheet { path: PathBuf, line: usize },

    #[error("No data track found in {}", .0.display())]
    NoDataTrack(PathBuf),
}

pub type CueResult<T> = Result<T, CueError>;

/// Keywords of the CDRWIN cue format, including CD-TEXT fields
const KEYWORDS: &[&str] = &[
    "ARRANGER",
    "CATALOG",
    "CDTEXTFILE",
    "COMPOSER",
    "DISC_ID",
    "FILE",
    "FLAGS",
    "GENRE",
    "INDEX",
    "ISRC",
    "MESSAGE",
    "PERFORMER",
    "POSTGAP",
    "PREGAP",
    "REM",
    "SIZE_INFO",
    "SONGWRITER",
    "TITLE",
    "TOC_INFO1",
    "TOC_INFO2",
    "TRACK",
    "UPC_EAN",
];

static FILE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^FILE\s+(?:"([^"]*)"|(.+?))\s+([A-Z0-9]+)$"#).unwrap()
});

static TRACK_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^TRACK\s+\d+\s+\S+$").unwrap()
});

/// A `FILE` entry of a cue sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueFile {
    /// Path exactly as written in the sheet
    pub path: String,
    /// File type keyword, uppercased (BINARY, MOTOROLA, WAVE, ...)
    pub file_type: String,
}

impl CueFile {
    pub fn is_binary(&self) -> bool {
        self.file_type == "BINARY"
    }
}

/// Track mode declared by a `TRACK` entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackMode {
    Audio,
    Cdg,
    /// MODE1/MODE2 with the stored sector size
    Data { mode: u8, sector_size: u32 },
    /// CD-i with the stored sector size
    Cdi { sector_size: u32 },
}

impl TrackMode {
    pub fn is_data(&self) -> bool {
        matches!(self, Self::Data { .. } | Self::Cdi { .. })
    }

    /// Sector layout a data track of this mode is stored in, if known
    pub fn layout(&self) -> Option<LayoutKind> {
        match *self {
            Self::Data { mode: 1, sector_size: 2048 } => Some(LayoutKind::Mode1Unpadded),
            Self::Data { mode: 1, sector_size: 2352 } => Some(LayoutKind::Mode1),
            Self::Data { mode: 2, sector_size: 2048 } => Some(LayoutKind::Mode1Unpadded),
            Self::Data { mode: 2, sector_size: 2336 } => Some(LayoutKind::Mode2Cooked),
            Self::Data { mode: 2, sector_size: 2352 } => Some(LayoutKind::XaMode2Form1),
            Self::Cdi { sector_size: 2336 } => Some(LayoutKind::Mode2Cooked),
            Self::Cdi { sector_size: 2352 } => Some(LayoutKind::XaMode2Form1),
            _ => None,
        }
    }
}

impl From<&TrackType> for TrackMode {
    fn from(track_type: &TrackType) -> Self {
        match track_type {
            TrackType::Audio => Self::Audio,
            TrackType::Cdg => Self::Cdg,
            TrackType::Mode(mode, size) => Self::Data {
                mode: *mode as u8,
                sector_size: *size as u32,
            },
            TrackType::Cdi(size) => Self::Cdi {
                sector_size: *size as u32,
            },
        }
    }
}

/// A `TRACK` entry of a cue sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueTrack {
    pub number: u32,
    pub mode: TrackMode,
    /// Index into [`CueSheet::files`] of the file the track is stored in
    pub file_index: Option<usize>,
}

/// Parsed contents of a cue sheet
#[derive(Debug, Clone, Default)]
pub struct CueSheet {
    pub files: Vec<CueFile>,
    pub tracks: Vec<CueTrack>,
}

impl CueSheet {
    /// The first file of type BINARY
    pub fn first_binary(&self) -> Option<&CueFile> {
        self.files.iter().find(|file| file.is_binary())
    }

    /// Layout of the first data track stored in the first BINARY file
    pub fn data_track_layout(&self) -> Option<LayoutKind> {
        let binary_index = self.files.iter().position(|file| file.is_binary())?;
        self.tracks
            .iter()
            .filter(|track| track.file_index == Some(binary_index))
            .find(|track| track.mode.is_data())
            .and_then(|track| track.mode.layout())
    }
}

/// Parse the text of a cue sheet.
///
/// Blank lines are ignored. Any line that does not start with a cue keyword,
/// or a malformed `FILE` or `TRACK` line, rejects the whole sheet.
pub fn parse_cue_sheet(contents: &str) -> CueResult<CueSheet> {
    let contents = contents.trim_start_matches('\u{feff}');
    let mut sheet = CueSheet::default();

    for (index, line) in contents.lines().enumerate() {
        let line_no = index + 1;
        let syntax = |reason: String| CueError::Syntax {
            line: line_no,
            reason,
        };

        if line.contains('\0') {
            return Err(syntax("binary data".to_string()));
        }
        let trimmed = line.trim();
        let Some(keyword) = trimmed.split_whitespace().next() else {
            continue;
        };

        let keyword = keyword.to_ascii_uppercase();
        if !KEYWORDS.contains(&keyword.as_str()) {
            return Err(syntax(format!("unknown keyword {}", keyword)));
        }

        match keyword.as_str() {
            "FILE" => {
                let caps = FILE_LINE
                    .captures(trimmed)
                    .ok_or_else(|| syntax("malformed FILE line".to_string()))?;
                let path = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                let file_type = caps
                    .get(3)
                    .map(|m| m.as_str().to_ascii_uppercase())
                    .unwrap_or_default();
                sheet.files.push(CueFile { path, file_type });
            }
            "TRACK" if !TRACK_LINE.is_match(trimmed) => {
                return Err(syntax("malformed TRACK line".to_string()));
            }
            _ => {}
        }
    }

    sheet.tracks = parse_tracks(contents);
    log::debug!(
        "Parsed cue sheet: {} files, {} tracks",
        sheet.files.len(),
        sheet.tracks.len()
    );
    Ok(sheet)
}

/// Read track modes with the cue_sheet parser. Track modes only serve as a
/// layout hint, so a sheet it cannot handle just yields no tracks.
fn parse_tracks(contents: &str) -> Vec<CueTrack> {
    let normalized = normalize_cue_keywords(contents);
    let commands = match parse_cue(&normalized) {
        Ok(commands) => commands,
        Err(e) => {
            log::warn!("Could not read track modes from cue sheet: {:?}", e);
            return Vec::new();
        }
    };

    let mut tracks = Vec::new();
    let mut file_index: Option<usize> = None;
    for cmd in &commands {
        match cmd {
            Command::File(_filename, _format) => {
                file_index = Some(file_index.map_or(0, |i| i + 1));
            }
            Command::Track(track_no, track_type) => {
                let mode = TrackMode::from(track_type);
                log::debug!("Track {}: {:?}", track_no, mode);
                tracks.push(CueTrack {
                    number: *track_no,
                    mode,
                    file_index,
                });
            }
            _ => {}
        }
    }
    tracks
}

/// Normalize cue keywords into the form the cue_sheet parser accepts
fn normalize_cue_keywords(content: &str) -> String {
    let mut result = String::new();

    for line in content.lines() {
        let trimmed = line.trim();
        let keyword = trimmed
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();

        // The parser rejects catalog numbers, CD-TEXT it does not know and
        // REM lines with more than one value
        if matches!(keyword.as_str(), "CATALOG" | "CDTEXTFILE" | "ARRANGER" | "COMPOSER"
            | "DISC_ID" | "GENRE" | "MESSAGE" | "TOC_INFO1" | "TOC_INFO2" | "UPC_EAN" | "SIZE_INFO"
            | "REM")
        {
            continue;
        }

        if keyword == "FILE" {
            if let Some(caps) = FILE_LINE.captures(trimmed) {
                let filename = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
                let format = caps.get(3).map_or("", |m| m.as_str());
                result.push_str(&format!("FILE \"{}\" {}\n", filename, cue_sheet_file_format(format)));
                continue;
            }
        }

        if keyword == "TRACK" {
            result.push_str(&trimmed.to_ascii_uppercase());
            result.push('\n');
            continue;
        }

        result.push_str(trimmed);
        result.push('\n');
    }

    result
}

/// File type spelled the way the cue_sheet parser expects
fn cue_sheet_file_format(format: &str) -> String {
    match format.to_ascii_uppercase().as_str() {
        "BINARY" => "Binary".to_string(),
        "MOTOROLA" => "Motorola".to_string(),
        other => other.to_string(),
    }
}

/// File paths referenced by cue sheet text, exactly as written
pub fn raw_paths_in_cue_contents(contents: &str) -> CueResult<Vec<String>> {
    Ok(parse_cue_sheet(contents)?
        .files
        .into_iter()
        .map(|file| file.path)
        .collect())
}

/// Read and parse the cue sheet at `path`
pub fn read_cue_sheet(path: &Path) -> CueResult<CueSheet> {
    let bytes = fs::read(path)?;

    // Cue sheets are often Latin-1; only the ASCII keywords matter here
    let contents = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            log::debug!("{} is not valid UTF-8, using lossy conversion", path.display());
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    };

    parse_cue_sheet(&contents).map_err(|e| match e {
        CueError::Syntax { line, reason } => {
            log::debug!("{}: {} at line {}", path.display(), reason, line);
            CueError::NotACueSheet {
                path: path.to_path_buf(),
                line,
            }
        }
        other => other,
    })
}

/// File paths referenced by the cue sheet at `path`, exactly as written
pub fn raw_paths_in_cue(path: &Path) -> CueResult<Vec<String>> {
    Ok(read_cue_sheet(path)?
        .files
        .into_iter()
        .map(|file| file.path)
        .collect())
}

/// File paths referenced by the cue sheet at `path`, resolved against the
/// directory containing the cue sheet
pub fn resource_paths_in_cue(path: &Path) -> CueResult<Vec<PathBuf>> {
    let sheet = read_cue_sheet(path)?;
    let base_dir = cue_directory(path)?;
    Ok(sheet
        .files
        .iter()
        .map(|file| resolve_cue_entry(&base_dir, &file.path))
        .collect())
}

/// Location of the data image of the cue sheet at `path`: its first BINARY
/// file.
///
/// When that file does not exist under its exact name, files with the same
/// stem and a `.bin`/`.img` extension are tried, then the cue sheet's own
/// stem. If none exist the unresolved location is returned and opening it
/// reports the error.
pub fn bin_path_in_cue(path: &Path) -> CueResult<PathBuf> {
    let sheet = read_cue_sheet(path)?;
    bin_path_for_sheet(path, &sheet)
}

pub(crate) fn bin_path_for_sheet(path: &Path, sheet: &CueSheet) -> CueResult<PathBuf> {
    let binary = sheet
        .first_binary()
        .ok_or_else(|| CueError::NoDataTrack(path.to_path_buf()))?;

    let base_dir = cue_directory(path)?;
    let resolved = resolve_cue_entry(&base_dir, &binary.path);
    if resolved.exists() {
        return Ok(resolved);
    }

    match find_bin_fallback(&base_dir, &binary.path, path) {
        Some(found) => {
            log::info!(
                "{} not found, using {}",
                resolved.display(),
                found.display()
            );
            Ok(found)
        }
        None => Ok(resolved),
    }
}

/// Whether the file at `path` parses as a cue sheet. A sheet without `FILE`
/// entries still counts. Only I/O failures are errors.
pub fn is_cue(path: &Path) -> io::Result<bool> {
    match read_cue_sheet(path) {
        Ok(_) => Ok(true),
        Err(CueError::Io(e)) => Err(e),
        Err(_) => Ok(false),
    }
}

/// Directory of the cue sheet, independent of the working directory
fn cue_directory(path: &Path) -> io::Result<PathBuf> {
    let canonical = fs::canonicalize(path)?;
    Ok(canonical
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/")))
}

/// Resolve a path written in a cue sheet against the cue's directory.
/// DOS-style separators are accepted; absolute paths are kept.
fn resolve_cue_entry(base_dir: &Path, raw: &str) -> PathBuf {
    let entry = PathBuf::from(raw.replace('\\', "/"));
    if entry.is_absolute() {
        entry
    } else {
        base_dir.join(entry)
    }
}

/// Look for the BIN file under alternative names
fn find_bin_fallback(base_dir: &Path, bin_filename: &str, cue_path: &Path) -> Option<PathBuf> {
    let referenced = PathBuf::from(bin_filename.replace('\\', "/"));

    // Just the file name, in case the cue refers to another machine's path
    if let Some(filename) = referenced.file_name() {
        let bin_path = base_dir.join(filename);
        if bin_path.exists() {
            return Some(bin_path);
        }
    }

    let stems = [referenced.file_stem(), cue_path.file_stem()];
    for stem in stems.into_iter().flatten() {
        for ext in &["bin", "BIN", "img", "IMG"] {
            let try_path = base_dir.join(format!("{}.{}", stem.to_string_lossy(), ext));
            if try_path.exists() {
                return Some(try_path);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const GAME_CUE: &str = "FILE \"game.bin\" BINARY\r\n  TRACK 01 MODE1/2352\r\n    INDEX 01 00:00:00\r\n  TRACK 02 AUDIO\r\n    PREGAP 00:02:00\r\n    INDEX 01 12:34:56\r\n";

    fn write(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_parse_file_entries() {
        let sheet = parse_cue_sheet(GAME_CUE).unwrap();
        assert_eq!(sheet.files.len(), 1);
        assert_eq!(sheet.files[0].path, "game.bin");
        assert!(sheet.files[0].is_binary());
    }

    #[test]
    fn test_unquoted_and_lowercase_entries() {
        let cue = "file Track 01.bin binary\nTRACK 01 MODE1/2352\nfile track02.wav wave\n";
        let paths = raw_paths_in_cue_contents(cue).unwrap();
        assert_eq!(paths, vec!["Track 01.bin", "track02.wav"]);

        let sheet = parse_cue_sheet(cue).unwrap();
        assert_eq!(sheet.files[1].file_type, "WAVE");
        assert!(!sheet.files[1].is_binary());
    }

    #[test]
    fn test_degenerate_cue_has_no_files() {
        let sheet = parse_cue_sheet("REM generated by hand\n\nTITLE \"Nothing\"\n").unwrap();
        assert!(sheet.files.is_empty());
        assert!(sheet.first_binary().is_none());
    }

    #[test]
    fn test_rejects_non_cue_text() {
        let err = parse_cue_sheet("FILE \"a.bin\" BINARY\nhello there\n").unwrap_err();
        assert!(matches!(err, CueError::Syntax { line: 2, .. }));

        let err = parse_cue_sheet("FILE\n").unwrap_err();
        assert!(matches!(err, CueError::Syntax { line: 1, .. }));

        let err = parse_cue_sheet("CD001\0\0\0").unwrap_err();
        assert!(matches!(err, CueError::Syntax { line: 1, .. }));
    }

    #[test]
    fn test_track_mode_layouts() {
        let mode = |mode, sector_size| TrackMode::Data { mode, sector_size };
        assert_eq!(mode(1, 2048).layout(), Some(LayoutKind::Mode1Unpadded));
        assert_eq!(mode(1, 2352).layout(), Some(LayoutKind::Mode1));
        assert_eq!(mode(2, 2336).layout(), Some(LayoutKind::Mode2Cooked));
        assert_eq!(mode(2, 2352).layout(), Some(LayoutKind::XaMode2Form1));
        assert_eq!(TrackMode::Cdi { sector_size: 2352 }.layout(), Some(LayoutKind::XaMode2Form1));
        assert_eq!(TrackMode::Audio.layout(), None);
        assert!(!TrackMode::Audio.is_data());
        assert!(TrackMode::Cdi { sector_size: 2336 }.is_data());
    }

    #[test]
    fn test_track_mode_from_cue_track_type() {
        assert_eq!(
            TrackMode::from(&TrackType::Mode(1, 2352)),
            TrackMode::Data { mode: 1, sector_size: 2352 }
        );
        assert_eq!(TrackMode::from(&TrackType::Audio), TrackMode::Audio);
    }

    #[test]
    fn test_data_track_layout_follows_binary_file() {
        let sheet = CueSheet {
            files: vec![
                CueFile { path: "intro.wav".into(), file_type: "WAVE".into() },
                CueFile { path: "game.bin".into(), file_type: "BINARY".into() },
            ],
            tracks: vec![
                CueTrack { number: 1, mode: TrackMode::Audio, file_index: Some(0) },
                CueTrack {
                    number: 2,
                    mode: TrackMode::Data { mode: 2, sector_size: 2352 },
                    file_index: Some(1),
                },
            ],
        };
        assert_eq!(sheet.first_binary().unwrap().path, "game.bin");
        assert_eq!(sheet.data_track_layout(), Some(LayoutKind::XaMode2Form1));
    }

    #[test]
    fn test_resource_paths_relative_to_cue_directory() {
        let dir = TempDir::new().unwrap();
        let cue = write(dir.path(), "game.cue", GAME_CUE.as_bytes());

        let paths = resource_paths_in_cue(&cue).unwrap();
        let expected = fs::canonicalize(dir.path()).unwrap().join("game.bin");
        assert_eq!(paths, vec![expected]);
        assert!(paths[0].is_absolute());
    }

    #[test]
    fn test_absolute_and_dos_paths() {
        let dir = TempDir::new().unwrap();
        let cue = write(
            dir.path(),
            "multi.cue",
            b"FILE \"/srv/images/data.bin\" BINARY\nFILE \"audio\\track2.wav\" WAVE\n",
        );

        let paths = resource_paths_in_cue(&cue).unwrap();
        let base = fs::canonicalize(dir.path()).unwrap();
        assert_eq!(paths[0], PathBuf::from("/srv/images/data.bin"));
        assert_eq!(paths[1], base.join("audio").join("track2.wav"));

        let raw = raw_paths_in_cue(&cue).unwrap();
        assert_eq!(raw[1], "audio\\track2.wav");
    }

    #[test]
    fn test_bin_path_in_cue() {
        let dir = TempDir::new().unwrap();
        let cue = write(dir.path(), "game.cue", GAME_CUE.as_bytes());
        write(dir.path(), "game.bin", b"data");

        let bin = bin_path_in_cue(&cue).unwrap();
        assert_eq!(bin, fs::canonicalize(dir.path()).unwrap().join("game.bin"));
    }

    #[test]
    fn test_bin_path_falls_back_to_cue_stem() {
        let dir = TempDir::new().unwrap();
        let cue = write(dir.path(), "Quest.cue", b"FILE \"renamed.bin\" BINARY\nTRACK 01 MODE1/2352\n");
        write(dir.path(), "Quest.img", b"data");

        let bin = bin_path_in_cue(&cue).unwrap();
        assert_eq!(bin.file_name().unwrap(), "Quest.img");
    }

    #[test]
    fn test_no_binary_file_is_no_data_track() {
        let dir = TempDir::new().unwrap();
        let cue = write(dir.path(), "audio.cue", b"FILE \"track.wav\" WAVE\nTRACK 01 AUDIO\n");

        assert!(matches!(bin_path_in_cue(&cue), Err(CueError::NoDataTrack(_))));
    }

    #[test]
    fn test_is_cue() {
        let dir = TempDir::new().unwrap();
        let cue = write(dir.path(), "game.cue", GAME_CUE.as_bytes());
        let bin = write(dir.path(), "game.bin", &[0u8, 1, 2, 3, 0xFF]);

        assert!(is_cue(&cue).unwrap());
        assert!(!is_cue(&bin).unwrap());
        assert!(is_cue(&dir.path().join("missing.cue")).is_err());
    }

    #[test]
    fn test_is_cue_accepts_sheet_without_files() {
        let dir = TempDir::new().unwrap();
        let cue = write(dir.path(), "empty.cue", b"REM generated by hand\nTITLE \"Nothing\"\n");
        assert!(is_cue(&cue).unwrap());
        assert!(matches!(bin_path_in_cue(&cue), Err(CueError::NoDataTrack(_))));
    }

    #[test]
    fn test_track_mode_with_spaced_file_name() {
        let sheet = parse_cue_sheet(
            "REM GENRE Action Adventure\r\nFILE \"My Game (Track 1).bin\" BINARY\r\n  TRACK 01 MODE1/2352\r\n    INDEX 01 00:00:00\r\n",
        )
        .unwrap();
        assert_eq!(sheet.files[0].path, "My Game (Track 1).bin");
        assert_eq!(sheet.tracks.len(), 1);
        assert_eq!(sheet.data_track_layout(), Some(LayoutKind::Mode1));
    }

    #[test]
    fn test_track_modes_with_audio_files() {
        let sheet = parse_cue_sheet(
            "FILE \"Game (Track 1).bin\" BINARY\n  TRACK 01 MODE1/2352\n    INDEX 01 00:00:00\nFILE \"Game (Track 2).wav\" WAVE\n  TRACK 02 AUDIO\n    INDEX 01 00:00:00\n",
        )
        .unwrap();
        assert_eq!(sheet.tracks.len(), 2);
        assert_eq!(sheet.tracks[1].mode, TrackMode::Audio);
        assert_eq!(sheet.tracks[1].file_index, Some(1));
        assert_eq!(sheet.data_track_layout(), Some(LayoutKind::Mode1));
    }

    #[test]
    fn test_unreadable_cue_is_not_a_cue_sheet() {
        let dir = TempDir::new().unwrap();
        let bogus = write(dir.path(), "notes.cue", b"These are my notes\n");

        match raw_paths_in_cue(&bogus) {
            Err(CueError::NotACueSheet { path, line }) => {
                assert_eq!(path, bogus);
                assert_eq!(line, 1);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
