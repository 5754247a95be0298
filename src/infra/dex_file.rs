use crate::domain::Record;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEX_FILE_NAME: &str = "pokedex_gen1.json";

#[derive(Debug, Error)]
pub enum ResolveStateDirError {
    #[error("home directory not found")]
    HomeDirNotFound,
}

pub fn resolve_dexlink_state_dir() -> Result<PathBuf, ResolveStateDirError> {
    let Some(home) = dirs::home_dir() else {
        return Err(ResolveStateDirError::HomeDirNotFound);
    };
    Ok(home.join(".dexlink"))
}

/// Flag, then `DEXLINK_DATA`, then `./data/`, then the state dir.
pub fn resolve_dex_path(flag: Option<&Path>) -> Result<PathBuf, ResolveStateDirError> {
    if let Some(path) = flag {
        return Ok(path.to_path_buf());
    }
    if let Some(override_path) = std::env::var_os("DEXLINK_DATA") {
        return Ok(PathBuf::from(override_path));
    }

    let local = default_fetch_output();
    if local.is_file() {
        return Ok(local);
    }

    Ok(resolve_dexlink_state_dir()?.join(DEX_FILE_NAME))
}

pub fn default_fetch_output() -> PathBuf {
    PathBuf::from("data").join(DEX_FILE_NAME)
}

#[derive(Debug, Error)]
pub enum LoadDexError {
    #[error("failed to read {path}: {source}")]
    Read { path: String, source: io::Error },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("{path} has no entries")]
    Empty { path: String },

    #[error("{path}: entry #{position} is invalid: {reason}")]
    InvalidRecord {
        path: String,
        position: usize,
        reason: String,
    },
}

pub fn load_dex(path: &Path) -> Result<Vec<Record>, LoadDexError> {
    let display = path.display().to_string();
    let raw = fs::read_to_string(path).map_err(|source| LoadDexError::Read {
        path: display.clone(),
        source,
    })?;
    parse_dex(&raw, &display)
}

fn parse_dex(raw: &str, path: &str) -> Result<Vec<Record>, LoadDexError> {
    let records: Vec<Record> = serde_json::from_str(raw).map_err(|source| LoadDexError::Parse {
        path: path.to_string(),
        source,
    })?;
    if records.is_empty() {
        return Err(LoadDexError::Empty {
            path: path.to_string(),
        });
    }

    for (position, record) in records.iter().enumerate() {
        if let Some(reason) = record_problem(record, position + 1) {
            return Err(LoadDexError::InvalidRecord {
                path: path.to_string(),
                position: position + 1,
                reason,
            });
        }
    }
    Ok(records)
}

fn record_problem(record: &Record, position: usize) -> Option<String> {
    if usize::try_from(record.id).ok() != Some(position) {
        return Some(format!("id {} out of sequence, expected {position}", record.id));
    }
    if record.name.trim().is_empty() {
        return Some("name is empty".to_string());
    }
    if record.types.is_empty() {
        return Some("types is empty".to_string());
    }
    let negative = |value: f64| value.is_nan() || value < 0.0;
    if negative(record.height_m) || negative(record.weight_kg) {
        return Some("height and weight must be non-negative".to_string());
    }
    None
}

#[derive(Debug, Error)]
pub enum SaveDexError {
    #[error("failed to encode dex: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to write dex: {0}")]
    Write(#[from] io::Error),
}

pub fn save_dex(path: &Path, records: &[Record]) -> Result<(), SaveDexError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    let text = serde_json::to_string_pretty(records)?;
    fs::write(&tmp, text)?;
    fs::rename(tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(id: u32, name: &str) -> Record {
        Record {
            id,
            name: name.to_string(),
            types: vec!["grass".to_string()],
            height_m: 0.7,
            weight_kg: 6.9,
            description: "A strange seed.".to_string(),
            sprite: format!("https://example.invalid/{id}.png"),
            cry: format!("https://example.invalid/{id}.ogg"),
        }
    }

    #[test]
    fn save_then_load_preserves_order() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested").join(DEX_FILE_NAME);
        let records = vec![record(1, "Bulbasaur"), record(2, "Ivysaur")];

        save_dex(&path, &records).expect("save");
        let loaded = load_dex(&path).expect("load");

        assert_eq!(loaded, records);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempdir().expect("tempdir");
        let error = load_dex(&dir.path().join("absent.json")).expect_err("missing");
        assert!(matches!(error, LoadDexError::Read { .. }));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let error = parse_dex("{not json", "dex.json").expect_err("malformed");
        assert!(matches!(error, LoadDexError::Parse { .. }));
    }

    #[test]
    fn empty_list_is_rejected() {
        let error = parse_dex("[]", "dex.json").expect_err("empty");
        assert!(matches!(error, LoadDexError::Empty { .. }));
    }

    #[test]
    fn record_without_types_is_rejected() {
        let raw = r#"[{"id":1,"name":"Bulbasaur","types":[],"height_m":0.7,"weight_kg":6.9}]"#;
        let error = parse_dex(raw, "dex.json").expect_err("invalid");
        assert!(matches!(
            error,
            LoadDexError::InvalidRecord { position: 1, .. }
        ));
    }

    #[test]
    fn ids_must_count_up_from_one() {
        for ids in [[0, 1], [2, 3], [1, 3], [1, 1]] {
            let records = ids
                .iter()
                .map(|&id| record(id, "Bulbasaur"))
                .collect::<Vec<_>>();
            let raw = serde_json::to_string(&records).expect("serialize");
            let error = parse_dex(&raw, "dex.json").expect_err("out of sequence");
            let LoadDexError::InvalidRecord { reason, .. } = &error else {
                panic!("{ids:?}: {error}");
            };
            assert!(reason.contains("out of sequence"), "{ids:?}: {reason}");
        }

        let raw = serde_json::to_string(&[record(1, "Bulbasaur"), record(2, "Ivysaur")])
            .expect("serialize");
        assert_eq!(parse_dex(&raw, "dex.json").expect("dense").len(), 2);
    }

    #[test]
    fn explicit_flag_wins_over_defaults() {
        let path = Path::new("/tmp/custom-dex.json");
        assert_eq!(resolve_dex_path(Some(path)).expect("resolve"), path);
    }
}
