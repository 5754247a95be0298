use crate::domain::{Record, capitalize};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_BASE: &str = "https://pokeapi.co/api/v2";
pub const GEN1_FIRST_ID: u32 = 1;
pub const GEN1_LAST_ID: u32 = 151;
/// Highest national dex number PokeAPI serves.
pub const MAX_DEX_ID: u32 = 1025;

const SPRITE_BASE: &str = "https://raw.githubusercontent.com/PokeAPI/sprites/master/sprites/pokemon";
const CRY_BASE: &str = "https://raw.githubusercontent.com/PokeAPI/cries/main/cries/pokemon/latest";
const PREFERRED_FLAVOR_VERSIONS: [&str; 3] = ["red", "blue", "yellow"];
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum FetchDexError {
    #[error("request failed for {url}: {message}")]
    Request { url: String, message: String },

    #[error("invalid response from {url}: {message}")]
    Decode { url: String, message: String },
}

#[derive(Debug, Deserialize)]
pub struct PokemonPayload {
    pub name: String,
    pub height: u32,
    pub weight: u32,
    pub types: Vec<PokemonTypeSlot>,
}

#[derive(Debug, Deserialize)]
pub struct PokemonTypeSlot {
    pub slot: u32,
    #[serde(rename = "type")]
    pub type_: NamedResource,
}

#[derive(Debug, Deserialize)]
pub struct SpeciesPayload {
    pub flavor_text_entries: Vec<FlavorTextEntry>,
}

#[derive(Debug, Deserialize)]
pub struct FlavorTextEntry {
    pub flavor_text: String,
    pub language: NamedResource,
    pub version: NamedResource,
}

#[derive(Debug, Deserialize)]
pub struct NamedResource {
    pub name: String,
}

pub struct DexFetcher {
    agent: ureq::Agent,
    api_base: String,
}

impl DexFetcher {
    pub fn new(api_base: &str) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build();
        Self {
            agent: config.into(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn fetch_record(&self, id: u32) -> Result<Record, FetchDexError> {
        let pokemon: PokemonPayload = self.get_json(&format!("{}/pokemon/{id}", self.api_base))?;
        let species: SpeciesPayload =
            self.get_json(&format!("{}/pokemon-species/{id}", self.api_base))?;
        Ok(build_record(id, pokemon, &species))
    }

    fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T, FetchDexError> {
        let mut response = self
            .agent
            .get(url)
            .header(
                "User-Agent",
                &format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            )
            .call()
            .map_err(|error| FetchDexError::Request {
                url: url.to_string(),
                message: error.to_string(),
            })?;

        response
            .body_mut()
            .read_json::<T>()
            .map_err(|error| FetchDexError::Decode {
                url: url.to_string(),
                message: error.to_string(),
            })
    }
}

pub fn build_record(id: u32, pokemon: PokemonPayload, species: &SpeciesPayload) -> Record {
    let mut slots = pokemon.types;
    slots.sort_by_key(|slot| slot.slot);

    Record {
        id,
        name: capitalize(&pokemon.name),
        types: slots.into_iter().map(|slot| slot.type_.name).collect(),
        height_m: f64::from(pokemon.height) / 10.0,
        weight_kg: f64::from(pokemon.weight) / 10.0,
        description: pick_english_flavor(&species.flavor_text_entries),
        sprite: format!("{SPRITE_BASE}/{id}.png"),
        cry: format!("{CRY_BASE}/{id}.ogg"),
    }
}

/// English flavor text, preferring the original red/blue/yellow releases.
pub fn pick_english_flavor(entries: &[FlavorTextEntry]) -> String {
    let english = entries
        .iter()
        .filter(|entry| entry.language.name == "en")
        .collect::<Vec<_>>();

    let entry = english
        .iter()
        .find(|entry| PREFERRED_FLAVOR_VERSIONS.contains(&entry.version.name.as_str()))
        .or_else(|| english.first());

    entry
        .map(|entry| entry.flavor_text.replace(['\u{c}', '\n'], " "))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flavor(text: &str, language: &str, version: &str) -> FlavorTextEntry {
        FlavorTextEntry {
            flavor_text: text.to_string(),
            language: NamedResource {
                name: language.to_string(),
            },
            version: NamedResource {
                name: version.to_string(),
            },
        }
    }

    #[test]
    fn prefers_original_versions_and_flattens_breaks() {
        let entries = vec![
            flavor("Später", "de", "red"),
            flavor("Newer text", "en", "sword"),
            flavor("When several of\nthese POKéMON\u{c}gather", "en", "blue"),
        ];
        assert_eq!(
            pick_english_flavor(&entries),
            "When several of these POKéMON gather"
        );
    }

    #[test]
    fn falls_back_to_first_english_or_empty() {
        let entries = vec![flavor("Texte", "fr", "red"), flavor("Only one", "en", "x")];
        assert_eq!(pick_english_flavor(&entries), "Only one");
        assert_eq!(pick_english_flavor(&[flavor("Texte", "fr", "red")]), "");
    }

    #[test]
    fn builds_record_from_payloads() {
        let pokemon: PokemonPayload = serde_json::from_str(
            r#"{
                "name": "bulbasaur",
                "height": 7,
                "weight": 69,
                "types": [
                    {"slot": 2, "type": {"name": "poison"}},
                    {"slot": 1, "type": {"name": "grass"}}
                ]
            }"#,
        )
        .expect("pokemon");
        let species = SpeciesPayload {
            flavor_text_entries: vec![flavor("A strange seed.", "en", "red")],
        };

        let record = build_record(1, pokemon, &species);
        assert_eq!(record.name, "Bulbasaur");
        assert_eq!(record.types, vec!["grass", "poison"]);
        assert!((record.height_m - 0.7).abs() < f64::EPSILON);
        assert!((record.weight_kg - 6.9).abs() < f64::EPSILON);
        assert_eq!(record.description, "A strange seed.");
        assert!(record.sprite.ends_with("/sprites/pokemon/1.png"));
        assert!(record.cry.ends_with("/cries/pokemon/latest/1.ogg"));
    }
}
