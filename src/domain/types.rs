use serde::{Deserialize, Serialize};

/// One pokédex entry as persisted in the dex file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: u32,
    pub name: String,
    pub types: Vec<String>,
    pub height_m: f64,
    pub weight_kg: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub sprite: String,
    #[serde(default)]
    pub cry: String,
}

impl Record {
    pub fn display_name(&self) -> String {
        self.name.to_uppercase()
    }

    pub fn dex_number(&self) -> String {
        format!("#{}", pad3(self.id))
    }

    pub fn type_label(&self) -> String {
        let main = self
            .types
            .first()
            .map(String::as_str)
            .unwrap_or("unknown");
        format!("{main} POKÉMON").to_uppercase()
    }

    pub fn height_label(&self) -> String {
        format_height_imperial(self.height_m)
    }

    pub fn weight_label(&self) -> String {
        format_weight_imperial(self.weight_kg)
    }
}

pub fn pad3(id: u32) -> String {
    format!("{id:03}")
}

const INCHES_PER_METRE: f64 = 39.3701;
const POUNDS_PER_KILOGRAM: f64 = 2.20462;

pub fn format_height_imperial(metres: f64) -> String {
    let inches = metres.max(0.0) * INCHES_PER_METRE;
    let feet = (inches / 12.0).floor();
    let inch = (inches - feet * 12.0).round();
    format!("HT {}'{:02}\"", feet as u64, inch as u64)
}

pub fn format_weight_imperial(kilograms: f64) -> String {
    format!("WT {:.1} lbs", kilograms.max(0.0) * POUNDS_PER_KILOGRAM)
}

/// Capitalizes the first character, leaving the rest untouched.
pub fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulbasaur() -> Record {
        Record {
            id: 1,
            name: "Bulbasaur".to_string(),
            types: vec!["grass".to_string(), "poison".to_string()],
            height_m: 0.7,
            weight_kg: 6.9,
            description: String::new(),
            sprite: String::new(),
            cry: String::new(),
        }
    }

    #[test]
    fn labels_match_dex_card_format() {
        let record = bulbasaur();
        assert_eq!(record.dex_number(), "#001");
        assert_eq!(record.display_name(), "BULBASAUR");
        assert_eq!(record.type_label(), "GRASS POKÉMON");
        assert_eq!(record.height_label(), "HT 2'04\"");
        assert_eq!(record.weight_label(), "WT 15.2 lbs");
    }

    #[test]
    fn type_label_falls_back_to_unknown() {
        let mut record = bulbasaur();
        record.types.clear();
        assert_eq!(record.type_label(), "UNKNOWN POKÉMON");
    }

    #[test]
    fn capitalize_handles_empty_and_unicode() {
        assert_eq!(capitalize(""), "");
        assert_eq!(capitalize("pikachu"), "Pikachu");
        assert_eq!(capitalize("évoli"), "Évoli");
    }

    #[test]
    fn record_parses_with_missing_optional_fields() {
        let raw = r#"{"id":25,"name":"Pikachu","types":["electric"],"height_m":0.4,"weight_kg":6}"#;
        let record: Record = serde_json::from_str(raw).expect("parse");
        assert_eq!(record.id, 25);
        assert_eq!(record.weight_kg, 6.0);
        assert!(record.description.is_empty());
        assert!(record.cry.is_empty());
    }
}
