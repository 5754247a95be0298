use crate::domain::{Record, pad3};

/// Commands a device may send back over the link, one per line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeviceCommand {
    Prev,
    Next,
    Cry,
    Rand,
}

impl DeviceCommand {
    /// Exact, case-sensitive match on an already trimmed line.
    pub fn parse(line: &str) -> Option<Self> {
        match line {
            "PREV" => Some(Self::Prev),
            "NEXT" => Some(Self::Next),
            "CRY" => Some(Self::Cry),
            "RAND" => Some(Self::Rand),
            _ => None,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            Self::Prev => "PREV",
            Self::Next => "NEXT",
            Self::Cry => "CRY",
            Self::Rand => "RAND",
        }
    }
}

/// `SHOW <id:03> <NAME>\n`, the line mirrored to the device on every selection.
pub fn encode_show_line(record: &Record) -> String {
    format!("SHOW {} {}\n", pad3(record.id), record.display_name())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u32, name: &str) -> Record {
        Record {
            id,
            name: name.to_string(),
            types: vec!["electric".to_string()],
            height_m: 0.4,
            weight_kg: 6.0,
            description: String::new(),
            sprite: String::new(),
            cry: String::new(),
        }
    }

    #[test]
    fn show_line_pads_id_and_uppercases_name() {
        assert_eq!(encode_show_line(&record(25, "pikachu")), "SHOW 025 PIKACHU\n");
        assert_eq!(encode_show_line(&record(151, "Mew")), "SHOW 151 MEW\n");
    }

    #[test]
    fn parse_is_exact_and_case_sensitive() {
        for command in [
            DeviceCommand::Prev,
            DeviceCommand::Next,
            DeviceCommand::Cry,
            DeviceCommand::Rand,
        ] {
            assert_eq!(DeviceCommand::parse(command.token()), Some(command));
        }
        assert_eq!(DeviceCommand::parse("next"), None);
        assert_eq!(DeviceCommand::parse("NEX"), None);
        assert_eq!(DeviceCommand::parse("NEXTT"), None);
        assert_eq!(DeviceCommand::parse(""), None);
    }
}
