use crate::domain::{Catalog, DeviceCommand};
use crate::infra::CryPlayer;

/// Applies one inbound line to the catalog. Returns the command that ran, if any.
pub fn dispatch_line(
    line: &str,
    catalog: &mut Catalog,
    player: &mut dyn CryPlayer,
) -> Option<DeviceCommand> {
    if line.is_empty() {
        return None;
    }
    let Some(command) = DeviceCommand::parse(line) else {
        tracing::debug!(%line, "ignoring unrecognized device command");
        return None;
    };

    match command {
        DeviceCommand::Prev => catalog.retreat(),
        DeviceCommand::Next => catalog.advance(),
        DeviceCommand::Rand => catalog.select_random(),
        DeviceCommand::Cry => {
            if let Some(record) = catalog.current() {
                player.play(&record.cry);
            }
        }
    }
    Some(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LineFramer, Record};

    #[derive(Default)]
    struct RecordingPlayer {
        played: Vec<String>,
    }

    impl CryPlayer for RecordingPlayer {
        fn play(&mut self, locator: &str) {
            self.played.push(locator.to_string());
        }
    }

    fn catalog() -> Catalog {
        let records = [(1, "Bulbasaur"), (4, "Charmander"), (7, "Squirtle")]
            .into_iter()
            .map(|(id, name)| Record {
                id,
                name: name.to_string(),
                types: vec!["normal".to_string()],
                height_m: 1.0,
                weight_kg: 1.0,
                description: String::new(),
                sprite: String::new(),
                cry: format!("cries/{id}.ogg"),
            })
            .collect();
        Catalog::new(records)
    }

    #[test]
    fn blank_lines_then_next_advance_once() {
        let mut catalog = catalog();
        let mut player = RecordingPlayer::default();
        let mut framer = LineFramer::new();

        let applied = framer
            .feed("\n\nNEXT\n")
            .iter()
            .filter_map(|line| dispatch_line(line, &mut catalog, &mut player))
            .collect::<Vec<_>>();

        assert_eq!(applied, vec![DeviceCommand::Next]);
        assert_eq!(catalog.current_index(), 1);
    }

    #[test]
    fn lowercase_and_unknown_lines_change_nothing() {
        let mut catalog = catalog();
        let mut player = RecordingPlayer::default();
        for line in ["next", "SHOW 001 BULBASAUR", "NEXT!", "Prev"] {
            assert_eq!(dispatch_line(line, &mut catalog, &mut player), None);
        }
        assert_eq!(catalog.current_index(), 0);
        assert!(player.played.is_empty());
    }

    #[test]
    fn prev_wraps_and_cry_plays_current_record() {
        let mut catalog = catalog();
        let mut player = RecordingPlayer::default();

        dispatch_line("PREV", &mut catalog, &mut player);
        dispatch_line("CRY", &mut catalog, &mut player);

        assert_eq!(catalog.current_index(), 2);
        assert_eq!(player.played, vec!["cries/7.ogg"]);
    }

    #[test]
    fn rand_stays_in_range() {
        let mut catalog = catalog();
        let mut player = RecordingPlayer::default();
        for _ in 0..50 {
            assert_eq!(
                dispatch_line("RAND", &mut catalog, &mut player),
                Some(DeviceCommand::Rand)
            );
            assert!(catalog.current_index() < catalog.len());
        }
    }

    #[test]
    fn cry_on_empty_catalog_is_silent() {
        let mut catalog = Catalog::new(Vec::new());
        let mut player = RecordingPlayer::default();
        dispatch_line("CRY", &mut catalog, &mut player);
        assert!(player.played.is_empty());
    }
}
