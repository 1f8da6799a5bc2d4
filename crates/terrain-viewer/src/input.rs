//! Abstract window commands and the keyboard layout that produces them.

use winit::keyboard::Key;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    ZoomIn,
    ZoomOut,
    TiltUp,
    TiltDown,
    YawLeft,
    YawRight,
    CycleRenderMode,
    ToggleAutoRotate,
    IncreaseRefreshRate,
    DecreaseRefreshRate,
    CycleHeightmap,
}

/// Character bindings, laid out for an AZERTY keyboard
/// (Z/S zoom, A/E tilt, Q/D yaw).
pub fn command_for_char(c: char) -> Option<Command> {
    let command = match c.to_ascii_uppercase() {
        'Z' => Command::ZoomIn,
        'S' => Command::ZoomOut,
        'A' => Command::TiltUp,
        'E' => Command::TiltDown,
        'Q' => Command::YawLeft,
        'D' => Command::YawRight,
        'W' => Command::CycleRenderMode,
        'C' => Command::ToggleAutoRotate,
        'P' => Command::IncreaseRefreshRate,
        'M' => Command::DecreaseRefreshRate,
        'X' => Command::CycleHeightmap,
        _ => return None,
    };
    Some(command)
}

/// Maps a logical key press to a command.
pub fn command_for_key(key: &Key) -> Option<Command> {
    match key {
        Key::Character(text) => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => command_for_char(c),
                _ => None,
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bindings_are_case_insensitive() {
        assert_eq!(command_for_char('w'), Some(Command::CycleRenderMode));
        assert_eq!(command_for_char('W'), Some(Command::CycleRenderMode));
        assert_eq!(command_for_char('x'), Some(Command::CycleHeightmap));
        assert_eq!(command_for_char('1'), None);
    }

    #[test]
    fn multi_char_keys_are_ignored() {
        assert_eq!(command_for_key(&Key::Character("p".into())), Some(Command::IncreaseRefreshRate));
        assert_eq!(command_for_key(&Key::Character("pq".into())), None);
    }
}
