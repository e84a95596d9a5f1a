use std::{
    fmt::Write as _,
    path::{Path, PathBuf},
};

use glam::{vec3, Vec3};
use log::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("could not access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("settings file ends before field {0}")]
    MissingField(&'static str),
    #[error("settings field {field} has invalid value {value:?}")]
    BadField { field: &'static str, value: String },
}

/// The state that survives a restart: ten whitespace separated values, written in this order:
/// background color (3), ui enabled (0/1), camera position (3), camera front (3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    pub clear_color: Vec3,
    pub ui_enabled: bool,
    pub camera_position: Vec3,
    pub camera_front: Vec3,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            clear_color: Vec3::ZERO,
            ui_enabled: false,
            camera_position: vec3(0.0, 0.0, 3.0),
            camera_front: vec3(0.0, 0.0, -1.0),
        }
    }
}

impl Settings {
    /// Missing or malformed files leave the defaults in place.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(settings) => {
                info!("Loaded settings from {}", path.display());
                settings
            }
            Err(err) => {
                debug!("Using default settings: {err}");
                Settings::default()
            }
        }
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, SettingsError> {
        let mut fields = Fields(text.split_whitespace());
        Ok(Settings {
            clear_color: fields.vec3(["clear_color.r", "clear_color.g", "clear_color.b"])?,
            ui_enabled: fields.flag("ui_enabled")?,
            camera_position: fields.vec3(["camera.position.x", "camera.position.y", "camera.position.z"])?,
            camera_front: fields.vec3(["camera.front.x", "camera.front.y", "camera.front.z"])?,
        })
    }

    /// One value per line. Floats are written with the shortest representation that parses back to
    /// the same value.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        // writing into a String cannot fail
        for c in self.clear_color.to_array() {
            let _ = writeln!(out, "{c}");
        }
        let _ = writeln!(out, "{}", self.ui_enabled as u8);
        for c in self
            .camera_position
            .to_array()
            .into_iter()
            .chain(self.camera_front.to_array())
        {
            let _ = writeln!(out, "{c}");
        }
        out
    }

    /// Overwrites whatever was stored at `path` before.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        std::fs::write(path, self.serialize()).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

struct Fields<'a>(std::str::SplitWhitespace<'a>);

impl<'a> Fields<'a> {
    fn next(&mut self, field: &'static str) -> Result<&'a str, SettingsError> {
        self.0.next().ok_or(SettingsError::MissingField(field))
    }

    fn float(&mut self, field: &'static str) -> Result<f32, SettingsError> {
        let value = self.next(field)?;
        value.parse::<f32>().map_err(|_| SettingsError::BadField {
            field,
            value: value.to_string(),
        })
    }

    fn vec3(&mut self, fields: [&'static str; 3]) -> Result<Vec3, SettingsError> {
        Ok(vec3(
            self.float(fields[0])?,
            self.float(fields[1])?,
            self.float(fields[2])?,
        ))
    }

    fn flag(&mut self, field: &'static str) -> Result<bool, SettingsError> {
        match self.next(field)? {
            "0" => Ok(false),
            "1" => Ok(true),
            value => Err(SettingsError::BadField {
                field,
                value: value.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use glam::vec3;

    use super::{Settings, SettingsError};

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "island-bloom-settings-{}-{name}.txt",
            std::process::id()
        ))
    }

    #[test]
    fn save_then_load_round_trips() {
        let settings = Settings {
            clear_color: vec3(0.1, 0.2, 0.3),
            ui_enabled: true,
            camera_position: vec3(-12.345678, 17.0, 1e-7),
            camera_front: vec3(0.57735026, -0.57735026, 0.57735026),
        };
        let path = temp_path("round-trip");
        settings.save(&path).unwrap();
        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded, settings);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn writes_ten_lines_in_order() {
        let settings = Settings {
            clear_color: vec3(1.0, 2.0, 3.0),
            ui_enabled: false,
            camera_position: vec3(4.0, 5.0, 6.0),
            camera_front: vec3(7.0, 8.0, 9.0),
        };
        let text = settings.serialize();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, ["1", "2", "3", "0", "4", "5", "6", "7", "8", "9"]);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let settings = Settings::load_or_default(&temp_path("does-not-exist"));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn truncated_file_is_rejected() {
        let err = Settings::parse("0 0 0 1 2 3").unwrap_err();
        assert!(matches!(err, SettingsError::MissingField("camera.position.z")));
    }

    #[test]
    fn malformed_file_gives_defaults() {
        let path = temp_path("malformed");
        std::fs::write(&path, "0.5 0.5 0.5 yes 1 2 3 4 5 6").unwrap();
        assert_eq!(Settings::load_or_default(&path), Settings::default());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn parses_any_whitespace() {
        let settings = Settings::parse("0.5\n0.25 0\t1\n1 2 3\n0 0 -1\n").unwrap();
        assert_eq!(settings.clear_color, vec3(0.5, 0.25, 0.0));
        assert!(settings.ui_enabled);
        assert_eq!(settings.camera_position, vec3(1.0, 2.0, 3.0));
        assert_eq!(settings.camera_front, vec3(0.0, 0.0, -1.0));
    }
}
