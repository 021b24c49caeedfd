use callgrid_canvas::CanvasConfig;
use callgrid_core::Color;
use callgrid_trace::DEFAULT_PORT;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub trace: TraceSettings,
    /// Reapply a file's previous layout when it is opened again.
    #[serde(default = "default_true")]
    pub restore_sessions: bool,
    #[serde(default = "default_true")]
    pub animations: bool,
    pub annotations: AnnotationSettings,

    #[serde(default)]
    pub last_opened_file: Option<PathBuf>,
    #[serde(default)]
    pub recent_files: Vec<PathBuf>,
    #[serde(default = "default_max_recent")]
    pub max_recent: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceSettings {
    pub port: u16,
    pub auto_start: bool,
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            auto_start: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationSettings {
    /// Screen pixels.
    pub eraser_radius: f32,
    pub brush_width: f32,
    pub color: Color,
}

impl Default for AnnotationSettings {
    fn default() -> Self {
        Self {
            eraser_radius: 12.0,
            brush_width: 2.5,
            color: Color::WHITE,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_recent() -> usize {
    10
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            trace: TraceSettings::default(),
            restore_sessions: true,
            animations: true,
            annotations: AnnotationSettings::default(),
            last_opened_file: None,
            recent_files: Vec::new(),
            max_recent: default_max_recent(),
        }
    }
}

impl AppSettings {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("callgrid").join("settings.json"))
    }

    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        tracing::info!("Loading settings from {:?}", path);
        if !path.exists() {
            tracing::info!("Settings file not found, using defaults");
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(settings) => return settings,
                Err(e) => tracing::error!("Failed to parse settings: {}", e),
            },
            Err(e) => tracing::error!("Failed to read settings file: {}", e),
        }
        Self::default()
    }

    pub fn save(&self) {
        let Some(path) = Self::default_path() else {
            return;
        };
        if let Err(e) = self.save_to(&path) {
            tracing::warn!("Could not save settings to {:?}: {}", path, e);
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Move `path` to the front of the recent list.
    pub fn add_recent(&mut self, path: PathBuf) {
        self.recent_files.retain(|p| *p != path);
        self.recent_files.insert(0, path.clone());
        self.recent_files.truncate(self.max_recent);
        self.last_opened_file = Some(path);
    }

    /// Canvas tunables with the user's choices applied.
    pub fn canvas_config(&self) -> CanvasConfig {
        let mut config = CanvasConfig {
            restore_sessions: self.restore_sessions,
            eraser_radius: self.annotations.eraser_radius,
            brush_width: self.annotations.brush_width,
            annotation_color: self.annotations.color,
            ..CanvasConfig::default()
        };
        if !self.animations {
            config.tween = Duration::ZERO;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: AppSettings =
            serde_json::from_str(r#"{"trace":{"port":6000},"animations":false}"#).unwrap();
        assert_eq!(settings.trace.port, 6000);
        assert!(settings.trace.auto_start);
        assert!(!settings.animations);
        assert!(settings.restore_sessions);
        assert_eq!(settings.annotations.eraser_radius, 12.0);
        assert_eq!(settings.max_recent, 10);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let mut settings = AppSettings::default();
        settings.annotations.color = Color::rgb(0xff, 0x80, 0x00);
        settings.save_to(&path).unwrap();
        assert_eq!(AppSettings::load_from(&path), settings);

        std::fs::write(&path, "not json").unwrap();
        assert_eq!(AppSettings::load_from(&path), AppSettings::default());
    }

    #[test]
    fn test_recent_files_are_unique_and_bounded() {
        let mut settings = AppSettings {
            max_recent: 2,
            ..AppSettings::default()
        };
        settings.add_recent("a.rs".into());
        settings.add_recent("b.rs".into());
        settings.add_recent("a.rs".into());
        settings.add_recent("c.rs".into());
        assert_eq!(settings.recent_files, vec![PathBuf::from("c.rs"), "a.rs".into()]);
        assert_eq!(settings.last_opened_file, Some("c.rs".into()));
    }

    #[test]
    fn test_canvas_config_follows_settings() {
        let settings = AppSettings {
            animations: false,
            restore_sessions: false,
            ..AppSettings::default()
        };
        let config = settings.canvas_config();
        assert_eq!(config.tween, Duration::ZERO);
        assert!(!config.restore_sessions);
        assert_eq!(config.brush_width, 2.5);
    }
}
