use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use audiobook_mix_core::storage::timing_migration::split_page_texts;
use audiobook_mix_core::{BackgroundTrack, ClipInput, EffectInsert, EpisodeRequest, PageRangeTrack};

/// Episode build request read from a JSON file.
///
/// Relative paths are resolved against the manifest's directory.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeManifest {
    pub pages: Vec<PathBuf>,
    #[serde(default)]
    pub page_texts: Option<Vec<String>>,
    /// Page texts as one string with `---` separator lines.
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default = "default_speed")]
    pub speed: f32,
    #[serde(default)]
    pub effects: Vec<EffectInsert>,
    #[serde(default)]
    pub background_tracks: Vec<BackgroundTrack>,
    #[serde(default)]
    pub page_range_tracks: Vec<PageRangeTrack>,
}

fn default_speed() -> f32 {
    1.0
}

impl EpisodeManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).with_context(|| format!("failed to read manifest {}", path.display()))?;
        let mut manifest: Self =
            serde_json::from_str(&json).with_context(|| format!("failed to parse manifest {}", path.display()))?;
        if let Some(base) = path.parent() {
            manifest.resolve_paths(base);
        }
        Ok(manifest)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        self.pages.iter_mut().for_each(resolve);
        self.effects.iter_mut().for_each(|e| resolve(&mut e.source_path));
        self.background_tracks.iter_mut().for_each(|t| resolve(&mut t.source_path));
        self.page_range_tracks.iter_mut().for_each(|t| resolve(&mut t.source_path));
    }

    pub fn into_request(self) -> EpisodeRequest {
        let texts = self
            .page_texts
            .or_else(|| self.text.as_deref().map(split_page_texts));
        let request = EpisodeRequest::new(self.pages.into_iter().map(ClipInput::Path).collect())
            .with_speed(self.speed)
            .with_effects(self.effects)
            .with_background_tracks(self.background_tracks)
            .with_page_range_tracks(self.page_range_tracks);
        match texts {
            Some(texts) => request.with_page_texts(texts),
            None => request,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_follow_the_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("episode.json");
        fs::write(
            &path,
            r#"{
                "pages": ["p1.mp3", "/abs/p2.mp3"],
                "text": "하나\n---\n둘",
                "backgroundTracks": [{"audioPath": "bgm/rain.mp3", "startTime": 0, "endTime": 4000}],
                "effects": [{"audioPath": "sfx/door.wav", "pageIndex": 1}]
            }"#,
        )
        .unwrap();

        let manifest = EpisodeManifest::load(&path).unwrap();

        assert_eq!(manifest.pages[0], dir.path().join("p1.mp3"));
        assert_eq!(manifest.pages[1], PathBuf::from("/abs/p2.mp3"));
        assert_eq!(manifest.background_tracks[0].source_path, dir.path().join("bgm/rain.mp3"));
        assert_eq!(manifest.effects[0].source_path, dir.path().join("sfx/door.wav"));
        assert_eq!(manifest.speed, 1.0);

        let request = manifest.into_request();
        assert_eq!(request.clips.len(), 2);
        assert_eq!(request.page_texts, Some(vec!["하나".to_string(), "둘".to_string()]));
    }

    #[test]
    fn explicit_page_texts_win() {
        let manifest: EpisodeManifest =
            serde_json::from_str(r#"{"pages": ["a.wav"], "pageTexts": ["x"], "text": "y"}"#).unwrap();
        assert_eq!(manifest.into_request().page_texts, Some(vec!["x".to_string()]));
    }

    #[test]
    fn missing_manifest_is_an_error() {
        assert!(EpisodeManifest::load(Path::new("/nonexistent/episode.json")).is_err());
    }
}
