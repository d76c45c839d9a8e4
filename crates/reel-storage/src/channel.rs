//! Channel asset discovery.
//!
//! A channel is a storage namespace with a fixed layout:
//!
//! ```text
//! <root>/<channel>/out/<N>.{jpg|png}          frames, ordered by N
//! <root>/<channel>/out/audio/*.{wav|mp3}      narration (first listed wins)
//! <root>/<channel>/out/Fx/*.{png|mp4}         overlay effects
//! <root>/<channel>/out/text.txt               narration script
//! <root>/<channel>/person/person.png          optional portrait
//! <root>/<channel>/finish/final-<job_id>.mp4  render output
//! ```
//!
//! Nothing is downloaded here: every selected object is turned into a read
//! grant, and the render worker fetches the bytes itself.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use futures_util::future::try_join_all;
use regex::Regex;
use tracing::{debug, info, warn};

use reel_models::AssetBundle;

use crate::error::{StorageError, StorageResult};
use crate::store::{ObjectStore, OUTPUT_CONTENT_TYPE, READ_GRANT_TTL, WRITE_GRANT_TTL};

/// Default root under which channels live in the bucket.
pub const DEFAULT_CHANNEL_ROOT: &str = "Channels";

const PORTRAIT_FILE: &str = "person.png";
const SCRIPT_FILE: &str = "text.txt";
const AUDIO_DIR: &str = "audio/";
const OVERLAY_DIR: &str = "Fx/";

static FRAME_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("valid frame number regex"));

/// Key conventions and grant lifetimes for channel storage.
#[derive(Debug, Clone)]
pub struct ChannelLayout {
    /// Root prefix without trailing slash; empty means channels sit at the bucket root.
    pub root_prefix: String,
    /// Validity of input read grants
    pub read_ttl: Duration,
    /// Validity of the output write grant
    pub write_ttl: Duration,
}

impl Default for ChannelLayout {
    fn default() -> Self {
        Self {
            root_prefix: DEFAULT_CHANNEL_ROOT.to_string(),
            read_ttl: READ_GRANT_TTL,
            write_ttl: WRITE_GRANT_TTL,
        }
    }
}

impl ChannelLayout {
    /// Create layout from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            root_prefix: std::env::var("CHANNEL_ROOT_PREFIX")
                .map(|p| p.trim_matches('/').to_string())
                .unwrap_or(defaults.root_prefix),
            read_ttl: std::env::var("READ_GRANT_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.read_ttl),
            write_ttl: std::env::var("WRITE_GRANT_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.write_ttl),
        }
    }

    /// `<root>/<channel>/`
    pub fn channel_prefix(&self, channel: &str) -> String {
        if self.root_prefix.is_empty() {
            format!("{}/", channel)
        } else {
            format!("{}/{}/", self.root_prefix, channel)
        }
    }

    /// `<root>/<channel>/out/`
    pub fn out_prefix(&self, channel: &str) -> String {
        format!("{}out/", self.channel_prefix(channel))
    }

    /// `<root>/<channel>/person/`
    pub fn person_prefix(&self, channel: &str) -> String {
        format!("{}person/", self.channel_prefix(channel))
    }

    /// `<root>/<channel>/finish/final-<job_id>.mp4`
    pub fn output_key(&self, channel: &str, job_id: &str) -> String {
        format!("{}finish/final-{}.mp4", self.channel_prefix(channel), job_id)
    }
}

/// Check that a channel name can be used as a single path segment.
pub fn is_valid_channel(channel: &str) -> bool {
    !channel.trim().is_empty()
        && !channel.contains('/')
        && !channel.contains('\\')
        && channel != "."
        && channel != ".."
}

/// Ordering key of a frame: the first run of digits in its name, `0` when there is none.
pub fn frame_number(name: &str) -> u64 {
    FRAME_NUMBER
        .find(name)
        .map(|m| m.as_str().parse().unwrap_or(u64::MAX))
        .unwrap_or(0)
}

fn has_extension(path: &str, extensions: &[&str]) -> bool {
    path.rsplit_once('.')
        .map(|(_, ext)| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Keys under `out/`, sorted into their roles. Keys are full object keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelObjects {
    pub frames: Vec<String>,
    pub audio: Vec<String>,
    pub overlays: Vec<String>,
    pub text: Option<String>,
}

/// Classify the keys listed under `out_prefix`.
///
/// Frames are sorted by [`frame_number`]; the sort is stable, so equal keys
/// keep listing order. Objects in unknown subdirectories are ignored.
pub fn classify_out_objects(out_prefix: &str, keys: &[String]) -> ChannelObjects {
    let mut objects = ChannelObjects::default();
    let mut frames: Vec<(u64, &String)> = Vec::new();

    for key in keys {
        let Some(relative) = key.strip_prefix(out_prefix) else {
            continue;
        };

        // Directory markers
        if relative.is_empty() || relative.ends_with('/') {
            continue;
        }

        if relative.starts_with(AUDIO_DIR) && has_extension(relative, &["wav", "mp3"]) {
            objects.audio.push(key.clone());
        } else if relative.starts_with(OVERLAY_DIR) && has_extension(relative, &["png", "mp4"]) {
            objects.overlays.push(key.clone());
        } else if relative == SCRIPT_FILE {
            objects.text = Some(key.clone());
        } else if !relative.contains('/') && has_extension(relative, &["jpg", "png"]) {
            frames.push((frame_number(relative), key));
        }
    }

    frames.sort_by_key(|(n, _)| *n);
    objects.frames = frames.into_iter().map(|(_, k)| k.clone()).collect();
    objects
}

/// Output location of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedOutput {
    pub key: String,
    /// Write grant handed to the worker
    pub put_url: String,
    /// Where the result will be readable once uploaded
    pub public_url: String,
}

/// Resolves a channel name into access-granted render inputs.
#[derive(Clone)]
pub struct AssetLocator {
    store: Arc<dyn ObjectStore>,
    layout: ChannelLayout,
}

impl AssetLocator {
    pub fn new(store: Arc<dyn ObjectStore>, layout: ChannelLayout) -> Self {
        Self { store, layout }
    }

    pub fn layout(&self) -> &ChannelLayout {
        &self.layout
    }

    /// Discover and grant a channel's inputs.
    ///
    /// Fails with [`StorageError::ChannelInput`] when no frame is found.
    pub async fn collect_channel_inputs(&self, channel: &str) -> StorageResult<AssetBundle> {
        if !is_valid_channel(channel) {
            return Err(StorageError::InvalidKey(format!("channel name {:?}", channel)));
        }

        let out_prefix = self.layout.out_prefix(channel);
        let person_prefix = self.layout.person_prefix(channel);

        let keys = self.store.list_keys(&out_prefix).await?;
        debug!(channel = %channel, "Found {} objects in {}", keys.len(), out_prefix);

        let objects = classify_out_objects(&out_prefix, &keys);
        if objects.frames.is_empty() {
            return Err(StorageError::channel_input(channel));
        }

        if objects.audio.len() > 1 {
            warn!(
                channel = %channel,
                selected = %objects.audio[0],
                ignored = ?&objects.audio[1..],
                "Multiple audio tracks found, using the first"
            );
        }

        let portrait_key = format!("{}{}", person_prefix, PORTRAIT_FILE);
        let person = self
            .store
            .list_keys(&person_prefix)
            .await?
            .into_iter()
            .find(|k| *k == portrait_key);

        info!(
            channel = %channel,
            frames = objects.frames.len(),
            audio = objects.audio.len(),
            overlays = objects.overlays.len(),
            text = objects.text.is_some(),
            person = person.is_some(),
            "Collected channel inputs"
        );

        let ttl = self.layout.read_ttl;
        let (frames, overlays, audio, person, text) = tokio::try_join!(
            self.grant_all(&objects.frames, ttl),
            self.grant_all(&objects.overlays, ttl),
            self.grant_optional(objects.audio.first(), ttl),
            self.grant_optional(person.as_ref(), ttl),
            self.grant_optional(objects.text.as_ref(), ttl),
        )?;

        Ok(AssetBundle {
            frames,
            overlays,
            audio,
            person,
            text,
        })
    }

    /// Mint the output write grant and predict its public URL.
    pub async fn prepare_output(&self, channel: &str, job_id: &str) -> StorageResult<PreparedOutput> {
        let key = self.layout.output_key(channel, job_id);
        let put_url = self
            .store
            .grant_write(&key, OUTPUT_CONTENT_TYPE, self.layout.write_ttl)
            .await?;
        let public_url = self.store.public_url(&key);

        Ok(PreparedOutput {
            key,
            put_url,
            public_url,
        })
    }

    async fn grant_all(&self, keys: &[String], ttl: Duration) -> StorageResult<Vec<String>> {
        try_join_all(keys.iter().map(|k| self.store.grant_read(k, ttl))).await
    }

    async fn grant_optional(&self, key: Option<&String>, ttl: Duration) -> StorageResult<Option<String>> {
        match key {
            Some(k) => Ok(Some(self.store.grant_read(k, ttl).await?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn locator(store: MemoryStore) -> AssetLocator {
        AssetLocator::new(Arc::new(store), ChannelLayout::default())
    }

    #[test]
    fn test_frame_number_extraction() {
        assert_eq!(frame_number("1.jpg"), 1);
        assert_eq!(frame_number("frame_42.png"), 42);
        assert_eq!(frame_number("cover.jpg"), 0);
        assert_eq!(frame_number("007.jpg"), 7);
    }

    #[test]
    fn test_frames_sort_numerically() {
        let prefix = "Channels/Demo/out/";
        let listed = keys(&[
            "Channels/Demo/out/10.jpg",
            "Channels/Demo/out/2.jpg",
            "Channels/Demo/out/1.jpg",
        ]);
        let objects = classify_out_objects(prefix, &listed);
        assert_eq!(
            objects.frames,
            keys(&[
                "Channels/Demo/out/1.jpg",
                "Channels/Demo/out/2.jpg",
                "Channels/Demo/out/10.jpg",
            ])
        );
    }

    #[test]
    fn test_frames_without_digits_keep_listing_order() {
        let prefix = "Channels/Demo/out/";
        let listed = keys(&[
            "Channels/Demo/out/b.png",
            "Channels/Demo/out/3.jpg",
            "Channels/Demo/out/a.png",
        ]);
        let objects = classify_out_objects(prefix, &listed);
        assert_eq!(
            objects.frames,
            keys(&[
                "Channels/Demo/out/b.png",
                "Channels/Demo/out/a.png",
                "Channels/Demo/out/3.jpg",
            ])
        );
    }

    #[test]
    fn test_classification_by_path_shape() {
        let prefix = "Channels/Demo/out/";
        let listed = keys(&[
            "Channels/Demo/out/",
            "Channels/Demo/out/1.JPG",
            "Channels/Demo/out/audio/voice.wav",
            "Channels/Demo/out/audio/notes.txt",
            "Channels/Demo/out/Fx/sparkle.mp4",
            "Channels/Demo/out/Fx/glow.png",
            "Channels/Demo/out/Fx/readme.md",
            "Channels/Demo/out/text.txt",
            "Channels/Demo/out/drafts/5.jpg",
            "Channels/Demo/out/clip.mp4",
        ]);
        let objects = classify_out_objects(prefix, &listed);
        assert_eq!(objects.frames, keys(&["Channels/Demo/out/1.JPG"]));
        assert_eq!(objects.audio, keys(&["Channels/Demo/out/audio/voice.wav"]));
        assert_eq!(
            objects.overlays,
            keys(&["Channels/Demo/out/Fx/sparkle.mp4", "Channels/Demo/out/Fx/glow.png"])
        );
        assert_eq!(objects.text.as_deref(), Some("Channels/Demo/out/text.txt"));
    }

    #[test]
    fn test_layout_keys() {
        let layout = ChannelLayout::default();
        assert_eq!(layout.out_prefix("Demo"), "Channels/Demo/out/");
        assert_eq!(layout.person_prefix("Demo"), "Channels/Demo/person/");
        assert_eq!(
            layout.output_key("Demo", "job-1"),
            "Channels/Demo/finish/final-job-1.mp4"
        );

        let bare = ChannelLayout {
            root_prefix: String::new(),
            ..Default::default()
        };
        assert_eq!(bare.out_prefix("Demo"), "Demo/out/");
    }

    #[test]
    fn test_channel_validation() {
        assert!(is_valid_channel("MilasConfessions"));
        assert!(!is_valid_channel(""));
        assert!(!is_valid_channel("  "));
        assert!(!is_valid_channel("a/b"));
        assert!(!is_valid_channel(".."));
    }

    #[tokio::test]
    async fn test_collect_channel_inputs() {
        let store = MemoryStore::with_keys(&[
            "Channels/Demo/out/2.jpg",
            "Channels/Demo/out/1.jpg",
            "Channels/Demo/out/audio/a.mp3",
            "Channels/Demo/out/audio/b.wav",
            "Channels/Demo/person/person.png",
            "Channels/Demo/person/person-old.png",
        ]);
        let bundle = locator(store).collect_channel_inputs("Demo").await.unwrap();

        assert_eq!(
            bundle.frames,
            vec![
                "read://Channels/Demo/out/1.jpg?ttl=3600",
                "read://Channels/Demo/out/2.jpg?ttl=3600",
            ]
        );
        assert_eq!(
            bundle.audio.as_deref(),
            Some("read://Channels/Demo/out/audio/a.mp3?ttl=3600")
        );
        assert_eq!(
            bundle.person.as_deref(),
            Some("read://Channels/Demo/person/person.png?ttl=3600")
        );
        assert!(bundle.overlays.is_empty());
        assert!(bundle.text.is_none());
    }

    #[tokio::test]
    async fn test_portrait_requires_exact_name() {
        let store = MemoryStore::with_keys(&[
            "Channels/Demo/out/1.jpg",
            "Channels/Demo/person/other-person.png",
        ]);
        let bundle = locator(store).collect_channel_inputs("Demo").await.unwrap();
        assert!(bundle.person.is_none());
    }

    #[tokio::test]
    async fn test_inputs_are_listed_per_collection() {
        let store = Arc::new(MemoryStore::with_keys(&["Channels/Demo/out/1.jpg"]));
        let locator = AssetLocator::new(store.clone(), ChannelLayout::default());

        let before = locator.collect_channel_inputs("Demo").await.unwrap();
        assert_eq!(before.frames.len(), 1);
        assert!(before.person.is_none());

        store.insert("Channels/Demo/out/2.jpg");
        store.insert("Channels/Demo/person/person.png");

        let after = locator.collect_channel_inputs("Demo").await.unwrap();
        assert_eq!(
            after.frames,
            vec![
                "read://Channels/Demo/out/1.jpg?ttl=3600",
                "read://Channels/Demo/out/2.jpg?ttl=3600",
            ]
        );
        assert_eq!(
            after.person.as_deref(),
            Some("read://Channels/Demo/person/person.png?ttl=3600")
        );
    }

    #[tokio::test]
    async fn test_no_frames_is_channel_input_error() {
        let store = MemoryStore::with_keys(&["Channels/Empty/out/audio/a.mp3"]);
        let err = locator(store)
            .collect_channel_inputs("Empty")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ChannelInput(ref c) if c == "Empty"));
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn test_access_denied_propagates() {
        let store = MemoryStore::with_keys(&["Channels/Demo/out/1.jpg"]).deny_reads();
        let err = locator(store)
            .collect_channel_inputs("Demo")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::AccessDenied(_)));
    }

    #[tokio::test]
    async fn test_prepare_output() {
        let store = MemoryStore::with_keys(&[]);
        let output = locator(store).prepare_output("Demo", "job-9").await.unwrap();
        assert_eq!(output.key, "Channels/Demo/finish/final-job-9.mp4");
        assert_eq!(
            output.put_url,
            "write://Channels/Demo/finish/final-job-9.mp4?type=video/mp4&ttl=7200"
        );
        assert_eq!(
            output.public_url,
            "https://pub.test/Channels/Demo/finish/final-job-9.mp4"
        );
    }
}
