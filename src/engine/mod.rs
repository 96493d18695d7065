//! Sorting engine adapter.
//!
//! The external sorting engine (LOOT) is reached through a small C ABI exposed by
//! the `loot_shim` library. [`EngineBackend`] mirrors that ABI one call per
//! method; [`ShimLibrary`] implements it over a dynamically loaded library and
//! tests substitute an in-process backend.
//!
//! [`EngineSession`] owns one engine handle. It converts arguments to C strings,
//! maps status codes to `bool`, decodes JSON payloads and hands every payload
//! back to the backend's free call before returning. The handle is destroyed
//! exactly once, either by [`EngineSession::close`] or on drop.

pub mod metadata;
pub mod shim;

pub use metadata::{CleaningEntry, EngineMessage, FileEntry, MetadataPaths, PluginDetails, TagEntry};
pub use shim::{EngineError, ShimLibrary};

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::ffi::{CStr, CString, c_char, c_int, c_void};
use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

/// Status code the engine returns on success.
pub const STATUS_OK: c_int = 0;

/// Game kinds understood by the sorting engine.
///
/// Discriminants are the values passed across the engine ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum GameKind {
    Oblivion = 0,
    Skyrim = 1,
    Fallout3 = 2,
    FalloutNV = 3,
    Fallout4 = 4,
    SkyrimSE = 5,
    Fallout4VR = 6,
    SkyrimVR = 7,
    Morrowind = 8,
    Starfield = 9,
    OpenMW = 10,
    OblivionRemastered = 11,
}

impl GameKind {
    /// Value passed to `loot_create_game_handle`.
    pub fn code(self) -> c_int {
        self as c_int
    }

    /// Folder name used for this game's metadata, matching the upstream
    /// masterlist repository names.
    pub fn slug(self) -> &'static str {
        match self {
            GameKind::Oblivion => "oblivion",
            GameKind::Skyrim => "skyrim",
            GameKind::Fallout3 => "fallout3",
            GameKind::FalloutNV => "falloutnv",
            GameKind::Fallout4 => "fallout4",
            GameKind::SkyrimSE => "skyrimse",
            GameKind::Fallout4VR => "fallout4vr",
            GameKind::SkyrimVR => "skyrimvr",
            GameKind::Morrowind => "morrowind",
            GameKind::Starfield => "starfield",
            GameKind::OpenMW => "openmw",
            GameKind::OblivionRemastered => "oblivionremastered",
        }
    }

    pub fn masterlist_repo_url(self) -> String {
        format!("https://github.com/loot/{}", self.slug())
    }
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Opaque engine handle as returned by `loot_create_game_handle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSession(NonNull<c_void>);

impl RawSession {
    /// Wrap a handle pointer; `None` for null.
    pub fn new(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0.as_ptr()
    }
}

/// NUL-terminated JSON text owned by the engine until passed to
/// [`EngineBackend::free_payload`].
#[derive(Debug)]
pub struct RawPayload(NonNull<c_char>);

impl RawPayload {
    /// Wrap a payload pointer; `None` for null.
    pub fn new(ptr: *mut c_char) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    pub fn as_ptr(&self) -> *mut c_char {
        self.0.as_ptr()
    }
}

/// One-to-one view of the engine ABI.
///
/// Implementations must return payloads that stay valid, NUL-terminated strings
/// until handed back to [`free_payload`](EngineBackend::free_payload).
pub trait EngineBackend: Send + Sync {
    fn create_session(
        &self,
        game: GameKind,
        content_path: &CStr,
        install_path: &CStr,
    ) -> Option<RawSession>;

    fn destroy_session(&self, session: RawSession);

    fn sort(&self, session: RawSession) -> c_int;

    fn load_masterlist(&self, session: RawSession, path: &CStr, prelude: Option<&CStr>) -> c_int;

    fn load_userlist(&self, session: RawSession, path: &CStr) -> c_int;

    fn clear_user_metadata(&self, session: RawSession) -> c_int;

    fn plugin_details_json(&self, session: RawSession, plugin: &CStr) -> Option<RawPayload>;

    fn general_messages_json(&self, session: RawSession) -> Option<RawPayload>;

    fn free_payload(&self, payload: RawPayload);
}

/// Scoped engine session for one game context.
pub struct EngineSession {
    backend: Arc<dyn EngineBackend>,
    handle: Option<RawSession>,
    game: GameKind,
}

impl EngineSession {
    /// Create an engine handle for `game` over the virtual content directory.
    ///
    /// Returns `None` when the engine refuses the paths or either path cannot
    /// be represented as a C string.
    pub fn open(
        backend: Arc<dyn EngineBackend>,
        game: GameKind,
        content_path: &Utf8Path,
        install_path: &Utf8Path,
    ) -> Option<Self> {
        let content = to_cstring(content_path.as_str())?;
        let install = to_cstring(install_path.as_str())?;

        match backend.create_session(game, &content, &install) {
            Some(handle) => {
                tracing::info!("Opened sorting engine session for {} over {}", game, content_path);
                Some(Self {
                    backend,
                    handle: Some(handle),
                    game,
                })
            }
            None => {
                tracing::warn!(
                    "Sorting engine rejected {} session (content: {}, install: {})",
                    game,
                    content_path,
                    install_path
                );
                None
            }
        }
    }

    pub fn game(&self) -> GameKind {
        self.game
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Load the masterlist, optionally with a prelude.
    pub fn load_authoritative_metadata(&mut self, path: &Utf8Path, prelude: Option<&Utf8Path>) -> bool {
        let Some(handle) = self.handle else {
            return false;
        };
        let Some(path_c) = to_cstring(path.as_str()) else {
            return false;
        };
        let prelude_c = match prelude {
            Some(p) => match to_cstring(p.as_str()) {
                Some(c) => Some(c),
                None => return false,
            },
            None => None,
        };

        let status = self
            .backend
            .load_masterlist(handle, &path_c, prelude_c.as_deref());
        check_status("load masterlist", status)
    }

    /// Load the userlist.
    pub fn load_user_metadata(&mut self, path: &Utf8Path) -> bool {
        let Some(handle) = self.handle else {
            return false;
        };
        let Some(path_c) = to_cstring(path.as_str()) else {
            return false;
        };
        let status = self.backend.load_userlist(handle, &path_c);
        check_status("load userlist", status)
    }

    pub fn clear_user_metadata(&mut self) -> bool {
        let Some(handle) = self.handle else {
            return false;
        };
        check_status("clear user metadata", self.backend.clear_user_metadata(handle))
    }

    /// Ask the engine to sort the content files present in the virtual directory.
    pub fn sort(&mut self) -> bool {
        let Some(handle) = self.handle else {
            return false;
        };
        check_status("sort plugins", self.backend.sort(handle))
    }

    /// Decoded metadata for one content file, or `None` when the engine has
    /// nothing usable for it.
    pub fn plugin_details(&self, filename: &str) -> Option<PluginDetails> {
        let handle = self.handle?;
        let name = to_cstring(filename)?;
        let payload = self.backend.plugin_details_json(handle, &name)?;
        let text = self.take_payload(payload);

        match serde_json::from_str::<Option<PluginDetails>>(&text) {
            Ok(details) => details,
            Err(e) => {
                tracing::warn!("Discarding malformed metadata for {}: {}", filename, e);
                None
            }
        }
    }

    /// Messages that apply to the whole load order.
    pub fn general_messages(&self) -> Vec<EngineMessage> {
        let Some(handle) = self.handle else {
            return Vec::new();
        };
        let Some(payload) = self.backend.general_messages_json(handle) else {
            return Vec::new();
        };
        let text = self.take_payload(payload);

        match serde_json::from_str::<Option<Vec<EngineMessage>>>(&text) {
            Ok(messages) => messages.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Discarding malformed general messages: {}", e);
                Vec::new()
            }
        }
    }

    /// Destroy the engine handle. Later calls do nothing.
    pub fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.backend.destroy_session(handle);
            tracing::debug!("Closed sorting engine session for {}", self.game);
        }
    }

    /// Copy the payload text out, then release it.
    fn take_payload(&self, payload: RawPayload) -> String {
        // SAFETY: the backend contract guarantees a NUL-terminated string that
        // stays valid until `free_payload` is called below.
        let text = unsafe { CStr::from_ptr(payload.as_ptr()) }
            .to_string_lossy()
            .into_owned();
        self.backend.free_payload(payload);
        text
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for EngineSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineSession")
            .field("game", &self.game)
            .field("open", &self.handle.is_some())
            .finish()
    }
}

fn to_cstring(value: &str) -> Option<CString> {
    match CString::new(value) {
        Ok(c) => Some(c),
        Err(_) => {
            tracing::warn!("Cannot pass {:?} to the sorting engine: contains NUL", value);
            None
        }
    }
}

fn check_status(operation: &str, status: c_int) -> bool {
    if status == STATUS_OK {
        true
    } else {
        tracing::warn!("Sorting engine failed to {} (status {})", operation, status);
        false
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-process backend that records calls and serves canned payloads.

    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    pub struct FakeBackend {
        pub refuse_sessions: bool,
        pub details: HashMap<String, String>,
        pub general: Option<String>,
        pub fail_masterlist: bool,
        pub created: AtomicUsize,
        pub destroyed: AtomicUsize,
        pub outstanding_payloads: AtomicUsize,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeBackend {
        fn record(&self, call: impl Into<String>) {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(call.into());
            }
        }

        fn payload(&self, text: &str) -> Option<RawPayload> {
            let raw = CString::new(text).ok()?.into_raw();
            self.outstanding_payloads.fetch_add(1, Ordering::SeqCst);
            RawPayload::new(raw)
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().map(|c| c.clone()).unwrap_or_default()
        }
    }

    impl EngineBackend for FakeBackend {
        fn create_session(&self, game: GameKind, _: &CStr, _: &CStr) -> Option<RawSession> {
            self.record(format!("create {}", game));
            if self.refuse_sessions {
                return None;
            }
            self.created.fetch_add(1, Ordering::SeqCst);
            RawSession::new(NonNull::<u8>::dangling().as_ptr().cast())
        }

        fn destroy_session(&self, _: RawSession) {
            self.record("destroy");
            self.destroyed.fetch_add(1, Ordering::SeqCst);
        }

        fn sort(&self, _: RawSession) -> c_int {
            self.record("sort");
            STATUS_OK
        }

        fn load_masterlist(&self, _: RawSession, path: &CStr, prelude: Option<&CStr>) -> c_int {
            self.record(format!(
                "masterlist {} prelude={}",
                path.to_string_lossy(),
                prelude.is_some()
            ));
            if self.fail_masterlist { -4 } else { STATUS_OK }
        }

        fn load_userlist(&self, _: RawSession, path: &CStr) -> c_int {
            self.record(format!("userlist {}", path.to_string_lossy()));
            STATUS_OK
        }

        fn clear_user_metadata(&self, _: RawSession) -> c_int {
            self.record("clear");
            STATUS_OK
        }

        fn plugin_details_json(&self, _: RawSession, plugin: &CStr) -> Option<RawPayload> {
            let key = plugin.to_string_lossy().to_lowercase();
            let text = self.details.get(&key)?;
            self.payload(text)
        }

        fn general_messages_json(&self, _: RawSession) -> Option<RawPayload> {
            let text = self.general.as_deref()?;
            self.payload(text)
        }

        fn free_payload(&self, payload: RawPayload) {
            // SAFETY: every payload handed out came from `CString::into_raw`.
            drop(unsafe { CString::from_raw(payload.as_ptr()) });
            self.outstanding_payloads.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeBackend;
    use super::*;
    use std::sync::atomic::Ordering;

    fn open(backend: &Arc<FakeBackend>) -> Option<EngineSession> {
        EngineSession::open(
            backend.clone(),
            GameKind::SkyrimSE,
            Utf8Path::new("/ws/VirtualData"),
            Utf8Path::new("/games/Skyrim"),
        )
    }

    #[test]
    fn test_game_kind_codes_and_slugs() {
        assert_eq!(GameKind::Oblivion.code(), 0);
        assert_eq!(GameKind::SkyrimSE.code(), 5);
        assert_eq!(GameKind::OblivionRemastered.code(), 11);
        assert_eq!(GameKind::FalloutNV.slug(), "falloutnv");
        assert_eq!(
            GameKind::Fallout4.masterlist_repo_url(),
            "https://github.com/loot/fallout4"
        );
    }

    #[test]
    fn test_close_destroys_handle_once() {
        let backend = Arc::new(FakeBackend::default());
        let mut session = open(&backend).unwrap();
        assert!(session.is_open());

        session.close();
        session.close();
        drop(session);

        assert_eq!(backend.created.load(Ordering::SeqCst), 1);
        assert_eq!(backend.destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_closes_session() {
        let backend = Arc::new(FakeBackend::default());
        {
            let _session = open(&backend).unwrap();
        }
        assert_eq!(backend.destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_refused_session_is_none() {
        let backend = Arc::new(FakeBackend {
            refuse_sessions: true,
            ..Default::default()
        });
        assert!(open(&backend).is_none());
        assert_eq!(backend.destroyed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_closed_session_calls_are_noops() {
        let backend = Arc::new(FakeBackend::default());
        let mut session = open(&backend).unwrap();
        session.close();

        assert!(!session.sort());
        assert!(!session.clear_user_metadata());
        assert!(session.plugin_details("Skyrim.esm").is_none());
        assert!(session.general_messages().is_empty());
        assert_eq!(backend.calls(), vec!["create skyrimse", "destroy"]);
    }

    #[test]
    fn test_status_codes_map_to_bool() {
        let backend = Arc::new(FakeBackend {
            fail_masterlist: true,
            ..Default::default()
        });
        let mut session = open(&backend).unwrap();
        assert!(!session.load_authoritative_metadata(Utf8Path::new("/m/masterlist.yaml"), None));
        assert!(session.load_user_metadata(Utf8Path::new("/u/userlist.yaml")));
        assert!(session.sort());
    }

    #[test]
    fn test_payloads_are_decoded_and_freed() {
        let mut details = std::collections::HashMap::new();
        details.insert(
            "dirty.esp".to_string(),
            r#"{"name":"Dirty.esp","has_masterlist":true,"dirty":[{"crc":"0x0000ABCD","utility":"SSEEdit","itm":3}]}"#
                .to_string(),
        );
        details.insert("broken.esp".to_string(), "{not json".to_string());
        let backend = Arc::new(FakeBackend {
            details,
            general: Some(r#"[{"level":"warn","text":"Update the masterlist"}]"#.to_string()),
            ..Default::default()
        });
        let session = open(&backend).unwrap();

        let parsed = session.plugin_details("Dirty.esp").unwrap();
        assert_eq!(parsed.dirty.len(), 1);
        assert_eq!(parsed.dirty[0].itm, 3);
        assert!(session.plugin_details("Broken.esp").is_none());
        assert!(session.plugin_details("Unknown.esp").is_none());

        let general = session.general_messages();
        assert_eq!(general.len(), 1);
        assert_eq!(general[0].level, "warn");

        assert_eq!(backend.outstanding_payloads.load(Ordering::SeqCst), 0);
    }
}
