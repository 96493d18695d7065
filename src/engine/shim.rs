use super::{EngineBackend, GameKind, RawPayload, RawSession};
use camino::Utf8Path;
use libloading::Library;
use std::ffi::{CStr, c_char, c_int, c_void};
use std::ptr;

/// Default file name of the shim library on this platform.
#[cfg(windows)]
pub const SHIM_LIBRARY_NAME: &str = "loot_shim.dll";
#[cfg(target_os = "macos")]
pub const SHIM_LIBRARY_NAME: &str = "libloot_shim.dylib";
#[cfg(not(any(windows, target_os = "macos")))]
pub const SHIM_LIBRARY_NAME: &str = "libloot_shim.so";

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("Sorting engine unavailable: failed to load {path}: {source}")]
    LoadFailed {
        path: String,
        #[source]
        source: libloading::Error,
    },
    #[error("Sorting engine library is missing required export '{symbol}': {source}")]
    MissingSymbol {
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },
}

type CreateFn = unsafe extern "C" fn(c_int, *const c_char, *const c_char) -> *mut c_void;
type HandleFn = unsafe extern "C" fn(*mut c_void) -> c_int;
type DestroyFn = unsafe extern "C" fn(*mut c_void);
type MasterlistFn = unsafe extern "C" fn(*mut c_void, *const c_char, *const c_char) -> c_int;
type UserlistFn = unsafe extern "C" fn(*mut c_void, *const c_char) -> c_int;
type DetailsFn = unsafe extern "C" fn(*mut c_void, *const c_char) -> *mut c_char;
type MessagesFn = unsafe extern "C" fn(*mut c_void) -> *mut c_char;
type FreeFn = unsafe extern "C" fn(*mut c_char);

/// Engine backend over the dynamically loaded `loot_shim` library.
pub struct ShimLibrary {
    /// Keeps the library mapped while the function pointers are in use.
    #[allow(dead_code)]
    library: Library,
    create_game_handle: CreateFn,
    destroy_game_handle: DestroyFn,
    sort_plugins: HandleFn,
    load_masterlist: MasterlistFn,
    load_userlist: UserlistFn,
    clear_user_metadata: HandleFn,
    plugin_details_json: DetailsFn,
    general_messages_json: MessagesFn,
    free_json: FreeFn,
}

fn symbol<T: Copy>(lib: &Library, name: &'static str) -> Result<T, EngineError> {
    // SAFETY: callers pair each export name with its declared C signature.
    unsafe {
        lib.get::<T>(name.as_bytes())
            .map(|s| *s)
            .map_err(|source| EngineError::MissingSymbol {
                symbol: name,
                source,
            })
    }
}

impl ShimLibrary {
    /// Load the shim library and resolve every export.
    pub fn load(path: &Utf8Path) -> Result<Self, EngineError> {
        // SAFETY: loading runs the library's initializers; the shim has none
        // beyond static setup.
        let library = unsafe { Library::new(path.as_std_path()) }.map_err(|source| {
            EngineError::LoadFailed {
                path: path.to_string(),
                source,
            }
        })?;

        let shim = Self {
            create_game_handle: symbol(&library, "loot_create_game_handle")?,
            destroy_game_handle: symbol(&library, "loot_destroy_game_handle")?,
            sort_plugins: symbol(&library, "loot_sort_plugins")?,
            load_masterlist: symbol(&library, "loot_load_masterlist")?,
            load_userlist: symbol(&library, "loot_load_userlist")?,
            clear_user_metadata: symbol(&library, "loot_clear_user_metadata")?,
            plugin_details_json: symbol(&library, "loot_get_plugin_details_json")?,
            general_messages_json: symbol(&library, "loot_get_general_messages_json")?,
            free_json: symbol(&library, "loot_free_json")?,
            library,
        };

        tracing::info!("Loaded sorting engine library from {}", path);
        Ok(shim)
    }
}

impl EngineBackend for ShimLibrary {
    fn create_session(
        &self,
        game: GameKind,
        content_path: &CStr,
        install_path: &CStr,
    ) -> Option<RawSession> {
        // SAFETY: both strings outlive the call; the shim copies them.
        let handle = unsafe {
            (self.create_game_handle)(game.code(), content_path.as_ptr(), install_path.as_ptr())
        };
        RawSession::new(handle)
    }

    fn destroy_session(&self, session: RawSession) {
        // SAFETY: the handle came from `create_session` and is destroyed once.
        unsafe { (self.destroy_game_handle)(session.as_ptr()) }
    }

    fn sort(&self, session: RawSession) -> c_int {
        // SAFETY: live handle owned by the calling session.
        unsafe { (self.sort_plugins)(session.as_ptr()) }
    }

    fn load_masterlist(&self, session: RawSession, path: &CStr, prelude: Option<&CStr>) -> c_int {
        let prelude = prelude.map_or(ptr::null(), CStr::as_ptr);
        // SAFETY: live handle; string arguments outlive the call.
        unsafe { (self.load_masterlist)(session.as_ptr(), path.as_ptr(), prelude) }
    }

    fn load_userlist(&self, session: RawSession, path: &CStr) -> c_int {
        // SAFETY: live handle; string argument outlives the call.
        unsafe { (self.load_userlist)(session.as_ptr(), path.as_ptr()) }
    }

    fn clear_user_metadata(&self, session: RawSession) -> c_int {
        // SAFETY: live handle owned by the calling session.
        unsafe { (self.clear_user_metadata)(session.as_ptr()) }
    }

    fn plugin_details_json(&self, session: RawSession, plugin: &CStr) -> Option<RawPayload> {
        // SAFETY: live handle; the returned string is released via `free_payload`.
        RawPayload::new(unsafe { (self.plugin_details_json)(session.as_ptr(), plugin.as_ptr()) })
    }

    fn general_messages_json(&self, session: RawSession) -> Option<RawPayload> {
        // SAFETY: live handle; the returned string is released via `free_payload`.
        RawPayload::new(unsafe { (self.general_messages_json)(session.as_ptr()) })
    }

    fn free_payload(&self, payload: RawPayload) {
        // SAFETY: payload was allocated by this library and is freed once.
        unsafe { (self.free_json)(payload.as_ptr()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_library_is_load_failure() {
        let result = ShimLibrary::load(Utf8Path::new("/nonexistent/libloot_shim.so"));
        let err = result.err().unwrap();
        assert!(matches!(err, EngineError::LoadFailed { .. }));
        assert!(err.to_string().contains("Sorting engine unavailable"));
    }
}
