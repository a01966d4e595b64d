//! Android media sessions via JNI
//!
//! Talks to `MediaSessionManager.getActiveSessions`, which only answers for
//! apps whose notification listener is enabled. The listener string lives in
//! `Settings.Secure.enabled_notification_listeners`.

use crate::Backend;
use anyhow::{anyhow, Result};
use jni::objects::{GlobalRef, JObject, JString, JValue};
use jni::sys::jstring;
use jni::{JNIEnv, JavaVM};
use nowplaying_core::{
    ComponentName, ListenerSettings, MediaBridge, PlaybackState, RawMetadata, RawPlaybackState,
    RegistryError, Session, SessionError, SessionHandle, SessionRegistry, SettingsLauncher,
    TransportActions, TransportCommand,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

const MEDIA_SESSION_SERVICE: &str = "media_session";
const ENABLED_NOTIFICATION_LISTENERS: &str = "enabled_notification_listeners";
const ACTION_NOTIFICATION_LISTENER_SETTINGS: &str =
    "android.settings.ACTION_NOTIFICATION_LISTENER_SETTINGS";
const FLAG_ACTIVITY_NEW_TASK: i32 = 0x1000_0000;

const METADATA_KEY_TITLE: &str = "android.media.metadata.TITLE";
const METADATA_KEY_ARTIST: &str = "android.media.metadata.ARTIST";
const METADATA_KEY_ALBUM: &str = "android.media.metadata.ALBUM";
const METADATA_KEY_DURATION: &str = "android.media.metadata.DURATION";

/// A failed JNI call, with the pending Java exception already cleared
#[derive(Debug)]
enum JavaFailure {
    Exception { class: String, message: String },
    Jni(jni::errors::Error),
}

impl JavaFailure {
    fn is(&self, class_name: &str) -> bool {
        matches!(self, JavaFailure::Exception { class, .. } if class == class_name)
    }

    fn into_anyhow(self, what: &str) -> anyhow::Error {
        match self {
            JavaFailure::Exception { class, message } => anyhow!("{}: {}: {}", what, class, message),
            JavaFailure::Jni(e) => anyhow!("{}: {}", what, e),
        }
    }

    /// A controller whose owning session died
    fn into_session_error(self, what: &str) -> SessionError {
        if self.is("android.os.DeadObjectException") || self.is("java.lang.IllegalStateException") {
            debug!("{}: session is gone", what);
            SessionError::Gone
        } else {
            SessionError::Fault(self.into_anyhow(what))
        }
    }
}

type JavaResult<T> = std::result::Result<T, JavaFailure>;

/// Convert a JNI error, pulling out and clearing any pending Java exception.
fn catch(env: &mut JNIEnv, err: jni::errors::Error) -> JavaFailure {
    if !matches!(err, jni::errors::Error::JavaException) {
        return JavaFailure::Jni(err);
    }

    let throwable = match env.exception_occurred() {
        Ok(throwable) if !throwable.is_null() => throwable,
        _ => return JavaFailure::Jni(err),
    };
    let _ = env.exception_clear();

    let class = env
        .call_method(&throwable, "getClass", "()Ljava/lang/Class;", &[])
        .and_then(|v| v.l())
        .and_then(|class| env.call_method(&class, "getName", "()Ljava/lang/String;", &[]))
        .and_then(|v| v.l())
        .ok()
        .and_then(|name| string_or_none(env, name).ok().flatten())
        .unwrap_or_else(|| "java.lang.Throwable".to_string());
    let message = env
        .call_method(&throwable, "getMessage", "()Ljava/lang/String;", &[])
        .and_then(|v| v.l())
        .ok()
        .and_then(|msg| string_or_none(env, msg).ok().flatten())
        .unwrap_or_default();

    JavaFailure::Exception { class, message }
}

fn string_or_none(env: &mut JNIEnv, obj: JObject) -> jni::errors::Result<Option<String>> {
    if obj.is_null() {
        return Ok(None);
    }
    let jstr = JString::from(obj);
    let value: String = env.get_string(&jstr)?.into();
    Ok(Some(value))
}

fn call_object<'local>(
    env: &mut JNIEnv<'local>,
    obj: &JObject,
    name: &str,
    sig: &str,
    args: &[JValue],
) -> JavaResult<JObject<'local>> {
    match env.call_method(obj, name, sig, args).and_then(|v| v.l()) {
        Ok(value) => Ok(value),
        Err(e) => Err(catch(env, e)),
    }
}

fn call_string(
    env: &mut JNIEnv,
    obj: &JObject,
    name: &str,
    sig: &str,
    args: &[JValue],
) -> JavaResult<Option<String>> {
    let value = call_object(env, obj, name, sig, args)?;
    string_or_none(env, value).map_err(JavaFailure::Jni)
}

fn call_long(
    env: &mut JNIEnv,
    obj: &JObject,
    name: &str,
    sig: &str,
    args: &[JValue],
) -> JavaResult<i64> {
    match env.call_method(obj, name, sig, args).and_then(|v| v.j()) {
        Ok(value) => Ok(value),
        Err(e) => Err(catch(env, e)),
    }
}

fn metadata_string(env: &mut JNIEnv, metadata: &JObject, key: &str) -> JavaResult<Option<String>> {
    let key = env.new_string(key).map_err(JavaFailure::Jni)?;
    call_string(
        env,
        metadata,
        "getString",
        "(Ljava/lang/String;)Ljava/lang/String;",
        &[JValue::Object(&key)],
    )
}

fn call_void(env: &mut JNIEnv, obj: &JObject, name: &str) -> JavaResult<()> {
    match env.call_method(obj, name, "()V", &[]).and_then(|v| v.v()) {
        Ok(()) => Ok(()),
        Err(e) => Err(catch(env, e)),
    }
}

fn attach(vm: &JavaVM) -> Result<jni::AttachGuard<'_>> {
    vm.attach_current_thread()
        .map_err(|e| anyhow!("failed to attach thread to the JVM: {}", e))
}

/// One `android.media.session.MediaController`
pub struct AndroidSession {
    vm: Arc<JavaVM>,
    controller: GlobalRef,
    package: String,
}

impl AndroidSession {
    fn read_metadata(env: &mut JNIEnv, controller: &JObject) -> JavaResult<Option<RawMetadata>> {
        let metadata = call_object(
            env,
            controller,
            "getMetadata",
            "()Landroid/media/MediaMetadata;",
            &[],
        )?;
        if metadata.is_null() {
            return Ok(None);
        }

        let title = metadata_string(env, &metadata, METADATA_KEY_TITLE)?;
        let artist = metadata_string(env, &metadata, METADATA_KEY_ARTIST)?;
        let album = metadata_string(env, &metadata, METADATA_KEY_ALBUM)?;

        let key = env.new_string(METADATA_KEY_DURATION).map_err(JavaFailure::Jni)?;
        let duration_ms = call_long(
            env,
            &metadata,
            "getLong",
            "(Ljava/lang/String;)J",
            &[JValue::Object(&key)],
        )?;

        Ok(Some(RawMetadata {
            title,
            artist,
            album,
            duration_ms: Some(duration_ms),
        }))
    }

    fn read_playback(env: &mut JNIEnv, controller: &JObject) -> JavaResult<Option<RawPlaybackState>> {
        let state = call_object(
            env,
            controller,
            "getPlaybackState",
            "()Landroid/media/session/PlaybackState;",
            &[],
        )?;
        if state.is_null() {
            return Ok(None);
        }

        let code = match env.call_method(&state, "getState", "()I", &[]).and_then(|v| v.i()) {
            Ok(code) => code,
            Err(e) => return Err(catch(env, e)),
        };
        let position_ms = call_long(env, &state, "getPosition", "()J", &[])?;
        let actions = call_long(env, &state, "getActions", "()J", &[])?;

        Ok(Some(RawPlaybackState {
            state: PlaybackState::from_code(code),
            position_ms,
            actions: Some(TransportActions::from_raw(actions)),
        }))
    }
}

impl SessionHandle for AndroidSession {
    fn package_name(&self) -> String {
        self.package.clone()
    }

    fn metadata(&self) -> std::result::Result<Option<RawMetadata>, SessionError> {
        let mut env = attach(&self.vm)?;
        Self::read_metadata(&mut env, self.controller.as_obj())
            .map_err(|e| e.into_session_error("reading metadata"))
    }

    fn playback_state(&self) -> std::result::Result<Option<RawPlaybackState>, SessionError> {
        let mut env = attach(&self.vm)?;
        Self::read_playback(&mut env, self.controller.as_obj())
            .map_err(|e| e.into_session_error("reading playback state"))
    }

    fn send(&self, command: TransportCommand) -> std::result::Result<(), SessionError> {
        let method = match command {
            TransportCommand::Play => "play",
            TransportCommand::Pause => "pause",
            TransportCommand::SkipToNext => "skipToNext",
            TransportCommand::SkipToPrevious => "skipToPrevious",
        };

        let mut env = attach(&self.vm)?;
        let controls = call_object(
            &mut env,
            self.controller.as_obj(),
            "getTransportControls",
            "()Landroid/media/session/MediaController$TransportControls;",
            &[],
        )
        .map_err(|e| e.into_session_error("getting transport controls"))?;

        call_void(&mut env, &controls, method).map_err(|e| e.into_session_error(method))
    }
}

/// Handle to the JVM plus an application `Context`
#[derive(Clone)]
pub struct AndroidContext {
    vm: Arc<JavaVM>,
    context: GlobalRef,
}

impl AndroidContext {
    pub fn new(env: &mut JNIEnv, context: &JObject) -> Result<Self> {
        let vm = env
            .get_java_vm()
            .map_err(|e| anyhow!("failed to get JavaVM: {}", e))?;
        let context = env
            .new_global_ref(context)
            .map_err(|e| anyhow!("failed to pin context: {}", e))?;
        Ok(Self {
            vm: Arc::new(vm),
            context,
        })
    }

    fn list_controllers(&self, listener: &ComponentName) -> JavaResult<Vec<AndroidSession>> {
        let mut env = self.vm.attach_current_thread().map_err(JavaFailure::Jni)?;
        let context = self.context.as_obj();

        let service = env.new_string(MEDIA_SESSION_SERVICE).map_err(JavaFailure::Jni)?;
        let manager = call_object(
            &mut env,
            context,
            "getSystemService",
            "(Ljava/lang/String;)Ljava/lang/Object;",
            &[JValue::Object(&service)],
        )?;

        let package = env.new_string(&listener.package).map_err(JavaFailure::Jni)?;
        let class = env.new_string(&listener.class).map_err(JavaFailure::Jni)?;
        let component = match env.new_object(
            "android/content/ComponentName",
            "(Ljava/lang/String;Ljava/lang/String;)V",
            &[JValue::Object(&package), JValue::Object(&class)],
        ) {
            Ok(component) => component,
            Err(e) => return Err(catch(&mut env, e)),
        };

        let list = call_object(
            &mut env,
            &manager,
            "getActiveSessions",
            "(Landroid/content/ComponentName;)Ljava/util/List;",
            &[JValue::Object(&component)],
        )?;
        if list.is_null() {
            return Ok(Vec::new());
        }

        let size = match env.call_method(&list, "size", "()I", &[]).and_then(|v| v.i()) {
            Ok(size) => size,
            Err(e) => return Err(catch(&mut env, e)),
        };

        let mut sessions = Vec::with_capacity(size.max(0) as usize);
        for index in 0..size {
            let controller = call_object(
                &mut env,
                &list,
                "get",
                "(I)Ljava/lang/Object;",
                &[JValue::Int(index)],
            )?;
            let package = call_string(
                &mut env,
                &controller,
                "getPackageName",
                "()Ljava/lang/String;",
                &[],
            )?
            .unwrap_or_default();
            let controller = env.new_global_ref(&controller).map_err(JavaFailure::Jni)?;

            sessions.push(AndroidSession {
                vm: self.vm.clone(),
                controller,
                package,
            });
        }

        Ok(sessions)
    }

    fn enabled_listeners(&self) -> JavaResult<Option<String>> {
        let mut env = self.vm.attach_current_thread().map_err(JavaFailure::Jni)?;
        let resolver = call_object(
            &mut env,
            self.context.as_obj(),
            "getContentResolver",
            "()Landroid/content/ContentResolver;",
            &[],
        )?;
        let name = env
            .new_string(ENABLED_NOTIFICATION_LISTENERS)
            .map_err(JavaFailure::Jni)?;

        let flat = match env
            .call_static_method(
                "android/provider/Settings$Secure",
                "getString",
                "(Landroid/content/ContentResolver;Ljava/lang/String;)Ljava/lang/String;",
                &[JValue::Object(&resolver), JValue::Object(&name)],
            )
            .and_then(|v| v.l())
        {
            Ok(flat) => flat,
            Err(e) => return Err(catch(&mut env, e)),
        };
        string_or_none(&mut env, flat).map_err(JavaFailure::Jni)
    }

    fn open_listener_settings(&self) -> JavaResult<()> {
        let mut env = self.vm.attach_current_thread().map_err(JavaFailure::Jni)?;
        let action = env
            .new_string(ACTION_NOTIFICATION_LISTENER_SETTINGS)
            .map_err(JavaFailure::Jni)?;
        let intent = match env.new_object(
            "android/content/Intent",
            "(Ljava/lang/String;)V",
            &[JValue::Object(&action)],
        ) {
            Ok(intent) => intent,
            Err(e) => return Err(catch(&mut env, e)),
        };

        // Started from a non-activity context, so it needs its own task
        call_object(
            &mut env,
            &intent,
            "addFlags",
            "(I)Landroid/content/Intent;",
            &[JValue::Int(FLAG_ACTIVITY_NEW_TASK)],
        )?;

        match env
            .call_method(
                self.context.as_obj(),
                "startActivity",
                "(Landroid/content/Intent;)V",
                &[JValue::Object(&intent)],
            )
            .and_then(|v| v.v())
        {
            Ok(()) => Ok(()),
            Err(e) => Err(catch(&mut env, e)),
        }
    }
}

/// `MediaSessionManager` on behalf of a notification listener component
pub struct AndroidRegistry {
    context: AndroidContext,
}

impl SessionRegistry for AndroidRegistry {
    fn active_sessions(
        &self,
        listener: &ComponentName,
    ) -> std::result::Result<Vec<Session>, RegistryError> {
        match self.context.list_controllers(listener) {
            Ok(sessions) => Ok(sessions
                .into_iter()
                .map(|s| Box::new(s) as Session)
                .collect()),
            Err(JavaFailure::Exception { class, message })
                if class == "java.lang.SecurityException" =>
            {
                Err(RegistryError::Security(message))
            }
            Err(other) => Err(RegistryError::Other(other.into_anyhow("getActiveSessions"))),
        }
    }
}

/// `Settings.Secure.enabled_notification_listeners`
pub struct AndroidListenerSettings {
    context: AndroidContext,
}

impl ListenerSettings for AndroidListenerSettings {
    fn enabled_listeners(&self) -> Option<String> {
        match self.context.enabled_listeners() {
            Ok(flat) => flat,
            Err(e) => {
                warn!("{:#}", e.into_anyhow("reading enabled notification listeners"));
                None
            }
        }
    }
}

/// Opens the notification listener settings screen
pub struct AndroidSettingsLauncher {
    context: AndroidContext,
}

impl SettingsLauncher for AndroidSettingsLauncher {
    fn open_listener_settings(&self) -> Result<()> {
        self.context
            .open_listener_settings()
            .map_err(|e| e.into_anyhow("starting notification listener settings"))?;
        info!("Started notification listener settings activity");
        Ok(())
    }
}

/// Build the Android backend around an application context
pub fn create_backend(context: AndroidContext) -> Backend {
    Backend {
        registry: Arc::new(AndroidRegistry {
            context: context.clone(),
        }),
        settings: Arc::new(AndroidListenerSettings {
            context: context.clone(),
        }),
        launcher: Arc::new(AndroidSettingsLauncher { context }),
    }
}

fn handle_request(
    env: &mut JNIEnv,
    context: &JObject,
    listener: &str,
    request: &str,
) -> Result<String> {
    let listener: ComponentName = listener
        .parse()
        .map_err(|e| anyhow!("bad listener component {:?}: {}", listener, e))?;
    let context = AndroidContext::new(env, context)?;
    let bridge: MediaBridge = create_backend(context).into_bridge(listener);

    let response = bridge.respond_line(request);
    Ok(serde_json::to_string(&response)?)
}

/// Called by the JVM when the library is loaded. Routes the bridge's
/// `tracing` events to logcat under the `nowplaying` tag.
#[no_mangle]
pub extern "system" fn JNI_OnLoad(
    _vm: *mut jni::sys::JavaVM,
    _reserved: *mut std::ffi::c_void,
) -> jni::sys::jint {
    android_logger::init_once(
        android_logger::Config::default()
            .with_tag("nowplaying")
            .with_max_level(log::LevelFilter::Debug),
    );
    info!("nowplaying bridge loaded");
    jni::sys::JNI_VERSION_1_6
}

/// Method-channel entry point for the Flutter host.
///
/// Takes one JSON request (`{"id":…,"method":…}`) and returns the JSON
/// response, or `null` if the response string could not be created.
#[no_mangle]
pub extern "system" fn Java_cc_koto_fluent_1lyrics_MediaBridgeNative_handleMethodCall<'local>(
    mut env: JNIEnv<'local>,
    _class: JObject<'local>,
    context: JObject<'local>,
    listener: JString<'local>,
    request: JString<'local>,
) -> jstring {
    let listener: String = match env.get_string(&listener) {
        Ok(value) => value.into(),
        Err(e) => {
            warn!("Failed to read listener argument: {}", e);
            return std::ptr::null_mut();
        }
    };
    let request: String = match env.get_string(&request) {
        Ok(value) => value.into(),
        Err(e) => {
            warn!("Failed to read request argument: {}", e);
            return std::ptr::null_mut();
        }
    };

    let payload = match handle_request(&mut env, &context, &listener, &request) {
        Ok(payload) => payload,
        Err(e) => {
            let response = nowplaying_core::MethodResponse::error(None, "fault", format!("{:#}", e));
            serde_json::to_string(&response).unwrap_or_default()
        }
    };

    match env.new_string(payload) {
        Ok(value) => value.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}
