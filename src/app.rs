use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Instant;

use tracing::{debug, info, trace, warn};
use winit::event::Event;
use winit::event_loop::{ControlFlow, EventLoop, EventLoopBuilder};

use crate::clipboard::{ClipboardBackend, ClipboardManager, Monitor, SystemClipboard, POLL_INTERVAL};
use crate::database::{load_modifiers, load_settings, save_modifiers, KeyValueStore, SqliteStore};
use crate::error::{ClipError, ClipResult};
use crate::hotkey::{
    spawn_listener, Dispatch, EnigoInjector, HotkeyDispatcher, HotkeyRegistration, InputInjector,
    KeyEvent, NoopInjector, StaticPermissions,
};
use crate::models::{HotkeyModifiers, Settings};
use crate::notify::{LogNotifier, Notifier};

const NOTIFY_PREVIEW_CHARS: usize = 60;

/// Everything the app loop reacts to. Producers live on other threads.
#[derive(Clone, Debug, PartialEq)]
pub enum AppEvent {
    Tick,
    Key(KeyEvent),
    SettingsChanged(Settings),
    ModifiersChanged(HotkeyModifiers),
    Shutdown,
}

/// Asks the thread owning the OS registration to bind the digit chords to
/// the given modifiers, or to drop them on `None`.
pub type Rebind = Box<dyn FnMut(Option<HotkeyModifiers>) + Send>;

/// Single owner of the history and the dispatcher.
pub struct App<B, S> {
    manager: ClipboardManager<B, S>,
    dispatcher: HotkeyDispatcher,
    injector: Box<dyn InputInjector>,
    notifier: Box<dyn Notifier>,
    rebind: Option<Rebind>,
}

impl<B: ClipboardBackend, S: KeyValueStore> App<B, S> {
    pub fn new(
        manager: ClipboardManager<B, S>,
        dispatcher: HotkeyDispatcher,
        injector: Box<dyn InputInjector>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        Self {
            manager,
            dispatcher,
            injector,
            notifier,
            rebind: None,
        }
    }

    pub fn with_rebind(mut self, rebind: Rebind) -> Self {
        self.rebind = Some(rebind);
        self.sync_registration();
        self
    }

    pub fn manager(&self) -> &ClipboardManager<B, S> {
        &self.manager
    }

    pub fn dispatcher(&self) -> &HotkeyDispatcher {
        &self.dispatcher
    }

    /// Drains `events` until `Shutdown` arrives or every producer is gone.
    pub fn run(&mut self, events: Receiver<AppEvent>) {
        while let Ok(event) = events.recv() {
            if !self.handle(event, Instant::now()) {
                break;
            }
        }
        info!("app loop finished");
    }

    /// Applies one event. Returns `false` once the loop should stop.
    pub fn handle(&mut self, event: AppEvent, now: Instant) -> bool {
        match event {
            AppEvent::Tick => self.on_tick(),
            AppEvent::Key(key) => self.on_key(key, now),
            AppEvent::SettingsChanged(settings) => self.on_settings(settings),
            AppEvent::ModifiersChanged(modifiers) => self.on_modifiers(modifiers),
            AppEvent::Shutdown => return false,
        }
        true
    }

    fn on_tick(&mut self) {
        // CLI commands write to the same database while the daemon runs.
        if self.manager.refresh_from_store() {
            self.on_store_reloaded();
        }

        let Some(id) = self.manager.poll() else {
            return;
        };
        if !self.manager.settings().notify_on_capture {
            return;
        }
        if let Some(entry) = self.manager.history().find(id) {
            let title = format!("Copied {}", entry.kind.display_name());
            let body = entry.preview(NOTIFY_PREVIEW_CHARS);
            self.notifier.notify(&title, &body);
        }
    }

    fn on_store_reloaded(&mut self) {
        let modifiers = load_modifiers(self.manager.store());
        self.dispatcher.set_modifiers(modifiers);
        self.dispatcher.set_enabled(self.manager.settings().hotkeys_enabled);
        self.sync_registration();
    }

    fn on_key(&mut self, key: KeyEvent, now: Instant) {
        match self.dispatcher.handle(key, now) {
            Dispatch::Activate { index } => self.activate(index),
            other => trace!(?key, outcome = ?other, "key event not dispatched"),
        }
    }

    fn activate(&mut self, index: usize) {
        let entry = match self.manager.activate_index(index) {
            Ok(entry) => entry,
            Err(ClipError::NotFound(reason)) => {
                debug!(index, %reason, "hotkey slot is empty");
                return;
            }
            Err(err) => {
                warn!(index, error = %err, "failed to activate history entry");
                return;
            }
        };

        let settings = self.manager.settings();
        let (auto_paste, notify) = (settings.auto_paste, settings.notify_on_hotkey);
        if auto_paste && self.dispatcher.can_auto_paste() {
            if let Err(err) = self.injector.paste() {
                warn!(error = %err, "auto-paste failed");
            }
        }
        if notify {
            let title = format!("Pasted item {}", index + 1);
            self.notifier.notify(&title, &entry.preview(NOTIFY_PREVIEW_CHARS));
        }
    }

    fn on_settings(&mut self, settings: Settings) {
        self.manager.apply_settings(settings);
        self.dispatcher.set_enabled(self.manager.settings().hotkeys_enabled);
        self.sync_registration();
    }

    fn on_modifiers(&mut self, modifiers: HotkeyModifiers) {
        self.dispatcher.set_modifiers(modifiers);
        match save_modifiers(self.manager.store(), &modifiers) {
            Ok(()) => self.manager.mark_synced(),
            Err(err) => warn!(error = %err, "failed to persist hotkey modifiers"),
        }
        self.sync_registration();
    }

    /// OS chords exist exactly while the dispatcher is active.
    fn sync_registration(&mut self) {
        let target = self
            .dispatcher
            .is_active()
            .then(|| self.dispatcher.modifiers());
        if let Some(rebind) = self.rebind.as_mut() {
            rebind(target);
        }
    }
}

#[derive(Clone, Debug)]
pub struct RunOptions {
    pub db_path: PathBuf,
    pub hotkeys: bool,
    pub monitor: bool,
}

/// Messages for the main-thread event loop that owns the hotkey registration.
#[derive(Debug)]
enum HostEvent {
    Hotkey(u32),
    Rebind(Option<HotkeyModifiers>),
    Exit,
}

/// Runs the daemon until every producer stops.
///
/// With hotkeys on, the calling thread must be the main thread: it runs the
/// winit event loop that macOS and Windows need to deliver global hotkeys,
/// and the app loop moves to a worker thread.
pub fn run(options: RunOptions) -> ClipResult<()> {
    let store = SqliteStore::open(&options.db_path)?;
    let settings = load_settings(&store);
    let (tx, rx) = mpsc::channel();

    let monitor = Monitor::new();
    if options.monitor && settings.monitor_on_launch {
        let tick_tx = tx.clone();
        monitor.start(POLL_INTERVAL, move || tick_tx.send(AppEvent::Tick).is_ok());
    } else {
        info!("clipboard monitor not started");
    }

    let host = if options.hotkeys {
        match build_event_loop().and_then(|event_loop| Ok((event_loop, HotkeyRegistration::new()?))) {
            Ok(host) => Some(host),
            Err(err) => {
                warn!(error = %err, "global hotkeys unavailable");
                None
            }
        }
    } else {
        None
    };

    let result = match host {
        Some((event_loop, registration)) => {
            run_with_host_loop(event_loop, registration, tx, rx, store, settings)
        }
        None => {
            drop(tx);
            build_app(store, settings, options.hotkeys).map(|mut app| app.run(rx))
        }
    };
    monitor.stop();
    result
}

fn build_event_loop() -> ClipResult<EventLoop<HostEvent>> {
    #[cfg_attr(not(target_os = "macos"), allow(unused_mut))]
    let mut builder = EventLoopBuilder::<HostEvent>::with_user_event();
    #[cfg(target_os = "macos")]
    {
        use winit::platform::macos::{ActivationPolicy, EventLoopBuilderExtMacOS};
        builder.with_activation_policy(ActivationPolicy::Accessory);
    }
    Ok(builder.build()?)
}

fn build_app(
    store: SqliteStore,
    settings: Settings,
    hotkeys: bool,
) -> ClipResult<App<SystemClipboard, SqliteStore>> {
    let modifiers = load_modifiers(&store);
    let backend = SystemClipboard::new()?;
    let manager = ClipboardManager::load(backend, store, settings.clone());

    let dispatcher = HotkeyDispatcher::new(
        modifiers,
        settings.hotkeys_enabled && hotkeys,
        Box::new(StaticPermissions::granted()),
    );
    let injector: Box<dyn InputInjector> = match EnigoInjector::new() {
        Ok(injector) => Box::new(injector),
        Err(err) => {
            warn!(error = %err, "input injection unavailable, auto-paste disabled");
            Box::new(NoopInjector)
        }
    };
    Ok(App::new(manager, dispatcher, injector, Box::new(LogNotifier)))
}

/// The registration stays on this thread; the app loop reaches it through
/// proxy messages.
fn run_with_host_loop(
    event_loop: EventLoop<HostEvent>,
    mut registration: HotkeyRegistration,
    tx: Sender<AppEvent>,
    rx: Receiver<AppEvent>,
    store: SqliteStore,
    settings: Settings,
) -> ClipResult<()> {
    let hotkey_proxy = event_loop.create_proxy();
    spawn_listener(move |id| hotkey_proxy.send_event(HostEvent::Hotkey(id)).is_ok());

    let rebind_proxy = event_loop.create_proxy();
    let rebind: Rebind = Box::new(move |modifiers| {
        if rebind_proxy.send_event(HostEvent::Rebind(modifiers)).is_err() {
            debug!("event loop closed, rebind dropped");
        }
    });

    let exit_proxy = event_loop.create_proxy();
    let worker = thread::Builder::new()
        .name("clipshelf-app".to_string())
        .spawn(move || {
            let result = build_app(store, settings, true).map(|app| {
                let mut app = app.with_rebind(rebind);
                app.run(rx);
            });
            let _ = exit_proxy.send_event(HostEvent::Exit);
            result
        })?;

    event_loop.run(move |event, elwt| match event {
        Event::UserEvent(HostEvent::Hotkey(id)) => match registration.lookup(id) {
            Some(key) => {
                if tx.send(AppEvent::Key(key)).is_err() {
                    elwt.exit();
                }
            }
            None => debug!(id, "unknown hotkey id"),
        },
        Event::UserEvent(HostEvent::Rebind(Some(modifiers))) => {
            if let Err(err) = registration.register(modifiers) {
                warn!(error = %err, "hotkeys unavailable");
            }
        }
        Event::UserEvent(HostEvent::Rebind(None)) => registration.unregister_all(),
        Event::UserEvent(HostEvent::Exit) => elwt.exit(),
        Event::AboutToWait => elwt.set_control_flow(ControlFlow::Wait),
        _ => {}
    })?;

    worker
        .join()
        .map_err(|_| ClipError::Io(std::io::Error::other("app thread panicked")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::MemoryClipboard;
    use crate::database::{MemoryStore, load_history, save_history, save_settings};
    use crate::hotkey::DEBOUNCE;
    use crate::notify::RecordingNotifier;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct CountingInjector(Arc<AtomicUsize>);

    impl InputInjector for CountingInjector {
        fn paste(&mut self) -> ClipResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Harness {
        app: App<MemoryClipboard, MemoryStore>,
        clipboard: MemoryClipboard,
        store: MemoryStore,
        notifier: RecordingNotifier,
        pastes: Arc<AtomicUsize>,
    }

    fn ctrl_option() -> HotkeyModifiers {
        HotkeyModifiers::recommended()
    }

    fn harness(settings: Settings) -> Harness {
        let clipboard = MemoryClipboard::new();
        let store = MemoryStore::new();
        let manager = ClipboardManager::load(clipboard.clone(), store.clone(), settings);
        let dispatcher =
            HotkeyDispatcher::new(ctrl_option(), true, Box::new(StaticPermissions::granted()));
        let injector = CountingInjector::default();
        let pastes = Arc::clone(&injector.0);
        let notifier = RecordingNotifier::new();
        let app = App::new(manager, dispatcher, Box::new(injector), Box::new(notifier.clone()));
        Harness {
            app,
            clipboard,
            store,
            notifier,
            pastes,
        }
    }

    fn copy_and_tick(h: &mut Harness, text: &str) {
        h.clipboard.copy(text);
        assert!(h.app.handle(AppEvent::Tick, Instant::now()));
    }

    #[test]
    fn tick_captures_new_clipboard_text() {
        let mut h = harness(Settings::default());
        copy_and_tick(&mut h, "first");
        copy_and_tick(&mut h, "second");
        let contents: Vec<_> = h.app.manager().history().iter().map(|e| e.content.clone()).collect();
        assert_eq!(contents, vec!["second", "first"]);
        assert!(h.notifier.sent().is_empty());
    }

    #[test]
    fn capture_notification_follows_setting() {
        let settings = Settings {
            notify_on_capture: true,
            ..Settings::default()
        };
        let mut h = harness(settings);
        copy_and_tick(&mut h, "https://example.com");
        assert_eq!(
            h.notifier.sent(),
            vec![("Copied URL".to_string(), "https://example.com".to_string())]
        );
    }

    #[test]
    fn hotkey_activates_pastes_and_notifies() {
        let mut h = harness(Settings::default());
        copy_and_tick(&mut h, "older");
        copy_and_tick(&mut h, "newer");

        h.app.handle(AppEvent::Key(KeyEvent::digit(2, ctrl_option())), Instant::now());
        assert_eq!(h.clipboard.contents().as_deref(), Some("older"));
        assert_eq!(h.pastes.load(Ordering::SeqCst), 1);
        assert_eq!(h.notifier.sent()[0].0, "Pasted item 2");

        // Writing the entry back must not produce a new capture.
        h.app.handle(AppEvent::Tick, Instant::now());
        assert_eq!(h.app.manager().history().len(), 2);
    }

    #[test]
    fn repeated_chord_inside_debounce_window_activates_once() {
        let mut h = harness(Settings::default());
        copy_and_tick(&mut h, "only");
        let start = Instant::now();
        let key = AppEvent::Key(KeyEvent::digit(1, ctrl_option()));
        h.app.handle(key.clone(), start);
        h.app.handle(key.clone(), start + Duration::from_millis(100));
        assert_eq!(h.pastes.load(Ordering::SeqCst), 1);

        h.app.handle(key, start + DEBOUNCE);
        assert_eq!(h.pastes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn empty_slot_is_a_quiet_no_op() {
        let mut h = harness(Settings::default());
        copy_and_tick(&mut h, "only");
        h.app.handle(AppEvent::Key(KeyEvent::digit(5, ctrl_option())), Instant::now());
        assert_eq!(h.pastes.load(Ordering::SeqCst), 0);
        assert!(h.notifier.sent().is_empty());
        assert_eq!(h.clipboard.contents().as_deref(), Some("only"));
    }

    #[test]
    fn auto_paste_and_hotkey_notice_can_be_switched_off() {
        let settings = Settings {
            auto_paste: false,
            notify_on_hotkey: false,
            ..Settings::default()
        };
        let mut h = harness(settings);
        copy_and_tick(&mut h, "text");
        h.app.handle(AppEvent::Key(KeyEvent::digit(1, ctrl_option())), Instant::now());
        assert_eq!(h.pastes.load(Ordering::SeqCst), 0);
        assert!(h.notifier.sent().is_empty());
    }

    #[test]
    fn settings_change_truncates_persists_and_disables_hotkeys() {
        let mut h = harness(Settings::default());
        for i in 0..15 {
            copy_and_tick(&mut h, &format!("entry {i}"));
        }
        let settings = Settings {
            max_history_size: 10,
            hotkeys_enabled: false,
            ..Settings::default()
        };
        h.app.handle(AppEvent::SettingsChanged(settings), Instant::now());

        assert_eq!(h.app.manager().history().len(), 10);
        assert_eq!(load_history(h.app.manager().store()).len(), 10);
        assert_eq!(load_settings(h.app.manager().store()).max_history_size, 10);
        assert!(!h.app.dispatcher().is_active());
    }

    #[test]
    fn modifier_change_rebinds_the_chord() {
        let mut h = harness(Settings::default());
        copy_and_tick(&mut h, "text");
        let shifted: HotkeyModifiers = "⌘⇧".parse().unwrap();
        h.app.handle(AppEvent::ModifiersChanged(shifted), Instant::now());
        assert_eq!(load_modifiers(h.app.manager().store()), shifted);

        h.app.handle(AppEvent::Key(KeyEvent::digit(1, ctrl_option())), Instant::now());
        assert_eq!(h.pastes.load(Ordering::SeqCst), 0);
        h.app.handle(AppEvent::Key(KeyEvent::digit(1, shifted)), Instant::now());
        assert_eq!(h.pastes.load(Ordering::SeqCst), 1);
    }

    fn recording_rebind() -> (Rebind, Arc<Mutex<Vec<Option<HotkeyModifiers>>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let rebind: Rebind = Box::new(move |modifiers| sink.lock().unwrap().push(modifiers));
        (rebind, calls)
    }

    #[test]
    fn registration_follows_settings_and_modifiers() {
        let h = harness(Settings::default());
        let (rebind, calls) = recording_rebind();
        let mut app = h.app.with_rebind(rebind);
        let shifted: HotkeyModifiers = "⌘⇧".parse().unwrap();

        let off = Settings {
            hotkeys_enabled: false,
            ..Settings::default()
        };
        app.handle(AppEvent::SettingsChanged(off), Instant::now());
        app.handle(AppEvent::ModifiersChanged(shifted), Instant::now());
        app.handle(AppEvent::SettingsChanged(Settings::default()), Instant::now());

        assert_eq!(
            *calls.lock().unwrap(),
            vec![Some(ctrl_option()), None, None, Some(shifted)]
        );
    }

    #[test]
    fn tick_reloads_changes_written_by_another_handle() {
        let mut h = harness(Settings::default());
        let (rebind, calls) = recording_rebind();
        copy_and_tick(&mut h, "secret");

        let Harness {
            app,
            clipboard,
            store,
            ..
        } = h;
        let mut app = app.with_rebind(rebind);
        save_history(&store, &[]).unwrap();
        save_settings(
            &store,
            &Settings {
                max_history_size: 10,
                ..Settings::default()
            },
        )
        .unwrap();
        let shifted: HotkeyModifiers = "⌘⇧".parse().unwrap();
        save_modifiers(&store, &shifted).unwrap();

        clipboard.copy("after clear");
        app.handle(AppEvent::Tick, Instant::now());

        let contents: Vec<_> = app.manager().history().iter().map(|e| e.content.clone()).collect();
        assert_eq!(contents, vec!["after clear"]);
        assert_eq!(app.manager().settings().max_history_size, 10);
        assert_eq!(app.dispatcher().modifiers(), shifted);
        assert_eq!(calls.lock().unwrap().last(), Some(&Some(shifted)));
        assert_eq!(load_history(&store).len(), 1);
    }

    #[test]
    fn shutdown_stops_the_loop() {
        let mut h = harness(Settings::default());
        assert!(!h.app.handle(AppEvent::Shutdown, Instant::now()));
    }

    #[test]
    fn run_drains_channel_until_shutdown() {
        let mut h = harness(Settings::default());
        let (tx, rx) = mpsc::channel();
        h.clipboard.copy("queued");
        tx.send(AppEvent::Tick).unwrap();
        tx.send(AppEvent::Shutdown).unwrap();
        tx.send(AppEvent::Tick).unwrap();
        h.app.run(rx);
        assert_eq!(h.app.manager().history().len(), 1);
    }
}
