use std::collections::HashMap;
use std::thread;
use std::time::{Duration, Instant};

use enigo::{Direction, Enigo, Key, Keyboard, Settings as EnigoSettings};
use global_hotkey::hotkey::{Code, HotKey, Modifiers};
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use tracing::{debug, info, warn};

use crate::error::{ClipError, ClipResult};
use crate::models::HotkeyModifiers;

pub const DEBOUNCE: Duration = Duration::from_millis(300);
pub const HOTKEY_SLOTS: u8 = 9;
const PASTE_SETTLE_MS: u64 = 20;
const PASTE_KEY_STEP_MS: u64 = 2;

const DIGIT_CODES: [Code; HOTKEY_SLOTS as usize] = [
    Code::Digit1,
    Code::Digit2,
    Code::Digit3,
    Code::Digit4,
    Code::Digit5,
    Code::Digit6,
    Code::Digit7,
    Code::Digit8,
    Code::Digit9,
];

/// A key-down event together with the modifiers held at that moment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyEvent {
    pub digit: Option<u8>,
    pub modifiers: HotkeyModifiers,
}

impl KeyEvent {
    pub fn digit(digit: u8, modifiers: HotkeyModifiers) -> Self {
        Self {
            digit: Some(digit),
            modifiers,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    Activate { index: usize },
    Debounced,
    Disabled,
    Ignored,
}

/// Queried, never owned: the answers may change while the process runs.
pub trait PermissionProvider {
    fn can_observe_keys(&self) -> bool;
    fn can_inject_input(&self) -> bool;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StaticPermissions {
    pub observe_keys: bool,
    pub inject_input: bool,
}

impl StaticPermissions {
    pub fn granted() -> Self {
        Self {
            observe_keys: true,
            inject_input: true,
        }
    }
}

impl Default for StaticPermissions {
    fn default() -> Self {
        Self::granted()
    }
}

impl PermissionProvider for StaticPermissions {
    fn can_observe_keys(&self) -> bool {
        self.observe_keys
    }

    fn can_inject_input(&self) -> bool {
        self.inject_input
    }
}

/// Sends a paste keystroke to whatever application has focus.
pub trait InputInjector {
    fn paste(&mut self) -> ClipResult<()>;
}

#[derive(Debug, Default)]
pub struct NoopInjector;

impl InputInjector for NoopInjector {
    fn paste(&mut self) -> ClipResult<()> {
        Ok(())
    }
}

/// Sends Cmd+V (macOS) or Ctrl+V to the focused window through enigo.
pub struct EnigoInjector {
    enigo: Enigo,
}

impl EnigoInjector {
    pub fn new() -> ClipResult<Self> {
        let enigo = Enigo::new(&EnigoSettings::default())
            .map_err(|e| ClipError::Input(e.to_string()))?;
        Ok(Self { enigo })
    }
}

impl InputInjector for EnigoInjector {
    fn paste(&mut self) -> ClipResult<()> {
        #[cfg(target_os = "macos")]
        let modifier = Key::Meta;
        #[cfg(not(target_os = "macos"))]
        let modifier = Key::Control;

        let input_err = |e: enigo::InputError| ClipError::Input(e.to_string());

        thread::sleep(Duration::from_millis(PASTE_SETTLE_MS));
        self.enigo.key(modifier, Direction::Press).map_err(input_err)?;
        thread::sleep(Duration::from_millis(PASTE_KEY_STEP_MS));
        let clicked = self.enigo.key(Key::Unicode('v'), Direction::Click);
        thread::sleep(Duration::from_millis(PASTE_KEY_STEP_MS));
        // Always release the modifier, even if the click failed.
        self.enigo.key(modifier, Direction::Release).map_err(input_err)?;
        clicked.map_err(input_err)
    }
}

/// Maps digit chords to history positions.
pub struct HotkeyDispatcher {
    modifiers: HotkeyModifiers,
    enabled: bool,
    permissions: Box<dyn PermissionProvider + Send>,
    last_dispatch: Option<Instant>,
}

impl HotkeyDispatcher {
    pub fn new(
        modifiers: HotkeyModifiers,
        enabled: bool,
        permissions: Box<dyn PermissionProvider + Send>,
    ) -> Self {
        Self {
            modifiers,
            enabled,
            permissions,
            last_dispatch: None,
        }
    }

    pub fn modifiers(&self) -> HotkeyModifiers {
        self.modifiers
    }

    pub fn set_modifiers(&mut self, modifiers: HotkeyModifiers) {
        self.modifiers = modifiers;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Hotkeys work only when enabled, permitted and bound to a non-empty
    /// modifier set.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.modifiers.is_empty() && self.permissions.can_observe_keys()
    }

    pub fn can_auto_paste(&self) -> bool {
        self.permissions.can_inject_input()
    }

    pub fn handle(&mut self, event: KeyEvent, now: Instant) -> Dispatch {
        let Some(digit) = event.digit.filter(|d| (1..=HOTKEY_SLOTS).contains(d)) else {
            return Dispatch::Ignored;
        };
        // Exact equality: holding an extra modifier voids the chord.
        if event.modifiers != self.modifiers {
            return Dispatch::Ignored;
        }
        if !self.is_active() {
            return Dispatch::Disabled;
        }
        if let Some(last) = self.last_dispatch {
            if now.saturating_duration_since(last) < DEBOUNCE {
                debug!(digit, "hotkey debounced");
                return Dispatch::Debounced;
            }
        }

        self.last_dispatch = Some(now);
        Dispatch::Activate {
            index: usize::from(digit - 1),
        }
    }
}

fn to_global_modifiers(modifiers: HotkeyModifiers) -> Modifiers {
    let mut mods = Modifiers::empty();
    if modifiers.command {
        mods |= Modifiers::SUPER;
    }
    if modifiers.option {
        mods |= Modifiers::ALT;
    }
    if modifiers.control {
        mods |= Modifiers::CONTROL;
    }
    if modifiers.shift {
        mods |= Modifiers::SHIFT;
    }
    mods
}

/// OS-level registration of the nine digit chords via `global-hotkey`.
pub struct HotkeyRegistration {
    manager: GlobalHotKeyManager,
    registered: Vec<HotKey>,
    events: HashMap<u32, KeyEvent>,
}

impl HotkeyRegistration {
    pub fn new() -> ClipResult<Self> {
        Ok(Self {
            manager: GlobalHotKeyManager::new()?,
            registered: Vec::new(),
            events: HashMap::new(),
        })
    }

    /// Replaces any previous chords with `modifiers` + 1..=9.
    pub fn register(&mut self, modifiers: HotkeyModifiers) -> ClipResult<()> {
        self.unregister_all();
        if modifiers.is_empty() {
            return Err(ClipError::Hotkey(
                "refusing to bind bare digit keys; choose at least one modifier".to_string(),
            ));
        }

        let mods = to_global_modifiers(modifiers);
        for (slot, code) in DIGIT_CODES.iter().enumerate() {
            let hotkey = HotKey::new(Some(mods), *code);
            if let Err(err) = self.manager.register(hotkey) {
                warn!(slot = slot + 1, error = %err, "failed to register hotkey");
                continue;
            }
            self.events
                .insert(hotkey.id(), KeyEvent::digit(slot as u8 + 1, modifiers));
            self.registered.push(hotkey);
        }

        if self.registered.is_empty() {
            return Err(ClipError::Hotkey("no digit hotkey could be registered".to_string()));
        }
        info!(modifiers = %modifiers.describe(), count = self.registered.len(), "hotkeys registered");
        Ok(())
    }

    pub fn unregister_all(&mut self) {
        for hotkey in self.registered.drain(..) {
            if let Err(err) = self.manager.unregister(hotkey) {
                debug!(error = %err, "hotkey unregister skipped");
            }
        }
        self.events.clear();
    }

    /// Key event registered under a `global-hotkey` id.
    pub fn lookup(&self, id: u32) -> Option<KeyEvent> {
        self.events.get(&id).copied()
    }
}

impl Drop for HotkeyRegistration {
    fn drop(&mut self) {
        self.unregister_all();
    }
}

/// Forwards the ids of pressed chords to `sink` until it returns `false`.
/// Ids are resolved with [`HotkeyRegistration::lookup`] on the thread that
/// owns the registration.
pub fn spawn_listener<F>(mut sink: F)
where
    F: FnMut(u32) -> bool + Send + 'static,
{
    thread::spawn(move || {
        let rx = GlobalHotKeyEvent::receiver();
        while let Ok(event) = rx.recv() {
            if event.state() != HotKeyState::Pressed {
                continue;
            }
            if !sink(event.id()) {
                break;
            }
        }
        debug!("hotkey listener stopped");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ctrl_option() -> HotkeyModifiers {
        HotkeyModifiers {
            control: true,
            option: true,
            ..HotkeyModifiers::NONE
        }
    }

    fn dispatcher() -> HotkeyDispatcher {
        HotkeyDispatcher::new(ctrl_option(), true, Box::new(StaticPermissions::granted()))
    }

    #[test]
    fn digit_resolves_to_previous_index() {
        let mut dispatcher = dispatcher();
        let now = Instant::now();
        assert_eq!(
            dispatcher.handle(KeyEvent::digit(1, ctrl_option()), now),
            Dispatch::Activate { index: 0 }
        );
        assert_eq!(
            dispatcher.handle(KeyEvent::digit(9, ctrl_option()), now + Duration::from_secs(1)),
            Dispatch::Activate { index: 8 }
        );
    }

    #[test]
    fn extra_modifier_voids_the_match() {
        let mut dispatcher = dispatcher();
        let held = HotkeyModifiers {
            shift: true,
            ..ctrl_option()
        };
        assert_eq!(dispatcher.handle(KeyEvent::digit(2, held), Instant::now()), Dispatch::Ignored);
    }

    #[test]
    fn missing_modifier_voids_the_match() {
        let mut dispatcher = dispatcher();
        let held = HotkeyModifiers {
            control: true,
            ..HotkeyModifiers::NONE
        };
        assert_eq!(dispatcher.handle(KeyEvent::digit(2, held), Instant::now()), Dispatch::Ignored);
    }

    #[test]
    fn non_digit_and_zero_are_ignored() {
        let mut dispatcher = dispatcher();
        let now = Instant::now();
        let no_digit = KeyEvent {
            digit: None,
            modifiers: ctrl_option(),
        };
        assert_eq!(dispatcher.handle(no_digit, now), Dispatch::Ignored);
        assert_eq!(dispatcher.handle(KeyEvent::digit(0, ctrl_option()), now), Dispatch::Ignored);
    }

    #[test]
    fn second_press_inside_window_is_debounced() {
        let mut dispatcher = dispatcher();
        let start = Instant::now();
        let event = KeyEvent::digit(3, ctrl_option());
        let outcomes = [
            dispatcher.handle(event, start),
            dispatcher.handle(event, start + Duration::from_millis(120)),
            dispatcher.handle(event, start + Duration::from_millis(299)),
        ];
        let activations = outcomes
            .iter()
            .filter(|d| matches!(d, Dispatch::Activate { .. }))
            .count();
        assert_eq!(activations, 1);
        assert_eq!(outcomes[1], Dispatch::Debounced);

        assert_eq!(
            dispatcher.handle(event, start + Duration::from_millis(300)),
            Dispatch::Activate { index: 2 }
        );
    }

    #[test]
    fn missing_permission_disables_hotkeys() {
        let permissions = StaticPermissions {
            observe_keys: false,
            inject_input: true,
        };
        let mut dispatcher = HotkeyDispatcher::new(ctrl_option(), true, Box::new(permissions));
        assert!(!dispatcher.is_active());
        assert_eq!(
            dispatcher.handle(KeyEvent::digit(1, ctrl_option()), Instant::now()),
            Dispatch::Disabled
        );
    }

    #[test]
    fn disabled_or_unbound_dispatcher_does_nothing() {
        let mut dispatcher = dispatcher();
        dispatcher.set_enabled(false);
        assert_eq!(
            dispatcher.handle(KeyEvent::digit(1, ctrl_option()), Instant::now()),
            Dispatch::Disabled
        );

        let mut unbound = HotkeyDispatcher::new(
            HotkeyModifiers::NONE,
            true,
            Box::new(StaticPermissions::granted()),
        );
        assert_eq!(
            unbound.handle(KeyEvent::digit(1, HotkeyModifiers::NONE), Instant::now()),
            Dispatch::Disabled
        );
    }

    #[test]
    fn modifiers_map_to_global_hotkey_flags() {
        let mods = to_global_modifiers(HotkeyModifiers {
            command: true,
            shift: true,
            ..HotkeyModifiers::NONE
        });
        assert_eq!(mods, Modifiers::SUPER | Modifiers::SHIFT);
    }
}
