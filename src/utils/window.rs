use tracing::{debug, warn};

use crate::driver::KeyCombo;

/// Focus the first visible top-level window whose title contains
/// `title_contains` (case-insensitive), restoring it if minimized.
///
/// Returns `true` if a matching window was brought to the foreground.
/// On platforms without a window API binding this always returns `false`.
pub fn focus_window(title_contains: &str) -> bool {
    debug!(target: "keypilot::window", %title_contains, "focus_window requested");
    let needle = title_contains.trim().to_lowercase();
    if needle.is_empty() {
        return false;
    }
    focus_window_impl(&needle)
}

/// Case-insensitive containment used for title matching.
pub fn title_matches(title: &str, needle_lowercase: &str) -> bool {
    title.to_lowercase().contains(needle_lowercase)
}

#[cfg(windows)]
#[allow(unsafe_code)]
fn focus_window_impl(needle: &str) -> bool {
    use std::ffi::OsString;
    use std::os::windows::ffi::OsStringExt;
    use winapi::shared::minwindef::{BOOL, FALSE, LPARAM, TRUE};
    use winapi::shared::windef::HWND;
    use winapi::um::winuser::{
        EnumWindows, GetWindowTextLengthW, GetWindowTextW, IsIconic, IsWindowVisible,
        SW_RESTORE, SetForegroundWindow, ShowWindow,
    };

    struct Search<'a> {
        needle: &'a str,
        found: Option<HWND>,
    }

    unsafe extern "system" fn visit(hwnd: HWND, lparam: LPARAM) -> BOOL {
        // SAFETY: `lparam` is the `&mut Search` passed to `EnumWindows` below,
        // which outlives the enumeration.
        let search = unsafe { &mut *(lparam as *mut Search<'_>) };
        if unsafe { IsWindowVisible(hwnd) } == 0 {
            return TRUE;
        }
        let len = unsafe { GetWindowTextLengthW(hwnd) };
        if len <= 0 {
            return TRUE;
        }
        let mut buf = vec![0u16; len as usize + 1];
        let copied = unsafe { GetWindowTextW(hwnd, buf.as_mut_ptr(), buf.len() as i32) };
        if copied <= 0 {
            return TRUE;
        }
        let title = OsString::from_wide(&buf[..copied as usize]);
        if title_matches(&title.to_string_lossy(), search.needle) {
            search.found = Some(hwnd);
            return FALSE;
        }
        TRUE
    }

    let mut search = Search {
        needle,
        found: None,
    };
    // EnumWindows reports failure when the callback stops early; the search
    // result is what matters.
    unsafe { EnumWindows(Some(visit), &mut search as *mut Search<'_> as LPARAM) };

    let Some(hwnd) = search.found else {
        warn!(target: "keypilot::window", %needle, "No visible window title matched");
        return false;
    };
    unsafe {
        if IsIconic(hwnd) != 0 {
            ShowWindow(hwnd, SW_RESTORE);
        }
        SetForegroundWindow(hwnd) != 0
    }
}

#[cfg(not(windows))]
fn focus_window_impl(needle: &str) -> bool {
    warn!(
        target: "keypilot::window",
        %needle,
        "focus_window is not supported on this platform; reporting window not found"
    );
    false
}

/// Whether every key of `combo` is physically held right now, regardless of
/// which window has focus. `None` when the platform offers no global key state.
pub fn combo_is_down(combo: &KeyCombo) -> Option<bool> {
    combo_is_down_impl(combo)
}

#[cfg(windows)]
#[allow(unsafe_code)]
fn combo_is_down_impl(combo: &KeyCombo) -> Option<bool> {
    use crate::driver::NamedKey;
    use winapi::um::winuser::{
        GetAsyncKeyState, VK_BACK, VK_CONTROL, VK_DELETE, VK_DOWN, VK_END, VK_ESCAPE, VK_F1,
        VK_HOME, VK_LEFT, VK_MENU, VK_NEXT, VK_PRIOR, VK_RETURN, VK_RIGHT, VK_SHIFT, VK_SPACE,
        VK_TAB, VK_UP,
    };

    let vk = match combo.key {
        NamedKey::Enter => VK_RETURN,
        NamedKey::Tab => VK_TAB,
        NamedKey::Delete => VK_DELETE,
        NamedKey::Backspace => VK_BACK,
        NamedKey::Escape => VK_ESCAPE,
        NamedKey::Home => VK_HOME,
        NamedKey::End => VK_END,
        NamedKey::PageUp => VK_PRIOR,
        NamedKey::PageDown => VK_NEXT,
        NamedKey::Space => VK_SPACE,
        NamedKey::Up => VK_UP,
        NamedKey::Down => VK_DOWN,
        NamedKey::Left => VK_LEFT,
        NamedKey::Right => VK_RIGHT,
        NamedKey::F(n) => VK_F1 + i32::from(n) - 1,
    };
    // High bit set: the key is down at the time of the call.
    let is_down = |vk: i32| (unsafe { GetAsyncKeyState(vk) } as u16 & 0x8000) != 0;

    let m = combo.modifiers;
    Some(
        is_down(vk)
            && (!m.ctrl || is_down(VK_CONTROL))
            && (!m.shift || is_down(VK_SHIFT))
            && (!m.alt || is_down(VK_MENU)),
    )
}

#[cfg(not(windows))]
fn combo_is_down_impl(_combo: &KeyCombo) -> Option<bool> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_matching_is_case_insensitive_substring() {
        assert!(title_matches("Fourth Shift - [Item Master]", "fourth shift"));
        assert!(title_matches("FOURTH SHIFT", "shift"));
        assert!(!title_matches("Notepad", "fourth"));
    }

    #[test]
    fn blank_pattern_never_matches() {
        assert!(!focus_window("   "));
    }

    #[cfg(not(windows))]
    #[test]
    fn key_state_is_unavailable_off_windows() {
        let esc = KeyCombo::parse("ESC").unwrap();
        assert_eq!(combo_is_down(&esc), None);
    }
}
