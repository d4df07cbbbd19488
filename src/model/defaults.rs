//! Built-in seed data: the first-run device list and the stock templates.

use super::{ActionKind, BUILTIN_TEMPLATE_PREFIX, Button, DEFAULT_PORT, Device, Os, Profile, Template};

fn hotkey(id: &str, label: &str, icon: &str, keys: &[&str]) -> Button {
    Button::new(
        id,
        label,
        icon,
        ActionKind::Hotkey,
        keys.iter().map(|k| (*k).to_string()).collect(),
    )
}

fn single(id: &str, label: &str, icon: &str, action: ActionKind, param: &str) -> Button {
    Button::new(id, label, icon, action, vec![param.to_string()])
}

/// Devices seeded when storage holds no device list yet.
///
/// Profiles start empty; `ProfileStore::load` then tries to adopt whatever
/// the agent already has configured.
#[must_use]
pub fn default_devices() -> Vec<Device> {
    vec![Device {
        id: "device_default".to_string(),
        name: "Left Device".to_string(),
        host: "localhost".to_string(),
        port: DEFAULT_PORT,
        os: Os::current(),
        theme_color: None,
        profiles: Vec::new(),
    }]
}

fn editing_profile(modifier: &str) -> Profile {
    Profile::new(
        "profile_editing",
        "Editing",
        vec![
            hotkey("btn_copy", "Copy", "copy", &[modifier, "c"]),
            hotkey("btn_paste", "Paste", "clipboard", &[modifier, "v"]),
            hotkey("btn_cut", "Cut", "scissors", &[modifier, "x"]),
            hotkey("btn_undo", "Undo", "undo", &[modifier, "z"]),
            hotkey("btn_save", "Save", "save", &[modifier, "s"]),
            hotkey("btn_find", "Find", "search", &[modifier, "f"]),
        ],
    )
}

fn media_profile() -> Profile {
    Profile::new(
        "profile_media",
        "Media",
        vec![
            single("btn_play", "Play/Pause", "play", ActionKind::Press, "playpause"),
            single("btn_next", "Next", "skip-forward", ActionKind::Press, "nexttrack"),
            single("btn_prev", "Previous", "skip-back", ActionKind::Press, "prevtrack"),
            single("btn_mute", "Mute", "volume-x", ActionKind::System, "mute"),
        ],
    )
}

/// Stock templates. Their ids carry [`BUILTIN_TEMPLATE_PREFIX`].
#[must_use]
pub fn builtin_templates() -> Vec<Template> {
    vec![
        Template {
            id: format!("{BUILTIN_TEMPLATE_PREFIX}windows"),
            name: "Windows Essentials".to_string(),
            os: Os::Windows,
            profiles: vec![
                editing_profile("ctrl"),
                media_profile(),
                Profile::new(
                    "profile_launch",
                    "Launch",
                    vec![
                        single("btn_browser", "Browser", "globe", ActionKind::OpenUrl, "https://"),
                        single("btn_calc", "Calculator", "calculator", ActionKind::OpenApp, "calc.exe"),
                        hotkey("btn_lock", "Lock", "lock", &["win", "l"]),
                    ],
                ),
            ],
        },
        Template {
            id: format!("{BUILTIN_TEMPLATE_PREFIX}mac"),
            name: "Mac Essentials".to_string(),
            os: Os::Mac,
            profiles: vec![
                editing_profile("command"),
                media_profile(),
                Profile::new(
                    "profile_launch",
                    "Launch",
                    vec![
                        single("btn_browser", "Browser", "globe", ActionKind::OpenUrl, "https://"),
                        single(
                            "btn_calc",
                            "Calculator",
                            "calculator",
                            ActionKind::OpenApp,
                            "/System/Applications/Calculator.app",
                        ),
                        hotkey("btn_spotlight", "Spotlight", "search", &["command", "space"]),
                    ],
                ),
            ],
        },
        Template {
            id: format!("{BUILTIN_TEMPLATE_PREFIX}blank"),
            name: "Blank".to_string(),
            os: Os::Linux,
            profiles: vec![Profile::new("profile_home", "Home", Vec::new())],
        },
    ]
}
