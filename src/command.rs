//! Command interpreter
//!
//! A command line is a sequence of whitespace-separated words. A keyword
//! starts a command and the words after it are its arguments, so
//! `rgb ffffff mode 2 rgb w:ff0000` sets two modes in one line. `@<n>`
//! selects the notification channel used by the rest of the line.

use std::fmt::Write as _;

use tracing::{debug, warn};

use ckb_device::keymap::{default_scan, input_position, light_index, light_name, N_KEYS_INPUT, N_LIGHTS};
use ckb_device::{Device, Indicators, KeyBits, KeyMacro, MacroAction, RgbColor, MODE_COUNT, OUTFIFO_MAX};

use crate::devnode::NodeConfig;
use crate::notify::notify;

/// What a command line changed
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Lighting of the current mode changed
    pub light: bool,
    /// Lighting must be resent even if unchanged
    pub refresh: bool,
    /// Indicator overrides of the current mode changed
    pub indicators: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Keyword {
    Mode,
    Switch,
    Rgb,
    Refresh,
    Notify,
    NotifyOn,
    NotifyOff,
    Ion,
    Ioff,
    Iauto,
    Inotify,
    Bind,
    Unbind,
    Rebind,
    Macro,
    Name,
    ProfileName,
    Get,
}

impl Keyword {
    fn parse(word: &str) -> Option<Self> {
        Some(match word {
            "mode" => Self::Mode,
            "switch" => Self::Switch,
            "rgb" => Self::Rgb,
            "refresh" => Self::Refresh,
            "notify" => Self::Notify,
            "notifyon" => Self::NotifyOn,
            "notifyoff" => Self::NotifyOff,
            "ion" => Self::Ion,
            "ioff" => Self::Ioff,
            "iauto" => Self::Iauto,
            "inotify" => Self::Inotify,
            "bind" => Self::Bind,
            "unbind" => Self::Unbind,
            "rebind" => Self::Rebind,
            "macro" => Self::Macro,
            "name" => Self::Name,
            "profilename" => Self::ProfileName,
            "get" => Self::Get,
            _ => return None,
        })
    }
}

/// Decode `%xx` escapes used for names containing spaces
pub fn decode_name(word: &str) -> String {
    let bytes = word.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(v) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(v);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Escape a name so it stays a single word
pub fn encode_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for b in name.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.') {
            out.push(b as char);
        } else {
            let _ = write!(out, "%{:02x}", b);
        }
    }
    out
}

fn parse_positions(list: &str) -> Result<Vec<usize>, String> {
    if list == "all" {
        return Ok((0..N_KEYS_INPUT).collect());
    }
    list.split(',')
        .map(|name| input_position(name).ok_or_else(|| format!("unknown key {:?}", name)))
        .collect()
}

fn parse_lights(list: &str) -> Result<Vec<usize>, String> {
    if list == "all" {
        return Ok((0..N_LIGHTS).collect());
    }
    list.split(',')
        .map(|name| light_index(name).ok_or_else(|| format!("unknown light {:?}", name)))
        .collect()
}

fn scan_for(name: &str) -> Result<u16, String> {
    input_position(name)
        .and_then(default_scan)
        .ok_or_else(|| format!("no scancode for {:?}", name))
}

/// Parse `a+b:+c,-c,m5/-3`
fn parse_macro(arg: &str) -> Result<KeyMacro, String> {
    let (combo_text, actions_text) = arg
        .split_once(':')
        .ok_or_else(|| format!("macro {:?} has no actions", arg))?;
    let mut combo = KeyBits::new();
    for name in combo_text.split('+') {
        let position = input_position(name).ok_or_else(|| format!("unknown key {:?}", name))?;
        combo.set(position);
    }
    if combo.is_empty() {
        return Err("empty macro combo".to_string());
    }

    let mut actions = Vec::new();
    for action in actions_text.split(',').filter(|a| !a.is_empty()) {
        if let Some(name) = action.strip_prefix('+') {
            actions.push(MacroAction::Key {
                scan: scan_for(name)?,
                down: true,
            });
        } else if let Some(name) = action.strip_prefix('-') {
            actions.push(MacroAction::Key {
                scan: scan_for(name)?,
                down: false,
            });
        } else if let Some(motion) = action.strip_prefix('m') {
            let (dx, dy) = motion
                .split_once('/')
                .ok_or_else(|| format!("bad motion {:?}", action))?;
            actions.push(MacroAction::Move {
                dx: dx.parse().map_err(|_| format!("bad motion {:?}", action))?,
                dy: dy.parse().map_err(|_| format!("bad motion {:?}", action))?,
            });
        } else {
            return Err(format!("bad macro action {:?}", action));
        }
    }
    Ok(KeyMacro::new(combo, actions))
}

/// Format the lighting of a mode for `get :rgb`
fn describe_rgb(dev: &Device, mode: usize) -> String {
    let Some(light) = dev.profile.mode(mode).map(|m| &m.light) else {
        return "rgb".to_string();
    };
    let first = light.get(0).unwrap_or_default();
    if (0..N_LIGHTS).all(|i| light.get(i) == Some(first)) {
        return format!("rgb {}", first);
    }
    let mut out = String::from("rgb");
    for i in 0..N_LIGHTS {
        let name = light_name(i);
        if name.starts_with('#') {
            continue;
        }
        if let Some(color) = light.get(i) {
            let _ = write!(out, " {}:{}", name, color);
        }
    }
    out
}

struct LineState<'a> {
    nodes: &'a NodeConfig,
    slot: usize,
    mode: usize,
    channel: usize,
    outcome: CommandOutcome,
}

impl LineState<'_> {
    fn current(&self, dev: &Device) -> bool {
        self.mode == dev.profile.current_index()
    }

    /// Commands with no arguments run as soon as their keyword is seen
    fn run_bare(&mut self, dev: &mut Device, keyword: Keyword) {
        match keyword {
            Keyword::Switch => {
                dev.profile.switch_to(self.mode);
                notify(dev, None, &format!("switch {}", self.mode + 1));
                self.outcome.light = true;
                self.outcome.indicators = true;
            }
            Keyword::Refresh => self.outcome.refresh = true,
            _ => {}
        }
    }

    fn run(&mut self, dev: &mut Device, keyword: Keyword, arg: &str) -> Result<(), String> {
        let slot = self.slot;
        let channel = self.channel;
        let is_current = self.current(dev);
        let mode_index = self.mode;
        let mode = dev
            .profile
            .mode_mut(mode_index)
            .ok_or_else(|| format!("mode {} out of range", mode_index + 1))?;

        match keyword {
            Keyword::Mode => {
                let n: usize = arg.parse().map_err(|_| format!("bad mode {:?}", arg))?;
                if !(1..=MODE_COUNT).contains(&n) {
                    return Err(format!("mode {} out of range", n));
                }
                self.mode = n - 1;
            }
            Keyword::Rgb => {
                let (lights, color) = match arg.split_once(':') {
                    Some((keys, color)) => (parse_lights(keys)?, color),
                    None => ((0..N_LIGHTS).collect(), arg),
                };
                let color: RgbColor = color.parse()?;
                for index in lights {
                    mode.light.set(index, color);
                }
                self.outcome.light |= is_current;
            }
            Keyword::Notify => {
                let (n, on) = match arg.strip_suffix(":off") {
                    Some(n) => (n, false),
                    None => (arg, true),
                };
                let n: usize = n.parse().map_err(|_| format!("bad channel {:?}", arg))?;
                let result = if on {
                    self.nodes.open_notification_channel(slot, dev, n)
                } else {
                    self.nodes.close_notification_channel(slot, dev, n)
                };
                result.map_err(|e| e.to_string())?;
            }
            Keyword::NotifyOn | Keyword::NotifyOff => {
                for position in parse_positions(arg)? {
                    mode.notify[channel].assign(position, keyword == Keyword::NotifyOn);
                }
            }
            Keyword::Ion | Keyword::Ioff | Keyword::Iauto => {
                let flags = Indicators::parse(arg).ok_or_else(|| format!("bad indicator {:?}", arg))?;
                match keyword {
                    Keyword::Ion => {
                        mode.ion |= flags;
                        mode.ioff &= !flags;
                    }
                    Keyword::Ioff => {
                        mode.ioff |= flags;
                        mode.ion &= !flags;
                    }
                    _ => {
                        mode.ion &= !flags;
                        mode.ioff &= !flags;
                    }
                }
                self.outcome.indicators |= is_current;
            }
            Keyword::Inotify => {
                let (name, on) = match arg.strip_suffix(":off") {
                    Some(name) => (name, false),
                    None => (arg, true),
                };
                let flags = Indicators::parse(name).ok_or_else(|| format!("bad indicator {:?}", arg))?;
                mode.inotify[channel].set(flags, on);
            }
            Keyword::Bind => {
                let (keys, target) = arg
                    .split_once(':')
                    .ok_or_else(|| format!("bind {:?} has no target", arg))?;
                let scan = scan_for(target)?;
                for position in parse_positions(keys)? {
                    mode.bind.bind(position, scan);
                }
            }
            Keyword::Unbind => {
                for position in parse_positions(arg)? {
                    mode.bind.unbind(position);
                }
            }
            Keyword::Rebind => {
                for position in parse_positions(arg)? {
                    mode.bind.rebind(position);
                }
            }
            Keyword::Macro => {
                if arg == "clear" {
                    mode.bind.clear_macros();
                } else if !mode.bind.add_macro(parse_macro(arg)?) {
                    return Err("macro table full".to_string());
                }
            }
            Keyword::Name => mode.set_name(&decode_name(arg)),
            Keyword::ProfileName => dev.profile.set_name(&decode_name(arg)),
            Keyword::Get => {
                let answer = match arg {
                    ":mode" => format!("mode {}", dev.profile.current_index() + 1),
                    ":name" => format!("name {}", encode_name(&mode.name)),
                    ":modeid" => format!("modeid {}", mode.id),
                    ":profilename" => format!("profilename {}", encode_name(&dev.profile.name)),
                    ":profileid" => format!("profileid {}", dev.profile.id),
                    ":rgb" => describe_rgb(dev, mode_index),
                    _ => return Err(format!("unknown query {:?}", arg)),
                };
                notify(dev, Some(channel), &answer);
            }
            Keyword::Switch | Keyword::Refresh => {
                return Err(format!("unexpected argument {:?}", arg));
            }
        }
        Ok(())
    }
}

/// Run one command line against a device
///
/// Bad words are logged and skipped; the rest of the line still runs.
pub fn run_line(nodes: &NodeConfig, slot: usize, dev: &mut Device, line: &str) -> CommandOutcome {
    let mut state = LineState {
        nodes,
        slot,
        mode: dev.profile.current_index(),
        channel: 0,
        outcome: CommandOutcome::default(),
    };
    let mut keyword = None;

    for word in line.split_whitespace() {
        if let Some(n) = word.strip_prefix('@') {
            match n.parse::<usize>() {
                Ok(n) if n < OUTFIFO_MAX => state.channel = n,
                _ => warn!("{}: bad notification channel {:?}", dev.identity.serial, word),
            }
            continue;
        }
        if let Some(kw) = Keyword::parse(word) {
            keyword = Some(kw);
            state.run_bare(dev, kw);
            continue;
        }
        let Some(kw) = keyword else {
            warn!("{}: unknown command {:?}", dev.identity.serial, word);
            continue;
        };
        if let Err(e) = state.run(dev, kw, word) {
            warn!("{}: {:?} {}: {}", dev.identity.serial, kw, word, e);
        }
    }
    debug!("{}: {:?} -> {:?}", dev.identity.serial, line, state.outcome);
    state.outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use ckb_device::keymap::key_by_name;
    use ckb_transport::{find_device, RecordingTransport, VENDOR_ID};
    use std::sync::Arc;

    fn setup() -> (NodeConfig, Device) {
        let known = find_device(VENDOR_ID, 0x1B13).unwrap();
        let dev = Device::new(Arc::new(RecordingTransport::new(VENDOR_ID, 0x1B13)), known);
        let nodes = NodeConfig::new(std::env::temp_dir().join("ckb-command-test-unused"), None);
        (nodes, dev)
    }

    fn pos(name: &str) -> usize {
        key_by_name(name).unwrap().position
    }

    #[test]
    fn test_rgb_current_mode() {
        let (nodes, mut dev) = setup();
        let out = run_line(&nodes, 1, &mut dev, "rgb ff0000");
        assert!(out.light);
        let light = &dev.profile.current_mode().light;
        assert_eq!(light.get(pos("a")), Some(RgbColor::new(255, 0, 0)));
        assert_eq!(light.get(N_LIGHTS - 1), Some(RgbColor::new(255, 0, 0)));
    }

    #[test]
    fn test_rgb_other_mode_and_key_list() {
        let (nodes, mut dev) = setup();
        let out = run_line(&nodes, 1, &mut dev, "mode 2 rgb w,a,s,d:00ff00");
        assert!(!out.light);
        let mode2 = dev.profile.mode(1).unwrap();
        assert_eq!(mode2.light.get(pos("w")), Some(RgbColor::new(0, 255, 0)));
        assert_eq!(mode2.light.get(pos("q")), Some(RgbColor::BLACK));
        assert!(dev.profile.current_mode().light.is_black(0..N_LIGHTS));
    }

    #[test]
    fn test_switch() {
        let (nodes, mut dev) = setup();
        let out = run_line(&nodes, 1, &mut dev, "mode 3 switch");
        assert_eq!(dev.profile.current_index(), 2);
        assert!(out.light);
        assert!(out.indicators);
    }

    #[test]
    fn test_bad_words_do_not_abort_line() {
        let (nodes, mut dev) = setup();
        run_line(&nodes, 1, &mut dev, "bogus mode 9 rgb nothex rgb zz:ffffff rgb 0000ff mode 7");
        assert_eq!(dev.profile.current_index(), 0);
        assert_eq!(
            dev.profile.current_mode().light.get(pos("a")),
            Some(RgbColor::new(0, 0, 255))
        );
    }

    #[test]
    fn test_refresh() {
        let (nodes, mut dev) = setup();
        let out = run_line(&nodes, 1, &mut dev, "refresh");
        assert!(out.refresh);
        assert!(!out.light);
    }

    #[test]
    fn test_bindings() {
        let (nodes, mut dev) = setup();
        let b_scan = key_by_name("b").unwrap().scan;
        run_line(&nodes, 1, &mut dev, "bind a,c:b unbind d");
        let bind = &dev.profile.current_mode().bind;
        assert_eq!(bind.action(pos("a")), Some(b_scan));
        assert_eq!(bind.action(pos("c")), Some(b_scan));
        assert_eq!(bind.action(pos("d")), None);

        run_line(&nodes, 1, &mut dev, "rebind all");
        let bind = &dev.profile.current_mode().bind;
        assert_eq!(bind.action(pos("a")), Some(key_by_name("a").unwrap().scan));
        assert!(bind.action(pos("d")).is_some());
    }

    #[test]
    fn test_macros() {
        let (nodes, mut dev) = setup();
        run_line(&nodes, 1, &mut dev, "macro lctrl+q:+x,-x,m5/-3 macro a:+b");
        let macros = &dev.profile.current_mode().bind.macros;
        assert_eq!(macros.len(), 2);
        assert!(macros[0].combo.get(pos("lctrl")) && macros[0].combo.get(pos("q")));
        assert_eq!(macros[0].actions.len(), 3);
        assert_eq!(macros[0].actions[2], MacroAction::Move { dx: 5, dy: -3 });

        run_line(&nodes, 1, &mut dev, "macro bogus:+x macro clear");
        assert!(dev.profile.current_mode().bind.macros.is_empty());
    }

    #[test]
    fn test_parse_macro_errors() {
        assert!(parse_macro("a").is_err());
        assert!(parse_macro("nokey:+a").is_err());
        assert!(parse_macro("a:*b").is_err());
        assert!(parse_macro("a:m1").is_err());
    }

    #[test]
    fn test_indicator_overrides() {
        let (nodes, mut dev) = setup();
        let out = run_line(&nodes, 1, &mut dev, "ion num ioff caps");
        assert!(out.indicators);
        let mode = dev.profile.current_mode();
        assert_eq!(mode.ion, Indicators::NUM);
        assert_eq!(mode.ioff, Indicators::CAPS);

        run_line(&nodes, 1, &mut dev, "ioff num iauto caps");
        let mode = dev.profile.current_mode();
        assert_eq!(mode.ion, Indicators::empty());
        assert_eq!(mode.ioff, Indicators::NUM);
    }

    #[test]
    fn test_channel_selection() {
        let (nodes, mut dev) = setup();
        run_line(&nodes, 1, &mut dev, "@3 notifyon a,b inotify caps @0 notifyoff a @12 notifyoff b");
        let mode = dev.profile.current_mode();
        assert!(mode.notify[3].get(pos("a")));
        assert!(mode.notify[3].get(pos("b")));
        assert!(!mode.notify[0].get(pos("a")));
        assert!(!mode.notify[0].get(pos("b")));
        assert_eq!(mode.inotify[3], Indicators::CAPS);
    }

    #[test]
    fn test_names() {
        let (nodes, mut dev) = setup();
        run_line(&nodes, 1, &mut dev, "name Gaming%20Mode profilename work");
        assert_eq!(dev.profile.current_mode().name, "Gaming Mode");
        assert_eq!(dev.profile.name, "work");
    }

    #[test]
    fn test_name_escaping() {
        assert_eq!(decode_name("a%20b%"), "a b%");
        assert_eq!(decode_name("%zz"), "%zz");
        assert_eq!(encode_name("Mode 1"), "Mode%201");
    }

    #[test]
    fn test_notify_channel_out_of_range() {
        let (nodes, mut dev) = setup();
        run_line(&nodes, 1, &mut dev, "notify 10");
        assert_eq!(dev.open_channels().count(), 0);
    }
}
