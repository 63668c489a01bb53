//! KDL configuration parser
//!
//! Type errors (a string where a number belongs) are hard errors with a
//! source span. Values of the right type but outside their valid range are
//! logged and replaced by the corresponding value of the base snapshot, so a
//! bad reload keeps the last-known-good setting for that field.

use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::model::*;

/// Parse a configuration file from the given path
pub fn parse_config(path: &Path) -> Result<Config, ConfigError> {
    parse_config_with_base(path, &Config::default())
}

/// Parse a configuration file, falling back to `base` for out-of-range values
pub fn parse_config_with_base(path: &Path, base: &Config) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config_str_with_base(&content, base)
}

/// Parse configuration from a string
pub fn parse_config_str(content: &str) -> Result<Config, ConfigError> {
    parse_config_str_with_base(content, &Config::default())
}

/// Parse configuration from a string on top of a base snapshot.
///
/// Sections absent from `content` take their defaults, not the base values;
/// the base only supplies replacements for rejected values.
pub fn parse_config_str_with_base(content: &str, base: &Config) -> Result<Config, ConfigError> {
    let doc: kdl::KdlDocument = content.parse().map_err(|e: kdl::KdlError| {
        // kdl is built on an older miette, so the span is rebuilt by hand
        let span = miette::SourceSpan::from((e.span.offset(), e.span.len()));
        ConfigError::ParseError {
            src: content.to_string(),
            span,
            source: e,
        }
    })?;

    let p = Parser { src: content, base };
    let mut config = Config::default();

    for node in doc.nodes() {
        match node.name().value() {
            "global" => config.global = p.global(node)?,
            "display" => config.display = p.display(node)?,
            "mouse" => config.mouse = p.mouse(node)?,
            "proximity" => config.proximity = p.proximity(node)?,
            "cheat-sheet" => config.cheat_sheet = p.cheat_sheet(node)?,
            "screen" => config.screen = p.screen(node)?,
            "shortcuts" => config.shortcuts = p.shortcuts(node)?,
            name => {
                tracing::warn!("Unknown top-level node: {}", name);
            }
        }
    }

    Ok(config)
}

struct Parser<'a> {
    src: &'a str,
    base: &'a Config,
}

fn children(node: &kdl::KdlNode) -> impl Iterator<Item = &kdl::KdlNode> {
    node.children().into_iter().flat_map(|doc| doc.nodes())
}

/// First positional argument of a node
fn argument(node: &kdl::KdlNode) -> Option<&kdl::KdlEntry> {
    node.entries().iter().find(|e| e.name().is_none())
}

/// Positional argument at `index`
fn argument_at(node: &kdl::KdlNode, index: usize) -> Option<&kdl::KdlEntry> {
    node.entries().iter().filter(|e| e.name().is_none()).nth(index)
}

fn property<'n>(node: &'n kdl::KdlNode, name: &str) -> Option<&'n kdl::KdlEntry> {
    node.entries()
        .iter()
        .find(|e| e.name().map(|n| n.value()) == Some(name))
}

/// Keep `value` if `valid`, otherwise warn and use `fallback`
fn checked<T: std::fmt::Debug>(option: &str, value: T, valid: bool, fallback: T) -> T {
    if valid {
        value
    } else {
        tracing::warn!(
            "Out-of-range value {:?} for `{}`, keeping {:?}",
            value,
            option,
            fallback
        );
        fallback
    }
}

impl Parser<'_> {
    fn invalid(&self, option: &str, expected: &'static str, entry: &kdl::KdlEntry) -> ConfigError {
        let span = entry.span();
        ConfigError::InvalidValue {
            option: option.to_string(),
            expected,
            src: self.src.to_string(),
            span: miette::SourceSpan::from((span.offset(), span.len())),
        }
    }

    fn bool_of(&self, option: &str, entry: &kdl::KdlEntry) -> Result<bool, ConfigError> {
        entry
            .value()
            .as_bool()
            .ok_or_else(|| self.invalid(option, "a boolean (true/false)", entry))
    }

    fn int_of(&self, option: &str, entry: &kdl::KdlEntry) -> Result<i64, ConfigError> {
        entry
            .value()
            .as_i64()
            .ok_or_else(|| self.invalid(option, "an integer", entry))
    }

    fn float_of(&self, option: &str, entry: &kdl::KdlEntry) -> Result<f64, ConfigError> {
        let value = entry.value();
        value
            .as_f64()
            .or_else(|| value.as_i64().map(|i| i as f64))
            .ok_or_else(|| self.invalid(option, "a number", entry))
    }

    fn string_of<'e>(&self, option: &str, entry: &'e kdl::KdlEntry) -> Result<&'e str, ConfigError> {
        entry
            .value()
            .as_string()
            .ok_or_else(|| self.invalid(option, "a string", entry))
    }

    /// Positive pixel extent that fits an `i32`
    fn extent(
        &self,
        option: &str,
        entry: &kdl::KdlEntry,
        fallback: i32,
    ) -> Result<i32, ConfigError> {
        let value = self.int_of(option, entry)?;
        Ok(match i32::try_from(value) {
            Ok(v) if v > 0 => v,
            _ => {
                tracing::warn!(
                    "Out-of-range value {} for `{}`, keeping {}",
                    value,
                    option,
                    fallback
                );
                fallback
            }
        })
    }

    fn required<'n>(&self, node: &'n kdl::KdlNode) -> Result<&'n kdl::KdlEntry, ConfigError> {
        argument(node).ok_or_else(|| ConfigError::MissingField {
            field: format!("value for `{}`", node.name().value()),
        })
    }

    fn bool_arg(&self, node: &kdl::KdlNode) -> Result<bool, ConfigError> {
        self.bool_of(node.name().value(), self.required(node)?)
    }

    fn millis_arg(
        &self,
        node: &kdl::KdlNode,
        allow_zero: bool,
        fallback: Duration,
    ) -> Result<Duration, ConfigError> {
        let name = node.name().value();
        let ms = self.int_of(name, self.required(node)?)?;
        let valid = if allow_zero { ms >= 0 } else { ms > 0 };
        let ms = checked(name, ms, valid, fallback.as_millis() as i64);
        Ok(Duration::from_millis(ms as u64))
    }

    fn global(&self, node: &kdl::KdlNode) -> Result<GlobalConfig, ConfigError> {
        let mut global = GlobalConfig::default();

        for child in children(node) {
            match child.name().value() {
                "log-level" => {
                    let entry = self.required(child)?;
                    let val = self.string_of("log-level", entry)?;
                    global.log_level = val
                        .parse()
                        .map_err(|message| ConfigError::Invalid { message })?;
                }
                name => {
                    tracing::warn!("Unknown global config option: {}", name);
                }
            }
        }

        Ok(global)
    }

    fn display(&self, node: &kdl::KdlNode) -> Result<DisplayConfig, ConfigError> {
        let base = &self.base.display;
        let mut display = DisplayConfig::default();

        for child in children(node) {
            match child.name().value() {
                "enabled" => display.enabled = self.bool_arg(child)?,
                "display-time-ms" => {
                    display.display_time = self.millis_arg(child, true, base.display_time)?
                }
                "fade-duration-ms" => {
                    display.fade_duration = self.millis_arg(child, true, base.fade_duration)?
                }
                "combo-timeout-ms" => {
                    display.combo_timeout = self.millis_arg(child, true, base.combo_timeout)?
                }
                "max-stack" => {
                    let n = self.int_of("max-stack", self.required(child)?)?;
                    display.max_stack =
                        checked("max-stack", n, n >= 1, base.max_stack as i64) as usize;
                }
                "show-single-keys" => display.show_single_keys = self.bool_arg(child)?,
                "describe-shortcuts" => display.describe_shortcuts = self.bool_arg(child)?,
                "position" => display.position = self.position(child)?,
                name => {
                    tracing::warn!("Unknown display config option: {}", name);
                }
            }
        }

        Ok(display)
    }

    fn position(&self, node: &kdl::KdlNode) -> Result<StackPosition, ConfigError> {
        let base = &self.base.display.position;
        let mut pos = StackPosition::default();

        if let Some(e) = property(node, "x") {
            pos.x = self.float_of("position.x", e)?;
        }
        if let Some(e) = property(node, "y") {
            pos.y = self.float_of("position.y", e)?;
        }
        if let Some(e) = property(node, "width") {
            let v = self.float_of("position.width", e)?;
            pos.width = checked("position.width", v, v > 0.0, base.width);
        }
        if let Some(e) = property(node, "row-height") {
            let v = self.float_of("position.row-height", e)?;
            pos.row_height = checked("position.row-height", v, v > 0.0, base.row_height);
        }
        if let Some(e) = property(node, "spacing") {
            let v = self.float_of("position.spacing", e)?;
            pos.spacing = checked("position.spacing", v, v >= 0.0, base.spacing);
        }

        Ok(pos)
    }

    fn mouse(&self, node: &kdl::KdlNode) -> Result<MouseConfig, ConfigError> {
        let base = &self.base.mouse;
        let mut mouse = MouseConfig::default();

        for child in children(node) {
            match child.name().value() {
                "double-click-timeout" => {
                    let secs = self.float_of("double-click-timeout", self.required(child)?)?;
                    mouse.double_click_timeout = match Duration::try_from_secs_f64(secs) {
                        Ok(timeout) => timeout,
                        Err(_) => {
                            tracing::warn!(
                                "Out-of-range value {} for `double-click-timeout`, keeping {:?}",
                                secs,
                                base.double_click_timeout
                            );
                            base.double_click_timeout
                        }
                    };
                }
                "drag-threshold" => {
                    let px = self.float_of("drag-threshold", self.required(child)?)?;
                    mouse.drag_threshold =
                        checked("drag-threshold", px, px >= 0.0, base.drag_threshold);
                }
                "log" => mouse.log = self.mouse_log(child)?,
                "aliases" => {
                    for alias in children(child) {
                        let label = alias.name().value();
                        let to = self.string_of(label, self.required(alias)?)?;
                        mouse.aliases.insert(label.to_string(), to.to_string());
                    }
                }
                name => {
                    tracing::warn!("Unknown mouse config option: {}", name);
                }
            }
        }

        Ok(mouse)
    }

    fn mouse_log(&self, node: &kdl::KdlNode) -> Result<MouseLogToggles, ConfigError> {
        let mut log = MouseLogToggles::default();

        for entry in node.entries() {
            let Some(name) = entry.name() else {
                tracing::warn!("Ignoring positional argument on mouse `log`");
                continue;
            };
            let slot = match name.value() {
                "left-click" => &mut log.left_click,
                "double-click" => &mut log.double_click,
                "right-click" => &mut log.right_click,
                "middle-click" => &mut log.middle_click,
                "middle-drag" => &mut log.middle_drag,
                "scroll" => &mut log.scroll,
                "other-buttons" => &mut log.other_buttons,
                other => {
                    tracing::warn!("Unknown mouse log toggle: {}", other);
                    continue;
                }
            };
            *slot = self.bool_of(name.value(), entry)?;
        }

        Ok(log)
    }

    fn proximity(&self, node: &kdl::KdlNode) -> Result<ProximityConfig, ConfigError> {
        let base = &self.base.proximity;
        let mut prox = ProximityConfig::default();

        for child in children(node) {
            match child.name().value() {
                "enabled" => prox.enabled = self.bool_arg(child)?,
                "distance" => {
                    let d = self.float_of("distance", self.required(child)?)?;
                    prox.distance = checked("proximity distance", d, d > 0.0, base.distance);
                }
                "min-opacity" => {
                    let o = self.float_of("min-opacity", self.required(child)?)?;
                    prox.min_opacity =
                        checked("min-opacity", o, (0.0..=1.0).contains(&o), base.min_opacity);
                }
                name => {
                    tracing::warn!("Unknown proximity config option: {}", name);
                }
            }
        }

        Ok(prox)
    }

    fn cheat_sheet(&self, node: &kdl::KdlNode) -> Result<CheatSheetConfig, ConfigError> {
        let base = &self.base.cheat_sheet;
        let mut cheat = CheatSheetConfig::default();

        for child in children(node) {
            match child.name().value() {
                "enabled" => cheat.enabled = self.bool_arg(child)?,
                "key" => {
                    let key = self.string_of("key", self.required(child)?)?.trim();
                    cheat.key = if key.is_empty() {
                        checked("cheat-sheet key", String::new(), false, base.key.clone())
                    } else {
                        key.to_string()
                    };
                }
                "hold-ms" => cheat.hold = self.millis_arg(child, false, base.hold)?,
                name => {
                    tracing::warn!("Unknown cheat-sheet config option: {}", name);
                }
            }
        }

        Ok(cheat)
    }

    fn screen(&self, node: &kdl::KdlNode) -> Result<ScreenConfig, ConfigError> {
        let base = &self.base.screen;
        let mut screen = ScreenConfig::default();

        if let Some(e) = property(node, "width") {
            screen.width = self.extent("screen.width", e, base.width)?;
        }
        if let Some(e) = property(node, "height") {
            screen.height = self.extent("screen.height", e, base.height)?;
        }

        Ok(screen)
    }

    fn shortcuts(&self, node: &kdl::KdlNode) -> Result<Vec<Shortcut>, ConfigError> {
        let mut list = Vec::new();

        for child in children(node) {
            let kind = match child.name().value() {
                "header" => ShortcutKind::Header,
                "key" => ShortcutKind::Key,
                name => {
                    tracing::warn!("Unknown shortcut entry: {}", name);
                    continue;
                }
            };

            let combo = argument_at(child, 0).ok_or_else(|| ConfigError::MissingField {
                field: format!("combo for shortcut `{}`", child.name().value()),
            })?;
            let combo = self.string_of("combo", combo)?.trim().to_string();
            let description = match argument_at(child, 1) {
                Some(e) => self.string_of("description", e)?.to_string(),
                None => String::new(),
            };

            let mut shortcut = Shortcut {
                kind,
                combo,
                description,
                enabled: true,
                show_in_log: true,
                show_in_cheat: true,
            };
            if let Some(e) = property(child, "enabled") {
                shortcut.enabled = self.bool_of("enabled", e)?;
            }
            if let Some(e) = property(child, "log") {
                shortcut.show_in_log = self.bool_of("log", e)?;
            }
            if let Some(e) = property(child, "cheat") {
                shortcut.show_in_cheat = self.bool_of("cheat", e)?;
            }

            list.push(shortcut);
        }

        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_yields_defaults() {
        let config = parse_config_str("").unwrap();
        assert_eq!(config.display.display_time, Duration::from_millis(2000));
        assert_eq!(config.display.max_stack, 1);
        assert_eq!(config.cheat_sheet.key, "Tab");
        assert_eq!(config.shortcuts.len(), 5, "default shortcut list expected");
    }

    #[test]
    fn test_parse_full_config() {
        let config = r#"
            global {
                log-level "debug"
            }
            display {
                enabled true
                display-time-ms 1500
                fade-duration-ms 500
                max-stack 4
                combo-timeout-ms 800
                show-single-keys false
                describe-shortcuts false
                position x=10 y=700.5 width=300 row-height=40 spacing=2
            }
            mouse {
                double-click-timeout 0.25
                drag-threshold 20
                log left-click=true scroll=false
                aliases {
                    "Left Click" "LMB"
                    "Scroll Up" "Wheel Up"
                }
            }
            proximity {
                enabled false
                distance 90
                min-opacity 0.3
            }
            cheat-sheet {
                key "F1"
                hold-ms 450
            }
            screen width=2560 height=1440
        "#;

        let config = parse_config_str(config).unwrap();

        assert_eq!(config.global.log_level, LogLevel::Debug);
        assert_eq!(config.display.display_time, Duration::from_millis(1500));
        assert_eq!(config.display.fade_duration, Duration::from_millis(500));
        assert_eq!(config.display.max_stack, 4);
        assert_eq!(config.display.combo_timeout, Duration::from_millis(800));
        assert!(!config.display.show_single_keys);
        assert!(!config.display.describe_shortcuts);
        assert_eq!(config.display.position.y, 700.5);
        assert_eq!(config.display.position.row_height, 40.0);

        assert_eq!(config.mouse.double_click_timeout, Duration::from_millis(250));
        assert_eq!(config.mouse.drag_threshold, 20.0);
        assert!(config.mouse.log.left_click);
        assert!(!config.mouse.log.scroll);
        assert!(config.mouse.log.right_click, "unset toggles keep defaults");
        assert_eq!(config.mouse.alias("Left Click"), "LMB");
        assert_eq!(config.mouse.alias("Scroll Up"), "Wheel Up");

        assert!(!config.proximity.enabled);
        assert_eq!(config.proximity.distance, 90.0);
        assert_eq!(config.proximity.min_opacity, 0.3);

        assert_eq!(config.cheat_sheet.key, "F1");
        assert_eq!(config.cheat_sheet.hold, Duration::from_millis(450));
        assert_eq!(config.screen, ScreenConfig { width: 2560, height: 1440 });
    }

    #[test]
    fn test_out_of_range_values_fall_back_to_base() {
        let mut base = Config::default();
        base.display.max_stack = 3;
        base.display.display_time = Duration::from_millis(4000);
        base.cheat_sheet.hold = Duration::from_millis(500);

        let config = r#"
            display {
                max-stack 0
                display-time-ms -10
            }
            cheat-sheet {
                hold-ms 0
            }
            proximity {
                min-opacity 1.5
            }
        "#;

        let config = parse_config_str_with_base(config, &base).unwrap();
        assert_eq!(config.display.max_stack, 3);
        assert_eq!(config.display.display_time, Duration::from_millis(4000));
        assert_eq!(config.cheat_sheet.hold, Duration::from_millis(500));
        assert_eq!(config.proximity.min_opacity, 0.1);
    }

    #[test]
    fn test_unrepresentable_double_click_timeout_falls_back() {
        let mut base = Config::default();
        base.mouse.double_click_timeout = Duration::from_millis(400);

        let config =
            parse_config_str_with_base("mouse { double-click-timeout 1.0e20 }", &base).unwrap();
        assert_eq!(config.mouse.double_click_timeout, Duration::from_millis(400));

        let config =
            parse_config_str_with_base("mouse { double-click-timeout -0.5 }", &base).unwrap();
        assert_eq!(config.mouse.double_click_timeout, Duration::from_millis(400));
    }

    #[test]
    fn test_screen_extent_outside_i32_falls_back() {
        let mut base = Config::default();
        base.screen = ScreenConfig {
            width: 1280,
            height: 720,
        };

        let config = parse_config_str_with_base(
            "screen width=4294967295 height=2147483648",
            &base,
        )
        .unwrap();
        assert_eq!(config.screen, base.screen);

        let config = parse_config_str_with_base("screen width=0 height=-5", &base).unwrap();
        assert_eq!(config.screen, base.screen);

        let config = parse_config_str("screen width=2147483647 height=1").unwrap();
        assert_eq!(config.screen.width, i32::MAX);
        assert_eq!(config.screen.height, 1);
    }

    #[test]
    fn test_type_mismatch_is_error() {
        let config = r#"
            display {
                max-stack "lots"
            }
        "#;

        let err = parse_config_str(config).unwrap_err();
        match err {
            ConfigError::InvalidValue { option, .. } => assert_eq!(option, "max-stack"),
            _ => panic!("Expected InvalidValue error, got: {:?}", err),
        }
    }

    #[test]
    fn test_missing_value_is_error() {
        let config = r#"
            display {
                enabled
            }
        "#;

        let result = parse_config_str(config);
        assert!(
            matches!(result, Err(ConfigError::MissingField { .. })),
            "Expected MissingField, got: {:?}",
            result
        );
    }

    #[test]
    fn test_syntax_error_carries_span() {
        let result = parse_config_str("display {");
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_unknown_nodes_are_ignored() {
        let config = r#"
            theme "dark"
            display {
                font-size 12
            }
        "#;

        assert!(parse_config_str(config).is_ok());
    }

    #[test]
    fn test_shortcuts_replace_defaults() {
        let config = r#"
            shortcuts {
                header "Editing"
                key "Ctrl+X" "Cut"
                key "Ctrl+Shift+Z" "Redo" log=false
                key "Alt+F4" "Close" cheat=false enabled=false
            }
        "#;

        let config = parse_config_str(config).unwrap();
        assert_eq!(config.shortcuts.len(), 4);
        assert_eq!(config.shortcuts[0], Shortcut::header("Editing"));
        assert_eq!(config.shortcuts[1], Shortcut::key("Ctrl+X", "Cut"));
        assert!(!config.shortcuts[2].show_in_log);
        assert!(config.shortcuts[2].show_in_cheat);
        assert!(!config.shortcuts[3].enabled);
        assert!(!config.shortcuts[3].show_in_cheat);
        assert!(config.find_shortcut("Ctrl+C").is_none(), "defaults are replaced");
    }

    #[test]
    fn test_shortcut_without_combo_fails() {
        let config = r#"
            shortcuts {
                key
            }
        "#;

        assert!(matches!(
            parse_config_str(config),
            Err(ConfigError::MissingField { .. })
        ));
    }

    #[test]
    fn test_parse_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.kdl");
        std::fs::write(&path, "display {\n    max-stack 5\n}\n").unwrap();

        let config = parse_config(&path).unwrap();
        assert_eq!(config.display.max_stack, 5);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = parse_config(&dir.path().join("absent.kdl"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
