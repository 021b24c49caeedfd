//! egui input onto canvas input. Canvas screen space starts at the top-left
//! corner of the canvas panel, so positions are shifted by the panel origin.

use callgrid_canvas::{Key, Modifiers, PointerButton};
use callgrid_core::Color;
use callgrid_graph::Vec2;
use eframe::egui;

pub fn to_canvas(pos: egui::Pos2, origin: egui::Pos2) -> Vec2 {
    Vec2::new(pos.x - origin.x, pos.y - origin.y)
}

pub fn to_screen(v: Vec2, origin: egui::Pos2) -> egui::Pos2 {
    egui::pos2(v.x + origin.x, v.y + origin.y)
}

pub fn color32(color: Color) -> egui::Color32 {
    egui::Color32::from_rgba_unmultiplied(color.r, color.g, color.b, color.a)
}

pub fn from_color32(color: egui::Color32) -> Color {
    let [r, g, b, a] = color.to_srgba_unmultiplied();
    Color::rgba(r, g, b, a)
}

pub fn modifiers(m: egui::Modifiers) -> Modifiers {
    Modifiers {
        // Cmd on macOS
        ctrl: m.ctrl || m.command,
        shift: m.shift,
        alt: m.alt,
    }
}

pub fn button(b: egui::PointerButton) -> Option<PointerButton> {
    match b {
        egui::PointerButton::Primary => Some(PointerButton::Primary),
        egui::PointerButton::Secondary => Some(PointerButton::Secondary),
        egui::PointerButton::Middle => Some(PointerButton::Middle),
        _ => None,
    }
}

pub fn key(k: egui::Key) -> Option<Key> {
    use egui::Key as K;
    let key = match k {
        K::Escape => Key::Escape,
        K::Enter => Key::Enter,
        K::Delete => Key::Delete,
        K::Backspace => Key::Backspace,
        K::Num1 => Key::Char('1'),
        K::Num2 => Key::Char('2'),
        K::Num3 => Key::Char('3'),
        K::Num4 => Key::Char('4'),
        K::Num5 => Key::Char('5'),
        K::Plus => Key::Char('+'),
        K::Equals => Key::Char('='),
        K::Minus => Key::Char('-'),
        K::F => Key::Char('f'),
        K::G => Key::Char('g'),
        K::O => Key::Char('o'),
        K::R => Key::Char('r'),
        K::S => Key::Char('s'),
        K::X => Key::Char('x'),
        K::Y => Key::Char('y'),
        K::Z => Key::Char('z'),
        _ => return None,
    };
    Some(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_are_relative_to_panel() {
        let origin = egui::pos2(40.0, 25.0);
        let v = to_canvas(egui::pos2(140.0, 75.0), origin);
        assert_eq!(v, Vec2::new(100.0, 50.0));
        assert_eq!(to_screen(v, origin), egui::pos2(140.0, 75.0));
    }

    #[test]
    fn test_command_counts_as_ctrl() {
        let m = modifiers(egui::Modifiers {
            command: true,
            shift: true,
            ..Default::default()
        });
        assert_eq!(
            m,
            Modifiers {
                ctrl: true,
                shift: true,
                alt: false
            }
        );
    }

    #[test]
    fn test_key_mapping() {
        assert_eq!(key(egui::Key::Num3), Some(Key::Char('3')));
        assert_eq!(key(egui::Key::Z), Some(Key::Char('z')));
        assert_eq!(key(egui::Key::Escape), Some(Key::Escape));
        assert_eq!(key(egui::Key::Q), None);
        assert_eq!(button(egui::PointerButton::Extra1), None);
    }

    #[test]
    fn test_opaque_color_round_trip() {
        let color = Color::rgb(0x4f, 0xc3, 0xf7);
        assert_eq!(from_color32(color32(color)), color);
    }
}
