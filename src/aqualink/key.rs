// PDAリモコンのボタン
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 応答電文で送るボタンコード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Key {
    None = 0x00,
    Button1 = 0x01,
    Back = 0x02,
    Button2 = 0x03,
    Select = 0x04,
    Down = 0x05,
    Up = 0x06,
}

impl Key {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Button1 => "but1",
            Self::Back => "back",
            Self::Button2 => "but2",
            Self::Select => "select",
            Self::Down => "down",
            Self::Up => "up",
        };
        write!(f, "{}", name)
    }
}

/// 設備を操作するマクロ
///
/// 目標のメニュー項目を順にたどる
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Macro {
    PoolMode,
    SpaMode,
    PoolHeater,
    SpaHeater,
    PoolLight,
    SpaLight,
    Cleaner,
    Blower,
    AllOff,
}

impl Macro {
    pub fn targets(&self) -> &'static [&'static str] {
        match self {
            Self::PoolMode => &["POOL MODE"],
            Self::SpaMode => &["SPA MODE"],
            Self::PoolHeater => &["POOL HEATER"],
            Self::SpaHeater => &["SPA HEATER"],
            Self::PoolLight => &["EQUIPMENT", "POOL LIGHT"],
            Self::SpaLight => &["EQUIPMENT", "SPA LIGHT"],
            Self::Cleaner => &["EQUIPMENT", "CLEANER"],
            Self::Blower => &["EQUIPMENT", "AIR BLOWER"],
            Self::AllOff => &["EQUIPMENT", "ALL OFF"],
        }
    }
}

/// 外部からのボタン要求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRequest {
    Key(Key),
    Macro(Macro),
    Status,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(r#"unknown key "{0}""#)]
pub struct UnknownKey(pub String);

impl FromStr for KeyRequest {
    type Err = UnknownKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let request = match s.trim().to_ascii_lowercase().as_str() {
            "up" => Self::Key(Key::Up),
            "down" => Self::Key(Key::Down),
            "back" => Self::Key(Key::Back),
            "select" => Self::Key(Key::Select),
            "but1" | "pgup" => Self::Key(Key::Button1),
            "but2" | "pgdn" => Self::Key(Key::Button2),
            "poolmode" => Self::Macro(Macro::PoolMode),
            "spamode" => Self::Macro(Macro::SpaMode),
            "poolheater" => Self::Macro(Macro::PoolHeater),
            "spaheater" => Self::Macro(Macro::SpaHeater),
            "poollight" => Self::Macro(Macro::PoolLight),
            "spalight" => Self::Macro(Macro::SpaLight),
            "cleaner" => Self::Macro(Macro::Cleaner),
            "blower" => Self::Macro(Macro::Blower),
            "alloff" => Self::Macro(Macro::AllOff),
            "status" => Self::Status,
            _ => return Err(UnknownKey(s.to_string())),
        };
        Ok(request)
    }
}

#[test]
fn test1() {
    assert_eq!(Key::None.code(), 0x00);
    assert_eq!(Key::Back.code(), 0x02);
    assert_eq!(Key::Select.code(), 0x04);
    assert_eq!(Key::Down.code(), 0x05);
    assert_eq!(Key::Up.code(), 0x06);
}

#[test]
fn test2() {
    assert_eq!("up".parse::<KeyRequest>(), Ok(KeyRequest::Key(Key::Up)));
    assert_eq!(
        " Select ".parse::<KeyRequest>(),
        Ok(KeyRequest::Key(Key::Select))
    );
    assert_eq!("pgdn".parse::<KeyRequest>(), Ok(KeyRequest::Key(Key::Button2)));
    assert_eq!("status".parse::<KeyRequest>(), Ok(KeyRequest::Status));
    assert_eq!(
        "cleaner".parse::<KeyRequest>(),
        Ok(KeyRequest::Macro(Macro::Cleaner))
    );
    assert_eq!(Macro::Cleaner.targets(), &["EQUIPMENT", "CLEANER"]);
    assert_eq!(
        "jets".parse::<KeyRequest>(),
        Err(UnknownKey("jets".to_string()))
    );
}
