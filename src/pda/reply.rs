// コントローラーへの応答
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use crate::aqualink::{ACK_COMMAND, ACK_PREFIX, Command, Frame, Key};
use crate::pda::{MacroNavigator, ScreenBuffer};

/// 次の応答で送るもの
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PendingReply {
    #[default]
    None,
    SingleKey(Key),
    Macro(MacroNavigator),
}

impl PendingReply {
    /// 応答するボタンを決めて、保留状態を進める
    ///
    /// マクロはポーリングのときだけ進める。
    /// 単発のボタンは宛先が自分の電文なら何にでも1回だけ返す。
    pub fn next_key(&mut self, command: Command, screen: &ScreenBuffer) -> Key {
        match self {
            Self::None => Key::None,
            Self::SingleKey(key) => {
                let key = *key;
                *self = Self::None;
                key
            }
            Self::Macro(nav) if command == Command::Poll => {
                let key = nav.step(screen);
                if nav.is_finished() {
                    tracing::info!("macro finished");
                    *self = Self::None;
                }
                key
            }
            Self::Macro(_) => Key::None,
        }
    }
}

/// 応答電文
pub fn ack_frame(master: u8, key: Key) -> Frame {
    Frame::new(master, ACK_COMMAND, &[ACK_PREFIX, key.code()])
}

#[test]
fn test1() {
    let screen = ScreenBuffer::new();
    let mut pending = PendingReply::SingleKey(Key::Select);
    assert_eq!(pending.next_key(Command::Probe, &screen), Key::Select);
    // 1回だけ
    assert_eq!(pending, PendingReply::None);
    assert_eq!(pending.next_key(Command::Poll, &screen), Key::None);
}

#[test]
fn test2() {
    let screen = ScreenBuffer::new();
    let mut pending = PendingReply::Macro(MacroNavigator::new(&["NOWHERE"]));
    // ポーリング以外ではマクロを進めない
    assert_eq!(pending.next_key(Command::WriteLine, &screen), Key::None);
    assert_eq!(pending.next_key(Command::Poll, &screen), Key::Back);
    assert_eq!(pending.next_key(Command::Poll, &screen), Key::Back);
    assert_eq!(pending.next_key(Command::Poll, &screen), Key::Back);
    assert_eq!(pending, PendingReply::None);
}

#[test]
fn test3() {
    let frame = ack_frame(0x00, Key::Down);
    assert_eq!(frame.destination, 0x00);
    assert_eq!(frame.command, 0x01);
    assert_eq!(frame.payload, vec![0x40, 0x05]);
}
