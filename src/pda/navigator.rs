// マクロ(メニュー項目を順にたどるボタン操作)
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use crate::aqualink::{Key, Macro};
use crate::pda::ScreenBuffer;
use std::collections::VecDeque;

/// これ以上スクロールしても見つからなければ前の画面に戻る
pub const SCROLL_LIMIT: usize = 13;
/// 戻るボタンをこの回数押しても見つからなければ諦める
pub const BACK_LIMIT: usize = 3;

/// スクロール可能なメニューの印
const MORE_MARKER: &str = "MORE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroNavigator {
    targets: VecDeque<String>,
    scroll_count: usize,
    back_count: usize,
}

impl MacroNavigator {
    pub fn new<S: AsRef<str>>(targets: &[S]) -> Self {
        MacroNavigator {
            targets: targets.iter().map(|s| s.as_ref().to_owned()).collect(),
            scroll_count: 0,
            back_count: 0,
        }
    }

    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.targets.iter().map(|s| s.as_str())
    }

    pub fn scroll_count(&self) -> usize {
        self.scroll_count
    }

    pub fn back_count(&self) -> usize {
        self.back_count
    }

    pub fn is_finished(&self) -> bool {
        self.targets.is_empty()
    }

    // 後の目標がすでに画面にあれば、それより前の目標を飛ばす
    fn skip_ahead(&mut self, screen: &ScreenBuffer) {
        let visible = self
            .targets
            .iter()
            .position(|target| screen.interior().any(|(_, line)| line.contains(target.as_str())));
        if let Some(n) = visible {
            if n > 0 {
                tracing::debug!("macro: skip {:?}", self.targets.range(..n).collect::<Vec<_>>());
                self.targets.drain(..n);
            }
        }
    }

    /// ポーリングごとに次のボタンを決める
    pub fn step(&mut self, screen: &ScreenBuffer) -> Key {
        self.skip_ahead(screen);
        let Some(target) = self.targets.front() else {
            return Key::None;
        };

        let found = screen
            .interior()
            .find(|(_, line)| line.contains(target.as_str()))
            .map(|(n, _)| n);
        let more = [8, 9]
            .iter()
            .any(|&n| screen.line(n).is_some_and(|line| line.contains(MORE_MARKER)));
        let on_cursor = screen
            .cursor_line()
            .is_some_and(|line| line.contains(target.as_str()));

        let key = if on_cursor {
            // 目標に到達したので選択する
            tracing::debug!(r#"macro: select "{}""#, target);
            self.targets.pop_front();
            self.scroll_count = 0;
            Key::Select
        } else if found.is_some() || more {
            if self.scroll_count > SCROLL_LIMIT {
                self.scroll_count = 0;
                self.back_count += 1;
                Key::Back
            } else {
                self.scroll_count += 1;
                // 目標がカーソルより下なら下へ、それ以外(MOREだけの場合も)は上へ
                match (screen.cursor(), found) {
                    (Some(cursor), Some(n)) if n <= cursor => Key::Up,
                    (_, Some(_)) => Key::Down,
                    (_, None) => Key::Up,
                }
            }
        } else {
            // 行き止まり
            self.scroll_count = 0;
            self.back_count += 1;
            if self.back_count >= BACK_LIMIT {
                tracing::debug!(r#"macro: give up "{}""#, target);
                self.targets.pop_front();
                self.back_count = 0;
            }
            Key::Back
        };
        tracing::debug!(
            "macro: {} (scroll={}, back={})",
            key,
            self.scroll_count,
            self.back_count
        );
        key
    }
}

impl From<Macro> for MacroNavigator {
    fn from(m: Macro) -> Self {
        MacroNavigator::new(m.targets())
    }
}

#[cfg(test)]
fn menu(items: &[&str], cursor: usize) -> ScreenBuffer {
    let mut screen = ScreenBuffer::new();
    screen.write_line(0, "    MAIN MENU").unwrap();
    for (n, item) in items.iter().enumerate() {
        screen.write_line(n + 1, item).unwrap();
    }
    screen.invert_line(cursor).unwrap();
    screen
}

#[test]
fn test1() {
    // カーソルが目標に近づいて選択する
    let items = [
        "HELP",
        "PROGRAM",
        "SET TEMP",
        "SET TIME",
        "POOL MODE    OFF",
        "SPA MODE     OFF",
    ];
    let mut nav = MacroNavigator::from(Macro::PoolMode);
    let mut keys = Vec::new();
    let mut cursor = 1;
    loop {
        let key = nav.step(&menu(&items, cursor));
        keys.push(key);
        match key {
            Key::Down => cursor += 1,
            Key::Up => cursor -= 1,
            _ => break,
        }
        assert!(keys.len() <= SCROLL_LIMIT);
    }
    assert_eq!(keys, vec![Key::Down, Key::Down, Key::Down, Key::Down, Key::Select]);
    assert!(nav.is_finished());
    assert_eq!(nav.step(&menu(&items, cursor)), Key::None);
}

#[test]
fn test2() {
    // 目標がカーソルより上にあれば上へ
    let items = ["POOL HEATER  OFF", "SPA HEATER   OFF", "EQUIPMENT"];
    let mut nav = MacroNavigator::from(Macro::PoolHeater);
    assert_eq!(nav.step(&menu(&items, 3)), Key::Up);
    assert_eq!(nav.step(&menu(&items, 2)), Key::Up);
    assert_eq!(nav.step(&menu(&items, 1)), Key::Select);
    assert!(nav.is_finished());
}

#[test]
fn test3() {
    // 見つからない目標は戻るボタンを3回押して諦める
    let items = ["HELP", "PROGRAM"];
    let mut nav = MacroNavigator::new(&["JETS"]);
    let keys: Vec<Key> = (0..6).map(|_| nav.step(&menu(&items, 1))).collect();
    assert_eq!(
        keys,
        vec![Key::Back, Key::Back, Key::Back, Key::None, Key::None, Key::None]
    );
    assert!(nav.is_finished());
    assert_eq!(nav.back_count(), 0);
}

#[test]
fn test4() {
    // フッター行にMOREがあればスクロールし続け、限度を超えたら戻る
    let mut screen = menu(&["HELP", "PROGRAM"], 1);
    screen.write_line(9, "      MORE").unwrap();
    let mut nav = MacroNavigator::new(&["SPA LIGHT"]);
    for n in 1..=SCROLL_LIMIT + 1 {
        assert_eq!(nav.step(&screen), Key::Up);
        assert_eq!(nav.scroll_count(), n);
    }
    assert_eq!(nav.step(&screen), Key::Back);
    assert_eq!(nav.scroll_count(), 0);
    assert_eq!(nav.back_count(), 1);
    assert!(!nav.is_finished());
}

#[test]
fn test5() {
    // 後の目標が見えていれば前の目標は飛ばす
    let items = ["FILTER PUMP", "CLEANER", "SPA LIGHT"];
    let mut nav = MacroNavigator::from(Macro::Cleaner);
    assert_eq!(nav.step(&menu(&items, 1)), Key::Down);
    assert_eq!(nav.targets().collect::<Vec<_>>(), vec!["CLEANER"]);
    assert_eq!(nav.step(&menu(&items, 2)), Key::Select);
    assert!(nav.is_finished());
}

#[test]
fn test6() {
    // EQUIPMENTを選んでからサブメニューのCLEANERへ
    let mut nav = MacroNavigator::from(Macro::Cleaner);
    let main = ["POOL MODE    OFF", "EQUIPMENT"];
    assert_eq!(nav.step(&menu(&main, 1)), Key::Down);
    assert_eq!(nav.step(&menu(&main, 2)), Key::Select);
    assert!(!nav.is_finished());
    let equipment = ["FILTER PUMP", "CLEANER"];
    assert_eq!(nav.step(&menu(&equipment, 1)), Key::Down);
    assert_eq!(nav.step(&menu(&equipment, 2)), Key::Select);
    assert!(nav.is_finished());
}

#[test]
fn test7() {
    // 最後の内側の行(8行目)のMOREでもスクロールする
    // 目標が見えなければカーソル位置によらず上へ
    let mut screen = menu(&["HELP", "PROGRAM", "SET TEMP"], 3);
    screen.write_line(8, "      MORE").unwrap();
    let mut nav = MacroNavigator::new(&["SPA LIGHT"]);
    assert_eq!(nav.step(&screen), Key::Up);
    assert_eq!(Key::Up.code(), 0x06);
    assert_eq!(nav.scroll_count(), 1);
    assert_eq!(nav.back_count(), 0);

    // MOREが無ければ行き止まりとして戻る
    screen.write_line(8, "").unwrap();
    assert_eq!(nav.step(&screen), Key::Back);
    assert_eq!(nav.scroll_count(), 0);
}

#[test]
fn test8() {
    // カーソルが無くても目標が見えていれば下へ
    let mut screen = ScreenBuffer::new();
    screen.write_line(4, "SPA LIGHT    OFF").unwrap();
    screen.write_line(8, "      MORE").unwrap();
    let mut nav = MacroNavigator::new(&["SPA LIGHT"]);
    assert_eq!(nav.step(&screen), Key::Down);
}
